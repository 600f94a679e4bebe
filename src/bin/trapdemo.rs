use clap::Parser;
use clap_num::maybe_hex;
use riscv_trap_core::config::{Config, DebugMode, Isa};
use riscv_trap_core::clic::Clic;
use riscv_trap_core::hart::Cluster;
use riscv_trap_core::host::HostRuntime;
use riscv_trap_core::privilege::{BasicInterrupt, Privilege, PrivilegedVersion};
use riscv_trap_core::xret::ReturnFrom;
use std::collections::HashMap;

/// Drive a hart through one of a handful of scripted net-input
/// scenarios and print the resulting trap/CLIC/debug state
///
/// Each scenario exercises a different corner of trap delivery: a
/// basic-mode timer interrupt, a vectored external interrupt, a
/// privilege-mode return, an illegal `dret`, a CLIC selective-hardware-
/// vectored interrupt, and the priv-spec-dependent retired-instruction
/// count on `ecall`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Which scripted scenario to run
    scenario: Scenario,

    /// Enable trace-level logging of trap delivery
    #[arg(short, long)]
    verbose: bool,

    /// Override the hart's reset address (use 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u64>)]
    reset_address: Option<u64>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum Scenario {
    /// Machine timer interrupt delivered from U-mode
    Mti,
    /// Vectored machine external interrupt
    VectoredMei,
    /// `sret` returning from Supervisor mode
    Sret,
    /// `dret` executed outside Debug-Mode
    IllegalDret,
    /// CLIC selective-hardware-vectored interrupt
    ClicShv,
    /// `ecall` retirement count across priv-spec versions
    EcallRetire,
}

/// A minimal [`HostRuntime`] that just tracks the PC and a small
/// vector-table memory, printing every redirection it is asked to make.
struct DemoHost {
    pc: u64,
    memory: HashMap<u64, u32>,
}

impl HostRuntime for DemoHost {
    fn get_pc(&self) -> u64 {
        self.pc
    }

    fn set_pc(&mut self, pc: u64) {
        println!("  pc <- 0x{pc:x}");
        self.pc = pc;
    }

    fn set_pc_exception(&mut self, pc: u64) {
        println!("  pc <- 0x{pc:x} (trap)");
        self.pc = pc;
    }

    fn read4(&mut self, addr: u64) -> Option<u32> {
        self.memory.get(&addr).copied()
    }

    fn read8(&mut self, _addr: u64) -> Option<u64> {
        None
    }

    fn halt(&mut self) {
        println!("  host: halt");
    }

    fn restart(&mut self) {
        println!("  host: restart");
    }

    fn do_synchronous_interrupt(&mut self) {}

    fn abort_repeat(&mut self) {}

    fn model_timer(&mut self) {}

    fn smp_iter(&self) -> std::ops::Range<usize> {
        0..1
    }
}

fn report(cluster: &Cluster) {
    let hart = &cluster.harts[0];
    println!(
        "  mode={:?} in_debug_mode={} exception={:?} retired={}",
        hart.current_mode, hart.in_debug_mode, hart.exception, hart.retired_instructions
    );
}

fn run_mti(cluster: &mut Cluster, host: &mut DemoHost) {
    let hart = &mut cluster.harts[0];
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
    hart.csrs.set_ie(Privilege::Machine, true);
    hart.csrs.mie = 1 << BasicInterrupt::MachineTimer.code();
    hart.current_mode = Privilege::User;

    println!("asserting MachineTimer from U-mode");
    hart.set_line(BasicInterrupt::MachineTimer, true);
    hart.deliver_pending_interrupt(host).unwrap();
    report(cluster);
}

fn run_vectored_mei(cluster: &mut Cluster, host: &mut DemoHost) {
    let hart = &mut cluster.harts[0];
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 1, false);
    hart.csrs.set_ie(Privilege::Machine, true);
    hart.csrs.mie = 1 << BasicInterrupt::MachineExternal.code();

    println!("asserting vectored MachineExternal");
    hart.set_line(BasicInterrupt::MachineExternal, true);
    hart.deliver_pending_interrupt(host).unwrap();
    report(cluster);
}

fn run_sret(cluster: &mut Cluster, host: &mut DemoHost) {
    let hart = &mut cluster.harts[0];
    hart.current_mode = Privilege::Supervisor;
    hart.csrs.s.epc = 0x4000;

    println!("executing sret from S-mode");
    hart.xret(ReturnFrom::Sret, host);
    report(cluster);
}

fn run_illegal_dret(cluster: &mut Cluster, host: &mut DemoHost) {
    println!("executing dret outside Debug-Mode");
    cluster.harts[0].dret(host).unwrap();
    report(cluster);
}

fn run_clic_shv(cluster: &mut Cluster, host: &mut DemoHost) {
    cluster.write_cliccfg(0x20); // nmbits=0, nlbits=8 (ctl is taken as level directly)
    host.memory.insert(0x9000_0000 + 4 * 40, 0x8000_4000);
    cluster.harts[0].csrs.m.tvt = 0x9000_0000;
    cluster.harts[0].csrs.write_tvec(Privilege::Machine, 0, 0b11, true);
    cluster.harts[0].csrs.set_ie(Privilege::Machine, true);

    cluster.clic_write_byte(4096 + 4 * 40 + 2, 0b0000_0001); // attr.shv = 1
    cluster.clic_write_byte(4096 + 4 * 40 + 3, 200); // ctl = level 200
    cluster.clic_write_byte(4096 + 4 * 40 + 1, 1); // ie
    cluster.clic_write_byte(4096 + 4 * 40, 1); // ip

    println!("delivering CLIC SHV interrupt id=40 priv=M level=200");
    cluster.harts[0].deliver_pending_interrupt(host).unwrap();
    report(cluster);
}

fn run_ecall_retire(cluster: &mut Cluster, host: &mut DemoHost) {
    use riscv_trap_core::privilege::Exception;

    let hart = &mut cluster.harts[0];
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);

    println!("priv-spec {:?}: ecall from M-mode", hart.config.priv_version);
    hart.take_exception(Exception::EnvironmentCallFromMMode, 0, host).unwrap();
    report(cluster);
}

fn main() {
    let args = Args::parse();
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Trace);
    }
    builder.init();

    let mut config = Config {
        arch: Isa::S | Isa::U,
        reset_address: args.reset_address.unwrap_or(0),
        debug_mode: DebugMode::None,
        ..Config::default()
    };
    if matches!(args.scenario, Scenario::ClicShv) {
        config.clic_cfg_m_bits = 2;
        config.clic_int_ctl_bits = 8;
        config.mclicbase = 0x9000_0000;
    }
    if matches!(args.scenario, Scenario::EcallRetire) {
        config.priv_version = PrivilegedVersion::V20190405;
    }

    let clic_present = config.has_clic();
    let clic = Clic::new(1, 4096 - 16, config.clic_version, config.clic_int_ctl_bits, config.clic_cfg_m_bits, 1, false, true, true);
    let mut cluster = if clic_present {
        Cluster::new(vec![config], clic).unwrap()
    } else {
        Cluster::new(vec![config], Clic::new(1, 0, 1, 0, 0, 0, false, true, true)).unwrap()
    };

    let mut host = DemoHost { pc: 0x1000, memory: HashMap::new() };
    cluster.harts[0].reset(false, &mut host);

    match args.scenario {
        Scenario::Mti => run_mti(&mut cluster, &mut host),
        Scenario::VectoredMei => run_vectored_mei(&mut cluster, &mut host),
        Scenario::Sret => run_sret(&mut cluster, &mut host),
        Scenario::IllegalDret => run_illegal_dret(&mut cluster, &mut host),
        Scenario::ClicShv => run_clic_shv(&mut cluster, &mut host),
        Scenario::EcallRetire => run_ecall_retire(&mut cluster, &mut host),
    }
}

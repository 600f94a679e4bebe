//! End-to-end scenarios driven entirely through the public `Hart`/
//! `Cluster` API, one per literal example this core's semantics were
//! checked against.

use riscv_trap_core::clic::Clic;
use riscv_trap_core::config::Config;
use riscv_trap_core::hart::{Cluster, Hart};
use riscv_trap_core::host::HostRuntime;
use riscv_trap_core::privilege::{BasicInterrupt, Exception, Privilege, PrivilegedVersion, Trap};
use riscv_trap_core::xret::ReturnFrom;
use std::collections::HashMap;

struct TestHost {
    pc: u64,
    memory: HashMap<u64, u32>,
}

impl TestHost {
    fn new(pc: u64) -> Self {
        TestHost { pc, memory: HashMap::new() }
    }
}

impl HostRuntime for TestHost {
    fn get_pc(&self) -> u64 {
        self.pc
    }
    fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }
    fn set_pc_exception(&mut self, pc: u64) {
        self.pc = pc;
    }
    fn read4(&mut self, addr: u64) -> Option<u32> {
        self.memory.get(&addr).copied()
    }
    fn read8(&mut self, _addr: u64) -> Option<u64> {
        None
    }
    fn halt(&mut self) {}
    fn restart(&mut self) {}
    fn do_synchronous_interrupt(&mut self) {}
    fn abort_repeat(&mut self) {}
    fn model_timer(&mut self) {}
    fn smp_iter(&self) -> std::ops::Range<usize> {
        0..1
    }
}

fn lone_hart(config: Config) -> Hart {
    Hart::new(config, 0, None).unwrap()
}

#[test]
fn machine_timer_interrupt_delivered_from_u_mode() {
    let mut hart = lone_hart(Config { arch: riscv_trap_core::config::Isa::S | riscv_trap_core::config::Isa::U, ..Config::default() });
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
    hart.csrs.set_ie(Privilege::Machine, true);
    hart.csrs.mie = 1 << BasicInterrupt::MachineTimer.code();
    hart.current_mode = Privilege::User;
    let mut host = TestHost::new(0x1000);

    hart.set_line(BasicInterrupt::MachineTimer, true);
    assert_eq!(hart.pending_and_enabled().id, Some(BasicInterrupt::MachineTimer.code()));

    hart.deliver_pending_interrupt(&mut host).unwrap();

    assert_eq!(hart.current_mode, Privilege::Machine);
    assert_eq!(host.pc, 0x8000_0000);
    assert_eq!(hart.csrs.mpp(), Privilege::User.bits());
    assert_eq!(hart.csrs.m.cause_code, BasicInterrupt::MachineTimer.code());
    assert!(hart.csrs.m.cause_interrupt);
    assert_eq!(hart.exception, Some(Trap::BasicInterrupt(BasicInterrupt::MachineTimer)));
}

#[test]
fn vectored_machine_external_interrupt_adds_four_times_ecode() {
    let mut hart = lone_hart(Config::default());
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 1, false);
    hart.csrs.set_ie(Privilege::Machine, true);
    hart.csrs.mie = 1 << BasicInterrupt::MachineExternal.code();
    let mut host = TestHost::new(0x2000);

    hart.set_line(BasicInterrupt::MachineExternal, true);
    hart.deliver_pending_interrupt(&mut host).unwrap();

    let expected = 0x8000_0000 + 4 * BasicInterrupt::MachineExternal.code() as u64;
    assert_eq!(host.pc, expected);
}

#[test]
fn sret_returns_from_supervisor_mode_and_restores_sie() {
    let mut hart = lone_hart(Config { arch: riscv_trap_core::config::Isa::S | riscv_trap_core::config::Isa::U, ..Config::default() });
    hart.current_mode = Privilege::Supervisor;
    hart.csrs.s.epc = 0x4000;
    hart.csrs.set_pie(Privilege::Supervisor, true);
    hart.csrs.set_spp(Privilege::User);
    let mut host = TestHost::new(0x100);

    hart.xret(ReturnFrom::Sret, &mut host);

    assert_eq!(hart.current_mode, Privilege::User);
    assert_eq!(host.pc, 0x4000);
    assert!(hart.csrs.ie(Privilege::Supervisor));
}

#[test]
fn dret_outside_debug_mode_raises_illegal_instruction() {
    let mut hart = lone_hart(Config::default());
    hart.csrs.write_tvec(Privilege::Machine, 0, 0, false);
    let mut host = TestHost::new(0x100);

    hart.dret(&mut host).unwrap();

    assert_eq!(hart.exception, Some(Trap::Exception(Exception::IllegalInstruction)));
    assert!(!hart.in_debug_mode);
}

#[test]
fn clic_shv_interrupt_id_40_priv_m_level_200() {
    let config = Config {
        arch: riscv_trap_core::config::Isa::S | riscv_trap_core::config::Isa::U,
        clic_cfg_m_bits: 2,
        clic_int_ctl_bits: 8,
        mclicbase: 0x9000_0000,
        ..Config::default()
    };
    let clic = Clic::new(1, 4096 - 16, 1, config.clic_int_ctl_bits, config.clic_cfg_m_bits, 1, false, true, true);
    let mut cluster = Cluster::new(vec![config], clic).unwrap();

    cluster.write_cliccfg(0x20); // nlbits=8: ctl is taken as level directly
    cluster.harts[0].csrs.m.tvt = 0x9000_0000;
    cluster.harts[0].csrs.write_tvec(Privilege::Machine, 0, 0b11, true);
    cluster.harts[0].csrs.set_ie(Privilege::Machine, true);

    let mut host = TestHost::new(0x100);
    host.memory.insert(0x9000_0000 + 4 * 40, 0x8000_4000);

    cluster.clic_write_byte(4096 + 4 * 40 + 2, 0b0000_0001); // shv
    cluster.clic_write_byte(4096 + 4 * 40 + 3, 200); // ctl/level
    cluster.clic_write_byte(4096 + 4 * 40 + 1, 1); // ie
    cluster.clic_write_byte(4096 + 4 * 40, 1); // ip

    let pend_enab = cluster.harts[0].pending_and_enabled();
    assert_eq!(pend_enab.id, Some(40));
    assert!(pend_enab.is_clic);
    assert_eq!(pend_enab.priv_, Some(Privilege::Machine));
    assert_eq!(pend_enab.level, 200);

    cluster.harts[0].deliver_pending_interrupt(&mut host).unwrap();

    assert_eq!(host.pc, 0x8000_4000);
    assert_eq!(cluster.harts[0].current_mode, Privilege::Machine);
    assert_eq!(cluster.harts[0].csrs.m.cause_code, 40);
    // edge-triggered by default (trig bit0 clear means level here, so ip stays set)
}

#[test]
fn ecall_retirement_count_depends_on_priv_spec_version() {
    let mut pre_1_12 = lone_hart(Config { priv_version: PrivilegedVersion::V20190405, ..Config::default() });
    pre_1_12.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
    let mut host = TestHost::new(0x100);
    pre_1_12.take_exception(Exception::EnvironmentCallFromMMode, 0, &mut host).unwrap();
    assert_eq!(pre_1_12.retired_instructions, 1);

    let mut post_1_12 = lone_hart(Config { priv_version: PrivilegedVersion::V1_12, ..Config::default() });
    post_1_12.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
    let mut host = TestHost::new(0x100);
    post_1_12.take_exception(Exception::EnvironmentCallFromMMode, 0, &mut host).unwrap();
    assert_eq!(post_1_12.retired_instructions, 0);
}

#[test]
fn mcountinhibit_ir_blocks_retired_count_even_pre_1_12() {
    let mut hart = lone_hart(Config { priv_version: PrivilegedVersion::V20190405, ..Config::default() });
    hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
    hart.csrs.mcountinhibit_ir = true;
    let mut host = TestHost::new(0x100);

    hart.take_exception(Exception::EnvironmentCallFromMMode, 0, &mut host).unwrap();
    assert_eq!(hart.retired_instructions, 0);
}

#[test]
fn nmi_takes_priority_and_always_targets_machine_mode() {
    let mut hart = lone_hart(Config { nmi_address: 0x7000_0000, ..Config::default() });
    hart.current_mode = Privilege::User;
    let mut host = TestHost::new(0x100);

    hart.set_nmi(true);
    assert!(hart.pending.nmi_pending());

    hart.take_nmi(&mut host);

    assert_eq!(host.pc, 0x7000_0000);
    assert_eq!(hart.current_mode, Privilege::Machine);
    assert!(!hart.pending.nmi_pending());
}

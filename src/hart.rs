//! Hart wiring
//!
//! Owns the per-hart state (CSRs, pending sources, privilege, Debug
//! Mode, net-input latches) and a reference to the cluster's shared
//! [`Clic`] root, and exposes the net-input entry points, the fetch
//! gate, and the trap/return/debug operations as a single public API,
//! in the shape of "one struct owns the trap-relevant CSR state and
//! exposes `mret`/`trap_interrupt`-style methods", generalised to the
//! full `{M,S,U}` + CLIC + Debug-Mode surface.
//!
//! The hart/CLIC-root relationship is a shared,
//! reference-counted handle rather than an owning pointer in either
//! direction, so there is no ownership cycle.

use std::cell::RefCell;
use std::rc::Rc;

use crate::arbiter::{refresh_pending_and_enabled_basic, BasicCandidate};
use crate::clic::{decode_address, Clic, ClicAddress, ClicCandidate, IntField};
use crate::config::Config;
use crate::csr::CsrFile;
use crate::debug::{
    classify_ebreak, dret_outside_debug_mode_is_illegal, enter_debug_mode, leave_debug_mode,
    step_should_enter_debug_mode, DebugCause, EbreakOutcome,
};
use crate::error::{ConfigError, InvariantError};
use crate::fetch::{check_fetch, wfi_should_halt, FetchDecision, FetchInputs};
use crate::host::HostRuntime;
use crate::observer::Observers;
use crate::pending::PendingSources;
use crate::persist::{HartSnapshot, NetLatches};
use crate::privilege::{BasicInterrupt, Exception, Privilege, Trap};
use crate::trap::{fetch_shv_handler, take_nmi, take_trap, PendEnab, ShvFetchResult, TrapRequest};
use crate::xret::{take_xret, ReturnFrom};

/// Device-vs-none classification of an in-flight memory access fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessFaultKind {
    #[default]
    None,
    Device,
}

/// Net-input-driven latches not already folded into [`PendingSources`]
/// or the CSR file.
#[derive(Debug, Clone, Copy, Default)]
struct Latches {
    haltreq: bool,
    /// One-shot: sampled from the `resethaltreq` net port at reset,
    /// consumed by the fetch gate.
    resethaltreq_sampled: bool,
    defer_interrupt: bool,
}

/// Per-mode external-interrupt-ID overrides.
#[derive(Debug, Clone, Copy, Default)]
struct ExternalIds {
    m: Option<u16>,
    s: Option<u16>,
    u: Option<u16>,
}

impl ExternalIds {
    fn get(&self, priv_: Privilege) -> Option<u16> {
        match priv_ {
            Privilege::Machine => self.m,
            Privilege::Supervisor => self.s,
            Privilege::User => self.u,
        }
    }

    fn set(&mut self, priv_: Privilege, id: Option<u16>) {
        match priv_ {
            Privilege::Machine => self.m = id,
            Privilege::Supervisor => self.s = id,
            Privilege::User => self.u = id,
        }
    }
}

/// A single RISC-V hart: the owning struct for components A, B, D, E,
/// F, G, H. Component C (the CLIC) is shared cluster-wide through
/// `clic`.
pub struct Hart {
    pub config: Config,
    pub csrs: CsrFile,
    pub pending: PendingSources,
    pub current_mode: Privilege,
    pub in_debug_mode: bool,
    /// Exclusive-reservation tag (`LR`/`SC`).
    pub reservation: Option<u64>,
    /// The last exception or interrupt delivered.
    pub exception: Option<Trap>,
    pub retired_instructions: u64,
    af_error_in: AccessFaultKind,
    af_error_out: AccessFaultKind,
    pend_enab: PendEnab,
    /// Raw CLIC arbitration winner, kept separately from `pend_enab`
    /// since it carries `shv`/`ctl` detail the presentation filter
    /// discards.
    clic_sel: Option<ClicCandidate>,
    external_ids: ExternalIds,
    latches: Latches,
    hart_id: usize,
    clic: Option<Rc<RefCell<Clic>>>,
    pub observers: Observers,
}

impl Hart {
    pub fn new(config: Config, hart_id: usize, clic: Option<Rc<RefCell<Clic>>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let clic_present = clic.is_some();
        Ok(Hart {
            csrs: CsrFile::new(clic_present),
            pending: PendingSources::default(),
            current_mode: Privilege::Machine,
            in_debug_mode: false,
            reservation: None,
            exception: None,
            retired_instructions: 0,
            af_error_in: AccessFaultKind::None,
            af_error_out: AccessFaultKind::None,
            pend_enab: PendEnab::NONE,
            clic_sel: None,
            external_ids: ExternalIds::default(),
            latches: Latches::default(),
            hart_id,
            clic,
            observers: Observers::default(),
            config,
        })
    }

    fn has_s(&self) -> bool {
        self.config.arch.contains(crate::config::Isa::S)
    }

    fn has_u(&self) -> bool {
        self.config.arch.contains(crate::config::Isa::U)
    }

    // -- reset (`riscvReset`) -------------------------------------------

    /// Reset the hart: exit Debug-Mode, switch to M-mode, reset CSR and
    /// pending state, clear the taken-exception record, jump to
    /// `reset_address`, and sample `resethaltreq` into its one-shot
    /// latch.
    pub fn reset(&mut self, resethaltreq: bool, host: &mut impl HostRuntime) {
        self.csrs.reset();
        self.pending.reset();
        self.current_mode = Privilege::Machine;
        self.in_debug_mode = false;
        self.reservation = None;
        self.exception = None;
        self.retired_instructions = 0;
        self.pend_enab = PendEnab::NONE;
        self.clic_sel = None;
        self.latches = Latches { resethaltreq_sampled: resethaltreq, ..Latches::default() };
        host.restart();
        host.set_pc(self.config.reset_address);
        self.observers.notify_reset();
        log::debug!("hart {} reset, pc=0x{:x}", self.hart_id, self.config.reset_address);
    }

    // -- net ports -------------------------------------------------------

    pub fn set_line(&mut self, interrupt: BasicInterrupt, asserted: bool) {
        self.pending.set_line(interrupt, asserted);
        self.test_interrupt();
    }

    pub fn set_software_interrupt(&mut self, interrupt: BasicInterrupt, asserted: bool) {
        self.pending.set_software(interrupt, asserted);
        self.test_interrupt();
    }

    /// `nmi` net port: `dcsr.nmip` mirrors the live line on every edge
    /// while the rising edge specifically
    /// latches a pending NMI request that persists until [`Hart::take_nmi`]
    /// clears it.
    pub fn set_nmi(&mut self, level: bool) {
        let rising = level && !self.csrs.dcsr.nmip;
        self.csrs.dcsr.nmip = level;
        if rising {
            self.pending.set_nmi(true);
        }
    }

    /// `haltreq` net port: level-sensitive, but only
    /// the rising transition (not already in Debug-Mode) matters to
    /// the fetch gate.
    pub fn set_haltreq(&mut self, asserted: bool) {
        self.latches.haltreq = asserted;
    }

    pub fn set_defer_interrupt(&mut self, asserted: bool) {
        self.latches.defer_interrupt = asserted;
    }

    /// `SC_valid` falling edge: clears the exclusive reservation
    /// independently of any trap.
    pub fn on_sc_valid_falling_edge(&mut self) {
        self.reservation = None;
    }

    pub fn set_external_interrupt_id(&mut self, priv_: Privilege, id: Option<u16>) {
        self.external_ids.set(priv_, id);
    }

    pub fn record_access_fault_kind(&mut self, kind: AccessFaultKind) {
        self.af_error_in = kind;
    }

    /// `AFErrorOut`: the access-fault classification latched by the
    /// most recent trap, if it was one of the access-fault exceptions.
    pub fn access_fault_out(&self) -> AccessFaultKind {
        self.af_error_out
    }

    // -- arbitration (basic + CLIC merge) --------------------------------

    fn basic_candidate(&self) -> Option<BasicCandidate> {
        refresh_pending_and_enabled_basic(&self.csrs, &self.pending, self.current_mode, self.has_s(), self.has_u())
    }

    /// CLIC presentation filter: whether the raw
    /// arbitration winner actually becomes the delivered candidate.
    fn clic_presentation_passes(&self, candidate: &ClicCandidate, basic: Option<BasicCandidate>) -> bool {
        if let Some(basic) = basic {
            if candidate.priv_ < basic.target {
                return false;
            }
        }
        if self.current_mode > candidate.priv_ {
            return false;
        }
        if !self.csrs.ie(candidate.priv_) {
            return false;
        }
        if self.current_mode < candidate.priv_ {
            return true;
        }
        candidate.level > self.csrs.il(candidate.priv_) && candidate.level > self.csrs.mode(candidate.priv_).int_thresh
    }

    /// Re-arbitrate among the basic and CLIC sources and update
    /// `pendEnab` (must be called
    /// after every write to `mip`/`mie`/`mideleg`/`sideleg`/`mstatus`/
    /// CLIC state, before the next instruction retires).
    pub fn test_interrupt(&mut self) {
        let basic = self.basic_candidate();
        let clic_candidate = self.clic.as_ref().and_then(|clic| clic.borrow().refresh_pending_and_enabled(self.hart_id));
        self.clic_sel = clic_candidate;

        let clic_presented = clic_candidate.filter(|c| self.clic_presentation_passes(c, basic));

        self.pend_enab = match (basic, clic_presented) {
            (None, None) => PendEnab::NONE,
            (Some(b), None) => PendEnab { id: Some(b.interrupt.code()), priv_: Some(b.target), level: 0, is_clic: false },
            (None, Some(c)) => PendEnab { id: Some(c.id as u16), priv_: Some(c.priv_), level: c.level, is_clic: true },
            (Some(b), Some(c)) => {
                let prefer_clic = if c.priv_ > b.target {
                    true
                } else if c.priv_ < b.target {
                    false
                } else {
                    self.csrs.tvec_mode(c.priv_, None) == crate::csr::TvecMode::Clic
                };
                if prefer_clic {
                    PendEnab { id: Some(c.id as u16), priv_: Some(c.priv_), level: c.level, is_clic: true }
                } else {
                    PendEnab { id: Some(b.interrupt.code()), priv_: Some(b.target), level: 0, is_clic: false }
                }
            }
        };
    }

    pub fn pending_and_enabled(&self) -> PendEnab {
        self.pend_enab
    }

    /// WFI suspension point: a
    /// parked hart wakes on any pending interrupt, masked or not.
    pub fn wfi_should_halt(&self) -> bool {
        let clic_pending = self.clic.as_ref().map(|clic| clic.borrow().any_pending(self.hart_id)).unwrap_or(false);
        wfi_should_halt(self.pending.mip()) && !clic_pending && !self.pending.nmi_pending()
    }

    // -- trap delivery (component E) -------------------------------------

    /// Resolve the per-mode external-interrupt-ID override that
    /// applies once delegation has picked the final target mode.
    fn external_override_for(&self, trap: Trap) -> Option<u16> {
        if !self.config.external_int_id {
            return None;
        }
        let is_external = matches!(trap, Trap::BasicInterrupt(i) if i.is_external());
        if !is_external {
            return None;
        }
        let probe = TrapRequest {
            trap,
            epc: 0,
            tval: 0,
            pend_enab: self.pend_enab,
            current_mode: self.current_mode,
            external_id_override: None,
        };
        let target = crate::trap::resolve_trap_target(&probe, &self.csrs, self.has_s(), self.has_u()).ok()?;
        self.external_ids.get(target)
    }

    fn clear_retired_counter_if_applicable(&mut self, exception: Exception) {
        if !self.csrs.mcountinhibit_ir && exception.retires_instruction(self.config.priv_version) {
            self.retired_instructions += 1;
        }
    }

    /// `take_exception`: deliver a synchronous exception.
    /// Entering this while already in Debug-Mode re-enters Debug-Mode
    /// with cause `NONE` instead of mutating trap CSRs.
    pub fn take_exception(&mut self, exception: Exception, tval: u32, host: &mut impl HostRuntime) -> Result<(), InvariantError> {
        if self.in_debug_mode {
            host.abort_repeat();
            let epc = host.get_pc();
            enter_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, DebugCause::Trigger, epc, true, host);
            return Ok(());
        }

        self.clear_retired_counter_if_applicable(exception);
        self.af_error_out = if exception.is_access_fault() { self.af_error_in } else { AccessFaultKind::None };
        self.reservation = None;

        let trap = Trap::Exception(exception);
        let external_id_override = self.external_override_for(trap);
        // `tval` itself (e.g. the faulting instruction encoding for
        // `tval_ii_code`) is supplied by the caller; decode is out of
        // scope here.
        let request = TrapRequest {
            trap,
            epc: host.get_pc(),
            tval,
            pend_enab: PendEnab::NONE,
            current_mode: self.current_mode,
            external_id_override,
        };

        let clic_borrow = self.clic.as_ref().map(|c| c.borrow());
        let outcome = take_trap(&mut self.csrs, &mut self.current_mode, &self.config, clic_borrow.as_deref(), None, request, None, host)?;
        drop(clic_borrow);
        self.exception = Some(trap);
        self.observers.notify_trap(trap, outcome.target);
        self.test_interrupt();
        log::trace!("hart {} exception {:?} -> mode {:?} pc=0x{:x}", self.hart_id, exception, outcome.target, outcome.handler_pc);
        Ok(())
    }

    /// Deliver the interrupt currently selected by `pendEnab`. For CLIC
    /// SHV interrupts this may recurse into [`Hart::take_exception`]
    /// when the vector-table fetch itself faults.
    pub fn deliver_pending_interrupt(&mut self, host: &mut impl HostRuntime) -> Result<(), InvariantError> {
        let pend_enab = self.pend_enab;
        let Some(id) = pend_enab.id else {
            return Ok(());
        };

        self.reservation = None;
        self.af_error_out = AccessFaultKind::None;

        let trap = if pend_enab.is_clic {
            Trap::ClicInterrupt(id)
        } else {
            Trap::BasicInterrupt(BasicInterrupt::from_code(id).ok_or(InvariantError::PendEnabNotCleared(id))?)
        };

        let mut shv_handler = None;
        if pend_enab.is_clic {
            if let Some(sel) = self.clic_sel {
                if sel.shv {
                    let target = pend_enab.priv_.ok_or(InvariantError::PendEnabNotCleared(id))?;
                    match fetch_shv_handler(&mut self.csrs, target, id, host) {
                        ShvFetchResult::Handler(pc) => {
                            if let Some(clic) = &self.clic {
                                clic.borrow_mut().acknowledge(self.hart_id, sel.id);
                            }
                            shv_handler = Some(pc);
                        }
                        ShvFetchResult::SecondaryException(secondary) => {
                            log::debug!("hart {} CLIC vector fetch faulted, delivering {:?} instead", self.hart_id, secondary);
                            return self.take_exception(secondary, 0, host);
                        }
                    }
                }
            }
        }

        let external_id_override = self.external_override_for(trap);
        let request = TrapRequest {
            trap,
            epc: host.get_pc(),
            tval: 0,
            pend_enab,
            current_mode: self.current_mode,
            external_id_override,
        };

        let clic_borrow = self.clic.as_ref().map(|c| c.borrow());
        let outcome = take_trap(&mut self.csrs, &mut self.current_mode, &self.config, clic_borrow.as_deref(), self.clic_sel, request, shv_handler, host)?;
        drop(clic_borrow);
        self.exception = Some(trap);
        self.observers.notify_trap(trap, outcome.target);
        self.test_interrupt();
        Ok(())
    }

    /// Deliver a non-maskable interrupt.
    pub fn take_nmi(&mut self, host: &mut impl HostRuntime) {
        take_nmi(&mut self.csrs, &mut self.current_mode, &self.config, host);
        self.pending.set_nmi(false);
        self.csrs.dcsr.nmip = false;
        self.test_interrupt();
    }

    // -- return engine (component F) -------------------------------------

    pub fn xret(&mut self, which: ReturnFrom, host: &mut impl HostRuntime) {
        if !self.config.xret_preserves_lr {
            self.reservation = None;
        }
        let clic_borrow = self.clic.as_ref().map(|c| c.borrow());
        take_xret(&mut self.csrs, &mut self.current_mode, &self.config, clic_borrow.as_deref(), which, host);
        drop(clic_borrow);
        self.observers.notify_eret(self.current_mode);
        self.test_interrupt();
    }

    pub fn dret(&mut self, host: &mut impl HostRuntime) -> Result<(), InvariantError> {
        if let Some(illegal) = dret_outside_debug_mode_is_illegal(self.in_debug_mode) {
            return self.take_exception(illegal, 0, host);
        }
        if !self.config.xret_preserves_lr {
            self.reservation = None;
        }
        leave_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, host)?;
        self.observers.notify_eret(self.current_mode);
        self.test_interrupt();
        Ok(())
    }

    // -- debug controller (component G) ----------------------------------

    pub fn ebreak(&mut self, host: &mut impl HostRuntime) -> Result<(), InvariantError> {
        let pc = host.get_pc();
        match classify_ebreak(&self.csrs, self.current_mode, &self.config, pc) {
            EbreakOutcome::EnterDebugMode => {
                if self.csrs.dcsr.stopcount {
                    self.retired_instructions = self.retired_instructions.saturating_sub(1);
                }
                enter_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, DebugCause::Ebreak, pc, false, host);
                Ok(())
            }
            EbreakOutcome::Breakpoint { tval } => self.take_exception(Exception::Breakpoint, tval, host),
        }
    }

    pub fn halt_request(&mut self, host: &mut impl HostRuntime) {
        let pc = host.get_pc();
        enter_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, DebugCause::Haltreq, pc, self.in_debug_mode, host);
        self.latches.haltreq = false;
    }

    pub fn reset_halt_request(&mut self, host: &mut impl HostRuntime) {
        let pc = host.get_pc();
        enter_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, DebugCause::Resethaltreq, pc, false, host);
        self.latches.resethaltreq_sampled = false;
    }

    /// Check single-step after an instruction has retired (single-step
    /// is a one-instruction deferred timer).
    pub fn step_completed(&mut self, host: &mut impl HostRuntime) {
        if step_should_enter_debug_mode(&self.csrs, self.in_debug_mode) {
            let pc = host.get_pc();
            enter_debug_mode(&mut self.csrs, &mut self.current_mode, &mut self.in_debug_mode, &self.config, DebugCause::Step, pc, false, host);
        }
    }

    // -- fetch gate (component H) -----------------------------------------

    /// Consult the fetch gate and act on its decision.
    pub fn fetch_gate(&mut self, fetch_address_valid: bool, host: &mut impl HostRuntime) -> Result<(), InvariantError> {
        let inputs = FetchInputs {
            resethaltreq_sampled: self.latches.resethaltreq_sampled,
            haltreq: self.latches.haltreq,
            in_debug_mode: self.in_debug_mode,
            defer_interrupt: self.latches.defer_interrupt,
            pend_enab: self.pend_enab,
            fetch_address_valid,
        };
        match check_fetch(&inputs) {
            FetchDecision::EnterDebugModeResethaltreq => {
                self.reset_halt_request(host);
                Ok(())
            }
            FetchDecision::EnterDebugModeHaltreq => {
                self.halt_request(host);
                Ok(())
            }
            FetchDecision::Trap(_) => self.deliver_pending_interrupt(host),
            FetchDecision::AddressException(exception) => self.take_exception(exception, 0, host),
            FetchDecision::Allow => Ok(()),
        }
    }

    // -- persistence ---------------------------------------------------------

    pub fn snapshot(&self) -> HartSnapshot {
        HartSnapshot {
            csrs: self.csrs.clone(),
            pending: self.pending,
            current_mode: self.current_mode,
            in_debug_mode: self.in_debug_mode,
            net_latches: NetLatches {
                reset: false,
                nmi: self.pending.nmi_pending(),
                haltreq: self.latches.haltreq,
                resethaltreq: self.latches.resethaltreq_sampled,
                defer_interrupt: self.latches.defer_interrupt,
            },
        }
    }

    pub fn restore(&mut self, snapshot: HartSnapshot) {
        self.csrs = snapshot.csrs;
        self.pending = snapshot.pending;
        self.current_mode = snapshot.current_mode;
        self.in_debug_mode = snapshot.in_debug_mode;
        self.latches = Latches {
            haltreq: snapshot.net_latches.haltreq,
            resethaltreq_sampled: snapshot.net_latches.resethaltreq,
            defer_interrupt: snapshot.net_latches.defer_interrupt,
        };
        self.test_interrupt();
    }
}

/// A cluster of harts sharing one CLIC root. Owns the memory-mapped
/// window decode that a single [`Hart`] has no business routing on its
/// own, since a `cliccfg` write or an interrupt page belonging to
/// another hart affects state outside that hart.
pub struct Cluster {
    pub harts: Vec<Hart>,
    clic: Rc<RefCell<Clic>>,
}

impl Cluster {
    pub fn new(configs: Vec<Config>, clic: Clic) -> Result<Self, ConfigError> {
        let clic = Rc::new(RefCell::new(clic));
        let harts = configs
            .into_iter()
            .enumerate()
            .map(|(id, cfg)| Hart::new(cfg, id, Some(clic.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Cluster { harts, clic })
    }

    /// Write the `cliccfg` byte. Any effective change re-arbitrates on
    /// every hart in the cluster.
    pub fn write_cliccfg(&mut self, raw: u8) {
        let clic_cfg_m_bits = self.harts[0].config.clic_cfg_m_bits;
        let changed = self.clic.borrow_mut().cfg.write(raw, clic_cfg_m_bits);
        if changed {
            for hart in self.harts.iter_mut() {
                hart.test_interrupt();
            }
        }
    }

    pub fn read_clicinfo(&self) -> u32 {
        let clic = self.clic.borrow();
        (clic.info.num_interrupts & 0x1fff)
            | ((clic.info.version as u32) << 13)
            | ((clic.info.clicintctlbits as u32) << 21)
    }

    pub fn read_cliccfg(&self) -> u8 {
        self.clic.borrow().cfg.read()
    }

    /// Byte-granular CLIC MMIO read: a read is honoured only if the
    /// interrupt's target mode is at or
    /// below the page's mode; otherwise it reads as zero).
    pub fn clic_read_byte(&self, offset: u32) -> u8 {
        match decode_address(offset, self.harts.len()) {
            Ok(ClicAddress::CliccfgByte) => self.read_cliccfg(),
            Ok(ClicAddress::ClicinfoByte(byte)) => (self.read_clicinfo() >> (8 * byte)) as u8,
            Ok(ClicAddress::Reserved) => 0,
            Ok(ClicAddress::Interrupt { mode, hart, index, field }) => {
                let clic = self.clic.borrow();
                let state = clic.interrupt(hart, index);
                if clic.decode_mode(state.attr) > mode {
                    return 0;
                }
                match field {
                    IntField::Ip => state.ip as u8,
                    IntField::Ie => state.ie as u8,
                    IntField::Attr => state.attr.to_byte(),
                    IntField::Ctl => state.ctl,
                }
            }
            Err(_) => 0,
        }
    }

    /// Byte-granular CLIC MMIO write; dropped (no-op) when the access
    /// isn't visible through the writing page.
    pub fn clic_write_byte(&mut self, offset: u32, value: u8) {
        match decode_address(offset, self.harts.len()) {
            Ok(ClicAddress::CliccfgByte) => self.write_cliccfg(value),
            Ok(ClicAddress::ClicinfoByte(_)) => {}
            Ok(ClicAddress::Reserved) => {}
            Ok(ClicAddress::Interrupt { mode, hart, index, field }) => {
                let visible = {
                    let clic = self.clic.borrow();
                    let state = clic.interrupt(hart, index);
                    clic.decode_mode(state.attr) <= mode
                };
                if !visible {
                    return;
                }
                match field {
                    IntField::Ip => self.clic.borrow_mut().write_ip(hart, index, value & 1 != 0),
                    IntField::Ie => self.clic.borrow_mut().write_ie(hart, index, value & 1 != 0),
                    IntField::Attr => self.clic.borrow_mut().write_attr(mode, hart, index, value),
                    IntField::Ctl => self.clic.borrow_mut().write_ctl(hart, index, value),
                }
                self.harts[hart].test_interrupt();
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::PrivilegedVersion;

    struct FakeHost {
        pc: u64,
    }

    impl HostRuntime for FakeHost {
        fn get_pc(&self) -> u64 {
            self.pc
        }
        fn set_pc(&mut self, pc: u64) {
            self.pc = pc;
        }
        fn set_pc_exception(&mut self, pc: u64) {
            self.pc = pc;
        }
        fn read4(&mut self, _addr: u64) -> Option<u32> {
            Some(0x8000_1235)
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

    fn test_config() -> Config {
        Config { priv_version: PrivilegedVersion::V1_12, ..Config::default() }
    }

    #[test]
    fn machine_timer_interrupt_delivers_through_deliver_pending_interrupt() {
        let mut hart = Hart::new(test_config(), 0, None).unwrap();
        hart.csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
        hart.csrs.set_ie(Privilege::Machine, true);
        hart.csrs.mie = 1 << BasicInterrupt::MachineTimer.code();
        let mut host = FakeHost { pc: 0x1000 };

        hart.set_line(BasicInterrupt::MachineTimer, true);
        assert!(hart.pending_and_enabled().id.is_some());

        hart.deliver_pending_interrupt(&mut host).unwrap();
        assert_eq!(host.pc, 0x8000_0000);
        assert_eq!(hart.current_mode, Privilege::Machine);
        assert_eq!(hart.csrs.mpp(), Privilege::User.bits());
    }

    #[test]
    fn ebreak_enters_debug_mode_when_configured() {
        let mut hart = Hart::new(test_config(), 0, None).unwrap();
        hart.csrs.dcsr.ebreakm = true;
        let mut host = FakeHost { pc: 0x400 };
        hart.ebreak(&mut host).unwrap();
        assert!(hart.in_debug_mode);
        assert_eq!(hart.csrs.dpc, 0x400);
    }

    #[test]
    fn dret_outside_debug_mode_raises_illegal_instruction() {
        let mut hart = Hart::new(test_config(), 0, None).unwrap();
        hart.csrs.write_tvec(Privilege::Machine, 0, 0, false);
        let mut host = FakeHost { pc: 0x100 };
        hart.dret(&mut host).unwrap();
        assert_eq!(hart.exception, Some(Trap::Exception(Exception::IllegalInstruction)));
    }

    #[test]
    fn deferred_interrupt_is_held_off_by_fetch_gate() {
        let mut hart = Hart::new(test_config(), 0, None).unwrap();
        hart.csrs.set_ie(Privilege::Machine, true);
        hart.csrs.mie = 1 << BasicInterrupt::MachineTimer.code();
        hart.set_defer_interrupt(true);
        hart.set_line(BasicInterrupt::MachineTimer, true);
        let mut host = FakeHost { pc: 0x100 };
        hart.fetch_gate(true, &mut host).unwrap();
        assert_eq!(host.pc, 0x100);

        hart.set_defer_interrupt(false);
        hart.test_interrupt();
        hart.fetch_gate(true, &mut host).unwrap();
        assert_ne!(host.pc, 0x100);
    }

    #[test]
    fn clicinfo_bytes_are_read_independently_of_cliccfg() {
        let config = Config { clic_cfg_m_bits: 2, clic_int_ctl_bits: 8, mclicbase: 0x9000_0000, ..test_config() };
        let clic = Clic::new(1, 0x123, 7, 8, 2, 1, false, true, true);
        let mut cluster = Cluster::new(vec![config], clic).unwrap();
        cluster.write_cliccfg(0xAA);

        assert_eq!(cluster.clic_read_byte(0), cluster.read_cliccfg());
        let info = cluster.read_clicinfo();
        assert_eq!(cluster.clic_read_byte(4), info as u8);
        assert_eq!(cluster.clic_read_byte(5), (info >> 8) as u8);
        assert_eq!(cluster.clic_read_byte(6), (info >> 16) as u8);
        assert_eq!(cluster.clic_read_byte(7), (info >> 24) as u8);
        assert_ne!(cluster.clic_read_byte(4), cluster.clic_read_byte(0));
    }
}

//! Trap engine
//!
//! Given a selected exception or interrupt, computes the destination
//! privilege mode, mutates the CSR file, picks the handler PC, and
//! redirects execution. Generalised from a single-mode, basic-only
//! delivery sequence to the full `{M,S,U}` delegation chain plus CLIC
//! vectoring.

use crate::arbiter::resolve_target;
use crate::clic::{Clic, ClicCandidate};
use crate::config::Config;
use crate::csr::{CsrFile, TvecMode};
use crate::error::InvariantError;
use crate::host::HostRuntime;
use crate::privilege::{Privilege, Trap};

/// The hart's pending-interrupt selection record, set by the arbiters
/// and consumed by the trap engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendEnab {
    pub id: Option<u16>,
    pub priv_: Option<Privilege>,
    pub level: u8,
    pub is_clic: bool,
}

impl PendEnab {
    pub const NONE: PendEnab = PendEnab { id: None, priv_: None, level: 0, is_clic: false };
}

/// Destination of a completed trap delivery.
#[derive(Debug, Clone, Copy)]
pub struct TrapOutcome {
    pub handler_pc: u64,
    pub target: Privilege,
}

/// Result of the CLIC SHV vector-table fetch.
/// A secondary exception (e.g. a load-access-fault reading the table)
/// supersedes the primary interrupt: the trap engine re-enters with
/// that exception.
pub enum ShvFetchResult {
    Handler(u64),
    SecondaryException(crate::privilege::Exception),
}

/// Inputs the trap engine needs beyond the CSR file, gathered from the
/// other components so this module stays free of cross-module
/// borrowing cycles.
pub struct TrapRequest {
    pub trap: Trap,
    pub epc: u64,
    pub tval: u32,
    /// `pendEnab`, only meaningful when `trap` is a `ClicInterrupt`.
    pub pend_enab: PendEnab,
    pub current_mode: Privilege,
    /// An external-interrupt-ID override latched on the relevant
    /// `{priv}ExternalInterruptID` port, if any.
    pub external_id_override: Option<u16>,
}

fn writable_epc_mask(config: &Config) -> u64 {
    if config.arch.contains(crate::config::Isa::C) {
        !0b1
    } else {
        !0b11
    }
}

/// Resolve the destination privilege mode for a trap: exceptions via
/// `{m,s}edeleg`, basic interrupts via
/// `{m,s}ideleg`, CLIC interrupts directly from `pendEnab.priv`. A trap
/// never lowers privilege: the resolved target is raised to the
/// current mode if the delegation chain would otherwise send it lower.
pub fn resolve_trap_target(
    request: &TrapRequest,
    csrs: &CsrFile,
    has_s: bool,
    has_u: bool,
) -> Result<Privilege, InvariantError> {
    let delegated = match request.trap {
        Trap::Exception(exception) => {
            resolve_target(exception.code(), csrs.medeleg, csrs.sedeleg, has_s, has_u)
        }
        Trap::BasicInterrupt(interrupt) => {
            resolve_target(interrupt.code(), csrs.mideleg, csrs.sideleg, has_s, has_u)
        }
        Trap::ClicInterrupt(id) => request.pend_enab.priv_.ok_or(InvariantError::PendEnabNotCleared(id))?,
    };
    Ok(delegated.max(request.current_mode))
}

/// Fetch the handler PC for a CLIC-vectored (SHV) interrupt: set
/// `xcause.inhv`, read the vector-table word at `xtvt + 4*id`, mask the
/// low bit, clear `inhv`. A fault reading the table is reported back to
/// the caller as a secondary exception rather than a handler PC.
pub fn fetch_shv_handler(
    csrs: &mut CsrFile,
    target: Privilege,
    id: u16,
    host: &mut impl HostRuntime,
) -> ShvFetchResult {
    csrs.mode_mut(target).cause_inhv = true;
    let addr = csrs.mode(target).tvt as u64 + 4 * id as u64;
    let result = match host.read4(addr) {
        Some(word) => ShvFetchResult::Handler((word & !1) as u64),
        None => ShvFetchResult::SecondaryException(crate::privilege::Exception::LoadAccessFault),
    };
    csrs.mode_mut(target).cause_inhv = false;
    result
}

/// Deliver a trap: the full sequence from delegation through
/// redirecting the PC.
///
/// `shv_handler` must already have been resolved by the caller via
/// [`fetch_shv_handler`] when `request.trap` is a CLIC SHV interrupt,
/// since that fetch can itself raise a secondary exception that needs
/// to re-enter this function instead.
pub fn take_trap(
    csrs: &mut CsrFile,
    current_mode: &mut Privilege,
    config: &Config,
    clic: Option<&Clic>,
    clic_candidate: Option<ClicCandidate>,
    request: TrapRequest,
    shv_handler: Option<u64>,
    host: &mut impl HostRuntime,
) -> Result<TrapOutcome, InvariantError> {
    let has_s = config.arch.contains(crate::config::Isa::S);
    let has_u = config.arch.contains(crate::config::Isa::U);

    let target = resolve_trap_target(&request, csrs, has_s, has_u)?;

    let is_interrupt = request.trap.is_interrupt();
    let mut ecode = request.trap.ecode();
    if is_interrupt && matches!(request.trap, Trap::BasicInterrupt(i) if i.is_external()) {
        if let Some(id) = request.external_id_override {
            ecode = id;
        }
    }

    // Step 8: delivered level. CLIC interrupts carry pendEnab.level;
    // cross-mode exceptions deliver level 0; same-mode exceptions
    // leave mintstatus.{x}il untouched (None).
    let level = if is_interrupt && request.pend_enab.is_clic {
        Some(request.pend_enab.level)
    } else if !is_interrupt && target != request.current_mode {
        Some(0)
    } else {
        None
    };

    let tval = if config.tval_zero { 0 } else { request.tval };

    let clic_mode_active = clic.is_some() && csrs.tvec_mode(target, None) == TvecMode::Clic;
    // Snapshot mintstatus.{x}il into xcause.pil before it is overwritten
    // by the new delivered level below.
    let previous_level = csrs.il(target);

    {
        let mode = csrs.mode_mut(target);
        if !clic_mode_active {
            mode.cause_inhv = false;
        }
        mode.cause_code = ecode;
        mode.cause_interrupt = is_interrupt;
        mode.cause_pil = previous_level;
        mode.epc = (request.epc as u64 & writable_epc_mask(config)) as u32;
        mode.tval = tval;
    }

    if let Some(level) = level {
        csrs.set_il(target, level);
    }

    let tvec_mode = csrs.tvec_mode(target, None);
    let base = csrs.mode(target).tvec_base as u64;

    let handler_pc = match (is_interrupt, tvec_mode) {
        (false, _) => base,
        (true, TvecMode::Vectored) => base + 4 * ecode as u64,
        (true, TvecMode::Clic) => {
            let candidate = clic_candidate;
            match candidate {
                Some(c) if c.shv => shv_handler.unwrap_or(base & !0x3f),
                _ => base & !0x3f,
            }
        }
        (true, TvecMode::Direct) => base,
    };

    // Step 10: xPIE <- xIE, xIE <- 0.
    let old_ie = csrs.ie(target);
    csrs.set_pie(target, old_ie);
    csrs.set_ie(target, false);

    match target {
        Privilege::Machine => csrs.set_mpp(*current_mode),
        Privilege::Supervisor => csrs.set_spp(*current_mode),
        Privilege::User => {}
    }

    *current_mode = target;
    host.set_pc_exception(handler_pc);

    Ok(TrapOutcome { handler_pc, target })
}

/// Deliver a non-maskable interrupt. Distinct from
/// `take_trap`: no delegation, no `mstatus`/`mideleg` interaction, no
/// vectoring. Always targets M-mode with a fixed cause code.
pub fn take_nmi(csrs: &mut CsrFile, current_mode: &mut Privilege, config: &Config, host: &mut impl HostRuntime) {
    host.restart();
    *current_mode = Privilege::Machine;
    csrs.m.cause_code = config.ecode_nmi as u16;
    csrs.m.cause_interrupt = true;
    csrs.m.epc = host.get_pc() as u32;
    host.set_pc(config.nmi_address);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::{BasicInterrupt, Exception};

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

    #[test]
    fn machine_timer_interrupt_from_user_direct_mode() {
        let mut csrs = CsrFile::default();
        csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 0, false);
        let config = Config::default();
        let mut mode = Privilege::User;
        let mut host = FakeHost { pc: 0x1000 };

        let request = TrapRequest {
            trap: Trap::BasicInterrupt(BasicInterrupt::MachineTimer),
            epc: 0x1000,
            tval: 0,
            pend_enab: PendEnab::NONE,
            current_mode: Privilege::User,
            external_id_override: None,
        };

        let outcome = take_trap(&mut csrs, &mut mode, &config, None, None, request, None, &mut host).unwrap();
        assert_eq!(outcome.target, Privilege::Machine);
        assert_eq!(outcome.handler_pc, 0x8000_0000);
        assert_eq!(mode, Privilege::Machine);
        assert_eq!(csrs.mpp(), Privilege::User.bits());
        assert_eq!(csrs.m.cause_code, BasicInterrupt::MachineTimer.code());
        assert!(csrs.m.cause_interrupt);
    }

    #[test]
    fn vectored_interrupt_adds_four_times_ecode() {
        let mut csrs = CsrFile::default();
        csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 1, false);
        let config = Config::default();
        let mut mode = Privilege::Machine;
        let mut host = FakeHost { pc: 0x1000 };

        let request = TrapRequest {
            trap: Trap::BasicInterrupt(BasicInterrupt::MachineTimer),
            epc: 0x1000,
            tval: 0,
            pend_enab: PendEnab::NONE,
            current_mode: Privilege::Machine,
            external_id_override: None,
        };

        let outcome = take_trap(&mut csrs, &mut mode, &config, None, None, request, None, &mut host).unwrap();
        assert_eq!(outcome.handler_pc, 0x8000_0000 + 4 * BasicInterrupt::MachineTimer.code() as u64);
    }

    #[test]
    fn synchronous_exception_uses_direct_base_regardless_of_mode() {
        let mut csrs = CsrFile::default();
        csrs.write_tvec(Privilege::Machine, 0x8000_0000 >> 2, 1, false);
        let config = Config::default();
        let mut mode = Privilege::Machine;
        let mut host = FakeHost { pc: 0x1000 };

        let request = TrapRequest {
            trap: Trap::Exception(Exception::IllegalInstruction),
            epc: 0x1000,
            tval: 0,
            pend_enab: PendEnab::NONE,
            current_mode: Privilege::Machine,
            external_id_override: None,
        };

        let outcome = take_trap(&mut csrs, &mut mode, &config, None, None, request, None, &mut host).unwrap();
        assert_eq!(outcome.handler_pc, 0x8000_0000);
    }
}

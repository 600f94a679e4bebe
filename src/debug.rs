//! Debug Controller (component G)
//!
//! Debug-Mode entry (halt request, `ebreak`, single-step, reset-halt
//! request) and exit via `dret`, re-expressed in the trap engine's
//! idiom rather than translated line-for-line from any reference model.

use crate::config::{Config, DebugMode};
use crate::csr::CsrFile;
use crate::error::InvariantError;
use crate::host::HostRuntime;
use crate::privilege::{Exception, Privilege, PrivilegedVersion};
use crate::xret::do_eret_common;

/// `dcsr.cause` encodings (External Debug Support spec table 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCause {
    Ebreak = 1,
    Trigger = 2,
    Haltreq = 3,
    Step = 4,
    Resethaltreq = 5,
}

/// Enter Debug-Mode: save `dcsr.prv`/`dcsr.cause`, latch
/// `dpc = epc`, switch to M-mode, and redirect the PC according to the
/// configured [`DebugMode`] entry mechanism. `nested` is true when this
/// entry interrupts a trap already being taken for a prior exception
/// (dispatches to `dexc_address` rather than `debug_address` under
/// `Vector` mode).
pub fn enter_debug_mode(
    csrs: &mut CsrFile,
    current_mode: &mut Privilege,
    in_debug_mode: &mut bool,
    config: &Config,
    cause: DebugCause,
    epc: u64,
    nested: bool,
    host: &mut impl HostRuntime,
) {
    csrs.dcsr.prv = current_mode.bits();
    csrs.dcsr.cause = cause as u8;
    csrs.dpc = epc as u32;
    *current_mode = Privilege::Machine;
    *in_debug_mode = true;

    let target_pc = match config.debug_mode {
        DebugMode::None => epc,
        DebugMode::Interrupt => config.debug_address,
        DebugMode::Vector => {
            if nested {
                config.dexc_address
            } else {
                config.debug_address
            }
        }
        DebugMode::Halt => config.debug_address,
    };
    host.set_pc(target_pc);
    if matches!(config.debug_mode, DebugMode::Halt) {
        host.halt();
    }
}

/// Leave Debug-Mode via `dret`: restore the saved
/// privilege mode, clear MPRV on priv-spec >= 1.12 when leaving M for a
/// non-M mode, and jump to `dpc` through the same common return path
/// `mret`/`sret`/`uret` use.
pub fn leave_debug_mode(
    csrs: &mut CsrFile,
    current_mode: &mut Privilege,
    in_debug_mode: &mut bool,
    config: &Config,
    host: &mut impl HostRuntime,
) -> Result<(), InvariantError> {
    if !*in_debug_mode {
        return Err(InvariantError::TrapInDebugMode);
    }
    let new_mode = Privilege::from_bits(csrs.dcsr.prv).unwrap_or(Privilege::Machine);
    if config.priv_version >= PrivilegedVersion::V1_12 && *current_mode == Privilege::Machine && new_mode != Privilege::Machine {
        csrs.clear_mprv();
    }
    *in_debug_mode = false;
    let dpc = csrs.dpc as u64;
    do_eret_common(current_mode, config, new_mode, dpc, host);
    Ok(())
}

/// Whether `dret` was executed outside Debug-Mode, which is an illegal
/// instruction rather than a valid return.
pub fn dret_outside_debug_mode_is_illegal(in_debug_mode: bool) -> Option<Exception> {
    if in_debug_mode {
        None
    } else {
        Some(Exception::IllegalInstruction)
    }
}

/// Result of executing `ebreak`: either Debug-Mode entry (when the
/// current mode's `dcsr.ebreak{u,s,m}` bit is set) or an ordinary
/// `Breakpoint` exception.
pub enum EbreakOutcome {
    EnterDebugMode,
    Breakpoint { tval: u32 },
}

/// Classify an `ebreak` (original `riscvEBREAK`): the
/// per-mode `dcsr.ebreak{u,s,m}` bit routes to Debug-Mode entry instead
/// of a normal trap. `tval` is the faulting PC pre-1.12 and zero from
/// 1.12 onward.
pub fn classify_ebreak(csrs: &CsrFile, current_mode: Privilege, config: &Config, pc: u64) -> EbreakOutcome {
    let ebreak_bit = match current_mode {
        Privilege::Machine => csrs.dcsr.ebreakm,
        Privilege::Supervisor => csrs.dcsr.ebreaks,
        Privilege::User => csrs.dcsr.ebreaku,
    };
    if ebreak_bit {
        EbreakOutcome::EnterDebugMode
    } else {
        let tval = if config.priv_version < PrivilegedVersion::V1_12 {
            pc as u32
        } else {
            0
        };
        EbreakOutcome::Breakpoint { tval }
    }
}

/// Whether single-step (`dcsr.step`) should trigger Debug-Mode entry
/// after the instruction just retired, unless that instruction was
/// itself a trap into Debug-Mode already.
pub fn step_should_enter_debug_mode(csrs: &CsrFile, in_debug_mode: bool) -> bool {
    csrs.dcsr.step && !in_debug_mode
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeHost {
        pc: u64,
        halted: bool,
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
            None
        }
        fn read8(&mut self, _addr: u64) -> Option<u64> {
            None
        }
        fn halt(&mut self) {
            self.halted = true;
        }
        fn restart(&mut self) {}
        fn do_synchronous_interrupt(&mut self) {}
        fn abort_repeat(&mut self) {}
        fn model_timer(&mut self) {}
        fn smp_iter(&self) -> std::ops::Range<usize> {
            0..1
        }
    }

    #[test]
    fn halt_request_enters_debug_mode_and_halts() {
        let mut csrs = CsrFile::default();
        let mut config = Config::default();
        config.debug_mode = DebugMode::Halt;
        config.debug_address = 0x7000_0000;
        let mut mode = Privilege::Supervisor;
        let mut in_dm = false;
        let mut host = FakeHost { pc: 0x100, halted: false };

        enter_debug_mode(&mut csrs, &mut mode, &mut in_dm, &config, DebugCause::Haltreq, 0x100, false, &mut host);

        assert!(in_dm);
        assert_eq!(mode, Privilege::Machine);
        assert_eq!(csrs.dcsr.prv, Privilege::Supervisor.bits());
        assert_eq!(csrs.dpc, 0x100);
        assert_eq!(host.pc, 0x7000_0000);
        assert!(host.halted);
    }

    #[test]
    fn dret_outside_debug_mode_is_illegal_instruction() {
        assert_eq!(dret_outside_debug_mode_is_illegal(false), Some(Exception::IllegalInstruction));
        assert_eq!(dret_outside_debug_mode_is_illegal(true), None);
    }

    #[test]
    fn leave_debug_mode_restores_saved_mode() {
        let mut csrs = CsrFile::default();
        csrs.dcsr.prv = Privilege::User.bits();
        csrs.dpc = 0x200;
        let config = Config::default();
        let mut mode = Privilege::Machine;
        let mut in_dm = true;
        let mut host = FakeHost { pc: 0, halted: false };

        leave_debug_mode(&mut csrs, &mut mode, &mut in_dm, &config, &mut host).unwrap();
        assert_eq!(mode, Privilege::User);
        assert!(!in_dm);
        assert_eq!(host.pc, 0x200);
    }
}

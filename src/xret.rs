//! Return engine
//!
//! `mret`/`sret`/`uret`/`dret` share almost all of their logic; only
//! the mode they return *from*, and whether they restore `dcsr`
//! instead of `mstatus`, differ. A single shared tail generalised to
//! all three modes plus the Debug-Mode exit variant.

use crate::clic::Clic;
use crate::config::Config;
use crate::csr::CsrFile;
use crate::host::HostRuntime;
use crate::privilege::Privilege;

/// Which instruction is returning; `dret` is handled by
/// `debug.rs::leave_debug_mode`, which calls [`do_eret_common`]
/// directly rather than going through [`take_xret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnFrom {
    Mret,
    Sret,
    Uret,
}

impl ReturnFrom {
    fn mode(self) -> Privilege {
        match self {
            ReturnFrom::Mret => Privilege::Machine,
            ReturnFrom::Sret => Privilege::Supervisor,
            ReturnFrom::Uret => Privilege::User,
        }
    }
}

/// Whether `mstatus.MPRV` should be cleared when leaving `from` for
/// `to`: only on priv-spec >= 1.12, and only when
/// M-mode is being left for a non-M mode.
fn clear_mprv_applies(config: &Config, from: Privilege, to: Privilege) -> bool {
    config.priv_version >= crate::privilege::PrivilegedVersion::V1_12 && from == Privilege::Machine && to != Privilege::Machine
}

/// Shared tail of every return instruction:
/// switch to the new mode, jump to `epc` (clearing the low two bits
/// when the C extension is absent), clear the reservation if
/// configured to do so, notify observers, and re-arbitrate.
pub fn do_eret_common(
    current_mode: &mut Privilege,
    config: &Config,
    new_mode: Privilege,
    epc: u64,
    host: &mut impl HostRuntime,
) {
    let mask: u64 = if config.arch.contains(crate::config::Isa::C) { !0b1 } else { !0b11 };
    *current_mode = new_mode;
    host.set_pc(epc & mask);
    host.do_synchronous_interrupt();
}

/// Perform `mret`/`sret`/`uret`.
pub fn take_xret(
    csrs: &mut CsrFile,
    current_mode: &mut Privilege,
    config: &Config,
    clic: Option<&Clic>,
    which: ReturnFrom,
    host: &mut impl HostRuntime,
) {
    let from = which.mode();
    let epc = csrs.mode(from).epc as u64;

    let clic_mode_active = clic.is_some() && csrs.tvec_mode(from, None) == crate::csr::TvecMode::Clic;
    if clic_mode_active {
        let pil = csrs.mode(from).cause_pil;
        csrs.set_il(from, pil);
    }

    let pie = csrs.pie(from);
    csrs.set_ie(from, pie);
    csrs.set_pie(from, true);

    let lowest_implemented = if config.arch.contains(crate::config::Isa::U) {
        Privilege::User
    } else if config.arch.contains(crate::config::Isa::S) {
        Privilege::Supervisor
    } else {
        Privilege::Machine
    };

    // Read the mode the trap came from before xPP is reset below.
    let new_mode = match which {
        ReturnFrom::Mret => Privilege::or_lowest_implemented(csrs.mpp(), lowest_implemented),
        ReturnFrom::Sret => Privilege::or_lowest_implemented(csrs.spp(), lowest_implemented),
        ReturnFrom::Uret => Privilege::User,
    };

    match which {
        ReturnFrom::Mret => csrs.set_mpp(lowest_implemented),
        ReturnFrom::Sret => csrs.set_spp(lowest_implemented),
        ReturnFrom::Uret => {}
    }

    if clear_mprv_applies(config, from, new_mode) {
        csrs.clear_mprv();
    }

    do_eret_common(current_mode, config, new_mode, epc, host);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeHost {
        pc: u64,
        synced: bool,
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
        fn halt(&mut self) {}
        fn restart(&mut self) {}
        fn do_synchronous_interrupt(&mut self) {
            self.synced = true;
        }
        fn abort_repeat(&mut self) {}
        fn model_timer(&mut self) {}
        fn smp_iter(&self) -> std::ops::Range<usize> {
            0..1
        }
    }

    #[test]
    fn mret_restores_mie_and_clears_mprv_on_1_12() {
        let mut csrs = CsrFile::default();
        csrs.set_pie(Privilege::Machine, true);
        csrs.set_mpp(Privilege::User);
        csrs.m.epc = 0x2000;
        csrs.set_ie(Privilege::Machine, false);
        csrs.set_mprv(true);

        let mut config = Config::default();
        config.priv_version = crate::privilege::PrivilegedVersion::V1_12;
        config.arch = crate::config::Isa::S | crate::config::Isa::U;
        let mut mode = Privilege::Machine;
        let mut host = FakeHost { pc: 0, synced: false };

        take_xret(&mut csrs, &mut mode, &config, None, ReturnFrom::Mret, &mut host);

        assert_eq!(mode, Privilege::User);
        assert_eq!(host.pc, 0x2000);
        assert!(csrs.ie(Privilege::Machine));
        assert!(csrs.pie(Privilege::Machine));
        assert!(!csrs.mprv());
        assert!(host.synced);
    }

    #[test]
    fn uret_always_targets_user_mode() {
        let mut csrs = CsrFile::default();
        csrs.u.epc = 0x3000;
        let config = Config::default();
        let mut mode = Privilege::User;
        let mut host = FakeHost { pc: 0, synced: false };

        take_xret(&mut csrs, &mut mode, &config, None, ReturnFrom::Uret, &mut host);
        assert_eq!(mode, Privilege::User);
        assert_eq!(host.pc, 0x3000);
    }
}

//! Basic interrupt arbiter (component D)
//!
//! Selects the highest-priority basic-mode interrupt that is both
//! pending (`mip`) and enabled (`mie`), delegated to its destination
//! mode, and unmasked by that mode's global interrupt-enable bit.
//! Mirrors the original model's `refreshPendingAndEnabledBasic`: masked
//! by per-mode delegation, selected by destination privilege first and
//! [`BasicInterrupt::fixed_priority`] second.

use crate::csr::CsrFile;
use crate::pending::PendingSources;
use crate::privilege::{BasicInterrupt, Privilege};

/// The result of arbitrating among basic-mode interrupts: the winning
/// source plus the privilege mode it should be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicCandidate {
    pub interrupt: BasicInterrupt,
    pub target: Privilege,
}

const ALL_BASIC: [BasicInterrupt; 9] = [
    BasicInterrupt::UserSoftware,
    BasicInterrupt::SupervisorSoftware,
    BasicInterrupt::MachineSoftware,
    BasicInterrupt::UserTimer,
    BasicInterrupt::SupervisorTimer,
    BasicInterrupt::MachineTimer,
    BasicInterrupt::UserExternal,
    BasicInterrupt::SupervisorExternal,
    BasicInterrupt::MachineExternal,
];

/// Resolve a trap's destination mode from a pair of delegation
/// registers (`{m,s}ideleg` for interrupts, `{m,s}edeleg` for
/// exceptions): delegated to S only if the M-level bit is set and S is
/// implemented, delegated further to U only if the S-level bit is also
/// set and U is implemented. A trap never lowers privilege below this
/// resolved target; callers combine this with
/// the trap's originating mode themselves.
pub fn resolve_target(code: u16, deleg_m: u32, deleg_s: u32, has_s: bool, has_u: bool) -> Privilege {
    let m_deleg = deleg_m & (1 << code) != 0;
    if !m_deleg || !has_s {
        return Privilege::Machine;
    }
    let s_deleg = has_u && deleg_s & (1 << code) != 0;
    if !s_deleg {
        return Privilege::Supervisor;
    }
    Privilege::User
}

fn target_mode(interrupt: BasicInterrupt, csrs: &CsrFile, has_s: bool, has_u: bool) -> Privilege {
    resolve_target(interrupt.code(), csrs.mideleg, csrs.sideleg, has_s, has_u)
}

/// Whether global interrupts are enabled in `target`, as observed from
/// `current` (privileged spec §3.1.6.1): enabled unconditionally if
/// `target` is above `current`, disabled unconditionally if below, and
/// gated on `mstatus.xIE` only when `target == current`.
fn globally_enabled(target: Privilege, current: Privilege, csrs: &CsrFile) -> bool {
    if target > current {
        true
    } else if target < current {
        false
    } else {
        csrs.ie(target)
    }
}

/// Run the basic arbiter: among all pending-and-enabled basic
/// interrupts, return the one delegated to the highest privilege mode,
/// breaking ties by [`BasicInterrupt::fixed_priority`].
pub fn refresh_pending_and_enabled_basic(
    csrs: &CsrFile,
    pending: &PendingSources,
    current_mode: Privilege,
    has_s: bool,
    has_u: bool,
) -> Option<BasicCandidate> {
    let mip = pending.mip();
    let mie = csrs.mie;
    let mut best: Option<BasicCandidate> = None;

    for &interrupt in ALL_BASIC.iter() {
        let code = interrupt.code();
        if mip & (1 << code) == 0 || mie & (1 << code) == 0 {
            continue;
        }
        if matches!(interrupt, BasicInterrupt::SupervisorSoftware | BasicInterrupt::SupervisorTimer | BasicInterrupt::SupervisorExternal) && !has_s {
            continue;
        }
        if matches!(interrupt, BasicInterrupt::UserSoftware | BasicInterrupt::UserTimer | BasicInterrupt::UserExternal) && !has_u {
            continue;
        }

        let target = target_mode(interrupt, csrs, has_s, has_u);
        if !globally_enabled(target, current_mode, csrs) {
            continue;
        }

        let candidate = BasicCandidate { interrupt, target };
        best = Some(match best {
            None => candidate,
            Some(current_best) => {
                if target > current_best.target {
                    candidate
                } else if target < current_best.target {
                    current_best
                } else if interrupt.fixed_priority() > current_best.interrupt.fixed_priority() {
                    candidate
                } else {
                    current_best
                }
            }
        });
    }

    best
}

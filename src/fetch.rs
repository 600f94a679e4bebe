//! Fetch Gate (component H)
//!
//! Consulted before every instruction fetch; decides whether to let
//! the fetch proceed or to divert into Debug-Mode entry or trap
//! delivery. Priority order is fixed (`riscvIFetchExcept`): a latched
//! reset-halt-request outranks a live
//! halt request, which outranks a pending-and-enabled trap, which
//! outranks a fetch-address validation failure.

use crate::privilege::Exception;
use crate::trap::PendEnab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    Allow,
    EnterDebugModeResethaltreq,
    EnterDebugModeHaltreq,
    Trap(PendEnab),
    AddressException(Exception),
}

/// Inputs to the priority-ordered fetch check (`riscvIFetchExcept`).
pub struct FetchInputs {
    /// Sampled at reset; cleared once acted on.
    pub resethaltreq_sampled: bool,
    pub haltreq: bool,
    pub in_debug_mode: bool,
    pub defer_interrupt: bool,
    pub pend_enab: PendEnab,
    pub fetch_address_valid: bool,
}

/// Evaluate the fetch gate for the current cycle.
pub fn check_fetch(inputs: &FetchInputs) -> FetchDecision {
    if inputs.resethaltreq_sampled {
        return FetchDecision::EnterDebugModeResethaltreq;
    }
    if inputs.haltreq && !inputs.in_debug_mode {
        return FetchDecision::EnterDebugModeHaltreq;
    }
    if inputs.pend_enab.id.is_some() && !inputs.in_debug_mode && !inputs.defer_interrupt {
        return FetchDecision::Trap(inputs.pend_enab);
    }
    if !inputs.fetch_address_valid {
        return FetchDecision::AddressException(Exception::InstructionAccessFault);
    }
    FetchDecision::Allow
}

/// Whether a hart parked in `wfi` should keep halting fetch (the
/// original's idle-loop optimisation). A
/// hart in `wfi` resumes fetch as soon as any `mip` bit becomes set,
/// irrespective of `mie`/`mstatus` masking — those are only consulted
/// once fetch actually resumes and the trap engine re-arbitrates.
pub fn wfi_should_halt(mip: u32) -> bool {
    mip == 0
}

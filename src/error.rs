//! Error types
//!
//! Architectural exceptions are not errors: they are values delivered
//! through the trap engine and never escape as a `Result`. The errors
//! in this module are programming errors, bad configuration or a
//! misuse of the CLIC MMIO/CSR surface by the host, which should abort
//! with a diagnostic rather than be silently tolerated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reset_address 0x{0:x} is not aligned to a 4-byte boundary")]
    ResetAddressMisaligned(u64),
    #[error("CLICINTCTLBITS must be in 0..=8, got {0}")]
    ClicIntCtlBitsOutOfRange(u8),
    #[error("CLICCFGMBITS must be in 0..=2, got {0}")]
    ClicCfgMBitsOutOfRange(u8),
    #[error("local_int_num {0} exceeds the maximum of 4096-16 local interrupts")]
    TooManyLocalInterrupts(u32),
}

#[derive(Debug, Error)]
pub enum ClicError {
    #[error("CLIC hart index {index} out of range (cluster has {num_harts} harts)")]
    HartIndexOutOfRange { index: usize, num_harts: usize },
    #[error("CLIC interrupt index {0} out of range for this configuration")]
    InterruptIndexOutOfRange(u32),
    #[error("CLIC page type {0} is not a valid interrupt page")]
    IllegalPageType(u32),
}

#[derive(Debug, Error)]
pub enum CsrError {
    #[error("CSR 0x{0:x} does not exist (illegal instruction)")]
    NonExistentCsr(u16),
    #[error("attempted write to read-only CSR 0x{0:x} (illegal instruction)")]
    ReadOnlyCsr(u16),
    #[error("CSR 0x{0:x} requires higher privilege (illegal instruction)")]
    PrivilegedCsr(u16),
}

/// Failure of an internal invariant. Any of these firing indicates a
/// bug in the core or in the host's use of it; fatal rather than
/// recoverable.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("pendEnab.id should be NONE but was {0}")]
    PendEnabNotCleared(u16),
    #[error("trap delivered while in Debug-Mode")]
    TrapInDebugMode,
    #[error("CLIC interrupt {index} mode {mode:?} exceeds page mode {page_mode:?}")]
    ClicModeAboveBoundary {
        index: u32,
        mode: crate::privilege::Privilege,
        page_mode: crate::privilege::Privilege,
    },
}

//! Persisted state
//!
//! An opaque snapshot of everything save/restore needs: `ip[]`,
//! net-input latches, the basic-interrupt CSR trace, and the CLIC's
//! `cliccfg` plus per-hart `intState[]`. Serialization format is out
//! of scope here; this module only owns the in-memory shape and
//! the restore-time re-derivation step the original does by hand
//! (`refreshCLICIPE` + `test_interrupt`).

use crate::clic::{Clic, ClicCfg};
use crate::csr::CsrFile;
use crate::pending::PendingSources;
use crate::privilege::Privilege;

/// Net-input latches that are not otherwise captured by CSR state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetLatches {
    pub reset: bool,
    pub nmi: bool,
    pub haltreq: bool,
    pub resethaltreq: bool,
    pub defer_interrupt: bool,
}

/// A single hart's persisted state.
#[derive(Debug, Clone)]
pub struct HartSnapshot {
    pub csrs: CsrFile,
    pub pending: PendingSources,
    pub current_mode: Privilege,
    pub in_debug_mode: bool,
    pub net_latches: NetLatches,
}

/// The cluster-wide persisted blob: one [`HartSnapshot`] per hart plus
/// the CLIC state shared at the cluster root.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub harts: Vec<HartSnapshot>,
    pub clic_cfg: ClicCfg,
    pub clic: Clic,
}

/// Marker returned by [`restore`] telling the caller (`hart.rs`) which
/// harts need `test_interrupt` re-run, since this module does not
/// itself hold a `HostRuntime` to notify through.
pub struct RestoreOutcome {
    pub harts_needing_rearbitration: Vec<usize>,
}

/// Restore a cluster snapshot: re-derive the CLIC's `ipe[]` bitmap from
/// `intState[]` (it is not itself persisted), then report every hart
/// index back so the caller re-runs arbitration.
pub fn restore(mut snapshot: ClusterSnapshot) -> (ClusterSnapshot, RestoreOutcome) {
    snapshot.clic.refresh_ipe_all();
    let harts_needing_rearbitration = (0..snapshot.harts.len()).collect();
    (snapshot, RestoreOutcome { harts_needing_rearbitration })
}

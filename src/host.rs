//! Host collaborator interfaces
//!
//! Instruction fetch/decode, memory access, the simulator's timer
//! model, and the exception-info surface exposed to whatever drives
//! this core: all referenced by contract only, through a small
//! capability trait the hart is generic over rather than a concrete
//! dependency.

use crate::privilege::{Exception, Privilege};

/// The capability set the trap core needs from its host simulator
/// (global-ish simulator primitives this core never implements itself).
///
/// None of these methods are invoked speculatively: every call site in
/// this crate corresponds to exactly one step of the trap/return/debug
/// algorithms.
pub trait HostRuntime {
    fn get_pc(&self) -> u64;
    fn set_pc(&mut self, pc: u64);
    /// Redirect the PC as part of exception delivery specifically,
    /// distinct from an ordinary jump (the host may want to log or
    /// trace these differently).
    fn set_pc_exception(&mut self, pc: u64);

    /// Read a 4-byte little-endian word (used for CLIC non-SHV/SHV
    /// vector-table fetches).
    fn read4(&mut self, addr: u64) -> Option<u32>;
    fn read8(&mut self, addr: u64) -> Option<u64>;

    fn halt(&mut self);
    fn restart(&mut self);

    /// Request that the host immediately service a synchronous
    /// interrupt notification (used by the halt-request net-input
    /// path).
    fn do_synchronous_interrupt(&mut self);

    /// Abort a repeated/in-flight instruction (Debug-Mode entry mid
    /// fault-only-first vector instruction).
    fn abort_repeat(&mut self);

    /// Advance whatever timer model backs `mtime`/`mtimecmp`; the trap
    /// core never reads timer registers directly, only the `mip.MTIP`
    /// line the host derives from them.
    fn model_timer(&mut self);

    /// Iterate hart indices in the cluster, for operations (like a
    /// `cliccfg` write) that must re-arbitrate on every hart.
    fn smp_iter(&self) -> std::ops::Range<usize>;
}

/// One row of the static exception catalog: name, numeric code, and
/// a short description, gated by
/// configured architecture extensions.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionInfo {
    pub exception: Exception,
    pub name: &'static str,
    pub description: &'static str,
    /// Extension this row requires to be present; `None` means always
    /// present so long as the owning privilege mode is implemented.
    pub requires: Option<crate::config::Isa>,
    /// Privilege mode that must be implemented for this row to appear.
    pub requires_mode: Option<Privilege>,
}

const EXCEPTION_TABLE: &[ExceptionInfo] = &[
    ExceptionInfo {
        exception: Exception::InstructionAddressMisaligned,
        name: "Instruction address misaligned",
        description: "fetch address was not aligned to an instruction boundary",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::InstructionAccessFault,
        name: "Instruction access fault",
        description: "fetch address failed the physical memory attribute check",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::IllegalInstruction,
        name: "Illegal instruction",
        description: "decode failed or the instruction is not permitted in the current mode",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::Breakpoint,
        name: "Breakpoint",
        description: "ebreak, or a matched trigger, outside Debug-Mode",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::LoadAddressMisaligned,
        name: "Load address misaligned",
        description: "load address was not naturally aligned",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::LoadAccessFault,
        name: "Load access fault",
        description: "load address failed the physical memory attribute check",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::StoreAmoAddressMisaligned,
        name: "Store/AMO address misaligned",
        description: "store or AMO address was not naturally aligned",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::StoreAmoAccessFault,
        name: "Store/AMO access fault",
        description: "store or AMO address failed the physical memory attribute check",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::EnvironmentCallFromUMode,
        name: "Environment call from U-mode",
        description: "ecall executed in User mode",
        requires: None,
        requires_mode: Some(Privilege::User),
    },
    ExceptionInfo {
        exception: Exception::EnvironmentCallFromSMode,
        name: "Environment call from S-mode",
        description: "ecall executed in Supervisor mode",
        requires: None,
        requires_mode: Some(Privilege::Supervisor),
    },
    ExceptionInfo {
        exception: Exception::EnvironmentCallFromMMode,
        name: "Environment call from M-mode",
        description: "ecall executed in Machine mode",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::InstructionPageFault,
        name: "Instruction page fault",
        description: "paged translation of the fetch address failed",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::LoadPageFault,
        name: "Load page fault",
        description: "paged translation of a load address failed",
        requires: None,
        requires_mode: None,
    },
    ExceptionInfo {
        exception: Exception::StoreAmoPageFault,
        name: "Store/AMO page fault",
        description: "paged translation of a store or AMO address failed",
        requires: None,
        requires_mode: None,
    },
];

/// The catalog of exceptions the host simulator can display or filter
/// on, derived once from the configured architecture.
#[derive(Debug, Clone)]
pub struct ExceptionCatalog {
    rows: Vec<ExceptionInfo>,
}

impl ExceptionCatalog {
    /// Build the catalog for a given architecture, filtering rows whose
    /// required mode isn't implemented and applying `unimp_int_mask`
    /// to the local-interrupt range this catalog otherwise doesn't
    /// enumerate directly (local interrupts are reported by the CLIC
    /// surface, not this table).
    pub fn for_config(config: &crate::config::Config) -> Self {
        let has_s = config.arch.contains(crate::config::Isa::S);
        let has_u = config.arch.contains(crate::config::Isa::U);
        let rows = EXCEPTION_TABLE
            .iter()
            .copied()
            .filter(|row| match row.requires_mode {
                Some(Privilege::Supervisor) => has_s,
                Some(Privilege::User) => has_u,
                _ => true,
            })
            .collect();
        ExceptionCatalog { rows }
    }

    pub fn rows(&self) -> &[ExceptionInfo] {
        &self.rows
    }

    pub fn lookup(&self, exception: Exception) -> Option<&ExceptionInfo> {
        self.rows.iter().find(|row| row.exception == exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn catalog_drops_supervisor_ecall_without_s_mode() {
        let mut config = Config::default();
        config.arch.remove(crate::config::Isa::S);
        let catalog = ExceptionCatalog::for_config(&config);
        assert!(catalog.lookup(Exception::EnvironmentCallFromSMode).is_none());
        assert!(catalog.lookup(Exception::EnvironmentCallFromMMode).is_some());
    }
}

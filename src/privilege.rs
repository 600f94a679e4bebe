//! Privilege modes and trap-cause encoding
//!
//! References to the privileged spec refer to version 20211203 unless
//! otherwise noted. See chapter 1.2 for the privilege levels and
//! section 3.1.15 for `mcause` encoding.

/// RISC-V privilege level.
///
/// The numeric encoding matches the 2-bit field used in `mstatus.MPP`
/// and `dcsr.prv` (privileged spec table 1.1): U=0, S=1, M=3. Level 2
/// is reserved for Hypervisor mode, which this core never targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Privilege {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

impl Privilege {
    /// Decode the 2-bit `mstatus.MPP`/`dcsr.prv` encoding.
    ///
    /// Value `2` (Hypervisor) is not implemented by this core; callers
    /// that read it back from a CSR should already have normalised it
    /// via [`Privilege::or_lowest_implemented`].
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0 => Some(Privilege::User),
            1 => Some(Privilege::Supervisor),
            3 => Some(Privilege::Machine),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// `mstatus.MPP/SPP` and `dcsr.prv` must
    /// always hold a mode implemented by the hart. When the decoded
    /// mode is unsupported, the lowest implemented mode is substituted.
    pub fn or_lowest_implemented(bits: u8, lowest_implemented: Privilege) -> Self {
        Self::from_bits(bits).unwrap_or(lowest_implemented)
    }
}

/// Synchronous exception causes (privileged spec table 3.6, non-interrupt rows).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Exception {
    InstructionAddressMisaligned,
    InstructionAccessFault,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreAmoAddressMisaligned,
    StoreAmoAccessFault,
    EnvironmentCallFromUMode,
    EnvironmentCallFromSMode,
    EnvironmentCallFromMMode,
    InstructionPageFault,
    LoadPageFault,
    StoreAmoPageFault,
}

impl Exception {
    /// The `mcause.ExceptionCode` value (table 3.6).
    pub fn code(self) -> u16 {
        match self {
            Exception::InstructionAddressMisaligned => 0,
            Exception::InstructionAccessFault => 1,
            Exception::IllegalInstruction => 2,
            Exception::Breakpoint => 3,
            Exception::LoadAddressMisaligned => 4,
            Exception::LoadAccessFault => 5,
            Exception::StoreAmoAddressMisaligned => 6,
            Exception::StoreAmoAccessFault => 7,
            Exception::EnvironmentCallFromUMode => 8,
            Exception::EnvironmentCallFromSMode => 9,
            Exception::EnvironmentCallFromMMode => 11,
            Exception::InstructionPageFault => 12,
            Exception::LoadPageFault => 13,
            Exception::StoreAmoPageFault => 15,
        }
    }

    /// ECALL exception for the given current privilege mode.
    pub fn ecall_from(mode: Privilege) -> Self {
        match mode {
            Privilege::User => Exception::EnvironmentCallFromUMode,
            Privilege::Supervisor => Exception::EnvironmentCallFromSMode,
            Privilege::Machine => Exception::EnvironmentCallFromMMode,
        }
    }

    /// Exceptions that latch `AFErrorOut` from the in-flight access
    /// classification (instruction/load/store access faults).
    pub fn is_access_fault(self) -> bool {
        matches!(
            self,
            Exception::InstructionAccessFault
                | Exception::LoadAccessFault
                | Exception::StoreAmoAccessFault
        )
    }

    /// Whether this exception counts toward the retired-instruction
    /// counter. Pre-1.12, ECALL/EBREAK are
    /// retired; from 1.12 they are not.
    pub fn retires_instruction(self, priv_version: PrivilegedVersion) -> bool {
        match self {
            Exception::Breakpoint
            | Exception::EnvironmentCallFromUMode
            | Exception::EnvironmentCallFromSMode
            | Exception::EnvironmentCallFromMMode => {
                priv_version < PrivilegedVersion::V1_12
            }
            _ => false,
        }
    }
}

/// Basic-mode interrupt sources (privileged spec table 3.6, interrupt rows).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BasicInterrupt {
    UserSoftware,
    SupervisorSoftware,
    MachineSoftware,
    UserTimer,
    SupervisorTimer,
    MachineTimer,
    UserExternal,
    SupervisorExternal,
    MachineExternal,
}

impl BasicInterrupt {
    /// Bit position in `mip`/`mie` (also the `mcause.ExceptionCode` for
    /// this interrupt).
    pub fn code(self) -> u16 {
        match self {
            BasicInterrupt::UserSoftware => 0,
            BasicInterrupt::SupervisorSoftware => 1,
            BasicInterrupt::MachineSoftware => 3,
            BasicInterrupt::UserTimer => 4,
            BasicInterrupt::SupervisorTimer => 5,
            BasicInterrupt::MachineTimer => 7,
            BasicInterrupt::UserExternal => 8,
            BasicInterrupt::SupervisorExternal => 9,
            BasicInterrupt::MachineExternal => 11,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => BasicInterrupt::UserSoftware,
            1 => BasicInterrupt::SupervisorSoftware,
            3 => BasicInterrupt::MachineSoftware,
            4 => BasicInterrupt::UserTimer,
            5 => BasicInterrupt::SupervisorTimer,
            7 => BasicInterrupt::MachineTimer,
            8 => BasicInterrupt::UserExternal,
            9 => BasicInterrupt::SupervisorExternal,
            11 => BasicInterrupt::MachineExternal,
            _ => return None,
        })
    }

    pub fn is_external(self) -> bool {
        matches!(
            self,
            BasicInterrupt::UserExternal
                | BasicInterrupt::SupervisorExternal
                | BasicInterrupt::MachineExternal
        )
    }

    /// Fixed tie-break priority order: highest first. Ties in
    /// destination privilege are broken by this table; CLIC interrupts
    /// never appear here.
    pub fn fixed_priority(self) -> u8 {
        match self {
            BasicInterrupt::MachineExternal => 9,
            BasicInterrupt::MachineSoftware => 8,
            BasicInterrupt::MachineTimer => 7,
            BasicInterrupt::SupervisorExternal => 6,
            BasicInterrupt::SupervisorSoftware => 5,
            BasicInterrupt::SupervisorTimer => 4,
            BasicInterrupt::UserExternal => 3,
            BasicInterrupt::UserSoftware => 2,
            BasicInterrupt::UserTimer => 1,
        }
    }
}

/// A fully-resolved trap cause, either synchronous or asynchronous.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    Exception(Exception),
    BasicInterrupt(BasicInterrupt),
    /// A CLIC-sourced interrupt, identified by its raw interrupt number
    /// (which may be a standard code or a local interrupt >= 16).
    ClicInterrupt(u16),
}

impl Trap {
    pub fn is_interrupt(self) -> bool {
        !matches!(self, Trap::Exception(_))
    }

    /// The raw `mcause.ExceptionCode` value, without the interrupt bit.
    pub fn ecode(self) -> u16 {
        match self {
            Trap::Exception(e) => e.code(),
            Trap::BasicInterrupt(i) => i.code(),
            Trap::ClicInterrupt(id) => id,
        }
    }
}

/// The privileged ISA version, which changes a handful of trap-delivery
/// details. Only the versions this core
/// distinguishes behaviour for are modelled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivilegedVersion {
    V20190405,
    V1_11,
    V1_12,
}

//! Core configuration
//!
//! Instruction decode, CLI parsing, and file-based configuration
//! loading are all out of scope; this module only owns the typed
//! options the trap core itself consults.

use crate::error::ConfigError;
use crate::privilege::PrivilegedVersion;

bitflags::bitflags! {
    /// Implemented ISA extensions relevant to trap delivery: whether
    /// S-mode, U-mode, the N (user-mode interrupt) extension, and the
    /// C (compressed) extension are present. Instruction-set content
    /// beyond what gates privileged behaviour is out of scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Isa: u32 {
        const S = 0b0001;
        const U = 0b0010;
        const N = 0b0100;
        const C = 0b1000;
        const A = 0b1_0000;
    }
}

/// Debug-Mode entry mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    #[default]
    None,
    Interrupt,
    Vector,
    Halt,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub arch: Isa,
    /// Priv-spec version, gating ECALL/EBREAK retirement and the 1.12
    /// MPRV-on-xret-leaving-M-mode rule.
    pub priv_version: PrivilegedVersion,
    pub xret_preserves_lr: bool,
    pub tval_zero: bool,
    pub tval_ii_code: bool,
    pub ecode_nmi: u32,
    pub reset_address: u64,
    pub nmi_address: u64,
    pub debug_address: u64,
    pub dexc_address: u64,
    pub debug_mode: DebugMode,
    pub local_int_num: u32,
    pub external_int_id: bool,
    pub unimp_int_mask: u64,
    pub mclicbase: u64,
    pub clic_cfg_m_bits: u8,
    pub clic_sel_hardware_vectoring: bool,
    pub clic_int_ctl_bits: u8,
    pub clic_version: u8,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arch: Isa::S | Isa::U | Isa::A,
            priv_version: PrivilegedVersion::V1_12,
            xret_preserves_lr: false,
            tval_zero: false,
            tval_ii_code: false,
            ecode_nmi: 0,
            reset_address: 0,
            nmi_address: 0,
            debug_address: 0,
            dexc_address: 0,
            debug_mode: DebugMode::None,
            local_int_num: 0,
            external_int_id: false,
            unimp_int_mask: 0,
            mclicbase: 0,
            clic_cfg_m_bits: 0,
            clic_sel_hardware_vectoring: false,
            clic_int_ctl_bits: 8,
            clic_version: 1,
            verbose: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reset_address % 4 != 0 {
            return Err(ConfigError::ResetAddressMisaligned(self.reset_address));
        }
        if self.clic_int_ctl_bits > 8 {
            return Err(ConfigError::ClicIntCtlBitsOutOfRange(self.clic_int_ctl_bits));
        }
        if self.clic_cfg_m_bits > 2 {
            return Err(ConfigError::ClicCfgMBitsOutOfRange(self.clic_cfg_m_bits));
        }
        if self.local_int_num > 4096 - 16 {
            return Err(ConfigError::TooManyLocalInterrupts(self.local_int_num));
        }
        Ok(())
    }

    pub fn has_clic(&self) -> bool {
        self.clic_int_ctl_bits > 0 || self.clic_cfg_m_bits > 0 || self.mclicbase != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn misaligned_reset_address_rejected() {
        let mut cfg = Config::default();
        cfg.reset_address = 3;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ResetAddressMisaligned(3))
        ));
    }
}

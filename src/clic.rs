//! Core-Local Interrupt Controller (component C)
//!
//! Owns per-interrupt `{pending, enable, attr, ctl}` state for every
//! `{hart, mode}` pair in the cluster, decodes the byte-addressable
//! MMIO window onto that state, and arbitrates the highest-ranked
//! pending-and-enabled interrupt into a single candidate per hart.
//!
//! Memory layout (privileged spec Smclic):
//! page 0 is the control page (`cliccfg` at offset 0, `clicinfo` at
//! offset 4, read-only); the remaining `3 · harts · 4` pages form a
//! `{M, S, U} × hart` matrix of four consecutive 4 KiB pages each, each
//! matrix cell holding up to 4096 interrupts at four bytes apiece.

use crate::error::ClicError;
use crate::privilege::Privilege;

const PAGE_SIZE: u32 = 4096;
const INTERRUPTS_PER_PAGE: u32 = PAGE_SIZE / 4;
const PAGES_PER_REGION: u32 = 4;
const MAX_INTERRUPTS_PER_REGION: u32 = INTERRUPTS_PER_PAGE * PAGES_PER_REGION;

/// Global CLIC configuration (`cliccfg`), shared by the whole cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClicCfg {
    pub nmbits: u8,
    pub nlbits: u8,
    /// Read-only: whether SHV is selectable at all (`CLICSELHVEC`).
    pub nvbits: u8,
}

impl ClicCfg {
    /// Apply a write to the `cliccfg` byte, clamping:
    /// `nmbits <= CLICCFGMBITS`, `nlbits <= 8`, `nvbits` preserved.
    pub fn write(&mut self, raw: u8, clic_cfg_m_bits: u8) -> bool {
        let nmbits = (raw & 0b11).min(clic_cfg_m_bits);
        let nlbits = ((raw >> 2) & 0b1111).min(8);
        let changed = nmbits != self.nmbits || nlbits != self.nlbits;
        self.nmbits = nmbits;
        self.nlbits = nlbits;
        changed
    }

    pub fn read(&self) -> u8 {
        (self.nmbits & 0b11) | ((self.nlbits & 0b1111) << 2) | ((self.nvbits & 1) << 6)
    }
}

/// Read-only `clicinfo` register.
#[derive(Debug, Clone, Copy)]
pub struct ClicInfo {
    pub num_interrupts: u32,
    pub version: u8,
    pub clicintctlbits: u8,
}

/// `clicintattr`: `shv` (bit 0), `trig` (bits 2:1), `mode` (bits 7:6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attr {
    pub shv: bool,
    pub trig: u8,
    pub mode_bits: u8,
}

impl Attr {
    fn from_byte(byte: u8) -> Self {
        Attr {
            shv: byte & 0b1 != 0,
            trig: (byte >> 1) & 0b11,
            mode_bits: (byte >> 6) & 0b11,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.shv as u8) | (self.trig << 1) | (self.mode_bits << 6)
    }

    /// `trig` bit 1: whether the input is treated active-low (the
    /// polarity bit used by `updateCLICInput`'s edge/level trigger
    /// classification).
    pub fn active_low(self) -> bool {
        self.trig & 0b10 != 0
    }

    pub fn edge_triggered(self) -> bool {
        self.trig & 0b01 != 0
    }
}

/// Per-interrupt, per-hart state. There is exactly one of these per
/// interrupt number on a hart; the `{M,S,U}` MMIO pages are three
/// windows onto the same array, not three separate copies of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntState {
    pub ip: bool,
    pub ie: bool,
    pub attr: Attr,
    pub ctl: u8,
}

/// The winning CLIC candidate after arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClicCandidate {
    pub id: u32,
    pub priv_: Privilege,
    pub level: u8,
    pub shv: bool,
}

/// The full CLIC block for one hart (cluster-shared `cliccfg`/`clicinfo`
/// live in [`Clic`]). A hart has exactly one interrupt array; the
/// `{M,S,U}` pages accessed through the MMIO window are three different
/// vantage points onto this same array, not three separate banks.
#[derive(Debug, Clone)]
pub struct HartClic {
    interrupts: Vec<IntState>,
    /// Bit `i` set iff `interrupts[i].ip && interrupts[i].ie`.
    ipe: Vec<bool>,
}

impl HartClic {
    fn new(num_interrupts: u32) -> Self {
        HartClic {
            interrupts: vec![IntState::default(); num_interrupts as usize],
            ipe: vec![false; num_interrupts as usize],
        }
    }

    fn refresh_ipe(&mut self, index: usize) {
        self.ipe[index] = self.interrupts[index].ip && self.interrupts[index].ie;
    }
}

/// Decode an MMIO address relative to the CLIC base into either the
/// control page or a specific interrupt field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClicAddress {
    CliccfgByte,
    /// One byte of the read-only `clicinfo` word, `0` = least significant.
    ClicinfoByte(u8),
    /// A reserved control-page byte: reads as zero, writes are dropped.
    Reserved,
    Interrupt { mode: Privilege, hart: usize, index: u32, field: IntField },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    Ip,
    Ie,
    Attr,
    Ctl,
}

pub fn decode_address(offset: u32, num_harts: usize) -> Result<ClicAddress, ClicError> {
    let page = offset / PAGE_SIZE;
    if page == 0 {
        return Ok(match offset {
            0 => ClicAddress::CliccfgByte,
            4..=7 => ClicAddress::ClicinfoByte((offset - 4) as u8),
            _ => ClicAddress::Reserved,
        });
    }
    let rel_page = page - 1;
    let region = rel_page / PAGES_PER_REGION;
    let page_in_region = rel_page % PAGES_PER_REGION;
    let mode_idx = (region / num_harts as u32) as usize;
    let hart = (region % num_harts as u32) as usize;
    if mode_idx >= 3 {
        return Err(ClicError::IllegalPageType(mode_idx as u32));
    }
    let mode = match mode_idx {
        0 => Privilege::Machine,
        1 => Privilege::Supervisor,
        _ => Privilege::User,
    };
    let byte_in_region = page_in_region * PAGE_SIZE + (offset % PAGE_SIZE);
    let index = byte_in_region / 4;
    if index >= MAX_INTERRUPTS_PER_REGION {
        return Err(ClicError::InterruptIndexOutOfRange(index));
    }
    let field = match byte_in_region % 4 {
        0 => IntField::Ip,
        1 => IntField::Ie,
        2 => IntField::Attr,
        _ => IntField::Ctl,
    };
    Ok(ClicAddress::Interrupt { mode, hart, index, field })
}

/// The cluster-wide CLIC block: shared configuration plus one
/// [`HartClic`] per hart.
#[derive(Debug, Clone)]
pub struct Clic {
    pub cfg: ClicCfg,
    pub info: ClicInfo,
    harts: Vec<HartClic>,
    clic_cfg_m_bits: u8,
    has_n: bool,
    has_s: bool,
    has_u: bool,
}

impl Clic {
    pub fn new(
        num_harts: usize,
        num_interrupts: u32,
        version: u8,
        clicintctlbits: u8,
        clic_cfg_m_bits: u8,
        nvbits: u8,
        has_n: bool,
        has_s: bool,
        has_u: bool,
    ) -> Self {
        Clic {
            cfg: ClicCfg { nmbits: 0, nlbits: 0, nvbits },
            info: ClicInfo { num_interrupts, version, clicintctlbits },
            harts: (0..num_harts).map(|_| HartClic::new(num_interrupts)).collect(),
            clic_cfg_m_bits,
            has_n,
            has_s,
            has_u,
        }
    }

    pub fn num_harts(&self) -> usize {
        self.harts.len()
    }

    fn always_one_mask(&self) -> u8 {
        let bits = self.info.clicintctlbits;
        if bits >= 8 {
            0
        } else {
            ((1u16 << (8 - bits)) - 1) as u8
        }
    }

    /// Decode an interrupt's effective target mode from `attr.mode_bits`,
    /// `CLICCFGMBITS` (the static maximum, `clic_cfg_m_bits`) and the
    /// live `cliccfg.nmbits`. With `clic_cfg_m_bits >= 2`, the decode
    /// table still depends on the current `nmbits`, not just its static
    /// maximum: `nmbits == 1` only distinguishes S (`0x`) from M (`1x`);
    /// the full `00=U, 01=S, 10=reserved, 11=M` table only applies once
    /// `nmbits == 2`.
    pub fn decode_mode(&self, attr: Attr) -> Privilege {
        if self.cfg.nmbits == 0 {
            return Privilege::Machine;
        }
        if self.clic_cfg_m_bits == 1 {
            return if attr.mode_bits & 0b10 != 0 || !self.has_u {
                Privilege::Machine
            } else {
                Privilege::User
            };
        }
        let code = attr.mode_bits | (self.cfg.nmbits == 1) as u8;
        match code {
            0b00 => {
                if self.has_u {
                    Privilege::User
                } else {
                    Privilege::Machine
                }
            }
            0b01 => {
                if self.has_s {
                    Privilege::Supervisor
                } else {
                    Privilege::Machine
                }
            }
            _ => Privilege::Machine,
        }
    }

    /// Write `attr`. `page_mode` is the MMIO page the write came
    /// through, used only to clamp the requested mode, never to select
    /// storage: mode cannot exceed the page's own mode,
    /// `CLICCFGMBITS == 0` disables the mode field entirely, `S`
    /// requires `CLICCFGMBITS >= 2`, `U` requires the `N` extension, and
    /// `shv` is forced clear when `nvbits == 0`.
    pub fn write_attr(&mut self, page_mode: Privilege, hart: usize, index: u32, raw: u8) {
        let index = index as usize;
        let mut attr = Attr::from_byte(raw);
        if self.clic_cfg_m_bits == 0 {
            attr.mode_bits = self.harts[hart].interrupts[index].attr.mode_bits;
        }
        let requested = self.decode_mode(attr);
        if requested > page_mode {
            attr.mode_bits = self.harts[hart].interrupts[index].attr.mode_bits;
        }
        if requested == Privilege::Supervisor && self.clic_cfg_m_bits < 2 {
            attr.mode_bits = 0;
        }
        if requested == Privilege::User && !self.has_n {
            attr.mode_bits = 0;
        }
        if self.cfg.nvbits == 0 {
            attr.shv = false;
        }
        let hart = &mut self.harts[hart];
        hart.interrupts[index].attr = attr;
        hart.refresh_ipe(index);
    }

    /// Write `ctl`. There is one `ctl` per interrupt number, not per
    /// page: the reference model's `writeCLICInterruptCtl` takes no
    /// page/mode argument either, since visibility is already checked by
    /// the caller before any field write is dispatched.
    pub fn write_ctl(&mut self, hart: usize, index: u32, raw: u8) {
        let masked = raw | self.always_one_mask();
        self.harts[hart].interrupts[index as usize].ctl = masked;
    }

    pub fn write_ip(&mut self, hart: usize, index: u32, asserted: bool) {
        let index = index as usize;
        let hart = &mut self.harts[hart];
        hart.interrupts[index].ip = asserted;
        hart.refresh_ipe(index);
    }

    pub fn write_ie(&mut self, hart: usize, index: u32, enabled: bool) {
        let index = index as usize;
        let hart = &mut self.harts[hart];
        hart.interrupts[index].ie = enabled;
        hart.refresh_ipe(index);
    }

    pub fn interrupt(&self, hart: usize, index: u32) -> IntState {
        self.harts[hart].interrupts[index as usize]
    }

    /// Rebuild every `ipe[]` bit from `intState` (used after a restore).
    pub fn refresh_ipe_all(&mut self) {
        for hart in self.harts.iter_mut() {
            for i in 0..hart.interrupts.len() {
                hart.refresh_ipe(i);
            }
        }
    }

    /// `level` occupies the high `nlbits` bits of `ctl`; the remaining
    /// low bits (priority, not level) read as one for arbitration
    /// purposes.
    fn level_of(&self, ctl: u8) -> u8 {
        let nlbits = self.cfg.nlbits.min(8);
        if nlbits >= 8 {
            ctl
        } else {
            let low_mask = ((1u16 << (8 - nlbits)) - 1) as u8;
            ctl | low_mask
        }
    }

    /// Arbitrate among this hart's pending-and-enabled CLIC interrupts:
    /// rank `(mode << 8) | ctl`, largest rank wins, ties broken by the
    /// higher interrupt index. Each interrupt's mode is decoded from its
    /// own `attr` at arbitration time, not from where it is stored.
    pub fn refresh_pending_and_enabled(&self, hart: usize) -> Option<ClicCandidate> {
        let mut best: Option<(u32, u32, Privilege, u8, bool)> = None; // (rank, id, priv, ctl, shv)
        let hart = &self.harts[hart];
        for (index, set) in hart.ipe.iter().enumerate() {
            if !*set {
                continue;
            }
            let state = hart.interrupts[index];
            let priv_ = self.decode_mode(state.attr);
            let rank = ((priv_.bits() as u32) << 8) | state.ctl as u32;
            let replace = match &best {
                None => true,
                Some((best_rank, ..)) => rank >= *best_rank,
            };
            if replace {
                best = Some((rank, index as u32, priv_, state.ctl, state.attr.shv));
            }
        }
        best.map(|(_, id, priv_, ctl, shv)| ClicCandidate {
            id,
            priv_,
            level: self.level_of(ctl),
            shv,
        })
    }

    /// Whether any interrupt is pending (`ip` set) for this hart,
    /// irrespective of `ie`: a masked-but-pending interrupt still wakes
    /// a parked hart.
    pub fn any_pending(&self, hart: usize) -> bool {
        self.harts[hart].interrupts.iter().any(|i| i.ip)
    }

    /// Acknowledge a delivered SHV interrupt: edge-triggered interrupts
    /// clear their own pending bit; level-triggered ones are left for
    /// the input to re-assert or clear.
    pub fn acknowledge(&mut self, hart: usize, index: u32) {
        let edge = self.harts[hart].interrupts[index as usize].attr.edge_triggered();
        if edge {
            self.write_ip(hart, index, false);
        }
    }
}

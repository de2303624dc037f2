/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Latched I/O port state, port address matching and TR-DOS gating.
//!
//! The latches together with [PortFlags] fully determine the memory map:
//! banking is a pure function of them (see [crate::banking::rebank]).
use bitflags::bitflags;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

bitflags! {
    /// Mode flags driven by port writes and M1 fetch transitions.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default)]
    pub struct PortFlags: u8 {
        /// TR-DOS controller ports are accessible.
        const DOS_PORTS      = 0x01;
        /// TR-DOS ROM is switched in.
        const TRDOS_ROM      = 0x02;
        /// TR-DOS ROM becomes active on an M1 fetch at 0x3Dxx.
        const SET_DOS_ROM    = 0x04;
        /// TR-DOS ROM is left when executing from RAM.
        const LEAVE_DOS_RAM  = 0x08;
        /// TR-DOS ROM is left when PC rises above 0x3FFF.
        const LEAVE_DOS_ADR  = 0x10;
        /// The cache window is enabled.
        const CACHE_ON       = 0x20;
        /// Unstable data bus: idle reads return noise.
        const Z80_FAULT_BUS  = 0x40;
        /// PROF-ROM banking is active.
        const PROF_ROM       = 0x80;
    }
}

impl From<PortFlags> for u8 {
    fn from(flags: PortFlags) -> u8 {
        flags.bits()
    }
}

impl From<u8> for PortFlags {
    fn from(bits: u8) -> Self {
        PortFlags::from_bits_truncate(bits)
    }
}

/// A port address pattern: the port matches when
/// `port & mask == bits & mask`.
///
/// Most ZX peripherals decode only a few address lines, so masks are
/// sparse; full 16-bit decoding is used by ATM3 and TSConf extension
/// ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMatch {
    pub mask: u16,
    pub bits: u16,
}

impl PortMatch {
    pub const fn new(mask: u16, bits: u16) -> Self {
        PortMatch { mask, bits }
    }

    #[inline]
    pub fn matches(self, port: u16) -> bool {
        port & self.mask == self.bits & self.mask
    }
}

/// The ULA port: every even port.
pub const PORT_FE: PortMatch = PortMatch::new(0x0001, 0x0000);
/// 128k memory control.
pub const PORT_7FFD: PortMatch = PortMatch::new(0x8002, 0x7FFD);
/// +2A/+3 and Scorpion secondary memory control.
pub const PORT_1FFD: PortMatch = PortMatch::new(0xF002, 0x1FFD);
/// Profi extended memory control.
pub const PORT_DFFD: PortMatch = PortMatch::new(0xF002, 0xDFFD);
/// Pentagon 1024 control latch, fully decoded.
pub const PORT_EFF7: PortMatch = PortMatch::new(0xFFFF, 0xEFF7);
/// AY register select.
pub const PORT_FFFD: PortMatch = PortMatch::new(0xC002, 0xFFFD);
/// AY data.
pub const PORT_BFFD: PortMatch = PortMatch::new(0xC002, 0xBFFD);
/// Kempston joystick: only address bit 5 is decoded, so the interface
/// answers on 0x1F and its mirrors (0x5F, 0x9F, 0xDF, ...).
pub const PORT_1F: PortMatch = PortMatch::new(0x0020, 0x001F);
/// TR-DOS WD1793 register window (0x1F/0x3F/0x5F/0x7F) and system 0xFF.
pub const PORT_TRDOS_CMD: PortMatch = PortMatch::new(0x009F, 0x001F);
pub const PORT_TRDOS_SYS: PortMatch = PortMatch::new(0x00FF, 0x00FF);
/// TSConf extension register select / data, fully decoded.
pub const PORT_TS_AF: PortMatch = PortMatch::new(0x00FF, 0x00AF);
/// ATM window programming ports xxF7.
pub const PORT_ATM_FF7: PortMatch = PortMatch::new(0x3FFF, 0x3FF7);
/// ATM palette/config port FF77, fully decoded.
pub const PORT_FF77: PortMatch = PortMatch::new(0xFFFF, 0xFF77);
/// Quorum system port 0x00.
pub const PORT_QUORUM_00: PortMatch = PortMatch::new(0x00FF, 0x0000);
/// Quorum extended memory port 0x80FD.
pub const PORT_QUORUM_80FD: PortMatch = PortMatch::new(0xFFFF, 0x80FD);

/// Values of the last OUT to every bank or mode control port.
///
/// There is no hidden state: together with [PortFlags] and the model this
/// is the whole banking input.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PortLatches {
    /// Border color, beeper and tape bits.
    pub p_fe: u8,
    pub p_7ffd: u8,
    pub p_1ffd: u8,
    pub p_dffd: u8,
    pub p_eff7: u8,
    /// ATM mode latch.
    pub p_ff77: u8,
    /// ATM per-window page registers, programmed through ports xxF7.
    pub atm_pages: [u8; 4],
    /// Quorum system latch (port 0x00).
    pub p_00: u8,
    /// Quorum extended memory latch (port 0x80FD).
    pub p_80fd: u8,
    /// PROF-ROM page latch of the Scorpion Prof.
    pub prof_rom_page: u8,
}

impl PortLatches {
    /// The /RST state: all latches drop to zero.
    pub fn reset(&mut self) {
        *self = PortLatches::default();
    }

    /// Whether 0x7FFD writes are currently locked out (bit 5).
    #[inline]
    pub fn is_128_locked(&self) -> bool {
        self.p_7ffd & 0x20 != 0
    }
}

/// TSConf extension register file, written through ports 0xAF (select)
/// and 0xAF data with the register index on A8..A15.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TsExtRegs {
    #[cfg_attr(feature = "snapshot", serde(with = "serde_big_array"))]
    pub regs: [u8; 256],
}

#[cfg(feature = "snapshot")]
mod serde_big_array {
    use serde::{Deserializer, Serializer, Serialize, Deserialize};

    pub fn serialize<S: Serializer>(regs: &[u8; 256], ser: S) -> Result<S::Ok, S::Error> {
        regs[..].serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 256], D::Error> {
        let v: Vec<u8> = Vec::deserialize(de)?;
        let mut regs = [0u8; 256];
        let n = v.len().min(256);
        regs[..n].copy_from_slice(&v[..n]);
        Ok(regs)
    }
}

/// TSConf register indices (write side).
pub mod tsreg {
    pub const VCONF: usize = 0x00;
    pub const VPAGE: usize = 0x01;
    pub const GXOFFSL: usize = 0x02;
    pub const GXOFFSH: usize = 0x03;
    pub const GYOFFSL: usize = 0x04;
    pub const GYOFFSH: usize = 0x05;
    pub const TSCONF: usize = 0x06;
    pub const PALSEL: usize = 0x07;
    pub const BORDER: usize = 0x0F;
    pub const PAGE0: usize = 0x10;
    pub const PAGE1: usize = 0x11;
    pub const PAGE2: usize = 0x12;
    pub const PAGE3: usize = 0x13;
    pub const FMADDR: usize = 0x15;
    pub const TMPAGE: usize = 0x16;
    pub const T0GPAGE: usize = 0x17;
    pub const T1GPAGE: usize = 0x18;
    pub const SGPAGE: usize = 0x19;
    pub const DMASAL: usize = 0x1A;
    pub const DMASAH: usize = 0x1B;
    pub const DMASAX: usize = 0x1C;
    pub const DMADAL: usize = 0x1D;
    pub const DMADAH: usize = 0x1E;
    pub const DMADAX: usize = 0x1F;
    pub const MEMCONF: usize = 0x21;
    pub const HSINT: usize = 0x22;
    pub const VSINTL: usize = 0x23;
    pub const VSINTH: usize = 0x24;
    pub const DMALEN: usize = 0x26;
    pub const DMACTR: usize = 0x27;
    pub const DMANUM: usize = 0x28;
    pub const INTMASK: usize = 0x2A;
    pub const T0XOFFSL: usize = 0x40;
    pub const T0XOFFSH: usize = 0x41;
    pub const T0YOFFSL: usize = 0x42;
    pub const T0YOFFSH: usize = 0x43;
    pub const T1XOFFSL: usize = 0x44;
    pub const T1XOFFSH: usize = 0x45;
    pub const T1YOFFSL: usize = 0x46;
    pub const T1YOFFSH: usize = 0x47;
}

impl Default for TsExtRegs {
    fn default() -> Self {
        let mut regs = [0u8; 256];
        // after reset the ROM is mapped and page 5 is the screen
        regs[tsreg::PAGE1] = 5;
        regs[tsreg::PAGE2] = 2;
        regs[tsreg::VPAGE] = 5;
        TsExtRegs { regs }
    }
}

impl TsExtRegs {
    #[inline]
    pub fn get(&self, reg: usize) -> u8 {
        self.regs[reg & 0xFF]
    }

    #[inline]
    pub fn set(&mut self, reg: usize, data: u8) {
        self.regs[reg & 0xFF] = data;
    }
}

/// Where the CPU is currently executing from, for the TR-DOS gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecSource {
    Rom,
    Ram
}

/// Applies the TR-DOS enter/leave rules on an M1 fetch.
///
/// Entering: executing at 0x3Dxx while a DOS-capable ROM is mapped (the
/// 48 BASIC ROM on 128-style models). Leaving: executing above 0x3FFF, or
/// from RAM on models that close DOS on RAM execution. Returns `true` when
/// the flags changed and the caller must rebank.
pub fn dos_m1_transition(
    flags: &mut PortFlags,
    pc: u16,
    source: ExecSource,
    dos_capable_rom: bool,
) -> bool {
    if !flags.contains(PortFlags::TRDOS_ROM) {
        if flags.contains(PortFlags::SET_DOS_ROM)
            && pc & 0xFF00 == 0x3D00
            && source == ExecSource::Rom
            && dos_capable_rom
        {
            flags.insert(PortFlags::TRDOS_ROM | PortFlags::DOS_PORTS);
            return true;
        }
        return false;
    }
    if flags.contains(PortFlags::LEAVE_DOS_ADR) && pc >= 0x4000
        || flags.contains(PortFlags::LEAVE_DOS_RAM) && source == ExecSource::Ram
    {
        flags.remove(PortFlags::TRDOS_ROM | PortFlags::DOS_PORTS);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_patterns() {
        assert!(PORT_FE.matches(0x00FE));
        assert!(PORT_FE.matches(0xFFFE));
        assert!(!PORT_FE.matches(0x00FF));
        assert!(PORT_7FFD.matches(0x7FFD));
        // the classic partial decode also hits 0x3FFD
        assert!(PORT_7FFD.matches(0x3FFD));
        assert!(!PORT_7FFD.matches(0xFFFD));
        assert!(PORT_FFFD.matches(0xFFFD));
        assert!(PORT_BFFD.matches(0xBFFD));
        assert!(!PORT_BFFD.matches(0xFFFD));
        assert!(PORT_EFF7.matches(0xEFF7));
        assert!(!PORT_EFF7.matches(0xEFF5));
        assert!(PORT_TRDOS_CMD.matches(0x001F));
        assert!(PORT_TRDOS_CMD.matches(0x007F));
        assert!(!PORT_TRDOS_CMD.matches(0x00FF));
        assert!(PORT_TRDOS_SYS.matches(0x30FF));
        // the Kempston partial decode answers on the mirror ports too
        assert!(PORT_1F.matches(0x001F));
        assert!(PORT_1F.matches(0x005F));
        assert!(PORT_1F.matches(0x009F));
        assert!(PORT_1F.matches(0x00DF));
        assert!(!PORT_1F.matches(0x003F)); // address bit 5 set
        assert!(!PORT_1F.matches(0x007F));
    }

    #[test]
    fn trdos_enter_and_leave() {
        let mut flags = PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_ADR;
        // no transition below 0x3D00
        assert!(!dos_m1_transition(&mut flags, 0x3C00, ExecSource::Rom, true));
        // enter at 0x3Dxx from a DOS-capable ROM
        assert!(dos_m1_transition(&mut flags, 0x3D2F, ExecSource::Rom, true));
        assert!(flags.contains(PortFlags::TRDOS_ROM));
        assert!(flags.contains(PortFlags::DOS_PORTS));
        // still inside the DOS ROM: no transition
        assert!(!dos_m1_transition(&mut flags, 0x2000, ExecSource::Rom, false));
        // one M1 fetch above 0x3FFF leaves in one step
        assert!(dos_m1_transition(&mut flags, 0x4000, ExecSource::Ram, false));
        assert!(!flags.contains(PortFlags::TRDOS_ROM));
    }

    #[test]
    fn trdos_requires_dos_capable_rom() {
        let mut flags = PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_ADR;
        // the 128 editor ROM mapped: no entry
        assert!(!dos_m1_transition(&mut flags, 0x3D00, ExecSource::Rom, false));
        assert!(!flags.contains(PortFlags::TRDOS_ROM));
    }

    #[test]
    fn leave_dos_on_ram_execution() {
        let mut flags = PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_RAM
            | PortFlags::TRDOS_ROM | PortFlags::DOS_PORTS;
        assert!(dos_m1_transition(&mut flags, 0x2000, ExecSource::Ram, true));
        assert!(!flags.contains(PortFlags::TRDOS_ROM));
    }
}

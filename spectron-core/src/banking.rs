/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Models of the Spectrum family and their banking rules.
//!
//! For every model the window mapping is a pure function of the latched
//! port values and the mode flags: [rebank]. Two OUT sequences ending in
//! the same latch state always produce the same map.
use crate::clock::FrameTimings;
use crate::memory::{MemoryMap, PageId, RomSet, Window};
use crate::ports::{tsreg, PortFlags, PortLatches, TsExtRegs};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// An emulated machine model.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Model {
    Spectrum48,
    Spectrum128,
    /// +2A and +3.
    Plus3,
    Pentagon,
    Pentagon512,
    Pentagon1024,
    Scorpion256,
    /// Scorpion with the PROF-ROM expansion.
    ScorpionProf,
    Profi,
    Kay1024,
    Atm710,
    Atm3,
    TsConf,
    Quorum,
    Lsy256,
}

impl Default for Model {
    fn default() -> Self {
        Model::Pentagon
    }
}

impl Model {
    /// RAM pages available on this model.
    pub fn ram_pages(self) -> u16 {
        match self {
            Model::Spectrum48 => 3,
            Model::Spectrum128 | Model::Plus3 | Model::Pentagon => 8,
            Model::Scorpion256 | Model::ScorpionProf | Model::Quorum => 16,
            Model::Pentagon512 | Model::Lsy256 => 32,
            Model::Pentagon1024 | Model::Kay1024 | Model::Profi => 64,
            Model::Atm710 | Model::Atm3 => 64,
            Model::TsConf => 256,
        }
    }

    /// ROM banks this model expects to be loaded.
    pub fn rom_banks(self) -> u8 {
        match self {
            Model::Spectrum48 => 1,
            Model::Spectrum128 | Model::Lsy256 => 2,
            Model::ScorpionProf => 16,
            Model::TsConf => 32,
            _ => 4,
        }
    }

    pub fn timings(self) -> FrameTimings {
        match self {
            Model::Spectrum48 => FrameTimings::SPECTRUM48,
            Model::Spectrum128 | Model::Plus3 => FrameTimings::SPECTRUM128,
            Model::TsConf => FrameTimings::TSCONF,
            _ => FrameTimings::PENTAGON,
        }
    }

    pub fn rom_set(self) -> RomSet {
        match self {
            Model::Spectrum48 => RomSet::single(),
            Model::Spectrum128 | Model::Lsy256 => RomSet::spectrum128(),
            Model::Plus3 => RomSet::plus3(),
            Model::Kay1024 => RomSet::kay(),
            Model::Atm3 => RomSet::atm3(),
            _ => RomSet::pentagon(),
        }
    }

    /// Mode flags installed at reset.
    pub fn initial_flags(self) -> PortFlags {
        match self {
            Model::Spectrum48 | Model::Spectrum128 =>
                PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_ADR,
            Model::Plus3 => PortFlags::empty(),
            Model::Quorum =>
                PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_RAM | PortFlags::LEAVE_DOS_ADR,
            Model::TsConf =>
                PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_ADR,
            _ =>
                PortFlags::SET_DOS_ROM | PortFlags::LEAVE_DOS_RAM | PortFlags::LEAVE_DOS_ADR,
        }
    }

    /// Whether the ULA fetches screen data from this RAM bank, stalling
    /// CPU accesses to it.
    pub fn is_contended_page(self, bank: u8) -> bool {
        match self {
            Model::Spectrum48 => bank == 5,
            Model::Spectrum128 => bank & 1 == 1,
            Model::Plus3 => (4..8).contains(&bank),
            // the Pentagon family and the FPGA clones have no contention
            _ => false,
        }
    }

    /// Whether this model exhibits the floating-bus effect on idle reads.
    pub fn has_floating_bus(self) -> bool {
        matches!(self, Model::Spectrum48 | Model::Spectrum128 | Model::Plus3)
    }

    /// The RAM bank the ULA currently displays.
    pub fn screen_bank(self, latches: &PortLatches) -> u8 {
        if self == Model::Spectrum48 {
            5
        }
        else if latches.p_7ffd & 0x08 != 0 {
            7
        }
        else {
            5
        }
    }
}

fn rom_window(rom: &RomSet, flags: PortFlags, bank_128_selected: bool) -> Window {
    let bank = if flags.contains(PortFlags::TRDOS_ROM) {
        rom.dos.unwrap_or(rom.sos)
    }
    else if bank_128_selected || rom.rom128.is_none() {
        rom.sos
    }
    else {
        rom.rom128.unwrap_or(rom.sos)
    };
    Window { page: PageId::rom(bank), writable: false }
}

#[inline]
fn ram_window(bank: u16) -> Window {
    Window { page: PageId::ram(bank as u8), writable: true }
}

/// Computes the window mapping from the latched state.
///
/// This is the single place banking decisions are made; the port
/// dispatcher calls it after every latch or flag change and applies the
/// result atomically.
pub fn rebank(
    model: Model,
    latches: &PortLatches,
    flags: PortFlags,
    ts: &TsExtRegs,
    rom: &RomSet,
) -> MemoryMap {
    let p7 = latches.p_7ffd;
    let rom48 = p7 & 0x10 != 0;
    let mut map = MemoryMap {
        windows: [
            rom_window(rom, flags, rom48),
            ram_window(5),
            ram_window(2),
            ram_window((p7 & 7) as u16),
        ]
    };
    // a switched-in cache replaces whatever W0 would otherwise hold
    if flags.contains(PortFlags::CACHE_ON) {
        map.windows[0] = Window { page: PageId::cache(0), writable: true };
        return map;
    }
    match model {
        Model::Spectrum48 => {
            map.windows[3] = ram_window(0);
        }
        Model::Spectrum128 => {}
        Model::Plus3 => {
            if latches.p_1ffd & 0x01 != 0 {
                // all-RAM configurations of the +2A/+3
                let banks: [u16; 4] = match (latches.p_1ffd >> 1) & 3 {
                    0 => [0, 1, 2, 3],
                    1 => [4, 5, 6, 7],
                    2 => [4, 5, 6, 3],
                    _ => [4, 7, 6, 3],
                };
                for (wnd, bank) in map.windows.iter_mut().zip(banks.iter()) {
                    *wnd = ram_window(*bank);
                }
            }
            else {
                // 2-bit ROM select from 1FFD bit 2 and 7FFD bit 4
                let hi = (latches.p_1ffd & 0x04) >> 1;
                let lo = (p7 & 0x10) >> 4;
                let bank = match hi | lo {
                    0 => rom.rom128.unwrap_or(rom.sos),
                    1 => rom.sys.unwrap_or(rom.sos),
                    2 => rom.dos.unwrap_or(rom.sos),
                    _ => rom.sos,
                };
                map.windows[0] = Window { page: PageId::rom(bank), writable: false };
            }
        }
        Model::Pentagon => {}
        Model::Pentagon512 => {
            let bank = (p7 & 7) as u16 | ((p7 & 0xC0) >> 3) as u16;
            map.windows[3] = ram_window(bank);
        }
        Model::Pentagon1024 => {
            // EFF7 bit 2 falls back to the plain 128k map
            if latches.p_eff7 & 0x04 == 0 {
                let bank = (p7 & 7) as u16
                    | ((p7 & 0x20) >> 2) as u16
                    | ((p7 & 0xC0) >> 2) as u16;
                map.windows[3] = ram_window(bank);
            }
            if latches.p_eff7 & 0x08 != 0 {
                // RAM 0 at the ROM window
                map.windows[0] = ram_window(0);
            }
        }
        Model::Scorpion256 | Model::ScorpionProf => {
            let bank = (p7 & 7) as u16 | ((latches.p_1ffd & 0x10) >> 1) as u16;
            map.windows[3] = ram_window(bank);
            if latches.p_1ffd & 0x01 != 0 {
                map.windows[0] = ram_window(0);
            }
            else if latches.p_1ffd & 0x02 != 0 {
                let bank = rom.sys.unwrap_or(rom.sos);
                map.windows[0] = Window { page: PageId::rom(bank), writable: false };
            }
            else if model == Model::ScorpionProf && flags.contains(PortFlags::PROF_ROM) {
                map.windows[0] = Window {
                    page: PageId::rom(latches.prof_rom_page & 0x0F),
                    writable: false
                };
            }
        }
        Model::Profi => {
            let bank = (p7 & 7) as u16 | ((latches.p_dffd & 7) << 3) as u16;
            map.windows[3] = ram_window(bank);
            if latches.p_dffd & 0x08 != 0 {
                // CP/M mode: RAM replaces the ROM window
                map.windows[0] = ram_window(bank & !7);
            }
        }
        Model::Kay1024 => {
            let bank = (p7 & 7) as u16 | ((p7 & 0xC0) >> 3) as u16 | ((p7 & 0x10) << 1) as u16;
            map.windows[3] = ram_window(bank);
        }
        Model::Atm710 | Model::Atm3 => {
            // the ATM memory manager programs each window through xxF7
            // ports; bit 6 selects RAM, bits 0..=5 the page
            if latches.p_ff77 & 0x01 != 0 {
                for w in 0..4 {
                    let cfg = latches.atm_pages[w];
                    map.windows[w] = if cfg & 0x40 != 0 {
                        ram_window((cfg & 0x3F) as u16)
                    }
                    else {
                        Window { page: PageId::rom(cfg & 0x03), writable: false }
                    };
                }
            }
        }
        Model::TsConf => {
            let memconf = ts.get(tsreg::MEMCONF);
            map.windows[0] = if memconf & 0x01 != 0 {
                ram_window(ts.get(tsreg::PAGE0) as u16)
            }
            else {
                let bank = if flags.contains(PortFlags::TRDOS_ROM) {
                    rom.dos.unwrap_or(rom.sos)
                }
                else {
                    ts.get(tsreg::PAGE0) & 0x1F
                };
                Window { page: PageId::rom(bank), writable: false }
            };
            map.windows[1] = ram_window(ts.get(tsreg::PAGE1) as u16);
            map.windows[2] = ram_window(ts.get(tsreg::PAGE2) as u16);
            map.windows[3] = ram_window(ts.get(tsreg::PAGE3) as u16);
        }
        Model::Quorum => {
            let bank = (p7 & 7) as u16 | (latches.p_80fd & 0x18) as u16;
            map.windows[3] = ram_window(bank);
            if latches.p_00 & 0x02 != 0 {
                // TR-DOS ROM forced by the system latch
                let bank = rom.dos.unwrap_or(rom.sos);
                map.windows[0] = Window { page: PageId::rom(bank), writable: false };
            }
        }
        Model::Lsy256 => {
            let bank = (p7 & 7) as u16 | ((latches.p_dffd & 0x03) << 3) as u16;
            map.windows[3] = ram_window(bank);
        }
    }
    map
}

/// Whether a latch write to 0x7FFD must be ignored because of the bit-5
/// lock. The Pentagon 1024 unlocks it while extended memory is on.
pub fn is_7ffd_locked(model: Model, latches: &PortLatches) -> bool {
    match model {
        Model::Pentagon1024 => {
            latches.p_eff7 & 0x04 != 0 && latches.is_128_locked()
        }
        Model::TsConf => {
            // lock is taken from MEMCONF on the TSConf, never from 7FFD
            false
        }
        _ => latches.is_128_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(model: Model) -> (PortLatches, PortFlags, TsExtRegs, RomSet) {
        (PortLatches::default(), model.initial_flags(), TsExtRegs::default(), model.rom_set())
    }

    #[test]
    fn spectrum48_fixed_map() {
        let (latches, flags, ts, rom) = setup(Model::Spectrum48);
        let map = rebank(Model::Spectrum48, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::rom(0));
        assert!(!map.windows[0].writable);
        assert_eq!(map.windows[1].page, PageId::ram(5));
        assert_eq!(map.windows[2].page, PageId::ram(2));
        assert_eq!(map.windows[3].page, PageId::ram(0));
    }

    #[test]
    fn spectrum128_bank_select() {
        let (mut latches, flags, ts, rom) = setup(Model::Spectrum128);
        // OUT (0x7FFD), 0x10: RAM 0 at W3, ROM 1 (48 BASIC) at W0
        latches.p_7ffd = 0x10;
        let map = rebank(Model::Spectrum128, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(0));
        assert_eq!(map.windows[0].page, PageId::rom(1));
        // RAM 7 with the editor ROM
        latches.p_7ffd = 0x07;
        let map = rebank(Model::Spectrum128, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(7));
        assert_eq!(map.windows[0].page, PageId::rom(0));
    }

    #[test]
    fn lock_bit_blocks_7ffd() {
        let (mut latches, _, _, _) = setup(Model::Spectrum128);
        latches.p_7ffd = 0x20 | 0x10;
        assert!(is_7ffd_locked(Model::Spectrum128, &latches));
        latches.p_7ffd = 0x10;
        assert!(!is_7ffd_locked(Model::Spectrum128, &latches));
    }

    #[test]
    fn map_is_pure_function_of_latches() {
        let (mut latches, flags, ts, rom) = setup(Model::Spectrum128);
        // two different OUT histories ending in the same latch state
        latches.p_7ffd = 0x03;
        let a = rebank(Model::Spectrum128, &latches, flags, &ts, &rom);
        latches.p_7ffd = 0x15;
        let _ = rebank(Model::Spectrum128, &latches, flags, &ts, &rom);
        latches.p_7ffd = 0x03;
        let b = rebank(Model::Spectrum128, &latches, flags, &ts, &rom);
        assert_eq!(a, b);
    }

    #[test]
    fn plus3_all_ram_modes() {
        let (mut latches, flags, ts, rom) = setup(Model::Plus3);
        latches.p_1ffd = 0x01; // all-RAM 0,1,2,3
        let map = rebank(Model::Plus3, &latches, flags, &ts, &rom);
        let banks: Vec<PageId> = map.windows.iter().map(|w| w.page).collect();
        assert_eq!(banks, vec![PageId::ram(0), PageId::ram(1), PageId::ram(2), PageId::ram(3)]);
        assert!(map.windows[0].writable);
        latches.p_1ffd = 0x01 | 0x06; // config 3: 4,7,6,3
        let map = rebank(Model::Plus3, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[1].page, PageId::ram(7));
    }

    #[test]
    fn plus3_rom_select_two_bits() {
        let (mut latches, flags, ts, rom) = setup(Model::Plus3);
        latches.p_1ffd = 0x04;
        latches.p_7ffd = 0x10;
        let map = rebank(Model::Plus3, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::rom(3)); // bank 3 = 48 BASIC
        latches.p_1ffd = 0x00;
        latches.p_7ffd = 0x00;
        let map = rebank(Model::Plus3, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::rom(0));
    }

    #[test]
    fn trdos_rom_overrides_w0() {
        let (latches, mut flags, ts, rom) = setup(Model::Pentagon);
        flags.insert(PortFlags::TRDOS_ROM);
        let map = rebank(Model::Pentagon, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::rom(rom.dos.unwrap()));
    }

    #[test]
    fn pentagon1024_extended_pages() {
        let (mut latches, flags, ts, rom) = setup(Model::Pentagon1024);
        latches.p_7ffd = 0xE7; // bits 0-2 and 5-7 all set
        let map = rebank(Model::Pentagon1024, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(63));
        // EFF7 bit 2 reverts to a plain 128k map
        latches.p_eff7 = 0x04;
        let map = rebank(Model::Pentagon1024, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(7));
    }

    #[test]
    fn scorpion_service_rom_and_ram_ext() {
        let (mut latches, flags, ts, rom) = setup(Model::Scorpion256);
        latches.p_1ffd = 0x02;
        let map = rebank(Model::Scorpion256, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::rom(rom.sys.unwrap()));
        latches.p_1ffd = 0x10;
        latches.p_7ffd = 0x05;
        let map = rebank(Model::Scorpion256, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(13));
    }

    #[test]
    fn tsconf_pages_are_direct() {
        let (latches, flags, mut ts, rom) = setup(Model::TsConf);
        ts.set(tsreg::PAGE3, 0xA5);
        ts.set(tsreg::MEMCONF, 0x01);
        ts.set(tsreg::PAGE0, 0x80);
        let map = rebank(Model::TsConf, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[3].page, PageId::ram(0xA5));
        assert_eq!(map.windows[0].page, PageId::ram(0x80));
        assert!(map.windows[0].writable);
    }

    #[test]
    fn cache_window_overrides_rom() {
        let (latches, mut flags, ts, rom) = setup(Model::Scorpion256);
        flags.insert(PortFlags::CACHE_ON);
        let map = rebank(Model::Scorpion256, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page, PageId::cache(0));
        assert!(map.windows[0].writable);
        flags.remove(PortFlags::CACHE_ON);
        let map = rebank(Model::Scorpion256, &latches, flags, &ts, &rom);
        assert_eq!(map.windows[0].page.kind(), crate::memory::PageKind::Rom);
    }

    #[test]
    fn screen_bank_follows_7ffd_bit3() {
        let mut latches = PortLatches::default();
        assert_eq!(Model::Spectrum128.screen_bank(&latches), 5);
        latches.p_7ffd = 0x08;
        assert_eq!(Model::Spectrum128.screen_bank(&latches), 7);
        assert_eq!(Model::Spectrum48.screen_bank(&latches), 5);
    }
}

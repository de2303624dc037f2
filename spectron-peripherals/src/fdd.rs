/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The WD1793 floppy disk controller of the Beta 128 interface.
//!
//! Sector I/O goes through the [DiskImage] abstraction; host-side image
//! failures surface to the CPU as controller status bits, never as
//! errors. The CPU sees the usual four registers plus the Beta system
//! port with DRQ/INTRQ mirrors.
use core::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Status bits of the WD1793, meaning depends on the command type.
pub mod status {
    pub const BUSY: u8 = 0x01;
    /// Type I: index pulse. Type II/III: DRQ.
    pub const INDEX: u8 = 0x02;
    pub const DRQ: u8 = 0x02;
    /// Type I: head at track 0. Type II/III: lost data.
    pub const TRACK0: u8 = 0x04;
    pub const LOST_DATA: u8 = 0x04;
    pub const CRC_ERROR: u8 = 0x08;
    /// Type I: seek error. Type II/III: record not found.
    pub const SEEK_ERROR: u8 = 0x10;
    pub const NOT_FOUND: u8 = 0x10;
    pub const HEAD_LOADED: u8 = 0x20;
    pub const WRITE_PROTECT: u8 = 0x40;
    pub const NOT_READY: u8 = 0x80;
}

/// A disk image failure at the abstraction boundary.
#[non_exhaustive]
#[derive(Debug)]
pub enum DiskError {
    NotReady,
    SectorNotFound,
    WriteProtected,
    Io(std::io::Error),
}

impl std::error::Error for DiskError {}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::NotReady => write!(f, "Drive is not ready"),
            DiskError::SectorNotFound => write!(f, "Sector not found"),
            DiskError::WriteProtected => write!(f, "Disk is write protected"),
            DiskError::Io(err) => err.fmt(f),
        }
    }
}

/// Sector-addressable disk image backing a drive.
///
/// TRD/SCL/UDI/FDI parsing lives outside the core; it only needs CHS
/// sector access and geometry.
pub trait DiskImage: Send {
    fn cylinders(&self) -> u8;
    fn sides(&self) -> u8;
    fn sectors(&self) -> u8;
    fn sector_size(&self) -> usize;
    fn read_sector(&mut self, cyl: u8, side: u8, sector: u8, buf: &mut [u8])
        -> Result<(), DiskError>;
    fn write_sector(&mut self, cyl: u8, side: u8, sector: u8, data: &[u8])
        -> Result<(), DiskError>;
    fn is_write_protected(&self) -> bool {
        false
    }
}

/// Index pulse period in T-states: one disk revolution at 300 rpm of a
/// 3.5 MHz machine.
const INDEX_PERIOD_TS: i64 = 700_000;
/// Index pulse width in T-states.
const INDEX_WIDTH_TS: i64 = 14_000;
/// Raw bytes in one unformatted track image.
const RAW_TRACK_LEN: usize = 6250;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    ReadData,
    WriteData,
    ReadAddress,
    ReadTrack,
    WriteTrack,
}

/// One WD1793 with up to four drives.
pub struct Wd1793 {
    drives: [Option<Box<dyn DiskImage>>; 4],
    drive: usize,
    side: u8,
    /// Physical head position of each drive.
    head: [u8; 4],
    track_reg: u8,
    sector_reg: u8,
    data_reg: u8,
    command: u8,
    status: u8,
    intrq: bool,
    phase: Phase,
    buffer: Vec<u8>,
    position: usize,
    step_out: bool,
    clock: i64,
    rng: SmallRng,
}

impl Default for Wd1793 {
    fn default() -> Self {
        Wd1793 {
            drives: [None, None, None, None],
            drive: 0,
            side: 0,
            head: [0; 4],
            track_reg: 0,
            sector_reg: 1,
            data_reg: 0,
            command: 0,
            status: 0,
            intrq: false,
            phase: Phase::Idle,
            buffer: Vec::new(),
            position: 0,
            step_out: false,
            clock: 0,
            rng: SmallRng::seed_from_u64(0x1793),
        }
    }
}

impl Wd1793 {
    pub fn new() -> Self {
        Wd1793::default()
    }

    pub fn insert_disk(&mut self, drive: usize, image: Box<dyn DiskImage>) {
        self.drives[drive & 3] = Some(image);
    }

    pub fn eject_disk(&mut self, drive: usize) -> Option<Box<dyn DiskImage>> {
        self.drives[drive & 3].take()
    }

    /// Advances the controller clock; drives the index pulse timing.
    pub fn advance(&mut self, tstates: i64) {
        self.clock += tstates;
    }

    /// Writes the Beta system port (0xFF): drive select, side and reset.
    pub fn write_system(&mut self, data: u8) {
        self.drive = (data & 0x03) as usize;
        self.side = ((data >> 4) & 1) ^ 1;
        if data & 0x04 == 0 {
            // /RESET low
            self.reset();
        }
    }

    /// Reads the Beta system port: INTRQ on bit 7, DRQ on bit 6.
    pub fn read_system(&self) -> u8 {
        let mut value = 0x3F;
        if self.intrq {
            value |= 0x80;
        }
        if self.phase != Phase::Idle {
            value |= 0x40;
        }
        value
    }

    pub fn reset(&mut self) {
        self.status = 0;
        self.track_reg = 0;
        self.sector_reg = 1;
        self.command = 0;
        self.phase = Phase::Idle;
        self.buffer.clear();
        self.position = 0;
        self.intrq = false;
    }

    /// Reads the status register, synthesizing the index pulse.
    pub fn read_status(&mut self) -> u8 {
        let mut status = self.status;
        if self.command & 0x80 == 0 {
            // Type I status carries the index pulse and TRACK0
            if self.clock % INDEX_PERIOD_TS < INDEX_WIDTH_TS {
                status |= status::INDEX;
            }
            if self.head[self.drive] == 0 {
                status |= status::TRACK0;
            }
            if self.drive_ref().map_or(false, |d| d.is_write_protected()) {
                status |= status::WRITE_PROTECT;
            }
        }
        else if self.phase != Phase::Idle {
            status |= status::DRQ | status::BUSY;
        }
        if self.drives[self.drive].is_none() {
            status |= status::NOT_READY;
        }
        self.intrq = false;
        status
    }

    pub fn read_track_reg(&self) -> u8 {
        self.track_reg
    }

    pub fn write_track_reg(&mut self, data: u8) {
        self.track_reg = data;
    }

    pub fn read_sector_reg(&self) -> u8 {
        self.sector_reg
    }

    pub fn write_sector_reg(&mut self, data: u8) {
        self.sector_reg = data;
    }

    /// Reads the data register; during a read phase this consumes the
    /// next transfer byte.
    pub fn read_data(&mut self) -> u8 {
        match self.phase {
            Phase::ReadData | Phase::ReadAddress | Phase::ReadTrack => {
                let byte = self.buffer.get(self.position).copied().unwrap_or(0);
                self.position += 1;
                if self.position >= self.buffer.len() {
                    self.complete();
                }
                self.data_reg = byte;
                byte
            }
            _ => self.data_reg,
        }
    }

    /// Writes the data register; during a write phase this feeds the
    /// transfer buffer.
    pub fn write_data(&mut self, data: u8) {
        self.data_reg = data;
        match self.phase {
            Phase::WriteData => {
                self.buffer[self.position] = data;
                self.position += 1;
                if self.position >= self.buffer.len() {
                    self.flush_write();
                }
            }
            Phase::WriteTrack => {
                self.position += 1;
                if self.position >= RAW_TRACK_LEN {
                    self.complete();
                }
            }
            _ => {}
        }
    }

    /// Writes the command register and starts execution.
    pub fn write_command(&mut self, cmd: u8) {
        if cmd & 0xF0 == 0xD0 {
            // force interrupt terminates any command
            self.command = cmd;
            self.complete();
            self.intrq = true;
            return;
        }
        if self.status & status::BUSY != 0 && self.phase != Phase::Idle {
            return;
        }
        self.command = cmd;
        self.intrq = false;
        self.status = 0;
        match cmd >> 4 {
            0x0 => self.cmd_restore(),
            0x1 => self.cmd_seek(),
            0x2 | 0x3 => self.cmd_step(self.step_out, cmd & 0x10 != 0),
            0x4 | 0x5 => self.cmd_step(false, cmd & 0x10 != 0),
            0x6 | 0x7 => self.cmd_step(true, cmd & 0x10 != 0),
            0x8 | 0x9 => self.cmd_read_sector(),
            0xA | 0xB => self.cmd_write_sector(),
            0xC => self.cmd_read_address(),
            0xE => self.cmd_read_track(),
            0xF => self.cmd_write_track(),
            _ => {}
        }
    }

    pub fn intrq(&self) -> bool {
        self.intrq
    }

    pub fn drq(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn drive_ref(&self) -> Option<&dyn DiskImage> {
        self.drives[self.drive].as_deref()
    }

    fn cmd_restore(&mut self) {
        self.head[self.drive] = 0;
        self.track_reg = 0;
        self.intrq = true;
    }

    fn cmd_seek(&mut self) {
        let target = self.data_reg;
        self.step_out = target < self.head[self.drive];
        self.head[self.drive] = target;
        self.track_reg = target;
        let cylinders = self.drive_ref().map_or(80, |d| d.cylinders());
        if target >= cylinders {
            self.status |= status::SEEK_ERROR;
        }
        self.intrq = true;
    }

    fn cmd_step(&mut self, out: bool, update: bool) {
        self.step_out = out;
        let head = &mut self.head[self.drive];
        if out {
            *head = head.saturating_sub(1);
        }
        else {
            *head = head.saturating_add(1);
        }
        if update {
            self.track_reg = *head;
        }
        self.intrq = true;
    }

    fn cmd_read_sector(&mut self) {
        let (cyl, side, sector) = (self.head[self.drive], self.side, self.sector_reg);
        let image = match self.drives[self.drive].as_mut() {
            Some(image) => image,
            None => {
                self.status |= status::NOT_READY;
                self.intrq = true;
                return;
            }
        };
        let size = image.sector_size();
        let mut buf = vec![0u8; size];
        match image.read_sector(cyl, side, sector, &mut buf) {
            Ok(()) => {
                self.buffer = buf;
                self.position = 0;
                self.phase = Phase::ReadData;
                self.status |= status::BUSY;
            }
            Err(err) => {
                log::debug!("WD1793 read error c{} h{} s{}: {}", cyl, side, sector, err);
                self.status |= status::NOT_FOUND;
                self.intrq = true;
            }
        }
    }

    fn cmd_write_sector(&mut self) {
        let protected = self.drive_ref().map_or(false, |d| d.is_write_protected());
        if protected {
            self.status |= status::WRITE_PROTECT;
            self.intrq = true;
            return;
        }
        let size = match self.drives[self.drive].as_ref() {
            Some(image) => image.sector_size(),
            None => {
                self.status |= status::NOT_READY;
                self.intrq = true;
                return;
            }
        };
        self.buffer = vec![0u8; size];
        self.position = 0;
        self.phase = Phase::WriteData;
        self.status |= status::BUSY;
    }

    fn cmd_read_address(&mut self) {
        let cyl = self.head[self.drive];
        let sectors = self.drive_ref().map_or(16, |d| d.sectors());
        let sector = (self.clock / 1000 % sectors as i64) as u8 + 1;
        // ID field: track, side, sector, size code, CRC
        self.buffer = vec![cyl, self.side, sector, 1, 0xF7, 0xF7];
        self.position = 0;
        self.phase = Phase::ReadAddress;
        self.status |= status::BUSY;
    }

    fn cmd_read_track(&mut self) {
        // raw track reads return gap filler with unstable bytes
        let mut raw = vec![0x4E; RAW_TRACK_LEN];
        for byte in raw.iter_mut().step_by(101) {
            *byte = self.rng.gen();
        }
        self.buffer = raw;
        self.position = 0;
        self.phase = Phase::ReadTrack;
        self.status |= status::BUSY;
    }

    fn cmd_write_track(&mut self) {
        if self.drives[self.drive].is_none() {
            self.status |= status::NOT_READY;
            self.intrq = true;
            return;
        }
        // formatting is accepted and discarded byte by byte
        self.position = 0;
        self.phase = Phase::WriteTrack;
        self.status |= status::BUSY;
    }

    fn flush_write(&mut self) {
        let (cyl, side, sector) = (self.head[self.drive], self.side, self.sector_reg);
        let buffer = core::mem::take(&mut self.buffer);
        if let Some(image) = self.drives[self.drive].as_mut() {
            if let Err(err) = image.write_sector(cyl, side, sector, &buffer) {
                log::debug!("WD1793 write error c{} h{} s{}: {}", cyl, side, sector, err);
                self.status |= status::NOT_FOUND;
            }
        }
        self.complete();
    }

    fn complete(&mut self) {
        self.phase = Phase::Idle;
        self.buffer.clear();
        self.position = 0;
        self.status &= !status::BUSY;
        self.intrq = true;
    }
}

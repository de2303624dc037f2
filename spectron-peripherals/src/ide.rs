/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A two-device ATA port state machine (master/slave).
//!
//! Implements the register file and the command subset the Spectrum IDE
//! interfaces exercise. Transfers run through an in-memory buffer of up
//! to 64 KiB (256 sectors); media failures surface as ERR status with an
//! error-register code, never as host errors.
use core::fmt;

/// ATA status register bits.
pub mod ata_status {
    pub const ERR: u8 = 0x01;
    pub const IDX: u8 = 0x02;
    pub const CORR: u8 = 0x04;
    pub const DRQ: u8 = 0x08;
    pub const DSC: u8 = 0x10;
    pub const DF: u8 = 0x20;
    pub const DRDY: u8 = 0x40;
    pub const BSY: u8 = 0x80;
}

/// ATA error register bits.
pub mod ata_error {
    pub const AMNF: u8 = 0x01;
    pub const TK0NF: u8 = 0x02;
    pub const ABRT: u8 = 0x04;
    pub const MCR: u8 = 0x08;
    pub const IDNF: u8 = 0x10;
    pub const MC: u8 = 0x20;
    pub const UNC: u8 = 0x40;
    pub const BBK: u8 = 0x80;
}

/// ATA command codes handled by [AtaDevice].
pub mod ata_cmd {
    pub const READ_SECTORS: u8 = 0x20;
    pub const READ_SECTORS_NORETRY: u8 = 0x21;
    pub const WRITE_SECTORS: u8 = 0x30;
    pub const WRITE_SECTORS_NORETRY: u8 = 0x31;
    pub const VERIFY_SECTORS: u8 = 0x40;
    pub const FORMAT_TRACK: u8 = 0x50;
    pub const IDENTIFY: u8 = 0xEC;
    pub const SET_FEATURES: u8 = 0xEF;
    pub const PACKET: u8 = 0xA0;
}

/// The 8 CS0 register offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AtaReg {
    Data = 0,
    Error = 1,
    SectorCount = 2,
    SectorNumber = 3,
    CylinderLow = 4,
    CylinderHigh = 5,
    DeviceHead = 6,
    Status = 7,
}

impl AtaReg {
    pub fn from_offset(offset: u8) -> AtaReg {
        match offset & 7 {
            0 => AtaReg::Data,
            1 => AtaReg::Error,
            2 => AtaReg::SectorCount,
            3 => AtaReg::SectorNumber,
            4 => AtaReg::CylinderLow,
            5 => AtaReg::CylinderHigh,
            6 => AtaReg::DeviceHead,
            _ => AtaReg::Status,
        }
    }
}

#[derive(Debug)]
pub enum MediaError {
    OutOfRange,
    Unreadable,
    Io(std::io::Error),
}

impl std::error::Error for MediaError {}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::OutOfRange => write!(f, "LBA out of range"),
            MediaError::Unreadable => write!(f, "Uncorrectable data"),
            MediaError::Io(err) => err.fmt(f),
        }
    }
}

/// LBA-addressable media backing one ATA device. 512-byte sectors.
pub trait AtaMedia: Send {
    fn total_sectors(&self) -> u32;
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; 512]) -> Result<(), MediaError>;
    fn write_sector(&mut self, lba: u32, data: &[u8; 512]) -> Result<(), MediaError>;
    fn is_read_only(&self) -> bool {
        false
    }
    fn model_name(&self) -> &str {
        "SPECTRON VIRTUAL DISK"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transfer {
    None,
    /// CPU reads words out of the buffer.
    Read,
    /// CPU writes words into the buffer; flushed when complete.
    Write,
}

/// One ATA device with its register file and transfer buffer.
pub struct AtaDevice {
    media: Option<Box<dyn AtaMedia>>,
    /// 0x00 master, 0x10 slave; compared against the devhead select bit.
    device_id: u8,
    error: u8,
    sector_count: u8,
    sector_number: u8,
    cylinder: u16,
    device_head: u8,
    status: u8,
    command: u8,
    buffer: Vec<u8>,
    position: usize,
    transfer: Transfer,
    /// First LBA of the active transfer.
    transfer_lba: u32,
}

impl AtaDevice {
    pub fn new(device_id: u8) -> Self {
        let mut dev = AtaDevice {
            media: None,
            device_id,
            error: 0,
            sector_count: 0,
            sector_number: 0,
            cylinder: 0,
            device_head: 0,
            status: 0,
            command: 0,
            buffer: Vec::new(),
            position: 0,
            transfer: Transfer::None,
            transfer_lba: 0,
        };
        dev.reset();
        dev
    }

    pub fn attach(&mut self, media: Box<dyn AtaMedia>) {
        self.media = Some(media);
        self.reset();
    }

    pub fn detach(&mut self) -> Option<Box<dyn AtaMedia>> {
        self.media.take()
    }

    /// Places the ATA reset signature in the registers.
    pub fn reset(&mut self) {
        self.error = ata_error::AMNF; // diagnostic passed code 0x01
        self.sector_count = 1;
        self.sector_number = 1;
        self.cylinder = 0;
        self.device_head = self.device_id;
        self.status = ata_status::DRDY | ata_status::DSC;
        self.transfer = Transfer::None;
        self.buffer.clear();
        self.position = 0;
    }

    fn selected_lba(&self) -> u32 {
        if self.device_head & 0x40 != 0 {
            // LBA mode
            ((self.device_head as u32 & 0x0F) << 24)
                | ((self.cylinder as u32) << 8)
                | self.sector_number as u32
        }
        else {
            // CHS translated against a fixed 16-head 63-sector geometry
            let cyl = self.cylinder as u32;
            let head = self.device_head as u32 & 0x0F;
            let sector = (self.sector_number as u32).max(1);
            (cyl * 16 + head) * 63 + sector - 1
        }
    }

    fn request_count(&self) -> usize {
        match self.sector_count {
            0 => 256,
            n => n as usize,
        }
    }

    fn abort(&mut self) {
        self.error = ata_error::ABRT;
        self.status = ata_status::DRDY | ata_status::DSC | ata_status::ERR;
        self.transfer = Transfer::None;
    }

    fn media_error(&mut self, err: MediaError) {
        log::debug!("ATA media error at lba {}: {}", self.transfer_lba, err);
        self.error = match err {
            MediaError::OutOfRange => ata_error::IDNF,
            MediaError::Unreadable => ata_error::UNC,
            MediaError::Io(_) => ata_error::BBK,
        };
        self.status = ata_status::DRDY | ata_status::DSC | ata_status::ERR;
        self.transfer = Transfer::None;
    }

    /// Executes a command written to the command register.
    pub fn exec_command(&mut self, cmd: u8) {
        self.command = cmd;
        self.error = 0;
        self.status &= !(ata_status::ERR | ata_status::DRQ);
        if self.media.is_none() {
            self.abort();
            return;
        }
        match cmd {
            ata_cmd::IDENTIFY => {
                self.buffer = self.identify_block().to_vec();
                self.position = 0;
                self.transfer = Transfer::Read;
                self.status = ata_status::DRDY | ata_status::DSC | ata_status::DRQ;
            }
            ata_cmd::READ_SECTORS | ata_cmd::READ_SECTORS_NORETRY => {
                let count = self.request_count();
                self.transfer_lba = self.selected_lba();
                let lba = self.transfer_lba;
                let mut data = vec![0u8; count * 512];
                let mut failure = None;
                if let Some(media) = self.media.as_mut() {
                    for n in 0..count {
                        let mut sector = [0u8; 512];
                        match media.read_sector(lba + n as u32, &mut sector) {
                            Ok(()) => data[n * 512..(n + 1) * 512].copy_from_slice(&sector),
                            Err(err) => {
                                failure = Some(err);
                                break;
                            }
                        }
                    }
                }
                if let Some(err) = failure {
                    self.media_error(err);
                    return;
                }
                self.buffer = data;
                self.position = 0;
                self.transfer = Transfer::Read;
                self.status = ata_status::DRDY | ata_status::DSC | ata_status::DRQ;
            }
            ata_cmd::WRITE_SECTORS | ata_cmd::WRITE_SECTORS_NORETRY => {
                if self.media.as_ref().map_or(true, |m| m.is_read_only()) {
                    self.abort();
                    return;
                }
                let count = self.request_count();
                self.transfer_lba = self.selected_lba();
                self.buffer = vec![0u8; count * 512];
                self.position = 0;
                self.transfer = Transfer::Write;
                self.status = ata_status::DRDY | ata_status::DSC | ata_status::DRQ;
            }
            ata_cmd::VERIFY_SECTORS => {
                let count = self.request_count();
                let lba = self.selected_lba();
                let mut failure = None;
                if let Some(media) = self.media.as_mut() {
                    let mut sector = [0u8; 512];
                    for n in 0..count {
                        if let Err(err) = media.read_sector(lba + n as u32, &mut sector) {
                            failure = Some((lba + n as u32, err));
                            break;
                        }
                    }
                }
                if let Some((lba, err)) = failure {
                    self.transfer_lba = lba;
                    self.media_error(err);
                    return;
                }
                self.status = ata_status::DRDY | ata_status::DSC;
            }
            ata_cmd::FORMAT_TRACK => {
                // accepted and ignored on LBA media
                self.status = ata_status::DRDY | ata_status::DSC;
            }
            ata_cmd::SET_FEATURES => {
                self.status = ata_status::DRDY | ata_status::DSC;
            }
            ata_cmd::PACKET => {
                // not an ATAPI device
                self.abort();
            }
            _ => self.abort(),
        }
    }

    /// A 512-byte IDENTIFY DEVICE block for the attached media.
    fn identify_block(&self) -> [u8; 512] {
        let mut block = [0u8; 512];
        let total = self.media.as_ref().map_or(0, |m| m.total_sectors());
        let put16 = |block: &mut [u8; 512], word: usize, value: u16| {
            block[word * 2] = value as u8;
            block[word * 2 + 1] = (value >> 8) as u8;
        };
        put16(&mut block, 0, 0x0040); // fixed device
        let cylinders = (total / (16 * 63)).min(16383) as u16;
        put16(&mut block, 1, cylinders);
        put16(&mut block, 3, 16); // heads
        put16(&mut block, 6, 63); // sectors per track
        put16(&mut block, 49, 0x0200); // LBA supported
        put16(&mut block, 60, total as u16);
        put16(&mut block, 61, (total >> 16) as u16);
        // model name in word-swapped ASCII at words 27..=46
        let name = self.media.as_ref().map_or("", |m| m.model_name());
        let mut model = [b' '; 40];
        for (dst, src) in model.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
        for (n, pair) in model.chunks_exact(2).enumerate() {
            block[(27 + n) * 2] = pair[1];
            block[(27 + n) * 2 + 1] = pair[0];
        }
        block
    }

    /// Reads the 16-bit data register.
    pub fn read_data(&mut self) -> u16 {
        if self.transfer != Transfer::Read {
            return 0xFFFF;
        }
        let lo = self.buffer.get(self.position).copied().unwrap_or(0);
        let hi = self.buffer.get(self.position + 1).copied().unwrap_or(0);
        self.position += 2;
        if self.position >= self.buffer.len() {
            self.transfer = Transfer::None;
            self.status &= !ata_status::DRQ;
        }
        u16::from_le_bytes([lo, hi])
    }

    /// Writes the 16-bit data register.
    pub fn write_data(&mut self, value: u16) {
        if self.transfer != Transfer::Write {
            return;
        }
        let [lo, hi] = value.to_le_bytes();
        if self.position + 1 < self.buffer.len() {
            self.buffer[self.position] = lo;
            self.buffer[self.position + 1] = hi;
        }
        self.position += 2;
        if self.position >= self.buffer.len() {
            self.flush_write();
        }
    }

    fn flush_write(&mut self) {
        let buffer = core::mem::take(&mut self.buffer);
        self.transfer = Transfer::None;
        self.status &= !ata_status::DRQ;
        let lba = self.transfer_lba;
        let mut failure = None;
        if let Some(media) = self.media.as_mut() {
            for (n, chunk) in buffer.chunks_exact(512).enumerate() {
                let mut sector = [0u8; 512];
                sector.copy_from_slice(chunk);
                if let Err(err) = media.write_sector(lba + n as u32, &sector) {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            self.media_error(err);
            return;
        }
        self.status = ata_status::DRDY | ata_status::DSC;
    }

    pub fn read_reg(&mut self, reg: AtaReg) -> u8 {
        match reg {
            AtaReg::Data => self.read_data() as u8,
            AtaReg::Error => self.error,
            AtaReg::SectorCount => self.sector_count,
            AtaReg::SectorNumber => self.sector_number,
            AtaReg::CylinderLow => self.cylinder as u8,
            AtaReg::CylinderHigh => (self.cylinder >> 8) as u8,
            AtaReg::DeviceHead => self.device_head,
            AtaReg::Status => self.status,
        }
    }

    pub fn write_reg(&mut self, reg: AtaReg, value: u8) {
        match reg {
            AtaReg::Data => self.write_data(value as u16),
            AtaReg::Error => {} // features, ignored
            AtaReg::SectorCount => self.sector_count = value,
            AtaReg::SectorNumber => self.sector_number = value,
            AtaReg::CylinderLow => self.cylinder = (self.cylinder & 0xFF00) | value as u16,
            AtaReg::CylinderHigh => {
                self.cylinder = (self.cylinder & 0x00FF) | ((value as u16) << 8)
            }
            AtaReg::DeviceHead => self.device_head = value,
            AtaReg::Status => self.exec_command(value),
        }
    }
}

/// The master/slave pair sharing one cable.
pub struct IdeBus {
    devices: [AtaDevice; 2],
    selected: usize,
}

impl Default for IdeBus {
    fn default() -> Self {
        IdeBus {
            devices: [AtaDevice::new(0x00), AtaDevice::new(0x10)],
            selected: 0,
        }
    }
}

impl IdeBus {
    pub fn new() -> Self {
        IdeBus::default()
    }

    pub fn attach(&mut self, slot: usize, media: Box<dyn AtaMedia>) {
        self.devices[slot & 1].attach(media);
    }

    pub fn device_mut(&mut self, slot: usize) -> &mut AtaDevice {
        &mut self.devices[slot & 1]
    }

    pub fn read(&mut self, reg: AtaReg) -> u8 {
        self.devices[self.selected].read_reg(reg)
    }

    pub fn read_data16(&mut self) -> u16 {
        self.devices[self.selected].read_data()
    }

    pub fn write_data16(&mut self, value: u16) {
        self.devices[self.selected].write_data(value)
    }

    pub fn write(&mut self, reg: AtaReg, value: u8) {
        if reg == AtaReg::DeviceHead {
            self.selected = ((value & 0x10) >> 4) as usize;
            for dev in self.devices.iter_mut() {
                dev.device_head = value;
            }
            return;
        }
        self.devices[self.selected].write_reg(reg, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemMedia {
        data: Vec<u8>,
    }

    impl MemMedia {
        fn new(sectors: u32) -> Self {
            MemMedia { data: vec![0; sectors as usize * 512] }
        }
    }

    impl AtaMedia for MemMedia {
        fn total_sectors(&self) -> u32 {
            (self.data.len() / 512) as u32
        }

        fn read_sector(&mut self, lba: u32, buf: &mut [u8; 512]) -> Result<(), MediaError> {
            let off = lba as usize * 512;
            if off + 512 > self.data.len() {
                return Err(MediaError::OutOfRange);
            }
            buf.copy_from_slice(&self.data[off..off + 512]);
            Ok(())
        }

        fn write_sector(&mut self, lba: u32, data: &[u8; 512]) -> Result<(), MediaError> {
            let off = lba as usize * 512;
            if off + 512 > self.data.len() {
                return Err(MediaError::OutOfRange);
            }
            self.data[off..off + 512].copy_from_slice(data);
            Ok(())
        }
    }

    fn device_with_media() -> AtaDevice {
        let mut dev = AtaDevice::new(0x00);
        let mut media = MemMedia::new(1024);
        media.data[5 * 512] = 0xAB;
        media.data[5 * 512 + 1] = 0xCD;
        dev.attach(Box::new(media));
        dev
    }

    fn select_lba(dev: &mut AtaDevice, lba: u32, count: u8) {
        dev.write_reg(AtaReg::SectorCount, count);
        dev.write_reg(AtaReg::SectorNumber, lba as u8);
        dev.write_reg(AtaReg::CylinderLow, (lba >> 8) as u8);
        dev.write_reg(AtaReg::CylinderHigh, (lba >> 16) as u8);
        dev.write_reg(AtaReg::DeviceHead, 0x40 | ((lba >> 24) as u8 & 0x0F));
    }

    #[test]
    fn reset_signature() {
        let dev = device_with_media();
        assert_eq!(dev.sector_count, 1);
        assert_eq!(dev.sector_number, 1);
        assert!(dev.status & ata_status::DRDY != 0);
        assert!(dev.status & ata_status::BSY == 0);
    }

    #[test]
    fn identify_reports_geometry() {
        let mut dev = device_with_media();
        dev.exec_command(ata_cmd::IDENTIFY);
        assert!(dev.read_reg(AtaReg::Status) & ata_status::DRQ != 0);
        let mut words = [0u16; 256];
        for word in words.iter_mut() {
            *word = dev.read_data();
        }
        assert_eq!(words[0], 0x0040);
        assert_eq!(words[3], 16);
        assert_eq!(words[6], 63);
        assert_eq!(words[60] as u32 | (words[61] as u32) << 16, 1024);
        assert!(dev.read_reg(AtaReg::Status) & ata_status::DRQ == 0);
    }

    #[test]
    fn read_sector_by_lba() {
        let mut dev = device_with_media();
        select_lba(&mut dev, 5, 1);
        dev.exec_command(ata_cmd::READ_SECTORS);
        assert!(dev.read_reg(AtaReg::Status) & ata_status::DRQ != 0);
        assert_eq!(dev.read_data(), 0xCDAB);
        for _ in 1..256 {
            dev.read_data();
        }
        assert!(dev.read_reg(AtaReg::Status) & ata_status::DRQ == 0);
        assert!(dev.read_reg(AtaReg::Status) & ata_status::ERR == 0);
    }

    #[test]
    fn write_then_read_back() {
        let mut dev = device_with_media();
        select_lba(&mut dev, 7, 1);
        dev.exec_command(ata_cmd::WRITE_SECTORS);
        for n in 0..256u16 {
            dev.write_data(n);
        }
        assert!(dev.read_reg(AtaReg::Status) & ata_status::DRQ == 0);
        select_lba(&mut dev, 7, 1);
        dev.exec_command(ata_cmd::READ_SECTORS);
        assert_eq!(dev.read_data(), 0);
        assert_eq!(dev.read_data(), 1);
    }

    #[test]
    fn out_of_range_sets_idnf() {
        let mut dev = device_with_media();
        select_lba(&mut dev, 5000, 1);
        dev.exec_command(ata_cmd::READ_SECTORS);
        let status = dev.read_reg(AtaReg::Status);
        assert!(status & ata_status::ERR != 0);
        assert_eq!(dev.read_reg(AtaReg::Error), ata_error::IDNF);
    }

    #[test]
    fn unknown_command_aborts() {
        let mut dev = device_with_media();
        dev.exec_command(0xDC);
        assert!(dev.read_reg(AtaReg::Status) & ata_status::ERR != 0);
        assert_eq!(dev.read_reg(AtaReg::Error), ata_error::ABRT);
        // ATAPI PACKET on a plain disk aborts as well
        dev.exec_command(ata_cmd::PACKET);
        assert_eq!(dev.read_reg(AtaReg::Error), ata_error::ABRT);
    }

    #[test]
    fn verify_checks_without_transfer() {
        let mut dev = device_with_media();
        select_lba(&mut dev, 0, 4);
        dev.exec_command(ata_cmd::VERIFY_SECTORS);
        let status = dev.read_reg(AtaReg::Status);
        assert!(status & ata_status::DRQ == 0);
        assert!(status & ata_status::ERR == 0);
    }

    #[test]
    fn sector_count_zero_means_256() {
        let mut dev = device_with_media();
        select_lba(&mut dev, 0, 0);
        dev.exec_command(ata_cmd::READ_SECTORS);
        let mut words = 0usize;
        while dev.read_reg(AtaReg::Status) & ata_status::DRQ != 0 {
            dev.read_data();
            words += 1;
        }
        assert_eq!(words, 256 * 256);
    }

    #[test]
    fn bus_selects_master_slave() {
        let mut bus = IdeBus::new();
        bus.attach(0, Box::new(MemMedia::new(64)));
        // slave has no media: commands abort
        bus.write(AtaReg::DeviceHead, 0x10);
        bus.write(AtaReg::Status, ata_cmd::IDENTIFY);
        assert!(bus.read(AtaReg::Status) & ata_status::ERR != 0);
        bus.write(AtaReg::DeviceHead, 0x00);
        bus.write(AtaReg::Status, ata_cmd::IDENTIFY);
        assert!(bus.read(AtaReg::Status) & ata_status::DRQ != 0);
    }
}

/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Typed machine snapshots.
//!
//! File formats (SNA, Z80, project YAML) are parsed outside the core;
//! this is the in-memory form they convert to and from. The round-trip
//! set covers registers, interrupt state, memory pages by index, latched
//! ports and the model.
use core::fmt;

use spectron_core::banking::Model;
use spectron_core::memory::PAGE_SIZE;
use spectron_core::ports::{PortFlags, PortLatches};
use spectron_core::z80::IntMode;

use crate::machine::Machine;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

#[non_exhaustive]
#[derive(Debug)]
pub enum SnapshotError {
    /// A RAM page blob is not exactly one page long.
    BadPageSize { bank: u8, len: usize },
    /// A bank index beyond what the snapshot's model provides.
    BankOutOfRange { bank: u8 },
    /// The snapshot was captured from a different model.
    ModelMismatch { expected: Model, found: Model },
    /// The extension register or palette blob has the wrong length.
    BadExtensionState,
}

impl std::error::Error for SnapshotError {}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::BadPageSize { bank, len } => {
                write!(f, "RAM bank {} has {} bytes, expected {}", bank, len, PAGE_SIZE)
            }
            SnapshotError::BankOutOfRange { bank } => {
                write!(f, "RAM bank {} does not exist on this model", bank)
            }
            SnapshotError::ModelMismatch { expected, found } => {
                write!(f, "snapshot is for {:?}, machine is {:?}", found, expected)
            }
            SnapshotError::BadExtensionState => {
                write!(f, "extension state blob has the wrong length")
            }
        }
    }
}

/// One RAM bank captured by index.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RamPage {
    pub bank: u8,
    pub data: Vec<u8>,
}

/// The register file portion of a snapshot.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CpuState {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
}

/// A complete typed snapshot.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotState {
    pub model: Model,
    pub cpu: CpuState,
    pub latches: PortLatches,
    pub port_flags: u8,
    pub ay_regs: [u8; 16],
    pub ay_selected: u8,
    /// The TSConf extension register file; carried for every model so
    /// the layout stays uniform.
    pub ts_regs: Vec<u8>,
    /// The TSConf palette RAM.
    pub cram: Vec<u16>,
    pub ram: Vec<RamPage>,
}

impl SnapshotState {
    /// Captures the current machine state.
    pub fn capture(machine: &Machine) -> SnapshotState {
        let cpu = &machine.cpu;
        let board = &machine.board;
        let ram = (0..board.model.ram_pages() as u16)
            .map(|bank| RamPage {
                bank: bank as u8,
                data: board.memory.ram_bank(bank as u8).to_vec(),
            })
            .collect();
        SnapshotState {
            model: board.model,
            cpu: CpuState {
                af: cpu.af(),
                bc: cpu.bc(),
                de: cpu.de(),
                hl: cpu.hl(),
                af_alt: u16::from_le_bytes([cpu.f_alt, cpu.a_alt]),
                bc_alt: u16::from_le_bytes([cpu.c_alt, cpu.b_alt]),
                de_alt: u16::from_le_bytes([cpu.e_alt, cpu.d_alt]),
                hl_alt: u16::from_le_bytes([cpu.l_alt, cpu.h_alt]),
                ix: cpu.ix,
                iy: cpu.iy,
                sp: cpu.sp,
                pc: cpu.pc,
                i: cpu.i,
                r: cpu.r,
                iff1: cpu.iff1,
                iff2: cpu.iff2,
                im: cpu.im as u8,
                halted: cpu.halted,
            },
            latches: board.latches,
            port_flags: board.flags.bits(),
            ay_regs: {
                let mut regs = [0u8; 16];
                for (n, reg) in regs.iter_mut().enumerate() {
                    *reg = board.ay.reg(n as u8);
                }
                regs
            },
            ay_selected: board.ay.selected_reg(),
            ts_regs: board.ts_regs.regs.to_vec(),
            cram: board.ts_video.cram.to_vec(),
            ram,
        }
    }

    /// Restores this snapshot into a machine of the same model.
    ///
    /// On error nothing is modified.
    pub fn apply(&self, machine: &mut Machine) -> Result<(), SnapshotError> {
        if machine.board.model != self.model {
            return Err(SnapshotError::ModelMismatch {
                expected: machine.board.model,
                found: self.model,
            });
        }
        if self.ts_regs.len() != 256 || self.cram.len() != 256 {
            return Err(SnapshotError::BadExtensionState);
        }
        let max_bank = self.model.ram_pages();
        for page in &self.ram {
            if page.data.len() != PAGE_SIZE {
                return Err(SnapshotError::BadPageSize {
                    bank: page.bank,
                    len: page.data.len(),
                });
            }
            if page.bank as u16 >= max_bank {
                return Err(SnapshotError::BankOutOfRange { bank: page.bank });
            }
        }

        let cpu = &mut machine.cpu;
        let state = &self.cpu;
        cpu.set_af(state.af);
        cpu.set_bc(state.bc);
        cpu.set_de(state.de);
        cpu.set_hl(state.hl);
        let [f_alt, a_alt] = state.af_alt.to_le_bytes();
        let [c_alt, b_alt] = state.bc_alt.to_le_bytes();
        let [e_alt, d_alt] = state.de_alt.to_le_bytes();
        let [l_alt, h_alt] = state.hl_alt.to_le_bytes();
        cpu.a_alt = a_alt;
        cpu.f_alt = f_alt;
        cpu.b_alt = b_alt;
        cpu.c_alt = c_alt;
        cpu.d_alt = d_alt;
        cpu.e_alt = e_alt;
        cpu.h_alt = h_alt;
        cpu.l_alt = l_alt;
        cpu.ix = state.ix;
        cpu.iy = state.iy;
        cpu.sp = state.sp;
        cpu.pc = state.pc;
        cpu.i = state.i;
        cpu.r = state.r;
        cpu.iff1 = state.iff1;
        cpu.iff2 = state.iff2;
        cpu.im = IntMode::from_bits(state.im);
        cpu.halted = state.halted;

        for page in &self.ram {
            machine.board.memory.ram_bank_mut(page.bank).copy_from_slice(&page.data);
        }
        machine.board.latches = self.latches;
        machine.board.flags = PortFlags::from_bits_truncate(self.port_flags);
        // writing through the register interface recomputes the
        // generator periods
        for (n, reg) in self.ay_regs.iter().enumerate() {
            machine.board.ay.write_reg(n as u8, *reg);
        }
        machine.board.ay.select_reg(self.ay_selected);
        machine.board.ts_regs.regs.copy_from_slice(&self.ts_regs);
        for (n, color) in self.cram.iter().enumerate() {
            machine.board.ts_video.write_cram(n as u8, *color);
        }
        machine.board.rebank();
        Ok(())
    }
}

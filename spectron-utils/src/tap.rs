/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Standard-ROM tape pulse encoding.
//!
//! Converts raw tape block bytes into the pulse stream the tape deck
//! consumes, using the loader timings of the original firmware. TAP/TZX
//! container parsing stays with the frontend; this only encodes one
//! block's bytes (flag byte, payload, checksum) into pulses.
use spectron_peripherals::tape::{Pulse, PulseSource};

/// One pilot tone pulse, in T-states.
pub const PILOT_PULSE: u32 = 2168;
/// The two sync pulses ending the pilot tone.
pub const SYNC1_PULSE: u32 = 667;
pub const SYNC2_PULSE: u32 = 735;
/// Half-pulse of a zero bit.
pub const BIT0_PULSE: u32 = 855;
/// Half-pulse of a one bit.
pub const BIT1_PULSE: u32 = 1710;
/// Pilot pulses before a header block (flag byte < 128).
pub const PILOT_HEADER_COUNT: u32 = 8063;
/// Pilot pulses before a data block.
pub const PILOT_DATA_COUNT: u32 = 3223;
/// Silence after a block, in T-states (about one second).
pub const BLOCK_PAUSE: u32 = 3_500_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Pilot(u32),
    Sync1,
    Sync2,
    /// (byte index, bit index 0..=7, second half-pulse)
    Bit(usize, u8, bool),
    Pause,
    Done,
}

/// A [PulseSource] encoding one tape block with standard timings.
pub struct TapBlockPulses {
    data: Vec<u8>,
    stage: Stage,
    level: bool,
}

impl TapBlockPulses {
    /// Encodes `data` (flag byte, payload and checksum) as one block.
    ///
    /// The pilot length follows the flag byte: header blocks carry the
    /// longer tone.
    pub fn new(data: Vec<u8>) -> Self {
        let pilot = match data.first() {
            Some(&flag) if flag < 0x80 => PILOT_HEADER_COUNT,
            _ => PILOT_DATA_COUNT,
        };
        TapBlockPulses { data, stage: Stage::Pilot(pilot), level: false }
    }

    #[inline]
    fn bit_pulse(&self, byte: usize, bit: u8) -> u32 {
        // bits leave the tape most significant first
        if self.data[byte] & (0x80 >> bit) != 0 {
            BIT1_PULSE
        }
        else {
            BIT0_PULSE
        }
    }

    fn emit(&mut self, duration: u32) -> Option<Pulse> {
        self.level = !self.level;
        Some(Pulse::new(self.level, duration))
    }
}

impl PulseSource for TapBlockPulses {
    fn next_pulse(&mut self) -> Option<Pulse> {
        match self.stage {
            Stage::Pilot(left) => {
                self.stage = if left > 1 { Stage::Pilot(left - 1) } else { Stage::Sync1 };
                self.emit(PILOT_PULSE)
            }
            Stage::Sync1 => {
                self.stage = Stage::Sync2;
                self.emit(SYNC1_PULSE)
            }
            Stage::Sync2 => {
                self.stage = if self.data.is_empty() {
                    Stage::Pause
                }
                else {
                    Stage::Bit(0, 0, false)
                };
                self.emit(SYNC2_PULSE)
            }
            Stage::Bit(byte, bit, second) => {
                let duration = self.bit_pulse(byte, bit);
                self.stage = if !second {
                    Stage::Bit(byte, bit, true)
                }
                else if bit < 7 {
                    Stage::Bit(byte, bit + 1, false)
                }
                else if byte + 1 < self.data.len() {
                    Stage::Bit(byte + 1, 0, false)
                }
                else {
                    Stage::Pause
                };
                self.emit(duration)
            }
            Stage::Pause => {
                self.stage = Stage::Done;
                self.level = false;
                Some(Pulse::new(false, BLOCK_PAUSE))
            }
            Stage::Done => None,
        }
    }
}

/// Chains several blocks into one continuous tape.
pub fn tape_from_blocks(blocks: Vec<Vec<u8>>) -> Box<dyn PulseSource + Send> {
    struct Chain {
        blocks: std::vec::IntoIter<Vec<u8>>,
        current: Option<TapBlockPulses>,
    }

    impl PulseSource for Chain {
        fn next_pulse(&mut self) -> Option<Pulse> {
            loop {
                if let Some(block) = self.current.as_mut() {
                    if let Some(pulse) = block.next_pulse() {
                        return Some(pulse);
                    }
                }
                match self.blocks.next() {
                    Some(data) => self.current = Some(TapBlockPulses::new(data)),
                    None => return None,
                }
            }
        }
    }

    Box::new(Chain { blocks: blocks.into_iter(), current: None })
}

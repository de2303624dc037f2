/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The 1-bit beeper fed from port 0xFE writes and the tape input.
use spectron_core::clock::FTs;

/// Amplitude of the EAR output bit (port 0xFE bit 4).
pub const EAR_AMPLITUDE: i16 = 0x3000;
/// Amplitude of the MIC output bit (port 0xFE bit 3).
pub const MIC_AMPLITUDE: i16 = 0x0C00;
/// Amplitude the tape input contributes when mixed in.
pub const TAPE_IN_AMPLITUDE: i16 = 0x0400;

/// A timestamped 1-bit source rendered into per-frame PCM16.
///
/// Level edges are recorded in T-state order as the CPU writes the port;
/// rendering resamples them onto the frame's sample grid.
#[derive(Clone, Debug)]
pub struct Beeper {
    changes: Vec<(FTs, i16)>,
    level: i16,
    /// The level the current frame started on.
    frame_start: i16,
    /// Whether the tape input bit is mixed into the output.
    pub mix_tape_in: bool,
    ear: bool,
    mic: bool,
    tape_in: bool,
}

impl Default for Beeper {
    fn default() -> Self {
        Beeper {
            changes: Vec::with_capacity(256),
            level: 0,
            frame_start: 0,
            mix_tape_in: true,
            ear: false,
            mic: false,
            tape_in: false,
        }
    }
}

impl Beeper {
    pub fn new() -> Self {
        Beeper::default()
    }

    /// Records a port 0xFE write at `ts`: bit 4 is EAR, bit 3 is MIC.
    pub fn write_port(&mut self, ts: FTs, data: u8) {
        self.ear = data & 0x10 != 0;
        self.mic = data & 0x08 != 0;
        self.push_level(ts);
    }

    /// Records a tape input level change at `ts`.
    pub fn set_tape_in(&mut self, ts: FTs, high: bool) {
        self.tape_in = high;
        self.push_level(ts);
    }

    fn push_level(&mut self, ts: FTs) {
        let mut level = 0i16;
        if self.ear {
            level += EAR_AMPLITUDE;
        }
        if self.mic {
            level += MIC_AMPLITUDE;
        }
        if self.mix_tape_in && self.tape_in {
            level += TAPE_IN_AMPLITUDE;
        }
        if level != self.level {
            self.changes.push((ts, level));
            self.level = level;
        }
    }

    /// Renders one frame of `out.len()` mono samples covering
    /// `ts_per_frame` T-states, then retains only the trailing level.
    pub fn render_frame(&mut self, ts_per_frame: FTs, out: &mut [i16]) {
        let n = out.len();
        let mut change = 0usize;
        let mut level = self.frame_start;
        for (i, sample) in out.iter_mut().enumerate() {
            let ts = (i as i64 * ts_per_frame as i64 / n as i64) as FTs;
            while change < self.changes.len() && self.changes[change].0 <= ts {
                level = self.changes[change].1;
                change += 1;
            }
            *sample = level;
        }
        self.changes.clear();
        self.frame_start = self.level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_wave_renders_edges() {
        let mut beeper = Beeper::new();
        // toggle EAR at the quarter points of a 1000 T-state frame
        beeper.write_port(250, 0x10);
        beeper.write_port(500, 0x00);
        beeper.write_port(750, 0x10);
        let mut out = [0i16; 100];
        beeper.render_frame(1000, &mut out);
        assert_eq!(out[0], 0);
        assert_eq!(out[30], EAR_AMPLITUDE);
        assert_eq!(out[60], 0);
        assert_eq!(out[80], EAR_AMPLITUDE);
    }

    #[test]
    fn level_carries_across_frames() {
        let mut beeper = Beeper::new();
        beeper.write_port(100, 0x10);
        let mut out = [0i16; 10];
        beeper.render_frame(1000, &mut out);
        assert_eq!(out[9], EAR_AMPLITUDE);
        // next frame with no edges stays high
        let mut out = [0i16; 10];
        beeper.render_frame(1000, &mut out);
        assert!(out.iter().all(|&s| s == EAR_AMPLITUDE));
    }

    #[test]
    fn tape_in_mixes_at_lower_amplitude() {
        let mut beeper = Beeper::new();
        beeper.write_port(0, 0x10);
        beeper.set_tape_in(500, true);
        let mut out = [0i16; 100];
        beeper.render_frame(1000, &mut out);
        assert_eq!(out[10], EAR_AMPLITUDE);
        assert_eq!(out[99], EAR_AMPLITUDE + TAPE_IN_AMPLITUDE);
    }

    #[test]
    fn tape_in_can_be_disabled() {
        let mut beeper = Beeper::new();
        beeper.mix_tape_in = false;
        beeper.set_tape_in(0, true);
        let mut out = [0i16; 10];
        beeper.render_frame(1000, &mut out);
        assert!(out.iter().all(|&s| s == 0));
    }
}

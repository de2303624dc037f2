/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! T-state accounting and per-model frame timings.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// A linear T-state timestamp type.
///
/// One `FTs` unit is a single CPU clock tick, the fundamental timing unit
/// of the emulation.
pub type FTs = i32;

/// The number of frames after which the FLASH attribute phase toggles.
pub const FLASH_PERIOD_FRAMES: u64 = 16;

/// Fixed frame structure of one emulated video frame.
///
/// All values are expressed in T-states or scan lines counted from the
/// interrupt point at the very top of the frame.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrameTimings {
    /// CPU clock in Hz.
    pub cpu_hz: u32,
    /// Total T-states in one frame.
    pub ts_per_frame: FTs,
    /// T-states in one scan line.
    pub ts_per_line: FTs,
    /// Total scan lines per frame, including blanking.
    pub lines_per_frame: u16,
    /// Scan lines above the first border line.
    pub lines_upper_blank: u16,
    /// Border lines above the paper area.
    pub lines_upper_border: u16,
    /// Border lines below the paper area.
    pub lines_lower_border: u16,
    /// T-state at which the paper area of a line begins, relative to the
    /// start of that line.
    pub line_paper_start: FTs,
    /// How long the frame interrupt request stays active, in T-states.
    pub int_length: FTs,
}

impl FrameTimings {
    /// Timings of the 48k ULA.
    pub const SPECTRUM48: FrameTimings = FrameTimings {
        cpu_hz: 3_500_000,
        ts_per_frame: 69888,
        ts_per_line: 224,
        lines_per_frame: 312,
        lines_upper_blank: 16,
        lines_upper_border: 48,
        lines_lower_border: 56,
        line_paper_start: 64,
        int_length: 32,
    };
    /// Timings of the 128k/+2 ULA.
    pub const SPECTRUM128: FrameTimings = FrameTimings {
        cpu_hz: 3_546_900,
        ts_per_frame: 70908,
        ts_per_line: 228,
        lines_per_frame: 311,
        lines_upper_blank: 15,
        lines_upper_border: 48,
        lines_lower_border: 56,
        line_paper_start: 64,
        int_length: 36,
    };
    /// Timings of the Pentagon and most Soviet clones.
    pub const PENTAGON: FrameTimings = FrameTimings {
        cpu_hz: 3_500_000,
        ts_per_frame: 71680,
        ts_per_line: 224,
        lines_per_frame: 320,
        lines_upper_blank: 16,
        lines_upper_border: 64,
        lines_lower_border: 48,
        line_paper_start: 68,
        int_length: 32,
    };
    /// Timings of the TS-Configuration FPGA clone.
    pub const TSCONF: FrameTimings = FrameTimings {
        cpu_hz: 7_000_000,
        ts_per_frame: 143360,
        ts_per_line: 448,
        lines_per_frame: 320,
        lines_upper_blank: 16,
        lines_upper_border: 64,
        lines_lower_border: 48,
        line_paper_start: 136,
        int_length: 64,
    };

    /// Frames per second of the emulated video signal.
    pub fn frame_rate(&self) -> f64 {
        self.cpu_hz as f64 / self.ts_per_frame as f64
    }

    /// How many stereo sample pairs a single frame produces at `sample_rate`.
    pub fn samples_per_frame(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 / self.frame_rate()).round() as usize
    }

    /// The scan line index a frame timestamp falls into.
    #[inline]
    pub fn line_of(&self, ts: FTs) -> u16 {
        debug_assert!(ts >= 0);
        (ts / self.ts_per_line) as u16
    }

    /// First scan line of the 192-line paper area.
    #[inline]
    pub fn first_paper_line(&self) -> u16 {
        self.lines_upper_blank + self.lines_upper_border
    }

    /// Returns `true` while the frame interrupt request is active at `ts`.
    #[inline]
    pub fn is_int_active(&self, ts: FTs) -> bool {
        ts >= 0 && ts < self.int_length
    }
}

/// Per-frame clock state of a single emulator instance.
///
/// The T-state counter is owned by the CPU while it runs; this type tracks
/// the frame counter and the wall progression between frames.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FrameClock {
    /// Monotonically increasing frame counter, wrapping at 2^64.
    pub frames: u64,
    /// Total T-states executed since power-on, for NTStates stepping.
    pub total_ts: i64,
}

impl FrameClock {
    /// Advances the frame counter after a completed frame of `ts` T-states.
    pub fn end_frame(&mut self, ts: FTs) {
        self.frames = self.frames.wrapping_add(1);
        self.total_ts += ts as i64;
    }

    /// Current phase of the FLASH attribute swap.
    #[inline]
    pub fn flash_state(&self) -> bool {
        (self.frames / FLASH_PERIOD_FRAMES) & 1 == 1
    }
}

/// The ULA memory contention pattern.
///
/// At T-states where the ULA fetches screen data the CPU is stalled when
/// accessing a contended page. The pattern repeats every 8 T-states within
/// the paper area of a line: 6, 5, 4, 3, 2, 1, 0, 0.
#[inline]
pub fn contention_delay(timings: &FrameTimings, ts: FTs) -> FTs {
    let line = ts / timings.ts_per_line;
    let paper_first = timings.first_paper_line() as FTs;
    if line < paper_first || line >= paper_first + 192 {
        return 0;
    }
    let hc = ts % timings.ts_per_line - timings.line_paper_start;
    if !(0..128).contains(&hc) {
        return 0;
    }
    match hc & 7 {
        0 => 6,
        1 => 5,
        2 => 4,
        3 => 3,
        4 => 2,
        5 => 1,
        _ => 0,
    }
}

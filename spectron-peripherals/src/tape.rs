/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The software tape deck.
//!
//! File parsing lives outside the core; the deck consumes a
//! [PulseSource] delivering EAR levels with durations in T-states and
//! answers `ear_in` queries from the ULA port read path.

/// One tape pulse: the EAR level and how long it lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    pub level: bool,
    /// Duration in CPU T-states.
    pub duration: u32,
}

impl Pulse {
    pub fn new(level: bool, duration: u32) -> Self {
        Pulse { level, duration }
    }
}

/// A stream of tape pulses, typically decoded from TAP/TZX blocks.
pub trait PulseSource {
    /// The next pulse, or `None` at the end of the tape.
    fn next_pulse(&mut self) -> Option<Pulse>;
}

impl<I: Iterator<Item = Pulse>> PulseSource for I {
    fn next_pulse(&mut self) -> Option<Pulse> {
        self.next()
    }
}

/// Playback state of the tape deck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapeState {
    Stopped,
    Playing,
    EndOfTape,
}

/// The tape deck: advances through pulses against the emulated clock.
///
/// Timestamps passed to [TapeDeck::ear_in] are global monotonic T-states
/// (they never wrap at frame boundaries).
pub struct TapeDeck {
    source: Option<Box<dyn PulseSource + Send>>,
    state: TapeState,
    level: bool,
    /// Global T-state the current pulse ends at.
    pulse_end: i64,
}

impl Default for TapeDeck {
    fn default() -> Self {
        TapeDeck {
            source: None,
            state: TapeState::Stopped,
            level: false,
            pulse_end: 0,
        }
    }
}

impl TapeDeck {
    pub fn new() -> Self {
        TapeDeck::default()
    }

    /// Inserts a pulse stream, rewinding the deck state.
    pub fn insert(&mut self, source: Box<dyn PulseSource + Send>) {
        self.source = Some(source);
        self.state = TapeState::Stopped;
        self.level = false;
        self.pulse_end = 0;
    }

    pub fn eject(&mut self) {
        self.source = None;
        self.state = TapeState::Stopped;
        self.level = false;
    }

    /// Starts playback at the given global timestamp.
    pub fn play(&mut self, now: i64) {
        if self.source.is_some() {
            self.state = TapeState::Playing;
            self.pulse_end = now;
        }
    }

    pub fn stop(&mut self) {
        if self.state == TapeState::Playing {
            self.state = TapeState::Stopped;
        }
    }

    pub fn state(&self) -> TapeState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TapeState::Playing
    }

    /// The EAR input level at the global timestamp `now`.
    pub fn ear_in(&mut self, now: i64) -> bool {
        if self.state != TapeState::Playing {
            return self.level;
        }
        while now >= self.pulse_end {
            let next = match self.source.as_mut() {
                Some(source) => source.next_pulse(),
                None => None,
            };
            match next {
                Some(pulse) => {
                    self.level = pulse.level;
                    self.pulse_end += pulse.duration as i64;
                }
                None => {
                    self.state = TapeState::EndOfTape;
                    self.level = false;
                    break;
                }
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulses(spec: &[(bool, u32)]) -> Box<dyn PulseSource + Send> {
        let list: Vec<Pulse> = spec.iter().map(|&(l, d)| Pulse::new(l, d)).collect();
        Box::new(list.into_iter())
    }

    #[test]
    fn stopped_deck_is_silent() {
        let mut deck = TapeDeck::new();
        assert!(!deck.ear_in(0));
        deck.insert(pulses(&[(true, 100)]));
        assert!(!deck.ear_in(50)); // not playing yet
    }

    #[test]
    fn pulses_advance_with_time() {
        let mut deck = TapeDeck::new();
        deck.insert(pulses(&[(true, 100), (false, 100), (true, 200)]));
        deck.play(0);
        assert!(deck.ear_in(10));
        assert!(deck.ear_in(99));
        assert!(!deck.ear_in(100));
        assert!(!deck.ear_in(150));
        assert!(deck.ear_in(250));
        // past the last pulse the tape ends at level low
        assert!(!deck.ear_in(500));
        assert_eq!(deck.state(), TapeState::EndOfTape);
    }

    #[test]
    fn large_skips_consume_multiple_pulses() {
        let mut deck = TapeDeck::new();
        deck.insert(pulses(&[(true, 10), (false, 10), (true, 10), (false, 1000)]));
        deck.play(0);
        assert!(!deck.ear_in(35));
    }

    #[test]
    fn play_starts_relative_to_now() {
        let mut deck = TapeDeck::new();
        deck.insert(pulses(&[(true, 100), (false, 100)]));
        deck.play(1_000_000);
        assert!(deck.ear_in(1_000_050));
        assert!(!deck.ear_in(1_000_150));
    }
}

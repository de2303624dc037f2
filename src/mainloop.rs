/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The per-instance frame loop and its control surface.
//!
//! One iteration runs the CPU for a frame, renders video, synthesizes
//! and enqueues audio and posts the frame events. The loop suspends only
//! at frame boundaries; `stop`/`pause` requests are honored there, and
//! the pause is confirmed through a bounded channel the UI thread can
//! wait on.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use spectron_audio::AudioRingBuffer;

use crate::machine::{FrameOutcome, Machine};
use crate::messages::{EventBus, Message};

/// How the loop paces itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// No throttling; frames run back to back.
    FullSpeed,
    /// Sleep to the wall-clock frame deadline.
    RealTime,
    /// One frame per explicit request.
    Stepped,
    /// Run until this many T-states have elapsed.
    NTStates(i64),
}

/// Cross-thread control of a running loop.
///
/// `stop`/`pause` are plain flags polled at frame boundaries; the pause
/// confirmation travels over a bounded channel so the UI can wait with a
/// timeout before touching shared state.
#[derive(Clone)]
pub struct LoopControl {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
    confirm_tx: Sender<()>,
    confirm_rx: Receiver<()>,
}

impl Default for LoopControl {
    fn default() -> Self {
        let (confirm_tx, confirm_rx) = bounded(1);
        LoopControl {
            stop: Arc::new(AtomicBool::new(false)),
            pause: Arc::new(AtomicBool::new(false)),
            confirm_tx,
            confirm_rx,
        }
    }
}

impl LoopControl {
    pub fn new() -> Self {
        LoopControl::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::Release);
    }

    pub fn clear_pause(&self) {
        self.pause.store(false, Ordering::Release);
        // drain a stale confirmation
        let _ = self.confirm_rx.try_recv();
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    /// Loop side: signals that execution parked at a frame boundary.
    pub fn confirm_paused(&self) {
        let _ = self.confirm_tx.try_send(());
    }

    /// UI side: waits for the pause confirmation with a bounded timeout.
    pub fn wait_paused(&self, timeout: Duration) -> bool {
        self.confirm_rx.recv_timeout(timeout).is_ok()
    }

    pub fn reset(&self) {
        self.stop.store(false, Ordering::Release);
        self.pause.store(false, Ordering::Release);
        let _ = self.confirm_rx.try_recv();
    }
}

/// The outcome of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationResult {
    /// A frame completed normally.
    FrameDone,
    /// A breakpoint parked execution inside the frame.
    Breakpoint,
    /// The T-state budget of an NTStates run is exhausted.
    BudgetDone,
}

/// Runs frames against a machine, owning the audio ring.
pub struct FrameRunner {
    pub mode: RunMode,
    pub audio_ring: AudioRingBuffer,
    audio_frame: Vec<i16>,
    next_deadline: Option<Instant>,
    frame_duration: Duration,
    /// Remaining budget of an NTStates run.
    ntstates_left: i64,
}

impl FrameRunner {
    pub fn new(machine: &Machine) -> Self {
        let samples = machine.samples_per_frame() * 2;
        let frame_rate = machine.board.timings.frame_rate();
        FrameRunner {
            mode: RunMode::RealTime,
            // room for several frames of interleaved stereo
            audio_ring: AudioRingBuffer::new(samples * 8),
            audio_frame: Vec::with_capacity(samples),
            next_deadline: None,
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate),
            ntstates_left: 0,
        }
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
        self.next_deadline = None;
        if let RunMode::NTStates(budget) = mode {
            self.ntstates_left = budget;
        }
    }

    /// One iteration of the frame loop.
    pub fn run_one_frame(
        &mut self,
        machine: &mut Machine,
        events: &mut EventBus,
    ) -> IterationResult {
        let frame = machine.board.clock.frames;
        events.publish(Message::FrameStart { frame });

        let outcome = machine.run_frame();
        if outcome == FrameOutcome::Paused {
            events.publish(Message::BreakpointHit { pc: machine.cpu.pc });
            return IterationResult::Breakpoint;
        }

        machine.render_video();
        machine.render_audio(&mut self.audio_frame);
        let written = self.audio_ring.enqueue(&self.audio_frame);
        if written < self.audio_frame.len() {
            log::trace!(
                "audio ring full: dropped {} samples",
                self.audio_frame.len() - written
            );
        }
        if self.audio_ring.is_half_full() {
            events.publish(Message::AudioBufferHalfFull {
                available: self.audio_ring.available_data(),
            });
        }

        let consumed = machine.board.timings.ts_per_frame as i64;
        machine.finish_frame();
        events.publish(Message::FrameEnd { frame });

        if let RunMode::NTStates(_) = self.mode {
            self.ntstates_left -= consumed;
            if self.ntstates_left <= 0 {
                return IterationResult::BudgetDone;
            }
        }
        if self.mode == RunMode::RealTime {
            self.throttle();
        }
        IterationResult::FrameDone
    }

    /// Sleeps to the frame deadline in real-time mode.
    fn throttle(&mut self) {
        let now = Instant::now();
        let deadline = match self.next_deadline {
            Some(deadline) => deadline,
            None => now,
        };
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        let next = deadline + self.frame_duration;
        // resynchronize after a long stall instead of racing to catch up
        self.next_deadline = if next < now { Some(now) } else { Some(next) };
    }
}

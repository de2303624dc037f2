/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! One emulator instance: lifecycle, features and the control surface.
use core::fmt;

use bitflags::bitflags;
use uuid::Uuid;

use spectron_core::banking::Model;
use spectron_core::clock::FTs;
use spectron_core::memory::MemoryError;
use spectron_core::video::Framebuffer;
use spectron_peripherals::fdd::DiskImage;
use spectron_peripherals::ide::AtaMedia;
use spectron_peripherals::tape::PulseSource;

use crate::machine::Machine;
use crate::mainloop::{FrameRunner, IterationResult, LoopControl, RunMode};
use crate::messages::{EventBus, Message, SubscriberId, Topic};
use crate::shared::{SharedExporter, SharedRegion};
use crate::snapshot::{SnapshotError, SnapshotState};

bitflags! {
    /// Switchable per-instance features.
    #[derive(Default)]
    pub struct FeatureFlags: u32 {
        const SOUND_GENERATION = 0x01;
        const SOUND_HQ         = 0x02;
        const SCREEN_HQ        = 0x04;
        const SHARED_MEMORY    = 0x08;
        const DEBUGGER         = 0x10;
        const CALL_TRACE       = 0x20;
    }
}

/// The instance lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmulatorState {
    Initialized,
    Run,
    Paused,
    Stopped,
}

#[non_exhaustive]
#[derive(Debug)]
pub enum EmulatorError {
    /// The operation is not legal in the current lifecycle state.
    InvalidState {
        operation: &'static str,
        state: EmulatorState,
    },
    Load(MemoryError),
    Snapshot(SnapshotError),
}

impl std::error::Error for EmulatorError {}

impl fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorError::InvalidState { operation, state } => {
                write!(f, "{} is not allowed while {:?}", operation, state)
            }
            EmulatorError::Load(err) => write!(f, "load failed: {}", err),
            EmulatorError::Snapshot(err) => write!(f, "snapshot failed: {}", err),
        }
    }
}

impl From<MemoryError> for EmulatorError {
    fn from(err: MemoryError) -> Self {
        EmulatorError::Load(err)
    }
}

impl From<SnapshotError> for EmulatorError {
    fn from(err: SnapshotError) -> Self {
        EmulatorError::Snapshot(err)
    }
}

/// A read-only description of the frame output, valid until the next
/// rendered frame.
#[derive(Clone, Copy, Debug)]
pub struct FramebufferInfo {
    pub width: usize,
    pub height: usize,
    /// Row stride in pixels.
    pub stride: usize,
}

/// A single virtual machine with identity and lifecycle.
///
/// Instances never share mutable state; each owns exactly one CPU, one
/// memory map and its peripherals.
pub struct Emulator {
    uuid: Uuid,
    state: EmulatorState,
    features: FeatureFlags,
    pub machine: Machine,
    pub events: EventBus,
    runner: FrameRunner,
    control: LoopControl,
    shared: Option<SharedExporter>,
}

impl Emulator {
    pub fn new(model: Model, sample_rate: u32) -> Self {
        let machine = Machine::new(model, sample_rate);
        let runner = FrameRunner::new(&machine);
        Emulator {
            uuid: Uuid::new_v4(),
            state: EmulatorState::Initialized,
            features: FeatureFlags::SOUND_GENERATION,
            machine,
            events: EventBus::new(),
            runner,
            control: LoopControl::new(),
            shared: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn state(&self) -> EmulatorState {
        self.state
    }

    pub fn model(&self) -> Model {
        self.machine.model()
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    /// A control handle usable from other threads.
    pub fn control(&self) -> LoopControl {
        self.control.clone()
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.runner.set_mode(mode);
    }

    /// Toggles a feature and applies its side effects.
    pub fn set_feature(&mut self, feature: FeatureFlags, enabled: bool) {
        self.features.set(feature, enabled);
        if feature.intersects(FeatureFlags::DEBUGGER | FeatureFlags::CALL_TRACE) {
            self.machine.debug_enabled = self
                .features
                .intersects(FeatureFlags::DEBUGGER | FeatureFlags::CALL_TRACE);
            self.machine.board.trace_enabled =
                self.features.contains(FeatureFlags::CALL_TRACE);
        }
        if feature.contains(FeatureFlags::SOUND_GENERATION) {
            self.machine.board.set_sound_enabled(enabled);
        }
        if feature.contains(FeatureFlags::SHARED_MEMORY) {
            self.shared = if enabled { Some(SharedExporter::new()) } else { None };
        }
    }

    /// The shared-memory region, when the feature is enabled.
    pub fn shared_region(&self) -> Option<std::sync::Arc<SharedRegion>> {
        self.shared.as_ref().map(|exporter| exporter.region())
    }

    /// Subscribes an observer to one of this instance's topics.
    pub fn subscribe(
        &mut self,
        topic: Topic,
    ) -> (SubscriberId, crossbeam_channel::Receiver<Message>) {
        self.events.subscribe(topic)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.events.unsubscribe(id)
    }

    fn ensure_not_stopped(&self, operation: &'static str) -> Result<(), EmulatorError> {
        if self.state == EmulatorState::Stopped {
            return Err(EmulatorError::InvalidState { operation, state: self.state });
        }
        Ok(())
    }

    /// Loads a ROM blob into the ROM pages of the arena.
    ///
    /// The blob must be whole 16 KiB banks of a supported total size;
    /// otherwise the instance state is unchanged. A bank count that
    /// differs from what the model expects is loadable and only warned
    /// about.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), EmulatorError> {
        self.ensure_not_stopped("load_rom")?;
        let banks = self.machine.board.memory.load_rom(0, data)?;
        let expected = self.model().rom_banks();
        if banks != expected {
            log::warn!(
                "ROM size mismatch: {} banks loaded, {:?} expects {}",
                banks, self.model(), expected
            );
        }
        Ok(())
    }

    pub fn load_snapshot(&mut self, snapshot: &SnapshotState) -> Result<(), EmulatorError> {
        self.ensure_not_stopped("load_snapshot")?;
        snapshot.apply(&mut self.machine)?;
        Ok(())
    }

    pub fn capture_snapshot(&self) -> SnapshotState {
        SnapshotState::capture(&self.machine)
    }

    pub fn load_tape(&mut self, source: Box<dyn PulseSource + Send>) {
        self.machine.board.tape.insert(source);
    }

    pub fn play_tape(&mut self) {
        let now = self.machine.board.clock.total_ts + self.machine.cpu.t as i64;
        self.machine.board.tape.play(now);
    }

    pub fn insert_disk(&mut self, drive: usize, image: Box<dyn DiskImage>) {
        self.machine.board.fdc.insert_disk(drive, image);
    }

    pub fn attach_ide(&mut self, slot: usize, media: Box<dyn AtaMedia>) {
        self.machine.board.ide.attach(slot, media);
    }

    pub fn start(&mut self) -> Result<(), EmulatorError> {
        match self.state {
            EmulatorState::Initialized | EmulatorState::Paused => {
                self.control.reset();
                self.set_state(EmulatorState::Run);
                Ok(())
            }
            state => Err(EmulatorError::InvalidState { operation: "start", state }),
        }
    }

    /// Parks the instance at the current frame boundary.
    pub fn pause(&mut self) -> Result<(), EmulatorError> {
        match self.state {
            EmulatorState::Run => {
                self.control.request_pause();
                self.set_state(EmulatorState::Paused);
                self.control.confirm_paused();
                Ok(())
            }
            state => Err(EmulatorError::InvalidState { operation: "pause", state }),
        }
    }

    pub fn resume(&mut self) -> Result<(), EmulatorError> {
        match self.state {
            EmulatorState::Paused => {
                self.control.clear_pause();
                self.set_state(EmulatorState::Run);
                Ok(())
            }
            state => Err(EmulatorError::InvalidState { operation: "resume", state }),
        }
    }

    pub fn stop(&mut self) -> Result<(), EmulatorError> {
        self.ensure_not_stopped("stop")?;
        self.control.request_stop();
        self.set_state(EmulatorState::Stopped);
        Ok(())
    }

    /// Resets the machine; legal in any state but Stopped.
    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        self.ensure_not_stopped("reset")?;
        self.machine.reset();
        Ok(())
    }

    fn set_state(&mut self, state: EmulatorState) {
        if self.state != state {
            self.state = state;
            self.events.publish(Message::StateChanged { state });
        }
    }

    /// Runs one frame iteration while in the Run state, honoring pause
    /// and stop requests at the boundary.
    pub fn tick(&mut self) -> Result<IterationResult, EmulatorError> {
        if self.state != EmulatorState::Run {
            return Err(EmulatorError::InvalidState { operation: "tick", state: self.state });
        }
        if self.control.stop_requested() {
            self.set_state(EmulatorState::Stopped);
            return Ok(IterationResult::FrameDone);
        }
        if self.control.pause_requested() {
            self.set_state(EmulatorState::Paused);
            self.control.confirm_paused();
            return Ok(IterationResult::FrameDone);
        }
        let result = self.runner.run_one_frame(&mut self.machine, &mut self.events);
        if result == IterationResult::Breakpoint {
            self.set_state(EmulatorState::Paused);
            self.control.confirm_paused();
        }
        if let Some(exporter) = &self.shared {
            exporter.publish(self.machine.board.memory.arena().as_slice());
        }
        Ok(result)
    }

    /// Drives the instance until stop is requested; intended to run on a
    /// dedicated thread. Pausing parks the loop without returning.
    pub fn run_loop(&mut self) {
        while self.state != EmulatorState::Stopped {
            match self.state {
                EmulatorState::Run => {
                    let _ = self.tick();
                }
                EmulatorState::Paused => {
                    if self.control.stop_requested() {
                        self.set_state(EmulatorState::Stopped);
                        break;
                    }
                    if !self.control.pause_requested() {
                        self.set_state(EmulatorState::Run);
                        continue;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                _ => break,
            }
        }
    }

    /// Executes exactly one instruction; requires a non-running state.
    pub fn step_instruction(&mut self) -> Result<FTs, EmulatorError> {
        self.ensure_steppable("step_instruction")?;
        Ok(self.machine.step_instruction())
    }

    /// Executes one whole frame; requires a non-running state.
    pub fn step_frame(&mut self) -> Result<IterationResult, EmulatorError> {
        self.ensure_steppable("step_frame")?;
        Ok(self.runner.run_one_frame(&mut self.machine, &mut self.events))
    }

    /// Runs approximately `n` T-states, stopping at the instruction
    /// boundary that crosses the budget.
    pub fn run_tstates(&mut self, n: i64) -> Result<(), EmulatorError> {
        self.ensure_steppable("run_tstates")?;
        let mut left = n;
        while left > 0 {
            let consumed = self.machine.step_instruction() as i64;
            left -= consumed;
            if self.machine.cpu.t >= self.machine.board.timings.ts_per_frame {
                self.machine.render_video();
                self.machine.finish_frame();
            }
        }
        Ok(())
    }

    fn ensure_steppable(&self, operation: &'static str) -> Result<(), EmulatorError> {
        match self.state {
            EmulatorState::Initialized | EmulatorState::Paused => Ok(()),
            state => Err(EmulatorError::InvalidState { operation, state }),
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.machine.framebuffer
    }

    pub fn framebuffer_info(&self) -> FramebufferInfo {
        let fb = &self.machine.framebuffer;
        FramebufferInfo { width: fb.width(), height: fb.height(), stride: fb.stride() }
    }

    /// Pulls decoded stereo PCM16 for the host audio callback; returns
    /// the number of samples copied. Never blocks.
    pub fn pull_audio(&mut self, out: &mut [i16]) -> usize {
        self.runner.audio_ring.dequeue(out)
    }

    pub fn read_memory(&self, addr: u16, out: &mut [u8]) {
        self.machine.read_memory(addr, out)
    }

    pub fn write_memory(&mut self, addr: u16, data: &[u8]) {
        self.machine.write_memory(addr, data)
    }
}

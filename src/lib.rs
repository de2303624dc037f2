/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    SPECTRON is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    SPECTRON is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! SPECTRON - the emulation core of the ZX Spectrum computer series and
//! its clones.
//!
//! The root crate composes the member crates into runnable machines and
//! exposes the orchestration surface: emulator instances with a
//! run/pause/step lifecycle, an instance manager, the event bus, typed
//! snapshots and the shared-memory state exporter.
pub mod emulator;
pub mod machine;
pub mod mainloop;
pub mod manager;
pub mod messages;
pub mod shared;
pub mod snapshot;

pub use spectron_core as core;
pub use spectron_audio as audio;
pub use spectron_peripherals as peripherals;

pub use emulator::{Emulator, EmulatorError, EmulatorState, FeatureFlags};
pub use machine::{FrameOutcome, Machine};
pub use mainloop::{LoopControl, RunMode};
pub use manager::EmulatorManager;
pub use messages::{EventBus, Message, Topic};
pub use snapshot::SnapshotState;

pub use spectron_core::banking::Model;

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
//! Audio synthesis and mixing for the SPECTRON library.
//!
//! Every sound source renders one frame of interleaved or split stereo
//! PCM16; the mixer folds them together with saturating adds and the ring
//! buffer carries the result to the host audio callback.
pub mod ay;
pub mod beeper;
pub mod mixer;
pub mod ring;

pub use ay::{AyChip, StereoPan, TurboSound};
pub use beeper::Beeper;
pub use mixer::mix_saturating;
pub use ring::AudioRingBuffer;

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
//! Peripheral device emulators for the SPECTRON library.
pub mod fdd;
pub mod ide;
pub mod keyboard;
pub mod mouse;
pub mod tape;

pub use fdd::{DiskImage, Wd1793};
pub use ide::{AtaDevice, IdeBus};
pub use keyboard::{Keyboard, ZxKey};
pub use mouse::KempstonMouse;
pub use tape::{Pulse, PulseSource, TapeDeck};

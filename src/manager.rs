/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The emulator instance registry.
//!
//! Constructed once by the host and passed explicitly; there is no
//! process-global instance. The registry owns the instances and hands
//! out references keyed by UUID.
use std::collections::HashMap;

use uuid::Uuid;

use spectron_core::banking::Model;

use crate::emulator::Emulator;

/// Owns every live emulator instance of the process.
#[derive(Default)]
pub struct EmulatorManager {
    instances: HashMap<Uuid, Emulator>,
}

impl EmulatorManager {
    pub fn new() -> Self {
        EmulatorManager::default()
    }

    /// Creates an instance and returns its identity.
    pub fn create_emulator(&mut self, model: Model, sample_rate: u32) -> Uuid {
        let emulator = Emulator::new(model, sample_rate);
        let uuid = emulator.uuid();
        self.instances.insert(uuid, emulator);
        uuid
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&Emulator> {
        self.instances.get(uuid)
    }

    pub fn get_mut(&mut self, uuid: &Uuid) -> Option<&mut Emulator> {
        self.instances.get_mut(uuid)
    }

    /// Removes and returns an instance; the caller decides whether to
    /// stop it first.
    pub fn remove(&mut self, uuid: &Uuid) -> Option<Emulator> {
        self.instances.remove(uuid)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.instances.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

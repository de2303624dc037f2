/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The shared-memory state exporter.
//!
//! Once per frame the instance publishes the page arena into a shared
//! region under a seqlock version counter: the version goes odd while
//! the writer copies, even when the payload is stable. Readers sample
//! the version before and after copying and retry on a mismatch or an
//! odd value. The layout is stable for external tooling: a page's bytes
//! start at `page_index * PAGE_SIZE`.
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use spectron_core::memory::{NUM_PAGES, PAGE_SIZE};

/// The shared region: a version counter plus the arena payload.
pub struct SharedRegion {
    version: AtomicU64,
    bytes: Box<[AtomicU8]>,
}

impl SharedRegion {
    fn new(size: usize) -> Self {
        let mut bytes = Vec::with_capacity(size);
        bytes.resize_with(size, || AtomicU8::new(0));
        SharedRegion {
            version: AtomicU64::new(0),
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The current version counter; odd means a write is in progress.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// One seqlock read attempt of `out.len()` bytes from `offset`.
    ///
    /// Returns the (even) version the payload belongs to, or `None` when
    /// a concurrent write invalidated the copy.
    pub fn try_read(&self, offset: usize, out: &mut [u8]) -> Option<u64> {
        let before = self.version.load(Ordering::Acquire);
        if before & 1 != 0 {
            return None;
        }
        for (n, byte) in out.iter_mut().enumerate() {
            *byte = self.bytes[offset + n].load(Ordering::Relaxed);
        }
        let after = self.version.load(Ordering::Acquire);
        if before == after {
            Some(after)
        }
        else {
            None
        }
    }

    /// Reads with retries until a stable payload is observed.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> u64 {
        loop {
            if let Some(version) = self.try_read(offset, out) {
                return version;
            }
            std::thread::yield_now();
        }
    }
}

/// The writer half owned by the emulator instance.
pub struct SharedExporter {
    region: Arc<SharedRegion>,
}

impl SharedExporter {
    /// A region sized for the whole page arena.
    pub fn new() -> Self {
        SharedExporter {
            region: Arc::new(SharedRegion::new(NUM_PAGES * PAGE_SIZE)),
        }
    }

    /// A handle observers read through.
    pub fn region(&self) -> Arc<SharedRegion> {
        Arc::clone(&self.region)
    }

    /// Publishes a new payload under the seqlock protocol.
    pub fn publish(&self, payload: &[u8]) {
        let region = &*self.region;
        debug_assert!(payload.len() <= region.bytes.len());
        // odd: write in progress
        region.version.fetch_add(1, Ordering::AcqRel);
        for (slot, byte) in region.bytes.iter().zip(payload.iter()) {
            slot.store(*byte, Ordering::Relaxed);
        }
        // even: payload stable
        region.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for SharedExporter {
    fn default() -> Self {
        SharedExporter::new()
    }
}

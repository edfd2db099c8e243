// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Process-wide guest address space.
//!
//! `AddressSpace` owns the host reservation backing the guest address space
//! and the chunk map describing it. The chunk map sits behind a single lock,
//! so every split/merge runs under mutual exclusion no matter which guest
//! thread triggered it.

use kmem_abi::layout::MAX_ADDRESS_SPACE_SIZE;
use kmem_abi::{ChunkDescriptor, MemoryInfo, Vaddr};
use parking_lot::Mutex;

use crate::chunk_map::ChunkMap;
use crate::config::AddressSpaceConfig;
use crate::error::{MemoryError, Result};
use crate::host::HostMemory;

#[cfg(unix)]
use crate::host::MmapReservation;

/// The guest address space of one emulated process.
#[derive(Debug)]
pub struct AddressSpace<H> {
    host: H,
    config: AddressSpaceConfig,
    chunks: Mutex<ChunkMap>,
}

impl<H: HostMemory> AddressSpace<H> {
    /// Create an address space over the reservation `host` provides.
    ///
    /// The whole reservation starts out as a single `Unmapped` chunk. The
    /// host decides the size; an explicit `reservation_size` in `config`
    /// must agree with it.
    pub fn new(host: H, config: AddressSpaceConfig) -> Result<Self> {
        let base = host.base();
        let size = host.size();
        if config.reservation_size.is_some_and(|expected| expected != size) {
            return Err(MemoryError::InvalidConfig(
                "reservation size does not match the host reservation",
            ));
        }
        if !base.is_page_aligned() {
            return Err(MemoryError::InvalidConfig(
                "reservation base is not page-aligned",
            ));
        }
        if size == 0 || !Vaddr::new(size).is_page_aligned() {
            return Err(MemoryError::InvalidConfig(
                "reservation size is not a non-zero page multiple",
            ));
        }
        if size > MAX_ADDRESS_SPACE_SIZE {
            return Err(MemoryError::InvalidConfig(
                "reservation exceeds the largest guest address space",
            ));
        }
        if base.checked_add(size).is_none() {
            return Err(MemoryError::InvalidConfig(
                "reservation wraps around the address space",
            ));
        }

        tracing::debug!(%base, size, ?config, "created guest address space");
        Ok(Self {
            host,
            chunks: Mutex::new(ChunkMap::new(base, size, config.merge_adjacent)),
            config,
        })
    }

    /// First guest address.
    #[inline]
    #[must_use]
    pub fn base(&self) -> Vaddr {
        self.host.base()
    }

    /// Size of the guest address space in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.host.size()
    }

    /// One past the last guest address.
    #[inline]
    #[must_use]
    pub fn end(&self) -> Vaddr {
        self.base().add(self.size())
    }

    /// The host reservation.
    #[inline]
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// The configuration this address space was created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &AddressSpaceConfig {
        &self.config
    }

    /// Check if `addr` lies within the reservation.
    ///
    /// The end of the reservation counts as inside, so a range ending exactly
    /// at the top can be validated by checking both of its endpoints.
    #[inline]
    #[must_use]
    pub fn is_inside(&self, addr: Vaddr) -> bool {
        addr >= self.base() && addr <= self.end()
    }

    /// Record that `[chunk.base, chunk.end())` now carries the chunk's tags.
    ///
    /// The range must be page-aligned and inside the reservation; callers
    /// validate this before reporting.
    pub fn insert_chunk(&self, chunk: ChunkDescriptor) {
        tracing::debug!(?chunk, "insert chunk");
        self.chunks.lock().insert(chunk);
    }

    /// Query the chunk containing `addr`.
    #[must_use]
    pub fn query(&self, addr: Vaddr) -> Option<MemoryInfo> {
        self.chunks.lock().query(addr)
    }

    /// Snapshot of every chunk in address order.
    #[must_use]
    pub fn chunks(&self) -> Vec<ChunkDescriptor> {
        self.chunks.lock().iter().copied().collect()
    }

    /// Snapshot of the chunks intersecting `[start, end)`, clipped to it.
    #[must_use]
    pub fn chunks_in(&self, start: Vaddr, end: Vaddr) -> Vec<ChunkDescriptor> {
        self.chunks.lock().chunks_in(start, end)
    }

    /// Check that the chunks still partition the whole reservation.
    #[must_use]
    pub fn is_partition(&self) -> bool {
        self.chunks.lock().is_partition()
    }
}

#[cfg(unix)]
impl AddressSpace<MmapReservation> {
    /// Reserve host memory for a guest address space as `config` describes.
    pub fn reserve(config: AddressSpaceConfig) -> Result<Self> {
        config.validate()?;
        let host = MmapReservation::new(config.reservation_size())?;
        Self::new(host, config)
    }
}

#[cfg(test)]
mod address_space_test;

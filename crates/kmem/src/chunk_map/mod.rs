// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Chunk map: the partition of a guest address space into chunks.
//!
//! The map always covers its whole range with non-overlapping chunks; holes
//! are explicit `Unmapped` chunks. Inserting a descriptor replaces whatever
//! covered its range, splitting chunks that only partially overlap:
//!
//! ```text
//! before:  [ Heap rw- ...................... ]
//! insert:            [ Heap rwx ]
//! after:   [ Heap rw- ][ Heap rwx ][ Heap rw- ]
//! ```

use std::collections::BTreeMap;

use kmem_abi::{ChunkDescriptor, MemoryInfo, Vaddr};

/// Ordered, gapless, non-overlapping set of chunks keyed by base address.
#[derive(Debug, Clone)]
pub struct ChunkMap {
    base: Vaddr,
    end: Vaddr,
    merge_adjacent: bool,
    chunks: BTreeMap<Vaddr, ChunkDescriptor>,
}

impl ChunkMap {
    /// Create a map covering `[base, base + size)` with a single `Unmapped`
    /// chunk.
    #[must_use]
    pub fn new(base: Vaddr, size: u64, merge_adjacent: bool) -> Self {
        let mut chunks = BTreeMap::new();
        if size > 0 {
            chunks.insert(base, ChunkDescriptor::unmapped(base, size));
        }
        Self {
            base,
            end: base.add(size),
            merge_adjacent,
            chunks,
        }
    }

    /// First address covered by the map.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Vaddr {
        self.base
    }

    /// One past the last address covered by the map.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Vaddr {
        self.end
    }

    /// Number of chunks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the map covers nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Declare that `[chunk.base, chunk.end())` now carries the chunk's tags.
    ///
    /// Callers must pass a range inside the map and are responsible for its
    /// alignment. Anything outside the map is cut off so the partition can
    /// never be broken.
    pub fn insert(&mut self, chunk: ChunkDescriptor) {
        debug_assert!(
            chunk.base >= self.base
                && chunk
                    .base
                    .checked_add(chunk.size)
                    .is_some_and(|end| end <= self.end),
            "chunk {chunk:?} lies outside the map [{}, {})",
            self.base,
            self.end
        );

        let start = chunk.base.clamp(self.base, self.end);
        let end = chunk
            .base
            .checked_add(chunk.size)
            .unwrap_or(self.end)
            .clamp(start, self.end);
        if start == end {
            return;
        }

        self.split_at(start);
        self.split_at(end);

        let covered: Vec<Vaddr> = self.chunks.range(start..end).map(|(base, _)| *base).collect();
        for base in covered {
            self.chunks.remove(&base);
        }

        let inserted = ChunkDescriptor::new(start, end.diff(start), chunk.permission, chunk.state);
        self.chunks.insert(start, inserted);

        if self.merge_adjacent {
            self.merge_with_next(start);
            if let Some(previous) = self.previous_base(start) {
                self.merge_with_next(previous);
            }
        }
    }

    /// The chunk containing `addr`, or `None` if `addr` is outside the map.
    #[must_use]
    pub fn get(&self, addr: Vaddr) -> Option<ChunkDescriptor> {
        if addr < self.base || addr >= self.end {
            return None;
        }
        self.chunks
            .range(..=addr)
            .next_back()
            .map(|(_, chunk)| *chunk)
    }

    /// Query the chunk containing `addr`.
    #[must_use]
    pub fn query(&self, addr: Vaddr) -> Option<MemoryInfo> {
        self.get(addr).map(MemoryInfo::from)
    }

    /// All chunks in address order.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkDescriptor> {
        self.chunks.values()
    }

    /// The chunks intersecting `[start, end)`, clipped to that range.
    #[must_use]
    pub fn chunks_in(&self, start: Vaddr, end: Vaddr) -> Vec<ChunkDescriptor> {
        let start = start.max(self.base);
        let end = end.min(self.end);
        if start >= end {
            return Vec::new();
        }

        let first = self
            .chunks
            .range(..=start)
            .next_back()
            .map_or(start, |(base, _)| *base);

        self.chunks
            .range(first..end)
            .filter_map(|(_, chunk)| {
                let clipped_start = chunk.base.max(start);
                let clipped_end = chunk.end().min(end);
                (clipped_start < clipped_end).then(|| {
                    ChunkDescriptor::new(
                        clipped_start,
                        clipped_end.diff(clipped_start),
                        chunk.permission,
                        chunk.state,
                    )
                })
            })
            .collect()
    }

    /// Check that the chunks tile the whole range with no gaps, overlaps or
    /// empty chunks.
    #[must_use]
    pub fn is_partition(&self) -> bool {
        let mut cursor = self.base;
        for (base, chunk) in &self.chunks {
            if *base != chunk.base || chunk.base != cursor || chunk.size == 0 {
                return false;
            }
            cursor = chunk.end();
        }
        cursor == self.end
    }

    /// Split the chunk containing `addr` so that a chunk starts at `addr`.
    fn split_at(&mut self, addr: Vaddr) {
        if addr >= self.end {
            return;
        }
        let Some(chunk) = self.get(addr) else {
            return;
        };
        if chunk.base == addr {
            return;
        }

        let head_size = addr.diff(chunk.base);
        let tail = ChunkDescriptor::new(
            addr,
            chunk.size - head_size,
            chunk.permission,
            chunk.state,
        );
        if let Some(head) = self.chunks.get_mut(&chunk.base) {
            head.size = head_size;
        }
        self.chunks.insert(addr, tail);
    }

    /// Merge the chunk at `base` with its successor if their tags match.
    fn merge_with_next(&mut self, base: Vaddr) {
        let Some(current) = self.chunks.get(&base).copied() else {
            return;
        };
        let next_base = current.end();
        let Some(next) = self.chunks.get(&next_base).copied() else {
            return;
        };
        if current.same_tags(&next) {
            self.chunks.remove(&next_base);
            if let Some(current) = self.chunks.get_mut(&base) {
                current.size += next.size;
            }
        }
    }

    fn previous_base(&self, base: Vaddr) -> Option<Vaddr> {
        self.chunks
            .range(..base)
            .next_back()
            .map(|(previous, _)| *previous)
    }
}

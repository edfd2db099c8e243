// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Chunk descriptors and memory query results.

use core::fmt;

use crate::addr::Vaddr;
use crate::permission::Permission;
use crate::state::MemoryState;

/// One contiguous guest range sharing a permission and a memory state.
///
/// This is both the unit stored by the chunk map and the message an
/// allocation sends to it: inserting a descriptor declares that the range now
/// has exactly these tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkDescriptor {
    /// First address of the range (page-aligned).
    pub base: Vaddr,
    /// Length of the range in bytes.
    pub size: u64,
    /// Guest-visible permission.
    pub permission: Permission,
    /// Semantic tag.
    pub state: MemoryState,
}

impl ChunkDescriptor {
    /// Creates a descriptor.
    #[inline]
    #[must_use]
    pub const fn new(base: Vaddr, size: u64, permission: Permission, state: MemoryState) -> Self {
        Self {
            base,
            size,
            permission,
            state,
        }
    }

    /// Creates an Unmapped descriptor with no permission.
    #[inline]
    #[must_use]
    pub const fn unmapped(base: Vaddr, size: u64) -> Self {
        Self::new(base, size, Permission::NONE, MemoryState::Unmapped)
    }

    /// One past the last address of the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Vaddr {
        self.base.add(self.size)
    }

    /// Checks if `addr` lies inside the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: Vaddr) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Returns true if both descriptors carry the same permission and state.
    #[inline]
    #[must_use]
    pub fn same_tags(&self, other: &Self) -> bool {
        self.permission == other.permission && self.state == other.state
    }
}

impl fmt::Debug for ChunkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})={},{}",
            self.base,
            self.end(),
            self.state,
            self.permission
        )
    }
}

/// Result of a memory query on one guest address.
///
/// Mirrors what the guest's `QueryMemory` syscall reports: the whole chunk
/// containing the queried address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    /// First address of the containing chunk.
    pub base: Vaddr,
    /// Size of the containing chunk in bytes.
    pub size: u64,
    /// Guest-visible permission of the chunk.
    pub permission: Permission,
    /// Memory state of the chunk.
    pub state: MemoryState,
}

impl From<ChunkDescriptor> for MemoryInfo {
    fn from(chunk: ChunkDescriptor) -> Self {
        Self {
            base: chunk.base,
            size: chunk.size,
            permission: chunk.permission,
            state: chunk.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_helpers() {
        let chunk = ChunkDescriptor::new(
            Vaddr::new(0x2000),
            0x1000,
            Permission::RW,
            MemoryState::Heap,
        );
        assert_eq!(chunk.end(), Vaddr::new(0x3000));
        assert!(chunk.contains(Vaddr::new(0x2000)));
        assert!(chunk.contains(Vaddr::new(0x2FFF)));
        assert!(!chunk.contains(Vaddr::new(0x3000)));
    }

    #[test]
    fn debug_format_is_compact() {
        let chunk = ChunkDescriptor::new(
            Vaddr::new(0x2000),
            0x1000,
            Permission::RW,
            MemoryState::Heap,
        );
        assert_eq!(format!("{chunk:?}"), "[0x2000, 0x3000)=Heap,rw-");
    }

    #[test]
    fn unmapped_has_no_permission() {
        let chunk = ChunkDescriptor::unmapped(Vaddr::new(0), 0x1000);
        assert!(chunk.permission.is_none());
        assert!(chunk.state.is_unmapped());
    }
}

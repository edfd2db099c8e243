// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Private memory allocations.
//!
//! A `PrivateMemory` owns one contiguous, page-aligned range of the guest
//! address space and is the authority for what the chunk map says about it.
//! Every mutation first adjusts the host protection, then reports the new
//! ground truth to the chunk map.
//!
//! The host protection of an allocation is always read/write/execute, no
//! matter what guest permission it carries. Guest permissions are enforced in
//! software by whoever consults the chunk map, so guest accesses never take
//! host faults.

use std::sync::Arc;

use kmem_abi::{ChunkDescriptor, MemoryState, Permission, Vaddr};

use crate::address_space::AddressSpace;
use crate::config::PromotionScope;
use crate::error::{MemoryError, Result};
use crate::host::HostMemory;
use crate::object::{KernelObject, KernelObjectType};

/// Host protection of every live allocation.
const HOST_PROTECTION: Permission = Permission::RWX;

/// One privately owned allocation in a guest address space.
///
/// Dropping the allocation revokes host access to its range and returns the
/// range to `Unmapped` in the chunk map.
#[derive(Debug)]
pub struct PrivateMemory<H: HostMemory> {
    address_space: Arc<AddressSpace<H>>,
    ptr: Vaddr,
    size: u64,
    permission: Permission,
    state: MemoryState,
}

impl<H: HostMemory> PrivateMemory<H> {
    /// Create an allocation over `[ptr, ptr + size)`.
    ///
    /// The range must already be reserved for this allocation; creation only
    /// opens host access to it and registers it as one chunk.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::OutOfBounds`] if the range leaves the address space
    /// - [`MemoryError::Misaligned`] if `ptr` is not page-aligned
    /// - [`MemoryError::Host`] if the host refuses the protection change
    pub fn create(
        address_space: &Arc<AddressSpace<H>>,
        ptr: Vaddr,
        size: u64,
        permission: Permission,
        state: MemoryState,
    ) -> Result<Self> {
        let end = checked_end(address_space, ptr, size)?;
        if !ptr.is_page_aligned() {
            return Err(MemoryError::Misaligned(ptr));
        }

        address_space.host().protect(ptr, size, HOST_PROTECTION)?;
        address_space.insert_chunk(ChunkDescriptor::new(ptr, size, permission, state));

        tracing::debug!(%ptr, %end, %permission, %state, "created private memory");
        Ok(Self {
            address_space: Arc::clone(address_space),
            ptr,
            size,
            permission,
            state,
        })
    }

    /// First address of the allocation.
    #[inline]
    #[must_use]
    pub const fn ptr(&self) -> Vaddr {
        self.ptr
    }

    /// Current size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// One past the last address of the allocation.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Vaddr {
        self.ptr.add(self.size)
    }

    /// Permission the allocation was created with.
    ///
    /// Sub-range permission updates only reach the chunk map; a grown tail
    /// inherits this permission.
    #[inline]
    #[must_use]
    pub const fn permission(&self) -> Permission {
        self.permission
    }

    /// Memory state of the allocation.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> MemoryState {
        self.state
    }

    /// The address space the allocation lives in.
    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> &Arc<AddressSpace<H>> {
        &self.address_space
    }

    /// Checks if `addr` lies inside the allocation.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: Vaddr) -> bool {
        addr >= self.ptr && addr < self.end()
    }

    /// Change the size of the allocation, keeping its base.
    ///
    /// A shrunk tail becomes `Unmapped`; a grown tail inherits the current
    /// permission and state. Host access is requested over the whole new
    /// size, so shrinking never narrows the host window.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::OutOfBounds`] if the new end leaves the address space
    /// - [`MemoryError::Host`] if the host refuses the protection change;
    ///   the allocation keeps its old size
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        checked_end(&self.address_space, self.ptr, new_size)?;

        // The host call goes first; the chunk update below commits the
        // resize and must not run if the host refused.
        self.address_space
            .host()
            .protect(self.ptr, new_size, HOST_PROTECTION)?;

        match new_size.cmp(&self.size) {
            std::cmp::Ordering::Less => {
                self.address_space.insert_chunk(ChunkDescriptor::unmapped(
                    self.ptr.add(new_size),
                    self.size - new_size,
                ));
            }
            std::cmp::Ordering::Greater => {
                self.address_space.insert_chunk(ChunkDescriptor::new(
                    self.end(),
                    new_size - self.size,
                    self.permission,
                    self.state,
                ));
            }
            std::cmp::Ordering::Equal => {}
        }

        tracing::debug!(
            ptr = %self.ptr,
            old_size = self.size,
            new_size,
            "resized private memory"
        );
        self.size = new_size;
        Ok(())
    }

    /// Change the guest permission of part of the allocation.
    ///
    /// The range is clamped to the allocation, so callers may pass ranges
    /// that stick out of it. Granting write access to `CodeStatic` memory
    /// promotes the whole allocation to `CodeMutable`; how much of the chunk
    /// map follows is set by the address space's [`PromotionScope`].
    ///
    /// Host protection is left alone.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Misaligned`] if the clamped start is not page-aligned
    pub fn update_permission(
        &mut self,
        ptr: Vaddr,
        size: u64,
        permission: Permission,
    ) -> Result<()> {
        let end = self.end();
        let ptr = ptr.clamp(self.ptr, end);
        let size = size.min(end.diff(ptr));

        if !ptr.is_null() && !ptr.is_page_aligned() {
            return Err(MemoryError::Misaligned(ptr));
        }

        if self.state == MemoryState::CodeStatic && permission.write {
            self.state = MemoryState::CodeMutable;
            tracing::debug!(ptr = %self.ptr, "static code made writable, now mutable");

            if self.address_space.config().promotion_scope == PromotionScope::WholeAllocation {
                self.retag_static_code(ptr, ptr.add(size));
            }
        }

        self.address_space
            .insert_chunk(ChunkDescriptor::new(ptr, size, permission, self.state));
        Ok(())
    }

    /// Re-tag every `CodeStatic` chunk of the allocation outside
    /// `[skip_start, skip_end)` with the current state.
    fn retag_static_code(&self, skip_start: Vaddr, skip_end: Vaddr) {
        let outside = self
            .address_space
            .chunks_in(self.ptr, skip_start)
            .into_iter()
            .chain(self.address_space.chunks_in(skip_end, self.end()));

        for chunk in outside.filter(|chunk| chunk.state == MemoryState::CodeStatic) {
            self.address_space.insert_chunk(ChunkDescriptor::new(
                chunk.base,
                chunk.size,
                chunk.permission,
                self.state,
            ));
        }
    }
}

/// Validate that `[ptr, ptr + size)` lies in the address space and return
/// its end.
fn checked_end<H: HostMemory>(
    address_space: &AddressSpace<H>,
    ptr: Vaddr,
    size: u64,
) -> Result<Vaddr> {
    let Some(end) = ptr.checked_add(size) else {
        return Err(MemoryError::OutOfBounds {
            start: ptr,
            end: Vaddr::new(u64::MAX),
        });
    };
    if !address_space.is_inside(ptr) || !address_space.is_inside(end) {
        return Err(MemoryError::OutOfBounds { start: ptr, end });
    }
    Ok(end)
}

impl<H: HostMemory> KernelObject for PrivateMemory<H> {
    fn object_type(&self) -> KernelObjectType {
        KernelObjectType::PrivateMemory
    }
}

impl<H: HostMemory> Drop for PrivateMemory<H> {
    fn drop(&mut self) {
        // Teardown must finish even if the host refuses.
        if let Err(error) = self
            .address_space
            .host()
            .protect(self.ptr, self.size, Permission::NONE)
        {
            tracing::warn!(
                ptr = %self.ptr,
                size = self.size,
                %error,
                "failed to revoke host access to private memory"
            );
        }
        self.address_space
            .insert_chunk(ChunkDescriptor::unmapped(self.ptr, self.size));
        tracing::debug!(ptr = %self.ptr, size = self.size, "destroyed private memory");
    }
}

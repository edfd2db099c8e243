// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Registry of the live private memory allocations of one address space.
//!
//! The table owns its allocations and hands out generation-checked handles.
//! Removing an allocation bumps the generation of its slot, so handles to it
//! go stale instead of silently referring to whatever reuses the slot.
//!
//! The table also keeps allocations disjoint: a range overlapping a live
//! allocation is rejected before the chunk map is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kmem_abi::{MemoryState, Permission, Vaddr};

use crate::address_space::AddressSpace;
use crate::error::{MemoryError, Result};
use crate::host::HostMemory;
use crate::private_memory::PrivateMemory;

/// Generation-checked reference to an allocation in a [`PrivateMemoryTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivateMemoryHandle {
    index: u32,
    generation: u32,
}

impl PrivateMemoryHandle {
    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for PrivateMemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateMemoryHandle({}v{})", self.index, self.generation)
    }
}

/// An allocation the table refused to take, handed back to the caller.
///
/// The allocation is returned rather than dropped: dropping it would unmap
/// its range, which may belong to a live allocation.
#[derive(Debug)]
pub struct Rejected<H: HostMemory> {
    error: MemoryError,
    memory: PrivateMemory<H>,
}

impl<H: HostMemory> Rejected<H> {
    /// Why the allocation was refused.
    #[inline]
    #[must_use]
    pub const fn error(&self) -> &MemoryError {
        &self.error
    }

    /// Take back the refused allocation.
    #[must_use]
    pub fn into_memory(self) -> PrivateMemory<H> {
        self.memory
    }

    /// Split into the error and the allocation.
    #[must_use]
    pub fn into_parts(self) -> (MemoryError, PrivateMemory<H>) {
        (self.error, self.memory)
    }
}

#[derive(Debug)]
struct Slot<H: HostMemory> {
    generation: u32,
    memory: Option<PrivateMemory<H>>,
}

/// Owner of the live allocations of one address space.
#[derive(Debug)]
pub struct PrivateMemoryTable<H: HostMemory> {
    address_space: Arc<AddressSpace<H>>,
    slots: Vec<Slot<H>>,
    /// Indices of empty slots, reused last-in first-out.
    free: Vec<u32>,
    /// Slot index of every live allocation keyed by its base.
    by_base: BTreeMap<Vaddr, u32>,
}

impl<H: HostMemory> PrivateMemoryTable<H> {
    /// Create an empty table for allocations in `address_space`.
    #[must_use]
    pub const fn new(address_space: Arc<AddressSpace<H>>) -> Self {
        Self {
            address_space,
            slots: Vec::new(),
            free: Vec::new(),
            by_base: BTreeMap::new(),
        }
    }

    /// The address space all allocations of this table live in.
    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> &Arc<AddressSpace<H>> {
        &self.address_space
    }

    /// Number of live allocations.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_base.len()
    }

    /// Returns true if there are no live allocations.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_base.is_empty()
    }

    /// Create an allocation over `[ptr, ptr + size)` and register it.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Overlap`] if the range overlaps a live allocation
    /// - any error of [`PrivateMemory::create`]
    pub fn create(
        &mut self,
        ptr: Vaddr,
        size: u64,
        permission: Permission,
        state: MemoryState,
    ) -> Result<PrivateMemoryHandle> {
        if let Some(end) = ptr.checked_add(size) {
            self.check_overlap(ptr, end, None)?;
        }
        let memory = PrivateMemory::create(&self.address_space, ptr, size, permission, state)?;
        Ok(self.register(memory))
    }

    /// Register an allocation created elsewhere.
    ///
    /// # Errors
    ///
    /// The allocation is handed back inside [`Rejected`] with
    /// [`MemoryError::ForeignAddressSpace`] if it lives in another address
    /// space, or [`MemoryError::Overlap`] if it overlaps a live allocation.
    pub fn insert(
        &mut self,
        memory: PrivateMemory<H>,
    ) -> core::result::Result<PrivateMemoryHandle, Rejected<H>> {
        if !Arc::ptr_eq(memory.address_space(), &self.address_space) {
            return Err(Rejected {
                error: MemoryError::ForeignAddressSpace,
                memory,
            });
        }
        if let Err(error) = self.check_overlap(memory.ptr(), memory.end(), None) {
            return Err(Rejected { error, memory });
        }
        Ok(self.register(memory))
    }

    /// The allocation `handle` refers to, if it is still live.
    #[must_use]
    pub fn get(&self, handle: PrivateMemoryHandle) -> Option<&PrivateMemory<H>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.memory.as_ref()
    }

    /// Unregister an allocation and hand it back.
    ///
    /// Dropping the result destroys the allocation.
    pub fn remove(&mut self, handle: PrivateMemoryHandle) -> Option<PrivateMemory<H>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let memory = slot.memory.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_base.remove(&memory.ptr());
        tracing::debug!(?handle, ptr = %memory.ptr(), "removed private memory from table");
        Some(memory)
    }

    /// Resize the allocation `handle` refers to.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidHandle`] if the handle is stale
    /// - [`MemoryError::Overlap`] if growing would run into a live allocation
    /// - any error of [`PrivateMemory::resize`]
    pub fn resize(&mut self, handle: PrivateMemoryHandle, new_size: u64) -> Result<()> {
        let memory = self.get(handle).ok_or(MemoryError::InvalidHandle)?;
        let ptr = memory.ptr();
        if new_size > memory.size() {
            if let Some(end) = ptr.checked_add(new_size) {
                self.check_overlap(ptr, end, Some(handle.index))?;
            }
        }
        self.live_mut(handle)?.resize(new_size)
    }

    /// Change the guest permission of part of the allocation `handle` refers
    /// to.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidHandle`] if the handle is stale
    /// - any error of [`PrivateMemory::update_permission`]
    pub fn update_permission(
        &mut self,
        handle: PrivateMemoryHandle,
        ptr: Vaddr,
        size: u64,
        permission: Permission,
    ) -> Result<()> {
        self.live_mut(handle)?
            .update_permission(ptr, size, permission)
    }

    /// The handle of the allocation containing `addr`.
    #[must_use]
    pub fn find(&self, addr: Vaddr) -> Option<PrivateMemoryHandle> {
        let (_, index) = self.by_base.range(..=addr).next_back()?;
        let slot = self.slots.get(*index as usize)?;
        let memory = slot.memory.as_ref()?;
        memory.contains(addr).then_some(PrivateMemoryHandle {
            index: *index,
            generation: slot.generation,
        })
    }

    /// All live allocations with their handles, in address order.
    pub fn iter(&self) -> impl Iterator<Item = (PrivateMemoryHandle, &PrivateMemory<H>)> {
        self.by_base.values().filter_map(|index| {
            let slot = self.slots.get(*index as usize)?;
            let memory = slot.memory.as_ref()?;
            Some((
                PrivateMemoryHandle {
                    index: *index,
                    generation: slot.generation,
                },
                memory,
            ))
        })
    }

    fn live_mut(&mut self, handle: PrivateMemoryHandle) -> Result<&mut PrivateMemory<H>> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or(MemoryError::InvalidHandle)?;
        if slot.generation != handle.generation {
            return Err(MemoryError::InvalidHandle);
        }
        slot.memory.as_mut().ok_or(MemoryError::InvalidHandle)
    }

    fn register(&mut self, memory: PrivateMemory<H>) -> PrivateMemoryHandle {
        let ptr = memory.ptr();
        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.memory = Some(memory);
            PrivateMemoryHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                memory: Some(memory),
            });
            PrivateMemoryHandle {
                index,
                generation: 0,
            }
        };
        self.by_base.insert(ptr, handle.index);
        tracing::debug!(?handle, %ptr, "registered private memory");
        handle
    }

    /// Reject `[start, end)` if it overlaps or shares its base with a live
    /// allocation other than slot `skip`.
    ///
    /// Live allocations are disjoint, so their ends grow with their bases and
    /// only the closest allocation below the end of the range needs checking.
    fn check_overlap(&self, start: Vaddr, end: Vaddr, skip: Option<u32>) -> Result<()> {
        let upper = start.checked_add(1).map_or(end, |next| end.max(next));
        let closest = self
            .by_base
            .range(..upper)
            .rev()
            .find(|(_, index)| Some(**index) != skip)
            .and_then(|(_, index)| self.slots.get(*index as usize)?.memory.as_ref());

        match closest {
            Some(other) if other.ptr() == start || other.end() > start => {
                tracing::debug!(%start, %end, other = %other.ptr(), "rejected overlapping range");
                Err(MemoryError::Overlap { start, end })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod table_test;

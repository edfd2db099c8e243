// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory state tags.
//!
//! A memory state says what a region *is* (heap, stack, static code, ...)
//! independently of its permission. Other subsystems make policy decisions
//! from it, e.g. the JIT may cache translations of `CodeStatic` regions but
//! must invalidate `CodeMutable` ones on write.
//!
//! The value reported to the guest packs the state id into the low byte and
//! the attribute flags into the bits above it.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Capabilities a memory state grants to operations on its regions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryStateAttributes: u32 {
        /// The guest may change the permission of the region.
        const PERMISSION_CHANGE_ALLOWED = 1 << 8;
        /// Debug syscalls may read and write regardless of permission.
        const FORCE_RW_BY_DEBUG = 1 << 9;
        /// The region may be sent in IPC buffers.
        const IPC_ALLOWED = 1 << 10;
        /// The region may be mapped elsewhere with `MapMemory`.
        const MAP_ALLOWED = 1 << 15;
        /// The physical address of the region may be queried.
        const QUERY_PHYSICAL_ALLOWED = 1 << 18;
        /// The backing pages come from the kernel's page pool.
        const IS_POOL_ALLOCATED = 1 << 22;
        /// The backing pages are reference counted.
        const IS_REFERENCE_COUNTED = 1 << 23;
        /// The guest may change memory attributes of the region.
        const ATTRIBUTE_CHANGE_ALLOWED = 1 << 24;
        /// The region may back a code memory object.
        const CODE_MEMORY_ALLOWED = 1 << 25;
    }
}

/// Semantic tag of a guest memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MemoryState {
    /// Not backed by anything; the hole state.
    #[default]
    Unmapped = 0x00,
    /// Device memory.
    Io = 0x01,
    /// Static mapping set up by the kernel.
    Static = 0x02,
    /// Code loaded with the process image, never written.
    CodeStatic = 0x03,
    /// Code or data of the process image that has become writable.
    CodeMutable = 0x04,
    /// Heap memory.
    Heap = 0x05,
    /// Shared memory object mapping.
    SharedMemory = 0x06,
    /// Alias of another region created by `MapMemory`.
    Alias = 0x07,
    /// Alias of code created by `MapProcessCodeMemory`.
    AliasCode = 0x08,
    /// Alias of code data.
    AliasCodeData = 0x09,
    /// IPC buffer mapping.
    Ipc = 0x0A,
    /// Thread stack.
    Stack = 0x0B,
    /// Thread local storage.
    ThreadLocal = 0x0C,
    /// Transfer memory with the owner's access revoked.
    TransferMemoryIsolated = 0x0D,
    /// Transfer memory shared with its owner.
    TransferMemory = 0x0E,
    /// Memory of another process mapped with `MapProcessMemory`.
    ProcessMemory = 0x0F,
    /// Reserved, never accessible.
    Reserved = 0x10,
    /// Non-secure IPC buffer mapping.
    NonSecureIpc = 0x11,
    /// Non-device IPC buffer mapping.
    NonDeviceIpc = 0x12,
    /// Kernel stack.
    KernelStack = 0x13,
    /// Code memory object mapped read-only.
    CodeReadOnly = 0x14,
    /// Code memory object mapped writable.
    CodeWritable = 0x15,
}

impl MemoryState {
    /// Every state, in id order.
    pub const ALL: [Self; 22] = [
        Self::Unmapped,
        Self::Io,
        Self::Static,
        Self::CodeStatic,
        Self::CodeMutable,
        Self::Heap,
        Self::SharedMemory,
        Self::Alias,
        Self::AliasCode,
        Self::AliasCodeData,
        Self::Ipc,
        Self::Stack,
        Self::ThreadLocal,
        Self::TransferMemoryIsolated,
        Self::TransferMemory,
        Self::ProcessMemory,
        Self::Reserved,
        Self::NonSecureIpc,
        Self::NonDeviceIpc,
        Self::KernelStack,
        Self::CodeReadOnly,
        Self::CodeWritable,
    ];

    /// The state id (low byte of the guest encoding).
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Looks up a state by id.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// The attribute flags this state carries.
    #[must_use]
    pub const fn attributes(self) -> MemoryStateAttributes {
        type A = MemoryStateAttributes;
        let pooled = A::IS_POOL_ALLOCATED.union(A::IS_REFERENCE_COUNTED);
        match self {
            Self::Unmapped | Self::Reserved | Self::KernelStack => A::empty(),
            Self::Io => A::FORCE_RW_BY_DEBUG,
            Self::Static => A::FORCE_RW_BY_DEBUG.union(A::QUERY_PHYSICAL_ALLOWED),
            Self::CodeStatic => A::PERMISSION_CHANGE_ALLOWED
                .union(A::FORCE_RW_BY_DEBUG)
                .union(A::IPC_ALLOWED)
                .union(A::MAP_ALLOWED)
                .union(A::QUERY_PHYSICAL_ALLOWED)
                .union(pooled),
            Self::CodeMutable => A::PERMISSION_CHANGE_ALLOWED
                .union(A::FORCE_RW_BY_DEBUG)
                .union(A::IPC_ALLOWED)
                .union(A::MAP_ALLOWED)
                .union(A::QUERY_PHYSICAL_ALLOWED)
                .union(A::ATTRIBUTE_CHANGE_ALLOWED)
                .union(A::CODE_MEMORY_ALLOWED)
                .union(pooled),
            Self::Heap => A::IPC_ALLOWED
                .union(A::MAP_ALLOWED)
                .union(A::QUERY_PHYSICAL_ALLOWED)
                .union(A::ATTRIBUTE_CHANGE_ALLOWED)
                .union(A::CODE_MEMORY_ALLOWED)
                .union(pooled),
            Self::SharedMemory | Self::TransferMemory | Self::TransferMemoryIsolated => {
                A::IPC_ALLOWED.union(pooled)
            }
            Self::Alias | Self::AliasCodeData => A::IPC_ALLOWED
                .union(A::QUERY_PHYSICAL_ALLOWED)
                .union(A::ATTRIBUTE_CHANGE_ALLOWED)
                .union(pooled),
            Self::AliasCode => A::FORCE_RW_BY_DEBUG
                .union(A::IPC_ALLOWED)
                .union(A::QUERY_PHYSICAL_ALLOWED)
                .union(pooled),
            Self::Ipc | Self::NonSecureIpc | Self::NonDeviceIpc => pooled,
            Self::Stack => A::IPC_ALLOWED.union(A::ATTRIBUTE_CHANGE_ALLOWED).union(pooled),
            Self::ThreadLocal | Self::ProcessMemory => pooled,
            Self::CodeReadOnly | Self::CodeWritable => A::IPC_ALLOWED.union(pooled),
        }
    }

    /// The full value reported to the guest by memory queries.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.attributes().bits() | self.id() as u32
    }

    /// Returns true if the state holds code of any kind.
    #[inline]
    #[must_use]
    pub const fn is_code(self) -> bool {
        matches!(
            self,
            Self::CodeStatic
                | Self::CodeMutable
                | Self::AliasCode
                | Self::AliasCodeData
                | Self::CodeReadOnly
                | Self::CodeWritable
        )
    }

    /// Returns true if the state holds code that is never modified, so
    /// translated code for it can be cached.
    #[inline]
    #[must_use]
    pub const fn is_static_code(self) -> bool {
        matches!(self, Self::CodeStatic | Self::CodeReadOnly)
    }

    /// Returns true if this is the hole state.
    #[inline]
    #[must_use]
    pub const fn is_unmapped(self) -> bool {
        matches!(self, Self::Unmapped)
    }
}

impl fmt::Display for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

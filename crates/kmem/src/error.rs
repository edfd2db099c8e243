// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Error types for guest memory operations.

use std::io;

use kmem_abi::{Permission, Vaddr};
use thiserror::Error;

/// Result type alias using [`MemoryError`].
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors returned by allocation and address-space operations.
///
/// All of them are fatal to the requested operation and leave the object
/// that reported them unchanged.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The requested range is not fully inside the guest address space.
    #[error("allocation isn't inside guest address space: {start:#X} - {end:#X}")]
    OutOfBounds { start: Vaddr, end: Vaddr },

    /// A supplied address is not page-aligned.
    #[error("non-page-aligned address: {0:#X}")]
    Misaligned(Vaddr),

    /// The requested range overlaps a live allocation.
    #[error("range {start:#X} - {end:#X} overlaps a live private memory allocation")]
    Overlap { start: Vaddr, end: Vaddr },

    /// A table handle refers to an allocation that no longer exists.
    #[error("stale or unknown private memory handle")]
    InvalidHandle,

    /// An allocation belongs to a different address space than the table.
    #[error("allocation belongs to a different address space")]
    ForeignAddressSpace,

    /// The address space configuration or reservation is unusable.
    #[error("invalid address space configuration: {0}")]
    InvalidConfig(&'static str),

    /// The host page-protection call failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// What a host memory call was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOperation {
    /// Reserving the backing range.
    Reserve,
    /// Changing page protection.
    Protect(Permission),
}

/// A failed host memory call, carrying the OS error.
#[derive(Debug, Error)]
#[error("host failed to {operation} {size:#X} bytes @ {base:#X}: {source}")]
pub struct HostError {
    operation: HostOperation,
    base: Vaddr,
    size: u64,
    #[source]
    source: io::Error,
}

impl HostError {
    /// Creates a host error from its parts.
    #[must_use]
    pub const fn new(operation: HostOperation, base: Vaddr, size: u64, source: io::Error) -> Self {
        Self {
            operation,
            base,
            size,
            source,
        }
    }

    /// Creates a host error from the calling thread's `errno`.
    #[must_use]
    pub fn last_os_error(operation: HostOperation, base: Vaddr, size: u64) -> Self {
        Self::new(operation, base, size, io::Error::last_os_error())
    }

    /// The operation that failed.
    #[must_use]
    pub const fn operation(&self) -> HostOperation {
        self.operation
    }

    /// Start of the range the call was made for.
    #[must_use]
    pub const fn base(&self) -> Vaddr {
        self.base
    }

    /// Length of the range the call was made for.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// The OS error code, if the failure came from the OS.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }
}

impl std::fmt::Display for HostOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reserve => write!(f, "reserve"),
            Self::Protect(protection) => write!(f, "protect ({protection})"),
        }
    }
}

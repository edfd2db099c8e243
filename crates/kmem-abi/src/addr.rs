// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Guest virtual address type.
//!
//! The guest address space is backed one-to-one by a host reservation, so a
//! guest address is also the host address of the byte it names.

use core::fmt;
use core::ops::Add;

use crate::layout::PAGE_SIZE;

/// A guest virtual address.
///
/// Used for every range boundary handed to the chunk map and to host
/// protection calls.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Vaddr(u64);

impl Vaddr {
    /// Create a new virtual address.
    #[inline]
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Create a null (zero) virtual address.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Check if this is a null address.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Get the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Convert to a raw mutable pointer for host calls.
    #[inline]
    #[must_use]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Add an offset to this address.
    #[inline]
    #[must_use]
    pub const fn add(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, offset: u64) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Calculate the difference between two addresses.
    #[inline]
    #[must_use]
    pub const fn diff(self, other: Self) -> u64 {
        self.0.wrapping_sub(other.0)
    }

    /// Check if this address sits on a [`PAGE_SIZE`] boundary.
    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        (self.0 & (PAGE_SIZE - 1)) == 0
    }
}

impl fmt::Debug for Vaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vaddr({:#x})", self.0)
    }
}

impl fmt::Display for Vaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::UpperHex for Vaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl From<u64> for Vaddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

impl Add<u64> for Vaddr {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self::add(self, rhs)
    }
}

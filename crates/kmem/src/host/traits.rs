// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host memory trait.

use kmem_abi::{Permission, Vaddr};

use crate::error::HostError;

/// A host reservation backing a guest address space.
///
/// Guest addresses are host addresses: `base()` is both the first byte of
/// the reservation and the first valid guest address.
pub trait HostMemory: Send + Sync {
    /// First address of the reservation.
    fn base(&self) -> Vaddr;

    /// Size of the reservation in bytes.
    fn size(&self) -> u64;

    /// Changes the host protection of `[base, base + size)`.
    ///
    /// # Errors
    ///
    /// Returns the host error if the protection cannot be changed.
    fn protect(&self, base: Vaddr, size: u64, protection: Permission) -> Result<(), HostError>;
}

impl<H: HostMemory + ?Sized> HostMemory for Box<H> {
    fn base(&self) -> Vaddr {
        (**self).base()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn protect(&self, base: Vaddr, size: u64, protection: Permission) -> Result<(), HostError> {
        (**self).protect(base, size, protection)
    }
}

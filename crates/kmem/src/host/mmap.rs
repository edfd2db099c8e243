// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host reservation backed by an anonymous `mmap`.
//!
//! The whole guest address space is reserved once with no access and
//! `MAP_NORESERVE`, so untouched pages cost nothing. Allocations later open
//! windows into it with `mprotect`.

use std::ptr::NonNull;

use kmem_abi::{Permission, Vaddr};

use crate::error::{HostError, HostOperation};
use crate::host::HostMemory;

/// A `PROT_NONE` anonymous mapping reserving a guest address space.
#[derive(Debug)]
pub struct MmapReservation {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: The reservation owns its mapping; protection changes through
// `mprotect` are safe to issue from any thread.
unsafe impl Send for MmapReservation {}
// SAFETY: See `Send`; the struct itself is immutable after construction.
unsafe impl Sync for MmapReservation {}

impl MmapReservation {
    /// Reserves `size` bytes of host address space with no access.
    ///
    /// # Errors
    ///
    /// Returns a host error if `size` does not fit the host or `mmap` fails.
    pub fn new(size: u64) -> Result<Self, HostError> {
        let len = usize::try_from(size).map_err(|_| {
            HostError::new(
                HostOperation::Reserve,
                Vaddr::null(),
                size,
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            )
        })?;

        // SAFETY: Anonymous private mapping at a kernel-chosen address; no
        // existing memory is affected.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(HostError::last_os_error(
                HostOperation::Reserve,
                Vaddr::null(),
                size,
            ));
        }

        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| {
            HostError::new(
                HostOperation::Reserve,
                Vaddr::null(),
                size,
                std::io::Error::from(std::io::ErrorKind::AddrNotAvailable),
            )
        })?;

        tracing::debug!(base = ?ptr, size = len, "reserved guest address space");
        Ok(Self { ptr, size: len })
    }

    fn contains(&self, base: Vaddr, size: u64) -> bool {
        let start = self.base();
        base >= start
            && base
                .checked_add(size)
                .is_some_and(|end| end <= start.add(self.size()))
    }
}

const fn prot_flags(protection: Permission) -> libc::c_int {
    let mut flags = libc::PROT_NONE;
    if protection.read {
        flags |= libc::PROT_READ;
    }
    if protection.write {
        flags |= libc::PROT_WRITE;
    }
    if protection.execute {
        flags |= libc::PROT_EXEC;
    }
    flags
}

impl HostMemory for MmapReservation {
    fn base(&self) -> Vaddr {
        Vaddr::new(self.ptr.as_ptr() as u64)
    }

    fn size(&self) -> u64 {
        self.size as u64
    }

    fn protect(&self, base: Vaddr, size: u64, protection: Permission) -> Result<(), HostError> {
        let operation = HostOperation::Protect(protection);
        // Refuse to touch host memory outside the reservation.
        if !self.contains(base, size) {
            return Err(HostError::new(
                operation,
                base,
                size,
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            ));
        }
        let len = usize::try_from(size).map_err(|_| {
            HostError::new(
                operation,
                base,
                size,
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            )
        })?;

        tracing::trace!(%base, size, %protection, "mprotect");
        // SAFETY: The range lies inside our own reservation, which nothing
        // else in the process uses.
        let result = unsafe { libc::mprotect(base.as_mut_ptr(), len, prot_flags(protection)) };
        if result < 0 {
            return Err(HostError::last_os_error(operation, base, size));
        }
        Ok(())
    }
}

impl Drop for MmapReservation {
    fn drop(&mut self) {
        // SAFETY: We own the mapping and nothing can reference it once the
        // address space holding us is gone.
        let result = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.size) };
        if result < 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to release guest address space reservation"
            );
        }
    }
}

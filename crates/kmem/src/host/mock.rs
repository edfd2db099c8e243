// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock host implementation for testing.
//!
//! `MockHost` pretends to own a reservation at any base address and records
//! the protection of every page, so allocation logic can be tested without
//! touching real host mappings. It can also be told to fail calls to
//! exercise host error paths.

use std::collections::BTreeMap;
use std::io;

use kmem_abi::layout::PAGE_SIZE;
use kmem_abi::{Permission, Vaddr};
use parking_lot::Mutex;

use crate::error::{HostError, HostOperation};
use crate::host::HostMemory;

/// One recorded `protect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectCall {
    /// Start of the range.
    pub base: Vaddr,
    /// Length of the range in bytes.
    pub size: u64,
    /// Requested protection.
    pub protection: Permission,
}

#[derive(Debug, Default)]
struct MockState {
    /// Protection per page; absent pages have no access.
    pages: BTreeMap<u64, Permission>,
    calls: Vec<ProtectCall>,
    failures_pending: usize,
}

/// A fake reservation that records page protections.
#[derive(Debug)]
pub struct MockHost {
    base: Vaddr,
    size: u64,
    state: Mutex<MockState>,
}

impl MockHost {
    /// Create a mock reservation covering `[base, base + size)`.
    #[must_use]
    pub fn new(base: Vaddr, size: u64) -> Self {
        Self {
            base,
            size,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Make the next `count` calls to `protect` fail with `ENOMEM`-like errors.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures_pending = count;
    }

    /// Current host protection of the page containing `addr`.
    #[must_use]
    pub fn protection_at(&self, addr: Vaddr) -> Permission {
        let page = addr.as_u64() & !(PAGE_SIZE - 1);
        self.state
            .lock()
            .pages
            .get(&page)
            .copied()
            .unwrap_or(Permission::NONE)
    }

    /// All successful and failed `protect` calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProtectCall> {
        self.state.lock().calls.clone()
    }

    /// Number of pages currently accessible in any way.
    #[must_use]
    pub fn accessible_pages(&self) -> usize {
        self.state
            .lock()
            .pages
            .values()
            .filter(|protection| !protection.is_none())
            .count()
    }
}

impl HostMemory for MockHost {
    fn base(&self) -> Vaddr {
        self.base
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn protect(&self, base: Vaddr, size: u64, protection: Permission) -> Result<(), HostError> {
        let operation = HostOperation::Protect(protection);
        let mut state = self.state.lock();
        state.calls.push(ProtectCall {
            base,
            size,
            protection,
        });

        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(HostError::new(
                operation,
                base,
                size,
                io::Error::from(io::ErrorKind::OutOfMemory),
            ));
        }

        let end = base.checked_add(size);
        if base < self.base || end.is_none_or(|end| end > self.base.add(self.size)) {
            return Err(HostError::new(
                operation,
                base,
                size,
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }

        // Like mprotect, partial pages are rounded out to whole pages.
        let first = base.as_u64() & !(PAGE_SIZE - 1);
        let last = base.as_u64().saturating_add(size);
        let mut page = first;
        while page < last {
            if protection.is_none() {
                state.pages.remove(&page);
            } else {
                state.pages.insert(page, protection);
            }
            page += PAGE_SIZE;
        }
        Ok(())
    }
}

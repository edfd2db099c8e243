// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host memory abstraction.
//!
//! The guest address space is backed by one host reservation. Allocations
//! only ever change the host protection of pages inside it; they never map or
//! unmap host memory themselves.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │     PrivateMemory / AddressSpace              │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │              `HostMemory`                     │
//! └──────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌─────────────────────┐   ┌──────────────────────┐
//! │    `MockHost`       │   │   `MmapReservation`  │
//! │    (for testing)    │   │   (unix hosts)       │
//! └─────────────────────┘   └──────────────────────┘
//! ```

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(unix)]
mod mmap;
mod traits;


#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHost, ProtectCall};
#[cfg(unix)]
pub use mmap::MmapReservation;
pub use traits::HostMemory;

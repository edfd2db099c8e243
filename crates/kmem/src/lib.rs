// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # kmem
//!
//! Guest virtual-memory bookkeeping for an emulated kernel.
//!
//! This crate:
//! - Reserves host memory for a guest address space ([`AddressSpace`])
//! - Tracks every range of that space as a tagged chunk ([`ChunkMap`])
//! - Implements privately owned allocations ([`PrivateMemory`]) that open
//!   host access, resize, change guest permissions and tear down
//! - Registers live allocations behind checked handles
//!   ([`PrivateMemoryTable`])
//!
//! Guest permissions live only in the chunk map. Live allocations are always
//! host read/write/execute.

pub mod address_space;
pub mod chunk_map;
pub mod config;
pub mod error;
pub mod host;
pub mod object;
pub mod private_memory;
pub mod table;

pub use address_space::AddressSpace;
pub use chunk_map::ChunkMap;
pub use config::{AddressSpaceConfig, PromotionScope};
pub use error::{HostError, HostOperation, MemoryError, Result};
#[cfg(any(test, feature = "mock"))]
pub use host::MockHost;
#[cfg(unix)]
pub use host::MmapReservation;
pub use host::HostMemory;
pub use kmem_abi;
pub use kmem_abi::{ChunkDescriptor, MemoryInfo, MemoryState, Permission, Vaddr};
pub use object::{KernelObject, KernelObjectType};
pub use private_memory::PrivateMemory;
pub use table::{PrivateMemoryHandle, PrivateMemoryTable, Rejected};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

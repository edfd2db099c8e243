// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Guest memory types shared between the kernel emulation and its consumers.
//!
//! This crate defines the vocabulary the memory subsystem speaks:
//! - Guest virtual addresses
//! - Guest-visible permissions and memory states
//! - Chunk descriptors, the unit of address-space bookkeeping
//! - Page size and address-space width constants
//!
//! # Design Principles
//!
//! - **No logic**: Pure data types, 100% host-testable
//! - **Software permissions**: [`Permission`] is what the guest sees, never
//!   what the host page tables say
//! - **64-bit only**: Guest addresses are always `u64`
//!
//! # Modules
//!
//! - [`addr`]: The [`Vaddr`] newtype
//! - [`layout`]: Page size and address-space widths
//! - [`permission`]: Read/write/execute flags
//! - [`state`]: [`MemoryState`] tags and their attributes
//! - [`chunk`]: [`ChunkDescriptor`] and [`MemoryInfo`]

#![cfg_attr(not(test), no_std)]

pub mod addr;
pub mod chunk;
pub mod layout;
pub mod permission;
pub mod state;


pub use addr::Vaddr;
pub use chunk::{ChunkDescriptor, MemoryInfo};
pub use layout::{AddressSpaceType, PAGE_SIZE};
pub use permission::Permission;
pub use state::{MemoryState, MemoryStateAttributes};

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Address space configuration.

use kmem_abi::layout::{MAX_ADDRESS_SPACE_SIZE, PAGE_SIZE};
use kmem_abi::AddressSpaceType;

use crate::error::{MemoryError, Result};

/// How far a `CodeStatic` to `CodeMutable` promotion reaches in the chunk map.
///
/// A write grant on part of a static code allocation changes the state of the
/// whole allocation object, but the permission update itself only covers the
/// requested sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionScope {
    /// Only the updated sub-range is re-tagged. Chunks of the allocation
    /// outside it keep `CodeStatic` until they are touched.
    #[default]
    SubRange,
    /// Every chunk of the allocation still tagged `CodeStatic` is re-tagged
    /// `CodeMutable`, keeping its own permission.
    WholeAllocation,
}

/// Configuration of one emulated process's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpaceConfig {
    /// Guest address-space layout. Determines the reservation size unless
    /// `reservation_size` overrides it.
    pub address_space_type: AddressSpaceType,
    /// Explicit reservation size in bytes.
    pub reservation_size: Option<u64>,
    /// Reach of code state promotion.
    pub promotion_scope: PromotionScope,
    /// Merge adjacent chunks carrying identical tags.
    pub merge_adjacent: bool,
}

impl Default for AddressSpaceConfig {
    fn default() -> Self {
        Self {
            address_space_type: AddressSpaceType::AddressSpace39Bit,
            reservation_size: None,
            promotion_scope: PromotionScope::default(),
            merge_adjacent: true,
        }
    }
}

impl AddressSpaceConfig {
    /// Size of the host range to reserve for the guest address space.
    #[must_use]
    pub fn reservation_size(&self) -> u64 {
        self.reservation_size
            .unwrap_or_else(|| self.address_space_type.size())
    }

    /// Sets the promotion scope.
    #[must_use]
    pub const fn with_promotion_scope(mut self, scope: PromotionScope) -> Self {
        self.promotion_scope = scope;
        self
    }

    /// Sets an explicit reservation size.
    #[must_use]
    pub const fn with_reservation_size(mut self, size: u64) -> Self {
        self.reservation_size = Some(size);
        self
    }

    /// Enables or disables merging of adjacent chunks.
    #[must_use]
    pub const fn with_merge_adjacent(mut self, merge: bool) -> Self {
        self.merge_adjacent = merge;
        self
    }

    /// Checks that the configuration describes a usable reservation.
    pub fn validate(&self) -> Result<()> {
        let size = self.reservation_size();
        if size == 0 {
            return Err(MemoryError::InvalidConfig("reservation size is zero"));
        }
        if size % PAGE_SIZE != 0 {
            return Err(MemoryError::InvalidConfig(
                "reservation size is not page-aligned",
            ));
        }
        if size > MAX_ADDRESS_SPACE_SIZE {
            return Err(MemoryError::InvalidConfig(
                "reservation exceeds the largest guest address space",
            ));
        }
        Ok(())
    }
}

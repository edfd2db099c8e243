// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Page size and guest address-space widths.
//!
//! The guest kernel offers three address-space layouts, selected per process
//! at creation time. Only the total width matters to the chunk map; region
//! placement inside the space is decided by the process loader.
//!
//! ```text
//! 32-bit  0x0000_0000_0000_0000 .. 0x0000_0001_0000_0000   (legacy)
//! 36-bit  0x0000_0000_0000_0000 .. 0x0000_0010_0000_0000   (legacy)
//! 39-bit  0x0000_0000_0000_0000 .. 0x0000_0080_0000_0000   (default)
//! ```

/// One gigabyte in bytes.
const GB: u64 = 1024 * 1024 * 1024;

/// One kilobyte in bytes.
const KB: u64 = 1024;

/// Guest page size (4 KB).
pub const PAGE_SIZE: u64 = 4 * KB;

/// Page size shift (log2 of `PAGE_SIZE`).
pub const PAGE_SHIFT: u32 = 12;

/// Largest address-space width the guest kernel supports.
pub const MAX_ADDRESS_SPACE_SIZE: u64 = 1 << 39;

/// Guest address-space layout of an emulated process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressSpaceType {
    /// 32-bit space with the code region below 4 GB.
    AddressSpace32Bit = 0,

    /// 36-bit space, used by older titles.
    AddressSpace36Bit = 1,

    /// 39-bit space, the default for current titles.
    AddressSpace39Bit = 2,
}

impl AddressSpaceType {
    /// Number of address bits the layout exposes.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::AddressSpace32Bit => 32,
            Self::AddressSpace36Bit => 36,
            Self::AddressSpace39Bit => 39,
        }
    }

    /// Total size of the address space in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u64 {
        1 << self.bits()
    }
}

// Compile-time verification of the layout constants
const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(AddressSpaceType::AddressSpace39Bit.size() == MAX_ADDRESS_SPACE_SIZE);
    assert!(AddressSpaceType::AddressSpace39Bit.size() == 512 * GB);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn address_space_sizes_grow() {
        assert!(
            AddressSpaceType::AddressSpace32Bit.size() < AddressSpaceType::AddressSpace36Bit.size()
        );
        assert!(
            AddressSpaceType::AddressSpace36Bit.size() < AddressSpaceType::AddressSpace39Bit.size()
        );
    }
}

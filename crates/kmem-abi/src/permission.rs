// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Read/write/execute permission flags.

use core::fmt;

/// Memory access permissions.
///
/// For chunks this is the guest-visible permission, enforced in software by
/// whoever consults the chunk map. The same type describes host page
/// protection when passed to a host memory implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permission {
    /// Allow reads.
    pub read: bool,
    /// Allow writes.
    pub write: bool,
    /// Allow execution.
    pub execute: bool,
}

impl Permission {
    /// No access.
    pub const NONE: Self = Self::new(false, false, false);

    /// Read-only.
    pub const R: Self = Self::new(true, false, false);

    /// Read-write.
    pub const RW: Self = Self::new(true, true, false);

    /// Read-execute (code).
    pub const RX: Self = Self::new(true, false, true);

    /// Read-write-execute.
    pub const RWX: Self = Self::new(true, true, true);

    /// Creates a permission set from individual flags.
    #[inline]
    #[must_use]
    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Self {
            read,
            write,
            execute,
        }
    }

    /// Returns true if no access at all is granted.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        !self.read && !self.write && !self.execute
    }

    /// Returns true if every flag set in `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.read || !other.read)
            && (self.write || !other.write)
            && (self.execute || !other.execute)
    }

    /// Packs the flags into the guest kernel's bit encoding (R=1, W=2, X=4).
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self.read as u32) | ((self.write as u32) << 1) | ((self.execute as u32) << 2)
    }

    /// Unpacks the guest kernel's bit encoding, ignoring unknown bits.
    #[inline]
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.read { 'r' } else { '-' };
        let w = if self.write { 'w' } else { '-' };
        let x = if self.execute { 'x' } else { '-' };
        write!(f, "{r}{w}{x}")
    }
}

// Compile-time verification of the permission constants
const _: () = {
    assert!(Permission::NONE.is_none());
    assert!(Permission::RWX.contains(Permission::RW));
    assert!(!Permission::RX.contains(Permission::RW));
    assert!(Permission::RWX.bits() == 7);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_ls_style() {
        assert_eq!(format!("{}", Permission::RW), "rw-");
        assert_eq!(format!("{}", Permission::RX), "r-x");
        assert_eq!(format!("{}", Permission::NONE), "---");
    }

    #[test]
    fn bits_round_trip_known_values() {
        for bits in 0..8 {
            assert_eq!(Permission::from_bits_truncate(bits).bits(), bits);
        }
        assert_eq!(Permission::from_bits_truncate(0xF8), Permission::NONE);
    }

    #[test]
    fn default_is_none() {
        assert_eq!(Permission::default(), Permission::NONE);
    }
}

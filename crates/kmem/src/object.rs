// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Kernel object type tags.

use core::fmt;

/// Kind of an emulated kernel object.
///
/// Only the objects implemented in this crate are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KernelObjectType {
    /// Privately owned, anonymously backed guest memory.
    PrivateMemory = 0,
}

/// An emulated kernel object.
pub trait KernelObject {
    /// The kind of this object.
    fn object_type(&self) -> KernelObjectType;
}

impl fmt::Display for KernelObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateMemory => f.write_str("KPrivateMemory"),
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the address space.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;

use kmem_abi::{ChunkDescriptor, MemoryState, Permission, Vaddr};

use super::*;
use crate::host::MockHost;

fn space() -> AddressSpace<MockHost> {
    AddressSpace::new(
        MockHost::new(Vaddr::new(0x1000), 0xF000),
        AddressSpaceConfig::default(),
    )
    .unwrap()
}

#[test]
fn bounds() {
    let space = space();
    assert_eq!(space.base(), Vaddr::new(0x1000));
    assert_eq!(space.end(), Vaddr::new(0x10000));
    assert!(space.is_inside(Vaddr::new(0x1000)));
    assert!(space.is_inside(Vaddr::new(0xFFFF)));
    assert!(space.is_inside(Vaddr::new(0x10000)));
    assert!(!space.is_inside(Vaddr::new(0x0FFF)));
    assert!(!space.is_inside(Vaddr::new(0x10001)));
}

#[test]
fn starts_unmapped() {
    let space = space();
    assert_eq!(
        space.chunks(),
        vec![ChunkDescriptor::unmapped(Vaddr::new(0x1000), 0xF000)]
    );
    assert!(space.is_partition());
}

#[test]
fn insert_and_query() {
    let space = space();
    space.insert_chunk(ChunkDescriptor::new(
        Vaddr::new(0x4000),
        0x2000,
        Permission::RX,
        MemoryState::CodeStatic,
    ));

    let info = space.query(Vaddr::new(0x5000)).unwrap();
    assert_eq!(info.base, Vaddr::new(0x4000));
    assert_eq!(info.state, MemoryState::CodeStatic);
    assert_eq!(space.chunks().len(), 3);
    assert_eq!(space.chunks_in(Vaddr::new(0x4000), Vaddr::new(0x6000)).len(), 1);
}

#[test]
fn rejects_misaligned_reservation() {
    let result = AddressSpace::new(
        MockHost::new(Vaddr::new(0x1800), 0xF000),
        AddressSpaceConfig::default(),
    );
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));

    let result = AddressSpace::new(
        MockHost::new(Vaddr::new(0x1000), 0x1800),
        AddressSpaceConfig::default(),
    );
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
}

#[test]
fn rejects_invalid_config() {
    let config = AddressSpaceConfig::default().with_reservation_size(0);
    let result = AddressSpace::new(MockHost::new(Vaddr::new(0x1000), 0xF000), config);
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
}

#[test]
fn rejects_reservation_size_mismatch() {
    let config = AddressSpaceConfig::default().with_reservation_size(0x2000);
    let result = AddressSpace::new(MockHost::new(Vaddr::new(0x1000), 0xF000), config);
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));

    let config = AddressSpaceConfig::default().with_reservation_size(0xF000);
    let space = AddressSpace::new(MockHost::new(Vaddr::new(0x1000), 0xF000), config).unwrap();
    assert_eq!(space.size(), 0xF000);
}

#[test]
fn rejects_oversized_reservation() {
    let result = AddressSpace::new(
        MockHost::new(Vaddr::new(0x1000), 1 << 40),
        AddressSpaceConfig::default(),
    );
    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
}

#[test]
fn concurrent_inserts_keep_partition() {
    let space = Arc::new(space());
    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let space = Arc::clone(&space);
            thread::spawn(move || {
                for round in 0..50u64 {
                    let page = 1 + (worker * 7 + round * 3) % 14;
                    let state = if round % 2 == 0 {
                        MemoryState::Heap
                    } else {
                        MemoryState::Stack
                    };
                    space.insert_chunk(ChunkDescriptor::new(
                        Vaddr::new(page * 0x1000),
                        0x1000,
                        Permission::RW,
                        state,
                    ));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(space.is_partition());
}

#[cfg(target_os = "linux")]
#[test]
fn reserve_real_memory() {
    let config = AddressSpaceConfig::default().with_reservation_size(0x10_0000);
    let space = AddressSpace::reserve(config).unwrap();
    assert_eq!(space.size(), 0x10_0000);
    assert!(space.is_inside(space.base()));
    assert!(space.is_partition());
}

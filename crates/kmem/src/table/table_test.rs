// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the private memory table.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use kmem_abi::{MemoryState, Permission, Vaddr};

use super::*;
use crate::config::AddressSpaceConfig;
use crate::host::MockHost;

fn space() -> Arc<AddressSpace<MockHost>> {
    Arc::new(
        AddressSpace::new(
            MockHost::new(Vaddr::new(0x1000), 0xF000),
            AddressSpaceConfig::default(),
        )
        .unwrap(),
    )
}

fn table() -> PrivateMemoryTable<MockHost> {
    PrivateMemoryTable::new(space())
}

fn heap(
    table: &mut PrivateMemoryTable<MockHost>,
    ptr: u64,
    size: u64,
) -> Result<PrivateMemoryHandle> {
    table.create(Vaddr::new(ptr), size, Permission::RW, MemoryState::Heap)
}

#[test]
fn create_and_get() {
    let mut table = table();
    assert!(table.is_empty());

    let handle = heap(&mut table, 0x2000, 0x1000).unwrap();
    assert_eq!(table.len(), 1);

    let memory = table.get(handle).unwrap();
    assert_eq!(memory.ptr(), Vaddr::new(0x2000));
    assert_eq!(memory.size(), 0x1000);
}

#[test]
fn create_rejects_overlap() {
    let mut table = table();
    heap(&mut table, 0x4000, 0x2000).unwrap();

    for (ptr, size) in [
        (0x3000, 0x2000),
        (0x5000, 0x1000),
        (0x4000, 0x1000),
        (0x3000, 0x4000),
        (0x4000, 0),
    ] {
        let result = heap(&mut table, ptr, size);
        assert!(
            matches!(result, Err(MemoryError::Overlap { .. })),
            "[{ptr:#x}, +{size:#x}) was accepted"
        );
    }
    assert_eq!(table.len(), 1);
    assert_eq!(table.address_space().host().calls().len(), 1);
}

#[test]
fn create_adjacent_is_fine() {
    let mut table = table();
    heap(&mut table, 0x4000, 0x2000).unwrap();
    heap(&mut table, 0x2000, 0x2000).unwrap();
    heap(&mut table, 0x6000, 0x1000).unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.address_space().is_partition());
}

#[test]
fn create_errors_propagate() {
    let mut table = table();
    assert!(matches!(
        heap(&mut table, 0x2800, 0x1000),
        Err(MemoryError::Misaligned(_))
    ));
    assert!(matches!(
        heap(&mut table, 0xF000, 0x2000),
        Err(MemoryError::OutOfBounds { .. })
    ));
    assert!(table.is_empty());
}

#[test]
fn remove_makes_handle_stale() {
    let mut table = table();
    let handle = heap(&mut table, 0x2000, 0x1000).unwrap();

    let memory = table.remove(handle).unwrap();
    assert_eq!(memory.ptr(), Vaddr::new(0x2000));
    drop(memory);

    assert!(table.is_empty());
    assert!(table.get(handle).is_none());
    assert!(table.remove(handle).is_none());
    assert!(matches!(table.resize(handle, 0x2000), Err(MemoryError::InvalidHandle)));
    assert!(matches!(
        table.update_permission(handle, Vaddr::new(0x2000), 0x1000, Permission::R),
        Err(MemoryError::InvalidHandle)
    ));
    assert_eq!(
        table.address_space().query(Vaddr::new(0x2000)).unwrap().state,
        MemoryState::Unmapped
    );
}

#[test]
fn reused_slot_gets_new_generation() {
    let mut table = table();
    let first = heap(&mut table, 0x2000, 0x1000).unwrap();
    drop(table.remove(first));

    let second = heap(&mut table, 0x2000, 0x1000).unwrap();
    assert_eq!(second.index(), first.index());
    assert_ne!(second.generation(), first.generation());
    assert!(table.get(first).is_none());
    assert!(table.get(second).is_some());
}

#[test]
fn resize_rejects_growing_into_neighbour() {
    let mut table = table();
    let low = heap(&mut table, 0x2000, 0x1000).unwrap();
    heap(&mut table, 0x4000, 0x1000).unwrap();

    table.resize(low, 0x2000).unwrap();
    assert!(matches!(table.resize(low, 0x3000), Err(MemoryError::Overlap { .. })));
    assert_eq!(table.get(low).unwrap().size(), 0x2000);

    table.resize(low, 0x1000).unwrap();
    assert_eq!(table.get(low).unwrap().size(), 0x1000);
}

#[test]
fn update_permission_through_handle() {
    let mut table = table();
    let handle = heap(&mut table, 0x2000, 0x2000).unwrap();

    table
        .update_permission(handle, Vaddr::new(0x3000), 0x1000, Permission::R)
        .unwrap();
    let info = table.address_space().query(Vaddr::new(0x3000)).unwrap();
    assert_eq!(info.base, Vaddr::new(0x3000));
    assert_eq!(info.permission, Permission::R);
}

#[test]
fn find_by_address() {
    let mut table = table();
    let low = heap(&mut table, 0x2000, 0x2000).unwrap();
    let high = heap(&mut table, 0x8000, 0x1000).unwrap();

    assert_eq!(table.find(Vaddr::new(0x2000)), Some(low));
    assert_eq!(table.find(Vaddr::new(0x3FFF)), Some(low));
    assert_eq!(table.find(Vaddr::new(0x4000)), None);
    assert_eq!(table.find(Vaddr::new(0x8800)), Some(high));
    assert_eq!(table.find(Vaddr::new(0x1000)), None);
}

#[test]
fn iter_in_address_order() {
    let mut table = table();
    let high = heap(&mut table, 0x8000, 0x1000).unwrap();
    let low = heap(&mut table, 0x2000, 0x1000).unwrap();

    let handles: Vec<_> = table.iter().map(|(handle, _)| handle).collect();
    assert_eq!(handles, vec![low, high]);
}

#[test]
fn insert_takes_foreign_allocation_back() {
    let mut table = table();
    let other = space();
    let memory = PrivateMemory::create(
        &other,
        Vaddr::new(0x2000),
        0x1000,
        Permission::RW,
        MemoryState::Heap,
    )
    .unwrap();

    let rejected = table.insert(memory).unwrap_err();
    assert!(matches!(rejected.error(), MemoryError::ForeignAddressSpace));
    let memory = rejected.into_memory();
    assert_eq!(memory.ptr(), Vaddr::new(0x2000));
    assert!(table.is_empty());
}

#[test]
fn insert_own_allocation() {
    let mut table = table();
    let memory = PrivateMemory::create(
        table.address_space(),
        Vaddr::new(0x2000),
        0x1000,
        Permission::RW,
        MemoryState::Heap,
    )
    .unwrap();

    let handle = table.insert(memory).unwrap();
    assert_eq!(table.find(Vaddr::new(0x2000)), Some(handle));
}

#[test]
fn insert_rejects_overlap() {
    let mut table = table();
    heap(&mut table, 0x2000, 0x2000).unwrap();

    let space = Arc::clone(table.address_space());
    let memory = PrivateMemory::create(
        &space,
        Vaddr::new(0x3000),
        0x1000,
        Permission::R,
        MemoryState::Heap,
    )
    .unwrap();

    let (error, memory) = table.insert(memory).unwrap_err().into_parts();
    assert!(matches!(error, MemoryError::Overlap { .. }));
    // Keep the refused allocation alive so the live one's chunks survive
    core::mem::forget(memory);
    assert_eq!(table.len(), 1);
}

#[test]
fn handle_debug_format() {
    let mut table = table();
    let handle = heap(&mut table, 0x2000, 0x1000).unwrap();
    assert_eq!(format!("{handle:?}"), "PrivateMemoryHandle(0v0)");
}

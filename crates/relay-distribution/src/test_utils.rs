//! Shared world builders for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::world::{World, WorldConfig};
use relay_core::id::*;
use relay_core::test_utils::*;
use relay_spatial::GridPosition;
use std::sync::Arc;

/// A 256x256 world over the standard content, one tick per step.
pub fn test_world() -> World {
    World::new(Arc::new(standard_registry()), WorldConfig::default())
        .expect("default world config is valid")
}

pub fn place_at(world: &mut World, block: BlockTypeId, x: i32, y: i32) -> StructureId {
    world
        .place(block, sharded(), GridPosition::new(x, y))
        .expect("test placement should succeed")
}

pub fn place_driver(world: &mut World, x: i32, y: i32) -> StructureId {
    place_at(world, mass_driver(), x, y)
}

pub fn place_bridge(world: &mut World, x: i32, y: i32) -> StructureId {
    place_at(world, phase_conveyor(), x, y)
}

pub fn place_container(world: &mut World, x: i32, y: i32) -> StructureId {
    place_at(world, container(), x, y)
}

/// Point `source` at `target`'s center.
pub fn link(world: &mut World, source: StructureId, target: StructureId) {
    let code = world
        .tiles()
        .center_of(target)
        .expect("link target should be placed")
        .code();
    world
        .set_link_code(source, code)
        .expect("link source should be linkable");
}

pub fn fill(world: &mut World, id: StructureId, item: ItemTypeId, quantity: u32) {
    let overflow = world.offer_item(id, item, quantity).expect("offer should succeed");
    assert_eq!(overflow, 0, "test fill overflowed");
}

pub fn item_total(world: &World, id: StructureId) -> u32 {
    world.structure(id).map_or(0, |s| s.items.total())
}

//! Whole-world save and load.
//!
//! A snapshot is a bitcode blob holding a [`SnapshotHeader`], the world
//! configuration, and one record per structure. Each record embeds the
//! structure's mechanism state as a revisioned [`StateWriter`] block, so a
//! reader built against an older or newer mechanism revision still restores
//! what it understands.
//!
//! The event bus is excluded (it holds closures). A restored world starts
//! with empty buffers and no listeners.

use crate::bridge::{BRIDGE_REVISION, Bridge};
use crate::driver::{DRIVER_REVISION, Driver};
use crate::structure::{Mechanism, Structure};
use crate::world::{World, WorldConfig};
use relay_core::fixed::Fixed64;
use relay_core::id::{BlockTypeId, ItemTypeId, TeamId};
use relay_core::registry::Registry;
use relay_core::serialize::{
    DeserializeError, SerializeError, SnapshotHeader, StateReader, StateWriter,
};
use relay_spatial::GridPosition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Per-structure state blocks
// ---------------------------------------------------------------------------

/// Write a structure's mechanism state at the latest revision. Returns the
/// revision tag to store alongside the bytes.
pub fn write_mechanism(mechanism: &Mechanism) -> (u8, Vec<u8>) {
    let mut w = StateWriter::new();
    let revision = match mechanism {
        Mechanism::Driver(d) => {
            d.write_state(&mut w);
            DRIVER_REVISION
        }
        Mechanism::Bridge(b) => {
            b.write_state(&mut w);
            BRIDGE_REVISION
        }
        Mechanism::Container => 0,
    };
    (revision, w.into_bytes())
}

/// Restore a mechanism's state from a block written at `revision`. The
/// mechanism variant decides how the bytes are read.
pub fn read_mechanism(
    mechanism: &mut Mechanism,
    revision: u8,
    bytes: &[u8],
) -> Result<(), DeserializeError> {
    let mut r = StateReader::new(bytes);
    match mechanism {
        Mechanism::Driver(d) => *d = Driver::read_state(&mut r, revision)?,
        Mechanism::Bridge(b) => *b = Bridge::read_state(&mut r, revision)?,
        Mechanism::Container => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Snapshot records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct StructureRecord {
    block: u32,
    team: u8,
    x: i32,
    y: i32,
    /// `(item type, quantity)` in take order.
    items: Vec<(u32, u32)>,
    efficiency_bits: i64,
    enabled: bool,
    revision: u8,
    state: Vec<u8>,
}

impl StructureRecord {
    fn capture(s: &Structure) -> Self {
        let (revision, state) = write_mechanism(&s.mechanism);
        Self {
            block: s.block.0,
            team: s.team.0,
            x: s.center.x,
            y: s.center.y,
            items: s
                .items
                .stacks()
                .iter()
                .map(|st| (st.item_type.0, st.quantity))
                .collect(),
            efficiency_bits: s.efficiency.to_bits(),
            enabled: s.enabled,
            revision,
            state,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WorldSnapshot {
    header: SnapshotHeader,
    width: u32,
    height: u32,
    delta_bits: i64,
    event_capacity: usize,
    /// Row-major by center tile.
    structures: Vec<StructureRecord>,
}

// ---------------------------------------------------------------------------
// World serialization methods
// ---------------------------------------------------------------------------

impl World {
    /// Serialize the world to a binary blob via bitcode.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let structures = self
            .tiles()
            .centers_row_major()
            .into_iter()
            .filter_map(|(_, id)| self.structure(id))
            .map(StructureRecord::capture)
            .collect();
        let config = self.config();
        let snapshot = WorldSnapshot {
            header: SnapshotHeader::new(self.tick()),
            width: config.width,
            height: config.height,
            delta_bits: config.delta.to_bits(),
            event_capacity: config.event_capacity,
            structures,
        };

        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild a world from a blob produced by [`World::serialize`].
    ///
    /// Structures are re-placed against `registry`, so every block id in the
    /// snapshot must exist there. Listeners must be re-registered afterwards.
    pub fn deserialize(data: &[u8], registry: Arc<Registry>) -> Result<Self, DeserializeError> {
        let snapshot: WorldSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let config = WorldConfig {
            width: snapshot.width,
            height: snapshot.height,
            delta: Fixed64::from_bits(snapshot.delta_bits),
            event_capacity: snapshot.event_capacity,
        };
        let mut world =
            World::new(registry, config).map_err(|e| DeserializeError::Placement(e.to_string()))?;

        for record in snapshot.structures {
            let block = BlockTypeId(record.block);
            if world.registry().get_block(block).is_none() {
                return Err(DeserializeError::UnknownBlock(record.block));
            }
            let id = world
                .place(block, TeamId(record.team), GridPosition::new(record.x, record.y))
                .map_err(|e| DeserializeError::Placement(e.to_string()))?;
            let Some(s) = world.structure_mut(id) else {
                return Err(DeserializeError::Placement(format!(
                    "structure at ({}, {}) vanished",
                    record.x, record.y
                )));
            };
            for (item, quantity) in record.items {
                s.items.set(ItemTypeId(item), quantity);
            }
            s.efficiency = Fixed64::from_bits(record.efficiency_bits);
            s.enabled = record.enabled;
            read_mechanism(&mut s.mechanism, record.revision, &record.state)?;
        }

        world.set_tick(snapshot.header.tick);
        world.reset_events();
        debug!(
            "restored {} structures at tick {}",
            world.structure_count(),
            snapshot.header.tick
        );
        Ok(world)
    }
}

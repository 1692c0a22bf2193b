use crate::fixed::Fixed64;
use crate::id::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An item type definition in the registry.
#[derive(Debug, Clone)]
pub struct ItemTypeDef {
    pub name: String,
}

/// Tunables for a point-to-point launcher block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    /// Maximum Euclidean link distance, in tiles.
    pub range: u32,
    /// Degrees turned per tick at full efficiency.
    pub rotate_speed: Fixed64,
    /// Ticks for the reload timer to drain from 1 to 0 at full efficiency.
    pub reload_ticks: Fixed64,
    /// Minimum free capacity required to accept a payload, and the minimum
    /// payload a driver will launch.
    pub min_distribute: u32,
    /// Maximum angular error, in degrees, at which both ends count as aligned.
    pub alignment_tolerance: Fixed64,
}

impl Default for DriverSpec {
    fn default() -> Self {
        Self {
            range: 55,
            rotate_speed: Fixed64::from_num(5),
            reload_ticks: Fixed64::from_num(200),
            min_distribute: 10,
            alignment_tolerance: Fixed64::from_num(2),
        }
    }
}

/// Tunables for a phase-linked conveyor bypass block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeSpec {
    /// Maximum link distance along a row or column, in tiles.
    pub range: u32,
    /// Ticks between single-unit transfers at full efficiency.
    pub transport_time: Fixed64,
    /// Warmup change per tick of delta.
    pub warmup_step: Fixed64,
}

impl Default for BridgeSpec {
    fn default() -> Self {
        Self {
            range: 12,
            transport_time: Fixed64::ONE,
            warmup_step: Fixed64::ONE / 30,
        }
    }
}

/// Behaviour attached to a block definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BlockKind {
    MassDriver(DriverSpec),
    ItemBridge(BridgeSpec),
    /// Plain storage that accepts any item while it has room.
    Container,
}

/// A block definition: footprint, storage and behaviour.
#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    /// Edge length of the square footprint, in tiles.
    pub size: u32,
    pub item_capacity: u32,
    pub kind: BlockKind,
}

impl BlockDef {
    pub fn driver_spec(&self) -> Option<&DriverSpec> {
        match &self.kind {
            BlockKind::MassDriver(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn bridge_spec(&self) -> Option<&BridgeSpec> {
        match &self.kind {
            BlockKind::ItemBridge(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register an item type. Returns its ID.
    pub fn register_item(&mut self, name: &str) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemTypeDef {
            name: name.to_string(),
        });
        if self.item_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 1: Register a block definition. Returns its ID.
    pub fn register_block(
        &mut self,
        name: &str,
        size: u32,
        item_capacity: u32,
        kind: BlockKind,
    ) -> BlockTypeId {
        let id = BlockTypeId(self.blocks.len() as u32);
        self.blocks.push(BlockDef {
            name: name.to_string(),
            size,
            item_capacity,
            kind,
        });
        if self.block_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 2: Mutate an existing block definition by name.
    pub fn mutate_block<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut BlockDef),
    {
        let id = self
            .block_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.blocks[id.0 as usize]);
        Ok(())
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateName(name));
        }

        for block in &self.blocks {
            if block.size == 0 {
                return Err(RegistryError::InvalidBlock {
                    name: block.name.clone(),
                    reason: "size must be at least 1".into(),
                });
            }
            if let BlockKind::MassDriver(spec) = &block.kind {
                if spec.min_distribute > block.item_capacity {
                    return Err(RegistryError::InvalidBlock {
                        name: block.name.clone(),
                        reason: format!(
                            "min_distribute {} exceeds item capacity {}",
                            spec.min_distribute, block.item_capacity
                        ),
                    });
                }
                if spec.reload_ticks <= Fixed64::ZERO {
                    return Err(RegistryError::InvalidBlock {
                        name: block.name.clone(),
                        reason: "reload_ticks must be positive".into(),
                    });
                }
            }
            if let BlockKind::ItemBridge(spec) = &block.kind {
                if spec.transport_time <= Fixed64::ZERO {
                    return Err(RegistryError::InvalidBlock {
                        name: block.name.clone(),
                        reason: "transport_time must be positive".into(),
                    });
                }
            }
        }

        Ok(Registry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            blocks: self.blocks,
            block_name_to_id: self.block_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after build(). Shared read-only between
/// the world and its tests.
#[derive(Debug)]
pub struct Registry {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
}

impl Registry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemTypeDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_block(&self, id: BlockTypeId) -> Option<&BlockDef> {
        self.blocks.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    /// All registered item types in registration order.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemTypeId> + '_ {
        (0..self.items.len() as u32).map(ItemTypeId)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid block '{name}': {reason}")]
    InvalidBlock { name: String, reason: String },
}

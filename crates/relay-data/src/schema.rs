//! Serde data file structs for transport content.
//!
//! These define the on-disk format for items, blocks, and world settings.
//! They are deserialized from RON, JSON, or TOML and then resolved into
//! registry and world types by the loader. Continuous tunables are written as
//! plain decimals and converted to fixed-point on load.

use relay_core::fixed::f64_to_fixed64;
use relay_core::registry::{BlockKind, BridgeSpec, DriverSpec};
use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
}

// ===========================================================================
// Blocks
// ===========================================================================

/// A block definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockData {
    pub name: String,
    #[serde(default = "default_size")]
    pub size: u32,
    pub item_capacity: u32,
    pub kind: BlockKindData,
}

fn default_size() -> u32 {
    1
}

/// Behaviour of a block. Unit variants are written as plain strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKindData {
    MassDriver(DriverData),
    ItemBridge(BridgeData),
    Container,
}

impl BlockKindData {
    pub fn to_kind(&self) -> BlockKind {
        match self {
            BlockKindData::MassDriver(d) => BlockKind::MassDriver(d.to_spec()),
            BlockKindData::ItemBridge(b) => BlockKind::ItemBridge(b.to_spec()),
            BlockKindData::Container => BlockKind::Container,
        }
    }
}

/// Mass driver tunables. Omitted fields take the standard values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverData {
    pub range: u32,
    pub rotate_speed: f64,
    pub reload_ticks: f64,
    pub min_distribute: u32,
    pub alignment_tolerance: f64,
}

impl Default for DriverData {
    fn default() -> Self {
        Self {
            range: 55,
            rotate_speed: 5.0,
            reload_ticks: 200.0,
            min_distribute: 10,
            alignment_tolerance: 2.0,
        }
    }
}

impl DriverData {
    pub fn to_spec(&self) -> DriverSpec {
        DriverSpec {
            range: self.range,
            rotate_speed: f64_to_fixed64(self.rotate_speed),
            reload_ticks: f64_to_fixed64(self.reload_ticks),
            min_distribute: self.min_distribute,
            alignment_tolerance: f64_to_fixed64(self.alignment_tolerance),
        }
    }
}

/// Item bridge tunables. Omitted fields take the standard values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeData {
    pub range: u32,
    pub transport_time: f64,
    pub warmup_step: f64,
}

impl Default for BridgeData {
    fn default() -> Self {
        Self {
            range: 12,
            transport_time: 1.0,
            warmup_step: 1.0 / 30.0,
        }
    }
}

impl BridgeData {
    pub fn to_spec(&self) -> BridgeSpec {
        BridgeSpec {
            range: self.range,
            transport_time: f64_to_fixed64(self.transport_time),
            warmup_step: f64_to_fixed64(self.warmup_step),
        }
    }
}

// ===========================================================================
// World
// ===========================================================================

/// World settings and an optional starting layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldData {
    pub width: u32,
    pub height: u32,
    /// Ticks consumed per step.
    pub delta: f64,
    pub event_capacity: usize,
    pub structures: Vec<PlacementData>,
}

impl Default for WorldData {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            delta: 1.0,
            event_capacity: 1024,
            structures: Vec::new(),
        }
    }
}

/// One structure in a starting layout.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementData {
    pub block: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_team")]
    pub team: u8,
    /// Any tile of the link target.
    #[serde(default)]
    pub link: Option<(i32, i32)>,
    #[serde(default)]
    pub items: Vec<(String, u32)>,
}

fn default_team() -> u8 {
    1
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML has no top-level arrays, so list files nest them under a key.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlBlocks {
    pub blocks: Vec<BlockData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::fixed::Fixed64;

    #[test]
    fn driver_defaults_match_standard_content() {
        assert_eq!(DriverData::default().to_spec(), DriverSpec::default());
    }

    #[test]
    fn bridge_defaults_round_to_standard_step() {
        let spec = BridgeData::default().to_spec();
        assert_eq!(spec.range, 12);
        assert_eq!(spec.transport_time, Fixed64::ONE);
        let diff = (spec.warmup_step - BridgeSpec::default().warmup_step).abs();
        assert!(diff <= Fixed64::DELTA);
    }

    #[test]
    fn partial_driver_json_fills_defaults() {
        let d: DriverData = serde_json::from_str(r#"{"range": 30}"#).unwrap();
        assert_eq!(d.range, 30);
        assert_eq!(d.min_distribute, 10);
    }

    #[test]
    fn unit_kind_parses_from_string() {
        let b: BlockData = serde_json::from_str(
            r#"{"name": "vault", "size": 3, "item_capacity": 1000, "kind": "container"}"#,
        )
        .unwrap();
        assert!(matches!(b.kind, BlockKindData::Container));
    }

    #[test]
    fn world_defaults_are_standard() {
        let w = WorldData::default();
        assert_eq!((w.width, w.height), (256, 256));
        assert!(w.structures.is_empty());
    }
}

//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::fixed::Fixed64;
use crate::id::*;
use crate::registry::*;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Item constructors (registration order of `standard_registry`)
// ===========================================================================

pub fn copper() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn lead() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn graphite() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn silicon() -> ItemTypeId {
    ItemTypeId(3)
}
pub fn titanium() -> ItemTypeId {
    ItemTypeId(4)
}

// ===========================================================================
// Block constructors (registration order of `standard_registry`)
// ===========================================================================

pub fn mass_driver() -> BlockTypeId {
    BlockTypeId(0)
}
pub fn phase_conveyor() -> BlockTypeId {
    BlockTypeId(1)
}
pub fn bridge_conveyor() -> BlockTypeId {
    BlockTypeId(2)
}
pub fn container() -> BlockTypeId {
    BlockTypeId(3)
}

pub fn sharded() -> TeamId {
    TeamId(1)
}
pub fn crux() -> TeamId {
    TeamId(2)
}

/// Standard content: five items, a mass driver, two bridge variants, and a
/// plain container.
pub fn standard_registry() -> Registry {
    let mut b = RegistryBuilder::new();
    for name in ["copper", "lead", "graphite", "silicon", "titanium"] {
        b.register_item(name);
    }
    b.register_block(
        "mass-driver",
        3,
        120,
        BlockKind::MassDriver(DriverSpec::default()),
    );
    b.register_block(
        "phase-conveyor",
        1,
        10,
        BlockKind::ItemBridge(BridgeSpec::default()),
    );
    b.register_block(
        "bridge-conveyor",
        1,
        10,
        BlockKind::ItemBridge(BridgeSpec {
            range: 4,
            ..BridgeSpec::default()
        }),
    );
    b.register_block("container", 2, 300, BlockKind::Container);
    b.build().expect("standard registry is valid")
}

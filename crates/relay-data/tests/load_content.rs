//! End-to-end content loading from temporary directories.

use relay_core::fixed::Fixed64;
use relay_core::registry::{BlockKind, DriverSpec};
use relay_data::{DataLoadError, load_content};
use relay_distribution::driver::DriverState;
use std::fs;
use std::path::{Path, PathBuf};

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "relay_data_it_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

const ITEMS_RON: &str = r#"[(name: "copper"), (name: "lead")]"#;

const BLOCKS_RON: &str = r#"[
    (name: "mass-driver", size: 3, item_capacity: 120, kind: mass_driver((range: 55))),
    (name: "phase-conveyor", item_capacity: 10, kind: item_bridge((range: 12))),
    (name: "vault", size: 2, item_capacity: 300, kind: container),
]"#;

#[test]
fn ron_content_builds_registry_with_defaults() {
    let dir = make_test_dir("ron");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("blocks.ron"), BLOCKS_RON).unwrap();

    let content = load_content(&dir).unwrap();
    let reg = &content.registry;
    assert_eq!(reg.item_count(), 2);
    assert_eq!(reg.block_count(), 3);

    let driver = reg.get_block(content.block_id("mass-driver").unwrap()).unwrap();
    assert_eq!(driver.kind, BlockKind::MassDriver(DriverSpec::default()));
    let bridge = reg.get_block(content.block_id("phase-conveyor").unwrap()).unwrap();
    assert_eq!(bridge.size, 1);

    let config = content.world_config();
    assert_eq!(config.width, 256);
    assert_eq!(config.delta, Fixed64::ONE);

    cleanup(&dir);
}

#[test]
fn toml_content_with_world_layout() {
    let dir = make_test_dir("toml");
    fs::write(
        dir.join("items.toml"),
        "[[items]]\nname = \"copper\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("blocks.toml"),
        r#"
[[blocks]]
name = "mass-driver"
size = 3
item_capacity = 120

[blocks.kind.mass_driver]
range = 55
"#,
    )
    .unwrap();
    fs::write(
        dir.join("world.toml"),
        r#"
width = 64
height = 64

[[structures]]
block = "mass-driver"
x = 10
y = 10
link = [31, 11]
items = [["copper", 40]]

[[structures]]
block = "mass-driver"
x = 30
y = 10
"#,
    )
    .unwrap();

    let content = load_content(&dir).unwrap();
    let mut world = content.build_world().unwrap();
    assert_eq!(world.config().width, 64);
    assert_eq!(world.structure_count(), 2);

    let a = world.structure_at(relay_spatial::GridPosition::new(10, 10)).unwrap();
    assert!(world.link_valid(a));
    world.step();
    assert_eq!(world.driver(a).unwrap().state, DriverState::Shooting);

    cleanup(&dir);
}

#[test]
fn json_content_loads() {
    let dir = make_test_dir("json");
    fs::write(dir.join("items.json"), r#"[{"name": "copper"}]"#).unwrap();
    fs::write(
        dir.join("blocks.json"),
        r#"[{"name": "crate", "size": 2, "item_capacity": 50, "kind": "container"}]"#,
    )
    .unwrap();

    let content = load_content(&dir).unwrap();
    assert_eq!(content.registry.block_count(), 1);

    cleanup(&dir);
}

#[test]
fn unknown_block_in_layout_is_unresolved() {
    let dir = make_test_dir("unresolved");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("blocks.ron"), BLOCKS_RON).unwrap();
    fs::write(
        dir.join("world.json"),
        r#"{"structures": [{"block": "catapult", "x": 4, "y": 4}]}"#,
    )
    .unwrap();

    let content = load_content(&dir).unwrap();
    assert!(matches!(
        content.build_world(),
        Err(DataLoadError::UnresolvedRef { expected_kind: "block", .. })
    ));

    cleanup(&dir);
}

#[test]
fn overlapping_layout_is_a_layout_error() {
    let dir = make_test_dir("overlap");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("blocks.ron"), BLOCKS_RON).unwrap();
    fs::write(
        dir.join("world.ron"),
        r#"(structures: [
            (block: "mass-driver", x: 10, y: 10),
            (block: "vault", x: 11, y: 11),
        ])"#,
    )
    .unwrap();

    let content = load_content(&dir).unwrap();
    assert!(matches!(
        content.build_world(),
        Err(DataLoadError::Layout { .. })
    ));

    cleanup(&dir);
}

#[test]
fn duplicate_item_is_rejected() {
    let dir = make_test_dir("dup");
    fs::write(dir.join("items.ron"), r#"[(name: "copper"), (name: "copper")]"#).unwrap();
    fs::write(dir.join("blocks.ron"), BLOCKS_RON).unwrap();

    assert!(matches!(
        load_content(&dir),
        Err(DataLoadError::DuplicateName { .. })
    ));

    cleanup(&dir);
}

#[test]
fn invalid_driver_tunables_fail_registry_validation() {
    let dir = make_test_dir("invalid");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(
        dir.join("blocks.ron"),
        r#"[(name: "tiny", size: 1, item_capacity: 5, kind: mass_driver((min_distribute: 10)))]"#,
    )
    .unwrap();

    assert!(matches!(
        load_content(&dir),
        Err(DataLoadError::Registry(_))
    ));

    cleanup(&dir);
}

#[test]
fn missing_blocks_file_is_reported() {
    let dir = make_test_dir("missing");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();

    assert!(matches!(
        load_content(&dir),
        Err(DataLoadError::MissingRequired { .. })
    ));

    cleanup(&dir);
}

//! Resolution pipeline: reads data files, resolves names, builds the registry.
//!
//! A content directory holds `items` and `blocks` (required) and `world`
//! (optional), each as exactly one of `.ron`, `.toml` or `.json`.

use crate::schema::{BlockData, ItemData, PlacementData, WorldData};
use relay_core::fixed::f64_to_fixed64;
use relay_core::id::{BlockTypeId, ItemTypeId, StructureId, TeamId};
use relay_core::registry::{Registry, RegistryBuilder, RegistryError};
use relay_distribution::world::{World, WorldConfig};
use relay_spatial::GridPosition;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The resolved content failed registry validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The world or its layout could not be built.
    #[error("world layout in {file}: {detail}")]
    Layout { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML files nest the array under `toml_key`; RON and
/// JSON hold it at the top level.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table.remove(toml_key).ok_or_else(|| {
                parse_error(path, format!("missing key '{toml_key}' in TOML file"))
            })?;
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `name` is already in `map`.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Content pipeline
// ===========================================================================

/// Everything loaded from a content directory.
#[derive(Debug)]
pub struct Content {
    pub registry: Arc<Registry>,
    pub world: WorldData,
    /// Where the world settings came from, for error reporting.
    world_file: Option<PathBuf>,
    item_ids: HashMap<String, ItemTypeId>,
    block_ids: HashMap<String, BlockTypeId>,
}

/// Load items, blocks, and world settings from `dir`.
pub fn load_content(dir: &Path) -> Result<Content, DataLoadError> {
    let items_file = require_data_file(dir, "items")?;
    let blocks_file = require_data_file(dir, "blocks")?;
    let world_file = find_data_file(dir, "world")?;

    let items: Vec<ItemData> = deserialize_list(&items_file, "items")?;
    let blocks: Vec<BlockData> = deserialize_list(&blocks_file, "blocks")?;
    let world: WorldData = match &world_file {
        Some(path) => deserialize_file(path)?,
        None => WorldData::default(),
    };

    let mut builder = RegistryBuilder::new();
    let mut item_ids = HashMap::new();
    for item in &items {
        check_duplicate(&item_ids, &item.name, &items_file)?;
        item_ids.insert(item.name.clone(), builder.register_item(&item.name));
    }
    let mut block_ids = HashMap::new();
    for block in &blocks {
        check_duplicate(&block_ids, &block.name, &blocks_file)?;
        let id = builder.register_block(
            &block.name,
            block.size,
            block.item_capacity,
            block.kind.to_kind(),
        );
        block_ids.insert(block.name.clone(), id);
    }
    let registry = Arc::new(builder.build()?);

    debug!(
        "loaded {} items and {} blocks from {}",
        registry.item_count(),
        registry.block_count(),
        dir.display()
    );
    Ok(Content {
        registry,
        world,
        world_file,
        item_ids,
        block_ids,
    })
}

impl Content {
    /// World settings from the `world` file, or the defaults.
    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            width: self.world.width,
            height: self.world.height,
            delta: f64_to_fixed64(self.world.delta),
            event_capacity: self.world.event_capacity,
        }
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_ids.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_ids.get(name).copied()
    }

    /// Build a world and place the starting layout. Links are applied after
    /// every structure is placed, so a layout may link forward.
    pub fn build_world(&self) -> Result<World, DataLoadError> {
        let file = self
            .world_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("world"));
        let layout_error = |detail: String| DataLoadError::Layout {
            file: file.clone(),
            detail,
        };

        let mut world = World::new(self.registry.clone(), self.world_config())
            .map_err(|e| layout_error(e.to_string()))?;

        let mut placed: Vec<(StructureId, &PlacementData)> = Vec::new();
        for p in &self.world.structures {
            let block = *resolve_name(&self.block_ids, &p.block, &file, "block")?;
            let id = world
                .place(block, TeamId(p.team), GridPosition::new(p.x, p.y))
                .map_err(|e| layout_error(e.to_string()))?;
            for (name, quantity) in &p.items {
                let item = *resolve_name(&self.item_ids, name, &file, "item")?;
                world
                    .offer_item(id, item, *quantity)
                    .map_err(|e| layout_error(e.to_string()))?;
            }
            placed.push((id, p));
        }

        for (id, p) in placed {
            if let Some((x, y)) = p.link {
                world
                    .configure_link(id, GridPosition::new(x, y))
                    .map_err(|e| layout_error(e.to_string()))?;
            }
        }
        Ok(world)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "relay_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("items.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("items.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("items.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        assert!(matches!(
            detect_format(Path::new("items.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("items")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // File discovery
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        fs::write(dir.join("items.toml"), "").unwrap();

        assert_eq!(
            find_data_file(&dir, "items").unwrap(),
            Some(dir.join("items.toml"))
        );
        assert_eq!(find_data_file(&dir, "blocks").unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("items.ron"), "[]").unwrap();
        fs::write(dir.join("items.json"), "[]").unwrap();

        assert!(matches!(
            find_data_file(&dir, "items"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");

        assert!(matches!(
            require_data_file(&dir, "items"),
            Err(DataLoadError::MissingRequired { .. })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_in_each_format() {
        let dir = make_test_dir("deser_list");
        let ron_path = dir.join("a.ron");
        fs::write(&ron_path, r#"[(name: "copper"), (name: "lead")]"#).unwrap();
        let json_path = dir.join("b.json");
        fs::write(&json_path, r#"[{"name": "copper"}, {"name": "lead"}]"#).unwrap();
        let toml_path = dir.join("c.toml");
        fs::write(
            &toml_path,
            "[[items]]\nname = \"copper\"\n\n[[items]]\nname = \"lead\"\n",
        )
        .unwrap();

        for path in [&ron_path, &json_path, &toml_path] {
            let items: Vec<ItemData> = deserialize_list(path, "items").unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].name, "lead");
        }

        cleanup(&dir);
    }

    #[test]
    fn toml_list_without_key_is_a_parse_error() {
        let dir = make_test_dir("toml_no_key");
        let path = dir.join("items.toml");
        fs::write(&path, "[[things]]\nname = \"copper\"\n").unwrap();

        let result: Result<Vec<ItemData>, _> = deserialize_list(&path, "items");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error() {
        let dir = make_test_dir("deser_parse_err");
        let path = dir.join("bad.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<Vec<ItemData>, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Name resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_and_duplicate_helpers() {
        let mut map = HashMap::new();
        map.insert("copper".to_string(), 0u32);
        let file = Path::new("items.ron");

        assert_eq!(*resolve_name(&map, "copper", file, "item").unwrap(), 0);
        assert!(matches!(
            resolve_name(&map, "tin", file, "item"),
            Err(DataLoadError::UnresolvedRef { expected_kind: "item", .. })
        ));
        assert!(check_duplicate(&map, "lead", file).is_ok());
        assert!(matches!(
            check_duplicate(&map, "copper", file),
            Err(DataLoadError::DuplicateName { .. })
        ));
    }
}

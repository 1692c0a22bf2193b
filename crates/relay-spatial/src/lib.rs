//! Tile grid for transport structures: positions, position codes, directions,
//! square footprints, and a bounded index mapping tiles to structures.
//!
//! Structures are addressed by their center tile. A multi-tile structure
//! covers every tile of its footprint, and any of those tiles resolves back to
//! the same [`StructureId`]. Links between structures are stored as packed
//! position codes (see [`GridPosition::code`]) so that a destroyed target is a
//! lookup miss rather than a dangling reference.

use relay_core::id::StructureId;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Position codes
// ---------------------------------------------------------------------------

/// Sentinel position code meaning "no link".
pub const NO_LINK: i32 = -1;

/// Largest width or height a [`TileIndex`] accepts. Coordinates must fit in
/// the 16-bit halves of a position code.
pub const MAX_DIMENSION: u32 = i16::MAX as u32;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A tile on the 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Pack into a linear position code: x in the high 16 bits, y in the low
    /// 16 bits.
    pub fn code(&self) -> i32 {
        (self.x << 16) | (self.y & 0xFFFF)
    }

    /// Inverse of [`Self::code`]. Both halves are sign-extended.
    pub fn from_code(code: i32) -> Self {
        Self {
            x: (code >> 16) as i16 as i32,
            y: (code & 0xFFFF) as i16 as i32,
        }
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared Euclidean distance, exact in integers.
    pub fn distance_squared(&self, other: &GridPosition) -> u64 {
        let dx = (self.x - other.x).unsigned_abs() as u64;
        let dy = (self.y - other.y).unsigned_abs() as u64;
        dx * dx + dy * dy
    }

    /// True iff `other` lies within a circle of `range` tiles.
    pub fn within_radius(&self, other: &GridPosition, range: u32) -> bool {
        let r = range as u64;
        self.distance_squared(other) <= r * r
    }

    /// True iff both positions share a row or a column.
    pub fn shares_axis(&self, other: &GridPosition) -> bool {
        self.x == other.x || self.y == other.y
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn step(&self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        self.offset(dx, dy)
    }
}

/// Square footprint of a structure, addressed by its center tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub size: u32,
}

impl Footprint {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn single() -> Self {
        Self { size: 1 }
    }

    /// Offset from the center tile to the lowest covered tile on each axis.
    /// Even sizes extend one tile further toward the positive axes.
    pub fn origin_offset(&self) -> i32 {
        -((self.size as i32 - 1) / 2)
    }

    /// All tiles covered when centered on `center`, row by row.
    pub fn tiles(&self, center: GridPosition) -> impl Iterator<Item = GridPosition> {
        let size = self.size as i32;
        let ox = center.x + self.origin_offset();
        let oy = center.y + self.origin_offset();
        (0..size).flat_map(move |dy| (0..size).map(move |dx| GridPosition::new(ox + dx, oy + dy)))
    }
}

/// Cardinal directions. `North` points toward decreasing `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Direction of `to` as seen from `from`, along the dominant axis.
    /// Ties go to the vertical axis. `None` when the positions coincide.
    pub fn toward(from: GridPosition, to: GridPosition) -> Option<Direction> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() > dy.abs() {
            Some(if dx > 0 { Direction::East } else { Direction::West })
        } else {
            Some(if dy > 0 { Direction::South } else { Direction::North })
        }
    }
}

/// Errors from spatial operations.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    #[error("tile ({}, {}) is occupied", .0.x, .0.y)]
    Occupied(GridPosition),
    #[error("tile ({}, {}) is outside the grid", .0.x, .0.y)]
    OutOfBounds(GridPosition),
    #[error("grid {width}x{height} exceeds the maximum dimension {MAX_DIMENSION}")]
    GridTooLarge { width: u32, height: u32 },
    #[error("structure is not placed on the grid")]
    NotPlaced,
    #[error("structure is already placed on the grid")]
    AlreadyPlaced,
}

// ---------------------------------------------------------------------------
// TileIndex
// ---------------------------------------------------------------------------

/// A bounded grid mapping tiles to structures.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: tile -> structure covering it
/// - `centers`: structure -> center tile
/// - `footprints`: structure -> footprint
#[derive(Debug)]
pub struct TileIndex {
    width: u32,
    height: u32,
    tiles: BTreeMap<GridPosition, StructureId>,
    centers: SecondaryMap<StructureId, GridPosition>,
    footprints: SecondaryMap<StructureId, Footprint>,
}

impl TileIndex {
    /// An empty grid covering `0..width` by `0..height`.
    pub fn new(width: u32, height: u32) -> Result<Self, SpatialError> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(SpatialError::GridTooLarge { width, height });
        }
        Ok(Self {
            width,
            height,
            tiles: BTreeMap::new(),
            centers: SecondaryMap::new(),
            footprints: SecondaryMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    // -- Placement --

    /// Place a structure centered on `center`.
    pub fn place(
        &mut self,
        id: StructureId,
        center: GridPosition,
        footprint: Footprint,
    ) -> Result<(), SpatialError> {
        if self.centers.contains_key(id) {
            return Err(SpatialError::AlreadyPlaced);
        }

        for tile in footprint.tiles(center) {
            if !self.in_bounds(tile) {
                return Err(SpatialError::OutOfBounds(tile));
            }
            if self.tiles.contains_key(&tile) {
                return Err(SpatialError::Occupied(tile));
            }
        }

        for tile in footprint.tiles(center) {
            self.tiles.insert(tile, id);
        }
        self.centers.insert(id, center);
        self.footprints.insert(id, footprint);

        Ok(())
    }

    /// Remove a structure from the grid. Returns its center tile.
    pub fn remove(&mut self, id: StructureId) -> Result<GridPosition, SpatialError> {
        let center = self.centers.remove(id).ok_or(SpatialError::NotPlaced)?;
        let footprint = self.footprints.remove(id).ok_or(SpatialError::NotPlaced)?;

        for tile in footprint.tiles(center) {
            self.tiles.remove(&tile);
        }

        Ok(center)
    }

    /// Check if a structure could be placed at `center` without overlap.
    pub fn can_place(&self, center: GridPosition, footprint: Footprint) -> bool {
        footprint
            .tiles(center)
            .all(|tile| self.in_bounds(tile) && !self.tiles.contains_key(&tile))
    }

    // -- Point queries --

    /// The structure covering a tile.
    pub fn structure_at(&self, pos: GridPosition) -> Option<StructureId> {
        self.tiles.get(&pos).copied()
    }

    /// The structure covering the tile a position code decodes to. The
    /// [`NO_LINK`] sentinel never resolves.
    pub fn structure_at_code(&self, code: i32) -> Option<StructureId> {
        if code == NO_LINK {
            return None;
        }
        self.structure_at(GridPosition::from_code(code))
    }

    pub fn center_of(&self, id: StructureId) -> Option<GridPosition> {
        self.centers.get(id).copied()
    }

    pub fn footprint_of(&self, id: StructureId) -> Option<Footprint> {
        self.footprints.get(id).copied()
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    /// Every placed structure with its center, ordered by row then column.
    pub fn centers_row_major(&self) -> Vec<(GridPosition, StructureId)> {
        let mut out: Vec<_> = self.centers.iter().map(|(id, &pos)| (pos, id)).collect();
        out.sort_by_key(|(pos, _)| (pos.y, pos.x));
        out
    }

    // -- Adjacency --

    /// Edge-adjacent structures with the direction of the touching edge.
    /// A neighbor touching several edges appears once per direction.
    pub fn neighbors_4(&self, id: StructureId) -> Vec<(Direction, StructureId)> {
        let (Some(&center), Some(&footprint)) = (self.centers.get(id), self.footprints.get(id))
        else {
            return Vec::new();
        };

        let own_tiles: BTreeSet<GridPosition> = footprint.tiles(center).collect();
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();

        for dir in Direction::all() {
            for tile in &own_tiles {
                let neighbor_pos = tile.step(dir);
                if own_tiles.contains(&neighbor_pos) {
                    continue;
                }
                if let Some(&neighbor) = self.tiles.get(&neighbor_pos) {
                    if seen.insert((dir as u8, neighbor.data().as_ffi())) {
                        result.push((dir, neighbor));
                    }
                }
            }
        }
        result
    }

    /// Unique adjacent structures, each with the first touching edge found.
    pub fn proximity(&self, id: StructureId) -> Vec<(Direction, StructureId)> {
        let mut seen = BTreeSet::new();
        self.neighbors_4(id)
            .into_iter()
            .filter(|(_, n)| seen.insert(n.data().as_ffi()))
            .collect()
    }

    // -- Stats --

    /// Number of structures placed on the grid.
    pub fn structure_count(&self) -> usize {
        self.centers.len()
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

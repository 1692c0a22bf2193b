//! Link validation.
//!
//! A link is a directed `(source, target)` pair of structures. Whether it is
//! legal depends only on the two endpoints as they are right now, so validity
//! is recomputed every time it is consumed and never cached.

use relay_core::id::{BlockTypeId, StructureId, TeamId};
use relay_core::registry::BlockKind;
use relay_spatial::GridPosition;

/// Geometry a mechanism allows its links to span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// Any direction, up to a Euclidean distance.
    Radial,
    /// Same row or column only, up to a distance along that axis.
    Axial,
}

/// Per-mechanism link rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRule {
    pub reach: Reach,
    /// Maximum distance in tiles, measured between centers.
    pub range: u32,
    /// Reject a link whose target already links back at the source.
    pub check_double: bool,
}

impl LinkRule {
    /// Rules for a block kind; `None` for blocks that cannot link.
    pub fn for_kind(kind: &BlockKind) -> Option<Self> {
        match kind {
            BlockKind::MassDriver(spec) => Some(Self {
                reach: Reach::Radial,
                range: spec.range,
                check_double: false,
            }),
            BlockKind::ItemBridge(spec) => Some(Self {
                reach: Reach::Axial,
                range: spec.range,
                check_double: true,
            }),
            BlockKind::Container => None,
        }
    }

    /// Pure geometry test between two centers.
    pub fn positions_valid(&self, from: GridPosition, to: GridPosition) -> bool {
        match self.reach {
            Reach::Radial => from.within_radius(&to, self.range),
            Reach::Axial => axial_positions_valid(from.x, from.y, to.x, to.y, self.range),
        }
    }
}

/// True iff the points share a row or column and lie at most `range` apart.
pub fn axial_positions_valid(x1: i32, y1: i32, x2: i32, y2: i32, range: u32) -> bool {
    if x1 == x2 {
        (y1 - y2).unsigned_abs() <= range
    } else if y1 == y2 {
        (x1 - x2).unsigned_abs() <= range
    } else {
        false
    }
}

/// A structure as the validator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub id: StructureId,
    pub block: BlockTypeId,
    pub team: TeamId,
    pub center: GridPosition,
    /// Whatever this endpoint's own link code currently resolves to, valid or
    /// not.
    pub links_to: Option<StructureId>,
}

/// Decide whether `source -> target` is a legal link. An absent target is
/// never valid, and a structure cannot link to itself.
pub fn link_valid(rule: &LinkRule, source: &Endpoint, target: Option<&Endpoint>) -> bool {
    let Some(target) = target else {
        return false;
    };
    source.id != target.id
        && rule.positions_valid(source.center, target.center)
        && source.block == target.block
        && source.team.allied(target.team)
        && (!rule.check_double || target.links_to != Some(source.id))
}

//! A placed structure: shared fields plus the mechanism-specific state.

use crate::bridge::Bridge;
use crate::driver::Driver;
use relay_core::fixed::Fixed64;
use relay_core::id::{BlockTypeId, TeamId};
use relay_core::item::ItemBuffer;
use relay_core::registry::{BlockDef, BlockKind};
use relay_spatial::GridPosition;

#[derive(Debug, Clone, PartialEq)]
pub enum Mechanism {
    Driver(Driver),
    Bridge(Bridge),
    Container,
}

impl Mechanism {
    /// Fresh idle, unlinked state for a block kind.
    pub fn for_kind(kind: &BlockKind) -> Self {
        match kind {
            BlockKind::MassDriver(_) => Mechanism::Driver(Driver::new()),
            BlockKind::ItemBridge(_) => Mechanism::Bridge(Bridge::new()),
            BlockKind::Container => Mechanism::Container,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub block: BlockTypeId,
    pub team: TeamId,
    /// Center tile. Fixed for the structure's lifetime.
    pub center: GridPosition,
    pub items: ItemBuffer,
    /// Externally supplied operating level in `[0, 1]`.
    pub efficiency: Fixed64,
    pub enabled: bool,
    pub mechanism: Mechanism,
    pub(crate) dump_counter: Fixed64,
    pub(crate) dump_index: usize,
}

impl Structure {
    pub fn new(block: BlockTypeId, def: &BlockDef, team: TeamId, center: GridPosition) -> Self {
        Self {
            block,
            team,
            center,
            items: ItemBuffer::new(def.item_capacity),
            efficiency: Fixed64::ONE,
            enabled: true,
            mechanism: Mechanism::for_kind(&def.kind),
            dump_counter: Fixed64::ZERO,
            dump_index: 0,
        }
    }

    /// Efficiency actually applied this tick; zero while disabled.
    pub fn effective_efficiency(&self) -> Fixed64 {
        if self.enabled {
            self.efficiency
        } else {
            Fixed64::ZERO
        }
    }

    /// Raw link code, for mechanisms that link.
    pub fn link(&self) -> Option<i32> {
        match &self.mechanism {
            Mechanism::Driver(d) => Some(d.link),
            Mechanism::Bridge(b) => Some(b.link),
            Mechanism::Container => None,
        }
    }

    /// Overwrite the link code. Returns false for mechanisms without links.
    pub fn set_link(&mut self, code: i32) -> bool {
        match &mut self.mechanism {
            Mechanism::Driver(d) => d.link = code,
            Mechanism::Bridge(b) => b.link = code,
            Mechanism::Container => return false,
        }
        true
    }

    pub fn driver(&self) -> Option<&Driver> {
        match &self.mechanism {
            Mechanism::Driver(d) => Some(d),
            _ => None,
        }
    }

    pub fn driver_mut(&mut self) -> Option<&mut Driver> {
        match &mut self.mechanism {
            Mechanism::Driver(d) => Some(d),
            _ => None,
        }
    }

    pub fn bridge(&self) -> Option<&Bridge> {
        match &self.mechanism {
            Mechanism::Bridge(b) => Some(b),
            _ => None,
        }
    }

    pub fn bridge_mut(&mut self) -> Option<&mut Bridge> {
        match &mut self.mechanism {
            Mechanism::Bridge(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::test_utils::*;
    use relay_spatial::NO_LINK;

    #[test]
    fn new_structure_is_idle_and_unlinked() {
        let reg = standard_registry();
        let def = reg.get_block(mass_driver()).unwrap();
        let s = Structure::new(mass_driver(), def, sharded(), GridPosition::new(5, 5));
        assert_eq!(s.link(), Some(NO_LINK));
        assert_eq!(s.items.capacity(), 120);
        assert_eq!(s.driver().unwrap().state, crate::driver::DriverState::Idle);
        assert_eq!(s.effective_efficiency(), Fixed64::ONE);
    }

    #[test]
    fn containers_cannot_link() {
        let reg = standard_registry();
        let def = reg.get_block(container()).unwrap();
        let mut s = Structure::new(container(), def, sharded(), GridPosition::new(5, 5));
        assert_eq!(s.link(), None);
        assert!(!s.set_link(0));
    }

    #[test]
    fn disabled_means_zero_efficiency() {
        let reg = standard_registry();
        let def = reg.get_block(phase_conveyor()).unwrap();
        let mut s = Structure::new(phase_conveyor(), def, sharded(), GridPosition::new(1, 1));
        s.enabled = false;
        assert_eq!(s.effective_efficiency(), Fixed64::ZERO);
    }
}

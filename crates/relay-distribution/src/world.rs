//! The world: tile grid, structure arena, clock, and the per-tick update.
//!
//! Every step advances the clock once and evaluates each structure exactly
//! once, by center tile in row-major order. A structure mutates its own
//! fields freely; the only writes it makes to a peer are queueing into the
//! peer's waiting list, registering into the peer's incoming set, and
//! depositing items into the peer's inventory.

use crate::driver::{self, DriverContext, DriverState, Transition};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::link::{Endpoint, LinkRule, link_valid};
use crate::structure::{Mechanism, Structure};
use relay_core::fixed::{Fixed64, clamp_unit};
use relay_core::id::*;
use relay_core::registry::{BridgeSpec, DriverSpec, Registry};
use relay_core::sim::{DeltaSource, FixedDelta, SimClock, StateHash};
use relay_spatial::{Direction, Footprint, GridPosition, NO_LINK, SpatialError, TileIndex};
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reload values at or below this count as fully reloaded.
const RELOAD_SLACK: Fixed64 = Fixed64::from_bits(1 << 19);

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// World dimensions and stepping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    /// Delta applied per step, in ticks.
    pub delta: Fixed64,
    /// Ring buffer capacity per event kind.
    pub event_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            delta: Fixed64::ONE,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    #[error("unknown block {0:?}")]
    UnknownBlock(BlockTypeId),
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("structure {0:?} not found")]
    NotFound(StructureId),
    #[error("structure {0:?} has no link")]
    NotLinkable(StructureId),
    #[error("unknown item type {0:?}")]
    UnknownItem(ItemTypeId),
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct World {
    registry: Arc<Registry>,
    config: WorldConfig,
    tiles: TileIndex,
    structures: SlotMap<StructureId, Structure>,
    clock: SimClock,
    events: EventBus,
}

impl World {
    pub fn new(registry: Arc<Registry>, config: WorldConfig) -> Result<Self, WorldError> {
        Ok(Self {
            registry,
            config,
            tiles: TileIndex::new(config.width, config.height)?,
            structures: SlotMap::with_key(),
            clock: SimClock::new(Box::new(FixedDelta(config.delta))),
            events: EventBus::new(config.event_capacity),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn tiles(&self) -> &TileIndex {
        &self.tiles
    }

    pub fn tick(&self) -> u64 {
        self.clock.tick
    }

    pub(crate) fn set_tick(&mut self, tick: u64) {
        self.clock.tick = tick;
    }

    /// Replace the per-step delta source.
    pub fn set_delta_source(&mut self, source: Box<dyn DeltaSource>) {
        self.clock.set_source(source);
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a structure centered on `center`. It starts idle and unlinked.
    pub fn place(
        &mut self,
        block: BlockTypeId,
        team: TeamId,
        center: GridPosition,
    ) -> Result<StructureId, PlaceError> {
        let def = self
            .registry
            .get_block(block)
            .ok_or(PlaceError::UnknownBlock(block))?;
        let id = self
            .structures
            .insert(Structure::new(block, def, team, center));
        if let Err(e) = self.tiles.place(id, center, Footprint::new(def.size)) {
            self.structures.remove(id);
            return Err(e.into());
        }

        debug!("placed {} at ({}, {})", def.name, center.x, center.y);
        self.events.emit(Event::StructurePlaced {
            structure: id,
            block,
            position: center,
            tick: self.clock.tick,
        });
        Ok(id)
    }

    /// Remove a structure and purge it from every waiting queue and incoming
    /// set that still names it.
    pub fn remove(&mut self, id: StructureId) -> Result<Structure, WorldError> {
        let center = self.tiles.remove(id).map_err(|_| WorldError::NotFound(id))?;
        let structure = self
            .structures
            .remove(id)
            .ok_or(WorldError::NotFound(id))?;
        let code = center.code();

        let mut dequeued = Vec::new();
        for (other_id, other) in self.structures.iter_mut() {
            match &mut other.mechanism {
                Mechanism::Driver(d) => {
                    if d.dequeue(code) {
                        dequeued.push(other_id);
                    }
                }
                Mechanism::Bridge(b) => {
                    b.remove_incoming(code);
                }
                Mechanism::Container => {}
            }
        }
        for other_id in dequeued {
            self.settle_accepting(other_id);
        }

        debug!("removed structure at ({}, {})", center.x, center.y);
        self.events.emit(Event::StructureRemoved {
            structure: id,
            position: center,
            tick: self.clock.tick,
        });
        Ok(structure)
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Point `source` at the structure covering `target`, normalized to that
    /// structure's center. Configuring the current target again unlinks.
    pub fn configure_link(
        &mut self,
        source: StructureId,
        target: GridPosition,
    ) -> Result<(), WorldError> {
        let code = self
            .tiles
            .structure_at(target)
            .and_then(|t| self.tiles.center_of(t))
            .unwrap_or(target)
            .code();
        let current = self
            .structures
            .get(source)
            .ok_or(WorldError::NotFound(source))?
            .link()
            .ok_or(WorldError::NotLinkable(source))?;
        let next = if current == code { NO_LINK } else { code };
        self.set_link_code(source, next)
    }

    /// Overwrite the raw link code. Takes effect on the next evaluation.
    pub fn set_link_code(&mut self, source: StructureId, code: i32) -> Result<(), WorldError> {
        let s = self
            .structures
            .get_mut(source)
            .ok_or(WorldError::NotFound(source))?;
        if !s.set_link(code) {
            return Err(WorldError::NotLinkable(source));
        }
        Ok(())
    }

    pub fn clear_link(&mut self, source: StructureId) -> Result<(), WorldError> {
        self.set_link_code(source, NO_LINK)
    }

    /// Set the operating level, clamped to `[0, 1]`.
    pub fn set_efficiency(&mut self, id: StructureId, efficiency: Fixed64) -> Result<(), WorldError> {
        let s = self.structures.get_mut(id).ok_or(WorldError::NotFound(id))?;
        s.efficiency = clamp_unit(efficiency);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: StructureId, enabled: bool) -> Result<(), WorldError> {
        let s = self.structures.get_mut(id).ok_or(WorldError::NotFound(id))?;
        s.enabled = enabled;
        Ok(())
    }

    /// Insert items from outside the transport network. Returns the amount
    /// that did not fit.
    pub fn offer_item(
        &mut self,
        id: StructureId,
        item: ItemTypeId,
        quantity: u32,
    ) -> Result<u32, WorldError> {
        if self.registry.get_item(item).is_none() {
            return Err(WorldError::UnknownItem(item));
        }
        if !self.structures.contains_key(id) {
            return Err(WorldError::NotFound(id));
        }
        Ok(self.deposit(id, item, quantity))
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    pub(crate) fn reset_events(&mut self) {
        self.events = EventBus::new(self.config.event_capacity);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    /// Direct access for staging scenarios. Changes bypass the per-tick
    /// bookkeeping until the next evaluation.
    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(id)
    }

    pub fn structure_at(&self, pos: GridPosition) -> Option<StructureId> {
        self.tiles.structure_at(pos)
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter()
    }

    pub fn driver(&self, id: StructureId) -> Option<&driver::Driver> {
        self.structures.get(id)?.driver()
    }

    pub fn bridge(&self, id: StructureId) -> Option<&crate::bridge::Bridge> {
        self.structures.get(id)?.bridge()
    }

    fn driver_spec(&self, id: StructureId) -> Option<DriverSpec> {
        let s = self.structures.get(id)?;
        self.registry.get_block(s.block)?.driver_spec().copied()
    }

    fn bridge_spec(&self, id: StructureId) -> Option<BridgeSpec> {
        let s = self.structures.get(id)?;
        self.registry.get_block(s.block)?.bridge_spec().copied()
    }

    /// The structure as the link validator sees it.
    pub fn endpoint(&self, id: StructureId) -> Option<Endpoint> {
        let s = self.structures.get(id)?;
        Some(Endpoint {
            id,
            block: s.block,
            team: s.team,
            center: s.center,
            links_to: s.link().and_then(|code| self.tiles.structure_at_code(code)),
        })
    }

    /// Where `id`'s link currently leads, if the link is valid right now.
    pub fn link_target(&self, id: StructureId) -> Option<StructureId> {
        let s = self.structures.get(id)?;
        let rule = LinkRule::for_kind(&self.registry.get_block(s.block)?.kind)?;
        let target = self.tiles.structure_at_code(s.link()?)?;
        let source = self.endpoint(id)?;
        link_valid(&rule, &source, self.endpoint(target).as_ref()).then_some(target)
    }

    pub fn link_valid(&self, id: StructureId) -> bool {
        self.link_target(id).is_some()
    }

    /// Whether `target` would take one unit of `item` offered by `source`.
    ///
    /// Bridges only take items from a bridge whose link currently resolves to
    /// them. Drivers take items while their own outbound link is valid.
    /// Containers take anything while they have room.
    pub fn accept_item(&self, target: StructureId, source: StructureId, item: ItemTypeId) -> bool {
        let (Some(t), Some(s)) = (self.structures.get(target), self.structures.get(source)) else {
            return false;
        };
        if self.registry.get_item(item).is_none() || !t.items.has_space() || !s.team.allied(t.team)
        {
            return false;
        }
        match &t.mechanism {
            Mechanism::Bridge(_) => {
                s.bridge().is_some() && self.link_target(source) == Some(target)
            }
            Mechanism::Driver(_) => self.link_valid(target),
            Mechanism::Container => true,
        }
    }

    /// Whether `source` may hand `neighbor` items through ordinary dumping.
    ///
    /// A linked bridge refuses exactly one direction: the one its link
    /// points in. Everything else may always dump.
    pub fn can_dump(&self, source: StructureId, neighbor: StructureId, _item: ItemTypeId) -> bool {
        let Some(s) = self.structures.get(source) else {
            return false;
        };
        if s.bridge().is_none() {
            return true;
        }
        let Some(link_center) = self
            .link_target(source)
            .and_then(|t| self.tiles.center_of(t))
        else {
            return true;
        };
        let link_dir = Direction::toward(s.center, link_center);
        let neighbor_dir = self
            .tiles
            .neighbors_4(source)
            .into_iter()
            .find(|&(_, n)| n == neighbor)
            .map(|(dir, _)| dir)
            .or_else(|| {
                let c = self.tiles.center_of(neighbor)?;
                Direction::toward(s.center, c)
            });
        neighbor_dir != link_dir
    }

    /// Active for upstream accounting: enabled with a valid outbound link.
    pub fn should_consume(&self, id: StructureId) -> bool {
        self.structures.get(id).is_some_and(|s| s.enabled) && self.link_valid(id)
    }

    /// Deterministic hash over every structure's owned state.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.clock.tick);
        for (center, id) in self.tiles.centers_row_major() {
            let Some(s) = self.structures.get(id) else {
                continue;
            };
            h.write_i32(center.code());
            h.write_u32(s.block.0);
            h.write(&[s.team.0, s.enabled as u8]);
            h.write_fixed64(s.efficiency);
            for stack in s.items.stacks() {
                h.write_u32(stack.item_type.0);
                h.write_u32(stack.quantity);
            }
            match &s.mechanism {
                Mechanism::Driver(d) => {
                    h.write_i32(d.link);
                    h.write(&[d.state.to_u8()]);
                    h.write_fixed64(d.rotation);
                    h.write_fixed64(d.reload);
                    for &peer in d.waiting_peers() {
                        h.write_i32(peer);
                    }
                }
                Mechanism::Bridge(b) => {
                    h.write_i32(b.link);
                    h.write_fixed64(b.warmup);
                    h.write(&[b.moved as u8]);
                    for &source in b.incoming() {
                        h.write_i32(source);
                    }
                }
                Mechanism::Container => {}
            }
        }
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance one step and deliver the events it produced.
    pub fn step(&mut self) {
        let delta = self.clock.advance();
        for (_, id) in self.tiles.centers_row_major() {
            let Some(s) = self.structures.get(id) else {
                continue;
            };
            match s.mechanism {
                Mechanism::Driver(_) => self.update_driver(id, delta),
                Mechanism::Bridge(_) => self.update_bridge(id, delta),
                Mechanism::Container => {}
            }
        }
        self.events.deliver();
    }

    pub fn step_n(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    // -----------------------------------------------------------------------
    // Mass driver
    // -----------------------------------------------------------------------

    fn update_driver(&mut self, id: StructureId, delta: Fixed64) {
        let Some(spec) = self.driver_spec(id) else {
            return;
        };
        let Some(s) = self.structures.get_mut(id) else {
            return;
        };
        let efficiency = s.effective_efficiency();
        let center = s.center;
        let my_code = center.code();
        let items_total = s.items.total();
        let free = s.items.free();
        let Some(d) = s.driver_mut() else {
            return;
        };

        if d.reload > Fixed64::ZERO {
            d.reload = clamp_unit(d.reload - delta * efficiency / spec.reload_ticks);
        }
        let reloaded = d.reload <= RELOAD_SLACK;
        let state = d.state;
        let rotation = d.rotation;
        let front = d.front_peer();

        // Judge the front peer before pruning it.
        let front_peer = front.and_then(|code| self.reachable_shooter(code, id));
        if let Some(code) = front
            && front_peer.is_none()
        {
            if let Some(d) = self.structures.get_mut(id).and_then(Structure::driver_mut) {
                d.dequeue(code);
            }
            let pos = GridPosition::from_code(code);
            trace!("driver at ({}, {}) pruned peer ({}, {})", center.x, center.y, pos.x, pos.y);
        }
        let has_waiting = self
            .driver(id)
            .is_some_and(|d| !d.waiting_peers().is_empty());

        let target = self.link_target(id);
        if let Some(t) = target {
            self.normalize_link(id, t);
        }

        let step = spec.rotate_speed * delta * efficiency;
        let mut aim = None;
        let mut next_rotation = rotation;
        if let Some(t) = target
            && let Some(target_center) = self.tiles.center_of(t)
        {
            let b = driver::bearing(center, target_center);
            aim = Some(b);
            if efficiency > Fixed64::ZERO && reloaded {
                next_rotation = driver::rotate_toward(rotation, b, step);
            }
        }

        // Queue at the target before the rendezvous check. A shooter about to
        // yield stays out of the queue.
        if state == DriverState::Shooting
            && efficiency > Fixed64::ZERO
            && !(has_waiting && free >= spec.min_distribute)
            && let Some(t) = target
        {
            let target_free = self.structures.get(t).map_or(0, |ts| ts.items.free());
            if items_total >= spec.min_distribute
                && target_free >= spec.min_distribute
                && let Some(td) = self.structures.get_mut(t).and_then(Structure::driver_mut)
            {
                td.enqueue(my_code);
            }
        }

        let ready_to_fire = match (target, aim) {
            (Some(t), Some(b)) if efficiency > Fixed64::ZERO && reloaded => {
                items_total >= spec.min_distribute
                    && self.target_ready(t, my_code, b, spec)
                    && driver::aligned(next_rotation, b, spec.alignment_tolerance)
            }
            _ => false,
        };

        let ctx = DriverContext {
            has_waiting,
            has_space: free >= spec.min_distribute,
            front_reachable: front_peer.is_some(),
            has_link: target.is_some(),
            ready_to_fire,
        };

        match driver::decide(state, &ctx) {
            Transition::Enter(next) => self.set_driver_state(id, next),
            Transition::Stay => match state {
                DriverState::Idle => {}
                DriverState::Accepting => {
                    if efficiency > Fixed64::ZERO
                        && let Some(peer_center) = front_peer.and_then(|p| self.tiles.center_of(p))
                    {
                        let b = driver::bearing(center, peer_center);
                        if let Some(d) = self.structures.get_mut(id).and_then(Structure::driver_mut) {
                            d.rotation = driver::rotate_toward(d.rotation, b, step);
                        }
                    }
                }
                DriverState::Shooting => {
                    if efficiency > Fixed64::ZERO
                        && target.is_some()
                        && let Some(d) = self.structures.get_mut(id).and_then(Structure::driver_mut)
                    {
                        d.rotation = next_rotation;
                    }
                }
            },
            Transition::Fire => {
                if let Some(d) = self.structures.get_mut(id).and_then(Structure::driver_mut) {
                    d.rotation = next_rotation;
                }
                if let Some(t) = target {
                    self.fire(id, t);
                }
            }
        }

        let after = self.driver(id).map(|d| d.state);
        if matches!(after, Some(DriverState::Idle | DriverState::Accepting)) {
            self.dump(id, delta);
        }
    }

    /// A queued peer is reachable while it is a powered driver whose own link
    /// validly resolves to `this`.
    fn reachable_shooter(&self, code: i32, this: StructureId) -> Option<StructureId> {
        let peer = self.tiles.structure_at_code(code)?;
        let s = self.structures.get(peer)?;
        (s.driver().is_some()
            && s.effective_efficiency() > Fixed64::ZERO
            && self.link_target(peer) == Some(this))
        .then_some(peer)
    }

    /// The receiving half of the rendezvous: accepting, this shooter first in
    /// line, room for a payload, and facing back along the bearing.
    fn target_ready(&self, target: StructureId, shooter_code: i32, aim: Fixed64, spec: DriverSpec) -> bool {
        let Some(t) = self.structures.get(target) else {
            return false;
        };
        let Some(td) = t.driver() else {
            return false;
        };
        td.state == DriverState::Accepting
            && td.front_peer() == Some(shooter_code)
            && t.items.free() >= spec.min_distribute
            && driver::aligned(
                td.rotation,
                driver::reverse_bearing(aim),
                spec.alignment_tolerance,
            )
    }

    /// Launch everything the target can hold, oldest resource first.
    fn fire(&mut self, source: StructureId, target: StructureId) {
        let target_free = self.structures.get(target).map_or(0, |t| t.items.free());
        let Some(s) = self.structures.get_mut(source) else {
            return;
        };
        let source_code = s.center.code();
        let amount = s.items.total().min(target_free);
        let payload = s.items.drain_up_to(amount);
        if let Some(d) = s.driver_mut() {
            d.reload = Fixed64::ONE;
        }
        self.set_driver_state(source, DriverState::Idle);

        if let Some(t) = self.structures.get_mut(target) {
            for stack in &payload {
                let overflow = t.items.add(stack.item_type, stack.quantity);
                debug_assert_eq!(overflow, 0, "payload sized to target free space");
            }
            if let Some(td) = t.driver_mut() {
                td.dequeue(source_code);
            }
        }
        self.settle_accepting(target);

        debug!("driver fired {} items", amount);
        self.events.emit(Event::PayloadFired {
            source,
            target,
            quantity: amount,
            tick: self.clock.tick,
        });
    }

    fn set_driver_state(&mut self, id: StructureId, next: DriverState) {
        let Some(d) = self.structures.get_mut(id).and_then(Structure::driver_mut) else {
            return;
        };
        let previous = d.state;
        if previous == next {
            return;
        }
        d.state = next;
        debug!("driver state {:?} -> {:?}", previous, next);
        self.events.emit(Event::DriverStateChanged {
            structure: id,
            from: previous,
            to: next,
            tick: self.clock.tick,
        });
    }

    /// Drop an accepting driver back to idle once its queue empties or it no
    /// longer has room for a payload.
    fn settle_accepting(&mut self, id: StructureId) {
        let Some(min) = self.driver_spec(id).map(|spec| spec.min_distribute) else {
            return;
        };
        let Some(s) = self.structures.get(id) else {
            return;
        };
        let Some(d) = s.driver() else {
            return;
        };
        if d.state == DriverState::Accepting
            && (d.waiting_peers().is_empty() || s.items.free() < min)
        {
            self.set_driver_state(id, DriverState::Idle);
        }
    }

    // -----------------------------------------------------------------------
    // Item bridge
    // -----------------------------------------------------------------------

    fn update_bridge(&mut self, id: StructureId, delta: Fixed64) {
        let Some(spec) = self.bridge_spec(id) else {
            return;
        };
        let Some(s) = self.structures.get(id) else {
            return;
        };
        let center = s.center;
        let efficiency = s.effective_efficiency();
        let Some(b) = s.bridge() else {
            return;
        };

        let stale: Vec<i32> = b
            .incoming()
            .iter()
            .copied()
            .filter(|&code| {
                !self
                    .tiles
                    .structure_at_code(code)
                    .is_some_and(|src| self.link_target(src) == Some(id))
            })
            .collect();
        if !stale.is_empty() {
            if let Some(b) = self.structures.get_mut(id).and_then(Structure::bridge_mut) {
                b.retain_incoming(|code| !stale.contains(&code));
            }
            for code in stale {
                let source = GridPosition::from_code(code);
                trace!("bridge at ({}, {}) pruned incoming ({}, {})", center.x, center.y, source.x, source.y);
                self.events.emit(Event::IncomingPruned {
                    bridge: id,
                    source,
                    tick: self.clock.tick,
                });
            }
        }

        let target = self.link_target(id);
        if let Some(t) = target {
            self.normalize_link(id, t);
        }

        let due = {
            let Some(b) = self.structures.get_mut(id).and_then(Structure::bridge_mut) else {
                return;
            };
            b.moved = false;
            b.update_warmup(target.is_some(), spec.warmup_step * delta);
            match target {
                Some(_) => b.accumulate_transport(delta * efficiency, spec.transport_time),
                None => 0,
            }
        };

        let Some(t) = target else {
            self.dump(id, delta);
            return;
        };

        if let Some(tb) = self.structures.get_mut(t).and_then(Structure::bridge_mut) {
            tb.register_incoming(center.code());
        }

        for _ in 0..due {
            let Some(item) = self.structures.get_mut(id).and_then(|s| s.items.take()) else {
                break;
            };
            if !self.accept_item(t, id, item) {
                if let Some(s) = self.structures.get_mut(id) {
                    s.items.untake(item);
                }
                break;
            }
            self.deposit(t, item, 1);
            if let Some(b) = self.structures.get_mut(id).and_then(Structure::bridge_mut) {
                b.moved = true;
            }
            trace!("bridge at ({}, {}) moved one item", center.x, center.y);
            self.events.emit(Event::ItemBridged {
                source: id,
                target: t,
                item_type: item,
                tick: self.clock.tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Rewrite a link that reached its target through a non-center tile.
    fn normalize_link(&mut self, id: StructureId, target: StructureId) {
        let Some(center_code) = self.tiles.center_of(target).map(|c| c.code()) else {
            return;
        };
        if let Some(s) = self.structures.get_mut(id)
            && s.link() != Some(center_code)
        {
            s.set_link(center_code);
        }
    }

    /// Add items to a structure's inventory. Returns the overflow.
    fn deposit(&mut self, id: StructureId, item: ItemTypeId, quantity: u32) -> u32 {
        let Some(s) = self.structures.get_mut(id) else {
            return quantity;
        };
        let overflow = s.items.add(item, quantity);
        self.settle_accepting(id);
        overflow
    }

    /// Hand one unit per whole tick of accumulated delta to neighbors, in
    /// rotating order.
    fn dump(&mut self, id: StructureId, delta: Fixed64) {
        let attempts = {
            let Some(s) = self.structures.get_mut(id) else {
                return;
            };
            s.dump_counter += delta;
            let whole = s.dump_counter.int();
            s.dump_counter -= whole;
            whole.saturating_to_num::<u32>()
        };
        for _ in 0..attempts {
            if !self.dump_once(id) {
                break;
            }
        }
    }

    fn dump_once(&mut self, id: StructureId) -> bool {
        let proximity = self.tiles.proximity(id);
        let Some(s) = self.structures.get(id) else {
            return false;
        };
        if proximity.is_empty() || s.items.is_empty() {
            return false;
        }
        let candidates: Vec<ItemTypeId> = s.items.stacks().iter().map(|st| st.item_type).collect();
        let n = proximity.len();
        let start = s.dump_index % n;

        for i in 0..n {
            let (_, other) = proximity[(start + i) % n];
            let Some(&item) = candidates
                .iter()
                .find(|&&item| self.can_dump(id, other, item) && self.accept_item(other, id, item))
            else {
                continue;
            };
            if let Some(s) = self.structures.get_mut(id) {
                let removed = s.items.remove(item, 1);
                debug_assert_eq!(removed, 1);
                s.dump_index = (start + i + 1) % n;
            }
            self.deposit(other, item, 1);
            return true;
        }
        false
    }
}

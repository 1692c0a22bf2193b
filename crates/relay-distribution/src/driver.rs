//! Mass driver state and its transition table.
//!
//! A driver is `Idle`, `Accepting` a payload from the peer at the front of its
//! waiting queue, or `Shooting` at its linked target. Each tick the world
//! gathers a [`DriverContext`] and [`decide`] walks the rules for the current
//! state top to bottom; the first guard that holds picks the transition.
//!
//! Angles are in degrees, normalized to `[0, 360)`.

use relay_core::fixed::Fixed64;
use relay_core::serialize::{DeserializeError, StateReader, StateWriter};
use relay_spatial::{GridPosition, NO_LINK};
use serde::{Deserialize, Serialize};

/// Latest state block revision written by [`Driver::write_state`].
pub const DRIVER_REVISION: u8 = 1;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverState {
    #[default]
    Idle,
    Accepting,
    Shooting,
}

impl DriverState {
    pub fn to_u8(self) -> u8 {
        match self {
            DriverState::Idle => 0,
            DriverState::Accepting => 1,
            DriverState::Shooting => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DriverState::Idle),
            1 => Some(DriverState::Accepting),
            2 => Some(DriverState::Shooting),
            _ => None,
        }
    }
}

/// Per-instance mass driver state.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    /// Position code of the target tile, or [`NO_LINK`].
    pub link: i32,
    pub state: DriverState,
    pub rotation: Fixed64,
    /// Drains from 1 to 0 after each shot; firing requires 0.
    pub reload: Fixed64,
    /// Peers that asked to fire into this driver, oldest first.
    waiting: Vec<i32>,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            link: NO_LINK,
            state: DriverState::Idle,
            rotation: Fixed64::ZERO,
            reload: Fixed64::ZERO,
            waiting: Vec::new(),
        }
    }
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting_peers(&self) -> &[i32] {
        &self.waiting
    }

    pub fn front_peer(&self) -> Option<i32> {
        self.waiting.first().copied()
    }

    /// Queue a peer. Returns false if it was already queued.
    pub fn enqueue(&mut self, peer: i32) -> bool {
        if self.waiting.contains(&peer) {
            return false;
        }
        self.waiting.push(peer);
        true
    }

    /// Drop a peer from the queue. Returns true if it was present.
    pub fn dequeue(&mut self, peer: i32) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|&p| p != peer);
        self.waiting.len() != before
    }

    pub fn has_link(&self) -> bool {
        self.link != NO_LINK
    }

    // -- Serialization --

    /// Write the latest revision: link, rotation, state, reload, waiting peers.
    pub fn write_state(&self, w: &mut StateWriter) {
        w.write_i32(self.link);
        w.write_fixed64(self.rotation);
        w.write_u8(self.state.to_u8());
        w.write_fixed64(self.reload);
        w.write_i32_list(&self.waiting);
    }

    /// Read a block written at `revision`. Revision 0 carries only link,
    /// rotation and state; unknown later revisions are read as the latest
    /// known layout with any trailing bytes ignored.
    pub fn read_state(r: &mut StateReader<'_>, revision: u8) -> Result<Self, DeserializeError> {
        let link = r.read_i32()?;
        let rotation = r.read_fixed64()?;
        let raw_state = r.read_u8()?;
        let state = DriverState::from_u8(raw_state).ok_or(DeserializeError::InvalidValue {
            field: "driver state",
            value: raw_state as i64,
        })?;

        let mut driver = Driver {
            link,
            state,
            rotation,
            ..Driver::default()
        };
        if revision >= 1 {
            driver.reload = r.read_fixed64()?;
            for peer in r.read_i32_list()? {
                driver.enqueue(peer);
            }
        }
        if revision > DRIVER_REVISION {
            r.skip_rest();
        }
        Ok(driver)
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Facts about one driver gathered at the start of its evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverContext {
    /// The waiting queue is non-empty (after this tick's pruning).
    pub has_waiting: bool,
    /// Free capacity is at least `min_distribute`.
    pub has_space: bool,
    /// The front waiting peer, as it stood before pruning, still links here.
    pub front_reachable: bool,
    /// The outbound link resolves validly.
    pub has_link: bool,
    /// Every rendezvous condition for a shot holds this tick.
    pub ready_to_fire: bool,
}

impl DriverContext {
    pub fn can_accept(&self) -> bool {
        self.has_waiting && self.has_space
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep the current state and do its per-tick work.
    Stay,
    Enter(DriverState),
    /// Launch the payload, then go idle.
    Fire,
}

struct Rule {
    guard: fn(&DriverContext) -> bool,
    transition: Transition,
}

fn can_accept(c: &DriverContext) -> bool {
    c.can_accept()
}

fn has_link(c: &DriverContext) -> bool {
    c.has_link
}

fn link_lost(c: &DriverContext) -> bool {
    !c.has_link
}

fn front_lost(c: &DriverContext) -> bool {
    !c.front_reachable
}

fn out_of_space(c: &DriverContext) -> bool {
    !c.has_space
}

fn ready_to_fire(c: &DriverContext) -> bool {
    c.ready_to_fire
}

const IDLE_RULES: &[Rule] = &[
    Rule {
        guard: can_accept,
        transition: Transition::Enter(DriverState::Accepting),
    },
    Rule {
        guard: has_link,
        transition: Transition::Enter(DriverState::Shooting),
    },
];

const ACCEPTING_RULES: &[Rule] = &[
    Rule {
        guard: front_lost,
        transition: Transition::Enter(DriverState::Idle),
    },
    Rule {
        guard: out_of_space,
        transition: Transition::Enter(DriverState::Idle),
    },
];

// Preemption by a waiting peer goes through idle, never straight to accepting.
const SHOOTING_RULES: &[Rule] = &[
    Rule {
        guard: link_lost,
        transition: Transition::Enter(DriverState::Idle),
    },
    Rule {
        guard: can_accept,
        transition: Transition::Enter(DriverState::Idle),
    },
    Rule {
        guard: ready_to_fire,
        transition: Transition::Fire,
    },
];

fn rules_for(state: DriverState) -> &'static [Rule] {
    match state {
        DriverState::Idle => IDLE_RULES,
        DriverState::Accepting => ACCEPTING_RULES,
        DriverState::Shooting => SHOOTING_RULES,
    }
}

/// First matching rule for `state`, or [`Transition::Stay`].
pub fn decide(state: DriverState, ctx: &DriverContext) -> Transition {
    rules_for(state)
        .iter()
        .find(|rule| (rule.guard)(ctx))
        .map_or(Transition::Stay, |rule| rule.transition)
}

// ---------------------------------------------------------------------------
// Angles
// ---------------------------------------------------------------------------

const FULL_TURN: Fixed64 = Fixed64::from_bits(360 << 32);
const HALF_TURN: Fixed64 = Fixed64::from_bits(180 << 32);

pub fn normalize_angle(a: Fixed64) -> Fixed64 {
    let r = a % FULL_TURN;
    if r < Fixed64::ZERO { r + FULL_TURN } else { r }
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
pub fn angle_distance(a: Fixed64, b: Fixed64) -> Fixed64 {
    let d = normalize_angle(a - b);
    d.min(FULL_TURN - d)
}

/// Turn `from` toward `to` by at most `step`, along the shorter arc.
pub fn rotate_toward(from: Fixed64, to: Fixed64, step: Fixed64) -> Fixed64 {
    if angle_distance(from, to) <= step {
        return normalize_angle(to);
    }
    if normalize_angle(to - from) < HALF_TURN {
        normalize_angle(from + step)
    } else {
        normalize_angle(from - step)
    }
}

pub fn aligned(a: Fixed64, b: Fixed64, tolerance: Fixed64) -> bool {
    angle_distance(a, b) <= tolerance
}

/// Bearing from one center to another.
///
/// `atan2` has no fixed-point counterpart here, so the angle is computed once
/// in `f64` from integer tile offsets and converted.
pub fn bearing(from: GridPosition, to: GridPosition) -> Fixed64 {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    normalize_angle(Fixed64::from_num(dy.atan2(dx).to_degrees()))
}

/// The bearing seen from the other end.
pub fn reverse_bearing(b: Fixed64) -> Fixed64 {
    normalize_angle(b + HALF_TURN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::test_utils::fixed;

    fn ctx() -> DriverContext {
        DriverContext::default()
    }

    // -----------------------------------------------------------------------
    // Transition table
    // -----------------------------------------------------------------------

    #[test]
    fn idle_prefers_accepting_over_shooting() {
        let c = DriverContext {
            has_waiting: true,
            has_space: true,
            has_link: true,
            ..ctx()
        };
        assert_eq!(
            decide(DriverState::Idle, &c),
            Transition::Enter(DriverState::Accepting)
        );
    }

    #[test]
    fn idle_with_waiting_peer_but_no_space_stays() {
        let c = DriverContext {
            has_waiting: true,
            has_space: false,
            ..ctx()
        };
        assert_eq!(decide(DriverState::Idle, &c), Transition::Stay);
    }

    #[test]
    fn idle_with_link_shoots_regardless_of_items() {
        let c = DriverContext {
            has_link: true,
            has_space: true,
            ..ctx()
        };
        assert_eq!(
            decide(DriverState::Idle, &c),
            Transition::Enter(DriverState::Shooting)
        );
    }

    #[test]
    fn accepting_drops_on_lost_front_or_space() {
        let ok = DriverContext {
            has_waiting: true,
            has_space: true,
            front_reachable: true,
            ..ctx()
        };
        assert_eq!(decide(DriverState::Accepting, &ok), Transition::Stay);

        let lost = DriverContext {
            front_reachable: false,
            ..ok
        };
        assert_eq!(
            decide(DriverState::Accepting, &lost),
            Transition::Enter(DriverState::Idle)
        );

        let full = DriverContext {
            has_space: false,
            ..ok
        };
        assert_eq!(
            decide(DriverState::Accepting, &full),
            Transition::Enter(DriverState::Idle)
        );
    }

    #[test]
    fn shooting_preempted_by_waiting_peer_goes_idle() {
        let c = DriverContext {
            has_link: true,
            has_waiting: true,
            has_space: true,
            ready_to_fire: true,
            ..ctx()
        };
        assert_eq!(
            decide(DriverState::Shooting, &c),
            Transition::Enter(DriverState::Idle)
        );
    }

    #[test]
    fn shooting_fires_when_ready() {
        let c = DriverContext {
            has_link: true,
            ready_to_fire: true,
            ..ctx()
        };
        assert_eq!(decide(DriverState::Shooting, &c), Transition::Fire);

        let waiting = DriverContext {
            ready_to_fire: false,
            ..c
        };
        assert_eq!(decide(DriverState::Shooting, &waiting), Transition::Stay);
    }

    #[test]
    fn shooting_without_link_goes_idle() {
        let c = DriverContext {
            ready_to_fire: true,
            ..ctx()
        };
        assert_eq!(
            decide(DriverState::Shooting, &c),
            Transition::Enter(DriverState::Idle)
        );
    }

    // -----------------------------------------------------------------------
    // Waiting queue
    // -----------------------------------------------------------------------

    #[test]
    fn enqueue_is_duplicate_free() {
        let mut d = Driver::new();
        assert!(d.enqueue(5));
        assert!(!d.enqueue(5));
        assert!(d.enqueue(7));
        assert_eq!(d.waiting_peers(), &[5, 7]);
        assert!(d.dequeue(5));
        assert!(!d.dequeue(5));
        assert_eq!(d.front_peer(), Some(7));
    }

    // -----------------------------------------------------------------------
    // Angles
    // -----------------------------------------------------------------------

    #[test]
    fn bearings_on_axes() {
        let o = GridPosition::new(10, 10);
        assert_eq!(bearing(o, GridPosition::new(20, 10)), fixed(0.0));
        assert_eq!(bearing(o, GridPosition::new(0, 10)), fixed(180.0));
        assert_eq!(bearing(o, GridPosition::new(10, 20)), fixed(90.0));
        assert_eq!(bearing(o, GridPosition::new(10, 0)), fixed(270.0));
    }

    #[test]
    fn reverse_bearing_is_opposite() {
        let a = GridPosition::new(3, 4);
        let b = GridPosition::new(20, 31);
        let there = bearing(a, b);
        let back = bearing(b, a);
        assert!(aligned(reverse_bearing(there), back, fixed(0.001)));
    }

    #[test]
    fn rotate_takes_shorter_arc() {
        assert_eq!(rotate_toward(fixed(350.0), fixed(10.0), fixed(5.0)), fixed(355.0));
        assert_eq!(rotate_toward(fixed(10.0), fixed(350.0), fixed(5.0)), fixed(5.0));
        assert_eq!(rotate_toward(fixed(0.0), fixed(3.0), fixed(5.0)), fixed(3.0));
    }

    #[test]
    fn angle_distance_wraps() {
        assert_eq!(angle_distance(fixed(359.0), fixed(1.0)), fixed(2.0));
        assert_eq!(angle_distance(fixed(90.0), fixed(270.0)), fixed(180.0));
        assert!(aligned(fixed(181.0), fixed(179.5), fixed(2.0)));
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    fn staged() -> Driver {
        let mut d = Driver::new();
        d.link = GridPosition::new(12, 30).code();
        d.state = DriverState::Shooting;
        d.rotation = fixed(42.5);
        d.reload = fixed(0.25);
        d.enqueue(GridPosition::new(1, 1).code());
        d.enqueue(GridPosition::new(2, 9).code());
        d
    }

    #[test]
    fn latest_revision_restores_everything() {
        let d = staged();
        let mut w = StateWriter::new();
        d.write_state(&mut w);
        let bytes = w.into_bytes();

        let mut r = StateReader::new(&bytes);
        let back = Driver::read_state(&mut r, DRIVER_REVISION).unwrap();
        assert_eq!(back, d);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn revision_zero_defaults_later_fields() {
        let mut w = StateWriter::new();
        w.write_i32(GridPosition::new(4, 4).code());
        w.write_fixed64(fixed(90.0));
        w.write_u8(DriverState::Accepting.to_u8());
        let bytes = w.into_bytes();

        let back = Driver::read_state(&mut StateReader::new(&bytes), 0).unwrap();
        assert_eq!(back.link, GridPosition::new(4, 4).code());
        assert_eq!(back.state, DriverState::Accepting);
        assert_eq!(back.reload, Fixed64::ZERO);
        assert!(back.waiting_peers().is_empty());
    }

    #[test]
    fn future_revision_ignores_trailing_fields() {
        let d = staged();
        let mut w = StateWriter::new();
        d.write_state(&mut w);
        w.write_i32(0x7777);
        let bytes = w.into_bytes();

        let mut r = StateReader::new(&bytes);
        let back = Driver::read_state(&mut r, DRIVER_REVISION + 1).unwrap();
        assert_eq!(back, d);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_block_fails() {
        let mut w = StateWriter::new();
        staged().write_state(&mut w);
        let mut bytes = w.into_bytes();
        bytes.truncate(10);
        assert!(matches!(
            Driver::read_state(&mut StateReader::new(&bytes), DRIVER_REVISION),
            Err(DeserializeError::TooShort { .. })
        ));
    }

    #[test]
    fn unknown_state_byte_fails() {
        let mut w = StateWriter::new();
        w.write_i32(NO_LINK);
        w.write_fixed64(Fixed64::ZERO);
        w.write_u8(9);
        let bytes = w.into_bytes();
        assert!(matches!(
            Driver::read_state(&mut StateReader::new(&bytes), 0),
            Err(DeserializeError::InvalidValue { value: 9, .. })
        ));
    }
}

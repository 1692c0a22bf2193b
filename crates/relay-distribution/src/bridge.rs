//! Item bridge state: link, warmup ramp, incoming registry, transport timer.

use relay_core::fixed::{Fixed64, approach};
use relay_core::serialize::{DeserializeError, StateReader, StateWriter};
use relay_spatial::NO_LINK;

/// Latest state block revision written by [`Bridge::write_state`].
pub const BRIDGE_REVISION: u8 = 1;

/// Per-instance item bridge state.
#[derive(Debug, Clone, PartialEq)]
pub struct Bridge {
    /// Position code of the partner tile, or [`NO_LINK`].
    pub link: i32,
    /// In `[0, 1]`. Rises while the link is valid, decays otherwise.
    pub warmup: Fixed64,
    /// True iff the most recent update moved at least one unit.
    pub moved: bool,
    /// Sources currently linking into this bridge, in arrival order.
    incoming: Vec<i32>,
    transport_counter: Fixed64,
}

impl Default for Bridge {
    fn default() -> Self {
        Self {
            link: NO_LINK,
            warmup: Fixed64::ZERO,
            moved: false,
            incoming: Vec::new(),
            transport_counter: Fixed64::ZERO,
        }
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incoming(&self) -> &[i32] {
        &self.incoming
    }

    /// Record a source. Returns false if it was already present.
    pub fn register_incoming(&mut self, source: i32) -> bool {
        if self.incoming.contains(&source) {
            return false;
        }
        self.incoming.push(source);
        true
    }

    pub fn remove_incoming(&mut self, source: i32) -> bool {
        let before = self.incoming.len();
        self.incoming.retain(|&s| s != source);
        self.incoming.len() != before
    }

    /// Keep only the sources `keep` approves. Returns the dropped ones.
    pub fn retain_incoming(&mut self, mut keep: impl FnMut(i32) -> bool) -> Vec<i32> {
        let mut dropped = Vec::new();
        self.incoming.retain(|&s| {
            let k = keep(s);
            if !k {
                dropped.push(s);
            }
            k
        });
        dropped
    }

    /// Ramp warmup toward 1 while linked and toward 0 otherwise.
    pub fn update_warmup(&mut self, linked: bool, step: Fixed64) {
        let target = if linked { Fixed64::ONE } else { Fixed64::ZERO };
        self.warmup = approach(self.warmup, target, step);
    }

    /// Add `amount` to the transport timer and return how many whole
    /// intervals of `interval` are due.
    pub fn accumulate_transport(&mut self, amount: Fixed64, interval: Fixed64) -> u32 {
        self.transport_counter += amount;
        let mut due = 0;
        while self.transport_counter >= interval {
            self.transport_counter -= interval;
            due += 1;
        }
        due
    }

    // -- Serialization --

    /// Write the latest revision: link, warmup, incoming, moved.
    pub fn write_state(&self, w: &mut StateWriter) {
        w.write_i32(self.link);
        w.write_fixed64(self.warmup);
        w.write_i32_list(&self.incoming);
        w.write_bool(self.moved);
    }

    /// Read a block written at `revision`. Revision 0 has no `moved` flag.
    pub fn read_state(r: &mut StateReader<'_>, revision: u8) -> Result<Self, DeserializeError> {
        let mut bridge = Bridge {
            link: r.read_i32()?,
            warmup: r.read_fixed64()?,
            ..Bridge::default()
        };
        for source in r.read_i32_list()? {
            bridge.register_incoming(source);
        }
        if revision >= 1 {
            bridge.moved = r.read_bool()?;
        }
        if revision > BRIDGE_REVISION {
            r.skip_rest();
        }
        Ok(bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::test_utils::fixed;
    use relay_spatial::GridPosition;

    #[test]
    fn register_incoming_is_idempotent() {
        let mut b = Bridge::new();
        assert!(b.register_incoming(3));
        assert!(!b.register_incoming(3));
        assert_eq!(b.incoming(), &[3]);
    }

    #[test]
    fn retain_reports_dropped_sources() {
        let mut b = Bridge::new();
        b.register_incoming(1);
        b.register_incoming(2);
        b.register_incoming(3);
        let dropped = b.retain_incoming(|s| s != 2);
        assert_eq!(dropped, vec![2]);
        assert_eq!(b.incoming(), &[1, 3]);
    }

    #[test]
    fn warmup_ramps_and_decays_within_bounds() {
        let mut b = Bridge::new();
        let step = fixed(0.4);
        b.update_warmup(true, step);
        b.update_warmup(true, step);
        b.update_warmup(true, step);
        assert_eq!(b.warmup, Fixed64::ONE);
        b.update_warmup(false, step);
        assert_eq!(b.warmup, fixed(0.6));
        b.update_warmup(false, step);
        b.update_warmup(false, step);
        assert_eq!(b.warmup, Fixed64::ZERO);
    }

    #[test]
    fn transport_counter_carries_remainder() {
        let mut b = Bridge::new();
        assert_eq!(b.accumulate_transport(fixed(0.5), Fixed64::ONE), 0);
        assert_eq!(b.accumulate_transport(fixed(0.75), Fixed64::ONE), 1);
        assert_eq!(b.accumulate_transport(fixed(2.0), Fixed64::ONE), 2);
    }

    #[test]
    fn round_trip_latest_revision() {
        let mut b = Bridge::new();
        b.link = GridPosition::new(8, 2).code();
        b.warmup = fixed(0.5);
        b.moved = true;
        b.register_incoming(GridPosition::new(8, 0).code());

        let mut w = StateWriter::new();
        b.write_state(&mut w);
        let bytes = w.into_bytes();
        let back = Bridge::read_state(&mut StateReader::new(&bytes), BRIDGE_REVISION).unwrap();

        assert_eq!(back.link, b.link);
        assert_eq!(back.warmup, b.warmup);
        assert!(back.moved);
        assert_eq!(back.incoming(), b.incoming());
    }

    #[test]
    fn revision_zero_has_no_moved_flag() {
        let mut w = StateWriter::new();
        w.write_i32(NO_LINK);
        w.write_fixed64(fixed(0.25));
        w.write_i32_list(&[7]);
        let bytes = w.into_bytes();

        let mut r = StateReader::new(&bytes);
        let back = Bridge::read_state(&mut r, 0).unwrap();
        assert!(!back.moved);
        assert_eq!(back.incoming(), &[7]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_list_fails() {
        let mut w = StateWriter::new();
        w.write_i32(NO_LINK);
        w.write_fixed64(Fixed64::ZERO);
        w.write_u32(2);
        w.write_i32(1);
        let bytes = w.into_bytes();
        assert!(matches!(
            Bridge::read_state(&mut StateReader::new(&bytes), BRIDGE_REVISION),
            Err(DeserializeError::TooShort { .. })
        ));
    }
}

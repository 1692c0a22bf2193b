//! Simulation clock, delta sources, and state hashing.
//!
//! The world advances one fixed step at a time. Each step pulls its delta from
//! a [`DeltaSource`], so tests can drive exact tick counts without any wall
//! clock involved.

use crate::fixed::{Fixed64, Ticks};

// ---------------------------------------------------------------------------
// Delta sources
// ---------------------------------------------------------------------------

/// Supplies the delta-time consumed by one simulation step, in ticks.
pub trait DeltaSource: std::fmt::Debug {
    fn next_delta(&mut self) -> Fixed64;
}

/// A constant delta per step. `FixedDelta::default()` yields one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelta(pub Fixed64);

impl Default for FixedDelta {
    fn default() -> Self {
        Self(Fixed64::ONE)
    }
}

impl DeltaSource for FixedDelta {
    fn next_delta(&mut self) -> Fixed64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Simulation clock
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the world.
#[derive(Debug)]
pub struct SimClock {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: Ticks,
    /// Delta consumed by the most recent step.
    delta: Fixed64,
    source: Box<dyn DeltaSource>,
}

impl SimClock {
    /// Create a clock starting at tick 0 with the given delta source.
    pub fn new(source: Box<dyn DeltaSource>) -> Self {
        Self {
            tick: 0,
            delta: Fixed64::ZERO,
            source,
        }
    }

    /// Advance one step and return the delta to apply during it. Negative
    /// deltas from the source are treated as zero.
    pub fn advance(&mut self) -> Fixed64 {
        self.tick += 1;
        self.delta = self.source.next_delta().max(Fixed64::ZERO);
        self.delta
    }

    /// Delta of the step currently being evaluated.
    pub fn delta(&self) -> Fixed64 {
        self.delta
    }

    /// Replace the delta source, keeping the tick counter.
    pub fn set_source(&mut self, source: Box<dyn DeltaSource>) {
        self.source = source;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(Box::new(FixedDelta::default()))
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

//! Relay Core -- shared foundations for long-distance item transport.
//!
//! This crate holds the pieces every transport mechanism leans on: stable
//! identifiers, deterministic fixed-point arithmetic, bounded item buffers,
//! the immutable content registry, the simulation clock, and the
//! byte-oriented state store used for save/load.
//!
//! # Key Types
//!
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`item::ItemBuffer`] -- per-resource counts bounded by a capacity, with
//!   oldest-first take order.
//! - [`registry::Registry`] -- immutable registry of item types and block
//!   definitions (frozen at startup, injected read-only).
//! - [`sim::SimClock`] -- tick counter fed by an injectable [`sim::DeltaSource`].
//! - [`serialize::StateWriter`] / [`serialize::StateReader`] -- revisioned,
//!   little-endian state blocks.

pub mod fixed;
pub mod id;
pub mod item;
pub mod registry;
pub mod serialize;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

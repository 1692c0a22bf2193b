//! Relay Distribution -- long-distance item transport between structures.
//!
//! Two mechanisms move items across the grid without belts:
//!
//! - **Mass drivers** launch whole payloads at a linked peer. Each driver runs
//!   a three-state machine (idle, accepting, shooting) and a shot only happens
//!   when both ends agree: the receiver is accepting, has this shooter at the
//!   front of its waiting queue, has room, and both are facing each other.
//! - **Item bridges** ferry single units along a row or column to a linked
//!   bridge, keeping a self-healing registry of the bridges feeding them.
//!
//! # Key Types
//!
//! - [`world::World`] -- grid, structures, clock, and the per-tick update.
//! - [`driver::Driver`] / [`driver::decide`] -- driver state and its ordered
//!   transition table.
//! - [`bridge::Bridge`] -- bridge warmup, incoming registry and transport timer.
//! - [`link::link_valid`] -- pure link validation over two endpoints.
//! - [`event::EventBus`] -- typed, per-kind ring buffers with passive listeners.
//! - [`snapshot`] -- whole-world save and load.

pub mod bridge;
pub mod driver;
pub mod event;
pub mod link;
pub mod snapshot;
pub mod structure;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

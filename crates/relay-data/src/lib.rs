//! Relay Data -- content and world configuration loading.
//!
//! Reads item and block definitions plus optional world settings from RON,
//! TOML or JSON files, resolves names, and builds the immutable
//! [`relay_core::registry::Registry`] and a ready-to-step world.

pub mod loader;
pub mod schema;

pub use loader::{Content, DataLoadError, load_content};

//! Configuration fragments and the per-builder store that accumulates them.
//!
//! Fragments describe event wiring and grants recorded on a function builder
//! before the function exists. They are applied in a fixed kind order when
//! the builder is finalized.
//!
//! # Submodules
//!
//! - [`store`] - Append-only, kind-indexed fragment store

pub mod store;
mod types;

pub use store::ConfigStore;
pub use types::*;

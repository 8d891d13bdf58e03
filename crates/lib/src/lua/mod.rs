//! Lua runtime for stack scripts.
//!
//! Stack scripts describe functions through the `stack` global and never
//! call `build()` unless they need a handle; everything they configure is
//! finalized once the script returns.
//!
//! # Submodules
//!
//! - [`globals`] - The `stack` global table
//! - [`runtime`] - Lua VM creation and script loading

pub mod globals;
pub mod runtime;

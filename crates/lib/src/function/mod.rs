//! Function builders and the types describing a function.
//!
//! # Submodules
//!
//! - [`builder`] - [`FunctionBuilder`], the chainable, deferred, idempotent builder
//! - [`lua`] - Lua bindings for builders and function handles

pub mod builder;
pub mod lua;
mod types;

pub use builder::{FunctionBuilder, QUEUE_CONSUME_ACTIONS};
pub use types::*;

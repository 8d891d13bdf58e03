//! fnstack-lib: deferred, idempotent builders for serverless functions.
//!
//! This crate provides:
//! - `FunctionBuilder`: a chainable description of one function, built at most once
//! - `Coordinator` / `FinalizeQueue`: automatic finalization of builders nobody built explicitly
//! - `SingletonRegistry`: per-scope shared routers and attachments
//! - `PlanProvisioner`: records a reproducible `DeploymentPlan`
//! - `eval`: runs Lua stack scripts against all of the above

pub mod config;
pub mod consts;
pub mod eval;
pub mod finalize;
pub mod fragment;
pub mod function;
pub mod lua;
pub mod provision;
pub mod registry;
pub mod scope;
pub mod util;

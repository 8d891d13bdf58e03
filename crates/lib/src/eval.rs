//! Stack script evaluation.
//!
//! Evaluating a stack runs its script as one synchronous turn, then drains the
//! finalize queue: every function the script configured but did not build
//! explicitly is built here. The result is the [`DeploymentPlan`] recorded by
//! a [`PlanProvisioner`].
//!
//! Build errors of deferred finalizes therefore surface from the evaluation
//! call, after the script has returned, not from the script line that
//! configured the failing function.

use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::config::{ConfigError, DeployConfig};
use crate::function::BuildError;
use crate::lua::runtime;
use crate::provision::{DeploymentPlan, PlanProvisioner};
use crate::scope::App;
use crate::util::hash::Hashable;

/// Errors that can occur during stack evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  /// Lua evaluation error, including build errors raised inside the script.
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  /// A deferred finalize failed after the script returned.
  #[error("build error: {0}")]
  Build(#[from] BuildError),

  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),
}

/// Evaluate the stack script at `path`.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use fnstack_lib::config::DeployConfig;
/// use fnstack_lib::eval::evaluate_stack;
///
/// let plan = evaluate_stack(Path::new("stack.lua"), DeployConfig::from_env()?)?;
/// println!("Functions: {}", plan.functions.len());
/// ```
pub fn evaluate_stack(path: &Path, config: DeployConfig) -> Result<DeploymentPlan, EvalError> {
  debug!(path = %path.display(), "evaluating stack");
  evaluate(config, |lua| runtime::load_file(lua, path))
}

/// Evaluate the stack script at `path` with configuration read from the
/// environment.
pub fn evaluate_stack_from_env(path: &Path) -> Result<DeploymentPlan, EvalError> {
  evaluate_stack(path, DeployConfig::from_env()?)
}

/// Evaluate an in-memory stack script.
pub fn evaluate_source(name: &str, source: &str, config: DeployConfig) -> Result<DeploymentPlan, EvalError> {
  debug!(name, "evaluating stack source");
  evaluate(config, |lua| runtime::load_source(lua, name, source))
}

fn evaluate(config: DeployConfig, load: impl FnOnce(&Lua) -> LuaResult<LuaValue>) -> Result<DeploymentPlan, EvalError> {
  let provisioner = Rc::new(PlanProvisioner::new(&config));
  let app = Rc::new(App::new(config, provisioner.clone()));

  // Drop the runtime before reading the plan; builders held by Lua go with it.
  {
    let lua = runtime::create_runtime(app.clone())?;
    let turn = load(&lua).and_then(|returned| runtime::run_setup(&lua, returned));
    if let Err(err) = turn {
      app.discard_pending();
      return Err(err.into());
    }

    let finalized = app.run_pending().inspect_err(|_| {
      app.discard_pending();
    })?;
    debug!(finalized, "end of turn");
  }

  let plan = provisioner.plan();
  let hash = plan.compute_hash().map(|h| h.0).unwrap_or_default();
  info!(
    functions = plan.functions.len(),
    routers = plan.routers.len(),
    hash = %hash,
    "stack evaluated"
  );
  Ok(plan)
}

//! Shared helpers for stack integration tests.

use std::path::PathBuf;

use fnstack_lib::config::DeployConfig;
use fnstack_lib::eval::{EvalError, evaluate_source, evaluate_stack};
use fnstack_lib::provision::{DeploymentPlan, Operation};
use tempfile::TempDir;

/// Config used by every test: app `shop`, stage `test`.
pub fn config() -> DeployConfig {
  DeployConfig::default().with_app("shop").with_stage("test")
}

/// Evaluate `source`, panicking with the error on failure.
pub fn eval(source: &str) -> DeploymentPlan {
  evaluate_source("test", source, config()).unwrap_or_else(|e| panic!("stack failed to evaluate: {}", e))
}

pub fn eval_err(source: &str) -> EvalError {
  match evaluate_source("test", source, config()) {
    Ok(plan) => panic!("expected an error, got plan with {} functions", plan.functions.len()),
    Err(e) => e,
  }
}

/// Short names of every operation, in order, e.g. `provision:shop-test-api`.
pub fn ops(plan: &DeploymentPlan) -> Vec<String> {
  plan
    .operations
    .iter()
    .map(|op| match op {
      Operation::ProvisionFunction { identity } => format!("provision:{}", identity),
      Operation::CreateRouter { scope } => format!("router:{}", scope),
      Operation::RegisterRoute { route, target, .. } => format!("route:{}:{}", route, target),
      Operation::CreateAttachment { path } => format!("attachment:{}", path),
      Operation::Attach { target, .. } => format!("attach:{}", target),
      Operation::Subscribe { kind, source, .. } => format!("{}:{}", kind, source),
      Operation::GrantPermission { resource, .. } => format!("grant:{}", resource),
    })
    .collect()
}

pub fn count_provisions(plan: &DeploymentPlan) -> usize {
  plan.count(|op| matches!(op, Operation::ProvisionFunction { .. }))
}

/// A stack script written to a temporary directory.
pub struct StackFile {
  pub temp: TempDir,
  pub path: PathBuf,
}

impl StackFile {
  pub fn new(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("stack.lua");
    std::fs::write(&path, content).unwrap();
    Self { temp, path }
  }

  pub fn eval(&self) -> Result<DeploymentPlan, EvalError> {
    evaluate_stack(&self.path, config())
  }
}

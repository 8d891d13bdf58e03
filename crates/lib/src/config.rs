//! Deployment configuration.
//!
//! A [`DeployConfig`] names the app and stage every identity is derived from,
//! the target region and account, the default sizing applied to new builders,
//! and whether a second `route(..)` call on a builder is rejected.
//!
//! Values come from `FNSTACK_*` environment variables (see
//! [`DeployConfig::from_env`]) and can be overridden with the `with_*`
//! methods.

use std::str::FromStr;

use thiserror::Error;

use crate::consts::{
  APP_NAME, DEFAULT_ACCOUNT, DEFAULT_APP, DEFAULT_MEMORY_MB, DEFAULT_REGION, DEFAULT_SCOPE, DEFAULT_STAGE,
  DEFAULT_TIMEOUT_SECS,
};
use crate::function::{Runtime, Sizing};
use crate::registry::ScopeId;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {var}: {reason}")]
  InvalidValue {
    var: String,
    value: String,
    reason: String,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
  pub app: String,
  pub stage: String,
  pub region: String,
  pub account: String,
  /// Sizing every new builder starts from.
  pub defaults: Sizing,
  /// Reject a second `route(..)` on the same builder instead of overwriting.
  pub strict_routes: bool,
}

impl Default for DeployConfig {
  fn default() -> Self {
    Self {
      app: DEFAULT_APP.to_string(),
      stage: DEFAULT_STAGE.to_string(),
      region: DEFAULT_REGION.to_string(),
      account: DEFAULT_ACCOUNT.to_string(),
      defaults: Sizing::default(),
      strict_routes: false,
    }
  }
}

/// Name of the environment variable for `key`, e.g. `FNSTACK_STAGE`.
pub fn env_var(key: &str) -> String {
  format!("{}_{}", APP_NAME.to_ascii_uppercase(), key)
}

fn read_var(key: &str) -> Option<(String, String)> {
  let var = env_var(key);
  match std::env::var(&var) {
    Ok(value) if !value.trim().is_empty() => Some((var, value.trim().to_string())),
    _ => None,
  }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
  T: FromStr,
  T::Err: ToString,
{
  match read_var(key) {
    Some((var, value)) => value
      .parse::<T>()
      .map(Some)
      .map_err(|e| ConfigError::InvalidValue {
        var,
        value,
        reason: e.to_string(),
      }),
    None => Ok(None),
  }
}

fn parse_bool(key: &str) -> Result<Option<bool>, ConfigError> {
  match read_var(key) {
    Some((var, value)) => match value.to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(Some(true)),
      "0" | "false" | "no" | "off" => Ok(Some(false)),
      _ => Err(ConfigError::InvalidValue {
        var,
        value,
        reason: "expected a boolean".to_string(),
      }),
    },
    None => Ok(None),
  }
}

impl DeployConfig {
  /// Read configuration from the environment, falling back to defaults.
  ///
  /// | variable                | field                   |
  /// |-------------------------|-------------------------|
  /// | `FNSTACK_APP`           | `app`                   |
  /// | `FNSTACK_STAGE`         | `stage`                 |
  /// | `FNSTACK_REGION`        | `region`                |
  /// | `FNSTACK_ACCOUNT`       | `account`               |
  /// | `FNSTACK_MEMORY`        | `defaults.memory_mb`    |
  /// | `FNSTACK_TIMEOUT`       | `defaults.timeout_secs` |
  /// | `FNSTACK_RUNTIME`       | `defaults.runtime`      |
  /// | `FNSTACK_STRICT_ROUTES` | `strict_routes`         |
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some((_, app)) = read_var("APP") {
      config.app = app;
    }
    if let Some((_, stage)) = read_var("STAGE") {
      config.stage = stage;
    }
    if let Some((_, region)) = read_var("REGION") {
      config.region = region;
    }
    if let Some((_, account)) = read_var("ACCOUNT") {
      config.account = account;
    }

    config.defaults.memory_mb = parse_var("MEMORY")?.unwrap_or(DEFAULT_MEMORY_MB);
    config.defaults.timeout_secs = parse_var("TIMEOUT")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if let Some(runtime) = parse_var::<Runtime>("RUNTIME")? {
      config.defaults.runtime = runtime;
    }
    config.strict_routes = parse_bool("STRICT_ROUTES")?.unwrap_or(false);

    Ok(config)
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = app.into();
    self
  }

  pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
    self.stage = stage.into();
    self
  }

  pub fn with_defaults(mut self, defaults: Sizing) -> Self {
    self.defaults = defaults;
    self
  }

  pub fn with_strict_routes(mut self, strict: bool) -> Self {
    self.strict_routes = strict;
    self
  }

  /// Derive the identity of a function from its logical id.
  ///
  /// Functions of the default scope are named `{app}-{stage}-{id}`, all other
  /// scopes add their id: `{app}-{stage}-{scope}-{id}`.
  pub fn identity_for(&self, scope: &ScopeId, logical_id: &str) -> String {
    if scope.0 == DEFAULT_SCOPE {
      format!("{}-{}-{}", self.app, self.stage, logical_id)
    } else {
      format!("{}-{}-{}-{}", self.app, self.stage, scope.0, logical_id)
    }
  }
}

#[cfg(test)]
mod tests {
  use serial_test::serial;

  use super::*;

  const ALL_VARS: [&str; 8] = [
    "FNSTACK_APP",
    "FNSTACK_STAGE",
    "FNSTACK_REGION",
    "FNSTACK_ACCOUNT",
    "FNSTACK_MEMORY",
    "FNSTACK_TIMEOUT",
    "FNSTACK_RUNTIME",
    "FNSTACK_STRICT_ROUTES",
  ];

  fn with_clean_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let mut all: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|v| (*v, None)).collect();
    for &(key, value) in vars {
      all.retain(|(k, _)| *k != key);
      all.push((key, Some(value)));
    }
    temp_env::with_vars(all, f);
  }

  #[test]
  #[serial]
  fn defaults_without_environment() {
    with_clean_env(&[], || {
      let config = DeployConfig::from_env().unwrap();
      assert_eq!(config, DeployConfig::default());
      assert_eq!(config.defaults.memory_mb, DEFAULT_MEMORY_MB);
      assert!(!config.strict_routes);
    });
  }

  #[test]
  #[serial]
  fn reads_every_variable() {
    with_clean_env(
      &[
        ("FNSTACK_APP", "shop"),
        ("FNSTACK_STAGE", "prod"),
        ("FNSTACK_REGION", "eu-west-1"),
        ("FNSTACK_ACCOUNT", "123456789012"),
        ("FNSTACK_MEMORY", "2048"),
        ("FNSTACK_TIMEOUT", "30"),
        ("FNSTACK_RUNTIME", "python3.12"),
        ("FNSTACK_STRICT_ROUTES", "yes"),
      ],
      || {
        let config = DeployConfig::from_env().unwrap();
        assert_eq!(config.app, "shop");
        assert_eq!(config.stage, "prod");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.account, "123456789012");
        assert_eq!(config.defaults.memory_mb, 2048);
        assert_eq!(config.defaults.timeout_secs, 30);
        assert_eq!(config.defaults.runtime, Runtime::Python312);
        assert!(config.strict_routes);
      },
    );
  }

  #[test]
  #[serial]
  fn invalid_number_is_reported_with_variable_name() {
    with_clean_env(&[("FNSTACK_MEMORY", "lots")], || {
      let err = DeployConfig::from_env().unwrap_err();
      let msg = err.to_string();
      assert!(msg.contains("FNSTACK_MEMORY"), "unexpected error: {}", msg);
      assert!(msg.contains("lots"), "unexpected error: {}", msg);
    });
  }

  #[test]
  #[serial]
  fn invalid_runtime_and_bool_are_rejected() {
    with_clean_env(&[("FNSTACK_RUNTIME", "cobol")], || {
      assert!(DeployConfig::from_env().is_err());
    });
    with_clean_env(&[("FNSTACK_STRICT_ROUTES", "maybe")], || {
      assert!(DeployConfig::from_env().is_err());
    });
  }

  #[test]
  fn identity_includes_non_default_scope() {
    let config = DeployConfig::default().with_app("shop").with_stage("prod");
    assert_eq!(config.identity_for(&ScopeId::new(DEFAULT_SCOPE), "api"), "shop-prod-api");
    assert_eq!(config.identity_for(&ScopeId::new("admin"), "api"), "shop-prod-admin-api");
  }
}

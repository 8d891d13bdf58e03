use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEFAULT_MEMORY_MB, DEFAULT_TIMEOUT_SECS};
use crate::provision::{PermissionError, ProvisioningError, RoutingError, SubscriptionError};

/// Execution runtime of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Runtime {
  #[serde(rename = "nodejs18.x")]
  Node18,
  #[serde(rename = "nodejs20.x")]
  Node20,
  #[serde(rename = "python3.11")]
  Python311,
  #[serde(rename = "python3.12")]
  Python312,
  #[serde(rename = "java21")]
  Java21,
  #[serde(rename = "provided.al2023")]
  Provided,
}

impl Runtime {
  pub const ALL: [Runtime; 6] = [
    Runtime::Node18,
    Runtime::Node20,
    Runtime::Python311,
    Runtime::Python312,
    Runtime::Java21,
    Runtime::Provided,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Runtime::Node18 => "nodejs18.x",
      Runtime::Node20 => "nodejs20.x",
      Runtime::Python311 => "python3.11",
      Runtime::Python312 => "python3.12",
      Runtime::Java21 => "java21",
      Runtime::Provided => "provided.al2023",
    }
  }
}

impl fmt::Display for Runtime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Runtime {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Runtime::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| format!("unknown runtime '{}'", s))
  }
}

/// Instruction set the function runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
  #[default]
  X86_64,
  Arm64,
}

/// Scalar sizing parameters of a function.
///
/// Values are not range-checked here; the provisioner validates them when the
/// function is materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sizing {
  pub memory_mb: u32,
  pub timeout_secs: u32,
  pub runtime: Runtime,
  pub architecture: Architecture,
  pub reserved_concurrency: Option<u32>,
}

impl Default for Sizing {
  fn default() -> Self {
    Self {
      memory_mb: DEFAULT_MEMORY_MB,
      timeout_secs: DEFAULT_TIMEOUT_SECS,
      runtime: Runtime::Node20,
      architecture: Architecture::X86_64,
      reserved_concurrency: None,
    }
  }
}

impl Sizing {
  /// Overwrite every field the patch sets. Last write wins per field.
  pub fn apply(&mut self, patch: &SizingPatch) {
    if let Some(memory) = patch.memory {
      self.memory_mb = memory;
    }
    if let Some(timeout) = patch.timeout {
      self.timeout_secs = timeout;
    }
    if let Some(runtime) = patch.runtime {
      self.runtime = runtime;
    }
    if let Some(architecture) = patch.architecture {
      self.architecture = architecture;
    }
    if let Some(concurrency) = patch.concurrency {
      self.reserved_concurrency = Some(concurrency);
    }
  }
}

/// A partial sizing update, as passed to `sizing(..)`.
///
/// # Example (Lua)
///
/// ```lua
/// stack.func("resize"):sizing({ memory = 2048, timeout = 60, runtime = "python3.12" })
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingPatch {
  pub memory: Option<u32>,
  pub timeout: Option<u32>,
  pub runtime: Option<Runtime>,
  pub architecture: Option<Architecture>,
  pub concurrency: Option<u32>,
}

impl SizingPatch {
  pub fn memory(mut self, memory_mb: u32) -> Self {
    self.memory = Some(memory_mb);
    self
  }

  pub fn timeout(mut self, timeout_secs: u32) -> Self {
    self.timeout = Some(timeout_secs);
    self
  }

  pub fn runtime(mut self, runtime: Runtime) -> Self {
    self.runtime = Some(runtime);
    self
  }

  pub fn architecture(mut self, architecture: Architecture) -> Self {
    self.architecture = Some(architecture);
    self
  }

  pub fn concurrency(mut self, limit: u32) -> Self {
    self.concurrency = Some(limit);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Patch,
  Delete,
  Head,
  Options,
  Any,
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Patch => "PATCH",
      HttpMethod::Delete => "DELETE",
      HttpMethod::Head => "HEAD",
      HttpMethod::Options => "OPTIONS",
      HttpMethod::Any => "ANY",
    }
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HttpMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Ok(HttpMethod::Get),
      "POST" => Ok(HttpMethod::Post),
      "PUT" => Ok(HttpMethod::Put),
      "PATCH" => Ok(HttpMethod::Patch),
      "DELETE" => Ok(HttpMethod::Delete),
      "HEAD" => Ok(HttpMethod::Head),
      "OPTIONS" => Ok(HttpMethod::Options),
      "ANY" | "*" => Ok(HttpMethod::Any),
      _ => Err(format!("unknown HTTP method '{}'", s)),
    }
  }
}

/// The HTTP route a function is exposed on through the scope's shared router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteInfo {
  pub method: HttpMethod,
  pub path: String,
}

impl RouteInfo {
  pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
    }
  }
}

impl fmt::Display for RouteInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.path)
  }
}

/// Environment variables of a function. Ordered for reproducible plans.
pub type Environment = BTreeMap<String, String>;

/// Errors surfaced by `build()`, whether called explicitly, through
/// `handle()`, or by a deferred finalize.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Invalid or missing configuration, detected before provisioning.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error(transparent)]
  Provisioning(#[from] ProvisioningError),

  #[error(transparent)]
  Routing(#[from] RoutingError),

  #[error(transparent)]
  Subscription(#[from] SubscriptionError),

  #[error(transparent)]
  Permission(#[from] PermissionError),

  /// An earlier build of the same function failed; builds are never retried.
  #[error("function '{identity}' previously failed to build: {reason}")]
  PreviouslyFailed { identity: String, reason: String },

  /// `build` was invoked again while the same function was being built.
  #[error("function '{identity}' is already being built")]
  Reentrant { identity: String },
}

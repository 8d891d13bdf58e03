use serde::{Deserialize, Serialize};

use crate::function::{Environment, Sizing};
use crate::registry::ScopeId;
use crate::util::hash::{Hashable, ObjectHash};

/// Everything the provisioner needs to materialize a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
  pub identity: String,
  pub handler: Option<String>,
  pub sizing: Sizing,
  pub environment: Environment,
}

impl Hashable for ProvisionRequest {}

/// Reference to a materialized function.
///
/// Owned by exactly one builder. Cloning yields an identical handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
  pub id: ObjectHash,
  pub identity: String,
  pub arn: String,
}

/// Reference to the HTTP router shared by every function of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedRouterHandle {
  pub id: ObjectHash,
  pub scope: ScopeId,
  pub endpoint: String,
}

/// Reference to the shared library bundle attached to functions of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedAttachmentHandle {
  pub id: ObjectHash,
  pub arn: String,
  pub path: String,
}

use thiserror::Error;

use crate::fragment::FragmentKind;

/// The function could not be materialized.
#[derive(Debug, Error)]
pub enum ProvisioningError {
  #[error("invalid function identity '{identity}': {reason}")]
  InvalidIdentity { identity: String, reason: String },

  #[error("invalid sizing for '{identity}': {reason}")]
  InvalidSizing { identity: String, reason: String },

  #[error("function '{0}' is already provisioned")]
  Duplicate(String),

  #[error("cannot attach '{attachment}' to '{identity}': {reason}")]
  Attachment {
    attachment: String,
    identity: String,
    reason: String,
  },
}

/// A route could not be registered on the shared router.
#[derive(Debug, Error)]
pub enum RoutingError {
  #[error("invalid route path '{path}': {reason}")]
  InvalidPath { path: String, reason: String },

  #[error("route '{route}' is already registered for '{existing}'")]
  Conflict { route: String, existing: String },

  #[error("no router exists for scope '{0}'")]
  UnknownRouter(String),
}

/// An event source could not be wired to the function.
#[derive(Debug, Error)]
pub enum SubscriptionError {
  #[error("{kind} for '{identity}' has an empty source")]
  EmptySource { kind: FragmentKind, identity: String },

  #[error("{kind} batch size {size} is out of range (1..={max})")]
  InvalidBatchSize { kind: FragmentKind, size: u32, max: u32 },

  #[error("invalid schedule expression '{0}': expected rate(..) or cron(..)")]
  InvalidSchedule(String),

  #[error("blob notification on '{0}' lists no events")]
  NoEvents(String),

  #[error("cannot subscribe unknown function '{0}'")]
  UnknownTarget(String),
}

/// A permission could not be granted to the function.
#[derive(Debug, Error)]
pub enum PermissionError {
  #[error("permission grant for '{0}' has an empty target")]
  EmptyTarget(String),

  #[error("permission grant on '{0}' lists no actions")]
  NoActions(String),
}

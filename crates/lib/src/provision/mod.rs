//! Provisioning collaborators.
//!
//! Function builders never create cloud resources themselves. They describe
//! what they need and call a [`Provisioner`] once, at build time, in a fixed
//! order: materialize the function, register its route, then apply every
//! recorded fragment.
//!
//! # Submodules
//!
//! - [`plan`] - [`PlanProvisioner`], which records a serializable deployment plan

mod error;
pub mod plan;
mod types;

pub use error::*;
pub use plan::{DeploymentPlan, Operation, PlanProvisioner};
pub use types::*;

use crate::fragment::{
  AttachmentOptions, BlobNotification, QueueSubscription, ScheduledRule, StreamingSource, TopicSubscription,
};
use crate::function::RouteInfo;
use crate::registry::ScopeId;

/// The resource-provisioning primitives consumed by function builders.
///
/// Calls happen on a single thread, one finalize at a time, so implementations
/// use interior mutability rather than locking.
pub trait Provisioner {
  /// Materialize a function. Validates identity and sizing.
  fn provision_function(&self, request: &ProvisionRequest) -> Result<ResourceHandle, ProvisioningError>;

  fn register_route(
    &self,
    router: &SharedRouterHandle,
    route: &RouteInfo,
    target: &ResourceHandle,
  ) -> Result<(), RoutingError>;

  fn subscribe_topic(&self, descriptor: &TopicSubscription, target: &ResourceHandle)
  -> Result<(), SubscriptionError>;

  fn subscribe_queue(&self, descriptor: &QueueSubscription, target: &ResourceHandle)
  -> Result<(), SubscriptionError>;

  fn notify_blob(&self, descriptor: &BlobNotification, target: &ResourceHandle) -> Result<(), SubscriptionError>;

  fn subscribe_stream(&self, descriptor: &StreamingSource, target: &ResourceHandle) -> Result<(), SubscriptionError>;

  fn schedule_rule(&self, descriptor: &ScheduledRule, target: &ResourceHandle) -> Result<(), SubscriptionError>;

  fn grant_permission(&self, target: &ResourceHandle, target_arn: &str, actions: &[String])
  -> Result<(), PermissionError>;

  fn create_shared_router(&self, scope: &ScopeId) -> SharedRouterHandle;

  fn create_shared_attachment(&self, scope: &ScopeId, path: &str, options: &AttachmentOptions)
  -> SharedAttachmentHandle;

  fn attach(&self, attachment: &SharedAttachmentHandle, target: &ResourceHandle) -> Result<(), ProvisioningError>;
}

//! The in-tree provisioner: records a deployment plan instead of calling a
//! cloud API.
//!
//! Every collaborator call is validated the way the target platform would
//! validate it, applied to a [`DeploymentPlan`], and appended to the plan's
//! ordered [`Operation`] log.
//!
//! # Example
//!
//! ```json
//! {
//!   "functions": {
//!     "shop-dev-checkout": { "arn": "arn:aws:lambda:us-east-1:000000000000:function:shop-dev-checkout", ... }
//!   },
//!   "routers": {
//!     "main": { "endpoint": "https://3f9a1c0d2e.execute-api.us-east-1.amazonaws.com/dev", "routes": [...] }
//!   },
//!   "operations": [
//!     { "op": "provision_function", "identity": "shop-dev-checkout" },
//!     { "op": "create_router", "scope": "main" },
//!     { "op": "register_route", "scope": "main", "route": "POST /checkout", "target": "shop-dev-checkout" }
//!   ]
//! }
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
  PermissionError, ProvisionRequest, Provisioner, ProvisioningError, ResourceHandle, RoutingError,
  SharedAttachmentHandle, SharedRouterHandle, SubscriptionError,
};
use crate::config::DeployConfig;
use crate::consts::{
  MAX_BATCH_SIZE, MAX_IDENTITY_LEN, MAX_MEMORY_MB, MAX_RESERVED_CONCURRENCY, MAX_TIMEOUT_SECS, MIN_MEMORY_MB,
};
use crate::fragment::{
  AttachmentOptions, BlobNotification, Fragment, FragmentKind, PermissionGrant, QueueSubscription, ScheduledRule,
  StreamingSource, TopicSubscription,
};
use crate::function::{Environment, RouteInfo, Sizing};
use crate::registry::ScopeId;
use crate::util::hash::{Hashable, ObjectHash, hash_str};

/// A function as it will be deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
  pub id: ObjectHash,
  pub arn: String,
  pub handler: Option<String>,
  pub sizing: Sizing,
  pub environment: Environment,
  /// ARNs of attached shared bundles.
  pub attachments: Vec<String>,
  /// Event sources, grants and schedules, in application order.
  pub triggers: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDef {
  pub method: String,
  pub path: String,
  pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDef {
  pub id: ObjectHash,
  pub endpoint: String,
  pub routes: Vec<RouteDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDef {
  pub arn: String,
  pub path: String,
  pub options: AttachmentOptions,
}

/// One collaborator call, as recorded in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
  ProvisionFunction {
    identity: String,
  },
  CreateRouter {
    scope: String,
  },
  RegisterRoute {
    scope: String,
    route: String,
    target: String,
  },
  CreateAttachment {
    path: String,
  },
  Attach {
    attachment: String,
    target: String,
  },
  Subscribe {
    kind: FragmentKind,
    source: String,
    target: String,
  },
  GrantPermission {
    target: String,
    resource: String,
    actions: Vec<String>,
  },
}

/// The complete, serializable result of finalizing every builder of an app.
///
/// Maps are [`BTreeMap`]s so that serialization, and thus the plan hash, is
/// deterministic.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
  /// Functions keyed by identity.
  pub functions: BTreeMap<String, FunctionDef>,
  /// Shared routers keyed by scope id.
  pub routers: BTreeMap<String, RouterDef>,
  /// Shared attachments keyed by ARN.
  pub attachments: BTreeMap<String, AttachmentDef>,
  /// Every collaborator call, in call order.
  pub operations: Vec<Operation>,
}

impl Hashable for DeploymentPlan {}

impl DeploymentPlan {
  /// Number of recorded operations matching `pred`.
  pub fn count(&self, pred: impl Fn(&Operation) -> bool) -> usize {
    self.operations.iter().filter(|op| pred(op)).count()
  }
}

/// A [`Provisioner`] that validates requests and records them into a
/// [`DeploymentPlan`].
#[derive(Debug)]
pub struct PlanProvisioner {
  region: String,
  account: String,
  stage: String,
  app: String,
  plan: RefCell<DeploymentPlan>,
}

impl PlanProvisioner {
  pub fn new(config: &DeployConfig) -> Self {
    Self {
      region: config.region.clone(),
      account: config.account.clone(),
      stage: config.stage.clone(),
      app: config.app.clone(),
      plan: RefCell::new(DeploymentPlan::default()),
    }
  }

  /// A snapshot of the plan recorded so far.
  pub fn plan(&self) -> DeploymentPlan {
    self.plan.borrow().clone()
  }

  pub fn into_plan(self) -> DeploymentPlan {
    self.plan.into_inner()
  }

  /// Number of recorded operations matching `pred`.
  pub fn count(&self, pred: impl Fn(&Operation) -> bool) -> usize {
    self.plan.borrow().count(pred)
  }

  fn function_arn(&self, identity: &str) -> String {
    format!("arn:aws:lambda:{}:{}:function:{}", self.region, self.account, identity)
  }

  fn record_trigger(
    &self,
    fragment: Fragment,
    source: &str,
    target: &ResourceHandle,
  ) -> Result<(), SubscriptionError> {
    let kind = fragment.kind();
    if source.trim().is_empty() {
      return Err(SubscriptionError::EmptySource {
        kind,
        identity: target.identity.clone(),
      });
    }

    let mut plan = self.plan.borrow_mut();
    let function = plan
      .functions
      .get_mut(&target.identity)
      .ok_or_else(|| SubscriptionError::UnknownTarget(target.identity.clone()))?;
    function.triggers.push(fragment);
    plan.operations.push(Operation::Subscribe {
      kind,
      source: source.to_string(),
      target: target.identity.clone(),
    });

    debug!(kind = %kind, source = %source, target = %target.identity, "recorded subscription");
    Ok(())
  }
}

fn validate_identity(identity: &str) -> Result<(), ProvisioningError> {
  let invalid = |reason: String| ProvisioningError::InvalidIdentity {
    identity: identity.to_string(),
    reason,
  };

  if identity.is_empty() {
    return Err(invalid("identity is empty".to_string()));
  }
  if identity.len() > MAX_IDENTITY_LEN {
    return Err(invalid(format!(
      "{} characters exceeds the limit of {}",
      identity.len(),
      MAX_IDENTITY_LEN
    )));
  }
  if let Some(c) = identity
    .chars()
    .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
  {
    return Err(invalid(format!("character '{}' is not allowed", c)));
  }
  Ok(())
}

fn validate_sizing(identity: &str, sizing: &Sizing) -> Result<(), ProvisioningError> {
  let invalid = |reason: String| ProvisioningError::InvalidSizing {
    identity: identity.to_string(),
    reason,
  };

  if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&sizing.memory_mb) {
    return Err(invalid(format!(
      "memory {} MB is out of range ({}..={})",
      sizing.memory_mb, MIN_MEMORY_MB, MAX_MEMORY_MB
    )));
  }
  if !(1..=MAX_TIMEOUT_SECS).contains(&sizing.timeout_secs) {
    return Err(invalid(format!(
      "timeout {} s is out of range (1..={})",
      sizing.timeout_secs, MAX_TIMEOUT_SECS
    )));
  }
  if let Some(limit) = sizing.reserved_concurrency
    && limit > MAX_RESERVED_CONCURRENCY
  {
    return Err(invalid(format!(
      "reserved concurrency {} exceeds {}",
      limit, MAX_RESERVED_CONCURRENCY
    )));
  }
  Ok(())
}

fn validate_batch(kind: FragmentKind, size: Option<u32>) -> Result<(), SubscriptionError> {
  match size {
    Some(size) if !(1..=MAX_BATCH_SIZE).contains(&size) => Err(SubscriptionError::InvalidBatchSize {
      kind,
      size,
      max: MAX_BATCH_SIZE,
    }),
    _ => Ok(()),
  }
}

impl Provisioner for PlanProvisioner {
  fn provision_function(&self, request: &ProvisionRequest) -> Result<ResourceHandle, ProvisioningError> {
    validate_identity(&request.identity)?;
    validate_sizing(&request.identity, &request.sizing)?;

    let mut plan = self.plan.borrow_mut();
    if plan.functions.contains_key(&request.identity) {
      return Err(ProvisioningError::Duplicate(request.identity.clone()));
    }

    let id = request
      .compute_hash()
      .unwrap_or_else(|_| hash_str(&request.identity));
    let arn = self.function_arn(&request.identity);

    plan.functions.insert(
      request.identity.clone(),
      FunctionDef {
        id: id.clone(),
        arn: arn.clone(),
        handler: request.handler.clone(),
        sizing: request.sizing.clone(),
        environment: request.environment.clone(),
        attachments: Vec::new(),
        triggers: Vec::new(),
      },
    );
    plan.operations.push(Operation::ProvisionFunction {
      identity: request.identity.clone(),
    });

    info!(identity = %request.identity, id = %id, "provisioned function");
    Ok(ResourceHandle {
      id,
      identity: request.identity.clone(),
      arn,
    })
  }

  fn register_route(
    &self,
    router: &SharedRouterHandle,
    route: &RouteInfo,
    target: &ResourceHandle,
  ) -> Result<(), RoutingError> {
    if !route.path.starts_with('/') {
      return Err(RoutingError::InvalidPath {
        path: route.path.clone(),
        reason: "path must start with '/'".to_string(),
      });
    }
    if route.path.contains(char::is_whitespace) {
      return Err(RoutingError::InvalidPath {
        path: route.path.clone(),
        reason: "path must not contain whitespace".to_string(),
      });
    }

    let mut plan = self.plan.borrow_mut();
    let def = plan
      .routers
      .get_mut(&router.scope.0)
      .ok_or_else(|| RoutingError::UnknownRouter(router.scope.0.clone()))?;

    let method = route.method.as_str();
    if let Some(existing) = def.routes.iter().find(|r| r.method == method && r.path == route.path) {
      return Err(RoutingError::Conflict {
        route: route.to_string(),
        existing: existing.target.clone(),
      });
    }

    def.routes.push(RouteDef {
      method: method.to_string(),
      path: route.path.clone(),
      target: target.identity.clone(),
    });
    plan.operations.push(Operation::RegisterRoute {
      scope: router.scope.0.clone(),
      route: route.to_string(),
      target: target.identity.clone(),
    });

    info!(scope = %router.scope, route = %route, target = %target.identity, "registered route");
    Ok(())
  }

  fn subscribe_topic(
    &self,
    descriptor: &TopicSubscription,
    target: &ResourceHandle,
  ) -> Result<(), SubscriptionError> {
    self.record_trigger(descriptor.clone().into(), &descriptor.topic, target)
  }

  fn subscribe_queue(
    &self,
    descriptor: &QueueSubscription,
    target: &ResourceHandle,
  ) -> Result<(), SubscriptionError> {
    validate_batch(FragmentKind::QueueSubscription, descriptor.batch_size)?;
    self.record_trigger(descriptor.clone().into(), &descriptor.queue, target)
  }

  fn notify_blob(&self, descriptor: &BlobNotification, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    if descriptor.events.is_empty() {
      return Err(SubscriptionError::NoEvents(descriptor.bucket.clone()));
    }
    self.record_trigger(descriptor.clone().into(), &descriptor.bucket, target)
  }

  fn subscribe_stream(&self, descriptor: &StreamingSource, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    validate_batch(FragmentKind::StreamingSource, descriptor.batch_size)?;
    self.record_trigger(descriptor.clone().into(), &descriptor.stream, target)
  }

  fn schedule_rule(&self, descriptor: &ScheduledRule, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    let expr = descriptor.expression.trim();
    let well_formed = (expr.starts_with("rate(") || expr.starts_with("cron(")) && expr.ends_with(')');
    if !well_formed {
      return Err(SubscriptionError::InvalidSchedule(descriptor.expression.clone()));
    }
    self.record_trigger(descriptor.clone().into(), expr, target)
  }

  fn grant_permission(
    &self,
    target: &ResourceHandle,
    target_arn: &str,
    actions: &[String],
  ) -> Result<(), PermissionError> {
    if target_arn.trim().is_empty() {
      return Err(PermissionError::EmptyTarget(target.identity.clone()));
    }
    if actions.is_empty() {
      return Err(PermissionError::NoActions(target_arn.to_string()));
    }

    let mut plan = self.plan.borrow_mut();
    if let Some(function) = plan.functions.get_mut(&target.identity) {
      function
        .triggers
        .push(PermissionGrant::new(target_arn, actions.iter().cloned()).into());
    }
    plan.operations.push(Operation::GrantPermission {
      target: target.identity.clone(),
      resource: target_arn.to_string(),
      actions: actions.to_vec(),
    });

    debug!(target = %target.identity, resource = %target_arn, actions = ?actions, "granted permission");
    Ok(())
  }

  fn create_shared_router(&self, scope: &ScopeId) -> SharedRouterHandle {
    let id = hash_str(&format!("{}/{}/router/{}", self.app, self.stage, scope.0));
    let endpoint = format!(
      "https://{}.execute-api.{}.amazonaws.com/{}",
      id.short(10),
      self.region,
      self.stage
    );

    let mut plan = self.plan.borrow_mut();
    plan.routers.insert(
      scope.0.clone(),
      RouterDef {
        id: id.clone(),
        endpoint: endpoint.clone(),
        routes: Vec::new(),
      },
    );
    plan.operations.push(Operation::CreateRouter { scope: scope.0.clone() });

    info!(scope = %scope, endpoint = %endpoint, "created shared router");
    SharedRouterHandle {
      id,
      scope: scope.clone(),
      endpoint,
    }
  }

  fn create_shared_attachment(
    &self,
    scope: &ScopeId,
    path: &str,
    options: &AttachmentOptions,
  ) -> SharedAttachmentHandle {
    let id = hash_str(&format!("{}/{}/attachment/{}/{}", self.app, self.stage, scope.0, path));
    let arn = format!(
      "arn:aws:lambda:{}:{}:layer:{}-{}-{}:1",
      self.region,
      self.account,
      self.app,
      self.stage,
      id.short(10)
    );

    let mut plan = self.plan.borrow_mut();
    plan.attachments.insert(
      arn.clone(),
      AttachmentDef {
        arn: arn.clone(),
        path: path.to_string(),
        options: options.clone(),
      },
    );
    plan.operations.push(Operation::CreateAttachment { path: path.to_string() });

    info!(scope = %scope, path = %path, arn = %arn, "created shared attachment");
    SharedAttachmentHandle {
      id,
      arn,
      path: path.to_string(),
    }
  }

  fn attach(&self, attachment: &SharedAttachmentHandle, target: &ResourceHandle) -> Result<(), ProvisioningError> {
    let mut plan = self.plan.borrow_mut();
    let compatible = match plan.attachments.get(&attachment.arn) {
      Some(def) => def.options.compatible_runtimes.clone(),
      None => {
        return Err(ProvisioningError::Attachment {
          attachment: attachment.arn.clone(),
          identity: target.identity.clone(),
          reason: "attachment does not exist".to_string(),
        });
      }
    };

    let function = plan
      .functions
      .get_mut(&target.identity)
      .ok_or_else(|| ProvisioningError::Attachment {
        attachment: attachment.arn.clone(),
        identity: target.identity.clone(),
        reason: "function does not exist".to_string(),
      })?;

    if !compatible.is_empty() && !compatible.contains(&function.sizing.runtime) {
      return Err(ProvisioningError::Attachment {
        attachment: attachment.arn.clone(),
        identity: target.identity.clone(),
        reason: format!("runtime {} is not compatible", function.sizing.runtime),
      });
    }
    if !function.attachments.contains(&attachment.arn) {
      function.attachments.push(attachment.arn.clone());
    }
    plan.operations.push(Operation::Attach {
      attachment: attachment.arn.clone(),
      target: target.identity.clone(),
    });

    debug!(attachment = %attachment.arn, target = %target.identity, "attached shared bundle");
    Ok(())
  }
}

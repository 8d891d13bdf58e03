//! Test utilities for fnstack-lib.
//!
//! Apps wired to a [`PlanProvisioner`] so tests can inspect the recorded
//! plan, plus a provisioner that runs a hook from inside `provision_function`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::DeployConfig;
use crate::fragment::{
  AttachmentOptions, BlobNotification, QueueSubscription, ScheduledRule, StreamingSource, TopicSubscription,
};
use crate::function::RouteInfo;
use crate::provision::{
  PermissionError, PlanProvisioner, ProvisionRequest, Provisioner, ProvisioningError, ResourceHandle, RoutingError,
  SharedAttachmentHandle, SharedRouterHandle, SubscriptionError,
};
use crate::registry::ScopeId;
use crate::scope::App;

/// Default config with the stage set to `test`.
pub fn test_config() -> DeployConfig {
  DeployConfig::default().with_stage("test")
}

pub fn test_app() -> (App, Rc<PlanProvisioner>) {
  test_app_with(test_config())
}

pub fn test_app_with(config: DeployConfig) -> (App, Rc<PlanProvisioner>) {
  let plan = Rc::new(PlanProvisioner::new(&config));
  (App::new(config, plan.clone()), plan)
}

pub fn test_app_with_provisioner<P: Provisioner + 'static>(provisioner: Rc<P>) -> (App, Rc<P>) {
  (App::new(test_config(), provisioner.clone()), provisioner)
}

type Hook = Box<dyn Fn()>;

/// A [`PlanProvisioner`] that runs a one-shot hook while provisioning.
pub struct HookedProvisioner {
  plan: PlanProvisioner,
  hook: RefCell<Option<Hook>>,
}

impl HookedProvisioner {
  pub fn new(config: &DeployConfig) -> Rc<Self> {
    Rc::new(Self {
      plan: PlanProvisioner::new(config),
      hook: RefCell::new(None),
    })
  }

  pub fn on_provision(&self, hook: impl Fn() + 'static) {
    *self.hook.borrow_mut() = Some(Box::new(hook));
  }
}

impl Provisioner for HookedProvisioner {
  fn provision_function(&self, request: &ProvisionRequest) -> Result<ResourceHandle, ProvisioningError> {
    let hook = self.hook.borrow_mut().take();
    if let Some(hook) = hook {
      hook();
    }
    self.plan.provision_function(request)
  }

  fn register_route(
    &self,
    router: &SharedRouterHandle,
    route: &RouteInfo,
    target: &ResourceHandle,
  ) -> Result<(), RoutingError> {
    self.plan.register_route(router, route, target)
  }

  fn subscribe_topic(&self, descriptor: &TopicSubscription, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    self.plan.subscribe_topic(descriptor, target)
  }

  fn subscribe_queue(&self, descriptor: &QueueSubscription, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    self.plan.subscribe_queue(descriptor, target)
  }

  fn notify_blob(&self, descriptor: &BlobNotification, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    self.plan.notify_blob(descriptor, target)
  }

  fn subscribe_stream(&self, descriptor: &StreamingSource, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    self.plan.subscribe_stream(descriptor, target)
  }

  fn schedule_rule(&self, descriptor: &ScheduledRule, target: &ResourceHandle) -> Result<(), SubscriptionError> {
    self.plan.schedule_rule(descriptor, target)
  }

  fn grant_permission(&self, target: &ResourceHandle, target_arn: &str, actions: &[String]) -> Result<(), PermissionError> {
    self.plan.grant_permission(target, target_arn, actions)
  }

  fn create_shared_router(&self, scope: &ScopeId) -> SharedRouterHandle {
    self.plan.create_shared_router(scope)
  }

  fn create_shared_attachment(
    &self,
    scope: &ScopeId,
    path: &str,
    options: &AttachmentOptions,
  ) -> SharedAttachmentHandle {
    self.plan.create_shared_attachment(scope, path, options)
  }

  fn attach(&self, attachment: &SharedAttachmentHandle, target: &ResourceHandle) -> Result<(), ProvisioningError> {
    self.plan.attach(attachment, target)
  }
}

//! The function builder.
//!
//! A [`FunctionBuilder`] describes one function that does not exist yet.
//! Setters record configuration and return the builder for chaining; nothing
//! is provisioned until [`build`](FunctionBuilder::build) runs, either called
//! explicitly, forced by [`resource_handle`](FunctionBuilder::resource_handle),
//! or scheduled by the builder's coordinator after the first setter call.
//!
//! `build` runs at most once:
//!
//! 1. reject an empty identity (and, with strict routes, a replaced route)
//! 2. provision the function from the current identity, sizing and environment
//! 3. fetch the scope's shared router and attachment, creating them on first use
//! 4. register the route, if any, on the shared router
//! 5. apply every recorded fragment in [`FragmentKind::APPLY_ORDER`]
//!
//! A successful build caches the handle; a failed build poisons the builder.
//! Fragments applied before a failure are not rolled back.

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use super::{BuildError, Environment, HttpMethod, RouteInfo, Sizing, SizingPatch};
use crate::finalize::{Coordinator, Dispatch, Finalize};
use crate::fragment::{
  AttachmentOptions, BlobNotification, ConfigStore, Fragment, FragmentKind, PermissionGrant, QueueSubscription,
  ResourceAttachment, ScheduledRule, StreamingSource, TopicSubscription,
};
use crate::provision::{ProvisionRequest, ResourceHandle, SharedAttachmentHandle, SharedRouterHandle};
use crate::registry::ScopeId;
use crate::scope::ScopeContext;

/// Actions granted on a queue by [`FunctionBuilder::on_queue`].
pub const QUEUE_CONSUME_ACTIONS: [&str; 3] = ["sqs:ReceiveMessage", "sqs:DeleteMessage", "sqs:GetQueueAttributes"];

#[derive(Debug, Clone)]
enum Phase {
  Pending,
  Building,
  Built(ResourceHandle),
  Failed(String),
}

struct BuilderState {
  logical_id: String,
  identity: String,
  handler: Option<String>,
  sizing: Sizing,
  environment: Environment,
  route: Option<RouteInfo>,
  /// First route that a later `route(..)` call replaced.
  replaced_route: Option<RouteInfo>,
  store: ConfigStore,
  phase: Phase,
}

/// Configuration captured when a build starts, so no borrow of the builder
/// state is held while collaborators run.
struct BuildInput {
  logical_id: String,
  identity: String,
  handler: Option<String>,
  sizing: Sizing,
  environment: Environment,
  route: Option<RouteInfo>,
  replaced_route: Option<RouteInfo>,
  store: ConfigStore,
}

impl BuildInput {
  fn capture(state: &BuilderState) -> Self {
    Self {
      logical_id: state.logical_id.clone(),
      identity: state.identity.clone(),
      handler: state.handler.clone(),
      sizing: state.sizing.clone(),
      environment: state.environment.clone(),
      route: state.route.clone(),
      replaced_route: state.replaced_route.clone(),
      store: state.store.clone(),
    }
  }
}

#[derive(Default)]
struct SharedResources {
  router: Option<SharedRouterHandle>,
  attachment: Option<SharedAttachmentHandle>,
}

struct BuilderInner {
  ctx: Rc<ScopeContext>,
  coordinator: Coordinator,
  state: RefCell<BuilderState>,
}

impl BuilderInner {
  fn build(&self) -> Result<ResourceHandle, BuildError> {
    let input = {
      let mut state = self.state.borrow_mut();
      match &state.phase {
        Phase::Built(handle) => return Ok(handle.clone()),
        Phase::Building => {
          return Err(BuildError::Reentrant {
            identity: state.identity.clone(),
          });
        }
        Phase::Failed(reason) => {
          return Err(BuildError::PreviouslyFailed {
            identity: state.identity.clone(),
            reason: reason.clone(),
          });
        }
        Phase::Pending => {}
      }
      state.phase = Phase::Building;
      BuildInput::capture(&state)
    };

    debug!(
      scope = %self.ctx.id,
      identity = %input.identity,
      fragments = input.store.len(),
      "building function"
    );
    let result = self.materialize(&input);

    let mut state = self.state.borrow_mut();
    match result {
      Ok(handle) => {
        info!(identity = %handle.identity, arn = %handle.arn, "built function");
        state.phase = Phase::Built(handle.clone());
        Ok(handle)
      }
      Err(err) => {
        error!(identity = %input.identity, error = %err, "function build failed");
        state.phase = Phase::Failed(err.to_string());
        Err(err)
      }
    }
  }

  fn materialize(&self, input: &BuildInput) -> Result<ResourceHandle, BuildError> {
    if input.identity.trim().is_empty() {
      return Err(BuildError::Configuration(format!(
        "function '{}' has an empty identity",
        input.logical_id
      )));
    }
    if self.ctx.config.strict_routes
      && let (Some(previous), Some(current)) = (&input.replaced_route, &input.route)
    {
      return Err(BuildError::Configuration(format!(
        "function '{}' already has a route ({}), refusing to replace it with {}",
        input.identity, previous, current
      )));
    }

    let request = ProvisionRequest {
      identity: input.identity.clone(),
      handler: input.handler.clone(),
      sizing: input.sizing.clone(),
      environment: input.environment.clone(),
    };
    let handle = self.ctx.provisioner.provision_function(&request)?;

    let shared = self.attach_shared_resources(input);
    if let (Some(route), Some(router)) = (&input.route, &shared.router) {
      self.ctx.provisioner.register_route(router, route, &handle)?;
    }

    for fragment in input.store.in_apply_order() {
      self.apply(fragment, &handle, &shared)?;
    }
    Ok(handle)
  }

  /// Fetch the scope singletons this function needs, creating them through
  /// the registry on first use.
  fn attach_shared_resources(&self, input: &BuildInput) -> SharedResources {
    let ctx = &self.ctx;
    let mut shared = SharedResources::default();

    if input.route.is_some() {
      let Ok(router) = ctx
        .registry
        .get_or_create(&ctx.id, || Ok::<_, Infallible>(ctx.provisioner.create_shared_router(&ctx.id)));
      shared.router = Some(router);
    }

    let requested = input.store.drain(FragmentKind::ResourceAttachment);
    if let Some(Fragment::ResourceAttachment(first)) = requested.first() {
      let Ok(attachment) = ctx.registry.get_or_create(&ctx.id, || {
        Ok::<_, Infallible>(ctx.provisioner.create_shared_attachment(&ctx.id, &first.path, &first.options))
      });
      for fragment in requested {
        if let Fragment::ResourceAttachment(request) = fragment
          && request.path != attachment.path
        {
          warn!(
            scope = %ctx.id,
            identity = %input.identity,
            requested = %request.path,
            shared = %attachment.path,
            "scope already has a shared attachment, ignoring requested path"
          );
        }
      }
      shared.attachment = Some(attachment);
    }

    shared
  }

  fn apply(&self, fragment: &Fragment, target: &ResourceHandle, shared: &SharedResources) -> Result<(), BuildError> {
    let provisioner = &self.ctx.provisioner;
    debug!(identity = %target.identity, kind = %fragment.kind(), "applying fragment");
    match fragment {
      Fragment::ResourceAttachment(_) => {
        if let Some(attachment) = &shared.attachment {
          provisioner.attach(attachment, target)?;
        }
      }
      Fragment::TopicSubscription(d) => provisioner.subscribe_topic(d, target)?,
      Fragment::QueueSubscription(d) => provisioner.subscribe_queue(d, target)?,
      Fragment::BlobNotification(d) => provisioner.notify_blob(d, target)?,
      Fragment::StreamingSource(d) => provisioner.subscribe_stream(d, target)?,
      Fragment::PermissionGrant(g) => provisioner.grant_permission(target, &g.target_arn, &g.actions)?,
      Fragment::ScheduledRule(d) => provisioner.schedule_rule(d, target)?,
    }
    Ok(())
  }
}

impl Finalize for BuilderInner {
  fn finalize(&self) -> Result<(), BuildError> {
    self.coordinator.clear_scheduled();
    if !self.is_pending() {
      debug!(identity = %self.label(), "function already finalized");
      return Ok(());
    }
    self.build().map(|_| ())
  }

  fn is_pending(&self) -> bool {
    matches!(self.state.borrow().phase, Phase::Pending)
  }

  fn discard(&self) {
    self.coordinator.clear_scheduled();
  }

  fn label(&self) -> String {
    self.state.borrow().identity.clone()
  }
}

/// Chainable description of one function.
///
/// Cloning yields another handle to the same builder.
#[derive(Clone)]
pub struct FunctionBuilder {
  inner: Rc<BuilderInner>,
}

impl FunctionBuilder {
  pub(crate) fn new(ctx: Rc<ScopeContext>, logical_id: String) -> Self {
    let identity = ctx.config.identity_for(&ctx.id, &logical_id);
    debug!(scope = %ctx.id, id = %logical_id, identity = %identity, "created function builder");

    let state = BuilderState {
      logical_id,
      identity,
      handler: None,
      sizing: ctx.config.defaults.clone(),
      environment: Environment::new(),
      route: None,
      replaced_route: None,
      store: ConfigStore::new(),
      phase: Phase::Pending,
    };
    Self {
      inner: Rc::new(BuilderInner {
        coordinator: Coordinator::new(Rc::clone(&ctx.queue)),
        ctx,
        state: RefCell::new(state),
      }),
    }
  }

  fn dispatch(&self) -> Dispatch<'_> {
    self.inner.coordinator.dispatch(self.inner.clone())
  }

  /// Run `apply` against the state of an unbuilt builder inside a coordinated
  /// call. Once a build has started, configuration is ignored.
  fn configure(&self, setter: &'static str, apply: impl FnOnce(&mut BuilderState)) -> &Self {
    let _call = self.dispatch();
    {
      let mut state = self.inner.state.borrow_mut();
      if matches!(state.phase, Phase::Pending) {
        apply(&mut state);
      } else {
        debug!(identity = %state.identity, setter, "ignoring configuration of a finalized function");
      }
    }
    self
  }

  /// Override the derived identity.
  pub fn name(&self, identity: impl Into<String>) -> &Self {
    let identity = identity.into();
    self.configure("name", |state| state.identity = identity)
  }

  /// Entry point passed to the runtime, e.g. `src/orders.handler`.
  pub fn handler(&self, handler: impl Into<String>) -> &Self {
    let handler = handler.into();
    self.configure("handler", |state| state.handler = Some(handler))
  }

  /// Overwrite the sizing fields set in `patch`. Ranges are checked when the
  /// function is provisioned.
  pub fn configure_sizing(&self, patch: SizingPatch) -> &Self {
    self.configure("configure_sizing", |state| state.sizing.apply(&patch))
  }

  /// Merge `vars` into the environment. Existing keys are overwritten.
  pub fn set_environment<I, K, V>(&self, vars: I) -> &Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let vars: Vec<(String, String)> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    self.configure("set_environment", |state| state.environment.extend(vars))
  }

  /// Expose the function on the scope's shared router.
  ///
  /// A later call replaces the route. With `strict_routes` enabled the
  /// replacement is reported as a configuration error at build time instead.
  pub fn route(&self, method: HttpMethod, path: impl Into<String>) -> &Self {
    let route = RouteInfo::new(method, path);
    self.configure("route", |state| {
      if let Some(previous) = state.route.replace(route.clone()) {
        warn!(identity = %state.identity, previous = %previous, route = %route, "replacing existing route");
        state.replaced_route.get_or_insert(previous);
      }
    })
  }

  /// Record a fragment to apply at build time.
  pub fn add_trigger(&self, fragment: impl Into<Fragment>) -> &Self {
    let fragment = fragment.into();
    self.configure("add_trigger", |state| {
      debug!(identity = %state.identity, kind = %fragment.kind(), "recorded fragment");
      state.store.record(fragment);
    })
  }

  pub fn on_topic(&self, topic: impl Into<String>) -> &Self {
    self.add_trigger(TopicSubscription {
      topic: topic.into(),
      filter_policy: None,
    })
  }

  /// Consume `subscription.queue`, and grant the function the actions needed
  /// to do so.
  pub fn on_queue(&self, subscription: QueueSubscription) -> &Self {
    let _call = self.dispatch();
    let queue_arn = self.queue_arn(&subscription.queue);
    self.add_trigger(subscription);
    self.grant(queue_arn, QUEUE_CONSUME_ACTIONS);
    self
  }

  pub fn on_bucket(&self, notification: BlobNotification) -> &Self {
    self.add_trigger(notification)
  }

  /// Invoke the function on a `rate(..)` or `cron(..)` expression.
  pub fn on_schedule(&self, expression: impl Into<String>) -> &Self {
    self.add_trigger(ScheduledRule::new(expression))
  }

  pub fn on_stream(&self, source: StreamingSource) -> &Self {
    self.add_trigger(source)
  }

  pub fn grant<I, S>(&self, target_arn: impl Into<String>, actions: I) -> &Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.add_trigger(PermissionGrant::new(target_arn, actions))
  }

  /// Attach the scope's shared bundle, created from `path` by the first
  /// function that asks for it.
  pub fn attach(&self, path: impl Into<String>, options: AttachmentOptions) -> &Self {
    self.add_trigger(ResourceAttachment {
      path: path.into(),
      options,
    })
  }

  /// Provision the function and apply its configuration. Idempotent: later
  /// calls return the first call's handle without side effects.
  pub fn build(&self) -> Result<ResourceHandle, BuildError> {
    self.inner.build()
  }

  /// The function's handle, building it first if needed.
  pub fn resource_handle(&self) -> Result<ResourceHandle, BuildError> {
    self.inner.build()
  }

  fn queue_arn(&self, queue: &str) -> String {
    if queue.starts_with("arn:") {
      return queue.to_string();
    }
    let config = &self.inner.ctx.config;
    format!("arn:aws:sqs:{}:{}:{}", config.region, config.account, queue)
  }

  pub fn logical_id(&self) -> String {
    self.inner.state.borrow().logical_id.clone()
  }

  pub fn identity(&self) -> String {
    self.inner.state.borrow().identity.clone()
  }

  pub fn scope(&self) -> ScopeId {
    self.inner.ctx.id.clone()
  }

  pub fn current_handler(&self) -> Option<String> {
    self.inner.state.borrow().handler.clone()
  }

  pub fn sizing(&self) -> Sizing {
    self.inner.state.borrow().sizing.clone()
  }

  pub fn environment(&self) -> Environment {
    self.inner.state.borrow().environment.clone()
  }

  pub fn route_info(&self) -> Option<RouteInfo> {
    self.inner.state.borrow().route.clone()
  }

  pub fn fragment_count(&self, kind: FragmentKind) -> usize {
    self.inner.state.borrow().store.count(kind)
  }

  pub fn is_built(&self) -> bool {
    matches!(self.inner.state.borrow().phase, Phase::Built(_))
  }

  /// The error message of the failed build, if the builder is poisoned.
  pub fn failure(&self) -> Option<String> {
    match &self.inner.state.borrow().phase {
      Phase::Failed(reason) => Some(reason.clone()),
      _ => None,
    }
  }

  /// Whether a finalize for this builder is waiting in the queue.
  pub fn is_scheduled(&self) -> bool {
    self.inner.coordinator.is_scheduled()
  }
}

impl fmt::Debug for FunctionBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.inner.state.borrow();
    f.debug_struct("FunctionBuilder")
      .field("scope", &self.inner.ctx.id)
      .field("identity", &state.identity)
      .field("phase", &state.phase)
      .finish()
  }
}

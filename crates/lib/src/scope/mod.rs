//! Apps and deployment scopes.
//!
//! An [`App`] owns everything builders share: the deployment configuration,
//! the [`SingletonRegistry`], the [`FinalizeQueue`] and the [`Provisioner`].
//! A [`DeploymentScope`] is a named slice of an app; functions created
//! through the same scope id share one router and one attachment.
//!
//! ```ignore
//! let app = App::new(DeployConfig::default(), Rc::new(PlanProvisioner::new(&config)));
//! let api = app.scope("api");
//! api.function("list").route(HttpMethod::Get, "/items");
//! api.function("create").route(HttpMethod::Post, "/items");
//! app.run_pending()?; // both functions built, one router
//! ```

pub mod lua;

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::DeployConfig;
use crate::consts::DEFAULT_SCOPE;
use crate::finalize::FinalizeQueue;
use crate::function::{BuildError, FunctionBuilder};
use crate::provision::{Provisioner, SharedAttachmentHandle, SharedRouterHandle};
use crate::registry::{ScopeId, SingletonRegistry};

/// State every builder of a scope holds on to.
pub(crate) struct ScopeContext {
  pub(crate) id: ScopeId,
  pub(crate) config: Rc<DeployConfig>,
  pub(crate) registry: Rc<SingletonRegistry>,
  pub(crate) queue: Rc<FinalizeQueue>,
  pub(crate) provisioner: Rc<dyn Provisioner>,
}

pub struct App {
  config: Rc<DeployConfig>,
  registry: Rc<SingletonRegistry>,
  queue: Rc<FinalizeQueue>,
  provisioner: Rc<dyn Provisioner>,
}

impl App {
  pub fn new(config: DeployConfig, provisioner: Rc<dyn Provisioner>) -> Self {
    debug!(app = %config.app, stage = %config.stage, region = %config.region, "created app");
    Self {
      config: Rc::new(config),
      registry: Rc::new(SingletonRegistry::new()),
      queue: Rc::new(FinalizeQueue::new()),
      provisioner,
    }
  }

  pub fn config(&self) -> &DeployConfig {
    &self.config
  }

  pub fn registry(&self) -> &SingletonRegistry {
    &self.registry
  }

  pub fn queue(&self) -> &FinalizeQueue {
    &self.queue
  }

  /// The scope named `id`. Scopes with equal ids share singletons.
  pub fn scope(&self, id: impl Into<String>) -> DeploymentScope {
    DeploymentScope {
      ctx: Rc::new(ScopeContext {
        id: ScopeId::new(id),
        config: Rc::clone(&self.config),
        registry: Rc::clone(&self.registry),
        queue: Rc::clone(&self.queue),
        provisioner: Rc::clone(&self.provisioner),
      }),
    }
  }

  pub fn default_scope(&self) -> DeploymentScope {
    self.scope(DEFAULT_SCOPE)
  }

  /// A new function builder in the default scope.
  pub fn function(&self, logical_id: impl Into<String>) -> FunctionBuilder {
    self.default_scope().function(logical_id)
  }

  /// Run every scheduled finalize. This is the end-of-turn barrier: call it
  /// once the current batch of configuration calls is complete.
  pub fn run_pending(&self) -> Result<usize, BuildError> {
    self.queue.run_pending()
  }

  /// Drop scheduled finalizes without running them, e.g. after the
  /// configuring script failed.
  pub fn discard_pending(&self) -> usize {
    let dropped = self.queue.clear();
    if dropped > 0 {
      warn!(dropped, "discarded scheduled finalizes");
    }
    dropped
  }
}

#[derive(Clone)]
pub struct DeploymentScope {
  ctx: Rc<ScopeContext>,
}

impl DeploymentScope {
  pub fn id(&self) -> &ScopeId {
    &self.ctx.id
  }

  pub fn function(&self, logical_id: impl Into<String>) -> FunctionBuilder {
    FunctionBuilder::new(Rc::clone(&self.ctx), logical_id.into())
  }

  /// The scope's shared router, once some function has created it.
  pub fn router(&self) -> Option<SharedRouterHandle> {
    self.ctx.registry.get(&self.ctx.id)
  }

  /// The scope's shared attachment, once some function has created it.
  pub fn attachment(&self) -> Option<SharedAttachmentHandle> {
    self.ctx.registry.get(&self.ctx.id)
  }
}

impl std::fmt::Debug for DeploymentScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DeploymentScope").field("id", &self.ctx.id).finish()
  }
}

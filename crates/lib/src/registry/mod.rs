//! Per-scope singletons shared between function builders.
//!
//! Every function routed within a deployment scope shares one HTTP router, and
//! every function that asks for the scope's shared library bundle receives the
//! same attachment. The [`SingletonRegistry`] is the only place those shared
//! resources are created: the first builder that needs one creates it through
//! a factory, every later builder of the same scope reuses it.
//!
//! The registry is an ordinary value threaded through the [`App`](crate::scope::App)
//! and held by every builder, not process-global state. Builders run on one
//! thread and finalize one at a time, so a `RefCell` is sufficient.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::provision::{SharedAttachmentHandle, SharedRouterHandle};

/// Identifier of a deployment scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }
}

impl fmt::Display for ScopeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Tag distinguishing the kinds of shared resource a scope can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedKind {
  Router,
  Attachment,
}

impl fmt::Display for SharedKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SharedKind::Router => f.write_str("router"),
      SharedKind::Attachment => f.write_str("attachment"),
    }
  }
}

/// A stored shared resource handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedHandle {
  Router(SharedRouterHandle),
  Attachment(SharedAttachmentHandle),
}

/// A handle type that can live in the registry.
pub trait SharedResource: Sized + Clone {
  const KIND: SharedKind;

  fn into_shared(self) -> SharedHandle;

  fn from_shared(handle: &SharedHandle) -> Option<Self>;
}

impl SharedResource for SharedRouterHandle {
  const KIND: SharedKind = SharedKind::Router;

  fn into_shared(self) -> SharedHandle {
    SharedHandle::Router(self)
  }

  fn from_shared(handle: &SharedHandle) -> Option<Self> {
    match handle {
      SharedHandle::Router(router) => Some(router.clone()),
      _ => None,
    }
  }
}

impl SharedResource for SharedAttachmentHandle {
  const KIND: SharedKind = SharedKind::Attachment;

  fn into_shared(self) -> SharedHandle {
    SharedHandle::Attachment(self)
  }

  fn from_shared(handle: &SharedHandle) -> Option<Self> {
    match handle {
      SharedHandle::Attachment(attachment) => Some(attachment.clone()),
      _ => None,
    }
  }
}

/// Map from `(scope, kind)` to at most one shared resource handle.
///
/// Entries are created lazily and never removed; they live as long as the
/// registry, which lives as long as the app.
#[derive(Debug, Default)]
pub struct SingletonRegistry {
  entries: RefCell<BTreeMap<(ScopeId, SharedKind), SharedHandle>>,
}

impl SingletonRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the `T` registered for `scope`, creating it with `factory` on the
  /// first request.
  ///
  /// `factory` runs at most once per `(scope, T::KIND)`. No borrow is held
  /// while it runs; if the factory itself registers an entry for the same
  /// key, that entry wins and the factory's result is discarded.
  pub fn get_or_create<T, E, F>(&self, scope: &ScopeId, factory: F) -> Result<T, E>
  where
    T: SharedResource,
    F: FnOnce() -> Result<T, E>,
  {
    if let Some(existing) = self.get::<T>(scope) {
      debug!(scope = %scope, kind = %T::KIND, "reusing shared resource");
      return Ok(existing);
    }

    let created = factory()?;

    match self.entries.borrow_mut().entry((scope.clone(), T::KIND)) {
      Entry::Vacant(slot) => {
        slot.insert(created.clone().into_shared());
        info!(scope = %scope, kind = %T::KIND, "registered shared resource");
        Ok(created)
      }
      Entry::Occupied(slot) => {
        debug!(scope = %scope, kind = %T::KIND, "registered during creation, discarding new resource");
        Ok(T::from_shared(slot.get()).unwrap_or(created))
      }
    }
  }

  /// The `T` registered for `scope`, if one has been created.
  pub fn get<T: SharedResource>(&self, scope: &ScopeId) -> Option<T> {
    self
      .entries
      .borrow()
      .get(&(scope.clone(), T::KIND))
      .and_then(T::from_shared)
  }

  pub fn contains(&self, scope: &ScopeId, kind: SharedKind) -> bool {
    self.entries.borrow().contains_key(&(scope.clone(), kind))
  }

  pub fn len(&self) -> usize {
    self.entries.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.borrow().is_empty()
  }
}

//! Deferred finalization.
//!
//! Callers configure function builders through chains of setter calls and
//! are never required to call `build()` themselves. Each outermost setter call
//! asks the builder's [`Coordinator`] to schedule a finalize; the first such
//! request for an unbuilt builder pushes it onto the app-wide
//! [`FinalizeQueue`]. The queue is drained once the current synchronous turn
//! of configuration work is over (for stack scripts: after the script
//! returns), and each queued finalize runs `build()`.
//!
//! Because `build()` is idempotent, an explicit `build()` before the drain
//! turns the queued finalize into a no-op.
//!
//! # Re-entrancy
//!
//! A setter that calls other setters (e.g. `on_queue` also records a grant)
//! must schedule once, not once per nested call. [`Coordinator::dispatch`]
//! tracks call depth; only the outermost [`Dispatch`] schedules when dropped.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info};

use crate::function::BuildError;

/// Something the queue can finalize.
pub trait Finalize {
  /// Run the deferred build. A no-op unless still pending.
  fn finalize(&self) -> Result<(), BuildError>;

  /// No build has started yet. Only pending targets are scheduled.
  fn is_pending(&self) -> bool;

  /// The queue dropped this target's finalize without running it.
  fn discard(&self);

  /// Name used in logs.
  fn label(&self) -> String;
}

/// App-wide queue of pending finalizes, drained at the end of a turn.
#[derive(Default)]
pub struct FinalizeQueue {
  pending: RefCell<VecDeque<Rc<dyn Finalize>>>,
  requests: Cell<usize>,
  completed: Cell<usize>,
}

impl FinalizeQueue {
  pub fn new() -> Self {
    Self::default()
  }

  fn push(&self, target: Rc<dyn Finalize>) {
    debug!(target = %target.label(), "scheduled finalize");
    self.pending.borrow_mut().push_back(target);
  }

  /// Run every pending finalize in scheduling order.
  ///
  /// Returns the number of finalizes run. The first error stops the drain and
  /// is returned; finalizes behind it stay queued for the next drain.
  pub fn run_pending(&self) -> Result<usize, BuildError> {
    let mut ran = 0;
    loop {
      // Release the borrow before finalizing; builds may schedule more work.
      let next = self.pending.borrow_mut().pop_front();
      let Some(target) = next else {
        break;
      };
      target.finalize()?;
      ran += 1;
      self.completed.set(self.completed.get() + 1);
    }
    if ran > 0 {
      info!(finalized = ran, "drained finalize queue");
    }
    Ok(ran)
  }

  /// Drop every pending finalize without running it. Dropped targets may be
  /// scheduled again by their next configuration call.
  pub fn clear(&self) -> usize {
    let dropped: Vec<_> = self.pending.borrow_mut().drain(..).collect();
    for target in &dropped {
      target.discard();
    }
    dropped.len()
  }

  pub fn len(&self) -> usize {
    self.pending.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.borrow().is_empty()
  }

  /// Outermost schedule requests received, including deduplicated ones.
  pub fn requests(&self) -> usize {
    self.requests.get()
  }

  /// Finalizes run to completion by [`run_pending`](Self::run_pending).
  pub fn completed(&self) -> usize {
    self.completed.get()
  }
}

/// Per-builder dispatch state: call depth and whether a finalize is queued.
pub struct Coordinator {
  depth: Cell<u32>,
  scheduled: Cell<bool>,
  queue: Rc<FinalizeQueue>,
}

impl Coordinator {
  pub fn new(queue: Rc<FinalizeQueue>) -> Self {
    Self {
      depth: Cell::new(0),
      scheduled: Cell::new(false),
      queue,
    }
  }

  /// Enter a chainable call on `target`. Scheduling happens when the returned
  /// guard is dropped.
  pub fn dispatch(&self, target: Rc<dyn Finalize>) -> Dispatch<'_> {
    self.depth.set(self.depth.get() + 1);
    Dispatch {
      coordinator: self,
      target,
    }
  }

  /// Forget the queued finalize; called when it starts running or is
  /// discarded.
  pub fn clear_scheduled(&self) {
    self.scheduled.set(false);
  }

  pub fn is_scheduled(&self) -> bool {
    self.scheduled.get()
  }

  pub fn depth(&self) -> u32 {
    self.depth.get()
  }

  fn leave(&self, target: &Rc<dyn Finalize>) {
    let depth = self.depth.get().saturating_sub(1);
    self.depth.set(depth);
    if depth > 0 || !target.is_pending() {
      return;
    }

    self.queue.requests.set(self.queue.requests.get() + 1);
    if self.scheduled.replace(true) {
      return;
    }
    self.queue.push(Rc::clone(target));
  }
}

/// Guard for one chainable call. See [`Coordinator::dispatch`].
pub struct Dispatch<'a> {
  coordinator: &'a Coordinator,
  target: Rc<dyn Finalize>,
}

impl Drop for Dispatch<'_> {
  fn drop(&mut self) {
    self.coordinator.leave(&self.target);
  }
}

//! Append-only store of configuration fragments.

use std::collections::BTreeMap;

use super::{Fragment, FragmentKind};

/// Per-builder accumulator of configuration fragments.
///
/// Fragments are grouped by kind and keep their insertion order within a
/// kind. Nothing is ever removed or mutated once recorded; `build` reads each
/// kind once through [`drain`](Self::drain).
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
  fragments: BTreeMap<FragmentKind, Vec<Fragment>>,
}

impl ConfigStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, fragment: Fragment) {
    self.fragments.entry(fragment.kind()).or_default().push(fragment);
  }

  /// The recorded fragments of `kind`, in insertion order.
  pub fn drain(&self, kind: FragmentKind) -> &[Fragment] {
    self.fragments.get(&kind).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Every fragment, kind by kind in [`FragmentKind::APPLY_ORDER`].
  pub fn in_apply_order(&self) -> impl Iterator<Item = &Fragment> {
    FragmentKind::APPLY_ORDER.into_iter().flat_map(|kind| self.drain(kind))
  }

  pub fn count(&self, kind: FragmentKind) -> usize {
    self.drain(kind).len()
  }

  pub fn len(&self) -> usize {
    self.fragments.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

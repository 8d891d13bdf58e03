use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::function::Runtime;

/// The kind of a configuration fragment.
///
/// The declaration order is the order in which `build` applies fragments, see
/// [`FragmentKind::APPLY_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
  ResourceAttachment,
  TopicSubscription,
  QueueSubscription,
  BlobNotification,
  StreamingSource,
  PermissionGrant,
  ScheduledRule,
}

impl FragmentKind {
  /// Application order used by `build`.
  ///
  /// Attachments change the function itself and come first. Event sources are
  /// wired before grants, which often name a source subscribed just before.
  /// Scheduled rules come last.
  pub const APPLY_ORDER: [FragmentKind; 7] = [
    FragmentKind::ResourceAttachment,
    FragmentKind::TopicSubscription,
    FragmentKind::QueueSubscription,
    FragmentKind::BlobNotification,
    FragmentKind::StreamingSource,
    FragmentKind::PermissionGrant,
    FragmentKind::ScheduledRule,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      FragmentKind::ResourceAttachment => "resource-attachment",
      FragmentKind::TopicSubscription => "topic-subscription",
      FragmentKind::QueueSubscription => "queue-subscription",
      FragmentKind::BlobNotification => "blob-notification",
      FragmentKind::StreamingSource => "streaming-source",
      FragmentKind::PermissionGrant => "permission-grant",
      FragmentKind::ScheduledRule => "scheduled-rule",
    }
  }
}

impl fmt::Display for FragmentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FragmentKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    FragmentKind::APPLY_ORDER
      .into_iter()
      .find(|k| k.as_str() == s)
      .ok_or_else(|| format!("unknown trigger kind '{}'", s))
  }
}

/// Subscribe the function to a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSubscription {
  pub topic: String,
  #[serde(default)]
  pub filter_policy: Option<BTreeMap<String, Vec<String>>>,
}

/// Consume messages from a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSubscription {
  pub queue: String,
  #[serde(default)]
  pub batch_size: Option<u32>,
}

/// Invoke the function on object events in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobNotification {
  pub bucket: String,
  #[serde(default = "default_blob_events")]
  pub events: Vec<String>,
  #[serde(default)]
  pub prefix: Option<String>,
  #[serde(default)]
  pub suffix: Option<String>,
}

fn default_blob_events() -> Vec<String> {
  vec!["s3:ObjectCreated:*".to_string()]
}

impl BlobNotification {
  /// Notify on object creation anywhere in `bucket`.
  pub fn new(bucket: impl Into<String>) -> Self {
    Self {
      bucket: bucket.into(),
      events: default_blob_events(),
      prefix: None,
      suffix: None,
    }
  }
}

/// Invoke the function on a `rate(..)` or `cron(..)` schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRule {
  pub expression: String,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
}

fn default_enabled() -> bool {
  true
}

impl ScheduledRule {
  pub fn new(expression: impl Into<String>) -> Self {
    Self {
      expression: expression.into(),
      enabled: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingPosition {
  #[default]
  Latest,
  TrimHorizon,
}

/// Consume records from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingSource {
  pub stream: String,
  #[serde(default)]
  pub starting_position: StartingPosition,
  #[serde(default)]
  pub batch_size: Option<u32>,
}

/// Allow the function to perform `actions` on `target_arn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
  pub target_arn: String,
  pub actions: Vec<String>,
}

impl PermissionGrant {
  pub fn new<I, S>(target_arn: impl Into<String>, actions: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      target_arn: target_arn.into(),
      actions: actions.into_iter().map(Into::into).collect(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentOptions {
  pub compatible_runtimes: Vec<Runtime>,
  pub description: Option<String>,
}

/// Attach the scope's shared library bundle, created from `path` on first use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttachment {
  pub path: String,
  #[serde(default)]
  pub options: AttachmentOptions,
}

/// One unit of deferred configuration, recorded before the function exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Fragment {
  ResourceAttachment(ResourceAttachment),
  TopicSubscription(TopicSubscription),
  QueueSubscription(QueueSubscription),
  BlobNotification(BlobNotification),
  StreamingSource(StreamingSource),
  PermissionGrant(PermissionGrant),
  ScheduledRule(ScheduledRule),
}

impl Fragment {
  pub fn kind(&self) -> FragmentKind {
    match self {
      Fragment::ResourceAttachment(_) => FragmentKind::ResourceAttachment,
      Fragment::TopicSubscription(_) => FragmentKind::TopicSubscription,
      Fragment::QueueSubscription(_) => FragmentKind::QueueSubscription,
      Fragment::BlobNotification(_) => FragmentKind::BlobNotification,
      Fragment::StreamingSource(_) => FragmentKind::StreamingSource,
      Fragment::PermissionGrant(_) => FragmentKind::PermissionGrant,
      Fragment::ScheduledRule(_) => FragmentKind::ScheduledRule,
    }
  }

  /// Build a fragment from a kind tag and an untyped descriptor.
  pub fn from_descriptor(kind: FragmentKind, descriptor: serde_json::Value) -> Result<Self, serde_json::Error> {
    Ok(match kind {
      FragmentKind::ResourceAttachment => Fragment::ResourceAttachment(serde_json::from_value(descriptor)?),
      FragmentKind::TopicSubscription => Fragment::TopicSubscription(serde_json::from_value(descriptor)?),
      FragmentKind::QueueSubscription => Fragment::QueueSubscription(serde_json::from_value(descriptor)?),
      FragmentKind::BlobNotification => Fragment::BlobNotification(serde_json::from_value(descriptor)?),
      FragmentKind::StreamingSource => Fragment::StreamingSource(serde_json::from_value(descriptor)?),
      FragmentKind::PermissionGrant => Fragment::PermissionGrant(serde_json::from_value(descriptor)?),
      FragmentKind::ScheduledRule => Fragment::ScheduledRule(serde_json::from_value(descriptor)?),
    })
  }
}

macro_rules! impl_from_descriptor {
  ($($ty:ident),* $(,)?) => {
    $(
      impl From<$ty> for Fragment {
        fn from(descriptor: $ty) -> Self {
          Fragment::$ty(descriptor)
        }
      }
    )*
  };
}

impl_from_descriptor!(
  ResourceAttachment,
  TopicSubscription,
  QueueSubscription,
  BlobNotification,
  StreamingSource,
  PermissionGrant,
  ScheduledRule,
);

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn kind_names_roundtrip() {
    for kind in FragmentKind::APPLY_ORDER {
      assert_eq!(kind.as_str().parse::<FragmentKind>().unwrap(), kind);
    }
    assert!("route".parse::<FragmentKind>().is_err());
  }

  #[test]
  fn apply_order_matches_declaration_order() {
    let mut sorted = FragmentKind::APPLY_ORDER;
    sorted.sort();
    assert_eq!(sorted, FragmentKind::APPLY_ORDER);
  }

  #[test]
  fn subscriptions_precede_grants_precede_schedules() {
    let pos = |k: FragmentKind| FragmentKind::APPLY_ORDER.iter().position(|x| *x == k).unwrap();
    let grant = pos(FragmentKind::PermissionGrant);
    for sub in [
      FragmentKind::TopicSubscription,
      FragmentKind::QueueSubscription,
      FragmentKind::BlobNotification,
      FragmentKind::StreamingSource,
    ] {
      assert!(pos(sub) < grant);
    }
    assert!(grant < pos(FragmentKind::ScheduledRule));
  }

  #[test]
  fn descriptor_defaults_are_filled_in() {
    let blob = Fragment::from_descriptor(FragmentKind::BlobNotification, json!({ "bucket": "uploads" })).unwrap();
    match blob {
      Fragment::BlobNotification(b) => {
        assert_eq!(b.events, vec!["s3:ObjectCreated:*".to_string()]);
        assert_eq!(b.prefix, None);
      }
      other => panic!("expected blob notification, got {:?}", other),
    }

    let rule = Fragment::from_descriptor(FragmentKind::ScheduledRule, json!({ "expression": "rate(1 hour)" })).unwrap();
    assert_eq!(rule, Fragment::ScheduledRule(ScheduledRule::new("rate(1 hour)")));
  }

  #[test]
  fn descriptor_missing_required_field_fails() {
    let result = Fragment::from_descriptor(FragmentKind::QueueSubscription, json!({ "batch_size": 5 }));
    assert!(result.is_err());
  }

  #[test]
  fn from_descriptor_type_sets_kind() {
    let fragment: Fragment = PermissionGrant::new("arn:aws:s3:::bucket", ["s3:GetObject"]).into();
    assert_eq!(fragment.kind(), FragmentKind::PermissionGrant);
  }
}

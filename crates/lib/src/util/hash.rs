//! Content-addressed identifiers.
//!
//! Handles returned by the plan provisioner and the deployment plan itself are
//! identified by a truncated SHA-256 of their JSON serialization. Identical
//! provisioning requests therefore always yield identical identifiers, which
//! keeps plans reproducible across runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content-addressed hash identifying a unique object.
///
/// The hash is a 20-character truncated SHA-256 of the JSON-serialized value,
/// as a lowercase hexadecimal string (e.g. `"a1b2c3d4e5f6789012ab"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl ObjectHash {
  /// First `len` characters of the hash, for use in generated names.
  pub fn short(&self, len: usize) -> &str {
    &self.0[..len.min(self.0.len())]
  }
}

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(hash_str(&serialized))
  }
}

/// Hash an arbitrary string into an [`ObjectHash`].
pub fn hash_str(value: &str) -> ObjectHash {
  let mut hasher = Sha256::new();
  hasher.update(value.as_bytes());
  let full = format!("{:x}", hasher.finalize());
  ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string())
}

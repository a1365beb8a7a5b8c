//! Hardware fingerprint
//!
//! An order-independent summary of the top-level hardware set. Two enumerations
//! of the same devices produce equal fingerprints regardless of ordering.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::tree::HardwareNode;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Build from top-level nodes as sorted `kind:name:id` fragments joined by `|`
    pub fn from_nodes(nodes: &[HardwareNode]) -> Self {
        let mut parts: Vec<String> = nodes
            .iter()
            .map(|n| format!("{}:{}:{}", n.kind, n.name, n.id))
            .collect();
        parts.sort();
        Self(parts.join("|"))
    }

    /// Wrap a stored fingerprint string
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 hex digest for logs and reports
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        hash.iter().take(8).map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

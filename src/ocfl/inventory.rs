//! A trimmed OCFL inventory: enough structure to round-trip `inventory.json`,
//! classify candidates against the HEAD version's state, and grow a new version.
//!
//! Grounded in `rocfl`'s `ocfl::inventory::Inventory`/`Version`, stripped of
//! everything this pipeline never needs (multi-algorithm digests, fixity blocks,
//! mutable-head support, glob-based path resolution).

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::consts::{DEFAULT_CONTENT_DIR, INVENTORY_TYPE};
use super::digest::HexDigest;
use crate::error::{ReplicatorError, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: String,
    #[serde(rename = "type")]
    pub type_declaration: String,
    pub digest_algorithm: String,
    pub head: u32,
    pub content_directory: String,
    /// digest -> content paths (relative to object root) holding that content.
    pub manifest: BTreeMap<String, Vec<String>>,
    pub versions: BTreeMap<String, Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub created: DateTime<Local>,
    /// digest -> logical paths holding that content in this version.
    pub state: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Inventory {
    pub fn new(object_id: &str) -> Self {
        Inventory {
            id: object_id.to_string(),
            type_declaration: INVENTORY_TYPE.to_string(),
            digest_algorithm: "sha256".to_string(),
            head: 0,
            content_directory: DEFAULT_CONTENT_DIR.to_string(),
            manifest: BTreeMap::new(),
            versions: BTreeMap::new(),
        }
    }

    pub fn head_version_name(&self) -> String {
        format!("v{}", self.head)
    }

    pub fn head_version(&self) -> Option<&Version> {
        self.versions.get(&self.head_version_name())
    }

    /// Looks up the digest currently stored at `logical_path` in the HEAD version.
    pub fn head_digest_for(&self, logical_path: &str) -> Option<&str> {
        let head = self.head_version()?;
        for (digest, paths) in &head.state {
            if paths.iter().any(|p| p == logical_path) {
                return Some(digest.as_str());
            }
        }
        None
    }

    /// Resolves an existing content path for `digest`, if this object already stores
    /// that content anywhere (enables OCFL's cross-version content dedup).
    pub fn existing_content_path(&self, digest: &HexDigest) -> Option<&str> {
        self.manifest
            .get(digest.as_str())
            .and_then(|paths| paths.first())
            .map(|s| s.as_str())
    }

    /// Begins a new HEAD version by cloning the previous version's state forward.
    /// No-op (and returns the existing head) if the object has no versions yet --
    /// callers create version 1 directly via `new`/`head=1`.
    pub fn start_next_version(&mut self) -> Result<()> {
        let previous_state = self.head_version().map(|v| v.state.clone());
        self.head += 1;
        self.versions.insert(
            self.head_version_name(),
            Version {
                created: Local::now(),
                state: previous_state.unwrap_or_default(),
                message: None,
            },
        );
        Ok(())
    }

    /// Records that `logical_path` now holds `content_path`'s content, identified by
    /// `digest`. Overwrites any prior entry for the same logical path within HEAD.
    pub fn put_file(&mut self, logical_path: &str, content_path: &str, digest: &HexDigest) -> Result<()> {
        let digest_str = digest.as_str().to_string();

        let head_name = self.head_version_name();
        let head = self
            .versions
            .get_mut(&head_name)
            .ok_or_else(|| ReplicatorError::Storage("inventory has no open head version".into()))?;

        for paths in head.state.values_mut() {
            paths.retain(|p| p != logical_path);
        }
        head.state.retain(|_, paths| !paths.is_empty());
        head.state
            .entry(digest_str.clone())
            .or_default()
            .push(logical_path.to_string());

        self.manifest
            .entry(digest_str)
            .or_default()
            .iter()
            .find(|p| p.as_str() == content_path)
            .is_none()
            .then(|| {
                self.manifest
                    .get_mut(digest.as_str())
                    .unwrap()
                    .push(content_path.to_string())
            });

        Ok(())
    }
}

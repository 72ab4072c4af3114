//! The local tracking directory
//!
//! A hidden `.stitch/` root beside the tracked content holds everything the
//! engine persists between runs: the tracking record (which node this tree
//! belongs to), the tool config, and the per-asset etag tokens. Nothing in
//! here is meant to be hand-edited except the config file.
//!
//! All writes go through `atomic_write` (tempfile + rename) so a crashed run
//! never leaves a half-written record behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StitchError, StitchResult};
use crate::models::{EntityClass, EntityKey, FragmentType};

/// Name of the hidden tracking directory
pub const TRACKING_DIR: &str = ".stitch";

/// Tracking record file inside the tracking directory
pub const TRACKING_FILE: &str = "tracking.json";

/// Tool config file inside the tracking directory
pub const CONFIG_FILE: &str = "config.toml";

/// Tracking directory for a content root
pub fn tracking_dir(root: &Path) -> PathBuf {
    root.join(TRACKING_DIR)
}

/// Record tying a tracked tree to one remote node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Node identity this tree was pulled from / pushes to
    pub node: String,

    /// Server version recorded for that node
    pub server_version: String,

    /// When the last push against this node settled
    #[serde(default)]
    pub last_push: Option<DateTime<Utc>>,
}

impl TrackingRecord {
    pub fn new(node: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            server_version: server_version.into(),
            last_push: None,
        }
    }

    /// Load the record for `root`, failing when the tree is not tracked
    pub fn load(root: &Path) -> StitchResult<Self> {
        let path = tracking_dir(root).join(TRACKING_FILE);
        if !path.is_file() {
            return Err(StitchError::UntrackedRoot {
                path: root.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the record for `root`
    pub fn save(&self, root: &Path) -> StitchResult<()> {
        let dir = tracking_dir(root);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(&dir.join(TRACKING_FILE), json.as_bytes())
    }
}

/// Walk up from `start` to find the tracked content root
pub fn find_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() { start } else { start.parent()? };
    loop {
        if tracking_dir(current).join(TRACKING_FILE).is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Whether a recorded server version is push-compatible with a target version
///
/// Transfer mode swaps the node-identity check for this: same major version
/// is compatible, anything else is not.
pub fn versions_compatible(recorded: &str, requested: &str) -> bool {
    major(recorded).is_some() && major(recorded) == major(requested)
}

fn major(version: &str) -> Option<&str> {
    version.split('.').next().filter(|m| !m.is_empty())
}

/// Write content to a file atomically
///
/// Uses tempfile + rename so readers never observe a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> StitchResult<()> {
    let parent = path.parent().ok_or_else(|| {
        StitchError::Io(std::io::Error::other(format!(
            "no parent directory for {}",
            path.display()
        )))
    })?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.persist(path)
        .map_err(|e| StitchError::Io(e.error))?;
    Ok(())
}

/// Local metadata of one entity directory
///
/// The internal fields the server owns plus the user-editable display name.
/// Read synchronously during bucketing so the new-vs-existing decision is
/// made against a single snapshot, before any network dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMeta {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,

    /// Subtype tag; for fragments this drives creation order
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
}

impl LocalMeta {
    /// Natural key for resolving this entity within `class`
    pub fn key(&self, class: EntityClass) -> EntityKey {
        if class.versioned() {
            match &self.version {
                Some(v) => EntityKey::versioned(&self.name, v),
                None => EntityKey::new(&self.name),
            }
        } else {
            EntityKey::new(&self.name)
        }
    }

    /// Fragment type parsed from the subtype tag
    pub fn fragment_type(&self) -> Option<FragmentType> {
        self.entity_type.as_deref().and_then(FragmentType::parse)
    }
}

/// Read the metadata file of an entity directory
pub fn read_meta(dir: &Path, class: EntityClass) -> StitchResult<LocalMeta> {
    let path = dir.join(class.meta_file());
    if !path.is_file() {
        return Err(StitchError::MissingMetadata {
            dir: dir.to_path_buf(),
            file: class.meta_file().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Fold a server-normalized display name back into a local metadata file
///
/// Runs after an accepted metadata push: the server may normalize the
/// user-editable display name, and the local copy should agree with it.
pub fn reconcile_display(meta_path: &Path, display_name: &str) -> StitchResult<()> {
    let content = std::fs::read_to_string(meta_path)?;
    let mut value: serde_json::Value = serde_json::from_str(&content)?;
    let Some(object) = value.as_object_mut() else {
        return Ok(());
    };
    if object.get("displayName").and_then(|v| v.as_str()) == Some(display_name) {
        return Ok(());
    }
    object.insert(
        "displayName".to_string(),
        serde_json::Value::String(display_name.to_string()),
    );
    let json = serde_json::to_string_pretty(&value)?;
    atomic_write(meta_path, json.as_bytes())
}

//! Per-asset optimistic-concurrency tokens
//!
//! Every tracked asset carries one token per remote node, stored beside the
//! tracked content under the tracking directory:
//!
//! ```text
//! .stitch/<relative parent>/<file name>_<node>.etag
//! ```
//!
//! The node identity is part of the file name, so pushing the same local tree
//! to two different servers never makes their tokens collide. Tokens are only
//! ever written by the put-result processor; a conflict leaves the stored
//! token untouched, and a reset marks an entity as freshly (re)created so the
//! next push of its content cannot trip over a stale token.

use std::path::{Path, PathBuf};

use crate::error::{StitchError, StitchResult};
use crate::tracking::{self, atomic_write};

/// Token store for one (content root, node) pair
#[derive(Debug, Clone)]
pub struct EtagStore {
    root: PathBuf,
    node: String,
}

impl EtagStore {
    /// Create a store for `root` against `node`
    ///
    /// The node identity is sanitized into a file-name-safe form.
    pub fn new(root: impl Into<PathBuf>, node: &str) -> Self {
        Self {
            root: root.into(),
            node: sanitize_node(node),
        }
    }

    /// Read the token for an asset; empty string when absent
    pub fn read(&self, asset: &Path) -> String {
        let Ok(path) = self.token_path(asset) else {
            return String::new();
        };
        std::fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    /// Store a token for an asset, replacing any previous one
    pub fn write(&self, asset: &Path, token: &str) -> StitchResult<()> {
        let path = self.token_path(asset)?;
        atomic_write(&path, token.as_bytes())
    }

    /// Delete the token for an asset; a subsequent read yields absent
    pub fn reset(&self, asset: &Path) -> StitchResult<()> {
        let path = self.token_path(asset)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reset the tokens of every file under an entity directory
    ///
    /// Used right after an entity is known to have been freshly (re)created:
    /// whatever tokens its files carried belong to the previous incarnation.
    pub fn reset_all_under(&self, dir: &Path) -> StitchResult<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.reset_all_under(&path)?;
            } else {
                self.reset(&path)?;
            }
        }
        Ok(())
    }

    /// On-disk location of the token for an asset
    fn token_path(&self, asset: &Path) -> StitchResult<PathBuf> {
        let rel = asset
            .strip_prefix(&self.root)
            .map_err(|_| StitchError::OutsideRoot {
                path: asset.to_path_buf(),
                root: self.root.clone(),
            })?;
        let file_name = rel
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StitchError::OutsideRoot {
                path: asset.to_path_buf(),
                root: self.root.clone(),
            })?;
        let mut path = tracking::tracking_dir(&self.root);
        if let Some(parent) = rel.parent() {
            path.push(parent);
        }
        path.push(format!("{}_{}.etag", file_name, self.node));
        Ok(path)
    }
}

/// Reduce a node identity to a file-name-safe form
///
/// Keeps alphanumerics, `-`, and `.`; everything else becomes `-`. Node
/// identities are typically `host:port`-ish strings.
pub fn sanitize_node(node: &str) -> String {
    node.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

//! Configuration module for Stitch
//!
//! Implements the configuration hierarchy:
//! 1. Explicit argument (highest priority)
//! 2. Environment variables (STITCH_*)
//! 3. Tool config (.stitch/config.toml)
//! 4. Built-in defaults (lowest priority)
//!
//! Careful mode sits outside the hierarchy: when active, push concurrency is
//! forced to 1 no matter what the other layers say, because auto-remediation
//! runs multi-step corrective sequences that are unsafe to interleave.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StitchError, StitchResult};
use crate::tracking;

/// Environment variable overriding push concurrency
pub const PUSH_CONCURRENCY_ENV: &str = "STITCH_PUSH_CONCURRENCY";

/// Environment variable overriding pull concurrency
pub const PULL_CONCURRENCY_ENV: &str = "STITCH_PULL_CONCURRENCY";

/// The server's write path tolerates more parallelism than the
/// template-compiling endpoints the pull direction hits.
const DEFAULT_PUSH_CONCURRENCY: usize = 8;
const DEFAULT_PULL_CONCURRENCY: usize = 4;

/// Tool-level configuration, loaded from `.stitch/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Push concurrency from the config file (env still wins)
    #[serde(default)]
    pub push_concurrency: Option<usize>,

    /// Pull concurrency from the config file (env still wins)
    #[serde(default)]
    pub pull_concurrency: Option<usize>,

    /// Careful mode: serialize every push operation
    #[serde(default)]
    pub careful: bool,

    /// Concurrency for existing-theme file updates
    ///
    /// Defaults to 1: the three files of one theme share a single etag, and
    /// the server recompiles the theme on every write. Raise only against
    /// servers that suppress compilation during bulk updates.
    #[serde(default)]
    pub theme_update_concurrency: Option<usize>,
}

impl Config {
    /// Load from the tracking directory under `root`, defaulting when absent
    pub fn load(root: &Path) -> StitchResult<Self> {
        let path = tracking::tracking_dir(root).join(tracking::CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| StitchError::InvalidConfig {
            path,
            message: e.to_string(),
        })
    }

    /// Resolve the push concurrency bound
    ///
    /// Careful mode forces 1 over everything else; otherwise explicit
    /// argument, then environment, then config file, then the default.
    pub fn push_concurrency(&self, explicit: Option<usize>) -> usize {
        self.push_concurrency_with(explicit, |name| std::env::var(name).ok())
    }

    /// Resolve the pull concurrency bound
    pub fn pull_concurrency(&self, explicit: Option<usize>) -> usize {
        self.pull_concurrency_with(explicit, |name| std::env::var(name).ok())
    }

    /// [`Config::push_concurrency`] with an injectable environment lookup
    pub fn push_concurrency_with<E>(&self, explicit: Option<usize>, env: E) -> usize
    where
        E: Fn(&str) -> Option<String>,
    {
        if self.careful {
            return 1;
        }
        resolve(
            explicit,
            env(PUSH_CONCURRENCY_ENV),
            self.push_concurrency,
            DEFAULT_PUSH_CONCURRENCY,
        )
    }

    /// [`Config::pull_concurrency`] with an injectable environment lookup
    pub fn pull_concurrency_with<E>(&self, explicit: Option<usize>, env: E) -> usize
    where
        E: Fn(&str) -> Option<String>,
    {
        resolve(
            explicit,
            env(PULL_CONCURRENCY_ENV),
            self.pull_concurrency,
            DEFAULT_PULL_CONCURRENCY,
        )
    }

    /// Effective bound for existing-theme file updates
    ///
    /// Never exceeds the resolved push concurrency, so careful mode keeps
    /// theme updates serialized even if the hook is raised.
    pub fn theme_concurrency(&self, explicit_push: Option<usize>) -> usize {
        self.theme_update_concurrency
            .unwrap_or(1)
            .max(1)
            .min(self.push_concurrency(explicit_push))
    }
}

fn resolve(
    explicit: Option<usize>,
    env_value: Option<String>,
    configured: Option<usize>,
    default: usize,
) -> usize {
    explicit
        .or_else(|| env_value.and_then(|v| v.trim().parse().ok()))
        .or(configured)
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

//! The remote collaborator boundary
//!
//! Everything network-shaped lives behind the [`Remote`] trait: the engine
//! never talks HTTP itself, it asks the collaborator for descriptor
//! collections and probes capabilities before wiring version-dependent
//! operations. Transport concerns (retries, authentication, timeouts) belong
//! to the implementation, not to this crate.

use async_trait::async_trait;

use crate::error::StitchResult;
use crate::models::EntityClass;

/// A status-code-bearing response envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub status: u16,
    pub body: T,
}

impl<T> Envelope<T> {
    /// A 200 envelope
    pub fn ok(body: T) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: T) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Precondition/version mismatch
    pub fn is_conflict(&self) -> bool {
        self.status == 412
    }
}

/// Payload of a per-file put operation's response
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct PutBody {
    /// New optimistic-concurrency token for the pushed asset
    #[serde(default)]
    pub etag: Option<String>,

    /// Display name as the server normalized it
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,

    /// Error indicator carried inside an otherwise 2xx payload
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of a per-file put operation
pub type PutResponse = Envelope<PutBody>;

/// The remote content-management server, as the engine sees it
#[async_trait]
pub trait Remote: Send + Sync {
    /// Fetch the full descriptor collection for one entity class
    ///
    /// The body is raw JSON: the resolver cache parses it leniently and
    /// degrades the slice to empty when the payload is malformed.
    async fn fetch_descriptors(
        &self,
        class: EntityClass,
    ) -> StitchResult<Envelope<serde_json::Value>>;

    /// Capability probe: does this server version support an operation?
    ///
    /// Checked before wiring any endpoint that is not guaranteed present on
    /// all supported server versions.
    fn supports(&self, operation: &str) -> bool;
}

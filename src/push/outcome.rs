//! Put-result processing
//!
//! Interprets one update operation's response and applies the etag rules:
//! an accepted push stores the response's new token, a conflict or failure
//! leaves the stored token exactly as it was. The batch always continues;
//! nothing here aborts sibling operations.

use std::path::Path;

use tracing::warn;

use crate::etag::EtagStore;
use crate::remote::{PutBody, PutResponse};

/// Interpretation of one put response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// 2xx with no payload error indicator
    Accepted,
    /// Precondition/version mismatch: somebody else wrote first
    Conflict,
    /// Any other non-success status, or a payload-level error
    Failed,
}

/// Derive the outcome of a put response
pub fn outcome_of(response: &PutResponse) -> PutOutcome {
    if response.is_conflict() {
        PutOutcome::Conflict
    } else if response.is_success() && response.body.error.is_none() {
        PutOutcome::Accepted
    } else {
        PutOutcome::Failed
    }
}

/// Success callback invoked with the accepted path and the response payload
pub type OnAccept<'a> = &'a dyn Fn(&Path, &PutBody);

/// Process one put response, updating the etag store
///
/// Returns true when the push was accepted. The optional callback runs only
/// on acceptance; the orchestrator uses it to reconcile server-normalized
/// display fields back into the local metadata file.
pub fn process_put(
    store: &EtagStore,
    path: &Path,
    response: &PutResponse,
    on_accept: Option<OnAccept<'_>>,
) -> bool {
    match outcome_of(response) {
        PutOutcome::Accepted => {
            if let Some(token) = &response.body.etag {
                if let Err(e) = store.write(path, token) {
                    warn!(path = %path.display(), "accepted push but failed to store etag: {e}");
                }
            }
            if let Some(callback) = on_accept {
                callback(path, &response.body);
            }
            true
        }
        PutOutcome::Conflict => {
            warn!(
                path = %path.display(),
                "optimistic-lock conflict, remote content changed since last sync, skipping"
            );
            false
        }
        PutOutcome::Failed => {
            warn!(
                path = %path.display(),
                status = response.status,
                "push rejected, skipping"
            );
            false
        }
    }
}

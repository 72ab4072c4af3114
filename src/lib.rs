//! Stitch - push synchronization engine for content-management design assets
//!
//! Stitch keeps a locally tracked snapshot of a content server's design-time
//! assets (components, component instances, themes, shared fragments,
//! page-region stacks, site settings) in sync with that server. A user edits
//! files on disk; the engine walks the tree, classifies every file, decides
//! which remote entities need creating, and dispatches per-kind operations in
//! dependency-ordered phases under per-phase concurrency bounds, reconciling
//! optimistic-concurrency tokens with the server's responses along the way.
//!
//! Transport, the concrete wire operations, and the pull direction live
//! outside this crate, behind [`remote::Remote`] and the
//! [`push::OperationRegistry`] function table.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod etag;
pub mod kinds;
pub mod models;
pub mod push;
pub mod remote;
pub mod shred;
pub mod tracking;

// Re-exports for convenience
pub use cache::EntityCache;
pub use classify::{classify, classify_virtual, Classifier};
pub use config::Config;
pub use error::{StitchError, StitchResult};
pub use etag::EtagStore;
pub use kinds::ContentKind;
pub use models::{Descriptor, EntityClass, EntityKey, FragmentType, PushTarget};
pub use push::{
    CreateResponse, EnsureResponse, OperationRegistry, PushEngine, PushOptions, PushReport,
    PutOutcome,
};
pub use remote::{Envelope, PutBody, PutResponse, Remote};
pub use shred::{shred, PathBucket};
pub use tracking::TrackingRecord;

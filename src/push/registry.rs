//! The per-kind operation function table
//!
//! The concrete wire operations live outside this crate; the engine only
//! dispatches through this registry. One update handler per content kind,
//! one create handler and one ensure-exists handler per creatable entity
//! class, all registered centrally at wiring time. Wiring is where server
//! capabilities are honored: an endpoint the target server version lacks is
//! simply never registered, and the engine logs a skip instead of failing.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use futures_util::future::BoxFuture;

use crate::error::StitchResult;
use crate::kinds::ContentKind;
use crate::models::{Descriptor, EntityClass};
use crate::remote::PutResponse;

/// Boxed update operation: push one file, yield the server's response
pub type PutOp = Box<dyn Fn(PathBuf) -> BoxFuture<'static, StitchResult<PutResponse>> + Send + Sync>;

/// Boxed create operation: create the entity owning a directory, sending the
/// member files as the creation payload
pub type CreateOp = Box<
    dyn Fn(PathBuf, Vec<PathBuf>) -> BoxFuture<'static, StitchResult<CreateResponse>> + Send + Sync,
>;

/// Boxed ensure operation: create an instance directory's remote counterpart
/// if it is missing
pub type EnsureOp =
    Box<dyn Fn(PathBuf) -> BoxFuture<'static, StitchResult<EnsureResponse>> + Send + Sync>;

/// Response of a create operation
#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub status: u16,
    /// Descriptor of the created entity, when creation succeeded
    pub descriptor: Option<Descriptor>,
    /// Member files the creation payload already covered; the engine pushes
    /// the remainder individually afterwards
    pub covered: Vec<PathBuf>,
    /// Error indicator carried inside an otherwise 2xx payload
    pub error: Option<String>,
}

impl CreateResponse {
    pub fn created(descriptor: Descriptor, covered: Vec<PathBuf>) -> Self {
        Self {
            status: 201,
            descriptor: Some(descriptor),
            covered,
            error: None,
        }
    }

    pub fn failed(status: u16) -> Self {
        Self {
            status,
            descriptor: None,
            covered: Vec::new(),
            error: None,
        }
    }

    /// Did this response actually create the entity?
    pub fn is_created(&self) -> bool {
        (200..300).contains(&self.status) && self.descriptor.is_some() && self.error.is_none()
    }
}

/// Response of an ensure-exists operation
#[derive(Debug, Clone)]
pub struct EnsureResponse {
    pub status: u16,
    /// True when the remote counterpart was just created (as opposed to
    /// already present)
    pub created: bool,
    pub error: Option<String>,
}

impl EnsureResponse {
    pub fn already_present() -> Self {
        Self {
            status: 200,
            created: false,
            error: None,
        }
    }

    pub fn created() -> Self {
        Self {
            status: 201,
            created: true,
            error: None,
        }
    }

    pub fn failed(status: u16) -> Self {
        Self {
            status,
            created: false,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.error.is_none()
    }

    pub fn did_create(&self) -> bool {
        self.is_success() && self.created
    }
}

/// Central registry mapping content kinds and entity classes to operations
///
/// A missing entry means "not supported against this server version or
/// intentionally unsupported" and dispatches as a logged skip, never as a
/// failure.
#[derive(Default)]
pub struct OperationRegistry {
    updates: HashMap<ContentKind, PutOp>,
    creates: HashMap<EntityClass, CreateOp>,
    ensures: HashMap<EntityClass, EnsureOp>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the update handler for one content kind
    pub fn register_update<F, Fut>(&mut self, kind: ContentKind, f: F)
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StitchResult<PutResponse>> + Send + 'static,
    {
        self.updates.insert(kind, Box::new(move |path| Box::pin(f(path))));
    }

    /// Register the same update handler for several kinds
    pub fn register_updates<F, Fut>(&mut self, kinds: &[ContentKind], f: F)
    where
        F: Fn(PathBuf) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = StitchResult<PutResponse>> + Send + 'static,
    {
        for &kind in kinds {
            self.register_update(kind, f.clone());
        }
    }

    /// Register the create handler for one entity class
    pub fn register_create<F, Fut>(&mut self, class: EntityClass, f: F)
    where
        F: Fn(PathBuf, Vec<PathBuf>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StitchResult<CreateResponse>> + Send + 'static,
    {
        self.creates
            .insert(class, Box::new(move |dir, files| Box::pin(f(dir, files))));
    }

    /// Register the ensure-exists handler for one instance class
    pub fn register_ensure<F, Fut>(&mut self, class: EntityClass, f: F)
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StitchResult<EnsureResponse>> + Send + 'static,
    {
        self.ensures.insert(class, Box::new(move |dir| Box::pin(f(dir))));
    }

    pub fn update(&self, kind: ContentKind) -> Option<&PutOp> {
        self.updates.get(&kind)
    }

    pub fn create(&self, class: EntityClass) -> Option<&CreateOp> {
        self.creates.get(&class)
    }

    pub fn ensure(&self, class: EntityClass) -> Option<&EnsureOp> {
        self.ensures.get(&class)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("updates", &self.updates.len())
            .field("creates", &self.creates.len())
            .field("ensures", &self.ensures.len())
            .finish()
    }
}

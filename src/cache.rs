//! The entity resolver cache
//!
//! One in-memory descriptor slice per entity class, fetched concurrently at
//! run start and refreshed per class only after a phase that actually created
//! entities of that class. The cache is an explicit per-run object owned by
//! the orchestrator; nothing in this module is global, so multiple pushes can
//! run in one process and tests stay deterministic.
//!
//! Resolution reads the *local* metadata file of an entity directory to build
//! the natural key, which is why new-vs-existing decisions happen during
//! bucketing, before any concurrent dispatch.

use std::collections::HashMap;
use std::path::Path;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::models::{Descriptor, EntityClass, EntityKey};
use crate::remote::Remote;
use crate::tracking;

type Slice = HashMap<EntityKey, Descriptor>;

/// Per-run cache of the remote server's descriptor collections
#[derive(Debug, Default)]
pub struct EntityCache {
    slices: HashMap<EntityClass, Slice>,
}

impl EntityCache {
    /// An empty cache; every class resolves as absent
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch every descriptor collection concurrently and build the cache
    ///
    /// A malformed or failed collection response degrades that class to an
    /// empty slice with a diagnostic instead of aborting initialization.
    pub async fn initialize(remote: &dyn Remote) -> Self {
        let slices: HashMap<EntityClass, Slice> = stream::iter(EntityClass::ALL)
            .map(|class| async move { (class, fetch_slice(remote, class).await) })
            .buffer_unordered(EntityClass::ALL.len())
            .collect()
            .await;
        Self { slices }
    }

    /// Re-fetch a single class, replacing its slice
    pub async fn refresh(&mut self, remote: &dyn Remote, class: EntityClass) {
        let slice = fetch_slice(remote, class).await;
        debug!(class = %class, descriptors = slice.len(), "cache slice refreshed");
        self.slices.insert(class, slice);
    }

    /// Number of cached descriptors for a class
    pub fn len(&self, class: EntityClass) -> usize {
        self.slices.get(&class).map_or(0, |s| s.len())
    }

    pub fn is_empty(&self, class: EntityClass) -> bool {
        self.len(class) == 0
    }

    /// Look up a descriptor by natural key
    pub fn get(&self, class: EntityClass, key: &EntityKey) -> Option<&Descriptor> {
        self.slices.get(&class)?.get(key)
    }

    /// Does the entity in `dir` exist remotely?
    ///
    /// Reads the directory's metadata file synchronously to build the key. A
    /// missing or unreadable metadata file resolves as "does not exist" —
    /// there is nothing to match the remote collection against.
    pub fn exists(&self, dir: &Path, class: EntityClass) -> bool {
        self.resolve(dir, class).is_some()
    }

    /// Resolve the entity in `dir` to its remote descriptor
    pub fn resolve(&self, dir: &Path, class: EntityClass) -> Option<&Descriptor> {
        let meta = match tracking::read_meta(dir, class) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(dir = %dir.display(), class = %class, "unresolvable locally: {e}");
                return None;
            }
        };
        self.get(class, &meta.key(class))
    }

    /// Insert a descriptor directly; test and embedding support
    pub fn insert(&mut self, class: EntityClass, descriptor: Descriptor) {
        let key = descriptor.key(class);
        self.slices.entry(class).or_default().insert(key, descriptor);
    }
}

async fn fetch_slice(remote: &dyn Remote, class: EntityClass) -> Slice {
    let envelope = match remote.fetch_descriptors(class).await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(class = %class, "descriptor fetch failed, treating collection as empty: {e}");
            return Slice::new();
        }
    };
    if !envelope.is_success() {
        warn!(
            class = %class,
            status = envelope.status,
            "descriptor fetch returned a non-success status, treating collection as empty"
        );
        return Slice::new();
    }
    parse_slice(class, envelope.body)
}

fn parse_slice(class: EntityClass, body: serde_json::Value) -> Slice {
    let Some(items) = body.as_array() else {
        if !body.is_null() {
            warn!(class = %class, "descriptor collection is not an array, treating as empty");
        }
        return Slice::new();
    };
    let mut slice = Slice::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Descriptor>(item.clone()) {
            Ok(descriptor) => {
                slice.insert(descriptor.key(class), descriptor);
            }
            Err(e) => debug!(class = %class, "skipping malformed descriptor: {e}"),
        }
    }
    slice
}

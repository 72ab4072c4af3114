//! Common test utilities for Stitch scenario tests.
//!
//! Provides:
//! - `TestEnv`: an isolated tracked content tree in a temp directory
//! - `StubRemote`: a scripted collaborator that counts collection fetches
//! - `Gauge`: an in-flight counter for concurrency-bound assertions
//! - Registry helpers that record every dispatched operation

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use stitch::{
    CreateResponse, Descriptor, EntityClass, Envelope, EnsureResponse, OperationRegistry, PutBody,
    Remote, StitchResult, TrackingRecord,
};

/// Initialize test logging; safe to call from every test
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default node identity used by test environments
pub const NODE: &str = "author-1";

/// Default server version used by test environments
pub const SERVER_VERSION: &str = "6.2.0";

/// Isolated tracked content tree in a temp directory
pub struct TestEnv {
    pub root: TempDir,
}

impl TestEnv {
    /// A tracked tree bound to the default node
    pub fn new() -> Self {
        Self::with_node(NODE, SERVER_VERSION)
    }

    pub fn with_node(node: &str, server_version: &str) -> Self {
        let root = TempDir::new().expect("tempdir");
        TrackingRecord::new(node, server_version)
            .save(root.path())
            .expect("tracking record");
        Self { root }
    }

    /// A temp directory with no tracking record at all
    pub fn untracked() -> Self {
        Self {
            root: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// A theme directory with its three co-etagged files
    pub fn add_theme(&self, name: &str) {
        self.write(
            &format!("themes/{name}/theme.json"),
            &format!(r#"{{"name": "{name}"}}"#),
        );
        self.write(&format!("themes/{name}/variables.css"), ":root {}");
        self.write(&format!("themes/{name}/overrides.css"), "/* overrides */");
    }

    /// A component directory with metadata, template, and style sheet
    pub fn add_component(&self, name: &str) {
        self.write(
            &format!("components/{name}/component.json"),
            &format!(r#"{{"name": "{name}"}}"#),
        );
        self.write(&format!("components/{name}/markup.html"), "<div></div>");
        self.write(&format!("components/{name}/styles.css"), ".c {}");
    }

    /// A component instance with a style sheet
    pub fn add_instance(&self, component: &str, site: &str, id: &str) {
        self.write(
            &format!("components/{component}/instances/{site}/{id}/instance.json"),
            &format!(r#"{{"name": "{id}"}}"#),
        );
        self.write(
            &format!("components/{component}/instances/{site}/{id}/styles.css"),
            ".i {}",
        );
    }

    /// A fragment directory with metadata (carrying a type) and template
    pub fn add_fragment(&self, name: &str, fragment_type: &str) {
        self.write(
            &format!("fragments/{name}/fragment.json"),
            &format!(r#"{{"name": "{name}", "type": "{fragment_type}"}}"#),
        );
        self.write(&format!("fragments/{name}/template.html"), "<p></p>");
    }

    /// A stack directory with metadata and layout
    pub fn add_stack(&self, name: &str) {
        self.write(
            &format!("stacks/{name}/stack.json"),
            &format!(r#"{{"name": "{name}"}}"#),
        );
        self.write(&format!("stacks/{name}/layout.json"), "{}");
    }

    /// A stack instance with metadata and placement
    pub fn add_stack_instance(&self, stack: &str, site: &str, id: &str) {
        self.write(
            &format!("stacks/{stack}/instances/{site}/{id}/instance.json"),
            &format!(r#"{{"name": "{id}"}}"#),
        );
        self.write(
            &format!("stacks/{stack}/instances/{site}/{id}/placement.json"),
            "{}",
        );
    }

    /// A site-settings group with metadata and values
    pub fn add_settings(&self, group: &str) {
        self.write(
            &format!("settings/{group}/settings.json"),
            &format!(r#"{{"name": "{group}"}}"#),
        );
        self.write(&format!("settings/{group}/values.json"), "{}");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn descriptor(id: &str, name: &str) -> Descriptor {
    serde_json::from_value(serde_json::json!({"id": id, "name": name})).unwrap()
}

/// Scripted collaborator
///
/// Serves descriptor collections from an in-memory map and counts how many
/// times each class was fetched, so tests can assert that cache refreshes
/// happen exactly when a phase created something.
#[derive(Default)]
pub struct StubRemote {
    collections: Mutex<HashMap<EntityClass, Vec<Descriptor>>>,
    fetches: Mutex<HashMap<EntityClass, usize>>,
    unsupported: Vec<String>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, class: EntityClass, descriptors: Vec<Descriptor>) -> Self {
        self.collections.lock().unwrap().insert(class, descriptors);
        self
    }

    pub fn without_support(mut self, operation: &str) -> Self {
        self.unsupported.push(operation.to_string());
        self
    }

    /// Make a descriptor appear in subsequent fetches of its class
    pub fn publish(&self, class: EntityClass, descriptor: Descriptor) {
        self.collections
            .lock()
            .unwrap()
            .entry(class)
            .or_default()
            .push(descriptor);
    }

    /// How many times one class's collection was fetched
    pub fn fetch_count(&self, class: EntityClass) -> usize {
        *self.fetches.lock().unwrap().get(&class).unwrap_or(&0)
    }

    /// Total collection fetches across all classes
    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Remote for StubRemote {
    async fn fetch_descriptors(
        &self,
        class: EntityClass,
    ) -> StitchResult<Envelope<serde_json::Value>> {
        *self.fetches.lock().unwrap().entry(class).or_insert(0) += 1;
        let descriptors = self
            .collections
            .lock()
            .unwrap()
            .get(&class)
            .cloned()
            .unwrap_or_default();
        Ok(Envelope::ok(serde_json::to_value(descriptors)?))
    }

    fn supports(&self, operation: &str) -> bool {
        !self.unsupported.iter().any(|o| o == operation)
    }
}

/// In-flight operation gauge
///
/// Operations call `enter` when they start and `exit` when they finish; the
/// high-water mark is the maximum number simultaneously outstanding.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    high_water: AtomicUsize,
}

impl Gauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }
}

/// Shared log of dispatched paths, in completion order
pub type CallLog = Arc<Mutex<Vec<PathBuf>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn logged(log: &CallLog) -> Vec<PathBuf> {
    log.lock().unwrap().clone()
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

/// Register a recording update handler for the given kinds
///
/// The handler tracks in-flight counts against `gauge`, appends each path to
/// `log`, and accepts every push with a fresh token.
pub fn record_updates(
    registry: &mut OperationRegistry,
    kinds: &[stitch::ContentKind],
    gauge: &Arc<Gauge>,
    log: &CallLog,
) {
    for &kind in kinds {
        let gauge = Arc::clone(gauge);
        let log = Arc::clone(log);
        registry.register_update(kind, move |path| {
            let gauge = Arc::clone(&gauge);
            let log = Arc::clone(&log);
            async move {
                gauge.enter();
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                gauge.exit();
                log.lock().unwrap().push(path);
                Ok(Envelope::ok(PutBody {
                    etag: Some("tok-1".to_string()),
                    ..Default::default()
                }))
            }
        });
    }
}

/// Register a recording create handler for one entity class
///
/// Creates succeed with sequential ids; `covered` names the member files the
/// creation payload is considered to carry.
pub fn record_creates(
    registry: &mut OperationRegistry,
    class: EntityClass,
    covered: &[&str],
    log: &CallLog,
) {
    let covered: Vec<String> = covered.iter().map(|s| s.to_string()).collect();
    let log = Arc::clone(log);
    let counter = Arc::new(AtomicUsize::new(0));
    registry.register_create(class, move |dir, files| {
        let log = Arc::clone(&log);
        let covered = covered.clone();
        let counter = Arc::clone(&counter);
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(dir.clone());
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let name = dir.file_name().unwrap().to_string_lossy().into_owned();
            let covered_files = files
                .into_iter()
                .filter(|f| {
                    f.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| covered.iter().any(|c| c == n))
                })
                .collect();
            Ok(CreateResponse::created(
                descriptor(&format!("{class}-{n}"), &name),
                covered_files,
            ))
        }
    });
}

/// Register a recording ensure handler that reports every directory as
/// newly created
pub fn record_ensures(registry: &mut OperationRegistry, class: EntityClass, log: &CallLog) {
    let log = Arc::clone(log);
    registry.register_ensure(class, move |dir| {
        let log = Arc::clone(&log);
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(dir);
            Ok(EnsureResponse::created())
        }
    });
}

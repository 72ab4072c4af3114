//! The push orchestrator
//!
//! Runs a whole-tree push as an ordered sequence of phases, each settling
//! fully before the next begins:
//!
//! 1. create missing themes, refresh the theme cache if any were created
//! 2. create missing site-setting groups, refresh
//! 3. update existing theme files (concurrency 1 by default: the three
//!    files of one theme share a single etag)
//! 4. create missing stacks, refresh
//! 5. ensure stack-instance directories exist, refresh if any were created
//! 6. update stack-instance-scoped files
//! 7. create missing fragments strictly in order of their type ordinal
//!    (fragments reference each other by identity), refresh
//! 8. create missing components, refresh components and instances
//! 9. ensure component-instance directories exist, refresh if created
//! 10. four independent groups concurrently: generic leftovers (serial),
//!     drip-fed instance styles, fragment templates, and stack files
//!
//! Concurrency is cooperative: a bound limits outstanding operations, not
//! threads. A failed item never aborts its siblings or later phases; only
//! pre-flight structural problems abort the run.

pub mod outcome;
pub mod registry;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_util::future::join4;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::{StitchError, StitchResult};
use crate::etag::EtagStore;
use crate::kinds::ContentKind;
use crate::models::{Descriptor, EntityClass, PushTarget};
use crate::remote::{PutBody, Remote};
use crate::shred::{shred, CreationUnits, PathBucket};
use crate::tracking::{self, TrackingRecord};

pub use outcome::{outcome_of, process_put, PutOutcome};
pub use registry::{CreateResponse, EnsureResponse, OperationRegistry};

/// Options for a push run
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Explicit push-concurrency override (env and config still apply below)
    pub concurrency: Option<usize>,

    /// Cross-server transfer mode: replace the node-identity pre-flight
    /// check with a version-compatibility check
    pub transfer: bool,
}

/// Result of a push run
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    /// Files the server accepted
    pub pushed: Vec<PathBuf>,
    /// Files skipped: conflicts, unsupported operations, unrecognized paths
    pub skipped: Vec<PathBuf>,
    /// Files or creation units that failed outright
    pub failed: Vec<PathBuf>,
    /// Entities created this run
    pub created: Vec<Descriptor>,
    /// Instance directories whose remote counterpart was created
    pub ensured: usize,
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How one dispatched item ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Pushed,
    Skipped,
    Failed,
}

/// The push synchronization engine
///
/// Owns the operation registry and the per-run resolver cache; everything
/// network-shaped goes through the [`Remote`] collaborator and the
/// registered operations.
pub struct PushEngine<'a> {
    remote: &'a dyn Remote,
    registry: OperationRegistry,
    target: PushTarget,
    options: PushOptions,
}

impl<'a> PushEngine<'a> {
    pub fn new(remote: &'a dyn Remote, registry: OperationRegistry, target: PushTarget) -> Self {
        Self {
            remote,
            registry,
            target,
            options: PushOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PushOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Push every tracked file under `root`
    pub async fn push_tree(&self, root: &Path) -> StitchResult<PushReport> {
        let mut record = TrackingRecord::load(root)?;
        self.preflight(&record)?;
        let config = Config::load(root)?;
        let limit = config.push_concurrency(self.options.concurrency);

        let store = EtagStore::new(root, &self.target.node);
        let classifier = Classifier::new(root);
        let mut cache = EntityCache::initialize(self.remote).await;
        let mut bucket = shred(&classifier, &cache);
        info!(
            files = bucket.total_files(),
            unrecognized = bucket.unrecognized.len(),
            concurrency = limit,
            "push plan ready"
        );

        let mut report = PushReport::default();
        report.skipped.append(&mut bucket.unrecognized);

        // Phase 1: themes
        let units = std::mem::take(&mut bucket.new_themes);
        let created = self
            .create_units(EntityClass::Theme, units, limit, &store, &classifier, &mut bucket, &mut report)
            .await;
        if !created.is_empty() {
            cache.refresh(self.remote, EntityClass::Theme).await;
            report.created.extend(created);
        }

        // Phase 2: site settings
        let units = std::mem::take(&mut bucket.new_settings);
        let created = self
            .create_units(EntityClass::Settings, units, limit, &store, &classifier, &mut bucket, &mut report)
            .await;
        if !created.is_empty() {
            cache.refresh(self.remote, EntityClass::Settings).await;
            report.created.extend(created);
        }

        // Phase 3: existing theme files, one at a time unless the relax hook
        // says otherwise
        let files = std::mem::take(&mut bucket.theme_files);
        let results = self
            .dispatch(files, config.theme_concurrency(self.options.concurrency), &classifier, &store)
            .await;
        absorb(&mut report, results);

        // Phase 4: stacks
        let units = std::mem::take(&mut bucket.new_stacks);
        let created = self
            .create_units(EntityClass::Stack, units, limit, &store, &classifier, &mut bucket, &mut report)
            .await;
        if !created.is_empty() {
            cache.refresh(self.remote, EntityClass::Stack).await;
            report.created.extend(created);
        }

        // Phase 5: stack-instance directories
        let dirs = std::mem::take(&mut bucket.stack_instance_dirs);
        let ensured = self
            .ensure_dirs(EntityClass::StackInstance, dirs, limit, &mut report)
            .await;
        if ensured > 0 {
            cache.refresh(self.remote, EntityClass::StackInstance).await;
        }

        // Phase 6: stack-instance-scoped files
        let files = std::mem::take(&mut bucket.stack_instance_files);
        let results = self.dispatch(files, limit, &classifier, &store).await;
        absorb(&mut report, results);

        // Phase 7: fragments, strictly in order: later fragments may
        // reference the identities assigned to earlier ones
        let units = std::mem::take(&mut bucket.new_fragments);
        let created = self
            .create_fragments_in_order(units, &store, &classifier, &mut bucket, &mut report)
            .await;
        if !created.is_empty() {
            cache.refresh(self.remote, EntityClass::Fragment).await;
            report.created.extend(created);
        }

        // Phase 8: components; creation also materializes instances the
        // payload carried, so both slices go stale
        let units = std::mem::take(&mut bucket.new_components);
        let created = self
            .create_units(EntityClass::Component, units, limit, &store, &classifier, &mut bucket, &mut report)
            .await;
        if !created.is_empty() {
            cache.refresh(self.remote, EntityClass::Component).await;
            cache
                .refresh(self.remote, EntityClass::ComponentInstance)
                .await;
            report.created.extend(created);
        }

        // Phase 9: component-instance directories
        let dirs = std::mem::take(&mut bucket.instance_dirs);
        let ensured = self
            .ensure_dirs(EntityClass::ComponentInstance, dirs, limit, &mut report)
            .await;
        if ensured > 0 {
            cache
                .refresh(self.remote, EntityClass::ComponentInstance)
                .await;
        }

        // Phase 10: the four remaining groups, concurrently, each under its
        // own bound
        let rest = std::mem::take(&mut bucket.rest);
        let styles = std::mem::take(&mut bucket.instance_styles);
        let templates = std::mem::take(&mut bucket.fragment_templates);
        let stack_files = std::mem::take(&mut bucket.stack_files);
        let (a, b, c, d) = join4(
            self.dispatch(rest, 1, &classifier, &store),
            self.dispatch(styles, drip(ContentKind::InstanceStyle, limit), &classifier, &store),
            self.dispatch(templates, drip(ContentKind::FragmentTemplate, limit), &classifier, &store),
            self.dispatch(stack_files, drip(ContentKind::StackLayout, limit), &classifier, &store),
        )
        .await;
        for results in [a, b, c, d] {
            absorb(&mut report, results);
        }

        record.last_push = Some(chrono::Utc::now());
        record.save(root)?;

        info!(
            pushed = report.pushed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            created = report.created.len(),
            "push settled"
        );
        Ok(report)
    }

    /// Push a single file, skipping the phase machinery
    pub async fn push_file(&self, path: &Path) -> StitchResult<PushReport> {
        let root = tracking::find_root(path).ok_or_else(|| StitchError::UntrackedRoot {
            path: path.to_path_buf(),
        })?;
        let record = TrackingRecord::load(&root)?;
        self.preflight(&record)?;

        let store = EtagStore::new(&root, &self.target.node);
        let classifier = Classifier::new(&root);
        let mut report = PushReport::default();
        let results = self
            .dispatch(vec![path.to_path_buf()], 1, &classifier, &store)
            .await;
        absorb(&mut report, results);
        Ok(report)
    }

    /// Pre-flight: structural checks before any network activity
    fn preflight(&self, record: &TrackingRecord) -> StitchResult<()> {
        if self.options.transfer {
            if !tracking::versions_compatible(&record.server_version, &self.target.server_version) {
                return Err(StitchError::VersionIncompatible {
                    recorded: record.server_version.clone(),
                    requested: self.target.server_version.clone(),
                });
            }
        } else if record.node != self.target.node {
            return Err(StitchError::NodeMismatch {
                recorded: record.node.clone(),
                requested: self.target.node.clone(),
            });
        }
        Ok(())
    }

    /// Create the entities of one class under a concurrency bound
    ///
    /// Returns the descriptors actually created; the caller refreshes the
    /// class's cache slice iff the list is non-empty.
    #[allow(clippy::too_many_arguments)]
    async fn create_units(
        &self,
        class: EntityClass,
        units: CreationUnits,
        limit: usize,
        store: &EtagStore,
        classifier: &Classifier,
        bucket: &mut PathBucket,
        report: &mut PushReport,
    ) -> Vec<Descriptor> {
        if units.is_empty() {
            return Vec::new();
        }
        let Some(op) = self.registry.create(class) else {
            warn!(
                class = %class,
                entities = units.len(),
                "no create operation for this server, skipping new entities"
            );
            for (_, files) in units {
                report.skipped.extend(files);
            }
            return Vec::new();
        };

        debug!(class = %class, entities = units.len(), "creating entities");
        let results: Vec<_> = stream::iter(units)
            .map(|(dir, files)| async move {
                let result = op(dir.clone(), files.clone()).await;
                (dir, files, result)
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;

        let mut created = Vec::new();
        for (dir, files, result) in results {
            self.finish_create(class, dir, files, result, store, classifier, bucket, report, &mut created);
        }
        created
    }

    /// Create fragments strictly sequentially, ordered by type ordinal
    ///
    /// Leaf fragment kinds first, container and hidden kinds next, the
    /// top-level composite kind last. In-order, not merely serialized.
    async fn create_fragments_in_order(
        &self,
        units: CreationUnits,
        store: &EtagStore,
        classifier: &Classifier,
        bucket: &mut PathBucket,
        report: &mut PushReport,
    ) -> Vec<Descriptor> {
        if units.is_empty() {
            return Vec::new();
        }
        let Some(op) = self.registry.create(EntityClass::Fragment) else {
            warn!(
                entities = units.len(),
                "no fragment create operation for this server, skipping new fragments"
            );
            for (_, files) in units {
                report.skipped.extend(files);
            }
            return Vec::new();
        };

        let mut ordered: Vec<(PathBuf, Vec<PathBuf>)> = units.into_iter().collect();
        ordered.sort_by_key(|(dir, _)| (fragment_ordinal(dir), dir.clone()));

        let mut created = Vec::new();
        for (dir, files) in ordered {
            let result = op(dir.clone(), files.clone()).await;
            self.finish_create(
                EntityClass::Fragment,
                dir,
                files,
                result,
                store,
                classifier,
                bucket,
                report,
                &mut created,
            );
        }
        created
    }

    /// Settle one creation result
    ///
    /// On success: reset the tokens under the entity directory (they belong
    /// to the previous incarnation, if any) and re-route member files the
    /// creation payload did not cover into their update slots.
    #[allow(clippy::too_many_arguments)]
    fn finish_create(
        &self,
        class: EntityClass,
        dir: PathBuf,
        files: Vec<PathBuf>,
        result: StitchResult<CreateResponse>,
        store: &EtagStore,
        classifier: &Classifier,
        bucket: &mut PathBucket,
        report: &mut PushReport,
        created: &mut Vec<Descriptor>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(class = %class, dir = %dir.display(), "create failed: {e}");
                report.failed.push(dir);
                report.skipped.extend(files);
                return;
            }
        };
        if !response.is_created() {
            warn!(
                class = %class,
                dir = %dir.display(),
                status = response.status,
                "create rejected, skipping entity and its files"
            );
            report.failed.push(dir);
            report.skipped.extend(files);
            return;
        }
        if let Err(e) = store.reset_all_under(&dir) {
            warn!(dir = %dir.display(), "failed to reset etags after creation: {e}");
        }
        if let Some(descriptor) = response.descriptor {
            debug!(class = %class, id = %descriptor.id, "created");
            created.push(descriptor);
        }

        let covered: HashSet<&PathBuf> = response.covered.iter().collect();
        for file in files {
            if covered.contains(&file) {
                report.pushed.push(file);
            } else if let Some(kind) = classifier.classify(&file) {
                bucket.push_update(kind, file);
            } else {
                report.skipped.push(file);
            }
        }
    }

    /// Ensure a batch of instance directories exist remotely
    ///
    /// Returns how many were actually created; the caller refreshes the
    /// instance cache slice iff the count is non-zero.
    async fn ensure_dirs(
        &self,
        class: EntityClass,
        dirs: Vec<PathBuf>,
        limit: usize,
        report: &mut PushReport,
    ) -> usize {
        if dirs.is_empty() {
            return 0;
        }
        let Some(op) = self.registry.ensure(class) else {
            debug!(class = %class, "no ensure operation for this server, skipping");
            return 0;
        };

        let results: Vec<_> = stream::iter(dirs)
            .map(|dir| async move {
                let result = op(dir.clone()).await;
                (dir, result)
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;

        let mut ensured = 0;
        for (dir, result) in results {
            match result {
                Ok(response) if response.did_create() => ensured += 1,
                Ok(response) if response.is_success() => {}
                Ok(response) => {
                    warn!(
                        dir = %dir.display(),
                        status = response.status,
                        "ensure-exists rejected"
                    );
                    report.failed.push(dir);
                }
                Err(e) => {
                    warn!(dir = %dir.display(), "ensure-exists failed: {e}");
                    report.failed.push(dir);
                }
            }
        }
        report.ensured += ensured;
        ensured
    }

    /// Dispatch a batch of update operations under a concurrency bound
    async fn dispatch(
        &self,
        paths: Vec<PathBuf>,
        limit: usize,
        classifier: &Classifier,
        store: &EtagStore,
    ) -> Vec<(PathBuf, Disposition)> {
        if paths.is_empty() {
            return Vec::new();
        }
        stream::iter(paths)
            .map(|path| async move {
                let disposition = self.push_one(&path, classifier, store).await;
                (path, disposition)
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await
    }

    /// Push one already-classified file through the function table
    async fn push_one(
        &self,
        path: &Path,
        classifier: &Classifier,
        store: &EtagStore,
    ) -> Disposition {
        let Some(kind) = classifier.classify(path) else {
            warn!(path = %path.display(), "unrecognized file, skipping");
            return Disposition::Skipped;
        };
        let Some(op) = self.registry.update(kind) else {
            debug!(
                path = %path.display(),
                kind = %kind,
                "no handler for this kind against this server, skipping"
            );
            return Disposition::Skipped;
        };
        let response = match op(path.to_path_buf()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(path = %path.display(), "push failed: {e}");
                return Disposition::Failed;
            }
        };

        let reconcile = |path: &Path, body: &PutBody| {
            if let Some(display_name) = &body.display_name {
                if let Err(e) = tracking::reconcile_display(path, display_name) {
                    warn!(path = %path.display(), "failed to reconcile display name: {e}");
                }
            }
        };
        let on_accept: Option<outcome::OnAccept<'_>> = if kind.is_metadata() {
            Some(&reconcile)
        } else {
            None
        };

        if process_put(store, path, &response, on_accept) {
            Disposition::Pushed
        } else if response.is_conflict() {
            Disposition::Skipped
        } else {
            Disposition::Failed
        }
    }
}

/// Effective bound for a drip-fed kind: its hardcoded cap, never above the
/// general policy's bound
fn drip(kind: ContentKind, limit: usize) -> usize {
    kind.drip_limit().map_or(limit, |cap| cap.min(limit)).max(1)
}

/// Creation ordinal of the fragment in `dir`, from its local metadata
fn fragment_ordinal(dir: &Path) -> u8 {
    tracking::read_meta(dir, EntityClass::Fragment)
        .ok()
        .and_then(|meta| meta.fragment_type())
        .map(|t| t.ordinal())
        .unwrap_or(u8::MAX)
}

fn absorb(report: &mut PushReport, results: Vec<(PathBuf, Disposition)>) {
    for (path, disposition) in results {
        match disposition {
            Disposition::Pushed => report.pushed.push(path),
            Disposition::Skipped => report.skipped.push(path),
            Disposition::Failed => report.failed.push(path),
        }
    }
}

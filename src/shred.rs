//! The directory shredder
//!
//! Walks a tracked tree, classifies every file, and splits the paths into the
//! ordered, purpose-specific groups the orchestrator dispatches phase by
//! phase. All decisions here are made synchronously against one stable
//! snapshot of the filesystem and the resolver cache as it stood at run
//! start: by the time anything is dispatched, every new-vs-existing call has
//! already been made.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::cache::EntityCache;
use crate::classify::Classifier;
use crate::kinds::ContentKind;
use crate::models::EntityClass;
use crate::tracking::TRACKING_DIR;

/// New-entity creation units: owning directory → the member files found
/// under it. One unit per directory no matter how many files belong to it.
pub type CreationUnits = BTreeMap<PathBuf, Vec<PathBuf>>;

/// The shredder's output: every file routed into exactly one slot
#[derive(Debug, Default)]
pub struct PathBucket {
    /// Themes with no remote descriptor yet
    pub new_themes: CreationUnits,
    /// Site-setting groups with no remote descriptor yet
    pub new_settings: CreationUnits,
    /// Stacks with no remote descriptor yet
    pub new_stacks: CreationUnits,
    /// Fragments with no remote descriptor yet
    pub new_fragments: CreationUnits,
    /// Components with no remote descriptor yet (instance files of a missing
    /// component fold in here and ride along with the creation payload)
    pub new_components: CreationUnits,

    /// The co-etagged files of existing themes; updated one at a time by
    /// default
    pub theme_files: Vec<PathBuf>,
    /// Stack-instance-scoped files, updated after stacks and their instance
    /// directories are ensured
    pub stack_instance_files: Vec<PathBuf>,
    /// Layout and region files of existing stacks; drip-fed
    pub stack_files: Vec<PathBuf>,
    /// Templates of existing fragments; drip-fed
    pub fragment_templates: Vec<PathBuf>,
    /// Style sheets of instances whose component exists; drip-fed
    pub instance_styles: Vec<PathBuf>,

    /// Component-instance directories needing an ensure-exists pass
    pub instance_dirs: Vec<PathBuf>,
    /// Stack-instance directories needing an ensure-exists pass
    pub stack_instance_dirs: Vec<PathBuf>,

    /// Everything else: updates of existing entities with no special
    /// ordering or concurrency requirement
    pub rest: Vec<PathBuf>,

    /// Files no classification rule matched; excluded from every group
    pub unrecognized: Vec<PathBuf>,
}

impl PathBucket {
    /// Total files routed into dispatchable slots
    pub fn total_files(&self) -> usize {
        self.creation_units()
            .map(|(_, units)| units.values().map(Vec::len).sum::<usize>())
            .sum::<usize>()
            + self.theme_files.len()
            + self.stack_instance_files.len()
            + self.stack_files.len()
            + self.fragment_templates.len()
            + self.instance_styles.len()
            + self.rest.len()
    }

    /// The five creation-unit maps with their entity class
    pub fn creation_units(&self) -> impl Iterator<Item = (EntityClass, &CreationUnits)> {
        [
            (EntityClass::Theme, &self.new_themes),
            (EntityClass::Settings, &self.new_settings),
            (EntityClass::Stack, &self.new_stacks),
            (EntityClass::Fragment, &self.new_fragments),
            (EntityClass::Component, &self.new_components),
        ]
        .into_iter()
    }

    fn units_mut(&mut self, class: EntityClass) -> &mut CreationUnits {
        match class {
            EntityClass::Theme => &mut self.new_themes,
            EntityClass::Settings => &mut self.new_settings,
            EntityClass::Stack => &mut self.new_stacks,
            EntityClass::Fragment => &mut self.new_fragments,
            _ => &mut self.new_components,
        }
    }

    fn fold_into_new(&mut self, class: EntityClass, owning: PathBuf, file: PathBuf) {
        self.units_mut(class).entry(owning).or_default().push(file);
    }

    /// Route a file of an *existing* entity to its update slot
    ///
    /// Shared with the orchestrator, which re-routes creation-unit members
    /// the creation payload did not cover.
    pub fn push_update(&mut self, kind: ContentKind, path: PathBuf) {
        match kind {
            ContentKind::ThemeMeta | ContentKind::ThemeVariables | ContentKind::ThemeOverrides => {
                self.theme_files.push(path)
            }
            ContentKind::StackLayout | ContentKind::StackRegion => self.stack_files.push(path),
            ContentKind::FragmentTemplate => self.fragment_templates.push(path),
            ContentKind::InstanceStyle => self.instance_styles.push(path),
            ContentKind::StackInstanceMeta
            | ContentKind::StackInstancePlacement
            | ContentKind::StackInstanceAsset => self.stack_instance_files.push(path),
            _ => self.rest.push(path),
        }
    }
}

/// Owning entity directory for a path, by class shape
///
/// Base entities own the first two path segments under the root; instances
/// own five (`<class dir>/<entity>/instances/<site>/<id>`).
pub fn entity_dir(root: &Path, path: &Path, class: EntityClass) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    let depth = match class {
        EntityClass::ComponentInstance | EntityClass::StackInstance => 5,
        _ => 2,
    };
    let mut dir = root.to_path_buf();
    let mut taken = 0;
    for component in rel.components().take(depth) {
        dir.push(component);
        taken += 1;
    }
    (taken == depth).then_some(dir)
}

/// Walk `root` and bucket every file for the push pipeline
pub fn shred(classifier: &Classifier, cache: &EntityCache) -> PathBucket {
    let root = classifier.root().to_path_buf();
    let mut bucket = PathBucket::default();

    let walk = ignore::WalkBuilder::new(&root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != OsStr::new(TRACKING_DIR))
        .build();

    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());

        if is_dir {
            // Only instance-shaped directories matter here; they feed the
            // ensure-exists passes. Other directories are implied by their
            // files.
            match classifier.classify(path) {
                Some(ContentKind::InstanceDir) => bucket.instance_dirs.push(path.to_path_buf()),
                Some(ContentKind::StackInstanceDir) => {
                    bucket.stack_instance_dirs.push(path.to_path_buf())
                }
                _ => {}
            }
            continue;
        }

        match classifier.classify(path) {
            Some(kind) => route_file(&root, cache, &mut bucket, kind, path.to_path_buf()),
            None => {
                warn!(path = %path.display(), "unrecognized file, skipping");
                bucket.unrecognized.push(path.to_path_buf());
            }
        }
    }

    bucket
}

fn route_file(
    root: &Path,
    cache: &EntityCache,
    bucket: &mut PathBucket,
    kind: ContentKind,
    path: PathBuf,
) {
    let class = kind.entity_class();
    match class {
        // Stack-instance files dispatch after the stack phases have settled;
        // no fold-in is needed.
        EntityClass::StackInstance => bucket.push_update(kind, path),

        // Sites cannot be created by a push. A site file whose descriptor is
        // gone remotely is a stale local reference.
        EntityClass::Site => {
            let Some(owning) = entity_dir(root, &path, class) else {
                return bucket.push_update(kind, path);
            };
            if cache.exists(&owning, class) {
                bucket.push_update(kind, path);
            } else {
                warn!(
                    path = %path.display(),
                    "site no longer exists remotely, skipping"
                );
                bucket.unrecognized.push(path);
            }
        }

        // Instance kinds check their *base* component: a missing base folds
        // the file into the component's creation unit instead.
        EntityClass::ComponentInstance => {
            let Some(base) = entity_dir(root, &path, EntityClass::Component) else {
                return bucket.push_update(kind, path);
            };
            if cache.exists(&base, EntityClass::Component) {
                bucket.push_update(kind, path);
            } else {
                bucket.fold_into_new(EntityClass::Component, base, path);
            }
        }

        // Creatable base entities route on the owning directory's remote
        // existence, decided exactly once per path, up front.
        EntityClass::Component
        | EntityClass::Theme
        | EntityClass::Fragment
        | EntityClass::Stack
        | EntityClass::Settings => {
            let Some(owning) = entity_dir(root, &path, class) else {
                return bucket.push_update(kind, path);
            };
            if cache.exists(&owning, class) {
                bucket.push_update(kind, path);
            } else {
                bucket.fold_into_new(class, owning, path);
            }
        }
    }
}

//! Content-kind classification
//!
//! Classification is an ordered table of `(shape, kind)` rules evaluated with
//! strict first-match-wins semantics. Order is load-bearing: per-instance
//! shapes must precede the generic per-component catch-alls, or the catch-all
//! shadows them. The table is data, not code, so precedence can be inspected
//! and tested without executing rules.
//!
//! Two entry points:
//! - [`classify`] probes the filesystem where a shape requires a directory or
//!   a file (disambiguating a bare entity directory from a file of the same
//!   name pattern);
//! - [`classify_virtual`] additionally falls back to rules that assume
//!   non-existence, for paths created remotely but not yet pulled locally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::kinds::ContentKind;

/// One segment of a path shape
#[derive(Debug, Clone, Copy)]
pub enum Seg {
    /// Exact segment name
    Lit(&'static str),
    /// Any single segment
    Any,
    /// Single segment matching a prefix and a suffix (either may be empty)
    Like {
        prefix: &'static str,
        suffix: &'static str,
    },
    /// One or more trailing segments; only valid in final position
    Rest,
}

impl Seg {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Seg::Lit(s) => *s == segment,
            Seg::Any | Seg::Rest => true,
            Seg::Like { prefix, suffix } => {
                segment.len() >= prefix.len() + suffix.len()
                    && segment.starts_with(prefix)
                    && segment.ends_with(suffix)
            }
        }
    }
}

/// What the rule requires the path to be on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    File,
    Dir,
    Either,
}

/// A single classification rule
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub shape: &'static [Seg],
    pub entry: Entry,
    pub kind: ContentKind,
}

use ContentKind::*;
use Entry::{Dir, Either, File};
use Seg::{Any, Lit, Rest};

const CSS: Seg = Seg::Like {
    prefix: "",
    suffix: ".css",
};
const HTML: Seg = Seg::Like {
    prefix: "",
    suffix: ".html",
};
const MESSAGES: Seg = Seg::Like {
    prefix: "messages_",
    suffix: ".json",
};
const JSON: Seg = Seg::Like {
    prefix: "",
    suffix: ".json",
};

/// The ordered rule table. First match wins.
pub static RULES: &[Rule] = &[
    // Component instances before anything component-shaped: the generic
    // per-component catch-alls below would otherwise swallow these.
    rule(
        &[Lit("components"), Any, Lit("instances"), Any, Any, Lit("instance.json")],
        File,
        InstanceMeta,
    ),
    rule(
        &[Lit("components"), Any, Lit("instances"), Any, Any, Lit("styles.css")],
        File,
        InstanceStyle,
    ),
    rule(
        &[Lit("components"), Any, Lit("instances"), Any, Any, Lit("settings.json")],
        File,
        InstanceSettings,
    ),
    rule(&[Lit("components"), Any, Lit("instances"), Any, Any], Dir, InstanceDir),
    rule(
        &[Lit("components"), Any, Lit("instances"), Any, Any, Rest],
        File,
        InstanceAsset,
    ),
    // Base component files
    rule(&[Lit("components"), Any, Lit("component.json")], File, ComponentMeta),
    rule(&[Lit("components"), Any, Lit("markup.html")], File, ComponentTemplate),
    rule(&[Lit("components"), Any, Lit("styles.css")], File, ComponentStyle),
    rule(
        &[Lit("components"), Any, Lit("preview.html")],
        File,
        ComponentPreviewTemplate,
    ),
    rule(&[Lit("components"), Any, Lit("behavior.js")], File, ComponentScript),
    rule(&[Lit("components"), Any, Lit("fields.json")], File, ComponentFields),
    rule(&[Lit("components"), Any, Lit("icon.svg")], File, ComponentIcon),
    rule(&[Lit("components"), Any, MESSAGES], File, ComponentMessages),
    rule(&[Lit("components"), Any, Lit("readme.md")], File, ComponentDoc),
    rule(&[Lit("components"), Any, HTML], File, ComponentExtraTemplate),
    rule(&[Lit("components"), Any, CSS], File, ComponentExtraStyle),
    // KNOWN QUIRK: shadowed by the extra-style rule above, so preview.css
    // classifies as component-extra-style. Kept in place until the rule
    // precedence question for additional files is settled.
    rule(
        &[Lit("components"), Any, Lit("preview.css")],
        File,
        ComponentPreviewStyle,
    ),
    rule(&[Lit("components"), Any], Dir, ComponentDir),
    rule(&[Lit("components"), Any, Rest], File, ComponentAsset),
    // Themes
    rule(&[Lit("themes"), Any, Lit("theme.json")], File, ThemeMeta),
    rule(&[Lit("themes"), Any, Lit("variables.css")], File, ThemeVariables),
    rule(&[Lit("themes"), Any, Lit("overrides.css")], File, ThemeOverrides),
    rule(&[Lit("themes"), Any], Dir, ThemeDir),
    rule(&[Lit("themes"), Any, Rest], File, ThemeAsset),
    // Shared global fragments
    rule(&[Lit("fragments"), Any, Lit("fragment.json")], File, FragmentMeta),
    rule(&[Lit("fragments"), Any, Lit("template.html")], File, FragmentTemplate),
    rule(&[Lit("fragments"), Any, Lit("styles.css")], File, FragmentStyle),
    rule(&[Lit("fragments"), Any, Lit("fields.json")], File, FragmentFields),
    rule(&[Lit("fragments"), Any], Dir, FragmentDir),
    rule(&[Lit("fragments"), Any, Rest], File, FragmentAsset),
    // Stack instances before base-stack catch-alls, same reason as components.
    rule(
        &[Lit("stacks"), Any, Lit("instances"), Any, Any, Lit("instance.json")],
        File,
        StackInstanceMeta,
    ),
    rule(
        &[Lit("stacks"), Any, Lit("instances"), Any, Any, Lit("placement.json")],
        File,
        StackInstancePlacement,
    ),
    rule(&[Lit("stacks"), Any, Lit("instances"), Any, Any], Dir, StackInstanceDir),
    rule(
        &[Lit("stacks"), Any, Lit("instances"), Any, Any, Rest],
        File,
        StackInstanceAsset,
    ),
    // Base stacks
    rule(&[Lit("stacks"), Any, Lit("stack.json")], File, StackMeta),
    rule(&[Lit("stacks"), Any, Lit("layout.json")], File, StackLayout),
    rule(&[Lit("stacks"), Any, Lit("regions"), JSON], File, StackRegion),
    rule(&[Lit("stacks"), Any], Dir, StackDir),
    rule(&[Lit("stacks"), Any, Rest], File, StackAsset),
    // Site settings
    rule(&[Lit("settings"), Any, Lit("settings.json")], File, SettingsMeta),
    rule(&[Lit("settings"), Any, Lit("values.json")], File, SettingsValues),
    rule(&[Lit("settings"), Any], Dir, SettingsDir),
    rule(&[Lit("settings"), Any, Rest], File, SettingsAsset),
    // Sites
    rule(&[Lit("sites"), Any, Lit("site.json")], File, SiteMeta),
    rule(&[Lit("sites"), Any], Dir, SiteDir),
];

const fn rule(shape: &'static [Seg], entry: Entry, kind: ContentKind) -> Rule {
    Rule { shape, entry, kind }
}

/// How entry requirements are checked
#[derive(Debug, Clone, Copy)]
enum Probe {
    /// Ask the filesystem
    Fs,
    /// Assume non-existence: a dotted final segment counts as a file, an
    /// undotted one as a directory
    Assume,
}

fn entry_matches(entry: Entry, path: &Path, last_segment: &str, probe: Probe) -> bool {
    match (entry, probe) {
        (Either, _) => true,
        (File, Probe::Fs) => path.is_file(),
        (Dir, Probe::Fs) => path.is_dir(),
        (File, Probe::Assume) => last_segment.contains('.'),
        (Dir, Probe::Assume) => !last_segment.contains('.'),
    }
}

fn shape_matches(shape: &[Seg], segments: &[&str]) -> bool {
    match shape.last() {
        Some(Seg::Rest) => {
            let head = &shape[..shape.len() - 1];
            segments.len() > head.len()
                && head.iter().zip(segments).all(|(s, seg)| s.matches(seg))
        }
        _ => {
            segments.len() == shape.len()
                && shape.iter().zip(segments).all(|(s, seg)| s.matches(seg))
        }
    }
}

fn eval(path: &Path, segments: &[&str], probe: Probe) -> Option<ContentKind> {
    let last = *segments.last()?;
    RULES
        .iter()
        .find(|r| shape_matches(r.shape, segments) && entry_matches(r.entry, path, last, probe))
        .map(|r| r.kind)
}

fn relative_segments<'a>(root: &Path, path: &'a Path) -> Option<Vec<&'a str>> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Classify a path that exists locally. `None` means unrecognized.
pub fn classify(root: &Path, path: &Path) -> Option<ContentKind> {
    let segments = relative_segments(root, path)?;
    eval(path, &segments, Probe::Fs)
}

/// Classify a path that may not exist locally yet
///
/// Runs the normal table first, then re-runs it assuming non-existence, so
/// content just created remotely resolves to the kind its shape implies.
pub fn classify_virtual(root: &Path, path: &Path) -> Option<ContentKind> {
    let segments = relative_segments(root, path)?;
    eval(path, &segments, Probe::Fs).or_else(|| eval(path, &segments, Probe::Assume))
}

/// Per-run memoizing classifier
///
/// Classification consults the filesystem, so results are cached for the
/// duration of a run: a path is classified exactly once against one stable
/// snapshot of the tree.
pub struct Classifier {
    root: PathBuf,
    // The two entry points answer differently for absent paths, so each
    // keeps its own memo.
    memo: RefCell<HashMap<PathBuf, Option<ContentKind>>>,
    virtual_memo: RefCell<HashMap<PathBuf, Option<ContentKind>>>,
}

impl Classifier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            memo: RefCell::new(HashMap::new()),
            virtual_memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Memoized [`classify`]
    pub fn classify(&self, path: &Path) -> Option<ContentKind> {
        if let Some(kind) = self.memo.borrow().get(path) {
            return *kind;
        }
        let kind = classify(&self.root, path);
        self.memo.borrow_mut().insert(path.to_path_buf(), kind);
        kind
    }

    /// Memoized [`classify_virtual`]
    pub fn classify_virtual(&self, path: &Path) -> Option<ContentKind> {
        if let Some(kind) = self.virtual_memo.borrow().get(path) {
            return *kind;
        }
        let kind = classify_virtual(&self.root, path);
        self.virtual_memo
            .borrow_mut()
            .insert(path.to_path_buf(), kind);
        kind
    }
}

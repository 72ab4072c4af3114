//! Core data models for Stitch
//!
//! Defines the fundamental data structures used throughout Stitch:
//! - `EntityClass`: the remote entity classes the server keeps descriptors for
//! - `EntityKey`: the natural key (name + optional version) used for resolution
//! - `Descriptor`: the server's canonical record for one entity
//! - `FragmentType`: shared-fragment types with their creation ordinal
//! - `PushTarget`: the remote node a push is aimed at

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote entity classes the resolver cache keeps one descriptor slice for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityClass {
    Component,
    ComponentInstance,
    Theme,
    Fragment,
    Stack,
    StackInstance,
    Settings,
    Site,
}

impl EntityClass {
    /// All entity classes, in the order their collections are fetched
    pub const ALL: [EntityClass; 8] = [
        EntityClass::Component,
        EntityClass::ComponentInstance,
        EntityClass::Theme,
        EntityClass::Fragment,
        EntityClass::Stack,
        EntityClass::StackInstance,
        EntityClass::Settings,
        EntityClass::Site,
    ];

    /// Collection name used when talking to the remote collaborator
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Component => "components",
            EntityClass::ComponentInstance => "component-instances",
            EntityClass::Theme => "themes",
            EntityClass::Fragment => "fragments",
            EntityClass::Stack => "stacks",
            EntityClass::StackInstance => "stack-instances",
            EntityClass::Settings => "settings",
            EntityClass::Site => "sites",
        }
    }

    /// Name of the metadata file inside a local entity directory
    pub fn meta_file(&self) -> &'static str {
        match self {
            EntityClass::Component => "component.json",
            EntityClass::ComponentInstance | EntityClass::StackInstance => "instance.json",
            EntityClass::Theme => "theme.json",
            EntityClass::Fragment => "fragment.json",
            EntityClass::Stack => "stack.json",
            EntityClass::Settings => "settings.json",
            EntityClass::Site => "site.json",
        }
    }

    /// Whether the same name may exist at multiple versions remotely
    ///
    /// Components are versioned; every other class resolves by name alone.
    pub fn versioned(&self) -> bool {
        matches!(self, EntityClass::Component)
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key for resolving a local entity against the remote collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub name: String,
    pub version: Option<String>,
}

impl EntityKey {
    /// Key for a singleton class (name alone)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Key for a versioned class
    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// The remote server's canonical record for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Remote identity
    pub id: String,

    /// Display name used in the natural key
    pub name: String,

    /// Version, for classes where the same name exists at multiple versions
    #[serde(default)]
    pub version: Option<String>,

    /// User-editable display name as the server normalized it
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,

    /// Subtype tag (fragment type, settings group kind, ...)
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
}

impl Descriptor {
    /// Natural key for this descriptor within its class
    pub fn key(&self, class: EntityClass) -> EntityKey {
        if class.versioned() {
            match &self.version {
                Some(v) => EntityKey::versioned(&self.name, v),
                None => EntityKey::new(&self.name),
            }
        } else {
            EntityKey::new(&self.name)
        }
    }
}

/// Shared-fragment types
///
/// Fragments may reference each other by remote identity, so creation is
/// strictly ordered: leaf types first, container and hidden types next, the
/// top-level composite type last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
    Text,
    Image,
    Link,
    Embed,
    Container,
    Hidden,
    Composite,
}

impl FragmentType {
    /// Creation ordinal: lower ordinals are created first
    pub fn ordinal(&self) -> u8 {
        match self {
            FragmentType::Text | FragmentType::Image | FragmentType::Link | FragmentType::Embed => {
                0
            }
            FragmentType::Container | FragmentType::Hidden => 1,
            FragmentType::Composite => 2,
        }
    }

    /// Parse the `type` field of a fragment metadata file
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FragmentType::Text),
            "image" => Some(FragmentType::Image),
            "link" => Some(FragmentType::Link),
            "embed" => Some(FragmentType::Embed),
            "container" => Some(FragmentType::Container),
            "hidden" => Some(FragmentType::Hidden),
            "composite" => Some(FragmentType::Composite),
            _ => None,
        }
    }
}

/// The remote node a push run is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    /// Node identity, used to namespace local etag tokens
    pub node: String,

    /// Server version reported for that node
    pub server_version: String,
}

impl PushTarget {
    pub fn new(node: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            server_version: server_version.into(),
        }
    }
}

//! The closed content-kind taxonomy
//!
//! Every tracked path is assigned exactly one `ContentKind` per run. A kind
//! knows which entity class it belongs to and whether it carries a hardcoded
//! drip-feed limit (a low concurrency cap encoding a known server-side
//! compilation path that is not safe to hit in parallel).

use serde::Serialize;
use std::fmt;

use crate::models::EntityClass;

/// One tag from the closed classification taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    // Base components
    ComponentDir,
    ComponentMeta,
    ComponentTemplate,
    ComponentStyle,
    ComponentPreviewTemplate,
    ComponentPreviewStyle,
    ComponentScript,
    ComponentFields,
    ComponentIcon,
    ComponentMessages,
    ComponentDoc,
    ComponentExtraTemplate,
    ComponentExtraStyle,
    ComponentAsset,

    // Component instances
    InstanceDir,
    InstanceMeta,
    InstanceStyle,
    InstanceSettings,
    InstanceAsset,

    // Themes
    ThemeDir,
    ThemeMeta,
    ThemeVariables,
    ThemeOverrides,
    ThemeAsset,

    // Shared global fragments
    FragmentDir,
    FragmentMeta,
    FragmentTemplate,
    FragmentStyle,
    FragmentFields,
    FragmentAsset,

    // Page-region stacks
    StackDir,
    StackMeta,
    StackLayout,
    StackRegion,
    StackAsset,

    // Stack instances
    StackInstanceDir,
    StackInstanceMeta,
    StackInstancePlacement,
    StackInstanceAsset,

    // Site settings
    SettingsDir,
    SettingsMeta,
    SettingsValues,
    SettingsAsset,

    // Sites
    SiteDir,
    SiteMeta,
}

impl ContentKind {
    /// The entity class this kind belongs to
    pub fn entity_class(&self) -> EntityClass {
        use ContentKind::*;
        match self {
            ComponentDir | ComponentMeta | ComponentTemplate | ComponentStyle
            | ComponentPreviewTemplate | ComponentPreviewStyle | ComponentScript
            | ComponentFields | ComponentIcon | ComponentMessages | ComponentDoc
            | ComponentExtraTemplate | ComponentExtraStyle | ComponentAsset => {
                EntityClass::Component
            }
            InstanceDir | InstanceMeta | InstanceStyle | InstanceSettings | InstanceAsset => {
                EntityClass::ComponentInstance
            }
            ThemeDir | ThemeMeta | ThemeVariables | ThemeOverrides | ThemeAsset => {
                EntityClass::Theme
            }
            FragmentDir | FragmentMeta | FragmentTemplate | FragmentStyle | FragmentFields
            | FragmentAsset => EntityClass::Fragment,
            StackDir | StackMeta | StackLayout | StackRegion | StackAsset => EntityClass::Stack,
            StackInstanceDir | StackInstanceMeta | StackInstancePlacement | StackInstanceAsset => {
                EntityClass::StackInstance
            }
            SettingsDir | SettingsMeta | SettingsValues | SettingsAsset => EntityClass::Settings,
            SiteDir | SiteMeta => EntityClass::Site,
        }
    }

    /// Hardcoded safe concurrency limit for drip-fed kinds
    ///
    /// These caps are never exceeded regardless of the general concurrency
    /// policy: the server compiles stack layouts and fragment templates on a
    /// non-thread-safe path, and instance style sheets tolerate only a small
    /// amount of parallelism.
    pub fn drip_limit(&self) -> Option<usize> {
        match self {
            ContentKind::StackLayout | ContentKind::StackRegion | ContentKind::FragmentTemplate => {
                Some(1)
            }
            ContentKind::InstanceStyle => Some(2),
            _ => None,
        }
    }

    /// Whether this kind tags a directory rather than a file
    pub fn is_directory(&self) -> bool {
        matches!(
            self,
            ContentKind::ComponentDir
                | ContentKind::InstanceDir
                | ContentKind::ThemeDir
                | ContentKind::FragmentDir
                | ContentKind::StackDir
                | ContentKind::StackInstanceDir
                | ContentKind::SettingsDir
                | ContentKind::SiteDir
        )
    }

    /// Whether this kind is the metadata file of its entity
    ///
    /// Metadata kinds are eligible for display-field reconciliation after an
    /// accepted push.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            ContentKind::ComponentMeta
                | ContentKind::InstanceMeta
                | ContentKind::ThemeMeta
                | ContentKind::FragmentMeta
                | ContentKind::StackMeta
                | ContentKind::StackInstanceMeta
                | ContentKind::SettingsMeta
                | ContentKind::SiteMeta
        )
    }

    /// Stable tag used in diagnostics
    pub fn as_str(&self) -> &'static str {
        use ContentKind::*;
        match self {
            ComponentDir => "component-dir",
            ComponentMeta => "component-meta",
            ComponentTemplate => "component-template",
            ComponentStyle => "component-style",
            ComponentPreviewTemplate => "component-preview-template",
            ComponentPreviewStyle => "component-preview-style",
            ComponentScript => "component-script",
            ComponentFields => "component-fields",
            ComponentIcon => "component-icon",
            ComponentMessages => "component-messages",
            ComponentDoc => "component-doc",
            ComponentExtraTemplate => "component-extra-template",
            ComponentExtraStyle => "component-extra-style",
            ComponentAsset => "component-asset",
            InstanceDir => "instance-dir",
            InstanceMeta => "instance-meta",
            InstanceStyle => "instance-style",
            InstanceSettings => "instance-settings",
            InstanceAsset => "instance-asset",
            ThemeDir => "theme-dir",
            ThemeMeta => "theme-meta",
            ThemeVariables => "theme-variables",
            ThemeOverrides => "theme-overrides",
            ThemeAsset => "theme-asset",
            FragmentDir => "fragment-dir",
            FragmentMeta => "fragment-meta",
            FragmentTemplate => "fragment-template",
            FragmentStyle => "fragment-style",
            FragmentFields => "fragment-fields",
            FragmentAsset => "fragment-asset",
            StackDir => "stack-dir",
            StackMeta => "stack-meta",
            StackLayout => "stack-layout",
            StackRegion => "stack-region",
            StackAsset => "stack-asset",
            StackInstanceDir => "stack-instance-dir",
            StackInstanceMeta => "stack-instance-meta",
            StackInstancePlacement => "stack-instance-placement",
            StackInstanceAsset => "stack-instance-asset",
            SettingsDir => "settings-dir",
            SettingsMeta => "settings-meta",
            SettingsValues => "settings-values",
            SettingsAsset => "settings-asset",
            SiteDir => "site-dir",
            SiteMeta => "site-meta",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

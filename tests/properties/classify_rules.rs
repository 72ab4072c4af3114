//! Property tests for the classification rule table.

use proptest::prelude::*;
use std::path::{Path, PathBuf};

use stitch::{classify, classify_virtual, ContentKind};

fn segment() -> impl Strategy<Value = String> {
    // Entity and site names as they occur in real trees: no separators, no
    // leading dots (hidden entries never reach the classifier).
    proptest::string::string_regex("[A-Za-z0-9][A-Za-z0-9_-]{0,15}").unwrap()
}

fn arbitrary_relative_path() -> impl Strategy<Value = PathBuf> {
    let piece = proptest::string::string_regex("[A-Za-z0-9._-]{1,12}").unwrap();
    proptest::collection::vec(piece, 1..=7).prop_map(|segments| segments.iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: classification is deterministic under unchanged filesystem
    /// state: the same path always yields the same kind.
    #[test]
    fn property_classification_is_deterministic(rel in arbitrary_relative_path()) {
        let root = Path::new("/content");
        let path = root.join(&rel);

        prop_assert_eq!(classify(root, &path), classify(root, &path));
        prop_assert_eq!(classify_virtual(root, &path), classify_virtual(root, &path));
    }

    /// PROPERTY: classification never panics, whatever the path looks like.
    #[test]
    fn property_classify_never_panics(rel in arbitrary_relative_path()) {
        let root = Path::new("/content");
        let _ = classify(root, &root.join(&rel));
        let _ = classify_virtual(root, &root.join(&rel));

        // Paths outside the root are always unrecognized, never a panic.
        prop_assert_eq!(classify(Path::new("/other"), &root.join(&rel)), None);
    }

    /// PROPERTY: the per-instance style rule beats the per-component
    /// catch-alls for every component, site, and instance name.
    #[test]
    fn property_instance_styles_win_over_catch_alls(
        component in segment(),
        site in segment(),
        instance in segment(),
    ) {
        let root = Path::new("/content");
        let path = root
            .join("components")
            .join(&component)
            .join("instances")
            .join(&site)
            .join(&instance)
            .join("styles.css");

        prop_assert_eq!(
            classify_virtual(root, &path),
            Some(ContentKind::InstanceStyle)
        );
    }

    /// PROPERTY: virtual classification resolves well-formed shapes even
    /// though nothing exists on disk.
    #[test]
    fn property_virtual_resolution_covers_entity_dirs(name in segment()) {
        let root = Path::new("/content");

        prop_assert_eq!(
            classify_virtual(root, &root.join("components").join(&name)),
            Some(ContentKind::ComponentDir)
        );
        prop_assert_eq!(
            classify_virtual(root, &root.join("themes").join(&name)),
            Some(ContentKind::ThemeDir)
        );
        prop_assert_eq!(
            classify_virtual(root, &root.join("fragments").join(&name).join("template.html")),
            Some(ContentKind::FragmentTemplate)
        );

        // The strict entry point refuses what is not on disk.
        prop_assert_eq!(classify(root, &root.join("components").join(&name)), None);
    }
}

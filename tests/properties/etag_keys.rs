//! Property tests for etag token derivation and node namespacing.

use proptest::prelude::*;

use stitch::etag::{sanitize_node, EtagStore};

fn node_string() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9:/@ .-]{1,20}").unwrap()
}

fn relative_asset() -> impl Strategy<Value = String> {
    let segment = proptest::string::string_regex("[A-Za-z0-9][A-Za-z0-9_-]{0,11}").unwrap();
    let file = proptest::string::string_regex("[A-Za-z0-9_-]{1,12}\\.[a-z]{2,4}").unwrap();
    (proptest::collection::vec(segment, 1..=4), file)
        .prop_map(|(dirs, file)| format!("{}/{}", dirs.join("/"), file))
}

fn token() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9=_-]{1,24}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: sanitizing a node identity is idempotent and always yields
    /// a file-name-safe string.
    #[test]
    fn property_sanitize_node_is_idempotent(node in node_string()) {
        let once = sanitize_node(&node);
        prop_assert_eq!(&sanitize_node(&once), &once);
        prop_assert!(once
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'));
    }

    /// PROPERTY: a written token reads back verbatim, and resetting makes a
    /// subsequent read yield absent.
    #[test]
    fn property_tokens_round_trip(rel in relative_asset(), tok in token()) {
        let dir = tempfile::tempdir().unwrap();
        let store = EtagStore::new(dir.path(), "author-1");
        let asset = dir.path().join(&rel);

        store.write(&asset, &tok).unwrap();
        prop_assert_eq!(store.read(&asset), tok);

        store.reset(&asset).unwrap();
        prop_assert_eq!(store.read(&asset), String::new());
    }

    /// PROPERTY: tokens for the same asset against different nodes never
    /// collide.
    #[test]
    fn property_nodes_never_collide(
        rel in relative_asset(),
        node_a in node_string(),
        node_b in node_string(),
    ) {
        prop_assume!(sanitize_node(&node_a) != sanitize_node(&node_b));

        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join(&rel);
        let store_a = EtagStore::new(dir.path(), &node_a);
        let store_b = EtagStore::new(dir.path(), &node_b);

        store_a.write(&asset, "token-a").unwrap();
        store_b.write(&asset, "token-b").unwrap();

        prop_assert_eq!(store_a.read(&asset), "token-a");
        prop_assert_eq!(store_b.read(&asset), "token-b");
    }

    /// PROPERTY: every token file lands under the hidden tracking directory,
    /// never beside the tracked content.
    #[test]
    fn property_tokens_stay_inside_the_tracking_dir(rel in relative_asset(), tok in token()) {
        let dir = tempfile::tempdir().unwrap();
        let store = EtagStore::new(dir.path(), "author-1");
        let asset = dir.path().join(&rel);

        store.write(&asset, &tok).unwrap();

        let mut stack = vec![dir.path().to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                if entry.file_type().unwrap().is_dir() {
                    if entry.file_name() != ".stitch" {
                        stack.push(path);
                    }
                } else {
                    // The only file outside .stitch would be tracked content,
                    // and this store never wrote any.
                    let inside = path.starts_with(dir.path().join(".stitch"));
                    prop_assert!(inside, "unexpected file outside .stitch: {}", path.display());
                }
            }
        }
    }
}

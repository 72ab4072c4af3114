//! Concurrency-bound verification against an instrumented collaborator.
//!
//! Every operation tracks an in-flight gauge; the high-water mark proves no
//! bucket ever exceeds its bound. These run on a current-thread runtime:
//! "concurrency" is outstanding operations, not threads.

mod common;

use common::*;

use stitch::{ContentKind, EntityClass, OperationRegistry, PushEngine, PushOptions, PushTarget};

fn target() -> PushTarget {
    PushTarget::new(NODE, SERVER_VERSION)
}

#[tokio::test]
async fn explicit_bound_caps_outstanding_operations() {
    init_tracing();
    let env = TestEnv::new();
    env.add_stack("header");
    for i in 0..6 {
        env.add_stack_instance("header", "main", &format!("s{i}"));
    }

    let remote = StubRemote::new()
        .with(EntityClass::Stack, vec![descriptor("s-1", "header")])
        .with(EntityClass::StackInstance, vec![]);
    let gauge = Gauge::new();
    let updates = call_log();
    let mut registry = OperationRegistry::new();
    record_updates(
        &mut registry,
        &[
            ContentKind::StackInstanceMeta,
            ContentKind::StackInstancePlacement,
        ],
        &gauge,
        &updates,
    );
    record_ensures(&mut registry, EntityClass::StackInstance, &call_log());

    let engine = PushEngine::new(&remote, registry, target()).with_options(PushOptions {
        concurrency: Some(3),
        ..Default::default()
    });
    let report = engine.push_tree(env.root.path()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(logged(&updates).len(), 12);
    // Twelve files were dispatched, never more than three in flight.
    assert_eq!(gauge.high_water(), 3);
}

#[tokio::test]
async fn theme_files_update_one_at_a_time() {
    let env = TestEnv::new();
    env.add_theme("dark");
    env.add_theme("light");

    let remote = StubRemote::new().with(
        EntityClass::Theme,
        vec![descriptor("t-1", "dark"), descriptor("t-2", "light")],
    );
    let gauge = Gauge::new();
    let updates = call_log();
    let mut registry = OperationRegistry::new();
    record_updates(
        &mut registry,
        &[
            ContentKind::ThemeMeta,
            ContentKind::ThemeVariables,
            ContentKind::ThemeOverrides,
        ],
        &gauge,
        &updates,
    );

    let engine = PushEngine::new(&remote, registry, target());
    let report = engine.push_tree(env.root.path()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(logged(&updates).len(), 6);
    // Two themes, six co-etagged files, strictly one outstanding update.
    assert_eq!(gauge.high_water(), 1);
}

#[tokio::test]
async fn instance_styles_never_exceed_their_hardcoded_cap() {
    let env = TestEnv::new();
    env.add_component("hero");
    for i in 0..5 {
        env.add_instance("hero", "main", &format!("i{i}"));
    }

    let remote = StubRemote::new()
        .with(EntityClass::Component, vec![descriptor("c-1", "hero")]);
    let style_gauge = Gauge::new();
    let rest_gauge = Gauge::new();
    let styles = call_log();
    let rest = call_log();
    let mut registry = OperationRegistry::new();
    record_updates(&mut registry, &[ContentKind::InstanceStyle], &style_gauge, &styles);
    record_updates(
        &mut registry,
        &[
            ContentKind::InstanceMeta,
            ContentKind::ComponentMeta,
            ContentKind::ComponentTemplate,
            ContentKind::ComponentStyle,
        ],
        &rest_gauge,
        &rest,
    );
    record_ensures(&mut registry, EntityClass::ComponentInstance, &call_log());

    let engine = PushEngine::new(&remote, registry, target());
    let report = engine.push_tree(env.root.path()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(logged(&styles).len(), 5);
    // The general policy allows more, the per-kind cap does not.
    assert_eq!(style_gauge.high_water(), 2);
    // The generic leftover group is serialized.
    assert_eq!(rest_gauge.high_water(), 1);
}

#[tokio::test]
async fn careful_mode_serializes_everything() {
    let env = TestEnv::new();
    env.write(".stitch/config.toml", "careful = true\n");
    env.add_component("hero");
    for i in 0..4 {
        env.add_instance("hero", "main", &format!("i{i}"));
    }

    let remote = StubRemote::new()
        .with(EntityClass::Component, vec![descriptor("c-1", "hero")]);
    let gauge = Gauge::new();
    let styles = call_log();
    let mut registry = OperationRegistry::new();
    record_updates(&mut registry, &[ContentKind::InstanceStyle], &gauge, &styles);
    record_ensures(&mut registry, EntityClass::ComponentInstance, &call_log());

    // Careful mode wins even over an explicit override.
    let engine = PushEngine::new(&remote, registry, target()).with_options(PushOptions {
        concurrency: Some(10),
        ..Default::default()
    });
    let report = engine.push_tree(env.root.path()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(logged(&styles).len(), 4);
    assert_eq!(gauge.high_water(), 1);
}

#[tokio::test]
async fn drip_fed_fragment_templates_are_serialized() {
    let env = TestEnv::new();
    for name in ["a", "b", "c"] {
        env.add_fragment(name, "text");
    }

    let remote = StubRemote::new().with(
        EntityClass::Fragment,
        vec![
            descriptor("f-1", "a"),
            descriptor("f-2", "b"),
            descriptor("f-3", "c"),
        ],
    );
    let gauge = Gauge::new();
    let templates = call_log();
    let rest_log = call_log();
    let mut registry = OperationRegistry::new();
    record_updates(&mut registry, &[ContentKind::FragmentTemplate], &gauge, &templates);
    record_updates(
        &mut registry,
        &[ContentKind::FragmentMeta],
        &Gauge::new(),
        &rest_log,
    );

    let engine = PushEngine::new(&remote, registry, target());
    let report = engine.push_tree(env.root.path()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(logged(&templates).len(), 3);
    assert_eq!(gauge.high_water(), 1);
}

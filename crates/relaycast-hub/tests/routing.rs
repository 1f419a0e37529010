#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use relaycast_hub::config;
use relaycast_hub::reload::RoutePause;
use relaycast_hub::routing::{PatternMatcher, Router};

fn router_from(yaml: &str) -> (Router, Arc<RoutePause>) {
    let cfg = config::load_from_str(yaml).expect("config must parse");
    let pause = Arc::new(RoutePause::new());
    let router = Router::new(&cfg, Arc::new(PatternMatcher::new()), Arc::clone(&pause));
    (router, pause)
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn group_routes_full_mesh_minus_sender() {
    let (router, _) = router_from(
        r#"
groups:
  - name: "全平台互通"
    members: [creative, survival, test_client, debug_client, qq_bot]
"#,
    );
    let connected = ids(&["creative", "survival", "test_client"]);
    let targets = router.resolve("creative", &connected);
    assert_eq!(targets, ids(&["survival", "test_client"]));
}

#[test]
fn first_declared_group_wins() {
    let (router, _) = router_from(
        r#"
groups:
  - name: "first"
    members: [a, b]
  - name: "second"
    members: [a, c]
"#,
    );
    let connected = ids(&["a", "b", "c"]);
    assert_eq!(router.resolve("a", &connected), ids(&["b"]));
}

#[test]
fn group_membership_short_circuits_rules() {
    let (router, _) = router_from(
        r#"
groups:
  - name: "pair"
    members: [a, b]
rules:
  - name: "a-to-everyone"
    from_sources: ["a"]
    to_targets: ["*"]
"#,
    );
    let connected = ids(&["a", "b", "c"]);
    // a is grouped, so the rule never fires and c is not reached
    assert_eq!(router.resolve("a", &connected), ids(&["b"]));
}

#[test]
fn rules_accumulate_and_dedup() {
    let (router, _) = router_from(
        r#"
rules:
  - name: "one"
    from_sources: ["sensor_*"]
    to_targets: [dashboard, archive]
  - name: "two"
    from_sources: ["*"]
    to_targets: [dashboard, alerting]
"#,
    );
    let connected = ids(&["sensor_1", "dashboard", "archive", "alerting"]);
    let targets = router.resolve("sensor_1", &connected);
    assert_eq!(targets, ids(&["dashboard", "archive", "alerting"]));
}

#[test]
fn star_target_expands_to_other_connected_peers() {
    let (router, _) = router_from(
        r#"
rules:
  - name: "broadcast"
    from_sources: []
    to_targets: ["*"]
"#,
    );
    let connected = ids(&["a", "b", "c"]);
    assert_eq!(router.resolve("a", &connected), ids(&["b", "c"]));
}

#[test]
fn disabled_rule_is_skipped() {
    let (router, _) = router_from(
        r#"
rules:
  - name: "off"
    from_sources: ["*"]
    to_targets: ["*"]
    enabled: false
"#,
    );
    let connected = ids(&["a", "b"]);
    assert!(router.resolve("a", &connected).is_empty());
}

#[test]
fn disconnected_targets_are_dropped() {
    let (router, _) = router_from(
        r#"
rules:
  - name: "pinned"
    from_sources: ["a"]
    to_targets: [b, c]
"#,
    );
    let connected = ids(&["a", "b"]);
    assert_eq!(router.resolve("a", &connected), ids(&["b"]));
}

#[test]
fn pause_empties_resolution_until_resume() {
    let (router, pause) = router_from(
        r#"
groups:
  - name: "pair"
    members: [a, b]
"#,
    );
    let connected = ids(&["a", "b"]);

    pause.pause("swap in progress");
    assert!(router.resolve("a", &connected).is_empty());

    pause.resume();
    assert_eq!(router.resolve("a", &connected), ids(&["b"]));
}

#[test]
fn static_route_validity_ignores_connections() {
    let (router, _) = router_from(
        r#"
groups:
  - name: "pair"
    members: [a, b]
rules:
  - name: "fan"
    from_sources: ["x"]
    to_targets: ["*"]
"#,
    );
    assert!(router.is_valid_route("a", "b"));
    assert!(router.is_valid_route("x", "anything"));
    assert!(!router.is_valid_route("b", "x"));
}

//! Tests for the container model.
//!
//! Validates kind signatures (drift detection against the significant
//! field set), identity assignment, and the configuration label codec.

use magikcompose::container::{Link, PortBinding, RestartPolicy, assign_identity, matches_kind};
use magikcompose::{
    CONFIG_LABEL, ContainerConfig, ContainerName, ContainerSpec, DesiredState, ImageRef,
    NAMESPACE_LABEL, ObservedContainer, RuntimeStatus,
};

fn name(s: &str) -> ContainerName {
    ContainerName::parse(s, "app").unwrap()
}

fn config(image: &str) -> ContainerConfig {
    ContainerConfig::new(ImageRef::parse(image).unwrap())
}

fn observed(
    id: &str,
    n: &str,
    config: ContainerConfig,
    status: RuntimeStatus,
) -> ObservedContainer {
    ObservedContainer {
        id: id.to_string(),
        name: name(n),
        status,
        exit_code: None,
        config,
        created_at: None,
    }
}

// =============================================================================
// Signature Stability Tests
// =============================================================================

#[test]
fn test_signature_is_deterministic() {
    let mut a = config("nginx:1.25");
    a.env.insert("A".into(), "1".into());
    a.env.insert("B".into(), "2".into());

    let mut b = config("nginx:1.25");
    b.env.insert("B".into(), "2".into());
    b.env.insert("A".into(), "1".into());

    assert_eq!(a.signature(), b.signature());
    assert_eq!(a.signature().as_str().len(), 64);
    assert_eq!(a.signature().to_string().len(), 12);
}

#[test]
fn test_signature_fills_default_tag() {
    assert_eq!(config("nginx").signature(), config("nginx:latest").signature());
    assert_ne!(config("nginx").signature(), config("nginx:1.25").signature());
}

#[test]
fn test_signature_ignores_relation_order() {
    let mut a = config("app:1");
    a.volumes_from = vec![name("data"), name("logs")];
    a.links = vec![
        Link { target: name("db"), alias: None },
        Link { target: name("cache"), alias: Some("redis".into()) },
    ];

    let mut b = config("app:1");
    b.volumes_from = vec![name("logs"), name("data")];
    b.links = vec![
        Link { target: name("cache"), alias: Some("redis".into()) },
        Link { target: name("db"), alias: None },
    ];

    assert_eq!(a.signature(), b.signature());
}

#[test]
fn test_signature_ignores_non_significant_fields() {
    let base = config("app:1");

    let mut stopped = base.clone();
    stopped.state = DesiredState::Stopped;
    assert_eq!(base.signature(), stopped.signature(), "declared state");

    let mut waits = base.clone();
    waits.wait_for = vec![name("db")];
    assert_eq!(base.signature(), waits.signature(), "wait_for");

    let mut reserved = base.clone();
    reserved
        .labels
        .insert("magikcompose.revision".into(), "42".into());
    assert_eq!(base.signature(), reserved.signature(), "reserved labels");
}

// =============================================================================
// Drift Detection Tests
// =============================================================================

#[test]
fn test_signature_detects_drift_in_each_significant_field() {
    let base = config("app:1");
    let mut variants: Vec<(&str, ContainerConfig)> = Vec::new();

    let mut c = base.clone();
    c.image = ImageRef::parse("app:2").unwrap();
    variants.push(("image", c));

    let mut c = base.clone();
    c.command = vec!["serve".into()];
    variants.push(("command", c));

    let mut c = base.clone();
    c.entrypoint = vec!["/bin/sh".into()];
    variants.push(("entrypoint", c));

    let mut c = base.clone();
    c.env.insert("MODE".into(), "prod".into());
    variants.push(("env", c));

    let mut c = base.clone();
    c.labels.insert("team".into(), "core".into());
    variants.push(("labels", c));

    let mut c = base.clone();
    c.volumes = vec!["/srv:/data".into()];
    variants.push(("volumes", c));

    let mut c = base.clone();
    c.volumes_from = vec![name("data")];
    variants.push(("volumes_from", c));

    let mut c = base.clone();
    c.links = vec![Link { target: name("db"), alias: None }];
    variants.push(("links", c));

    let mut c = base.clone();
    c.ports = vec![PortBinding {
        container_port: 80,
        protocol: "tcp".into(),
        host_ip: None,
        host_port: Some(8080),
    }];
    variants.push(("ports", c));

    let mut c = base.clone();
    c.restart = RestartPolicy::Always;
    variants.push(("restart", c));

    let mut c = base.clone();
    c.user = Some("nobody".into());
    variants.push(("user", c));

    let mut c = base.clone();
    c.working_dir = Some("/srv".into());
    variants.push(("working_dir", c));

    let mut c = base.clone();
    c.network_mode = Some("host".into());
    variants.push(("network_mode", c));

    let mut c = base.clone();
    c.memory_bytes = Some(256 * 1024 * 1024);
    variants.push(("memory_bytes", c));

    let mut c = base.clone();
    c.cpu_shares = Some(512);
    variants.push(("cpu_shares", c));

    for (field, variant) in variants {
        assert_ne!(
            base.signature(),
            variant.signature(),
            "changing {field} should change the signature"
        );
    }
}

#[test]
fn test_link_alias_is_significant() {
    let mut a = config("app:1");
    a.links = vec![Link { target: name("db"), alias: None }];
    let mut b = config("app:1");
    b.links = vec![Link { target: name("db"), alias: Some("database".into()) }];
    assert_ne!(a.signature(), b.signature());
}

// =============================================================================
// Matching Tests
// =============================================================================

#[test]
fn test_matches_kind_requires_name_and_signature() {
    let spec = ContainerSpec::new(name("web"), config("x:1"));

    let same = observed("id1", "web", config("x:1"), RuntimeStatus::Running);
    let other_name = observed("id2", "api", config("x:1"), RuntimeStatus::Running);
    let other_image = observed("id3", "web", config("x:2"), RuntimeStatus::Running);

    assert!(matches_kind(&spec, &same));
    assert!(!matches_kind(&spec, &other_name));
    assert!(!matches_kind(&spec, &other_image));
}

#[test]
fn test_matches_kind_ignores_runtime_status() {
    let spec = ContainerSpec::new(name("web"), config("x:1"));
    let exited = observed("id1", "web", config("x:1"), RuntimeStatus::Exited);
    assert!(matches_kind(&spec, &exited));
}

#[test]
fn test_assign_identity_carries_ids() {
    let mut expected = vec![
        ContainerSpec::new(name("web"), config("x:1")),
        ContainerSpec::new(name("db"), config("pg:16")),
    ];
    let actual = vec![
        observed("aaa", "web", config("x:1"), RuntimeStatus::Running),
        observed("bbb", "db", config("pg:15"), RuntimeStatus::Running),
    ];

    assign_identity(&mut expected, &actual);

    assert_eq!(expected[0].id.as_deref(), Some("aaa"));
    assert_eq!(expected[1].id, None, "different kind keeps no id");
}

#[test]
fn test_recovery_spec_uses_declared_state() {
    let mut cfg = config("x:1");
    cfg.state = DesiredState::Running;
    let crashed = observed("abc", "web", cfg, RuntimeStatus::Exited);

    let spec = crashed.to_recovery_spec();
    assert_eq!(spec.name, crashed.name);
    assert_eq!(spec.id.as_deref(), Some("abc"));
    assert!(spec.wants_running());
    assert!(!crashed.is_running());
}

// =============================================================================
// Runtime Status Tests
// =============================================================================

#[test]
fn test_runtime_status_running_flag() {
    assert!(RuntimeStatus::Running.is_running());
    assert!(RuntimeStatus::Paused.is_running());
    assert!(RuntimeStatus::Restarting.is_running());
    assert!(!RuntimeStatus::Created.is_running());
    assert!(!RuntimeStatus::Exited.is_running());
    assert!(!RuntimeStatus::Dead.is_running());
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_config_label_value_preserves_signature() {
    let mut cfg = config("registry.local:5000/team/app:3");
    cfg.env.insert("A".into(), "1".into());
    cfg.links = vec![Link { target: name("other.db"), alias: Some("db".into()) }];
    cfg.state = DesiredState::Stopped;

    let encoded = cfg.to_label_value().unwrap();
    let decoded = ContainerConfig::from_label_value(&encoded).unwrap();

    assert_eq!(decoded, cfg);
    assert_eq!(decoded.signature(), cfg.signature());
}

#[test]
fn test_observed_container_json_shape() {
    let container = observed("abc", "web", config("x:1"), RuntimeStatus::Running);
    let json = serde_json::to_value(&container).unwrap();

    assert_eq!(json["name"], "app.web");
    assert_eq!(json["status"], "running");
    assert_eq!(json["config"]["image"], "x:1");
}

#[test]
fn test_label_keys_are_reserved() {
    assert!(NAMESPACE_LABEL.starts_with(magikcompose::RESERVED_LABEL_PREFIX));
    assert!(CONFIG_LABEL.starts_with(magikcompose::RESERVED_LABEL_PREFIX));
}

#[test]
fn test_dependencies_are_sorted_and_unique() {
    let mut cfg = config("app:1");
    cfg.links = vec![Link { target: name("db"), alias: None }];
    cfg.volumes_from = vec![name("db"), name("data")];
    cfg.wait_for = vec![name("cache")];

    let deps: Vec<String> = cfg.dependencies().iter().map(ToString::to_string).collect();
    assert_eq!(deps, vec!["app.cache", "app.data", "app.db"]);

    let binding: Vec<String> = cfg
        .binding_dependencies()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(binding, vec!["app.data", "app.db"]);
}

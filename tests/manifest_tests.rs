//! Tests for manifest loading.
//!
//! Validates the YAML shape, reference resolution, field parsing and the
//! size, count and name limits.

use magikcompose::container::RestartPolicy;
use magikcompose::{
    ContainerName, DesiredState, Error, MAX_CONTAINERS_PER_MANIFEST, MAX_ENV_VARS_PER_CONTAINER,
    MAX_MANIFEST_SIZE, Manifest,
};
use std::io::Write;

fn parse(yaml: &str) -> Result<Manifest, Error> {
    Manifest::from_yaml(yaml.as_bytes())
}

// =============================================================================
// Basic Parsing Tests
// =============================================================================

#[test]
fn test_parse_full_container() {
    let manifest = parse(
        r#"
namespace: shop
containers:
  api:
    image: registry.local:5000/shop/api:1.4
    cmd: ["serve", "--port", 8080]
    entrypoint: /bin/app
    env:
      LOG_LEVEL: debug
      WORKERS: 4
      DEBUG: false
    labels:
      team: core
    volumes: ["/srv/api:/data:ro"]
    volumes_from: [data]
    links: ["db:database", "infra.cache"]
    wait_for: [migrate]
    ports: ["127.0.0.1:80:8080/tcp", "9090/udp"]
    restart: unless-stopped
    user: app
    workdir: /srv
    net: bridge
    memory: 512m
    cpu_shares: 256
  db:
    image: postgres:16
  data:
    image: busybox
  migrate:
    image: registry.local:5000/shop/api:1.4
    state: stopped
"#,
    )
    .unwrap();

    assert_eq!(manifest.namespace(), "shop");
    assert_eq!(manifest.containers().len(), 4);

    let api = manifest
        .containers()
        .iter()
        .find(|c| c.name.name() == "api")
        .unwrap();
    let config = &api.config;

    assert_eq!(config.image.to_string(), "registry.local:5000/shop/api:1.4");
    assert_eq!(config.command, vec!["serve", "--port", "8080"]);
    assert_eq!(config.entrypoint, vec!["/bin/app"]);
    assert_eq!(config.env["WORKERS"], "4");
    assert_eq!(config.env["DEBUG"], "false");
    assert_eq!(config.labels["team"], "core");
    assert_eq!(config.volumes, vec!["/srv/api:/data:ro"]);
    assert_eq!(config.volumes_from[0].to_string(), "shop.data");
    assert_eq!(config.links[0].target.to_string(), "shop.db");
    assert_eq!(config.links[0].alias.as_deref(), Some("database"));
    assert_eq!(config.links[1].target.to_string(), "infra.cache");
    assert_eq!(config.wait_for[0].to_string(), "shop.migrate");
    assert_eq!(config.ports.len(), 2);
    assert_eq!(config.ports[0].host_port, Some(80));
    assert_eq!(config.ports[1].protocol, "udp");
    assert_eq!(config.restart, RestartPolicy::UnlessStopped);
    assert_eq!(config.user.as_deref(), Some("app"));
    assert_eq!(config.working_dir.as_deref(), Some("/srv"));
    assert_eq!(config.network_mode.as_deref(), Some("bridge"));
    assert_eq!(config.memory_bytes, Some(512 * 1024 * 1024));
    assert_eq!(config.cpu_shares, Some(256));
    assert_eq!(config.state, DesiredState::Running);

    let migrate = manifest
        .containers()
        .iter()
        .find(|c| c.name.name() == "migrate")
        .unwrap();
    assert_eq!(migrate.config.state, DesiredState::Stopped);
}

#[test]
fn test_default_namespace() {
    let manifest = parse("containers:\n  web:\n    image: nginx\n").unwrap();
    assert_eq!(manifest.namespace(), "default");
    assert_eq!(manifest.containers()[0].name.to_string(), "default.web");
}

#[test]
fn test_empty_manifest_has_no_containers() {
    let manifest = parse("namespace: shop\n").unwrap();
    assert!(manifest.containers().is_empty());
    assert!(manifest.images().is_empty());
}

#[test]
fn test_env_list_form() {
    let manifest =
        parse("containers:\n  web:\n    image: nginx\n    env: [\"A=1\", \"B=x=y\"]\n").unwrap();
    let env = &manifest.containers()[0].config.env;
    assert_eq!(env["A"], "1");
    assert_eq!(env["B"], "x=y");
}

#[test]
fn test_images_are_distinct_and_normalized() {
    let manifest = parse(concat!(
        "containers:\n",
        "  a:\n    image: nginx\n",
        "  b:\n    image: nginx:latest\n",
        "  c:\n    image: redis:7\n",
    ))
    .unwrap();
    let images: Vec<String> = manifest.images().iter().map(ToString::to_string).collect();
    assert_eq!(images, vec!["nginx:latest", "redis:7"]);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_missing_image_rejected() {
    let err = parse("containers:\n  web:\n    cmd: [x]\n").unwrap_err();
    assert!(err.to_string().contains("image"));
}

#[test]
fn test_invalid_names_rejected() {
    assert!(matches!(
        parse("containers:\n  \"bad name\":\n    image: nginx\n"),
        Err(Error::InvalidContainerName { .. })
    ));
    assert!(matches!(
        parse("namespace: \"-shop\"\ncontainers:\n  web:\n    image: nginx\n"),
        Err(Error::InvalidContainerName { .. })
    ));
}

#[test]
fn test_invalid_image_rejected() {
    assert!(matches!(
        parse("containers:\n  web:\n    image: \"bad image\"\n"),
        Err(Error::InvalidImageReference { .. })
    ));
}

#[test]
fn test_invalid_fields_rejected() {
    let cases = [
        "containers:\n  web:\n    image: nginx\n    state: paused\n",
        "containers:\n  web:\n    image: nginx\n    restart: sometimes\n",
        "containers:\n  web:\n    image: nginx\n    ports: [\"http\"]\n",
        "containers:\n  web:\n    image: nginx\n    memory: lots\n",
        "containers:\n  web: nginx\n",
    ];
    for yaml in cases {
        assert!(
            matches!(parse(yaml), Err(Error::InvalidInput(_))),
            "should reject: {yaml}"
        );
    }
}

#[test]
fn test_self_reference_is_a_cycle() {
    for field in ["links", "volumes_from", "wait_for"] {
        let yaml = format!(
            "namespace: shop\ncontainers:\n  web:\n    image: nginx\n    {field}: [web]\n"
        );
        match parse(&yaml) {
            Err(Error::DependencyCycle(members)) => assert_eq!(members, "shop.web"),
            other => panic!("{field}: expected a cycle, got {other:?}"),
        }
    }
}

#[test]
fn test_malformed_yaml_rejected() {
    assert!(matches!(parse("containers: [\n"), Err(Error::Yaml(_))));
    assert!(matches!(parse("- just\n- a list\n"), Err(Error::InvalidInput(_))));
}

#[test]
fn test_oversized_manifest_rejected() {
    let yaml = format!("# {}\n", "x".repeat(MAX_MANIFEST_SIZE));
    assert!(matches!(parse(&yaml), Err(Error::InvalidInput(_))));
}

#[test]
fn test_too_many_containers_rejected() {
    let mut yaml = String::from("containers:\n");
    for i in 0..=MAX_CONTAINERS_PER_MANIFEST {
        yaml.push_str(&format!("  c{i}:\n    image: nginx\n"));
    }
    assert!(matches!(parse(&yaml), Err(Error::InvalidInput(_))));
}

#[test]
fn test_too_many_env_vars_rejected() {
    let mut yaml = String::from("containers:\n  web:\n    image: nginx\n    env:\n");
    for i in 0..=MAX_ENV_VARS_PER_CONTAINER {
        yaml.push_str(&format!("      V{i}: x\n"));
    }
    assert!(matches!(parse(&yaml), Err(Error::InvalidInput(_))));
}

// =============================================================================
// Programmatic Construction Tests
// =============================================================================

#[test]
fn test_new_rejects_duplicates_and_foreign_specs() {
    let web = parse("namespace: shop\ncontainers:\n  web:\n    image: nginx\n")
        .unwrap()
        .containers()[0]
        .clone();

    assert!(matches!(
        Manifest::new("shop", vec![web.clone(), web.clone()]),
        Err(Error::DuplicateContainer(_))
    ));
    assert!(matches!(
        Manifest::new("other", vec![web.clone()]),
        Err(Error::InvalidInput(_))
    ));
    assert!(Manifest::new("shop", vec![web]).is_ok());
}

// =============================================================================
// File Loading Tests
// =============================================================================

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "namespace: files").unwrap();
    writeln!(file, "containers:").unwrap();
    writeln!(file, "  web:").unwrap();
    writeln!(file, "    image: nginx:1.25").unwrap();

    let manifest = Manifest::from_file(file.path()).unwrap();
    assert_eq!(manifest.namespace(), "files");
    assert_eq!(
        manifest.containers()[0].name,
        ContainerName::new("files", "web").unwrap()
    );
}

#[test]
fn test_from_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = Manifest::from_file(dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

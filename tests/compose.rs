// ABOUTME: Integration tests for container spec composition.
// ABOUTME: Verifies defaults, independent sub-specs, and restart policy parsing.

use dockyard::orchestration::{
    ContainerSpec, CreateSpec, HostConfig, Mount, PortBinding, Protocol, PullSpec, RestartPolicy,
    Sink,
};
use dockyard::types::ImageRef;
use std::sync::Arc;

#[test]
fn default_spec_is_rooted_at_working_directory() {
    let spec = ContainerSpec::new_default().unwrap();
    let cwd = std::env::current_dir().unwrap();

    assert_eq!(spec.download.host_path, cwd);
    assert_eq!(spec.upload.host_path, cwd);
    assert_eq!(spec.attach.output, Sink::Stdout);
    assert_eq!(spec.attach.error, Sink::Stderr);
    assert!(spec.create.image.is_empty());
    assert!(spec.create.name.is_none());
}

#[test]
fn sub_specs_stand_alone() {
    let create = CreateSpec {
        image: "keys:latest".to_string(),
        command: vec!["keys".into(), "serve".into()],
        ..Default::default()
    };
    let mut spec = ContainerSpec::rooted_at("/tmp");
    spec.create = create.clone();

    assert_eq!(spec.create, create);
    assert_eq!(spec.pull, PullSpec::default());
}

#[test]
fn clones_share_host_config_until_written() {
    let mut spec = ContainerSpec::rooted_at("/tmp");
    spec.host_config_mut().mounts.push(Mount {
        source: "/var/keys".to_string(),
        target: "/keys".to_string(),
        read_only: true,
    });
    let snapshot = spec.clone();
    assert!(Arc::ptr_eq(
        &spec.create.host_config,
        &snapshot.create.host_config
    ));

    spec.host_config_mut().port_bindings.push(PortBinding {
        container_port: 4767,
        protocol: Protocol::Tcp,
        host_ip: None,
        host_port: Some(4767),
    });

    assert_eq!(snapshot.create.host_config.port_bindings.len(), 0);
    assert_eq!(spec.create.host_config.port_bindings.len(), 1);
    assert_eq!(spec.create.host_config.mounts, snapshot.create.host_config.mounts);
}

#[test]
fn host_config_defaults_to_no_restart() {
    let host = HostConfig::default();
    assert_eq!(host.restart_policy, RestartPolicy::No);
    assert!(!host.read_only_rootfs);
}

#[test]
fn restart_policies_parse() {
    assert_eq!("always".parse::<RestartPolicy>().unwrap(), RestartPolicy::Always);
    assert_eq!(
        "unless-stopped".parse::<RestartPolicy>().unwrap(),
        RestartPolicy::UnlessStopped
    );
    assert!("sometimes".parse::<RestartPolicy>().is_err());
}

#[test]
fn pull_spec_tracks_image_reference() {
    let image = ImageRef::parse("localhost:5000/eris/keys").unwrap();
    let pull = PullSpec::from(&image);
    assert_eq!(pull.repository, "localhost:5000/eris/keys");
    assert_eq!(pull.reference(), "localhost:5000/eris/keys:latest");
}

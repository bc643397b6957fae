// ABOUTME: Integration tests for copying files into and out of containers.
// ABOUTME: Uses temporary host directories and the in-memory engine's filesystem.

mod support;

use dockyard::orchestration::{ErrorKind, LifecycleController, Operation};
use dockyard::runtime::MemoryRuntime;
use std::fs;
use std::sync::Arc;
use support::captured_spec;

const IMAGE: &str = "keys:latest";

#[tokio::test]
async fn upload_then_download_is_byte_identical() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let host = tempfile::tempdir().unwrap();
    let payload = host.path().join("payload");
    fs::create_dir_all(payload.join("nested")).unwrap();
    fs::write(payload.join("keys.json"), br#"{"kid":"k1"}"#).unwrap();
    let binary: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
    fs::write(payload.join("nested/blob.bin"), &binary).unwrap();

    let out = tempfile::tempdir().unwrap();
    let (mut spec, _, _) = captured_spec(IMAGE, host.path());
    spec.upload.host_path = payload.clone();
    spec.download.host_path = out.path().to_path_buf();
    let mut controller = LifecycleController::with_spec(Arc::new(engine.clone()), spec);

    let id = controller.create().await.unwrap();
    controller.upload("/srv").await.unwrap();
    assert_eq!(
        engine.read_file(&id, "/srv/payload/keys.json").unwrap(),
        br#"{"kid":"k1"}"#
    );

    let mut written = controller.download("/srv/payload").await.unwrap();
    written.sort();
    assert_eq!(
        written,
        vec![
            out.path().join("payload/keys.json"),
            out.path().join("payload/nested/blob.bin"),
        ]
    );
    assert_eq!(
        fs::read(out.path().join("payload/keys.json")).unwrap(),
        br#"{"kid":"k1"}"#
    );
    assert_eq!(fs::read(out.path().join("payload/nested/blob.bin")).unwrap(), binary);
}

#[tokio::test]
async fn single_file_upload_lands_under_its_name() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let host = tempfile::tempdir().unwrap();
    let file = host.path().join("config.toml");
    fs::write(&file, "port = 4767\n").unwrap();

    let (mut spec, _, _) = captured_spec(IMAGE, host.path());
    spec.upload.host_path = file;
    let mut controller = LifecycleController::with_spec(Arc::new(engine.clone()), spec);

    let id = controller.create().await.unwrap();
    controller.upload("/etc/keys").await.unwrap();

    assert_eq!(
        engine.read_file(&id, "/etc/keys/config.toml").unwrap(),
        b"port = 4767\n"
    );
}

#[tokio::test]
async fn climbing_destination_is_refused() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let host = tempfile::tempdir().unwrap();
    fs::write(host.path().join("x"), "x").unwrap();
    let (mut spec, _, _) = captured_spec(IMAGE, host.path());
    spec.upload.host_path = host.path().join("x");
    let mut controller = LifecycleController::with_spec(Arc::new(engine.clone()), spec);

    let id = controller.create().await.unwrap();
    let err = controller.upload("/srv/../etc").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.operation(), Operation::Upload);
    assert_eq!(err.handle(), Some(&id));
    assert!(engine.read_file(&id, "/etc/x").is_none());
}

#[tokio::test]
async fn upload_onto_a_file_conflicts() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let host = tempfile::tempdir().unwrap();
    fs::write(host.path().join("hosts"), "127.0.0.1 keys\n").unwrap();
    let (mut spec, _, _) = captured_spec(IMAGE, host.path());
    spec.upload.host_path = host.path().join("hosts");
    let mut controller = LifecycleController::with_spec(Arc::new(engine.clone()), spec);

    let id = controller.create().await.unwrap();
    engine.write_file(&id, "/etc/hosts", "original");

    let err = controller.upload("/etc/hosts").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(engine.read_file(&id, "/etc/hosts").unwrap(), b"original");
}

#[tokio::test]
async fn missing_host_source_is_io() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let host = tempfile::tempdir().unwrap();
    let (mut spec, _, _) = captured_spec(IMAGE, host.path());
    spec.upload.host_path = host.path().join("absent");
    let mut controller = LifecycleController::with_spec(Arc::new(engine), spec);

    controller.create().await.unwrap();
    let err = controller.upload("/srv").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn download_of_missing_path_is_not_found() {
    let engine = MemoryRuntime::new().with_image(IMAGE);
    let out = tempfile::tempdir().unwrap();
    let (spec, _, _) = captured_spec(IMAGE, out.path());
    let mut controller = LifecycleController::with_spec(Arc::new(engine), spec);

    controller.create().await.unwrap();
    let err = controller.download("/var/lib/keys").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.operation(), Operation::Download);
    assert!(fs::read_dir(out.path()).unwrap().next().is_none());
}

// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and engine fixtures shared by the integration tests.

use dockyard::orchestration::{ContainerSpec, LifecycleController, Sink, SinkBuffer};
use dockyard::runtime::MemoryRuntime;
use std::sync::{Arc, Once};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("dockyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A spec for `image` whose transfer paths live under `dir` and whose output is captured.
#[allow(dead_code)]
pub fn captured_spec(image: &str, dir: &std::path::Path) -> (ContainerSpec, SinkBuffer, SinkBuffer) {
    let stdout = SinkBuffer::new();
    let stderr = SinkBuffer::new();
    let mut spec = ContainerSpec::rooted_at(dir);
    spec.create.image = image.to_string();
    spec.attach.output = Sink::Buffer(stdout.clone());
    spec.attach.error = Sink::Buffer(stderr.clone());
    spec.logs.output = Sink::Buffer(stdout.clone());
    spec.logs.error = Sink::Buffer(stderr.clone());
    (spec, stdout, stderr)
}

/// A controller for `image` on `engine`, with output discarded.
#[allow(dead_code)]
pub fn controller_for(engine: &MemoryRuntime, image: &str) -> LifecycleController<MemoryRuntime> {
    let mut spec = ContainerSpec::rooted_at(std::env::temp_dir());
    spec.create.image = image.to_string();
    spec.attach.output = Sink::Discard;
    spec.attach.error = Sink::Discard;
    spec.logs.output = Sink::Discard;
    spec.logs.error = Sink::Discard;
    LifecycleController::with_spec(Arc::new(engine.clone()), spec)
}

// ABOUTME: Container orchestration: spec composition, lifecycle control, error vocabulary.
// ABOUTME: Output relaying and archive transfer support the lifecycle operations.

mod controller;
mod error;
mod relay;
mod restart_policy;
mod spec;
mod state;
mod transfer;

pub use controller::{LifecycleController, WaitOutcome};
pub use error::{ErrorKind, LifecycleError, Operation, RuntimeFailure, normalize};
pub use relay::{RelayOutcome, RelayReport, RelaySession, Sink, SinkBuffer, spawn as spawn_relay};
pub use restart_policy::RestartPolicy;
pub use spec::{
    AttachSpec, ContainerSpec, CreateSpec, DownloadSpec, HostConfig, ListSpec, LogsSpec, Mount,
    PortBinding, Protocol, PullSpec, RemoveSpec, RenameSpec, UploadSpec,
};
pub use state::LifecycleState;

// ABOUTME: Closed error vocabulary for lifecycle operations.
// ABOUTME: Normalizes runtime capability errors into kinds tagged with operation context.

use std::fmt;
use std::time::Duration;

use crate::types::ContainerId;

/// The closed set of failure kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The runtime cannot be reached, failed internally, or a deadline elapsed.
    RuntimeUnavailable,
    /// The referenced image or container does not exist.
    NotFound,
    /// The operation would violate a state invariant.
    Conflict,
    /// The operation needs a container handle that has not been created yet.
    NotReady,
    /// Reading or writing a stream or filesystem path failed.
    Io,
    /// The local environment could not be read.
    Environment,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::RuntimeUnavailable => "runtime unavailable",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotReady => "not ready",
            ErrorKind::Io => "I/O error",
            ErrorKind::Environment => "environment error",
        })
    }
}

/// Lifecycle operation names, attached to every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Configure,
    Pull,
    ListImages,
    ListContainers,
    Create,
    Start,
    Attach,
    Logs,
    Wait,
    Stop,
    Upload,
    Download,
    Rename,
    Remove,
    Inspect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Configure => "configure",
            Operation::Pull => "pull",
            Operation::ListImages => "list images",
            Operation::ListContainers => "list containers",
            Operation::Create => "create",
            Operation::Start => "start",
            Operation::Attach => "attach",
            Operation::Logs => "logs",
            Operation::Wait => "wait",
            Operation::Stop => "stop",
            Operation::Upload => "upload",
            Operation::Download => "download",
            Operation::Rename => "rename",
            Operation::Remove => "remove",
            Operation::Inspect => "inspect",
        })
    }
}

/// A normalized lifecycle failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed ({kind}){}: {message}", on_container(.handle))]
pub struct LifecycleError {
    kind: ErrorKind,
    operation: Operation,
    handle: Option<ContainerId>,
    message: String,
}

fn on_container(handle: &Option<ContainerId>) -> String {
    handle
        .as_ref()
        .map(|id| format!(" on container {}", id.short()))
        .unwrap_or_default()
}

impl LifecycleError {
    pub fn new(
        kind: ErrorKind,
        operation: Operation,
        handle: Option<ContainerId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation,
            handle,
            message: message.into(),
        }
    }

    /// A handle-requiring operation ran before create succeeded.
    pub fn not_ready(operation: Operation) -> Self {
        Self::new(
            ErrorKind::NotReady,
            operation,
            None,
            "no container has been created",
        )
    }

    /// A controller-wide deadline elapsed before the runtime answered.
    pub fn deadline(operation: Operation, handle: Option<ContainerId>, limit: Duration) -> Self {
        Self::new(
            ErrorKind::RuntimeUnavailable,
            operation,
            handle,
            format!("runtime did not answer within {:?}", limit),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn handle(&self) -> Option<&ContainerId> {
        self.handle.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A raw failure that knows which domain kind it belongs to.
pub trait RuntimeFailure: fmt::Display {
    fn kind(&self) -> ErrorKind;
}

impl RuntimeFailure for std::io::Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}

/// Translate a raw failure into a [`LifecycleError`].
///
/// Pure: no logging and no retries, so callers keep full control of policy.
pub fn normalize<E: RuntimeFailure>(
    operation: Operation,
    handle: Option<&ContainerId>,
    err: E,
) -> LifecycleError {
    LifecycleError::new(err.kind(), operation, handle.cloned(), err.to_string())
}

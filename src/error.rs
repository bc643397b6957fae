// ABOUTME: Application-wide error types for the dockyard binary.
// ABOUTME: Wraps lifecycle, connection, and argument failures with thiserror.

use thiserror::Error;

use crate::orchestration::{ErrorKind, LifecycleError};
use crate::runtime::{ConnectError, ConnectErrorKind};
use crate::types::ParseImageRefError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("invalid image reference: {0}")]
    InvalidImage(#[from] ParseImageRefError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("container exited with status {0}")]
    ContainerFailed(i64),
}

impl Error {
    /// Process exit status for this error.
    ///
    /// A failed container passes its own status through when it fits.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ContainerFailed(code) => i32::try_from(*code)
                .ok()
                .filter(|c| (1..=255).contains(c))
                .unwrap_or(1),
            Error::Lifecycle(e) if e.kind() == ErrorKind::RuntimeUnavailable => 3,
            Error::Connect(e) => match e.kind() {
                ConnectErrorKind::NoRuntimeFound
                | ConnectErrorKind::SocketMissing
                | ConnectErrorKind::ConnectionFailed => 3,
                // The runtime answered, it just refused.
                ConnectErrorKind::RuntimeOperation => 1,
            },
            Error::InvalidImage(_) | Error::InvalidArgument(_) => 2,
            Error::Lifecycle(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::Operation;

    #[test]
    fn container_status_passes_through() {
        assert_eq!(Error::ContainerFailed(42).exit_code(), 42);
        assert_eq!(Error::ContainerFailed(-1).exit_code(), 1);
        assert_eq!(Error::ContainerFailed(4096).exit_code(), 1);
    }

    #[test]
    fn unreachable_runtime_has_its_own_status() {
        let err = Error::from(LifecycleError::new(
            ErrorKind::RuntimeUnavailable,
            Operation::Pull,
            None,
            "socket closed",
        ));
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("pull failed"));
    }

    #[test]
    fn connect_status_follows_failure_kind() {
        use crate::runtime::{DetectionError, RuntimeInfoError};

        let missing = Error::from(ConnectError::from(DetectionError::NoRuntimeFound));
        assert_eq!(missing.exit_code(), 3);

        let refused = Error::from(ConnectError::from(RuntimeInfoError::ConnectionFailed(
            "connection refused".into(),
        )));
        assert_eq!(refused.exit_code(), 3);

        let answered = Error::from(ConnectError::from(RuntimeInfoError::Runtime(
            "version too old".into(),
        )));
        assert_eq!(answered.exit_code(), 1);
    }
}

// ABOUTME: Runtime connection error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

/// Failure to reach a container runtime before any lifecycle operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {source}"))]
    Connection { source: RuntimeInfoError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// No container runtime found on the system.
    NoRuntimeFound,
    /// A configured socket path does not exist.
    SocketMissing,
    /// Failed to connect to or ping the runtime socket.
    ConnectionFailed,
    /// The runtime answered with an error.
    RuntimeOperation,
}

impl ConnectError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => ConnectErrorKind::NoRuntimeFound,
                DetectionError::SocketMissing(_) => ConnectErrorKind::SocketMissing,
            },
            ConnectError::Connection { source } => match source {
                RuntimeInfoError::ConnectionFailed(_) => ConnectErrorKind::ConnectionFailed,
                RuntimeInfoError::Runtime(_) => ConnectErrorKind::RuntimeOperation,
            },
        }
    }
}

impl From<DetectionError> for ConnectError {
    fn from(source: DetectionError) -> Self {
        ConnectError::Detection { source }
    }
}

impl From<RuntimeInfoError> for ConnectError {
    fn from(source: RuntimeInfoError) -> Self {
        ConnectError::Connection { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_source() {
        let err = ConnectError::from(DetectionError::NoRuntimeFound);
        assert_eq!(err.kind(), ConnectErrorKind::NoRuntimeFound);

        let err = ConnectError::from(RuntimeInfoError::ConnectionFailed("refused".into()));
        assert_eq!(err.kind(), ConnectErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("refused"));
    }
}

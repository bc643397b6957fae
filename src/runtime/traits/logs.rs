// ABOUTME: Output streaming trait for container runtimes.
// ABOUTME: Log retrieval and attach both yield demultiplexed stdout/stderr chunks.

use super::sealed::Sealed;
use crate::orchestration::{ErrorKind, RuntimeFailure};
use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;

/// Demultiplexed container output.
pub type OutputStream = Pin<Box<dyn Stream<Item = Result<LogChunk, LogError>> + Send>>;

/// Output streaming operations.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<OutputStream, LogError>;

    /// Attach to a running container's output. The stream ends when the container exits.
    async fn attach_container(
        &self,
        id: &ContainerId,
        opts: &AttachOptions,
    ) -> Result<OutputStream, LogError>;
}

/// Runtime-facing log options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    /// Keep the stream open while the container runs.
    pub follow: bool,
    pub timestamps: bool,
    /// Number of lines from the end; everything when absent.
    pub tail: Option<u64>,
    pub since: Option<DateTime<Utc>>,
}

/// Runtime-facing attach options.
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    pub stream: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Replay earlier output first.
    pub logs: bool,
}

/// One frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: LogStream,
    pub data: Bytes,
}

impl LogChunk {
    pub fn stdout(data: impl Into<Bytes>) -> Self {
        Self {
            stream: LogStream::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<Bytes>) -> Self {
        Self {
            stream: LogStream::Stderr,
            data: data.into(),
        }
    }
}

/// Which sub-stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from output streaming.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime unreachable: {0}")]
    Unavailable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl RuntimeFailure for LogError {
    fn kind(&self) -> ErrorKind {
        match self {
            LogError::ContainerNotFound(_) => ErrorKind::NotFound,
            LogError::StreamError(_) => ErrorKind::Io,
            LogError::Unavailable(_) | LogError::Runtime(_) => ErrorKind::RuntimeUnavailable,
        }
    }
}

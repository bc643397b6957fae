// ABOUTME: File transfer trait for container runtimes.
// ABOUTME: Moves tar archives into and out of a container's filesystem.

use super::sealed::Sealed;
use crate::orchestration::{ErrorKind, RuntimeFailure};
use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Raw tar archive bytes streamed out of a container.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransferError>> + Send>>;

/// Archive transfer operations.
#[async_trait]
pub trait TransferOps: Sealed + Send + Sync {
    /// Extract a tar archive into a directory of the container.
    async fn upload_to_container(
        &self,
        id: &ContainerId,
        request: &UploadRequest,
    ) -> Result<(), TransferError>;

    /// Stream a tar archive of `path` (file or directory) out of the container.
    async fn download_from_container(
        &self,
        id: &ContainerId,
        path: &str,
    ) -> Result<ByteStream, TransferError>;
}

/// An archive and where to extract it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Destination directory inside the container.
    pub path: String,
    /// Tar archive.
    pub archive: Bytes,
    pub no_overwrite_dir_non_dir: bool,
}

/// Errors from archive transfers.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("path not found in container: {0}")]
    PathNotFound(String),

    #[error("refusing to overwrite: {0}")]
    Conflict(String),

    #[error("malformed archive: {0}")]
    Archive(String),

    #[error("runtime unreachable: {0}")]
    Unavailable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl RuntimeFailure for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ContainerNotFound(_) | TransferError::PathNotFound(_) => {
                ErrorKind::NotFound
            }
            TransferError::Conflict(_) => ErrorKind::Conflict,
            TransferError::Archive(_) => ErrorKind::Io,
            TransferError::Unavailable(_) | TransferError::Runtime(_) => {
                ErrorKind::RuntimeUnavailable
            }
        }
    }
}

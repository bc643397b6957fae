// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull images from a registry and list locally stored images.

use super::sealed::Sealed;
use super::shared_types::ImageSummary;
use crate::orchestration::{ErrorKind, ListSpec, PullSpec, RuntimeFailure};
use async_trait::async_trait;

/// Image operations: pull and list.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Pull `spec.repository:spec.tag`, consuming the progress stream.
    async fn pull_image(&self, spec: &PullSpec) -> Result<(), ImageError>;

    /// List images stored by the runtime.
    async fn list_images(&self, spec: &ListSpec) -> Result<Vec<ImageSummary>, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime unreachable: {0}")]
    Unavailable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl RuntimeFailure for ImageError {
    fn kind(&self) -> ErrorKind {
        match self {
            ImageError::NotFound(_) => ErrorKind::NotFound,
            ImageError::PullFailed(_) | ImageError::Unavailable(_) | ImageError::Runtime(_) => {
                ErrorKind::RuntimeUnavailable
            }
        }
    }
}

// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, remove, rename, inspect, list, and wait on containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerInfo, ContainerSummary};
use crate::orchestration::{
    CreateSpec, ErrorKind, HostConfig, ListSpec, RemoveSpec, RenameSpec, RuntimeFailure,
};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container and return its handle.
    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId, ContainerError>;

    /// Start a created or stopped container with its create-time host config.
    async fn start_container(
        &self,
        id: &ContainerId,
        host_config: &HostConfig,
    ) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(
        &self,
        id: &ContainerId,
        spec: &RemoveSpec,
    ) -> Result<(), ContainerError>;

    /// Rename a container.
    async fn rename_container(
        &self,
        id: &ContainerId,
        spec: &RenameSpec,
    ) -> Result<(), ContainerError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the list spec.
    async fn list_containers(
        &self,
        spec: &ListSpec,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Block until the container exits and return its exit code.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container name already in use: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("conflicting container state: {0}")]
    Conflict(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime unreachable: {0}")]
    Unavailable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl RuntimeFailure for ContainerError {
    fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::NotFound(_) | ContainerError::ImageNotFound(_) => ErrorKind::NotFound,
            ContainerError::AlreadyExists(_)
            | ContainerError::NotRunning(_)
            | ContainerError::AlreadyRunning(_)
            | ContainerError::Conflict(_)
            | ContainerError::InvalidConfig(_) => ErrorKind::Conflict,
            ContainerError::Unavailable(_) | ContainerError::Runtime(_) => {
                ErrorKind::RuntimeUnavailable
            }
        }
    }
}

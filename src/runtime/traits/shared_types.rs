// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerInfo, ContainerSummary, ImageSummary, RegistryAuth, RuntimeMetadata.

use crate::types::{ContainerId, ImageId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Information about a container as reported by inspect.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    /// Image the container was created from.
    pub image: String,
    pub state: ContainerState,
    /// Exit code, once the container has exited.
    pub exit_code: Option<i64>,
    pub created: String,
    pub labels: BTreeMap<String, String>,
}

/// Container state as the runtime sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        })
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: BTreeMap<String, String>,
}

/// One row of an image listing.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub id: ImageId,
    pub tags: Vec<String>,
    /// Size in bytes.
    pub size: i64,
}

/// Registry credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    /// Registry server (e.g., "quay.io").
    pub server: Option<String>,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Runtime metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "Docker", "Podman").
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}

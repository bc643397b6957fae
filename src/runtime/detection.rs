// ABOUTME: Runtime detection on the local system.
// ABOUTME: Honors explicit config, then checks Podman sockets first, then Docker.

use super::types::{RuntimeConfig, RuntimeEndpoint, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured socket does not exist: {0}")]
    SocketMissing(String),
}

/// Find a container runtime socket on this machine.
///
/// An explicit `config` wins. Otherwise the order is:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<RuntimeEndpoint, DetectionError> {
    if let Some(endpoint) = config.and_then(explicit_endpoint) {
        if !Path::new(&endpoint.socket_path).exists() {
            return Err(DetectionError::SocketMissing(endpoint.socket_path));
        }
        return Ok(endpoint);
    }

    candidates()
        .into_iter()
        .find(|candidate| Path::new(&candidate.socket_path).exists())
        .ok_or(DetectionError::NoRuntimeFound)
}

/// Endpoint dictated by config, if it names a runtime or a socket.
fn explicit_endpoint(config: &RuntimeConfig) -> Option<RuntimeEndpoint> {
    match (config.runtime, config.socket.as_ref()) {
        (Some(runtime_type), socket) => Some(RuntimeEndpoint {
            runtime_type,
            socket_path: socket
                .cloned()
                .unwrap_or_else(|| default_socket_path(runtime_type).to_string()),
        }),
        (None, Some(socket)) => Some(RuntimeEndpoint {
            runtime_type: guess_type(socket),
            socket_path: socket.clone(),
        }),
        (None, None) => None,
    }
}

fn candidates() -> Vec<RuntimeEndpoint> {
    let mut found = Vec::with_capacity(3);
    if let Some(uid) = get_uid() {
        found.push(RuntimeEndpoint {
            runtime_type: RuntimeType::Podman,
            socket_path: format!("/run/user/{}/podman/podman.sock", uid),
        });
    }
    found.push(RuntimeEndpoint {
        runtime_type: RuntimeType::Podman,
        socket_path: ROOTFUL_PODMAN.to_string(),
    });
    found.push(RuntimeEndpoint {
        runtime_type: RuntimeType::Docker,
        socket_path: DOCKER_SOCKET.to_string(),
    });
    found
}

fn guess_type(socket: &str) -> RuntimeType {
    if socket.contains("podman") {
        RuntimeType::Podman
    } else {
        RuntimeType::Docker
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> &'static str {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET,
        RuntimeType::Podman => ROOTFUL_PODMAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_runtime_uses_default_socket() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            socket: None,
        };
        let endpoint = explicit_endpoint(&config).unwrap();
        assert_eq!(endpoint.runtime_type, RuntimeType::Docker);
        assert_eq!(endpoint.socket_path, DOCKER_SOCKET);
    }

    #[test]
    fn explicit_socket_guesses_runtime() {
        let config = RuntimeConfig {
            runtime: None,
            socket: Some("/run/user/1000/podman/podman.sock".to_string()),
        };
        let endpoint = explicit_endpoint(&config).unwrap();
        assert_eq!(endpoint.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn empty_config_falls_back_to_probing() {
        assert!(explicit_endpoint(&RuntimeConfig::default()).is_none());
    }

    #[test]
    fn missing_configured_socket_is_reported() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Podman),
            socket: Some("/nonexistent/dockyard/podman.sock".to_string()),
        };
        assert!(matches!(
            detect_local(Some(&config)),
            Err(DetectionError::SocketMissing(path)) if path.contains("nonexistent")
        ));
    }

    #[test]
    fn podman_is_probed_before_docker() {
        let order: Vec<RuntimeType> = candidates().iter().map(|c| c.runtime_type).collect();
        assert_eq!(order.last(), Some(&RuntimeType::Docker));
        assert!(order[..order.len() - 1]
            .iter()
            .all(|t| *t == RuntimeType::Podman));
    }
}

// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Speaks the Docker-compatible API, so it serves both Docker and Podman sockets.

use crate::orchestration::{CreateSpec, HostConfig, ListSpec, PullSpec, RemoveSpec, RenameSpec};
use crate::orchestration::{Protocol, RestartPolicy};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    AttachOptions, ByteStream, ContainerError, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, ImageError, ImageOps, ImageSummary, LogChunk, LogError, LogOps, LogOptions,
    LogStream, OutputStream, RuntimeInfo, RuntimeInfoError, RuntimeMetadata, TransferError,
    TransferOps, UploadRequest,
};
use crate::runtime::types::{RuntimeEndpoint, RuntimeType};
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, HostConfig as BollardHostConfig, Mount, MountTypeEnum,
    PortBinding as BollardPortBinding, RestartPolicy as BollardRestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    AttachContainerOptions, CreateContainerOptions, CreateImageOptions,
    DownloadFromContainerOptions, InspectContainerOptions, ListContainersOptions,
    ListImagesOptions, LogsOptions, RemoveContainerOptions, RenameContainerOptions,
    StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Status code and message of an engine-side error, if the engine answered at all.
fn server_error(e: &BollardError) -> Option<(u16, &str)> {
    match e {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_image_pull_error(e: BollardError, image_name: &str) -> ImageError {
    match server_error(&e) {
        Some((404, message)) => ImageError::NotFound(format!("{}: {}", image_name, message)),
        Some(_) => ImageError::PullFailed(format!("{}: {}", image_name, e)),
        None => ImageError::Unavailable(e.to_string()),
    }
}

fn map_image_list_error(e: BollardError) -> ImageError {
    match server_error(&e) {
        Some(_) => ImageError::Runtime(e.to_string()),
        None => ImageError::Unavailable(e.to_string()),
    }
}

fn map_container_create_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        Some((400, message)) => ContainerError::InvalidConfig(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_container_start_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_container_stop_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::NotRunning(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_container_remove_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((409, message)) => ContainerError::Conflict(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_container_rename_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_container_not_found_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some(_) => ContainerError::Runtime(e.to_string()),
        None => ContainerError::Unavailable(e.to_string()),
    }
}

fn map_log_error(e: BollardError) -> LogError {
    match server_error(&e) {
        Some((404, message)) => LogError::ContainerNotFound(message.to_string()),
        Some(_) => LogError::Runtime(e.to_string()),
        None => LogError::StreamError(e.to_string()),
    }
}

fn map_transfer_error(e: BollardError, path: &str) -> TransferError {
    match server_error(&e) {
        Some((404, message)) if message.contains("No such container") => {
            TransferError::ContainerNotFound(message.to_string())
        }
        Some((404, _)) => TransferError::PathNotFound(path.to_string()),
        Some((400, message)) | Some((403, message)) => {
            TransferError::Conflict(format!("{}: {}", path, message))
        }
        Some(_) => TransferError::Runtime(e.to_string()),
        None => TransferError::Unavailable(e.to_string()),
    }
}

// =============================================================================
// Spec Conversion
// =============================================================================

fn restart_policy(policy: RestartPolicy) -> BollardRestartPolicy {
    BollardRestartPolicy {
        name: Some(match policy {
            RestartPolicy::No => RestartPolicyNameEnum::NO,
            RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
            RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
            RestartPolicy::OnFailure { .. } => RestartPolicyNameEnum::ON_FAILURE,
        }),
        maximum_retry_count: match policy {
            RestartPolicy::OnFailure { max_retries } => max_retries.map(i64::from),
            _ => None,
        },
    }
}

fn host_config(config: &HostConfig) -> (BollardHostConfig, Vec<String>) {
    let mut host = BollardHostConfig {
        readonly_rootfs: Some(config.read_only_rootfs),
        restart_policy: Some(restart_policy(config.restart_policy)),
        ..Default::default()
    };

    let mounts: Vec<Mount> = config
        .mounts
        .iter()
        .map(|m| Mount {
            source: Some(m.source.clone()),
            target: Some(m.target.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();
    if !mounts.is_empty() {
        host.mounts = Some(mounts);
    }

    let mut port_bindings: HashMap<String, Option<Vec<BollardPortBinding>>> = HashMap::new();
    let mut exposed_ports = Vec::new();
    for port in &config.port_bindings {
        let key = port_key(port.container_port, port.protocol);
        exposed_ports.push(key.clone());
        port_bindings.insert(
            key,
            Some(vec![BollardPortBinding {
                host_ip: port.host_ip.clone(),
                host_port: port.host_port.map(|p| p.to_string()),
            }]),
        );
    }
    if !port_bindings.is_empty() {
        host.port_bindings = Some(port_bindings);
    }

    (host, exposed_ports)
}

fn port_key(port: u16, protocol: Protocol) -> String {
    format!("{}/{}", port, protocol.as_str())
}

fn create_body(spec: &CreateSpec) -> ContainerCreateBody {
    let env: Vec<String> = spec
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    let labels: HashMap<String, String> = spec
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let (host, exposed_ports) = host_config(&spec.host_config);

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        cmd: if spec.command.is_empty() {
            None
        } else {
            Some(spec.command.clone())
        },
        env: if env.is_empty() { None } else { Some(env) },
        labels: if labels.is_empty() {
            None
        } else {
            Some(labels)
        },
        attach_stdin: Some(spec.attach_stdin),
        attach_stdout: Some(spec.attach_stdout),
        attach_stderr: Some(spec.attach_stderr),
        open_stdin: Some(spec.open_stdin),
        tty: Some(spec.tty),
        network_disabled: Some(spec.network_disabled),
        exposed_ports: if exposed_ports.is_empty() {
            None
        } else {
            Some(exposed_ports)
        },
        host_config: Some(host),
        ..Default::default()
    }
}

fn label_filters(spec: &ListSpec) -> HashMap<String, Vec<String>> {
    let mut filters: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in &spec.labels {
        filters
            .entry("label".to_string())
            .or_default()
            .push(format!("{}={}", key, value));
    }
    filters
}

fn log_chunk(output: LogOutput) -> LogChunk {
    match output {
        LogOutput::StdErr { message } => LogChunk {
            stream: LogStream::Stderr,
            data: message,
        },
        LogOutput::StdOut { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => LogChunk {
            stream: LogStream::Stdout,
            data: message,
        },
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Podman is driven through its Docker-compatible socket, so the same client
/// serves both engines.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the runtime socket of a detected or configured endpoint.
    ///
    /// Does not talk to the engine; call `ping` to confirm it answers.
    pub fn connect(endpoint: &RuntimeEndpoint) -> Result<Self, RuntimeInfoError> {
        let client =
            Docker::connect_with_unix(&endpoint.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, endpoint.runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, spec: &PullSpec) -> Result<(), ImageError> {
        let image_name = spec.reference();

        let opts = CreateImageOptions {
            from_image: Some(spec.repository.clone()),
            tag: Some(spec.tag.clone()),
            ..Default::default()
        };

        let credentials = spec.auth.as_ref().map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server.clone(),
            ..Default::default()
        });

        // Pull returns a stream of progress updates; the pull is done when it ends.
        let mut stream = self.client.create_image(Some(opts), None, credentials);
        while let Some(result) = stream.next().await {
            let progress = result.map_err(|e| map_image_pull_error(e, &image_name))?;
            if let Some(status) = progress.status {
                tracing::trace!(image = %image_name, %status, "Pull progress");
            }
        }

        Ok(())
    }

    async fn list_images(&self, spec: &ListSpec) -> Result<Vec<ImageSummary>, ImageError> {
        let opts = ListImagesOptions {
            all: spec.include_stopped,
            filters: Some(label_filters(spec)),
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(map_image_list_error)?;

        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: ImageId::new(image.id),
                tags: image.repo_tags,
                size: image.size,
            })
            .collect())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId, ContainerError> {
        let opts = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), create_body(spec))
            .await
            .map_err(map_container_create_error)?;

        for warning in &response.warnings {
            tracing::warn!(container = %response.id, "{}", warning);
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(
        &self,
        id: &ContainerId,
        host_config: &HostConfig,
    ) -> Result<(), ContainerError> {
        // The Docker API binds host settings at create; start only confirms them.
        tracing::trace!(container = %id.short(), ?host_config, "Starting with create-time host config");
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs().min(i32::MAX as u64) as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        spec: &RemoveSpec,
    ) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force: spec.force,
            v: spec.remove_volumes,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_remove_error)
    }

    async fn rename_container(
        &self,
        id: &ContainerId,
        spec: &RenameSpec,
    ) -> Result<(), ContainerError> {
        self.client
            .rename_container(
                id.as_str(),
                RenameContainerOptions {
                    name: spec.new_name.clone(),
                },
            )
            .await
            .map_err(map_container_rename_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => ContainerState::Restarting,
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let exit_code = match state {
            ContainerState::Exited | ContainerState::Dead => {
                details.state.as_ref().and_then(|s| s.exit_code)
            }
            _ => None,
        };

        Ok(ContainerInfo {
            id: details
                .id
                .map(ContainerId::new)
                .unwrap_or_else(|| id.clone()),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            exit_code,
            created: details.created.map(|dt| dt.to_string()).unwrap_or_default(),
            labels: details
                .config
                .and_then(|c| c.labels)
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
    }

    async fn list_containers(
        &self,
        spec: &ListSpec,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let opts = ListContainersOptions {
            all: spec.include_stopped,
            filters: Some(label_filters(spec)),
            ..Default::default()
        };

        // Podman reports "stopping" as a container state during shutdown, but bollard
        // doesn't recognize it and fails deserialization. Retry after a short delay
        // since "stopping" is a transient state.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state: c
                                    .state
                                    .map(|s| format!("{:?}", s).to_lowercase())
                                    .unwrap_or_default(),
                                status: c.status.unwrap_or_default(),
                                labels: c.labels.unwrap_or_default().into_iter().collect(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(map_container_not_found_error(e));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let mut stream = self
            .client
            .wait_container(id.as_str(), None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_container_not_found_error(e)),
            None => Err(ContainerError::Runtime(format!(
                "wait on {} ended without a status",
                id.short()
            ))),
        }
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<OutputStream, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            timestamps: opts.timestamps,
            since: opts
                .since
                .map(|t| t.timestamp().clamp(0, i32::MAX as i64) as i32)
                .unwrap_or(0),
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));
        Ok(Box::pin(stream.map(|result| {
            result.map(log_chunk).map_err(map_log_error)
        })))
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
        opts: &AttachOptions,
    ) -> Result<OutputStream, LogError> {
        let attach_opts = AttachContainerOptions {
            stream: opts.stream,
            stdout: opts.stdout,
            stderr: opts.stderr,
            logs: opts.logs,
            ..Default::default()
        };

        let results = self
            .client
            .attach_container(id.as_str(), Some(attach_opts))
            .await
            .map_err(|e| match server_error(&e) {
                Some((404, message)) => LogError::ContainerNotFound(message.to_string()),
                Some(_) => LogError::Runtime(e.to_string()),
                None => LogError::Unavailable(e.to_string()),
            })?;

        Ok(Box::pin(results.output.map(|result| {
            result.map(log_chunk).map_err(map_log_error)
        })))
    }
}

#[async_trait]
impl TransferOps for BollardRuntime {
    async fn upload_to_container(
        &self,
        id: &ContainerId,
        request: &UploadRequest,
    ) -> Result<(), TransferError> {
        let opts = UploadToContainerOptions {
            path: request.path.clone(),
            no_overwrite_dir_non_dir: request
                .no_overwrite_dir_non_dir
                .then(|| "true".to_string()),
            ..Default::default()
        };

        self.client
            .upload_to_container(
                id.as_str(),
                Some(opts),
                bollard::body_full(request.archive.clone()),
            )
            .await
            .map_err(|e| map_transfer_error(e, &request.path))
    }

    async fn download_from_container(
        &self,
        id: &ContainerId,
        path: &str,
    ) -> Result<ByteStream, TransferError> {
        let opts = DownloadFromContainerOptions {
            path: path.to_string(),
        };
        let owned_path = path.to_string();

        let stream = self.client.download_from_container(id.as_str(), Some(opts));
        Ok(Box::pin(stream.map(move |result| {
            result.map_err(|e| map_transfer_error(e, &owned_path))
        })))
    }
}

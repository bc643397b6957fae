// ABOUTME: Lifecycle controller sequencing one container through pull, create, run and removal.
// ABOUTME: Checks preconditions locally, calls the runtime, and normalizes every failure.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use tracing::{debug, warn};

use super::error::{ErrorKind, LifecycleError, Operation, normalize};
use super::relay::{self, RelaySession, Sink, SinkBuffer};
use super::spec::{ContainerSpec, HostConfig, ListSpec, PullSpec, RenameSpec};
use super::state::LifecycleState;
use super::transfer::{self, ArchiveError};
use crate::runtime::{
    ContainerError, ContainerInfo, ContainerSummary, FullRuntime, ImageSummary, LogChunk,
    RegistryAuth, UploadRequest,
};
use crate::types::{ContainerId, ImageRef};

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The container exited with this status.
    Exited(i64),
    /// The caller stopped waiting; the container keeps running.
    Detached,
}

/// Drives one container through its lifecycle against a shared runtime.
///
/// Operations take `&mut self`, so calls on one container never overlap.
/// Controllers for different containers can share the same runtime.
pub struct LifecycleController<R: FullRuntime> {
    runtime: Arc<R>,
    spec: Option<ContainerSpec>,
    state: LifecycleState,
    handle: Option<ContainerId>,
    /// Handle of the container removed last, kept so inspect can report it gone.
    retired: Option<ContainerId>,
    /// Host config bound at create, handed unchanged to every start.
    host_config: Option<Arc<HostConfig>>,
    renamed: Option<String>,
    deadline: Option<Duration>,
}

/// Run `fut`, failing with `RuntimeUnavailable` if `deadline` elapses first.
async fn bounded<T, F>(
    deadline: Option<Duration>,
    operation: Operation,
    handle: Option<&ContainerId>,
    fut: F,
) -> Result<T, LifecycleError>
where
    F: Future<Output = Result<T, LifecycleError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| LifecycleError::deadline(operation, handle.cloned(), limit))?,
        None => fut.await,
    }
}

impl<R: FullRuntime> LifecycleController<R> {
    /// A controller with nothing composed yet.
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            spec: None,
            state: LifecycleState::Unconfigured,
            handle: None,
            retired: None,
            host_config: None,
            renamed: None,
            deadline: None,
        }
    }

    /// A controller seeded with a caller-built spec.
    pub fn with_spec(runtime: Arc<R>, spec: ContainerSpec) -> Self {
        let mut controller = Self::new(runtime);
        controller.spec = Some(spec);
        controller.state = LifecycleState::Configured;
        controller
    }

    /// A controller seeded with the default spec.
    pub fn configured(runtime: Arc<R>) -> Result<Self, LifecycleError> {
        Ok(Self::with_spec(runtime, ContainerSpec::new_default()?))
    }

    /// Bound every runtime round trip by `limit`.
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Compose the default spec. Only valid before any configuration exists.
    pub fn configure(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Unconfigured {
            return Err(LifecycleError::new(
                ErrorKind::Conflict,
                Operation::Configure,
                self.handle.clone(),
                format!("controller is already {}", self.state),
            ));
        }
        self.spec = Some(ContainerSpec::new_default()?);
        self.state = LifecycleState::Configured;
        debug!("Controller configured with defaults");
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn handle(&self) -> Option<&ContainerId> {
        self.handle.as_ref()
    }

    /// Name set by the last successful rename.
    pub fn renamed(&self) -> Option<&str> {
        self.renamed.as_deref()
    }

    pub fn spec(&self) -> Option<&ContainerSpec> {
        self.spec.as_ref()
    }

    /// Mutable access to the container spec, refused while a container exists.
    pub fn spec_mut(&mut self) -> Result<&mut ContainerSpec, LifecycleError> {
        if let Some(id) = &self.handle {
            return Err(LifecycleError::new(
                ErrorKind::Conflict,
                Operation::Configure,
                Some(id.clone()),
                "spec is frozen until the container is removed",
            ));
        }
        self.spec
            .as_mut()
            .ok_or_else(|| LifecycleError::not_ready(Operation::Configure))
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    fn require_spec(&self, operation: Operation) -> Result<&ContainerSpec, LifecycleError> {
        self.spec.as_ref().ok_or_else(|| {
            LifecycleError::new(
                ErrorKind::NotReady,
                operation,
                None,
                "controller has no configuration",
            )
        })
    }

    fn require_handle(&self, operation: Operation) -> Result<ContainerId, LifecycleError> {
        self.handle
            .clone()
            .ok_or_else(|| LifecycleError::not_ready(operation))
    }

    fn conflict(&self, operation: Operation, message: impl Into<String>) -> LifecycleError {
        LifecycleError::new(ErrorKind::Conflict, operation, self.handle.clone(), message)
    }

    // =========================================================================
    // Images and listings
    // =========================================================================

    /// Pull the image named by the container spec, falling back to the create image.
    pub async fn pull(&self) -> Result<(), LifecycleError> {
        let spec = self.require_spec(Operation::Pull)?;
        let pull = if spec.pull.repository.is_empty() {
            let image = ImageRef::parse(&spec.create.image).map_err(|e| {
                LifecycleError::new(
                    ErrorKind::NotFound,
                    Operation::Pull,
                    None,
                    format!("no image to pull: {}", e),
                )
            })?;
            PullSpec {
                auth: spec.pull.auth.clone(),
                ..PullSpec::from(&image)
            }
        } else {
            spec.pull.clone()
        };
        self.pull_spec(&pull).await
    }

    /// Pull a parsed reference without touching the container spec.
    pub async fn pull_image(
        &self,
        image: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), LifecycleError> {
        let pull = PullSpec {
            auth: auth.cloned(),
            ..PullSpec::from(image)
        };
        self.pull_spec(&pull).await
    }

    async fn pull_spec(&self, pull: &PullSpec) -> Result<(), LifecycleError> {
        let reference = pull.reference();
        debug!(image = %reference, "Pulling image");
        bounded(self.deadline, Operation::Pull, self.handle.as_ref(), async {
            self.runtime
                .pull_image(pull)
                .await
                .map_err(|e| normalize(Operation::Pull, self.handle.as_ref(), e))
        })
        .await?;
        debug!(image = %reference, "Image pulled");
        Ok(())
    }

    fn list_spec(&self) -> ListSpec {
        self.spec
            .as_ref()
            .map(|s| s.list.clone())
            .unwrap_or_default()
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, LifecycleError> {
        let list = self.list_spec();
        bounded(self.deadline, Operation::ListContainers, None, async {
            self.runtime
                .list_containers(&list)
                .await
                .map_err(|e| normalize(Operation::ListContainers, None, e))
        })
        .await
    }

    pub async fn list_images(&self) -> Result<Vec<ImageSummary>, LifecycleError> {
        let list = self.list_spec();
        bounded(self.deadline, Operation::ListImages, None, async {
            self.runtime
                .list_images(&list)
                .await
                .map_err(|e| normalize(Operation::ListImages, None, e))
        })
        .await
    }

    // =========================================================================
    // Container lifecycle
    // =========================================================================

    /// Create the container described by the container spec and record its handle.
    pub async fn create(&mut self) -> Result<ContainerId, LifecycleError> {
        if let Some(id) = &self.handle {
            return Err(self.conflict(
                Operation::Create,
                format!("container {} already exists", id.short()),
            ));
        }
        let spec = self.require_spec(Operation::Create)?;

        let image = ImageRef::parse(&spec.create.image).map_err(|e| {
            LifecycleError::new(
                ErrorKind::NotFound,
                Operation::Create,
                None,
                format!("invalid image {:?}: {}", spec.create.image, e),
            )
        })?;
        let mut create = spec.create.clone();
        create.image = image.to_string();

        let id = bounded(self.deadline, Operation::Create, None, async {
            self.runtime
                .create_container(&create)
                .await
                .map_err(|e| normalize(Operation::Create, None, e))
        })
        .await?;

        debug!(container = %id.short(), image = %create.image, "Container created");
        self.host_config = Some(Arc::clone(&create.host_config));
        self.handle = Some(id.clone());
        self.retired = None;
        self.state = LifecycleState::Created;
        Ok(id)
    }

    /// Start the created container with the host config bound at create.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        let id = self.require_handle(Operation::Start)?;
        if self.state == LifecycleState::Running {
            return Err(self.conflict(Operation::Start, "container is already running"));
        }
        let host_config = match (&self.host_config, &self.spec) {
            (Some(host), _) => Arc::clone(host),
            (None, Some(spec)) => Arc::clone(&spec.create.host_config),
            (None, None) => Arc::default(),
        };

        bounded(self.deadline, Operation::Start, Some(&id), async {
            self.runtime
                .start_container(&id, &host_config)
                .await
                .map_err(|e| normalize(Operation::Start, Some(&id), e))
        })
        .await?;

        debug!(container = %id.short(), "Container started");
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Attach to the running container and relay its output to the attach sinks.
    pub async fn attach(&mut self) -> Result<RelaySession, LifecycleError> {
        let id = self.require_handle(Operation::Attach)?;
        if self.state != LifecycleState::Running {
            return Err(self.conflict(
                Operation::Attach,
                format!("container is {}, not running", self.state),
            ));
        }
        let spec = self.require_spec(Operation::Attach)?;
        let attach = spec.attach.clone();
        // A raw terminal carries one undivided stream, so both halves share the output sink.
        let error = if attach.raw_terminal && spec.create.tty {
            attach.output.clone()
        } else {
            attach.error.clone()
        };

        let stream = bounded(self.deadline, Operation::Attach, Some(&id), async {
            self.runtime
                .attach_container(&id, &attach.options())
                .await
                .map_err(|e| normalize(Operation::Attach, Some(&id), e))
        })
        .await?;

        debug!(container = %id.short(), "Attached to container output");
        Ok(relay::spawn(
            Operation::Attach,
            Some(id),
            stream,
            attach.output,
            error,
        ))
    }

    /// Relay the container's logs to the log sinks.
    pub async fn logs(&self) -> Result<RelaySession, LifecycleError> {
        let id = self.require_handle(Operation::Logs)?;
        let logs = self.require_spec(Operation::Logs)?.logs.clone();

        let stream = bounded(self.deadline, Operation::Logs, Some(&id), async {
            self.runtime
                .container_logs(&id, &logs.options())
                .await
                .map_err(|e| normalize(Operation::Logs, Some(&id), e))
        })
        .await?;

        Ok(relay::spawn(
            Operation::Logs,
            Some(id),
            stream,
            logs.output,
            logs.error,
        ))
    }

    /// Block until the container exits and return its exit status.
    pub async fn wait(&mut self) -> Result<i64, LifecycleError> {
        match self.wait_until(std::future::pending::<()>()).await? {
            WaitOutcome::Exited(code) => Ok(code),
            WaitOutcome::Detached => Err(LifecycleError::new(
                ErrorKind::Io,
                Operation::Wait,
                self.handle.clone(),
                "wait ended without an exit status",
            )),
        }
    }

    /// Wait for exit, or detach when `cancel` resolves first.
    ///
    /// Detaching leaves the container and the recorded state untouched.
    pub async fn wait_until<F>(&mut self, cancel: F) -> Result<WaitOutcome, LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let id = self.require_handle(Operation::Wait)?;
        if self.state != LifecycleState::Running {
            return Err(self.conflict(
                Operation::Wait,
                format!("container is {}, not running", self.state),
            ));
        }

        let outcome = tokio::select! {
            code = self.runtime.wait_container(&id) => {
                WaitOutcome::Exited(code.map_err(|e| normalize(Operation::Wait, Some(&id), e))?)
            }
            _ = cancel => WaitOutcome::Detached,
        };

        match outcome {
            WaitOutcome::Exited(code) => {
                debug!(container = %id.short(), exit_code = code, "Container exited");
                self.state = LifecycleState::Stopped;
            }
            WaitOutcome::Detached => {
                debug!(container = %id.short(), "Stopped waiting; container left running");
            }
        }
        Ok(outcome)
    }

    /// Stop the container, giving it `timeout` to exit before it is killed.
    ///
    /// Stopping a container that is not running succeeds without a runtime call.
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), LifecycleError> {
        let id = self.require_handle(Operation::Stop)?;
        if self.state != LifecycleState::Running {
            debug!(container = %id.short(), state = %self.state, "Container not running; nothing to stop");
            return Ok(());
        }

        bounded(self.deadline, Operation::Stop, Some(&id), async {
            match self.runtime.stop_container(&id, timeout).await {
                Ok(()) => Ok(()),
                Err(ContainerError::NotRunning(_)) => {
                    warn!(container = %id.short(), "Container had already stopped");
                    Ok(())
                }
                Err(e) => Err(normalize(Operation::Stop, Some(&id), e)),
            }
        })
        .await?;

        debug!(container = %id.short(), "Container stopped");
        self.state = LifecycleState::Stopped;
        Ok(())
    }

    /// Rename the container, or the container-to-be when none exists yet.
    pub async fn rename(&mut self, new_name: impl Into<String>) -> Result<(), LifecycleError> {
        let new_name = new_name.into();
        match self.state {
            LifecycleState::Unconfigured | LifecycleState::Removed => {
                return Err(LifecycleError::new(
                    ErrorKind::NotReady,
                    Operation::Rename,
                    None,
                    format!("cannot rename while {}", self.state),
                ));
            }
            LifecycleState::Configured => {
                let spec = self.spec_mut()?;
                spec.create.name = Some(new_name.clone());
                spec.rename.new_name = new_name.clone();
            }
            LifecycleState::Created | LifecycleState::Running | LifecycleState::Stopped => {
                let id = self.require_handle(Operation::Rename)?;
                let rename = RenameSpec {
                    new_name: new_name.clone(),
                };
                bounded(self.deadline, Operation::Rename, Some(&id), async {
                    self.runtime
                        .rename_container(&id, &rename)
                        .await
                        .map_err(|e| normalize(Operation::Rename, Some(&id), e))
                })
                .await?;
                if let Some(spec) = self.spec.as_mut() {
                    spec.rename = rename;
                }
            }
        }

        debug!(name = %new_name, "Container renamed");
        self.renamed = Some(new_name);
        Ok(())
    }

    /// Remove the container. Removing twice succeeds.
    pub async fn remove(&mut self) -> Result<(), LifecycleError> {
        if self.state == LifecycleState::Removed {
            debug!("Container already removed");
            return Ok(());
        }
        let id = self.require_handle(Operation::Remove)?;
        let remove = self
            .spec
            .as_ref()
            .map(|s| s.remove)
            .unwrap_or_default();
        // The recorded state lags a container that exited on its own.
        if self.state == LifecycleState::Running && !remove.force {
            match self.sync_state().await {
                Ok(LifecycleState::Running) => {
                    return Err(self.conflict(Operation::Remove, "container is running"));
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        bounded(self.deadline, Operation::Remove, Some(&id), async {
            match self.runtime.remove_container(&id, &remove).await {
                Ok(()) => Ok(()),
                Err(ContainerError::NotFound(_)) => {
                    warn!(container = %id.short(), "Container was already gone");
                    Ok(())
                }
                Err(e) => Err(normalize(Operation::Remove, Some(&id), e)),
            }
        })
        .await?;

        debug!(container = %id.short(), "Container removed");
        self.retired = self.handle.take();
        self.host_config = None;
        self.state = LifecycleState::Removed;
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Inspect this controller's container, including one that was removed.
    pub async fn inspect(&self) -> Result<ContainerInfo, LifecycleError> {
        let id = self
            .handle
            .as_ref()
            .or(self.retired.as_ref())
            .cloned()
            .ok_or_else(|| LifecycleError::not_ready(Operation::Inspect))?;
        self.inspect_container(&id).await
    }

    /// Inspect any container the runtime knows.
    pub async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, LifecycleError> {
        bounded(self.deadline, Operation::Inspect, Some(id), async {
            self.runtime
                .inspect_container(id)
                .await
                .map_err(|e| normalize(Operation::Inspect, Some(id), e))
        })
        .await
    }

    /// Refresh the recorded state from the runtime's view of the container.
    pub async fn sync_state(&mut self) -> Result<LifecycleState, LifecycleError> {
        if !self.state.has_container() {
            return Ok(self.state);
        }
        let info = self.inspect().await?;
        let state = LifecycleState::from_runtime(info.state);
        if state != self.state {
            debug!(container = %info.id.short(), from = %self.state, to = %state, "Recorded state refreshed");
            self.state = state;
        }
        Ok(state)
    }

    // =========================================================================
    // File transfer
    // =========================================================================

    /// Copy the container spec's upload host path into `container_dir`.
    pub async fn upload(&self, container_dir: &str) -> Result<(), LifecycleError> {
        let id = self.require_handle(Operation::Upload)?;
        let upload = self.require_spec(Operation::Upload)?.upload.clone();
        let fail = |e: ArchiveError| normalize(Operation::Upload, Some(&id), e);

        transfer::check_destination(container_dir, upload.no_overwrite_dir_non_dir).map_err(fail)?;

        let host_path = upload.host_path.clone();
        let archive = tokio::task::spawn_blocking(move || transfer::pack(&host_path))
            .await
            .map_err(|e| {
                LifecycleError::new(ErrorKind::Io, Operation::Upload, Some(id.clone()), e.to_string())
            })?
            .map_err(fail)?;

        let request = UploadRequest {
            path: container_dir.to_string(),
            archive: Bytes::from(archive),
            no_overwrite_dir_non_dir: upload.no_overwrite_dir_non_dir,
        };
        bounded(self.deadline, Operation::Upload, Some(&id), async {
            self.runtime
                .upload_to_container(&id, &request)
                .await
                .map_err(|e| normalize(Operation::Upload, Some(&id), e))
        })
        .await?;

        debug!(
            container = %id.short(),
            source = %upload.host_path.display(),
            dest = container_dir,
            "Uploaded into container"
        );
        Ok(())
    }

    /// Copy `container_path` out into the container spec's download host path.
    ///
    /// Returns the regular files written on the host.
    pub async fn download(&self, container_path: &str) -> Result<Vec<PathBuf>, LifecycleError> {
        let id = self.require_handle(Operation::Download)?;
        let dest = self.require_spec(Operation::Download)?.download.host_path.clone();

        let buffer = SinkBuffer::new();
        bounded(self.deadline, Operation::Download, Some(&id), async {
            let stream = self
                .runtime
                .download_from_container(&id, container_path)
                .await
                .map_err(|e| normalize(Operation::Download, Some(&id), e))?;
            relay::spawn(
                Operation::Download,
                Some(id.clone()),
                stream.map_ok(LogChunk::stdout),
                Sink::Buffer(buffer.clone()),
                Sink::Discard,
            )
            .finish()
            .await
        })
        .await?;

        let archive = buffer.contents();
        let unpack_dest = dest.clone();
        let written = tokio::task::spawn_blocking(move || transfer::unpack(&archive, &unpack_dest))
            .await
            .map_err(|e| {
                LifecycleError::new(ErrorKind::Io, Operation::Download, Some(id.clone()), e.to_string())
            })?
            .map_err(|e| normalize(Operation::Download, Some(&id), e))?;

        debug!(
            container = %id.short(),
            source = container_path,
            dest = %dest.display(),
            files = written.len(),
            "Downloaded from container"
        );
        Ok(written)
    }
}

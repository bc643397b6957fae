// ABOUTME: In-process container engine implementing every runtime capability.
// ABOUTME: Scriptable output and exit codes let lifecycle code run without a daemon.

use crate::orchestration::{CreateSpec, HostConfig, ListSpec, PullSpec, RemoveSpec, RenameSpec};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    AttachOptions, ByteStream, ContainerError, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, ImageError, ImageOps, ImageSummary, LogChunk, LogError, LogOps, LogOptions,
    LogStream, OutputStream, RuntimeInfo, RuntimeInfoError, RuntimeMetadata, TransferError,
    TransferOps, UploadRequest,
};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, future, stream};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const OFFLINE: &str = "memory runtime is offline";
const CHUNK_SIZE: usize = 8 * 1024;
/// Exit status reported for a container stopped by signal.
const STOPPED_EXIT_CODE: i64 = 143;

/// What a container started from a given image prints and how it ends.
#[derive(Debug, Clone, Default)]
pub struct OutputScript {
    pub chunks: Vec<LogChunk>,
    pub exit_code: i64,
    /// Fail the attach stream with this message after the chunks.
    pub interrupt: Option<String>,
    /// Keep running after the output until stopped or exited explicitly.
    pub hold_open: bool,
}

impl OutputScript {
    pub fn new(chunks: Vec<LogChunk>, exit_code: i64) -> Self {
        Self {
            chunks,
            exit_code,
            ..Default::default()
        }
    }

    pub fn interrupted(mut self, message: impl Into<String>) -> Self {
        self.interrupt = Some(message.into());
        self
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// Container engine kept entirely in memory.
///
/// Clones share state, so a test can keep one clone to script and observe
/// the engine while a controller drives another.
#[derive(Clone, Default)]
pub struct MemoryRuntime {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    offline: bool,
    latency: Duration,
    images: BTreeMap<String, ImageRecord>,
    containers: BTreeMap<String, ContainerRecord>,
    next_id: u64,
    pulls: Vec<String>,
}

struct ImageRecord {
    id: ImageId,
    script: OutputScript,
}

struct ContainerRecord {
    id: ContainerId,
    name: String,
    image: String,
    labels: BTreeMap<String, String>,
    state: ContainerState,
    exit_code: Option<i64>,
    created: DateTime<Utc>,
    script: OutputScript,
    history: Vec<(DateTime<Utc>, LogChunk)>,
    create_host_config: HostConfig,
    start_host_configs: Vec<HostConfig>,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    exit: watch::Sender<Option<i64>>,
}

impl ContainerRecord {
    fn finish(&mut self, code: i64) {
        self.state = ContainerState::Exited;
        self.exit_code = Some(code);
        self.exit.send_replace(Some(code));
    }

    fn status(&self) -> String {
        match (self.state, self.exit_code) {
            (ContainerState::Running, _) => "Up".to_string(),
            (ContainerState::Exited, Some(code)) => format!("Exited ({})", code),
            (state, _) => capitalize(&state.to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical form of an image reference, so "alpine" and "alpine:latest" match.
fn image_key(reference: &str) -> String {
    ImageRef::parse(reference)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

fn join_path(base: &str, rel: &str) -> String {
    normalize_path(&format!("{}/{}", base, rel))
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an image available locally, as if already pulled.
    pub fn with_image(self, reference: &str) -> Self {
        self.with_output(reference, OutputScript::default())
    }

    /// Make an image available whose containers follow `script`.
    pub fn with_output(self, reference: &str, script: OutputScript) -> Self {
        {
            let mut inner = self.inner.lock();
            let id = inner.image_id();
            inner
                .images
                .insert(image_key(reference), ImageRecord { id, script });
        }
        self
    }

    /// Simulate the daemon going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.lock().offline = !reachable;
    }

    /// Delay every pull, create and start by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// References pulled so far, in order.
    pub fn pulls(&self) -> Vec<String> {
        self.inner.lock().pulls.clone()
    }

    /// Number of containers the engine currently knows about.
    pub fn container_count(&self) -> usize {
        self.inner.lock().containers.len()
    }

    /// Host config recorded at create, and the one passed to each start.
    pub fn recorded_host_configs(&self, id: &ContainerId) -> Option<(HostConfig, Vec<HostConfig>)> {
        let inner = self.inner.lock();
        inner
            .containers
            .get(id.as_str())
            .map(|c| (c.create_host_config.clone(), c.start_host_configs.clone()))
    }

    /// Make a running container exit with `code`.
    pub fn exit_container(&self, id: &ContainerId, code: i64) {
        if let Some(container) = self.inner.lock().containers.get_mut(id.as_str())
            && container.state == ContainerState::Running
        {
            container.finish(code);
        }
    }

    /// Place a file inside a container's filesystem.
    pub fn write_file(&self, id: &ContainerId, path: &str, contents: impl Into<Vec<u8>>) {
        if let Some(container) = self.inner.lock().containers.get_mut(id.as_str()) {
            container.files.insert(normalize_path(path), contents.into());
        }
    }

    /// Contents of a file inside a container.
    pub fn read_file(&self, id: &ContainerId, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .containers
            .get(id.as_str())
            .and_then(|c| c.files.get(&normalize_path(path)).cloned())
    }

    async fn pause(&self) {
        let latency = self.inner.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn online(&self) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.inner.lock();
        if inner.offline { None } else { Some(inner) }
    }
}

impl Inner {
    fn image_id(&mut self) -> ImageId {
        self.next_id += 1;
        ImageId::new(format!("sha256:{:012x}{}", 0x1a6e_0000_0000u64 + self.next_id, "0".repeat(52)))
    }

    fn container_id(&mut self) -> (ContainerId, u64) {
        self.next_id += 1;
        let id = format!("{:012x}{}", 0xc047_0000_0000u64 + self.next_id, "f".repeat(52));
        (ContainerId::new(id), self.next_id)
    }

    fn container(&mut self, id: &ContainerId) -> Option<&mut ContainerRecord> {
        self.containers.get_mut(id.as_str())
    }
}

impl Sealed for MemoryRuntime {}

#[async_trait]
impl RuntimeInfo for MemoryRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        self.online()
            .ok_or_else(|| RuntimeInfoError::ConnectionFailed(OFFLINE.to_string()))?;
        Ok(RuntimeMetadata {
            name: "Memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: "1.41".to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.online()
            .map(|_| ())
            .ok_or_else(|| RuntimeInfoError::ConnectionFailed(OFFLINE.to_string()))
    }
}

#[async_trait]
impl ImageOps for MemoryRuntime {
    async fn pull_image(&self, spec: &PullSpec) -> Result<(), ImageError> {
        let reference = spec.reference();
        if spec.repository.is_empty() {
            return Err(ImageError::NotFound(reference));
        }
        self.pause().await;
        let mut inner = self
            .online()
            .ok_or_else(|| ImageError::Unavailable(OFFLINE.to_string()))?;
        inner.pulls.push(reference.clone());
        let key = image_key(&reference);
        if !inner.images.contains_key(&key) {
            let id = inner.image_id();
            inner.images.insert(
                key,
                ImageRecord {
                    id,
                    script: OutputScript::default(),
                },
            );
        }
        Ok(())
    }

    async fn list_images(&self, _spec: &ListSpec) -> Result<Vec<ImageSummary>, ImageError> {
        let inner = self
            .online()
            .ok_or_else(|| ImageError::Unavailable(OFFLINE.to_string()))?;
        Ok(inner
            .images
            .iter()
            .map(|(reference, image)| ImageSummary {
                id: image.id.clone(),
                tags: vec![reference.clone()],
                size: 0,
            })
            .collect())
    }
}

#[async_trait]
impl ContainerOps for MemoryRuntime {
    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId, ContainerError> {
        self.pause().await;
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;

        let key = image_key(&spec.image);
        let script = inner
            .images
            .get(&key)
            .map(|image| image.script.clone())
            .ok_or_else(|| ContainerError::ImageNotFound(spec.image.clone()))?;

        if let Some(name) = &spec.name
            && inner.containers.values().any(|c| &c.name == name)
        {
            return Err(ContainerError::AlreadyExists(name.clone()));
        }

        let (id, seq) = inner.container_id();
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("dockyard_{}", seq));
        let (exit, _) = watch::channel(None);

        inner.containers.insert(
            id.as_str().to_string(),
            ContainerRecord {
                id: id.clone(),
                name,
                image: key,
                labels: spec.labels.clone(),
                state: ContainerState::Created,
                exit_code: None,
                created: Utc::now(),
                script,
                history: Vec::new(),
                create_host_config: (*spec.host_config).clone(),
                start_host_configs: Vec::new(),
                files: BTreeMap::new(),
                dirs: BTreeSet::new(),
                exit,
            },
        );
        Ok(id)
    }

    async fn start_container(
        &self,
        id: &ContainerId,
        host_config: &HostConfig,
    ) -> Result<(), ContainerError> {
        self.pause().await;
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.state == ContainerState::Running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.state = ContainerState::Running;
        container.exit_code = None;
        container.exit.send_replace(None);
        container.start_host_configs.push(host_config.clone());

        let now = Utc::now();
        let output: Vec<_> = container
            .script
            .chunks
            .iter()
            .map(|chunk| (now, chunk.clone()))
            .collect();
        container.history.extend(output);
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.state != ContainerState::Running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.finish(STOPPED_EXIT_CODE);
        Ok(())
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        spec: &RemoveSpec,
    ) -> Result<(), ContainerError> {
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.state == ContainerState::Running {
            if !spec.force {
                return Err(ContainerError::Conflict(format!(
                    "cannot remove running container {}",
                    id.short()
                )));
            }
            container.finish(STOPPED_EXIT_CODE);
        }
        inner.containers.remove(id.as_str());
        Ok(())
    }

    async fn rename_container(
        &self,
        id: &ContainerId,
        spec: &RenameSpec,
    ) -> Result<(), ContainerError> {
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;

        if spec.new_name.is_empty() {
            return Err(ContainerError::InvalidConfig("empty container name".to_string()));
        }
        if inner
            .containers
            .values()
            .any(|c| c.name == spec.new_name && &c.id != id)
        {
            return Err(ContainerError::AlreadyExists(spec.new_name.clone()));
        }
        let container = inner
            .container(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        container.name = spec.new_name.clone();
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let mut inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        Ok(ContainerInfo {
            id: container.id.clone(),
            name: container.name.clone(),
            image: container.image.clone(),
            state: container.state,
            exit_code: container.exit_code,
            created: container.created.to_rfc3339(),
            labels: container.labels.clone(),
        })
    }

    async fn list_containers(
        &self,
        spec: &ListSpec,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let inner = self
            .online()
            .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;

        Ok(inner
            .containers
            .values()
            .filter(|c| spec.include_stopped || c.state == ContainerState::Running)
            .filter(|c| {
                spec.labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state.to_string(),
                status: c.status(),
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let mut exit = {
            let mut inner = self
                .online()
                .ok_or_else(|| ContainerError::Unavailable(OFFLINE.to_string()))?;
            let container = inner
                .container(id)
                .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
            if container.state == ContainerState::Running && !container.script.hold_open {
                let code = container.script.exit_code;
                container.finish(code);
            }
            container.exit.subscribe()
        };

        let code = exit
            .wait_for(Option::is_some)
            .await
            .map(|code| *code)
            .map_err(|_| ContainerError::NotFound(id.to_string()))?;
        code.ok_or_else(|| ContainerError::Runtime("exit status missing".to_string()))
    }
}

#[async_trait]
impl LogOps for MemoryRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<OutputStream, LogError> {
        let mut inner = self
            .online()
            .ok_or_else(|| LogError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?;

        let mut chunks: Vec<LogChunk> = container
            .history
            .iter()
            .filter(|(at, _)| opts.since.is_none_or(|since| *at >= since))
            .filter(|(_, chunk)| match chunk.stream {
                LogStream::Stdout => opts.stdout,
                LogStream::Stderr => opts.stderr,
            })
            .map(|(at, chunk)| {
                if opts.timestamps {
                    let mut data = format!("{} ", at.to_rfc3339()).into_bytes();
                    data.extend_from_slice(&chunk.data);
                    LogChunk {
                        stream: chunk.stream,
                        data: Bytes::from(data),
                    }
                } else {
                    chunk.clone()
                }
            })
            .collect();
        if let Some(tail) = opts.tail {
            let keep = usize::try_from(tail).unwrap_or(usize::MAX);
            let skip = chunks.len().saturating_sub(keep);
            chunks.drain(..skip);
        }

        let follow = opts.follow
            && container.state == ContainerState::Running
            && container.script.hold_open;
        let mut exit = container.exit.subscribe();
        drop(inner);

        let tail = stream::once(async move {
            if follow {
                let _ = exit.wait_for(Option::is_some).await;
            }
            None
        })
        .filter_map(future::ready);

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)).chain(tail)))
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
        opts: &AttachOptions,
    ) -> Result<OutputStream, LogError> {
        let mut inner = self
            .online()
            .ok_or_else(|| LogError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?;

        let running = container.state == ContainerState::Running;
        let replay: Vec<LogChunk> = if opts.logs || running {
            container
                .script
                .chunks
                .iter()
                .filter(|chunk| match chunk.stream {
                    LogStream::Stdout => opts.stdout,
                    LogStream::Stderr => opts.stderr,
                })
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let script = container.script.clone();
        let mut exit = container.exit.subscribe();
        drop(inner);

        let engine = self.inner.clone();
        let owned_id = id.clone();
        let stream_live = opts.stream && running;
        let tail = stream::once(async move {
            if !stream_live {
                return None;
            }
            if let Some(message) = script.interrupt {
                return Some(Err(LogError::StreamError(message)));
            }
            if script.hold_open {
                let _ = exit.wait_for(Option::is_some).await;
            } else {
                finish_if_running(&engine, &owned_id, script.exit_code);
            }
            None
        })
        .filter_map(future::ready);

        Ok(Box::pin(stream::iter(replay.into_iter().map(Ok)).chain(tail)))
    }
}

#[async_trait]
impl TransferOps for MemoryRuntime {
    async fn upload_to_container(
        &self,
        id: &ContainerId,
        request: &UploadRequest,
    ) -> Result<(), TransferError> {
        let mut inner = self
            .online()
            .ok_or_else(|| TransferError::Unavailable(OFFLINE.to_string()))?;
        let container = inner
            .container(id)
            .ok_or_else(|| TransferError::ContainerNotFound(id.to_string()))?;

        let root = normalize_path(&request.path);
        if container.files.contains_key(&root) {
            return Err(TransferError::Conflict(format!("{} is not a directory", root)));
        }

        let mut archive = tar::Archive::new(request.archive.as_ref());
        let entries = archive
            .entries()
            .map_err(|e| TransferError::Archive(e.to_string()))?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| TransferError::Archive(e.to_string()))?;
            let rel = entry
                .path()
                .map_err(|e| TransferError::Archive(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let target = join_path(&root, &rel);
            if entry.header().entry_type().is_dir() {
                dirs.push(target);
            } else {
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| TransferError::Archive(e.to_string()))?;
                files.push((target, data));
            }
        }

        if request.no_overwrite_dir_non_dir {
            for (path, _) in &files {
                let prefix = format!("{}/", path);
                if container.dirs.contains(path)
                    || container.files.keys().any(|f| f.starts_with(&prefix))
                {
                    return Err(TransferError::Conflict(format!(
                        "cannot overwrite directory {} with non-directory",
                        path
                    )));
                }
            }
            for path in &dirs {
                if container.files.contains_key(path) {
                    return Err(TransferError::Conflict(format!(
                        "cannot overwrite non-directory {} with directory",
                        path
                    )));
                }
            }
        }

        container.dirs.insert(root);
        container.dirs.extend(dirs);
        container.files.extend(files);
        Ok(())
    }

    async fn download_from_container(
        &self,
        id: &ContainerId,
        path: &str,
    ) -> Result<ByteStream, TransferError> {
        let archive = {
            let mut inner = self
                .online()
                .ok_or_else(|| TransferError::Unavailable(OFFLINE.to_string()))?;
            let container = inner
                .container(id)
                .ok_or_else(|| TransferError::ContainerNotFound(id.to_string()))?;
            pack_container_path(container, path)?
        };

        let chunks: Vec<Result<Bytes, TransferError>> = archive
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

fn finish_if_running(engine: &Mutex<Inner>, id: &ContainerId, code: i64) {
    let mut inner = engine.lock();
    if let Some(container) = inner.container(id)
        && container.state == ContainerState::Running
    {
        container.finish(code);
    }
}

/// Tar `path` the way the engine's archive endpoint does: rooted at its base name.
fn pack_container_path(container: &ContainerRecord, path: &str) -> Result<Vec<u8>, TransferError> {
    let source = normalize_path(path);
    let base = source.rsplit('/').next().unwrap_or_default().to_string();
    let prefix = format!("{}/", source);
    let archive_err = |e: std::io::Error| TransferError::Archive(e.to_string());

    let mut builder = tar::Builder::new(Vec::new());
    if let Some(data) = container.files.get(&source) {
        append_file(&mut builder, &base, data).map_err(archive_err)?;
    } else {
        let nested: Vec<_> = container
            .files
            .iter()
            .filter(|(f, _)| f.starts_with(&prefix))
            .collect();
        let subdirs: Vec<_> = container
            .dirs
            .iter()
            .filter(|d| d.starts_with(&prefix))
            .collect();
        if nested.is_empty() && subdirs.is_empty() && !container.dirs.contains(&source) {
            return Err(TransferError::PathNotFound(path.to_string()));
        }

        append_dir(&mut builder, &base).map_err(archive_err)?;
        for dir in subdirs {
            let rel = format!("{}/{}", base, &dir[prefix.len()..]);
            append_dir(&mut builder, &rel).map_err(archive_err)?;
        }
        for (file, data) in nested {
            let rel = format!("{}/{}", base, &file[prefix.len()..]);
            append_file(&mut builder, &rel, data).map_err(archive_err)?;
        }
    }
    builder.into_inner().map_err(archive_err)
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, path, data)
}

fn append_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    builder.append_data(&mut header, path, std::io::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn create_spec(image: &str) -> CreateSpec {
        CreateSpec {
            image: image.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn default_tag_is_implied() {
        let engine = MemoryRuntime::new().with_image("alpine");
        assert!(engine.create_container(&create_spec("alpine:latest")).await.is_ok());
        assert!(matches!(
            engine.create_container(&create_spec("alpine:3.20")).await,
            Err(ContainerError::ImageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn offline_engine_reports_unavailable() {
        let engine = MemoryRuntime::new().with_image("alpine");
        engine.set_reachable(false);
        assert!(matches!(
            engine.create_container(&create_spec("alpine")).await,
            Err(ContainerError::Unavailable(_))
        ));
        assert!(engine.ping().await.is_err());
    }

    #[tokio::test]
    async fn download_roots_archive_at_base_name() {
        let engine = MemoryRuntime::new().with_image("alpine");
        let id = engine.create_container(&create_spec("alpine")).await.unwrap();
        engine.write_file(&id, "/srv/app/config.toml", "port = 80");
        engine.write_file(&id, "/srv/app/bin/run", "#!/bin/sh");

        let bytes: Vec<Bytes> = engine
            .download_from_container(&id, "/srv/app")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let archive: Vec<u8> = bytes.concat();

        let mut names: Vec<String> = tar::Archive::new(archive.as_slice())
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["app", "app/bin/run", "app/config.toml"]);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let engine = MemoryRuntime::new().with_image("alpine");
        let id = engine.create_container(&create_spec("alpine")).await.unwrap();
        assert!(matches!(
            engine.download_from_container(&id, "/nope").await,
            Err(TransferError::PathNotFound(_))
        ));
    }
}

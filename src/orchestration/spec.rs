// ABOUTME: Per-operation configuration values composed into one ContainerSpec.
// ABOUTME: Provides the defaults every controller starts from; callers override fields.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::{ErrorKind, LifecycleError, Operation};
use super::relay::Sink;
use super::restart_policy::RestartPolicy;
use crate::runtime::{AttachOptions, LogOptions, RegistryAuth};
use crate::types::ImageRef;

const DEFAULT_TAG: &str = "latest";

/// Every sub-configuration a container's lifecycle needs.
///
/// Sub-specs are plain values that can be built on their own; the aggregate
/// only groups them. The single shared piece is the [`HostConfig`] behind
/// `create.host_config`, which the controller hands to both create and start.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub pull: PullSpec,
    pub list: ListSpec,
    pub create: CreateSpec,
    pub logs: LogsSpec,
    pub attach: AttachSpec,
    pub download: DownloadSpec,
    pub upload: UploadSpec,
    pub remove: RemoveSpec,
    pub rename: RenameSpec,
}

impl ContainerSpec {
    /// Defaults rooted at the process working directory.
    pub fn new_default() -> Result<Self, LifecycleError> {
        let cwd = std::env::current_dir().map_err(|e| {
            LifecycleError::new(
                ErrorKind::Environment,
                Operation::Configure,
                None,
                format!("cannot resolve working directory: {}", e),
            )
        })?;
        Ok(Self::rooted_at(cwd))
    }

    /// Defaults with transfer paths rooted at `dir`. Reads nothing from the environment.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            pull: PullSpec::default(),
            list: ListSpec::default(),
            create: CreateSpec::default(),
            logs: LogsSpec::default(),
            attach: AttachSpec::default(),
            download: DownloadSpec {
                host_path: dir.clone(),
            },
            upload: UploadSpec {
                host_path: dir,
                no_overwrite_dir_non_dir: true,
            },
            remove: RemoveSpec::default(),
            rename: RenameSpec::default(),
        }
    }

    /// Mutable access to the host configuration shared by create and start.
    pub fn host_config_mut(&mut self) -> &mut HostConfig {
        Arc::make_mut(&mut self.create.host_config)
    }
}

/// Which image to fetch and with what credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSpec {
    pub repository: String,
    pub tag: String,
    pub auth: Option<RegistryAuth>,
}

impl Default for PullSpec {
    fn default() -> Self {
        Self {
            repository: String::new(),
            tag: DEFAULT_TAG.to_string(),
            auth: None,
        }
    }
}

impl PullSpec {
    /// The full reference handed to the registry.
    pub fn reference(&self) -> String {
        if self.tag.contains(':') {
            format!("{}@{}", self.repository, self.tag)
        } else {
            format!("{}:{}", self.repository, self.tag)
        }
    }
}

impl From<&ImageRef> for PullSpec {
    fn from(image: &ImageRef) -> Self {
        Self {
            repository: image.repository(),
            tag: image
                .digest()
                .or(image.tag())
                .unwrap_or(DEFAULT_TAG)
                .to_string(),
            auth: None,
        }
    }
}

/// Listing filters for containers and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec {
    /// Include stopped containers (and intermediate images).
    pub include_stopped: bool,
    /// Only containers carrying all of these labels.
    pub labels: BTreeMap<String, String>,
}

impl Default for ListSpec {
    fn default() -> Self {
        Self {
            include_stopped: true,
            labels: BTreeMap::new(),
        }
    }
}

/// Container creation parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSpec {
    /// Requested container name; the runtime picks one when absent.
    pub name: Option<String>,
    pub image: String,
    /// Overrides the image CMD when non-empty.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub open_stdin: bool,
    pub tty: bool,
    pub network_disabled: bool,
    pub host_config: Arc<HostConfig>,
}

/// Host-level settings bound at create and re-affirmed at start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostConfig {
    pub read_only_rootfs: bool,
    pub restart_policy: RestartPolicy,
    pub mounts: Vec<Mount>,
    pub port_bindings: Vec<PortBinding>,
}

/// Bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Container port published on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ip: Option<String>,
    /// Runtime picks a free port when absent.
    pub host_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Log retrieval settings and where the bytes go.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsSpec {
    pub follow: bool,
    pub since: Option<DateTime<Utc>>,
    pub timestamps: bool,
    /// Only the last N lines; everything when absent.
    pub tail: Option<u64>,
    pub output: Sink,
    pub error: Sink,
}

impl Default for LogsSpec {
    fn default() -> Self {
        Self {
            follow: true,
            since: None,
            timestamps: false,
            tail: None,
            output: Sink::Stdout,
            error: Sink::Stderr,
        }
    }
}

impl LogsSpec {
    pub fn options(&self) -> LogOptions {
        LogOptions {
            stdout: true,
            stderr: true,
            follow: self.follow,
            timestamps: self.timestamps,
            tail: self.tail,
            since: self.since,
        }
    }
}

/// Attach settings and where the bytes go.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachSpec {
    pub stream: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Replay output produced before the attach.
    pub logs: bool,
    /// Treat a TTY container's output as one stream: stderr frames go to
    /// `output` and `error` is never opened. No effect without `create.tty`.
    pub raw_terminal: bool,
    pub output: Sink,
    pub error: Sink,
}

impl Default for AttachSpec {
    fn default() -> Self {
        Self {
            stream: true,
            stdout: true,
            stderr: true,
            logs: false,
            raw_terminal: true,
            output: Sink::Stdout,
            error: Sink::Stderr,
        }
    }
}

impl AttachSpec {
    pub fn options(&self) -> AttachOptions {
        AttachOptions {
            stream: self.stream,
            stdout: self.stdout,
            stderr: self.stderr,
            logs: self.logs,
        }
    }
}

/// Host directory that downloaded archives are unpacked into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub host_path: PathBuf,
}

/// Host file or directory that uploads are packed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSpec {
    pub host_path: PathBuf,
    /// Refuse to replace a directory with a file (or vice versa), and refuse
    /// destinations that climb out of their root.
    pub no_overwrite_dir_non_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveSpec {
    /// Kill and remove a running container.
    pub force: bool,
    /// Also remove anonymous volumes.
    pub remove_volumes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenameSpec {
    pub new_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_container_profile() {
        let spec = ContainerSpec::rooted_at("/work");

        assert!(spec.list.include_stopped);
        assert!(!spec.create.host_config.read_only_rootfs);
        assert_eq!(spec.create.host_config.restart_policy, RestartPolicy::No);
        assert!(!spec.create.attach_stdin && !spec.create.attach_stdout && !spec.create.attach_stderr);
        assert!(!spec.create.tty && !spec.create.network_disabled && !spec.create.open_stdin);

        assert!(spec.logs.follow);
        assert!(!spec.logs.timestamps);
        assert_eq!(spec.logs.output, Sink::Stdout);
        assert_eq!(spec.logs.error, Sink::Stderr);

        assert!(spec.attach.stream && spec.attach.stdout && spec.attach.stderr);
        assert!(spec.attach.raw_terminal && !spec.attach.logs);

        assert_eq!(spec.download.host_path, PathBuf::from("/work"));
        assert_eq!(spec.upload.host_path, PathBuf::from("/work"));
        assert!(spec.upload.no_overwrite_dir_non_dir);
        assert_eq!(spec.pull.tag, "latest");
        assert_eq!(spec.remove, RemoveSpec::default());
    }

    #[test]
    fn host_config_mut_detaches_from_other_clones() {
        let mut spec = ContainerSpec::rooted_at("/work");
        let snapshot = spec.clone();
        assert!(Arc::ptr_eq(
            &spec.create.host_config,
            &snapshot.create.host_config
        ));

        spec.host_config_mut().read_only_rootfs = true;

        assert!(spec.create.host_config.read_only_rootfs);
        assert!(!snapshot.create.host_config.read_only_rootfs);
    }

    #[test]
    fn pull_spec_from_image_ref() {
        let image = ImageRef::parse("quay.io/eris/keys:0.12").unwrap();
        let pull = PullSpec::from(&image);
        assert_eq!(pull.repository, "quay.io/eris/keys");
        assert_eq!(pull.tag, "0.12");
        assert_eq!(pull.reference(), "quay.io/eris/keys:0.12");

        let pinned = ImageRef::parse("ipfs@sha256:feed").unwrap();
        assert_eq!(PullSpec::from(&pinned).reference(), "ipfs@sha256:feed");
    }

    #[test]
    fn log_options_follow_spec() {
        let spec = LogsSpec {
            follow: false,
            tail: Some(20),
            timestamps: true,
            ..LogsSpec::default()
        };
        let opts = spec.options();
        assert!(!opts.follow);
        assert!(opts.timestamps);
        assert_eq!(opts.tail, Some(20));
        assert!(opts.stdout && opts.stderr);
    }
}

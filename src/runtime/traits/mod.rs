// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps, ContainerOps, LogOps, TransferOps, RuntimeInfo and FullRuntime.

mod container;
mod image;
mod logs;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;
mod transfer;

pub use container::{ContainerError, ContainerOps};
pub use image::{ImageError, ImageOps};
pub use logs::{AttachOptions, LogChunk, LogError, LogOps, LogOptions, LogStream, OutputStream};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;
pub use transfer::{ByteStream, TransferError, TransferOps, UploadRequest};

/// Every capability the lifecycle controller drives.
pub trait FullRuntime: ImageOps + ContainerOps + LogOps + TransferOps + RuntimeInfo {}

impl<T> FullRuntime for T where T: ImageOps + ContainerOps + LogOps + TransferOps + RuntimeInfo {}

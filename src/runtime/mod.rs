// ABOUTME: Container runtime clients behind composable capability traits.
// ABOUTME: Bollard client for Docker/Podman, an in-memory engine, and socket detection.

mod bollard;
mod detection;
mod error;
mod memory;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{ConnectError, ConnectErrorKind};
pub use memory::{MemoryRuntime, OutputScript};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeEndpoint, RuntimeType};

/// Detect a local runtime, connect to it, and confirm it answers.
pub async fn connect_local(config: Option<&RuntimeConfig>) -> Result<BollardRuntime, ConnectError> {
    let endpoint = detect_local(config)?;
    tracing::debug!(
        runtime = %endpoint.runtime_type,
        socket = %endpoint.socket_path,
        "Connecting to container runtime"
    );
    let runtime = BollardRuntime::connect(&endpoint)?;
    runtime.ping().await?;
    Ok(runtime)
}

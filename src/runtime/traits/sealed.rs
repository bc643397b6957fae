// ABOUTME: Sealed trait pattern for runtime capability traits.
// ABOUTME: Only the bollard and in-memory runtimes can implement them.

/// Sealed trait to prevent external implementations.
///
/// Capability traits can gain methods without a breaking release because
/// only runtimes inside this crate implement them.
pub trait Sealed {}

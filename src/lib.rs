// ABOUTME: Library root for dockyard - container lifecycle orchestration.
// ABOUTME: The command-line front end is in main.rs.

pub mod error;
pub mod orchestration;
pub mod runtime;
pub mod types;

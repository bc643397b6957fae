// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the pull, run, ps and images subcommands and global runtime flags.

use clap::{Parser, Subcommand};
use dockyard::runtime::RuntimeType;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Run short-lived service containers on Docker or Podman")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Runtime socket path (defaults to auto-detection)
    #[arg(long, global = true)]
    pub socket: Option<String>,

    /// Runtime to use: docker or podman
    #[arg(long, global = true)]
    pub runtime: Option<RuntimeType>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull an image from its registry
    Pull {
        /// Image reference, e.g. alpine:3.20
        image: String,
    },

    /// Create a container, stream its output, and remove it when it exits
    Run {
        /// Image reference
        image: String,

        /// Container name
        #[arg(long)]
        name: Option<String>,

        /// Environment variables (KEY=VALUE)
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Pull the image before creating the container
        #[arg(long)]
        pull: bool,

        /// Keep the container after it exits
        #[arg(long)]
        keep: bool,

        /// Command to run instead of the image default
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// List local images
    Images,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_trailing_command() {
        let cli = Cli::parse_from([
            "dockyard", "run", "alpine", "-e", "A=1", "--", "echo", "hi",
        ]);
        match cli.command {
            Commands::Run {
                image,
                env,
                command,
                ..
            } => {
                assert_eq!(image, "alpine");
                assert_eq!(env, vec!["A=1"]);
                assert_eq!(command, vec!["echo", "hi"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn runtime_flag_parses() {
        let cli = Cli::parse_from(["dockyard", "--runtime", "podman", "images"]);
        assert_eq!(cli.runtime, Some(RuntimeType::Podman));
    }
}

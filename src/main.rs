// ABOUTME: Entry point for the dockyard CLI application.
// ABOUTME: Parses arguments, connects to the local runtime, and drives lifecycle controllers.

mod cli;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use dockyard::error::{Error, Result};
use dockyard::orchestration::{ContainerSpec, LifecycleController, WaitOutcome};
use dockyard::runtime::{BollardRuntime, RuntimeConfig, connect_local};
use dockyard::types::ImageRef;
use output::{Output, OutputMode};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Grace period for a container interrupted with Ctrl-C.
const INTERRUPT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let out = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    if let Err(e) = run(cli, &out).await {
        out.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, out: &Output) -> Result<()> {
    let config = RuntimeConfig {
        runtime: cli.runtime,
        socket: cli.socket,
    };

    match cli.command {
        Commands::Pull { image } => {
            let image = ImageRef::parse(&image)?;
            let controller = LifecycleController::new(connect(&config).await?);
            out.progress(&format!("Pulling {}...", image));
            controller.pull_image(&image, None).await?;
            out.success(&format!("Pulled {}", image));
            Ok(())
        }
        Commands::Run {
            image,
            name,
            env,
            pull,
            keep,
            command,
        } => {
            let image = ImageRef::parse(&image)?;
            let spec = run_spec(&image, name, &env, command)?;
            let controller = LifecycleController::with_spec(connect(&config).await?, spec);
            run_container(controller, pull, keep, out).await
        }
        Commands::Ps { all } => {
            let mut spec = ContainerSpec::new_default()?;
            spec.list.include_stopped = all;
            let controller = LifecycleController::with_spec(connect(&config).await?, spec);
            let containers = controller.list_containers().await?;
            out.rows(&["CONTAINER ID", "NAME", "IMAGE", "STATUS"], &containers, |c| {
                vec![
                    c.id.short().to_string(),
                    c.name.clone(),
                    c.image.clone(),
                    c.status.clone(),
                ]
            });
            Ok(())
        }
        Commands::Images => {
            let controller = LifecycleController::new(connect(&config).await?);
            let images = controller.list_images().await?;
            out.rows(&["IMAGE ID", "TAGS", "SIZE"], &images, |i| {
                vec![
                    i.id.short().to_string(),
                    i.tags.join(","),
                    format_size(i.size),
                ]
            });
            Ok(())
        }
    }
}

async fn connect(config: &RuntimeConfig) -> Result<Arc<BollardRuntime>> {
    Ok(Arc::new(connect_local(Some(config)).await?))
}

/// Create, start, attach, wait, and clean up.
async fn run_container(
    mut controller: LifecycleController<BollardRuntime>,
    pull: bool,
    keep: bool,
    out: &Output,
) -> Result<()> {
    if pull {
        out.progress("Pulling image...");
        controller.pull().await?;
    }
    let id = controller.create().await?;
    out.progress(&format!("Created container {}", id.short()));

    let outcome = attach_and_wait(&mut controller).await;

    if !keep
        && let Err(e) = controller.remove().await
    {
        tracing::warn!(container = %id.short(), "Cleanup failed: {}", e);
    }

    match outcome? {
        WaitOutcome::Exited(0) => {
            out.success(&format!("Container {} exited", id.short()));
            Ok(())
        }
        WaitOutcome::Exited(code) => Err(Error::ContainerFailed(code)),
        WaitOutcome::Detached => {
            out.success(&format!("Container {} interrupted", id.short()));
            Ok(())
        }
    }
}

async fn attach_and_wait(
    controller: &mut LifecycleController<BollardRuntime>,
) -> Result<WaitOutcome> {
    controller.start().await?;
    let relay = controller.attach().await?;

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let outcome = controller.wait_until(interrupted).await?;
    if outcome == WaitOutcome::Detached {
        controller.stop(INTERRUPT_STOP_TIMEOUT).await?;
        relay.cancel_and_finish().await?;
    } else {
        relay.finish().await?;
    }
    Ok(outcome)
}

/// Container spec for `dockyard run`.
fn run_spec(
    image: &ImageRef,
    name: Option<String>,
    env: &[String],
    command: Vec<String>,
) -> Result<ContainerSpec> {
    let mut spec = ContainerSpec::new_default()?;
    spec.create.image = image.to_string();
    spec.create.name = name;
    spec.create.command = command;
    spec.create.attach_stdout = true;
    spec.create.attach_stderr = true;
    for pair in env {
        let (key, value) = parse_env(pair)?;
        spec.create.env.insert(key, value);
    }
    // Short-lived commands can exit before the attach lands.
    spec.attach.logs = true;
    spec.remove.force = true;
    Ok(spec)
}

fn parse_env(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(Error::InvalidArgument(format!(
            "environment variable must be KEY=VALUE: {}",
            pair
        ))),
    }
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes.max(0), UNITS[0])
    } else {
        format!("{:.1}{}", size, UNITS[unit])
    }
}

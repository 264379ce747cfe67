use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use relay_rtos::config::{self, Config};
use relay_rtos::{app, StdoutConsole};

fn main() -> Result<()> {
    // Logs on stderr; stdout is the task console
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    config::load_dotenv();
    let config = Config::from_env();
    info!(?config, "configuration loaded");

    let (kernel, _channel) =
        app::build(&config, Arc::new(StdoutConsole::new())).context("failed to set up relay tasks")?;
    let running = kernel.start().context("scheduler did not start")?;

    // Both tasks loop forever; this only returns if one of them dies.
    running.join().context("relay task stopped")?;
    Ok(())
}

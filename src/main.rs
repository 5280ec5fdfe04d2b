//! Wheelhouse dev server binary.
//!
//! Runs the notification server standalone: websocket endpoint, static
//! serving, and the CSS polling loop. The namespace pipeline activates once
//! a compiler toolchain drives it through the library API; without one the
//! planner passes changed sets through unexpanded.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use wheelhouse::config::ServerConfig;
use wheelhouse::log;
use wheelhouse::reload::css::check_for_css_changes;
use wheelhouse::server::{start_server, state::create_initial_state};

/// How often the CSS directories are polled.
const CSS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wheelhouse live-reload server CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file path (default: wheelhouse.toml)
    #[arg(short = 'C', long, default_value = "wheelhouse.toml", value_hint = clap::ValueHint::FilePath)]
    config: PathBuf,

    /// Port number to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    wheelhouse::logger::set_verbose(cli.verbose);

    let mut config = ServerConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }

    let state = create_initial_state(config);
    let handle = start_server(state.clone(), None).await?;

    // Stylesheets get their own fast path: poll the configured dirs and
    // publish changes without involving the namespace pipeline.
    let css_state = state.clone();
    let css_poller = tokio::spawn(async move {
        let mut tick = tokio::time::interval(CSS_POLL_INTERVAL);
        loop {
            tick.tick().await;
            check_for_css_changes(&css_state).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    log!("serve"; "shutting down...");

    css_poller.abort();
    handle.stop().await;
    Ok(())
}

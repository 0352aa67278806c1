//! Summoners peer and relay binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use summoners_core::GameState;
use summoners_peer::cli::{Cli, Command};
use summoners_peer::runner::{self, InputEvent};
use summoners_peer::{relay, Config, HttpTransport, PeerSession};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Relay { host, port } => {
            if let Some(host) = host {
                config.relay.host = host;
            }
            if let Some(port) = port {
                config.relay.port = port;
            }
            relay::run(&config.relay).await.context("relay failed")
        }
        Command::Play { relay_url, json } => {
            if let Some(url) = relay_url {
                config.peer.relay_url = url;
            }
            run_play(config, json).await
        }
        Command::Hotseat { json } => run_hotseat(config, json).await,
    }
}

/// Install the Ctrl-C handler and return the flag it clears.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, shutting down");
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;
    Ok(running)
}

fn tick_period(config: &Config) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(config.peer.tick_hz))
}

/// Print the state to stdout, as text or as one JSON line.
fn render(json: bool) -> impl FnMut(&GameState) {
    move |game| {
        if json {
            match serde_json::to_string(game) {
                Ok(line) => println!("{}", line),
                Err(err) => error!(%err, "Failed to serialize state"),
            }
        } else {
            println!("{}\n", game);
        }
    }
}

async fn run_play(config: Config, json: bool) -> Result<()> {
    let running = interrupt_flag()?;
    let (transport, team) = HttpTransport::join(&config.peer.relay_url)
        .await
        .with_context(|| format!("could not join relay at {}", config.peer.relay_url))?;
    info!(?team, "Playing");

    let mut session = PeerSession::new(team, config.peer.layout);
    let mut input: UnboundedReceiver<InputEvent> = runner::spawn_stdin_reader(config.peer.layout);

    runner::run_peer(
        &transport,
        &mut session,
        &mut input,
        &running,
        tick_period(&config),
        render(json),
    )
    .await?;
    Ok(())
}

async fn run_hotseat(config: Config, json: bool) -> Result<()> {
    let running = interrupt_flag()?;
    let mut input = runner::spawn_stdin_reader(config.peer.layout);
    runner::run_hotseat(
        config.peer.layout,
        &mut input,
        &running,
        tick_period(&config),
        render(json),
    )
    .await?;
    Ok(())
}

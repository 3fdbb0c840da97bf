//! kagcon - interactive remote console for King Arthur's Gold servers.
//!
//! Attaches to a server over TCPR, prints everything the server relays
//! with timestamps stripped, and forwards each line typed on stdin as a
//! console command.

mod config;

use crate::config::Config;
use tcpr::Client;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "kagcon.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let client = Client::connect(
        &config.server.address,
        &config.server.password,
        config.connect_timeout(),
    )
    .await?;
    info!(addr = %config.server.address, "Connected to rcon server");

    // Print every line the server relays, timestamps stripped. Lines that
    // were nothing but a timestamp are dropped.
    let printer = client.register(".*", |msg, _client| async move {
        if !msg.raw.is_empty() {
            println!("{}", msg.raw);
        }
        Ok(())
    })?;
    printer.strip_timestamps();

    let dispatcher = client.clone();
    let mut dispatch = tokio::spawn(async move { dispatcher.run().await });

    // Forward stdin lines as console commands.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            outcome = &mut dispatch => {
                let err = outcome?;
                error!(error = %err, "Console loop terminated");
                return Err(err.into());
            }
            line = lines.next_line() => {
                match line? {
                    Some(command) if command.is_empty() => {}
                    Some(command) => {
                        client.write(&command).await?;
                    }
                    None => {
                        info!("Input closed, shutting down");
                        client.close().await?;
                        return Ok(());
                    }
                }
            }
        }
    }
}

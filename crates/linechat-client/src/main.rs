//! linechat terminal client entry point.
//!
//! Connects to a relay server, sends every line typed on stdin as a chat
//! message, and prints every relayed message as `[HH:MM:SS] <Name> Desc`.
//! `/quit`, end of input, or Ctrl-C closes the connection.
//!
//! # Event loop (for beginners)
//!
//! One `tokio::select!` multiplexes three inputs on this task:
//!
//! - a line from stdin → `send_message`
//! - an inbound connection event → `handle_inbound`, which may emit events
//! - a `ClientEvent` → print it
//!
//! All three futures are cancel-safe, so whichever loses a round simply runs
//! again next time.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linechat_client::application::render::render_line;
use linechat_client::infrastructure::network::{ChatClient, ClientEvent};
use linechat_client::infrastructure::storage::config::{config_file_path, load_config, AppConfig};

const QUIT_COMMAND: &str = "/quit";

#[derive(Debug, Parser)]
#[command(name = "linechat-client", version, about = "Chat over a linechat relay server")]
struct Cli {
    /// Display name for your messages, overriding the config file.
    #[arg(short, long, env = "LINECHAT_NAME")]
    name: Option<String>,

    /// Server as HOST or HOST:PORT, overriding the config file.
    #[arg(short, long, env = "LINECHAT_SERVER")]
    server: Option<String>,

    /// Path to the TOML config file.  Defaults to the platform config directory.
    #[arg(short, long, env = "LINECHAT_CLIENT_CONFIG")]
    config: Option<PathBuf>,
}

fn load_app_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Ok(path) => path,
            Err(_) => return Ok(AppConfig::default()),
        },
    };
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

/// Prints one client event.  Returns `false` once the client has disconnected.
fn show(event: &ClientEvent) -> bool {
    match event {
        ClientEvent::Connected { peer } => println!("connected to {peer}"),
        ClientEvent::MessageReceived(message) => println!("{}", render_line(message)),
        ClientEvent::Disconnected => return false,
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_app_config(cli.config.as_deref())?;

    // Logs go to stderr; stdout is the chat transcript.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    let name = cli.name.unwrap_or_else(|| config.client.name.clone());
    let target = cli.server.unwrap_or_else(|| config.server_target());

    let (mut client, mut events) = ChatClient::new(config.client_config());
    client
        .initialize(&target)
        .await
        .with_context(|| format!("unable to connect to {target}"))?;
    client.run();
    info!(%name, "chatting; type {QUIT_COMMAND} to leave");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => match line.context("failed to read stdin")? {
                Some(line) if line.trim() == QUIT_COMMAND => {
                    client.close().await;
                }
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = client.send_message(name.as_str(), line) {
                        warn!("message not sent: {e}");
                    }
                }
                None => {
                    client.close().await;
                }
            },
            inbound = client.next_inbound() => {
                if let Some(event) = inbound {
                    client.handle_inbound(event).await;
                }
            }
            Some(event) = events.recv() => {
                if !show(&event) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                client.close().await;
            }
        }
    }

    // Anything emitted alongside the disconnect.
    while let Ok(event) = events.try_recv() {
        show(&event);
    }
    Ok(())
}

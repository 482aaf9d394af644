//! linechat relay server entry point.
//!
//! Loads configuration, starts the listener, and drives the dispatch context
//! until Ctrl-C.  Every relayed chat line and every connect/disconnect is
//! logged through the observer channel.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML file, then CLI overrides
//!  └─ ChatServer::new()      -- registry, dispatch queue, observer channel
//!  └─ initialize()           -- bind + listen
//!  └─ start_accepting()      -- accept task
//!  └─ run_until(ctrl_c)      -- dispatch on this task, then shutdown
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use linechat_server::infrastructure::network::server::{ChatServer, ServerConfig};
use linechat_server::infrastructure::storage::config::{config_file_path, load_config, AppConfig};

#[derive(Debug, Parser)]
#[command(name = "linechat-server", version, about = "Relays chat lines between TCP clients")]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config directory.
    #[arg(short, long, env = "LINECHAT_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding the config file.
    #[arg(short, long, env = "LINECHAT_BIND")]
    bind: Option<String>,

    /// Port to listen on, overriding the config file.
    #[arg(short, long, env = "LINECHAT_PORT")]
    port: Option<u16>,
}

fn load_app_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Ok(path) => path,
            // No platform config directory: run on defaults.
            Err(_) => return Ok(AppConfig::default()),
        },
    };
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_app_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.network.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("linechat server starting");

    let (mut server, mut observer) = ChatServer::new(ServerConfig {
        bind_address: config.network.bind_address.clone(),
        port: config.network.port,
        connection: config.connection,
    });
    let addr = server.initialize().await.context("failed to start listener")?;
    server.start_accepting()?;

    // ── Observer pump ─────────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(message) = observer.recv().await {
            info!(target: "linechat::chat", sender = %message.sender, "{}", message.body);
        }
    });

    info!("listening on {addr}.  Press Ctrl-C to exit.");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {e}");
            }
        })
        .await;

    info!("linechat server stopped");
    Ok(())
}

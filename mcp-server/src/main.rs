mod config;
mod setup;
mod stdio;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::{create_http_transport, ensure_database_directory_from_config, initialize_app};
use stdio::serve_stdio;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Parser)]
#[command(name = "task-orchestrator")]
#[command(about = "MCP task-orchestration server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Which MCP transport to serve. stdio is the default run mode; http
    /// opens the long-lived SSE/JSON-RPC transport instead.
    #[arg(long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Root directory `.taskorchestrator/config.yaml` is resolved against.
    #[arg(long, env = "AGENT_CONFIG_DIR")]
    config_dir: Option<String>,

    /// SQLite file backing the Store, overriding the computed default.
    #[arg(long, env = "DATABASE_PATH")]
    database_path: Option<String>,

    /// Process-level TOML config file (database pool, transport, logging).
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// HTTP/SSE transport listen address.
    #[arg(long, env = "MCP_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// HTTP/SSE transport port.
    #[arg(long, env = "MCP_PORT")]
    port: Option<u16>,

    /// Log verbosity floor.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load config file")?,
        None => Config::from_env().unwrap_or_default(),
    };

    if let Some(database_path) = &cli.database_path {
        config.database.url = Some(format!("sqlite://{database_path}"));
    }
    if let Some(listen_addr) = &cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(log_level) = &cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let config = load_config(&cli).context("failed to load configuration")?;
    init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);
    config.validate().context("invalid configuration")?;

    let config_root = Config::config_root();
    ensure_database_directory_from_config(&config).context("failed to prepare database directory")?;
    log_startup_info(&config);

    let handler = initialize_app(&config, &config_root)
        .await
        .context("failed to initialize application")?;

    match cli.transport {
        Transport::Stdio => {
            info!("serving over stdio");
            let owned_handler = (*handler).clone();
            tokio::select! {
                result = serve_stdio(owned_handler) => {
                    if let Err(e) = result {
                        error!(error = %e, "stdio transport error");
                        return Err(e);
                    }
                }
                _ = shutdown_signal() => {
                    info!("shutdown signal received, stopping stdio transport");
                }
            }
        }
        Transport::Http => {
            let server_addr = config.server_address();
            info!(%server_addr, "serving over http/sse");
            let transport = create_http_transport(handler);
            tokio::select! {
                result = transport.serve(&server_addr) => {
                    if let Err(e) = result {
                        error!(error = %e, "http transport error");
                        return Err(anyhow::anyhow!("http transport error: {e}"));
                    }
                }
                _ = shutdown_signal() => {
                    info!("shutdown signal received, stopping http transport");
                }
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

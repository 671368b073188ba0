use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netfunnel_core::{
    load_config, validate_config, HttpRequester, NetFunnelClient, NetFunnelError, Ticket,
};

/// Default config file, overridden by `--config` or `NETFUNNEL_CONFIG`
const DEFAULT_CONFIG_PATH: &str = "netfunnel.toml";

#[derive(Debug, Parser)]
#[command(name = "netfunnel", version, about = "NetFunnel waiting-room client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "NETFUNNEL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request a ticket, wait for admission and print it as JSON
    Acquire {
        /// Dispatch the ticket right after printing it
        #[arg(long)]
        release: bool,
    },
    /// Print the gate's HTTP status for a queued key
    Status {
        #[arg(short, long)]
        key: String,
    },
    /// Dispatch the ticket identified by a key
    Release {
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays machine readable.
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Gate endpoint: {}", config.gate.endpoint);

    let client = NetFunnelClient::new(&config.gate).context("Failed to create HTTP client")?;

    match cli.command {
        Command::Acquire { release } => acquire(&client, release).await,
        Command::Status { key } => {
            let status = client
                .check_status(&key)
                .await
                .context("Status check failed")?;
            println!("{}", status);
            Ok(())
        }
        Command::Release { key } => {
            if key.is_empty() {
                bail!("--key cannot be empty");
            }
            client
                .release_key(&key)
                .await
                .context("Failed to release ticket")?;
            Ok(())
        }
    }
}

async fn acquire(client: &NetFunnelClient, release: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, giving up the queue position");
            trigger.cancel();
        }
    });

    let ticket = acquire_or_leave_queue(client, &cancel).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&ticket).context("Failed to serialize ticket")?
    );

    if release {
        client
            .release_ticket(&ticket)
            .await
            .context("Failed to release ticket")?;
    }

    Ok(())
}

/// Acquire a ticket, dispatching the queue slot if the wait is abandoned.
async fn acquire_or_leave_queue<R: HttpRequester>(
    client: &NetFunnelClient<R>,
    cancel: &CancellationToken,
) -> Result<Ticket> {
    let err = match client.acquire_ticket_with_cancel(cancel).await {
        Ok(ticket) => return Ok(ticket),
        Err(e) => e,
    };

    if let Some(key) = err.queued_key() {
        match client.release_key(key).await {
            Ok(()) => info!(key, "Left the queue"),
            Err(e) => warn!(key, "Failed to release queue position: {}", e),
        }
    }

    match err {
        NetFunnelError::Cancelled { .. } => bail!("Interrupted while waiting for admission"),
        e => Err(e).context("Failed to acquire ticket"),
    }
}

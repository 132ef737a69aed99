mod gateway_commands;

use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    botch_config::BotchConfig,
    clap::{Parser, Subcommand},
    secrecy::SecretString,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botch", about = "botch, a gateway RPC client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML, YAML or JSON). Discovered when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gateway WebSocket URL, overriding the config file.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Gateway token, overriding the config file.
    #[arg(long, global = true, env = "GATEWAY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a gateway method and print its payload.
    Call {
        /// Method name (e.g. "cron.list").
        method: String,
        /// JSON params object.
        #[arg(long)]
        params: Option<String>,
        /// Seconds to wait for authentication.
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Check whether the gateway accepts the handshake.
    Status {
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Print the device identity, creating it if absent.
    Identity,
    /// Stay connected and log state changes until Ctrl-C.
    Watch,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Config file (explicit or discovered) with env and flag overrides applied.
fn resolve_config(cli: &Cli) -> anyhow::Result<BotchConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = botch_config::load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            botch_config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        },
        None => botch_config::discover_and_load(),
    };

    if let Some(url) = &cli.url {
        config.gateway.url = url.clone();
    }
    if let Some(token) = cli.token.as_ref().filter(|t| !t.trim().is_empty()) {
        config.gateway.token = Some(SecretString::new(token.clone()));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "botch starting");

    let config = resolve_config(&cli)?;
    debug!(url = %config.gateway.url, has_token = config.gateway.token.is_some(), "config resolved");
    let options = gateway_commands::client_options(&config);

    match cli.command {
        Commands::Call {
            method,
            params,
            wait,
        } => {
            gateway_commands::call(options, &method, params.as_deref(), Duration::from_secs(wait))
                .await
        },
        Commands::Status { wait } => {
            gateway_commands::status(options, Duration::from_secs(wait)).await
        },
        Commands::Identity => gateway_commands::identity(&config),
        Commands::Watch => gateway_commands::watch(options).await,
    }
}

use std::time::Duration;

use {
    anyhow::{Context, Result},
    botch_config::BotchConfig,
    botch_gateway::{ClientOptions, GatewayClient, IdentityStore},
    tracing::{info, warn},
};

/// Map the resolved host config onto client options.
pub fn client_options(config: &BotchConfig) -> ClientOptions {
    let gateway = &config.gateway;
    let mut options = ClientOptions::new(gateway.url.clone());
    options.token = gateway.token.clone();
    options.identity_path = gateway.resolved_identity_path();
    options
}

/// Parse `--params`; absent means an empty object.
fn parse_params(raw: Option<&str>) -> Result<serde_json::Value> {
    match raw {
        None => Ok(serde_json::json!({})),
        Some(raw) => serde_json::from_str(raw).context("--params is not valid JSON"),
    }
}

async fn connect(options: ClientOptions, wait: Duration) -> Result<GatewayClient> {
    let url = options.url.clone();
    let client = GatewayClient::start(options);
    if !client.wait_authenticated(wait).await {
        let state = client.state();
        client.shutdown().await;
        anyhow::bail!(
            "gateway at {url} not authenticated after {}s (state: {state})",
            wait.as_secs()
        );
    }
    Ok(client)
}

pub async fn call(
    options: ClientOptions,
    method: &str,
    params: Option<&str>,
    wait: Duration,
) -> Result<()> {
    let params = parse_params(params)?;
    let client = connect(options, wait).await?;

    let result = client.submit(method, params).await;
    client.shutdown().await;

    let payload = result.with_context(|| format!("{method} failed"))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub async fn status(options: ClientOptions, wait: Duration) -> Result<()> {
    let url = options.url.clone();
    let client = GatewayClient::start(options);
    let authenticated = client.wait_authenticated(wait).await;
    let state = client.state();
    client.shutdown().await;

    println!("gateway: {url}");
    println!("state:   {state}");
    if !authenticated {
        anyhow::bail!("gateway not authenticated");
    }
    Ok(())
}

pub fn identity(config: &BotchConfig) -> Result<()> {
    let store = match config.gateway.resolved_identity_path() {
        Some(path) => IdentityStore::new(path),
        None => {
            warn!("no config directory available, identity will not be persisted");
            IdentityStore::ephemeral()
        },
    };
    let identity = store.get_or_create();
    if let Some(path) = store.path() {
        println!("path:       {}", path.display());
    }
    println!("id:         {}", identity.id);
    println!("created_at: {}", identity.created_at);
    Ok(())
}

/// Keep the client running and log every state transition until Ctrl-C.
pub async fn watch(options: ClientOptions) -> Result<()> {
    let client = GatewayClient::start(options);
    let mut state = client.watch_state();
    info!(state = %client.state(), "watching gateway connection, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "gateway state changed");
            },
        }
    }

    client.shutdown().await;
    Ok(())
}

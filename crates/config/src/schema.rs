//! Config schema types.

use std::path::PathBuf;

use {secrecy::SecretString, serde::Deserialize};

/// Gateway address used when neither the config file nor the environment sets one.
pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:18789";

/// File name of the persisted device identity inside the config dir.
pub const IDENTITY_FILE_NAME: &str = "device-identity.json";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotchConfig {
    pub gateway: GatewayConfig,
}

/// Connection settings for the remote gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// WebSocket URL of the gateway (`ws://` or `wss://`).
    pub url: String,

    /// Shared gateway token sent in the `connect` handshake.
    pub token: Option<SecretString>,

    /// Where the device identity is persisted. Defaults to
    /// `<config dir>/device-identity.json`.
    pub identity_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            token: None,
            identity_path: None,
        }
    }
}

impl GatewayConfig {
    /// The configured identity path, or the default location in the config dir.
    ///
    /// Returns `None` only when no home directory can be determined and no
    /// explicit path was configured.
    pub fn resolved_identity_path(&self) -> Option<PathBuf> {
        self.identity_path
            .clone()
            .or_else(|| crate::loader::config_dir().map(|d| d.join(IDENTITY_FILE_NAME)))
    }
}

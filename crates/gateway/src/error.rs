use std::time::Duration;

/// Failure of a single [`submit`](crate::GatewayClient::submit) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No authenticated gateway connection at submit time.
    #[error("gateway not connected")]
    NotConnected,

    /// No response arrived before the request deadline.
    #[error("request timeout: {method} (no response after {after_ms}ms)")]
    Timeout { method: String, after_ms: u64 },

    /// The gateway answered with `ok: false`.
    #[error("{message}")]
    ServerRejected {
        message: String,
        code: Option<String>,
        retryable: bool,
    },

    /// The connection dropped while the request was in flight.
    #[error("gateway disconnected")]
    Disconnected,

    /// The connection task is gone (client shut down).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request params could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl Error {
    pub(crate) fn timeout(method: &str, after: Duration) -> Self {
        Self::Timeout {
            method: method.to_string(),
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether resubmitting the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotConnected | Self::Timeout { .. } | Self::Disconnected => true,
            Self::ServerRejected { retryable, .. } => *retryable,
            Self::Transport(_) | Self::Encode(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

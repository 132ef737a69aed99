//! Gateway wire protocol: JSON envelopes exchanged over the WebSocket.
//!
//! Every frame carries a `type` discriminant:
//! - `req`   client → gateway request (`id`, `method`, `params`)
//! - `res`   gateway → client response (`id`, `ok`, `payload` | `error`)
//! - `event` gateway → client push (`event`, `payload`), e.g. `connect.challenge`
//!
//! The handshake is an ordinary `req` with `method = "connect"` whose params
//! are [`ConnectParams`].

pub mod codec;

use serde::{Deserialize, Serialize};

pub use codec::{DecodeError, decode, encode};

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: u32 = 3;

/// How long to wait for a `connect.challenge` before sending `connect` anyway.
pub const CHALLENGE_GRACE_MS: u64 = 1_000;

/// Cool-down between a disconnect and the next connect attempt.
pub const RECONNECT_DELAY_MS: u64 = 3_000;

/// Deadline for a single request/response round trip.
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Message used when a failed response carries no error message.
pub const DEFAULT_ERROR_MESSAGE: &str = "request failed";

pub mod roles {
    pub const OPERATOR: &str = "operator";
}

pub mod scopes {
    pub const ADMIN: &str = "operator.admin";
}

pub mod events {
    pub const CONNECT_CHALLENGE: &str = "connect.challenge";
    pub const TICK: &str = "tick";
}

pub mod methods {
    pub const CONNECT: &str = "connect";
}

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Any frame on the wire, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Req(RequestFrame),
    Res(ResponseFrame),
    Event(EventFrame),
}

impl Frame {
    /// The nonce of a `connect.challenge` event, or `None` for any other frame.
    ///
    /// A challenge without a nonce yields `Some(None)`.
    pub fn challenge_nonce(&self) -> Option<Option<String>> {
        match self {
            Frame::Event(ev) if ev.event == events::CONNECT_CHALLENGE => {
                Some(ev.challenge_nonce())
            },
            _ => None,
        }
    }
}

impl From<RequestFrame> for Frame {
    fn from(frame: RequestFrame) -> Self {
        Frame::Req(frame)
    }
}

impl From<ResponseFrame> for Frame {
    fn from(frame: ResponseFrame) -> Self {
        Frame::Res(frame)
    }
}

impl From<EventFrame> for Frame {
    fn from(frame: EventFrame) -> Self {
        Frame::Event(frame)
    }
}

/// Client → gateway request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RequestFrame {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Gateway → client response to a [`RequestFrame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: &str, payload: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: &str, error: ErrorShape) -> Self {
        Self {
            id: id.to_string(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

/// Gateway → client push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value, seq: u64) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
            seq: Some(seq),
        }
    }

    /// Extract `payload.nonce` when it is a string.
    pub fn challenge_nonce(&self) -> Option<String> {
        self.payload
            .as_ref()
            .and_then(|p| serde_json::from_value::<ChallengePayload>(p.clone()).ok())
            .and_then(|p| p.nonce)
    }
}

/// Error object carried by a failed [`ResponseFrame`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorShape {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// The server message, or [`DEFAULT_ERROR_MESSAGE`] when absent or blank.
    pub fn message_or_default(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
    }
}

// ── Handshake ────────────────────────────────────────────────────────────────

/// Payload of the `connect.challenge` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengePayload {
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Params of the `connect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub caps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectAuth>,
}

/// Client descriptor sent in [`ConnectParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Credentials sent in [`ConnectParams`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

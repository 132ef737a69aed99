//! Text-frame codec: one JSON envelope per WebSocket message.

use serde::Serialize;

use crate::{EventFrame, Frame, RequestFrame, ResponseFrame};

/// Failure to turn a text frame into a [`Frame`] (or a value into text).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

/// Decode a text frame by inspecting its `type` discriminant.
pub fn decode(text: &str) -> Result<Frame, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = match &value {
        serde_json::Value::Object(map) => map
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(DecodeError::MissingType)?
            .to_string(),
        _ => return Err(DecodeError::NotAnObject),
    };

    let frame = match kind.as_str() {
        "res" => Frame::Res(serde_json::from_value::<ResponseFrame>(value)?),
        "event" => Frame::Event(serde_json::from_value::<EventFrame>(value)?),
        "req" => Frame::Req(serde_json::from_value::<RequestFrame>(value)?),
        _ => return Err(DecodeError::UnknownType(kind)),
    };
    Ok(frame)
}

/// Encode any serializable frame as a compact JSON string.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, DecodeError> {
    Ok(serde_json::to_string(frame)?)
}

//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::MessageId;

/// Discriminator of a [`ResponsePayload`], used to filter callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Plain acknowledgement.
    Ok,
    /// The engine failed to handle the message.
    Error,
    /// Textual result.
    Text,
    /// Binary result, e.g. an encoded preview frame.
    Bytes,
    /// Structured result.
    Json,
}

impl ResponseKind {
    /// Returns every response kind.
    pub const fn all() -> &'static [ResponseKind] {
        &[
            ResponseKind::Ok,
            ResponseKind::Error,
            ResponseKind::Text,
            ResponseKind::Bytes,
            ResponseKind::Json,
        ]
    }

    /// Canonical tag, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Ok => "ok",
            ResponseKind::Error => "error",
            ResponseKind::Text => "text",
            ResponseKind::Bytes => "bytes",
            ResponseKind::Json => "json",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an engine response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Plain acknowledgement.
    Ok,
    /// Failure report.
    Error {
        /// Short description of what went wrong.
        reason: String,
        /// Engine-side trace lines, most recent first.
        #[serde(default)]
        stack_trace: Vec<String>,
    },
    /// Textual result.
    Text(String),
    /// Binary result.
    Bytes(Vec<u8>),
    /// Structured result.
    Json(JsonValue),
}

impl ResponsePayload {
    /// Kind tag of this payload.
    pub fn kind(&self) -> ResponseKind {
        match self {
            ResponsePayload::Ok => ResponseKind::Ok,
            ResponsePayload::Error { .. } => ResponseKind::Error,
            ResponsePayload::Text(_) => ResponseKind::Text,
            ResponsePayload::Bytes(_) => ResponseKind::Bytes,
            ResponsePayload::Json(_) => ResponseKind::Json,
        }
    }
}

/// Response correlated to a message through `message_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Id of the message being answered.
    pub message_id: MessageId,
    /// Response body.
    pub payload: ResponsePayload,
}

impl EngineResponse {
    /// Wrap a payload answering `message_id`.
    pub fn new(message_id: MessageId, payload: ResponsePayload) -> Self {
        Self {
            message_id,
            payload,
        }
    }

    /// Acknowledgement for `message_id`.
    pub fn ok(message_id: MessageId) -> Self {
        Self::new(message_id, ResponsePayload::Ok)
    }

    /// Failure report without a trace.
    pub fn error(message_id: MessageId, reason: impl Into<String>) -> Self {
        Self::new(
            message_id,
            ResponsePayload::Error {
                reason: reason.into(),
                stack_trace: Vec::new(),
            },
        )
    }

    /// Textual answer.
    pub fn text(message_id: MessageId, value: impl Into<String>) -> Self {
        Self::new(message_id, ResponsePayload::Text(value.into()))
    }

    /// Binary answer.
    pub fn bytes(message_id: MessageId, value: impl Into<Vec<u8>>) -> Self {
        Self::new(message_id, ResponsePayload::Bytes(value.into()))
    }

    /// Structured answer.
    pub fn json(message_id: MessageId, value: JsonValue) -> Self {
        Self::new(message_id, ResponsePayload::Json(value))
    }

    /// Kind tag of the payload.
    pub fn kind(&self) -> ResponseKind {
        self.payload.kind()
    }

    /// Returns `true` for [`ResponsePayload::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error { .. })
    }

    /// Text content, if this is a text response.
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ResponsePayload::Text(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_wire_representation() {
        for kind in ResponseKind::all() {
            let encoded = serde_json::to_value(kind).expect("serialize kind");
            assert_eq!(encoded, JsonValue::from(kind.as_str()));
        }

        let encoded = serde_json::to_value(EngineResponse::text(4, "hello")).expect("serialize");
        assert_eq!(encoded["payload"]["kind"], "text");
        assert_eq!(encoded["payload"]["data"], "hello");
        assert_eq!(encoded["message_id"], 4);
    }

    #[test]
    fn error_response_accepts_missing_stack_trace() {
        let response: EngineResponse = serde_json::from_str(
            r#"{"message_id":9,"payload":{"kind":"error","data":{"reason":"no camera"}}}"#,
        )
        .expect("deserialize");
        assert!(response.is_error());
        assert_eq!(response.kind(), ResponseKind::Error);
        assert_eq!(
            response.payload,
            ResponsePayload::Error {
                reason: "no camera".into(),
                stack_trace: Vec::new(),
            }
        );
    }

    #[test]
    fn unit_ok_payload_has_no_data() {
        let encoded = serde_json::to_string(&EngineResponse::ok(1)).expect("serialize");
        assert_eq!(encoded, r#"{"message_id":1,"payload":{"kind":"ok"}}"#);
    }

    #[test]
    fn text_accessor_only_matches_text() {
        assert_eq!(EngineResponse::text(0, "x").as_text(), Some("x"));
        assert_eq!(EngineResponse::bytes(0, vec![1u8, 2]).as_text(), None);
    }
}

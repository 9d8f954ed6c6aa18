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

use crate::id::{self, IdGenerator, MessageId};
use crate::response::{EngineResponse, ResponseKind};
use crate::{MessagingError, Result};

/// Error type callbacks may return to stop delivery.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a response callback.
pub type CallbackResult = std::result::Result<(), CallbackError>;

type ResponseCallback = Box<dyn Fn(&EngineResponse) -> CallbackResult + Send + Sync>;

/// What a message asks the engine to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Liveness probe; the engine answers with [`ResponseKind::Ok`].
    Ping,
    /// Generated pipeline source to compile and run in a live preview.
    PreviewSource {
        /// Preview session the source belongs to.
        preview_name: String,
        /// Generated source code.
        source_code: String,
    },
    /// Stop a running preview session.
    PreviewStop {
        /// Preview session to stop.
        preview_name: String,
    },
    /// Push a tuned value into a running pipeline.
    TunerValue {
        /// Tunable field label.
        label: String,
        /// Component index for multi-component values (e.g. scalars).
        index: usize,
        /// New value.
        value: f64,
    },
    /// Extension point for engine-specific messages.
    Custom {
        /// Free-form kind tag.
        tag: String,
        /// Arbitrary body.
        #[serde(default)]
        body: JsonValue,
    },
}

impl MessagePayload {
    /// Kind tag used for logging and diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            MessagePayload::Ping => "ping",
            MessagePayload::PreviewSource { .. } => "preview_source",
            MessagePayload::PreviewStop { .. } => "preview_stop",
            MessagePayload::TunerValue { .. } => "tuner_value",
            MessagePayload::Custom { tag, .. } => tag,
        }
    }
}

/// Outbound message awaiting zero or more engine responses.
///
/// Callbacks are not serialized; only `id` and `payload` travel over a transport.
#[derive(Serialize, Deserialize)]
pub struct EngineMessage {
    id: MessageId,
    payload: MessagePayload,
    #[serde(skip)]
    callbacks: Vec<ResponseCallback>,
}

impl EngineMessage {
    /// Build a message with an id from the process-wide generator.
    pub fn new(payload: MessagePayload) -> Self {
        Self::with_ids(id::global(), payload)
    }

    /// Build a message with an id drawn from `ids`.
    pub fn with_ids(ids: &IdGenerator, payload: MessagePayload) -> Self {
        Self {
            id: ids.next_id(),
            payload,
            callbacks: Vec::new(),
        }
    }

    /// Unique id of this message.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Request body.
    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Kind tag of the payload.
    pub fn kind(&self) -> &str {
        self.payload.kind()
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Register a callback run for every accepted response.
    ///
    /// Registering the same callback twice runs it twice per response.
    pub fn on_response<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&EngineResponse) -> CallbackResult + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Register a callback run only for responses of `kind`.
    pub fn on_response_of_kind<F>(&mut self, kind: ResponseKind, callback: F) -> &mut Self
    where
        F: Fn(&EngineResponse) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_response(move |response| {
            if response.kind() == kind {
                callback(response)
            } else {
                Ok(())
            }
        })
    }

    /// Deliver `response` to every callback in registration order.
    ///
    /// The first failing callback stops delivery; its error is returned and
    /// later callbacks do not see this response.
    pub fn accept_response(&self, response: &EngineResponse) -> Result<()> {
        tracing::trace!(
            message_id = self.id,
            response_kind = %response.kind(),
            callbacks = self.callbacks.len(),
            "delivering response"
        );
        for (index, callback) in self.callbacks.iter().enumerate() {
            callback(response).map_err(|source| MessagingError::CallbackFailed {
                message_id: self.id,
                index,
                source,
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineMessage(kind=\"{}\", id={})", self.kind(), self.id)
    }
}

impl fmt::Debug for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineMessage")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

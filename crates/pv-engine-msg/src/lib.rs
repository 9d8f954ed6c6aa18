//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
//! Request/response messaging between the node editor and the vision engine.
//!
//! An [`EngineMessage`] receives a process-unique id when it is built, collects
//! response callbacks, and is handed to an [`EngineDispatcher`]. Responses
//! coming back over a [`Transport`] carry the id of the message they answer and
//! are delivered synchronously to that message's callbacks, in registration
//! order.
#![warn(missing_docs)]

pub mod dispatcher;
pub mod id;
pub mod logging;
pub mod message;
pub mod replay;
pub mod response;
pub mod transport;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors raised by the envelope, the dispatcher and transports.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// A response callback reported a failure; later callbacks were not run.
    #[error("response callback #{index} of message {message_id} failed: {source}")]
    CallbackFailed {
        /// Message whose callback failed.
        message_id: MessageId,
        /// Registration index of the failing callback.
        index: usize,
        /// Error returned by the callback.
        source: CallbackError,
    },
    /// No registered transport accepted the message.
    #[error("no transport accepted message {message_id}")]
    NoTransport {
        /// Message that could not be sent.
        message_id: MessageId,
    },
    /// The dispatcher already tracks the configured number of messages.
    #[error("pending message limit of {limit} reached")]
    PendingLimit {
        /// Configured limit.
        limit: usize,
    },
    /// A message with the same id is already awaiting responses.
    #[error("message {message_id} is already pending")]
    DuplicateMessage {
        /// Conflicting id.
        message_id: MessageId,
    },
    /// A transport refused or failed to carry a message.
    #[error("transport {transport} failed: {reason}")]
    Transport {
        /// Transport name.
        transport: &'static str,
        /// Human readable failure description.
        reason: String,
    },
    /// Wrapper for IO errors encountered during messaging operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use dispatcher::{DeliveryFailure, DispatcherMetrics, EngineDispatcher, PollReport};
pub use id::{IdGenerator, MessageId};
pub use logging::{log_message, log_response, MessageDirection};
pub use message::{CallbackError, CallbackResult, EngineMessage, MessagePayload};
pub use replay::replay_responses;
pub use response::{EngineResponse, ResponseKind, ResponsePayload};
pub use transport::{InMemoryTransport, OutboundFrame, Transport};

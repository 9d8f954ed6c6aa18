//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use tracing::debug;

use crate::{EngineMessage, EngineResponse};

/// Direction of the message movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Message handed to a transport.
    Outbound,
    /// Message no longer tracked by the dispatcher.
    Released,
}

/// Emit a structured log entry for message activity.
pub fn log_message(direction: MessageDirection, message: &EngineMessage) {
    debug!(
        message_id = message.id(),
        kind = message.kind(),
        callbacks = message.callback_count(),
        direction = ?direction,
        "engine message activity"
    );
}

/// Emit a structured log entry for a response read from a transport.
pub fn log_response(response: &EngineResponse) {
    debug!(
        message_id = response.message_id,
        kind = %response.kind(),
        "engine response received"
    );
}

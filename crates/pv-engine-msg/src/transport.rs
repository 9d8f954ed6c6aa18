//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{EngineMessage, EngineResponse, MessageId, Result};

/// Transport abstraction between the dispatcher and an engine.
pub trait Transport: Send + Sync {
    /// Hand a message to the engine.
    ///
    /// The dispatcher holds no lock during this call; an in-process engine may
    /// deliver its answer through the dispatcher before returning.
    fn send(&self, message: &EngineMessage) -> Result<()>;
    /// Next response produced by the engine, if available.
    fn recv(&self) -> Option<EngineResponse>;
    /// Human-readable transport name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Serialized message as seen by the engine side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Id of the encoded message.
    pub id: MessageId,
    /// Kind tag of the encoded message.
    pub kind: String,
    /// JSON encoding of the message.
    pub json: String,
}

impl OutboundFrame {
    /// Encode a message for transmission.
    pub fn encode(message: &EngineMessage) -> Result<Self> {
        Ok(Self {
            id: message.id(),
            kind: message.kind().to_owned(),
            json: serde_json::to_string(message)?,
        })
    }

    /// Decode the frame back into a message without callbacks.
    pub fn decode(&self) -> Result<EngineMessage> {
        Ok(serde_json::from_str(&self.json)?)
    }
}

/// In-memory transport for engines living in the same process.
///
/// Clones share the same queues, so one handle can be registered with the
/// dispatcher while another plays the engine side.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    outbound: Arc<Mutex<VecDeque<OutboundFrame>>>,
    inbound: Arc<Mutex<VecDeque<EngineResponse>>>,
}

impl InMemoryTransport {
    /// Create a new in-memory channel pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine side: take the oldest message sent by the dispatcher.
    pub fn take_outbound(&self) -> Option<OutboundFrame> {
        self.outbound.lock().pop_front()
    }

    /// Engine side: queue a response for the dispatcher.
    pub fn push_response(&self, response: EngineResponse) {
        self.inbound.lock().push_back(response);
    }

    /// Number of messages the engine has not taken yet.
    pub fn outbound_len(&self) -> usize {
        self.outbound.lock().len()
    }
}

impl Transport for InMemoryTransport {
    fn send(&self, message: &EngineMessage) -> Result<()> {
        let frame = OutboundFrame::encode(message)?;
        self.outbound.lock().push_back(frame);
        Ok(())
    }

    fn recv(&self) -> Option<EngineResponse> {
        self.inbound.lock().pop_front()
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdGenerator, MessagePayload};

    #[test]
    fn in_memory_transport_carries_both_directions() {
        let transport = InMemoryTransport::new();
        let engine_side = transport.clone();
        let message = EngineMessage::with_ids(
            &IdGenerator::new(),
            MessagePayload::PreviewSource {
                preview_name: "main".into(),
                source_code: "class Pipeline {}".into(),
            },
        );

        transport.send(&message).expect("send succeeds");
        assert_eq!(engine_side.outbound_len(), 1);

        let frame = engine_side.take_outbound().expect("frame available");
        assert_eq!(frame.id, 0);
        assert_eq!(frame.kind, "preview_source");
        assert_eq!(frame.decode().expect("decodes").payload(), message.payload());

        assert!(transport.recv().is_none());
        engine_side.push_response(EngineResponse::ok(frame.id));
        assert_eq!(transport.recv(), Some(EngineResponse::ok(0)));
    }

    #[test]
    fn responses_are_fifo() {
        let transport = InMemoryTransport::new();
        transport.push_response(EngineResponse::text(1, "first"));
        transport.push_response(EngineResponse::text(1, "second"));
        let first = transport.recv().expect("first response");
        let second = transport.recv().expect("second response");
        assert_eq!(first.as_text(), Some("first"));
        assert_eq!(second.as_text(), Some("second"));
        assert!(transport.recv().is_none());
    }
}

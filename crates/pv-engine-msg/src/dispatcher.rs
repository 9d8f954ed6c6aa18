//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::logging::{log_message, log_response, MessageDirection};
use crate::{EngineMessage, EngineResponse, MessageId, MessagingError, Result, Transport};

/// Snapshot of dispatcher counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherMetrics {
    /// Transport sends that succeeded.
    pub sent: u64,
    /// Transport sends that failed.
    pub dropped: u64,
    /// Responses read from transports or delivered directly.
    pub received: u64,
    /// Responses routed to a pending message without callback failure.
    pub delivered: u64,
    /// Responses whose message id was not pending.
    pub orphaned: u64,
    /// Responses whose delivery was cut short by a failing callback.
    pub callback_failures: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    received: AtomicU64,
    delivered: AtomicU64,
    orphaned: AtomicU64,
    callback_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatcherMetrics {
        DispatcherMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
        }
    }
}

/// A response whose callbacks failed during [`EngineDispatcher::poll`].
#[derive(Debug)]
pub struct DeliveryFailure {
    /// Message the response was addressed to.
    pub message_id: MessageId,
    /// Error returned by the envelope.
    pub error: MessagingError,
}

/// Outcome of a single [`EngineDispatcher::poll`] pass.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Responses read from transports.
    pub received: usize,
    /// Responses delivered to every callback of their message.
    pub delivered: usize,
    /// Ids of responses that matched no pending message.
    pub orphaned: Vec<MessageId>,
    /// Responses whose delivery stopped at a failing callback.
    pub failures: Vec<DeliveryFailure>,
}

impl PollReport {
    /// `true` when nothing was read.
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }
}

/// Sends messages over transports and routes responses back to them by id.
///
/// Messages stay pending after a response so that engines may answer a single
/// message several times; call [`EngineDispatcher::release`] once no further
/// responses are expected.
pub struct EngineDispatcher {
    transports: Vec<Arc<dyn Transport>>,
    pending: Mutex<BTreeMap<MessageId, Arc<EngineMessage>>>,
    max_pending: usize,
    counters: Counters,
}

impl EngineDispatcher {
    /// Construct a dispatcher tracking at most `max_pending` messages.
    pub fn new(max_pending: usize) -> Self {
        Self {
            transports: Vec::new(),
            pending: Mutex::new(BTreeMap::new()),
            max_pending,
            counters: Counters::default(),
        }
    }

    /// Register a transport for send/receive operations.
    pub fn register_transport<T>(&mut self, transport: Arc<T>)
    where
        T: Transport + 'static,
    {
        self.transports.push(transport as Arc<dyn Transport>);
    }

    /// Start tracking `message` and hand it to every transport.
    ///
    /// The message is pending before any transport sees it, so an engine that
    /// answers from inside `Transport::send` is routed normally. Transport
    /// failures are logged and counted; the call fails only if no transport
    /// accepted the message, in which case it is no longer tracked.
    pub fn send(&self, message: EngineMessage) -> Result<MessageId> {
        let id = message.id();
        let message = Arc::new(message);
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&id) {
                return Err(MessagingError::DuplicateMessage { message_id: id });
            }
            if pending.len() >= self.max_pending {
                return Err(MessagingError::PendingLimit {
                    limit: self.max_pending,
                });
            }
            pending.insert(id, Arc::clone(&message));
        }

        let mut accepted = 0usize;
        for transport in &self.transports {
            if let Err(err) = transport.send(&message) {
                tracing::warn!(transport = transport.name(), message_id = id, error = %err, "transport send failed");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                accepted += 1;
            }
        }
        if accepted == 0 {
            self.pending.lock().remove(&id);
            return Err(MessagingError::NoTransport { message_id: id });
        }

        log_message(MessageDirection::Outbound, &message);
        Ok(id)
    }

    /// Route one response to its pending message.
    ///
    /// Returns `Ok(false)` when no message with that id is pending. Callback
    /// failures are returned unchanged.
    pub fn deliver(&self, response: &EngineResponse) -> Result<bool> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let target = self.pending.lock().get(&response.message_id).cloned();
        let Some(message) = target else {
            tracing::warn!(message_id = response.message_id, kind = %response.kind(), "response for unknown message");
            self.counters.orphaned.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        };

        // The table lock is released here, so callbacks may send or release messages.
        match message.accept_response(response) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(err) => {
                self.counters
                    .callback_failures
                    .fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Drain every transport and deliver what was read.
    ///
    /// A failing callback only affects the response being delivered; the pass
    /// continues with the remaining responses.
    pub fn poll(&self) -> PollReport {
        let mut report = PollReport::default();
        for transport in &self.transports {
            while let Some(response) = transport.recv() {
                log_response(&response);
                report.received += 1;
                match self.deliver(&response) {
                    Ok(true) => report.delivered += 1,
                    Ok(false) => report.orphaned.push(response.message_id),
                    Err(error) => {
                        tracing::warn!(
                            transport = transport.name(),
                            message_id = response.message_id,
                            error = %error,
                            "response delivery failed"
                        );
                        report.failures.push(DeliveryFailure {
                            message_id: response.message_id,
                            error,
                        });
                    }
                }
            }
        }
        report
    }

    /// Stop tracking a message; later responses to it are orphaned.
    pub fn release(&self, id: MessageId) -> Option<Arc<EngineMessage>> {
        let released = self.pending.lock().remove(&id);
        if let Some(message) = &released {
            log_message(MessageDirection::Released, message);
        }
        released
    }

    /// Stop tracking every message (e.g. on shutdown) and return them in id order.
    pub fn drain_pending(&self) -> Vec<Arc<EngineMessage>> {
        let drained = std::mem::take(&mut *self.pending.lock());
        drained.into_values().collect()
    }

    /// Ids of messages awaiting responses, ascending.
    pub fn pending_ids(&self) -> Vec<MessageId> {
        self.pending.lock().keys().copied().collect()
    }

    /// Return the current metrics snapshot.
    pub fn metrics(&self) -> DispatcherMetrics {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::transport::InMemoryTransport;
    use crate::{IdGenerator, MessagePayload};

    fn dispatcher_with_in_memory() -> (EngineDispatcher, Arc<InMemoryTransport>) {
        let mut dispatcher = EngineDispatcher::new(16);
        let transport = Arc::new(InMemoryTransport::new());
        dispatcher.register_transport(transport.clone());
        (dispatcher, transport)
    }

    #[test]
    fn send_and_poll_cycle() {
        let (dispatcher, transport) = dispatcher_with_in_memory();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let mut message = EngineMessage::with_ids(&IdGenerator::new(), MessagePayload::Ping);
        let sink = Arc::clone(&seen);
        message.on_response(move |response| {
            sink.lock().unwrap().push(response.kind());
            Ok(())
        });
        let id = dispatcher.send(message).expect("send succeeds");

        // engine side answers
        let frame = transport.take_outbound().expect("frame available");
        assert_eq!(frame.id, id);
        transport.push_response(EngineResponse::ok(frame.id));

        let report = dispatcher.poll();
        assert_eq!(report.received, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.pending_ids(), vec![id]);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.sent, 1);
        assert_eq!(metrics.delivered, 1);
    }

    #[test]
    fn unknown_ids_are_orphaned() {
        let (dispatcher, transport) = dispatcher_with_in_memory();
        transport.push_response(EngineResponse::ok(42));

        let report = dispatcher.poll();
        assert_eq!(report.orphaned, vec![42]);
        assert_eq!(dispatcher.metrics().orphaned, 1);
    }

    #[test]
    fn released_messages_stop_receiving() {
        let (dispatcher, transport) = dispatcher_with_in_memory();
        let id = dispatcher
            .send(EngineMessage::with_ids(&IdGenerator::new(), MessagePayload::Ping))
            .expect("send succeeds");

        let released = dispatcher.release(id).expect("message was pending");
        assert_eq!(released.id(), id);
        assert!(dispatcher.release(id).is_none());

        transport.push_response(EngineResponse::ok(id));
        assert_eq!(dispatcher.poll().orphaned, vec![id]);
    }

    #[test]
    fn pending_limit_is_enforced() {
        let mut dispatcher = EngineDispatcher::new(1);
        dispatcher.register_transport(Arc::new(InMemoryTransport::new()));
        let ids = IdGenerator::new();

        dispatcher
            .send(EngineMessage::with_ids(&ids, MessagePayload::Ping))
            .expect("first send");
        let err = dispatcher
            .send(EngineMessage::with_ids(&ids, MessagePayload::Ping))
            .expect_err("second send must fail");
        assert!(matches!(err, MessagingError::PendingLimit { limit: 1 }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (dispatcher, _transport) = dispatcher_with_in_memory();
        let ids = IdGenerator::new();
        dispatcher
            .send(EngineMessage::with_ids(&ids, MessagePayload::Ping))
            .expect("first send");

        let again = IdGenerator::new();
        let err = dispatcher
            .send(EngineMessage::with_ids(&again, MessagePayload::Ping))
            .expect_err("duplicate must fail");
        assert!(matches!(
            err,
            MessagingError::DuplicateMessage { message_id: 0 }
        ));
    }

    #[test]
    fn sending_without_transports_fails() {
        let dispatcher = EngineDispatcher::new(4);
        let err = dispatcher
            .send(EngineMessage::with_ids(&IdGenerator::new(), MessagePayload::Ping))
            .expect_err("no transport");
        assert!(matches!(err, MessagingError::NoTransport { message_id: 0 }));
        assert!(dispatcher.pending_ids().is_empty());
    }

    /// Engine stand-in that answers synchronously from inside `send`.
    struct EchoTransport {
        dispatcher: parking_lot::Mutex<std::sync::Weak<EngineDispatcher>>,
        answered: AtomicU64,
    }

    impl Transport for EchoTransport {
        fn send(&self, message: &EngineMessage) -> Result<()> {
            if let Some(dispatcher) = self.dispatcher.lock().upgrade() {
                assert!(dispatcher.pending_ids().contains(&message.id()));
                if dispatcher.deliver(&EngineResponse::ok(message.id()))? {
                    self.answered.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(())
        }

        fn recv(&self) -> Option<EngineResponse> {
            None
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn transports_may_answer_from_inside_send() {
        let transport = Arc::new(EchoTransport {
            dispatcher: parking_lot::Mutex::new(std::sync::Weak::new()),
            answered: AtomicU64::new(0),
        });
        let mut dispatcher = EngineDispatcher::new(4);
        dispatcher.register_transport(Arc::clone(&transport));
        let dispatcher = Arc::new(dispatcher);
        *transport.dispatcher.lock() = Arc::downgrade(&dispatcher);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut message = EngineMessage::with_ids(&IdGenerator::new(), MessagePayload::Ping);
        message.on_response(move |response| {
            sink.lock().unwrap().push(response.kind());
            Ok(())
        });

        let id = dispatcher.send(message).expect("send succeeds");
        assert_eq!(transport.answered.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![crate::ResponseKind::Ok]);
        assert_eq!(dispatcher.pending_ids(), vec![id]);
        assert_eq!(dispatcher.metrics().orphaned, 0);
    }

    #[test]
    fn drain_pending_empties_the_table() {
        let (dispatcher, _transport) = dispatcher_with_in_memory();
        let ids = IdGenerator::new();
        for _ in 0..3 {
            dispatcher
                .send(EngineMessage::with_ids(&ids, MessagePayload::Ping))
                .expect("send");
        }

        let drained: Vec<_> = dispatcher.drain_pending().iter().map(|m| m.id()).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(dispatcher.pending_ids().is_empty());
    }
}

//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier assigned to every engine message.
pub type MessageId = u64;

/// Monotonic id source safe to share between threads.
///
/// Ids start at `0` and are never handed out twice by the same generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first id is `0`.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Reserve the next id.
    pub fn next_id(&self) -> MessageId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call to [`IdGenerator::next_id`] will return.
    pub fn peek(&self) -> MessageId {
        self.next.load(Ordering::Relaxed)
    }
}

static GLOBAL_IDS: IdGenerator = IdGenerator::new();

/// Process-wide generator used by [`crate::EngineMessage::new`].
pub fn global() -> &'static IdGenerator {
    &GLOBAL_IDS
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn fresh_generator_counts_from_zero() {
        let ids = IdGenerator::new();
        assert_eq!(ids.peek(), 0);
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn concurrent_reservations_never_collide() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1_000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("worker finished") {
                assert!(seen.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 8_000);
        assert_eq!(ids.peek(), 8_000);
    }

    #[test]
    fn global_generator_is_monotonic() {
        let first = global().next_id();
        let second = global().next_id();
        assert!(second > first);
    }
}

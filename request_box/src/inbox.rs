//! Bounded, newest-first inbox of captured requests for a single token.

use parking_lot::RwLock;
use std::collections::VecDeque;

use crate::request::CapturedRequest;

/// Number of requests an inbox retains unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 10;

/// Per-token buffer holding at most `capacity` requests, newest first.
///
/// The lock guards only this inbox's contents; registry membership is
/// protected separately by [`crate::registry::TokenRegistry`].
#[derive(Debug)]
pub struct RequestInbox {
    token: String,
    capacity: usize,
    requests: RwLock<VecDeque<CapturedRequest>>,
}

impl RequestInbox {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_capacity(token, DEFAULT_CAPACITY)
    }

    /// A zero capacity is raised to one so a fresh capture is always visible.
    pub fn with_capacity(token: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            token: token.into(),
            capacity,
            requests: RwLock::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Token this inbox belongs to.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert at the front, evicting the oldest entries beyond capacity.
    pub fn add(&self, request: CapturedRequest) {
        let mut requests = self.requests.write();
        requests.push_front(request);
        requests.truncate(self.capacity);
    }

    /// Point-in-time copy of the contents, newest first.
    pub fn list(&self) -> Vec<CapturedRequest> {
        self.requests.read().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.requests.write().clear();
    }

    pub fn len(&self) -> usize {
        self.requests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IncomingRequest;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn request(n: usize) -> CapturedRequest {
        // Identical timestamps: order must come from insertion alone.
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        IncomingRequest::new("POST", format!("/r/{n}"))
            .with_body(format!("payload-{n}"))
            .stamp(at)
    }

    fn urls(inbox: &RequestInbox) -> Vec<String> {
        inbox.list().iter().map(|r| r.url().to_string()).collect()
    }

    #[test]
    fn test_newest_first_ordering() {
        let inbox = RequestInbox::new("t");
        for n in 1..=5 {
            inbox.add(request(n));
        }

        assert_eq!(urls(&inbox), vec!["/r/5", "/r/4", "/r/3", "/r/2", "/r/1"]);
        assert_eq!(inbox.len(), 5);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let inbox = RequestInbox::new("t");
        for n in 1..=DEFAULT_CAPACITY + 1 {
            inbox.add(request(n));
        }

        let expected: Vec<String> = (2..=DEFAULT_CAPACITY + 1)
            .rev()
            .map(|n| format!("/r/{n}"))
            .collect();
        assert_eq!(urls(&inbox), expected);
        assert_eq!(inbox.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let inbox = RequestInbox::new("t");
        inbox.add(request(1));
        inbox.add(request(2));

        inbox.clear();
        inbox.clear();
        assert!(inbox.list().is_empty());
        assert!(inbox.is_empty());

        let empty = RequestInbox::new("t");
        empty.clear();
        assert!(empty.list().is_empty());
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let inbox = RequestInbox::new("t");
        inbox.add(request(1));
        let snapshot = inbox.list();

        inbox.add(request(2));
        inbox.clear();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].url(), "/r/1");
    }

    #[test]
    fn test_custom_capacity() {
        let inbox = RequestInbox::with_capacity("t", 3);
        for n in 1..=7 {
            inbox.add(request(n));
        }
        assert_eq!(urls(&inbox), vec!["/r/7", "/r/6", "/r/5"]);

        let tiny = RequestInbox::with_capacity("t", 0);
        tiny.add(request(1));
        assert_eq!(tiny.capacity(), 1);
        assert_eq!(tiny.len(), 1);
    }

    #[test]
    fn test_concurrent_adds_keep_verbatim_entries() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let inbox = Arc::new(RequestInbox::new("t"));
        let handles: Vec<_> = (0..THREADS)
            .map(|thread| {
                let inbox = inbox.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        inbox.add(request(thread * PER_THREAD + i));
                        assert!(inbox.len() <= DEFAULT_CAPACITY);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let retained = inbox.list();
        assert_eq!(retained.len(), (THREADS * PER_THREAD).min(DEFAULT_CAPACITY));

        let mut seen = HashSet::new();
        for entry in &retained {
            let n: usize = entry.url().trim_start_matches("/r/").parse().unwrap();
            assert!(n < THREADS * PER_THREAD);
            assert_eq!(entry, &request(n));
            assert!(seen.insert(n), "duplicate entry {n}");
        }
    }

    proptest! {
        #[test]
        fn prop_len_bounded_and_newest_first(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let inbox = RequestInbox::new("t");
            let mut model: Vec<usize> = Vec::new();

            for (n, is_add) in ops.into_iter().enumerate() {
                if is_add {
                    inbox.add(request(n));
                    model.insert(0, n);
                    model.truncate(DEFAULT_CAPACITY);
                } else {
                    inbox.clear();
                    model.clear();
                }
                prop_assert!(inbox.len() <= DEFAULT_CAPACITY);
            }

            let expected: Vec<String> = model.iter().map(|n| format!("/r/{n}")).collect();
            prop_assert_eq!(urls(&inbox), expected);
        }
    }
}

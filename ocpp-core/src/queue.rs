//! Offline transaction queue.
//!
//! FIFO of already-packed outgoing wire objects, so a resend never
//! re-packs — retries are byte-identical to the original send.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::message::Opaque;

#[derive(Debug, Default)]
pub struct OfflineQueue {
    items: Mutex<VecDeque<Opaque>>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&self, wire: Opaque) {
        self.items.lock().unwrap().push_back(wire);
    }

    /// Clone of the current head, without removing it.
    pub fn peek_front(&self) -> Option<Opaque> {
        self.items.lock().unwrap().front().cloned()
    }

    pub fn pop_front(&self) -> Option<Opaque> {
        self.items.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fifo_order() {
        let q = OfflineQueue::new();
        q.push_back(json!(1));
        q.push_back(json!(2));
        q.push_back(json!(3));
        assert_eq!(q.peek_front(), Some(json!(1)));
        assert_eq!(q.pop_front(), Some(json!(1)));
        assert_eq!(q.pop_front(), Some(json!(2)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front(), Some(json!(3)));
        assert!(q.is_empty());
        assert_eq!(q.pop_front(), None);
    }
}

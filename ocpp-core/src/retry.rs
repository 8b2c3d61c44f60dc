//! Background resender for the offline queue.
//!
//! A naive port would restart a one-shot thread per activation, the way
//! some retry loops do in languages where that's cheap. Here a
//! single long-lived task waits on a `Notify`, woken on connect and on
//! enqueue, and drains the queue each time it wakes. Two activations
//! never run concurrently for a session because there is only ever one
//! task — `Notify::notify_one` just coalesces wakeups that arrive while
//! it's already draining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::listener_hook::message_listener;
use crate::message::Opaque;
use crate::queue::OfflineQueue;
use crate::radio::Radio;
use crate::session::SessionId;

/// Fixed retry delay between a transmit and the ack-gated pop check.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Handle to a running retry task. Dropping it aborts the task — see
/// `impl Drop` below — so a `RetryRunner` living inside a `Communicator`
/// is enough on its own; there is no separate `shutdown` call to make.
pub struct RetryRunner {
    notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl RetryRunner {
    /// Spawn the worker. `failed_flag` is shared with the Communicator's
    /// inbound dispatcher, which sets it on a peer `CallError` for *any*
    /// in-flight id on the session — coarse-grained, not per-id.
    ///
    /// `session_id` is shared with the owning Communicator: it may still
    /// be empty the moment the runner is spawned (the Listener assigns
    /// it immediately after construction, not before), so the runner
    /// reads through the cell each time it logs rather than capturing a
    /// value up front.
    pub fn spawn(
        session_id: Arc<OnceLock<SessionId>>,
        queue: Arc<OfflineQueue>,
        radio: Arc<dyn Radio>,
        failed_flag: Arc<AtomicBool>,
    ) -> Self {
        let notify = Arc::new(Notify::new());
        let task_notify = Arc::clone(&notify);

        let handle = tokio::spawn(async move {
            loop {
                task_notify.notified().await;
                drain(&session_id, &queue, &radio, &failed_flag).await;
            }
        });

        Self { notify, handle }
    }

    /// Signal a start trigger: transport connected, or a new
    /// transaction-related call enqueued while already connected.
    pub fn kick(&self) {
        self.notify.notify_one();
    }
}

impl Drop for RetryRunner {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn drain(
    session_id: &OnceLock<SessionId>,
    queue: &OfflineQueue,
    radio: &Arc<dyn Radio>,
    failed_flag: &AtomicBool,
) {
    while let Some(head) = queue.peek_front() {
        failed_flag.store(false, Ordering::SeqCst);

        if let Err(e) = radio.send(head.clone()).await {
            warn!(session_id = ?session_id.get(), error = %e, "retry transmit failed, queue retained");
            return; // abort the loop; next connect/enqueue trigger resumes it
        }

        if let (Some(ml), Some(id)) = (message_listener(), session_id.get()) {
            ml.on_send_message(*id, &head);
        }

        tokio::time::sleep(RETRY_DELAY).await;

        if !failed_flag.load(Ordering::SeqCst) {
            queue.pop_front();
        } else {
            debug!(session_id = ?session_id.get(), "peer CallError during retry window, re-sending head");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    struct RecordingRadio {
        sends: AsyncMutex<Vec<Opaque>>,
        fail_after: Option<usize>,
        count: AtomicUsize,
    }

    #[async_trait]
    impl Radio for RecordingRadio {
        async fn send(&self, wire: Opaque) -> Result<(), crate::error::CommunicatorError> {
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if n >= limit {
                    return Err(crate::error::CommunicatorError::NotConnected);
                }
            }
            self.sends.lock().await.push(wire);
            Ok(())
        }
        fn disconnect(&self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pops_head_only_after_delay_with_no_error() {
        let queue = Arc::new(OfflineQueue::new());
        queue.push_back(json!({"id": "t1"}));
        let radio: Arc<dyn Radio> = Arc::new(RecordingRadio {
            sends: AsyncMutex::new(vec![]),
            fail_after: None,
            count: AtomicUsize::new(0),
        });
        let failed = Arc::new(AtomicBool::new(false));
        let session_cell = Arc::new(OnceLock::new());
        session_cell.set(SessionId::new()).unwrap();
        let runner = RetryRunner::spawn(session_cell, Arc::clone(&queue), radio, failed);

        runner.kick();
        tokio::time::advance(RETRY_DELAY + Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retains_head_when_failed_flag_set() {
        let queue = Arc::new(OfflineQueue::new());
        queue.push_back(json!({"id": "t1"}));
        let radio: Arc<dyn Radio> = Arc::new(RecordingRadio {
            sends: AsyncMutex::new(vec![]),
            fail_after: None,
            count: AtomicUsize::new(0),
        });
        let failed = Arc::new(AtomicBool::new(false));
        let session_cell = Arc::new(OnceLock::new());
        session_cell.set(SessionId::new()).unwrap();
        let runner = RetryRunner::spawn(session_cell, Arc::clone(&queue), radio, Arc::clone(&failed));

        // Simulate a peer CallError landing mid-retry-sleep.
        runner.kick();
        tokio::task::yield_now().await;
        failed.store(true, Ordering::SeqCst);
        tokio::time::advance(RETRY_DELAY + Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert_eq!(queue.len(), 1);
    }
}

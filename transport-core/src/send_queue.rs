//! FIFO handoff of outbound messages from producer threads to the worker.
//!
//! The queue is the only shared mutable state on the hot path. Lock
//! hold-time is minimised: `push` appends and releases before notifying,
//! and `swap_out` is the *only* worker-side access — this is what fixes the
//! data race the original source flagged with a `TODO` ("frames_to_send_
//! should be protected"): the worker never touches the FIFO except through
//! a single swap under the lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::{Controller, DeviceUid};
use crate::error::{Result, TransportError};
use crate::notifier::Notifier;
use crate::raw_message::RawMessage;

/// Mutex-protected FIFO of pending outbound messages, paired with the
/// notifier producers use to wake the worker after pushing.
pub struct SendQueue {
    queue: Mutex<VecDeque<RawMessage>>,
    notifier: Arc<Notifier>,
}

impl SendQueue {
    #[must_use]
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notifier,
        }
    }

    /// Push a message and wake the worker. The notify call happens strictly
    /// after the lock is released, so the worker never contends with a
    /// producer for the pipe write.
    pub fn push(&self, msg: RawMessage) -> Result<()> {
        {
            let mut guard = self.queue.lock();
            guard.push_back(msg);
        }
        self.notifier.notify()
    }

    /// Re-prepend a message the worker partially sent (or never attempted)
    /// back onto the front of the shared queue, preserving order with
    /// whatever was pushed while the worker held its local copy.
    pub fn requeue_front(&self, mut remaining: VecDeque<RawMessage>) {
        if remaining.is_empty() {
            return;
        }
        let mut guard = self.queue.lock();
        remaining.append(&mut guard);
        *guard = remaining;
    }

    /// Worker-side drain: swap the shared FIFO with an empty local one and
    /// return the local copy. This is the only place the worker touches the
    /// queue directly.
    #[must_use]
    pub fn swap_out(&self) -> VecDeque<RawMessage> {
        let mut guard = self.queue.lock();
        std::mem::take(&mut *guard)
    }

    /// On shutdown, fail every remaining queued message through the
    /// controller, in insertion order, emptying the queue.
    pub fn drain_failed(&self, controller: &dyn Controller, device: &DeviceUid, app: u32) {
        let remaining = self.swap_out();
        for msg in remaining {
            controller.data_send_failed(device, app, msg, TransportError::CommunicationError);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

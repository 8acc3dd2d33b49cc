//! Single-slot hand-off between the capture callback and the consumer loop.
//!
//! The capture library invokes its completion callback on its own thread; the
//! consumer runs on the main thread. The only state shared between the two is
//! this channel: a mutex-protected slot holding the most recently completed
//! buffer, plus a condition variable to wake the consumer.
//!
//! There is deliberately no queue. A completion that arrives while an earlier
//! one is still pending displaces it; the consumer only ever processes the
//! newest frame. Displaced completions are not discarded, though: dropping
//! them would orphan their buffers for the rest of the session, so `take`
//! hands them back for recycling without processing.

use std::sync::{Condvar, Mutex};

/// What a call to [`Handoff::take`] drains.
#[derive(Debug)]
pub struct Taken<T> {
    /// The most recent completion. This is the frame to process.
    pub latest: T,
    /// Older completions displaced while the consumer lagged, oldest first.
    /// Their buffers should be handed straight back for refilling.
    pub displaced: Vec<T>,
}

struct Slot<T> {
    latest: Option<T>,
    displaced: Vec<T>,
}

/// Single-slot completion channel; last completed buffer wins.
pub struct Handoff<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                displaced: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Producer side: record `value` as the newest completion and wake one
    /// waiting consumer.
    ///
    /// Safe to call from the capture callback: one lock, at most one Vec
    /// push (bounded by the pool size), one notify.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock().expect("handoff mutex poisoned");
        if let Some(previous) = slot.latest.replace(value) {
            slot.displaced.push(previous);
        }
        self.ready.notify_one();
    }

    /// Consumer side: block until a completion is pending, then drain the
    /// channel back to empty.
    ///
    /// The wait is predicate-guarded, so a spurious wakeup never yields an
    /// empty result. There is no timeout: if the producer stalls, so does the
    /// caller.
    pub fn take(&self) -> Taken<T> {
        let mut slot = self.slot.lock().expect("handoff mutex poisoned");
        loop {
            if let Some(latest) = slot.latest.take() {
                return Taken {
                    latest,
                    displaced: std::mem::take(&mut slot.displaced),
                };
            }
            slot = self.ready.wait(slot).expect("handoff mutex poisoned");
        }
    }

    /// Non-blocking variant of [`take`](Self::take); `None` when nothing is
    /// pending.
    pub fn try_take(&self) -> Option<Taken<T>> {
        let mut slot = self.slot.lock().expect("handoff mutex poisoned");
        slot.latest.take().map(|latest| Taken {
            latest,
            displaced: std::mem::take(&mut slot.displaced),
        })
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

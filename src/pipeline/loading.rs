//! In-flight request accounting for the loading indicator.
//!
//! The count lives in a `watch` channel so every update is atomic and UI
//! code can subscribe to it. A slot is held by an `InFlight` guard and
//! released when the guard drops, which happens exactly once whether the
//! request succeeds, fails, or is abandoned by its caller.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct LoadingTracker {
    in_flight: watch::Sender<usize>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self { in_flight }
    }

    /// Number of accounted requests currently in flight.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// The loading indicator is visible iff something is in flight.
    pub fn is_visible(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Take a slot. It is released when the returned guard drops.
    pub fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.send_modify(|n| *n += 1);
        InFlight {
            tracker: Arc::clone(self),
        }
    }

    /// Release one slot, clamping at zero.
    fn release(&self) {
        self.in_flight.send_if_modified(|n| {
            if *n == 0 {
                tracing::error!("In-flight counter released below zero, clamping");
                false
            } else {
                *n -= 1;
                true
            }
        });
    }
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// One accounted request. Dropping it releases the slot.
#[must_use = "the slot is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct InFlight {
    tracker: Arc<LoadingTracker>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

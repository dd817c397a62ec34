use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A capability to wake a supervisor loop at most once per quiescent
/// period. Posting to an already-full slot is a no-op; the worker drains
/// the slot on its next iteration. This is the only coordination the API
/// layer has with a supervisor loop — it never calls into supervisor logic
/// directly.
#[derive(Clone)]
pub struct Nudge {
    pending: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Nudge {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Called by API handlers after accepting new intent. Non-blocking.
    pub fn post(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Drains the slot, returning whether a nudge was pending.
    pub fn drain(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Default for Nudge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_posts_coalesce_to_one_pending_nudge() {
        let n = Nudge::new();
        n.post();
        n.post();
        n.post();
        assert!(n.drain());
        assert!(!n.drain());
    }
}

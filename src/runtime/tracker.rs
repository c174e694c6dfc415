//! Counting barrier that observes when every entity of a batch has reported.

use tokio::sync::watch;
use tracing::warn;

/// Completion state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Some entities have not reported yet.
    Pending,
    /// Every entity reported, successfully or not.
    Done,
}

/// Reported outcomes so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Entities that reported, successes and failures together.
    pub processed: usize,
    /// Entities that reported a failure.
    pub failed: usize,
}

/// Tracks `processed` against a fixed target and wakes waiters on every change.
#[derive(Debug)]
pub struct CompletionTracker {
    target: usize,
    progress: watch::Sender<Progress>,
}

impl CompletionTracker {
    /// Tracker for a batch of `target` entities, starting `Pending`
    /// (already `Done` when `target` is zero).
    pub fn new(target: usize) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self { target, progress }
    }

    /// Batch size.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Current counts.
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Current state.
    pub fn state(&self) -> TrackerState {
        self.state_of(self.progress())
    }

    /// Counts one successful entity.
    pub fn record_success(&self) -> TrackerState {
        self.record(false)
    }

    /// Counts one failed entity.
    pub fn record_failure(&self) -> TrackerState {
        self.record(true)
    }

    /// Resolves once every entity has reported.
    pub async fn wait_done(&self) {
        let target = self.target;
        self.wait_until(|p| p.processed >= target).await;
    }

    /// Resolves once `pred` holds for the current progress.
    pub async fn wait_until(&self, mut pred: impl FnMut(&Progress) -> bool) {
        let mut rx = self.progress.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|p| pred(p)).await;
    }

    fn record(&self, failed: bool) -> TrackerState {
        let target = self.target;
        let mut overflow = false;
        self.progress.send_modify(|p| {
            if p.processed >= target {
                overflow = true;
                return;
            }
            p.processed += 1;
            if failed {
                p.failed += 1;
            }
        });
        if overflow {
            warn!(batch_size = target, "outcome reported after batch completion; ignored");
        }
        self.state()
    }

    fn state_of(&self, progress: Progress) -> TrackerState {
        if progress.processed >= self.target {
            TrackerState::Done
        } else {
            TrackerState::Pending
        }
    }
}

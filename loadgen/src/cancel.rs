//! Process-wide stop signal observed by every long-running loop.

use std::sync::Arc;

use tokio::sync::watch;

/// A write-once broadcast flag.
///
/// Clones share the same flag. [`cancel`](Self::cancel) may be called any
/// number of times from any clone; only the first call changes anything.
/// Every task awaiting [`cancelled`](Self::cancelled) wakes up, including
/// tasks that start waiting after the flag was set.
#[derive(Clone, Debug)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Sets the flag. Returns `true` if this call was the one that set it.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a
        // closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

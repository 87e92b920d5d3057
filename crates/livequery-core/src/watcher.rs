//! Debounced revision watcher.
//!
//! Subscribes once to an index's update event and republishes the index
//! revision through a `tokio::sync::watch` channel. Bursts of updates are
//! coalesced on a trailing-edge timer: the observed value changes once per
//! burst, `debounce` after the last update, carrying that update's revision.

use crate::cancel::CancellationToken;
use crate::config::WatchSettings;
use crate::error::{LiveQueryError, Result};
use crate::index::{RevisionedIndex, SubscriptionToken, UpdateCallback};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Watches an index revision for the lifetime of one binding.
///
/// Dropping the watcher unsubscribes from the index and cancels any armed
/// debounce timer.
pub struct RevisionWatcher {
    index: Arc<dyn RevisionedIndex>,
    token: SubscriptionToken,
    receiver: watch::Receiver<u64>,
    debounce: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RevisionWatcher {
    /// Start watching `index`.
    ///
    /// With a zero debounce window every update is observed synchronously
    /// from the index callback. Otherwise a background task on the current
    /// tokio runtime does the batching, so one must be running.
    pub fn observe(index: Arc<dyn RevisionedIndex>, settings: &WatchSettings) -> Result<Self> {
        let debounce = settings.debounce_duration();
        let (sender, receiver) = watch::channel(index.revision());
        let cancel = CancellationToken::new();

        let (token, task) = if settings.is_immediate() {
            let sender = Arc::new(sender);
            let publisher = Arc::clone(&sender);
            let callback: UpdateCallback = Arc::new(move |revision| {
                publish(&publisher, revision);
            });
            let token = index.on_update(callback)?;
            // Catch updates that landed between the initial read and subscribing.
            publish(&sender, index.revision());
            (token, None)
        } else {
            let runtime = Handle::try_current().map_err(|e| LiveQueryError::Runtime {
                message: e.to_string(),
            })?;
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let listener = event_tx.clone();
            let callback: UpdateCallback = Arc::new(move |revision| {
                let _ = listener.send(revision);
            });
            let token = index.on_update(callback)?;
            // A missed update joins the first burst instead of bypassing the window.
            let latest = index.revision();
            if latest > *sender.borrow() {
                let _ = event_tx.send(latest);
            }
            let task = runtime.spawn(debounce_loop(event_rx, sender, debounce, cancel.clone()));
            (token, Some(task))
        };

        info!(
            "Watching index revision {} (listener {}, debounce {:?})",
            *receiver.borrow(),
            token.id(),
            debounce
        );

        Ok(Self {
            index,
            token,
            receiver,
            debounce,
            cancel,
            task,
        })
    }

    /// Latest observed revision.
    pub fn current(&self) -> u64 {
        *self.receiver.borrow()
    }

    /// Wait for the observed revision to change and return the new value.
    pub async fn changed(&mut self) -> Result<u64> {
        self.receiver.changed().await?;
        Ok(*self.receiver.borrow_and_update())
    }

    /// Whether an update arrived that `changed()` has not yet returned.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// An independent receiver of the observed revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.receiver.clone()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn index(&self) -> &Arc<dyn RevisionedIndex> {
        &self.index
    }
}

impl Drop for RevisionWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.index.off(self.token) {
            debug!("Stopped watching index (listener {})", self.token.id());
        }
    }
}

/// Raise the observed revision, never lowering it.
fn publish(sender: &watch::Sender<u64>, revision: u64) -> bool {
    sender.send_if_modified(|current| {
        if revision > *current {
            *current = revision;
            true
        } else {
            false
        }
    })
}

/// Coalesce update events into one publish per burst.
async fn debounce_loop(
    mut events: mpsc::UnboundedReceiver<u64>,
    sender: watch::Sender<u64>,
    window: Duration,
    cancel: CancellationToken,
) {
    loop {
        let mut pending = tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => match event {
                Some(revision) => revision,
                None => return,
            },
        };

        let timer = tokio::time::sleep_until(Instant::now() + window);
        tokio::pin!(timer);
        let mut closed = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = events.recv(), if !closed => match event {
                    Some(revision) => {
                        pending = pending.max(revision);
                        timer.as_mut().reset(Instant::now() + window);
                    }
                    None => closed = true,
                },
                _ = &mut timer => break,
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        trace!("Debounce window elapsed, publishing revision {}", pending);
        publish(&sender, pending);

        if closed {
            debug!("Index dropped its listener, stopping debounce task");
            return;
        }
    }
}

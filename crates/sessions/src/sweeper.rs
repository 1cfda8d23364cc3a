//! Background expiry of abandoned sessions.

use std::{sync::Arc, time::Duration};

use {
    reelbot_common::now_ms,
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::store::SessionStore;

/// Periodically calls [`SessionStore::sweep`] until shut down.
pub struct SessionSweeper;

/// Owns the running sweep loop.
pub struct SweeperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    /// Start sweeping `store` every `interval`, dropping records idle longer than `ttl`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn SessionStore>, ttl: Duration, interval: Duration) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            info!(?ttl, ?interval, "session sweeper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; nothing can be stale yet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep(now_ms(), ttl);
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "swept stale sessions");
                        } else {
                            debug!(remaining = store.len(), "session sweep found nothing stale");
                        }
                    },
                }
            }
            info!("session sweeper stopped");
        });
        SweeperHandle { cancel, handle }
    }
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await
            && e.is_panic()
        {
            warn!("session sweeper panicked: {e}");
        }
    }
}

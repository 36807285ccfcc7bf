use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use crate::observability::metrics::Metrics;

/// Delayed auto-accept attempts, one per offer, each cancellable by offer id.
///
/// A task claims its own entry before firing, so cancelling an offer only ever
/// aborts a task that is still waiting.
pub struct AutoAcceptScheduler {
    pending: Arc<DashMap<Uuid, AbortHandle>>,
    metrics: Metrics,
}

impl AutoAcceptScheduler {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Runs `fire` after `delay` unless cancelled first. Scheduling an offer
    /// that already has a waiting attempt replaces it.
    pub fn schedule<F, Fut>(&self, offer_id: Uuid, delay: Duration, fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let pending = self.pending.clone();
        let gauge = self.metrics.scheduled_auto_accepts.clone();

        let task = tokio::spawn(async move {
            if registered_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;

            if pending.remove(&offer_id).is_none() {
                return;
            }
            gauge.dec();
            fire().await;
        });

        if let Some(previous) = self.pending.insert(offer_id, task.abort_handle()) {
            previous.abort();
            self.metrics.scheduled_auto_accepts.dec();
        }
        self.metrics.scheduled_auto_accepts.inc();
        let _ = registered_tx.send(());

        debug!(offer_id = %offer_id, delay_ms = delay.as_millis() as u64, "auto-accept scheduled");
    }

    pub fn cancel(&self, offer_id: Uuid) -> bool {
        match self.pending.remove(&offer_id) {
            Some((_, handle)) => {
                handle.abort();
                self.metrics.scheduled_auto_accepts.dec();
                debug!(offer_id = %offer_id, "auto-accept cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all<'a>(&self, offer_ids: impl IntoIterator<Item = &'a Uuid>) {
        for offer_id in offer_ids {
            self.cancel(*offer_id);
        }
    }

    pub fn is_scheduled(&self, offer_id: Uuid) -> bool {
        self.pending.contains_key(&offer_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn fires_once_after_delay() {
        let scheduler = AutoAcceptScheduler::new(Metrics::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let offer_id = Uuid::new_v4();

        let counter = fired.clone();
        scheduler.schedule(offer_id, Duration::from_millis(10), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_scheduled(offer_id));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn cancelled_attempt_never_fires() {
        let scheduler = AutoAcceptScheduler::new(Metrics::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let offer_id = Uuid::new_v4();

        let counter = fired.clone();
        scheduler.schedule(offer_id, Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.cancel(offer_id));
        assert!(!scheduler.cancel(offer_id));

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_waiting_attempt() {
        let scheduler = AutoAcceptScheduler::new(Metrics::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let offer_id = Uuid::new_v4();

        for _ in 0..3 {
            let counter = fired.clone();
            scheduler.schedule(offer_id, Duration::from_millis(20), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

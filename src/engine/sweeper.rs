use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::offers::OfferService;

/// Periodic expiration sweep. Runs until the task is dropped.
pub async fn run_expiration_sweeper(offers: OfferService, every: Duration) {
    info!(interval_secs = every.as_secs(), "expiration sweeper started");

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let start = Instant::now();
        let report = offers.sweep().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if report.offers_expired
            + report.requests_expired
            + report.auto_accepted
            + report.cache_entries_purged
            > 0
        {
            info!(
                offers_expired = report.offers_expired,
                requests_expired = report.requests_expired,
                auto_accepted = report.auto_accepted,
                cache_entries_purged = report.cache_entries_purged,
                elapsed_ms,
                "expiration sweep finished"
            );
        } else {
            debug!(elapsed_ms, "expiration sweep found nothing to do");
        }
    }
}

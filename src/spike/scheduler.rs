//! Background tasks: the periodic detection run and rate-limit record
//! housekeeping.

use crate::rate_limit::RateLimiter;
use crate::spike::detector::SpikeDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Spawn the periodic spike-detection task
pub fn spawn_detection_task(detector: Arc<SpikeDetector>, interval_seconds: u64) {
    tokio::spawn(async move {
        // Let the service settle before the first scan
        tokio::time::sleep(Duration::from_secs(30)).await;

        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        info!("Spike detection task started ({}s interval)", interval_seconds);

        loop {
            interval.tick().await;

            let report = detector.run().await;
            if !report.success {
                error!("Spike detection run failed, will retry next interval");
            }
        }
    });
}

/// Spawn best-effort housekeeping over stale rate-limit records.
/// Correctness never depends on this; elapsed windows are treated as
/// absent by the limiter itself.
pub fn spawn_purge_task(rate_limiter: Arc<Mutex<RateLimiter>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(6 * 60 * 60));
        info!("Rate-limit purge task started (6h interval)");

        loop {
            interval.tick().await;

            let purged = {
                let mut limiter = rate_limiter.lock().await;
                limiter.purge_stale().await
            };

            match purged {
                Ok(0) => info!("No stale rate-limit records to purge"),
                Ok(count) => info!(purged = count, "Purged stale rate-limit records"),
                Err(e) => error!(error = %e, "Failed to purge stale rate-limit records"),
            }
        }
    });
}

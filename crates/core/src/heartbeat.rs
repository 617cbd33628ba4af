//! Keep-alive scheduler.
//!
//! Busylights reset themselves when they see no traffic for around half a
//! minute, so a fixed-period heartbeat enqueues the keep-alive report for
//! every connected device regardless of other activity. The first beat
//! fires immediately on start.

use crate::registry::Registry;
use crate::report;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default keep-alive period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

/// Spawn the keep-alive loop. Runs until `stop` is notified.
pub(crate) fn spawn_heartbeat(
    registry: Arc<Registry>,
    period: Duration,
    stop: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(period_secs = period.as_secs(), "Keep-alive scheduler started");
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => beat(&registry),
                _ = stop.notified() => break,
            }
        }
        debug!("Keep-alive scheduler stopped");
    })
}

/// Enqueue one keep-alive for every connected device. Disconnected
/// devices are skipped; each device's beat is independent of the others.
fn beat(registry: &Registry) {
    for (path, queue) in registry.connected_queues() {
        trace!(path = %path, "Keep-alive enqueued");
        queue.push(report::KEEP_ALIVE);
    }
}

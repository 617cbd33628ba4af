//! Dispatch loop: the single consumer of every device queue.
//!
//! A fixed tick drains each connected device's queue in FIFO order and
//! writes through the owning transport. Writes never happen anywhere
//! else while the loop runs, so per-device ordering is exactly enqueue
//! order.

use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default dispatch tick period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Spawn the dispatcher loop. Runs until `stop` is notified.
pub(crate) fn spawn_dispatcher(
    registry: Arc<Registry>,
    tick: Duration,
    stop: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(tick_ms = tick.as_millis() as u64, "Dispatcher started");
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = interval.tick() => dispatch_tick(&registry),
                _ = stop.notified() => break,
            }
        }
        debug!("Dispatcher stopped");
    })
}

/// Run one tick: drain and deliver every connected device's queue.
///
/// A failed write disconnects that device and discards the rest of its
/// drained commands; other devices are dispatched normally in the same
/// tick.
pub(crate) fn dispatch_tick(registry: &Registry) {
    for target in registry.dispatch_targets() {
        let commands = target.queue.drain();
        if commands.is_empty() {
            continue;
        }
        trace!(path = %target.path, count = commands.len(), "Dispatching queued commands");
        for (written, packet) in commands.iter().enumerate() {
            if let Err(e) = target.transport.write_packet(packet) {
                warn!(
                    path = %target.path,
                    error = %e,
                    dropped = commands.len() - written,
                    "Write failed, disconnecting device"
                );
                registry.mark_disconnected(&target.path);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::device::{BusylightModel, DiscoveredDevice};
    use crate::report;
    use crate::transport::mock::MockTransport;
    use crate::PLENOM_VID;
    use crate::registry::DeviceState;

    fn test_device(path: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            model: BusylightModel::Alpha,
            vid: PLENOM_VID,
            pid: BusylightModel::Alpha.pid(),
            path: path.to_string(),
            serial: None,
        }
    }

    #[test]
    fn tick_drains_whole_queue_in_order() {
        let registry = Registry::new();
        let mock = Arc::new(MockTransport::new("dev-0"));
        registry.attach(test_device("dev-0"), mock.clone());

        let colors: Vec<Rgb> = (0..5u8).map(|i| Rgb::new(i, 0, 0)).collect();
        for c in &colors {
            registry.enqueue_color("dev-0", *c).unwrap();
        }

        dispatch_tick(&registry);

        let expected: Vec<_> = colors.iter().map(|c| report::encode(*c)).collect();
        assert_eq!(mock.writes(), expected);
        dispatch_tick(&registry);
        assert_eq!(mock.write_count(), 5);
    }

    #[test]
    fn failed_write_disconnects_and_discards_rest_of_tick() {
        let registry = Registry::new();
        let mock = Arc::new(MockTransport::new("dev-0"));
        registry.attach(test_device("dev-0"), mock.clone());
        mock.fail_after(1);

        for i in 0..3u8 {
            registry.enqueue_color("dev-0", Rgb::new(i, 0, 0)).unwrap();
        }
        dispatch_tick(&registry);

        assert_eq!(mock.write_count(), 1);
        assert_eq!(registry.state("dev-0"), Some(DeviceState::Disconnected));

        // Nothing is retried on later ticks.
        dispatch_tick(&registry);
        assert_eq!(mock.write_count(), 1);
    }

    #[test]
    fn failure_on_one_device_leaves_others_alone() {
        let registry = Registry::new();
        let broken = Arc::new(MockTransport::new("dev-a"));
        let healthy = Arc::new(MockTransport::new("dev-b"));
        registry.attach(test_device("dev-a"), broken.clone());
        registry.attach(test_device("dev-b"), healthy.clone());
        broken.fail_now();

        registry.enqueue_color("dev-a", Rgb::WHITE).unwrap();
        registry.enqueue_color("dev-b", Rgb::WHITE).unwrap();
        dispatch_tick(&registry);

        assert_eq!(registry.state("dev-a"), Some(DeviceState::Disconnected));
        assert_eq!(registry.state("dev-b"), Some(DeviceState::Connected));
        assert_eq!(healthy.writes(), vec![report::encode(Rgb::WHITE)]);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_dispatches_every_tick_until_stopped() {
        let registry = Arc::new(Registry::new());
        let mock = Arc::new(MockTransport::new("dev-0"));
        registry.attach(test_device("dev-0"), mock.clone());

        let stop = Arc::new(Notify::new());
        let handle = spawn_dispatcher(
            Arc::clone(&registry),
            Duration::from_millis(100),
            Arc::clone(&stop),
        );

        registry.enqueue_color("dev-0", Rgb::WHITE).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(mock.write_count(), 1);

        registry.enqueue_color("dev-0", Rgb::OFF).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.write_count(), 2);

        stop.notify_one();
        handle.await.unwrap();
    }
}

//! Caller-facing facade over the registry and background tasks.
//!
//! The controller is the single owner of task lifecycles: it starts the
//! dispatcher and keep-alive loops, spawns one generator per cycling
//! device, and joins everything on shutdown. External producers (a CLI,
//! a GUI, a classifier) only ever call the enqueue, cycling, and status
//! methods.

use crate::color::{ColorTable, Rgb};
use crate::cycle;
use crate::device;
use crate::dispatcher;
use crate::error::Result;
use crate::heartbeat;
use crate::registry::{DeviceStatus, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periods for the background loops. Defaults match the device's real
/// behavior; tests shrink or stretch them.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Dispatcher drain period.
    pub tick: Duration,
    /// Delay between generated cycle steps.
    pub cycle_step: Duration,
    /// Keep-alive period.
    pub heartbeat: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: dispatcher::DEFAULT_TICK,
            cycle_step: cycle::DEFAULT_STEP_DELAY,
            heartbeat: heartbeat::DEFAULT_PERIOD,
        }
    }
}

/// A background loop with its stop signal, joined on shutdown.
struct Supervised {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Supervised {
    async fn stop_and_join(self) {
        self.stop.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Background task failed");
        }
    }
}

/// The busylight control core.
pub struct Controller {
    registry: Arc<Registry>,
    colors: ColorTable,
    timing: Timing,
    dispatcher: Option<Supervised>,
    heartbeat: Option<Supervised>,
}

impl Controller {
    pub fn new(colors: ColorTable) -> Self {
        Self::with_timing(colors, Timing::default())
    }

    pub fn with_timing(colors: ColorTable, timing: Timing) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            colors,
            timing,
            dispatcher: None,
            heartbeat: None,
        }
    }

    /// The device registry. Exposed so callers can attach non-HID
    /// transports or inspect devices directly.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    /// Discover and connect every recognized busylight. Enumeration
    /// failures and devices that fail to open are logged and skipped.
    /// Returns the number of devices connected afterwards.
    pub fn connect_all(&self) -> usize {
        match device::discover_devices(device::RECOGNIZED_PIDS) {
            Ok(discovered) => {
                for dev in &discovered {
                    if let Err(e) = self.registry.connect(dev) {
                        warn!(path = %dev.path, error = %e, "Skipping device that failed to open");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Device enumeration failed"),
        }
        self.registry.connected_count()
    }

    /// Start the dispatcher and keep-alive loops. Idempotent; must be
    /// called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.dispatcher.is_none() {
            let stop = Arc::new(Notify::new());
            let handle = dispatcher::spawn_dispatcher(
                Arc::clone(&self.registry),
                self.timing.tick,
                Arc::clone(&stop),
            );
            self.dispatcher = Some(Supervised { stop, handle });
        }
        if self.heartbeat.is_none() {
            let stop = Arc::new(Notify::new());
            let handle = heartbeat::spawn_heartbeat(
                Arc::clone(&self.registry),
                self.timing.heartbeat,
                Arc::clone(&stop),
            );
            self.heartbeat = Some(Supervised { stop, handle });
        }
    }

    /// Enqueue a color, given a known name or an `r,g,b` literal, for one
    /// device. Invalid colors are rejected before anything is queued.
    pub fn enqueue_color(&self, path: &str, spec: &str) -> Result<()> {
        let rgb = self.colors.resolve(spec)?;
        self.enqueue_rgb(path, rgb)
    }

    /// Enqueue an already-validated color for one device.
    pub fn enqueue_rgb(&self, path: &str, rgb: Rgb) -> Result<()> {
        self.registry.enqueue_color(path, rgb)
    }

    /// Apply a manual color override to one device: stop its cycle if one
    /// is running, then enqueue the override.
    ///
    /// The two steps are sequenced, not atomic. A triple the generator
    /// emitted before it observed the disable may still be queued ahead,
    /// but the override is enqueued after it and wins. No reset color is
    /// interposed; the stopped-cycle white reset belongs to
    /// [`set_cycling`](Self::set_cycling) alone.
    pub fn apply_color(&self, path: &str, spec: &str) -> Result<()> {
        let rgb = self.colors.resolve(spec)?;
        self.registry.end_cycling(path)?;
        self.registry.enqueue_color(path, rgb)
    }

    /// Apply a color override to every registered device.
    pub fn apply_color_all(&self, spec: &str) -> Result<()> {
        let rgb = self.colors.resolve(spec)?;
        for path in self.registry.paths() {
            self.registry.end_cycling(&path)?;
            self.registry.enqueue_color(&path, rgb)?;
        }
        Ok(())
    }

    /// Enable or disable the color cycle for one device.
    ///
    /// Enabling spawns a generator unless one is already running or the
    /// device is disconnected. Disabling clears the shared flag, which
    /// the generator observes within one step delay, and enqueues a
    /// single reset-to-white; a repeat disable does nothing.
    pub fn set_cycling(&self, path: &str, enabled: bool) -> Result<()> {
        if enabled {
            if let Some(flag) = self.registry.begin_cycling(path)? {
                let handle = cycle::spawn_generator(
                    Arc::clone(&self.registry),
                    path.to_string(),
                    flag,
                    self.timing.cycle_step,
                );
                self.registry.store_cycle_task(path, handle);
            }
        } else if self.registry.end_cycling(path)? {
            self.registry.enqueue_color(path, Rgb::WHITE)?;
        }
        Ok(())
    }

    /// Enable or disable the color cycle on every registered device.
    pub fn set_cycling_all(&self, enabled: bool) {
        for path in self.registry.paths() {
            if let Err(e) = self.set_cycling(&path, enabled) {
                warn!(path = %path, error = %e, "Cycle toggle failed");
            }
        }
    }

    /// Status snapshot of every registered device.
    pub fn statuses(&self) -> Vec<DeviceStatus> {
        self.registry.statuses()
    }

    /// Stop every background task and join it, then turn all lights off
    /// and close the handles. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        info!("Shutting down");
        for handle in self.registry.stop_all_cycling() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cycle generator failed");
            }
        }
        if let Some(task) = self.heartbeat.take() {
            task.stop_and_join().await;
        }
        if let Some(task) = self.dispatcher.take() {
            task.stop_and_join().await;
        }
        self.registry.disconnect_all();
    }

    /// Let queued commands reach the wire: sleeps a couple of dispatch
    /// ticks. Convenience for one-shot callers that enqueue and exit.
    pub async fn settle(&self) {
        tokio::time::sleep(self.timing.tick * 2 + Duration::from_millis(10)).await;
    }
}

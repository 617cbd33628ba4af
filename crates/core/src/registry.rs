//! Device registry: the single owner of per-device runtime state.
//!
//! One entry per physical device path holds the open transport, lifecycle
//! state, cycling flag, command queue, and generator task handle together,
//! so connection state and queue state can never disagree about which
//! devices exist.

use crate::color::Rgb;
use crate::device::{BusylightModel, DiscoveredDevice};
use crate::error::{Error, Result};
use crate::queue::CommandQueue;
use crate::report;
use crate::transport::{HidLightTransport, LightTransport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle state of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Open handle held; queued commands are delivered.
    Connected,
    /// Handle closed after a failed write or teardown; queued commands
    /// are dropped until an external rediscovery reattaches the path.
    Disconnected,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Everything tracked for one device path.
struct DeviceEntry {
    info: DiscoveredDevice,
    transport: Option<Arc<dyn LightTransport>>,
    state: DeviceState,
    cycling: Arc<AtomicBool>,
    queue: Arc<CommandQueue>,
    cycle_task: Option<JoinHandle<()>>,
    last_color: Option<Rgb>,
}

/// Externally visible snapshot of one device.
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub path: String,
    pub model: BusylightModel,
    pub serial: Option<String>,
    pub state: DeviceState,
    pub cycling: bool,
    pub last_color: Option<Rgb>,
}

/// What the dispatcher needs to drain one device.
pub(crate) struct DispatchTarget {
    pub path: String,
    pub queue: Arc<CommandQueue>,
    pub transport: Arc<dyn LightTransport>,
}

/// Registry of all known devices, keyed by platform device path.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, DeviceEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the device and register it. Idempotent per path: if the path
    /// already has an open handle nothing is opened and `Ok(false)` is
    /// returned. A previously disconnected path is reattached with a
    /// fresh handle.
    pub fn connect(&self, discovered: &DiscoveredDevice) -> Result<bool> {
        if self.state(&discovered.path) == Some(DeviceState::Connected) {
            debug!(path = %discovered.path, "already connected, keeping existing handle");
            return Ok(false);
        }
        let api = hidapi::HidApi::new().map_err(|e| Error::Connection {
            path: discovered.path.clone(),
            reason: e.to_string(),
        })?;
        let transport = HidLightTransport::open(&api, &discovered.path)?;
        Ok(self.attach(discovered.clone(), Arc::new(transport)))
    }

    /// Register an already-open transport for a device.
    ///
    /// This is the seam `connect` goes through; tests and simulators can
    /// attach any `LightTransport` the same way. Returns whether a new
    /// entry was installed.
    pub fn attach(&self, info: DiscoveredDevice, transport: Arc<dyn LightTransport>) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&info.path) {
            Some(entry) if entry.state == DeviceState::Connected => {
                debug!(path = %info.path, "already connected, keeping existing handle");
                false
            }
            _ => {
                info!(model = %info.model, path = %info.path, "Device connected");
                let path = info.path.clone();
                entries.insert(
                    path,
                    DeviceEntry {
                        info,
                        transport: Some(transport),
                        state: DeviceState::Connected,
                        cycling: Arc::new(AtomicBool::new(false)),
                        queue: Arc::new(CommandQueue::new()),
                        cycle_task: None,
                        last_color: None,
                    },
                );
                true
            }
        }
    }

    /// Enqueue a color command for one device.
    ///
    /// Accepted even when the device is disconnected; the command is then
    /// dropped instead of buffered, since nothing will ever drain it.
    pub fn enqueue_color(&self, path: &str, rgb: Rgb) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| Error::DeviceNotFound(path.to_string()))?;
        match entry.state {
            DeviceState::Connected => {
                entry.last_color = Some(rgb);
                entry.queue.push(report::encode(rgb));
                Ok(())
            }
            DeviceState::Disconnected => {
                debug!(path = %path, color = %rgb, "Dropping command for disconnected device");
                Ok(())
            }
        }
    }

    /// Transition a device to Disconnected after a failed write: close the
    /// handle, clear its cycling flag, and drop its queued commands.
    pub fn mark_disconnected(&self, path: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(path) {
            if entry.state == DeviceState::Connected {
                warn!(path = %path, "Device disconnected");
            }
            entry.state = DeviceState::Disconnected;
            entry.cycling.store(false, Ordering::SeqCst);
            entry.transport = None;
            entry.queue.clear();
        }
    }

    /// Mark a device as cycling, returning the flag to hand to a new
    /// generator task. `Ok(None)` means no task should be spawned: the
    /// device is already cycling, or it is disconnected.
    ///
    /// Every enable installs a fresh flag. A disable the previous
    /// generator has not observed yet must not be revived by a quick
    /// re-enable, so the old task only ever sees its own flag go false.
    pub(crate) fn begin_cycling(&self, path: &str) -> Result<Option<Arc<AtomicBool>>> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| Error::DeviceNotFound(path.to_string()))?;
        if entry.state != DeviceState::Connected {
            debug!(path = %path, "Ignoring cycle enable for disconnected device");
            return Ok(None);
        }
        if entry.cycling.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let flag = Arc::new(AtomicBool::new(true));
        entry.cycling = Arc::clone(&flag);
        Ok(Some(flag))
    }

    /// Clear the cycling flag for a device. Returns whether it was set,
    /// i.e. whether this call is the enabled-to-disabled transition.
    pub(crate) fn end_cycling(&self, path: &str) -> Result<bool> {
        let entries = self.entries.lock().unwrap();
        let entry = entries
            .get(path)
            .ok_or_else(|| Error::DeviceNotFound(path.to_string()))?;
        Ok(entry.cycling.swap(false, Ordering::SeqCst))
    }

    /// Keep the generator task handle so shutdown can join it.
    pub(crate) fn store_cycle_task(&self, path: &str, handle: JoinHandle<()>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(path) {
            entry.cycle_task = Some(handle);
        }
    }

    /// Clear every cycling flag and take all generator task handles for
    /// joining. No reset color is enqueued; callers that want the
    /// stopped-cycle white reset use the per-device path.
    pub(crate) fn stop_all_cycling(&self) -> Vec<JoinHandle<()>> {
        let mut entries = self.entries.lock().unwrap();
        let mut handles = Vec::new();
        for entry in entries.values_mut() {
            entry.cycling.store(false, Ordering::SeqCst);
            if let Some(handle) = entry.cycle_task.take() {
                handles.push(handle);
            }
        }
        handles
    }

    /// Snapshot of every device the dispatcher can currently write to,
    /// sorted by path for stable ordering.
    pub(crate) fn dispatch_targets(&self) -> Vec<DispatchTarget> {
        let entries = self.entries.lock().unwrap();
        let mut targets: Vec<DispatchTarget> = entries
            .iter()
            .filter_map(|(path, entry)| {
                let transport = entry.transport.clone()?;
                Some(DispatchTarget {
                    path: path.clone(),
                    queue: Arc::clone(&entry.queue),
                    transport,
                })
            })
            .collect();
        targets.sort_by(|a, b| a.path.cmp(&b.path));
        targets
    }

    /// Queues of every connected device, sorted by path.
    pub(crate) fn connected_queues(&self) -> Vec<(String, Arc<CommandQueue>)> {
        let entries = self.entries.lock().unwrap();
        let mut queues: Vec<(String, Arc<CommandQueue>)> = entries
            .iter()
            .filter(|(_, entry)| entry.state == DeviceState::Connected)
            .map(|(path, entry)| (path.clone(), Arc::clone(&entry.queue)))
            .collect();
        queues.sort_by(|a, b| a.0.cmp(&b.0));
        queues
    }

    /// Best-effort teardown: turn every connected device off, close every
    /// handle, and drop all queued commands. Intended for shutdown after
    /// the dispatcher has stopped; safe to call repeatedly and after
    /// individual devices have already failed.
    pub fn disconnect_all(&self) {
        let mut entries = self.entries.lock().unwrap();
        for (path, entry) in entries.iter_mut() {
            entry.cycling.store(false, Ordering::SeqCst);
            entry.queue.clear();
            if let Some(transport) = entry.transport.take() {
                if let Err(e) = transport.write_packet(&report::OFF) {
                    warn!(path = %path, error = %e, "Off command during teardown failed");
                }
                entry.state = DeviceState::Disconnected;
                info!(path = %path, "Device closed");
            }
        }
    }

    pub fn state(&self, path: &str) -> Option<DeviceState> {
        self.entries.lock().unwrap().get(path).map(|e| e.state)
    }

    pub fn is_connected(&self, path: &str) -> bool {
        self.state(path) == Some(DeviceState::Connected)
    }

    pub fn connected_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.state == DeviceState::Connected)
            .count()
    }

    /// All registered device paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        paths.sort_unstable();
        paths
    }

    /// Status snapshot of every registered device, sorted by path.
    pub fn statuses(&self) -> Vec<DeviceStatus> {
        let entries = self.entries.lock().unwrap();
        let mut statuses: Vec<DeviceStatus> = entries
            .values()
            .map(|entry| DeviceStatus {
                path: entry.info.path.clone(),
                model: entry.info.model,
                serial: entry.info.serial.clone(),
                state: entry.state,
                cycling: entry.cycling.load(Ordering::SeqCst),
                last_color: entry.last_color,
            })
            .collect();
        statuses.sort_by(|a, b| a.path.cmp(&b.path));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BusylightModel;
    use crate::transport::mock::MockTransport;
    use crate::PLENOM_VID;

    fn test_device(path: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            model: BusylightModel::Omega,
            vid: PLENOM_VID,
            pid: BusylightModel::Omega.pid(),
            path: path.to_string(),
            serial: None,
        }
    }

    fn attach_mock(registry: &Registry, path: &str) -> Arc<MockTransport> {
        let mock = Arc::new(MockTransport::new(path));
        assert!(registry.attach(test_device(path), mock.clone()));
        mock
    }

    #[test]
    fn attach_is_idempotent_per_path() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        let second = Arc::new(MockTransport::new("dev-0"));
        assert!(!registry.attach(test_device("dev-0"), second));
        assert_eq!(registry.statuses().len(), 1);
        assert_eq!(registry.connected_count(), 1);
    }

    #[test]
    fn reattach_after_disconnect_installs_fresh_handle() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        registry.mark_disconnected("dev-0");
        assert!(!registry.is_connected("dev-0"));

        let fresh = Arc::new(MockTransport::new("dev-0"));
        assert!(registry.attach(test_device("dev-0"), fresh.clone()));
        assert!(registry.is_connected("dev-0"));

        registry.enqueue_color("dev-0", Rgb::new(5, 5, 5)).unwrap();
        for target in registry.dispatch_targets() {
            for packet in target.queue.drain() {
                target.transport.write_packet(&packet).unwrap();
            }
        }
        assert_eq!(fresh.write_count(), 1);
    }

    #[test]
    fn enqueue_unknown_path_is_an_error() {
        let registry = Registry::new();
        assert!(matches!(
            registry.enqueue_color("nope", Rgb::WHITE),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn enqueue_to_disconnected_is_accepted_and_dropped() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        let queue = Arc::clone(&registry.dispatch_targets()[0].queue);

        registry.mark_disconnected("dev-0");
        registry.enqueue_color("dev-0", Rgb::WHITE).unwrap();

        assert!(queue.is_empty());
        assert!(registry.dispatch_targets().is_empty());
    }

    #[test]
    fn mark_disconnected_clears_queue_and_cycling() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        registry.enqueue_color("dev-0", Rgb::WHITE).unwrap();
        let flag = registry.begin_cycling("dev-0").unwrap().unwrap();
        assert!(flag.load(Ordering::SeqCst));

        let queue = Arc::clone(&registry.dispatch_targets()[0].queue);
        registry.mark_disconnected("dev-0");

        assert!(!flag.load(Ordering::SeqCst));
        assert!(queue.is_empty());
        let statuses = registry.statuses();
        assert_eq!(statuses[0].state, DeviceState::Disconnected);
        assert!(!statuses[0].cycling);
    }

    #[test]
    fn begin_cycling_only_first_call_spawns() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        assert!(registry.begin_cycling("dev-0").unwrap().is_some());
        assert!(registry.begin_cycling("dev-0").unwrap().is_none());
    }

    #[test]
    fn begin_cycling_on_disconnected_is_ignored() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        registry.mark_disconnected("dev-0");
        assert!(registry.begin_cycling("dev-0").unwrap().is_none());
        assert!(!registry.statuses()[0].cycling);
    }

    #[test]
    fn reenable_hands_out_a_fresh_flag() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        let first = registry.begin_cycling("dev-0").unwrap().unwrap();
        registry.end_cycling("dev-0").unwrap();
        let second = registry.begin_cycling("dev-0").unwrap().unwrap();

        // The retired flag stays false for the task still holding it.
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));

        registry.end_cycling("dev-0").unwrap();
        assert!(!second.load(Ordering::SeqCst));
        assert!(!first.load(Ordering::SeqCst));
    }

    #[test]
    fn end_cycling_reports_the_transition() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-0");
        registry.begin_cycling("dev-0").unwrap().unwrap();
        assert!(registry.end_cycling("dev-0").unwrap());
        assert!(!registry.end_cycling("dev-0").unwrap());
    }

    #[test]
    fn disconnect_all_sends_off_best_effort() {
        let registry = Registry::new();
        let healthy = attach_mock(&registry, "dev-0");
        let broken = attach_mock(&registry, "dev-1");
        broken.fail_now();

        registry.disconnect_all();

        assert_eq!(healthy.writes(), vec![report::OFF]);
        assert_eq!(broken.write_count(), 0);
        assert_eq!(registry.connected_count(), 0);

        // Safe to call again once everything is already closed.
        registry.disconnect_all();
        assert_eq!(healthy.write_count(), 1);
    }

    #[test]
    fn statuses_are_sorted_and_track_last_color() {
        let registry = Registry::new();
        attach_mock(&registry, "dev-b");
        attach_mock(&registry, "dev-a");
        registry.enqueue_color("dev-b", Rgb::new(1, 2, 3)).unwrap();

        let statuses = registry.statuses();
        assert_eq!(statuses[0].path, "dev-a");
        assert_eq!(statuses[1].path, "dev-b");
        assert_eq!(statuses[0].last_color, None);
        assert_eq!(statuses[1].last_color, Some(Rgb::new(1, 2, 3)));
    }
}

//! Device model: busylight identification and discovery.

use crate::error::{Error, Result};
use crate::{pids, PLENOM_VID};
use std::fmt;
use tracing::{debug, info};

/// Busylight models, keyed by USB product ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusylightModel {
    Omega,
    Alpha,
    /// A product ID the caller chose to recognize without a known name.
    Other(u16),
}

impl BusylightModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Self {
        match pid {
            pids::BUSYLIGHT_OMEGA => Self::Omega,
            pids::BUSYLIGHT_ALPHA => Self::Alpha,
            other => Self::Other(other),
        }
    }

    /// USB product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::Omega => pids::BUSYLIGHT_OMEGA,
            Self::Alpha => pids::BUSYLIGHT_ALPHA,
            Self::Other(pid) => *pid,
        }
    }
}

impl fmt::Display for BusylightModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omega => write!(f, "Busylight Omega"),
            Self::Alpha => write!(f, "Busylight Alpha"),
            Self::Other(pid) => write!(f, "Busylight (PID 0x{pid:04X})"),
        }
    }
}

/// Product IDs recognized by default.
pub const RECOGNIZED_PIDS: &[u16] = &[pids::BUSYLIGHT_OMEGA, pids::BUSYLIGHT_ALPHA];

/// Information about a discovered busylight, prior to connection.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub model: BusylightModel,
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
}

/// Discover all attached busylights.
///
/// Enumerates USB HID devices and returns info for every device matching
/// the Plenom vendor ID and one of the given product IDs. Discovery only
/// enumerates; no device is opened.
pub fn discover_devices(product_ids: &[u16]) -> Result<Vec<DiscoveredDevice>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Discovery(e.to_string()))?;

    let mut devices = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != PLENOM_VID {
            continue;
        }
        if !product_ids.contains(&info.product_id()) {
            continue;
        }

        let model = BusylightModel::from_pid(info.product_id());
        info!(
            model = %model,
            vid = format_args!("0x{:04X}", info.vendor_id()),
            pid = format_args!("0x{:04X}", info.product_id()),
            path = %info.path().to_string_lossy(),
            "Found busylight"
        );
        devices.push(DiscoveredDevice {
            model,
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial: info.serial_number().map(|s| s.to_string()),
        });
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

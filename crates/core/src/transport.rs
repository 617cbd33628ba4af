//! Device write abstraction.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! mock devices share the same interface. Busylights are write-only: a
//! transport wraps one exclusively owned handle and pushes fixed-layout
//! output reports at it.

use crate::error::{Error, Result};
use crate::report::Packet;
use std::ffi::CString;
use std::sync::Mutex;
use tracing::trace;

/// Abstraction over a single open busylight.
///
/// The registry keeps exactly one transport per device path; dropping the
/// last reference closes the underlying handle.
pub trait LightTransport: Send + Sync {
    /// Write one encoded command to the device.
    fn write_packet(&self, packet: &Packet) -> Result<()>;
}

/// `hidapi`-backed transport over one open device handle.
///
/// The handle is shared across tasks behind `Arc<dyn LightTransport>`,
/// and `hidapi` handles are not thread-safe on their own, so writes go
/// through a mutex.
pub struct HidLightTransport {
    path: String,
    device: Mutex<hidapi::HidDevice>,
}

impl HidLightTransport {
    /// Open the device at a platform path reported by enumeration.
    pub fn open(api: &hidapi::HidApi, path: &str) -> Result<Self> {
        let cpath = CString::new(path).map_err(|e| Error::Connection {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let device = api.open_path(&cpath).map_err(|e| Error::Connection {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_string(),
            device: Mutex::new(device),
        })
    }
}

impl LightTransport for HidLightTransport {
    fn write_packet(&self, packet: &Packet) -> Result<()> {
        let device = self.device.lock().unwrap();
        let written = device.write(packet.as_slice()).map_err(|e| Error::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        trace!(path = %self.path, written, "HID write");
        Ok(())
    }
}

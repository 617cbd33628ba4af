//! open-busylight-core: Busylight wire protocol, device registry, and
//! command dispatch.
//!
//! This crate provides the cross-platform core logic for driving Plenom
//! Kuando Busylight USB status lights via vendor-specific HID output
//! reports: discovery and connection lifecycle, per-device FIFO command
//! queues drained by a single dispatcher, a color-cycle generator, and
//! the keep-alive scheduler the device needs to stay lit.

pub mod color;
pub mod controller;
pub mod cycle;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod heartbeat;
pub mod queue;
pub mod registry;
pub mod report;
pub mod transport;

/// Plenom A/S USB Vendor ID.
pub const PLENOM_VID: u16 = 0x27BB;

/// Known Busylight product IDs.
pub mod pids {
    /// Busylight Omega.
    pub const BUSYLIGHT_OMEGA: u16 = 0x3BCF;
    /// Busylight Alpha.
    pub const BUSYLIGHT_ALPHA: u16 = 0x3BCE;
}

//! Error types for open-busylight-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID enumeration failed; no devices could be listed.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A device could not be opened for exclusive use.
    #[error("connection error on {path}: {reason}")]
    Connection { path: String, reason: String },

    /// A write through an open device handle failed.
    #[error("write error on {path}: {reason}")]
    Write { path: String, reason: String },

    /// Color rejected before encoding: out-of-range channel value,
    /// malformed literal, or unknown name.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// No registry entry exists for the given device path.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The external color/emotion table could not be read or parsed.
    #[error("color table error: {0}")]
    Table(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

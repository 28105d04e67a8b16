//! # Error Module
//!
//! This module provides the error types for the `rocket_station` crate.
//! It uses the `thiserror` crate for ergonomic error handling.

use thiserror::Error;

use crate::codec::DecodeError;

/// Result type alias for `rocket_station` operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// Main error type for the `rocket_station` crate.
#[derive(Debug, Error)]
pub enum StationError {
    /// Serial port operation failed.
    #[error("Serial port error: {0}")]
    SerialPort(String),

    /// Failed to open serial port.
    #[error("Failed to open serial port '{port_name}': {reason}")]
    PortOpen { port_name: String, reason: String },

    /// Failed to read from serial port.
    #[error("Failed to read from serial port: {0}")]
    PortRead(String),

    /// Failed to write to serial port.
    #[error("Failed to write to serial port: {0}")]
    PortWrite(String),

    /// No open serial connection.
    #[error("Not connected to a serial port")]
    NotConnected,

    /// Device command with out-of-range parameters.
    #[error("Command rejected: {0}")]
    CommandRejected(String),

    /// Telemetry frame decode error.
    #[error("Telemetry decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Export requested with no accumulated telemetry.
    #[error("No telemetry data to export")]
    NoData,

    /// Export serialization failed.
    #[error("Export error: {0}")]
    Export(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIo(#[from] std::io::Error),
}

impl StationError {
    /// Creates a new serial port error.
    #[must_use]
    pub fn serial_port(msg: impl Into<String>) -> Self {
        Self::SerialPort(msg.into())
    }

    /// Creates a new port open error.
    #[must_use]
    pub fn port_open(port_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortOpen {
            port_name: port_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new port read error.
    #[must_use]
    pub fn port_read(msg: impl Into<String>) -> Self {
        Self::PortRead(msg.into())
    }

    /// Creates a new port write error.
    #[must_use]
    pub fn port_write(msg: impl Into<String>) -> Self {
        Self::PortWrite(msg.into())
    }

    /// Creates a new command rejection error.
    #[must_use]
    pub fn command_rejected(msg: impl Into<String>) -> Self {
        Self::CommandRejected(msg.into())
    }

    /// Creates a new export error.
    #[must_use]
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

//! Serial port configuration.

use tokio::time::Duration;
pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Baud rates offered by the connection dialog.
pub const COMMON_BAUD_RATES: &[u32] = &[
    4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 576000, 921600, 1000000,
    1500000, 2000000,
];

/// Baud rate the flight computer ships with.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial port settings. Defaults to 8N1 with no flow control, which is what
/// the flight computer's USB bridge expects.
#[derive(Clone, Debug)]
pub struct PortSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl PortSettings {
    /// Settings for the named port at the given baud rate, 8N1.
    #[must_use]
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            timeout: Duration::from_micros(500),
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_BAUD_RATE)
    }
}

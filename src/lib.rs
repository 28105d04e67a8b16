//! # Rocket Station
//!
//! Ground-station telemetry core for a hobby rocket. The flight computer
//! streams newline-delimited text frames over a serial/USB link; this crate
//! owns that stream end to end and leaves only rendering to the dashboard.
//!
//! ## Architecture
//!
//! The project is organized into the following modules:
//!
//! - [`codec`]: Pure frame reassembly, classification and decoding
//! - [`session`]: Serial transport ownership, read loop and command writes
//! - [`flight`]: Launch/landing detection and derived flight state
//! - [`announce`]: Serialized, deduplicated voice announcements
//! - [`history`]: Append-only session history with CSV/JSON export
//! - [`station`]: The facade owning all of the above
//! - [`error`]: Custom error types for the crate
//!
//! The speech engine and the notification sink are injected capabilities, so
//! the core carries no platform UI dependency and tests run against fakes.

pub mod announce;
pub mod codec;
pub mod error;
pub mod flight;
pub mod history;
pub mod session;
pub mod station;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::announce::{Announcer, SpeakError, SpeakFuture, Speaker};
    pub use crate::codec::{Frame, FrameBuffer, Schema, StatusFlags, TelemetryRecord, classify};
    pub use crate::error::{Result, StationError};
    pub use crate::flight::{FlightPhase, FlightTracker};
    pub use crate::history::{FlightEvent, FlightEventKind, History, TextEvent};
    pub use crate::session::{
        ConnectionState, PortSettings, Session, SessionEvent, available_ports,
    };
    pub use crate::station::{LogNotifier, Notifier, Station};
}

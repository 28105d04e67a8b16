//! # Frame Codec Module
//!
//! Pure parsing and formatting for the rocket's wire protocol. The device
//! sends newline-delimited text frames over the serial link; each frame is
//! either a comma-separated telemetry record or a free-text flight log line.
//! Nothing in this module performs I/O or holds session state beyond the
//! carry buffer used for frame reassembly.

pub mod frame;
pub mod record;
pub mod status;

pub use frame::{Frame, FrameBuffer, classify};
pub use record::{DecodeError, MotionSample, Schema, TelemetryRecord};
pub use status::StatusFlags;

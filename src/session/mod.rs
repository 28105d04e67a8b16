//! # Transport Session Module
//!
//! Owns the open serial connection. The session acquires the port, splits it
//! into a read half (moved into a spawned reader task) and a write half (kept
//! for the command path), and reports everything the reader sees as
//! [`SessionEvent`]s on a channel. Only one session owns a port at a time;
//! closing it invalidates all derived state until a new connection is made.

pub mod settings;

use std::fmt;

use log::{error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::codec::FrameBuffer;
use crate::error::{Result, StationError};
pub use settings::{COMMON_BAUD_RATES, DEFAULT_BAUD_RATE, PortSettings};

/// Most times a single command may be repeated on the wire.
pub const MAX_COMMAND_REPEAT: u32 = 50;

/// Capacity of the reader-to-consumer event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Read buffer size for one chunk off the wire.
const READ_CHUNK_BYTES: usize = 1024;

/// Connection status as shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No port open. A fresh `open` is required.
    #[default]
    Disconnected,
    /// Port open in progress, reader not yet running.
    Connecting,
    /// Reader running, frames flowing.
    Connected,
    /// The port failed; a fresh `open` is required. No automatic reconnect.
    Error,
}

impl ConnectionState {
    /// Is the session delivering frames.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Is the session down without a fault.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Did the session fail.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionState::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// What the reader task saw on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One complete frame, line terminator stripped.
    Line(String),
    /// Clean end of stream. Terminal.
    Closed,
    /// I/O failure on the read path. Terminal.
    Failed(String),
}

/// An open serial connection: exclusive owner of the port handle.
pub struct Session {
    port_name: String,
    writer: Option<WriteHalf<SerialStream>>,
    reader_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Opens the port and spawns the reader task.
    ///
    /// Returns the session plus the event channel the reader feeds. An open
    /// failure is reported as an error and leaves nothing to clean up; the
    /// caller may retry with fresh settings.
    pub async fn open(settings: PortSettings) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let stream = tokio_serial::new(&settings.port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(settings.flow_control)
            .timeout(settings.timeout)
            .open_native_async()
            .map_err(|e| StationError::port_open(&settings.port_name, e.to_string()))?;
        info!("opened serial port {}", settings.port_name);

        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader_task = tokio::spawn(read_loop(read_half, tx));

        Ok((
            Self {
                port_name: settings.port_name,
                writer: Some(write_half),
                reader_task: Some(reader_task),
            },
            rx,
        ))
    }

    /// Writes `command` + newline `repeat` times, waiting `interval_ms`
    /// between writes but not after the last.
    ///
    /// Each call completes its full repeat sequence before returning;
    /// concurrent calls are not serialized against each other.
    pub async fn write_command(
        &mut self,
        command: &str,
        repeat: u32,
        interval_ms: u64,
    ) -> Result<()> {
        check_command_params(repeat, interval_ms)?;
        let writer = self.writer.as_mut().ok_or(StationError::NotConnected)?;
        write_repeated(writer, command, repeat, interval_ms).await
    }

    /// Manual parachute deployment: the command is repeated so a single
    /// corrupted frame on a marginal link cannot swallow it.
    pub async fn emergency_deploy(&mut self) -> Result<()> {
        warn!("sending emergency deploy");
        self.write_command("DEPLOY", 5, 100).await
    }

    /// Cancels the reader and releases the port. Idempotent; also runs on
    /// drop so the port is released on every exit path.
    pub fn close(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if self.writer.take().is_some() {
            info!("closed serial port {}", self.port_name);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Enumerates serial ports present on the host.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| StationError::serial_port(e.to_string()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn check_command_params(repeat: u32, interval_ms: u64) -> Result<()> {
    if !(1..=MAX_COMMAND_REPEAT).contains(&repeat) {
        return Err(StationError::command_rejected(format!(
            "repeat count {repeat} outside 1..={MAX_COMMAND_REPEAT}"
        )));
    }
    if interval_ms == 0 {
        return Err(StationError::command_rejected(
            "interval must be at least 1 ms".to_string(),
        ));
    }
    Ok(())
}

async fn write_repeated<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &str,
    repeat: u32,
    interval_ms: u64,
) -> Result<()> {
    let line = format!("{command}\n");
    for i in 0..repeat {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StationError::port_write(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| StationError::port_write(e.to_string()))?;
        if i + 1 < repeat {
            sleep(Duration::from_millis(interval_ms)).await;
        }
    }
    Ok(())
}

/// Reader task: pulls raw chunks, reassembles frames, reports events.
/// Always ends with a terminal event; it never silently stops.
async fn read_loop(mut reader: ReadHalf<SerialStream>, tx: mpsc::Sender<SessionEvent>) {
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    let mut frames = FrameBuffer::new();
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                info!("serial stream ended");
                let _ = tx.send(SessionEvent::Closed).await;
                return;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&chunk[..n]);
                for line in frames.push(&text) {
                    if tx.send(SessionEvent::Line(line)).await.is_err() {
                        // Consumer gone; nothing left to report to.
                        return;
                    }
                }
            }
            Err(e) => {
                error!("serial read failed: {e}");
                let _ = tx.send(SessionEvent::Failed(e.to_string())).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Disconnected.is_disconnected());
        assert!(ConnectionState::Error.is_error());
        assert!(!ConnectionState::Connecting.is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Error.to_string(), "error");
    }

    #[test]
    fn test_command_params_validation() {
        assert!(check_command_params(1, 1).is_ok());
        assert!(check_command_params(MAX_COMMAND_REPEAT, 100).is_ok());
        assert!(matches!(
            check_command_params(0, 100),
            Err(StationError::CommandRejected(_))
        ));
        assert!(matches!(
            check_command_params(MAX_COMMAND_REPEAT + 1, 100),
            Err(StationError::CommandRejected(_))
        ));
        assert!(matches!(
            check_command_params(3, 0),
            Err(StationError::CommandRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_write_repeated_writes_each_command() {
        let mut sink = Vec::new();
        write_repeated(&mut sink, "DEPLOY", 5, 1).await.unwrap();
        let written = String::from_utf8(sink).unwrap();
        assert_eq!(written, "DEPLOY\n".repeat(5));
    }

    #[tokio::test]
    async fn test_write_repeated_single_shot_has_no_delay() {
        let mut sink = Vec::new();
        let started = std::time::Instant::now();
        write_repeated(&mut sink, "PING", 1, 10_000).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(sink, b"PING\n");
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = Session::open(PortSettings::new(
            "/dev/nonexistent-rocket-port",
            DEFAULT_BAUD_RATE,
        ))
        .await;
        assert!(matches!(result, Err(StationError::PortOpen { .. })));
    }
}

//! # Station Module
//!
//! The ground station's single source of truth. One `Station` owns the
//! flight tracker, the session history, the announcement queue and the
//! connection status, and is mutated only by the frame-processing step and
//! the explicit clear/reset operations. Presentation layers read snapshots
//! through the accessor methods and never touch the subsystems directly.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use log::{info, warn};
use regex::Regex;
use tokio::sync::mpsc;

use crate::announce::{Announcer, EventLatches, Speaker};
use crate::codec::{Frame, Schema, TelemetryRecord, classify};
use crate::error::{Result, StationError};
use crate::flight::{FlightPhase, FlightTracker};
use crate::history::{FlightEvent, FlightEventKind, History, TextEvent};
use crate::session::{ConnectionState, PortSettings, Session, SessionEvent};

#[cfg(test)]
use mockall::automock;

/// No max-altitude report is spoken for hops below this apex (meters).
const MAX_ALTITUDE_ANNOUNCE_FLOOR_M: f64 = 10.0;

/// Fraction of the apex the rocket must descend below before the
/// max-altitude report fires.
const DESCENT_ANNOUNCE_RATIO: f64 = 0.8;

/// First number in an apogee flight log line, e.g.
/// `DEPLOY:AUTO: Apogee detected at 132.5m`.
static APOGEE_ALTITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("altitude pattern is valid"));

/// User-visible status sink; the dashboard renders these as toasts.
#[cfg_attr(test, automock)]
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink that forwards notifications to the log facade.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// The ground-station core: telemetry pipeline, state, and command surface.
pub struct Station {
    schema: Schema,
    state: ConnectionState,
    session: Option<Session>,
    tracker: FlightTracker,
    history: History,
    announcer: Announcer,
    latches: EventLatches,
    notifier: Arc<dyn Notifier>,
    latest: Option<TelemetryRecord>,
    dropped_frames: u64,
}

impl Station {
    /// A station with no speech engine and log-backed notifications.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self::with_collaborators(schema, None, Arc::new(LogNotifier))
    }

    /// A station with injected collaborators. Must be called inside a Tokio
    /// runtime when a speaker is present (the announcement drain task is
    /// spawned here).
    #[must_use]
    pub fn with_collaborators(
        schema: Schema,
        speaker: Option<Arc<dyn Speaker>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            schema,
            state: ConnectionState::Disconnected,
            session: None,
            tracker: FlightTracker::new(),
            history: History::new(),
            announcer: Announcer::new(speaker),
            latches: EventLatches::default(),
            notifier,
            latest: None,
            dropped_frames: 0,
        }
    }

    /// Opens a session on the given port. Any previous session is closed
    /// first; on failure the state is `Error` and the caller may retry.
    pub async fn connect(
        &mut self,
        settings: PortSettings,
    ) -> Result<mpsc::Receiver<SessionEvent>> {
        self.close_session();
        self.state = ConnectionState::Connecting;
        match Session::open(settings).await {
            Ok((session, events)) => {
                self.session = Some(session);
                self.state = ConnectionState::Connected;
                self.notifier.success("Serial port connected successfully!");
                Ok(events)
            }
            Err(e) => {
                self.state = ConnectionState::Error;
                self.notifier
                    .error(&format!("Failed to establish connection: {e}"));
                self.announcer.enqueue("Connection failed");
                Err(e)
            }
        }
    }

    /// Closes the session and announces the disconnect.
    pub fn disconnect(&mut self) {
        if self.close_session() {
            self.state = ConnectionState::Disconnected;
            self.announcer.enqueue("Serial port disconnected");
            self.notifier.success("Disconnected successfully");
        }
    }

    fn close_session(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Feeds session events until the reader reports a terminal one.
    pub async fn pump(&mut self, events: &mut mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let terminal = matches!(event, SessionEvent::Closed | SessionEvent::Failed(_));
            self.handle_event(event);
            if terminal {
                break;
            }
        }
    }

    /// Applies one session event to the station state.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Line(line) => self.process_line(&line),
            SessionEvent::Closed => {
                self.close_session();
                self.state = ConnectionState::Disconnected;
                self.notifier.info("Serial stream ended");
            }
            SessionEvent::Failed(reason) => {
                self.close_session();
                self.state = ConnectionState::Error;
                warn!("connection lost: {reason}");
                self.notifier.error("Connection lost. Please reconnect.");
                self.announcer.enqueue("Serial port disconnected");
            }
        }
    }

    /// Runs the synchronous per-frame pipeline on one complete line:
    /// classify, decode, flight-state update, announcements, history append.
    /// A frame that fails to decode is dropped and counted; processing
    /// continues with the next frame.
    pub fn process_line(&mut self, line: &str) {
        match classify(line) {
            Frame::Empty => {}
            Frame::Telemetry => {
                self.history.push_raw(line);
                match TelemetryRecord::decode(line, self.schema) {
                    Ok(record) => self.process_record(record),
                    Err(e) => {
                        self.dropped_frames += 1;
                        warn!("dropped undecodable frame ({e}): {line}");
                    }
                }
            }
            Frame::Text => {
                self.history.push_raw(line);
                self.process_text(line.trim());
            }
        }
    }

    fn process_record(&mut self, record: TelemetryRecord) {
        if let Some(phase) = self.tracker.update(&record) {
            info!("flight phase: {phase}");
            self.notifier.info(&format!("Flight phase: {phase}"));
        }

        // The parachute check must precede the max-altitude check so the
        // shared FIFO speaks them in causal order.
        let flags = record.flags(self.schema);
        if flags.parachute_deployed && self.latches.parachute_flag() {
            self.announcer.enqueue("Parachute deployed");
        }
        if record.max_altitude > MAX_ALTITUDE_ANNOUNCE_FLOOR_M
            && record.altitude < record.max_altitude * DESCENT_ANNOUNCE_RATIO
            && self.latches.max_altitude()
        {
            self.announcer
                .enqueue(format!("Maximum altitude {:.0} meters", record.max_altitude));
        }

        self.history.push_record(record.clone());
        self.latest = Some(record);
    }

    fn process_text(&mut self, text: &str) {
        self.notifier.info(&format!("Flight Event: {text}"));

        if let Some(current) = &self.latest {
            self.history.push_flight_event(FlightEvent {
                time: current.time,
                altitude: current.altitude,
                kind: FlightEventKind::classify(text),
                description: text.to_string(),
            });
        }

        let lower = text.to_lowercase();
        if lower.contains("apogee") && self.latches.apogee_text() {
            let altitude = APOGEE_ALTITUDE
                .captures(&lower)
                .and_then(|c| c.get(1))
                .map_or_else(|| "unknown".to_string(), |m| m.as_str().to_string());
            self.announcer
                .enqueue(format!("Apogee detected at {altitude} meters"));
        }
        if lower.contains("parachute") && lower.contains("deploy") && self.latches.parachute_text()
        {
            self.announcer.enqueue("Parachute deployed");
        }
        if lower.contains("servo") && lower.contains("done") && self.latches.servo_text() {
            self.announcer.enqueue("Servo action completed");
        }

        self.history.push_text(TextEvent::now(text));
    }

    /// Sends a device command through the open session.
    pub async fn send_command(
        &mut self,
        command: &str,
        repeat: u32,
        interval_ms: u64,
    ) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            self.notifier.error("No connection to rocket");
            return Err(StationError::NotConnected);
        };
        match session.write_command(command, repeat, interval_ms).await {
            Ok(()) => {
                self.notifier.success(&format!("Command '{command}' sent"));
                Ok(())
            }
            Err(e) => {
                self.notifier.error(&format!("Failed to send command: {e}"));
                Err(e)
            }
        }
    }

    /// Manual parachute deployment, recorded in the session history.
    pub async fn emergency_deploy(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            self.notifier.error("No connection to rocket");
            return Err(StationError::NotConnected);
        };
        match session.emergency_deploy().await {
            Ok(()) => {
                self.notifier.success("Emergency deploy command sent");
                let stamp = chrono::Local::now().format("%H:%M:%S");
                let message = format!("EMERGENCY DEPLOY COMMAND SENT ({stamp})");
                self.history.push_raw(&message);
                self.history.push_text(TextEvent::now(message));
                if let Some(current) = &self.latest {
                    self.history.push_flight_event(FlightEvent {
                        time: current.time,
                        altitude: current.altitude,
                        kind: FlightEventKind::EmergencyDeploy,
                        description: "Manual emergency parachute deploy".to_string(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                self.notifier.error("Failed to send emergency deploy command");
                Err(e)
            }
        }
    }

    /// Current connection status.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// The most recently decoded record.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.latest.as_ref()
    }

    /// The accumulated session history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Active wire schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Current mission phase.
    #[must_use]
    pub fn phase(&self) -> FlightPhase {
        self.tracker.phase()
    }

    /// Derived vertical speed in m/s.
    #[must_use]
    pub fn vertical_speed(&self) -> f64 {
        self.tracker.vertical_speed()
    }

    /// Elapsed flight time.
    #[must_use]
    pub fn flight_duration(&self) -> Duration {
        self.tracker.flight_duration()
    }

    /// Frames dropped because they failed to decode.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Clears accumulated telemetry and the latest record. Flight state and
    /// announcement latches are reset separately by [`Station::reset_flight`].
    pub fn clear_data(&mut self) {
        if self.history.records().is_empty() {
            self.notifier.error("No data to clear");
            return;
        }
        self.history.clear();
        self.latest = None;
        self.notifier.success("Telemetry data cleared");
    }

    /// Clears the raw line log.
    pub fn clear_raw(&mut self) {
        self.history.clear_raw();
    }

    /// Re-arms the flight tracker and announcement latches for a new flight
    /// and abandons any undrained announcements.
    pub fn reset_flight(&mut self) {
        self.tracker.reset();
        self.latches.reset();
        self.announcer.reset();
        info!("flight state reset");
    }

    /// Session history as CSV.
    pub fn export_csv(&self) -> Result<String> {
        match self.history.export_csv(self.schema) {
            Ok(text) => {
                self.notifier.success("Data exported as CSV");
                Ok(text)
            }
            Err(e) => {
                if matches!(e, StationError::NoData) {
                    self.notifier.error("No data to export");
                }
                Err(e)
            }
        }
    }

    /// Session history as JSON.
    pub fn export_json(&self) -> Result<String> {
        match self.history.export_json() {
            Ok(text) => {
                self.notifier.success("Data exported as JSON");
                Ok(text)
            }
            Err(e) => {
                if matches!(e, StationError::NoData) {
                    self.notifier.error("No data to export");
                }
                Err(e)
            }
        }
    }
}

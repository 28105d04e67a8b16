//! # History Module
//!
//! The accumulated, append-only record of one session: decoded telemetry,
//! text events, classified flight events, and the raw lines as they came off
//! the wire (kept even when a frame fails to decode, so the operator can
//! inspect what the device actually sent). Serializes to CSV and JSON on
//! demand.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::codec::{Schema, TelemetryRecord};
use crate::error::{Result, StationError};

/// A non-telemetry line from the device, stamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TextEvent {
    /// Stamps a text event with the current wall-clock time.
    #[must_use]
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Classification of a flight log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightEventKind {
    ApogeeDetected,
    ServoAction,
    ParachuteEvent,
    EmergencyDeploy,
    Message,
}

impl FlightEventKind {
    /// Classifies a flight log line by its content.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("apogee") {
            Self::ApogeeDetected
        } else if lower.contains("parachute") {
            Self::ParachuteEvent
        } else if lower.contains("servo") {
            Self::ServoAction
        } else {
            Self::Message
        }
    }

    /// Stable identifier used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApogeeDetected => "APOGEE_DETECTED",
            Self::ServoAction => "SERVO_ACTION",
            Self::ParachuteEvent => "PARACHUTE_EVENT",
            Self::EmergencyDeploy => "EMERGENCY_DEPLOY",
            Self::Message => "TEXT_MESSAGE",
        }
    }
}

/// A flight log line annotated with the telemetry context it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightEvent {
    /// Device time of the latest record when the event arrived, ms.
    pub time: u64,
    /// Altitude of the latest record when the event arrived, m.
    pub altitude: f64,
    pub kind: FlightEventKind,
    pub description: String,
}

/// JSON export envelope. Field names match the historic dashboard export so
/// downstream tooling keeps working.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    export_time: String,
    data_points: usize,
    max_altitude: f64,
    flight_duration: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    text_messages: Vec<&'a str>,
    telemetry_data: &'a [TelemetryRecord],
}

/// Append-only session history with CSV/JSON export.
#[derive(Debug, Default)]
pub struct History {
    records: Vec<TelemetryRecord>,
    text_events: Vec<TextEvent>,
    flight_events: Vec<FlightEvent>,
    raw_lines: Vec<String>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decoded record. O(1) amortized, arrival order preserved.
    pub fn push_record(&mut self, record: TelemetryRecord) {
        self.records.push(record);
    }

    /// Appends a text event.
    pub fn push_text(&mut self, event: TextEvent) {
        self.text_events.push(event);
    }

    /// Appends a classified flight event.
    pub fn push_flight_event(&mut self, event: FlightEvent) {
        debug!("flight event {}: {}", event.kind.as_str(), event.description);
        self.flight_events.push(event);
    }

    /// Appends one raw wire line, decoded or not.
    pub fn push_raw(&mut self, line: &str) {
        self.raw_lines.push(line.trim().to_string());
    }

    /// All decoded records in arrival order.
    #[must_use]
    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    /// All text events in arrival order.
    #[must_use]
    pub fn text_events(&self) -> &[TextEvent] {
        &self.text_events
    }

    /// All classified flight events in arrival order.
    #[must_use]
    pub fn flight_events(&self) -> &[FlightEvent] {
        &self.flight_events
    }

    /// Every line received this session, in arrival order.
    #[must_use]
    pub fn raw_lines(&self) -> &[String] {
        &self.raw_lines
    }

    /// Maximum of the device-reported running maxima, zero with no records.
    #[must_use]
    pub fn max_altitude(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.max_altitude)
            .fold(0.0, f64::max)
    }

    /// Empties records, text events and flight events. Raw lines are cleared
    /// separately; the flight tracker and announcement latches are reset by
    /// their own operations.
    pub fn clear(&mut self) {
        self.records.clear();
        self.text_events.clear();
        self.flight_events.clear();
    }

    /// Empties the raw line log and the text events derived from it.
    pub fn clear_raw(&mut self) {
        self.raw_lines.clear();
        self.text_events.clear();
    }

    /// Serializes the session to CSV: a header row in wire order, one row
    /// per record, then a blank line and an `index,timestamp,text` table of
    /// text events when any exist.
    pub fn export_csv(&self, schema: Schema) -> Result<String> {
        if self.records.is_empty() {
            return Err(StationError::NoData);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(schema.csv_header())
            .map_err(|e| StationError::export(e.to_string()))?;
        for record in &self.records {
            writer
                .write_record(record.to_csv_row())
                .map_err(|e| StationError::export(e.to_string()))?;
        }
        let mut out = finish_csv(writer)?;

        if !self.text_events.is_empty() {
            out.push('\n');
            let mut events = csv::Writer::from_writer(Vec::new());
            events
                .write_record(["index", "timestamp", "text"])
                .map_err(|e| StationError::export(e.to_string()))?;
            for (index, event) in self.text_events.iter().enumerate() {
                events
                    .write_record([
                        index.to_string(),
                        event.timestamp.format("%Y-%m-%d %H:%M:%S.%3f").to_string(),
                        event.text.clone(),
                    ])
                    .map_err(|e| StationError::export(e.to_string()))?;
            }
            out.push_str(&finish_csv(events)?);
        }
        Ok(out)
    }

    /// Serializes the session to the JSON export envelope.
    pub fn export_json(&self) -> Result<String> {
        if self.records.is_empty() {
            return Err(StationError::NoData);
        }

        let export = JsonExport {
            export_time: Utc::now().to_rfc3339(),
            data_points: self.records.len(),
            max_altitude: self.max_altitude(),
            // Device time of the last record, matching the historic export.
            flight_duration: self.records.last().map(|r| r.time).unwrap_or(0),
            text_messages: self.text_events.iter().map(|e| e.text.as_str()).collect(),
            telemetry_data: &self.records,
        };
        serde_json::to_string_pretty(&export).map_err(|e| StationError::export(e.to_string()))
    }
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| StationError::export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StationError::export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: u64, altitude: f64, max_altitude: f64) -> TelemetryRecord {
        let line = format!("{time},{altitude},{max_altitude},21.0,3.9,0.1,0,0,0,0");
        TelemetryRecord::decode(&line, Schema::Attitude10).unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let mut history = History::new();
        history.push_record(record(1000, 1.0, 1.0));
        history.push_record(record(2000, 2.0, 2.0));
        assert_eq!(history.records().len(), 2);
        assert_eq!(history.records()[0].time, 1000);
        assert_eq!(history.records()[1].time, 2000);
    }

    #[test]
    fn test_export_csv_empty_is_no_data() {
        let history = History::new();
        assert!(matches!(
            history.export_csv(Schema::Attitude10),
            Err(StationError::NoData)
        ));
    }

    #[test]
    fn test_export_json_empty_is_no_data() {
        let history = History::new();
        assert!(matches!(history.export_json(), Err(StationError::NoData)));
    }

    #[test]
    fn test_export_csv_shape() {
        let mut history = History::new();
        history.push_record(record(1000, 12.5, 12.5));
        history.push_record(record(2000, 14.0, 14.0));
        let csv = history.export_csv(Schema::Attitude10).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time,altitude,maxAltitude,temperature,voltage,accelY,angleX,angleY,angleZ,statusFlags"
        );
        assert!(lines.next().unwrap().starts_with("1000,12.5,"));
        assert!(lines.next().unwrap().starts_with("2000,14,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_csv_with_text_events() {
        let mut history = History::new();
        history.push_record(record(1000, 12.5, 12.5));
        history.push_text(TextEvent::now("SYSTEM: READY"));
        let csv = history.export_csv(Schema::Attitude10).unwrap();
        let blocks: Vec<&str> = csv.split("\n\n").collect();
        assert_eq!(blocks.len(), 2, "expected a blank line separator: {csv}");
        let mut events = blocks[1].lines();
        assert_eq!(events.next().unwrap(), "index,timestamp,text");
        assert!(events.next().unwrap().ends_with("SYSTEM: READY"));
    }

    #[test]
    fn test_export_json_envelope() {
        let mut history = History::new();
        history.push_record(record(1000, 12.5, 12.5));
        history.push_record(record(2000, 10.0, 14.0));
        history.push_text(TextEvent::now("DEPLOY:AUTO: Apogee detected"));
        let json: serde_json::Value =
            serde_json::from_str(&history.export_json().unwrap()).unwrap();
        assert_eq!(json["dataPoints"], 2);
        assert_eq!(json["maxAltitude"], 14.0);
        assert_eq!(json["flightDuration"], 2000);
        assert_eq!(json["textMessages"][0], "DEPLOY:AUTO: Apogee detected");
        assert_eq!(json["telemetryData"][0]["altitude"], 12.5);
        assert!(json["exportTime"].is_string());
    }

    #[test]
    fn test_export_json_omits_empty_text_messages() {
        let mut history = History::new();
        history.push_record(record(1000, 12.5, 12.5));
        let json: serde_json::Value =
            serde_json::from_str(&history.export_json().unwrap()).unwrap();
        assert!(json.get("textMessages").is_none());
    }

    #[test]
    fn test_clear_scopes() {
        let mut history = History::new();
        history.push_record(record(1000, 1.0, 1.0));
        history.push_raw("1000,1.0,1.0,21.0,3.9,0.1,0,0,0,0");
        history.push_text(TextEvent::now("SYSTEM: READY"));
        history.push_flight_event(FlightEvent {
            time: 1000,
            altitude: 1.0,
            kind: FlightEventKind::Message,
            description: "SYSTEM: READY".into(),
        });

        history.clear();
        assert!(history.records().is_empty());
        assert!(history.flight_events().is_empty());
        assert!(history.text_events().is_empty());
        assert_eq!(history.raw_lines().len(), 1);

        history.push_text(TextEvent::now("again"));
        history.clear_raw();
        assert!(history.raw_lines().is_empty());
        assert!(history.text_events().is_empty());
    }

    #[test]
    fn test_classify_flight_event_kinds() {
        assert_eq!(
            FlightEventKind::classify("DEPLOY:AUTO: Apogee detected"),
            FlightEventKind::ApogeeDetected
        );
        assert_eq!(
            FlightEventKind::classify("Parachute hatch open"),
            FlightEventKind::ParachuteEvent
        );
        assert_eq!(
            FlightEventKind::classify("SERVO: done"),
            FlightEventKind::ServoAction
        );
        assert_eq!(
            FlightEventKind::classify("SYSTEM: READY"),
            FlightEventKind::Message
        );
    }

    #[test]
    fn test_max_altitude_over_records() {
        let mut history = History::new();
        assert_eq!(history.max_altitude(), 0.0);
        history.push_record(record(1000, 5.0, 9.0));
        history.push_record(record(2000, 2.0, 14.0));
        assert_eq!(history.max_altitude(), 14.0);
    }
}

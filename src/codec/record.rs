//! Telemetry record decoding.
//!
//! The wire schema has drifted across firmware revisions: older boards send
//! 9 fields with a triaxial accelerometer sample, newer boards send 10 fields
//! with a single thrust-axis acceleration plus absolute orientation angles.
//! The active [`Schema`] is an explicit codec parameter; nothing here guesses.

use serde::Serialize;
use thiserror::Error;

use super::status::StatusFlags;

/// Wire schema version for telemetry frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schema {
    /// Legacy 9-field schema with a triaxial accelerometer sample:
    /// `time,altitude,maxAltitude,temperature,voltage,accelX,accelY,accelZ,statusFlags`.
    Triaxial9,
    /// Current 10-field schema with thrust-axis acceleration and orientation:
    /// `time,altitude,maxAltitude,temperature,voltage,accelY,angleX,angleY,angleZ,statusFlags`.
    #[default]
    Attitude10,
}

impl Schema {
    /// Column names in wire order. Doubles as the CSV export header.
    #[must_use]
    pub fn csv_header(&self) -> &'static [&'static str] {
        match self {
            Schema::Triaxial9 => &[
                "time",
                "altitude",
                "maxAltitude",
                "temperature",
                "voltage",
                "accelX",
                "accelY",
                "accelZ",
                "statusFlags",
            ],
            Schema::Attitude10 => &[
                "time",
                "altitude",
                "maxAltitude",
                "temperature",
                "voltage",
                "accelY",
                "angleX",
                "angleY",
                "angleZ",
                "statusFlags",
            ],
        }
    }

    /// Exact number of comma-separated fields a frame must carry.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.csv_header().len()
    }
}

/// Error decoding one telemetry frame. Never fatal: the frame is dropped,
/// counted, and the read loop continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame did not carry the schema's exact field count.
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    /// A field failed numeric conversion.
    #[error("field '{field}' is not numeric: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Schema-versioned acceleration payload of a telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MotionSample {
    /// Triaxial accelerometer sample in g (legacy schema).
    #[serde(rename_all = "camelCase")]
    Triaxial {
        accel_x: f64,
        accel_y: f64,
        accel_z: f64,
    },
    /// Thrust-axis acceleration in g plus absolute orientation in degrees.
    #[serde(rename_all = "camelCase")]
    Attitude {
        accel_y: f64,
        angle_x: f64,
        angle_y: f64,
        angle_z: f64,
    },
}

/// One decoded telemetry frame. Constructed only by [`TelemetryRecord::decode`],
/// appended once to history, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Milliseconds since device boot. Monotonic non-decreasing in a session.
    pub time: u64,
    /// Current altitude in meters.
    pub altitude: f64,
    /// Device-reported running maximum altitude in meters.
    pub max_altitude: f64,
    /// Sensor temperature in degrees Celsius.
    pub temperature: f64,
    /// Battery voltage in volts.
    pub voltage: f64,
    /// Acceleration payload, shape depends on the schema.
    #[serde(flatten)]
    pub motion: MotionSample,
    /// Raw status bitmask; decode with [`StatusFlags::decode`].
    pub status_flags: u32,
}

impl TelemetryRecord {
    /// Decodes one wire line under the given schema.
    pub fn decode(line: &str, schema: Schema) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        let header = schema.csv_header();
        if fields.len() != header.len() {
            return Err(DecodeError::FieldCount {
                expected: header.len(),
                found: fields.len(),
            });
        }

        let float = |i: usize| -> Result<f64, DecodeError> {
            fields[i].parse().map_err(|_| DecodeError::InvalidNumber {
                field: header[i],
                value: fields[i].to_string(),
            })
        };
        let time: u64 = fields[0].parse().map_err(|_| DecodeError::InvalidNumber {
            field: header[0],
            value: fields[0].to_string(),
        })?;
        let last = header.len() - 1;
        let status_flags: u32 = fields[last].parse().map_err(|_| DecodeError::InvalidNumber {
            field: header[last],
            value: fields[last].to_string(),
        })?;

        let motion = match schema {
            Schema::Triaxial9 => MotionSample::Triaxial {
                accel_x: float(5)?,
                accel_y: float(6)?,
                accel_z: float(7)?,
            },
            Schema::Attitude10 => MotionSample::Attitude {
                accel_y: float(5)?,
                angle_x: float(6)?,
                angle_y: float(7)?,
                angle_z: float(8)?,
            },
        };

        Ok(Self {
            time,
            altitude: float(1)?,
            max_altitude: float(2)?,
            temperature: float(3)?,
            voltage: float(4)?,
            motion,
            status_flags,
        })
    }

    /// Decoded view of the status bitmask under the given schema.
    #[must_use]
    pub fn flags(&self, schema: Schema) -> StatusFlags {
        StatusFlags::decode(self.status_flags, schema)
    }

    /// The thrust-axis acceleration scalar used for launch/landing detection.
    /// The Y axis is the thrust axis in both device revisions.
    #[must_use]
    pub fn vertical_accel(&self) -> f64 {
        match self.motion {
            MotionSample::Triaxial { accel_y, .. } => accel_y,
            MotionSample::Attitude { accel_y, .. } => accel_y,
        }
    }

    /// Field values in wire order, for the CSV export.
    #[must_use]
    pub fn to_csv_row(&self) -> Vec<String> {
        let mut row = vec![
            self.time.to_string(),
            self.altitude.to_string(),
            self.max_altitude.to_string(),
            self.temperature.to_string(),
            self.voltage.to_string(),
        ];
        match self.motion {
            MotionSample::Triaxial {
                accel_x,
                accel_y,
                accel_z,
            } => {
                row.push(accel_x.to_string());
                row.push(accel_y.to_string());
                row.push(accel_z.to_string());
            }
            MotionSample::Attitude {
                accel_y,
                angle_x,
                angle_y,
                angle_z,
            } => {
                row.push(accel_y.to_string());
                row.push(angle_x.to_string());
                row.push(angle_y.to_string());
                row.push(angle_z.to_string());
            }
        }
        row.push(self.status_flags.to_string());
        row
    }
}

//! # Flight State Module
//!
//! Tracks the mission phase from raw sensor deltas against a baseline
//! captured on the first telemetry record of the session, and derives
//! vertical speed from consecutive samples. Pure state machine, no I/O.

use std::fmt;
use std::time::{Duration, Instant};

use crate::codec::TelemetryRecord;

/// Minimum altitude gain over the baseline (in meters) to detect a launch.
pub const LAUNCH_ALTITUDE_DELTA_M: f64 = 5.0;

/// Minimum acceleration delta from the baseline (in g) to detect a launch.
/// Both this and the altitude gain are required, so sensor noise on a single
/// channel cannot trigger a false launch.
pub const LAUNCH_ACCEL_DELTA_G: f64 = 2.0;

/// Maximum altitude over the baseline (in meters) to detect a landing.
pub const LANDED_ALTITUDE_DELTA_M: f64 = 3.0;

/// Maximum acceleration delta from the baseline (in g) to detect a landing.
/// The landing thresholds are deliberately tighter than the launch ones,
/// giving hysteresis against oscillation near the boundary.
pub const LANDED_ACCEL_DELTA_G: f64 = 0.5;

/// Mission phase. Transitions are one-directional:
/// `PreFlight -> Launched -> Landed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlightPhase {
    /// On the pad, baseline captured or pending.
    PreFlight,
    /// Airborne.
    Launched,
    /// Back on the ground.
    Landed,
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightPhase::PreFlight => write!(f, "pre-flight"),
            FlightPhase::Launched => write!(f, "launched"),
            FlightPhase::Landed => write!(f, "landed"),
        }
    }
}

/// Altitude and acceleration reference captured from the first record.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    altitude: f64,
    accel: f64,
}

/// Infers the mission phase from decoded telemetry.
#[derive(Debug)]
pub struct FlightTracker {
    phase: FlightPhase,
    baseline: Option<Baseline>,
    last_sample: Option<(u64, f64)>,
    vertical_speed: f64,
    launched_at: Option<Instant>,
    flight_time: Option<Duration>,
}

impl Default for FlightTracker {
    fn default() -> Self {
        Self {
            phase: FlightPhase::PreFlight,
            baseline: None,
            last_sample: None,
            vertical_speed: 0.0,
            launched_at: None,
            flight_time: None,
        }
    }
}

impl FlightTracker {
    /// Creates a tracker with no baseline, in the pre-flight phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mission phase.
    #[must_use]
    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Derived vertical speed in m/s, absolute value. Zero until two samples
    /// with increasing timestamps have been seen.
    #[must_use]
    pub fn vertical_speed(&self) -> f64 {
        self.vertical_speed
    }

    /// Elapsed flight time: zero before launch, running while airborne,
    /// frozen at touchdown.
    #[must_use]
    pub fn flight_duration(&self) -> Duration {
        match (self.launched_at, self.flight_time) {
            (_, Some(frozen)) => frozen,
            (Some(launched), None) => launched.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Feeds one decoded record. Returns the new phase when a transition
    /// fired, `None` otherwise.
    ///
    /// The first record of the session only captures the baseline; no
    /// transition is evaluated on it.
    pub fn update(&mut self, record: &TelemetryRecord) -> Option<FlightPhase> {
        let accel = record.vertical_accel();
        let Some(baseline) = self.baseline else {
            self.baseline = Some(Baseline {
                altitude: record.altitude,
                accel,
            });
            self.last_sample = Some((record.time, record.altitude));
            return None;
        };

        if let Some((last_time, last_altitude)) = self.last_sample {
            let dt_ms = record.time as i64 - last_time as i64;
            // Out-of-order or duplicate timestamps keep the previous speed.
            if dt_ms > 0 {
                self.vertical_speed =
                    (record.altitude - last_altitude).abs() / (dt_ms as f64 / 1000.0);
            }
        }
        self.last_sample = Some((record.time, record.altitude));

        let altitude_delta = record.altitude - baseline.altitude;
        let accel_delta = (accel - baseline.accel).abs();
        match self.phase {
            FlightPhase::PreFlight
                if altitude_delta > LAUNCH_ALTITUDE_DELTA_M
                    && accel_delta > LAUNCH_ACCEL_DELTA_G =>
            {
                self.phase = FlightPhase::Launched;
                self.launched_at = Some(Instant::now());
                Some(FlightPhase::Launched)
            }
            FlightPhase::Launched
                if altitude_delta <= LANDED_ALTITUDE_DELTA_M
                    && accel_delta < LANDED_ACCEL_DELTA_G =>
            {
                self.phase = FlightPhase::Landed;
                self.flight_time = self.launched_at.map(|launched| launched.elapsed());
                Some(FlightPhase::Landed)
            }
            _ => None,
        }
    }

    /// Clears baseline, phase, timestamps and derived speed back to the
    /// initial values. Used when the operator clears accumulated data.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Schema;

    fn record(time: u64, altitude: f64, accel_y: f64) -> TelemetryRecord {
        let line = format!("{time},{altitude},{altitude},20.0,3.9,{accel_y},0,0,0,0");
        TelemetryRecord::decode(&line, Schema::Attitude10).unwrap()
    }

    #[test]
    fn test_first_record_captures_baseline_without_transition() {
        let mut tracker = FlightTracker::new();
        // Well past both launch thresholds, but the first record only arms
        // the baseline.
        assert_eq!(tracker.update(&record(0, 100.0, 5.0)), None);
        assert_eq!(tracker.phase(), FlightPhase::PreFlight);
    }

    #[test]
    fn test_launch_requires_both_deltas() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        // Altitude alone is not enough.
        assert_eq!(tracker.update(&record(100, 10.0, 0.5)), None);
        // Acceleration alone is not enough.
        assert_eq!(tracker.update(&record(200, 2.0, 3.0)), None);
        // Both together fire the transition.
        assert_eq!(
            tracker.update(&record(300, 10.0, 3.0)),
            Some(FlightPhase::Launched)
        );
    }

    #[test]
    fn test_full_flight_scenario() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        assert_eq!(
            tracker.update(&record(100, 10.0, 3.0)),
            Some(FlightPhase::Launched)
        );
        // Still descending: above the landing altitude window.
        assert_eq!(tracker.update(&record(200, 50.0, 0.1)), None);
        assert_eq!(
            tracker.update(&record(300, 1.0, 0.1)),
            Some(FlightPhase::Landed)
        );
        assert_eq!(tracker.phase(), FlightPhase::Landed);
    }

    #[test]
    fn test_phase_is_monotonic() {
        let mut tracker = FlightTracker::new();
        let mut observed = vec![tracker.phase()];
        tracker.update(&record(0, 0.0, 0.0));
        for (i, (alt, accel)) in [
            (10.0, 3.0), // launch
            (1.0, 0.1),  // land
            (20.0, 4.0), // would re-launch if transitions could repeat
            (0.5, 0.0),
        ]
        .iter()
        .enumerate()
        {
            tracker.update(&record((i as u64 + 1) * 100, *alt, *accel));
            observed.push(tracker.phase());
        }
        for pair in observed.windows(2) {
            assert!(pair[0] <= pair[1], "phase went backwards: {observed:?}");
        }
        assert_eq!(tracker.phase(), FlightPhase::Landed);
    }

    #[test]
    fn test_vertical_speed() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        tracker.update(&record(500, 10.0, 3.0));
        assert!((tracker.vertical_speed() - 20.0).abs() < 1e-9);
        // Descent counts as positive speed too.
        tracker.update(&record(1000, 5.0, 3.0));
        assert!((tracker.vertical_speed() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_speed_retained_on_duplicate_timestamp() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        tracker.update(&record(500, 10.0, 3.0));
        let before = tracker.vertical_speed();
        tracker.update(&record(500, 30.0, 3.0));
        assert_eq!(tracker.vertical_speed(), before);
        tracker.update(&record(400, 40.0, 3.0));
        assert_eq!(tracker.vertical_speed(), before);
    }

    #[test]
    fn test_duration_zero_before_launch() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        assert_eq!(tracker.flight_duration(), Duration::ZERO);
    }

    #[test]
    fn test_duration_frozen_after_landing() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        tracker.update(&record(100, 10.0, 3.0));
        tracker.update(&record(200, 1.0, 0.1));
        let frozen = tracker.flight_duration();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tracker.flight_duration(), frozen);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut tracker = FlightTracker::new();
        tracker.update(&record(0, 0.0, 0.0));
        tracker.update(&record(100, 10.0, 3.0));
        tracker.reset();
        assert_eq!(tracker.phase(), FlightPhase::PreFlight);
        assert_eq!(tracker.vertical_speed(), 0.0);
        assert_eq!(tracker.flight_duration(), Duration::ZERO);
        // A fresh baseline is captured again after reset.
        assert_eq!(tracker.update(&record(0, 50.0, 5.0)), None);
        assert_eq!(tracker.phase(), FlightPhase::PreFlight);
    }
}

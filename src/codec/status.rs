//! Status bitmask decoding.
//!
//! Each bit of the `statusFlags` field encodes one boolean device condition.
//! The bit assignment is schema-versioned: the 10-field firmware publishes
//! nine conditions, the legacy 9-field firmware only three. Decoding is a
//! pure function of `(mask, schema)` and is re-derived on every access, never
//! cached. Unknown or reserved bits are ignored.

use super::record::Schema;

/// Decoded view of the raw status bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    /// EEPROM flight logging enabled.
    pub eeprom_enabled: bool,
    /// Barometric pressure sensor healthy.
    pub barometer_ok: bool,
    /// Inertial measurement unit healthy.
    pub imu_ok: bool,
    /// Deployment servo in the open position.
    pub servo_open: bool,
    /// Sensor calibration complete.
    pub calibration_done: bool,
    /// All startup checks passed.
    pub system_ready: bool,
    /// Device-side launch detection fired.
    pub launch_detected: bool,
    /// Payload hatch open.
    pub hatch_open: bool,
    /// Parachute deployment fired.
    pub parachute_deployed: bool,
    /// Device reported an unrecoverable fault (legacy schema only).
    pub critical_error: bool,
}

impl StatusFlags {
    /// Decodes the raw bitmask under the given schema's bit table.
    #[must_use]
    pub fn decode(mask: u32, schema: Schema) -> Self {
        match schema {
            Schema::Attitude10 => Self {
                eeprom_enabled: mask & 0x001 != 0,
                barometer_ok: mask & 0x002 != 0,
                imu_ok: mask & 0x004 != 0,
                servo_open: mask & 0x008 != 0,
                calibration_done: mask & 0x010 != 0,
                system_ready: mask & 0x020 != 0,
                launch_detected: mask & 0x040 != 0,
                hatch_open: mask & 0x080 != 0,
                parachute_deployed: mask & 0x100 != 0,
                critical_error: false,
            },
            // The legacy firmware only ever reported three conditions.
            Schema::Triaxial9 => Self {
                launch_detected: mask & 0x002 != 0,
                parachute_deployed: mask & 0x008 != 0,
                critical_error: mask & 0x080 != 0,
                ..Self::default()
            },
        }
    }
}

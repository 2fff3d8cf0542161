//! Offset corrected body orientation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::eqpt::imu::RawOrientation;

use crate::units;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Mounting offsets of the IMU found by tilt calibration.
///
/// Units: 1/16 degree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiltOffsets {
    pub pitch: i16,
    pub roll: i16,
}

/// Body orientation for one tick, after roll unwrapping and offset
/// correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OrientationSample {
    /// Corrected pitch in sensor units, used by calibration.
    ///
    /// Units: 1/16 degree
    pub pitch_raw: i16,

    /// Corrected roll in sensor units, used by calibration.
    ///
    /// Units: 1/16 degree
    pub roll_raw: i16,

    /// Units: radians
    pub pitch_rad: f64,

    /// Units: radians, right tilt positive
    pub roll_rad: f64,

    /// Pitch rate as reported, used by the ankle gyro feedback.
    ///
    /// Units: 1/16 degree/second
    pub pitch_rate_raw: i16,

    /// Units: 1/16 degree/second
    pub roll_rate_raw: i16,

    /// Units: radians/second
    pub pitch_rate_rads: f64,

    /// Units: radians/second
    pub roll_rate_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl OrientationSample {
    /// Correct a raw sensor sample with the given offsets.
    pub fn from_raw(raw: &RawOrientation, offsets: &TiltOffsets) -> Self {
        let pitch_raw = raw.pitch.saturating_sub(offsets.pitch);
        let roll_raw = units::unwrap_roll(raw.roll).saturating_sub(offsets.roll);

        Self {
            pitch_raw,
            roll_raw,
            pitch_rad: units::raw_to_rad(pitch_raw),
            roll_rad: units::raw_to_rad(roll_raw),
            pitch_rate_raw: raw.pitch_rate,
            roll_rate_raw: raw.roll_rate,
            pitch_rate_rads: units::rate_raw_to_rads(raw.pitch_rate),
            roll_rate_rads: units::rate_raw_to_rads(raw.roll_rate),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_upright_is_level() {
        let raw = RawOrientation {
            roll: units::ROLL_WRAP_RAW,
            ..Default::default()
        };
        let sample = OrientationSample::from_raw(&raw, &TiltOffsets::default());

        assert_eq!(sample.roll_raw, 0);
        assert_eq!(sample.roll_rad, 0.0);
        assert_eq!(sample.pitch_rad, 0.0);
    }

    #[test]
    fn test_offsets_applied() {
        let raw = RawOrientation {
            pitch: 20,
            roll: units::wrap_roll(-12),
            roll_rate: 32,
            ..Default::default()
        };
        let offsets = TiltOffsets { pitch: 4, roll: -2 };
        let sample = OrientationSample::from_raw(&raw, &offsets);

        assert_eq!(sample.pitch_raw, 16);
        assert_eq!(sample.roll_raw, -10);
        assert!((sample.pitch_rad - 1f64.to_radians()).abs() < 1e-12);
        assert!((sample.roll_rate_rads - 2f64.to_radians()).abs() < 1e-12);
    }
}

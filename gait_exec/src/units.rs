//! Unit conversion boundary
//!
//! All control logic works in millimetres and radians. Actuator commands are
//! in device ticks and the IMU reports orientation in 1/16 degree, these
//! functions are the only place the two meet.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Actuator ticks per radian of joint rotation.
pub const TICKS_PER_RAD: f64 = 1718.9;

/// IMU units per degree, for both angles and angular rates.
pub const SENSOR_UNITS_PER_DEG: f64 = 16.0;

/// Raw roll reading of an upright robot. The IMU is mounted upside down, so
/// upright reads as +/-180 degrees and tilting moves the reading away from
/// the wrap point.
pub const ROLL_WRAP_RAW: i16 = 2879;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a joint angle to actuator ticks.
///
/// The result is truncated towards zero and saturates at the `i16` range,
/// non-finite angles map to zero.
pub fn rad_to_ticks(angle_rad: f64) -> i16 {
    (angle_rad * TICKS_PER_RAD) as i16
}

/// Convert actuator ticks to a joint angle.
pub fn ticks_to_rad(ticks: f64) -> f64 {
    ticks / TICKS_PER_RAD
}

/// Convert a raw sensor angle to radians.
pub fn raw_to_rad(raw: i16) -> f64 {
    raw as f64 * PI / (180.0 * SENSOR_UNITS_PER_DEG)
}

/// Convert an angle in radians to the nearest raw sensor value.
pub fn rad_to_raw(angle_rad: f64) -> i16 {
    (angle_rad * 180.0 * SENSOR_UNITS_PER_DEG / PI).round() as i16
}

/// Convert a raw sensor angular rate into rad/s.
pub fn rate_raw_to_rads(raw: i16) -> f64 {
    raw_to_rad(raw)
}

/// Map the mounted sensor's roll reading onto a roll centred on zero, right
/// tilt positive.
pub fn unwrap_roll(raw: i16) -> i16 {
    if raw > 0 {
        ROLL_WRAP_RAW - raw
    } else {
        -ROLL_WRAP_RAW - raw
    }
}

/// Inverse of [`unwrap_roll`], gives the reading the sensor would report for
/// the given centred roll.
pub fn wrap_roll(roll: i16) -> i16 {
    if roll >= 0 {
        ROLL_WRAP_RAW - roll
    } else {
        -ROLL_WRAP_RAW - roll
    }
}

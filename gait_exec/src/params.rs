//! # Gait Executable Parameters
//!
//! This module provides parameters for the gait executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::actuator::ServoMapping;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaitExecParams {
    /// Period of the control tick.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive overruns after which every overrun is reported
    /// as an error rather than a warning.
    pub max_consec_overruns: u64,

    pub servo_bus: ServoBusParams,

    pub imu: ImuParams,
}

/// Servo bus device and joint map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoBusParams {
    /// Path to the serial device the servos are on.
    pub device: String,

    /// Servo position units per joint tick.
    pub servo_units_per_tick: f64,

    /// Goal speed sent with every position, 0 for the servo's maximum.
    pub speed: u16,

    /// Goal acceleration sent with every position, 0 for the servo's
    /// maximum.
    pub acc: u8,

    pub servos: Vec<ServoMapping>,
}

/// IMU device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuParams {
    /// Path to the serial device the IMU is on.
    pub device: String,
}

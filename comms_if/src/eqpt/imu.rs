//! # Inertial Measurement Unit Samples
//!
//! The IMU is a 9-axis fusion sensor reporting absolute orientation in
//! 1/16 degree units and angular rate in 1/16 degree/second units. Device
//! bring-up (identity check, power mode, fusion mode) is performed by the
//! equipment driver before the control loop starts.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Register address of the first byte of the euler angle block (three
/// little endian `i16` values).
pub const EULER_BLOCK_ADDR: u8 = 0x1A;

/// Register address of the first byte of the gyro rate block.
pub const GYRO_BLOCK_ADDR: u8 = 0x14;

/// Size of each register block in bytes.
pub const BLOCK_LEN: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One raw orientation sample in sensor native units.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawOrientation {
    /// Pitch, forward lean negative.
    ///
    /// Units: 1/16 degree
    pub pitch: i16,

    /// Roll as reported by the sensor. The sensor is mounted inverted so an
    /// upright robot reads close to +/-180 degrees.
    ///
    /// Units: 1/16 degree
    pub roll: i16,

    /// Heading, clockwise positive.
    ///
    /// Units: 1/16 degree
    pub yaw: i16,

    /// Units: 1/16 degree/second
    pub pitch_rate: i16,

    /// Units: 1/16 degree/second
    pub roll_rate: i16,

    /// Units: 1/16 degree/second
    pub yaw_rate: i16,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RawOrientation {
    /// Build a sample from the euler and gyro register blocks.
    ///
    /// The euler block is ordered heading, pitch, roll. The gyro block is
    /// ordered roll rate, pitch rate, yaw rate as mounted on the robot.
    pub fn from_registers(euler: &[u8; BLOCK_LEN], gyro: &[u8; BLOCK_LEN]) -> Self {
        Self {
            yaw: LittleEndian::read_i16(&euler[0..2]),
            pitch: LittleEndian::read_i16(&euler[2..4]),
            roll: LittleEndian::read_i16(&euler[4..6]),
            roll_rate: LittleEndian::read_i16(&gyro[0..2]),
            pitch_rate: LittleEndian::read_i16(&gyro[2..4]),
            yaw_rate: LittleEndian::read_i16(&gyro[4..6]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_registers() {
        let euler = [0x10, 0x00, 0xF0, 0xFF, 0x3F, 0x0B];
        let gyro = [0x02, 0x00, 0xFE, 0xFF, 0x00, 0x00];
        let raw = RawOrientation::from_registers(&euler, &gyro);

        assert_eq!(raw.yaw, 16);
        assert_eq!(raw.pitch, -16);
        assert_eq!(raw.roll, 2879);
        assert_eq!(raw.roll_rate, 2);
        assert_eq!(raw.pitch_rate, -2);
        assert_eq!(raw.yaw_rate, 0);
    }
}

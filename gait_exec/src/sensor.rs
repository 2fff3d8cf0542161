//! # Orientation sensor interface
//!
//! Raw orientation samples enter the controller through the
//! [`OrientationSensor`] trait. [`UartImu`] reads the fusion IMU's register
//! blocks over its serial interface, [`SimImu`] replays recorded or scripted
//! samples. [`SampleHold`] wraps either and keeps the control loop supplied
//! when a read fails.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

use comms_if::eqpt::imu::{RawOrientation, BLOCK_LEN, EULER_BLOCK_ADDR, GYRO_BLOCK_ADDR};

use crate::units::ROLL_WRAP_RAW;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const REQ_START: u8 = 0xAA;
const REQ_READ: u8 = 0x01;
const RESP_READ_OK: u8 = 0xBB;
const RESP_ERROR: u8 = 0xEE;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of raw orientation samples.
pub trait OrientationSensor {
    fn read_orientation(&mut self) -> Result<RawOrientation, SensorError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The fusion IMU on its serial interface.
pub struct UartImu<P> {
    port: P,
}

/// Simulated IMU replaying a fixed sequence of samples.
///
/// Once the sequence is exhausted the last sample is held.
#[derive(Debug, Clone)]
pub struct SimImu {
    samples: VecDeque<RawOrientation>,
    last: RawOrientation,
}

/// Wraps a sensor, substituting the last good sample when a read fails.
pub struct SampleHold<S> {
    sensor: S,
    last: RawOrientation,

    /// Total number of failed reads.
    pub num_errors: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Timed out waiting for the IMU")]
    Timeout,

    #[error("IMU reported a read error (status {0:#04X})")]
    ReadFailed(u8),

    #[error("Unexpected response header from the IMU: {0:#04X}")]
    BadResponse(u8),

    #[error("IMU responded with {found} bytes, expected {expected}")]
    BadLength { found: u8, expected: u8 },

    #[error("IMU port error: {0}")]
    Io(io::Error),

    #[error("Could not load the IMU script: {0}")]
    ScriptError(#[from] csv::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl UartImu<File> {
    /// Open the IMU on the given serial device.
    ///
    /// The device's line settings are expected to be configured already.
    pub fn open<A: AsRef<Path>>(device: A) -> Result<Self, SensorError> {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(SensorError::Io)?;

        Ok(Self::new(port))
    }
}

impl<P> UartImu<P>
where
    P: Read + Write,
{
    pub fn new(port: P) -> Self {
        Self { port }
    }

    fn read_block(&mut self, addr: u8) -> Result<[u8; BLOCK_LEN], SensorError> {
        let req = [REQ_START, REQ_READ, addr, BLOCK_LEN as u8];

        trace!("IMU tx: {:02X?}", req);

        self.port.write_all(&req).map_err(SensorError::Io)?;
        self.port.flush().map_err(SensorError::Io)?;

        let mut head = [0u8; 2];
        self.read_exact(&mut head)?;

        match head[0] {
            RESP_READ_OK => (),
            RESP_ERROR => return Err(SensorError::ReadFailed(head[1])),
            b => return Err(SensorError::BadResponse(b)),
        }

        if head[1] as usize != BLOCK_LEN {
            return Err(SensorError::BadLength {
                found: head[1],
                expected: BLOCK_LEN as u8,
            });
        }

        let mut block = [0u8; BLOCK_LEN];
        self.read_exact(&mut block)?;

        Ok(block)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SensorError> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock => SensorError::Timeout,
            _ => SensorError::Io(e),
        })
    }
}

impl<P> OrientationSensor for UartImu<P>
where
    P: Read + Write,
{
    fn read_orientation(&mut self) -> Result<RawOrientation, SensorError> {
        let euler = self.read_block(EULER_BLOCK_ADDR)?;
        let gyro = self.read_block(GYRO_BLOCK_ADDR)?;

        Ok(RawOrientation::from_registers(&euler, &gyro))
    }
}

impl<S> OrientationSensor for Box<S>
where
    S: OrientationSensor + ?Sized,
{
    fn read_orientation(&mut self) -> Result<RawOrientation, SensorError> {
        (**self).read_orientation()
    }
}

impl SimImu {
    /// A robot standing perfectly upright and still.
    pub fn level() -> Self {
        Self::from_samples(Vec::new())
    }

    pub fn from_samples(samples: Vec<RawOrientation>) -> Self {
        Self {
            samples: samples.into(),
            last: level_sample(),
        }
    }

    /// Load samples from a csv file with the header
    /// `pitch,roll,yaw,pitch_rate,roll_rate,yaw_rate`, one sample per tick.
    pub fn from_script<P: AsRef<Path>>(path: P) -> Result<Self, SensorError> {
        let mut reader = csv::Reader::from_path(path)?;

        let samples = reader
            .deserialize()
            .collect::<Result<Vec<RawOrientation>, csv::Error>>()?;

        Ok(Self::from_samples(samples))
    }

    /// Number of scripted samples not yet read.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl OrientationSensor for SimImu {
    fn read_orientation(&mut self) -> Result<RawOrientation, SensorError> {
        if let Some(s) = self.samples.pop_front() {
            self.last = s;
        }

        Ok(self.last)
    }
}

impl<S> SampleHold<S>
where
    S: OrientationSensor,
{
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            last: level_sample(),
            num_errors: 0,
        }
    }

    /// Read a sample, falling back on the last good one.
    pub fn read(&mut self) -> RawOrientation {
        match self.sensor.read_orientation() {
            Ok(s) => {
                self.last = s;
            }
            Err(e) => {
                self.num_errors += 1;
                warn!("IMU read failed, holding last sample: {}", e);
            }
        }

        self.last
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn level_sample() -> RawOrientation {
    RawOrientation {
        roll: ROLL_WRAP_RAW,
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    struct MockPort {
        rx: Cursor<Vec<u8>>,
        tx: Vec<u8>,
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn imu(rx: Vec<u8>) -> UartImu<MockPort> {
        UartImu::new(MockPort {
            rx: Cursor::new(rx),
            tx: Vec::new(),
        })
    }

    struct Failing;

    impl OrientationSensor for Failing {
        fn read_orientation(&mut self) -> Result<RawOrientation, SensorError> {
            Err(SensorError::Timeout)
        }
    }

    #[test]
    fn test_uart_read() {
        let mut rx = vec![RESP_READ_OK, 6];
        // heading 0, pitch -16, roll 2879
        rx.extend_from_slice(&[0x00, 0x00, 0xF0, 0xFF, 0x3F, 0x0B]);
        rx.extend_from_slice(&[RESP_READ_OK, 6]);
        // roll rate 5, pitch rate -3, yaw rate 0
        rx.extend_from_slice(&[0x05, 0x00, 0xFD, 0xFF, 0x00, 0x00]);

        let mut imu = imu(rx);
        let s = imu.read_orientation().unwrap();

        assert_eq!(s.pitch, -16);
        assert_eq!(s.roll, 2879);
        assert_eq!(s.roll_rate, 5);
        assert_eq!(s.pitch_rate, -3);
        assert_eq!(
            &imu.port.tx,
            &[REQ_START, REQ_READ, EULER_BLOCK_ADDR, 6, REQ_START, REQ_READ, GYRO_BLOCK_ADDR, 6]
        );
    }

    #[test]
    fn test_uart_errors() {
        assert!(matches!(
            imu(vec![RESP_ERROR, 0x07]).read_orientation(),
            Err(SensorError::ReadFailed(0x07))
        ));
        assert!(matches!(
            imu(vec![RESP_READ_OK, 4]).read_orientation(),
            Err(SensorError::BadLength {
                found: 4,
                expected: 6
            })
        ));
        assert!(matches!(
            imu(vec![RESP_READ_OK, 6, 0x00]).read_orientation(),
            Err(SensorError::Timeout)
        ));
    }

    #[test]
    fn test_sim_holds_last_sample() {
        let a = RawOrientation {
            pitch: 10,
            roll: 2800,
            ..Default::default()
        };
        let mut sim = SimImu::from_samples(vec![a]);

        assert_eq!(sim.remaining(), 1);
        assert_eq!(sim.read_orientation().unwrap(), a);
        assert_eq!(sim.read_orientation().unwrap(), a);
        assert_eq!(sim.remaining(), 0);

        assert_eq!(SimImu::level().read_orientation().unwrap().roll, ROLL_WRAP_RAW);
    }

    #[test]
    fn test_sample_hold() {
        let mut hold = SampleHold::new(Failing);

        assert_eq!(hold.read(), level_sample());
        assert_eq!(hold.read(), level_sample());
        assert_eq!(hold.num_errors, 2);
    }
}

//! # Actuator interface
//!
//! Joint demands leave the controller through the [`Actuator`] trait. Two
//! implementations are provided: [`SimActuator`], which simply records the
//! demands, and [`BusActuator`] which drives the servos over the servo bus.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use thiserror::Error;

use comms_if::eqpt::{
    joint::{JointDems, JointId},
    servo_bus::{BusError, ServoBus},
};

use crate::params::ServoBusParams;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A set of joint actuators.
pub trait Actuator {
    /// Demand a joint position.
    ///
    /// Implementations may stage the demand until [`Actuator::commit`].
    fn set_joint_position(&mut self, joint: JointId, ticks: i16) -> Result<(), ActuatorError>;

    /// Enable or release the torque of a joint.
    fn set_torque(&mut self, joint: JointId, enable: bool) -> Result<(), ActuatorError>;

    /// Read back the present position of a joint.
    fn read_joint_position(&mut self, joint: JointId) -> Result<i16, ActuatorError>;

    /// Apply all demands staged this tick.
    fn commit(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// An actuator set which records the demands it is given.
#[derive(Debug, Clone, Default)]
pub struct SimActuator {
    pub positions: HashMap<JointId, i16>,

    pub torque: HashMap<JointId, bool>,

    pub num_commits: u64,

    /// Requests for this joint time out, for exercising error handling.
    pub faulty_joint: Option<JointId>,
}

/// Mapping of a joint onto a servo on the bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServoMapping {
    pub joint: JointId,

    /// Servo bus ID.
    pub id: u8,

    /// Servo position at which the joint is at zero.
    pub centre: i16,

    /// `1` if positive joint angles increase the servo position, `-1`
    /// otherwise.
    pub direction: i8,
}

/// Actuators driven over the servo bus.
///
/// Positions are staged with REG_WRITE and applied together by a single
/// broadcast ACTION on commit.
pub struct BusActuator<P> {
    bus: ServoBus<P>,
    servos: HashMap<JointId, ServoMapping>,
    servo_units_per_tick: f64,
    speed: u16,
    acc: u8,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Timed out waiting for joint {0:?}")]
    Timeout(JointId),

    #[error("Checksum mismatch in the response for joint {0:?}")]
    Checksum(JointId),

    #[error("Joint {0:?} has no servo mapping")]
    NotMapped(JointId),

    #[error("Servo bus error: {0}")]
    Bus(BusError),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Actuator for SimActuator {
    fn set_joint_position(&mut self, joint: JointId, ticks: i16) -> Result<(), ActuatorError> {
        self.check_fault(joint)?;
        self.positions.insert(joint, ticks);
        Ok(())
    }

    fn set_torque(&mut self, joint: JointId, enable: bool) -> Result<(), ActuatorError> {
        self.check_fault(joint)?;
        self.torque.insert(joint, enable);
        Ok(())
    }

    fn read_joint_position(&mut self, joint: JointId) -> Result<i16, ActuatorError> {
        self.check_fault(joint)?;
        Ok(self.positions.get(&joint).copied().unwrap_or(0))
    }

    fn commit(&mut self) -> Result<(), ActuatorError> {
        self.num_commits += 1;
        Ok(())
    }
}

impl SimActuator {
    fn check_fault(&self, joint: JointId) -> Result<(), ActuatorError> {
        match self.faulty_joint {
            Some(j) if j == joint => Err(ActuatorError::Timeout(joint)),
            _ => Ok(()),
        }
    }
}

impl<P> BusActuator<P>
where
    P: Read + Write,
{
    pub fn new(bus: ServoBus<P>, params: &ServoBusParams) -> Self {
        Self {
            bus,
            servos: params.servos.iter().map(|s| (s.joint, *s)).collect(),
            servo_units_per_tick: params.servo_units_per_tick,
            speed: params.speed,
            acc: params.acc,
        }
    }

    fn mapping(&self, joint: JointId) -> Result<ServoMapping, ActuatorError> {
        self.servos
            .get(&joint)
            .copied()
            .ok_or(ActuatorError::NotMapped(joint))
    }

    fn to_servo(&self, servo: &ServoMapping, ticks: i16) -> i16 {
        let offset = (ticks as f64 * self.servo_units_per_tick).round() as i32;
        (servo.centre as i32 + servo.direction as i32 * offset) as i16
    }

    fn from_servo(&self, servo: &ServoMapping, position: i16) -> i16 {
        let offset = (position as i32 - servo.centre as i32) * servo.direction as i32;
        (offset as f64 / self.servo_units_per_tick).round() as i16
    }
}

impl<P> Actuator for BusActuator<P>
where
    P: Read + Write,
{
    fn set_joint_position(&mut self, joint: JointId, ticks: i16) -> Result<(), ActuatorError> {
        let servo = self.mapping(joint)?;
        let position = self.to_servo(&servo, ticks);

        self.bus
            .reg_write_position(servo.id, position, self.speed, self.acc)
            .map_err(|e| bus_error(joint, e))
    }

    fn set_torque(&mut self, joint: JointId, enable: bool) -> Result<(), ActuatorError> {
        let servo = self.mapping(joint)?;

        self.bus
            .set_torque(servo.id, enable)
            .map_err(|e| bus_error(joint, e))
    }

    fn read_joint_position(&mut self, joint: JointId) -> Result<i16, ActuatorError> {
        let servo = self.mapping(joint)?;

        let position = self
            .bus
            .read_position(servo.id)
            .map_err(|e| bus_error(joint, e))?;

        Ok(self.from_servo(&servo, position))
    }

    fn commit(&mut self) -> Result<(), ActuatorError> {
        self.bus.action().map_err(ActuatorError::Bus)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Send a tick's demands and commit them.
///
/// A failing joint does not stop the others being sent. Returns the errors
/// encountered, each of which has already been logged.
pub fn send_dems<A>(actuator: &mut A, dems: &JointDems) -> Vec<ActuatorError>
where
    A: Actuator + ?Sized,
{
    let mut errors = Vec::new();

    for joint in JointId::ALL.iter() {
        if let Some(ticks) = dems.pos_ticks.get(joint) {
            if let Err(e) = actuator.set_joint_position(*joint, *ticks) {
                warn!("{}", e);
                errors.push(e);
            }
        }
    }

    if let Err(e) = actuator.commit() {
        warn!("Could not commit joint demands: {}", e);
        errors.push(e);
    }

    errors
}

/// Release the torque of every joint.
pub fn release_torque<A>(actuator: &mut A) -> Vec<ActuatorError>
where
    A: Actuator + ?Sized,
{
    let mut errors = Vec::new();

    for joint in JointId::ALL.iter() {
        if let Err(e) = actuator.set_torque(*joint, false) {
            warn!("Could not release torque: {}", e);
            errors.push(e);
        }
    }

    errors
}

/// Read back the position of every joint. Joints that could not be read are
/// missing from the result.
pub fn read_pose<A>(actuator: &mut A) -> (JointDems, Vec<ActuatorError>)
where
    A: Actuator + ?Sized,
{
    let mut dems = JointDems::default();
    let mut errors = Vec::new();

    for joint in JointId::ALL.iter() {
        match actuator.read_joint_position(*joint) {
            Ok(ticks) => {
                dems.pos_ticks.insert(*joint, ticks);
            }
            Err(e) => {
                warn!("Could not read joint position: {}", e);
                errors.push(e);
            }
        }
    }

    (dems, errors)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn bus_error(joint: JointId, err: BusError) -> ActuatorError {
    match err {
        BusError::Timeout(_) => ActuatorError::Timeout(joint),
        BusError::Checksum { .. } => ActuatorError::Checksum(joint),
        e => ActuatorError::Bus(e),
    }
}

//! # Gait control module
//!
//! Owns the full controller context and sequences the balance controller,
//! trajectory generator, leg kinematics and phase counter through the gait
//! modes:
//!
//! ```text
//! Startup -> TiltCalibration -> IdleCheck -> Walking -> PostStepDamping
//!                                   ^                          |
//!                                   +------- Recovery <--------+
//! ```
//!
//! Any mode except `Halted` may be sent back to `Startup` by a reset, or
//! into `Monitor` from the tuning console. A fall in any mode ends in
//! `Halted`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_recovery;
mod calc_startup;
mod calc_walking;
mod calibration;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::fmt;

use comms_if::eqpt::joint::JointId;
use util::{archive::ArchiveError, params::LoadError};

// Internal
pub use calibration::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The gait state machine's modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GaitMode {
    /// Slewing into the neutral pose, `remaining` ticks left.
    Startup { remaining: u32 },

    /// Learning the IMU mounting offsets.
    TiltCalibration,

    /// Standing, waiting for a disturbance.
    IdleCheck,

    /// Taking balance steps.
    Walking,

    /// Holding the pose while vibrations die down.
    PostStepDamping,

    /// Stepping back to a neutral stance.
    Recovery(RecoveryStage),

    /// Joints frozen, orientation logged.
    Monitor,

    /// Fallen. Only a restart of the executable leaves this mode.
    Halted,
}

/// Stages of the recovery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryStage {
    Stepping,
    Settling,
}

/// Possible errors that can occur during GaitCtrl processing.
#[derive(Debug, thiserror::Error)]
pub enum GaitCtrlError {
    #[error("Demand for joint {0:?} is not finite, holding the previous pose")]
    NonFiniteDemand(JointId),
}

/// Errors that can occur while initialising GaitCtrl.
#[derive(Debug, thiserror::Error)]
pub enum GaitCtrlInitError {
    #[error("Could not load the GaitCtrl parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not create the GaitCtrl archive: {0}")]
    ArchiveError(#[from] ArchiveError),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl fmt::Display for GaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaitMode::Startup { .. } => write!(f, "Startup"),
            GaitMode::TiltCalibration => write!(f, "TiltCalibration"),
            GaitMode::IdleCheck => write!(f, "IdleCheck"),
            GaitMode::Walking => write!(f, "Walking"),
            GaitMode::PostStepDamping => write!(f, "PostStepDamping"),
            GaitMode::Recovery(RecoveryStage::Stepping) => write!(f, "Recovery(Stepping)"),
            GaitMode::Recovery(RecoveryStage::Settling) => write!(f, "Recovery(Settling)"),
            GaitMode::Monitor => write!(f, "Monitor"),
            GaitMode::Halted => write!(f, "Halted"),
        }
    }
}

//! Parameters structure for GaitCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::eqpt::joint::JointId;

use super::CalibrationParams;
use crate::{
    balance::BalanceParams, dispatch::DispatchParams, fall_monitor::FallParams,
    joints::PoseEntry, kinematics::LegGeometry, trajectory::TrajectoryParams,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters for Gait Control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub geometry: LegGeometry,

    pub trajectory: TrajectoryParams,

    pub balance: BalanceParams,

    pub gait: GaitParams,

    pub calibration: CalibrationParams,

    pub fall: FallParams,

    /// Initial values of the live tuning parameters.
    pub tuning: TuningParams,

    pub dispatch: DispatchParams,

    /// Pose assumed before the first actuator readback.
    pub initial_pose: Vec<PoseEntry>,

    /// Pose reached at the end of startup.
    pub neutral_pose: Vec<PoseEntry>,

    /// Safe pose commanded on a fall.
    pub crouch_pose: Vec<PoseEntry>,
}

/// Timing and transition thresholds of the gait state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct GaitParams {
    /// Number of ticks taken to move into the neutral pose.
    pub startup_ticks: u32,

    /// Phase end of a walking step.
    ///
    /// Units: ticks
    pub walk_phase_end: u32,

    /// Units: ticks per tick
    pub phase_rate: u32,

    /// Roll magnitude which starts walking from idle.
    ///
    /// Units: radians
    pub idle_roll_trigger_rad: f64,

    /// Units: radians
    pub idle_pitch_trigger_rad: f64,

    /// Ticks waited after walking before the recovery step starts.
    pub damping_ticks: u32,

    /// Sway amplitude of the recovery step with the feet together.
    ///
    /// Units: millimetres
    pub recovery_sway_base_mm: f64,

    /// Additional sway amplitude at full foot offset.
    ///
    /// Units: millimetres
    pub recovery_sway_gain_mm: f64,

    /// Units: ticks
    pub recovery_phase_end: u32,

    /// Units: ticks
    pub recovery_lift_start: u32,

    /// Ticks the pose is held after the recovery step.
    pub recovery_settle_ticks: u32,

    /// Monitor mode logs once every this many ticks.
    pub monitor_log_period: u32,
}

/// Parameters which can be changed while running from the tuning console.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    /// Ankle pitch ticks per raw pitch rate unit.
    pub pitch_gyro_gain: f64,

    /// Ankle roll ticks per raw roll rate unit.
    pub roll_gyro_gain: f64,

    /// Peak swing foot lift.
    ///
    /// Units: millimetres
    pub max_lift_mm: f64,

    /// Peak lateral body sway during recovery.
    ///
    /// Units: millimetres
    pub max_sway_mm: f64,

    /// Number of steps walked before damping and recovery.
    pub walk_count_limit: u32,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        use JointId::*;

        let pose = |entries: &[(JointId, i16)]| -> Vec<PoseEntry> {
            entries
                .iter()
                .map(|(joint, ticks)| PoseEntry {
                    joint: *joint,
                    ticks: *ticks,
                })
                .collect()
        };

        Self {
            geometry: LegGeometry::default(),
            trajectory: TrajectoryParams::default(),
            balance: BalanceParams::default(),
            gait: GaitParams::default(),
            calibration: CalibrationParams::default(),
            fall: FallParams::default(),
            tuning: TuningParams::default(),
            dispatch: DispatchParams::default(),
            initial_pose: pose(&[(ShoulderPitchR, -5400), (ShoulderPitchL, -5400)]),
            neutral_pose: pose(&[
                (HipSwingR, 661),
                (HipSwingL, 661),
                (KneeR, 1322),
                (KneeL, 1322),
                (AnklePitchR, 661),
                (AnklePitchL, 661),
                (ShoulderPitchR, -2700),
                (ShoulderPitchL, -2760),
            ]),
            crouch_pose: pose(&[
                (HipSwingR, 2100),
                (HipSwingL, 2100),
                (KneeR, 4200),
                (KneeL, 4200),
                (AnklePitchR, 2100),
                (AnklePitchL, 2100),
                (ShoulderPitchR, -1350),
                (ShoulderPitchL, -1350),
                (ElbowR, 2700),
                (ElbowL, 2700),
            ]),
        }
    }
}

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            startup_ticks: 100,
            walk_phase_end: 18,
            phase_rate: 1,
            idle_roll_trigger_rad: 0.033,
            idle_pitch_trigger_rad: 0.044,
            damping_ticks: 30,
            recovery_sway_base_mm: 17.0,
            recovery_sway_gain_mm: 17.0,
            recovery_phase_end: 50,
            recovery_lift_start: 25,
            recovery_settle_ticks: 50,
            monitor_log_period: 10,
        }
    }
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            pitch_gyro_gain: 0.08,
            roll_gyro_gain: 0.10,
            max_lift_mm: 35.0,
            max_sway_mm: 25.0,
            walk_count_limit: 1,
        }
    }
}

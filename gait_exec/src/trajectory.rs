//! Gait trajectory generation
//!
//! Turns the balance integrators and the step phase into foot targets for
//! both legs, plus the auxiliary motions that go with a step: the swing
//! foot lift, the lateral body sway used during recovery, hip rotation and
//! arm spread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

use comms_if::eqpt::joint::Side;
use util::maths::lin_map;

use crate::{balance::BalanceState, joints::mirror, kinematics::FootTarget, phase::PhaseState, units};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Denominators smaller than this are treated as zero.
const DENOM_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Trajectory shaping parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TrajectoryParams {
    /// Lateral distance from the hip yaw axis to the hip roll axis.
    ///
    /// Units: millimetres
    pub hip_offset_mm: f64,

    /// Forward offset at which the feet are pulled fully inward.
    ///
    /// Units: millimetres
    pub max_step_mm: f64,

    /// Units: millimetres
    pub max_inward_mm: f64,

    /// Swing foot lateral offset at which the arms are fully spread.
    ///
    /// Units: millimetres
    pub arm_spread_ref_mm: f64,

    /// Shoulder roll when the arms are fully spread.
    ///
    /// Units: actuator ticks
    pub arm_spread_ref_ticks: f64,
}

/// Foot targets and hip rotation for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepTargets {
    pub support: FootTarget,
    pub swing: FootTarget,

    /// Units: radians
    pub hip_rotation_rad: f64,

    /// Units: radians
    pub hip_yaw_rad: f64,

    /// Units: millimetres
    pub inward_mm: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for TrajectoryParams {
    fn default() -> Self {
        Self {
            hip_offset_mm: 21.5,
            max_step_mm: 45.0,
            max_inward_mm: 15.0,
            arm_spread_ref_mm: 70.0,
            arm_spread_ref_ticks: 510.0,
        }
    }
}

impl StepTargets {
    /// Target of the leg on the given side.
    pub fn for_side(&self, side: Side, phase: &PhaseState) -> FootTarget {
        if side == phase.support {
            self.support
        } else {
            self.swing
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Swing foot lift for the current phase.
///
/// A half sine over the swing window peaking at `max_lift_mm`, zero outside
/// it.
pub fn foot_lift(phase: &PhaseState, max_lift_mm: f64) -> f64 {
    let span = phase.end as f64 - (phase.lift_start + phase.land_end) as f64;

    if !phase.in_swing_window() || span <= 0.0 {
        return 0.0;
    }

    max_lift_mm * (PI * (phase.counter - phase.lift_start) as f64 / span).sin()
}

/// Body sway during a recovery step.
///
/// The sway follows a half sine over the phase with amplitude
/// `max_sway_mm`, directed along the line from the hip to the support foot.
/// Returns the `(forward, lateral)` sway.
pub fn lateral_sway(
    phase: &PhaseState,
    balance: &BalanceState,
    max_sway_mm: f64,
    params: &TrajectoryParams,
) -> (f64, f64) {
    let k = max_sway_mm * (PI * phase.fraction()).sin();

    let rot = balance.hip_rotation_rad;
    let num = balance.support_forward_mm.abs() + (params.hip_offset_mm * rot.sin()).abs();
    let denom = balance.support_lateral_mm + params.hip_offset_mm * rot.cos() - rot;

    let t = if denom.abs() < DENOM_EPSILON {
        FRAC_PI_2
    } else {
        (num / denom).atan()
    };

    let forward = if balance.support_forward_mm > 0.0 {
        k * t.sin()
    } else {
        -k * t.sin()
    };

    (forward, k * t.cos())
}

/// Compute the foot targets of both legs.
///
/// With `rotate_hip` set the hip rotation and inward pull are recomputed
/// from the support foot's position, otherwise the current values in
/// `balance` are kept.
pub fn step(
    phase: &PhaseState,
    balance: &BalanceState,
    rotate_hip: bool,
    params: &TrajectoryParams,
) -> StepTargets {
    let support_x = balance.support_forward_mm - balance.sway_forward_mm;
    let support_y = balance.support_lateral_mm - balance.sway_lateral_mm;
    let swing_x = balance.swing_forward_mm - balance.sway_forward_mm;
    let swing_y = balance.swing_lateral_mm + balance.sway_lateral_mm;

    let mut hip_rotation_rad = balance.hip_rotation_rad;
    let mut hip_yaw_rad = balance.hip_yaw_rad;
    let mut inward_mm = balance.inward_mm;

    if rotate_hip {
        let denom = support_y + params.hip_offset_mm;

        if denom.abs() < DENOM_EPSILON {
            hip_rotation_rad = 0.0;
        } else {
            hip_rotation_rad = mirror(phase.support, 0.5 * (support_x / denom).atan());
            inward_mm = (params.max_inward_mm * support_x / params.max_step_mm).abs();
        }
        hip_yaw_rad = hip_rotation_rad;
    }

    StepTargets {
        support: FootTarget {
            forward_mm: support_x,
            lateral_mm: support_y - inward_mm,
            height_mm: balance.leg_height_mm,
        },
        swing: FootTarget {
            forward_mm: swing_x,
            lateral_mm: swing_y - inward_mm,
            height_mm: balance.leg_height_mm - balance.lift_mm,
        },
        hip_rotation_rad,
        hip_yaw_rad,
        inward_mm,
    }
}

/// Shoulder roll that spreads the arms in proportion to the swing foot's
/// lateral offset. Never negative.
///
/// Units: radians
pub fn arm_spread(balance: &BalanceState, params: &TrajectoryParams) -> f64 {
    let ticks = lin_map(
        (0.0, params.arm_spread_ref_mm),
        (0.0, params.arm_spread_ref_ticks),
        balance.swing_lateral_mm,
    );

    units::ticks_to_rad(ticks.max(0.0))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_foot_lift() {
        let mut phase = PhaseState::new(18, Side::Right);

        phase.counter = 0;
        assert_eq!(foot_lift(&phase, 35.0), 0.0);

        phase.counter = 9;
        assert!((foot_lift(&phase, 35.0) - 35.0).abs() < 1e-9);

        phase.counter = 18;
        assert!(foot_lift(&phase, 35.0).abs() < 1e-9);

        // Recovery lifts only in the second half
        let mut phase = PhaseState::new(50, Side::Left);
        phase.lift_start = 25;
        phase.counter = 20;
        assert_eq!(foot_lift(&phase, 35.0), 0.0);
        phase.counter = 37;
        assert!(foot_lift(&phase, 35.0) > 30.0);
    }

    #[test]
    fn test_sway() {
        let params = TrajectoryParams::default();
        let mut phase = PhaseState::new(50, Side::Left);
        phase.counter = 25;
        let mut balance = BalanceState::new(185.0);

        // Feet together: purely lateral sway at full amplitude
        let (fwd, lat) = lateral_sway(&phase, &balance, 25.0, &params);
        assert!(fwd.abs() < 1e-9);
        assert!((lat - 25.0).abs() < 1e-9);

        // Foot forward tips the sway forward
        balance.support_forward_mm = 20.0;
        let (fwd, lat) = lateral_sway(&phase, &balance, 25.0, &params);
        assert!(fwd > 0.0);
        assert!(lat > 0.0 && lat < 25.0);

        // Zero denominator
        balance.support_lateral_mm = -params.hip_offset_mm;
        let (fwd, lat) = lateral_sway(&phase, &balance, 25.0, &params);
        assert!((fwd - 25.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_step_targets() {
        let params = TrajectoryParams::default();
        let phase = PhaseState::new(18, Side::Right);
        let mut balance = BalanceState::new(180.0);
        balance.support_lateral_mm = 10.0;
        balance.swing_lateral_mm = 10.0;
        balance.support_forward_mm = 9.0;
        balance.swing_forward_mm = -9.0;
        balance.lift_mm = 20.0;

        let t = step(&phase, &balance, true, &params);

        assert!((t.inward_mm - 3.0).abs() < 1e-12);
        assert!((t.hip_rotation_rad - 0.5 * (9.0f64 / 31.5).atan()).abs() < 1e-12);
        assert_eq!(t.hip_yaw_rad, t.hip_rotation_rad);
        assert_eq!(t.support.height_mm, 180.0);
        assert_eq!(t.swing.height_mm, 160.0);
        assert!((t.support.lateral_mm - 7.0).abs() < 1e-12);
        assert_eq!(t.for_side(Side::Left, &phase), t.swing);

        // Mirrored for left support
        let phase = PhaseState::new(18, Side::Left);
        let left = step(&phase, &balance, true, &params);
        assert_eq!(left.hip_rotation_rad, -t.hip_rotation_rad);
    }

    #[test]
    fn test_step_rotation_guard() {
        let params = TrajectoryParams::default();
        let phase = PhaseState::new(18, Side::Right);
        let mut balance = BalanceState::new(185.0);
        balance.support_lateral_mm = -params.hip_offset_mm;
        balance.support_forward_mm = 12.0;
        balance.inward_mm = 2.0;
        balance.hip_rotation_rad = 0.3;

        let t = step(&phase, &balance, true, &params);
        assert_eq!(t.hip_rotation_rad, 0.0);
        assert_eq!(t.inward_mm, 2.0);

        // Without rotation the current values are kept
        let t = step(&phase, &balance, false, &params);
        assert_eq!(t.hip_rotation_rad, 0.3);
    }

    #[test]
    fn test_arm_spread() {
        let params = TrajectoryParams::default();
        let mut balance = BalanceState::new(185.0);

        balance.swing_lateral_mm = -5.0;
        assert_eq!(arm_spread(&balance, &params), 0.0);

        balance.swing_lateral_mm = 70.0;
        assert!((arm_spread(&balance, &params) - units::ticks_to_rad(510.0)).abs() < 1e-12);
    }
}

//! Leg inverse kinematics
//!
//! Each leg is modelled as a thigh and shin of equal length with a fixed
//! lateral offset between the hip roll axis and the ankle roll axis. Hip
//! swing and ankle pitch are split symmetrically about the knee so the foot
//! stays parallel to the ground.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::{clamp, slew, sqrt_pos};

use crate::{joints::LegAngles, units};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distances below this are treated as zero when dividing.
const DIST_EPSILON_MM: f64 = 1e-9;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Fixed leg geometry and actuator capabilities.
#[derive(Debug, Clone, Deserialize)]
pub struct LegGeometry {
    /// Combined offset between the hip and ankle roll axes and the pitch
    /// chain.
    ///
    /// Units: millimetres
    pub roll_offset_mm: f64,

    /// Maximum straight line hip-to-ankle distance the solver will accept.
    ///
    /// Units: millimetres
    pub max_reach_mm: f64,

    /// Length of the fully extended pitch chain.
    ///
    /// Units: millimetres
    pub max_leg_mm: f64,

    /// Maximum half knee angle, the knee itself bends up to twice this.
    ///
    /// Units: radians
    pub max_half_knee_rad: f64,

    /// Maximum change in knee or hip lateral angle per tick.
    ///
    /// Units: radians/tick
    pub max_rate_rad: f64,
}

/// Desired position of an ankle relative to its hip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FootTarget {
    /// Units: millimetres, forward positive
    pub forward_mm: f64,

    /// Units: millimetres, outward positive in the leg's frame
    pub lateral_mm: f64,

    /// Height of the hip above the ankle.
    ///
    /// Units: millimetres
    pub height_mm: f64,
}

/// Result of solving a single leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegSolution {
    pub angles: LegAngles,

    /// The target was out of reach, this is the reduced hip height at which
    /// the leg reaches it. The caller should adopt it as the new leg height.
    pub limited_height_mm: Option<f64>,

    /// True if the knee or hip lateral rate limit was applied.
    pub rate_limited: bool,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for LegGeometry {
    fn default() -> Self {
        Self {
            roll_offset_mm: 64.5,
            max_reach_mm: 129.0,
            max_leg_mm: 130.0,
            max_half_knee_rad: units::ticks_to_rad(1800.0),
            max_rate_rad: units::ticks_to_rad(100.0),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the joint angles of one leg for the given foot target.
///
/// `prev` is the leg's current commanded state, used for rate limiting. Hip
/// yaw is not touched by the solver and is carried over from `prev`.
///
/// Targets beyond reach are clamped onto the reach sphere rather than
/// producing undefined angles.
pub fn solve_leg(target: &FootTarget, prev: &LegAngles, geom: &LegGeometry) -> LegSolution {
    let x = target.forward_mm;
    let y = target.lateral_mm;
    let h = target.height_mm;

    let mut limited_height_mm = None;
    let mut rate_limited = false;

    // Straight line distance between the knee and ankle pitch axes
    let lateral_len = (y * y + h * h).sqrt();
    let mut reach = (x * x + (lateral_len - geom.roll_offset_mm).powi(2)).sqrt();

    if reach > geom.max_reach_mm {
        let x_lim = clamp(x, -geom.max_reach_mm, geom.max_reach_mm);
        let pitch_len = sqrt_pos(geom.max_reach_mm.powi(2) - x_lim * x_lim);
        limited_height_mm = Some(sqrt_pos((pitch_len + geom.roll_offset_mm).powi(2) - y * y));
        reach = geom.max_reach_mm;
    }

    let swing = if reach > DIST_EPSILON_MM {
        (clamp(x, -reach, reach) / reach).asin()
    } else {
        0.0
    };

    let half_knee = clamp(reach / geom.max_leg_mm, -1.0, 1.0)
        .acos()
        .min(geom.max_half_knee_rad);

    if (2.0 * half_knee - prev.knee).abs() > geom.max_rate_rad {
        rate_limited = true;
    }
    let knee = slew(prev.knee, 2.0 * half_knee, geom.max_rate_rad);
    let half_knee = knee / 2.0;

    let lateral_target = y.atan2(h);
    if (lateral_target - prev.hip_lateral).abs() > geom.max_rate_rad {
        rate_limited = true;
    }
    let hip_lateral = slew(prev.hip_lateral, lateral_target, geom.max_rate_rad);

    LegSolution {
        angles: LegAngles {
            hip_swing: half_knee + swing,
            hip_lateral,
            hip_yaw: prev.hip_yaw,
            knee,
            ankle_pitch: half_knee - swing,
            ankle_roll: -hip_lateral,
        },
        limited_height_mm,
        rate_limited,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Run the solver until the rate limits have settled.
    fn settle(target: &FootTarget, geom: &LegGeometry) -> LegSolution {
        let mut prev = LegAngles::default();
        let mut sol = solve_leg(target, &prev, geom);
        for _ in 0..200 {
            prev = sol.angles;
            sol = solve_leg(target, &prev, geom);
        }
        sol
    }

    #[test]
    fn test_nominal_stance() {
        let geom = LegGeometry::default();
        let target = FootTarget {
            forward_mm: 0.0,
            lateral_mm: 0.0,
            height_mm: 185.0,
        };
        let sol = settle(&target, &geom);

        assert!(sol.limited_height_mm.is_none());
        assert!(!sol.rate_limited);

        // Pitch chain of 120.5 mm over a 130 mm leg
        let expected_half = (120.5f64 / 130.0).acos();
        assert!((sol.angles.knee - 2.0 * expected_half).abs() < 1e-9);
        assert!((sol.angles.hip_swing - sol.angles.ankle_pitch).abs() < 1e-12);
        assert_eq!(sol.angles.hip_lateral, 0.0);
    }

    #[test]
    fn test_forward_swing_is_split() {
        let geom = LegGeometry::default();
        let target = FootTarget {
            forward_mm: 30.0,
            lateral_mm: 0.0,
            height_mm: 170.0,
        };
        let sol = settle(&target, &geom);

        let swing = (sol.angles.hip_swing - sol.angles.ankle_pitch) / 2.0;
        assert!(swing > 0.0);
        assert!((sol.angles.hip_swing + sol.angles.ankle_pitch - sol.angles.knee).abs() < 1e-9);
    }

    #[test]
    fn test_reach_exceeded() {
        let geom = LegGeometry::default();
        let target = FootTarget {
            forward_mm: 200.0,
            lateral_mm: 20.0,
            height_mm: 230.0,
        };
        let sol = solve_leg(&target, &LegAngles::default(), &geom);

        let h = sol.limited_height_mm.expect("Expected a height limit");
        assert!(h.is_finite());
        assert!(h < target.height_mm);

        let a = sol.angles;
        for v in [a.hip_swing, a.hip_lateral, a.knee, a.ankle_pitch, a.ankle_roll].iter() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_zero_reach() {
        let geom = LegGeometry::default();
        let target = FootTarget {
            forward_mm: 0.0,
            lateral_mm: 0.0,
            height_mm: geom.roll_offset_mm,
        };
        let sol = solve_leg(&target, &LegAngles::default(), &geom);

        assert!(sol.angles.hip_swing.is_finite());
        assert!(sol.angles.knee.is_finite());
    }

    #[test]
    fn test_knee_cap_and_rate() {
        let geom = LegGeometry::default();
        // A very short leg wants more than the knee cap allows
        let target = FootTarget {
            forward_mm: 0.0,
            lateral_mm: 0.0,
            height_mm: 70.0,
        };

        let first = solve_leg(&target, &LegAngles::default(), &geom);
        assert!(first.rate_limited);
        assert!((first.angles.knee - geom.max_rate_rad).abs() < 1e-12);

        let sol = settle(&target, &geom);
        assert!(sol.angles.knee <= 2.0 * geom.max_half_knee_rad + 1e-12);
    }

    #[test]
    fn test_lateral_rate_limit() {
        let geom = LegGeometry::default();
        let target = FootTarget {
            forward_mm: 0.0,
            lateral_mm: 60.0,
            height_mm: 150.0,
        };
        let sol = solve_leg(&target, &LegAngles::default(), &geom);

        assert!((sol.angles.hip_lateral - geom.max_rate_rad).abs() < 1e-12);
        assert_eq!(sol.angles.ankle_roll, -sol.angles.hip_lateral);
    }
}

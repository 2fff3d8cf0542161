//! Whole-body joint angle state
//!
//! Angles are held in radians in joint space. Lateral and yaw quantities are
//! expressed in each leg's own frame: a positive hip lateral angle moves that
//! foot outward, so the same body-frame motion has opposite signs on the two
//! legs. Hip yaw follows the body-frame rotation on the right leg and its
//! mirror on the left, the waist takes the body-frame value directly.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use comms_if::eqpt::joint::{JointDems, JointId, JointKind, Side};

use crate::units;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A pair of values, one per side of the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Sided<T> {
    pub right: T,
    pub left: T,
}

/// Joint angles of one leg.
///
/// Units: radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LegAngles {
    pub hip_swing: f64,
    pub hip_lateral: f64,
    pub hip_yaw: f64,
    pub knee: f64,
    pub ankle_pitch: f64,
    pub ankle_roll: f64,
}

/// Joint angles of one arm.
///
/// Units: radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ArmAngles {
    pub shoulder_pitch: f64,
    pub shoulder_roll: f64,
    pub shoulder_yaw: f64,
    pub elbow: f64,
}

/// The commanded angle of every joint on the robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct JointAngleSet {
    pub legs: Sided<LegAngles>,
    pub arms: Sided<ArmAngles>,

    /// Units: radians
    pub head: f64,

    /// Units: radians
    pub waist: f64,
}

/// One entry in a pose table. Joints not listed in a pose are at zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseEntry {
    pub joint: JointId,

    /// Units: actuator ticks
    pub ticks: i16,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl<T> Sided<T> {
    pub fn new(right: T, left: T) -> Self {
        Self { right, left }
    }
}

impl<T: Clone> Sided<T> {
    /// The same value on both sides.
    pub fn both(value: T) -> Self {
        Self {
            right: value.clone(),
            left: value,
        }
    }
}

impl<T> Index<Side> for Sided<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }
}

impl<T> IndexMut<Side> for Sided<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        }
    }
}

impl LegAngles {
    fn angle(&self, kind: JointKind) -> Option<f64> {
        match kind {
            JointKind::HipSwing => Some(self.hip_swing),
            JointKind::HipLateral => Some(self.hip_lateral),
            JointKind::HipYaw => Some(self.hip_yaw),
            JointKind::Knee => Some(self.knee),
            JointKind::AnklePitch => Some(self.ankle_pitch),
            JointKind::AnkleRoll => Some(self.ankle_roll),
            _ => None,
        }
    }

    /// Non-leg kinds fall through to the ankle roll, callers check
    /// `JointKind::is_leg` first.
    fn angle_mut(&mut self, kind: JointKind) -> &mut f64 {
        match kind {
            JointKind::HipSwing => &mut self.hip_swing,
            JointKind::HipLateral => &mut self.hip_lateral,
            JointKind::HipYaw => &mut self.hip_yaw,
            JointKind::Knee => &mut self.knee,
            JointKind::AnklePitch => &mut self.ankle_pitch,
            _ => &mut self.ankle_roll,
        }
    }
}

impl ArmAngles {
    fn angle(&self, kind: JointKind) -> Option<f64> {
        match kind {
            JointKind::ShoulderPitch => Some(self.shoulder_pitch),
            JointKind::ShoulderRoll => Some(self.shoulder_roll),
            JointKind::ShoulderYaw => Some(self.shoulder_yaw),
            JointKind::Elbow => Some(self.elbow),
            _ => None,
        }
    }

    fn angle_mut(&mut self, kind: JointKind) -> &mut f64 {
        match kind {
            JointKind::ShoulderPitch => &mut self.shoulder_pitch,
            JointKind::ShoulderRoll => &mut self.shoulder_roll,
            JointKind::ShoulderYaw => &mut self.shoulder_yaw,
            _ => &mut self.elbow,
        }
    }
}

impl JointAngleSet {
    /// Build a joint set from a pose table given in actuator ticks.
    pub fn from_pose(pose: &[PoseEntry]) -> Self {
        let mut set = Self::default();

        for entry in pose {
            *set.get_mut(entry.joint) = units::ticks_to_rad(entry.ticks as f64);
        }

        set
    }

    /// Build a joint set from demands read back from the actuators. Joints
    /// with no reading are left at zero.
    pub fn from_dems(dems: &JointDems) -> Self {
        let mut set = Self::default();

        for (joint, ticks) in dems.pos_ticks.iter() {
            *set.get_mut(*joint) = units::ticks_to_rad(*ticks as f64);
        }

        set
    }

    /// Get the angle of a joint.
    pub fn get(&self, joint: JointId) -> f64 {
        let side = match joint.side() {
            Some(s) => s,
            None if joint.kind() == JointKind::Head => return self.head,
            None => return self.waist,
        };

        match self.legs[side].angle(joint.kind()) {
            Some(a) => a,
            None => self.arms[side].angle(joint.kind()).unwrap_or(0.0),
        }
    }

    /// Get a mutable reference to the angle of a joint.
    pub fn get_mut(&mut self, joint: JointId) -> &mut f64 {
        let side = match joint.side() {
            Some(s) => s,
            None if joint.kind() == JointKind::Head => return &mut self.head,
            None => return &mut self.waist,
        };

        if joint.kind().is_leg() {
            self.legs[side].angle_mut(joint.kind())
        } else {
            self.arms[side].angle_mut(joint.kind())
        }
    }

    /// Move every joint a `1/remaining` fraction of the way to `target`.
    ///
    /// Called once per tick with `remaining` counting down to 1, this arrives
    /// at the target exactly on the final call.
    pub fn move_towards(&mut self, target: &JointAngleSet, remaining: u32) {
        let remaining = remaining.max(1) as f64;

        for joint in JointId::ALL.iter() {
            let goal = target.get(*joint);
            let angle = self.get_mut(*joint);
            *angle += (goal - *angle) / remaining;
        }
    }

    /// Set the hip yaw of both legs and the waist from a body-frame rotation.
    pub fn set_body_yaw(&mut self, yaw_rad: f64) {
        for side in Side::BOTH.iter() {
            self.legs[*side].hip_yaw = mirror(*side, yaw_rad);
        }
        self.waist = yaw_rad;
    }

    /// Returns the first joint whose angle is not finite, if any.
    pub fn first_non_finite(&self) -> Option<JointId> {
        JointId::ALL
            .iter()
            .copied()
            .find(|j| !self.get(*j).is_finite())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Express a body-frame lateral or yaw quantity in the given leg's frame.
pub fn mirror(side: Side, value: f64) -> f64 {
    side.sign() * value
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut set = JointAngleSet::default();

        for (i, joint) in JointId::ALL.iter().enumerate() {
            *set.get_mut(*joint) = i as f64;
        }
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(set.get(*joint), i as f64);
        }

        assert_eq!(set.legs.left.knee, set.get(JointId::KneeL));
        assert_eq!(set.arms.right.elbow, set.get(JointId::ElbowR));
    }

    #[test]
    fn test_move_towards() {
        let target = JointAngleSet::from_pose(&[PoseEntry {
            joint: JointId::KneeR,
            ticks: 1322,
        }]);
        let mut set = JointAngleSet::default();

        for remaining in (1..=100).rev() {
            set.move_towards(&target, remaining);
            assert!(set.legs.right.knee <= target.legs.right.knee + 1e-12);
        }

        assert!((set.legs.right.knee - target.legs.right.knee).abs() < 1e-12);
        assert_eq!(set.legs.left.knee, 0.0);
    }

    #[test]
    fn test_body_yaw_mirroring() {
        let mut set = JointAngleSet::default();
        set.set_body_yaw(0.1);

        assert_eq!(set.legs[Side::Right].hip_yaw, 0.1);
        assert_eq!(set.legs[Side::Left].hip_yaw, -0.1);
        assert_eq!(set.waist, 0.1);
    }

    #[test]
    fn test_non_finite() {
        let mut set = JointAngleSet::default();
        assert_eq!(set.first_non_finite(), None);

        set.arms.left.shoulder_roll = std::f64::NAN;
        assert_eq!(set.first_non_finite(), Some(JointId::ShoulderRollL));
    }
}

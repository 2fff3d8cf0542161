//! # Joint Equipment Definitions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Total number of commanded joints on the robot.
pub const NUM_JOINTS: usize = 22;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent to the actuators at the end of a control tick.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JointDems {
    /// The demanded position of each joint.
    ///
    /// Units: actuator ticks (1718.9 ticks per radian), 0 at the joint's
    /// mechanical centre.
    pub pos_ticks: HashMap<JointId, i16>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Side of the robot's body.
///
/// The discriminants match the leg indices used by the servo map, right
/// first.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum Side {
    Right = 0,
    Left = 1,
}

/// The kind of a joint, independent of which side it is on.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum JointKind {
    HipSwing,
    HipLateral,
    HipYaw,
    Knee,
    AnklePitch,
    AnkleRoll,
    ShoulderPitch,
    ShoulderRoll,
    ShoulderYaw,
    Elbow,
    Head,
    Waist,
}

/// IDs of all joints available to the robot
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum JointId {
    HipSwingR,
    HipSwingL,
    HipLateralR,
    HipLateralL,
    HipYawR,
    HipYawL,
    KneeR,
    KneeL,
    AnklePitchR,
    AnklePitchL,
    AnkleRollR,
    AnkleRollL,
    ShoulderPitchR,
    ShoulderPitchL,
    ShoulderRollR,
    ShoulderRollL,
    ShoulderYawR,
    ShoulderYawL,
    ElbowR,
    ElbowL,
    Head,
    Waist,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Side {
    /// Both sides, right first.
    pub const BOTH: [Side; 2] = [Side::Right, Side::Left];

    /// The opposite side.
    pub fn other(self) -> Self {
        match self {
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }

    /// Sign used to mirror a body-frame quantity into this side's frame.
    ///
    /// Right is `+1`, left is `-1`.
    pub fn sign(self) -> f64 {
        match self {
            Side::Right => 1.0,
            Side::Left => -1.0,
        }
    }
}

impl JointKind {
    /// Returns true if the joint belongs to a leg.
    pub fn is_leg(self) -> bool {
        matches!(
            self,
            JointKind::HipSwing
                | JointKind::HipLateral
                | JointKind::HipYaw
                | JointKind::Knee
                | JointKind::AnklePitch
                | JointKind::AnkleRoll
        )
    }
}

impl JointId {
    /// Every joint, in dispatch order.
    pub const ALL: [JointId; NUM_JOINTS] = [
        JointId::HipSwingR,
        JointId::HipSwingL,
        JointId::HipLateralR,
        JointId::HipLateralL,
        JointId::HipYawR,
        JointId::HipYawL,
        JointId::KneeR,
        JointId::KneeL,
        JointId::AnklePitchR,
        JointId::AnklePitchL,
        JointId::AnkleRollR,
        JointId::AnkleRollL,
        JointId::ShoulderPitchR,
        JointId::ShoulderPitchL,
        JointId::ShoulderRollR,
        JointId::ShoulderRollL,
        JointId::ShoulderYawR,
        JointId::ShoulderYawL,
        JointId::ElbowR,
        JointId::ElbowL,
        JointId::Head,
        JointId::Waist,
    ];

    /// Get the joint of the given kind on the given side.
    ///
    /// The side is ignored for the head and waist, which are on the body's
    /// centre line.
    pub fn new(kind: JointKind, side: Side) -> Self {
        use JointId::*;
        use JointKind as K;

        match (kind, side) {
            (K::HipSwing, Side::Right) => HipSwingR,
            (K::HipSwing, Side::Left) => HipSwingL,
            (K::HipLateral, Side::Right) => HipLateralR,
            (K::HipLateral, Side::Left) => HipLateralL,
            (K::HipYaw, Side::Right) => HipYawR,
            (K::HipYaw, Side::Left) => HipYawL,
            (K::Knee, Side::Right) => KneeR,
            (K::Knee, Side::Left) => KneeL,
            (K::AnklePitch, Side::Right) => AnklePitchR,
            (K::AnklePitch, Side::Left) => AnklePitchL,
            (K::AnkleRoll, Side::Right) => AnkleRollR,
            (K::AnkleRoll, Side::Left) => AnkleRollL,
            (K::ShoulderPitch, Side::Right) => ShoulderPitchR,
            (K::ShoulderPitch, Side::Left) => ShoulderPitchL,
            (K::ShoulderRoll, Side::Right) => ShoulderRollR,
            (K::ShoulderRoll, Side::Left) => ShoulderRollL,
            (K::ShoulderYaw, Side::Right) => ShoulderYawR,
            (K::ShoulderYaw, Side::Left) => ShoulderYawL,
            (K::Elbow, Side::Right) => ElbowR,
            (K::Elbow, Side::Left) => ElbowL,
            (K::Head, _) => Head,
            (K::Waist, _) => Waist,
        }
    }

    /// The kind of this joint.
    pub fn kind(self) -> JointKind {
        use JointId::*;

        match self {
            HipSwingR | HipSwingL => JointKind::HipSwing,
            HipLateralR | HipLateralL => JointKind::HipLateral,
            HipYawR | HipYawL => JointKind::HipYaw,
            KneeR | KneeL => JointKind::Knee,
            AnklePitchR | AnklePitchL => JointKind::AnklePitch,
            AnkleRollR | AnkleRollL => JointKind::AnkleRoll,
            ShoulderPitchR | ShoulderPitchL => JointKind::ShoulderPitch,
            ShoulderRollR | ShoulderRollL => JointKind::ShoulderRoll,
            ShoulderYawR | ShoulderYawL => JointKind::ShoulderYaw,
            ElbowR | ElbowL => JointKind::Elbow,
            Head => JointKind::Head,
            Waist => JointKind::Waist,
        }
    }

    /// The side of this joint, or `None` for centre line joints.
    pub fn side(self) -> Option<Side> {
        use JointId::*;

        match self {
            Head | Waist => None,
            HipSwingR | HipLateralR | HipYawR | KneeR | AnklePitchR | AnkleRollR
            | ShoulderPitchR | ShoulderRollR | ShoulderYawR | ElbowR => Some(Side::Right),
            _ => Some(Side::Left),
        }
    }
}

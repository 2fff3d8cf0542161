//! # Output stage
//!
//! Converts GaitCtrl's joint angles into actuator demands. Gyro feedback is
//! added to the ankles, every joint is clamped to its range and the change
//! since the last dispatched demand is slew limited. The crouched safe pose
//! skips the feedback and the slew limit so it is reached as fast as the
//! actuators allow.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use comms_if::eqpt::joint::{JointDems, JointId, JointKind};
use util::maths::{clamp, slew};

use crate::{gait_ctrl::OutputData, units};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Output stage parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchParams {
    pub limits: JointLimits,

    /// Maximum change of any joint between consecutive ticks.
    ///
    /// Units: actuator ticks
    pub slew_limit_ticks: i16,
}

/// Allowed range of each joint kind, `[min, max]`, applied to both sides.
///
/// Units: actuator ticks
#[derive(Debug, Clone, Deserialize)]
pub struct JointLimits {
    pub hip_swing: [i16; 2],
    pub hip_lateral: [i16; 2],
    pub hip_yaw: [i16; 2],
    pub knee: [i16; 2],
    pub ankle_pitch: [i16; 2],
    pub ankle_roll: [i16; 2],
    pub shoulder_pitch: [i16; 2],
    pub shoulder_roll: [i16; 2],
    pub shoulder_yaw: [i16; 2],
    pub elbow: [i16; 2],
    pub head: [i16; 2],
    pub waist: [i16; 2],
}

/// Converts joint angles into limited actuator demands.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    params: DispatchParams,

    /// Demands dispatched on the previous tick.
    last: HashMap<JointId, i16>,
}

/// Report on the output stage processing of one tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatchReport {
    /// Number of joints clamped to their range.
    pub num_range_limited: usize,

    /// Number of joints held back by the slew limit.
    pub num_slew_limited: usize,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            limits: JointLimits::default(),
            slew_limit_ticks: 100,
        }
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            hip_swing: [-4000, 4000],
            hip_lateral: [-450, 800],
            hip_yaw: [-1500, 1500],
            knee: [-200, 4500],
            ankle_pitch: [-3500, 3500],
            ankle_roll: [-900, 420],
            shoulder_pitch: [-5600, 5600],
            shoulder_roll: [-100, 2800],
            shoulder_yaw: [-2700, 2700],
            elbow: [-2800, 2800],
            head: [-2700, 2700],
            waist: [-1500, 1500],
        }
    }
}

impl JointLimits {
    /// The `(min, max)` range of the given joint kind.
    pub fn range(&self, kind: JointKind) -> (i16, i16) {
        let r = match kind {
            JointKind::HipSwing => self.hip_swing,
            JointKind::HipLateral => self.hip_lateral,
            JointKind::HipYaw => self.hip_yaw,
            JointKind::Knee => self.knee,
            JointKind::AnklePitch => self.ankle_pitch,
            JointKind::AnkleRoll => self.ankle_roll,
            JointKind::ShoulderPitch => self.shoulder_pitch,
            JointKind::ShoulderRoll => self.shoulder_roll,
            JointKind::ShoulderYaw => self.shoulder_yaw,
            JointKind::Elbow => self.elbow,
            JointKind::Head => self.head,
            JointKind::Waist => self.waist,
        };

        (r[0], r[1])
    }
}

impl Dispatcher {
    pub fn new(params: DispatchParams) -> Self {
        Self {
            params,
            last: HashMap::new(),
        }
    }

    /// Set the demands the slew limit starts from, normally the positions
    /// read back from the actuators.
    ///
    /// Positions outside a joint's range are clamped into it.
    pub fn seed(&mut self, dems: &JointDems) {
        self.last = dems
            .pos_ticks
            .iter()
            .map(|(joint, ticks)| (*joint, self.clamp_to_range(*joint, *ticks as i32) as i16))
            .collect();
    }

    /// Produce this tick's actuator demands.
    pub fn process(&mut self, output: &OutputData) -> (JointDems, DispatchReport) {
        let mut report = DispatchReport::default();
        let mut dems = JointDems::default();
        let fb = output.gyro_feedback;

        for joint in JointId::ALL.iter() {
            let mut ticks = units::rad_to_ticks(output.joints.get(*joint)) as i32;

            if !output.safe_pose {
                ticks += match joint {
                    JointId::AnklePitchR | JointId::AnklePitchL => fb.pitch_ticks as i32,
                    JointId::AnkleRollR => -(fb.roll_ticks as i32),
                    JointId::AnkleRollL => fb.roll_ticks as i32,
                    _ => 0,
                };
            }

            let mut limited = self.clamp_to_range(*joint, ticks);
            let mut range_limited = limited != ticks;

            if !output.safe_pose {
                if let Some(last) = self.last.get(joint) {
                    let slewed = slew(*last as i32, limited, self.params.slew_limit_ticks as i32);
                    if slewed != limited {
                        report.num_slew_limited += 1;
                    }

                    // The slew start may itself be out of range
                    limited = self.clamp_to_range(*joint, slewed);
                    range_limited |= limited != slewed;
                }
            }

            if range_limited {
                report.num_range_limited += 1;
            }

            dems.pos_ticks.insert(*joint, limited as i16);
        }

        self.last = dems.pos_ticks.clone();

        if report.num_range_limited > 0 || report.num_slew_limited > 0 {
            trace!(
                "Output stage limited {} joints to range and {} by slew",
                report.num_range_limited,
                report.num_slew_limited
            );
        }

        (dems, report)
    }

    fn clamp_to_range(&self, joint: JointId, ticks: i32) -> i32 {
        let (min, max) = self.params.limits.range(joint.kind());
        clamp(ticks, min as i32, max as i32)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        gait_ctrl::{GaitCtrl, GyroFeedback, InputData},
        joints::JointAngleSet,
    };
    use comms_if::eqpt::imu::RawOrientation;
    use util::module::State;

    fn output(joints: JointAngleSet) -> OutputData {
        OutputData {
            joints,
            gyro_feedback: GyroFeedback::default(),
            safe_pose: false,
            release_torque: false,
        }
    }

    #[test]
    fn test_slew_limit_holds() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        let mut target = JointAngleSet::default();
        target.legs.right.knee = units::ticks_to_rad(4000.0);
        target.arms.left.shoulder_pitch = units::ticks_to_rad(-3000.0);

        let (first, _) = dispatcher.process(&output(JointAngleSet::default()));
        let mut prev = first;

        for _ in 0..60 {
            let (dems, report) = dispatcher.process(&output(target));
            for joint in JointId::ALL.iter() {
                let diff = dems.pos_ticks[joint] as i32 - prev.pos_ticks[joint] as i32;
                assert!(diff.abs() <= 100, "{:?} moved {} ticks", joint, diff);
            }
            assert!(report.num_range_limited == 0);
            prev = dems;
        }

        assert_eq!(prev.pos_ticks[&JointId::KneeR], 4000);
        assert_eq!(prev.pos_ticks[&JointId::ShoulderPitchL], -3000);
    }

    #[test]
    fn test_limits() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        let mut joints = JointAngleSet::default();
        joints.legs.left.hip_lateral = units::ticks_to_rad(-1000.0);
        joints.legs.right.ankle_roll = 1.0;

        let (dems, report) = dispatcher.process(&output(joints));

        assert_eq!(dems.pos_ticks[&JointId::HipLateralL], -450);
        assert_eq!(dems.pos_ticks[&JointId::AnkleRollR], 420);
        assert_eq!(report.num_range_limited, 2);
    }

    #[test]
    fn test_gyro_feedback_signs() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        let mut out = output(JointAngleSet::default());
        out.gyro_feedback = GyroFeedback {
            pitch_ticks: 8,
            roll_ticks: 10,
        };

        let (dems, _) = dispatcher.process(&out);

        assert_eq!(dems.pos_ticks[&JointId::AnklePitchR], 8);
        assert_eq!(dems.pos_ticks[&JointId::AnklePitchL], 8);
        assert_eq!(dems.pos_ticks[&JointId::AnkleRollR], -10);
        assert_eq!(dems.pos_ticks[&JointId::AnkleRollL], 10);
        assert_eq!(dems.pos_ticks[&JointId::KneeR], 0);
    }

    #[test]
    fn test_crouch_bypasses_slew() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        dispatcher.process(&output(JointAngleSet::default()));

        let mut ctrl = GaitCtrl::default();
        let crouch = JointAngleSet::from_pose(&ctrl.params().crouch_pose);
        let mut safe = output(crouch);
        safe.safe_pose = true;
        safe.gyro_feedback.pitch_ticks = 50;

        let (dems, report) = dispatcher.process(&safe);
        assert_eq!(dems.pos_ticks[&JointId::KneeL], 4200);
        assert_eq!(dems.pos_ticks[&JointId::AnklePitchR], 2100);
        assert_eq!(report.num_slew_limited, 0);

        // And straight from a real fall
        let fallen = InputData {
            raw: RawOrientation {
                pitch: 500,
                roll: units::ROLL_WRAP_RAW,
                ..Default::default()
            },
        };
        let (out, _) = ctrl.proc(&fallen).unwrap();
        let (dems, _) = dispatcher.process(&out);
        assert_eq!(dems.pos_ticks[&JointId::ElbowR], 2700);
    }

    #[test]
    fn test_seed() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        let mut seed = JointDems::default();
        seed.pos_ticks.insert(JointId::Head, 1000);
        dispatcher.seed(&seed);

        let (dems, _) = dispatcher.process(&output(JointAngleSet::default()));
        assert_eq!(dems.pos_ticks[&JointId::Head], 900);
    }

    #[test]
    fn test_out_of_range_seed() {
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        let mut seed = JointDems::default();
        seed.pos_ticks.insert(JointId::HipLateralR, 2000);
        seed.pos_ticks.insert(JointId::AnkleRollL, -1500);
        dispatcher.seed(&seed);

        let mut prev = JointDems::default();
        for i in 0..20 {
            let (dems, report) = dispatcher.process(&output(JointAngleSet::default()));
            for joint in JointId::ALL.iter() {
                let (min, max) = DispatchParams::default().limits.range(joint.kind());
                let ticks = dems.pos_ticks[joint];
                assert!(ticks >= min && ticks <= max, "{:?} dispatched at {}", joint, ticks);
            }
            if i == 0 {
                assert_eq!(report.num_range_limited, 0);
            }
            prev = dems;
        }

        assert_eq!(prev.pos_ticks[&JointId::HipLateralR], 0);
        assert_eq!(prev.pos_ticks[&JointId::AnkleRollL], 0);

        // Slewing starts from the range limit
        let mut dispatcher = Dispatcher::new(DispatchParams::default());
        dispatcher.seed(&seed);
        let (dems, _) = dispatcher.process(&output(JointAngleSet::default()));
        assert_eq!(dems.pos_ticks[&JointId::HipLateralR], 700);
        assert_eq!(dems.pos_ticks[&JointId::AnkleRollL], -800);
    }
}

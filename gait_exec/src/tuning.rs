//! # Tuning console
//!
//! Single character commands used to adjust the controller while it runs.
//! Keys arrive one at a time from the operator's terminal, and the console
//! keeps track of which parameter or servo group they apply to.
//!
//! | Keys              | Effect                                              |
//! |-------------------|-----------------------------------------------------|
//! | `' '`             | Back to the base mode                               |
//! | `r`               | Reset the controller to startup                     |
//! | `t`               | Enter the monitor                                   |
//! | `p`, digit, `+/-` | Select and nudge a tuning parameter                 |
//! | `k`/`u`/`a`, digit, side, `+/-` | Nudge a hip, shoulder or ankle joint  |
//! | `h`/`e`, side, `+/-` | Nudge a knee or elbow                            |
//! | `z`/`w`, `+/-`    | Nudge the head or waist                             |
//!
//! Sides are `r`, `l`, or `b` for both.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::fmt::Write;

use comms_if::eqpt::joint::{JointId, JointKind, Side};

use crate::{
    gait_ctrl::GaitCtrl,
    units::{ticks_to_rad, TICKS_PER_RAD},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Size of a single servo nudge.
///
/// Units: actuator ticks
pub const SERVO_NUDGE_TICKS: f64 = 30.0;

/// Size of a single gyro gain nudge.
pub const GAIN_NUDGE: f64 = 0.01;

const PARAM_NAMES: [&str; 9] = ["dx", "dy", "sw", "pg", "rg", "fh", "fhMax", "wc", "aH"];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Key interpreter for the tuning console.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuningConsole {
    mode: KeyMode,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyMode {
    Base,

    /// Parameter mode, with the currently selected parameter.
    Param(usize),

    /// Waiting for the joint index within a group.
    Index(ServoGroup),

    /// Waiting for the side of a joint kind.
    Side(JointKind),

    /// Nudging the selected joints.
    Nudge(JointKind, SideSelection),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ServoGroup {
    Hip,
    Shoulder,
    Ankle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SideSelection {
    One(Side),
    Both,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for KeyMode {
    fn default() -> Self {
        KeyMode::Base
    }
}

impl ServoGroup {
    fn joint_kind(self, index: char) -> Option<JointKind> {
        use JointKind::*;

        match (self, index) {
            (ServoGroup::Hip, '0') => Some(HipSwing),
            (ServoGroup::Hip, '1') => Some(HipLateral),
            (ServoGroup::Hip, '2') => Some(HipYaw),
            (ServoGroup::Shoulder, '0') => Some(ShoulderPitch),
            (ServoGroup::Shoulder, '1') => Some(ShoulderRoll),
            (ServoGroup::Shoulder, '2') => Some(ShoulderYaw),
            (ServoGroup::Ankle, '0') => Some(AnklePitch),
            (ServoGroup::Ankle, '1') => Some(AnkleRoll),
            _ => None,
        }
    }
}

impl SideSelection {
    fn sides(self) -> &'static [Side] {
        match self {
            SideSelection::One(Side::Right) => &[Side::Right],
            SideSelection::One(Side::Left) => &[Side::Left],
            SideSelection::Both => &Side::BOTH,
        }
    }
}

impl TuningConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one key, returning any text to echo back to the operator.
    ///
    /// Once a fall has halted the controller every key is refused, the
    /// crouched pose and the balance parameters stay frozen.
    pub fn process(&mut self, key: char, ctrl: &mut GaitCtrl) -> Option<String> {
        if ctrl.fall_monitor.is_latched() {
            self.mode = KeyMode::Base;
            return Some(String::from("Halted, tuning disabled"));
        }

        if key == ' ' {
            self.mode = KeyMode::Base;
            return None;
        }

        match self.mode {
            KeyMode::Base => self.process_base(key, ctrl),
            KeyMode::Param(selected) => self.process_param(key, selected, ctrl),
            KeyMode::Index(group) => {
                if let Some(kind) = group.joint_kind(key) {
                    self.mode = KeyMode::Side(kind);
                }
                None
            }
            KeyMode::Side(kind) => {
                let sel = match key {
                    'r' => Some(SideSelection::One(Side::Right)),
                    'l' => Some(SideSelection::One(Side::Left)),
                    'b' => Some(SideSelection::Both),
                    _ => None,
                };
                if let Some(sel) = sel {
                    self.mode = KeyMode::Nudge(kind, sel);
                }
                None
            }
            KeyMode::Nudge(kind, sel) => {
                let sign = nudge_sign(key)?;
                for side in sel.sides() {
                    nudge_joint(ctrl, JointId::new(kind, *side), sign);
                }
                Some(joint_table(ctrl))
            }
        }
    }

    fn process_base(&mut self, key: char, ctrl: &mut GaitCtrl) -> Option<String> {
        match key {
            'r' => {
                if ctrl.request_reset() {
                    Some(String::from("**** Reset ****"))
                } else {
                    Some(String::from("Reset ignored while halted"))
                }
            }
            't' => {
                if ctrl.enter_monitor() {
                    Some(String::from("**** Angle Display ****"))
                } else {
                    Some(String::from("Monitor ignored while halted"))
                }
            }
            'p' => {
                self.mode = KeyMode::Param(0);
                Some(param_table(0, ctrl))
            }
            'k' => self.select(KeyMode::Index(ServoGroup::Hip)),
            'u' => self.select(KeyMode::Index(ServoGroup::Shoulder)),
            'a' => self.select(KeyMode::Index(ServoGroup::Ankle)),
            'h' => self.select(KeyMode::Side(JointKind::Knee)),
            'e' => self.select(KeyMode::Side(JointKind::Elbow)),
            'z' => self.select(KeyMode::Nudge(
                JointKind::Head,
                SideSelection::One(Side::Right),
            )),
            'w' => self.select(KeyMode::Nudge(
                JointKind::Waist,
                SideSelection::One(Side::Right),
            )),
            _ => None,
        }
    }

    fn process_param(&mut self, key: char, selected: usize, ctrl: &mut GaitCtrl) -> Option<String> {
        if let Some(d) = key.to_digit(10) {
            let d = d as usize;
            if d < PARAM_NAMES.len() {
                self.mode = KeyMode::Param(d);
                return Some(param_table(d, ctrl));
            }
            return None;
        }

        let sign = nudge_sign(key)?;
        nudge_param(ctrl, selected, sign);

        info!(
            "Tuning parameter {} set to {:.2}",
            PARAM_NAMES[selected],
            param_value(ctrl, selected)
        );

        Some(param_table(selected, ctrl))
    }

    fn select(&mut self, mode: KeyMode) -> Option<String> {
        self.mode = mode;
        None
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn nudge_sign(key: char) -> Option<f64> {
    match key {
        '+' => Some(1.0),
        '-' => Some(-1.0),
        _ => None,
    }
}

fn nudge_joint(ctrl: &mut GaitCtrl, joint: JointId, sign: f64) {
    *ctrl.joints.get_mut(joint) += sign * ticks_to_rad(SERVO_NUDGE_TICKS);
}

fn nudge_param(ctrl: &mut GaitCtrl, index: usize, sign: f64) {
    match index {
        0 => ctrl.balance.support_forward_mm += sign,
        1 => ctrl.balance.support_lateral_mm += sign,
        2 => ctrl.tuning.max_sway_mm += sign,
        3 => ctrl.tuning.pitch_gyro_gain += sign * GAIN_NUDGE,
        4 => ctrl.tuning.roll_gyro_gain += sign * GAIN_NUDGE,
        5 => ctrl.balance.lift_mm += sign,
        6 => ctrl.tuning.max_lift_mm += sign,
        7 => {
            let limit = &mut ctrl.tuning.walk_count_limit;
            *limit = if sign > 0.0 {
                limit.saturating_add(1)
            } else {
                limit.saturating_sub(1)
            };
        }
        8 => ctrl.balance.leg_height_mm += sign,
        _ => (),
    }
}

fn param_value(ctrl: &GaitCtrl, index: usize) -> f64 {
    match index {
        0 => ctrl.balance.support_forward_mm,
        1 => ctrl.balance.support_lateral_mm,
        2 => ctrl.tuning.max_sway_mm,
        3 => ctrl.tuning.pitch_gyro_gain,
        4 => ctrl.tuning.roll_gyro_gain,
        5 => ctrl.balance.lift_mm,
        6 => ctrl.tuning.max_lift_mm,
        7 => ctrl.tuning.walk_count_limit as f64,
        8 => ctrl.balance.leg_height_mm,
        _ => 0.0,
    }
}

fn param_table(selected: usize, ctrl: &GaitCtrl) -> String {
    let mut table = format!("No:{}", selected);

    for (i, name) in PARAM_NAMES.iter().enumerate() {
        let value = param_value(ctrl, i);
        // Gains are shown in hundredths
        let shown = if i == 3 || i == 4 {
            (value * 100.0).round()
        } else {
            value.trunc()
        };
        write!(table, "\n{} {}:{}", i, name, shown).ok();
    }

    table
}

fn joint_table(ctrl: &GaitCtrl) -> String {
    let ticks = |j: JointId| (ctrl.joints.get(j) * TICKS_PER_RAD).round() as i32;
    let mut table = format!("Mode={}", ctrl.mode());

    for kind in [
        JointKind::HipSwing,
        JointKind::HipLateral,
        JointKind::HipYaw,
        JointKind::Knee,
        JointKind::AnklePitch,
        JointKind::AnkleRoll,
        JointKind::ShoulderPitch,
        JointKind::ShoulderRoll,
        JointKind::ShoulderYaw,
        JointKind::Elbow,
    ]
    .iter()
    {
        write!(
            table,
            "\n{:?}: {:7} {:7}",
            kind,
            ticks(JointId::new(*kind, Side::Right)),
            ticks(JointId::new(*kind, Side::Left))
        )
        .ok();
    }

    write!(
        table,
        "\nHead: {:7}\nWaist: {:7}",
        ticks(JointId::Head),
        ticks(JointId::Waist)
    )
    .ok();

    table
}

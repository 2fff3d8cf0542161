//! Implementations for the GaitCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, trace, warn};
use serde::Serialize;

// Internal
use super::{GaitCtrlError, GaitCtrlInitError, GaitMode, Params, TiltCalibrator, TuningParams};
use crate::{
    balance::BalanceState,
    fall_monitor::FallMonitor,
    joints::{JointAngleSet, Sided},
    kinematics,
    orientation::{OrientationSample, TiltOffsets},
    phase::PhaseState,
    trajectory, units,
};
use comms_if::eqpt::{
    imu::RawOrientation,
    joint::{JointId, Side},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::clamp,
    module::State,
    params,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gait control module state.
///
/// Holds the entire controller context. Nothing outside this structure is
/// mutated by a tick, so tests can drive it directly through
/// [`State::proc`].
pub struct GaitCtrl {
    pub(crate) params: Params,

    pub(crate) mode: GaitMode,

    /// Commanded joint angles, updated once per tick.
    pub(crate) joints: JointAngleSet,

    pub(crate) phase: PhaseState,

    pub(crate) balance: BalanceState,

    pub(crate) orientation: OrientationSample,

    pub(crate) offsets: TiltOffsets,

    pub(crate) tuning: TuningParams,

    pub(crate) calibrator: TiltCalibrator,

    pub(crate) fall_monitor: FallMonitor,

    /// Counter for the damping and settling holds.
    pub(crate) hold_ticks: u32,

    /// Steps completed in the current walk.
    pub(crate) steps_taken: u32,

    pub(crate) num_ticks: u64,

    pub(crate) report: StatusReport,

    arch_tick: Archiver,
}

/// Input data to Gait Control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The latest orientation sample from the IMU.
    pub raw: RawOrientation,
}

/// Output of Gait Control for the output stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputData {
    pub joints: JointAngleSet,

    pub gyro_feedback: GyroFeedback,

    /// The joints hold the crouched safe pose, which is dispatched without
    /// feedback or slew limiting.
    pub safe_pose: bool,

    /// Torque should be released on all joints this tick.
    pub release_torque: bool,
}

/// Ankle corrections proportional to the measured body rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GyroFeedback {
    /// Added to both ankle pitch joints.
    ///
    /// Units: actuator ticks
    pub pitch_ticks: i16,

    /// Subtracted from the right ankle roll and added to the left.
    ///
    /// Units: actuator ticks
    pub roll_ticks: i16,
}

/// Status report for GaitCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub mode_changed: bool,

    pub fall_detected: bool,

    /// Set on the tick the IMU offsets were learned.
    pub calibration_complete: bool,

    pub step_completed: bool,

    /// The leg could not reach its target and the leg height was reduced.
    pub height_limited: Sided<bool>,

    /// The knee or hip lateral rate limit was hit.
    pub rate_limited: Sided<bool>,

    /// At least one joint was clamped to its range.
    pub joints_limited: bool,
}

/// One row of the per-tick archive.
#[derive(Serialize)]
struct TickRecord {
    time_s: f64,
    mode: String,
    support: Side,
    phase_counter: u32,
    phase_end: u32,
    pitch_rad: f64,
    roll_rad: f64,
    support_forward_mm: f64,
    support_lateral_mm: f64,
    swing_forward_mm: f64,
    swing_lateral_mm: f64,
    leg_height_mm: f64,
    lift_mm: f64,
    hip_yaw_rad: f64,
    fall_detected: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for GaitCtrl {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl State for GaitCtrl {
    type InitData = &'static str;
    type InitError = GaitCtrlInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = GaitCtrlError;

    /// Initialise the GaitCtrl module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data)?;
        *self = Self::new(params);

        self.arch_tick = Archiver::from_path(session, "gait_ctrl/tick.csv")?;

        Ok(())
    }

    /// Perform one control tick.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();
        self.num_ticks += 1;

        // Everything is frozen once halted, only the torque release timer
        // runs.
        if self.fall_monitor.is_latched() {
            let release = self.fall_monitor.tick_halted(&self.params.fall);
            if release {
                warn!("Releasing joint torque");
            }
            return Ok((self.safe_output(release), self.report));
        }

        self.orientation = OrientationSample::from_raw(&input_data.raw, &self.offsets);

        if self.fall_monitor.is_fallen(&self.orientation, &self.params.fall) {
            error!(
                "Fall detected in {} (pitch {:.3} rad, roll {:.3} rad), crouching and halting",
                self.mode, self.orientation.pitch_rad, self.orientation.roll_rad
            );

            self.fall_monitor.latch();
            self.joints = JointAngleSet::from_pose(&self.params.crouch_pose);
            self.report.fall_detected = true;
            self.set_mode(GaitMode::Halted);

            return Ok((self.safe_output(false), self.report));
        }

        let prev_joints = self.joints;

        match self.mode {
            GaitMode::Startup { remaining } => self.calc_startup(remaining),
            GaitMode::TiltCalibration => self.calc_tilt_calibration(),
            GaitMode::IdleCheck => self.calc_idle_check(),
            GaitMode::Walking => self.calc_walking(),
            GaitMode::PostStepDamping => self.calc_post_step_damping(),
            GaitMode::Recovery(stage) => self.calc_recovery(stage),
            GaitMode::Monitor => self.calc_monitor(),
            // Handled by the fall latch above
            GaitMode::Halted => (),
        }

        self.enforce_limits();

        if let Some(joint) = self.joints.first_non_finite() {
            self.joints = prev_joints;
            return Err(GaitCtrlError::NonFiniteDemand(joint));
        }

        let output = OutputData {
            joints: self.joints,
            gyro_feedback: self.calc_gyro_feedback(),
            safe_pose: false,
            release_torque: false,
        };

        trace!(
            "GaitCtrl {} phase {}/{} support {:?} dx {:.2} dy {:.2} h {:.2}",
            self.mode,
            self.phase.counter,
            self.phase.end,
            self.phase.support,
            self.balance.support_forward_mm,
            self.balance.support_lateral_mm,
            self.balance.leg_height_mm
        );

        Ok((output, self.report))
    }
}

impl Archived for GaitCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let record = TickRecord {
            time_s: session::get_elapsed_seconds(),
            mode: self.mode.to_string(),
            support: self.phase.support,
            phase_counter: self.phase.counter,
            phase_end: self.phase.end,
            pitch_rad: self.orientation.pitch_rad,
            roll_rad: self.orientation.roll_rad,
            support_forward_mm: self.balance.support_forward_mm,
            support_lateral_mm: self.balance.support_lateral_mm,
            swing_forward_mm: self.balance.swing_forward_mm,
            swing_lateral_mm: self.balance.swing_lateral_mm,
            leg_height_mm: self.balance.leg_height_mm,
            lift_mm: self.balance.lift_mm,
            hip_yaw_rad: self.balance.hip_yaw_rad,
            fall_detected: self.report.fall_detected,
        };

        self.arch_tick.serialise(record)
    }
}

impl GaitCtrl {
    /// Create a new controller in `Startup` from the given parameters.
    pub fn new(params: Params) -> Self {
        let tuning = params.tuning;
        let nominal = params.balance.nominal_height_mm;
        let walk_end = params.gait.walk_phase_end;

        Self {
            mode: GaitMode::Startup {
                remaining: params.gait.startup_ticks,
            },
            joints: JointAngleSet::from_pose(&params.initial_pose),
            phase: PhaseState::new(walk_end, Side::Right),
            balance: BalanceState::new(nominal),
            orientation: OrientationSample::default(),
            offsets: TiltOffsets::default(),
            tuning,
            calibrator: TiltCalibrator::default(),
            fall_monitor: FallMonitor::default(),
            hold_ticks: 0,
            steps_taken: 0,
            num_ticks: 0,
            report: StatusReport::default(),
            arch_tick: Archiver::default(),
            params,
        }
    }

    /// Replace the assumed starting pose, for instance with positions read
    /// back from the actuators. Only has an effect before the first tick.
    pub fn set_initial_pose(&mut self, joints: JointAngleSet) {
        if self.num_ticks == 0 {
            self.joints = joints;
        }
    }

    /// Return the controller to `Startup`.
    ///
    /// Ignored once halted, returns false in that case.
    pub fn request_reset(&mut self) -> bool {
        if self.fall_monitor.is_latched() {
            warn!("Reset ignored, GaitCtrl is halted");
            return false;
        }

        self.set_mode(GaitMode::Startup {
            remaining: self.params.gait.startup_ticks,
        });
        true
    }

    /// Freeze the joints and log orientation until the next reset.
    ///
    /// Ignored once halted, returns false in that case.
    pub fn enter_monitor(&mut self) -> bool {
        if self.fall_monitor.is_latched() {
            warn!("Monitor ignored, GaitCtrl is halted");
            return false;
        }

        self.set_mode(GaitMode::Monitor);
        true
    }

    pub fn mode(&self) -> GaitMode {
        self.mode
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn joints(&self) -> &JointAngleSet {
        &self.joints
    }

    pub fn phase(&self) -> &PhaseState {
        &self.phase
    }

    pub fn balance(&self) -> &BalanceState {
        &self.balance
    }

    pub fn orientation(&self) -> &OrientationSample {
        &self.orientation
    }

    pub fn offsets(&self) -> TiltOffsets {
        self.offsets
    }

    pub fn tuning(&self) -> &TuningParams {
        &self.tuning
    }

    pub(crate) fn set_mode(&mut self, mode: GaitMode) {
        if mode != self.mode {
            info!("GaitCtrl mode {} -> {}", self.mode, mode);
            self.report.mode_changed = true;
        }
        self.mode = mode;
    }

    /// Generate the foot targets for this tick and solve both legs.
    ///
    /// The right leg is solved first. If it could not reach its target the
    /// reduced leg height also applies to the left leg.
    pub(crate) fn apply_trajectory(&mut self, rotate_hip: bool) {
        let targets = trajectory::step(&self.phase, &self.balance, rotate_hip, &self.params.trajectory);

        self.balance.hip_rotation_rad = targets.hip_rotation_rad;
        self.balance.hip_yaw_rad = targets.hip_yaw_rad;
        self.balance.inward_mm = targets.inward_mm;

        for side in Side::BOTH.iter() {
            let mut target = targets.for_side(*side, &self.phase);
            target.height_mm = if *side == self.phase.support {
                self.balance.leg_height_mm
            } else {
                self.balance.leg_height_mm - self.balance.lift_mm
            };

            let sol = kinematics::solve_leg(&target, &self.joints.legs[*side], &self.params.geometry);

            if let Some(h) = sol.limited_height_mm {
                trace!("{:?} leg out of reach, leg height reduced to {:.2} mm", side, h);
                self.balance.leg_height_mm = h;
                self.report.height_limited[*side] = true;
            }
            if sol.rate_limited {
                self.report.rate_limited[*side] = true;
            }

            self.joints.legs[*side] = sol.angles;
        }

        self.joints.set_body_yaw(self.balance.hip_yaw_rad);
    }

    /// Spread the arms to follow the swing foot.
    pub(crate) fn apply_arms(&mut self) {
        let spread = trajectory::arm_spread(&self.balance, &self.params.trajectory);
        self.joints.arms.right.shoulder_roll = spread;
        self.joints.arms.left.shoulder_roll = spread;
    }

    /// Enforce the joint ranges on the commanded state.
    ///
    /// If a limit is reached the corresponding flag in the status report will
    /// be raised.
    fn enforce_limits(&mut self) {
        for joint in JointId::ALL.iter() {
            let (min, max) = self.params.dispatch.limits.range(joint.kind());
            let min = units::ticks_to_rad(min as f64);
            let max = units::ticks_to_rad(max as f64);

            let angle = self.joints.get_mut(*joint);
            let limited = clamp(*angle, min, max);
            if limited != *angle {
                *angle = limited;
                self.report.joints_limited = true;
            }
        }
    }

    fn calc_gyro_feedback(&self) -> GyroFeedback {
        let pitch_rate = self.orientation.pitch_rate_raw as f64;
        let roll_rate = self.orientation.roll_rate_raw as f64;

        GyroFeedback {
            pitch_ticks: (self.tuning.pitch_gyro_gain * pitch_rate) as i16,
            roll_ticks: (self.tuning.roll_gyro_gain * roll_rate) as i16,
        }
    }

    fn safe_output(&self, release_torque: bool) -> OutputData {
        OutputData {
            joints: self.joints,
            gyro_feedback: GyroFeedback::default(),
            safe_pose: true,
            release_torque,
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::gait_ctrl::RecoveryStage;

    /// Raw sample of an upright robot with the given corrected tilt.
    pub(crate) fn raw_tilt(pitch_rad: f64, roll_rad: f64) -> InputData {
        InputData {
            raw: RawOrientation {
                pitch: units::rad_to_raw(pitch_rad),
                roll: units::wrap_roll(units::rad_to_raw(roll_rad)),
                ..Default::default()
            },
        }
    }

    pub(crate) fn level() -> InputData {
        raw_tilt(0.0, 0.0)
    }

    /// Run the controller until it reaches `IdleCheck` on a level stance.
    pub(crate) fn run_to_idle(ctrl: &mut GaitCtrl) {
        for _ in 0..1000 {
            if ctrl.mode() == GaitMode::IdleCheck {
                return;
            }
            ctrl.proc(&level()).unwrap();
        }
        panic!("Never reached IdleCheck, mode is {}", ctrl.mode());
    }

    #[test]
    fn test_startup_takes_configured_ticks() {
        let mut ctrl = GaitCtrl::default();
        let neutral = JointAngleSet::from_pose(&ctrl.params.neutral_pose);

        for i in 0..99 {
            ctrl.proc(&level()).unwrap();
            assert!(
                matches!(ctrl.mode(), GaitMode::Startup { .. }),
                "Left startup early on tick {}",
                i
            );
        }

        let (_, report) = ctrl.proc(&level()).unwrap();
        assert_eq!(ctrl.mode(), GaitMode::TiltCalibration);
        assert!(report.mode_changed);

        // Arms arrive exactly at the neutral pose
        assert!((ctrl.joints.arms.right.shoulder_pitch - neutral.arms.right.shoulder_pitch).abs() < 1e-9);
        assert!((ctrl.joints.arms.left.shoulder_pitch - neutral.arms.left.shoulder_pitch).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tilt_calibration() {
        let mut ctrl = GaitCtrl::default();
        for _ in 0..100 {
            ctrl.proc(&level()).unwrap();
        }
        assert_eq!(ctrl.mode(), GaitMode::TiltCalibration);

        let mut complete = false;
        for _ in 0..100 {
            let (_, report) = ctrl.proc(&level()).unwrap();
            complete |= report.calibration_complete;
        }

        assert!(complete);
        assert_eq!(ctrl.offsets(), TiltOffsets::default());
        assert_eq!(ctrl.mode(), GaitMode::IdleCheck);
    }

    #[test]
    fn test_calibration_learns_offsets() {
        let mut ctrl = GaitCtrl::default();
        let mounted = InputData {
            raw: RawOrientation {
                pitch: 24,
                roll: units::wrap_roll(-16),
                ..Default::default()
            },
        };

        for _ in 0..300 {
            ctrl.proc(&mounted).unwrap();
            if ctrl.mode() == GaitMode::IdleCheck {
                break;
            }
        }

        assert_eq!(ctrl.mode(), GaitMode::IdleCheck);
        assert_eq!(ctrl.offsets(), TiltOffsets { pitch: 24, roll: -16 });

        // Corrected orientation now reads level
        ctrl.proc(&mounted).unwrap();
        assert_eq!(ctrl.orientation().roll_rad, 0.0);
        assert_eq!(ctrl.orientation().pitch_rad, 0.0);
    }

    #[test]
    fn test_disturbance_starts_walking() {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);

        ctrl.proc(&raw_tilt(0.0, 0.1)).unwrap();
        assert_eq!(ctrl.mode(), GaitMode::Walking);
        assert_eq!(ctrl.phase().support, Side::Left);
        assert_eq!(ctrl.phase().counter, 1);
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);

        ctrl.proc(&raw_tilt(0.0, 0.1)).unwrap();
        assert_eq!(ctrl.mode(), GaitMode::Walking);

        let mut seen = vec![ctrl.mode()];
        for _ in 0..500 {
            let input = match ctrl.mode() {
                GaitMode::Walking => raw_tilt(0.05, 0.1),
                _ => level(),
            };
            ctrl.proc(&input).unwrap();
            if seen.last() != Some(&ctrl.mode()) {
                seen.push(ctrl.mode());
            }
            if ctrl.mode() == GaitMode::IdleCheck {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                GaitMode::Walking,
                GaitMode::PostStepDamping,
                GaitMode::Recovery(RecoveryStage::Stepping),
                GaitMode::Recovery(RecoveryStage::Settling),
                GaitMode::IdleCheck,
            ]
        );

        // Recovery leaves the stance neutral
        let b = ctrl.balance();
        assert_eq!(b.support_lateral_mm, 0.0);
        assert_eq!(b.swing_forward_mm, 0.0);
        assert!(b.hip_yaw_rad.abs() < 1e-9);
        assert_eq!(ctrl.phase().support, Side::Left);
        assert_eq!(ctrl.phase().end, ctrl.params.gait.walk_phase_end);
    }

    #[test]
    fn test_recovery_converges_from_offsets() {
        let starts = [(45.0, 45.0, 30.0), (-45.0, 0.0, 0.0), (20.0, 10.0, -70.0)];

        for (forward, lateral, swing) in starts.iter() {
            let mut ctrl = GaitCtrl::default();
            run_to_idle(&mut ctrl);

            ctrl.balance.support_forward_mm = *forward;
            ctrl.balance.support_lateral_mm = *lateral;
            ctrl.balance.swing_forward_mm = *swing;
            ctrl.balance.swing_lateral_mm = *lateral;
            ctrl.hold_ticks = 0;
            ctrl.set_mode(GaitMode::PostStepDamping);

            for _ in 0..200 {
                ctrl.proc(&level()).unwrap();
                if ctrl.mode() == GaitMode::Recovery(RecoveryStage::Settling) {
                    break;
                }
            }
            assert_eq!(ctrl.mode(), GaitMode::Recovery(RecoveryStage::Settling));

            let b = ctrl.balance();
            assert_eq!(b.support_forward_mm, 0.0);
            assert_eq!(b.support_lateral_mm, 0.0);
            assert_eq!(b.swing_forward_mm, 0.0);
            assert_eq!(b.swing_lateral_mm, 0.0);
            assert!(b.hip_yaw_rad.abs() < 1e-9);
            assert!(b.inward_mm.abs() < 1e-9);
            assert_eq!(b.leg_height_mm, ctrl.params.balance.nominal_height_mm);
        }
    }

    #[test]
    fn test_fall_during_walking() {
        // Forward pitch fall and a sideways roll fall
        for fall in [raw_tilt(0.5, 0.0), raw_tilt(0.0, 0.4), raw_tilt(0.0, -0.4)].iter() {
            fall_during_walking(fall);
        }
    }

    fn fall_during_walking(fall: &InputData) {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);
        ctrl.proc(&raw_tilt(0.0, 0.1)).unwrap();
        for _ in 0..5 {
            ctrl.proc(&raw_tilt(0.0, 0.1)).unwrap();
        }
        assert_eq!(ctrl.mode(), GaitMode::Walking);

        let (out, report) = ctrl.proc(fall).unwrap();
        assert!(report.fall_detected, "No fall detected for {:?}", fall.raw);
        assert!(out.safe_pose);
        assert_eq!(ctrl.mode(), GaitMode::Halted);
        assert_eq!(out.joints, JointAngleSet::from_pose(&ctrl.params.crouch_pose));

        let phase = *ctrl.phase();
        let balance = *ctrl.balance();

        // Frozen, resets ignored, torque released once
        assert!(!ctrl.request_reset());
        let mut releases = 0;
        for _ in 0..20 {
            let (o, _) = ctrl.proc(&level()).unwrap();
            assert_eq!(o.joints, out.joints);
            if o.release_torque {
                releases += 1;
            }
        }
        assert_eq!(releases, 1);
        assert_eq!(*ctrl.phase(), phase);
        assert_eq!(*ctrl.balance(), balance);
        assert_eq!(ctrl.mode(), GaitMode::Halted);
    }

    #[test]
    fn test_reset_and_monitor() {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);

        assert!(ctrl.enter_monitor());
        let frozen = *ctrl.joints();
        for _ in 0..25 {
            ctrl.proc(&raw_tilt(0.1, 0.1)).unwrap();
        }
        assert_eq!(*ctrl.joints(), frozen);
        assert_eq!(ctrl.mode(), GaitMode::Monitor);

        assert!(ctrl.request_reset());
        assert_eq!(
            ctrl.mode(),
            GaitMode::Startup {
                remaining: ctrl.params.gait.startup_ticks
            }
        );
        run_to_idle(&mut ctrl);
    }

    #[test]
    fn test_gyro_feedback() {
        let mut ctrl = GaitCtrl::default();
        let input = InputData {
            raw: RawOrientation {
                roll: units::ROLL_WRAP_RAW,
                pitch_rate: 100,
                roll_rate: -100,
                ..Default::default()
            },
        };

        let (out, _) = ctrl.proc(&input).unwrap();

        assert_eq!(out.gyro_feedback.pitch_ticks, 8);
        assert_eq!(out.gyro_feedback.roll_ticks, -10);
        assert!(!out.safe_pose);
    }
}

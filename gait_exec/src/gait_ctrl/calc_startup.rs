//! Startup, calibration, idle and monitor modes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;

use comms_if::eqpt::joint::Side;

use super::{GaitCtrl, GaitMode, TiltCalibrator};
use crate::{balance::BalanceState, joints::JointAngleSet, orientation::TiltOffsets, phase::PhaseState};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitCtrl {
    /// Slew every joint into the neutral pose, arriving on the last startup
    /// tick.
    ///
    /// On arrival all gait state is reset and the legs are solved into the
    /// nominal stance.
    pub(crate) fn calc_startup(&mut self, remaining: u32) {
        let neutral = JointAngleSet::from_pose(&self.params.neutral_pose);
        self.joints.move_towards(&neutral, remaining);

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.mode = GaitMode::Startup { remaining };
            return;
        }

        self.reset_gait();
        self.apply_trajectory(false);
        self.set_mode(GaitMode::TiltCalibration);
    }

    /// Accumulate the tilt calibration window.
    pub(crate) fn calc_tilt_calibration(&mut self) {
        let offsets = self.calibrator.accumulate(
            self.orientation.pitch_raw,
            self.orientation.roll_raw,
            &self.params.calibration,
        );

        if let Some(offsets) = offsets {
            info!(
                "Tilt calibration complete, pitch offset {} roll offset {}",
                offsets.pitch, offsets.roll
            );
            self.offsets = offsets;
            self.report.calibration_complete = true;
            self.set_mode(GaitMode::IdleCheck);
        }
    }

    /// Stand in the neutral stance, refining the offsets, until a
    /// disturbance starts walking.
    pub(crate) fn calc_idle_check(&mut self) {
        self.calibrator.refine(
            &mut self.offsets,
            self.orientation.pitch_raw,
            self.orientation.roll_raw,
            &self.params.calibration,
        );

        self.apply_trajectory(true);

        let roll = self.orientation.roll_rad;
        let pitch = self.orientation.pitch_rad;
        if roll.abs() > self.params.gait.idle_roll_trigger_rad
            || pitch.abs() > self.params.gait.idle_pitch_trigger_rad
        {
            self.phase.support = if roll > 0.0 { Side::Left } else { Side::Right };
            self.phase.counter = 1;
            self.steps_taken = 0;
            self.set_mode(GaitMode::Walking);
        }
    }

    /// Joints stay frozen, the orientation is logged periodically.
    pub(crate) fn calc_monitor(&mut self) {
        let period = self.params.gait.monitor_log_period.max(1) as u64;
        if self.num_ticks % period == 0 {
            info!(
                "Monitor R: {:5.0} P: {:5.0} RG: {:5} PG: {:5}",
                self.orientation.roll_rad * 1000.0,
                self.balance.pitch_tilt_rad * 1000.0,
                self.orientation.roll_rate_raw,
                self.orientation.pitch_rate_raw
            );
        }
    }

    /// Clear the gait state ready for calibration.
    fn reset_gait(&mut self) {
        self.offsets = TiltOffsets::default();
        self.calibrator = TiltCalibrator::default();
        self.balance = BalanceState::new(self.params.balance.nominal_height_mm);
        self.phase = PhaseState::new(self.params.gait.walk_phase_end, Side::Right);
        self.phase.rate = self.params.gait.phase_rate;
        self.steps_taken = 0;
        self.hold_ticks = 0;
    }
}

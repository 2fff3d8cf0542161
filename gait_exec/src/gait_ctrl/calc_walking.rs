//! Walking and post-step damping modes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;

use super::{GaitCtrl, GaitMode, RecoveryStage};
use crate::{
    phase::{self, PhaseEvent},
    trajectory,
};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitCtrl {
    /// One tick of active balance stepping.
    pub(crate) fn calc_walking(&mut self) {
        self.balance
            .update_active(&self.orientation, &self.phase, &self.params.balance);
        self.balance.return_to_vertical(&self.phase, &self.params.balance);
        self.balance.lift_mm = trajectory::foot_lift(&self.phase, self.tuning.max_lift_mm);

        self.apply_trajectory(true);
        self.apply_arms();

        if phase::advance(&mut self.phase, &mut self.balance) == PhaseEvent::StepCompleted {
            self.steps_taken += 1;
            self.report.step_completed = true;
            debug!("Step {} completed", self.steps_taken);

            if self.steps_taken >= self.tuning.walk_count_limit.max(1) {
                self.hold_ticks = 0;
                self.set_mode(GaitMode::PostStepDamping);
            }
        }
    }

    /// Hold the stance while vibration dies down, then size the recovery
    /// step from how far the feet ended up.
    pub(crate) fn calc_post_step_damping(&mut self) {
        self.apply_trajectory(true);

        if self.hold_ticks > self.params.gait.damping_ticks {
            self.phase.counter = 1;

            let b = &self.balance;
            let offset = (0.5 * b.swing_forward_mm.powi(2) + b.swing_lateral_mm.powi(2)).sqrt();
            self.tuning.max_sway_mm = self.params.gait.recovery_sway_base_mm
                + self.params.gait.recovery_sway_gain_mm * offset
                    / self.params.trajectory.max_step_mm;

            debug!("Recovery sway {:.1} mm", self.tuning.max_sway_mm);
            self.set_mode(GaitMode::Recovery(RecoveryStage::Stepping));
        } else {
            self.hold_ticks += 1;
        }
    }
}

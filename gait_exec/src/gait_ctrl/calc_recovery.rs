//! Recovery mode
//!
//! A single slow step which walks both feet back under the hips, followed
//! by a settling hold before returning to idle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::joint::Side;

use super::{GaitCtrl, GaitMode, RecoveryStage};
use crate::{
    phase::{self, PhaseEvent},
    trajectory,
};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitCtrl {
    pub(crate) fn calc_recovery(&mut self, stage: RecoveryStage) {
        match stage {
            RecoveryStage::Stepping => self.calc_recovery_step(),
            RecoveryStage::Settling => self.calc_recovery_settle(),
        }
    }

    fn calc_recovery_step(&mut self) {
        self.phase.lift_start = self.params.gait.recovery_lift_start;
        self.phase.end = self.params.gait.recovery_phase_end;

        self.balance.damped_return(&self.phase, &self.params.balance);
        self.balance.lift_mm = trajectory::foot_lift(&self.phase, self.tuning.max_lift_mm);

        let (sway_forward, sway_lateral) = trajectory::lateral_sway(
            &self.phase,
            &self.balance,
            self.tuning.max_sway_mm,
            &self.params.trajectory,
        );
        self.balance.sway_forward_mm = sway_forward;
        self.balance.sway_lateral_mm = sway_lateral;

        self.apply_trajectory(false);
        self.apply_arms();

        if phase::advance(&mut self.phase, &mut self.balance) == PhaseEvent::StepCompleted {
            self.balance
                .clear_offsets(self.params.balance.nominal_height_mm);

            self.phase.support = Side::Left;
            self.phase.end = self.params.gait.walk_phase_end;
            self.phase.lift_start = 0;
            self.phase.land_end = 0;
            self.phase.counter = 1;
            self.steps_taken = 0;

            self.hold_ticks = 1;
            self.set_mode(GaitMode::Recovery(RecoveryStage::Settling));
        }
    }

    fn calc_recovery_settle(&mut self) {
        self.apply_trajectory(false);

        if self.hold_ticks > self.params.gait.recovery_settle_ticks {
            self.phase.counter = 1;
            self.set_mode(GaitMode::IdleCheck);
        } else {
            self.hold_ticks += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::state::test::{level, run_to_idle};
    use super::*;
    use util::module::State;

    #[test]
    fn test_recovery_timing() {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);
        ctrl.balance.support_lateral_mm = 20.0;
        ctrl.balance.swing_lateral_mm = 20.0;
        ctrl.phase.counter = 1;
        ctrl.set_mode(GaitMode::Recovery(RecoveryStage::Stepping));

        let mut stepping = 0;
        while ctrl.mode() == GaitMode::Recovery(RecoveryStage::Stepping) {
            ctrl.proc(&level()).unwrap();
            stepping += 1;
        }
        // Counter runs 1..=50, the 50th tick completes the step
        assert_eq!(stepping, 50);

        let mut settling = 0;
        while ctrl.mode() == GaitMode::Recovery(RecoveryStage::Settling) {
            ctrl.proc(&level()).unwrap();
            settling += 1;
        }
        assert_eq!(settling, 51);
        assert_eq!(ctrl.mode(), GaitMode::IdleCheck);
    }

    #[test]
    fn test_recovery_lifts_in_second_half() {
        let mut ctrl = GaitCtrl::default();
        run_to_idle(&mut ctrl);
        ctrl.tuning.max_sway_mm = 20.0;
        ctrl.phase.counter = 1;
        ctrl.set_mode(GaitMode::Recovery(RecoveryStage::Stepping));

        for tick in 1..50 {
            ctrl.proc(&level()).unwrap();
            let lift = ctrl.balance().lift_mm;
            if tick <= 25 {
                assert_eq!(lift, 0.0, "Lifted early on tick {}", tick);
            }
            // The body always sways towards the support foot
            assert!(ctrl.balance().sway_lateral_mm >= 0.0);
        }
    }
}

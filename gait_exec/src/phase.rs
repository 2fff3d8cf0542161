//! Step phase counter
//!
//! A step runs from counter 0 to the phase end. Within it the swing foot is
//! lifted between the lift start and `end - land_end`, and balance
//! corrections are only integrated inside that window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::Serialize;

use comms_if::eqpt::joint::Side;

use crate::balance::BalanceState;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Position within the current step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseState {
    /// Ticks into the current step, in `[0, end]`.
    pub counter: u32,

    /// Tick on which the step completes.
    pub end: u32,

    /// Ticks added per control tick.
    pub rate: u32,

    /// The swing window opens once the counter passes this value.
    pub lift_start: u32,

    /// The swing window closes this many ticks before the end.
    pub land_end: u32,

    /// The leg currently bearing the robot's weight.
    pub support: Side,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Outcome of advancing the phase by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Advanced,

    /// The step completed, support has moved to the other leg and the
    /// counter is back at zero.
    StepCompleted,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl PhaseState {
    /// A phase at the start of a step with no lift or landing margins.
    pub fn new(end: u32, support: Side) -> Self {
        Self {
            counter: 1,
            end,
            rate: 1,
            lift_start: 0,
            land_end: 0,
            support,
        }
    }

    /// The leg currently in the air, or about to be.
    pub fn swing(&self) -> Side {
        self.support.other()
    }

    /// True while the swing foot is off the ground.
    pub fn in_swing_window(&self) -> bool {
        self.counter > self.lift_start && self.counter + self.land_end <= self.end
    }

    /// True once the swing foot is coming in to land.
    pub fn is_landing(&self) -> bool {
        self.counter + self.land_end > self.end
    }

    /// Progress through the step as a fraction of the phase end.
    pub fn fraction(&self) -> f64 {
        if self.end == 0 {
            return 0.0;
        }
        self.counter as f64 / self.end as f64
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new(18, Side::Right)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance the phase by one tick.
///
/// When the counter has reached the phase end the step completes instead:
/// the support leg toggles, the counter wraps to zero, the lift is cleared
/// and the support and swing integrators swap roles.
pub fn advance(phase: &mut PhaseState, balance: &mut BalanceState) -> PhaseEvent {
    if phase.counter >= phase.end {
        phase.support = phase.support.other();
        phase.counter = 0;
        balance.swap_roles();

        trace!("Step completed, support now {:?}", phase.support);

        PhaseEvent::StepCompleted
    } else {
        phase.counter = (phase.counter + phase.rate).min(phase.end);
        PhaseEvent::Advanced
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_toggle_per_step() {
        let mut phase = PhaseState::new(18, Side::Right);
        phase.counter = 0;
        let mut balance = BalanceState::new(185.0);

        let mut toggles = 0;
        for _ in 0..19 {
            if advance(&mut phase, &mut balance) == PhaseEvent::StepCompleted {
                toggles += 1;
            }
        }

        // 18 ticks to reach the end, the 19th completes the step
        assert_eq!(toggles, 1);
        assert_eq!(phase.support, Side::Left);
        assert_eq!(phase.counter, 0);
    }

    #[test]
    fn test_first_step_from_new() {
        let mut phase = PhaseState::new(18, Side::Right);
        assert_eq!(phase.counter, 1);
        let mut balance = BalanceState::new(185.0);

        // 17 ticks from 1 to the end, the 18th completes the step
        for i in 0..18 {
            let event = advance(&mut phase, &mut balance);
            if i < 17 {
                assert_eq!(event, PhaseEvent::Advanced, "Completed early on tick {}", i);
            } else {
                assert_eq!(event, PhaseEvent::StepCompleted);
            }
        }

        assert_eq!(phase.support, Side::Left);
        assert_eq!(phase.counter, 0);

        // Later steps start from zero and take one tick longer
        let toggles = (0..19)
            .filter(|_| advance(&mut phase, &mut balance) == PhaseEvent::StepCompleted)
            .count();
        assert_eq!(toggles, 1);
        assert_eq!(phase.support, Side::Right);
        assert_eq!(phase.counter, 0);
    }

    #[test]
    fn test_counter_saturates() {
        let mut phase = PhaseState::new(18, Side::Right);
        phase.rate = 5;
        phase.counter = 16;
        let mut balance = BalanceState::new(185.0);

        assert_eq!(advance(&mut phase, &mut balance), PhaseEvent::Advanced);
        assert_eq!(phase.counter, 18);
        assert_eq!(advance(&mut phase, &mut balance), PhaseEvent::StepCompleted);
    }

    #[test]
    fn test_integrators_swap() {
        let mut phase = PhaseState::new(18, Side::Right);
        phase.counter = 18;
        let mut balance = BalanceState::new(185.0);
        balance.support_lateral_mm = 10.0;
        balance.swing_lateral_mm = 4.0;
        balance.support_forward_mm = -3.0;
        balance.swing_forward_mm = 3.0;
        balance.lift_mm = 12.0;

        advance(&mut phase, &mut balance);

        assert_eq!(balance.support_lateral_mm, 4.0);
        assert_eq!(balance.swing_lateral_mm, 10.0);
        assert_eq!(balance.prev_support_lateral_mm, 10.0);
        assert_eq!(balance.support_forward_mm, 3.0);
        assert_eq!(balance.swing_forward_mm, -3.0);
        assert_eq!(balance.prev_support_forward_mm, -3.0);
        assert_eq!(balance.lift_mm, 0.0);
    }

    #[test]
    fn test_swing_window() {
        let mut phase = PhaseState::new(50, Side::Left);
        phase.lift_start = 25;

        phase.counter = 25;
        assert!(!phase.in_swing_window());
        phase.counter = 26;
        assert!(phase.in_swing_window());
        phase.counter = 50;
        assert!(phase.in_swing_window());
        assert!(!phase.is_landing());
    }
}

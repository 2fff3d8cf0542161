//! # UVC balance controller
//!
//! Upper-body Vertical Control keeps the torso upright by moving the support
//! foot under the body. The measured tilt is treated as a rotation of the
//! support leg about the ankle: the leg's current lateral and forward angles
//! are increased by the tilt and the foot offsets are re-projected at the
//! same leg length. The swing foot shadows the support foot so that after
//! the support change the new support leg is already where it needs to be.
//!
//! Outside the swing window the support leg is walked back towards vertical,
//! and after a recovery step all offsets decay smoothly to zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::clamp;

use crate::{orientation::OrientationSample, phase::PhaseState};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Balance controller parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceParams {
    /// Tilt magnitudes below this are ignored.
    ///
    /// Units: radians
    pub dead_band_rad: f64,

    /// Fraction of the measured tilt applied as a correction each tick.
    pub tilt_gain: f64,

    /// Maximum outward offset of the support foot. The support foot never
    /// moves inward of the hip.
    ///
    /// Units: millimetres
    pub max_support_lateral_mm: f64,

    /// Units: millimetres
    pub max_support_forward_mm: f64,

    /// Maximum magnitude of the swing foot's offsets.
    ///
    /// Units: millimetres
    pub max_swing_offset_mm: f64,

    /// Forward distance the support foot returns towards vertical per tick
    /// before the swing window.
    ///
    /// Units: millimetres
    pub return_step_mm: f64,

    /// Horizon over which the lateral offset returns to vertical.
    ///
    /// Units: ticks
    pub return_horizon_ticks: f64,

    /// Units: millimetres
    pub nominal_height_mm: f64,

    /// Units: millimetres
    pub min_height_mm: f64,

    /// Fraction of the height deficit restored per tick.
    pub height_restore_rate: f64,

    /// Height lost per millimetre of foot travel while landing.
    pub landing_absorb_gain: f64,
}

/// Integrator state of the balance controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BalanceState {
    /// Forward offset of the support foot.
    ///
    /// Units: millimetres
    pub support_forward_mm: f64,

    /// Outward offset of the support foot, always in `[0, max]`.
    ///
    /// Units: millimetres
    pub support_lateral_mm: f64,

    /// Units: millimetres
    pub swing_forward_mm: f64,

    /// Units: millimetres
    pub swing_lateral_mm: f64,

    /// Support foot offsets at the last support change.
    ///
    /// Units: millimetres
    pub prev_support_forward_mm: f64,

    /// Units: millimetres
    pub prev_support_lateral_mm: f64,

    /// Height of the hips above the ankles.
    ///
    /// Units: millimetres
    pub leg_height_mm: f64,

    /// Swing foot lift.
    ///
    /// Units: millimetres
    pub lift_mm: f64,

    /// Lateral sway of the body during a recovery step.
    ///
    /// Units: millimetres
    pub sway_lateral_mm: f64,

    /// Units: millimetres
    pub sway_forward_mm: f64,

    /// Hip rotation used to shape the sway.
    ///
    /// Units: radians
    pub hip_rotation_rad: f64,

    /// Commanded body yaw. Follows the hip rotation but is decayed
    /// separately during recovery.
    ///
    /// Units: radians
    pub hip_yaw_rad: f64,

    /// Both feet are pulled inward by this much to accommodate the hip
    /// rotation.
    ///
    /// Units: millimetres
    pub inward_mm: f64,

    /// Roll correction for this tick, signed for the support leg.
    ///
    /// Units: radians
    pub roll_tilt_rad: f64,

    /// Units: radians
    pub pitch_tilt_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            dead_band_rad: 0.033,
            tilt_gain: 0.25,
            max_support_lateral_mm: 45.0,
            max_support_forward_mm: 45.0,
            max_swing_offset_mm: 70.0,
            return_step_mm: 3.0,
            return_horizon_ticks: 11.0,
            nominal_height_mm: 185.0,
            min_height_mm: 140.0,
            height_restore_rate: 0.07,
            landing_absorb_gain: 0.02,
        }
    }
}

impl BalanceState {
    /// A state with all offsets at zero and the legs at the given height.
    pub fn new(nominal_height_mm: f64) -> Self {
        Self {
            leg_height_mm: nominal_height_mm,
            ..Default::default()
        }
    }

    /// Active UVC correction.
    ///
    /// The tilt terms are refreshed every call. The integrators only change
    /// while the phase is in its swing window.
    pub fn update_active(
        &mut self,
        orientation: &OrientationSample,
        phase: &PhaseState,
        params: &BalanceParams,
    ) {
        // Shrink the tilt vector by the dead band
        let mut pitch = orientation.pitch_rad;
        let mut roll = orientation.roll_rad;
        let tilt = pitch.hypot(roll);
        if tilt > params.dead_band_rad {
            let k = (tilt - params.dead_band_rad) / tilt;
            pitch *= k;
            roll *= k;
        } else {
            pitch = 0.0;
            roll = 0.0;
        }

        // Positive roll tilt moves the support foot outward
        self.roll_tilt_rad = -phase.support.sign() * params.tilt_gain * roll;
        self.pitch_tilt_rad = params.tilt_gain * pitch;

        if !phase.in_swing_window() {
            return;
        }

        // Rotate the support leg by the tilt in the lateral plane, then in
        // the forward plane, keeping its projected length.
        let (lateral, height) = rotate_leg(
            self.support_lateral_mm,
            self.leg_height_mm,
            self.roll_tilt_rad,
        );
        self.support_lateral_mm = lateral;
        let (forward, height) = rotate_leg(self.support_forward_mm, height, self.pitch_tilt_rad);
        self.support_forward_mm = forward;
        self.leg_height_mm = height;

        self.support_lateral_mm = clamp(self.support_lateral_mm, 0.0, params.max_support_lateral_mm);
        self.support_forward_mm = clamp(
            self.support_forward_mm,
            -params.max_support_forward_mm,
            params.max_support_forward_mm,
        );

        // Swing foot shadows the support foot
        self.swing_lateral_mm = self.support_lateral_mm;
        self.swing_forward_mm = -self.support_forward_mm;

        // The legs must never cross inward of parallel
        let opening = self.support_lateral_mm + self.swing_lateral_mm;
        if opening < 0.0 {
            self.swing_lateral_mm -= opening;
        }
    }

    /// Return the support leg towards vertical and regulate leg height.
    ///
    /// Runs every walking tick after [`BalanceState::update_active`].
    pub fn return_to_vertical(&mut self, phase: &PhaseState, params: &BalanceParams) {
        if phase.counter <= phase.lift_start {
            let horizon = (params.return_horizon_ticks - phase.counter as f64).max(1.0);
            let k = self.support_lateral_mm / horizon;
            self.support_lateral_mm -= k;
            self.swing_lateral_mm += k;

            let step = params.return_step_mm;
            if self.support_forward_mm > step {
                self.support_forward_mm -= step;
                self.swing_forward_mm -= step;
            } else if self.support_forward_mm < -step {
                self.support_forward_mm += step;
                self.swing_forward_mm += step;
            } else {
                self.swing_forward_mm -= self.support_forward_mm;
                self.support_forward_mm = 0.0;
            }
        }
        self.clamp_swing(params);

        // Gradually restore leg height
        if params.nominal_height_mm > self.leg_height_mm {
            self.leg_height_mm +=
                (params.nominal_height_mm - self.leg_height_mm) * params.height_restore_rate;
        } else {
            self.leg_height_mm = params.nominal_height_mm;
        }

        // Crouch slightly on landing to absorb the impact
        if phase.is_landing() && self.roll_tilt_rad > 0.0 {
            let travel = (self.support_lateral_mm - self.prev_support_lateral_mm).abs()
                + (self.support_forward_mm - self.prev_support_forward_mm).abs();
            self.leg_height_mm -= travel * params.landing_absorb_gain;
        }

        if self.leg_height_mm < params.min_height_mm {
            self.leg_height_mm = params.min_height_mm;
        }
    }

    /// Decay all offsets, the body yaw and the height deficit so they reach
    /// their neutral values exactly at the end of the phase.
    pub fn damped_return(&mut self, phase: &PhaseState, params: &BalanceParams) {
        let remaining = (phase.end.saturating_sub(phase.counter) + 1) as f64;

        let k_lateral = self.support_lateral_mm / remaining;
        self.support_lateral_mm -= k_lateral;

        let k_forward = self.support_forward_mm / remaining;
        self.support_forward_mm -= k_forward;

        self.inward_mm -= self.inward_mm / remaining;
        self.hip_yaw_rad -= self.hip_yaw_rad / remaining;

        if phase.counter <= phase.lift_start {
            self.swing_lateral_mm += k_lateral;
            self.swing_forward_mm -= k_forward;
        } else {
            self.swing_lateral_mm -= self.swing_lateral_mm / remaining;
            self.swing_forward_mm -= self.swing_forward_mm / remaining;
        }

        self.leg_height_mm += (params.nominal_height_mm - self.leg_height_mm) / remaining;

        self.clamp_swing(params);
    }

    /// Exchange the support and swing integrators at a support change.
    pub fn swap_roles(&mut self) {
        self.lift_mm = 0.0;

        self.prev_support_lateral_mm = self.support_lateral_mm;
        std::mem::swap(&mut self.support_lateral_mm, &mut self.swing_lateral_mm);

        self.prev_support_forward_mm = self.support_forward_mm;
        std::mem::swap(&mut self.support_forward_mm, &mut self.swing_forward_mm);
    }

    /// Clear all offsets ready for a new gait, keeping the sway shaping
    /// inputs.
    pub fn clear_offsets(&mut self, nominal_height_mm: f64) {
        self.support_forward_mm = 0.0;
        self.support_lateral_mm = 0.0;
        self.swing_forward_mm = 0.0;
        self.swing_lateral_mm = 0.0;
        self.prev_support_forward_mm = 0.0;
        self.prev_support_lateral_mm = 0.0;
        self.sway_forward_mm = 0.0;
        self.sway_lateral_mm = 0.0;
        self.lift_mm = 0.0;
        self.leg_height_mm = nominal_height_mm;
    }

    fn clamp_swing(&mut self, params: &BalanceParams) {
        let max = params.max_swing_offset_mm;
        self.swing_lateral_mm = clamp(self.swing_lateral_mm, -max, max);
        self.swing_forward_mm = clamp(self.swing_forward_mm, -max, max);
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Rotate a leg with the given foot offset and height about the ankle.
///
/// Returns the new offset and height.
fn rotate_leg(offset_mm: f64, height_mm: f64, tilt_rad: f64) -> (f64, f64) {
    let angle = offset_mm.atan2(height_mm) + tilt_rad;
    let length = offset_mm.hypot(height_mm);

    (length * angle.sin(), length * angle.cos())
}

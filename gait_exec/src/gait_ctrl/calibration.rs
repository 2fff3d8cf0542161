//! Static tilt calibration
//!
//! The IMU's mounting offsets are learned while the robot stands still in
//! its neutral pose. Samples are accumulated only while consecutive readings
//! agree, so any disturbance restarts the window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::orientation::TiltOffsets;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationParams {
    /// Number of consecutive stable samples averaged into the offsets.
    pub num_samples: u32,

    /// Maximum change between consecutive samples for them to be stable.
    ///
    /// Units: 1/16 degree
    pub stability_band: i16,

    /// Ticks between single-unit offset refinements while idle.
    pub refine_period_ticks: u32,
}

/// Accumulator for the tilt calibration window.
///
/// The sample counter is shared with the idle refinement, which starts
/// counting from wherever calibration left it.
#[derive(Debug, Clone, Default)]
pub struct TiltCalibrator {
    count: u32,
    sum_pitch: i32,
    sum_roll: i32,
    prev_pitch: i16,
    prev_roll: i16,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            num_samples: 100,
            stability_band: 1,
            refine_period_ticks: 50,
        }
    }
}

impl TiltCalibrator {
    /// Add one offset-free sample to the window.
    ///
    /// Returns the averaged offsets once the window is full.
    pub fn accumulate(
        &mut self,
        pitch_raw: i16,
        roll_raw: i16,
        params: &CalibrationParams,
    ) -> Option<TiltOffsets> {
        let band = params.stability_band as i32;
        let stable = (pitch_raw as i32 - self.prev_pitch as i32).abs() <= band
            && (roll_raw as i32 - self.prev_roll as i32).abs() <= band;

        if stable {
            self.count += 1;
            self.sum_pitch += pitch_raw as i32;
            self.sum_roll += roll_raw as i32;
        } else {
            self.count = 0;
            self.sum_pitch = 0;
            self.sum_roll = 0;
        }
        self.prev_pitch = pitch_raw;
        self.prev_roll = roll_raw;

        if self.count >= params.num_samples.max(1) {
            let n = self.count as i32;
            Some(TiltOffsets {
                pitch: (self.sum_pitch / n) as i16,
                roll: (self.sum_roll / n) as i16,
            })
        } else {
            None
        }
    }

    /// Nudge the offsets by one unit towards the corrected reading, once
    /// every refine period.
    ///
    /// Returns true if the offsets were refined on this call.
    pub fn refine(
        &mut self,
        offsets: &mut TiltOffsets,
        pitch_raw: i16,
        roll_raw: i16,
        params: &CalibrationParams,
    ) -> bool {
        if self.count < params.refine_period_ticks {
            self.count += 1;
            return false;
        }

        self.count = 0;
        offsets.roll = offsets.roll.saturating_add(roll_raw.signum());
        offsets.pitch = offsets.pitch.saturating_add(pitch_raw.signum());

        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_tilt() {
        let params = CalibrationParams::default();
        let mut cal = TiltCalibrator::default();

        for i in 0..99 {
            assert_eq!(cal.accumulate(0, 0, &params), None, "Early result on sample {}", i);
        }
        assert_eq!(cal.accumulate(0, 0, &params), Some(TiltOffsets::default()));
    }

    #[test]
    fn test_average_and_restart() {
        let params = CalibrationParams::default();
        let mut cal = TiltCalibrator::default();

        // The first sample is compared against zero, so a jump restarts
        assert_eq!(cal.accumulate(30, -8, &params), None);

        let mut result = None;
        let mut n = 0;
        while result.is_none() {
            let pitch = if n % 2 == 0 { 30 } else { 31 };
            result = cal.accumulate(pitch, -8, &params);
            n += 1;
        }

        assert_eq!(n, 100);
        assert_eq!(result, Some(TiltOffsets { pitch: 30, roll: -8 }));
    }

    #[test]
    fn test_refine() {
        let params = CalibrationParams::default();
        let mut cal = TiltCalibrator::default();
        let mut offsets = TiltOffsets { pitch: 5, roll: 5 };

        // Counter starts at zero, so the first refinement lands on the 51st
        // call
        for _ in 0..50 {
            assert!(!cal.refine(&mut offsets, 3, -2, &params));
        }
        assert!(cal.refine(&mut offsets, 3, -2, &params));
        assert_eq!(offsets, TiltOffsets { pitch: 6, roll: 4 });

        // Nothing to correct when level
        for _ in 0..51 {
            cal.refine(&mut offsets, 0, 0, &params);
        }
        assert_eq!(offsets, TiltOffsets { pitch: 6, roll: 4 });
    }
}

//! Fall detection and halt latch

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::orientation::OrientationSample;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FallParams {
    /// Pitch or roll magnitude beyond which the robot is considered fallen.
    ///
    /// Units: radians
    pub threshold_rad: f64,

    /// Ticks spent in the crouch before joint torque is released.
    pub release_after_ticks: u32,
}

/// Watches the tilt every tick and latches once a fall is seen.
#[derive(Debug, Clone, Default)]
pub struct FallMonitor {
    /// Ticks since the fall, `None` while upright.
    ticks_since_fall: Option<u32>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for FallParams {
    fn default() -> Self {
        Self {
            threshold_rad: 0.35,
            release_after_ticks: 3,
        }
    }
}

impl FallMonitor {
    /// Returns true if the sample is beyond the fall threshold on either
    /// axis.
    pub fn is_fallen(&self, sample: &OrientationSample, params: &FallParams) -> bool {
        sample.pitch_rad.abs() > params.threshold_rad || sample.roll_rad.abs() > params.threshold_rad
    }

    /// Latch the fall. Only the first call has any effect.
    pub fn latch(&mut self) {
        if self.ticks_since_fall.is_none() {
            self.ticks_since_fall = Some(0);
        }
    }

    pub fn is_latched(&self) -> bool {
        self.ticks_since_fall.is_some()
    }

    /// Count one tick spent halted.
    ///
    /// Returns true on exactly the tick on which torque should be released.
    pub fn tick_halted(&mut self, params: &FallParams) -> bool {
        match self.ticks_since_fall {
            Some(ref mut t) => {
                *t = t.saturating_add(1);
                *t == params.release_after_ticks
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_threshold() {
        let params = FallParams::default();
        let monitor = FallMonitor::default();

        let mut sample = OrientationSample::default();
        sample.pitch_rad = 0.34;
        assert!(!monitor.is_fallen(&sample, &params));

        sample.roll_rad = -0.36;
        assert!(monitor.is_fallen(&sample, &params));
    }

    #[test]
    fn test_release_once() {
        let params = FallParams::default();
        let mut monitor = FallMonitor::default();

        assert!(!monitor.tick_halted(&params));

        monitor.latch();
        let releases: Vec<bool> = (0..6).map(|_| monitor.tick_halted(&params)).collect();

        assert_eq!(releases, vec![false, false, true, false, false, false]);
        assert!(monitor.is_latched());
    }
}

//! # Data Store

use comms_if::eqpt::{imu::RawOrientation, joint::JointDems};

use crate::{
    dispatch::{DispatchReport, Dispatcher},
    gait_ctrl,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of the cycle
    pub elapsed_s: f64,

    // Sensing
    pub raw_orientation: RawOrientation,

    // GaitCtrl
    pub gait_ctrl: gait_ctrl::GaitCtrl,
    pub gait_ctrl_input: gait_ctrl::InputData,
    pub gait_ctrl_output: Option<gait_ctrl::OutputData>,
    pub gait_ctrl_status_rpt: gait_ctrl::StatusReport,

    // Output stage
    pub dispatcher: Dispatcher,
    pub joint_dems: Option<JointDems>,
    pub dispatch_rpt: DispatchReport,

    /// Set once torque has been released on every joint, after which no
    /// more demands are sent.
    pub torque_released: bool,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive cycles in which at least one actuator request
    /// failed
    pub num_consec_actuator_errors: u64,

    /// Total number of failed actuator requests
    pub num_actuator_errors: u64,

    /// Total number of ticks in which GaitCtrl rejected its own output
    pub num_gait_ctrl_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz.round() as u128).max(1) == 0;

        self.gait_ctrl_input = gait_ctrl::InputData::default();
        self.gait_ctrl_output = None;
        self.gait_ctrl_status_rpt = gait_ctrl::StatusReport::default();
        self.joint_dems = None;
        self.dispatch_rpt = DispatchReport::default();

        self.elapsed_s = util::session::get_elapsed_seconds();
    }

    /// Record the outcome of sending this cycle's demands.
    pub fn record_actuator_errors(&mut self, num_errors: usize) {
        if num_errors > 0 {
            self.num_consec_actuator_errors += 1;
            self.num_actuator_errors += num_errors as u64;
        } else {
            self.num_consec_actuator_errors = 0;
        }
    }
}

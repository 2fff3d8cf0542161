//! Control tick interface
//!
//! `gait_exec` steps its control modules, gait control among them, once per
//! control tick, every 10 ms with the default executable parameters. A
//! module is set up from its parameter file at startup and is then stepped
//! through [`State::proc`] with that tick's sensor sample.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A control module stepped once per tick.
pub trait State {
    /// What the module needs to start, normally its params file name.
    type InitData;
    type InitError;

    /// Per tick input, for gait control the raw orientation sample.
    type InputData;
    /// Per tick output, for gait control the joint angles to dispatch.
    type OutputData;
    /// Flags describing what happened on the tick, archived with the tick.
    type StatusReport;
    /// The tick's output was rejected. The previous pose stays in place.
    type ProcError;

    /// Load the module's params file, relative to `$BIPED_SW_ROOT/params`,
    /// and open its archives in the session directory.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Run one control tick.
    ///
    /// Returns the tick's output together with its status report. Modes,
    /// counters and integrators carried between ticks live in `self`.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}

//! # Gait library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the gait crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator interface - sends joint demands to the servos or to a simulation
pub mod actuator;

/// Balance controller - moves the feet to bring the body back upright
pub mod balance;

/// Data store - state shared between the stages of the main loop
pub mod data_store;

/// Output stage - applies feedback, joint ranges and the slew limit to the demands
pub mod dispatch;

/// Fall monitor - detects excessive tilt and latches the halt
pub mod fall_monitor;

/// Gait control module - the gait state machine
pub mod gait_ctrl;

/// Joint angle sets and poses
pub mod joints;

/// Leg inverse kinematics
pub mod kinematics;

/// Tilt corrected orientation samples
pub mod orientation;

/// Executable parameters
pub mod params;

/// Step phase counter
pub mod phase;

/// Orientation sensor interface - reads the IMU or replays a script
pub mod sensor;

/// Foot lift, sway and step trajectories
pub mod trajectory;

/// Tuning console - single key adjustments while running
pub mod tuning;

/// Unit conversions between radians, actuator ticks and sensor units
pub mod units;

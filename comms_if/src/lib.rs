//! # Communications interface crate.
//!
//! Provides all common equipment interfaces for the software: joint
//! identifiers and demands, raw inertial sensor samples, and the serial
//! servo bus wire protocol.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (servos and the IMU)
pub mod eqpt;

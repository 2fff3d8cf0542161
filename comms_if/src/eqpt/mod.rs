//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with the robot's
//! equipment.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod imu;
pub mod joint;
pub mod servo_bus;

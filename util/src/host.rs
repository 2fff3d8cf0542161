//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable which points to the root of the software checkout.
///
/// Parameter files and session directories are resolved relative to this
/// path.
pub const SW_ROOT_ENV_VAR: &str = "BIPED_SW_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get a short description of the host this executable is running on.
pub fn get_host_info() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}

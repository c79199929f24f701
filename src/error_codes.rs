//! Error code constants
//!
//! Stable strings handed to the presentation layer so it can pick its own wording.

/// Source or target missing, or the submission is malformed
pub const ERR_CONFIG_INVALID: &str = "ERR_CONFIG_INVALID";

/// Free space could not be verified before launch
pub const ERR_PREFLIGHT_UNVERIFIED: &str = "ERR_PREFLIGHT_UNVERIFIED";

/// Target volume is too small for the transfer
pub const ERR_PREFLIGHT_DEFICIT: &str = "ERR_PREFLIGHT_DEFICIT";

/// The external copy tool could not be started
pub const ERR_LAUNCH_FAILED: &str = "ERR_LAUNCH_FAILED";

/// Reboot or shutdown could not be invoked
pub const ERR_POWER_ACTION_FAILED: &str = "ERR_POWER_ACTION_FAILED";

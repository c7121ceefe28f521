/// Exit codes for rundown, following Ruff's convention
///
/// These exit codes allow users and CI/CD systems to distinguish between
/// different types of failures.
/// Success - Every file came back clean
pub const SUCCESS: i32 = 0;

/// Problems found - One or more structured problems were reported
pub const PROBLEMS_FOUND: i32 = 1;

/// Tool error - Configuration error, spawn failure, or unrecognized toolchain output
pub const TOOL_ERROR: i32 = 2;

/// Helper functions for consistent exit behavior
pub mod exit {
    use super::{PROBLEMS_FOUND, SUCCESS, TOOL_ERROR};

    /// Exit with success code (0)
    pub fn success() -> ! {
        std::process::exit(SUCCESS);
    }

    /// Exit with problems found code (1)
    pub fn problems_found() -> ! {
        std::process::exit(PROBLEMS_FOUND);
    }

    /// Exit with tool error code (2)
    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }
}

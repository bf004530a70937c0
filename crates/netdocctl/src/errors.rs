//! Exit codes for netdocctl

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when a command or message was rejected by a gate
pub const EXIT_REJECTED: i32 = 1;

/// Exit code for unreadable or malformed configuration (EX_CONFIG)
pub const EXIT_CONFIG_ERROR: i32 = 78;

/// Exit code when a file could not be read or written (EX_IOERR)
pub const EXIT_IO_ERROR: i32 = 74;

/// Exit code for a verdict
pub fn verdict_exit_code(valid: bool) -> i32 {
    if valid {
        EXIT_SUCCESS
    } else {
        EXIT_REJECTED
    }
}

//! Process exit status of `bfs`
//!
//! Scripts branch on these values, so they only ever gain new codes.

use bfs_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments, path or configuration
    UsageError = 2,
    /// Store unreachable or a fatal session failure
    NetworkError = 3,
    AuthError = 4,
    /// Alias, bucket, folder or file missing
    NotFound = 5,
    /// Target exists or the store refused a concurrent change
    Conflict = 6,
    UnsupportedFeature = 7,
    /// Stopped by Ctrl-C
    Interrupted = 130,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.exit_code() {
            2 => Self::UsageError,
            3 => Self::NetworkError,
            4 => Self::AuthError,
            5 => Self::NotFound,
            6 => Self::Conflict,
            7 => Self::UnsupportedFeature,
            _ => Self::GeneralError,
        }
    }
}

//! Error types for bfs-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Raw store failures are classified in [`crate::classify`] before they become
//! one of these.

use thiserror::Error;

/// Result type alias for bfs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bfs-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Alias not found
    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// Alias already exists
    #[error("Alias already exists: {0}")]
    AliasExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid credentials (wrong key id or secret)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Credentials are valid but the store refused the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error, recoverable within an established session
    #[error("Network error: {0}")]
    Network(String),

    /// Connection-class failure that ends the session
    #[error("{message}")]
    Fatal { message: String, details: String },

    /// Any other failure reported by the store
    #[error("{message}")]
    Store { message: String, details: String },

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature not supported by backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,                        // UsageError
            Error::Config(_) => 2,                             // UsageError
            Error::Network(_) | Error::Fatal { .. } => 3,      // NetworkError
            Error::Auth(_) | Error::AccessDenied(_) => 4,      // AuthError
            Error::NotFound(_) | Error::AliasNotFound(_) => 5, // NotFound
            Error::Conflict(_) | Error::AliasExists(_) => 6,   // Conflict
            Error::UnsupportedFeature(_) => 7,                 // UnsupportedFeature
            _ => 1,                                            // GeneralError
        }
    }

    /// Whether this error should end the session rather than just the operation
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal { .. })
    }

    /// Extra diagnostic text carried by store-originated errors
    pub fn details(&self) -> Option<&str> {
        match self {
            Error::Fatal { details, .. } | Error::Store { details, .. } if !details.is_empty() => {
                Some(details.as_str())
            }
            _ => None,
        }
    }
}

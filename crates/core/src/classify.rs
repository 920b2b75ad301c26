//! Store failure classification
//!
//! Every call into the object store reports failure as a [`StoreFailure`]: the
//! store's status code plus whatever structured detail came with it. Nothing
//! above this module inspects status codes directly; it asks [`classify`] for a
//! [`FailureClass`] and converts to a crate [`Error`] with [`into_error`].

use std::fmt;

use crate::error::Error;

/// Status codes the adapter distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCode {
    /// Request was signed for the wrong region; the store names the right one
    AuthorizationHeaderMalformed,
    TemporaryRedirect,
    PermanentRedirect,
    AccessDenied,
    SignatureDoesNotMatch,
    InvalidAccessKeyId,
    /// DNS resolution of the endpoint host failed
    NameLookupError,
    /// TCP/TLS connection could not be established
    FailedToConnect,
    /// Established connection broke or timed out
    ConnectionFailed,
    SlowDown,
    NoSuchKey,
    NoSuchBucket,
    NoSuchUpload,
    /// The caller stopped the transfer from a progress hook
    AbortedByCallback,
    /// Any other store error code, kept verbatim
    Other(String),
}

impl StoreCode {
    /// Parse an S3 error code (as found in `<Code>` of an error body)
    pub fn from_code(code: &str) -> Self {
        match code {
            "AuthorizationHeaderMalformed" => Self::AuthorizationHeaderMalformed,
            "TemporaryRedirect" => Self::TemporaryRedirect,
            "PermanentRedirect" | "301" => Self::PermanentRedirect,
            "AccessDenied" | "Forbidden" | "403" => Self::AccessDenied,
            "SignatureDoesNotMatch" => Self::SignatureDoesNotMatch,
            "InvalidAccessKeyId" => Self::InvalidAccessKeyId,
            "SlowDown" | "503" => Self::SlowDown,
            "NoSuchKey" | "NotFound" | "404" => Self::NoSuchKey,
            "NoSuchBucket" => Self::NoSuchBucket,
            "NoSuchUpload" => Self::NoSuchUpload,
            other => Self::Other(other.to_string()),
        }
    }

    /// Symbolic name of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationHeaderMalformed => "AuthorizationHeaderMalformed",
            Self::TemporaryRedirect => "TemporaryRedirect",
            Self::PermanentRedirect => "PermanentRedirect",
            Self::AccessDenied => "AccessDenied",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::NameLookupError => "NameLookupError",
            Self::FailedToConnect => "FailedToConnect",
            Self::ConnectionFailed => "ConnectionFailed",
            Self::SlowDown => "SlowDown",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::AbortedByCallback => "AbortedByCallback",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed store call: status code plus structured error detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub code: StoreCode,
    pub message: Option<String>,
    pub resource: Option<String>,
    pub further_details: Option<String>,
    /// Named extra details, in the order the store reported them
    pub extra: Vec<(String, String)>,
}

/// Result of a single store call
pub type StoreResult<T> = std::result::Result<T, StoreFailure>;

impl StoreFailure {
    pub fn new(code: StoreCode) -> Self {
        Self {
            code,
            message: None,
            resource: None,
            further_details: None,
            extra: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Look up a named extra detail; names compare case-insensitively
    pub fn extra_detail(&self, name: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Region the store says the bucket lives in
    pub fn region_detail(&self) -> Option<&str> {
        self.extra_detail("Region").filter(|r| !r.is_empty())
    }

    /// Endpoint host the store redirects to
    pub fn endpoint_detail(&self) -> Option<&str> {
        self.extra_detail("Endpoint").filter(|e| !e.is_empty())
    }

    /// Multi-line diagnostic text built from resource, further details and extras
    pub fn details_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(resource) = &self.resource {
            lines.push(format!("Resource: {resource}"));
        }
        if let Some(further) = &self.further_details {
            lines.push(format!("Further details: {further}"));
        }
        if !self.extra.is_empty() {
            let extras: Vec<String> = self
                .extra
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            lines.push(format!("Extra details: {}", extras.join(", ")));
        }
        lines.join("\n")
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", message, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for StoreFailure {}

/// What kind of failure a store call reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Wrong region or endpoint; recoverable by re-resolving the bucket
    Redirect,
    Authentication,
    AccessDenied,
    Connectivity,
    Throttled,
    NotFound,
    Cancelled,
    Generic,
}

impl FailureClass {
    /// Failures that end the session when hit outside an established one
    pub const fn is_fatal_candidate(self) -> bool {
        matches!(self, Self::Connectivity | Self::Throttled)
    }

    /// Failures worth repeating the same request for
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Connectivity | Self::Throttled | Self::Generic)
    }
}

/// Classify a store failure
pub fn classify(failure: &StoreFailure) -> FailureClass {
    match failure.code {
        StoreCode::AuthorizationHeaderMalformed
        | StoreCode::TemporaryRedirect
        | StoreCode::PermanentRedirect => FailureClass::Redirect,
        StoreCode::SignatureDoesNotMatch | StoreCode::InvalidAccessKeyId => {
            FailureClass::Authentication
        }
        StoreCode::AccessDenied => FailureClass::AccessDenied,
        StoreCode::NameLookupError | StoreCode::FailedToConnect | StoreCode::ConnectionFailed => {
            FailureClass::Connectivity
        }
        StoreCode::SlowDown => FailureClass::Throttled,
        StoreCode::NoSuchKey | StoreCode::NoSuchBucket | StoreCode::NoSuchUpload => {
            FailureClass::NotFound
        }
        StoreCode::AbortedByCallback => FailureClass::Cancelled,
        StoreCode::Other(_) => FailureClass::Generic,
    }
}

/// Convert a store failure into a crate error
///
/// `host` names the configured endpoint in name-lookup messages. With
/// `fatal_on_connect` set, connectivity and throttling failures become
/// [`Error::Fatal`]; otherwise they are ordinary per-operation errors.
pub fn into_error(failure: StoreFailure, host: &str, fatal_on_connect: bool) -> Error {
    let class = classify(&failure);
    let fixed = match failure.code {
        StoreCode::AbortedByCallback => Some("Terminated by user".to_string()),
        StoreCode::AccessDenied => Some("Access denied".to_string()),
        StoreCode::SignatureDoesNotMatch | StoreCode::InvalidAccessKeyId => {
            Some("Authentication failed".to_string())
        }
        StoreCode::NameLookupError => Some(format!("Host \"{host}\" does not exist")),
        StoreCode::FailedToConnect => Some("Connection failed".to_string()),
        _ => None,
    };

    let extra = failure.details_text();
    let (message, details) = match fixed {
        Some(message) => {
            let details = [failure.message.clone().unwrap_or_default(), extra]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            (message, details)
        }
        None => (
            failure
                .message
                .clone()
                .unwrap_or_else(|| failure.code.to_string()),
            extra,
        ),
    };

    if class.is_fatal_candidate() && fatal_on_connect {
        return Error::Fatal { message, details };
    }

    let described = if details.is_empty() {
        message.clone()
    } else {
        format!("{message}: {}", details.replace('\n', "; "))
    };

    match class {
        FailureClass::Authentication => Error::Auth(described),
        FailureClass::AccessDenied => Error::AccessDenied(described),
        FailureClass::NotFound => Error::NotFound(described),
        FailureClass::Connectivity | FailureClass::Throttled => Error::Network(described),
        FailureClass::Redirect | FailureClass::Cancelled | FailureClass::Generic => {
            Error::Store { message, details }
        }
    }
}

//! Error types for credential store operations.

use std::fmt;

use strum::Display;
use thiserror::Error;

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Win32 error code reported by a failed credential store primitive
/// (the value of `GetLastError` right after the call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsErrorCode(pub u32);

impl OsErrorCode {
    /// `ERROR_INVALID_PARAMETER`.
    pub const INVALID_PARAMETER: Self = Self(87);
    /// `ERROR_INVALID_FLAGS`.
    pub const INVALID_FLAGS: Self = Self(1004);
    /// `ERROR_NOT_FOUND`.
    pub const NOT_FOUND: Self = Self(1168);
    /// `ERROR_NO_SUCH_LOGON_SESSION`.
    pub const NO_SUCH_LOGON_SESSION: Self = Self(1312);
    /// `ERROR_BAD_USERNAME`.
    pub const BAD_USERNAME: Self = Self(2202);

    /// Returns the symbolic Win32 name for codes the credential API documents.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            87 => Some("ERROR_INVALID_PARAMETER"),
            1004 => Some("ERROR_INVALID_FLAGS"),
            1168 => Some("ERROR_NOT_FOUND"),
            1312 => Some("ERROR_NO_SUCH_LOGON_SESSION"),
            2202 => Some("ERROR_BAD_USERNAME"),
            _ => None,
        }
    }
}

impl fmt::Display for OsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({name})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// The credential store primitive that produced an OS failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOperation {
    /// `CredReadW`.
    Read,
    /// `CredWriteW`.
    Write,
    /// `CredDeleteW`.
    Delete,
    /// `CredEnumerateW`.
    Enumerate,
}

/// Errors raised by credential construction, marshaling and store calls.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The secret is larger than the platform allows.
    #[error("secret is {actual} bytes, exceeding the {limit} byte limit")]
    SecretTooLarge {
        /// UTF-16 byte length of the rejected secret.
        actual: usize,
        /// Active limit in bytes.
        limit: usize,
    },

    /// A text field is longer than the platform allows.
    #[error("{field} is {actual} UTF-16 code units, exceeding the limit of {limit}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Length of the rejected value in UTF-16 code units.
        actual: usize,
        /// Maximum length in UTF-16 code units.
        limit: usize,
    },

    /// A NUL-terminated field contains U+0000.
    #[error("{field} must not contain NUL characters")]
    InteriorNul {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The requested feature is deliberately unavailable.
    #[error("{feature} is not supported")]
    NotSupported {
        /// Name of the unsupported feature.
        feature: &'static str,
    },

    /// A credential store primitive reported failure.
    #[error("credential {operation} failed with os error {code}")]
    Os {
        /// Primitive that failed.
        operation: StoreOperation,
        /// Win32 error code.
        code: OsErrorCode,
    },

    /// A native record returned by the store could not be decoded.
    #[error("malformed credential record: {0}")]
    MalformedRecord(String),
}

impl CredentialError {
    /// Returns the Win32 error code for OS failures.
    #[must_use]
    pub const fn os_code(&self) -> Option<OsErrorCode> {
        match self {
            Self::Os { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` when the store reported that no matching credential exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.os_code() == Some(OsErrorCode::NOT_FOUND)
    }

    /// `true` when the store rejected the flag combination.
    #[must_use]
    pub fn is_invalid_flags(&self) -> bool {
        self.os_code() == Some(OsErrorCode::INVALID_FLAGS)
    }

    /// `true` for errors raised before any store primitive was invoked.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SecretTooLarge { .. }
                | Self::FieldTooLong { .. }
                | Self::InteriorNul { .. }
                | Self::NotSupported { .. }
        )
    }
}

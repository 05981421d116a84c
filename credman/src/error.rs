//! FFI-safe error type.

use credman_core::{CredentialError, OsErrorCode};

/// Error returned by every fallible [`CredentialManager`](crate::CredentialManager)
/// method.
#[derive(Debug, Clone, uniffi::Error, thiserror::Error)]
#[uniffi(flat_error)]
pub enum CredentialManagerError {
    /// A field failed validation before the store was called.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },

    /// The requested feature is unavailable.
    #[error("not supported: {message}")]
    NotSupported {
        /// Error message.
        message: String,
    },

    /// No credential matches the target name and type, or the filter.
    #[error("credential not found")]
    NotFound,

    /// The store rejected the flag combination.
    #[error("invalid flags")]
    InvalidFlags,

    /// Any other failure reported by the store.
    #[error("os error {code}: {message}")]
    Os {
        /// Win32 error code.
        code: u32,
        /// Error message.
        message: String,
    },

    /// The store returned a record that could not be decoded.
    #[error("malformed record: {message}")]
    MalformedRecord {
        /// Error message.
        message: String,
    },
}

impl From<CredentialError> for CredentialManagerError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::SecretTooLarge { .. }
            | CredentialError::FieldTooLong { .. }
            | CredentialError::InteriorNul { .. } => Self::InvalidInput {
                message: error.to_string(),
            },
            CredentialError::NotSupported { .. } => Self::NotSupported {
                message: error.to_string(),
            },
            CredentialError::Os {
                code: OsErrorCode::NOT_FOUND,
                ..
            } => Self::NotFound,
            CredentialError::Os {
                code: OsErrorCode::INVALID_FLAGS,
                ..
            } => Self::InvalidFlags,
            CredentialError::Os { code, .. } => Self::Os {
                code: code.0,
                message: error.to_string(),
            },
            CredentialError::MalformedRecord(message) => Self::MalformedRecord { message },
        }
    }
}

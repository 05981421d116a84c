//! FFI-safe mirrors of the core credential types.
//!
//! These are the public API across the boundary; the `credman_core` types
//! stay implementation details.

use std::fmt;
use std::time::SystemTime;

use credman_core::{
    Credential, CredentialFlags, CredentialType as CoreCredentialType,
    Persistence as CorePersistence,
};
use secrecy::ExposeSecret;

use crate::CredentialManagerError;

/// Kind of credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum CredentialType {
    /// Generic credential.
    Generic,
    /// Domain password.
    DomainPassword,
    /// Domain certificate.
    DomainCertificate,
    /// Deprecated domain visible password.
    DomainVisiblePassword,
    /// Generic certificate.
    GenericCertificate,
    /// Extended domain credential.
    DomainExtended,
}

impl From<CredentialType> for CoreCredentialType {
    fn from(kind: CredentialType) -> Self {
        match kind {
            CredentialType::Generic => Self::Generic,
            CredentialType::DomainPassword => Self::DomainPassword,
            CredentialType::DomainCertificate => Self::DomainCertificate,
            CredentialType::DomainVisiblePassword => Self::DomainVisiblePassword,
            CredentialType::GenericCertificate => Self::GenericCertificate,
            CredentialType::DomainExtended => Self::DomainExtended,
        }
    }
}

impl From<CoreCredentialType> for CredentialType {
    fn from(kind: CoreCredentialType) -> Self {
        match kind {
            CoreCredentialType::Generic => Self::Generic,
            CoreCredentialType::DomainPassword => Self::DomainPassword,
            CoreCredentialType::DomainCertificate => Self::DomainCertificate,
            CoreCredentialType::DomainVisiblePassword => Self::DomainVisiblePassword,
            CoreCredentialType::GenericCertificate => Self::GenericCertificate,
            CoreCredentialType::DomainExtended => Self::DomainExtended,
        }
    }
}

/// Persistence scope of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum Persistence {
    /// Current logon session only.
    Session,
    /// All later logon sessions on this machine.
    LocalMachine,
    /// Roams with the user profile.
    Enterprise,
}

impl From<Persistence> for CorePersistence {
    fn from(persist: Persistence) -> Self {
        match persist {
            Persistence::Session => Self::Session,
            Persistence::LocalMachine => Self::LocalMachine,
            Persistence::Enterprise => Self::Enterprise,
        }
    }
}

impl From<CorePersistence> for Persistence {
    fn from(persist: CorePersistence) -> Self {
        match persist {
            CorePersistence::Session => Self::Session,
            CorePersistence::LocalMachine => Self::LocalMachine,
            CorePersistence::Enterprise => Self::Enterprise,
        }
    }
}

/// A credential as seen by foreign code.
///
/// Empty strings stand for unset text fields. `last_written` is ignored on
/// write and populated on read.
#[derive(Clone, uniffi::Record)]
pub struct CredentialRecord {
    /// Target name; together with the type, the identity.
    pub target_name: String,
    /// Kind of credential.
    pub credential_type: CredentialType,
    /// Account name.
    pub user_name: String,
    /// Secret payload.
    pub secret: Option<String>,
    /// Free-text comment.
    pub comment: String,
    /// Secondary name.
    pub target_alias: String,
    /// Persistence scope, `None` when unassigned.
    pub persist: Option<Persistence>,
    /// Raw `CRED_FLAGS_*` bits.
    pub flags: u32,
    /// Time of the last modification.
    pub last_written: Option<SystemTime>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("target_name", &self.target_name)
            .field("credential_type", &self.credential_type)
            .field("user_name", &self.user_name)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("comment", &self.comment)
            .field("target_alias", &self.target_alias)
            .field("persist", &self.persist)
            .field("flags", &self.flags)
            .field("last_written", &self.last_written)
            .finish()
    }
}

impl TryFrom<CredentialRecord> for Credential {
    type Error = CredentialManagerError;

    fn try_from(record: CredentialRecord) -> Result<Self, Self::Error> {
        let mut builder = Self::builder(record.target_name)
            .credential_type(record.credential_type.into())
            .flags(CredentialFlags::from_bits(record.flags))
            .user_name(record.user_name)
            .comment(record.comment)
            .target_alias(record.target_alias);
        if let Some(secret) = record.secret {
            builder = builder.secret(secret);
        }
        if let Some(persist) = record.persist {
            builder = builder.persist(persist.into());
        }
        builder.build().map_err(CredentialManagerError::from)
    }
}

impl From<Credential> for CredentialRecord {
    fn from(credential: Credential) -> Self {
        Self {
            target_name: credential.target_name().to_owned(),
            credential_type: credential.credential_type().into(),
            user_name: credential.user_name().to_owned(),
            secret: credential
                .secret()
                .map(|secret| secret.expose_secret().to_owned()),
            comment: credential.comment().to_owned(),
            target_alias: credential.target_alias().to_owned(),
            persist: credential.persist().map(Persistence::from),
            flags: credential.flags().bits(),
            last_written: credential.last_written().map(SystemTime::from),
        }
    }
}

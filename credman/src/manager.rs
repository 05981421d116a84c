//! The [`CredentialManager`] object exported to foreign code.

#[cfg(windows)]
use credman_core::DefaultBackend;
use credman_core::{Credential, CredentialBackend, CredentialStore, MemoryBackend, WriteFlags};

use crate::{CredentialManagerError, CredentialRecord, CredentialType};

/// Credential Manager access for foreign code.
///
/// On Windows `CredentialManager::new` opens the credential set of the
/// current logon session. Other hosts have no platform store and only offer
/// [`CredentialManager::in_memory`], whose credentials live in process memory.
#[derive(uniffi::Object)]
pub struct CredentialManager {
    store: CredentialStore<Box<dyn CredentialBackend>>,
}

impl CredentialManager {
    const fn with_backend(backend: Box<dyn CredentialBackend>) -> Self {
        Self {
            store: CredentialStore::with_backend(backend),
        }
    }
}

#[cfg(windows)]
impl Default for CredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
#[uniffi::export]
impl CredentialManager {
    /// Opens the credential set of the current logon session.
    #[must_use]
    #[uniffi::constructor]
    pub fn new() -> Self {
        Self::with_backend(Box::new(DefaultBackend::default()))
    }
}

#[uniffi::export]
impl CredentialManager {
    /// Opens an empty store held in process memory.
    #[must_use]
    #[uniffi::constructor]
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    /// Creates or replaces a credential. With `preserve_blob` the stored
    /// secret is kept and `record.secret` must be `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record fails validation or the store rejects
    /// the write.
    pub fn write(
        &self,
        record: CredentialRecord,
        preserve_blob: bool,
    ) -> Result<(), CredentialManagerError> {
        let credential = Credential::try_from(record)?;
        let flags = if preserve_blob {
            WriteFlags::PRESERVE_CREDENTIAL_BLOB
        } else {
            WriteFlags::NONE
        };
        Ok(self.store.write_with_flags(&credential, flags)?)
    }

    /// Reads one credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialManagerError::NotFound`] when no credential
    /// matches, or another error if the store fails.
    pub fn read(
        &self,
        target: &str,
        credential_type: CredentialType,
    ) -> Result<CredentialRecord, CredentialManagerError> {
        let credential = self.store.read(target, credential_type.into())?;
        Ok(credential.into())
    }

    /// Deletes one credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialManagerError::NotFound`] when no credential
    /// matches, or another error if the store fails.
    pub fn delete(
        &self,
        target: &str,
        credential_type: CredentialType,
    ) -> Result<(), CredentialManagerError> {
        Ok(self.store.delete(target, credential_type.into())?)
    }

    /// Lists credentials matching `filter` (a trailing `*` matches a prefix),
    /// or every credential when `filter` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialManagerError::NotFound`] when nothing matches.
    pub fn enumerate(
        &self,
        filter: Option<String>,
    ) -> Result<Vec<CredentialRecord>, CredentialManagerError> {
        let credentials = self.store.enumerate(filter.as_deref())?;
        Ok(credentials.into_iter().map(CredentialRecord::from).collect())
    }

    /// Lists every credential with the enumerate-all flag.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialManagerError::NotFound`] when the store is empty.
    pub fn enumerate_all(&self) -> Result<Vec<CredentialRecord>, CredentialManagerError> {
        let credentials = self.store.enumerate_all()?;
        Ok(credentials.into_iter().map(CredentialRecord::from).collect())
    }
}

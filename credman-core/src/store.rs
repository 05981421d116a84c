//! Safe facade over a [`CredentialBackend`].

#[cfg(windows)]
use crate::backend::DefaultBackend;
use crate::backend::{CredentialBackend, OsBuffer};
use crate::credential::Credential;
use crate::error::{CredentialError, CredentialResult, StoreOperation};
use crate::ffi::{CallerBuffer, RawCredential};
use crate::marshal::{from_native, to_native};
use crate::types::{CredentialType, EnumerateFlags, WriteFlags};

/// Reads, writes, deletes and enumerates credentials.
///
/// Each call invokes exactly one store primitive. Failures are returned as
/// [`CredentialError::Os`] and never retried. Buffers allocated for a call
/// are released before it returns, on every path.
#[derive(Debug, Default)]
pub struct CredentialStore<B> {
    backend: B,
}

#[cfg(windows)]
impl CredentialStore<DefaultBackend> {
    /// Opens the credential set of the current logon session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: CredentialBackend> CredentialStore<B> {
    /// Uses `backend` for every operation.
    #[must_use]
    pub const fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// The backend this store calls into.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates the credential or replaces the one with the same target name
    /// and type.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Os`] when the store rejects the write.
    pub fn write(&self, credential: &Credential) -> CredentialResult<()> {
        self.write_with_flags(credential, WriteFlags::NONE)
    }

    /// Like [`write`](Self::write) with explicit write flags. With
    /// [`WriteFlags::PRESERVE_CREDENTIAL_BLOB`] the stored secret is kept and
    /// `credential` must not carry one.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Os`] when the store rejects the write.
    pub fn write_with_flags(
        &self,
        credential: &Credential,
        flags: WriteFlags,
    ) -> CredentialResult<()> {
        log::debug!(
            "writing {} credential {:?}",
            credential.credential_type(),
            credential.target_name()
        );
        let native = to_native(credential);
        let result = self.backend.write(&native, flags.bits());
        drop(native);
        result.map_err(|code| CredentialError::Os {
            operation: StoreOperation::Write,
            code,
        })
    }

    /// Reads the credential identified by `target` and `credential_type`.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InteriorNul`] when `target` contains U+0000.
    /// - [`CredentialError::Os`] when the store fails; `ERROR_NOT_FOUND`
    ///   when no such credential exists.
    /// - [`CredentialError::MalformedRecord`] when the returned record cannot
    ///   be decoded.
    pub fn read(
        &self,
        target: &str,
        credential_type: CredentialType,
    ) -> CredentialResult<Credential> {
        log::debug!("reading {credential_type} credential {target:?}");
        let target = CallerBuffer::from_identity("target_name", target)?;
        let raw = self
            .backend
            .read(&target, credential_type.as_raw(), 0)
            .map_err(|code| CredentialError::Os {
                operation: StoreOperation::Read,
                code,
            })?;
        let buffer = unsafe { OsBuffer::new(&self.backend, raw) };
        unsafe { from_native(&*buffer.as_ptr::<RawCredential>()) }
    }

    /// Deletes the credential identified by `target` and `credential_type`.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InteriorNul`] when `target` contains U+0000.
    /// - [`CredentialError::Os`] when the store fails; `ERROR_NOT_FOUND`
    ///   when no such credential exists.
    pub fn delete(&self, target: &str, credential_type: CredentialType) -> CredentialResult<()> {
        log::debug!("deleting {credential_type} credential {target:?}");
        let target = CallerBuffer::from_identity("target_name", target)?;
        self.backend
            .delete(&target, credential_type.as_raw(), 0)
            .map_err(|code| CredentialError::Os {
                operation: StoreOperation::Delete,
                code,
            })
    }

    /// Lists the credentials matching `filter`, or every credential of the
    /// logon session when `filter` is `None`. A filter ending in `*` matches
    /// by prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Os`] with `ERROR_NOT_FOUND` when nothing
    /// matches, and see [`enumerate_with`](Self::enumerate_with).
    pub fn enumerate(&self, filter: Option<&str>) -> CredentialResult<Vec<Credential>> {
        self.enumerate_with(filter, EnumerateFlags::NONE)
    }

    /// Lists every credential using [`EnumerateFlags::ALL_CREDENTIALS`].
    /// Target names come back in their `namespace:attribute=target` form.
    ///
    /// # Errors
    ///
    /// See [`enumerate_with`](Self::enumerate_with).
    pub fn enumerate_all(&self) -> CredentialResult<Vec<Credential>> {
        self.enumerate_with(None, EnumerateFlags::ALL_CREDENTIALS)
    }

    /// Lists credentials with explicit enumerate flags, in store order.
    ///
    /// A filter combined with [`EnumerateFlags::ALL_CREDENTIALS`] is passed
    /// through unchanged and rejected by the store with
    /// `ERROR_INVALID_FLAGS`.
    ///
    /// The listing is all or nothing: one record with a type or persistence
    /// value outside [`CredentialType`] and
    /// [`Persistence`](crate::Persistence) fails the whole call, so callers
    /// never see a silently shortened list.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InteriorNul`] when `filter` contains U+0000.
    /// - [`CredentialError::Os`] when the store fails. No partial results
    ///   are returned.
    /// - [`CredentialError::MalformedRecord`] when any record cannot be
    ///   decoded.
    pub fn enumerate_with(
        &self,
        filter: Option<&str>,
        flags: EnumerateFlags,
    ) -> CredentialResult<Vec<Credential>> {
        log::debug!("enumerating credentials, filter {filter:?}, flags {:#x}", flags.bits());
        let filter = filter
            .map(|filter| CallerBuffer::from_identity("filter", filter))
            .transpose()?;
        let (count, array) = self
            .backend
            .enumerate(filter.as_ref(), flags.bits())
            .map_err(|code| CredentialError::Os {
                operation: StoreOperation::Enumerate,
                code,
            })?;
        let buffer = unsafe { OsBuffer::new(&self.backend, array) };
        let records = buffer.as_ptr::<*mut RawCredential>();

        (0..count as usize)
            .map(|index| unsafe {
                let record = *records.add(index);
                if record.is_null() {
                    return Err(CredentialError::MalformedRecord(format!(
                        "null record at index {index}"
                    )));
                }
                from_native(&*record)
            })
            .collect()
    }
}

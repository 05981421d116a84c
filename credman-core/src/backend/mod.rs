//! The OS boundary: the five credential store primitives behind one trait.

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::error::OsErrorCode;
use crate::ffi::{CallerBuffer, RawCredential};
use crate::marshal::NativeCredential;

pub mod memory;
#[cfg(windows)]
pub mod win32;

pub use memory::MemoryBackend;
#[cfg(windows)]
pub use win32::Win32Backend;

/// Backend used by [`CredentialStore::new`](crate::CredentialStore::new).
///
/// Only Windows has a platform store. Other hosts pick a backend explicitly
/// with [`CredentialStore::with_backend`](crate::CredentialStore::with_backend).
#[cfg(windows)]
pub type DefaultBackend = Win32Backend;

/// The credential store primitives.
///
/// Failures carry the OS error code observed right after the call.
///
/// # Safety
///
/// Implementors guarantee that every pointer returned by
/// [`read`](Self::read) and [`enumerate`](Self::enumerate) is a single
/// allocation that stays valid, together with every record and string it
/// references, until it is passed to [`free`](Self::free). Enumerate must
/// return an array of exactly `count` valid record pointers.
pub unsafe trait CredentialBackend: Send + Sync {
    /// `CredReadW`: looks up one credential by target name and type.
    fn read(
        &self,
        target: &CallerBuffer,
        kind: u32,
        flags: u32,
    ) -> Result<NonNull<RawCredential>, OsErrorCode>;

    /// `CredWriteW`: creates or replaces the credential identified by the
    /// record's target name and type.
    fn write(&self, credential: &NativeCredential, flags: u32) -> Result<(), OsErrorCode>;

    /// `CredDeleteW`: removes one credential.
    fn delete(&self, target: &CallerBuffer, kind: u32, flags: u32) -> Result<(), OsErrorCode>;

    /// `CredEnumerateW`: returns the count and an array of record pointers.
    /// A filter may end in `*` to match a prefix.
    fn enumerate(
        &self,
        filter: Option<&CallerBuffer>,
        flags: u32,
    ) -> Result<(u32, NonNull<*mut RawCredential>), OsErrorCode>;

    /// `CredFree`: releases a buffer returned by `read` or `enumerate`.
    ///
    /// # Safety
    ///
    /// `buffer` must come from this backend and must not be used afterwards.
    unsafe fn free(&self, buffer: NonNull<c_void>);
}

unsafe impl<B: CredentialBackend + ?Sized> CredentialBackend for Box<B> {
    fn read(
        &self,
        target: &CallerBuffer,
        kind: u32,
        flags: u32,
    ) -> Result<NonNull<RawCredential>, OsErrorCode> {
        (**self).read(target, kind, flags)
    }

    fn write(&self, credential: &NativeCredential, flags: u32) -> Result<(), OsErrorCode> {
        (**self).write(credential, flags)
    }

    fn delete(&self, target: &CallerBuffer, kind: u32, flags: u32) -> Result<(), OsErrorCode> {
        (**self).delete(target, kind, flags)
    }

    fn enumerate(
        &self,
        filter: Option<&CallerBuffer>,
        flags: u32,
    ) -> Result<(u32, NonNull<*mut RawCredential>), OsErrorCode> {
        (**self).enumerate(filter, flags)
    }

    unsafe fn free(&self, buffer: NonNull<c_void>) {
        (**self).free(buffer);
    }
}

/// A buffer owned by the backend, released through
/// [`CredentialBackend::free`] when dropped.
pub struct OsBuffer<'a, B: CredentialBackend + ?Sized> {
    ptr: NonNull<c_void>,
    backend: &'a B,
}

impl<'a, B: CredentialBackend + ?Sized> OsBuffer<'a, B> {
    /// Takes ownership of `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `backend` and not yet freed.
    pub const unsafe fn new<T>(backend: &'a B, ptr: NonNull<T>) -> Self {
        Self {
            ptr: ptr.cast(),
            backend,
        }
    }

    /// The start of the buffer, typed.
    #[must_use]
    pub const fn as_ptr<T>(&self) -> *const T {
        self.ptr.as_ptr().cast_const().cast()
    }
}

impl<B: CredentialBackend + ?Sized> Drop for OsBuffer<'_, B> {
    fn drop(&mut self) {
        log::debug!("releasing os buffer");
        unsafe { self.backend.free(self.ptr) };
    }
}

impl<B: CredentialBackend + ?Sized> std::fmt::Debug for OsBuffer<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsBuffer").field("ptr", &self.ptr).finish()
    }
}

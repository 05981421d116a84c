//! In-process emulation of the credential set.
//!
//! Not a secure store: secrets live in process memory. It backs the tests
//! and serves as the default on hosts without Credential Manager.
//!
//! Returned records are packed into a single allocation the way the OS packs
//! them, so callers exercise the same release discipline as on Windows. Every
//! allocation handed out is tracked until it comes back through
//! [`CredentialBackend::free`].

#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::significant_drop_tightening)]

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ffi::c_void;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use zeroize::Zeroizing;

use super::CredentialBackend;
use crate::error::{OsErrorCode, StoreOperation};
use crate::ffi::{read_bytes, read_wide_cstr, CallerBuffer, FileTime, RawCredential};
use crate::limits::{
    SecretLimit, MAX_ATTRIBUTES, MAX_COMMENT_LENGTH, MAX_TARGET_ALIAS_LENGTH, MAX_USER_NAME_LENGTH,
};
use crate::marshal::{datetime_to_filetime, NativeCredential};
use crate::types::{CredentialFlags, CredentialType, EnumerateFlags, Persistence, WriteFlags};

const ERROR_NOT_ENOUGH_MEMORY: OsErrorCode = OsErrorCode(8);

/// A credential as held by the emulated store.
struct StoredCredential {
    key: String,
    flags: u32,
    kind: u32,
    target_name: String,
    comment: String,
    last_written: FileTime,
    blob: Option<Zeroizing<Vec<u8>>>,
    persist: u32,
    target_alias: String,
    user_name: String,
}

impl StoredCredential {
    fn matches(&self, key: &str, kind: u32) -> bool {
        self.kind == kind && self.key == key
    }

    /// Bytes needed after the record for its strings and blob.
    fn payload_len(&self) -> usize {
        wide_size(&self.target_name)
            + optional_wide_size(&self.comment)
            + optional_wide_size(&self.target_alias)
            + optional_wide_size(&self.user_name)
            + self.blob.as_ref().map_or(0, |blob| round_up(blob.len(), 2))
    }

    /// Writes strings and blob at `cursor`, advancing it, and returns the
    /// record that references them.
    ///
    /// # Safety
    ///
    /// `cursor` must be 2-byte aligned with `payload_len()` writable bytes.
    unsafe fn pack_into(&self, cursor: &mut *mut u8) -> RawCredential {
        let mut raw = RawCredential::zeroed();
        raw.flags = self.flags;
        raw.kind = self.kind;
        raw.last_written = self.last_written;
        raw.persist = self.persist;
        raw.target_name = put_wide(cursor, &self.target_name);
        raw.comment = put_optional_wide(cursor, &self.comment);
        raw.target_alias = put_optional_wide(cursor, &self.target_alias);
        raw.user_name = put_optional_wide(cursor, &self.user_name);
        if let Some(blob) = &self.blob {
            raw.credential_blob = put_bytes(cursor, blob);
            // Bounded by SecretLimit::MODERN_BYTES on write.
            #[allow(clippy::cast_possible_truncation)]
            let size = blob.len() as u32;
            raw.credential_blob_size = size;
        }
        raw
    }
}

/// In-memory [`CredentialBackend`] reproducing the error semantics of the
/// Windows credential API.
///
/// Target names compare case-insensitively. Enumeration returns records in
/// insertion order; replacing a record keeps its position.
pub struct MemoryBackend {
    credentials: Mutex<Vec<StoredCredential>>,
    allocations: Mutex<HashMap<usize, Layout>>,
    invalid_frees: Mutex<usize>,
    injected: Mutex<Option<(StoreOperation, OsErrorCode)>>,
}

impl MemoryBackend {
    /// Creates an empty credential set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(Vec::new()),
            allocations: Mutex::new(HashMap::new()),
            invalid_frees: Mutex::new(0),
            injected: Mutex::new(None),
        }
    }

    /// Number of stored credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.credentials).len()
    }

    /// `true` when no credential is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every stored credential.
    pub fn clear(&self) {
        lock(&self.credentials).clear();
    }

    /// Buffers handed out by `read` or `enumerate` and not yet freed.
    #[must_use]
    pub fn outstanding_allocations(&self) -> usize {
        lock(&self.allocations).len()
    }

    /// Calls to `free` with a pointer this backend does not own.
    #[must_use]
    pub fn invalid_frees(&self) -> usize {
        *lock(&self.invalid_frees)
    }

    /// Makes the next call to `operation` fail with `code` without touching
    /// the store.
    pub fn fail_next(&self, operation: StoreOperation, code: OsErrorCode) {
        *lock(&self.injected) = Some((operation, code));
    }

    fn injected_failure(&self, operation: StoreOperation) -> Result<(), OsErrorCode> {
        let mut injected = lock(&self.injected);
        match *injected {
            Some((target, code)) if target == operation => {
                *injected = None;
                log::debug!("injected {operation} failure: {code}");
                Err(code)
            }
            _ => Ok(()),
        }
    }

    /// Packs `records` into one tracked allocation. With `array`, the
    /// allocation starts with a pointer to each record.
    fn pack(&self, records: &[&StoredCredential], array: bool) -> Result<NonNull<u8>, OsErrorCode> {
        let align = align_of::<RawCredential>().max(align_of::<*mut RawCredential>());
        let header = if array {
            round_up(records.len() * size_of::<*mut RawCredential>(), align)
        } else {
            0
        };
        let payload_start = header + records.len() * size_of::<RawCredential>();
        let total = payload_start
            + records
                .iter()
                .map(|record| record.payload_len())
                .sum::<usize>();

        let layout = Layout::from_size_align(total, align).map_err(|_| ERROR_NOT_ENOUGH_MEMORY)?;
        let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(ERROR_NOT_ENOUGH_MEMORY)?;

        unsafe {
            let mut cursor = base.as_ptr().add(payload_start);
            let slots = base.as_ptr().add(header).cast::<RawCredential>();
            for (index, record) in records.iter().enumerate() {
                let slot = slots.add(index);
                slot.write(record.pack_into(&mut cursor));
                if array {
                    base.as_ptr().cast::<*mut RawCredential>().add(index).write(slot);
                }
            }
        }

        lock(&self.allocations).insert(base.as_ptr() as usize, layout);
        log::debug!("packed {} records into {total} bytes", records.len());
        Ok(base)
    }

    /// Validates a write and converts the record into its stored form.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `raw` must be valid for reads.
    unsafe fn validate_write(
        raw: &RawCredential,
        flags: WriteFlags,
    ) -> Result<StoredCredential, OsErrorCode> {
        let record_flags = CredentialFlags::from_bits(raw.flags);
        let known_flags = CredentialFlags::PROMPT_NOW | CredentialFlags::USERNAME_TARGET;
        if raw.flags & !known_flags.bits() != 0 {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }
        let kind = CredentialType::from_raw(raw.kind).ok_or(OsErrorCode::INVALID_PARAMETER)?;
        if raw.persist != 0 && Persistence::from_raw(raw.persist).is_none() {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }
        if raw.attribute_count as usize > MAX_ATTRIBUTES {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }

        let target_name = read_wide_cstr(raw.target_name);
        if target_name.is_empty() {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }
        let comment = read_wide_cstr(raw.comment);
        let target_alias = read_wide_cstr(raw.target_alias);
        let mut user_name = read_wide_cstr(raw.user_name);
        if too_long(&comment, MAX_COMMENT_LENGTH)
            || too_long(&target_alias, MAX_TARGET_ALIAS_LENGTH)
            || too_long(&user_name, MAX_USER_NAME_LENGTH)
        {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }

        if record_flags.contains(CredentialFlags::USERNAME_TARGET) {
            if !kind.allows_username_target() {
                return Err(OsErrorCode::INVALID_PARAMETER);
            }
            user_name.clone_from(&target_name);
        } else if kind != CredentialType::Generic
            && kind != CredentialType::GenericCertificate
            && user_name.is_empty()
        {
            return Err(OsErrorCode::BAD_USERNAME);
        }

        let blob_size = raw.credential_blob_size as usize;
        if blob_size > SecretLimit::MODERN_BYTES
            || (raw.credential_blob.is_null() && blob_size != 0)
        {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }
        if flags.contains(WriteFlags::PRESERVE_CREDENTIAL_BLOB) && blob_size != 0 {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }
        let blob = (!raw.credential_blob.is_null())
            .then(|| Zeroizing::new(read_bytes(raw.credential_blob, blob_size)));

        Ok(StoredCredential {
            key: target_name.to_lowercase(),
            flags: raw.flags,
            kind: raw.kind,
            target_name,
            comment,
            last_written: datetime_to_filetime(Utc::now()),
            blob,
            persist: raw.persist,
            target_alias,
            user_name,
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("credentials", &self.len())
            .field("outstanding_allocations", &self.outstanding_allocations())
            .finish_non_exhaustive()
    }
}

unsafe impl CredentialBackend for MemoryBackend {
    fn read(
        &self,
        target: &CallerBuffer,
        kind: u32,
        flags: u32,
    ) -> Result<NonNull<RawCredential>, OsErrorCode> {
        self.injected_failure(StoreOperation::Read)?;
        if flags != 0 {
            return Err(OsErrorCode::INVALID_FLAGS);
        }
        if CredentialType::from_raw(kind).is_none() {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }

        let key = unsafe { read_wide_cstr(target.as_ptr()) }.to_lowercase();
        let credentials = lock(&self.credentials);
        let record = credentials
            .iter()
            .find(|record| record.matches(&key, kind))
            .ok_or(OsErrorCode::NOT_FOUND)?;
        self.pack(&[record], false).map(NonNull::cast)
    }

    fn write(&self, credential: &NativeCredential, flags: u32) -> Result<(), OsErrorCode> {
        self.injected_failure(StoreOperation::Write)?;
        if flags & !WriteFlags::PRESERVE_CREDENTIAL_BLOB.bits() != 0 {
            return Err(OsErrorCode::INVALID_FLAGS);
        }
        let flags = WriteFlags::from_bits(flags);
        let mut incoming = unsafe { Self::validate_write(credential.as_raw(), flags) }?;

        let mut credentials = lock(&self.credentials);
        let existing = credentials
            .iter()
            .position(|record| record.matches(&incoming.key, incoming.kind));
        if flags.contains(WriteFlags::PRESERVE_CREDENTIAL_BLOB) {
            incoming.blob = existing.and_then(|index| credentials[index].blob.clone());
        }
        match existing {
            Some(index) => credentials[index] = incoming,
            None => credentials.push(incoming),
        }
        Ok(())
    }

    fn delete(&self, target: &CallerBuffer, kind: u32, flags: u32) -> Result<(), OsErrorCode> {
        self.injected_failure(StoreOperation::Delete)?;
        if flags != 0 {
            return Err(OsErrorCode::INVALID_FLAGS);
        }
        if CredentialType::from_raw(kind).is_none() {
            return Err(OsErrorCode::INVALID_PARAMETER);
        }

        let key = unsafe { read_wide_cstr(target.as_ptr()) }.to_lowercase();
        let mut credentials = lock(&self.credentials);
        let index = credentials
            .iter()
            .position(|record| record.matches(&key, kind))
            .ok_or(OsErrorCode::NOT_FOUND)?;
        credentials.remove(index);
        Ok(())
    }

    fn enumerate(
        &self,
        filter: Option<&CallerBuffer>,
        flags: u32,
    ) -> Result<(u32, NonNull<*mut RawCredential>), OsErrorCode> {
        self.injected_failure(StoreOperation::Enumerate)?;
        let flags_set = EnumerateFlags::from_bits(flags);
        if flags & !EnumerateFlags::ALL_CREDENTIALS.bits() != 0
            || (filter.is_some() && flags_set.contains(EnumerateFlags::ALL_CREDENTIALS))
        {
            return Err(OsErrorCode::INVALID_FLAGS);
        }

        let pattern = filter.map(|filter| unsafe { read_wide_cstr(filter.as_ptr()) }.to_lowercase());
        let credentials = lock(&self.credentials);
        let matching: Vec<&StoredCredential> = credentials
            .iter()
            .filter(|record| pattern.as_deref().is_none_or(|pattern| filter_matches(pattern, &record.key)))
            .collect();
        if matching.is_empty() {
            return Err(OsErrorCode::NOT_FOUND);
        }

        let count = u32::try_from(matching.len()).map_err(|_| ERROR_NOT_ENOUGH_MEMORY)?;
        let base = self.pack(&matching, true)?;
        Ok((count, base.cast()))
    }

    unsafe fn free(&self, buffer: NonNull<c_void>) {
        let Some(layout) = lock(&self.allocations).remove(&(buffer.as_ptr() as usize)) else {
            log::warn!("free of a buffer this backend does not own: {buffer:p}");
            *lock(&self.invalid_frees) += 1;
            return;
        };
        let base = buffer.as_ptr().cast::<u8>();
        ptr::write_bytes(base, 0, layout.size());
        alloc::dealloc(base, layout);
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        let allocations = self
            .allocations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !allocations.is_empty() {
            log::warn!("{} credential buffers were never freed", allocations.len());
        }
        for (address, layout) in allocations.drain() {
            unsafe { alloc::dealloc(address as *mut u8, layout) };
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A trailing `*` matches any suffix; otherwise the match is exact.
fn filter_matches(pattern: &str, key: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == key, |prefix| key.starts_with(prefix))
}

fn too_long(value: &str, limit: usize) -> bool {
    value.encode_utf16().count() > limit
}

const fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn wide_size(text: &str) -> usize {
    (text.encode_utf16().count() + 1) * 2
}

fn optional_wide_size(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        wide_size(text)
    }
}

unsafe fn put_wide(cursor: &mut *mut u8, text: &str) -> *mut u16 {
    let start = cursor.cast::<u16>();
    let mut len = 0;
    for unit in text.encode_utf16() {
        start.add(len).write(unit);
        len += 1;
    }
    start.add(len).write(0);
    *cursor = cursor.add((len + 1) * 2);
    start
}

unsafe fn put_optional_wide(cursor: &mut *mut u8, text: &str) -> *mut u16 {
    if text.is_empty() {
        ptr::null_mut()
    } else {
        put_wide(cursor, text)
    }
}

const unsafe fn put_bytes(cursor: &mut *mut u8, bytes: &[u8]) -> *mut u8 {
    let start = *cursor;
    ptr::copy_nonoverlapping(bytes.as_ptr(), start, bytes.len());
    *cursor = cursor.add(round_up(bytes.len(), 2));
    start
}

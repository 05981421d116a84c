//! Conversion between [`Credential`] and the native [`RawCredential`] layout.

use std::ptr;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::credential::Credential;
use crate::error::{CredentialError, CredentialResult};
use crate::ffi::{read_wide_cstr, read_wide_counted, CallerBuffer, FileTime, RawCredential};
use crate::limits::SecretLimit;
use crate::types::{CredentialFlags, CredentialType, Persistence};

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// 9999-12-31T23:59:59.9999999Z, the largest instant with 100 ns precision
/// that has a four-digit year.
const MAX_DATE_SECS: i64 = 253_402_300_799;
const MAX_DATE_NANOS: u32 = 999_999_900;

/// A [`RawCredential`] whose string and blob pointers reference buffers owned
/// by this value.
///
/// The buffers live exactly as long as the record. Dropping it releases each
/// one through the Rust allocator after wiping it.
#[derive(Debug)]
pub struct NativeCredential {
    raw: RawCredential,
    buffers: Vec<CallerBuffer>,
}

impl NativeCredential {
    /// The record to pass to the write primitive.
    #[must_use]
    pub const fn as_raw(&self) -> &RawCredential {
        &self.raw
    }

    /// Number of caller buffers backing the record.
    #[must_use]
    pub const fn allocation_count(&self) -> usize {
        self.buffers.len()
    }

    fn attach(&mut self, buffer: CallerBuffer) -> *mut u16 {
        let ptr = buffer.as_ptr().cast_mut();
        self.buffers.push(buffer);
        ptr
    }
}

impl Drop for NativeCredential {
    fn drop(&mut self) {
        log::debug!("releasing {} caller buffers", self.buffers.len());
    }
}

/// Packs `credential` into the native layout.
///
/// Every text field gets its own NUL-terminated buffer, empty fields
/// included. The blob pointer is null when the credential has no secret.
/// Attributes are never packed.
#[must_use]
pub fn to_native(credential: &Credential) -> NativeCredential {
    let mut native = NativeCredential {
        raw: RawCredential::zeroed(),
        buffers: Vec::with_capacity(5),
    };

    native.raw.flags = credential.flags().bits();
    native.raw.kind = credential.credential_type().as_raw();
    native.raw.persist = credential.persist().map_or(0, Persistence::as_raw);
    native.raw.comment = native.attach(CallerBuffer::from_text(credential.comment()));
    native.raw.target_alias = native.attach(CallerBuffer::from_text(credential.target_alias()));
    native.raw.target_name = native.attach(CallerBuffer::from_text(credential.target_name()));

    if let Some(secret) = credential.secret() {
        let blob = CallerBuffer::from_text(secret.expose_secret());
        // Bounded by SecretLimit::MODERN_BYTES at construction.
        #[allow(clippy::cast_possible_truncation)]
        let size = blob.byte_len() as u32;
        native.raw.credential_blob_size = size;
        native.raw.credential_blob = native.attach(blob).cast();
    }

    native.raw.user_name = native.attach(CallerBuffer::from_text(credential.user_name()));
    native.raw.attribute_count = 0;
    native.raw.attributes = ptr::null_mut();

    native
}

/// Decodes a native record into a new [`Credential`].
///
/// Null string pointers decode to empty strings. A null blob decodes to no
/// secret; otherwise exactly `credential_blob_size / 2` code units are read.
/// Attributes are ignored. The source record is neither freed nor retained.
///
/// # Errors
///
/// Returns [`CredentialError::MalformedRecord`] for an unknown type or
/// persistence value, or for fields outside the platform limits.
///
/// # Safety
///
/// Every non-null pointer in `raw` must be valid for reads: string fields
/// NUL-terminated, the blob for `credential_blob_size` bytes.
pub unsafe fn from_native(raw: &RawCredential) -> CredentialResult<Credential> {
    let credential_type = CredentialType::from_raw(raw.kind).ok_or_else(|| {
        CredentialError::MalformedRecord(format!("unknown credential type {}", raw.kind))
    })?;
    let persist = match raw.persist {
        0 => None,
        value => Some(Persistence::from_raw(value).ok_or_else(|| {
            CredentialError::MalformedRecord(format!("unknown persistence {value}"))
        })?),
    };
    let secret = (!raw.credential_blob.is_null()).then(|| {
        SecretString::from(read_wide_counted(
            raw.credential_blob,
            raw.credential_blob_size as usize,
        ))
    });

    let mut builder = Credential::builder(read_wide_cstr(raw.target_name))
        .credential_type(credential_type)
        .flags(CredentialFlags::from_bits(raw.flags))
        .user_name(read_wide_cstr(raw.user_name))
        .comment(read_wide_cstr(raw.comment))
        .target_alias(read_wide_cstr(raw.target_alias))
        .secret_opt(secret)
        .secret_limit(SecretLimit::Modern)
        .last_written(filetime_to_datetime(raw.last_written));
    if let Some(persist) = persist {
        builder = builder.persist(persist);
    }

    builder
        .build()
        .map_err(|err| CredentialError::MalformedRecord(err.to_string()))
}

/// Largest instant a `FILETIME` converts to.
#[must_use]
pub fn max_filetime_date() -> DateTime<Utc> {
    DateTime::from_timestamp(MAX_DATE_SECS, MAX_DATE_NANOS).unwrap_or_default()
}

/// Converts 100 ns ticks since 1601-01-01 UTC.
///
/// Tick counts that overflow a signed 64-bit value (the all-ones sentinel
/// among them) or land past [`max_filetime_date`] degrade to that maximum.
#[must_use]
pub fn filetime_to_datetime(time: FileTime) -> DateTime<Utc> {
    let Ok(ticks) = i64::try_from(time.ticks()) else {
        log::warn!("timestamp {:#x} out of range, using maximum date", time.ticks());
        return max_filetime_date();
    };

    let secs = ticks / TICKS_PER_SECOND - FILETIME_UNIX_OFFSET_SECS;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = ((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;

    let max = max_filetime_date();
    match DateTime::from_timestamp(secs, nanos) {
        Some(date) if date <= max => date,
        _ => {
            log::warn!("timestamp {ticks} past the maximum date, clamping");
            max
        }
    }
}

/// Converts an instant to `FILETIME` ticks. Instants before 1601 map to zero.
#[must_use]
pub fn datetime_to_filetime(date: DateTime<Utc>) -> FileTime {
    let ticks = date
        .timestamp()
        .checked_add(FILETIME_UNIX_OFFSET_SECS)
        .and_then(|secs| secs.checked_mul(TICKS_PER_SECOND))
        .and_then(|ticks| ticks.checked_add(i64::from(date.timestamp_subsec_nanos()) / NANOS_PER_TICK))
        .and_then(|ticks| u64::try_from(ticks).ok())
        .unwrap_or(0);
    FileTime::from_ticks(ticks)
}

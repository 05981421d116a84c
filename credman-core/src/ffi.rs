//! Native record layout of the credential service and the caller-owned
//! buffers that back it.
//!
//! The structs mirror `CREDENTIALW`, `CREDENTIAL_ATTRIBUTEW` and `FILETIME`
//! field for field (`#[repr(C)]`). String fields are NUL-terminated UTF-16;
//! the blob is byte-counted by `credential_blob_size`.
//!
//! ```text
//! 64-bit offset  field
//!   0            flags                u32
//!   4            type                 u32
//!   8            target_name          *mut u16
//!  16            comment              *mut u16
//!  24            last_written         FILETIME (2 x u32)
//!  32            credential_blob_size u32
//!  40            credential_blob      *mut u8
//!  48            persist              u32
//!  52            attribute_count      u32
//!  56            attributes           *mut CREDENTIAL_ATTRIBUTEW
//!  64            target_alias         *mut u16
//!  72            user_name            *mut u16
//!  80            (size)
//! ```

use std::ptr;

use zeroize::Zeroizing;

use crate::error::{CredentialError, CredentialResult};

/// `FILETIME`: 100-nanosecond ticks since 1601-01-01 UTC split in two halves.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTime {
    /// Low 32 bits of the tick count.
    pub low_date_time: u32,
    /// High 32 bits of the tick count.
    pub high_date_time: u32,
}

impl FileTime {
    /// Combines both halves into one tick count.
    #[must_use]
    pub fn ticks(self) -> u64 {
        (u64::from(self.high_date_time) << 32) | u64::from(self.low_date_time)
    }

    /// Splits a tick count into both halves.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self {
            low_date_time: ticks as u32,
            high_date_time: (ticks >> 32) as u32,
        }
    }
}

/// `CREDENTIAL_ATTRIBUTEW`. Variable-size through its pointers, so it is
/// described here but never packed or decoded.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawCredentialAttribute {
    /// NUL-terminated UTF-16 keyword.
    pub keyword: *mut u16,
    /// Reserved, zero.
    pub flags: u32,
    /// Size of `value` in bytes.
    pub value_size: u32,
    /// Attribute payload.
    pub value: *mut u8,
}

/// `CREDENTIALW`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawCredential {
    /// `CRED_FLAGS_*` bits.
    pub flags: u32,
    /// `CRED_TYPE_*` value.
    pub kind: u32,
    /// NUL-terminated UTF-16 target name.
    pub target_name: *mut u16,
    /// NUL-terminated UTF-16 comment, may be null.
    pub comment: *mut u16,
    /// Last modification time, set by the service.
    pub last_written: FileTime,
    /// Size of `credential_blob` in bytes.
    pub credential_blob_size: u32,
    /// Secret payload, may be null.
    pub credential_blob: *mut u8,
    /// `CRED_PERSIST_*` value.
    pub persist: u32,
    /// Number of entries behind `attributes`.
    pub attribute_count: u32,
    /// Attribute array, may be null.
    pub attributes: *mut RawCredentialAttribute,
    /// NUL-terminated UTF-16 alias, may be null.
    pub target_alias: *mut u16,
    /// NUL-terminated UTF-16 user name, may be null.
    pub user_name: *mut u16,
}

impl RawCredential {
    /// A record with every scalar zero and every pointer null.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            flags: 0,
            kind: 0,
            target_name: ptr::null_mut(),
            comment: ptr::null_mut(),
            last_written: FileTime {
                low_date_time: 0,
                high_date_time: 0,
            },
            credential_blob_size: 0,
            credential_blob: ptr::null_mut(),
            persist: 0,
            attribute_count: 0,
            attributes: ptr::null_mut(),
            target_alias: ptr::null_mut(),
            user_name: ptr::null_mut(),
        }
    }
}

/// NUL-terminated UTF-16 buffer allocated by this process.
///
/// Released by the Rust allocator when dropped, and wiped first. Never
/// hand its pointer to the service's free primitive.
pub struct CallerBuffer {
    units: Zeroizing<Vec<u16>>,
}

impl CallerBuffer {
    /// Encodes `text` as UTF-16 followed by a terminator.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut units: Vec<u16> = text.encode_utf16().collect();
        units.push(0);
        Self {
            units: Zeroizing::new(units),
        }
    }

    /// Encodes an identity string, rejecting U+0000 because the service
    /// would silently truncate at it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InteriorNul`] when `text` contains U+0000.
    pub fn from_identity(field: &'static str, text: &str) -> CredentialResult<Self> {
        if text.contains('\0') {
            return Err(CredentialError::InteriorNul { field });
        }
        Ok(Self::from_text(text))
    }

    /// Pointer to the first code unit. Stable for the life of the buffer.
    #[must_use]
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    /// Encoded length in bytes, terminator excluded.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        (self.units.len() - 1) * 2
    }
}

impl std::fmt::Debug for CallerBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerBuffer")
            .field("byte_len", &self.byte_len())
            .finish_non_exhaustive()
    }
}

/// Counts the code units before the terminator.
///
/// # Safety
///
/// `ptr` must be non-null and point to a NUL-terminated UTF-16 string that
/// is valid for reads.
const unsafe fn wide_len(ptr: *const u16) -> usize {
    let mut len = 0;
    while ptr.add(len).read_unaligned() != 0 {
        len += 1;
    }
    len
}

/// Copies a NUL-terminated UTF-16 string, terminator excluded. A null
/// pointer yields an empty vector.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated UTF-16 string that is
/// valid for reads.
#[must_use]
pub unsafe fn read_wide_units(ptr: *const u16) -> Vec<u16> {
    if ptr.is_null() {
        return Vec::new();
    }
    let len = wide_len(ptr);
    (0..len).map(|i| ptr.add(i).read_unaligned()).collect()
}

/// Decodes a NUL-terminated UTF-16 string. A null pointer decodes to the
/// empty string; unpaired surrogates become U+FFFD.
///
/// # Safety
///
/// Same contract as [`read_wide_units`].
#[must_use]
pub unsafe fn read_wide_cstr(ptr: *const u16) -> String {
    String::from_utf16_lossy(&read_wide_units(ptr))
}

/// Copies `len` bytes. A null pointer yields an empty vector.
///
/// # Safety
///
/// `ptr` must be null or valid for reads of `len` bytes.
#[must_use]
pub unsafe fn read_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}

/// Decodes `byte_len / 2` little-endian UTF-16 code units. A trailing odd
/// byte is ignored.
///
/// # Safety
///
/// `ptr` must be valid for reads of `byte_len` bytes. No alignment is
/// required.
#[must_use]
pub unsafe fn read_wide_counted(ptr: *const u8, byte_len: usize) -> String {
    let bytes = Zeroizing::new(read_bytes(ptr, byte_len & !1));
    let units: Zeroizing<Vec<u16>> = Zeroizing::new(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    );
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_credential_layout_matches_win64() {
        assert_eq!(offset_of!(RawCredential, flags), 0);
        assert_eq!(offset_of!(RawCredential, kind), 4);
        assert_eq!(offset_of!(RawCredential, target_name), 8);
        assert_eq!(offset_of!(RawCredential, comment), 16);
        assert_eq!(offset_of!(RawCredential, last_written), 24);
        assert_eq!(offset_of!(RawCredential, credential_blob_size), 32);
        assert_eq!(offset_of!(RawCredential, credential_blob), 40);
        assert_eq!(offset_of!(RawCredential, persist), 48);
        assert_eq!(offset_of!(RawCredential, attribute_count), 52);
        assert_eq!(offset_of!(RawCredential, attributes), 56);
        assert_eq!(offset_of!(RawCredential, target_alias), 64);
        assert_eq!(offset_of!(RawCredential, user_name), 72);
        assert_eq!(size_of::<RawCredential>(), 80);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_attribute_layout_matches_win64() {
        assert_eq!(offset_of!(RawCredentialAttribute, keyword), 0);
        assert_eq!(offset_of!(RawCredentialAttribute, flags), 8);
        assert_eq!(offset_of!(RawCredentialAttribute, value_size), 12);
        assert_eq!(offset_of!(RawCredentialAttribute, value), 16);
        assert_eq!(size_of::<RawCredentialAttribute>(), 24);
    }

    #[test]
    fn test_filetime_halves() {
        let time = FileTime {
            low_date_time: 0xDEAD_BEEF,
            high_date_time: 0x0000_0001,
        };
        assert_eq!(time.ticks(), 0x1_DEAD_BEEF);
        assert_eq!(FileTime::from_ticks(time.ticks()), time);
        assert_eq!(size_of::<FileTime>(), 8);
    }

    #[test]
    fn test_caller_buffer_is_terminated() {
        let buffer = CallerBuffer::from_text("héllo");
        assert_eq!(buffer.byte_len(), 10);
        let decoded = unsafe { read_wide_cstr(buffer.as_ptr()) };
        assert_eq!(decoded, "héllo");
    }

    #[test]
    fn test_identity_rejects_nul() {
        let err = CallerBuffer::from_identity("target_name", "a\0b").expect_err("nul");
        assert!(matches!(err, CredentialError::InteriorNul { .. }));
    }

    #[test]
    fn test_null_pointers_decode_empty() {
        assert_eq!(unsafe { read_wide_cstr(ptr::null()) }, "");
        assert!(unsafe { read_bytes(ptr::null(), 8) }.is_empty());
        assert_eq!(unsafe { read_wide_counted(ptr::null(), 8) }, "");
    }

    #[test]
    fn test_counted_decode_stops_at_size() {
        let bytes: Vec<u8> = "abcdef".encode_utf16().flat_map(u16::to_le_bytes).collect();
        // 7 bytes: three whole code units, the odd byte is dropped.
        assert_eq!(unsafe { read_wide_counted(bytes.as_ptr(), 7) }, "abc");
        assert_eq!(unsafe { read_wide_counted(bytes[1..].as_ptr(), 0) }, "");
    }
}

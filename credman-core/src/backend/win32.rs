//! Windows Credential Manager through `advapi32`.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use super::CredentialBackend;
use crate::error::OsErrorCode;
use crate::ffi::{CallerBuffer, RawCredential};
use crate::marshal::NativeCredential;

/// The credential set of the current logon session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Backend;

impl Win32Backend {
    /// Creates the backend. No handle is opened.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

unsafe impl CredentialBackend for Win32Backend {
    fn read(
        &self,
        target: &CallerBuffer,
        kind: u32,
        flags: u32,
    ) -> Result<NonNull<RawCredential>, OsErrorCode> {
        let mut credential: *mut RawCredential = ptr::null_mut();
        let ok = unsafe { CredReadW(target.as_ptr(), kind, flags, &mut credential) };
        if ok == 0 {
            return Err(last_error());
        }
        NonNull::new(credential).ok_or(OsErrorCode::NOT_FOUND)
    }

    fn write(&self, credential: &NativeCredential, flags: u32) -> Result<(), OsErrorCode> {
        let ok = unsafe { CredWriteW(credential.as_raw(), flags) };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn delete(&self, target: &CallerBuffer, kind: u32, flags: u32) -> Result<(), OsErrorCode> {
        let ok = unsafe { CredDeleteW(target.as_ptr(), kind, flags) };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn enumerate(
        &self,
        filter: Option<&CallerBuffer>,
        flags: u32,
    ) -> Result<(u32, NonNull<*mut RawCredential>), OsErrorCode> {
        let filter = filter.map_or(ptr::null(), CallerBuffer::as_ptr);
        let mut count = 0u32;
        let mut credentials: *mut *mut RawCredential = ptr::null_mut();
        let ok = unsafe { CredEnumerateW(filter, flags, &mut count, &mut credentials) };
        if ok == 0 {
            return Err(last_error());
        }
        // A successful call always returns an array. A null one is reported
        // as ERROR_NOT_FOUND, the code the store uses for an empty result.
        NonNull::new(credentials)
            .map(|array| (count, array))
            .ok_or(OsErrorCode::NOT_FOUND)
    }

    unsafe fn free(&self, buffer: NonNull<c_void>) {
        CredFree(buffer.as_ptr());
    }
}

fn last_error() -> OsErrorCode {
    let code = std::io::Error::last_os_error().raw_os_error().unwrap_or_default();
    OsErrorCode(u32::from_ne_bytes(code.to_ne_bytes()))
}

/// `major.minor` of the running Windows from `RtlGetVersion`, `None` if the
/// query fails.
pub(crate) fn host_version() -> Option<(u32, u32)> {
    let mut info = OsVersionInfo {
        os_version_info_size: u32::try_from(std::mem::size_of::<OsVersionInfo>()).ok()?,
        major_version: 0,
        minor_version: 0,
        build_number: 0,
        platform_id: 0,
        csd_version: [0; 128],
    };
    let status = unsafe { RtlGetVersion(&mut info) };
    if status != 0 {
        log::warn!("RtlGetVersion failed with status {status:#x}");
        return None;
    }
    Some((info.major_version, info.minor_version))
}

/// `OSVERSIONINFOW`.
#[repr(C)]
struct OsVersionInfo {
    os_version_info_size: u32,
    major_version: u32,
    minor_version: u32,
    build_number: u32,
    platform_id: u32,
    csd_version: [u16; 128],
}

#[link(name = "advapi32")]
extern "system" {
    fn CredReadW(
        target_name: *const u16,
        kind: u32,
        flags: u32,
        credential: *mut *mut RawCredential,
    ) -> i32;
    fn CredWriteW(credential: *const RawCredential, flags: u32) -> i32;
    fn CredDeleteW(target_name: *const u16, kind: u32, flags: u32) -> i32;
    fn CredEnumerateW(
        filter: *const u16,
        flags: u32,
        count: *mut u32,
        credentials: *mut *mut *mut RawCredential,
    ) -> i32;
    fn CredFree(buffer: *mut c_void);
}

#[link(name = "ntdll")]
extern "system" {
    fn RtlGetVersion(info: *mut OsVersionInfo) -> i32;
}

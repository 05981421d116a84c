//! Size limits the credential service enforces without documenting them
//! consistently.

use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Maximum comment length in UTF-16 code units.
pub const MAX_COMMENT_LENGTH: usize = 256;

/// Maximum target alias length in UTF-16 code units.
pub const MAX_TARGET_ALIAS_LENGTH: usize = 256;

/// Maximum user name length in UTF-16 code units.
pub const MAX_USER_NAME_LENGTH: usize = 513;

/// Maximum number of attributes a native record may carry.
pub const MAX_ATTRIBUTES: usize = 64;

/// Environment variable that overrides host detection of the secret limit.
/// Accepts `legacy` or `modern`.
pub const SECRET_LIMIT_ENV: &str = "CREDMAN_SECRET_LIMIT";

/// Size limit applied to the credential blob.
///
/// Windows XP and Vista accept 512 bytes; Windows 7 raised the limit to
/// five times that (`CRED_MAX_CREDENTIAL_BLOB_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SecretLimit {
    /// 512 bytes, hosts older than Windows 7.
    Legacy,
    /// 2560 bytes, Windows 7 and later.
    Modern,
}

impl SecretLimit {
    /// Byte limit for [`SecretLimit::Legacy`].
    pub const LEGACY_BYTES: usize = 512;
    /// Byte limit for [`SecretLimit::Modern`].
    pub const MODERN_BYTES: usize = 5 * 512;

    /// Maximum secret size in bytes of UTF-16.
    #[must_use]
    pub const fn max_bytes(self) -> usize {
        match self {
            Self::Legacy => Self::LEGACY_BYTES,
            Self::Modern => Self::MODERN_BYTES,
        }
    }

    /// Limit for a Windows `major.minor` version; 6.1 is Windows 7.
    #[must_use]
    pub const fn for_version(major: u32, minor: u32) -> Self {
        if major < 6 || (major == 6 && minor < 1) {
            Self::Legacy
        } else {
            Self::Modern
        }
    }

    /// Limit for the current host, resolved once per process.
    ///
    /// [`SECRET_LIMIT_ENV`] wins when set to a valid value. Otherwise the
    /// Windows version decides, and other hosts use [`SecretLimit::Modern`].
    #[must_use]
    pub fn host() -> Self {
        static HOST_LIMIT: OnceLock<SecretLimit> = OnceLock::new();
        *HOST_LIMIT.get_or_init(|| {
            let limit = Self::from_env().unwrap_or_else(Self::detect);
            log::debug!("secret limit resolved to {limit} ({} bytes)", limit.max_bytes());
            limit
        })
    }

    fn from_env() -> Option<Self> {
        let value = std::env::var(SECRET_LIMIT_ENV).ok()?;
        Self::parse_override(&value)
    }

    fn parse_override(value: &str) -> Option<Self> {
        match Self::from_str(value.trim()) {
            Ok(limit) => Some(limit),
            Err(_) => {
                log::warn!("ignoring {SECRET_LIMIT_ENV}={value:?}: expected `legacy` or `modern`");
                None
            }
        }
    }

    #[cfg(windows)]
    fn detect() -> Self {
        crate::backend::win32::host_version().map_or(Self::Modern, |(major, minor)| {
            Self::for_version(major, minor)
        })
    }

    #[cfg(not(windows))]
    const fn detect() -> Self {
        Self::Modern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(5, 1 => SecretLimit::Legacy ; "windows xp")]
    #[test_case(6, 0 => SecretLimit::Legacy ; "windows vista")]
    #[test_case(6, 1 => SecretLimit::Modern ; "windows 7")]
    #[test_case(6, 3 => SecretLimit::Modern ; "windows 8.1")]
    #[test_case(10, 0 => SecretLimit::Modern ; "windows 10")]
    fn test_limit_for_version(major: u32, minor: u32) -> SecretLimit {
        SecretLimit::for_version(major, minor)
    }

    #[test]
    fn test_byte_limits() {
        assert_eq!(SecretLimit::Legacy.max_bytes(), 512);
        assert_eq!(SecretLimit::Modern.max_bytes(), 2560);
    }

    #[test]
    fn test_override_parsing() {
        assert_eq!(SecretLimit::parse_override("legacy"), Some(SecretLimit::Legacy));
        assert_eq!(SecretLimit::parse_override(" modern "), Some(SecretLimit::Modern));
        assert_eq!(SecretLimit::parse_override("huge"), None);
    }
}

//! Discriminators and flag sets shared by the value object and the native layout.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of credential. Together with the target name it identifies a
/// credential in the store.
///
/// Values match the `CRED_TYPE_*` constants.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum CredentialType {
    /// Generic credential, readable by any application in the logon session.
    #[default]
    Generic = 0x1,
    /// Password for a domain (NTLM/Kerberos) target.
    DomainPassword = 0x2,
    /// Certificate credential for a domain target.
    DomainCertificate = 0x3,
    /// Deprecated by the platform; kept so records written by older software
    /// still decode.
    DomainVisiblePassword = 0x4,
    /// Certificate credential for a generic target.
    GenericCertificate = 0x5,
    /// Extended domain credential (Windows 7 and later).
    DomainExtended = 0x6,
}

impl CredentialType {
    /// `CRED_TYPE_MAXIMUM`: one past the largest type.
    pub const MAXIMUM: u32 = 0x7;
    /// `CRED_TYPE_MAXIMUM_EX`: upper bound reserved for extended types.
    pub const MAXIMUM_EX: u32 = Self::MAXIMUM + 1000;

    /// Native `CRED_TYPE_*` value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Parses a native `CRED_TYPE_*` value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x1 => Some(Self::Generic),
            0x2 => Some(Self::DomainPassword),
            0x3 => Some(Self::DomainCertificate),
            0x4 => Some(Self::DomainVisiblePassword),
            0x5 => Some(Self::GenericCertificate),
            0x6 => Some(Self::DomainExtended),
            _ => None,
        }
    }

    /// Whether [`CredentialFlags::USERNAME_TARGET`] is valid for this type.
    #[must_use]
    pub const fn allows_username_target(self) -> bool {
        matches!(self, Self::DomainPassword | Self::DomainCertificate)
    }
}

/// How long and where a credential remains valid.
///
/// Values match the `CRED_PERSIST_*` constants. A credential that has never
/// been assigned a scope carries the native zero, modelled as `None` by
/// [`Credential`](crate::Credential).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Persistence {
    /// Lives for the current logon session only.
    Session = 0x1,
    /// Persists for all later logon sessions on this machine.
    LocalMachine = 0x2,
    /// Persists and roams with the user profile.
    Enterprise = 0x3,
}

impl Persistence {
    /// Native `CRED_PERSIST_*` value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Parses a native `CRED_PERSIST_*` value. Zero is not a scope.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x1 => Some(Self::Session),
            0x2 => Some(Self::LocalMachine),
            0x3 => Some(Self::Enterprise),
            _ => None,
        }
    }
}

macro_rules! native_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$flag_meta:meta])* $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// No flags set.
            pub const NONE: Self = Self(0);
            $( $(#[$flag_meta])* pub const $flag: Self = Self($value); )*

            /// Wraps raw bits verbatim. Bits without a named constant are kept.
            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Raw bits as passed to the native API.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// `true` when every bit of `other` is set in `self`.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// `true` when no bit is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

native_flags! {
    /// Characteristics stored on the credential record (`CRED_FLAGS_*`).
    CredentialFlags {
        /// `CRED_FLAGS_PROMPT_NOW`: the blob has not been persisted yet and
        /// the user should be prompted.
        PROMPT_NOW = 0x2;
        /// `CRED_FLAGS_USERNAME_TARGET`: the user name equals the target
        /// name. Valid only for domain password and certificate types.
        USERNAME_TARGET = 0x4;
    }
}

native_flags! {
    /// Flags for the write primitive (`CRED_PRESERVE_*`).
    WriteFlags {
        /// `CRED_PRESERVE_CREDENTIAL_BLOB`: keep the stored blob. The
        /// submitted record must carry a zero blob size.
        PRESERVE_CREDENTIAL_BLOB = 0x1;
    }
}

native_flags! {
    /// Flags for the enumerate primitive (`CRED_ENUMERATE_*`).
    EnumerateFlags {
        /// `CRED_ENUMERATE_ALL_CREDENTIALS`: return every credential. Must not
        /// be combined with a filter.
        ALL_CREDENTIALS = 0x1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_credential_type_raw_values_round_trip() {
        for kind in CredentialType::iter() {
            assert_eq!(CredentialType::from_raw(kind.as_raw()), Some(kind));
        }
        assert_eq!(CredentialType::from_raw(0), None);
        assert_eq!(CredentialType::from_raw(CredentialType::MAXIMUM), None);
        assert_eq!(CredentialType::MAXIMUM_EX, 1007);
    }

    #[test]
    fn test_persistence_zero_is_not_a_scope() {
        assert_eq!(Persistence::from_raw(0), None);
        assert_eq!(Persistence::from_raw(3), Some(Persistence::Enterprise));
    }

    #[test]
    fn test_username_target_only_for_domain_types() {
        let allowed: Vec<_> = CredentialType::iter()
            .filter(|kind| kind.allows_username_target())
            .collect();
        assert_eq!(
            allowed,
            vec![
                CredentialType::DomainPassword,
                CredentialType::DomainCertificate
            ]
        );
    }

    #[test]
    fn test_flags_combine_and_keep_unknown_bits() {
        let mut flags = CredentialFlags::PROMPT_NOW;
        flags |= CredentialFlags::USERNAME_TARGET;
        assert_eq!(flags.bits(), 0x6);
        assert!(flags.contains(CredentialFlags::PROMPT_NOW));
        assert!(!CredentialFlags::NONE.contains(CredentialFlags::PROMPT_NOW));

        let raw = CredentialFlags::from_bits(0x1 | 0x2);
        assert_eq!(raw.bits(), 0x3);
        assert!(CredentialFlags::default().is_empty());
    }

    #[test]
    fn test_names_are_snake_case() {
        assert_eq!(CredentialType::DomainPassword.to_string(), "domain_password");
        assert_eq!(
            Persistence::from_str("local_machine").unwrap(),
            Persistence::LocalMachine
        );
        assert_eq!(
            serde_json::to_string(&CredentialType::GenericCertificate).unwrap(),
            "\"generic_certificate\""
        );
        assert_eq!(
            serde_json::to_string(&(WriteFlags::PRESERVE_CREDENTIAL_BLOB)).unwrap(),
            "1"
        );
    }
}

//! The validated credential value object.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CredentialError, CredentialResult};
use crate::limits::{
    SecretLimit, MAX_COMMENT_LENGTH, MAX_TARGET_ALIAS_LENGTH, MAX_USER_NAME_LENGTH,
};
use crate::types::{CredentialFlags, CredentialType, Persistence};

/// Application-defined keyword/value pair attached to a credential.
///
/// The native attribute record is variable-size, so attributes cannot be
/// packed generically. They are never written and never decoded;
/// [`Credential::set_attributes`] rejects every non-empty assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAttribute {
    /// Attribute name.
    pub keyword: String,
    /// Reserved, must be zero.
    pub flags: u32,
    /// Opaque attribute value.
    pub value: Vec<u8>,
}

/// A credential as stored by the platform credential service.
///
/// `target_name` and `credential_type` form the identity of the record and
/// cannot change after construction. Renaming a credential means deleting it
/// and writing a new one.
#[derive(Debug)]
pub struct Credential {
    flags: CredentialFlags,
    credential_type: CredentialType,
    target_name: String,
    comment: String,
    last_written: Option<DateTime<Utc>>,
    secret: Option<SecretString>,
    persist: Option<Persistence>,
    attributes: Option<Vec<CredentialAttribute>>,
    target_alias: String,
    user_name: String,
}

impl Credential {
    /// Creates a generic credential.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the secret exceeds the host limit, the
    /// user name is longer than 513 UTF-16 code units, or the target or user
    /// name contains a NUL character.
    pub fn new(user_name: &str, secret: &str, target: &str) -> CredentialResult<Self> {
        Self::builder(target).user_name(user_name).secret(secret).build()
    }

    /// Starts building a credential for `target`.
    #[must_use]
    pub fn builder(target: impl Into<String>) -> CredentialBuilder {
        CredentialBuilder::new(target)
    }

    /// Characteristics of the credential.
    #[must_use]
    pub const fn flags(&self) -> CredentialFlags {
        self.flags
    }

    /// Replaces the characteristics of the credential.
    pub const fn set_flags(&mut self, flags: CredentialFlags) {
        self.flags = flags;
    }

    /// Kind of credential; part of the identity.
    #[must_use]
    pub const fn credential_type(&self) -> CredentialType {
        self.credential_type
    }

    /// Target name; part of the identity.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Free-text comment, empty when unset.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Sets the comment. `None` and `""` clear it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::FieldTooLong`] above 256 UTF-16 code units.
    pub fn set_comment(&mut self, comment: Option<&str>) -> CredentialResult<()> {
        self.comment = normalize_text("comment", comment, MAX_COMMENT_LENGTH)?;
        Ok(())
    }

    /// Time of the last modification. Only present on credentials read from
    /// the store.
    #[must_use]
    pub const fn last_written(&self) -> Option<DateTime<Utc>> {
        self.last_written
    }

    /// The secret payload, if the record carries one.
    #[must_use]
    pub const fn secret(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    /// Persistence scope; `None` when never assigned.
    #[must_use]
    pub const fn persist(&self) -> Option<Persistence> {
        self.persist
    }

    /// Replaces the persistence scope.
    pub const fn set_persist(&mut self, persist: Option<Persistence>) {
        self.persist = persist;
    }

    /// Application-defined attributes. Always `None`.
    #[must_use]
    pub fn attributes(&self) -> Option<&[CredentialAttribute]> {
        self.attributes.as_deref()
    }

    /// Assigns attributes.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NotSupported`] for any `Some` value,
    /// whatever its length. Only `None` is accepted.
    pub fn set_attributes(
        &mut self,
        attributes: Option<Vec<CredentialAttribute>>,
    ) -> CredentialResult<()> {
        if attributes.is_some() {
            return Err(CredentialError::NotSupported {
                feature: "credential attributes",
            });
        }
        self.attributes = None;
        Ok(())
    }

    /// Secondary name of the credential, empty when unset.
    #[must_use]
    pub fn target_alias(&self) -> &str {
        &self.target_alias
    }

    /// Sets the target alias. `None` and `""` clear it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::FieldTooLong`] above 256 UTF-16 code units.
    pub fn set_target_alias(&mut self, alias: Option<&str>) -> CredentialResult<()> {
        self.target_alias = normalize_text("target_alias", alias, MAX_TARGET_ALIAS_LENGTH)?;
        Ok(())
    }

    /// Account name associated with the target, empty when unset.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Sets the user name. `None` and `""` clear it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::FieldTooLong`] above 513 UTF-16 code units.
    pub fn set_user_name(&mut self, user_name: Option<&str>) -> CredentialResult<()> {
        self.user_name = normalize_text("user_name", user_name, MAX_USER_NAME_LENGTH)?;
        Ok(())
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            flags: self.flags,
            credential_type: self.credential_type,
            target_name: self.target_name.clone(),
            comment: self.comment.clone(),
            last_written: self.last_written,
            secret: self
                .secret
                .as_ref()
                .map(|secret| SecretString::from(secret.expose_secret())),
            persist: self.persist,
            attributes: self.attributes.clone(),
            target_alias: self.target_alias.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

/// Builder for [`Credential`]; validation happens in [`build`](Self::build).
#[derive(Debug)]
#[must_use]
pub struct CredentialBuilder {
    target_name: String,
    credential_type: CredentialType,
    persist: Option<Persistence>,
    flags: CredentialFlags,
    user_name: Option<String>,
    secret: Option<SecretString>,
    comment: Option<String>,
    target_alias: Option<String>,
    secret_limit: Option<SecretLimit>,
    last_written: Option<DateTime<Utc>>,
}

impl CredentialBuilder {
    fn new(target: impl Into<String>) -> Self {
        Self {
            target_name: target.into(),
            credential_type: CredentialType::default(),
            persist: None,
            flags: CredentialFlags::NONE,
            user_name: None,
            secret: None,
            comment: None,
            target_alias: None,
            secret_limit: None,
            last_written: None,
        }
    }

    /// Sets the credential type. Defaults to [`CredentialType::Generic`].
    pub const fn credential_type(mut self, credential_type: CredentialType) -> Self {
        self.credential_type = credential_type;
        self
    }

    /// Sets the persistence scope. Defaults to none.
    pub const fn persist(mut self, persist: Persistence) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Sets the characteristics. Defaults to none.
    pub const fn flags(mut self, flags: CredentialFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the user name.
    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Sets the secret payload.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Sets the comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the target alias.
    pub fn target_alias(mut self, alias: impl Into<String>) -> Self {
        self.target_alias = Some(alias.into());
        self
    }

    /// Validates the secret against `limit` instead of [`SecretLimit::host`].
    pub const fn secret_limit(mut self, limit: SecretLimit) -> Self {
        self.secret_limit = Some(limit);
        self
    }

    pub(crate) const fn last_written(mut self, last_written: DateTime<Utc>) -> Self {
        self.last_written = Some(last_written);
        self
    }

    pub(crate) fn secret_opt(mut self, secret: Option<SecretString>) -> Self {
        self.secret = secret;
        self
    }

    /// Validates every field and produces the credential.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::SecretTooLarge`] when the UTF-16 encoding of the
    ///   secret exceeds the active [`SecretLimit`].
    /// - [`CredentialError::FieldTooLong`] for comment, target alias or user
    ///   name above their limits.
    /// - [`CredentialError::InteriorNul`] when a NUL-terminated field
    ///   contains U+0000.
    pub fn build(self) -> CredentialResult<Credential> {
        reject_nul("target_name", &self.target_name)?;

        if let Some(secret) = &self.secret {
            let limit = self.secret_limit.unwrap_or_else(SecretLimit::host).max_bytes();
            let actual = utf16_len(secret.expose_secret()) * 2;
            if actual > limit {
                return Err(CredentialError::SecretTooLarge { actual, limit });
            }
        }

        Ok(Credential {
            flags: self.flags,
            credential_type: self.credential_type,
            comment: normalize_text("comment", self.comment.as_deref(), MAX_COMMENT_LENGTH)?,
            target_alias: normalize_text(
                "target_alias",
                self.target_alias.as_deref(),
                MAX_TARGET_ALIAS_LENGTH,
            )?,
            user_name: normalize_text(
                "user_name",
                self.user_name.as_deref(),
                MAX_USER_NAME_LENGTH,
            )?,
            target_name: self.target_name,
            last_written: self.last_written,
            secret: self.secret,
            persist: self.persist,
            attributes: None,
        })
    }
}

fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count()
}

fn reject_nul(field: &'static str, value: &str) -> CredentialResult<()> {
    if value.contains('\0') {
        return Err(CredentialError::InteriorNul { field });
    }
    Ok(())
}

fn normalize_text(
    field: &'static str,
    value: Option<&str>,
    limit: usize,
) -> CredentialResult<String> {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Ok(String::new());
    };
    let actual = utf16_len(value);
    if actual > limit {
        return Err(CredentialError::FieldTooLong { field, actual, limit });
    }
    reject_nul(field, value)?;
    Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample() -> Credential {
        Credential::new("alice", "s3cret", "app:service").expect("valid credential")
    }

    #[test]
    fn test_new_assigns_defaults() {
        let credential = sample();
        assert_eq!(credential.target_name(), "app:service");
        assert_eq!(credential.user_name(), "alice");
        assert_eq!(credential.secret().unwrap().expose_secret(), "s3cret");
        assert_eq!(credential.credential_type(), CredentialType::Generic);
        assert_eq!(credential.persist(), None);
        assert!(credential.flags().is_empty());
        assert_eq!(credential.comment(), "");
        assert_eq!(credential.target_alias(), "");
        assert!(credential.attributes().is_none());
        assert!(credential.last_written().is_none());
    }

    #[test]
    fn test_builder_sets_every_overload() {
        let credential = Credential::builder("corp\\server")
            .credential_type(CredentialType::DomainPassword)
            .persist(Persistence::Enterprise)
            .flags(CredentialFlags::USERNAME_TARGET)
            .user_name("corp\\server")
            .secret("hunter2")
            .comment("build agent")
            .target_alias("server")
            .build()
            .expect("valid credential");

        assert_eq!(credential.credential_type(), CredentialType::DomainPassword);
        assert_eq!(credential.persist(), Some(Persistence::Enterprise));
        assert_eq!(credential.flags(), CredentialFlags::USERNAME_TARGET);
        assert_eq!(credential.comment(), "build agent");
        assert_eq!(credential.target_alias(), "server");
    }

    #[test_case(SecretLimit::Legacy ; "legacy host")]
    #[test_case(SecretLimit::Modern ; "modern host")]
    fn test_secret_limit_boundary(limit: SecretLimit) {
        let at_limit = "x".repeat(limit.max_bytes() / 2);
        Credential::builder("t")
            .secret(at_limit.clone())
            .secret_limit(limit)
            .build()
            .expect("secret at the limit");

        let over_limit = format!("{at_limit}x");
        let err = Credential::builder("t")
            .secret(over_limit)
            .secret_limit(limit)
            .build()
            .expect_err("secret over the limit");
        match err {
            CredentialError::SecretTooLarge { actual, limit: max } => {
                assert_eq!(actual, limit.max_bytes() + 2);
                assert_eq!(max, limit.max_bytes());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_secret_limit_counts_utf16_bytes() {
        // U+1F512 encodes as a surrogate pair: four bytes of UTF-16.
        let secret = "\u{1F512}".repeat(SecretLimit::LEGACY_BYTES / 4);
        Credential::builder("t")
            .secret(secret.clone())
            .secret_limit(SecretLimit::Legacy)
            .build()
            .expect("exactly at the limit");
        let err = Credential::builder("t")
            .secret(format!("{secret}a"))
            .secret_limit(SecretLimit::Legacy)
            .build()
            .expect_err("two bytes over");
        assert!(matches!(err, CredentialError::SecretTooLarge { .. }));
    }

    #[test_case("comment", 256 ; "comment")]
    #[test_case("target_alias", 256 ; "target alias")]
    #[test_case("user_name", 513 ; "user name")]
    fn test_text_field_boundary(field: &str, limit: usize) {
        let mut credential = sample();
        let at_limit = "a".repeat(limit);
        let over_limit = "a".repeat(limit + 1);
        let set = |credential: &mut Credential, value: &str| match field {
            "comment" => credential.set_comment(Some(value)),
            "target_alias" => credential.set_target_alias(Some(value)),
            _ => credential.set_user_name(Some(value)),
        };

        set(&mut credential, &at_limit).expect("value at the limit");
        let err = set(&mut credential, &over_limit).expect_err("value over the limit");
        match err {
            CredentialError::FieldTooLong {
                field: name,
                actual,
                limit: max,
            } => {
                assert_eq!(name, field);
                assert_eq!(actual, limit + 1);
                assert_eq!(max, limit);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_setters_normalize_missing_values() {
        let mut credential = sample();
        credential.set_comment(Some("note")).unwrap();
        credential.set_comment(None).unwrap();
        assert_eq!(credential.comment(), "");

        credential.set_target_alias(Some("")).unwrap();
        assert_eq!(credential.target_alias(), "");

        credential.set_user_name(None).unwrap();
        assert_eq!(credential.user_name(), "");
    }

    #[test_case(0 ; "empty")]
    #[test_case(1 ; "single")]
    #[test_case(64 ; "at the count limit")]
    #[test_case(65 ; "over the count limit")]
    fn test_attributes_are_not_supported(count: usize) {
        let mut credential = sample();
        let attributes = vec![
            CredentialAttribute {
                keyword: "k".to_owned(),
                flags: 0,
                value: vec![1, 2, 3],
            };
            count
        ];
        let err = credential
            .set_attributes(Some(attributes))
            .expect_err("attributes are disabled");
        assert!(matches!(err, CredentialError::NotSupported { .. }));
        assert!(credential.attributes().is_none());

        credential.set_attributes(None).expect("clearing is allowed");
    }

    #[test]
    fn test_nul_characters_are_rejected() {
        let err = Credential::new("alice", "pw", "app\0service").expect_err("nul in target");
        assert!(matches!(
            err,
            CredentialError::InteriorNul {
                field: "target_name"
            }
        ));

        let mut credential = sample();
        let err = credential
            .set_user_name(Some("al\0ice"))
            .expect_err("nul in user name");
        assert!(matches!(err, CredentialError::InteriorNul { field: "user_name" }));

        // The blob is byte-counted, so NUL is fine there.
        Credential::new("alice", "pw\0pw", "app:service").expect("nul in secret");
    }

    #[test]
    fn test_identity_survives_content_changes() {
        let mut credential = sample();
        credential.set_flags(CredentialFlags::PROMPT_NOW);
        credential.set_persist(Some(Persistence::LocalMachine));
        credential.set_comment(Some("rotated")).unwrap();
        assert_eq!(credential.target_name(), "app:service");
        assert_eq!(credential.credential_type(), CredentialType::Generic);
    }

    #[test]
    fn test_clone_copies_secret() {
        let credential = sample();
        let copy = credential.clone();
        assert_eq!(copy.secret().unwrap().expose_secret(), "s3cret");
        assert_eq!(copy.user_name(), credential.user_name());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("s3cret"));
    }
}

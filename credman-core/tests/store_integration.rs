mod common;

use credman_core::{
    Credential, CredentialError, CredentialFlags, CredentialType, EnumerateFlags, OsErrorCode,
    Persistence, StoreOperation, WriteFlags,
};
use secrecy::ExposeSecret;

#[test]
fn test_alice_write_then_read() {
    let store = common::memory_store();
    let credential = common::generic("alice", "s3cret", "app:service");
    store.write(&credential).expect("write");

    let read = store
        .read("app:service", CredentialType::Generic)
        .expect("read");
    assert_eq!(read.user_name(), "alice");
    assert_eq!(read.secret().expect("secret").expose_secret(), "s3cret");
    assert_eq!(read.target_name(), "app:service");
    assert!(read.last_written().is_some());

    common::assert_no_leaks(&store);
}

#[test]
fn test_delete_then_read_is_not_found() {
    let store = common::memory_store();
    store
        .write(&common::generic("alice", "s3cret", "app:service"))
        .expect("write");
    store
        .delete("app:service", CredentialType::Generic)
        .expect("delete");

    let err = store
        .read("app:service", CredentialType::Generic)
        .expect_err("deleted");
    assert!(err.is_not_found());
    assert_eq!(err.os_code(), Some(OsErrorCode::NOT_FOUND));
}

#[test]
fn test_write_is_create_or_update() {
    let store = common::memory_store();
    let mut credential = Credential::builder("app:service")
        .user_name("alice")
        .secret("first")
        .persist(Persistence::Session)
        .build()
        .expect("valid");
    store.write(&credential).expect("create");
    store.write(&credential).expect("same content again");

    credential.set_comment(Some("second write")).expect("comment");
    credential.set_persist(Some(Persistence::Enterprise));
    store.write(&credential).expect("update");

    assert_eq!(store.backend().len(), 1);
    let read = store
        .read("APP:SERVICE", CredentialType::Generic)
        .expect("case-insensitive read");
    assert_eq!(read.comment(), "second write");
    assert_eq!(read.persist(), Some(Persistence::Enterprise));
    assert_eq!(read.secret().expect("secret").expose_secret(), "first");
}

#[test]
fn test_enumerate_preserves_store_order() {
    let store = common::memory_store();
    let targets = ["app:zeta", "app:alpha", "other:one", "app:mid"];
    for target in targets {
        store
            .write(&common::generic("u", "pw", target))
            .expect("write");
    }

    let all: Vec<String> = store
        .enumerate(None)
        .expect("enumerate")
        .iter()
        .map(|credential| credential.target_name().to_owned())
        .collect();
    assert_eq!(all, targets);

    let filtered: Vec<String> = store
        .enumerate(Some("app:*"))
        .expect("enumerate prefix")
        .iter()
        .map(|credential| credential.target_name().to_owned())
        .collect();
    assert_eq!(filtered, ["app:zeta", "app:alpha", "app:mid"]);

    assert_eq!(store.enumerate_all().expect("enumerate all").len(), 4);
    common::assert_no_leaks(&store);
}

#[test]
fn test_enumerate_all_with_filter_is_invalid_flags() {
    let store = common::memory_store();
    store
        .write(&common::generic("u", "pw", "app:one"))
        .expect("write");

    let err = store
        .enumerate_with(Some("app:*"), EnumerateFlags::ALL_CREDENTIALS)
        .expect_err("filter and all flag are exclusive");
    assert!(err.is_invalid_flags());
    assert!(matches!(
        err,
        CredentialError::Os {
            operation: StoreOperation::Enumerate,
            ..
        }
    ));
    common::assert_no_leaks(&store);
}

#[test]
fn test_enumerate_without_match_is_not_found() {
    let store = common::memory_store();
    let err = store.enumerate(None).expect_err("empty store");
    assert!(err.is_not_found());
}

#[test]
fn test_injected_write_failure_surfaces_code() {
    let store = common::memory_store();
    store
        .backend()
        .fail_next(StoreOperation::Write, OsErrorCode::NO_SUCH_LOGON_SESSION);

    let err = store
        .write(&common::generic("alice", "pw", "app:service"))
        .expect_err("injected");
    match err {
        CredentialError::Os { operation, code } => {
            assert_eq!(operation, StoreOperation::Write);
            assert_eq!(code, OsErrorCode::NO_SUCH_LOGON_SESSION);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.backend().is_empty());
}

#[test]
fn test_injected_read_failure_returns_no_credential() {
    let store = common::memory_store();
    store
        .write(&common::generic("alice", "pw", "app:service"))
        .expect("write");
    store
        .backend()
        .fail_next(StoreOperation::Read, OsErrorCode(5));

    let err = store
        .read("app:service", CredentialType::Generic)
        .expect_err("injected");
    assert_eq!(err.os_code(), Some(OsErrorCode(5)));
    common::assert_no_leaks(&store);

    store
        .read("app:service", CredentialType::Generic)
        .expect("one-shot failure");
}

#[test]
fn test_preserve_blob_updates_metadata_only() {
    let store = common::memory_store();
    store
        .write(&common::generic("alice", "keep-me", "app:service"))
        .expect("write");

    let metadata = Credential::builder("app:service")
        .user_name("alice2")
        .comment("renamed user")
        .build()
        .expect("valid");
    store
        .write_with_flags(&metadata, WriteFlags::PRESERVE_CREDENTIAL_BLOB)
        .expect("preserve write");

    let read = store
        .read("app:service", CredentialType::Generic)
        .expect("read");
    assert_eq!(read.user_name(), "alice2");
    assert_eq!(read.comment(), "renamed user");
    assert_eq!(read.secret().expect("secret").expose_secret(), "keep-me");
}

#[test]
fn test_domain_credential_with_username_target() {
    let store = common::memory_store();
    let credential = Credential::builder("corp\\build")
        .credential_type(CredentialType::DomainPassword)
        .flags(CredentialFlags::USERNAME_TARGET)
        .persist(Persistence::LocalMachine)
        .secret("hunter2")
        .build()
        .expect("valid");
    store.write(&credential).expect("write");

    let read = store
        .read("corp\\build", CredentialType::DomainPassword)
        .expect("read");
    assert_eq!(read.user_name(), "corp\\build");
    assert!(read.flags().contains(CredentialFlags::USERNAME_TARGET));

    let err = store
        .read("corp\\build", CredentialType::Generic)
        .expect_err("type is part of identity");
    assert!(err.is_not_found());
}

#[test]
fn test_many_round_trips_leave_no_buffers() {
    let store = common::memory_store();
    for index in 0..32 {
        let target = format!("app:{index}");
        store
            .write(&common::generic("u", &format!("secret-{index}"), &target))
            .expect("write");
        let read = store
            .read(&target, CredentialType::Generic)
            .expect("read");
        assert_eq!(
            read.secret().expect("secret").expose_secret(),
            format!("secret-{index}")
        );
    }
    assert_eq!(store.enumerate(Some("app:*")).expect("enumerate").len(), 32);
    for index in (0..32).step_by(2) {
        store
            .delete(&format!("app:{index}"), CredentialType::Generic)
            .expect("delete");
    }
    assert_eq!(store.backend().len(), 16);
    common::assert_no_leaks(&store);
}

#[test]
fn test_memory_backends_do_not_share_credentials() {
    let writer = common::memory_store();
    writer
        .write(&common::generic("alice", "s3cret", "app:service"))
        .expect("write");

    let other = common::memory_store();
    let err = other
        .read("app:service", CredentialType::Generic)
        .expect_err("separate in-process set");
    assert!(err.is_not_found());
}

#[cfg(windows)]
#[test]
fn test_platform_store_is_shared_between_handles() {
    use credman_core::CredentialStore;

    let target = format!("credman-test:{}", std::process::id());
    let mut credential = common::generic("alice", "s3cret", &target);
    credential.set_persist(Some(Persistence::Session));
    CredentialStore::new().write(&credential).expect("write");

    let read = CredentialStore::new()
        .read(&target, CredentialType::Generic)
        .expect("visible through a second handle");
    assert_eq!(read.secret().expect("secret").expose_secret(), "s3cret");

    CredentialStore::new()
        .delete(&target, CredentialType::Generic)
        .expect("delete");
}

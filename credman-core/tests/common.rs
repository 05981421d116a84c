//! Common test utilities shared across integration tests.

use credman_core::{Credential, CredentialStore, MemoryBackend};

pub type TestStore = CredentialStore<MemoryBackend>;

pub fn memory_store() -> TestStore {
    CredentialStore::with_backend(MemoryBackend::new())
}

pub fn generic(user_name: &str, secret: &str, target: &str) -> Credential {
    Credential::new(user_name, secret, target).expect("valid credential")
}

/// Fails the test if any buffer handed out by the backend is still live or
/// was released through the wrong path.
pub fn assert_no_leaks(store: &TestStore) {
    assert_eq!(store.backend().outstanding_allocations(), 0, "leaked os buffers");
    assert_eq!(store.backend().invalid_frees(), 0, "foreign buffers freed");
}

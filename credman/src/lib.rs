//! Foreign bindings for `credman_core`, exported through `UniFFI`.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod error;
pub use error::*;

pub mod logger;

mod manager;
pub use manager::*;

mod types;
pub use types::*;

/// Largest secret, in bytes of UTF-16, the host credential store accepts.
#[uniffi::export]
#[must_use]
pub fn secret_limit_bytes() -> u32 {
    u32::try_from(credman_core::SecretLimit::host().max_bytes()).unwrap_or(u32::MAX)
}

uniffi::setup_scaffolding!("credman");

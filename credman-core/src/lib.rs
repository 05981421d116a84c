//! Safe access to the Windows Credential Manager.
//!
//! [`Credential`] is a validated value object. [`CredentialStore`] reads,
//! writes, deletes and enumerates credentials through a
//! [`CredentialBackend`], converting between the value object and the
//! native `CREDENTIALW` record and releasing every buffer it allocates or
//! receives.
//!
//! ```
//! use credman_core::{Credential, CredentialStore, CredentialType, MemoryBackend};
//!
//! let store = CredentialStore::with_backend(MemoryBackend::new());
//! let credential = Credential::new("alice", "s3cret", "app:service")?;
//! store.write(&credential)?;
//!
//! let read = store.read("app:service", CredentialType::Generic)?;
//! assert_eq!(read.user_name(), "alice");
//! assert!(read.last_written().is_some());
//! # Ok::<(), credman_core::CredentialError>(())
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod backend;
pub mod ffi;
pub mod limits;
pub mod marshal;

mod credential;
pub use credential::*;

mod error;
pub use error::*;

mod store;
pub use store::*;

mod types;
pub use types::*;

#[cfg(windows)]
pub use backend::DefaultBackend;
pub use backend::{CredentialBackend, MemoryBackend, OsBuffer};
pub use limits::SecretLimit;

// src/storage/mod.rs

pub mod credential;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod traits;

pub use credential::{Credential, CredentialStatus};
pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use traits::{CredentialStore, Mutation};

// src/storage/traits.rs

use crate::error::Result;
use crate::storage::Credential;
use async_trait::async_trait;

/// A field update applied to one record under that record's lock.
pub type Mutation = Box<dyn FnOnce(&mut Credential) + Send>;

/// Storage of credential health records.
///
/// `update` is all-or-nothing: the mutation runs against a copy that is
/// committed as a whole. `id` and `registration_seq` are restored after the
/// mutation so identifiers stay immutable.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert an `unknown` record if the identifier is new; return the current record.
    async fn register(&self, id: &str) -> Result<Credential>;

    /// Snapshot of all records, in no particular order.
    async fn list(&self) -> Result<Vec<Credential>>;

    /// Fails with `CredentialNotFound` for unknown identifiers.
    async fn get(&self, id: &str) -> Result<Credential>;

    /// Fails with `CredentialNotFound` for unknown identifiers.
    async fn update(&self, id: &str, mutation: Mutation) -> Result<Credential>;
}

pub(crate) fn apply_mutation(current: &Credential, mutation: Mutation) -> Credential {
    let mut next = current.clone();
    mutation(&mut next);
    next.id.clone_from(&current.id);
    next.registration_seq = current.registration_seq;
    next
}

//! Backend abstraction.
//!
//! The filesystem state lives in a flat keyed store with three value
//! kinds: byte strings, string-to-string hashes, and string sets. The
//! engine never talks to a backend directly; it goes through [`KvStore`],
//! reading with the typed accessors and writing through [`Batch`], the
//! unit of atomicity.
//!
//! A batch applies in order and all-or-nothing. If any mutation fails
//! (for example renaming a key that does not exist), the store must leave
//! every key as it was before the batch.

use std::collections::HashMap;

use async_trait::async_trait;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A mutation referenced a key that must exist but does not.
    #[error("no such key: {0}")]
    MissingKey(String),

    /// A key holds a different value kind than the operation requires.
    #[error("wrong value kind for key {key}: expected {expected}")]
    WrongKind { key: String, expected: &'static str },

    /// A synchronization primitive was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Backend-specific failure, carried as text.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn missing_key(key: impl Into<String>) -> Self {
        StoreError::MissingKey(key.into())
    }

    pub fn wrong_kind(key: impl Into<String>, expected: &'static str) -> Self {
        StoreError::WrongKind {
            key: key.into(),
            expected,
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}

/// One write in a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Set a string key, replacing any prior value.
    PutString { key: String, value: Vec<u8> },
    /// Append to a string key, creating it when absent.
    AppendString { key: String, value: Vec<u8> },
    /// Merge fields into a hash key, creating it when absent.
    PutHash {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Remove fields from a hash key. Missing fields are ignored; a hash
    /// left with no fields disappears.
    DropHashFields { key: String, fields: Vec<String> },
    /// Add a member to a set key, creating it when absent.
    AddMember { key: String, member: String },
    /// Remove a member from a set key. A set left empty disappears.
    RemoveMember { key: String, member: String },
    /// Delete keys of any kind. Missing keys are ignored.
    DeleteKeys { keys: Vec<String> },
    /// Rename a key, replacing any value at `to`. Fails the batch with
    /// [`StoreError::MissingKey`] when `from` does not exist.
    RenameKey { from: String, to: String },
}

/// An ordered group of mutations applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    mutations: Vec<Mutation>,
}

impl Batch {
    pub fn new() -> Self {
        Batch::default()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.mutations.push(Mutation::PutString {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn append_string(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.mutations.push(Mutation::AppendString {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn put_hash(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.mutations.push(Mutation::PutHash {
            key: key.into(),
            fields,
        });
        self
    }

    pub fn drop_hash_fields(
        &mut self,
        key: impl Into<String>,
        fields: Vec<String>,
    ) -> &mut Self {
        self.mutations.push(Mutation::DropHashFields {
            key: key.into(),
            fields,
        });
        self
    }

    pub fn add_member(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::AddMember {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn remove_member(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::RemoveMember {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn delete_keys(&mut self, keys: impl Into<Vec<String>>) -> &mut Self {
        self.mutations.push(Mutation::DeleteKeys { keys: keys.into() });
        self
    }

    pub fn rename_key(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::RenameKey {
            from: from.into(),
            to: to.into(),
        });
        self
    }
}

/// A flat keyed store with string, hash and set values.
///
/// Reads on a missing key return the kind's empty value (`None`, zero
/// length, empty map or list) rather than an error. Writes go through
/// [`KvStore::apply`] and commit atomically.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value of a string key.
    async fn get_string(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Byte length of a string key. Zero when absent.
    async fn string_len(&self, key: &str) -> StoreResult<i64>;

    /// One field of a hash key.
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// All fields of a hash key. Empty when absent.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// All fields of several hash keys in one round trip, in input order.
    async fn hash_get_all_multi(
        &self,
        keys: &[String],
    ) -> StoreResult<Vec<HashMap<String, String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.hash_get_all(key).await?);
        }
        Ok(out)
    }

    /// Set a hash field only when it is not already present. Returns
    /// whether the field was written.
    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool>;

    /// Members of a set key. Order is unspecified; empty when absent.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Cardinality of a set key. Zero when absent.
    async fn set_len(&self, key: &str) -> StoreResult<i64>;

    /// Whether a key exists with any value kind.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Keys matching a glob pattern (`*` and `?`).
    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Apply a batch atomically.
    async fn apply(&self, batch: Batch) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder_orders_mutations() {
        let mut batch = Batch::new();
        batch
            .put_hash("h", vec![("f".to_string(), "v".to_string())])
            .add_member("s", "m")
            .delete_keys(vec!["x".to_string()]);

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.mutations()[0], Mutation::PutHash { .. }));
        assert!(matches!(batch.mutations()[1], Mutation::AddMember { .. }));
        assert!(matches!(batch.mutations()[2], Mutation::DeleteKeys { .. }));
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}

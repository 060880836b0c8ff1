//! In-memory backend.
//!
//! Used for tests and for running without a database file. All data is
//! ephemeral.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::glob;
use crate::store::{Batch, KvStore, Mutation, StoreError, StoreResult};

/// One keyed value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(Vec<u8>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

/// In-memory [`KvStore`].
///
/// Thread-safe via an internal `RwLock`. Batches apply to a working copy
/// of the key map which replaces the live map only when every mutation
/// succeeded, so a failed batch is invisible.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn read_lock(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.keys.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_lock(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.keys.write().map_err(|_| StoreError::LockPoisoned)
    }
}

fn apply_one(map: &mut HashMap<String, Value>, mutation: Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::PutString { key, value } => {
            // replaces a value of any kind
            map.insert(key, Value::Str(value));
        }
        Mutation::AppendString { key, value } => match map.get_mut(&key) {
            None => {
                map.insert(key, Value::Str(value));
            }
            Some(Value::Str(existing)) => existing.extend_from_slice(&value),
            Some(_) => return Err(StoreError::wrong_kind(&key, "string")),
        },
        Mutation::PutHash { key, fields } => match map.get_mut(&key) {
            None => {
                if !fields.is_empty() {
                    map.insert(key, Value::Hash(fields.into_iter().collect()));
                }
            }
            Some(Value::Hash(existing)) => existing.extend(fields),
            Some(_) => return Err(StoreError::wrong_kind(&key, "hash")),
        },
        Mutation::DropHashFields { key, fields } => match map.get_mut(&key) {
            None => {}
            Some(Value::Hash(existing)) => {
                for field in &fields {
                    existing.remove(field);
                }
                if existing.is_empty() {
                    map.remove(&key);
                }
            }
            Some(_) => return Err(StoreError::wrong_kind(&key, "hash")),
        },
        Mutation::AddMember { key, member } => match map.get_mut(&key) {
            None => {
                map.insert(key, Value::Set(HashSet::from([member])));
            }
            Some(Value::Set(existing)) => {
                existing.insert(member);
            }
            Some(_) => return Err(StoreError::wrong_kind(&key, "set")),
        },
        Mutation::RemoveMember { key, member } => match map.get_mut(&key) {
            None => {}
            Some(Value::Set(existing)) => {
                existing.remove(&member);
                if existing.is_empty() {
                    map.remove(&key);
                }
            }
            Some(_) => return Err(StoreError::wrong_kind(&key, "set")),
        },
        Mutation::DeleteKeys { keys } => {
            for key in keys {
                map.remove(&key);
            }
        }
        Mutation::RenameKey { from, to } => {
            let value = map
                .remove(&from)
                .ok_or_else(|| StoreError::missing_key(&from))?;
            map.insert(to, value);
        }
    }
    Ok(())
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_string(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(None),
            Some(Value::Str(v)) => Ok(Some(v.clone())),
            Some(_) => Err(StoreError::wrong_kind(key, "string")),
        }
    }

    async fn string_len(&self, key: &str) -> StoreResult<i64> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(0),
            Some(Value::Str(v)) => Ok(v.len() as i64),
            Some(_) => Err(StoreError::wrong_kind(key, "string")),
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(h.get(field).cloned()),
            Some(_) => Err(StoreError::wrong_kind(key, "hash")),
        }
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(_) => Err(StoreError::wrong_kind(key, "hash")),
        }
    }

    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut keys = self.write_lock()?;
        match keys.get_mut(key) {
            None => {
                keys.insert(
                    key.to_string(),
                    Value::Hash(HashMap::from([(field.to_string(), value.to_string())])),
                );
                Ok(true)
            }
            Some(Value::Hash(h)) => {
                if h.contains_key(field) {
                    Ok(false)
                } else {
                    h.insert(field.to_string(), value.to_string());
                    Ok(true)
                }
            }
            Some(_) => Err(StoreError::wrong_kind(key, "hash")),
        }
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(_) => Err(StoreError::wrong_kind(key, "set")),
        }
    }

    async fn set_len(&self, key: &str) -> StoreResult<i64> {
        let keys = self.read_lock()?;
        match keys.get(key) {
            None => Ok(0),
            Some(Value::Set(s)) => Ok(s.len() as i64),
            Some(_) => Err(StoreError::wrong_kind(key, "set")),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let keys = self.read_lock()?;
        Ok(keys.contains_key(key))
    }

    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let keys = self.read_lock()?;
        let mut matched: Vec<String> = keys
            .keys()
            .filter(|k| glob::glob_match(pattern, k))
            .cloned()
            .collect();
        // stable output for callers that display the result
        matched.sort();
        Ok(matched)
    }

    async fn apply(&self, batch: Batch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut keys = self.write_lock()?;
        let mut next = keys.clone();
        for mutation in batch.into_mutations() {
            apply_one(&mut next, mutation)?;
        }
        *keys = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_round_trip() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_string("k", b"hello".to_vec());
        store.apply(batch).await.unwrap();

        assert_eq!(store.get_string("k").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.string_len("k").await.unwrap(), 5);
        assert_eq!(store.get_string("missing").await.unwrap(), None);
        assert_eq!(store.string_len("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.append_string("k", b"ab".to_vec());
        batch.append_string("k", b"cd".to_vec());
        store.apply(batch).await.unwrap();

        assert_eq!(store.get_string("k").await.unwrap(), Some(b"abcd".to_vec()));
    }

    #[tokio::test]
    async fn test_hash_ops() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_hash(
            "h",
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
        );
        store.apply(batch).await.unwrap();

        assert_eq!(store.hash_get("h", "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.hash_get("h", "z").await.unwrap(), None);
        assert_eq!(store.hash_get_all("h").await.unwrap().len(), 2);

        // dropping the last field removes the key
        let mut batch = Batch::new();
        batch.drop_hash_fields("h", vec!["a".to_string(), "b".to_string()]);
        store.apply(batch).await.unwrap();
        assert!(!store.exists("h").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_set_nx() {
        let store = MemoryStore::new();
        assert!(store.hash_set_nx("h", "f", "first").await.unwrap());
        assert!(!store.hash_set_nx("h", "f", "second").await.unwrap());
        assert_eq!(store.hash_get("h", "f").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_set_ops() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.add_member("s", "x").add_member("s", "y");
        store.apply(batch).await.unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(store.set_len("s").await.unwrap(), 2);

        // removing the last member removes the key
        let mut batch = Batch::new();
        batch.remove_member("s", "x").remove_member("s", "y");
        store.apply(batch).await.unwrap();
        assert!(!store.exists("s").await.unwrap());
        assert_eq!(store.set_len("s").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_string("a", b"v".to_vec());
        store.apply(batch).await.unwrap();

        let mut batch = Batch::new();
        batch.rename_key("a", "b");
        store.apply(batch).await.unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert_eq!(store.get_string("b").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_trace() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_string("a", b"v".to_vec());
        batch.rename_key("missing", "elsewhere");

        let err = store.apply(batch).await.unwrap_err();
        assert_eq!(err, StoreError::missing_key("missing"));
        // the earlier PutString in the same batch must not be visible
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_kind() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_string("k", b"v".to_vec());
        store.apply(batch).await.unwrap();

        let err = store.hash_get_all("k").await.unwrap_err();
        assert_eq!(err, StoreError::wrong_kind("k", "hash"));

        let mut batch = Batch::new();
        batch.add_member("k", "m");
        assert!(store.apply(batch).await.is_err());
    }

    #[tokio::test]
    async fn test_put_string_replaces_other_kind() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.add_member("k", "m");
        store.apply(batch).await.unwrap();

        let mut batch = Batch::new();
        batch.put_string("k", b"now a string".to_vec());
        store.apply(batch).await.unwrap();
        assert_eq!(store.string_len("k").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_scan_keys() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.put_string("fs:default:meta:/", b"x".to_vec());
        batch.put_string("fs:media:meta:/", b"x".to_vec());
        batch.put_string("fs:media:meta:/a", b"x".to_vec());
        store.apply(batch).await.unwrap();

        let keys = store.scan_keys("fs:*:meta:/").await.unwrap();
        assert_eq!(
            keys,
            vec!["fs:default:meta:/".to_string(), "fs:media:meta:/".to_string()]
        );
    }
}

use crate::{
    common::{generate_key, ApiVersion},
    error::{DeserialiseValue, MissingEntry, ReadOnly, SerialiseValue},
    Error,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;
use std::collections::BTreeMap;

/// Trait defining the transactional access to a key-value store.
/// A transaction function either commits all of its changes or none of them.
pub trait Store: Sync + Send + Clone {
    /// Run `f` within a read-only transaction.
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, E>,
        E: From<Error>;
    /// Run `f` within a read-write transaction.
    /// Writes are serialised: only one `update` runs at any given time.
    /// Changes are committed only if `f` returns `Ok`.
    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R, E>,
        E: From<Error>;
}

/// Implemented by Keys of Storable Objects.
pub trait ObjectKey: Sync + Send {
    type Kind: AsRef<str>;

    fn key(&self) -> String {
        generate_key(self)
    }
    fn version(&self) -> ApiVersion;
    fn key_type(&self) -> Self::Kind;
    fn key_uuid(&self) -> String;
}

/// Implemented by objects which get stored in the store.
pub trait StorableObject: Serialize + Sync + Send + DeserializeOwned {
    type Key: ObjectKey;

    fn key(&self) -> Self::Key;
    /// The prefix shared by the keys of all objects of this type.
    fn key_prefix() -> String;
}

/// A transaction over the key space.
/// Reads observe the committed state overlaid with the writes done so far by this transaction.
#[derive(Debug)]
pub struct Transaction<'a> {
    base: &'a BTreeMap<String, Value>,
    /// Pending writes, `None` values are deletions.
    /// A read-only transaction has no write set.
    writes: Option<BTreeMap<String, Option<Value>>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn read_only(base: &'a BTreeMap<String, Value>) -> Self {
        Self { base, writes: None }
    }
    pub(crate) fn read_write(base: &'a BTreeMap<String, Value>) -> Self {
        Self {
            base,
            writes: Some(BTreeMap::new()),
        }
    }
    pub(crate) fn into_writes(self) -> BTreeMap<String, Option<Value>> {
        self.writes.unwrap_or_default()
    }
    fn writes_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, Option<Value>>, Error> {
        match self.writes.as_mut() {
            Some(writes) => Ok(writes),
            None => ReadOnly { key }.fail(),
        }
    }
    fn value(&self, key: &str) -> Option<&Value> {
        match self.writes.as_ref().and_then(|w| w.get(key)) {
            Some(written) => written.as_ref(),
            None => self.base.get(key),
        }
    }

    /// Get the value from the given key entry.
    pub fn get_kv(&self, key: &str) -> Result<Value, Error> {
        match self.value(key) {
            Some(value) => Ok(value.clone()),
            None => MissingEntry { key }.fail(),
        }
    }
    /// Puts the given value under the given key.
    pub fn put_kv<V: Serialize>(&mut self, key: &str, value: &V) -> Result<(), Error> {
        let value = serde_json::to_value(value).context(SerialiseValue)?;
        self.writes_mut(key)?.insert(key.to_string(), Some(value));
        Ok(())
    }
    /// Deletes the given key entry. Deleting a missing entry is not an error.
    pub fn delete_kv(&mut self, key: &str) -> Result<(), Error> {
        self.writes_mut(key)?.insert(key.to_string(), None);
        Ok(())
    }
    /// Returns all key-value pairs whose key starts with `key_prefix`, sorted by key.
    pub fn get_values_prefix(&self, key_prefix: &str) -> Vec<(String, Value)> {
        let mut values = self
            .base
            .range(key_prefix.to_string() ..)
            .take_while(|(key, _)| key.starts_with(key_prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<BTreeMap<_, _>>();
        if let Some(writes) = &self.writes {
            let written = writes
                .range(key_prefix.to_string() ..)
                .take_while(|(key, _)| key.starts_with(key_prefix));
            for (key, value) in written {
                match value {
                    Some(value) => values.insert(key.clone(), value.clone()),
                    None => values.remove(key),
                };
            }
        }
        values.into_iter().collect()
    }

    /// Gets the object `O` through its `O::Key`.
    pub fn get_obj<O: StorableObject>(&self, key: &O::Key) -> Result<O, Error> {
        decode(&self.get_kv(&key.key())?)
    }
    /// Puts the given `O` object into the store.
    pub fn put_obj<O: StorableObject>(&mut self, object: &O) -> Result<(), Error> {
        self.put_kv(&object.key().key(), object)
    }
    /// Deletes the object with the given key.
    pub fn delete_obj<K: ObjectKey>(&mut self, key: &K) -> Result<(), Error> {
        self.delete_kv(&key.key())
    }
    /// Gets all objects of type `O`, sorted by key.
    pub fn get_objs<O: StorableObject>(&self) -> Result<Vec<O>, Error> {
        self.get_values_prefix(&O::key_prefix())
            .into_iter()
            .map(|(_, value)| decode(&value))
            .collect()
    }
}

/// Deserialise an object, keeping the raw value in the error.
fn decode<O: DeserializeOwned>(value: &Value) -> Result<O, Error> {
    <O as Deserialize>::deserialize(value).with_context(|_| DeserialiseValue {
        value: value.to_string(),
    })
}

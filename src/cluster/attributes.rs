//! Tagged-value attribute store
//!
//! Typed key/value metadata attached to a cluster member. Each key holds
//! exactly one value of exactly one tag; overwriting with a different tag is
//! a normal write. Every successful mutation bumps a version counter and is
//! published on a broadcast feed so a replication task can pick it up.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change feed before slow subscribers start lagging
const CHANGE_FEED_CAPACITY: usize = 256;

/// Result type for attribute operations
pub type AttributeResult<T> = Result<T, AttributeError>;

/// Attribute store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    /// The stored tag differs from the one the caller asked for
    #[error("attribute '{key}' holds {actual}, requested {requested}")]
    TypeMismatch {
        key: String,
        requested: AttributeType,
        actual: AttributeType,
    },
}

/// Type tag of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Int8 => "int8",
            AttributeType::Int16 => "int16",
            AttributeType::Int32 => "int32",
            AttributeType::Int64 => "int64",
            AttributeType::Float32 => "float32",
            AttributeType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// A tagged attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl AttributeValue {
    /// Tag of this value
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Int8(_) => AttributeType::Int8,
            AttributeValue::Int16(_) => AttributeType::Int16,
            AttributeValue::Int32(_) => AttributeType::Int32,
            AttributeValue::Int64(_) => AttributeType::Int64,
            AttributeValue::Float32(_) => AttributeType::Float32,
            AttributeValue::Float64(_) => AttributeType::Float64,
        }
    }
}

macro_rules! attribute_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::$variant(value)
                }
            }

            impl AttributeKind for $ty {
                const TYPE: AttributeType = AttributeType::$variant;

                fn from_value(value: AttributeValue) -> Option<Self> {
                    match value {
                        AttributeValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Rust types that map one-to-one onto an attribute tag
pub trait AttributeKind: Sized + Into<AttributeValue> {
    /// Tag used when fetching this type
    const TYPE: AttributeType;

    /// Unwrap a value already known to carry `Self::TYPE`
    fn from_value(value: AttributeValue) -> Option<Self>;
}

attribute_conversions! {
    String => String,
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

/// One `(key, tag, value)` entry of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
}

impl Attribute {
    /// Tag of the stored value
    pub fn attribute_type(&self) -> AttributeType {
        self.value.attribute_type()
    }
}

/// Mutation published on the change feed
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeChange {
    /// Key inserted or overwritten
    Put {
        key: String,
        value: AttributeValue,
        version: u64,
    },
    /// Key removed
    Remove { key: String, version: u64 },
}

/// Concurrent attribute container
pub struct AttributeStore {
    /// Current values
    entries: RwLock<HashMap<String, AttributeValue>>,
    /// Bumped on every successful mutation
    version: AtomicU64,
    /// Push side of the change feed
    changes: broadcast::Sender<AttributeChange>,
}

impl AttributeStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            changes,
        }
    }

    /// Create a store pre-populated with `attributes`
    ///
    /// Initial entries do not produce change events.
    pub fn with_attributes<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        let store = Self::new();
        store.entries.write().extend(attributes);
        store
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.write();
        entries.insert(key.clone(), value.clone());
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        // Published under the write guard so the feed stays in version order.
        // No subscribers is not an error.
        let _ = self.changes.send(AttributeChange::Put { key, value, version });
    }

    /// Fetch `key` if it holds a value tagged `expected`
    pub fn get(&self, key: &str, expected: AttributeType) -> AttributeResult<Option<AttributeValue>> {
        let entries = self.entries.read();
        match entries.get(key) {
            None => Ok(None),
            Some(value) if value.attribute_type() == expected => Ok(Some(value.clone())),
            Some(value) => Err(AttributeError::TypeMismatch {
                key: key.to_string(),
                requested: expected,
                actual: value.attribute_type(),
            }),
        }
    }

    /// Typed variant of [`AttributeStore::get`]
    pub fn get_as<T: AttributeKind>(&self, key: &str) -> AttributeResult<Option<T>> {
        Ok(self.get(key, T::TYPE)?.and_then(T::from_value))
    }

    /// Delete `key`; absent keys are ignored
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_none() {
            return;
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.changes.send(AttributeChange::Remove {
            key: key.to_string(),
            version,
        });
    }

    /// Snapshot of every entry, in no particular order
    pub fn get_all(&self) -> impl Iterator<Item = Attribute> {
        let snapshot: Vec<Attribute> = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| Attribute {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        snapshot.into_iter()
    }

    /// Replace every entry at once, as when adopting a replicated snapshot
    pub fn replace_all<I>(&self, attributes: I)
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        let mut entries = self.entries.write();
        entries.clear();
        entries.extend(attributes);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Mutation counter for poll-style replication
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Subscribe to push-style change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChange> {
        self.changes.subscribe()
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeStore")
            .field("entries", &*self.entries.read())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_then_get_matching_type() {
        let store = AttributeStore::new();
        store.set("region", "us-east");
        store.set("cores", 8i32);

        assert_eq!(
            store.get("region", AttributeType::String).unwrap(),
            Some(AttributeValue::String("us-east".to_string()))
        );
        assert_eq!(store.get_as::<i32>("cores").unwrap(), Some(8));
    }

    #[test]
    fn test_get_unset_key_is_absent() {
        let store = AttributeStore::new();
        assert_eq!(store.get("missing", AttributeType::Bool).unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_reports_both_tags() {
        let store = AttributeStore::new();
        store.set("weight", 1.5f64);

        let err = store.get("weight", AttributeType::Float32).unwrap_err();
        assert_eq!(
            err,
            AttributeError::TypeMismatch {
                key: "weight".to_string(),
                requested: AttributeType::Float32,
                actual: AttributeType::Float64,
            }
        );
    }

    #[test]
    fn test_overwrite_changes_tag() {
        let store = AttributeStore::new();
        store.set("level", 3i16);
        store.set("level", "high");

        assert!(store.get("level", AttributeType::Int16).is_err());
        assert_eq!(store.get_as::<String>("level").unwrap(), Some("high".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = AttributeStore::new();
        store.set("a", true);
        let before = store.version();

        store.remove("b");

        assert_eq!(store.version(), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_then_get_is_absent() {
        let store = AttributeStore::new();
        store.set("region", "us-east");
        store.remove("region");
        assert_eq!(store.get("region", AttributeType::String).unwrap(), None);
    }

    #[test]
    fn test_get_all_is_a_snapshot() {
        let store = AttributeStore::new();
        store.set("a", 1i8);
        store.set("b", 2i64);

        let snapshot = store.get_all();
        store.set("c", 3i32);

        let mut keys: Vec<String> = snapshot.map(|a| a.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_change_feed_reports_mutations() {
        let store = AttributeStore::new();
        let mut feed = store.subscribe();

        store.set("zone", "b");
        store.remove("zone");
        store.remove("zone");

        assert_eq!(
            feed.try_recv().unwrap(),
            AttributeChange::Put {
                key: "zone".to_string(),
                value: AttributeValue::String("b".to_string()),
                version: 1,
            }
        );
        assert_eq!(
            feed.try_recv().unwrap(),
            AttributeChange::Remove {
                key: "zone".to_string(),
                version: 2,
            }
        );
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_writes_publish_in_version_order() {
        let store = Arc::new(AttributeStore::new());
        let mut feed = store.subscribe();

        let writers: Vec<_> = (0..4i32)
            .map(|writer| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        store.set("hot", writer * 100 + n);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut last = None;
        let mut seen = 0;
        while let Ok(change) = feed.try_recv() {
            let (value, version) = match change {
                AttributeChange::Put { value, version, .. } => (value, version),
                other => panic!("unexpected change {:?}", other),
            };
            assert_eq!(version, seen + 1);
            seen = version;
            last = Some(value);
        }
        assert_eq!(seen, 200);
        assert_eq!(last, store.get("hot", AttributeType::Int32).unwrap());
    }

    #[test]
    fn test_concurrent_writers_last_writer_wins() {
        let store = Arc::new(AttributeStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        if i % 2 == 0 {
                            store.set("shared", n as i32);
                        } else {
                            store.set("shared", format!("v{}", n));
                        }
                        store.set(format!("own-{}", i), n as i64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 9);
        assert_eq!(store.version(), 8 * 200);
        let shared = store.get_all().find(|a| a.key == "shared").unwrap();
        assert!(matches!(
            shared.attribute_type(),
            AttributeType::Int32 | AttributeType::String
        ));
    }

    #[test]
    fn test_attribute_value_toml_shape() {
        #[derive(Deserialize)]
        struct Holder {
            value: AttributeValue,
        }
        let holder: Holder = toml::from_str("value = { type = \"int16\", value = 7 }").unwrap();
        assert_eq!(holder.value, AttributeValue::Int16(7));
    }
}

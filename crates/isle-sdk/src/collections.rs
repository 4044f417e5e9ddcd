//! Collection traits
//!
//! Lists, sets and maps are trait objects so a collection that crosses a
//! universe boundary can be either an independent copy or a live view that
//! converts elements on access and writes through to the original. Every
//! operation is fallible because a view may fail to convert an element.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BridgeError, BridgeResult};
use crate::value::Value;

/// Shared handle to a sequence
pub type SequenceRef = Arc<dyn Sequence>;

/// Shared handle to a set
pub type SetRef = Arc<dyn SetLike>;

/// Shared handle to a map
pub type MapRef = Arc<dyn MapLike>;

// ============================================================================
// Traits
// ============================================================================

/// Ordered, index-addressable sequence
pub trait Sequence: Send + Sync {
    /// Number of elements
    fn len(&self) -> usize;

    /// Check if the sequence is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, `None` past the end
    fn get(&self, index: usize) -> BridgeResult<Option<Value>>;

    /// Replace the element at `index`, returning the previous one
    fn set(&self, index: usize, value: Value) -> BridgeResult<Value>;

    /// Append an element
    fn push(&self, value: Value) -> BridgeResult<()>;

    /// Remove and return the element at `index`
    fn remove(&self, index: usize) -> BridgeResult<Value>;

    /// Copy out every element in order
    fn snapshot(&self) -> BridgeResult<Vec<Value>>;
}

/// Unordered collection of unique values
pub trait SetLike: Send + Sync {
    /// Number of elements
    fn len(&self) -> usize;

    /// Check if the set is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test
    fn contains(&self, value: &Value) -> BridgeResult<bool>;

    /// Insert, returning `true` if the value was not present
    fn insert(&self, value: Value) -> BridgeResult<bool>;

    /// Remove, returning `true` if the value was present
    fn remove(&self, value: &Value) -> BridgeResult<bool>;

    /// Copy out every element
    fn snapshot(&self) -> BridgeResult<Vec<Value>>;
}

/// Key/value mapping with unique keys
pub trait MapLike: Send + Sync {
    /// Number of entries
    fn len(&self) -> usize;

    /// Check if the map is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value stored under `key`
    fn get(&self, key: &Value) -> BridgeResult<Option<Value>>;

    /// Store `value` under `key`, returning the previous value
    fn insert(&self, key: Value, value: Value) -> BridgeResult<Option<Value>>;

    /// Remove the entry for `key`, returning its value
    fn remove(&self, key: &Value) -> BridgeResult<Option<Value>>;

    /// Copy out every entry
    fn entries(&self) -> BridgeResult<Vec<(Value, Value)>>;
}

// ============================================================================
// Owned implementations
// ============================================================================

/// Vector-backed [`Sequence`]
#[derive(Debug, Default)]
pub struct VecSequence {
    items: RwLock<Vec<Value>>,
}

impl VecSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `items`
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

impl Sequence for VecSequence {
    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn get(&self, index: usize) -> BridgeResult<Option<Value>> {
        Ok(self.items.read().get(index).cloned())
    }

    fn set(&self, index: usize, value: Value) -> BridgeResult<Value> {
        let mut items = self.items.write();
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(BridgeError::IndexOutOfBounds { index, len })?;
        Ok(std::mem::replace(slot, value))
    }

    fn push(&self, value: Value) -> BridgeResult<()> {
        self.items.write().push(value);
        Ok(())
    }

    fn remove(&self, index: usize) -> BridgeResult<Value> {
        let mut items = self.items.write();
        if index >= items.len() {
            return Err(BridgeError::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        Ok(items.remove(index))
    }

    fn snapshot(&self) -> BridgeResult<Vec<Value>> {
        Ok(self.items.read().clone())
    }
}

/// Hash-backed [`SetLike`]
#[derive(Debug, Default)]
pub struct HashedSet {
    items: RwLock<FxHashSet<Value>>,
}

impl HashedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<Value> for HashedSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl SetLike for HashedSet {
    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn contains(&self, value: &Value) -> BridgeResult<bool> {
        Ok(self.items.read().contains(value))
    }

    fn insert(&self, value: Value) -> BridgeResult<bool> {
        Ok(self.items.write().insert(value))
    }

    fn remove(&self, value: &Value) -> BridgeResult<bool> {
        Ok(self.items.write().remove(value))
    }

    fn snapshot(&self) -> BridgeResult<Vec<Value>> {
        Ok(self.items.read().iter().cloned().collect())
    }
}

/// Hash-backed [`MapLike`]
#[derive(Debug, Default)]
pub struct HashedMap {
    entries: RwLock<FxHashMap<Value, Value>>,
}

impl HashedMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<(Value, Value)> for HashedMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl MapLike for HashedMap {
    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn get(&self, key: &Value) -> BridgeResult<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn insert(&self, key: Value, value: Value) -> BridgeResult<Option<Value>> {
        Ok(self.entries.write().insert(key, value))
    }

    fn remove(&self, key: &Value) -> BridgeResult<Option<Value>> {
        Ok(self.entries.write().remove(key))
    }

    fn entries(&self) -> BridgeResult<Vec<(Value, Value)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sequence_ops() {
        let seq = VecSequence::from_vec(vec![Value::Int(1), Value::Int(2)]);
        seq.push(Value::Int(3)).unwrap();
        assert_eq!(seq.len(), 3);

        let prev = seq.set(0, Value::Int(10)).unwrap();
        assert_eq!(prev, Value::Int(1));
        assert_eq!(seq.remove(1).unwrap(), Value::Int(2));
        assert_eq!(
            seq.snapshot().unwrap(),
            vec![Value::Int(10), Value::Int(3)]
        );
        assert!(seq.get(5).unwrap().is_none());
        assert!(seq.remove(5).is_err());
    }

    #[test]
    fn test_hashed_set_uniqueness() {
        let set = HashedSet::from_iter(vec![Value::str("a"), Value::str("a"), Value::str("b")]);
        assert_eq!(set.len(), 2);
        assert!(!set.insert(Value::str("b")).unwrap());
        assert!(set.remove(&Value::str("a")).unwrap());
        assert!(!set.contains(&Value::str("a")).unwrap());
    }

    #[test]
    fn test_hashed_map_ops() {
        let map = HashedMap::new();
        assert!(map.insert(Value::Int(1), Value::str("one")).unwrap().is_none());
        assert_eq!(
            map.insert(Value::Int(1), Value::str("uno")).unwrap(),
            Some(Value::str("one"))
        );
        assert_eq!(map.get(&Value::Int(1)).unwrap(), Some(Value::str("uno")));
        assert_eq!(map.len(), 1);
        assert!(map.remove(&Value::Int(2)).unwrap().is_none());
    }
}

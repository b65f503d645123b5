//! Association-list map.

use crate::iter::{Cursor, Sequenceable};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One `{key, value}` record of a serialized map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<K, V> {
    /// Entry key.
    pub key: K,
    /// Entry value.
    pub value: V,
}

/// An insertion-ordered map backed by parallel key and value sequences.
///
/// Lookups are linear scans. Keys only need `PartialEq`, which lets
/// entity references and floating point values act as keys.
///
/// Invariant: `keys.len() == vals.len() == len()` and keys are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map<K, V> {
    keys: Vec<K>,
    vals: Vec<V>,
}

impl<K, V> Map<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.vals.clear();
    }

    /// Returns the entry stored at `index`.
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<(&K, &V)> {
        Some((self.keys.get(index)?, self.vals.get(index)?))
    }

    /// Iterates over borrowed entries in order.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys.iter().zip(self.vals.iter())
    }
}

impl<K: PartialEq, V> Map<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Returns the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|i| &self.vals[i])
    }

    /// Associates `value` with `key`, returning the previous value.
    ///
    /// A new key is appended at the end; an existing key keeps its position.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.vals[i], value)),
            None => {
                self.keys.push(key);
                self.vals.push(value);
                None
            }
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.position(key)?;
        self.keys.remove(index);
        Some(self.vals.remove(index))
    }

    /// Builds a map from records.
    ///
    /// Returns `None` when duplicate keys collapsed so that the map ends up
    /// smaller than the record count.
    pub fn from_records<I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = Record<K, V>>,
    {
        let mut map = Self::new();
        let mut count = 0usize;
        for record in records {
            map.set(record.key, record.value);
            count += 1;
        }
        (map.len() == count).then_some(map)
    }

    /// Overwrites the map slot by slot with `entries`, keeping the map value
    /// itself.
    ///
    /// The backing sequences are truncated or grown to `entries.len()` first.
    /// Keys that turn out to be duplicates collapse onto their first
    /// position with the last value winning. Returns the number of collapsed
    /// entries.
    pub fn reconcile(&mut self, entries: Vec<(K, V)>) -> usize {
        let incoming = entries.len();
        self.keys.truncate(incoming);
        self.vals.truncate(incoming);

        for (i, (key, value)) in entries.into_iter().enumerate() {
            if i < self.keys.len() {
                self.keys[i] = key;
                self.vals[i] = value;
            } else {
                self.keys.push(key);
                self.vals.push(value);
            }
        }

        let mut i = 0;
        while i < self.keys.len() {
            let earlier = self.keys[..i].iter().position(|k| *k == self.keys[i]);
            match earlier {
                Some(first) => {
                    self.keys.remove(i);
                    let value = self.vals.remove(i);
                    self.vals[first] = value;
                }
                None => i += 1,
            }
        }

        incoming - self.keys.len()
    }
}

impl<K: DeserializeOwned + PartialEq, V: DeserializeOwned> Map<K, V> {
    /// Builds a map from the `[{key, value}, ...]` JSON shape.
    ///
    /// Returns `None` if the input is not an array, a record lacks `key` or
    /// `value`, a key or value does not deserialize, or duplicate keys
    /// collapsed.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let items = json.as_array()?;
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let object = item.as_object()?;
            let key = serde_json::from_value(object.get("key")?.clone()).ok()?;
            let value = serde_json::from_value(object.get("value")?.clone()).ok()?;
            records.push(Record { key, value });
        }
        Self::from_records(records)
    }
}

impl<K: Clone, V: Clone> Map<K, V> {
    /// Returns the entries as ordered records.
    #[must_use]
    pub fn to_records(&self) -> Vec<Record<K, V>> {
        self.entries()
            .map(|(k, v)| Record {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }

    /// Returns a fresh cursor over the keys.
    #[must_use]
    pub fn keys(&self) -> Cursor<K> {
        Cursor::new(self.keys.clone())
    }

    /// Returns a fresh cursor over the values.
    #[must_use]
    pub fn values(&self) -> Cursor<V> {
        Cursor::new(self.vals.clone())
    }
}

impl<K, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

impl<K: Clone + PartialEq, V: Clone> Sequenceable for Map<K, V> {
    type Key = K;
    type Item = V;

    fn items(&self) -> Cursor<(K, V)> {
        Cursor::new(
            self.entries()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn put(&mut self, key: K, item: V) {
        self.set(key, item);
    }
}

impl<K: Serialize, V: Serialize> Serialize for Map<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct RecordRef<'a, K, V> {
            key: &'a K,
            value: &'a V,
        }

        serializer.collect_seq(
            self.entries()
                .map(|(key, value)| RecordRef { key, value }),
        )
    }
}

impl<'de, K, V> Deserialize<'de> for Map<K, V>
where
    K: Deserialize<'de> + PartialEq,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Record<K, V>>::deserialize(deserializer)?;
        let count = records.len();
        Self::from_records(records).ok_or_else(|| {
            D::Error::custom(format!("duplicate keys in {count} map records"))
        })
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for Map<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (key, value)) in self.entries().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn set_get_remove() {
        let mut map = Map::new();
        assert_eq!(map.set("a", 1), None);
        assert_eq!(map.set("b", 2), None);
        assert_eq!(map.set("a", 3), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"a"), Some(&3));
        assert_eq!(map.remove(&"a"), Some(3));
        assert_eq!(map.remove(&"a"), None);
        assert_eq!(map.len(), 1);
        assert!(map.has(&"b"));
    }

    #[test]
    fn existing_key_keeps_position() {
        let mut map = Map::new();
        map.set(1, "x");
        map.set(2, "y");
        map.set(1, "z");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(map.values().collect::<Vec<_>>(), vec!["z", "y"]);
    }

    #[test]
    fn json_records() {
        let mut map = Map::new();
        map.set("k1".to_string(), 1);
        map.set("k2".to_string(), 2);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            json!([{"key": "k1", "value": 1}, {"key": "k2", "value": 2}])
        );
        assert_eq!(map.to_string(), "[k1: 1, k2: 2]");
    }

    #[test]
    fn from_json_rejects_incomplete_records() {
        let ok: Option<Map<String, i64>> =
            Map::from_json(&json!([{"key": "a", "value": 1}]));
        assert_eq!(ok.unwrap().get(&"a".to_string()), Some(&1));

        let missing_value: Option<Map<String, i64>> =
            Map::from_json(&json!([{"key": "a", "value": 1}, {"key": "b"}]));
        assert!(missing_value.is_none());

        let missing_key: Option<Map<String, i64>> = Map::from_json(&json!([{"value": 1}]));
        assert!(missing_key.is_none());

        let not_array: Option<Map<String, i64>> = Map::from_json(&json!({"key": "a"}));
        assert!(not_array.is_none());
    }

    #[test]
    fn from_json_rejects_duplicates() {
        let dup: Option<Map<String, i64>> = Map::from_json(&json!([
            {"key": "a", "value": 1},
            {"key": "a", "value": 2}
        ]));
        assert!(dup.is_none());

        let err = serde_json::from_value::<Map<String, i64>>(json!([
            {"key": "a", "value": 1},
            {"key": "a", "value": 2}
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn null_is_a_valid_key() {
        let map: Map<Option<String>, i64> =
            Map::from_json(&json!([{"key": null, "value": 5}])).unwrap();
        assert_eq!(map.get(&None), Some(&5));
    }

    #[test]
    fn reconcile_shrinks_and_grows() {
        let mut map: Map<&str, i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.reconcile(vec![("x", 9)]), 0);
        assert_eq!(map.to_records(), vec![Record { key: "x", value: 9 }]);

        assert_eq!(map.reconcile(vec![("x", 1), ("y", 2), ("z", 3)]), 0);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&"z"), Some(&3));
    }

    #[test]
    fn reconcile_collapses_duplicates() {
        let mut map: Map<&str, i32> = Map::new();
        let collapsed = map.reconcile(vec![("a", 1), ("b", 2), ("a", 3)]);
        assert_eq!(collapsed, 1);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"a"), Some(&3));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn filter_and_map_use_set() {
        let map: Map<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let big = map.filter(|v, _| *v > 1);
        assert_eq!(big.len(), 1);
        assert_eq!(big.get(&"b"), Some(&2));

        assert_eq!(map.find(|_, k| *k == "b"), Some(2));
        assert_eq!(map.find(|v, _| *v > 5), None);

        let tenfold = map.map(|v, _| v * 10);
        assert_eq!(tenfold.get(&"a"), Some(&10));
        assert_eq!(tenfold.get(&"b"), Some(&20));
    }

    proptest! {
        #[test]
        fn record_round_trip(entries in prop::collection::vec((0u16..64, any::<i32>()), 0..32)) {
            let map: Map<u16, i32> = entries.into_iter().collect();
            let rebuilt = Map::from_records(map.to_records()).unwrap();
            prop_assert_eq!(&rebuilt, &map);

            let json = serde_json::to_value(&map).unwrap();
            let parsed: Map<u16, i32> = Map::from_json(&json).unwrap();
            prop_assert_eq!(parsed, map);
        }

        #[test]
        fn size_matches_iteration(ops in prop::collection::vec((any::<bool>(), 0u8..10, any::<u8>()), 0..64)) {
            let mut map = Map::new();
            for (insert, key, value) in ops {
                if insert {
                    map.set(key, value);
                } else {
                    map.remove(&key);
                }
            }
            prop_assert_eq!(map.len(), map.items().count());
            prop_assert_eq!(map.keys().count(), map.values().count());
        }
    }
}

// Keyed collections: an ordered map internally, a JSON array on the wire.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// An entry that is identified by a key inside its collection (disk device, interface name, GPU index).
pub trait Keyed {
    type Key: Hash + Eq + Clone;

    fn key(&self) -> Self::Key;
}

/// Insertion-ordered collection with at most one entry per key.
///
/// Lookups are O(1); iteration and serialization follow first-insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedList<T: Keyed> {
    entries: IndexMap<T::Key, T>,
}

impl<T: Keyed> Default for KeyedList<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T: Keyed> KeyedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces the entry under its key. A replaced entry keeps its position.
    pub fn insert(&mut self, item: T) {
        self.entries.insert(item.key(), item);
    }

    /// Applies `update` to the entry under `key`, or appends `create()` when absent.
    pub fn upsert_with<C, U>(&mut self, key: T::Key, create: C, update: U)
    where
        C: FnOnce() -> T,
        U: FnOnce(&mut T),
    {
        match self.entries.get_mut(&key) {
            Some(existing) => update(existing),
            None => {
                let item = create();
                self.entries.insert(key, item);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries.values().cloned().collect()
    }
}

impl<T: Keyed> FromIterator<T> for KeyedList<T> {
    /// Later items with a duplicate key replace earlier ones.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        for item in iter {
            list.insert(item);
        }
        list
    }
}

impl<T: Keyed> From<Vec<T>> for KeyedList<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Keyed + Serialize> Serialize for KeyedList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for KeyedList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeqVisitor<T>(PhantomData<T>);

        impl<'de, T: Keyed + Deserialize<'de>> Visitor<'de> for SeqVisitor<T> {
            type Value = KeyedList<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of keyed entries")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut list = KeyedList::new();
                while let Some(item) = seq.next_element::<T>()? {
                    list.insert(item);
                }
                Ok(list)
            }
        }

        deserializer.deserialize_seq(SeqVisitor(PhantomData))
    }
}

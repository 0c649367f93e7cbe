//! Multi-value LRU map
//!
//! Groups interchangeable values under one key and orders the groups by
//! recency. Within a group values form a stack, so the most recently added
//! value of a given shape is handed out first; across groups the least
//! recently used group is drained first.
//!
//! Groups live in an arena and form a circular doubly linked list through
//! indices, with slot 0 acting as the sentinel head. `head.next` is the most
//! recently used group and `head.prev` the tail scanned by
//! [`remove_last`](GroupedLinkedMap::remove_last).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::key_pool::{KeyPool, Poolable};

/// Arena slot of the sentinel head
const HEAD: usize = 0;

/// One group of values sharing a key
#[derive(Debug)]
struct LinkedEntry<K, V> {
    /// `None` for the sentinel and for vacant slots
    key: Option<K>,
    values: Vec<V>,
    prev: usize,
    next: usize,
}

impl<K, V> LinkedEntry<K, V> {
    fn new(key: Option<K>, index: usize) -> Self {
        Self {
            key,
            values: Vec::new(),
            prev: index,
            next: index,
        }
    }
}

/// LRU registry holding a stack of values per key
#[derive(Debug)]
pub struct GroupedLinkedMap<K, V> {
    entries: Vec<LinkedEntry<K, V>>,
    /// Arena slots free for reuse
    vacant: Vec<usize>,
    key_to_entry: HashMap<K, usize>,
    key_pool: KeyPool<K>,
    value_count: usize,
}

impl<K, V> GroupedLinkedMap<K, V>
where
    K: Poolable + Clone + Eq + Hash,
{
    /// Create an empty map whose key pool keeps the default number of idle keys
    pub fn new() -> Self {
        Self::with_key_pool(KeyPool::new())
    }

    /// Create an empty map recycling keys through `key_pool`
    pub fn with_key_pool(key_pool: KeyPool<K>) -> Self {
        Self {
            entries: vec![LinkedEntry::new(None, HEAD)],
            vacant: Vec::new(),
            key_to_entry: HashMap::new(),
            key_pool,
            value_count: 0,
        }
    }

    /// Key pool lookups should build their keys from
    pub fn key_pool(&self) -> &KeyPool<K> {
        &self.key_pool
    }

    /// Mutable access to the key pool
    pub fn key_pool_mut(&mut self) -> &mut KeyPool<K> {
        &mut self.key_pool
    }

    /// Add `value` to the group for `key`
    ///
    /// A new group is linked at the tail. When a group already exists the
    /// passed key is redundant and goes back to the key pool.
    pub fn put(&mut self, key: K, value: V) {
        let index = match self.key_to_entry.get(&key).copied() {
            Some(index) => {
                self.key_pool.offer(key);
                index
            }
            None => {
                let index = self.insert_entry(key);
                self.make_tail(index);
                index
            }
        };

        self.entries[index].values.push(value);
        self.value_count += 1;
    }

    /// Take the most recently added value for `key`
    ///
    /// The group is promoted to most recently used even when it is empty. A
    /// miss still creates an empty group so a later
    /// [`remove_last`](Self::remove_last) scan can clean it up.
    pub fn get(&mut self, key: K) -> Option<V> {
        let index = match self.key_to_entry.get(&key).copied() {
            Some(index) => {
                self.key_pool.offer(key);
                index
            }
            None => self.insert_entry(key),
        };

        self.make_head(index);
        let value = self.entries[index].values.pop();
        if value.is_some() {
            self.value_count -= 1;
        }
        value
    }

    /// Take a value from the least recently used group
    ///
    /// Empty groups met during the scan are unlinked, dropped from the index
    /// and their keys recycled.
    pub fn remove_last(&mut self) -> Option<V> {
        let mut tail = self.entries[HEAD].prev;
        while tail != HEAD {
            if let Some(value) = self.entries[tail].values.pop() {
                self.value_count -= 1;
                return Some(value);
            }

            let prev = self.entries[tail].prev;
            self.unlink(tail);
            self.release_entry(tail);
            tail = prev;
        }

        None
    }

    /// Number of groups currently indexed, including empty ones not yet cleaned up
    pub fn group_count(&self) -> usize {
        self.key_to_entry.len()
    }

    /// Number of values across all groups
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Whether the map holds no values
    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    /// Iterate groups from most to least recently used as `(key, value count)`
    pub fn groups(&self) -> Groups<'_, K, V> {
        Groups {
            entries: &self.entries,
            cursor: self.entries[HEAD].next,
        }
    }

    fn insert_entry(&mut self, key: K) -> usize {
        let index = match self.vacant.pop() {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.key = Some(key.clone());
                entry.prev = index;
                entry.next = index;
                index
            }
            None => {
                let index = self.entries.len();
                self.entries.push(LinkedEntry::new(Some(key.clone()), index));
                index
            }
        };
        self.key_to_entry.insert(key, index);
        index
    }

    fn release_entry(&mut self, index: usize) {
        let entry = &mut self.entries[index];
        entry.prev = index;
        entry.next = index;
        if let Some(key) = entry.key.take() {
            self.key_to_entry.remove(&key);
            self.key_pool.offer(key);
        }
        self.vacant.push(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.entries[index].prev, self.entries[index].next);
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    fn make_tail(&mut self, index: usize) {
        self.unlink(index);
        let prev = self.entries[HEAD].prev;
        self.entries[index].prev = prev;
        self.entries[index].next = HEAD;
        self.entries[prev].next = index;
        self.entries[HEAD].prev = index;
    }

    fn make_head(&mut self, index: usize) {
        self.unlink(index);
        let next = self.entries[HEAD].next;
        self.entries[index].prev = HEAD;
        self.entries[index].next = next;
        self.entries[next].prev = index;
        self.entries[HEAD].next = index;
    }
}

impl<K, V> Default for GroupedLinkedMap<K, V>
where
    K: Poolable + Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Display for GroupedLinkedMap<K, V>
where
    K: Poolable + Clone + Eq + Hash + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupedLinkedMap( ")?;
        for (i, (key, count)) in self.groups().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{{}:{}}}", key, count)?;
        }
        write!(f, " )")
    }
}

/// Iterator over groups in recency order, see [`GroupedLinkedMap::groups`]
pub struct Groups<'a, K, V> {
    entries: &'a [LinkedEntry<K, V>],
    cursor: usize,
}

impl<'a, K, V> Iterator for Groups<'a, K, V> {
    type Item = (&'a K, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != HEAD {
            let entry = &self.entries[self.cursor];
            self.cursor = entry.next;
            if let Some(key) = entry.key.as_ref() {
                return Some((key, entry.values.len()));
            }
        }
        None
    }
}

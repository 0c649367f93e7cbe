//! Recycling of lookup keys
//!
//! Every `get` and `put` builds a key describing the bitmap it is looking
//! for. Most of those keys are redundant as soon as the lookup finds an
//! existing group, so they are parked here and handed out again instead of
//! being rebuilt. Recycling is invisible to correctness; a pool with capacity
//! zero behaves identically, only with more construction traffic.

use std::collections::VecDeque;

/// Default number of idle keys retained
pub const DEFAULT_KEY_POOL_SIZE: usize = 20;

/// A key type that can be recycled through a [`KeyPool`]
pub trait Poolable {
    /// Construct a blank key to be initialized by its strategy
    fn create() -> Self;
}

/// Bounded free list of idle keys
#[derive(Debug)]
pub struct KeyPool<K> {
    idle: VecDeque<K>,
    capacity: usize,
    /// Keys constructed because the free list was empty
    created: u64,
}

impl<K: Poolable> KeyPool<K> {
    /// Create a key pool holding at most [`DEFAULT_KEY_POOL_SIZE`] idle keys
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KEY_POOL_SIZE)
    }

    /// Create a key pool holding at most `capacity` idle keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(capacity),
            capacity,
            created: 0,
        }
    }

    /// Take an idle key, constructing one when none is available
    ///
    /// The returned key holds whatever fields it had when it was offered;
    /// callers reinitialize it before use.
    pub fn get(&mut self) -> K {
        match self.idle.pop_front() {
            Some(key) => key,
            None => {
                self.created += 1;
                K::create()
            }
        }
    }

    /// Return a key for later reuse; dropped once the pool is full
    pub fn offer(&mut self, key: K) {
        if self.idle.len() < self.capacity {
            self.idle.push_back(key);
        }
    }

    /// Number of idle keys currently held
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// Whether no idle keys are held
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    /// Maximum number of idle keys retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of keys this pool had to construct
    pub fn created(&self) -> u64 {
        self.created
    }
}

impl<K: Poolable> Default for KeyPool<K> {
    fn default() -> Self {
        Self::new()
    }
}

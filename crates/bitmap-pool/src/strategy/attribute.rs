//! Exact-match pooling keyed on width, height and format

use std::fmt;

use crate::bitmap::{Bitmap, PixelFormat, Shape};
use crate::grouped_map::GroupedLinkedMap;
use crate::key_pool::{KeyPool, Poolable};

/// Lookup key for [`AttributeStrategy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl AttributeKey {
    fn init(&mut self, shape: Shape) {
        self.width = shape.width;
        self.height = shape.height;
        self.format = shape.format;
    }
}

impl Poolable for AttributeKey {
    fn create() -> Self {
        Self::default()
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Shape::new(self.width, self.height, self.format), f)
    }
}

/// Reuses a bitmap only for a request of identical dimensions and format
///
/// Used where bitmaps cannot be reconfigured in place, so no cross-size
/// substitution is possible.
#[derive(Debug)]
pub struct AttributeStrategy<B> {
    grouped_map: GroupedLinkedMap<AttributeKey, B>,
}

impl<B: Bitmap> AttributeStrategy<B> {
    /// Create a strategy whose key pool keeps at most `key_pool_size` idle keys
    pub fn new(key_pool_size: usize) -> Self {
        Self {
            grouped_map: GroupedLinkedMap::with_key_pool(KeyPool::with_capacity(key_pool_size)),
        }
    }

    fn key(&mut self, shape: Shape) -> AttributeKey {
        let mut key = self.grouped_map.key_pool_mut().get();
        key.init(shape);
        key
    }

    /// Add a bitmap under its own shape
    pub fn put(&mut self, bitmap: B) {
        let key = self.key(bitmap.shape());
        self.grouped_map.put(key, bitmap);
    }

    /// Take a bitmap with exactly the requested shape
    pub fn get(&mut self, shape: Shape) -> Option<B> {
        let key = self.key(shape);
        self.grouped_map.get(key)
    }

    /// Take a bitmap from the least recently used shape
    pub fn remove_last(&mut self) -> Option<B> {
        self.grouped_map.remove_last()
    }

    /// Human readable description of a pooled bitmap
    pub fn describe_bitmap(&self, bitmap: &B) -> String {
        bitmap.shape().to_string()
    }

    /// Human readable description of a request
    pub fn describe_shape(&self, shape: Shape) -> String {
        shape.to_string()
    }

    /// The grouped map backing this strategy
    pub fn grouped_map(&self) -> &GroupedLinkedMap<AttributeKey, B> {
        &self.grouped_map
    }
}

impl<B: Bitmap> fmt::Display for AttributeStrategy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeStrategy{{groupedMap={}}}", self.grouped_map)
    }
}

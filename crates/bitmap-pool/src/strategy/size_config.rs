//! Best-fit pooling keyed on allocation size and format
//!
//! Bitmaps are grouped by `(byte size, format)`. For each format a sorted
//! index counts how many pooled bitmaps occupy each size, so a request can
//! be served by the smallest pooled bitmap at least as large as needed and
//! then reconfigured in place to the requested shape.
//!
//! The index must mirror the grouped map exactly: a size is present under a
//! format if and only if at least one bitmap of that size and format is
//! pooled.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::error;

use crate::bitmap::{Bitmap, PixelFormat, Shape};
use crate::error::{PoolError, Result};
use crate::grouped_map::GroupedLinkedMap;
use crate::key_pool::{KeyPool, Poolable};

/// Default bound on how much larger than requested a reused bitmap may be
pub const DEFAULT_MAX_SIZE_MULTIPLE: usize = 80;

/// Lookup key for [`SizeConfigStrategy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SizeConfigKey {
    size: usize,
    format: PixelFormat,
}

impl SizeConfigKey {
    fn init(&mut self, size: usize, format: PixelFormat) {
        self.size = size;
        self.format = format;
    }
}

impl Poolable for SizeConfigKey {
    fn create() -> Self {
        Self::default()
    }
}

impl fmt::Display for SizeConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]({:?})", self.size, self.format)
    }
}

/// Reuses the smallest sufficiently large bitmap in a compatible format
#[derive(Debug)]
pub struct SizeConfigStrategy<B> {
    grouped_map: GroupedLinkedMap<SizeConfigKey, B>,
    /// Per format: occupied byte size -> number of pooled bitmaps
    sorted_sizes: HashMap<PixelFormat, BTreeMap<usize, usize>>,
    max_size_multiple: usize,
}

impl<B: Bitmap> SizeConfigStrategy<B> {
    /// Create a strategy accepting bitmaps up to `max_size_multiple` times
    /// the requested size
    pub fn new(key_pool_size: usize, max_size_multiple: usize) -> Self {
        Self {
            grouped_map: GroupedLinkedMap::with_key_pool(KeyPool::with_capacity(key_pool_size)),
            sorted_sizes: HashMap::new(),
            max_size_multiple,
        }
    }

    fn key(&mut self, size: usize, format: PixelFormat) -> SizeConfigKey {
        let mut key = self.grouped_map.key_pool_mut().get();
        key.init(size, format);
        key
    }

    /// Add a bitmap under its own allocation size and format
    pub fn put(&mut self, bitmap: B) {
        let size = bitmap.byte_size();
        let format = bitmap.format();
        let key = self.key(size, format);
        self.grouped_map.put(key, bitmap);

        *self
            .sorted_sizes
            .entry(format)
            .or_default()
            .entry(size)
            .or_insert(0) += 1;
    }

    /// Take the best pooled bitmap for `shape` and reconfigure it to `shape`
    pub fn get(&mut self, shape: Shape) -> Result<Option<B>> {
        let size = shape.byte_size();
        let best_key = self.find_best_key(size, shape.format);
        let best_size = best_key.size;

        let Some(mut bitmap) = self.grouped_map.get(best_key) else {
            return Ok(None);
        };

        // Decrement must be called before reconfigure
        if let Err(err) = self.decrement_bitmap_of_size(best_size, bitmap.format()) {
            bitmap.recycle();
            return Err(err);
        }
        bitmap.reconfigure(shape);
        Ok(Some(bitmap))
    }

    fn find_best_key(&mut self, size: usize, format: PixelFormat) -> SizeConfigKey {
        let mut result = self.key(size, format);
        let limit = size.saturating_mul(self.max_size_multiple);

        for &candidate in format.compatible_formats() {
            let possible = self
                .sorted_sizes
                .get(&candidate)
                .and_then(|sizes| sizes.range(size..).next())
                .map(|(&possible, _)| possible);

            if let Some(possible) = possible.filter(|&possible| possible <= limit) {
                if possible != size || candidate != format {
                    self.grouped_map.key_pool_mut().offer(result);
                    result = self.key(possible, candidate);
                }
                break;
            }
        }

        result
    }

    /// Take a bitmap from the least recently used group
    pub fn remove_last(&mut self) -> Result<Option<B>> {
        let Some(mut removed) = self.grouped_map.remove_last() else {
            return Ok(None);
        };

        if let Err(err) = self.decrement_bitmap_of_size(removed.byte_size(), removed.format()) {
            removed.recycle();
            return Err(err);
        }
        Ok(Some(removed))
    }

    fn decrement_bitmap_of_size(&mut self, size: usize, format: PixelFormat) -> Result<()> {
        let Some(sizes) = self.sorted_sizes.get_mut(&format) else {
            return Err(self.size_mismatch(size, format));
        };

        match sizes.get(&size).copied() {
            None => return Err(self.size_mismatch(size, format)),
            Some(1) => {
                sizes.remove(&size);
            }
            Some(current) => {
                sizes.insert(size, current - 1);
            }
        }

        if sizes.is_empty() {
            self.sorted_sizes.remove(&format);
        }
        Ok(())
    }

    fn size_mismatch(&self, size: usize, format: PixelFormat) -> PoolError {
        error!(size, ?format, strategy = %self, "Tried to decrement empty size");
        PoolError::SizeIndexMismatch { size, format }
    }

    /// Number of pooled bitmaps recorded at `size` for `format`
    pub fn count_of_size(&self, size: usize, format: PixelFormat) -> usize {
        self.sorted_sizes
            .get(&format)
            .and_then(|sizes| sizes.get(&size))
            .copied()
            .unwrap_or(0)
    }

    /// Occupied sizes for `format` in ascending order
    pub fn sizes_for_format(&self, format: PixelFormat) -> Vec<usize> {
        self.sorted_sizes
            .get(&format)
            .map(|sizes| sizes.keys().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn forget_size_index(&mut self) {
        self.sorted_sizes.clear();
    }

    /// Bound on how much larger than requested a reused bitmap may be
    pub fn max_size_multiple(&self) -> usize {
        self.max_size_multiple
    }

    /// Human readable description of a pooled bitmap
    pub fn describe_bitmap(&self, bitmap: &B) -> String {
        format!("[{}]({:?})", bitmap.byte_size(), bitmap.format())
    }

    /// Human readable description of a request
    pub fn describe_shape(&self, shape: Shape) -> String {
        format!("[{}]({:?})", shape.byte_size(), shape.format)
    }

    /// The grouped map backing this strategy
    pub fn grouped_map(&self) -> &GroupedLinkedMap<SizeConfigKey, B> {
        &self.grouped_map
    }
}

impl<B: Bitmap> fmt::Display for SizeConfigStrategy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SizeConfigStrategy{{groupedMap={}, sortedSizes=(",
            self.grouped_map
        )?;

        let mut formats: Vec<_> = self.sorted_sizes.iter().collect();
        formats.sort_by_key(|(format, _)| **format);
        for (i, (format, sizes)) in formats.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}[( ", format)?;
            for (j, (size, count)) in sizes.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{{{}:{}}}", size, count)?;
            }
            write!(f, " )]")?;
        }

        write!(f, ")}}")
    }
}

//! Bounded bitmap pool with LRU eviction
//!
//! Bitmaps handed back with [`LruBitmapPool::put`] are kept for reuse until
//! the bytes they hold exceed the pool's maximum size, at which point the
//! least recently used ones are recycled. Requests that the pool cannot
//! serve fall back to a fresh allocation.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn, Level};

use crate::bitmap::{Bitmap, PixelFormat, Shape};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::key_pool::DEFAULT_KEY_POOL_SIZE;
use crate::pressure::{MemoryPressure, TrimPolicy};
use crate::strategy::{Strategy, StrategyKind, DEFAULT_MAX_SIZE_MULTIPLE};

/// Statistics about pool usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    /// Number of bitmaps currently pooled
    pub bitmap_count: usize,

    /// Total bytes held by pooled bitmaps
    pub current_size: usize,

    /// Maximum bytes the pool may hold
    pub max_size: usize,

    /// Requests served from the pool
    pub hits: u64,

    /// Requests that needed a fresh allocation
    pub misses: u64,

    /// Bitmaps accepted into the pool
    pub puts: u64,

    /// Bitmaps recycled to stay within the maximum size
    pub evictions: u64,
}

impl PoolStats {
    /// Calculate the pool hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.current_size as f64 / self.max_size as f64
        }
    }

    /// Pressure level implied by the current utilization
    pub fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_utilization(self.utilization())
    }
}

/// Internal pool state, guarded as one unit
#[derive(Debug)]
struct PoolState<B> {
    strategy: Strategy<B>,

    /// Bytes held by pooled bitmaps
    current_size: usize,

    /// Current maximum in bytes
    max_size: usize,

    hits: u64,
    misses: u64,
    puts: u64,
    evictions: u64,
}

impl<B: Bitmap> PoolState<B> {
    fn new(strategy: Strategy<B>, max_size: usize) -> Self {
        Self {
            strategy,
            current_size: 0,
            max_size,
            hits: 0,
            misses: 0,
            puts: 0,
            evictions: 0,
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            bitmap_count: self.strategy.bitmap_count(),
            current_size: self.current_size,
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            puts: self.puts,
            evictions: self.evictions,
        }
    }

    /// Take a bitmap for `shape` out of the pool, normalized for reuse
    fn take(&mut self, shape: Shape) -> Result<Option<B>> {
        let result = match self.strategy.get(shape) {
            Ok(result) => result,
            Err(err) => return Err(self.forget_destroyed(err)),
        };

        match result {
            Some(mut bitmap) => {
                self.hits += 1;
                self.current_size = self
                    .current_size
                    .saturating_sub(self.strategy.size_of(&bitmap));
                bitmap.reset_reuse_flags();
                trace!(shape = %self.strategy.describe_shape(shape), "Get bitmap hit");
                self.dump();
                Ok(Some(bitmap))
            }
            None => {
                self.misses += 1;
                debug!(shape = %self.strategy.describe_shape(shape), "Missing bitmap");
                self.dump();
                Ok(None)
            }
        }
    }

    /// Recycle least recently used bitmaps until at most `size` bytes remain
    fn trim_to_size(&mut self, size: usize) -> Result<()> {
        while self.current_size > size {
            let removed = match self.strategy.remove_last() {
                Ok(removed) => removed,
                Err(err) => return Err(self.forget_destroyed(err)),
            };
            let Some(mut removed) = removed else {
                warn!(
                    current_size = self.current_size,
                    target = size,
                    "Size mismatch, resetting"
                );
                self.dump();
                self.current_size = 0;
                return Ok(());
            };

            self.current_size = self
                .current_size
                .saturating_sub(self.strategy.size_of(&removed));
            self.evictions += 1;
            debug!(
                bitmap = %self.strategy.describe_bitmap(&removed),
                current_size = self.current_size,
                "Evicting bitmap"
            );
            self.dump();
            removed.recycle();
        }
        Ok(())
    }

    /// Stop accounting for a bitmap the strategy recycled on an index mismatch
    fn forget_destroyed(&mut self, err: PoolError) -> PoolError {
        if let PoolError::SizeIndexMismatch { size, .. } = err {
            self.current_size = self.current_size.saturating_sub(size);
        }
        err
    }

    fn dump(&self) {
        if tracing::enabled!(Level::TRACE) {
            trace!(
                hits = self.hits,
                misses = self.misses,
                puts = self.puts,
                evictions = self.evictions,
                current_size = self.current_size,
                max_size = self.max_size,
                strategy = %self.strategy,
                "Pool state"
            );
        }
    }
}

/// Pool of reusable bitmaps bounded by total byte size
///
/// Thread-safe; every operation runs its bookkeeping under a single lock.
/// Cloning yields another handle to the same pool.
///
/// # Example
///
/// ```
/// use bitmap_pool::{Bitmap, HeapBitmap, LruBitmapPool, PixelFormat, Shape};
///
/// // 4MB pool
/// let pool: LruBitmapPool<HeapBitmap> = LruBitmapPool::new(4 * 1024 * 1024);
/// let shape = Shape::new(256, 256, PixelFormat::Argb8888);
///
/// // Nothing pooled yet, so this allocates
/// let bitmap = pool.get(shape).unwrap();
/// pool.put(bitmap).unwrap();
///
/// // Served from the pool this time
/// let reused = pool.get(shape).unwrap();
/// assert_eq!(reused.shape(), shape);
/// assert_eq!(pool.stats().hits, 1);
/// ```
pub struct LruBitmapPool<B> {
    state: Arc<Mutex<PoolState<B>>>,

    /// Maximum size before any multiplier was applied
    initial_max_size: usize,

    /// Formats accepted by `put`
    allowed_formats: Arc<HashSet<PixelFormat>>,

    trim_policy: TrimPolicy,
}

impl<B: Bitmap> LruBitmapPool<B> {
    /// Create a pool holding at most `max_size` bytes
    ///
    /// The strategy is picked from the capabilities of `B` and every format
    /// except [`PixelFormat::Hardware`] is accepted.
    pub fn new(max_size: usize) -> Self {
        Self::with_strategy(
            max_size,
            default_allowed_formats(),
            Strategy::new(
                StrategyKind::Auto,
                DEFAULT_KEY_POOL_SIZE,
                DEFAULT_MAX_SIZE_MULTIPLE,
            ),
        )
    }

    /// Create a pool from a [`PoolConfig`]
    pub fn with_config(config: &PoolConfig) -> Self {
        let strategy = Strategy::new(
            config.strategy,
            config.key_pool_size,
            config.max_size_multiple,
        );
        let mut pool = Self::with_strategy(
            config.max_size,
            config.allowed_formats.iter().copied(),
            strategy,
        );
        pool.trim_policy = config.trim_policy;
        pool
    }

    /// Create a pool with an explicit strategy and set of accepted formats
    pub fn with_strategy(
        max_size: usize,
        allowed_formats: impl IntoIterator<Item = PixelFormat>,
        strategy: Strategy<B>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState::new(strategy, max_size))),
            initial_max_size: max_size,
            allowed_formats: Arc::new(allowed_formats.into_iter().collect()),
            trim_policy: TrimPolicy::default(),
        }
    }

    /// Get a cleared bitmap of the requested shape
    ///
    /// A pooled bitmap is reused when possible; its pixels are erased before
    /// it is returned. Otherwise a new bitmap is allocated.
    pub fn get(&self, shape: Shape) -> Result<B> {
        match self.get_dirty_or_none(shape)? {
            Some(mut bitmap) => {
                bitmap.erase();
                Ok(bitmap)
            }
            None => Ok(B::allocate(shape)),
        }
    }

    /// Get a bitmap of the requested shape without erasing reused pixels
    ///
    /// For callers that overwrite every pixel anyway.
    pub fn get_dirty(&self, shape: Shape) -> Result<B> {
        match self.get_dirty_or_none(shape)? {
            Some(bitmap) => Ok(bitmap),
            None => Ok(B::allocate(shape)),
        }
    }

    fn get_dirty_or_none(&self, shape: Shape) -> Result<Option<B>> {
        if shape.format == PixelFormat::Hardware {
            return Err(PoolError::HardwareFormat(shape.format));
        }

        let mut state = self.state.lock();
        state.take(shape)
    }

    /// Offer a bitmap back to the pool
    ///
    /// Empty or immutable bitmaps, bitmaps larger than the maximum size and
    /// bitmaps in a format the pool does not accept are recycled immediately.
    /// Offering a bitmap that was already recycled is an error.
    pub fn put(&self, mut bitmap: B) -> Result<()> {
        if bitmap.is_recycled() {
            return Err(PoolError::Recycled);
        }

        let mut state = self.state.lock();
        let size = state.strategy.size_of(&bitmap);
        let format = bitmap.format();

        // Zero sized bitmaps could never be evicted by byte accounting
        if size == 0
            || !bitmap.is_mutable()
            || size > state.max_size
            || !self.allowed_formats.contains(&format)
        {
            trace!(
                bitmap = %state.strategy.describe_bitmap(&bitmap),
                mutable = bitmap.is_mutable(),
                allowed = self.allowed_formats.contains(&format),
                "Reject bitmap from pool"
            );
            drop(state);
            bitmap.recycle();
            return Ok(());
        }

        trace!(bitmap = %state.strategy.describe_bitmap(&bitmap), "Put bitmap in pool");
        state.strategy.put(bitmap);
        state.puts += 1;
        state.current_size += size;
        state.dump();

        let max_size = state.max_size;
        state.trim_to_size(max_size)
    }

    /// Scale the maximum size relative to the size the pool was created with
    ///
    /// Shrinking evicts immediately.
    pub fn set_size_multiplier(&self, multiplier: f32) -> Result<()> {
        let mut state = self.state.lock();
        state.max_size = (self.initial_max_size as f64 * f64::from(multiplier)).round() as usize;
        debug!(multiplier, max_size = state.max_size, "Set size multiplier");

        let max_size = state.max_size;
        state.trim_to_size(max_size)
    }

    /// Recycle every pooled bitmap
    pub fn clear_memory(&self) -> Result<()> {
        debug!("clear_memory");
        self.trim_to_size(0)
    }

    /// Recycle least recently used bitmaps until at most `size` bytes remain
    pub fn trim_to_size(&self, size: usize) -> Result<()> {
        self.state.lock().trim_to_size(size)
    }

    /// Apply the trim policy for a reported pressure level
    pub fn trim_memory(&self, level: MemoryPressure) -> Result<()> {
        let action = self.trim_policy.action_for(level);
        let mut state = self.state.lock();
        debug!(?level, ?action, "trim_memory");

        match action.target_size(state.max_size) {
            Some(target) => state.trim_to_size(target),
            None => Ok(()),
        }
    }

    /// Current maximum size in bytes
    pub fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    /// Bytes currently held by pooled bitmaps
    pub fn current_size(&self) -> usize {
        self.state.lock().current_size
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats()
    }

    /// Which strategy the pool matches bitmaps with
    pub fn strategy_kind(&self) -> StrategyKind {
        self.state.lock().strategy.kind()
    }

    /// Formats accepted by [`put`](Self::put)
    pub fn allowed_formats(&self) -> &HashSet<PixelFormat> {
        &self.allowed_formats
    }

    /// Policy applied by [`trim_memory`](Self::trim_memory)
    pub fn trim_policy(&self) -> TrimPolicy {
        self.trim_policy
    }
}

impl<B> Clone for LruBitmapPool<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            initial_max_size: self.initial_max_size,
            allowed_formats: Arc::clone(&self.allowed_formats),
            trim_policy: self.trim_policy,
        }
    }
}

impl<B: Bitmap> Default for LruBitmapPool<B> {
    /// Create a pool from [`PoolConfig::default`]
    fn default() -> Self {
        Self::with_config(&PoolConfig::default())
    }
}

/// Every format except [`PixelFormat::Hardware`]
pub fn default_allowed_formats() -> HashSet<PixelFormat> {
    PixelFormat::ALL
        .into_iter()
        .filter(|format| *format != PixelFormat::Hardware)
        .collect()
}

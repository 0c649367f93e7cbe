//! Bitmap Pool Library
//!
//! Reuse pool for large mutable pixel buffers. Bitmaps that would otherwise
//! be dropped are handed back to an [`LruBitmapPool`] and served again for
//! later requests of a compatible shape, bounded by a byte budget with LRU
//! eviction.

pub mod bitmap;
pub mod config;
pub mod error;
pub mod grouped_map;
pub mod key_pool;
pub mod pool;
pub mod pressure;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use bitmap::{Bitmap, HeapBitmap, PixelFormat, Shape};
pub use config::PoolConfig;
pub use error::{ConfigError, PoolError, Result};
pub use pool::{default_allowed_formats, LruBitmapPool, PoolStats};
pub use pressure::{MemoryPressure, TrimAction, TrimPolicy};
pub use strategy::{Strategy, StrategyKind};

//! Error types for the bitmap pool
//!
//! Ordinary cache misses are not errors; they fall back to a fresh
//! allocation. Errors here are caller misuse that must not be ignored, or
//! internal bookkeeping divergence.

use std::io;

use crate::bitmap::PixelFormat;

/// Errors surfaced by pool operations
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A bitmap that was already recycled was offered to the pool
    #[error("cannot pool recycled bitmap")]
    Recycled,

    /// A mutable bitmap was requested in a format that cannot be mutable
    #[error("cannot create a mutable bitmap with format {0:?}")]
    HardwareFormat(PixelFormat),

    /// The size index and the grouped map disagree about which buckets exist
    #[error("tried to decrement empty size {size} for format {format:?}")]
    SizeIndexMismatch { size: usize, format: PixelFormat },
}

/// Errors that can occur while loading or saving a [`PoolConfig`](crate::PoolConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// I/O error reading or writing the configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid TOML for this schema
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

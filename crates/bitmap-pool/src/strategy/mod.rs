//! Matching strategies
//!
//! A strategy decides which pooled bitmap, if any, can satisfy a request and
//! which bitmap to give up first when the pool has to shrink. Two are
//! provided:
//!
//! - [`AttributeStrategy`]: exact width, height and format match
//! - [`SizeConfigStrategy`]: smallest sufficiently large allocation in a
//!   compatible format, reconfigured in place

mod attribute;
mod size_config;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use attribute::{AttributeKey, AttributeStrategy};
pub use size_config::{SizeConfigKey, SizeConfigStrategy, DEFAULT_MAX_SIZE_MULTIPLE};

use crate::bitmap::{Bitmap, Shape};
use crate::error::{ConfigError, Result};

/// Which strategy a pool should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Size-class matching when the bitmap type can be reconfigured,
    /// exact matching otherwise
    #[default]
    Auto,
    /// Exact attribute matching
    Attribute,
    /// Size-class matching
    SizeConfig,
}

impl StrategyKind {
    /// Resolve `Auto` against the capabilities of a bitmap type
    pub fn resolve<B: Bitmap>(self) -> StrategyKind {
        match self {
            StrategyKind::Auto if B::SUPPORTS_RECONFIGURE => StrategyKind::SizeConfig,
            StrategyKind::Auto => StrategyKind::Attribute,
            other => other,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyKind::Auto),
            "attribute" => Ok(StrategyKind::Attribute),
            "size_config" | "size-config" => Ok(StrategyKind::SizeConfig),
            other => Err(ConfigError::InvalidValue(format!("strategy: {}", other))),
        }
    }
}

/// A resolved strategy instance
#[derive(Debug)]
pub enum Strategy<B> {
    Attribute(AttributeStrategy<B>),
    SizeConfig(SizeConfigStrategy<B>),
}

impl<B: Bitmap> Strategy<B> {
    /// Build the strategy selected by `kind` for bitmap type `B`
    pub fn new(kind: StrategyKind, key_pool_size: usize, max_size_multiple: usize) -> Self {
        match kind.resolve::<B>() {
            StrategyKind::Attribute => Strategy::Attribute(AttributeStrategy::new(key_pool_size)),
            _ => Strategy::SizeConfig(SizeConfigStrategy::new(key_pool_size, max_size_multiple)),
        }
    }

    /// Which strategy this is
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Attribute(_) => StrategyKind::Attribute,
            Strategy::SizeConfig(_) => StrategyKind::SizeConfig,
        }
    }

    pub fn put(&mut self, bitmap: B) {
        match self {
            Strategy::Attribute(s) => s.put(bitmap),
            Strategy::SizeConfig(s) => s.put(bitmap),
        }
    }

    /// Take a pooled bitmap able to serve `shape`
    ///
    /// A returned bitmap already has `shape` as its logical shape.
    pub fn get(&mut self, shape: Shape) -> Result<Option<B>> {
        match self {
            Strategy::Attribute(s) => Ok(s.get(shape)),
            Strategy::SizeConfig(s) => s.get(shape),
        }
    }

    /// Take the bitmap that should be evicted first
    pub fn remove_last(&mut self) -> Result<Option<B>> {
        match self {
            Strategy::Attribute(s) => Ok(s.remove_last()),
            Strategy::SizeConfig(s) => s.remove_last(),
        }
    }

    /// Number of bitmaps currently held
    pub fn bitmap_count(&self) -> usize {
        match self {
            Strategy::Attribute(s) => s.grouped_map().value_count(),
            Strategy::SizeConfig(s) => s.grouped_map().value_count(),
        }
    }

    /// Drop the size-class index so the next removal diverges from the map
    #[cfg(test)]
    pub(crate) fn forget_size_index(&mut self) {
        if let Strategy::SizeConfig(s) = self {
            s.forget_size_index();
        }
    }

    /// Bytes a bitmap counts for in the pool's accounting
    pub fn size_of(&self, bitmap: &B) -> usize {
        bitmap.byte_size()
    }

    pub fn describe_bitmap(&self, bitmap: &B) -> String {
        match self {
            Strategy::Attribute(s) => s.describe_bitmap(bitmap),
            Strategy::SizeConfig(s) => s.describe_bitmap(bitmap),
        }
    }

    pub fn describe_shape(&self, shape: Shape) -> String {
        match self {
            Strategy::Attribute(s) => s.describe_shape(shape),
            Strategy::SizeConfig(s) => s.describe_shape(shape),
        }
    }
}

impl<B: Bitmap> fmt::Display for Strategy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Attribute(s) => fmt::Display::fmt(s, f),
            Strategy::SizeConfig(s) => fmt::Display::fmt(s, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::PixelFormat;
    use crate::key_pool::DEFAULT_KEY_POOL_SIZE;
    use crate::testing::{FakeBitmap, FixedBitmap};

    #[test]
    fn test_auto_resolves_by_capability() {
        assert_eq!(
            StrategyKind::Auto.resolve::<FakeBitmap>(),
            StrategyKind::SizeConfig
        );
        assert_eq!(
            StrategyKind::Auto.resolve::<FixedBitmap>(),
            StrategyKind::Attribute
        );
        assert_eq!(
            StrategyKind::Attribute.resolve::<FakeBitmap>(),
            StrategyKind::Attribute
        );
    }

    #[test]
    fn test_new_builds_resolved_kind() {
        let strategy: Strategy<FixedBitmap> =
            Strategy::new(StrategyKind::Auto, DEFAULT_KEY_POOL_SIZE, DEFAULT_MAX_SIZE_MULTIPLE);
        assert_eq!(strategy.kind(), StrategyKind::Attribute);

        let strategy: Strategy<FakeBitmap> =
            Strategy::new(StrategyKind::Auto, DEFAULT_KEY_POOL_SIZE, DEFAULT_MAX_SIZE_MULTIPLE);
        assert_eq!(strategy.kind(), StrategyKind::SizeConfig);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("auto".parse::<StrategyKind>().unwrap(), StrategyKind::Auto);
        assert_eq!(
            " Size_Config ".parse::<StrategyKind>().unwrap(),
            StrategyKind::SizeConfig
        );
        assert_eq!(
            "attribute".parse::<StrategyKind>().unwrap(),
            StrategyKind::Attribute
        );
        assert!(matches!(
            "lru".parse::<StrategyKind>(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_delegates_to_inner_strategy() {
        let mut strategy: Strategy<FakeBitmap> = Strategy::new(
            StrategyKind::Attribute,
            DEFAULT_KEY_POOL_SIZE,
            DEFAULT_MAX_SIZE_MULTIPLE,
        );
        let bitmap = FakeBitmap::new(1, 10, 10, PixelFormat::Argb8888);
        assert_eq!(strategy.size_of(&bitmap), 400);
        assert_eq!(strategy.describe_bitmap(&bitmap), "[10 x 10], Argb8888");

        strategy.put(bitmap);
        let shape = Shape::new(10, 10, PixelFormat::Argb8888);
        assert_eq!(strategy.get(shape).unwrap().map(|b| b.id), Some(1));
        assert!(strategy.remove_last().unwrap().is_none());
    }

    #[test]
    fn test_describe_size_config() {
        let strategy: Strategy<FakeBitmap> = Strategy::new(
            StrategyKind::SizeConfig,
            DEFAULT_KEY_POOL_SIZE,
            DEFAULT_MAX_SIZE_MULTIPLE,
        );
        let shape = Shape::new(10, 10, PixelFormat::Argb8888);
        assert_eq!(strategy.describe_shape(shape), "[400](Argb8888)");
    }
}

//! Pool configuration
//!
//! Sizes, strategy selection, accepted formats and the trim policy can be
//! loaded from a TOML file, read from environment variables, or built
//! programmatically.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bitmap::PixelFormat;
use crate::error::ConfigError;
use crate::key_pool::DEFAULT_KEY_POOL_SIZE;
use crate::pool::default_allowed_formats;
use crate::pressure::TrimPolicy;
use crate::strategy::{StrategyKind, DEFAULT_MAX_SIZE_MULTIPLE};

/// Configuration for an [`LruBitmapPool`](crate::LruBitmapPool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum bytes held by pooled bitmaps
    pub max_size: usize,
    /// How many times larger than requested a reused bitmap may be
    pub max_size_multiple: usize,
    /// Idle lookup keys retained per strategy
    pub key_pool_size: usize,
    /// Matching strategy
    pub strategy: StrategyKind,
    /// Formats accepted back into the pool
    pub allowed_formats: BTreeSet<PixelFormat>,
    /// Response to memory pressure levels
    pub trim_policy: TrimPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 64 * 1024 * 1024, // 64 MB
            max_size_multiple: DEFAULT_MAX_SIZE_MULTIPLE,
            key_pool_size: DEFAULT_KEY_POOL_SIZE,
            strategy: StrategyKind::Auto,
            allowed_formats: default_allowed_formats().into_iter().collect(),
            trim_policy: TrimPolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Sets the maximum size in bytes.
    pub fn with_max_size(mut self, bytes: usize) -> Self {
        self.max_size = bytes;
        self
    }

    /// Sets the maximum size in megabytes.
    pub fn with_max_mb(mut self, mb: usize) -> Self {
        self.max_size = mb.saturating_mul(1024 * 1024);
        self
    }

    /// Sets the best-fit slack multiple.
    pub fn with_max_size_multiple(mut self, multiple: usize) -> Self {
        self.max_size_multiple = multiple;
        self
    }

    /// Sets how many idle lookup keys are retained.
    pub fn with_key_pool_size(mut self, size: usize) -> Self {
        self.key_pool_size = size;
        self
    }

    /// Sets the matching strategy.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the formats accepted back into the pool.
    pub fn with_allowed_formats(mut self, formats: impl IntoIterator<Item = PixelFormat>) -> Self {
        self.allowed_formats = formats.into_iter().collect();
        self
    }

    /// Sets the memory pressure trim policy.
    pub fn with_trim_policy(mut self, policy: TrimPolicy) -> Self {
        self.trim_policy = policy;
        self
    }

    /// Returns the maximum size in megabytes.
    pub fn max_mb(&self) -> usize {
        self.max_size / (1024 * 1024)
    }

    /// Returns the default configuration file location for the current platform.
    ///
    /// - macOS: ~/Library/Application Support/bitmap-pool/pool.toml
    /// - Linux: ~/.config/bitmap-pool/pool.toml
    /// - Windows: %APPDATA%\bitmap-pool\pool.toml
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("bitmap-pool").join("pool.toml")
        } else {
            // Fallback to current directory if config dir unavailable
            PathBuf::from("bitmap-pool.toml")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BITMAP_POOL_MAX_MB`: maximum pool size in MB (default: 64)
    /// - `BITMAP_POOL_MAX_SIZE_MULTIPLE`: best-fit slack multiple (default: 80)
    /// - `BITMAP_POOL_KEY_POOL_SIZE`: idle keys retained (default: 20)
    /// - `BITMAP_POOL_STRATEGY`: `auto`, `attribute` or `size_config`
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(mb) = env_usize("BITMAP_POOL_MAX_MB")? {
            config.max_size = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                ConfigError::InvalidValue("BITMAP_POOL_MAX_MB".to_string())
            })?;
        }

        if let Some(multiple) = env_usize("BITMAP_POOL_MAX_SIZE_MULTIPLE")? {
            config.max_size_multiple = multiple;
        }

        if let Some(size) = env_usize("BITMAP_POOL_KEY_POOL_SIZE")? {
            config.key_pool_size = size;
        }

        if let Ok(val) = std::env::var("BITMAP_POOL_STRATEGY") {
            config.strategy = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BITMAP_POOL_STRATEGY".to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (every key optional):
    /// ```toml
    /// max_size = 67108864
    /// max_size_multiple = 80
    /// key_pool_size = 20
    /// strategy = "size_config"
    /// allowed_formats = ["alpha8", "rgb565", "argb8888"]
    ///
    /// [trim_policy]
    /// moderate = "none"
    /// critical = "clear"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Converts configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Rejects values the pool cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size_multiple == 0 {
            return Err(ConfigError::InvalidValue("max_size_multiple".to_string()));
        }
        if self.allowed_formats.contains(&PixelFormat::Hardware) {
            return Err(ConfigError::InvalidValue("allowed_formats".to_string()));
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::{MemoryPressure, TrimAction};
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "BITMAP_POOL_MAX_MB",
        "BITMAP_POOL_MAX_SIZE_MULTIPLE",
        "BITMAP_POOL_KEY_POOL_SIZE",
        "BITMAP_POOL_STRATEGY",
    ];

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 64 * 1024 * 1024);
        assert_eq!(config.max_size_multiple, 80);
        assert_eq!(config.key_pool_size, 20);
        assert_eq!(config.strategy, StrategyKind::Auto);
        assert_eq!(config.allowed_formats.len(), PixelFormat::ALL.len() - 1);
        assert!(!config.allowed_formats.contains(&PixelFormat::Hardware));
    }

    #[test]
    fn test_builder_methods() {
        let config = PoolConfig::default()
            .with_max_mb(16)
            .with_max_size_multiple(4)
            .with_key_pool_size(0)
            .with_strategy(StrategyKind::Attribute)
            .with_allowed_formats([PixelFormat::Argb8888]);

        assert_eq!(config.max_size, 16 * 1024 * 1024);
        assert_eq!(config.max_mb(), 16);
        assert_eq!(config.max_size_multiple, 4);
        assert_eq!(config.key_pool_size, 0);
        assert_eq!(config.strategy, StrategyKind::Attribute);
        assert_eq!(
            config.allowed_formats.into_iter().collect::<Vec<_>>(),
            vec![PixelFormat::Argb8888]
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = PoolConfig::default_config_path();
        assert!(path.ends_with("pool.toml") || path.ends_with("bitmap-pool.toml"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // Save and restore env vars to avoid test pollution
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("BITMAP_POOL_MAX_MB", "32");
        env::set_var("BITMAP_POOL_MAX_SIZE_MULTIPLE", "8");
        env::set_var("BITMAP_POOL_KEY_POOL_SIZE", "5");
        env::set_var("BITMAP_POOL_STRATEGY", "attribute");

        let config = PoolConfig::from_env().unwrap();
        assert_eq!(config.max_size, 32 * 1024 * 1024);
        assert_eq!(config.max_size_multiple, 8);
        assert_eq!(config.key_pool_size, 5);
        assert_eq!(config.strategy, StrategyKind::Attribute);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("BITMAP_POOL_MAX_MB", "128");

        let config = PoolConfig::from_env().unwrap();
        assert_eq!(config.max_size, 128 * 1024 * 1024);
        assert_eq!(config.max_size_multiple, 80); // default
        assert_eq!(config.strategy, StrategyKind::Auto); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("BITMAP_POOL_MAX_MB", "not_a_number");
        assert!(matches!(
            PoolConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "BITMAP_POOL_MAX_MB"
        ));

        env::remove_var("BITMAP_POOL_MAX_MB");
        env::set_var("BITMAP_POOL_STRATEGY", "fifo");
        assert!(PoolConfig::from_env().is_err());

        env::remove_var("BITMAP_POOL_STRATEGY");
        env::set_var("BITMAP_POOL_MAX_SIZE_MULTIPLE", "0");
        assert!(PoolConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_max_mb_overflow() {
        let _guard = EnvGuard::new(ENV_VARS);

        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("BITMAP_POOL_MAX_MB", usize::MAX.to_string());
        assert!(matches!(
            PoolConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "BITMAP_POOL_MAX_MB"
        ));
    }

    #[test]
    fn test_with_max_mb_saturates() {
        let config = PoolConfig::default().with_max_mb(usize::MAX);
        assert_eq!(config.max_size, usize::MAX);
    }

    #[test]
    fn test_default_formats_match_pool_default() {
        let from_pool: BTreeSet<_> = default_allowed_formats().into_iter().collect();
        assert_eq!(PoolConfig::default().allowed_formats, from_pool);
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PoolConfig::default()
            .with_max_mb(8)
            .with_strategy(StrategyKind::SizeConfig)
            .with_trim_policy(
                TrimPolicy::default()
                    .with_action(MemoryPressure::Moderate, TrimAction::TrimToFraction(0.25)),
            );

        let toml = config.to_toml().unwrap();
        let parsed = PoolConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            # Test configuration
            max_size = 1048576
            max_size_multiple = 4
            strategy = "size_config"
            allowed_formats = ["argb8888", "rgba_f16"]

            [trim_policy]
            moderate = "none"
            critical = "clear"
        "#;

        let config = PoolConfig::from_toml(toml).unwrap();
        assert_eq!(config.max_size, 1024 * 1024);
        assert_eq!(config.max_size_multiple, 4);
        assert_eq!(config.key_pool_size, 20); // default
        assert_eq!(config.strategy, StrategyKind::SizeConfig);
        assert_eq!(config.allowed_formats.len(), 2);
        assert_eq!(
            config.trim_policy.action_for(MemoryPressure::Moderate),
            TrimAction::None
        );
        // Unlisted levels keep their defaults
        assert_eq!(
            config.trim_policy.action_for(MemoryPressure::High),
            TrimAction::TrimToFraction(0.5)
        );
    }

    #[test]
    fn test_from_toml_partial() {
        let config = PoolConfig::from_toml("max_size = 1024").unwrap();
        assert_eq!(config.max_size, 1024);
        assert_eq!(config.max_size_multiple, 80); // default
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            PoolConfig::from_toml("max_size = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PoolConfig::from_toml("allowed_formats = [\"hardware\"]"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("pool.toml");

        let config = PoolConfig::default().with_max_mb(12).with_key_pool_size(3);
        config.save_to_file(&config_path).unwrap();

        let loaded = PoolConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_from_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = PoolConfig::from_file(temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

//! Saver configuration
//!
//! [`SaverConfig`] names where records live in the backend, how long they
//! live, how long the per-scope timeline grows and which channels occupy fixed
//! write-ledger slots.
//!
//! Configuration can be built in code, loaded from environment variables, or
//! both:
//!
//! ```rust
//! use langgraph_checkpoint_kv::config::{SaverConfig, TtlConfig};
//!
//! let config = SaverConfig::default()
//!     .with_namespace("checkpoints")
//!     .with_timeline_max(100)
//!     .with_ttl(TtlConfig::new(60).with_refresh_on_read(true));
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Environment variables
//!
//! `from_env(prefix)` reads `{prefix}{NAME}` for each of:
//!
//! | Name | Field |
//! |------|-------|
//! | `NAMESPACE` | `namespace` |
//! | `SET_CHECKPOINTS` | `set_checkpoints` |
//! | `SET_WRITES` | `set_writes` |
//! | `SET_META` | `set_meta` |
//! | `TIMELINE_MAX` | `timeline_max` |
//! | `DEFAULT_TTL_MINUTES` | `ttl.default_ttl_minutes` |
//! | `REFRESH_ON_READ` | `ttl.refresh_on_read` (`true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`) |

use crate::error::{CheckpointError, Result};
use crate::keys::KeySpace;
use crate::writes::SpecialChannels;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default backend namespace
pub const DEFAULT_NAMESPACE: &str = "test";
/// Default set holding checkpoint records
pub const DEFAULT_SET_CHECKPOINTS: &str = "lg_cp";
/// Default set holding write ledgers
pub const DEFAULT_SET_WRITES: &str = "lg_cp_w";
/// Default set holding latest pointers and timelines
pub const DEFAULT_SET_META: &str = "lg_cp_meta";
/// Default timeline capacity per scope
pub const DEFAULT_TIMELINE_MAX: usize = 500;

/// Record expiry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlConfig {
    /// Lifetime of every written record, in minutes
    pub default_ttl_minutes: u64,
    /// Re-arm the lifetime of a checkpoint and its write ledger when it is read
    pub refresh_on_read: bool,
}

impl TtlConfig {
    pub fn new(default_ttl_minutes: u64) -> Self {
        Self {
            default_ttl_minutes,
            refresh_on_read: false,
        }
    }

    pub fn with_refresh_on_read(mut self, refresh_on_read: bool) -> Self {
        self.refresh_on_read = refresh_on_read;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.default_ttl_minutes.saturating_mul(60))
    }
}

/// Configuration for [`KvCheckpointSaver`](crate::saver::KvCheckpointSaver)
#[derive(Debug, Clone, PartialEq)]
pub struct SaverConfig {
    pub namespace: String,
    pub set_checkpoints: String,
    pub set_writes: String,
    pub set_meta: String,
    /// `None` means records never expire
    pub ttl: Option<TtlConfig>,
    /// Maximum timeline entries kept per scope (at least 1)
    pub timeline_max: usize,
    pub special_channels: SpecialChannels,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            set_checkpoints: DEFAULT_SET_CHECKPOINTS.to_string(),
            set_writes: DEFAULT_SET_WRITES.to_string(),
            set_meta: DEFAULT_SET_META.to_string(),
            ttl: None,
            timeline_max: DEFAULT_TIMELINE_MAX,
            special_channels: SpecialChannels::default(),
        }
    }
}

impl SaverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_sets(
        mut self,
        set_checkpoints: impl Into<String>,
        set_writes: impl Into<String>,
        set_meta: impl Into<String>,
    ) -> Self {
        self.set_checkpoints = set_checkpoints.into();
        self.set_writes = set_writes.into();
        self.set_meta = set_meta.into();
        self
    }

    pub fn with_ttl(mut self, ttl: TtlConfig) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the timeline capacity; values below 1 are raised to 1
    pub fn with_timeline_max(mut self, timeline_max: usize) -> Self {
        self.timeline_max = timeline_max.max(1);
        self
    }

    pub fn with_special_channels(mut self, special_channels: SpecialChannels) -> Self {
        self.special_channels = special_channels;
        self
    }

    /// Namespace and set names as a key space
    pub fn key_space(&self) -> KeySpace {
        KeySpace {
            namespace: self.namespace.clone(),
            set_checkpoints: self.set_checkpoints.clone(),
            set_writes: self.set_writes.clone(),
            set_meta: self.set_meta.clone(),
        }
    }

    /// Write TTL applied to every record, if configured
    pub fn ttl_duration(&self) -> Option<Duration> {
        self.ttl.map(|ttl| ttl.duration())
    }

    /// Check the configuration for values the saver cannot work with
    ///
    /// Checkpoint records and write ledgers share user keys, so they must
    /// live in different sets.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("namespace", &self.namespace),
            ("set_checkpoints", &self.set_checkpoints),
            ("set_writes", &self.set_writes),
            ("set_meta", &self.set_meta),
        ] {
            if value.is_empty() {
                return Err(CheckpointError::Invalid(format!("{} must not be empty", field)));
            }
        }
        if self.set_checkpoints == self.set_writes {
            return Err(CheckpointError::Invalid(format!(
                "set_checkpoints and set_writes must differ: {}",
                self.set_checkpoints
            )));
        }
        if self.timeline_max == 0 {
            return Err(CheckpointError::Invalid(
                "timeline_max must be at least 1".to_string(),
            ));
        }
        if let Some(ttl) = &self.ttl {
            if ttl.default_ttl_minutes == 0 {
                return Err(CheckpointError::Invalid(
                    "default_ttl_minutes must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Load every field present in the environment, leaving the rest at defaults
    pub fn from_env(prefix: &str) -> Result<Self> {
        let mut config = Self::default();

        if let Some(namespace) = get_env(&env_key(prefix, "namespace"))? {
            config.namespace = namespace;
        }
        if let Some(set) = get_env(&env_key(prefix, "set_checkpoints"))? {
            config.set_checkpoints = set;
        }
        if let Some(set) = get_env(&env_key(prefix, "set_writes"))? {
            config.set_writes = set;
        }
        if let Some(set) = get_env(&env_key(prefix, "set_meta"))? {
            config.set_meta = set;
        }
        if let Some(max) = get_env_parse::<usize>(&env_key(prefix, "timeline_max"))? {
            config.timeline_max = max.max(1);
        }

        let minutes = get_env_parse::<u64>(&env_key(prefix, "default_ttl_minutes"))?;
        let refresh = get_env_bool(&env_key(prefix, "refresh_on_read"))?;
        match (minutes, refresh) {
            (Some(minutes), refresh) => {
                config.ttl = Some(TtlConfig::new(minutes).with_refresh_on_read(refresh.unwrap_or(true)));
            }
            (None, Some(_)) => {
                tracing::warn!(prefix, "REFRESH_ON_READ set without DEFAULT_TTL_MINUTES, ignoring");
            }
            (None, None) => {}
        }

        Ok(config)
    }

    /// Overlay every field of `other` that differs from the default
    pub fn merge(&mut self, other: Self) -> &mut Self {
        let defaults = Self::default();
        if other.namespace != defaults.namespace {
            self.namespace = other.namespace;
        }
        if other.set_checkpoints != defaults.set_checkpoints {
            self.set_checkpoints = other.set_checkpoints;
        }
        if other.set_writes != defaults.set_writes {
            self.set_writes = other.set_writes;
        }
        if other.set_meta != defaults.set_meta {
            self.set_meta = other.set_meta;
        }
        if other.ttl.is_some() {
            self.ttl = other.ttl;
        }
        if other.timeline_max != defaults.timeline_max {
            self.timeline_max = other.timeline_max;
        }
        if other.special_channels != defaults.special_channels {
            self.special_channels = other.special_channels;
        }
        self
    }

    /// Load from the environment on top of defaults and validate the result
    pub fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge(Self::from_env(prefix)?);
        config.validate()?;
        Ok(config)
    }
}

fn env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}

fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(CheckpointError::Invalid(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => {
            let parsed = val.trim().parse::<T>().map_err(|e| {
                CheckpointError::Invalid(format!(
                    "Failed to parse environment variable {}: {}",
                    key, e
                ))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool(key: &str) -> Result<Option<bool>> {
    match get_env(key)? {
        Some(val) => {
            let result = match val.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    return Err(CheckpointError::Invalid(format!(
                        "Invalid boolean value for {}: {}",
                        key, val
                    )))
                }
            };
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SaverConfig::default();
        assert_eq!(config.namespace, "test");
        assert_eq!(config.key_space(), KeySpace::default());
        assert_eq!(config.timeline_max, 500);
        assert_eq!(config.ttl_duration(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeline_max_is_clamped() {
        assert_eq!(SaverConfig::new().with_timeline_max(0).timeline_max, 1);
    }

    #[test]
    fn test_ttl_duration() {
        let config = SaverConfig::new().with_ttl(TtlConfig::new(2));
        assert_eq!(config.ttl_duration(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SaverConfig::new().with_namespace("").validate().is_err());
        assert!(SaverConfig::new()
            .with_sets("same", "same", "meta")
            .validate()
            .is_err());
        assert!(SaverConfig::new()
            .with_ttl(TtlConfig::new(0))
            .validate()
            .is_err());

        let mut zero = SaverConfig::new();
        zero.timeline_max = 0;
        assert!(matches!(zero.validate(), Err(CheckpointError::Invalid(_))));
    }

    #[test]
    fn test_merge_overlays_non_defaults() {
        let mut base = SaverConfig::new().with_namespace("prod").with_timeline_max(10);
        base.merge(SaverConfig::new().with_ttl(TtlConfig::new(5)));

        assert_eq!(base.namespace, "prod");
        assert_eq!(base.timeline_max, 10);
        assert_eq!(base.ttl, Some(TtlConfig::new(5)));

        base.merge(SaverConfig::new().with_namespace("staging"));
        assert_eq!(base.namespace, "staging");
    }

    #[test]
    fn test_from_env() {
        let prefix = "LGKV_TEST_FROM_ENV_";
        env::set_var("LGKV_TEST_FROM_ENV_NAMESPACE", "ns1");
        env::set_var("LGKV_TEST_FROM_ENV_SET_META", "meta1");
        env::set_var("LGKV_TEST_FROM_ENV_TIMELINE_MAX", "25");
        env::set_var("LGKV_TEST_FROM_ENV_DEFAULT_TTL_MINUTES", "30");
        env::set_var("LGKV_TEST_FROM_ENV_REFRESH_ON_READ", "off");

        let config = SaverConfig::from_env_with_defaults(prefix).unwrap();
        assert_eq!(config.namespace, "ns1");
        assert_eq!(config.set_meta, "meta1");
        assert_eq!(config.set_checkpoints, DEFAULT_SET_CHECKPOINTS);
        assert_eq!(config.timeline_max, 25);
        assert_eq!(config.ttl, Some(TtlConfig::new(30)));

        for name in [
            "NAMESPACE",
            "SET_META",
            "TIMELINE_MAX",
            "DEFAULT_TTL_MINUTES",
            "REFRESH_ON_READ",
        ] {
            env::remove_var(format!("{}{}", prefix, name));
        }
    }

    #[test]
    fn test_from_env_refresh_defaults_on() {
        env::set_var("LGKV_TEST_REFRESH_DEFAULT_TTL_MINUTES", "1");
        let config = SaverConfig::from_env("LGKV_TEST_REFRESH_").unwrap();
        assert_eq!(config.ttl, Some(TtlConfig::new(1).with_refresh_on_read(true)));
        env::remove_var("LGKV_TEST_REFRESH_DEFAULT_TTL_MINUTES");
    }

    #[test]
    fn test_from_env_invalid_values() {
        env::set_var("LGKV_TEST_BAD_TIMELINE_MAX", "lots");
        assert!(matches!(
            SaverConfig::from_env("LGKV_TEST_BAD_"),
            Err(CheckpointError::Invalid(_))
        ));
        env::remove_var("LGKV_TEST_BAD_TIMELINE_MAX");

        env::set_var("LGKV_TEST_BADBOOL_DEFAULT_TTL_MINUTES", "5");
        env::set_var("LGKV_TEST_BADBOOL_REFRESH_ON_READ", "maybe");
        assert!(SaverConfig::from_env("LGKV_TEST_BADBOOL_").is_err());
        env::remove_var("LGKV_TEST_BADBOOL_DEFAULT_TTL_MINUTES");
        env::remove_var("LGKV_TEST_BADBOOL_REFRESH_ON_READ");
    }

    #[test]
    fn test_from_env_missing_is_default() {
        let config = SaverConfig::from_env("LGKV_TEST_NOTHING_SET_").unwrap();
        assert_eq!(config, SaverConfig::default());
    }
}

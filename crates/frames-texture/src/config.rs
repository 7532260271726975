//! Cache Configuration

use crate::decode::DecodeOptions;
use crate::error::TextureError;
use frames_net::LoaderConfig;
use serde::Deserialize;

/// Default cap on concurrent seekers
pub const DEFAULT_MAX_ACTIVE_DOWNLOADS: usize = 4;

/// Texture cache configuration options
///
/// Missing fields fall back to their defaults when deserialized, so the
/// struct can be embedded in a host config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of fetches in flight across the whole cache
    pub max_active_downloads: usize,

    /// User agent sent with HTTP requests
    pub user_agent: String,

    /// Animation frames with a shorter delay are slowed down to this (ms)
    pub min_frame_delay_ms: u64,

    /// Delay used for animation frames that declare none (ms)
    pub default_frame_delay_ms: u64,

    /// Frames larger than this on either axis are downscaled
    pub max_texture_size: u32,

    /// Length of one host tick (ms)
    pub ms_per_tick: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_active_downloads: DEFAULT_MAX_ACTIVE_DOWNLOADS,
            user_agent: format!("frames/{}", crate::VERSION),
            min_frame_delay_ms: 20,
            default_frame_delay_ms: 100,
            max_texture_size: 4096,
            ms_per_tick: 50,
        }
    }
}

impl CacheConfig {
    /// Reject values the cache cannot work with
    pub fn validate(&self) -> Result<(), TextureError> {
        if self.max_active_downloads == 0 {
            return Err(TextureError::Config("max_active_downloads must be at least 1".into()));
        }
        if self.default_frame_delay_ms == 0 {
            return Err(TextureError::Config("default_frame_delay_ms must be positive".into()));
        }
        if self.max_texture_size == 0 {
            return Err(TextureError::Config("max_texture_size must be positive".into()));
        }
        if self.ms_per_tick == 0 {
            return Err(TextureError::Config("ms_per_tick must be positive".into()));
        }
        Ok(())
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_texture_size: self.max_texture_size,
            min_frame_delay_ms: self.min_frame_delay_ms,
            default_frame_delay_ms: self.default_frame_delay_ms,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            user_agent: self.user_agent.clone(),
            ..LoaderConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_downloads_rejected() {
        let config = CacheConfig {
            max_active_downloads: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(TextureError::Config(_))));
    }

    #[test]
    fn test_partial_deserialize() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "max_active_downloads": 2, "ms_per_tick": 40 }"#).unwrap();

        assert_eq!(config.max_active_downloads, 2);
        assert_eq!(config.ms_per_tick, 40);
        assert_eq!(config.default_frame_delay_ms, 100);
        assert_eq!(config.max_texture_size, 4096);
    }

    #[test]
    fn test_loader_config_carries_user_agent() {
        let config = CacheConfig {
            user_agent: "frames-test".into(),
            ..CacheConfig::default()
        };
        assert_eq!(config.loader_config().user_agent, "frames-test");
    }
}

//! Configuration for the decode pipeline and the stream dispatcher
//!
//! Loaded from `config.toml` in the platform configuration directory,
//! falling back to defaults for every missing field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Error;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub decoder: DecoderConfig,
    pub stream: StreamConfig,
}

impl AppConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Write configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "live-media-relay")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location, or fall back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Audio decode pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Codec a track must carry to be selected
    pub codec_mime: String,
    /// Bytes per delivered chunk while unmuted
    pub pcm_chunk_len: usize,
    /// Bytes per delivered chunk while muted
    pub muted_chunk_len: usize,
    /// Sample rate used when track metadata is unreadable
    pub fallback_sample_rate: u32,
    /// Channel layout used when track metadata is unreadable
    pub fallback_stereo: bool,
    /// Upper bound on one input-buffer wait inside the worker loop
    pub input_timeout_ms: u64,
    /// Upper bound on each join attempt in `stop()`
    pub join_timeout_ms: u64,
    /// Name of the worker thread
    pub worker_name: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            codec_mime: AUDIO_CODEC_MIME.to_string(),
            pcm_chunk_len: PCM_CHUNK_LEN,
            muted_chunk_len: MUTED_CHUNK_LEN,
            fallback_sample_rate: FALLBACK_SAMPLE_RATE,
            fallback_stereo: true,
            input_timeout_ms: 10,
            join_timeout_ms: 500,
            worker_name: "audio-decode".to_string(),
        }
    }
}

impl DecoderConfig {
    pub fn input_timeout(&self) -> Duration {
        Duration::from_millis(self.input_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// H.264 profile advertised by the muxer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileIop {
    #[default]
    Baseline,
    Constrained,
}

impl ProfileIop {
    /// `profile_iop` byte of an AVC decoder configuration record
    pub fn as_byte(self) -> u8 {
        match self {
            ProfileIop::Baseline => 0x00,
            ProfileIop::Constrained => 0xE0,
        }
    }
}

/// Stream dispatch and network settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Forwarded video units between forced keyframe requests
    pub keyframe_interval: u64,
    /// Reconnect budget per stream
    pub retries: u32,
    /// Delay before a reconnect attempt
    pub reconnect_delay_ms: u64,
    /// Pending-frame cache capacity
    pub cache_size: usize,
    /// Connect timeout for the transport
    pub connect_timeout_ms: u64,
    /// H.264 profile advertised to the server
    pub profile_iop: ProfileIop,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: KEYFRAME_INTERVAL,
            retries: DEFAULT_RETRIES,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            cache_size: DEFAULT_CACHE_SIZE,
            connect_timeout_ms: 5000,
            profile_iop: ProfileIop::default(),
        }
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.decoder.codec_mime, "audio/mp4a-latm");
        assert_eq!(config.decoder.pcm_chunk_len, 4096);
        assert_eq!(config.decoder.muted_chunk_len, 11);
        assert_eq!(config.stream.keyframe_interval, 30);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [stream]
            retries = 7
            profile_iop = "constrained"
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.retries, 7);
        assert_eq!(config.stream.profile_iop, ProfileIop::Constrained);
        assert_eq!(config.stream.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.decoder, DecoderConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml("[stream]\nretries = \"many\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.decoder.fallback_sample_rate = 48000;
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}

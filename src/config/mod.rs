use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcribe::ChunkSettings;
use crate::TranscriptorError;

/// Environment variables consulted for the engine API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transcription engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Chunking and merge settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// API key (falls back to GEMINI_API_KEY / API_KEY)
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// API base URL; point at a relay if needed
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    /// HTTP timeout for a single engine request
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Length of each chunk in seconds
    pub chunk_duration: f64,

    /// Seconds shared by consecutive chunks
    pub overlap_duration: f64,

    /// Seconds into an overlap the earlier chunk stays authoritative
    pub handover_buffer: f64,

    /// Hard timeout for one chunk's transcription
    pub chunk_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Temporary directory for probing
    pub temp_dir: Option<PathBuf>,

    /// Keep audio files after transcription
    pub keep_audio: bool,

    /// Default output format
    pub default_output_format: String,

    /// Largest audio asset accepted, in megabytes
    pub max_asset_size_mb: u64,

    /// Timeout for downloading the audio asset
    pub download_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.2,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_duration: 60.0,
            overlap_duration: 15.0,
            handover_buffer: crate::merge::DEFAULT_HANDOVER_BUFFER,
            chunk_timeout_secs: 120,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            keep_audio: false,
            default_output_format: "text".to_string(),
            max_asset_size_mb: 50,
            download_timeout_secs: 90,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("podcast-transcriptor").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        ChunkSettings::from_config(&self.chunking).validate()?;

        if self.app.max_asset_size_mb == 0 {
            return Err(TranscriptorError::InvalidParameters(
                "max_asset_size_mb must be positive".to_string(),
            )
            .into());
        }

        if self.engine.model.trim().is_empty() {
            return Err(TranscriptorError::InvalidParameters("engine model must be set".to_string()).into());
        }

        Ok(())
    }

    /// API key from the override, the config file, or the environment
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Result<String> {
        let from_env = || {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
        };

        override_key
            .map(str::to_string)
            .or_else(|| self.engine.api_key.clone())
            .or_else(from_env)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                TranscriptorError::InvalidParameters(format!(
                    "no engine API key configured (set engine.api_key or {})",
                    API_KEY_ENV_VARS.join(" / ")
                ))
                .into()
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Model: {}", self.engine.model);
        println!("  Endpoint: {}", self.engine.base_url);
        println!(
            "  API Key: {}",
            if self.engine.api_key.is_some() { "configured" } else { "from environment" }
        );
        println!("  Chunk Duration: {}s", self.chunking.chunk_duration);
        println!("  Overlap: {}s", self.chunking.overlap_duration);
        println!("  Handover Buffer: {}s", self.chunking.handover_buffer);
        println!("  Chunk Timeout: {}s", self.chunking.chunk_timeout_secs);
        println!("  Max Asset Size: {} MB", self.app.max_asset_size_mb);
        println!("  Keep Audio: {}", self.app.keep_audio);
        println!("  Default Format: {}", self.app.default_output_format);
        if let Ok(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_duration, 60.0);
        assert_eq!(config.chunking.overlap_duration, 15.0);
        assert_eq!(config.chunking.handover_buffer, 5.0);
        assert_eq!(config.app.max_asset_size_mb, 50);
        assert_eq!(config.app.download_timeout_secs, 90);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "chunking:\n  chunk_duration: 120\n  overlap_duration: 20\nengine:\n  model: gemini-2.5-pro\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.chunking.chunk_duration, 120.0);
        assert_eq!(config.chunking.overlap_duration, 20.0);
        assert_eq!(config.chunking.handover_buffer, 5.0);
        assert_eq!(config.engine.model, "gemini-2.5-pro");
        assert_eq!(config.engine.temperature, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_chunking_is_rejected() {
        let mut config = Config::default();
        config.chunking.overlap_duration = 60.0;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_api_key_precedence() {
        let mut config = Config::default();
        config.engine.api_key = Some("from-file".to_string());

        assert_eq!(config.resolve_api_key(Some(" cli-key ")).unwrap(), "cli-key");
        assert_eq!(config.resolve_api_key(None).unwrap(), "from-file");
    }

    #[test]
    fn test_yaml_round_trip_keeps_sections() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("engine:"));
        assert!(yaml.contains("chunking:"));
        assert!(yaml.contains("handover_buffer"));
    }
}

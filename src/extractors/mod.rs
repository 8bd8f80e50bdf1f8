use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub mod direct;
pub mod local;

use crate::config::AppConfig;
use crate::{Result, TranscriptorError};

/// Information about a resolved audio source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Where the bytes are fetched from (URL or absolute file path)
    pub location: String,

    /// Title or file name of the episode
    pub title: Option<String>,

    /// Audio format (mp3, m4a, wav, etc.)
    pub format: AudioFormat,

    /// File size in bytes if known before fetching
    pub file_size: Option<u64>,

    /// Original input that was processed
    pub original_source: String,
}

/// Audio bytes held in memory together with their description
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub info: AudioInfo,
    pub bytes: Vec<u8>,
}

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" | "mp4" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "oga" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_lowercase();
        match ct {
            ct if ct.contains("mp3") || ct.contains("mpeg") => Some(AudioFormat::Mp3),
            ct if ct.contains("mp4") || ct.contains("m4a") || ct.contains("aac") => Some(AudioFormat::M4a),
            ct if ct.contains("wav") => Some(AudioFormat::Wav),
            ct if ct.contains("flac") => Some(AudioFormat::Flac),
            ct if ct.contains("ogg") || ct.contains("opus") => Some(AudioFormat::Ogg),
            ct if ct.contains("webm") => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Bounds applied while fetching an asset
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Largest accepted asset in bytes
    pub max_bytes: u64,

    /// Hard timeout for the whole download
    pub timeout: Duration,
}

impl FetchLimits {
    pub fn from_config(app: &AppConfig) -> Self {
        Self {
            max_bytes: app.max_asset_size_mb * 1024 * 1024,
            timeout: Duration::from_secs(app.download_timeout_secs),
        }
    }

    /// Fail with `AssetTooLarge` when `size` exceeds the limit.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(TranscriptorError::AssetTooLarge {
                size,
                limit: self.max_bytes,
            }
            .into());
        }
        Ok(())
    }
}

/// Trait for resolving and fetching audio from different sources
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Describe the audio behind a source without fetching it
    async fn extract_audio_info(&self, source: &str) -> Result<AudioInfo>;

    /// Check if this extractor supports the given source
    fn supports_source(&self, source: &str) -> bool;

    /// Get the name of this source type
    fn platform_name(&self) -> &'static str;

    /// Load the whole asset into memory, enforcing `limits`
    async fn fetch_audio(&self, audio_info: &AudioInfo, limits: &FetchLimits) -> Result<AudioAsset>;
}

/// Registry for managing multiple extractors
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MediaExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with default extractors
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: Vec::new(),
        };

        // Local paths are checked before URLs
        registry.register(Box::new(local::LocalFileExtractor::new()));
        registry.register(Box::new(direct::DirectExtractor::new()));

        registry
    }

    /// Register a new extractor
    pub fn register(&mut self, extractor: Box<dyn MediaExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given source
    pub fn find_extractor(&self, source: &str) -> Option<&dyn MediaExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports_source(source))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported source types
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .map(|extractor| extractor.platform_name())
            .collect()
    }

    /// Pick the extractor for `source` and describe the audio behind it
    pub async fn resolve(&self, source: &str) -> Result<(&dyn MediaExtractor, AudioInfo)> {
        let extractor = self
            .find_extractor(source)
            .ok_or_else(|| TranscriptorError::UnsupportedSource(source.to_string()))?;

        tracing::debug!("Using {} extractor for {}", extractor.platform_name(), source);
        let info = extractor.extract_audio_info(source).await?;

        Ok((extractor, info))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate and normalize URLs
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| TranscriptorError::UnsupportedSource(format!("invalid URL: {}", url)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TranscriptorError::UnsupportedSource(
            "URL must use HTTP or HTTPS protocol".to_string(),
        )
        .into());
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("aac"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_extension("txt"), None);

        assert_eq!(AudioFormat::from_content_type("audio/mpeg"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_content_type("audio/x-m4a"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_content_type("application/octet-stream"), None);
    }

    #[test]
    fn test_size_limit() {
        let limits = FetchLimits {
            max_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_secs(90),
        };

        assert!(limits.check_size(50 * 1024 * 1024).is_ok());

        let err = limits.check_size(50 * 1024 * 1024 + 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::AssetTooLarge { .. })
        ));
    }

    #[test]
    fn test_registry_routes_sources() {
        let registry = ExtractorRegistry::new();

        assert_eq!(
            registry.find_extractor("https://traffic.megaphone.fm/ABC123.mp3?updated=1").map(|e| e.platform_name()),
            Some("Direct URL")
        );
        assert_eq!(
            registry.find_extractor("./episodes/interview.mp3").map(|e| e.platform_name()),
            Some("Local File")
        );
        assert!(registry.find_extractor("ftp://example.com/a.mp3").is_none());
        assert_eq!(registry.list_platforms(), vec!["Local File", "Direct URL"]);
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/episode.mp3").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not-a-url").is_err());
    }
}

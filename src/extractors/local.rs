use super::{AudioAsset, AudioFormat, AudioInfo, FetchLimits, MediaExtractor};
use crate::{Result, TranscriptorError};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

pub struct LocalFileExtractor;

impl LocalFileExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> Result<u64> {
        if !path.exists() {
            return Err(TranscriptorError::FileError(format!("File does not exist: {}", path.display())).into());
        }

        if !path.is_file() {
            return Err(TranscriptorError::FileError(format!("Path is not a file: {}", path.display())).into());
        }

        let metadata = fs::metadata(path).await.map_err(|e| {
            TranscriptorError::FileError(format!("Cannot access file {}: {}", path.display(), e))
        })?;

        if metadata.len() == 0 {
            return Err(TranscriptorError::FileError(format!("File is empty: {}", path.display())).into());
        }

        Ok(metadata.len())
    }

    /// Determine audio format from file extension
    fn get_audio_format(&self, path: &Path) -> AudioFormat {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Mp3)
    }
}

impl Default for LocalFileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaExtractor for LocalFileExtractor {
    async fn extract_audio_info(&self, source: &str) -> Result<AudioInfo> {
        let file_path = Path::new(source);
        let file_size = self.validate_file(file_path).await?;

        let title = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());

        let absolute_path = file_path
            .canonicalize()
            .unwrap_or_else(|_| file_path.to_path_buf());

        Ok(AudioInfo {
            location: absolute_path.display().to_string(),
            title,
            format: self.get_audio_format(file_path),
            file_size: Some(file_size),
            original_source: source.to_string(),
        })
    }

    fn supports_source(&self, source: &str) -> bool {
        if source.contains("://") {
            return false;
        }

        // Check if the file exists (handles both absolute and relative paths)
        let path = Path::new(source);
        if path.exists() {
            return true;
        }

        // Check if it looks like a file path (has file extension or path separators)
        let has_extension = path.extension().is_some();
        let has_path_separators = source.contains('/') || source.contains('\\');

        has_extension || has_path_separators
    }

    fn platform_name(&self) -> &'static str {
        "Local File"
    }

    async fn fetch_audio(&self, audio_info: &AudioInfo, limits: &FetchLimits) -> Result<AudioAsset> {
        if let Some(size) = audio_info.file_size {
            limits.check_size(size)?;
        }

        tracing::debug!("Reading local audio file: {}", audio_info.location);
        let bytes = fs::read(&audio_info.location)
            .await
            .with_context(|| format!("Failed to read {}", audio_info.location))?;
        limits.check_size(bytes.len() as u64)?;

        Ok(AudioAsset {
            info: audio_info.clone(),
            bytes,
        })
    }
}

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::Path;
use url::Url;

use super::{validate_url, AudioAsset, AudioFormat, AudioInfo, FetchLimits, MediaExtractor};
use crate::{Result, TranscriptorError};

/// Direct URL extractor for podcast enclosures and other audio files
pub struct DirectExtractor {
    client: Client,
}

impl DirectExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Determine audio format from URL or content type
    fn determine_format(&self, url: &Url, content_type: Option<&str>) -> AudioFormat {
        // Try to determine from URL extension first
        let from_extension = url
            .path_segments()
            .and_then(|segments| segments.last())
            .and_then(|filename| Path::new(filename).extension())
            .and_then(|ext| AudioFormat::from_extension(&ext.to_string_lossy()));

        from_extension
            .or_else(|| content_type.and_then(AudioFormat::from_content_type))
            .unwrap_or(AudioFormat::Mp3)
    }

    /// Get content information via HEAD request
    async fn get_content_info(&self, url: &str) -> Result<(Option<String>, Option<u64>)> {
        let response = self.client.head(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("HEAD request returned HTTP {}", response.status());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|cl| cl.to_str().ok())
            .and_then(|cl| cl.parse::<u64>().ok());

        Ok((content_type, content_length))
    }

    async fn download(&self, audio_info: &AudioInfo, limits: &FetchLimits) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&audio_info.location)
            .send()
            .await
            .map_err(|e| TranscriptorError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranscriptorError::DownloadFailed(format!("HTTP {}", response.status())).into());
        }

        let total_size = response.content_length();
        if let Some(size) = total_size {
            limits.check_size(size)?;
        }

        let progress = ProgressBar::new(total_size.unwrap_or(0));
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message("Downloading audio...");

        let mut bytes = Vec::with_capacity(total_size.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TranscriptorError::DownloadFailed(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
            limits.check_size(bytes.len() as u64)?;
            progress.set_position(bytes.len() as u64);
        }

        progress.finish_and_clear();
        Ok(bytes)
    }
}

#[async_trait]
impl MediaExtractor for DirectExtractor {
    async fn extract_audio_info(&self, url: &str) -> Result<AudioInfo> {
        let parsed_url = validate_url(url)?;

        // Many podcast hosts reject HEAD; the download re-checks everything
        let (content_type, file_size) = match self.get_content_info(url).await {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!("Could not inspect {}: {:#}", url, e);
                (None, None)
            }
        };

        let format = self.determine_format(&parsed_url, content_type.as_deref());

        // Extract title from filename
        let title = parsed_url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|filename| !filename.is_empty())
            .map(|filename| {
                // Remove extension and decode URL encoding
                let name = match filename.rfind('.') {
                    Some(dot_pos) => &filename[..dot_pos],
                    None => filename,
                };
                urlencoding::decode(name)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| name.to_string())
                    .replace(['_', '-'], " ")
            });

        Ok(AudioInfo {
            location: url.to_string(),
            title,
            format,
            file_size,
            original_source: url.to_string(),
        })
    }

    fn supports_source(&self, source: &str) -> bool {
        validate_url(source).is_ok()
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }

    async fn fetch_audio(&self, audio_info: &AudioInfo, limits: &FetchLimits) -> Result<AudioAsset> {
        if let Some(size) = audio_info.file_size {
            limits.check_size(size)?;
        }

        tracing::info!("Downloading audio from {}", audio_info.location);

        let bytes = tokio::time::timeout(limits.timeout, self.download(audio_info, limits))
            .await
            .map_err(|_| {
                TranscriptorError::DownloadFailed(format!(
                    "download timed out after {}s",
                    limits.timeout.as_secs()
                ))
            })??;

        if bytes.is_empty() {
            return Err(TranscriptorError::DownloadFailed("server returned no audio".to_string()).into());
        }

        Ok(AudioAsset {
            info: audio_info.clone(),
            bytes,
        })
    }
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

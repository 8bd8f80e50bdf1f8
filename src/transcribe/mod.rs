use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::extractors::{AudioAsset, AudioInfo, ExtractorRegistry, FetchLimits};
use crate::probe::{DurationProbe, FfprobeDurationProbe, FixedDuration};

pub mod client;
pub mod driver;
pub mod engine;
pub mod processor;

pub use client::TranscriptionClient;
pub use driver::{
    ChunkSettings, ChunkedTranscriber, NoProgress, PipelineState, ProgressSink, TranscriptContext,
    TranscriptOutcome,
};
pub use engine::{GeminiEngine, TranscriptionEngine};
pub use processor::{parse_caption_response, ParsedResponse};

/// One captioned line of speech or music
///
/// Times are relative to the producing chunk until merged, absolute afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionLine {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Spoken text
    pub text: String,

    /// Speaker label, if the engine identified one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    /// Intro, outro or interlude music
    #[serde(default)]
    pub is_music: bool,
}

impl CaptionLine {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
            is_music: false,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// Copy of this line moved `offset` seconds later
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            ..self.clone()
        }
    }
}

/// Captions produced by one chunk, still chunk-relative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_index: usize,

    /// Absolute offset of the chunk in seconds
    pub start_time: f64,

    pub items: Vec<CaptionLine>,
}

/// Transcription result with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// The transcribed text
    pub transcript: String,

    /// Merged lines with absolute timestamps
    pub lines: Vec<CaptionLine>,

    /// Original audio information
    pub audio_info: AudioInfo,

    /// Path to the saved audio file (if preserved)
    pub audio_path: Option<PathBuf>,

    /// Transcription metadata
    pub metadata: TranscriptionMetadata,
}

/// Metadata about the transcription process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionMetadata {
    /// Identifier of this run
    pub run_id: String,

    /// Engine model used
    pub model: String,

    /// Number of chunks the audio was split into
    pub chunk_count: usize,

    /// Chunks that produced no lines because the engine call failed
    pub failed_chunks: Vec<usize>,

    /// Processing time in seconds
    pub processing_duration: Option<f64>,

    /// Audio duration in seconds
    pub audio_duration: Option<f64>,

    /// Timestamp when transcription completed
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Per-run options that override or extend the configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Engine API key (falls back to the config file and environment)
    pub api_key: Option<String>,

    /// Known audio duration in seconds; skips probing
    pub duration: Option<f64>,

    /// Keep a copy of the downloaded audio in the working directory
    pub save_audio: bool,
}

/// Main transcription pipeline
pub struct TranscriptionPipeline {
    config: Config,
    extractor_registry: ExtractorRegistry,
    transcriber: ChunkedTranscriber,
    model: String,
    save_audio: bool,
}

impl TranscriptionPipeline {
    /// Create a new transcription pipeline
    pub fn new(config: Config, options: RunOptions) -> Result<Self> {
        config.validate()?;

        let api_key = config.resolve_api_key(options.api_key.as_deref())?;
        let engine = GeminiEngine::new(&config.engine, api_key)?;
        let model = engine.model_name();

        let probe: Arc<dyn DurationProbe> = match options.duration {
            Some(seconds) => Arc::new(FixedDuration::new(seconds)),
            None => Arc::new(FfprobeDurationProbe::new(config.app.temp_dir.clone())),
        };

        let settings = ChunkSettings::from_config(&config.chunking);
        let transcriber = ChunkedTranscriber::new(settings, Arc::new(engine), probe)?;

        Ok(Self {
            save_audio: options.save_audio || config.app.keep_audio,
            config,
            extractor_registry: ExtractorRegistry::new(),
            transcriber,
            model,
        })
    }

    /// Transcribe audio from a URL or local file
    pub async fn transcribe_from_source(
        &self,
        source: &str,
        sink: &dyn ProgressSink,
    ) -> Result<TranscriptionResult> {
        let started = std::time::Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let asset = match self.acquire(source).await {
            Ok(asset) => asset,
            Err(e) => {
                sink.on_state(PipelineState::Failed);
                let message = format!("Could not fetch audio from {}: {:#}", source, e);
                tracing::error!("{}", message);
                sink.on_log(&message);
                return Err(e);
            }
        };
        sink.on_log(&format!(
            "Fetched {} of {} audio",
            crate::utils::format_file_size(asset.bytes.len() as u64),
            asset.info.format.as_str()
        ));

        let outcome = self
            .transcriber
            .run(&asset.bytes, asset.info.format.mime_type(), sink)
            .await?;

        let audio_path = if self.save_audio {
            Some(self.preserve_audio_file(&asset.bytes, &asset.info)?)
        } else {
            None
        };

        let metadata = TranscriptionMetadata {
            run_id,
            model: self.model.clone(),
            chunk_count: outcome.chunks.len(),
            failed_chunks: outcome.failed_chunks.clone(),
            processing_duration: Some(started.elapsed().as_secs_f64()),
            audio_duration: Some(outcome.duration),
            completed_at: chrono::Utc::now(),
        };

        Ok(TranscriptionResult {
            transcript: outcome.full_text,
            lines: outcome.lines,
            audio_info: asset.info,
            audio_path,
            metadata,
        })
    }

    /// Resolve `source` and load its bytes within the configured limits
    async fn acquire(&self, source: &str) -> Result<AudioAsset> {
        tracing::info!("Resolving audio source: {}", source);
        let (extractor, audio_info) = self.extractor_registry.resolve(source).await?;

        let limits = FetchLimits::from_config(&self.config.app);
        extractor.fetch_audio(&audio_info, &limits).await
    }

    /// Preserve audio file in the working directory
    fn preserve_audio_file(&self, audio: &[u8], audio_info: &AudioInfo) -> Result<PathBuf> {
        let filename = audio_info
            .title
            .as_ref()
            .map(|title| {
                format!(
                    "{}.{}",
                    crate::utils::sanitize_filename(title),
                    audio_info.format.as_str()
                )
            })
            .unwrap_or_else(|| {
                format!(
                    "audio_{}.{}",
                    chrono::Utc::now().format("%Y%m%d_%H%M%S"),
                    audio_info.format.as_str()
                )
            });

        let output_path = std::env::current_dir()?.join(filename);
        fs_err::write(&output_path, audio).context("Failed to save audio file")?;

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptorError;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StateLog {
        states: Mutex<Vec<PipelineState>>,
        logs: Mutex<Vec<String>>,
    }

    impl ProgressSink for StateLog {
        fn on_progress(&self, _lines: &[CaptionLine], _full_text: &str) {}

        fn on_log(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_string());
        }

        fn on_state(&self, state: PipelineState) {
            self.states.lock().unwrap().push(state);
        }
    }

    #[tokio::test]
    async fn test_oversized_asset_reports_failed_state() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(&vec![0u8; 1024 * 1024 + 1]).unwrap();
        let source = file.path().to_string_lossy().to_string();

        let mut config = Config::default();
        config.engine.api_key = Some("test-key".to_string());
        config.app.max_asset_size_mb = 1;

        let pipeline = TranscriptionPipeline::new(
            config,
            RunOptions {
                duration: Some(60.0),
                ..RunOptions::default()
            },
        )
        .unwrap();

        let sink = StateLog::default();
        let err = pipeline
            .transcribe_from_source(&source, &sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::AssetTooLarge { .. })
        ));
        assert_eq!(*sink.states.lock().unwrap(), vec![PipelineState::Failed]);
        assert!(sink.logs.lock().unwrap().iter().any(|l| l.contains("too large")));
    }

    #[tokio::test]
    async fn test_unsupported_source_reports_failed_state() {
        let mut config = Config::default();
        config.engine.api_key = Some("test-key".to_string());

        let pipeline = TranscriptionPipeline::new(
            config,
            RunOptions {
                duration: Some(60.0),
                ..RunOptions::default()
            },
        )
        .unwrap();

        let sink = StateLog::default();
        let err = pipeline
            .transcribe_from_source("ftp://example.com/episode.mp3", &sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::UnsupportedSource(_))
        ));
        assert_eq!(sink.states.lock().unwrap().last(), Some(&PipelineState::Failed));
    }
}

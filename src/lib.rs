//! Podcast Transcriptor - A Rust CLI tool for transcribing long podcast episodes
//!
//! Audio that is too large or too long for a single engine call is split into
//! overlapping time windows, each window is transcribed sequentially with a short
//! text context carried over from the previous one, and the per-chunk captions are
//! merged into one time-ordered, non-duplicated transcript.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod merge;
pub mod output;
pub mod probe;
pub mod transcribe;
pub mod utils;

pub use chunking::{plan_chunks, ByteRangeSlicer, ChunkPlan};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{AudioAsset, AudioInfo, MediaExtractor};
pub use merge::{merge_chunks, MergeSettings};
pub use probe::DurationProbe;
pub use transcribe::{
    CaptionLine, ChunkResult, ChunkedTranscriber, ProgressSink, TranscriptOutcome,
    TranscriptionEngine, TranscriptionPipeline, TranscriptionResult,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the transcriptor
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Could not determine audio duration: {0}")]
    DurationUnknown(String),

    #[error("Audio asset too large ({size} bytes, limit is {limit} bytes)")]
    AssetTooLarge { size: u64, limit: u64 },

    #[error("Audio download failed: {0}")]
    DownloadFailed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Transcription of chunk {chunk} failed: {reason}")]
    ChunkTranscriptionFailed { chunk: usize, reason: String },

    #[error("File operation failed: {0}")]
    FileError(String),
}

impl TranscriptorError {
    /// Asset-level failures abort the whole run.
    pub fn is_asset_failure(&self) -> bool {
        matches!(
            self,
            TranscriptorError::UnsupportedSource(_)
                | TranscriptorError::DurationUnknown(_)
                | TranscriptorError::AssetTooLarge { .. }
                | TranscriptorError::DownloadFailed(_)
                | TranscriptorError::FileError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_failures_are_not_asset_failures() {
        let chunk = TranscriptorError::ChunkTranscriptionFailed {
            chunk: 3,
            reason: "timed out".to_string(),
        };
        assert!(!chunk.is_asset_failure());
        assert!(!TranscriptorError::InvalidParameters("overlap".to_string()).is_asset_failure());
        assert!(TranscriptorError::DurationUnknown("ffprobe missing".to_string()).is_asset_failure());
        assert!(TranscriptorError::AssetTooLarge { size: 60, limit: 50 }.is_asset_failure());
    }
}

//! Sequential chunk pipeline.
//!
//! `Idle -> Probing -> (Slicing -> Transcribing -> Merging)* -> Done`, with
//! `Failed` reachable only while the asset is being probed and prepared. Chunk
//! failures never fail the run: the chunk contributes no lines, the context is
//! carried over unchanged and the next chunk starts.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::client::TranscriptionClient;
use super::engine::TranscriptionEngine;
use super::{CaptionLine, ChunkResult};
use crate::chunking::{plan_chunks, validate_chunk_parameters, ByteRangeSlicer, ChunkPlan};
use crate::config::ChunkingConfig;
use crate::merge::{full_text, merge_chunks, MergeSettings};
use crate::probe::DurationProbe;
use crate::{Result, TranscriptorError};

/// Number of trailing lines that make up the carried context
pub const CONTEXT_LINES: usize = 5;

/// Upper bound on the carried context, in characters
pub const MAX_CONTEXT_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Probing,
    Slicing { chunk: usize },
    Transcribing { chunk: usize },
    Merging { chunk: usize },
    Done,
    Failed,
}

/// Receives incremental results while a run is in progress.
pub trait ProgressSink: Send + Sync {
    /// Called after every chunk with the merged lines and their text so far.
    fn on_progress(&self, lines: &[CaptionLine], full_text: &str);

    /// Human-readable milestone and diagnostic messages
    fn on_log(&self, _message: &str) {}

    fn on_state(&self, _state: PipelineState) {}
}

/// Sink that discards everything
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _lines: &[CaptionLine], _full_text: &str) {}
}

/// Trailing text of the previous chunk, passed to the next engine call as a
/// spelling and terminology hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptContext(String);

impl TranscriptContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(truncate_to_tail(text.into().trim(), MAX_CONTEXT_CHARS))
    }

    /// Context for the chunk after the one that produced `lines`.
    ///
    /// A chunk without any spoken text keeps the current context.
    pub fn advance(&self, lines: &[CaptionLine]) -> Self {
        let texts: Vec<&str> = lines
            .iter()
            .map(|line| line.text.trim())
            .filter(|text| !text.is_empty())
            .collect();

        if texts.is_empty() {
            return self.clone();
        }

        let joined = texts[texts.len().saturating_sub(CONTEXT_LINES)..].join(" ");

        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Keep the last `max_chars` characters of `text`.
fn truncate_to_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

/// Chunking and timing parameters of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSettings {
    pub chunk_duration: f64,
    pub overlap_duration: f64,
    pub handover_buffer: f64,
    pub chunk_timeout: Duration,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl ChunkSettings {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_duration: config.chunk_duration,
            overlap_duration: config.overlap_duration,
            handover_buffer: config.handover_buffer,
            chunk_timeout: Duration::from_secs(config.chunk_timeout_secs),
        }
    }

    /// Reject parameter combinations that would stall the plan or invert a merge window.
    pub fn validate(&self) -> Result<()> {
        validate_chunk_parameters(self.chunk_duration, self.overlap_duration)?;

        let handover = self.handover_buffer;
        if !handover.is_finite() || handover < 0.0 {
            return Err(TranscriptorError::InvalidParameters(format!(
                "handover buffer must not be negative, got {}",
                handover
            ))
            .into());
        }

        let both_zero = handover == 0.0 && self.overlap_duration == 0.0;
        if handover >= self.overlap_duration && !both_zero {
            return Err(TranscriptorError::InvalidParameters(format!(
                "handover buffer ({}s) must be shorter than overlap duration ({}s)",
                handover, self.overlap_duration
            ))
            .into());
        }

        if self.chunk_timeout.is_zero() {
            return Err(TranscriptorError::InvalidParameters(
                "chunk timeout must be positive".to_string(),
            )
            .into());
        }

        Ok(())
    }

    pub fn merge_settings(&self) -> MergeSettings {
        MergeSettings {
            handover_buffer: self.handover_buffer,
        }
    }
}

/// Final result of a chunked run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptOutcome {
    /// Merged lines with absolute timestamps
    pub lines: Vec<CaptionLine>,

    /// Space-joined text of the merged lines
    pub full_text: String,

    /// Raw per-chunk results in chunk order
    pub chunks: Vec<ChunkResult>,

    /// Indices of chunks whose transcription failed
    pub failed_chunks: Vec<usize>,

    /// Probed audio duration in seconds
    pub duration: f64,
}

/// Drives probing, slicing, transcription and merging for one asset
pub struct ChunkedTranscriber {
    settings: ChunkSettings,
    client: TranscriptionClient,
    probe: Arc<dyn DurationProbe>,
}

impl ChunkedTranscriber {
    pub fn new(
        settings: ChunkSettings,
        engine: Arc<dyn TranscriptionEngine>,
        probe: Arc<dyn DurationProbe>,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            client: TranscriptionClient::new(engine, settings.overlap_duration, settings.chunk_timeout),
            settings,
            probe,
        })
    }

    /// Transcribe a whole in-memory asset chunk by chunk.
    ///
    /// `sink` sees the merged transcript after every chunk; the returned outcome
    /// equals the last progress update.
    pub async fn run(&self, audio: &[u8], mime_type: &str, sink: &dyn ProgressSink) -> Result<TranscriptOutcome> {
        sink.on_state(PipelineState::Idle);

        let (duration, plan, slicer) = match self.prepare(audio, sink).await {
            Ok(prepared) => prepared,
            Err(e) => {
                sink.on_state(PipelineState::Failed);
                log(sink, &format!("Transcription aborted: {:#}", e));
                return Err(e);
            }
        };

        let merge_settings = self.settings.merge_settings();
        let mut context = TranscriptContext::default();
        let mut chunks: Vec<ChunkResult> = Vec::with_capacity(plan.len());
        let mut failed_chunks = Vec::new();
        let mut lines = Vec::new();
        let mut text = String::new();

        for chunk_plan in &plan {
            let (result, next_context, failed) = self
                .process_chunk(audio, mime_type, &slicer, chunk_plan, plan.len(), context, sink)
                .await;
            context = next_context;
            if failed {
                failed_chunks.push(chunk_plan.index);
            }

            sink.on_state(PipelineState::Merging {
                chunk: chunk_plan.index,
            });
            chunks.push(result);
            lines = merge_chunks(&chunks, &merge_settings);
            text = full_text(&lines);

            sink.on_progress(&lines, &text);
        }

        sink.on_state(PipelineState::Done);
        log(
            sink,
            &format!(
                "Transcription finished: {} lines from {} chunks ({} failed)",
                lines.len(),
                chunks.len(),
                failed_chunks.len()
            ),
        );

        Ok(TranscriptOutcome {
            lines,
            full_text: text,
            chunks,
            failed_chunks,
            duration,
        })
    }

    /// Probe the duration, plan the chunks and build the slicer.
    async fn prepare(
        &self,
        audio: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<(f64, Vec<ChunkPlan>, ByteRangeSlicer)> {
        self.settings.validate()?;

        sink.on_state(PipelineState::Probing);
        let duration = self.probe.probe(audio).await?;
        log(
            sink,
            &format!("Audio duration: {}", crate::utils::format_duration(duration)),
        );

        let plan = plan_chunks(
            duration,
            self.settings.chunk_duration,
            self.settings.overlap_duration,
        )?;
        let slicer = ByteRangeSlicer::new(audio.len(), duration)?;

        log(
            sink,
            &format!(
                "Split into {} chunks of {}s with {}s overlap (~{:.0} bytes/s)",
                plan.len(),
                self.settings.chunk_duration,
                self.settings.overlap_duration,
                slicer.bytes_per_second()
            ),
        );

        Ok((duration, plan, slicer))
    }

    /// Slice and transcribe one chunk.
    ///
    /// Returns the chunk's result, the context for the next chunk and whether the
    /// chunk failed. A failed chunk yields no lines and leaves the context as it was.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_chunk(
        &self,
        audio: &[u8],
        mime_type: &str,
        slicer: &ByteRangeSlicer,
        plan: &ChunkPlan,
        total_chunks: usize,
        context: TranscriptContext,
        sink: &dyn ProgressSink,
    ) -> (ChunkResult, TranscriptContext, bool) {
        let empty = ChunkResult {
            chunk_index: plan.index,
            start_time: plan.start_time,
            items: Vec::new(),
        };

        sink.on_state(PipelineState::Slicing { chunk: plan.index });
        // The slice spans a full nominal chunk; the slicer clamps it to the asset.
        let slice = match slicer.slice(audio, plan.start_time, self.settings.chunk_duration) {
            Ok(slice) => slice,
            Err(e) => {
                warn(sink, &format!("Skipping chunk {}: {:#}", plan.index, e));
                return (empty, context, true);
            }
        };

        sink.on_state(PipelineState::Transcribing { chunk: plan.index });
        log(
            sink,
            &format!(
                "Transcribing chunk {}/{} ({:.0}s - {:.0}s)",
                plan.index + 1,
                total_chunks,
                plan.start_time,
                plan.end_time()
            ),
        );

        match self
            .client
            .transcribe(slice, mime_type, plan, total_chunks, &context)
            .await
        {
            Ok(items) => {
                let next_context = context.advance(&items);
                log(
                    sink,
                    &format!("Chunk {} produced {} lines", plan.index + 1, items.len()),
                );
                (ChunkResult { items, ..empty }, next_context, false)
            }
            Err(e) => {
                warn(sink, &format!("{:#}", e));
                (empty, context, true)
            }
        }
    }
}

fn log(sink: &dyn ProgressSink, message: &str) {
    tracing::info!("{}", message);
    sink.on_log(message);
}

fn warn(sink: &dyn ProgressSink, message: &str) {
    tracing::warn!("{}", message);
    sink.on_log(message);
}

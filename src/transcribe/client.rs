use std::sync::Arc;
use std::time::Duration;

use super::driver::TranscriptContext;
use super::engine::TranscriptionEngine;
use super::processor::{parse_caption_response, ParsedResponse};
use super::CaptionLine;
use crate::chunking::ChunkPlan;
use crate::{Result, TranscriptorError};

/// Submits chunk slices to the engine and turns its replies into caption lines
pub struct TranscriptionClient {
    engine: Arc<dyn TranscriptionEngine>,
    overlap_duration: f64,
    timeout: Duration,
}

impl TranscriptionClient {
    pub fn new(engine: Arc<dyn TranscriptionEngine>, overlap_duration: f64, timeout: Duration) -> Self {
        Self {
            engine,
            overlap_duration,
            timeout,
        }
    }

    /// Transcribe one chunk into chunk-relative lines.
    ///
    /// Every failure (engine error, timeout, unrecoverable response) comes back as
    /// `ChunkTranscriptionFailed`; the caller decides how to continue.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        plan: &ChunkPlan,
        total_chunks: usize,
        context: &TranscriptContext,
    ) -> Result<Vec<CaptionLine>> {
        let prompt = build_prompt(plan.index, total_chunks, self.overlap_duration, context);
        let failed = |reason: String| TranscriptorError::ChunkTranscriptionFailed {
            chunk: plan.index,
            reason,
        };

        tracing::debug!(
            "Chunk {}: {} bytes, context {} chars",
            plan.index,
            audio.len(),
            context.as_str().chars().count()
        );

        let raw = tokio::time::timeout(self.timeout, self.engine.generate(audio, mime_type, &prompt))
            .await
            .map_err(|_| failed(format!("engine call timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| failed(format!("{:#}", e)))?;

        match parse_caption_response(&raw) {
            ParsedResponse::Lines(lines) => Ok(lines),
            ParsedResponse::Malformed(raw) => {
                let preview: String = raw.chars().take(100).collect();
                Err(failed(format!("unparseable response: {}...", preview)).into())
            }
        }
    }
}

/// Instructions sent alongside each audio chunk
pub fn build_prompt(
    chunk_index: usize,
    total_chunks: usize,
    overlap_duration: f64,
    context: &TranscriptContext,
) -> String {
    let overlap_note = if chunk_index == 0 {
        "This is the start of the audio.".to_string()
    } else {
        format!(
            "The first {} seconds of this audio overlap with the previous chunk and repeat audio that was already transcribed.",
            overlap_duration
        )
    };

    let context_note = if context.is_empty() {
        "There is no previous context.".to_string()
    } else {
        format!(
            "PREVIOUS CONTEXT (end of the last chunk): \"{}\"\n\
             - Use the context only to keep names, spellings and terminology consistent. \
             Never copy it into the output or invent speech that is not in this audio.",
            context.as_str()
        )
    };

    format!(
        "You are a professional transcription engine producing synchronized subtitles.\n\
         \n\
         TASK:\n\
         Transcribe the provided audio chunk into a valid JSON array.\n\
         \n\
         CONTEXT AND OVERLAP:\n\
         - This audio chunk is part {part} of {total} of a podcast episode.\n\
         - {overlap_note}\n\
         - {context_note}\n\
         \n\
         OUTPUT FORMAT (strict JSON):\n\
         [\n\
           {{\"start\": 12.5, \"end\": 15.2, \"text\": \"Hello world\", \"speaker\": \"Host\", \"isMusic\": false}}\n\
         ]\n\
         - \"start\" and \"end\" are seconds relative to the beginning of THIS audio chunk.\n\
         - \"speaker\": identify speakers where possible (e.g. \"Host\", \"Guest\", \"Narrator\").\n\
         - \"isMusic\": true for music segments (intro, outro, interludes).\n\
         - Lines must be in chronological order.\n\
         - Do not use Markdown code blocks. Output only the raw JSON.",
        part = chunk_index + 1,
        total = total_chunks,
        overlap_note = overlap_note,
        context_note = context_note,
    )
}

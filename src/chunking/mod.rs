use serde::{Deserialize, Serialize};

use crate::{Result, TranscriptorError};

pub mod slicer;

pub use slicer::ByteRangeSlicer;

/// One time window of the source audio submitted as a single engine call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    /// Position in the plan, contiguous from 0
    pub index: usize,

    /// Absolute start of the window in seconds
    pub start_time: f64,

    /// Window length in seconds (shorter than the nominal chunk length for the tail)
    pub duration: f64,
}

impl ChunkPlan {
    /// Nominal absolute end of the window
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Check the chunking parameters without producing a plan.
pub fn validate_chunk_parameters(chunk_duration: f64, overlap_duration: f64) -> Result<()> {
    if !chunk_duration.is_finite() || chunk_duration <= 0.0 {
        return Err(TranscriptorError::InvalidParameters(format!(
            "chunk duration must be positive, got {}",
            chunk_duration
        ))
        .into());
    }

    if !overlap_duration.is_finite() || overlap_duration < 0.0 {
        return Err(TranscriptorError::InvalidParameters(format!(
            "overlap duration must not be negative, got {}",
            overlap_duration
        ))
        .into());
    }

    if overlap_duration >= chunk_duration {
        return Err(TranscriptorError::InvalidParameters(format!(
            "overlap duration ({}s) must be shorter than chunk duration ({}s)",
            overlap_duration, chunk_duration
        ))
        .into());
    }

    Ok(())
}

/// Split `[0, total_duration)` into overlapping windows.
///
/// Windows start every `chunk_duration - overlap_duration` seconds and are cut at
/// `total_duration`. Planning stops at the first window that reaches the end of the
/// audio, so no window lies entirely inside its predecessor. Audio no longer than
/// one chunk yields exactly one window.
pub fn plan_chunks(
    total_duration: f64,
    chunk_duration: f64,
    overlap_duration: f64,
) -> Result<Vec<ChunkPlan>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(TranscriptorError::InvalidParameters(format!(
            "total duration must be positive, got {}",
            total_duration
        ))
        .into());
    }

    validate_chunk_parameters(chunk_duration, overlap_duration)?;

    if total_duration <= chunk_duration {
        return Ok(vec![ChunkPlan {
            index: 0,
            start_time: 0.0,
            duration: total_duration,
        }]);
    }

    let step = chunk_duration - overlap_duration;
    let mut chunks = Vec::new();

    loop {
        let index = chunks.len();
        // Multiply rather than accumulate so start times do not drift.
        let start_time = index as f64 * step;
        if start_time >= total_duration {
            break;
        }

        let end_time = (start_time + chunk_duration).min(total_duration);
        chunks.push(ChunkPlan {
            index,
            start_time,
            duration: end_time - start_time,
        });

        if end_time >= total_duration {
            break;
        }
    }

    tracing::debug!(
        "Planned {} chunks ({}s chunks, {}s overlap, {}s total)",
        chunks.len(),
        chunk_duration,
        overlap_duration,
        total_duration
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_invalid_parameters(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::InvalidParameters(_))
        )
    }

    #[test]
    fn test_hundred_seconds_in_two_chunks() {
        let chunks = plan_chunks(100.0, 60.0, 15.0).unwrap();

        let starts: Vec<f64> = chunks.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0.0, 45.0]);
        assert_eq!(chunks[0].duration, 60.0);
        assert_eq!(chunks[1].duration, 55.0);
        assert_eq!(chunks[1].end_time(), 100.0);
    }

    #[test]
    fn test_single_chunk_when_audio_is_short() {
        let chunks = plan_chunks(42.0, 60.0, 15.0).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start_time, 0.0);
        assert_eq!(chunks[0].end_time(), 42.0);
    }

    #[test]
    fn test_exactly_one_chunk_long() {
        let chunks = plan_chunks(60.0, 60.0, 15.0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].duration, 60.0);
    }

    #[test]
    fn test_plan_covers_whole_duration() {
        let cases = [
            (61.0, 60.0, 15.0),
            (3600.0, 60.0, 15.0),
            (1234.5, 90.0, 10.0),
            (500.0, 30.0, 29.5),
            (200.0, 50.0, 0.0),
        ];

        for (total, chunk, overlap) in cases {
            let chunks = plan_chunks(total, chunk, overlap).unwrap();
            let step = chunk - overlap;

            let last = chunks.last().unwrap();
            assert!((last.end_time() - total).abs() < 1e-9, "case {:?}", (total, chunk, overlap));
            assert!(last.start_time < total);

            for (i, pair) in chunks.windows(2).enumerate() {
                assert_eq!(pair[0].index, i);
                assert_eq!(pair[1].index, i + 1);
                assert!(((pair[1].start_time - pair[0].start_time) - step).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_overlap_not_shorter_than_chunk_is_rejected() {
        let err = plan_chunks(100.0, 60.0, 60.0).unwrap_err();
        assert!(is_invalid_parameters(&err));

        let err = plan_chunks(100.0, 60.0, 75.0).unwrap_err();
        assert!(is_invalid_parameters(&err));
    }

    #[test]
    fn test_non_positive_durations_are_rejected() {
        assert!(is_invalid_parameters(&plan_chunks(0.0, 60.0, 15.0).unwrap_err()));
        assert!(is_invalid_parameters(&plan_chunks(-5.0, 60.0, 15.0).unwrap_err()));
        assert!(is_invalid_parameters(&plan_chunks(100.0, 0.0, 0.0).unwrap_err()));
        assert!(is_invalid_parameters(&plan_chunks(100.0, 60.0, -1.0).unwrap_err()));
        assert!(is_invalid_parameters(&plan_chunks(f64::NAN, 60.0, 15.0).unwrap_err()));
    }
}

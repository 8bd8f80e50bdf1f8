use std::ops::Range;

use crate::{Result, TranscriptorError};

/// Maps time windows onto byte ranges of an in-memory audio asset.
///
/// Assumes a constant bitrate, so ranges are approximate. The overlap between
/// chunks absorbs the difference.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeSlicer {
    total_bytes: usize,
    bytes_per_second: f64,
}

impl ByteRangeSlicer {
    pub fn new(total_bytes: usize, total_duration: f64) -> Result<Self> {
        if total_bytes == 0 {
            return Err(TranscriptorError::FileError("audio asset is empty".to_string()).into());
        }

        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(TranscriptorError::DurationUnknown(format!(
                "cannot slice audio with duration {}",
                total_duration
            ))
            .into());
        }

        Ok(Self {
            total_bytes,
            bytes_per_second: total_bytes as f64 / total_duration,
        })
    }

    /// Average byte rate of the asset
    pub fn bytes_per_second(&self) -> f64 {
        self.bytes_per_second
    }

    /// Byte range covering `[start_time, start_time + duration)`, clamped to the asset.
    pub fn byte_range(&self, start_time: f64, duration: f64) -> Range<usize> {
        let start = self.offset_at(start_time);
        let end = self.offset_at(start_time + duration).max(start);
        start..end
    }

    /// Borrow the bytes for a time window out of the full asset.
    pub fn slice<'a>(&self, audio: &'a [u8], start_time: f64, duration: f64) -> Result<&'a [u8]> {
        if audio.len() != self.total_bytes {
            return Err(TranscriptorError::FileError(format!(
                "slicer was built for {} bytes but received {}",
                self.total_bytes,
                audio.len()
            ))
            .into());
        }

        let range = self.byte_range(start_time, duration);
        if range.is_empty() {
            return Err(TranscriptorError::FileError(format!(
                "time window at {:.1}s maps to an empty byte range",
                start_time
            ))
            .into());
        }

        Ok(&audio[range])
    }

    fn offset_at(&self, seconds: f64) -> usize {
        let offset = (seconds.max(0.0) * self.bytes_per_second).floor();
        (offset as usize).min(self.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_ranges_follow_average_rate() {
        // 100 seconds at 1000 bytes/second
        let slicer = ByteRangeSlicer::new(100_000, 100.0).unwrap();

        assert_eq!(slicer.bytes_per_second(), 1000.0);
        assert_eq!(slicer.byte_range(0.0, 60.0), 0..60_000);
        assert_eq!(slicer.byte_range(45.0, 60.0), 45_000..100_000);
    }

    #[test]
    fn test_ranges_are_floored() {
        let slicer = ByteRangeSlicer::new(1000, 3.0).unwrap();

        // 333.33 bytes per second
        assert_eq!(slicer.byte_range(1.0, 1.0), 333..666);
    }

    #[test]
    fn test_end_is_clamped_to_size() {
        let slicer = ByteRangeSlicer::new(5_000, 10.0).unwrap();
        assert_eq!(slicer.byte_range(8.0, 60.0), 4_000..5_000);
    }

    #[test]
    fn test_slice_returns_subrange() {
        let audio: Vec<u8> = (0..=255).collect();
        let slicer = ByteRangeSlicer::new(audio.len(), 256.0).unwrap();

        let slice = slicer.slice(&audio, 10.0, 5.0).unwrap();
        assert_eq!(slice, &audio[10..15]);
    }

    #[test]
    fn test_slice_rejects_mismatched_buffer() {
        let slicer = ByteRangeSlicer::new(10, 1.0).unwrap();
        assert!(slicer.slice(&[0u8; 5], 0.0, 1.0).is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(ByteRangeSlicer::new(0, 10.0).is_err());
        assert!(ByteRangeSlicer::new(10, 0.0).is_err());
        assert!(ByteRangeSlicer::new(10, f64::INFINITY).is_err());
    }
}

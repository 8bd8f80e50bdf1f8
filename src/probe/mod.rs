use async_trait::async_trait;

use crate::{Result, TranscriptorError};

pub mod ffprobe;

pub use ffprobe::FfprobeDurationProbe;

/// Determines the playable duration of an in-memory audio asset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Total duration in seconds, or `DurationUnknown`
    async fn probe(&self, audio: &[u8]) -> Result<f64>;
}

/// Duration supplied by the caller (e.g. from feed metadata)
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration {
    seconds: f64,
}

impl FixedDuration {
    pub fn new(seconds: f64) -> Self {
        Self { seconds }
    }
}

#[async_trait]
impl DurationProbe for FixedDuration {
    async fn probe(&self, _audio: &[u8]) -> Result<f64> {
        if self.seconds.is_finite() && self.seconds > 0.0 {
            Ok(self.seconds)
        } else {
            Err(TranscriptorError::DurationUnknown(format!(
                "supplied duration {} is not positive",
                self.seconds
            ))
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_duration() {
        assert_eq!(tokio_test::block_on(FixedDuration::new(93.5).probe(&[])).unwrap(), 93.5);

        let err = tokio_test::block_on(FixedDuration::new(0.0).probe(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::DurationUnknown(_))
        ));
    }
}

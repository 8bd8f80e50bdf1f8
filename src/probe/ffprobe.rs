use anyhow::Context;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tokio::process::Command;

use super::DurationProbe;
use crate::{Result, TranscriptorError};

/// Reads the container duration with `ffprobe`
pub struct FfprobeDurationProbe {
    ffprobe_path: String,
    temp_dir: Option<PathBuf>,
}

impl FfprobeDurationProbe {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self {
            ffprobe_path: "ffprobe".to_string(),
            temp_dir,
        }
    }

    /// Stage the buffer on disk; ffprobe cannot seek on a pipe for every format.
    fn stage(&self, audio: &[u8]) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("podscribe_probe_");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create temporary file for probing")?;

        file.write_all(audio)
            .context("Failed to write audio for probing")?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn probe(&self, audio: &[u8]) -> Result<f64> {
        if audio.is_empty() {
            return Err(TranscriptorError::DurationUnknown("audio is empty".to_string()).into());
        }

        let staged = self.stage(audio)?;

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(staged.path())
            .output()
            .await
            .map_err(|e| TranscriptorError::DurationUnknown(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptorError::DurationUnknown(format!("ffprobe failed: {}", error.trim())).into());
        }

        let duration = parse_ffprobe_duration(&output.stdout).ok_or_else(|| {
            TranscriptorError::DurationUnknown("ffprobe reported no duration".to_string())
        })?;

        tracing::debug!("ffprobe duration: {:.2}s", duration);
        Ok(duration)
    }
}

/// Pull `format.duration` out of ffprobe's JSON output.
fn parse_ffprobe_duration(stdout: &[u8]) -> Option<f64> {
    let info: serde_json::Value = serde_json::from_slice(stdout).ok()?;

    info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| info["format"]["duration"].as_f64())
        .filter(|d| d.is_finite() && *d > 0.0)
}

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "podscribe",
    about = "Podcast Transcriptor - Transcribe long podcast episodes in overlapping chunks",
    version,
    long_about = "Transcribes podcast episodes that are too long for a single engine call. The audio is split into overlapping chunks, each chunk is transcribed with Gemini using the tail of the previous chunk as context, and the results are merged into one time-ordered transcript."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe an episode from a URL or local file
    Transcribe {
        /// Audio URL or file path to transcribe
        #[arg(value_name = "URL_OR_FILE")]
        source: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to app.default_output_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Include timestamps in text output (srt/vtt formats always include timestamps)
        #[arg(long)]
        timestamps: bool,

        /// Use detailed timestamps with milliseconds (implies --timestamps)
        #[arg(long)]
        detailed_timestamps: bool,

        /// Prefix text lines with the speaker label
        #[arg(long)]
        speakers: bool,

        /// Print lines as soon as each chunk is merged
        #[arg(long)]
        live: bool,

        /// Chunk length in seconds
        #[arg(long, value_name = "SECONDS")]
        chunk_duration: Option<f64>,

        /// Overlap between consecutive chunks in seconds
        #[arg(long, value_name = "SECONDS")]
        overlap: Option<f64>,

        /// Seconds into each overlap the earlier chunk is trusted
        #[arg(long, value_name = "SECONDS")]
        handover: Option<f64>,

        /// Audio duration in seconds (skips ffprobe)
        #[arg(long, value_name = "SECONDS")]
        duration: Option<f64>,

        /// Engine model
        #[arg(long)]
        model: Option<String>,

        /// Engine API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Save the fetched audio file
        #[arg(long)]
        save_audio: bool,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Chunking overrides taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkingOverrides {
    pub chunk_duration: Option<f64>,
    pub overlap: Option<f64>,
    pub handover: Option<f64>,
}

impl ChunkingOverrides {
    /// Apply the overrides to `config` and re-validate it
    pub fn apply(&self, config: &mut Config) -> crate::Result<()> {
        if let Some(chunk_duration) = self.chunk_duration {
            config.chunking.chunk_duration = chunk_duration;
        }
        if let Some(overlap) = self.overlap {
            config.chunking.overlap_duration = overlap;
        }
        if let Some(handover) = self.handover {
            config.chunking.handover_buffer = handover;
        }
        config.validate()
    }
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with timestamps
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
    /// CSV format
    Csv,
}

impl OutputFormat {
    /// Parse a format name as written in the config file
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptorError;

    #[test]
    fn test_parse_transcribe_args() {
        let cli = Cli::try_parse_from([
            "podscribe",
            "transcribe",
            "https://example.com/ep.mp3",
            "--format",
            "srt",
            "--overlap",
            "20",
            "--chunk-duration",
            "90",
        ])
        .unwrap();

        match cli.command {
            Commands::Transcribe {
                source,
                format,
                overlap,
                chunk_duration,
                handover,
                ..
            } => {
                assert_eq!(source, "https://example.com/ep.mp3");
                assert!(matches!(format, Some(OutputFormat::Srt)));
                assert_eq!(overlap, Some(20.0));
                assert_eq!(chunk_duration, Some(90.0));
                assert_eq!(handover, None);
            }
            _ => panic!("expected transcribe command"),
        }
    }

    #[test]
    fn test_format_names() {
        assert!(matches!(OutputFormat::from_name("VTT"), Some(OutputFormat::Vtt)));
        assert!(OutputFormat::from_name("docx").is_none());
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_overrides_are_validated() {
        let mut config = Config::default();
        let overrides = ChunkingOverrides {
            chunk_duration: Some(30.0),
            overlap: Some(30.0),
            handover: None,
        };

        let err = overrides.apply(&mut config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = Config::default();
        let overrides = ChunkingOverrides {
            chunk_duration: Some(120.0),
            overlap: Some(30.0),
            handover: Some(10.0),
        };

        overrides.apply(&mut config).unwrap();
        assert_eq!(config.chunking.chunk_duration, 120.0);
        assert_eq!(config.chunking.overlap_duration, 30.0);
        assert_eq!(config.chunking.handover_buffer, 10.0);
    }
}

use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::transcribe::TranscriptionResult;

pub mod formatters;
pub mod progress;

pub use formatters::*;
pub use progress::ConsoleProgress;

/// Render a transcription result in the requested format
pub fn render(result: &TranscriptionResult, format: &OutputFormat, options: FormatOptions) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(result, options),
        OutputFormat::Json => format_as_json(result)?,
        OutputFormat::Srt => format_as_srt(result),
        OutputFormat::Vtt => format_as_vtt(result),
        OutputFormat::Csv => format_as_csv(result)?,
    })
}

/// Save transcription result to file
pub async fn save_to_file(
    result: &TranscriptionResult,
    path: &Path,
    format: &OutputFormat,
    options: FormatOptions,
) -> Result<()> {
    let content = render(result, format, options)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcription result to console
pub fn print_to_console(
    result: &TranscriptionResult,
    format: &OutputFormat,
    options: FormatOptions,
) -> Result<()> {
    let content = render(result, format, options)?;
    println!("{}", content);
    Ok(())
}

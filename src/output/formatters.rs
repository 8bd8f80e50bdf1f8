use anyhow::Result;

use crate::transcribe::{CaptionLine, TranscriptionResult};

/// Marker printed for music lines
const MUSIC_MARKER: &str = "♪";

/// Presentation switches shared by the formatters
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub timestamps: bool,
    pub detailed_timestamps: bool,
    pub speakers: bool,
}

/// `hh:mm:ss`, or `hh:mm:ss.mmm` when detailed
pub fn format_timestamp(seconds: f64, detailed: bool) -> String {
    let (h, m, s, ms) = split_time(seconds);
    if detailed {
        format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
    } else {
        format!("{:02}:{:02}:{:02}", h, m, s)
    }
}

fn split_time(seconds: f64) -> (u64, u64, u64, u64) {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, ms)
}

fn srt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

fn vtt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Caption text with the music marker applied
fn display_text(line: &CaptionLine) -> String {
    match (line.is_music, line.text.is_empty()) {
        (true, true) => MUSIC_MARKER.to_string(),
        (true, false) => format!("{} {} {}", MUSIC_MARKER, line.text, MUSIC_MARKER),
        (false, _) => line.text.clone(),
    }
}

/// Lines worth rendering: speech with text, or any music
fn visible(line: &&CaptionLine) -> bool {
    line.is_music || !line.text.trim().is_empty()
}

/// Render one caption per line of text
pub fn format_lines_as_text(lines: &[CaptionLine], options: FormatOptions) -> String {
    let show_timestamps = options.timestamps || options.detailed_timestamps;

    lines
        .iter()
        .filter(visible)
        .map(|line| {
            let mut out = String::new();
            if show_timestamps {
                out.push_str(&format!(
                    "[{}] ",
                    format_timestamp(line.start, options.detailed_timestamps)
                ));
            }
            if options.speakers {
                if let Some(speaker) = &line.speaker {
                    out.push_str(&format!("{}: ", speaker));
                }
            }
            out.push_str(&display_text(line));
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_as_text(result: &TranscriptionResult, options: FormatOptions) -> String {
    if result.lines.is_empty() {
        return result.transcript.clone();
    }
    format_lines_as_text(&result.lines, options)
}

pub fn format_as_json(result: &TranscriptionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn format_lines_as_srt(lines: &[CaptionLine]) -> String {
    let mut out = String::new();

    for (i, line) in lines.iter().filter(visible).enumerate() {
        let text = match &line.speaker {
            Some(speaker) if !line.is_music => format!("{}: {}", speaker, line.text),
            _ => display_text(line),
        };

        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(line.start),
            srt_timestamp(line.end),
            text
        ));
    }

    out
}

pub fn format_as_srt(result: &TranscriptionResult) -> String {
    format_lines_as_srt(&result.lines)
}

pub fn format_lines_as_vtt(lines: &[CaptionLine]) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for line in lines.iter().filter(visible) {
        let text = match &line.speaker {
            Some(speaker) if !line.is_music => format!("<v {}>{}", speaker, line.text),
            _ => display_text(line),
        };

        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            vtt_timestamp(line.start),
            vtt_timestamp(line.end),
            text
        ));
    }

    out
}

pub fn format_as_vtt(result: &TranscriptionResult) -> String {
    format_lines_as_vtt(&result.lines)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn format_lines_as_csv(lines: &[CaptionLine]) -> String {
    let mut out = String::from("start,end,speaker,is_music,text\n");

    for line in lines {
        out.push_str(&format!(
            "{:.3},{:.3},{},{},{}\n",
            line.start,
            line.end,
            csv_field(line.speaker.as_deref().unwrap_or("")),
            line.is_music,
            csv_field(&line.text)
        ));
    }

    out
}

pub fn format_as_csv(result: &TranscriptionResult) -> Result<String> {
    Ok(format_lines_as_csv(&result.lines))
}

//! Parsing of engine responses into caption lines.
//!
//! Engines are asked for a bare JSON array but regularly wrap it in markdown
//! fences or surround it with prose. Parsing strips fences first, then falls back
//! to the widest `[...]` span before giving up.

use serde::Deserialize;

use super::CaptionLine;

/// Outcome of parsing one engine response
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Lines(Vec<CaptionLine>),
    /// No caption array could be recovered; carries the raw response
    Malformed(String),
}

/// Caption object as emitted by the engine
#[derive(Debug, Deserialize)]
struct RawCaption {
    start: Seconds,
    #[serde(default)]
    end: Option<Seconds>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default, rename = "isMusic", alias = "is_music")]
    is_music: Option<bool>,
}

/// Timestamps arrive as numbers, numeric strings or `mm:ss` strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<f64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => parse_clock(s),
        }
        .filter(|v| v.is_finite())
    }
}

/// Parse `"12.5"`, `"01:02.5"` or `"1:02:03"` into seconds.
fn parse_clock(value: &str) -> Option<f64> {
    let value = value.trim().trim_end_matches('s');
    if value.is_empty() {
        return None;
    }

    let mut total = 0.0;
    for part in value.split(':') {
        let part: f64 = part.trim().parse().ok()?;
        total = total * 60.0 + part;
    }
    Some(total)
}

impl RawCaption {
    fn into_line(self) -> Option<CaptionLine> {
        let start = self.start.value()?;
        let end = self
            .end
            .as_ref()
            .and_then(Seconds::value)
            .unwrap_or(start)
            .max(start);

        let speaker = self
            .speaker
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Some(CaptionLine {
            start,
            end,
            text: self.text.unwrap_or_default().trim().to_string(),
            speaker,
            is_music: self.is_music.unwrap_or(false),
        })
    }
}

/// Parse an engine response into caption lines.
pub fn parse_caption_response(raw: &str) -> ParsedResponse {
    if raw.trim().is_empty() {
        return ParsedResponse::Lines(Vec::new());
    }

    // A reply that was nothing but fences carries no array at all.
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return ParsedResponse::Malformed(raw.to_string());
    }

    if let Some(lines) = parse_caption_array(&cleaned) {
        return ParsedResponse::Lines(lines);
    }

    if let Some(candidate) = extract_bracketed_array(&cleaned) {
        if let Some(lines) = parse_caption_array(candidate) {
            tracing::debug!("Recovered caption array embedded in engine response");
            return ParsedResponse::Lines(lines);
        }
    }

    ParsedResponse::Malformed(raw.to_string())
}

/// Remove markdown fence markers (```` ```json ```` and ```` ``` ````) wherever they appear.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Longest `[...]` span: from the first `[` to the last `]`.
pub fn extract_bracketed_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_caption_array(json: &str) -> Option<Vec<CaptionLine>> {
    let raw: Vec<RawCaption> = serde_json::from_str(json).ok()?;
    let total = raw.len();

    let lines: Vec<CaptionLine> = raw.into_iter().filter_map(RawCaption::into_line).collect();
    if lines.len() < total {
        tracing::debug!("Dropped {} captions without usable timestamps", total - lines.len());
    }

    Some(lines)
}

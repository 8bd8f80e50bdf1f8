//! Merge engine: turns overlapping per-chunk captions into one transcript.
//!
//! Each chunk owns a window of absolute time. Inside every overlap the earlier
//! chunk stays authoritative for `handover_buffer` seconds past the later chunk's
//! start, after which the later chunk takes over. No text comparison is involved,
//! so the result depends only on timestamps and is recomputed from scratch on
//! every call.

use serde::{Deserialize, Serialize};

use crate::transcribe::{CaptionLine, ChunkResult};

/// Seconds into an overlap that the earlier chunk is still trusted
pub const DEFAULT_HANDOVER_BUFFER: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeSettings {
    pub handover_buffer: f64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            handover_buffer: DEFAULT_HANDOVER_BUFFER,
        }
    }
}

/// Absolute `[lower, upper)` start-time window admitted for the chunk at `position`.
pub fn admissible_window(chunks: &[ChunkResult], position: usize, settings: &MergeSettings) -> (f64, f64) {
    let lower = if position == 0 {
        0.0
    } else {
        chunks[position].start_time + settings.handover_buffer
    };

    let upper = match chunks.get(position + 1) {
        Some(next) => next.start_time + settings.handover_buffer,
        None => f64::INFINITY,
    };

    (lower, upper)
}

/// Merge the accumulated chunk results into absolute, non-duplicated lines.
///
/// Lines keep chunk order; within a chunk they are stable-sorted by start time.
pub fn merge_chunks(chunks: &[ChunkResult], settings: &MergeSettings) -> Vec<CaptionLine> {
    let mut merged = Vec::new();

    for (position, chunk) in chunks.iter().enumerate() {
        let (lower, upper) = admissible_window(chunks, position, settings);

        let mut kept: Vec<CaptionLine> = chunk
            .items
            .iter()
            .map(|line| line.shifted(chunk.start_time))
            .filter(|line| line.start >= lower && line.start < upper)
            .collect();

        kept.sort_by(|a, b| a.start.total_cmp(&b.start));

        tracing::trace!(
            "Chunk {} keeps {}/{} lines in [{:.2}, {:.2})",
            chunk.chunk_index,
            kept.len(),
            chunk.items.len(),
            lower,
            upper
        );

        merged.extend(kept);
    }

    merged
}

/// Space-joined text of the given lines
pub fn full_text(lines: &[CaptionLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(start: f64, end: f64, text: &str) -> CaptionLine {
        CaptionLine::new(start, end, text)
    }

    fn chunk(chunk_index: usize, start_time: f64, items: Vec<CaptionLine>) -> ChunkResult {
        ChunkResult {
            chunk_index,
            start_time,
            items,
        }
    }

    /// Lines every `spacing` seconds across `[0, length)`, chunk-relative.
    fn evenly_spaced(length: f64, spacing: f64, prefix: &str) -> Vec<CaptionLine> {
        let mut items = Vec::new();
        let mut t = 0.0;
        while t < length {
            items.push(line(t, t + spacing, &format!("{} {}", prefix, t)));
            t += spacing;
        }
        items
    }

    #[test]
    fn test_handover_at_fifty_seconds() {
        let chunks = vec![
            chunk(0, 0.0, vec![line(10.0, 12.0, "a"), line(49.0, 50.5, "b"), line(50.0, 52.0, "b-dup")]),
            chunk(1, 45.0, vec![line(4.0, 5.5, "b-again"), line(5.0, 7.0, "c"), line(20.0, 22.0, "d")]),
        ];

        assert_eq!(admissible_window(&chunks, 0, &MergeSettings::default()), (0.0, 50.0));
        assert_eq!(admissible_window(&chunks, 1, &MergeSettings::default()), (50.0, f64::INFINITY));

        let merged = merge_chunks(&chunks, &MergeSettings::default());
        let texts: Vec<&str> = merged.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);

        assert_eq!(merged[2].start, 50.0);
        assert_eq!(merged[2].end, 52.0);
        assert_eq!(merged[3].start, 65.0);
    }

    #[test]
    fn test_single_chunk_keeps_everything() {
        let items = vec![line(0.0, 1.0, "x"), line(30.0, 31.0, "y"), line(59.0, 60.0, "z")];
        let chunks = vec![chunk(0, 0.0, items.clone())];

        assert_eq!(admissible_window(&chunks, 0, &MergeSettings::default()), (0.0, f64::INFINITY));
        assert_eq!(merge_chunks(&chunks, &MergeSettings::default()), items);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let chunks = vec![
            chunk(0, 0.0, evenly_spaced(60.0, 2.5, "first")),
            chunk(1, 45.0, evenly_spaced(60.0, 2.5, "second")),
            chunk(2, 90.0, evenly_spaced(30.0, 2.5, "third")),
        ];

        let once = merge_chunks(&chunks, &MergeSettings::default());
        let twice = merge_chunks(&chunks, &MergeSettings::default());

        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_output_is_ordered_and_sources_do_not_overlap() {
        let chunks = vec![
            chunk(0, 0.0, evenly_spaced(60.0, 3.0, "0")),
            chunk(1, 45.0, evenly_spaced(60.0, 3.0, "1")),
            chunk(2, 90.0, evenly_spaced(60.0, 3.0, "2")),
            chunk(3, 135.0, evenly_spaced(25.0, 3.0, "3")),
        ];

        let merged = merge_chunks(&chunks, &MergeSettings::default());

        for pair in merged.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }

        // Lines from different chunks never share time.
        for pair in merged.windows(2) {
            let same_chunk = pair[0].text.split(' ').next() == pair[1].text.split(' ').next();
            if !same_chunk {
                assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_lines_within_chunk_are_sorted() {
        let chunks = vec![chunk(0, 0.0, vec![line(5.0, 6.0, "late"), line(1.0, 2.0, "early")])];
        let merged = merge_chunks(&chunks, &MergeSettings::default());
        assert_eq!(merged[0].text, "early");
        assert_eq!(merged[1].text, "late");
    }

    #[test]
    fn test_empty_chunk_leaves_gap() {
        let chunks = vec![
            chunk(0, 0.0, vec![line(10.0, 11.0, "a")]),
            chunk(1, 45.0, Vec::new()),
            chunk(2, 90.0, vec![line(10.0, 11.0, "c")]),
        ];

        let merged = merge_chunks(&chunks, &MergeSettings::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].start, 100.0);
    }

    #[test]
    fn test_last_chunk_is_unbounded_until_next_arrives() {
        let first = chunk(0, 0.0, vec![line(52.0, 54.0, "tail of first")]);
        let second = chunk(1, 45.0, vec![line(7.0, 9.0, "head of second")]);

        let partial = merge_chunks(std::slice::from_ref(&first), &MergeSettings::default());
        assert_eq!(partial.len(), 1);

        let complete = merge_chunks(&[first, second], &MergeSettings::default());
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].text, "head of second");
    }

    #[test]
    fn test_full_text_joins_trimmed_lines() {
        let lines = vec![line(0.0, 1.0, " Hello "), line(1.0, 2.0, ""), line(2.0, 3.0, "world")];
        assert_eq!(full_text(&lines), "Hello world");
    }
}

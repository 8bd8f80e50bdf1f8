use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use super::formatters::format_timestamp;
use crate::transcribe::{CaptionLine, PipelineState, ProgressSink};

/// Terminal progress for a transcription run
///
/// Shows a spinner with the pipeline state. In live mode, lines are printed
/// above the spinner once two consecutive snapshots agree on them, since the
/// tail of the newest chunk may still be cut by the next merge.
pub struct ConsoleProgress {
    spinner: Option<ProgressBar>,
    live: bool,
    printed: Mutex<LiveLines>,
}

#[derive(Default)]
struct LiveLines {
    previous: Vec<CaptionLine>,
    printed: usize,
}

impl ConsoleProgress {
    pub fn new(quiet: bool, live: bool) -> Self {
        let spinner = (!quiet).then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });

        Self {
            spinner,
            live,
            printed: Mutex::new(LiveLines::default()),
        }
    }

    /// Stop the spinner and flush any live lines still held back
    pub fn finish(&self, lines: &[CaptionLine]) {
        if self.live {
            if let Ok(mut live) = self.printed.lock() {
                let start = live.printed.min(lines.len());
                for line in &lines[start..] {
                    self.print_line(line);
                }
                live.printed = lines.len();
            }
        }

        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }

    fn print_line(&self, line: &CaptionLine) {
        let label = line
            .speaker
            .as_deref()
            .map(|speaker| format!("{}: ", style(speaker).bold()))
            .unwrap_or_default();
        let text = if line.is_music {
            style(format!("♪ {}", line.text)).italic().to_string()
        } else {
            line.text.clone()
        };
        let rendered = format!(
            "{} {}{}",
            style(format!("[{}]", format_timestamp(line.start, false))).dim(),
            label,
            text
        );

        match &self.spinner {
            Some(spinner) => spinner.println(rendered),
            None => eprintln!("{}", rendered),
        }
    }
}

/// Number of leading lines identical in both snapshots
fn stable_prefix(previous: &[CaptionLine], current: &[CaptionLine]) -> usize {
    previous
        .iter()
        .zip(current)
        .take_while(|(a, b)| a == b)
        .count()
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, lines: &[CaptionLine], _full_text: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{} lines transcribed", lines.len()));
        }

        if !self.live {
            return;
        }

        let Ok(mut live) = self.printed.lock() else {
            return;
        };

        let stable = stable_prefix(&live.previous, lines);
        if stable > live.printed {
            for line in &lines[live.printed..stable] {
                self.print_line(line);
            }
            live.printed = stable;
        }
        live.previous = lines.to_vec();
    }

    // Messages are already emitted through tracing; only mirror them on the spinner.
    fn on_log(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{} {}", style("•").cyan(), message));
        }
    }

    fn on_state(&self, state: PipelineState) {
        let Some(spinner) = &self.spinner else {
            return;
        };

        let message = match state {
            PipelineState::Idle => "Starting...".to_string(),
            PipelineState::Probing => "Reading audio duration...".to_string(),
            PipelineState::Slicing { chunk } => format!("Slicing chunk {}...", chunk + 1),
            PipelineState::Transcribing { chunk } => format!("Transcribing chunk {}...", chunk + 1),
            PipelineState::Merging { chunk } => format!("Merging chunk {}...", chunk + 1),
            PipelineState::Done => "Transcription complete".to_string(),
            PipelineState::Failed => "Transcription failed".to_string(),
        };
        spinner.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_prefix() {
        let a = CaptionLine::new(0.0, 2.0, "one");
        let b = CaptionLine::new(2.0, 4.0, "two");
        let c = CaptionLine::new(4.0, 6.0, "three");

        assert_eq!(stable_prefix(&[], &[a.clone()]), 0);
        assert_eq!(stable_prefix(&[a.clone(), b.clone()], &[a.clone(), c.clone()]), 1);
        assert_eq!(stable_prefix(&[a.clone(), b.clone()], &[a, b, c]), 2);
    }

    #[test]
    fn test_live_lines_wait_for_a_second_snapshot() {
        let progress = ConsoleProgress::new(true, true);
        let first = vec![CaptionLine::new(0.0, 2.0, "one"), CaptionLine::new(50.0, 52.0, "tail")];
        let second = vec![CaptionLine::new(0.0, 2.0, "one"), CaptionLine::new(49.0, 51.0, "replaced")];

        progress.on_progress(&first, "");
        assert_eq!(progress.printed.lock().unwrap().printed, 0);

        progress.on_progress(&second, "");
        assert_eq!(progress.printed.lock().unwrap().printed, 1);

        progress.finish(&second);
        assert_eq!(progress.printed.lock().unwrap().printed, 2);
    }
}

//! `ProgressSink` implementation that renders the run as a live bar in an
//! interactive terminal.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mirror_types::{OutcomeKind, ProgressEvent, ProgressSink};
use std::sync::Mutex;

pub struct IndicatifProgressSink {
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifProgressSink {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bar: Mutex::new(None),
        }
    }
}

impl Default for IndicatifProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for IndicatifProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Collecting { count } => {
                let bar = self.multi.add(ProgressBar::new(count as u64));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                        .unwrap()
                        .progress_chars("##-"),
                );
                *self.bar.lock().unwrap() = Some(bar);
            }
            ProgressEvent::InProgress { full_name } => {
                if let Some(bar) = self.bar.lock().unwrap().as_ref() {
                    bar.set_message(full_name);
                }
            }
            ProgressEvent::Outcome { full_name, kind, detail } => {
                if let Some(bar) = self.bar.lock().unwrap().as_ref() {
                    bar.inc(1);
                    let label = outcome_label(kind);
                    if detail.is_empty() {
                        bar.set_message(format!("{label} {full_name}"));
                    } else {
                        bar.set_message(format!("{label} {full_name} ({detail})"));
                    }
                }
            }
            ProgressEvent::Complete { error } => {
                if let Some(bar) = self.bar.lock().unwrap().take() {
                    match error {
                        Some(error) => bar.abandon_with_message(format!("{} {error}", style("✗").red())),
                        None => bar.finish_with_message(format!("{} done", style("✓").green())),
                    }
                }
            }
        }
    }
}

fn outcome_label(kind: OutcomeKind) -> console::StyledObject<&'static str> {
    match kind {
        OutcomeKind::Cloned => style("+").green(),
        OutcomeKind::Updated => style("~").cyan(),
        OutcomeKind::UpToDate => style("=").dim(),
        OutcomeKind::Skipped => style("-").dim(),
        OutcomeKind::Failed => style("✗").red(),
        OutcomeKind::Archived => style("?").yellow(),
    }
}

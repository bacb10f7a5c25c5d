//! Core types for the gitmirror sync engine.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: repository descriptors, run options, run results, and the
//! progress event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Identity and hints for one remote repository within one sync run.
///
/// Immutable for the lifetime of a run. `pushed_at` being absent forces a
/// network fetch for that repository, since the fast-skip path has nothing
/// to compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Short owner/org login, e.g. "octocat".
    pub owner: String,
    /// Short repository name, e.g. "hello-world".
    pub name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
    /// Default branch, if known.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Whether the remote repository is private.
    #[serde(default)]
    pub is_private: bool,
    /// Timestamp of the most recent push to any ref, in UTC.
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    /// Whether this repository is a fork. Informational only.
    #[serde(default)]
    pub is_fork: bool,
    /// The remote's own "archived" flag, distinct from this tool's
    /// locally-computed `Archived` outcome. Informational only; surfaced in
    /// verbose logs, never changes classification.
    #[serde(default)]
    pub is_archived_upstream: bool,
    /// Approximate repository size in kilobytes, if the platform reports
    /// one. Informational only; surfaced in verbose logs, never affects
    /// the worker pool's concurrency.
    #[serde(default)]
    pub size_kb: Option<u64>,
}

impl RepositoryDescriptor {
    /// The `owner/name` identity used throughout progress events and results.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Deterministic destination path for this repository under `target_root`.
    pub fn local_path(&self, target_root: &std::path::Path) -> PathBuf {
        target_root.join(&self.owner).join(&self.name)
    }
}

/// Frozen configuration for one sync run.
#[derive(Clone)]
pub struct SyncOptions {
    /// Root directory clones are mirrored under.
    pub target_root: PathBuf,
    /// Glob-style include patterns, evaluated only if non-empty.
    pub include_patterns: Vec<String>,
    /// Glob-style exclude patterns, evaluated before includes.
    pub exclude_patterns: Vec<String>,
    /// Whether private repositories are included in enumeration.
    pub include_private: bool,
    /// Suppress all mutation; report what would happen.
    pub dry_run: bool,
    /// Controls log emission only, never behavior.
    pub verbose: bool,
    /// Worker pool size, clamped to `[1, 8]` by the engine.
    pub concurrency: usize,
    /// Skip the post-run archive scan entirely.
    pub skip_archive_detection: bool,
    /// Optional receiver for progress events.
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
}

impl SyncOptions {
    /// Clamp `concurrency` into the `[1, 8]` range the engine honors.
    pub fn clamped_concurrency(&self) -> usize {
        self.concurrency.clamp(1, 8)
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("target_root", &self.target_root)
            .field("include_patterns", &self.include_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("include_private", &self.include_private)
            .field("dry_run", &self.dry_run)
            .field("verbose", &self.verbose)
            .field("concurrency", &self.concurrency)
            .field("skip_archive_detection", &self.skip_archive_detection)
            .field("progress_sink", &self.progress_sink.is_some())
            .finish()
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .clamp(1, 8);

        Self {
            target_root: PathBuf::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            include_private: false,
            dry_run: false,
            verbose: false,
            concurrency,
            skip_archive_detection: false,
            progress_sink: None,
        }
    }
}

/// The terminal classification assigned to one descriptor in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Cloned,
    Updated,
    UpToDate,
    Skipped,
    Failed,
    Archived,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeKind::Cloned => "cloned",
            OutcomeKind::Updated => "updated",
            OutcomeKind::UpToDate => "up-to-date",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Failed => "failed",
            OutcomeKind::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

/// Terminal summary of a sync run.
///
/// Insertion order is not guaranteed across concurrent workers, so every
/// collection is a set (or a map, for failures) rather than a `Vec`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub cloned: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub up_to_date: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    pub archived: BTreeSet<String>,
    /// full name -> error description
    pub failed: BTreeMap<String, String>,
}

impl SyncResult {
    /// Record a non-`Failed` outcome for `full_name`.
    pub fn record(&mut self, full_name: String, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Cloned => self.cloned.insert(full_name),
            OutcomeKind::Updated => self.updated.insert(full_name),
            OutcomeKind::UpToDate => self.up_to_date.insert(full_name),
            OutcomeKind::Skipped => self.skipped.insert(full_name),
            OutcomeKind::Archived => self.archived.insert(full_name),
            OutcomeKind::Failed => {
                panic!("record_failed must be used for Failed outcomes")
            }
        };
    }

    /// Record a `Failed` outcome with its error description.
    pub fn record_failed(&mut self, full_name: String, error: String) {
        self.failed.insert(full_name, error);
    }

    /// Total number of repositories classified so far (excluding `Archived`,
    /// which is computed separately by the archive scanner).
    pub fn processed_count(&self) -> usize {
        self.cloned.len()
            + self.updated.len()
            + self.up_to_date.len()
            + self.skipped.len()
            + self.failed.len()
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: SyncResult) {
        self.cloned.extend(other.cloned);
        self.updated.extend(other.updated);
        self.up_to_date.extend(other.up_to_date);
        self.skipped.extend(other.skipped);
        self.archived.extend(other.archived);
        self.failed.extend(other.failed);
    }
}

/// A discriminated progress record emitted to the sink during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// Enumeration has finished; `count` descriptors will be processed.
    Collecting { count: usize },
    /// A worker has picked up `full_name` and is about to act on it.
    InProgress { full_name: String },
    /// `full_name` reached a terminal classification.
    Outcome {
        full_name: String,
        kind: OutcomeKind,
        detail: String,
    },
    /// The run has finished; every descriptor produced an `Outcome` (or was
    /// classified `Skipped`). Always the last event on the stream.
    Complete { error: Option<String> },
}

/// The capability the engine emits progress events to.
///
/// Implementations are expected to be non-blocking from the engine's
/// perspective (buffer internally); the engine only suspends when its own
/// bounded channel feeding the sink is full.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// A `ProgressSink` that forwards every event to a `tracing` target, useful
/// as a sink when no interactive consumer is attached.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Collecting { count } => {
                tracing::info!(count, "collecting repositories");
            }
            ProgressEvent::InProgress { full_name } => {
                tracing::debug!(%full_name, "in progress");
            }
            ProgressEvent::Outcome {
                full_name,
                kind,
                detail,
            } => {
                if kind == OutcomeKind::Failed {
                    tracing::warn!(%full_name, %detail, "failed");
                } else {
                    tracing::debug!(%full_name, %kind, %detail, "outcome");
                }
            }
            ProgressEvent::Complete { error } => match error {
                Some(error) => tracing::error!(%error, "sync cancelled"),
                None => tracing::info!("sync complete"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_owner_and_name() {
        let d = RepositoryDescriptor {
            owner: "alice".into(),
            name: "tool".into(),
            clone_url: "https://example.com/alice/tool.git".into(),
            default_branch: None,
            is_private: false,
            pushed_at: None,
            is_fork: false,
            is_archived_upstream: false,
            size_kb: None,
        };
        assert_eq!(d.full_name(), "alice/tool");
        assert_eq!(
            d.local_path(std::path::Path::new("/tmp/s")),
            std::path::PathBuf::from("/tmp/s/alice/tool")
        );
    }

    #[test]
    fn concurrency_clamps_into_range() {
        let mut opts = SyncOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(opts.clamped_concurrency(), 1);
        opts.concurrency = 100;
        assert_eq!(opts.clamped_concurrency(), 8);
        opts.concurrency = 3;
        assert_eq!(opts.clamped_concurrency(), 3);
    }

    #[test]
    fn sync_result_record_and_merge() {
        let mut a = SyncResult::default();
        a.record("x/one".into(), OutcomeKind::Cloned);
        a.record_failed("x/two".into(), "boom".into());

        let mut b = SyncResult::default();
        b.record("x/three".into(), OutcomeKind::UpToDate);

        a.merge(b);
        assert_eq!(a.cloned.len(), 1);
        assert_eq!(a.up_to_date.len(), 1);
        assert_eq!(a.failed.len(), 1);
        assert_eq!(a.processed_count(), 3);
    }

    #[test]
    fn progress_event_round_trips_through_json() {
        let event = ProgressEvent::Outcome {
            full_name: "alice/tool".into(),
            kind: OutcomeKind::Updated,
            detail: String::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        match back {
            ProgressEvent::Outcome { full_name, kind, .. } => {
                assert_eq!(full_name, "alice/tool");
                assert_eq!(kind, OutcomeKind::Updated);
            }
            _ => panic!("unexpected variant"),
        }
    }
}

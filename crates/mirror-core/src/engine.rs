//! The orchestrator: enumerates repositories, dispatches them across a
//! bounded worker pool, and classifies each into a terminal outcome.

use crate::filter::Filter;
use crate::{archive, freshness};
use mirror_diagnostics::MirrorError;
use mirror_platform::PlatformClient;
use mirror_types::{OutcomeKind, ProgressEvent, RepositoryDescriptor, SyncOptions, SyncResult};
use mirror_vcs::VcsDriver;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Coordinates a single sync run: a snapshot of options, the VCS capability
/// and the platform capability, all immutable after construction.
pub struct SyncEngine {
    vcs: VcsDriver,
    platform: Arc<dyn PlatformClient>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(vcs: VcsDriver, platform: Arc<dyn PlatformClient>, options: SyncOptions) -> Self {
        Self { vcs, platform, options }
    }

    pub async fn sync_user(&self, username: &str, cancel: &CancellationToken) -> Result<SyncResult, MirrorError> {
        let descriptors = self
            .platform
            .list_user_repos(username, self.options.include_private)
            .await
            .map_err(|e| MirrorError::enumeration(e.to_string()))?;
        self.process(descriptors, cancel).await
    }

    pub async fn sync_org(&self, orgname: &str, cancel: &CancellationToken) -> Result<SyncResult, MirrorError> {
        let descriptors = self
            .platform
            .list_org_repos(orgname, self.options.include_private)
            .await
            .map_err(|e| MirrorError::enumeration(e.to_string()))?;
        self.process(descriptors, cancel).await
    }

    pub async fn sync_repo(&self, owner: &str, name: &str, cancel: &CancellationToken) -> Result<SyncResult, MirrorError> {
        let descriptor = self
            .platform
            .get_repository(owner, name)
            .await
            .map_err(|e| MirrorError::enumeration(e.to_string()))?;
        self.process(vec![descriptor], cancel).await
    }

    pub async fn sync_repo_with_data(&self, descriptor: RepositoryDescriptor, cancel: &CancellationToken) -> Result<SyncResult, MirrorError> {
        self.process(vec![descriptor], cancel).await
    }

    /// The per-run dispatch loop shared by every public entry point.
    ///
    /// Every `ProgressEvent` (including the terminal `Complete`) flows
    /// through a single bounded channel sized `4 * concurrency + 2`, then is
    /// forwarded to the configured sink by a dedicated task. This keeps a
    /// slow sink from stalling a worker's subprocess exit path, per the
    /// concurrency model's buffering requirement.
    async fn process(&self, descriptors: Vec<RepositoryDescriptor>, cancel: &CancellationToken) -> Result<SyncResult, MirrorError> {
        let filter = Filter::new(self.options.include_patterns.clone(), self.options.exclude_patterns.clone());
        let known: std::collections::BTreeSet<String> = descriptors.iter().map(|d| d.full_name()).collect();

        let capacity = 4 * self.options.clamped_concurrency() + 2;
        let (tx, mut rx) = mpsc::channel(capacity);
        let sink = self.options.progress_sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(sink) = &sink {
                    sink.emit(event);
                }
            }
        });

        Self::emit(&tx, ProgressEvent::Collecting { count: descriptors.len() }).await;

        let mut result = if self.options.concurrency <= 1 {
            self.process_sequentially(descriptors, &filter, cancel, &tx).await
        } else {
            self.process_concurrently(descriptors, &filter, cancel, &tx).await
        };

        if cancel.is_cancelled() {
            tracing::warn!(processed = result.processed_count(), "sync cancelled mid-run");
            Self::emit(&tx, ProgressEvent::Complete {
                error: Some("sync cancelled".to_string()),
            })
            .await;
            drop(tx);
            let _ = forwarder.await;
            return Err(MirrorError::Cancelled { partial: result });
        }

        if !self.options.skip_archive_detection {
            let archived = archive::scan(&self.options.target_root, &known);
            for full_name in archived {
                result.archived.insert(full_name);
            }
        }

        Self::emit(&tx, ProgressEvent::Complete { error: None }).await;
        drop(tx);
        let _ = forwarder.await;
        Ok(result)
    }

    async fn process_sequentially(
        &self,
        descriptors: Vec<RepositoryDescriptor>,
        filter: &Filter,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<ProgressEvent>,
    ) -> SyncResult {
        let mut result = SyncResult::default();
        for descriptor in descriptors {
            if cancel.is_cancelled() {
                break;
            }
            let (full_name, kind, detail) = self.process_one(descriptor, filter, cancel, tx).await;
            self.record(&mut result, full_name, kind, detail, tx).await;
        }
        result
    }

    async fn process_concurrently(
        &self,
        descriptors: Vec<RepositoryDescriptor>,
        filter: &Filter,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<ProgressEvent>,
    ) -> SyncResult {
        let permits = self.options.clamped_concurrency();
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut result = SyncResult::default();

        let mut pending = futures::stream::FuturesUnordered::new();
        for descriptor in descriptors {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            pending.push(async move {
                if cancel.is_cancelled() {
                    return (descriptor.full_name(), OutcomeKind::Skipped, "cancelled".to_string());
                }
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                self.process_one(descriptor, filter, &cancel, &tx).await
            });
        }

        use futures::StreamExt;
        while let Some((full_name, kind, detail)) = pending.next().await {
            self.record(&mut result, full_name, kind, detail, tx).await;
        }
        result
    }

    async fn record(&self, result: &mut SyncResult, full_name: String, kind: OutcomeKind, detail: String, tx: &mpsc::Sender<ProgressEvent>) {
        if kind == OutcomeKind::Failed {
            tracing::warn!(full_name = %full_name, detail = %detail, "repository sync failed");
            result.record_failed(full_name.clone(), detail.clone());
        } else {
            result.record(full_name.clone(), kind);
        }
        Self::emit(tx, ProgressEvent::Outcome { full_name, kind, detail }).await;
    }

    /// The per-descriptor processing contract: filter, fast-skip decision,
    /// clone-or-fetch, best-effort large-file pull.
    async fn process_one(
        &self,
        descriptor: RepositoryDescriptor,
        filter: &Filter,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<ProgressEvent>,
    ) -> (String, OutcomeKind, String) {
        let full_name = descriptor.full_name();

        if !filter.matches(&descriptor.name) {
            return (full_name, OutcomeKind::Skipped, "filtered".to_string());
        }

        if self.options.verbose {
            if descriptor.is_archived_upstream {
                tracing::info!(full_name = %full_name, "repository is archived upstream");
            }
            if let Some(size_kb) = descriptor.size_kb {
                tracing::debug!(full_name = %full_name, size_kb, "repository size hint");
            }
        }

        let local = descriptor.local_path(&self.options.target_root);

        if self.options.dry_run {
            let kind = if VcsDriver::is_clone(&local) {
                OutcomeKind::Updated
            } else {
                OutcomeKind::Cloned
            };
            return (full_name, kind, "dry-run".to_string());
        }

        Self::emit(tx, ProgressEvent::InProgress { full_name: full_name.clone() }).await;

        if VcsDriver::is_clone(&local) {
            let local_last_fetch = VcsDriver::last_fetch_time(&local);
            if freshness::up_to_date(descriptor.pushed_at, local_last_fetch) {
                return (full_name, OutcomeKind::UpToDate, String::new());
            }

            match self.vcs.fetch_all_prune(&local, cancel).await {
                Ok(()) => {
                    self.maybe_pull_large_files(&local, cancel).await;
                    (full_name, OutcomeKind::Updated, String::new())
                }
                Err(error) => (full_name, OutcomeKind::Failed, error.to_string()),
            }
        } else {
            match self.vcs.clone(&descriptor.clone_url, &local, cancel).await {
                Ok(()) => {
                    self.maybe_pull_large_files(&local, cancel).await;
                    (full_name, OutcomeKind::Cloned, String::new())
                }
                Err(error) => (full_name, OutcomeKind::Failed, error.to_string()),
            }
        }
    }

    async fn maybe_pull_large_files(&self, local: &std::path::Path, cancel: &CancellationToken) {
        if VcsDriver::uses_large_file_filter(local) {
            self.vcs.pull_large_files(local, cancel).await;
        }
    }

    /// Send one event on the bounded progress channel. The engine only
    /// suspends here if the channel is full, never on the sink itself.
    async fn emit(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
        let _ = tx.send(event).await;
    }
}

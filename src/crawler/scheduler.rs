//! Dispatch scheduler for file downloads
//!
//! This module handles:
//! - Fanning file downloads out onto tokio tasks without blocking the
//!   sequential page walk
//! - Bounding concurrent downloads with a semaphore
//! - Guarding destination paths against two tasks writing the same file
//! - Joining every submitted task before the crawl reports completion

use crate::crawler::materializer::{materialize, DestinationClaims, DownloadOutcome, DownloadTask};
use crate::session::Session;
use crate::state::TaskState;
use crate::MirrorError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use url::Url;

/// Outcome of one unit of work, with the URL it concerned
#[derive(Debug)]
pub struct TaskReport {
    pub url: Url,
    pub outcome: DownloadOutcome,
}

impl TaskReport {
    pub fn state(&self) -> TaskState {
        self.outcome.state()
    }
}

/// Dispatcher owns every in-flight download of a crawl
///
/// The dispatcher coordinates:
/// - Non-blocking submission from the page walk
/// - A global limit on downloads running at once
/// - The per-crawl destination claim set
/// - Failures recorded by the walk itself (unreachable links, broken containers)
pub struct Dispatcher {
    /// Shared authenticated session
    session: Arc<Session>,

    /// Global semaphore limiting concurrent downloads
    semaphore: Arc<Semaphore>,

    /// Destination paths taken by this crawl
    claims: Arc<DestinationClaims>,

    /// Submitted tasks, in submission order
    handles: Vec<(Url, JoinHandle<DownloadOutcome>)>,

    /// Failures recorded by the page walk
    recorded: Vec<TaskReport>,
}

impl Dispatcher {
    /// Creates a new dispatcher
    ///
    /// # Arguments
    ///
    /// * `session` - Session shared read-only by every task
    /// * `max_concurrent` - Downloads allowed to run at once (at least 1)
    pub fn new(session: Arc<Session>, max_concurrent: usize) -> Self {
        Self {
            session,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            claims: Arc::new(DestinationClaims::default()),
            handles: Vec::new(),
            recorded: Vec::new(),
        }
    }

    /// Submits a download; returns immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, task: DownloadTask) {
        let session = Arc::clone(&self.session);
        let semaphore = Arc::clone(&self.semaphore);
        let claims = Arc::clone(&self.claims);
        let url = task.url.clone();

        tracing::trace!("[{}] {}", TaskState::Pending, url);

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits
            let _permit = semaphore.acquire_owned().await.ok();
            tracing::trace!("[{}] {}", TaskState::Running, task.url);

            let outcome = materialize(&session, &task, &claims).await;
            log_outcome(&task, &outcome);
            outcome
        });

        self.handles.push((url, handle));
    }

    /// Records a failure that happened before a task could be submitted
    pub fn record_failure(&mut self, url: Url, error: MirrorError) {
        tracing::warn!("Failed to process {}: {}", url, error);
        self.recorded.push(TaskReport {
            url,
            outcome: DownloadOutcome::Failed(error),
        });
    }

    /// Number of tasks submitted so far
    pub fn submitted(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every submitted task and returns all reports
    ///
    /// Recorded failures come first, then task outcomes in submission order.
    pub async fn join_all(self) -> Vec<TaskReport> {
        let mut reports = self.recorded;
        reports.reserve(self.handles.len());

        for (url, handle) in self.handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Download task for {} did not complete: {}", url, e);
                    DownloadOutcome::Failed(MirrorError::TaskPanicked {
                        url: url.to_string(),
                    })
                }
            };
            debug_assert!(outcome.state().is_terminal());
            reports.push(TaskReport { url, outcome });
        }

        reports
    }
}

/// Logs a terminal outcome exactly once
fn log_outcome(task: &DownloadTask, outcome: &DownloadOutcome) {
    match outcome {
        DownloadOutcome::Saved { path, .. } if task.filter.dry_run => {
            tracing::info!("Would download file: {}", path.display());
        }
        DownloadOutcome::Saved { path, bytes } => {
            tracing::info!("Downloaded file: {} ({} bytes)", path.display(), bytes);
        }
        DownloadOutcome::Skipped(reason) => {
            tracing::info!("Skipping {} ({})", task.url, reason);
        }
        DownloadOutcome::Failed(error) => {
            tracing::warn!("Failed to download {}: {}", task.url, error);
        }
    }
}

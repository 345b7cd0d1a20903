//! File materialization
//!
//! Turns a file link into a file on disk:
//! 1. HEAD the link without following redirects
//! 2. Name the file after the `Location` target, or after the URL itself
//! 3. Apply the extension allowlist
//! 4. GET the body and write it, honouring dry-run and overwrite
//!
//! Within one crawl each destination path is written at most once.
//!
//! Every failure is folded into [`DownloadOutcome::Failed`] so one broken
//! link never affects its siblings.

use crate::config::normalize_extension;
use crate::crawler::fetcher::{head, send_following};
use crate::session::Session;
use crate::state::TaskState;
use crate::url::{extension_of, file_name_from_location, file_name_from_url, sanitize_component};
use crate::MirrorError;
use bytes::Bytes;
use reqwest::header::LOCATION;
use reqwest::Method;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Process-wide download policy, read-only for the duration of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    /// Normalised extensions (".pdf"); empty accepts everything
    pub extensions: HashSet<String>,
    pub dry_run: bool,
    pub overwrite: bool,
}

impl FilterSettings {
    /// Builds settings from raw allowlist entries such as `pdf` or `.PDF`
    ///
    /// Entries that cannot name an extension are ignored.
    pub fn new<I, S>(extensions: I, dry_run: bool, overwrite: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .filter_map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
            dry_run,
            overwrite,
        }
    }

    /// Settings that accept every file and write for real
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns true if the allowlist lets `file_name` through
    pub fn accepts(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        extension_of(file_name).is_some_and(|ext| self.extensions.contains(&ext))
    }
}

/// One file to fetch; immutable once submitted
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: Url,
    pub dest_dir: PathBuf,
    pub filter: Arc<FilterSettings>,
}

impl DownloadTask {
    pub fn new(url: Url, dest_dir: impl Into<PathBuf>, filter: Arc<FilterSettings>) -> Self {
        Self {
            url,
            dest_dir: dest_dir.into(),
            filter,
        }
    }
}

/// Why a file was deliberately not written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The extension is not on the allowlist
    ExtensionFiltered { file_name: String },
    /// The destination exists and overwrite is off
    AlreadyExists { path: PathBuf },
    /// Another task of this crawl already claimed the destination
    DuplicateDestination { path: PathBuf },
}

impl SkipReason {
    /// Short label used for grouping in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtensionFiltered { .. } => "extension filtered",
            Self::AlreadyExists { .. } => "already exists",
            Self::DuplicateDestination { .. } => "duplicate destination",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtensionFiltered { file_name } => write!(f, "{}: {}", self.label(), file_name),
            Self::AlreadyExists { path } | Self::DuplicateDestination { path } => {
                write!(f, "{}: {}", self.label(), path.display())
            }
        }
    }
}

/// Terminal result of a download task
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Written to `path`; `bytes` is zero under dry-run
    Saved { path: PathBuf, bytes: u64 },
    Skipped(SkipReason),
    Failed(MirrorError),
}

impl DownloadOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            Self::Saved { .. } => TaskState::Saved,
            Self::Skipped(_) => TaskState::Skipped,
            Self::Failed(_) => TaskState::Failed,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Destination paths already taken during one crawl
///
/// Two links can resolve to the same file name in the same directory. A
/// task claims the path once it holds the file's bytes; later tasks for
/// that path are skipped. A claim is given back if the write fails.
#[derive(Debug, Default)]
pub struct DestinationClaims {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DestinationClaims {
    /// Returns true if `path` was free and is now owned by the caller
    pub fn claim(&self, path: &Path) -> bool {
        match self.claimed.lock() {
            Ok(mut claimed) => claimed.insert(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().insert(path.to_path_buf()),
        }
    }

    /// Gives up a claim so another task may write `path`
    pub fn release(&self, path: &Path) {
        match self.claimed.lock() {
            Ok(mut claimed) => claimed.remove(path),
            Err(poisoned) => poisoned.into_inner().remove(path),
        };
    }
}

/// Downloads one file
///
/// # Arguments
///
/// * `session` - The shared authenticated session
/// * `task` - What to fetch and where to put it
/// * `claims` - Destination paths already taken in this crawl
///
/// # Returns
///
/// The terminal outcome; errors are reported as `Failed`, never propagated
pub async fn materialize(
    session: &Session,
    task: &DownloadTask,
    claims: &DestinationClaims,
) -> DownloadOutcome {
    match try_materialize(session, task, claims).await {
        Ok(outcome) => outcome,
        Err(e) => DownloadOutcome::Failed(e),
    }
}

async fn try_materialize(
    session: &Session,
    task: &DownloadTask,
    claims: &DestinationClaims,
) -> Result<DownloadOutcome, MirrorError> {
    let file_name = resolve_file_name(session, &task.url).await?;

    if !task.filter.accepts(&file_name) {
        return Ok(DownloadOutcome::Skipped(SkipReason::ExtensionFiltered {
            file_name,
        }));
    }

    let local_name =
        sanitize_component(&file_name).ok_or_else(|| MirrorError::InvalidFileName {
            url: task.url.to_string(),
        })?;
    let path = task.dest_dir.join(local_name);

    if task.filter.dry_run {
        if !claims.claim(&path) {
            return Ok(DownloadOutcome::Skipped(SkipReason::DuplicateDestination {
                path,
            }));
        }
        return Ok(DownloadOutcome::Saved { path, bytes: 0 });
    }

    // A failed fetch never holds a claim, so another source can still provide the file
    let body = download_body(session, &task.url).await?;

    if !claims.claim(&path) {
        return Ok(DownloadOutcome::Skipped(SkipReason::DuplicateDestination {
            path,
        }));
    }

    if !task.filter.overwrite && tokio::fs::metadata(&path).await.is_ok() {
        return Ok(DownloadOutcome::Skipped(SkipReason::AlreadyExists { path }));
    }

    if let Err(e) = write_file(&task.dest_dir, &path, &body).await {
        claims.release(&path);
        return Err(e);
    }

    Ok(DownloadOutcome::Saved {
        path,
        bytes: body.len() as u64,
    })
}

async fn write_file(dest_dir: &Path, path: &Path, body: &Bytes) -> Result<(), MirrorError> {
    // Idempotent: siblings may be creating the same directory right now
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| MirrorError::io(dest_dir, e))?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| MirrorError::io(path, e))
}

/// Works out the decoded file name behind a link with a single HEAD request
pub async fn resolve_file_name(session: &Session, url: &Url) -> Result<String, MirrorError> {
    let response = head(session, url).await?;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        return Err(MirrorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let from_location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(|location| file_name_from_location(location, url));

    let file_name = match from_location {
        Some(name) => name,
        None => file_name_from_url(response.url()),
    };

    file_name.ok_or_else(|| MirrorError::InvalidFileName {
        url: url.to_string(),
    })
}

async fn download_body(session: &Session, url: &Url) -> Result<Bytes, MirrorError> {
    let (final_url, response) = send_following(session, Method::GET, url).await?;
    let status = response.status();

    if !status.is_success() {
        return Err(MirrorError::Status {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .bytes()
        .await
        .map_err(|e| MirrorError::http(final_url.as_str(), e))
}

//! Crawl coordinator - course walk orchestration
//!
//! This module contains the sequential walk over course pages:
//! - Fetching a course landing page and checking it exists
//! - Probing and classifying each resource link
//! - Expanding folder and assignment containers
//! - Handing file links to the dispatcher
//! - The optional force pass over every anchor
//!
//! Only the downloads run concurrently; the walk itself is strictly
//! sequential because each step depends on the page fetched before it.

use crate::config::Config;
use crate::crawler::classifier::{classify, ResourceKind};
use crate::crawler::expander::{expand, ChildSelector};
use crate::crawler::fetcher::{fetch_page, probe};
use crate::crawler::materializer::{DownloadTask, FilterSettings};
use crate::crawler::parser::{parse_course_page, LinkRef};
use crate::crawler::scheduler::{Dispatcher, TaskReport};
use crate::session::{is_login_url, Session};
use crate::url::decode_component;
use crate::MirrorError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Titles the portal uses for its error page, in English and German
pub const ERROR_TITLES: [&str; 2] = ["Error", "Fehler"];

/// A course that was found on the portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseTarget {
    pub id: String,
    pub title: String,
}

/// Result of walking one course
#[derive(Debug)]
pub struct CourseReport {
    pub course_id: String,
    pub result: Result<CourseTarget, MirrorError>,
}

/// Everything a finished crawl observed
#[derive(Debug)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub courses: Vec<CourseReport>,
    pub tasks: Vec<TaskReport>,
}

/// Main crawler structure
///
/// Holds the session and the read-only settings of one invocation.
#[derive(Debug, Clone)]
pub struct Crawler {
    session: Arc<Session>,
    filter: Arc<FilterSettings>,
    output_dir: PathBuf,
    force: bool,
    max_concurrent: usize,
}

impl Crawler {
    /// Creates a new crawler
    ///
    /// # Arguments
    ///
    /// * `session` - Authenticated session, shared with every download
    /// * `filter` - Extension allowlist, dry-run and overwrite policy
    /// * `output_dir` - Root of the local mirror
    pub fn new(session: Arc<Session>, filter: FilterSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            filter: Arc::new(filter),
            output_dir: output_dir.into(),
            force: false,
            max_concurrent: 8,
        }
    }

    /// Creates a crawler from the download section of the configuration
    pub fn from_config(session: Arc<Session>, config: &Config) -> Self {
        let download = &config.download;
        let filter = FilterSettings::new(&download.extensions, download.dry_run, download.overwrite);
        Self::new(session, filter, &download.output_dir)
            .with_force(download.force)
            .with_max_concurrent(download.max_concurrent_downloads as usize)
    }

    /// Enables the fallback pass over every anchor
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn filter(&self) -> &FilterSettings {
        &self.filter
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs the crawl over a list of courses
    ///
    /// Courses are walked one after another while their downloads run in
    /// the background. A missing course is reported and skipped; an
    /// authentication failure stops the walk. Either way every submitted
    /// download is awaited before returning.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - All courses were walked and all downloads finished
    /// * `Err(MirrorError)` - A fatal error aborted the run
    pub async fn run(&self, course_ids: &[String]) -> Result<CrawlReport, MirrorError> {
        let started_at = Utc::now();
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.session), self.max_concurrent);
        let mut courses = Vec::with_capacity(course_ids.len());

        for course_id in course_ids {
            match download_course(self, course_id, &mut dispatcher).await {
                Ok(target) => {
                    tracing::info!("Walked course {}: {}", target.id, target.title);
                    courses.push(CourseReport {
                        course_id: course_id.clone(),
                        result: Ok(target),
                    });
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Aborting crawl at course {}: {}", course_id, e);
                    dispatcher.join_all().await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Course {}: {}", course_id, e);
                    courses.push(CourseReport {
                        course_id: course_id.clone(),
                        result: Err(e),
                    });
                }
            }
        }

        tracing::info!(
            "Waiting for {} downloads to finish",
            dispatcher.submitted()
        );
        let tasks = dispatcher.join_all().await;

        Ok(CrawlReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.filter.dry_run,
            courses,
            tasks,
        })
    }

    fn file_task(&self, url: Url, dest_dir: &Path) -> DownloadTask {
        DownloadTask::new(url, dest_dir, Arc::clone(&self.filter))
    }

    /// Probes, classifies and dispatches one top-level link
    async fn dispatch_link(&self, link: LinkRef, dispatcher: &mut Dispatcher) {
        let link = match probe(&self.session, &link.href).await {
            Ok(resolved) => link.with_resolved(resolved),
            Err(e) => {
                dispatcher.record_failure(link.href, e);
                return;
            }
        };

        let kind = classify(link.resolved.as_str());
        tracing::debug!("{} -> {} ({})", link.href, link.resolved, kind);

        match kind {
            kind if kind.is_direct_download() => {
                dispatcher.submit(self.file_task(link.href, &self.output_dir));
            }
            ResourceKind::Folder => {
                self.expand_container(&link, ChildSelector::Folder, dispatcher)
                    .await;
            }
            ResourceKind::Assignment => {
                self.expand_container(&link, ChildSelector::Assignment, dispatcher)
                    .await;
            }
            _ => {
                tracing::debug!("Ignoring unclassified link {}", link.resolved);
            }
        }
    }

    /// Expands a container and dispatches its children
    ///
    /// Children are always dispatched as files, never expanded again.
    async fn expand_container(
        &self,
        link: &LinkRef,
        selector: ChildSelector,
        dispatcher: &mut Dispatcher,
    ) {
        match expand(
            &self.session,
            link,
            selector,
            &self.output_dir,
            self.filter.dry_run,
        )
        .await
        {
            Ok(container) => {
                for child in container.children {
                    // Every-anchor pages also list navigation such as the logout link
                    if selector == ChildSelector::AnyAnchor && !self.may_follow(&child.href) {
                        tracing::debug!("Force mode: not following {}", child.href);
                        continue;
                    }
                    dispatcher.submit(self.file_task(child.href, &container.dir));
                }
            }
            Err(e) => dispatcher.record_failure(link.resolved.clone(), e),
        }
    }

    /// Force pass: treats an arbitrary anchor as a container
    ///
    /// Links that cannot be resolved are skipped silently. Links off the
    /// portal and logout links are never followed, here or on the expanded page.
    async fn force_link(&self, link: LinkRef, dispatcher: &mut Dispatcher) {
        if !self.may_follow(&link.href) {
            tracing::debug!("Force mode: not following {}", link.href);
            return;
        }

        let link = match probe(&self.session, &link.href).await {
            Ok(resolved) => link.with_resolved(resolved),
            Err(e) => {
                tracing::debug!("Force mode: skipping {}: {}", link.href, e);
                return;
            }
        };

        if classify(link.resolved.as_str()) == ResourceKind::File {
            dispatcher.submit(self.file_task(link.href, &self.output_dir));
            return;
        }

        self.expand_container(&link, ChildSelector::AnyAnchor, dispatcher)
            .await;
    }

    /// Returns true for portal links that are safe to request with the session
    fn may_follow(&self, url: &Url) -> bool {
        self.is_portal_link(url) && !is_logout_url(url)
    }

    fn is_portal_link(&self, url: &Url) -> bool {
        url.host_str() == self.session.base_url().host_str()
            && url.port_or_known_default() == self.session.base_url().port_or_known_default()
    }
}

/// Walks one course and submits its downloads
///
/// # Arguments
///
/// * `crawler` - Session and settings of this invocation
/// * `course_id` - The course identifier from the command line
/// * `dispatcher` - Receives every file download
///
/// # Returns
///
/// * `Ok(CourseTarget)` - The course was found and walked; downloads may
///   still be running
/// * `Err(MirrorError::CourseNotFound)` - The portal served its error page;
///   nothing was created on disk
/// * `Err(MirrorError::Authentication)` - The session is no longer valid
pub async fn download_course(
    crawler: &Crawler,
    course_id: &str,
    dispatcher: &mut Dispatcher,
) -> Result<CourseTarget, MirrorError> {
    let course_url = crawler.session.course_url(course_id)?;
    let page = fetch_page(&crawler.session, &course_url).await?;

    if is_login_url(&page.final_url) {
        return Err(MirrorError::Authentication {
            reason: format!("redirected to the login page while opening course {}", course_id),
        });
    }

    let parsed = parse_course_page(&page.body, &page.final_url).map_err(|message| {
        MirrorError::HtmlParse {
            url: page.final_url.to_string(),
            message,
        }
    })?;

    let title = parsed
        .title
        .as_deref()
        .map(decode_component)
        .ok_or_else(|| MirrorError::HtmlParse {
            url: page.final_url.to_string(),
            message: "course page has no title".to_string(),
        })?;

    if ERROR_TITLES.contains(&title.as_str()) {
        return Err(MirrorError::CourseNotFound {
            course: course_id.to_string(),
        });
    }

    tracing::info!("Downloading course {}: {}", course_id, title);

    let handled: HashSet<Url> = parsed.links.iter().map(|link| link.href.clone()).collect();
    for link in parsed.links {
        crawler.dispatch_link(link, dispatcher).await;
    }

    if crawler.force {
        let remaining: Vec<LinkRef> = parsed
            .anchors
            .into_iter()
            .filter(|link| !handled.contains(&link.href))
            .collect();
        tracing::info!("Force mode: trying {} more anchors", remaining.len());
        for link in remaining {
            crawler.force_link(link, dispatcher).await;
        }
    }

    Ok(CourseTarget {
        id: course_id.to_string(),
        title,
    })
}

fn is_logout_url(url: &Url) -> bool {
    url.path().contains("logout")
}

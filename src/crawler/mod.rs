//! Crawler module for walking courses and downloading their files
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling
//! - HTML parsing and link extraction
//! - Link classification and container expansion
//! - File materialization and concurrent dispatch
//! - Overall crawl coordination

mod classifier;
mod coordinator;
mod expander;
mod fetcher;
mod materializer;
mod parser;
mod scheduler;

pub use classifier::{classify, ResourceKind};
pub use coordinator::{download_course, CourseReport, CourseTarget, CrawlReport, Crawler, ERROR_TITLES};
pub use expander::{container_dir, expand, ChildSelector, Container};
pub use fetcher::{
    build_http_client, fetch_page, head, probe, redirect_target, send_following, FetchedPage,
    MAX_REDIRECTS,
};
pub use materializer::{
    materialize, resolve_file_name, DestinationClaims, DownloadOutcome, DownloadTask,
    FilterSettings, SkipReason,
};
pub use parser::{
    extract_links, parse_course_page, CoursePage, LinkRef, ANY_ANCHOR_SELECTOR,
    COURSE_LINK_SELECTOR,
};
pub use scheduler::{Dispatcher, TaskReport};

use crate::config::Config;
use crate::session::Session;
use crate::MirrorError;
use std::sync::Arc;

/// Runs a complete crawl over `course_ids`
///
/// This is the main entry point for a mirror run. It will:
/// 1. Build a crawler from the download settings
/// 2. Walk each course in order, dispatching file downloads
/// 3. Wait for every download to finish
///
/// # Arguments
///
/// * `session` - An authenticated, verified session
/// * `config` - The validated configuration
/// * `course_ids` - Courses to mirror, in order
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Every course was attempted
/// * `Err(MirrorError)` - The session stopped working mid-run
pub async fn crawl(
    session: Arc<Session>,
    config: &Config,
    course_ids: &[String],
) -> Result<CrawlReport, MirrorError> {
    Crawler::from_config(session, config).run(course_ids).await
}

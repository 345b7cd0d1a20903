//! Container expansion
//!
//! Folder and assignment pages hold further file links. Expanding one
//! creates a local subdirectory named after the container and returns the
//! child links found on its page. Children are never expanded themselves.

use crate::crawler::fetcher::fetch_page;
use crate::crawler::parser::{extract_links, LinkRef, ANY_ANCHOR_SELECTOR};
use crate::session::Session;
use crate::url::{decode_component, sanitize_component};
use crate::MirrorError;
use std::path::{Path, PathBuf};

/// Which links on a container page are its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSelector {
    /// File listing of a folder page
    Folder,
    /// Submitted attachments on an assignment page
    Assignment,
    /// Every anchor, used by force mode
    AnyAnchor,
}

impl ChildSelector {
    pub fn css(&self) -> &'static str {
        match self {
            Self::Folder => ".fp-filename-icon > a",
            Self::Assignment => ".fileuploadsubmission > a",
            Self::AnyAnchor => ANY_ANCHOR_SELECTOR,
        }
    }
}

/// An expanded container
#[derive(Debug, Clone)]
pub struct Container {
    /// Local directory the children belong in
    pub dir: PathBuf,

    /// File links found on the container page
    pub children: Vec<LinkRef>,
}

/// Local directory for a container's children
///
/// Named after the decoded display name; falls back to `dest_root` when the
/// link has no usable name.
pub fn container_dir(container: &LinkRef, dest_root: &Path) -> PathBuf {
    container
        .name
        .as_deref()
        .map(decode_component)
        .and_then(|name| sanitize_component(&name))
        .map(|name| dest_root.join(name))
        .unwrap_or_else(|| dest_root.to_path_buf())
}

/// Expands a container into its child links
///
/// # Arguments
///
/// * `session` - The shared authenticated session
/// * `container` - The probed container link
/// * `selector` - How to find children on the container page
/// * `dest_root` - Directory the container's own directory is created in
/// * `dry_run` - Skip directory creation
///
/// # Returns
///
/// * `Ok(Container)` - The subdirectory and every child link
/// * `Err(MirrorError)` - Directory creation, fetch, or parse failed; no
///   partial child list is returned
pub async fn expand(
    session: &Session,
    container: &LinkRef,
    selector: ChildSelector,
    dest_root: &Path,
    dry_run: bool,
) -> Result<Container, MirrorError> {
    let dir = container_dir(container, dest_root);

    if !dry_run {
        tracing::debug!("Creating subfolder: {}", dir.display());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MirrorError::io(&dir, e))?;
    }

    tracing::debug!("Downloading page: {} ({:?})", container.resolved, selector);
    let page = fetch_page(session, &container.resolved).await?;
    let children = extract_links(&page.body, &page.final_url, selector.css()).map_err(|message| {
        MirrorError::HtmlParse {
            url: page.final_url.to_string(),
            message,
        }
    })?;

    tracing::debug!(
        "Found {} children in {}",
        children.len(),
        container.resolved
    );

    Ok(Container { dir, children })
}

//! HTML parser for extracting links and metadata
//!
//! This module handles parsing portal pages to extract:
//! - The page title (used to detect missing courses)
//! - Resource links from the course page's known link positions
//! - Child links of folder and assignment pages
//!
//! Parsing is synchronous and returns owned data, so no parsed document is
//! ever held across an await point.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Link positions on a course page that point at course modules
///
/// - `.aalink`: activity links in the course sections
/// - `.fp-filename-icon > a`, `a.fp-filename-icon`: folders shown inline
/// - `div.summary > div.no-overflow > p > a`: links typed into section summaries
pub const COURSE_LINK_SELECTOR: &str =
    ".aalink, .fp-filename-icon > a, a.fp-filename-icon, div.summary > div.no-overflow > p > a";

/// Every anchor, used by force mode
pub const ANY_ANCHOR_SELECTOR: &str = "a";

/// A discovered hyperlink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Text of the link, when the markup carries one
    pub name: Option<String>,

    /// Absolute URL from the `href` attribute
    pub href: Url,

    /// Where `href` ends up after redirects; equals `href` until probed
    pub resolved: Url,
}

impl LinkRef {
    pub fn new(href: Url, name: Option<String>) -> Self {
        Self {
            name,
            resolved: href.clone(),
            href,
        }
    }

    /// Returns the same link with its probed destination filled in
    pub fn with_resolved(self, resolved: Url) -> Self {
        Self { resolved, ..self }
    }
}

/// Extracted information from a course landing page
#[derive(Debug, Clone)]
pub struct CoursePage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Links found at the known course-module positions
    pub links: Vec<LinkRef>,

    /// Every anchor on the page, for force mode
    pub anchors: Vec<LinkRef>,
}

/// Parses a course landing page
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was served from
///
/// # Example
///
/// ```
/// use moodle_mirror::crawler::parse_course_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Algorithms</title></head><body>
///     <a class="aalink" href="/mod/resource/view.php?id=7"><span>Slides</span></a>
/// </body></html>"#;
/// let base = Url::parse("https://moodle.example.edu/course/view.php?id=1").unwrap();
/// let page = parse_course_page(html, &base).unwrap();
/// assert_eq!(page.title.as_deref(), Some("Algorithms"));
/// assert_eq!(page.links[0].name.as_deref(), Some("Slides"));
/// ```
pub fn parse_course_page(html: &str, base_url: &Url) -> Result<CoursePage, String> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let links = select_links(&document, COURSE_LINK_SELECTOR, base_url)?;
    let anchors = select_links(&document, ANY_ANCHOR_SELECTOR, base_url)?;

    Ok(CoursePage {
        title,
        links,
        anchors,
    })
}

/// Extracts the links matched by `selector` from a page
pub fn extract_links(html: &str, base_url: &Url, selector: &str) -> Result<Vec<LinkRef>, String> {
    let document = Html::parse_document(html);
    select_links(&document, selector, base_url)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Selects link elements, resolves their hrefs and drops duplicates
///
/// Document order is preserved; the first occurrence of a URL wins.
fn select_links(document: &Html, selector: &str, base_url: &Url) -> Result<Vec<LinkRef>, String> {
    let selector =
        Selector::parse(selector).map_err(|e| format!("invalid selector '{}': {:?}", selector, e))?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if seen.insert(url.clone()) {
            links.push(LinkRef::new(url, display_name(element)));
        }
    }

    Ok(links)
}

/// Returns the first text of the link's first `<span>` child
///
/// Activity links look like
/// `<a><span class="instancename">Slides<span class="accesshide"> File</span></span></a>`;
/// only the leading text is the name.
fn display_name(element: ElementRef<'_>) -> Option<String> {
    let span = element
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "span")?;

    span.children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => Some(absolute_url),
        _ => None,
    }
}

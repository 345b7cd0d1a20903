//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the crawl client (redirects disabled, no cookie store)
//! - Following redirects manually, with loop and hop-limit detection
//! - HEAD probes that resolve a link to its final URL
//! - GET requests for portal pages

use crate::config::PortalConfig;
use crate::session::Session;
use crate::MirrorError;
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client, Method, Response, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for a single request
pub const MAX_REDIRECTS: usize = 10;

/// A fetched portal page
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Page body content
    pub body: String,
}

/// Builds the HTTP client shared by every request of a crawl
///
/// Redirects are handled by [`send_following`] so that callers can still see
/// the raw `Location` header of a single hop when they need it.
///
/// # Example
///
/// ```no_run
/// use moodle_mirror::config::PortalConfig;
/// use moodle_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&PortalConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &PortalConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a request and follows redirects until a non-redirect response
///
/// # Redirect Rules
///
/// | Condition | Action |
/// |-----------|--------|
/// | 3xx with Location | Follow, resolving relative targets |
/// | 303 See Other | Switch to GET (HEAD stays HEAD) |
/// | 3xx without Location | Treat as final |
/// | Target seen before | RedirectLoop |
/// | More than 10 hops | RedirectLimit |
///
/// # Returns
///
/// The final URL together with its response
pub async fn send_following(
    session: &Session,
    method: Method,
    url: &Url,
) -> Result<(Url, Response), MirrorError> {
    let mut current = url.clone();
    let mut method = method;
    let mut visited = HashSet::new();
    visited.insert(current.clone());

    for _ in 0..=MAX_REDIRECTS {
        let response = session
            .request(method.clone(), &current)
            .send()
            .await
            .map_err(|e| MirrorError::http(current.as_str(), e))?;

        if !response.status().is_redirection() {
            return Ok((current, response));
        }

        let next = match redirect_target(&response, &current) {
            Some(next) => next,
            None => return Ok((current, response)),
        };

        tracing::trace!("Redirect {} -> {}", current, next);

        if !visited.insert(next.clone()) {
            return Err(MirrorError::RedirectLoop {
                url: next.to_string(),
            });
        }

        if response.status() == StatusCode::SEE_OTHER && method != Method::HEAD {
            method = Method::GET;
        }
        current = next;
    }

    Err(MirrorError::RedirectLimit {
        url: url.to_string(),
    })
}

/// Sends a single HEAD request without following redirects
pub async fn head(session: &Session, url: &Url) -> Result<Response, MirrorError> {
    session
        .request(Method::HEAD, url)
        .send()
        .await
        .map_err(|e| MirrorError::http(url.as_str(), e))
}

/// Resolves a link to the URL it finally lands on, using HEAD requests
///
/// The status of the final response is not checked: classification only
/// needs the URL, and a broken target is reported when it is downloaded.
pub async fn probe(session: &Session, url: &Url) -> Result<Url, MirrorError> {
    let (resolved, _) = send_following(session, Method::HEAD, url).await?;
    Ok(resolved)
}

/// Fetches a portal page with GET, following redirects
///
/// Non-2xx final responses are errors.
pub async fn fetch_page(session: &Session, url: &Url) -> Result<FetchedPage, MirrorError> {
    let (final_url, response) = send_following(session, Method::GET, url).await?;
    let status = response.status();

    if !status.is_success() {
        return Err(MirrorError::Status {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| MirrorError::http(final_url.as_str(), e))?;

    Ok(FetchedPage {
        final_url,
        body,
    })
}

/// Reads the `Location` header of a redirect and resolves it against the
/// URL that produced it
pub fn redirect_target(response: &Response, current: &Url) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location.trim()).ok()
}

//! Authenticated session shared by every request of a crawl
//!
//! A `Session` is built once per invocation from cookies obtained by a
//! [`SessionProvider`]. The cookie set is frozen at construction: the crawl
//! client keeps no response cookie store, so concurrent downloads only ever
//! read it.

mod login;

pub use login::{parse_cookie_header, FormLogin, SessionProvider, StaticCookies};

use crate::config::{CookieEntry, PortalConfig};
use crate::crawler::{build_http_client, fetch_page};
use crate::MirrorError;
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A single name/value session cookie
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl From<&CookieEntry> for SessionCookie {
    fn from(entry: &CookieEntry) -> Self {
        Self::new(entry.name.clone(), entry.value.clone())
    }
}

impl FromStr for SessionCookie {
    type Err = String;

    /// Parses `NAME=VALUE`, the form used on the command line
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("cookie name is empty in '{}'", s));
        }
        Ok(Self::new(name, value.trim()))
    }
}

/// Authenticated HTTP client plus the cookies it presents to the portal
pub struct Session {
    client: Client,
    base_url: Url,
    cookies: Vec<SessionCookie>,
    cookie_header: Option<HeaderValue>,
}

impl Session {
    /// Builds a session for the portal described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Portal location and client settings
    /// * `cookies` - Cookies obtained from a [`SessionProvider`]
    pub fn new(config: &PortalConfig, cookies: Vec<SessionCookie>) -> Result<Self, MirrorError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = build_http_client(config)
            .map_err(|e| MirrorError::http(base_url.as_str(), e))?;

        let cookie_header = if cookies.is_empty() {
            None
        } else {
            let joined = cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; ");
            let mut value = HeaderValue::from_str(&joined).map_err(|_| MirrorError::Authentication {
                reason: "session cookies contain characters not allowed in a header".to_string(),
            })?;
            value.set_sensitive(true);
            Some(value)
        };

        Ok(Self {
            client,
            base_url,
            cookies,
            cookie_header,
        })
    }

    /// Root URL of the portal, always ending in a slash
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Starts a request, attaching the session cookies when `url` is on the
    /// portal host
    pub fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let builder = self.client.request(method, url.clone());
        match &self.cookie_header {
            Some(value) if self.is_portal_host(url) => builder.header(COOKIE, value.clone()),
            _ => builder,
        }
    }

    /// Landing page of a course
    pub fn course_url(&self, course_id: &str) -> Result<Url, MirrorError> {
        let mut url = self.base_url.join("course/view.php")?;
        url.query_pairs_mut().append_pair("id", course_id);
        Ok(url)
    }

    /// Checks that the cookies still grant access to the dashboard
    ///
    /// The portal answers unauthenticated requests by redirecting to its
    /// login page, which is reported as an authentication failure.
    pub async fn verify(&self) -> Result<(), MirrorError> {
        let dashboard = self.base_url.join("my/")?;
        let page = fetch_page(self, &dashboard).await?;
        if is_login_url(&page.final_url) {
            return Err(MirrorError::Authentication {
                reason: "session cookies were rejected by the portal".to_string(),
            });
        }
        tracing::debug!("Session verified against {}", dashboard);
        Ok(())
    }

    fn is_portal_host(&self, url: &Url) -> bool {
        url.host_str() == self.base_url.host_str()
            && url.port_or_known_default() == self.base_url.port_or_known_default()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("cookies", &self.cookies)
            .finish()
    }
}

/// Returns true if the portal sent us to its login form
pub fn is_login_url(url: &Url) -> bool {
    url.path().contains("/login/")
}

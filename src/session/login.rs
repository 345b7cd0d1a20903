//! Session providers
//!
//! The crawl only needs a set of cookies proving the user is logged in. How
//! those cookies are obtained sits behind [`SessionProvider`]:
//! - [`StaticCookies`] hands over cookies copied from a browser
//! - [`FormLogin`] signs in through the portal's standard login form

use crate::config::PortalConfig;
use crate::session::{is_login_url, SessionCookie};
use crate::MirrorError;
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Source of authentication cookies for a crawl
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Produces the cookies to present on every portal request
    async fn session_cookies(&self) -> Result<Vec<SessionCookie>, MirrorError>;
}

/// Cookies that were obtained out of band
#[derive(Debug, Clone)]
pub struct StaticCookies {
    cookies: Vec<SessionCookie>,
}

impl StaticCookies {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }
}

#[async_trait]
impl SessionProvider for StaticCookies {
    async fn session_cookies(&self) -> Result<Vec<SessionCookie>, MirrorError> {
        if self.cookies.is_empty() {
            return Err(MirrorError::Authentication {
                reason: "no session cookies or credentials were provided".to_string(),
            });
        }
        Ok(self.cookies.clone())
    }
}

/// Username/password login against `/login/index.php`
pub struct FormLogin {
    base_url: Url,
    user_agent: String,
    connect_timeout: Duration,
    username: String,
    password: String,
}

impl FormLogin {
    pub fn new(
        config: &PortalConfig,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MirrorError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            user_agent: config.user_agent.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            username: username.into(),
            password: password.into(),
        })
    }
}

impl std::fmt::Debug for FormLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormLogin")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for FormLogin {
    async fn session_cookies(&self) -> Result<Vec<SessionCookie>, MirrorError> {
        let login_url = self.base_url.join("login/index.php")?;

        // The login flow itself needs a live cookie store; the crawl client does not.
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| MirrorError::http(login_url.as_str(), e))?;

        let form_page = client
            .get(login_url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MirrorError::http(login_url.as_str(), e))?
            .text()
            .await
            .map_err(|e| MirrorError::http(login_url.as_str(), e))?;

        let mut form = vec![
            ("anchor", String::new()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ];
        if let Some(token) = extract_login_token(&form_page) {
            form.push(("logintoken", token));
        }

        let response = client
            .post(login_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| MirrorError::http(login_url.as_str(), e))?;

        if is_login_url(response.url()) {
            return Err(MirrorError::Authentication {
                reason: "login failed, check your credentials".to_string(),
            });
        }

        let cookies = jar
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().ok().map(parse_cookie_header))
            .unwrap_or_default();

        if cookies.is_empty() {
            return Err(MirrorError::Authentication {
                reason: "portal did not set a session cookie".to_string(),
            });
        }

        tracing::debug!("Login succeeded for {}", self.username);
        Ok(cookies)
    }
}

/// Splits a `Cookie` header value into its name/value pairs
pub fn parse_cookie_header(header: &str) -> Vec<SessionCookie> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().parse::<SessionCookie>().ok())
        .collect()
}

/// Pulls the hidden CSRF token out of the login form, if the portal uses one
fn extract_login_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"input[name="logintoken"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

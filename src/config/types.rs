use serde::Deserialize;

/// Default portal, the instance the tool was first written against
pub const DEFAULT_BASE_URL: &str = "https://www.moodle.tum.de";

/// Main configuration structure for moodle-mirror
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub download: DownloadConfig,
    pub session: SessionConfig,
}

/// Where the portal lives and how we identify ourselves to it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Root URL of the Moodle instance
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// TCP connect timeout in seconds
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("moodle-mirror/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 10,
        }
    }
}

/// Download behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root of the local mirror
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Extension allowlist; empty means every file is accepted
    pub extensions: Vec<String>,

    /// Upper bound on file downloads running at once
    #[serde(rename = "max-concurrent-downloads")]
    pub max_concurrent_downloads: u32,

    /// Resolve and log, but never write anything
    #[serde(rename = "dry-run")]
    pub dry_run: bool,

    /// Replace files that already exist locally
    pub overwrite: bool,

    /// Treat every anchor on the course page as a container
    pub force: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            extensions: vec![".pdf".to_string()],
            max_concurrent_downloads: 8,
            dry_run: false,
            overwrite: false,
            force: false,
        }
    }
}

/// Pre-authenticated session cookies
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookies: Vec<CookieEntry>,
}

/// One name/value cookie copied from a logged-in browser
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

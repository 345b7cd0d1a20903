//! moodle-mirror: mirrors course material from an authenticated Moodle portal
//!
//! This crate walks a course landing page, classifies every resource link it
//! finds, expands folder and assignment containers one level deep, and
//! downloads the resulting files concurrently into a local directory tree.

pub mod config;
pub mod crawler;
pub mod output;
pub mod session;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for moodle-mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Failed to find course {course}")]
    CourseNotFound { course: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTML parse error for {url}: {message}")]
    HtmlParse { url: String, message: String },

    #[error("No usable file name in {url}")]
    InvalidFileName { url: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Download task for {url} panicked")]
    TaskPanicked { url: String },
}

impl MirrorError {
    /// Returns true if the error must abort the whole run rather than a
    /// single course, container or file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Config(_))
    }

    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for moodle-mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    classify, download_course, materialize, CrawlReport, Crawler, DownloadOutcome, DownloadTask,
    FilterSettings, ResourceKind,
};
pub use session::{Session, SessionCookie};
pub use state::TaskState;

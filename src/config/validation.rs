use crate::config::types::{Config, CookieEntry, DownloadConfig, PortalConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_portal_config(&config.portal)?;
    validate_download_config(&config.download)?;
    validate_cookies(&config.session.cookies)?;
    Ok(())
}

/// Normalizes an allowlist entry to its lowercase, dot-prefixed form
///
/// Returns None for entries that cannot name an extension.
///
/// ```
/// use moodle_mirror::config::normalize_extension;
///
/// assert_eq!(normalize_extension("PDF"), Some(".pdf".to_string()));
/// assert_eq!(normalize_extension(" .zip "), Some(".zip".to_string()));
/// assert_eq!(normalize_extension("."), None);
/// ```
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains(&['/', '\\'][..]) || trimmed.contains(char::is_whitespace)
    {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

fn validate_portal_config(config: &PortalConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url has no host: '{}'",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-downloads must be between 1 and 64, got {}",
            config.max_concurrent_downloads
        )));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    for ext in &config.extensions {
        if normalize_extension(ext).is_none() {
            return Err(ConfigError::Validation(format!(
                "Invalid extension '{}'",
                ext
            )));
        }
    }

    Ok(())
}

fn validate_cookies(cookies: &[CookieEntry]) -> Result<(), ConfigError> {
    for cookie in cookies {
        if cookie.name.is_empty()
            || cookie
                .name
                .chars()
                .any(|c| c == '=' || c == ';' || c.is_whitespace())
        {
            return Err(ConfigError::Validation(format!(
                "Invalid cookie name '{}'",
                cookie.name
            )));
        }

        if cookie.value.contains(';') {
            return Err(ConfigError::Validation(format!(
                "Cookie '{}' has a value containing ';'",
                cookie.name
            )));
        }
    }
    Ok(())
}

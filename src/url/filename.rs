use std::borrow::Cow;
use std::path::Path;
use url::Url;

/// Returns the decoded last path segment of a URL, ignoring query and fragment
///
/// Returns None when the path ends in a slash or has no segments at all.
///
/// # Examples
///
/// ```
/// use moodle_mirror::url::file_name_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://moodle.example.edu/files/lecture%2001.pdf?forcedownload=1").unwrap();
/// assert_eq!(file_name_from_url(&url), Some("lecture 01.pdf".to_string()));
/// ```
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    Some(decode_component(segment))
}

/// Returns the decoded file name a redirect `Location` header points at
///
/// Relative locations are resolved against the URL that produced the redirect.
pub fn file_name_from_location(location: &str, request_url: &Url) -> Option<String> {
    match request_url.join(location.trim()) {
        Ok(target) => file_name_from_url(&target),
        Err(_) => {
            let path = location.split(['?', '#']).next().unwrap_or_default();
            let segment = path.rsplit('/').next().unwrap_or_default();
            if segment.is_empty() {
                None
            } else {
                Some(decode_component(segment))
            }
        }
    }
}

/// Percent-decodes a single path component
///
/// Invalid UTF-8 after decoding is replaced rather than rejected.
pub fn decode_component(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned(),
    }
}

/// Turns a decoded name into something safe to join onto a directory
///
/// Path separators and NUL bytes become underscores. Names that would refer
/// to the directory itself or its parent are rejected.
pub fn sanitize_component(name: &str) -> Option<String> {
    let cleaned: Cow<'_, str> = if name.contains(['/', '\\', '\0']) {
        Cow::Owned(name.replace(['/', '\\', '\0'], "_"))
    } else {
        Cow::Borrowed(name)
    };

    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return None;
    }
    Some(trimmed.to_string())
}

/// Returns the lowercase, dot-prefixed extension of a file name
///
/// Dot files such as `.bashrc` have no extension.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

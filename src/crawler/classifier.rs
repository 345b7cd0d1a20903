//! Link classification
//!
//! A link's kind is decided purely from substrings of the URL it resolves
//! to. The checks run in a fixed order and the first hit wins, so a URL
//! containing both "resource" and "folder" is a File.

use std::fmt;

/// What a resolved link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A single downloadable file
    File,
    /// A folder page listing files
    Folder,
    /// An assignment page with submitted attachments
    Assignment,
    /// A course section page
    Section,
    /// Anything else; dropped unless force mode picks it up
    Unclassified,
}

/// Ordered classification rules: (URL substring, kind)
const RULES: [(&str, ResourceKind); 4] = [
    ("resource", ResourceKind::File),
    ("folder", ResourceKind::Folder),
    ("assign", ResourceKind::Assignment),
    ("course/section", ResourceKind::Section),
];

impl ResourceKind {
    /// Returns true for pages whose children need an extra fetch
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Folder | Self::Assignment)
    }

    /// Returns true for links that are handed straight to the materializer
    pub fn is_direct_download(&self) -> bool {
        matches!(self, Self::File | Self::Section)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Assignment => "assignment",
            Self::Section => "section",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a resolved URL
///
/// # Examples
///
/// ```
/// use moodle_mirror::crawler::{classify, ResourceKind};
///
/// assert_eq!(classify("https://m.example.edu/mod/resource/view.php?id=1"), ResourceKind::File);
/// assert_eq!(classify("https://m.example.edu/mod/folder/view.php?id=2"), ResourceKind::Folder);
/// assert_eq!(classify("https://m.example.edu/user/profile.php"), ResourceKind::Unclassified);
/// ```
pub fn classify(resolved_url: &str) -> ResourceKind {
    RULES
        .iter()
        .find(|(needle, _)| resolved_url.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ResourceKind::Unclassified)
}

//! Configuration module for moodle-mirror
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default, so a run without a file uses
//! `Config::default()` and the command-line flags alone.
//!
//! # Example
//!
//! ```no_run
//! use moodle_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Portal: {}", config.portal.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CookieEntry, DownloadConfig, PortalConfig, SessionConfig};

// Re-export parser and validation functions
pub use parser::{load_config, parse_config};
pub use validation::{normalize_extension, validate};

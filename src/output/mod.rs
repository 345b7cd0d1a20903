//! Output module for reporting crawl results
//!
//! This module handles:
//! - Computing statistics from a finished crawl
//! - Printing them to the terminal
//! - Writing an optional markdown summary

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, CrawlStatistics};

//! Statistics derived from a finished crawl
//!
//! This module provides functionality for summarising a [`CrawlReport`]
//! and displaying the result on stdout.

use crate::crawler::{CrawlReport, DownloadOutcome};
use crate::state::TaskState;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of download tasks, including walk failures
    pub total_tasks: u64,

    /// Count of tasks by terminal state
    pub tasks_by_state: HashMap<TaskState, u64>,

    /// Bytes written to disk
    pub bytes_written: u64,

    /// Skipped tasks grouped by reason label
    pub skip_summary: HashMap<&'static str, u64>,

    /// URL and message of every failed task
    pub failures: Vec<(String, String)>,

    /// Courses walked successfully
    pub courses_ok: u64,

    /// Course id and message of every course that could not be walked
    pub courses_failed: Vec<(String, String)>,

    /// Wall-clock duration of the run in seconds
    pub duration_seconds: i64,

    pub dry_run: bool,
}

impl CrawlStatistics {
    /// Computes statistics from a crawl report
    pub fn from_reports(report: &CrawlReport) -> Self {
        let mut stats = Self {
            total_tasks: report.tasks.len() as u64,
            duration_seconds: (report.finished_at - report.started_at).num_seconds(),
            dry_run: report.dry_run,
            ..Self::default()
        };

        for task in &report.tasks {
            *stats.tasks_by_state.entry(task.state()).or_insert(0) += 1;

            match &task.outcome {
                DownloadOutcome::Saved { bytes, .. } => stats.bytes_written += bytes,
                DownloadOutcome::Skipped(reason) => {
                    *stats.skip_summary.entry(reason.label()).or_insert(0) += 1;
                }
                DownloadOutcome::Failed(error) => {
                    stats
                        .failures
                        .push((task.url.to_string(), error.to_string()));
                }
            }
        }

        for course in &report.courses {
            match &course.result {
                Ok(_) => stats.courses_ok += 1,
                Err(e) => stats
                    .courses_failed
                    .push((course.course_id.clone(), e.to_string())),
            }
        }

        stats
    }

    /// Number of tasks that ended in `state`
    pub fn count(&self, state: TaskState) -> u64 {
        self.tasks_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Returns true if any course or task failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.courses_failed.is_empty()
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    if stats.dry_run {
        println!("=== Mirror Statistics (dry run) ===\n");
    } else {
        println!("=== Mirror Statistics ===\n");
    }

    println!("Overview:");
    println!(
        "  Courses: {} walked, {} failed",
        stats.courses_ok,
        stats.courses_failed.len()
    );
    println!("  Files considered: {}", stats.total_tasks);
    println!("  Bytes written: {}", stats.bytes_written);
    println!("  Duration: {}s", stats.duration_seconds);
    println!();

    println!("Files by State:");
    for state in TaskState::terminal_states() {
        let count = stats.count(state);
        let percentage = if stats.total_tasks > 0 {
            (count as f64 / stats.total_tasks as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.skip_summary.is_empty() {
        println!("Skipped:");
        let mut skip_counts: Vec<_> = stats.skip_summary.iter().collect();
        skip_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (label, count) in skip_counts {
            println!("  {}: {}", label, count);
        }
        println!();
    }

    if !stats.courses_failed.is_empty() {
        println!("Failed Courses ({}):", stats.courses_failed.len());
        for (course, message) in &stats.courses_failed {
            println!("  - {}: {}", course, message);
        }
        println!();
    }

    if !stats.failures.is_empty() {
        println!("Failed Downloads ({}):", stats.failures.len());
        for (url, message) in &stats.failures {
            println!("  - {}: {}", url, message);
        }
        println!();
    }
}

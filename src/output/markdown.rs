//! Markdown summary generation
//!
//! This module renders a human-readable report of a mirror run: when it
//! ran, what each course produced, and which downloads failed.

use crate::crawler::{CrawlReport, DownloadOutcome};
use crate::output::stats::CrawlStatistics;
use crate::state::TaskState;
use crate::MirrorError;
use std::path::Path;

/// Writes a markdown summary of `report` to `output_path`
///
/// # Arguments
///
/// * `report` - The finished crawl
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(MirrorError::Io)` - Failed to write summary
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> Result<(), MirrorError> {
    let stats = CrawlStatistics::from_reports(report);
    let markdown = format_markdown_summary(report, &stats);

    std::fs::write(output_path, markdown).map_err(|e| MirrorError::io(output_path, e))
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport, stats: &CrawlStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Moodle Mirror Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!("- **Duration**: {} seconds\n", stats.duration_seconds));
    if report.dry_run {
        md.push_str("- **Mode**: dry run, nothing was written\n");
    }
    md.push('\n');

    md.push_str("## Courses\n\n");
    md.push_str("| Course | Title | Result |\n");
    md.push_str("|--------|-------|--------|\n");
    for course in &report.courses {
        match &course.result {
            Ok(target) => md.push_str(&format!(
                "| {} | {} | ok |\n",
                course.course_id,
                escape_cell(&target.title)
            )),
            Err(e) => md.push_str(&format!(
                "| {} | | {} |\n",
                course.course_id,
                escape_cell(&e.to_string())
            )),
        }
    }
    md.push('\n');

    md.push_str("## Files\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for state in TaskState::terminal_states() {
        md.push_str(&format!("| {} | {} |\n", state, stats.count(state)));
    }
    md.push_str(&format!("\n- **Bytes Written**: {}\n\n", stats.bytes_written));

    let saved: Vec<_> = report
        .tasks
        .iter()
        .filter_map(|task| match &task.outcome {
            DownloadOutcome::Saved { path, .. } => Some(path),
            _ => None,
        })
        .collect();
    if !saved.is_empty() {
        md.push_str("## Saved Files\n\n");
        for path in saved {
            md.push_str(&format!("- {}\n", path.display()));
        }
        md.push('\n');
    }

    if !stats.skip_summary.is_empty() {
        md.push_str("## Skipped\n\n");
        md.push_str("| Reason | Count |\n");
        md.push_str("|--------|-------|\n");
        let mut skips: Vec<_> = stats.skip_summary.iter().collect();
        skips.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (label, count) in skips {
            md.push_str(&format!("| {} | {} |\n", label, count));
        }
        md.push('\n');
    }

    if !stats.failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");
        for (url, message) in &stats.failures {
            md.push_str(&format!("| {} | {} |\n", url, escape_cell(message)));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

//! Terminal styling utilities
//!
//! Consistent colors for batch progress and summaries, via crossterm.

use crate::batch::{BatchReport, MutationResult};
use crossterm::style::{StyledContent, Stylize};

/// Section headers
pub fn header(text: &str) -> StyledContent<String> {
    text.to_string().bold()
}

/// Dim/muted text
pub fn dim(text: &str) -> StyledContent<String> {
    text.to_string().dark_grey()
}

pub fn success(text: &str) -> StyledContent<String> {
    text.to_string().green()
}

pub fn warning(text: &str) -> StyledContent<String> {
    text.to_string().yellow()
}

pub fn error(text: &str) -> StyledContent<String> {
    text.to_string().red()
}

/// Usernames
pub fn user(name: &str) -> StyledContent<String> {
    name.to_string().cyan()
}

/// Counts: green when zero failures are implied, yellow otherwise
pub fn count(n: usize, good: bool) -> StyledContent<String> {
    let text = n.to_string();
    if good {
        text.green().bold()
    } else {
        text.yellow().bold()
    }
}

/// One progress line per completed mutation
pub fn result_line(result: &MutationResult) -> String {
    match result.failure_reason() {
        None => format!(
            "  {} {} {}",
            success("✓"),
            result.kind.past_tense(),
            user(result.username.as_str())
        ),
        // Missing user, or already in the requested state
        Some(reason) if reason.is_definitive() => format!(
            "  {} {} {}: {}",
            warning("-"),
            result.kind.verb(),
            user(result.username.as_str()),
            warning(&format!("{} (not retryable)", reason))
        ),
        Some(reason) => format!(
            "  {} {} {}: {}",
            error("✗"),
            result.kind.verb(),
            user(result.username.as_str()),
            error(&reason.to_string())
        ),
    }
}

/// Multi-line run summary
pub fn summary(report: &BatchReport) -> String {
    let mut out = format!(
        "{} {} succeeded, {} failed of {} attempted ({:.1}%) in {:.1}s ({:.1}/s)",
        header("Summary:"),
        count(report.succeeded, true),
        count(report.failed, report.failed == 0),
        report.attempted,
        report.success_rate(),
        report.elapsed.as_secs_f64(),
        report.throughput()
    );
    if report.cancelled {
        out.push_str(&format!(
            "\n{}",
            warning(&format!("Interrupted: {} not attempted", report.skipped))
        ));
    }
    out
}

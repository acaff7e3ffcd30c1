//! Output formatting for `wit-migrate`.
//!
//! Run summaries are printed either as human-readable text or as JSON. Both
//! go to stdout; diagnostics go through `tracing` to stderr.

use crate::error::Result;
use crate::migrate::RunSummary;
use std::fmt::Write as _;
use std::time::Duration;

/// `{h} hours {m} minutes {s}.{ms} seconds`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{} hours {} minutes {}.{:03} seconds",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        duration.subsec_millis()
    )
}

/// `{s}.{ms} seconds`, for per-item averages.
#[must_use]
pub fn format_average(duration: Duration) -> String {
    format!("{}.{:03} seconds", duration.as_secs(), duration.subsec_millis())
}

/// Text block for one run.
#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.kind);
    if let Some(folders) = summary.folders {
        let _ = writeln!(out, "  Folders scanned: {folders}");
    }
    let _ = writeln!(
        out,
        "  Attempted: {}  Migrated: {}  Skipped: {}  Failed: {}",
        summary.attempted, summary.migrated, summary.skipped, summary.failed
    );
    let _ = writeln!(out, "  DONE in {}", format_duration(summary.elapsed));
    out
}

/// Print summaries to stdout, as pretty JSON when `json` is set.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_summaries(summaries: &[RunSummary], json: bool) -> Result<()> {
    if json {
        let rendered = match summaries {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        };
        println!("{rendered}");
    } else {
        for summary in summaries {
            print!("{}", format_summary(summary));
        }
    }
    Ok(())
}

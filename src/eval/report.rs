//! CSV report and console summary for sweep results

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use super::SweepResult;
use crate::Result;

/// First line of every report
pub const REPORT_HEADER: &str = "SNR_dB,correct,total,accuracy_pct";

/// `eval_<YYYY-MM-DDTHH-MM-SS>.csv` for the given wall-clock time
#[must_use]
pub fn report_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("eval_{}.csv", at.format("%Y-%m-%dT%H-%M-%S"))
}

/// One human-readable line per level, e.g. `SNR 10 dB -> 7/8 correct (87.5%)`
#[must_use]
pub fn format_summary(result: &SweepResult) -> String {
    format!(
        "SNR {} dB -> {}/{} correct ({:.1}%)",
        result.snr_db, result.correct, result.total, result.accuracy_pct
    )
}

/// Write `results` as CSV into `dir`, creating it if needed
///
/// Rows keep the order of `results`. An empty level's accuracy is written
/// as `NaN`.
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file written
pub fn write_report<Tz: TimeZone>(
    dir: &Path,
    results: &[SweepResult],
    at: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    std::fs::create_dir_all(dir)?;

    let mut body = String::with_capacity(REPORT_HEADER.len() + 1 + results.len() * 24);
    body.push_str(REPORT_HEADER);
    body.push('\n');
    for r in results {
        // Writing into a String cannot fail
        let _ = writeln!(
            body,
            "{},{},{},{:.1}",
            r.snr_db, r.correct, r.total, r.accuracy_pct
        );
    }

    let path = dir.join(report_file_name(at));
    std::fs::write(&path, body)?;

    tracing::info!(path = %path.display(), levels = results.len(), "evaluation report written");
    Ok(path)
}

//! Custom Askama template filters.

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a byte count as whole mebibytes.
///
/// Usage in templates: `{{ max_upload_bytes|mebibytes }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn mebibytes(bytes: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let bytes: u64 = bytes.to_string().parse().unwrap_or(0);
    Ok(format!("{}MB", bytes / (1024 * 1024)))
}

//! strftime-style date templates for output directories and file names.

use std::fmt::Write;
use std::path::{Component, Path};

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;

use crate::classify::Timestamp;
use crate::error::SortError;

/// Reject templates chrono cannot format, and templates whose output would
/// leave the directory it is joined onto (`/%Y`, `%Y/../..`).
pub fn validate_template(template: &str) -> Result<(), SortError> {
    let invalid = || SortError::InvalidTemplate {
        template: template.to_string(),
    };

    if template.trim().is_empty() || StrftimeItems::new(template).any(|item| item == Item::Error) {
        return Err(invalid());
    }

    let sample = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;
    let formatted = format_timestamp(&sample, template)?;
    let stays_inside = Path::new(&formatted)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !stays_inside {
        return Err(invalid());
    }

    Ok(())
}

/// Format `timestamp` with `template`.
///
/// Unlike `to_string()` on chrono's formatter this never panics on a bad
/// template.
pub fn format_timestamp(timestamp: &Timestamp, template: &str) -> Result<String, SortError> {
    let mut out = String::new();
    write!(out, "{}", timestamp.format(template)).map_err(|_| SortError::InvalidTemplate {
        template: template.to_string(),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 12, 8)
            .and_then(|d| d.and_hms_opt(15, 17, 49))
            .expect("valid date")
    }

    #[test]
    fn test_group_template_uses_month_names() {
        let formatted = format_timestamp(&sample(), "%Y/%B/%d").expect("Failed to format");
        assert_eq!(formatted, "2022/December/08");
    }

    #[test]
    fn test_rename_template() {
        let formatted = format_timestamp(&sample(), "%Y%m%d_%H%M%S").expect("Failed to format");
        assert_eq!(formatted, "20221208_151749");
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("%Y/%B/%d").is_ok());
        assert!(validate_template("%Y-%m").is_ok());
        assert!(validate_template("%Q").is_err());
        assert!(validate_template("").is_err());
    }

    #[test]
    fn test_templates_cannot_leave_the_output_root() {
        assert!(validate_template("/%Y/%m").is_err());
        assert!(validate_template("%Y/../../etc").is_err());
        assert!(validate_template("..").is_err());
        assert!(validate_template("./%Y").is_ok());
        assert!(validate_template("%Y/%m/").is_ok());
    }

    #[test]
    fn test_invalid_template_is_an_error_not_a_panic() {
        assert!(format_timestamp(&sample(), "%Q").is_err());
    }
}

//! Timestamp extraction.
//!
//! A [`PathClassifier`] decides which date a file belongs to. The default
//! implementation reads the EXIF `DateTime` tag of an image.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};

use crate::error::SortError;

/// Point in time a file is sorted by. EXIF dates carry no time zone.
pub type Timestamp = NaiveDateTime;

/// Tags consulted in order; `DateTime` is the one cameras always write.
const DATE_TAGS: [Tag; 3] = [Tag::DateTime, Tag::DateTimeOriginal, Tag::DateTimeDigitized];

/// Produces the timestamp a file should be sorted by.
///
/// Implementations are shared by all workers of a run.
pub trait PathClassifier: Send + Sync {
    /// Returns `Ok(None)` when the file has no usable timestamp and
    /// `SortError::OpenFailed` when it cannot be read at all.
    fn classify(&self, path: &Path) -> Result<Option<Timestamp>, SortError>;
}

/// Reads the capture date from EXIF metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifClassifier;

impl PathClassifier for ExifClassifier {
    fn classify(&self, path: &Path) -> Result<Option<Timestamp>, SortError> {
        let open_failed = |source: Box<dyn std::error::Error + Send + Sync>| SortError::OpenFailed {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| open_failed(Box::new(e)))?;
        let mut reader = BufReader::new(file);

        let mut exif_reader = exif::Reader::new();
        exif_reader.continue_on_error(true);

        let exif = match exif_reader.read_from_container(&mut reader) {
            Ok(exif) => exif,
            // Damaged fields elsewhere in the block must not hide a readable date
            Err(exif::Error::PartialResult(partial)) => {
                let (exif, errors) = partial.into_inner();
                tracing::debug!(
                    path = %path.display(),
                    errors = errors.len(),
                    "EXIF block partially readable"
                );
                exif
            }
            // A readable image that simply has no EXIF block
            Err(exif::Error::NotFound(_) | exif::Error::BlankValue(_)) => return Ok(None),
            Err(e) => return Err(open_failed(Box::new(e))),
        };

        let raw = DATE_TAGS.iter().find_map(|tag| {
            let field = exif.get_field(*tag, In::PRIMARY)?;
            match &field.value {
                Value::Ascii(values) => values
                    .first()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            }
        });

        Ok(raw.as_deref().and_then(parse_date_time))
    }
}

/// Parse an EXIF date string (`2022:12:08 15:17:49`), falling back to ISO 8601.
///
/// Empty or unrecognised values yield `None`.
pub fn parse_date_time(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S") {
        return Some(parsed);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

//! Capture-time resolution for ingested images.
//!
//! Prefers the capture instant embedded in the image's EXIF metadata,
//! parsed with the fixed `YYYY:MM:DD HH:MM:SS` pattern in local time.
//! When no parseable field is present the file's last-modified time is
//! used instead and the result is flagged as a fallback.
//!
//! A field that is present but fails the fixed pattern is an error for
//! that file; the intake loop isolates it and moves on.

use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use exif::{In, Tag, Value};

/// Fixed pattern for embedded capture-time fields.
pub const EXIF_DATETIME_PATTERN: &str = "%Y:%m:%d %H:%M:%S";

/// Resolved capture instant for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureTime {
    /// Epoch milliseconds.
    pub epoch_ms: i64,
    /// True when derived from filesystem metadata instead of embedded
    /// image metadata.
    pub is_fallback: bool,
}

/// Derive the capture instant for an image file.
pub fn resolve(path: &Path) -> Result<CaptureTime> {
    if let Some(raw) = read_exif_datetime(path)? {
        let epoch_ms = parse_exif_datetime(&raw).with_context(|| {
            format!(
                "malformed embedded capture time {:?} in {}",
                raw,
                path.display()
            )
        })?;
        return Ok(CaptureTime {
            epoch_ms,
            is_fallback: false,
        });
    }

    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("read modification time of {}", path.display()))?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .context("file modified before the epoch")?
        .as_secs() as i64;
    Ok(CaptureTime {
        epoch_ms: secs * 1_000,
        is_fallback: true,
    })
}

/// Parse an embedded capture-time field into epoch milliseconds.
///
/// The pattern is fixed; anything else is an error, not a fallback.
pub fn parse_exif_datetime(raw: &str) -> Result<i64> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let naive = NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_PATTERN)
        .map_err(|e| anyhow!("capture time does not match {}: {}", EXIF_DATETIME_PATTERN, e))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("capture time does not exist in the local timezone"))?;
    Ok(local.timestamp_millis())
}

/// Read the raw capture-time field from a file's EXIF block, if any.
///
/// A file without an EXIF container (or without a datetime field) is not
/// an error; it simply has no embedded capture time.
fn read_exif_datetime(path: &Path) -> Result<Option<String>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(_) => return Ok(None),
    };

    for tag in [Tag::DateTimeOriginal, Tag::DateTime] {
        let Some(field) = exif.get_field(tag, In::PRIMARY) else {
            continue;
        };
        if let Value::Ascii(ref values) = field.value {
            if let Some(bytes) = values.first() {
                return Ok(Some(String::from_utf8_lossy(bytes).into_owned()));
            }
        }
    }
    Ok(None)
}

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One recognizer output for a single frame.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Normalized plate text (see [`normalize_plate_text`]).
    pub plate: String,
    /// Confidence in 0..=1.
    pub confidence: f32,
    /// Bounding geometry of the plate within the frame.
    pub bounds: PlateBox,
    /// Capture epoch in milliseconds, inherited from the frame.
    pub epoch_ms: i64,
    /// Unique identifier of the source frame.
    pub frame_uuid: String,
    /// File the source frame was decoded from.
    pub source_path: PathBuf,
}

/// Bounding box in normalized 0..1 frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Vehicle attributes attached to a delivered event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub make: Option<String>,
    pub color: Option<String>,
    pub body_type: Option<String>,
}

/// Canonical plate-text form: uppercase, alphanumeric only.
///
/// Recognizers emit cosmetic variants of the same plate ("abc-123",
/// "ABC 123"); grouping compares the canonical form.
pub fn normalize_plate_text(raw: &str) -> String {
    static NON_PLATE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = NON_PLATE_CHARS.get_or_init(|| Regex::new(r"[^A-Z0-9]").unwrap());
    re.replace_all(&raw.to_uppercase(), "").into_owned()
}

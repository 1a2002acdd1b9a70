//! Recognition boundary: detection result types and the recognizer and
//! classifier traits the pipeline consumes as black boxes.

mod backend;
mod result;

pub use backend::{PlateRecognizer, StubClassifier, StubRecognizer, VehicleClassifier};
pub use result::{normalize_plate_text, Detection, PlateBox, VehicleAttributes};

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use super::result::{normalize_plate_text, Detection, PlateBox, VehicleAttributes};
use crate::frame::FrameQueue;

/// Plate recognizer boundary.
///
/// The recognition algorithm itself lives outside this crate; the
/// pipeline only depends on this contract. `detect` receives the whole
/// look-back window with the just-ingested frame at `frames.latest()`;
/// implementations that need no history read only that frame. Frames
/// are read-only and must not be retained beyond the call. Detections
/// inherit their epoch from the frame they were read from.
pub trait PlateRecognizer: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Run plate recognition over the look-back window.
    fn detect(&mut self, frames: &FrameQueue) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Vehicle classifier boundary.
///
/// Invoked once per completed plate group, on the source image of the
/// group's best detection, before delivery.
pub trait VehicleClassifier: Send {
    fn classify(&mut self, image_path: &Path, bounds: &PlateBox) -> Result<VehicleAttributes>;
}

/// Deterministic recognizer keyed by source file name.
///
/// Stands in for a real recognition backend in tests and in the demo
/// daemon configuration.
#[derive(Default)]
pub struct StubRecognizer {
    results: HashMap<String, Vec<(String, f32)>>,
}

impl StubRecognizer {
    /// Register a plate reading for a given file name.
    pub fn with_reading(mut self, file_name: &str, plate: &str, confidence: f32) -> Self {
        self.results
            .entry(file_name.to_string())
            .or_default()
            .push((plate.to_string(), confidence));
        self
    }
}

impl PlateRecognizer for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frames: &FrameQueue) -> Result<Vec<Detection>> {
        let Some(frame) = frames.latest() else {
            return Ok(Vec::new());
        };
        let Some(file_name) = frame.source_path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let readings = self.results.get(file_name).cloned().unwrap_or_default();
        Ok(readings
            .into_iter()
            .map(|(plate, confidence)| Detection {
                plate: normalize_plate_text(&plate),
                confidence,
                bounds: PlateBox::default(),
                epoch_ms: frame.captured_at_ms,
                frame_uuid: frame.uuid.clone(),
                source_path: frame.source_path.clone(),
            })
            .collect())
    }
}

/// Classifier that reports no vehicle attributes.
#[derive(Default)]
pub struct StubClassifier;

impl VehicleClassifier for StubClassifier {
    fn classify(&mut self, _image_path: &Path, _bounds: &PlateBox) -> Result<VehicleAttributes> {
        Ok(VehicleAttributes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::timestamp::CaptureTime;

    /// Recognizer that reads every frame in the window, not just the
    /// newest one.
    struct WindowRecognizer;

    impl PlateRecognizer for WindowRecognizer {
        fn name(&self) -> &'static str {
            "window"
        }

        fn detect(&mut self, frames: &FrameQueue) -> Result<Vec<Detection>> {
            Ok(frames
                .iter()
                .map(|frame| Detection {
                    plate: "ABC123".to_string(),
                    confidence: 0.9,
                    bounds: PlateBox::default(),
                    epoch_ms: frame.captured_at_ms,
                    frame_uuid: frame.uuid.clone(),
                    source_path: frame.source_path.clone(),
                })
                .collect())
        }
    }

    fn make_frame(name: &str, epoch_ms: i64) -> Frame {
        Frame::from_rgb8(
            vec![0; 12],
            2,
            2,
            CaptureTime {
                epoch_ms,
                is_fallback: true,
            },
            Path::new(name),
        )
    }

    #[test]
    fn recognizer_sees_the_whole_lookback_window() {
        let mut queue = FrameQueue::new(4);
        queue.push(make_frame("a.jpg", 1_000));
        queue.push(make_frame("b.jpg", 1_100));

        let mut recognizer = WindowRecognizer;
        let detections = recognizer.detect(&queue).expect("detect");
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].epoch_ms, 1_000);
        assert_eq!(detections[1].epoch_ms, 1_100);
    }

    #[test]
    fn stub_reads_the_newest_frame() {
        let mut queue = FrameQueue::new(4);
        queue.push(make_frame("old.jpg", 1_000));
        queue.push(make_frame("a.jpg", 1_100));

        let mut stub = StubRecognizer::default().with_reading("a.jpg", "abc-123", 0.9);
        let detections = stub.detect(&queue).expect("detect");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].plate, "ABC123");
        assert_eq!(detections[0].epoch_ms, 1_100);
    }

    #[test]
    fn stub_with_an_empty_queue_detects_nothing() {
        let queue = FrameQueue::new(4);
        let mut stub = StubRecognizer::default().with_reading("a.jpg", "ABC123", 0.9);
        assert!(stub.detect(&queue).expect("detect").is_empty());
    }
}

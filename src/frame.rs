//! Frame types and the bounded ingest queue.
//!
//! - `Frame`: one decoded image plus its capture time and dimensions.
//! - `FrameQueue`: bounded ring buffer of recently ingested frames backing
//!   the grouping window. Frames enter at the tail; when the queue is at
//!   capacity the oldest frame is evicted before the new one is admitted,
//!   so the queue never holds more than its configured capacity.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::timestamp::CaptureTime;

/// Default look-back capacity when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// One ingested image.
///
/// Immutable once created. Owned by the intake loop until handed to the
/// `FrameQueue`, which owns it until the recognizer consumes it.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Unique identifier assigned at ingest.
    pub uuid: String,
    /// Raw interleaved pixel buffer.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    /// Capture instant in epoch milliseconds.
    pub captured_at_ms: i64,
    /// True when the capture time came from filesystem metadata rather
    /// than embedded image metadata.
    pub timestamp_is_fallback: bool,
    /// File the frame was decoded from.
    pub source_path: PathBuf,
}

impl Frame {
    /// Build a frame from an RGB8 pixel buffer.
    pub fn from_rgb8(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        capture: CaptureTime,
        source_path: &Path,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            pixels,
            width,
            height,
            bytes_per_pixel: 3,
            captured_at_ms: capture.epoch_ms,
            timestamp_is_fallback: capture.is_fallback,
            source_path: source_path.to_path_buf(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Bounded look-back buffer feeding the recognizer.
///
/// Push always succeeds: at capacity the oldest frame is dropped first.
/// The queue performs no grouping itself.
pub struct FrameQueue {
    buffer: VecDeque<Frame>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a frame, evicting the oldest first if at capacity.
    /// Returns the queue size before admission.
    pub fn push(&mut self, frame: Frame) -> usize {
        let size_before = self.buffer.len();
        while self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(frame);
        size_before
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recent frame, if any.
    pub fn latest(&self) -> Option<&Frame> {
        self.buffer.back()
    }

    /// Frames in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.buffer.iter()
    }

    pub fn memory_bytes(&self) -> usize {
        self.buffer.iter().map(|f| f.byte_len()).sum()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

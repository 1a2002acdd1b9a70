//! platewatch
//!
//! A watched directory of captured images is processed as a bounded work
//! queue: per-image plate detections are aggregated into
//! higher-confidence plate events across a short temporal window, and
//! each event is durably committed to a local image store and a remote
//! HTTP collector before its source images are deleted.
//!
//! # Module Structure
//!
//! - `timestamp`: capture-instant resolution (embedded metadata with a
//!   filesystem fallback)
//! - `frame`: `Frame` and the bounded `FrameQueue` look-back buffer
//! - `detect`: recognizer and classifier boundaries plus result types
//! - `group`: the grouping engine turning detections into plate events
//! - `store`, `transport`: local blob store and remote collector clients
//! - `deliver`: the persist, upload, delete pipeline with retry policy
//! - `intake`: the sequential directory-processing loop
//! - `config`, `identity`: startup configuration and tenant identity

pub mod config;
pub mod deliver;
pub mod detect;
pub mod frame;
pub mod group;
pub mod identity;
pub mod intake;
pub mod store;
pub mod timestamp;
pub mod transport;

pub use config::{CliOverrides, PlatewatchConfig};
pub use deliver::{Delivery, DeliveryPipeline, RetryPolicy};
pub use detect::{
    normalize_plate_text, Detection, PlateBox, PlateRecognizer, StubClassifier, StubRecognizer,
    VehicleAttributes, VehicleClassifier,
};
pub use frame::{Frame, FrameQueue};
pub use group::{GroupState, GroupingEngine, GroupingParams, PlateGroup};
pub use identity::TenantIdentity;
pub use intake::Intake;
pub use store::{FilesystemImageStore, ImageStore};
pub use timestamp::CaptureTime;
pub use transport::{BestPlate, Collector, HttpCollector, PlateEventPayload};

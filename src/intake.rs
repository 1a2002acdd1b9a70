//! Intake loop: the watched directory processed as a bounded work queue.
//!
//! Each pass lists the directory (sorted by filename for determinism)
//! and runs every new file through resolve-timestamp -> frame queue ->
//! recognizer -> grouping -> delivery, strictly one file at a time.
//! A single file's failure is logged, does not abort the pass, and the
//! file is retried on later passes; delivery, however, blocks the loop
//! until acknowledged, which is what guarantees ordering and
//! at-least-once delivery. Each pass ends with a wall-clock tick of the
//! grouping engine so idle windows close without new detections.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::PlatewatchConfig;
use crate::deliver::DeliveryPipeline;
use crate::detect::{PlateRecognizer, VehicleClassifier};
use crate::frame::{Frame, FrameQueue};
use crate::group::{GroupingEngine, PlateGroup};
use crate::identity::TenantIdentity;
use crate::store::ImageStore;
use crate::timestamp;
use crate::transport::Collector;

pub struct Intake {
    queue: FrameQueue,
    engine: GroupingEngine,
    recognizer: Box<dyn PlateRecognizer>,
    classifier: Box<dyn VehicleClassifier>,
    pipeline: DeliveryPipeline,
    identity: TenantIdentity,
    /// Files already ingested this run; cleared when they disappear.
    processed: HashSet<PathBuf>,
    shutdown: Arc<AtomicBool>,
}

impl Intake {
    pub fn new(
        cfg: &PlatewatchConfig,
        identity: TenantIdentity,
        recognizer: Box<dyn PlateRecognizer>,
        classifier: Box<dyn VehicleClassifier>,
        store: Box<dyn ImageStore>,
        collector: Box<dyn Collector>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue: FrameQueue::new(cfg.queue_capacity),
            engine: GroupingEngine::new(cfg.grouping),
            recognizer,
            classifier,
            pipeline: DeliveryPipeline::new(store, collector, cfg.upload, cfg.keep_originals),
            identity,
            processed: HashSet::new(),
            shutdown,
        }
    }

    /// One pass over the watched directory. An empty directory is not an
    /// error.
    pub fn run_once(&mut self, dir: &Path) -> Result<()> {
        let entries = list_image_files(dir)?;
        let listed: HashSet<&PathBuf> = entries.iter().collect();
        self.processed.retain(|path| listed.contains(path));

        if entries.is_empty() {
            log::info!("watched directory {} is empty", dir.display());
        }

        for path in &entries {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if self.processed.contains(path) {
                continue;
            }
            match self.process_file(path) {
                Ok(()) => {
                    self.processed.insert(path.clone());
                }
                // Left unmarked so the next pass retries it; a
                // half-written image decodes once the writer finishes.
                Err(e) => log::warn!("skipping {}: {:#}", path.display(), e),
            }
        }

        // Wall time closes idle windows; without this a trailing burst
        // would wait for the next detection or shutdown.
        self.engine.tick(Utc::now().timestamp_millis());
        let completed = self.engine.drain_completed();
        self.deliver_groups(completed)
    }

    /// Loop `run_once` on an interval until shutdown, then flush.
    pub fn run(&mut self, dir: &Path, interval: Duration) -> Result<()> {
        self.recognizer.warm_up()?;
        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_once(dir)?;
            self.sleep_responsive(interval);
        }
        log::info!("shutdown requested, flushing open groups");
        self.flush()
    }

    /// Force-close open groups and deliver the eligible ones.
    pub fn flush(&mut self) -> Result<()> {
        let completed = self.engine.flush();
        self.deliver_groups(completed)
    }

    fn process_file(&mut self, path: &Path) -> Result<()> {
        let capture = timestamp::resolve(path)?;
        let decoded = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::from_rgb8(rgb.into_raw(), width, height, capture, path);

        let size_before = self.queue.push(frame);
        log::debug!(
            "queued {} ({} frame(s) buffered before admit, fallback_ts={})",
            path.display(),
            size_before,
            capture.is_fallback
        );

        let detections = self.recognizer.detect(&self.queue)?;
        log::debug!(
            "{}: {} detection(s) from {}",
            path.display(),
            detections.len(),
            self.recognizer.name()
        );
        for detection in detections {
            self.engine.submit(detection);
        }

        let completed = self.engine.drain_completed();
        self.deliver_groups(completed)
    }

    fn deliver_groups(&mut self, groups: Vec<PlateGroup>) -> Result<()> {
        for group in groups {
            let best = group.best();
            let vehicle = self
                .classifier
                .classify(&best.source_path, &best.bounds)
                .with_context(|| format!("classify vehicle for group {}", group.id))?;
            let outcome = self
                .pipeline
                .deliver(&group, &vehicle, &self.identity)
                .with_context(|| format!("deliver group {}", group.id))?;
            log::info!(
                "delivered plate {} (uuid={}, members={}, attempts={}, deleted={})",
                group.plate(),
                outcome.best_uuid,
                group.members.len(),
                outcome.upload_attempts,
                outcome.deleted.len()
            );
            for path in outcome.deleted {
                self.processed.remove(&path);
            }
        }

        for group in self.engine.drain_expired() {
            log::debug!(
                "group {} for plate {} expired with {} member(s)",
                group.id,
                group.plate(),
                group.members.len()
            );
        }
        Ok(())
    }

    /// Sleep in short slices so shutdown stays responsive.
    fn sleep_responsive(&self, interval: Duration) {
        let mut remaining = interval;
        while !self.shutdown.load(Ordering::SeqCst) && !remaining.is_zero() {
            let step = remaining.min(Duration::from_millis(100));
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
    }
}

/// List regular files in the directory, sorted by filename.
fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("list watched directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?
            .is_file()
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

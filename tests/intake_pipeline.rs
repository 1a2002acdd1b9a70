use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use image::{ImageFormat, RgbImage};

use platewatch::{
    Collector, FilesystemImageStore, GroupingParams, Intake, PlateEventPayload, PlatewatchConfig,
    RetryPolicy, StubClassifier, StubRecognizer, TenantIdentity,
};

struct CapturingCollector {
    acked: Arc<Mutex<Vec<PlateEventPayload>>>,
}

impl Collector for CapturingCollector {
    fn push(&mut self, event: &PlateEventPayload) -> Result<()> {
        self.acked.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn write_jpeg(path: &Path) {
    RgbImage::new(8, 8)
        .save_with_format(path, ImageFormat::Jpeg)
        .expect("write jpeg fixture");
}

fn test_config(watch_dir: PathBuf, store_dir: PathBuf) -> PlatewatchConfig {
    PlatewatchConfig {
        watch_dir,
        store_dir,
        collector_url: "http://127.0.0.1:1".to_string(),
        keep_originals: false,
        scan_interval: Duration::from_millis(10),
        queue_capacity: 4,
        agent_id_path: PathBuf::from("/nonexistent/agent_id"),
        company_id_path: PathBuf::from("/nonexistent/company_id"),
        grouping: GroupingParams {
            min_plates_to_group: 2,
            min_confidence: 0.75,
            // Frame timestamps fall back to file mtime here, so the
            // window must cover the few seconds a test run may span.
            max_delta_time_ms: 60_000,
            stale_after_ms: 120_000,
        },
        upload: RetryPolicy {
            max_attempts: Some(3),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
    }
}

fn identity() -> TenantIdentity {
    TenantIdentity {
        agent_id: "agent-0042".to_string(),
        company_id: "acme".to_string(),
    }
}

#[test]
fn directory_burst_becomes_one_delivered_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    let watch_dir = dir.path().join("watch");
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&watch_dir).expect("watch dir");

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_jpeg(&watch_dir.join(name));
    }
    // An undecodable file must be skipped, not abort the pass.
    fs::write(watch_dir.join("notes.txt"), b"not an image").expect("junk file");

    let recognizer = StubRecognizer::default()
        .with_reading("a.jpg", "ABC-123", 0.90)
        .with_reading("b.jpg", "abc 123", 0.95)
        .with_reading("c.jpg", "ABC123", 0.60);

    let acked = Arc::new(Mutex::new(Vec::new()));
    let cfg = test_config(watch_dir.clone(), store_dir.clone());
    let store = FilesystemImageStore::new(&store_dir).expect("store");
    let mut intake = Intake::new(
        &cfg,
        identity(),
        Box::new(recognizer),
        Box::new(StubClassifier),
        Box::new(store),
        Box::new(CapturingCollector {
            acked: acked.clone(),
        }),
        Arc::new(AtomicBool::new(false)),
    );

    intake.run_once(&watch_dir).expect("run_once");
    intake.flush().expect("flush");

    let acked = acked.lock().unwrap();
    assert_eq!(acked.len(), 1, "exactly one delivered event");
    let event = &acked[0];
    assert_eq!(event.best_plate.plate, "ABC123");
    assert!((event.best_plate.confidence - 0.95).abs() < 1e-6);
    assert_eq!(event.frame_count, 3);
    assert_eq!(event.agent_uid, "agent-0042");
    assert_eq!(event.company_id, "acme");

    // Source image persisted under the best frame's uuid.
    let stored = store_dir.join(format!("{}.jpg", event.best_uuid));
    assert!(stored.exists(), "missing {}", stored.display());

    // All member sources deleted after delivery; junk retained.
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(!watch_dir.join(name).exists(), "{name} not deleted");
    }
    assert!(watch_dir.join("notes.txt").exists());
}

#[test]
fn empty_directory_is_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let watch_dir = dir.path().join("watch");
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&watch_dir).expect("watch dir");

    let cfg = test_config(watch_dir.clone(), store_dir.clone());
    let store = FilesystemImageStore::new(&store_dir).expect("store");
    let mut intake = Intake::new(
        &cfg,
        identity(),
        Box::new(StubRecognizer::default()),
        Box::new(StubClassifier),
        Box::new(store),
        Box::new(CapturingCollector {
            acked: Arc::new(Mutex::new(Vec::new())),
        }),
        Arc::new(AtomicBool::new(false)),
    );

    intake.run_once(&watch_dir).expect("run_once");
}

#[test]
fn trailing_burst_is_delivered_without_a_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let watch_dir = dir.path().join("watch");
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&watch_dir).expect("watch dir");

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_jpeg(&watch_dir.join(name));
    }

    let recognizer = StubRecognizer::default()
        .with_reading("a.jpg", "ABC123", 0.90)
        .with_reading("b.jpg", "ABC123", 0.95)
        .with_reading("c.jpg", "ABC123", 0.60);

    let acked = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = test_config(watch_dir.clone(), store_dir.clone());
    // A short window the wall clock can close between passes.
    cfg.grouping.max_delta_time_ms = 1_000;
    cfg.grouping.stale_after_ms = 20_000;
    let store = FilesystemImageStore::new(&store_dir).expect("store");
    let mut intake = Intake::new(
        &cfg,
        identity(),
        Box::new(recognizer),
        Box::new(StubClassifier),
        Box::new(store),
        Box::new(CapturingCollector {
            acked: acked.clone(),
        }),
        Arc::new(AtomicBool::new(false)),
    );

    intake.run_once(&watch_dir).expect("ingest pass");
    std::thread::sleep(Duration::from_millis(1_500));
    // No new files arrive; elapsed time alone must close the group.
    intake.run_once(&watch_dir).expect("idle pass");

    let acked = acked.lock().unwrap();
    assert_eq!(acked.len(), 1, "trailing burst delivered while running");
    let event = &acked[0];
    assert_eq!(event.best_plate.plate, "ABC123");
    assert_eq!(event.frame_count, 3);
    assert!(store_dir
        .join(format!("{}.jpg", event.best_uuid))
        .exists());
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(!watch_dir.join(name).exists(), "{name} not deleted");
    }
}

#[test]
fn failed_file_is_retried_on_the_next_pass() {
    let dir = tempfile::tempdir().expect("tempdir");
    let watch_dir = dir.path().join("watch");
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&watch_dir).expect("watch dir");

    // A half-written capture: present but not yet decodable.
    let late = watch_dir.join("late.jpg");
    fs::write(&late, b"partial write").expect("junk jpeg");

    let recognizer = StubRecognizer::default().with_reading("late.jpg", "ABC123", 0.9);
    let acked = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = test_config(watch_dir.clone(), store_dir.clone());
    cfg.grouping.min_plates_to_group = 1;
    let store = FilesystemImageStore::new(&store_dir).expect("store");
    let mut intake = Intake::new(
        &cfg,
        identity(),
        Box::new(recognizer),
        Box::new(StubClassifier),
        Box::new(store),
        Box::new(CapturingCollector {
            acked: acked.clone(),
        }),
        Arc::new(AtomicBool::new(false)),
    );

    intake.run_once(&watch_dir).expect("first pass");
    assert!(acked.lock().unwrap().is_empty());

    // The writer finishes; the next pass must pick the file up again.
    write_jpeg(&late);
    intake.run_once(&watch_dir).expect("second pass");
    intake.flush().expect("flush");

    assert_eq!(acked.lock().unwrap().len(), 1);
}

#[test]
fn files_are_not_reprocessed_across_passes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let watch_dir = dir.path().join("watch");
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&watch_dir).expect("watch dir");
    write_jpeg(&watch_dir.join("lone.jpg"));

    // Below the group minimum: no delivery, the file stays put.
    let recognizer = StubRecognizer::default().with_reading("lone.jpg", "ABC123", 0.9);
    let acked = Arc::new(Mutex::new(Vec::new()));
    let cfg = test_config(watch_dir.clone(), store_dir.clone());
    let store = FilesystemImageStore::new(&store_dir).expect("store");
    let mut intake = Intake::new(
        &cfg,
        identity(),
        Box::new(recognizer),
        Box::new(StubClassifier),
        Box::new(store),
        Box::new(CapturingCollector {
            acked: acked.clone(),
        }),
        Arc::new(AtomicBool::new(false)),
    );

    intake.run_once(&watch_dir).expect("first pass");
    intake.run_once(&watch_dir).expect("second pass");

    assert!(acked.lock().unwrap().is_empty());
    assert!(watch_dir.join("lone.jpg").exists());
}

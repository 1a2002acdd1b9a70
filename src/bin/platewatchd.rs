//! platewatchd - watched-directory plate event daemon
//!
//! This daemon:
//! 1. Scans the watched directory for captured images on an interval
//! 2. Resolves each frame's capture instant (embedded metadata or mtime)
//! 3. Runs the recognizer and groups detections into plate events
//! 4. Persists each event's source image to the local store, uploads the
//!    event to the remote collector, then deletes the source files
//! 5. Flushes open groups on shutdown

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use platewatch::{
    CliOverrides, FilesystemImageStore, HttpCollector, Intake, PlatewatchConfig, StubClassifier,
    StubRecognizer, TenantIdentity,
};

#[derive(Parser, Debug)]
#[command(
    name = "platewatchd",
    about = "Watched-directory plate event daemon"
)]
struct Args {
    /// Directory to watch for captured images
    #[arg(long)]
    watch_dir: Option<PathBuf>,

    /// Base URL of the remote collector
    #[arg(long)]
    collector_url: Option<String>,

    /// Keep source images after delivery instead of deleting them
    #[arg(long)]
    keep_originals: bool,

    /// Log to the console instead of the log file
    #[arg(long)]
    console_log: bool,

    /// Log file path used when not logging to the console
    #[arg(long, default_value = "platewatchd.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let cfg = PlatewatchConfig::load_with_overrides(&CliOverrides {
        watch_dir: args.watch_dir.clone(),
        collector_url: args.collector_url.clone(),
        keep_originals: args.keep_originals,
    })?;

    // Identity is mandatory: abort before entering the loop if missing.
    let identity = TenantIdentity::load(&cfg.agent_id_path, &cfg.company_id_path)?;
    log::info!(
        "platewatchd starting: agent={} company={}",
        identity.agent_id,
        identity.company_id
    );
    log::info!(
        "watching {} -> collector {} (keep_originals={})",
        cfg.watch_dir.display(),
        cfg.collector_url,
        cfg.keep_originals
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, shutting down after current file");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("install shutdown handler")?;

    let store = FilesystemImageStore::new(&cfg.store_dir)?;
    let collector = HttpCollector::new(&cfg.collector_url)?;

    // Recognition and classification are external capabilities; until a
    // real backend is wired in, the stub keeps the daemon runnable.
    let recognizer = StubRecognizer::default();
    let classifier = StubClassifier;
    log::warn!("recognizer backend: stub (no plates will be read)");

    let watch_dir = cfg.watch_dir.clone();
    let scan_interval = cfg.scan_interval;
    let mut intake = Intake::new(
        &cfg,
        identity,
        Box::new(recognizer),
        Box::new(classifier),
        Box::new(store),
        Box::new(collector),
        shutdown,
    );
    intake.run(&watch_dir, scan_interval)
}

fn init_logging(args: &Args) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if !args.console_log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.log_file)
            .with_context(|| format!("open log file {}", args.log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

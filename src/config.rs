use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use url::Url;

use crate::deliver::RetryPolicy;
use crate::frame::DEFAULT_QUEUE_CAPACITY;
use crate::group::GroupingParams;

const DEFAULT_WATCH_DIR: &str = "/var/spool/platewatch";
const DEFAULT_STORE_DIR: &str = "/var/lib/platewatch/store";
const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8093";
const DEFAULT_AGENT_ID_PATH: &str = "/etc/platewatch/agent_id";
const DEFAULT_COMPANY_ID_PATH: &str = "/etc/platewatch/company_id";
const DEFAULT_SCAN_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Deserialize, Default)]
struct PlatewatchConfigFile {
    watch_dir: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    collector_url: Option<String>,
    keep_originals: Option<bool>,
    scan_interval_ms: Option<u64>,
    queue_capacity: Option<usize>,
    identity: Option<IdentityConfigFile>,
    grouping: Option<GroupingConfigFile>,
    upload: Option<UploadConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct IdentityConfigFile {
    agent_id_path: Option<PathBuf>,
    company_id_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct GroupingConfigFile {
    min_plates_to_group: Option<usize>,
    min_confidence: Option<f32>,
    max_delta_time_ms: Option<i64>,
    stale_after_ms: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

/// Runtime configuration, resolved once at startup and owned for the
/// process lifetime.
///
/// Layering: defaults, then the JSON file named by `PLATEWATCH_CONFIG`,
/// then environment overrides, then CLI overrides, then validation.
#[derive(Clone, Debug)]
pub struct PlatewatchConfig {
    pub watch_dir: PathBuf,
    pub store_dir: PathBuf,
    pub collector_url: String,
    pub keep_originals: bool,
    pub scan_interval: Duration,
    pub queue_capacity: usize,
    pub agent_id_path: PathBuf,
    pub company_id_path: PathBuf,
    pub grouping: GroupingParams,
    pub upload: RetryPolicy,
}

/// CLI-provided overrides applied after file and environment layers.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub watch_dir: Option<PathBuf>,
    pub collector_url: Option<String>,
    pub keep_originals: bool,
}

impl PlatewatchConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_overrides(&CliOverrides::default())
    }

    pub fn load_with_overrides(cli: &CliOverrides) -> Result<Self> {
        let config_path = std::env::var("PLATEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.apply_cli(cli);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PlatewatchConfigFile) -> Self {
        let grouping_defaults = GroupingParams::default();
        let grouping_file = file.grouping.unwrap_or_default();
        let grouping = GroupingParams {
            min_plates_to_group: grouping_file
                .min_plates_to_group
                .unwrap_or(grouping_defaults.min_plates_to_group),
            min_confidence: grouping_file
                .min_confidence
                .unwrap_or(grouping_defaults.min_confidence),
            max_delta_time_ms: grouping_file
                .max_delta_time_ms
                .unwrap_or(grouping_defaults.max_delta_time_ms),
            stale_after_ms: grouping_file
                .stale_after_ms
                .unwrap_or(grouping_defaults.stale_after_ms),
        };

        let upload_defaults = RetryPolicy::default();
        let upload_file = file.upload.unwrap_or_default();
        let upload = RetryPolicy {
            max_attempts: upload_file.max_attempts.or(upload_defaults.max_attempts),
            base_delay: upload_file
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(upload_defaults.base_delay),
            max_delay: upload_file
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(upload_defaults.max_delay),
        };

        let identity = file.identity.unwrap_or_default();
        Self {
            watch_dir: file
                .watch_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WATCH_DIR)),
            store_dir: file
                .store_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            collector_url: file
                .collector_url
                .unwrap_or_else(|| DEFAULT_COLLECTOR_URL.to_string()),
            keep_originals: file.keep_originals.unwrap_or(false),
            scan_interval: Duration::from_millis(
                file.scan_interval_ms.unwrap_or(DEFAULT_SCAN_INTERVAL_MS),
            ),
            queue_capacity: file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            agent_id_path: identity
                .agent_id_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_ID_PATH)),
            company_id_path: identity
                .company_id_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPANY_ID_PATH)),
            grouping,
            upload,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("PLATEWATCH_WATCH_DIR") {
            if !dir.trim().is_empty() {
                self.watch_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("PLATEWATCH_STORE_DIR") {
            if !dir.trim().is_empty() {
                self.store_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("PLATEWATCH_COLLECTOR_URL") {
            if !url.trim().is_empty() {
                self.collector_url = url;
            }
        }
        if let Ok(keep) = std::env::var("PLATEWATCH_KEEP_ORIGINALS") {
            self.keep_originals = parse_bool(&keep)
                .ok_or_else(|| anyhow!("PLATEWATCH_KEEP_ORIGINALS must be a boolean"))?;
        }
        if let Ok(interval) = std::env::var("PLATEWATCH_SCAN_INTERVAL_MS") {
            let ms: u64 = interval.parse().map_err(|_| {
                anyhow!("PLATEWATCH_SCAN_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.scan_interval = Duration::from_millis(ms);
        }
        if let Ok(path) = std::env::var("PLATEWATCH_AGENT_ID_PATH") {
            if !path.trim().is_empty() {
                self.agent_id_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("PLATEWATCH_COMPANY_ID_PATH") {
            if !path.trim().is_empty() {
                self.company_id_path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(dir) = &cli.watch_dir {
            self.watch_dir = dir.clone();
        }
        if let Some(url) = &cli.collector_url {
            self.collector_url = url.clone();
        }
        if cli.keep_originals {
            self.keep_originals = true;
        }
    }

    fn validate(&self) -> Result<()> {
        let parsed =
            Url::parse(&self.collector_url).map_err(|e| anyhow!("invalid collector url: {}", e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("collector url must be http(s)"));
        }
        if !(0.0..=1.0).contains(&self.grouping.min_confidence) {
            return Err(anyhow!("grouping.min_confidence must be within 0..=1"));
        }
        if self.grouping.min_plates_to_group == 0 {
            return Err(anyhow!("grouping.min_plates_to_group must be >= 1"));
        }
        if self.grouping.max_delta_time_ms <= 0 {
            return Err(anyhow!("grouping.max_delta_time_ms must be > 0"));
        }
        if self.grouping.stale_after_ms < self.grouping.max_delta_time_ms {
            return Err(anyhow!(
                "grouping.stale_after_ms must not be shorter than max_delta_time_ms"
            ));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be >= 1"));
        }
        if self.scan_interval.is_zero() {
            return Err(anyhow!("scan_interval_ms must be > 0"));
        }
        if self.upload.max_delay < self.upload.base_delay {
            return Err(anyhow!(
                "upload.max_delay_ms must not be shorter than base_delay_ms"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PlatewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

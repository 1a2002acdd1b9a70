//! Delivery pipeline: persist, upload, then delete.
//!
//! For each completed plate group, in order:
//!
//! 1. persist the best detection's source image in the local store,
//!    keyed by the group's best frame uuid (a failure here propagates
//!    immediately; no retry);
//! 2. upload the event payload to the remote collector, retrying per the
//!    configured `RetryPolicy` until acknowledged;
//! 3. only then delete the member source files. An already-absent file
//!    is success; the keep flag skips deletion entirely.
//!
//! With an uncapped policy the upload retries forever, blocking the
//! intake loop: ordering and at-least-once delivery are bought with
//! head-of-line blocking.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;

use crate::detect::VehicleAttributes;
use crate::group::PlateGroup;
use crate::identity::TenantIdentity;
use crate::store::ImageStore;
use crate::transport::{Collector, PlateEventPayload};

/// Upload retry policy: exponential backoff with jitter and an optional
/// attempt cap. `max_attempts: None` retries forever.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the number of attempts made.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = attempts_made.saturating_sub(1).min(16);
        let capped = base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay.as_millis() as u64)
            .max(1);
        // +-10% jitter so stalled agents do not retry in lockstep.
        let spread = (capped / 10).max(1);
        let jitter = rand::thread_rng().gen_range(0..=spread * 2);
        Duration::from_millis(capped - spread + jitter)
    }
}

/// Outcome summary for one delivered group.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub group_id: String,
    pub best_uuid: String,
    pub upload_attempts: u32,
    pub deleted: Vec<PathBuf>,
}

/// Persist-upload-delete executor for completed plate groups.
pub struct DeliveryPipeline {
    store: Box<dyn ImageStore>,
    collector: Box<dyn Collector>,
    policy: RetryPolicy,
    keep_originals: bool,
}

impl DeliveryPipeline {
    pub fn new(
        store: Box<dyn ImageStore>,
        collector: Box<dyn Collector>,
        policy: RetryPolicy,
        keep_originals: bool,
    ) -> Self {
        Self {
            store,
            collector,
            policy,
            keep_originals,
        }
    }

    pub fn deliver(
        &mut self,
        group: &PlateGroup,
        vehicle: &VehicleAttributes,
        identity: &TenantIdentity,
    ) -> Result<Delivery> {
        let best = group.best();
        self.store
            .save(&best.frame_uuid, &best.source_path)
            .with_context(|| format!("persist source image for group {}", group.id))?;

        let payload = PlateEventPayload::from_group(group, vehicle, identity);
        let upload_attempts = self.upload_with_retry(&payload)?;

        let deleted = if self.keep_originals {
            Vec::new()
        } else {
            self.delete_sources(group)
        };

        Ok(Delivery {
            group_id: group.id.clone(),
            best_uuid: best.frame_uuid.clone(),
            upload_attempts,
            deleted,
        })
    }

    fn upload_with_retry(&mut self, payload: &PlateEventPayload) -> Result<u32> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.collector.push(payload) {
                Ok(()) => return Ok(attempts),
                Err(e) => {
                    if let Some(max) = self.policy.max_attempts {
                        if attempts >= max {
                            return Err(e.context(format!(
                                "upload abandoned after {} attempt(s)",
                                attempts
                            )));
                        }
                    }
                    let delay = self.policy.delay_for(attempts);
                    log::warn!(
                        "upload attempt {} for plate {} failed: {:#}; retrying in {:?}",
                        attempts,
                        payload.best_plate.plate,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// Delete every distinct member source file. Runs only after the
    /// upload was acknowledged. Absence is success; other failures are
    /// logged and do not fail the delivery.
    fn delete_sources(&self, group: &PlateGroup) -> Vec<PathBuf> {
        let paths: BTreeSet<&PathBuf> = group.members.iter().map(|d| &d.source_path).collect();
        let mut deleted = Vec::new();
        for path in paths {
            match fs::remove_file(path) {
                Ok(()) => deleted.push(path.clone()),
                Err(e) if e.kind() == ErrorKind::NotFound => deleted.push(path.clone()),
                Err(e) => log::warn!("failed to delete {}: {}", path.display(), e),
            }
        }
        deleted
    }
}

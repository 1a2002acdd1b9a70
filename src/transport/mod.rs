//! Event payloads and the remote collector client.

mod collector;

use serde::{Deserialize, Serialize};

use crate::detect::VehicleAttributes;
use crate::group::PlateGroup;
use crate::identity::TenantIdentity;

pub use collector::{Collector, HttpCollector};

/// Structured payload uploaded for one completed plate group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlateEventPayload {
    pub best_plate: BestPlate,
    /// Unique identifier of the frame that produced the best detection;
    /// also the local store key for the persisted source image.
    pub best_uuid: String,
    pub confidence: f32,
    pub agent_uid: String,
    pub company_id: String,
    pub vehicle: VehicleAttributes,
    pub first_seen_epoch_ms: i64,
    pub last_seen_epoch_ms: i64,
    pub frame_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BestPlate {
    pub plate: String,
    pub confidence: f32,
}

impl PlateEventPayload {
    pub fn from_group(
        group: &PlateGroup,
        vehicle: &VehicleAttributes,
        identity: &TenantIdentity,
    ) -> Self {
        let best = group.best();
        Self {
            best_plate: BestPlate {
                plate: best.plate.clone(),
                confidence: best.confidence,
            },
            best_uuid: best.frame_uuid.clone(),
            confidence: best.confidence,
            agent_uid: identity.agent_id.clone(),
            company_id: identity.company_id.clone(),
            vehicle: vehicle.clone(),
            first_seen_epoch_ms: group.first_seen_ms,
            last_seen_epoch_ms: group.last_seen_ms,
            frame_count: group.members.len(),
        }
    }
}

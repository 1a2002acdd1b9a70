//! Grouping engine: accumulates per-frame detections into plate events.
//!
//! A burst of loosely related single-frame detections becomes one
//! deduplicated, confidence-filtered `PlateGroup`. A group completes once
//! it has enough members, its best confidence clears the floor, and its
//! temporal window has closed (no further detection can join), or when an
//! external flush forces closure. Groups that age out without meeting the
//! criteria move to the explicit `Expired` terminal state; expiry is a
//! silent, non-error outcome.
//!
//! The engine mutates only its own state and performs no I/O. Time
//! advances through submitted detection epochs and explicit `tick`
//! calls; the caller ticks with wall time so a trailing burst closes
//! even when no further detections arrive.

use uuid::Uuid;

use crate::detect::Detection;

/// Tunable thresholds for the grouping window.
#[derive(Clone, Copy, Debug)]
pub struct GroupingParams {
    /// Minimum member count before a group may complete.
    pub min_plates_to_group: usize,
    /// Confidence floor the best member must clear.
    pub min_confidence: f32,
    /// Maximum spread, in milliseconds, between any two member epochs.
    pub max_delta_time_ms: i64,
    /// Ineligible groups older than this are expired.
    pub stale_after_ms: i64,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            min_plates_to_group: 2,
            min_confidence: 0.75,
            max_delta_time_ms: 500,
            stale_after_ms: 5_000,
        }
    }
}

/// Lifecycle state of a plate group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupState {
    Open,
    Completed,
    Expired,
}

/// An in-progress or completed aggregate of detections believed to
/// represent the same physical plate sighting.
#[derive(Clone, Debug)]
pub struct PlateGroup {
    /// Unique identifier assigned at group creation.
    pub id: String,
    /// Member detections in arrival order.
    pub members: Vec<Detection>,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub state: GroupState,
    best: usize,
}

impl PlateGroup {
    fn open(detection: Detection) -> Self {
        let epoch = detection.epoch_ms;
        Self {
            id: Uuid::new_v4().to_string(),
            members: vec![detection],
            first_seen_ms: epoch,
            last_seen_ms: epoch,
            state: GroupState::Open,
            best: 0,
        }
    }

    fn append(&mut self, detection: Detection) {
        self.first_seen_ms = self.first_seen_ms.min(detection.epoch_ms);
        self.last_seen_ms = self.last_seen_ms.max(detection.epoch_ms);
        self.members.push(detection);

        let candidate = self.members.len() - 1;
        let incumbent = &self.members[self.best];
        let challenger = &self.members[candidate];
        // Highest confidence wins; ties go to the earliest capture epoch.
        if challenger.confidence > incumbent.confidence
            || (challenger.confidence == incumbent.confidence
                && challenger.epoch_ms < incumbent.epoch_ms)
        {
            self.best = candidate;
        }
    }

    /// Whether a detection may join: same canonical plate text, and the
    /// member epoch spread stays within the window.
    fn matches(&self, detection: &Detection, max_delta_time_ms: i64) -> bool {
        if self.state != GroupState::Open || self.plate() != detection.plate {
            return false;
        }
        let span_start = self.first_seen_ms.min(detection.epoch_ms);
        let span_end = self.last_seen_ms.max(detection.epoch_ms);
        span_end - span_start <= max_delta_time_ms
    }

    fn is_eligible(&self, params: &GroupingParams) -> bool {
        self.members.len() >= params.min_plates_to_group
            && self.best().confidence >= params.min_confidence
    }

    /// Highest-confidence member (ties broken by earliest epoch).
    pub fn best(&self) -> &Detection {
        &self.members[self.best]
    }

    /// Unique identifier of the frame that produced the best detection.
    pub fn best_uuid(&self) -> &str {
        &self.best().frame_uuid
    }

    /// Canonical plate text of the group.
    pub fn plate(&self) -> &str {
        &self.members[0].plate
    }
}

/// Accumulates detections into plate groups.
pub struct GroupingEngine {
    params: GroupingParams,
    open: Vec<PlateGroup>,
    expired: Vec<PlateGroup>,
    /// Logical clock: the latest detection epoch submitted so far.
    clock_ms: i64,
}

impl GroupingEngine {
    pub fn new(params: GroupingParams) -> Self {
        Self {
            params,
            open: Vec::new(),
            expired: Vec::new(),
            clock_ms: i64::MIN,
        }
    }

    /// Advance the logical clock to wall time so idle groups can close
    /// and expire without waiting for another detection.
    pub fn tick(&mut self, now_ms: i64) {
        self.clock_ms = self.clock_ms.max(now_ms);
    }

    /// Submit a detection: it joins the most recent matching open group
    /// or opens a new one.
    pub fn submit(&mut self, detection: Detection) {
        self.clock_ms = self.clock_ms.max(detection.epoch_ms);
        match self
            .open
            .iter_mut()
            .rev()
            .find(|group| group.matches(&detection, self.params.max_delta_time_ms))
        {
            Some(group) => group.append(detection),
            None => self.open.push(PlateGroup::open(detection)),
        }
    }

    /// Drain groups that became completable since the last call.
    ///
    /// A group completes when it is eligible and its window has closed
    /// (no future detection can join it). Ineligible groups past the
    /// staleness window move to `Expired`. Consuming and non-restartable.
    pub fn drain_completed(&mut self) -> Vec<PlateGroup> {
        let mut completed = Vec::new();
        let mut still_open = Vec::with_capacity(self.open.len());
        for mut group in self.open.drain(..) {
            let idle_ms = self.clock_ms - group.last_seen_ms;
            if idle_ms > self.params.max_delta_time_ms && group.is_eligible(&self.params) {
                group.state = GroupState::Completed;
                completed.push(group);
            } else if idle_ms > self.params.stale_after_ms {
                group.state = GroupState::Expired;
                self.expired.push(group);
            } else {
                still_open.push(group);
            }
        }
        self.open = still_open;
        completed
    }

    /// Force-close every open group: eligible groups complete, the rest
    /// expire. Used at shutdown so a trailing burst is not lost.
    pub fn flush(&mut self) -> Vec<PlateGroup> {
        let mut completed = Vec::new();
        for mut group in self.open.drain(..) {
            if group.is_eligible(&self.params) {
                group.state = GroupState::Completed;
                completed.push(group);
            } else {
                group.state = GroupState::Expired;
                self.expired.push(group);
            }
        }
        completed
    }

    /// Drain groups that reached the `Expired` terminal state.
    pub fn drain_expired(&mut self) -> Vec<PlateGroup> {
        std::mem::take(&mut self.expired)
    }

    pub fn open_len(&self) -> usize {
        self.open.len()
    }
}

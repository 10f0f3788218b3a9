// 🐾 Collectible Entity - capturable creatures and the zones they live in
//
// A collectible belongs to exactly one home zone and at most one species
// group. Its capture counter is the only state the unlock engine reads.

use crate::error::{Result, UnlockError};
use serde::{Deserialize, Serialize};

/// Upper bound of a capture counter
pub const MAX_CAPTURES: i64 = 10;

// ============================================================================
// COLLECTIBLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collectible {
    pub id: i64,

    /// Unique, lower-cased name
    pub name: String,

    pub image_url: Option<String>,

    /// Home zone (the only zone that counts for its area champion)
    pub zone_id: i64,

    /// Species group, if any
    pub species_id: Option<i64>,

    /// Number of captures, always within [0, MAX_CAPTURES]
    pub capture_count: i64,
}

impl Collectible {
    /// Compute the counter after applying `delta`, rejecting out-of-range results
    pub fn checked_capture_count(&self, delta: i64) -> Result<i64> {
        match self.capture_count.checked_add(delta) {
            Some(result) if (0..=MAX_CAPTURES).contains(&result) => Ok(result),
            // Overflowing deltas report the saturated sum
            _ => Err(UnlockError::CaptureOutOfRange {
                name: self.name.clone(),
                current: self.capture_count,
                delta,
                result: self.capture_count.saturating_add(delta),
            }),
        }
    }
}

// ============================================================================
// ZONE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    /// No native collectible captured yet
    Untouched,
    InProgress,
    /// Every native collectible captured at least once
    Complete,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Untouched => "untouched",
            ZoneStatus::InProgress => "in progress",
            ZoneStatus::Complete => "complete",
        }
    }
}

/// Capture progress of a zone's native collectibles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneProgress {
    pub zone: Zone,
    pub captured: i64,
    pub total: i64,
}

impl ZoneProgress {
    pub fn status(&self) -> ZoneStatus {
        if self.total > 0 && self.captured == self.total {
            ZoneStatus::Complete
        } else if self.captured > 0 {
            ZoneStatus::InProgress
        } else {
            ZoneStatus::Untouched
        }
    }
}

/// Collectibles that can be met in a zone: natives plus those also findable there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneListing {
    pub native: Vec<Collectible>,
    pub others: Vec<Collectible>,
}

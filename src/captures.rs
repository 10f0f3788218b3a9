// 🎯 Capture & Defeat Service - one transaction per request
//
// Applies capture deltas or a defeat toggle, runs the unlock evaluator inside
// the same transaction and commits once. Any error drops the transaction, so
// counters, flags and audit events are rolled back together.

use crate::db::{self, Event};
use crate::entities::{ChampionKind, Collectible};
use crate::error::{Result, UnlockError};
use crate::rules::RuleBook;
use crate::unlocks::{UnlockEvaluator, UnlockEvent, UnlockReport};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

const ACTOR: &str = "capture_service";

// ============================================================================
// REQUESTS & OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureUpdate {
    pub collectible_id: i64,
    pub delta: i64,
}

/// Parses `ID:DELTA`, e.g. `12:+1` or `12:-1`
impl FromStr for CaptureUpdate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (id, delta) = s
            .split_once(':')
            .ok_or_else(|| format!("expected ID:DELTA, got '{}'", s))?;

        Ok(CaptureUpdate {
            collectible_id: id
                .trim()
                .parse()
                .map_err(|_| format!("invalid collectible id '{}'", id))?,
            delta: delta
                .trim()
                .trim_start_matches('+')
                .parse()
                .map_err(|_| format!("invalid delta '{}'", delta))?,
        })
    }
}

impl fmt::Display for CaptureUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:+}", self.collectible_id, self.delta)
    }
}

/// Applied change for one collectible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFeedback {
    pub name: String,
    pub delta: i64,
    pub capture_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub captures: Vec<CaptureFeedback>,
    #[serde(flatten)]
    pub unlocks: UnlockReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefeatOutcome {
    pub kind: ChampionKind,
    pub id: i64,
    pub name: String,
    pub defeated: bool,
    /// Capstone created or retracted by this toggle
    pub capstone: Option<UnlockEvent>,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Apply a batch of capture deltas and evaluate unlock conditions.
///
/// Deltas for the same collectible accumulate. Negative-check mode is on
/// when any delta in the batch is negative.
pub fn apply_captures(
    conn: &mut Connection,
    rules: &RuleBook,
    updates: &[CaptureUpdate],
) -> Result<CaptureOutcome> {
    info!(updates = ?updates, "capture update requested");

    let tx = conn.transaction()?;

    // Look every collectible up before touching anything
    let mut current: HashMap<i64, Collectible> = HashMap::new();
    for update in updates {
        if !current.contains_key(&update.collectible_id) {
            let collectible = db::get_collectible(&tx, update.collectible_id)?
                .ok_or_else(|| UnlockError::not_found("collectible", update.collectible_id))?;
            current.insert(collectible.id, collectible);
        }
    }

    let mut feedback = Vec::with_capacity(updates.len());
    let mut touched: Vec<i64> = Vec::new();

    for update in updates {
        let collectible = current
            .get_mut(&update.collectible_id)
            .ok_or_else(|| UnlockError::not_found("collectible", update.collectible_id))?;

        let new_count = collectible.checked_capture_count(update.delta).map_err(|e| {
            warn!(name = %collectible.name, delta = update.delta, "capture update rejected");
            e
        })?;

        db::set_capture_count(&tx, collectible.id, new_count)?;
        collectible.capture_count = new_count;

        if !touched.contains(&collectible.id) {
            touched.push(collectible.id);
        }
        feedback.push(CaptureFeedback {
            name: collectible.name.clone(),
            delta: update.delta,
            capture_count: new_count,
        });
    }

    let touched: Vec<Collectible> = touched
        .iter()
        .filter_map(|id| current.get(id).cloned())
        .collect();
    let negative_check = updates.iter().any(|update| update.delta < 0);

    let unlocks = UnlockEvaluator::new(&tx, rules, negative_check).evaluate(&touched)?;

    db::insert_event(
        &tx,
        &Event::new(
            "captures_updated",
            "collectible_batch",
            &touched
                .iter()
                .map(|c| c.id.to_string())
                .collect::<Vec<_>>()
                .join(","),
            serde_json::json!({ "captures": feedback, "negative_check": negative_check }),
            ACTOR,
        ),
    )?;

    tx.commit()?;
    info!(collectibles = touched.len(), changes = unlocks.events().count(), "capture update committed");

    Ok(CaptureOutcome {
        captures: feedback,
        unlocks,
    })
}

/// Flip the defeated flag of a champion or prototype and evaluate the capstone.
///
/// Clearing a defeat enables retraction of the capstone.
pub fn set_defeated(
    conn: &mut Connection,
    rules: &RuleBook,
    kind: ChampionKind,
    id: i64,
    defeated: bool,
) -> Result<DefeatOutcome> {
    let tx = conn.transaction()?;

    let entity = db::get_unlockable(&tx, kind, id)?
        .ok_or_else(|| UnlockError::not_found(kind.as_str(), id))?;

    db::set_defeated(&tx, kind, id, defeated)?;
    db::insert_event(
        &tx,
        &Event::new(
            if defeated { "defeated" } else { "undefeated" },
            kind.reward_target(),
            &id.to_string(),
            serde_json::json!({ "name": entity.name }),
            ACTOR,
        ),
    )?;
    info!(%kind, name = %entity.name, defeated, "defeat flag updated");

    let capstone = UnlockEvaluator::new(&tx, rules, !defeated).evaluate_capstone()?;

    tx.commit()?;

    Ok(DefeatOutcome {
        kind,
        id,
        name: entity.name,
        defeated,
        capstone,
    })
}

/// Zero every capture counter and clear all created/defeated flags
pub fn reset_progress(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    db::reset_progress(&tx)?;
    db::insert_event(
        &tx,
        &Event::new("progress_reset", "store", "all", serde_json::json!({}), ACTOR),
    )?;

    tx.commit()?;
    info!("progress reset");

    Ok(())
}

// 🔓 Unlock Evaluator - recomputes which champions and prototypes exist
//
// Runs inside the caller's transaction:
// 1. Area champions of the zones touched by a capture batch
// 2. Species champions of the species groups touched
// 3. The ordinary prototype predicates, against the state left by 1-2
//
// The capstone prototype is evaluated only through `evaluate_capstone`,
// which callers invoke after a defeat flag changes.

mod predicates;
mod toggle;

#[cfg(test)]
mod tests;

pub use toggle::{decide, Transition};

use crate::db;
use crate::entities::{ChampionKind, Collectible, Reward, Unlockable};
use crate::error::{Result, UnlockError};
use crate::rules::RuleBook;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use toggle::Gate;
use tracing::{debug, info, warn};

// ============================================================================
// RESULTS
// ============================================================================

/// One created/retracted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockEvent {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    /// true when the entity was just created, false when retracted
    pub created: bool,
    /// Creation reward; never present on retraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
}

impl UnlockEvent {
    fn created(entity: &Unlockable, reward: Reward) -> Self {
        UnlockEvent {
            id: entity.id,
            name: entity.name.clone(),
            image_url: entity.image_url.clone(),
            created: true,
            reward: Some(reward),
        }
    }

    fn retracted(entity: &Unlockable) -> Self {
        UnlockEvent {
            id: entity.id,
            name: entity.name.clone(),
            image_url: entity.image_url.clone(),
            created: false,
            reward: None,
        }
    }
}

/// Diff produced by one evaluation; `None` means no change for that kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockReport {
    pub area_champions: Option<Vec<UnlockEvent>>,
    pub species_champions: Option<Vec<UnlockEvent>>,
    pub prototypes: Option<Vec<UnlockEvent>>,
}

impl UnlockReport {
    pub fn is_empty(&self) -> bool {
        self.area_champions.is_none() && self.species_champions.is_none() && self.prototypes.is_none()
    }

    /// All events, area first, then species, then prototypes
    pub fn events(&self) -> impl Iterator<Item = &UnlockEvent> {
        self.area_champions
            .iter()
            .chain(self.species_champions.iter())
            .chain(self.prototypes.iter())
            .flatten()
    }
}

fn non_empty(events: Vec<UnlockEvent>) -> Option<Vec<UnlockEvent>> {
    if events.is_empty() {
        None
    } else {
        Some(events)
    }
}

// ============================================================================
// EVALUATOR
// ============================================================================

pub struct UnlockEvaluator<'a> {
    conn: &'a Connection,
    rules: &'a RuleBook,
    /// Allow retraction; set when the triggering change undid progress
    negative_check: bool,
}

impl<'a> UnlockEvaluator<'a> {
    pub fn new(conn: &'a Connection, rules: &'a RuleBook, negative_check: bool) -> Self {
        UnlockEvaluator {
            conn,
            rules,
            negative_check,
        }
    }

    /// Evaluate area, species and prototype conditions after a capture batch
    pub fn evaluate(&self, touched: &[Collectible]) -> Result<UnlockReport> {
        info!(
            negative_check = self.negative_check,
            touched = ?touched.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "evaluating unlock conditions"
        );

        let area_champions = self.check_area_champions(touched)?;
        let species_champions = self.check_species_champions(touched)?;

        // Same connection: prototype counts below see the toggles above
        debug!("champion toggles applied, evaluating prototypes");
        let prototypes = self.check_prototypes()?;

        let report = UnlockReport {
            area_champions,
            species_champions,
            prototypes,
        };
        info!(changes = report.events().count(), "unlock evaluation finished");

        Ok(report)
    }

    pub fn check_area_champions(&self, touched: &[Collectible]) -> Result<Option<Vec<UnlockEvent>>> {
        let zones: BTreeSet<i64> = touched.iter().map(|c| c.zone_id).collect();
        let conn = self.conn;

        toggle::check_groups(
            conn,
            ChampionKind::Area,
            self.negative_check,
            zones,
            |zone_id| {
                Ok(db::get_area_champion_for_zone(conn, *zone_id)?
                    .map(|entity| Gate { entity, threshold: 1 }))
            },
            |zone_id, _| db::count_uncaptured_in_zone(conn, *zone_id),
        )
    }

    pub fn check_species_champions(
        &self,
        touched: &[Collectible],
    ) -> Result<Option<Vec<UnlockEvent>>> {
        let species: BTreeSet<i64> = touched.iter().filter_map(|c| c.species_id).collect();
        let conn = self.conn;

        toggle::check_groups(
            conn,
            ChampionKind::Species,
            self.negative_check,
            species,
            |species_id| {
                Ok(db::get_species_champion(conn, *species_id)?
                    .map(|(entity, required_count)| Gate {
                        entity,
                        threshold: required_count,
                    }))
            },
            |species_id, gate| db::count_species_below(conn, *species_id, gate.threshold),
        )
    }

    /// The ordinary prototypes; each predicate reads only aggregate state
    pub fn check_prototypes(&self) -> Result<Option<Vec<UnlockEvent>>> {
        let mut events = Vec::new();

        for binding in &self.rules.prototypes {
            if self.rules.is_capstone(&binding.prototype) {
                warn!(prototype = %binding.prototype, "capstone bound to an ordinary rule, ignoring");
                continue;
            }

            let prototype = self.prototype(&binding.prototype)?;
            let holds = predicates::rule_holds(self.conn, &binding.rule)?;
            debug!(prototype = %prototype.name, holds, "checked prototype rule");

            if let Some(event) = toggle::toggle(self.conn, &prototype, holds, self.negative_check)? {
                events.push(event);
            }
        }

        if !events.is_empty() {
            info!(
                prototypes = ?events.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
                "prototype changes"
            );
        }

        Ok(non_empty(events))
    }

    /// Evaluate the capstone prototype; call after any defeat flag toggle
    pub fn evaluate_capstone(&self) -> Result<Option<UnlockEvent>> {
        let capstone = self.prototype(&self.rules.capstone)?;
        let holds = predicates::capstone_holds(self.conn, capstone.id)?;
        debug!(capstone = %capstone.name, holds, "checked capstone");

        toggle::toggle(self.conn, &capstone, holds, self.negative_check)
    }

    fn prototype(&self, name: &str) -> Result<Unlockable> {
        db::get_unlockable_by_name(self.conn, ChampionKind::Prototype, name)?
            .ok_or_else(|| UnlockError::not_found("prototype", name))
    }
}

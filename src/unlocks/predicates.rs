// Global predicates for prototypes, read against the current transaction state

use crate::db;
use crate::entities::{ChampionKind, MAX_CAPTURES};
use crate::error::{Result, UnlockError};
use crate::rules::PrototypeRule;
use rusqlite::Connection;

/// Evaluate an ordinary prototype rule
pub(crate) fn rule_holds(conn: &Connection, rule: &PrototypeRule) -> Result<bool> {
    let holds = match rule {
        PrototypeRule::AreaChampionsCreated { at_least } => {
            db::count_by_created(conn, ChampionKind::Area, true)? >= *at_least
        }
        PrototypeRule::SpeciesChampionsCreated { at_least } => {
            db::count_by_created(conn, ChampionKind::Species, true)? >= *at_least
        }
        PrototypeRule::AllAreaChampionsCreated => {
            db::count_by_created(conn, ChampionKind::Area, false)? == 0
        }
        PrototypeRule::AllCollectiblesCaptured { at_least } => {
            db::count_collectibles_below(conn, *at_least)? == 0
        }
        PrototypeRule::ZoneCollectiblesCaptured {
            zone,
            collectibles,
            at_least,
        } => {
            let zone_row = db::get_zone_by_name(conn, zone)?
                .ok_or_else(|| UnlockError::not_found("zone", zone))?;

            let mut names = collectibles.clone();
            names.sort();
            names.dedup();

            let (found, below) =
                db::count_named_in_zone_below(conn, zone_row.id, &names, *at_least)?;

            if found != names.len() as i64 {
                return Err(UnlockError::not_found(
                    "collectible",
                    format!("one of [{}] in {}", collectibles.join(", "), zone),
                ));
            }

            below == 0
        }
    };

    Ok(holds)
}

/// Everything captured to the maximum and every other entity defeated
pub(crate) fn capstone_holds(conn: &Connection, capstone_id: i64) -> Result<bool> {
    let all_captured = db::count_collectibles_below(conn, MAX_CAPTURES)? == 0;
    let areas_defeated = db::count_undefeated(conn, ChampionKind::Area, None)? == 0;
    let species_defeated = db::count_undefeated(conn, ChampionKind::Species, None)? == 0;
    let prototypes_defeated =
        db::count_undefeated(conn, ChampionKind::Prototype, Some(capstone_id))? == 0;

    Ok(all_captured && areas_defeated && species_defeated && prototypes_defeated)
}

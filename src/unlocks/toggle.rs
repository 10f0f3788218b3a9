// Threshold-gated create/retract toggle shared by every derived entity

use super::UnlockEvent;
use crate::db::{self, Event};
use crate::entities::{ChampionKind, Unlockable, CREATION_REWARD};
use crate::error::{Result, UnlockError};
use rusqlite::Connection;
use std::fmt::Debug;
use tracing::{debug, info};

const ACTOR: &str = "unlock_evaluator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Retract,
}

/// Decide what happens to an entity given its current flag and predicate.
///
/// Retraction needs both a created entity and negative-check mode.
pub fn decide(created: bool, complete: bool, negative_check: bool) -> Option<Transition> {
    if complete && !created {
        Some(Transition::Create)
    } else if created && negative_check && !complete {
        Some(Transition::Retract)
    } else {
        None
    }
}

/// Gating entity of a group plus the capture count every member must reach
pub(crate) struct Gate {
    pub entity: Unlockable,
    pub threshold: i64,
}

/// Apply the toggle to a single entity, writing the flag and returning the event
pub(crate) fn toggle(
    conn: &Connection,
    entity: &Unlockable,
    complete: bool,
    negative_check: bool,
) -> Result<Option<UnlockEvent>> {
    let transition = match decide(entity.created, complete, negative_check) {
        Some(transition) => transition,
        None => return Ok(None),
    };

    let event = match transition {
        Transition::Create => {
            let reward = db::get_reward(conn, entity.kind, entity.id, CREATION_REWARD)?
                .ok_or_else(|| {
                    UnlockError::not_found(
                        "creation reward",
                        format!("{} {}", entity.kind, entity.name),
                    )
                })?;

            db::set_created(conn, entity.kind, entity.id, true)?;
            info!(kind = %entity.kind, name = %entity.name, item = %reward.item, quantity = reward.quantity, "created");
            UnlockEvent::created(entity, reward)
        }
        Transition::Retract => {
            db::set_created(conn, entity.kind, entity.id, false)?;
            info!(kind = %entity.kind, name = %entity.name, "retracted");
            UnlockEvent::retracted(entity)
        }
    };

    let event_type = format!(
        "{}_{}",
        entity.kind.reward_target(),
        if event.created { "created" } else { "retracted" }
    );
    db::insert_event(
        conn,
        &Event::new(
            &event_type,
            entity.kind.reward_target(),
            &entity.id.to_string(),
            serde_json::json!({ "name": event.name, "reward": event.reward }),
            ACTOR,
        ),
    )?;

    Ok(Some(event))
}

/// Run the toggle over a set of groups (zones, species).
///
/// `gate` resolves the group's entity (`None` skips the group); `missing`
/// counts members below the gate's threshold.
pub(crate) fn check_groups<G, L, M>(
    conn: &Connection,
    kind: ChampionKind,
    negative_check: bool,
    groups: impl IntoIterator<Item = G>,
    mut gate: L,
    mut missing: M,
) -> Result<Option<Vec<UnlockEvent>>>
where
    G: Debug,
    L: FnMut(&G) -> Result<Option<Gate>>,
    M: FnMut(&G, &Gate) -> Result<i64>,
{
    let mut events = Vec::new();

    for group in groups {
        let gate = match gate(&group)? {
            Some(gate) => gate,
            None => {
                debug!(%kind, ?group, "no entity registered for group, skipping");
                continue;
            }
        };

        let missing_count = missing(&group, &gate)?;
        debug!(
            %kind,
            name = %gate.entity.name,
            threshold = gate.threshold,
            missing = missing_count,
            "checked group"
        );

        if let Some(event) = toggle(conn, &gate.entity, missing_count == 0, negative_check)? {
            events.push(event);
        }
    }

    Ok(super::non_empty(events))
}

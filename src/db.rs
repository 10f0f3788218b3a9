// 🗄️ Persistence - SQLite store for collectibles, champions, prototypes and rewards
//
// Every function takes an explicit `&Connection`. Callers that need atomicity
// pass a `rusqlite::Transaction` (it derefs to `Connection`), so reads issued
// later in the same transaction observe earlier writes.

use crate::entities::{
    ChampionKind, Collectible, Reward, Unlockable, Zone, ZoneListing, ZoneProgress,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Event for audit trail ("Every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Zones and collectibles
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS zones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            image_url TEXT UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS species_champions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            image_url TEXT UNIQUE,
            required_count INTEGER NOT NULL,
            created INTEGER NOT NULL DEFAULT 0,
            defeated INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collectibles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            image_url TEXT UNIQUE,
            zone_id INTEGER NOT NULL REFERENCES zones(id) ON UPDATE CASCADE,
            species_id INTEGER REFERENCES species_champions(id) ON UPDATE CASCADE,
            capture_count INTEGER NOT NULL DEFAULT 0
                CHECK (capture_count BETWEEN 0 AND 10)
        )",
        [],
    )?;

    // Additional zones a collectible can be met in (discovery listings only)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS can_be_found (
            collectible_id INTEGER NOT NULL REFERENCES collectibles(id) ON UPDATE CASCADE,
            zone_id INTEGER NOT NULL REFERENCES zones(id) ON UPDATE CASCADE,
            PRIMARY KEY (collectible_id, zone_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Derived entities
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS area_champions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            image_url TEXT UNIQUE,
            zone_id INTEGER UNIQUE REFERENCES zones(id) ON UPDATE CASCADE,
            created INTEGER NOT NULL DEFAULT 0,
            defeated INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS prototypes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            image_url TEXT UNIQUE,
            creation_rule TEXT,
            created INTEGER NOT NULL DEFAULT 0,
            defeated INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Rewards
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rewards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reward_type TEXT NOT NULL,
            item_id INTEGER NOT NULL REFERENCES items(id) ON UPDATE CASCADE,
            quantity INTEGER NOT NULL,
            target_kind TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            UNIQUE (reward_type, target_kind, target_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_collectibles_zone ON collectibles(zone_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_collectibles_species ON collectibles(species_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const COLLECTIBLE_COLUMNS: &str = "id, name, image_url, zone_id, species_id, capture_count";

fn collectible_from_row(row: &Row) -> rusqlite::Result<Collectible> {
    Ok(Collectible {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        zone_id: row.get(3)?,
        species_id: row.get(4)?,
        capture_count: row.get(5)?,
    })
}

const UNLOCKABLE_COLUMNS: &str = "id, name, image_url, created, defeated";

fn unlockable_from_row(kind: ChampionKind, row: &Row) -> rusqlite::Result<Unlockable> {
    Ok(Unlockable {
        kind,
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        created: row.get(3)?,
        defeated: row.get(4)?,
    })
}

fn zone_from_row(row: &Row) -> rusqlite::Result<Zone> {
    Ok(Zone {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
    })
}

// ============================================================================
// INSERTS (catalog installation)
// ============================================================================

pub fn insert_zone(conn: &Connection, name: &str, image_url: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO zones (name, image_url) VALUES (?1, ?2)",
        params![name, image_url],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_species_champion(
    conn: &Connection,
    name: &str,
    image_url: &str,
    required_count: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO species_champions (name, image_url, required_count) VALUES (?1, ?2, ?3)",
        params![name, image_url, required_count],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_collectible(
    conn: &Connection,
    name: &str,
    image_url: &str,
    zone_id: i64,
    species_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO collectibles (name, image_url, zone_id, species_id, capture_count)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![name, image_url, zone_id, species_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_findable(conn: &Connection, collectible_id: i64, zone_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO can_be_found (collectible_id, zone_id) VALUES (?1, ?2)",
        params![collectible_id, zone_id],
    )?;
    Ok(())
}

pub fn insert_area_champion(
    conn: &Connection,
    name: &str,
    image_url: &str,
    zone_id: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO area_champions (name, image_url, zone_id) VALUES (?1, ?2, ?3)",
        params![name, image_url, zone_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_prototype(
    conn: &Connection,
    name: &str,
    image_url: &str,
    creation_rule: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO prototypes (name, image_url, creation_rule) VALUES (?1, ?2, ?3)",
        params![name, image_url, creation_rule],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Attach a reward to a champion or prototype, creating the item on first use
pub fn insert_reward(
    conn: &Connection,
    kind: ChampionKind,
    target_id: i64,
    reward_type: &str,
    reward: &Reward,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO items (name) VALUES (?1)",
        params![reward.item],
    )?;
    let item_id: i64 = conn.query_row(
        "SELECT id FROM items WHERE name = ?1",
        params![reward.item],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO rewards (reward_type, item_id, quantity, target_kind, target_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![reward_type, item_id, reward.quantity, kind.reward_target(), target_id],
    )?;
    Ok(())
}

// ============================================================================
// COLLECTIBLES
// ============================================================================

pub fn get_collectible(conn: &Connection, id: i64) -> Result<Option<Collectible>> {
    let collectible = conn
        .query_row(
            &format!("SELECT {} FROM collectibles WHERE id = ?1", COLLECTIBLE_COLUMNS),
            params![id],
            collectible_from_row,
        )
        .optional()?;
    Ok(collectible)
}

pub fn get_all_collectibles(conn: &Connection) -> Result<Vec<Collectible>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM collectibles ORDER BY id",
        COLLECTIBLE_COLUMNS
    ))?;

    let collectibles = stmt
        .query_map([], collectible_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(collectibles)
}

pub fn get_zone_collectibles(conn: &Connection, zone_id: i64) -> Result<Vec<Collectible>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM collectibles WHERE zone_id = ?1 ORDER BY id",
        COLLECTIBLE_COLUMNS
    ))?;

    let collectibles = stmt
        .query_map(params![zone_id], collectible_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(collectibles)
}

pub fn set_capture_count(conn: &Connection, id: i64, capture_count: i64) -> Result<()> {
    conn.execute(
        "UPDATE collectibles SET capture_count = ?1 WHERE id = ?2",
        params![capture_count, id],
    )?;
    Ok(())
}

/// Native collectibles of a zone never captured
pub fn count_uncaptured_in_zone(conn: &Connection, zone_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM collectibles WHERE zone_id = ?1 AND capture_count = 0",
        params![zone_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Members of a species group still below the required capture count
pub fn count_species_below(conn: &Connection, species_id: i64, required_count: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM collectibles WHERE species_id = ?1 AND capture_count < ?2",
        params![species_id, required_count],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Collectibles (all zones) captured fewer than `threshold` times
pub fn count_collectibles_below(conn: &Connection, threshold: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM collectibles WHERE capture_count < ?1",
        params![threshold],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Named collectibles of one zone: `(found, below_threshold)`
pub fn count_named_in_zone_below(
    conn: &Connection,
    zone_id: i64,
    names: &[String],
    threshold: i64,
) -> Result<(i64, i64)> {
    if names.is_empty() {
        return Ok((0, 0));
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(capture_count < ?), 0)
         FROM collectibles
         WHERE zone_id = ? AND name IN ({})",
        placeholders
    );

    let mut args: Vec<&dyn ToSql> = vec![&threshold, &zone_id];
    args.extend(names.iter().map(|name| name as &dyn ToSql));

    let counts = conn.query_row(&sql, args.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(counts)
}

// ============================================================================
// ZONES
// ============================================================================

pub fn get_zone(conn: &Connection, id: i64) -> Result<Option<Zone>> {
    let zone = conn
        .query_row(
            "SELECT id, name, image_url FROM zones WHERE id = ?1",
            params![id],
            zone_from_row,
        )
        .optional()?;
    Ok(zone)
}

pub fn get_zone_by_name(conn: &Connection, name: &str) -> Result<Option<Zone>> {
    let zone = conn
        .query_row(
            "SELECT id, name, image_url FROM zones WHERE name = ?1",
            params![name.to_lowercase()],
            zone_from_row,
        )
        .optional()?;
    Ok(zone)
}

/// Capture progress per zone, in zone id order
pub fn get_zone_progress(conn: &Connection) -> Result<Vec<ZoneProgress>> {
    let mut stmt = conn.prepare(
        "SELECT z.id, z.name, z.image_url,
                COALESCE(SUM(c.capture_count > 0), 0) AS captured,
                COUNT(c.id) AS total
         FROM zones z
         LEFT JOIN collectibles c ON c.zone_id = z.id
         GROUP BY z.id, z.name, z.image_url
         ORDER BY z.id",
    )?;

    let progress = stmt
        .query_map([], |row| {
            Ok(ZoneProgress {
                zone: zone_from_row(row)?,
                captured: row.get(3)?,
                total: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(progress)
}

/// Natives of a zone plus the collectibles that can also be found there
pub fn get_zone_listing(conn: &Connection, zone_id: i64) -> Result<ZoneListing> {
    let native = get_zone_collectibles(conn, zone_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM collectibles
         WHERE id IN (SELECT collectible_id FROM can_be_found WHERE zone_id = ?1)
           AND zone_id != ?1
         ORDER BY id",
        COLLECTIBLE_COLUMNS
    ))?;

    let others = stmt
        .query_map(params![zone_id], collectible_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ZoneListing { native, others })
}

// ============================================================================
// CHAMPIONS & PROTOTYPES
// ============================================================================

pub fn get_unlockable(conn: &Connection, kind: ChampionKind, id: i64) -> Result<Option<Unlockable>> {
    let unlockable = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", UNLOCKABLE_COLUMNS, kind.table()),
            params![id],
            |row| unlockable_from_row(kind, row),
        )
        .optional()?;
    Ok(unlockable)
}

pub fn get_unlockable_by_name(
    conn: &Connection,
    kind: ChampionKind,
    name: &str,
) -> Result<Option<Unlockable>> {
    let unlockable = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE name = ?1", UNLOCKABLE_COLUMNS, kind.table()),
            params![name.to_lowercase()],
            |row| unlockable_from_row(kind, row),
        )
        .optional()?;
    Ok(unlockable)
}

pub fn get_unlockables(conn: &Connection, kind: ChampionKind) -> Result<Vec<Unlockable>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY id",
        UNLOCKABLE_COLUMNS,
        kind.table()
    ))?;

    let unlockables = stmt
        .query_map([], |row| unlockable_from_row(kind, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(unlockables)
}

/// Rows of a kind currently unlocked
pub fn get_created_unlockables(conn: &Connection, kind: ChampionKind) -> Result<Vec<Unlockable>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE created = 1 ORDER BY id",
        UNLOCKABLE_COLUMNS,
        kind.table()
    ))?;

    let unlockables = stmt
        .query_map([], |row| unlockable_from_row(kind, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(unlockables)
}

pub fn get_area_champion_for_zone(conn: &Connection, zone_id: i64) -> Result<Option<Unlockable>> {
    let champion = conn
        .query_row(
            &format!("SELECT {} FROM area_champions WHERE zone_id = ?1", UNLOCKABLE_COLUMNS),
            params![zone_id],
            |row| unlockable_from_row(ChampionKind::Area, row),
        )
        .optional()?;
    Ok(champion)
}

/// Species champion together with its required capture count
pub fn get_species_champion(conn: &Connection, id: i64) -> Result<Option<(Unlockable, i64)>> {
    let champion = conn
        .query_row(
            &format!(
                "SELECT {}, required_count FROM species_champions WHERE id = ?1",
                UNLOCKABLE_COLUMNS
            ),
            params![id],
            |row| Ok((unlockable_from_row(ChampionKind::Species, row)?, row.get(5)?)),
        )
        .optional()?;
    Ok(champion)
}

pub fn set_created(conn: &Connection, kind: ChampionKind, id: i64, created: bool) -> Result<()> {
    conn.execute(
        &format!("UPDATE {} SET created = ?1 WHERE id = ?2", kind.table()),
        params![created, id],
    )?;
    Ok(())
}

pub fn set_defeated(conn: &Connection, kind: ChampionKind, id: i64, defeated: bool) -> Result<()> {
    conn.execute(
        &format!("UPDATE {} SET defeated = ?1 WHERE id = ?2", kind.table()),
        params![defeated, id],
    )?;
    Ok(())
}

/// Rows of a kind whose `created` flag equals `created`
pub fn count_by_created(conn: &Connection, kind: ChampionKind, created: bool) -> Result<i64> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE created = ?1", kind.table()),
        params![created],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Rows of a kind not yet defeated, optionally leaving one row out
pub fn count_undefeated(conn: &Connection, kind: ChampionKind, excluding: Option<i64>) -> Result<i64> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE defeated = 0 AND (?1 IS NULL OR id != ?1)",
            kind.table()
        ),
        params![excluding],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_reward(
    conn: &Connection,
    kind: ChampionKind,
    target_id: i64,
    reward_type: &str,
) -> Result<Option<Reward>> {
    let reward = conn
        .query_row(
            "SELECT i.name, r.quantity
             FROM rewards r
             JOIN items i ON i.id = r.item_id
             WHERE r.reward_type = ?1 AND r.target_kind = ?2 AND r.target_id = ?3",
            params![reward_type, kind.reward_target(), target_id],
            |row| {
                Ok(Reward {
                    item: row.get(0)?,
                    quantity: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(reward)
}

/// Zero every capture counter and clear all created/defeated flags
pub fn reset_progress(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE collectibles SET capture_count = 0", [])?;

    for kind in ChampionKind::ALL {
        conn.execute(
            &format!("UPDATE {} SET created = 0, defeated = 0", kind.table()),
            [],
        )?;
    }

    Ok(())
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

pub fn count_events(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    Ok(count)
}

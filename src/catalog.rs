// 📚 Catalog - zones, collectibles, champions, prototypes and their rewards
//
// Loaded from JSON and installed in a single transaction. Names are stored
// lower-cased; missing image references default to ../images/<kind>/<name>.png

use crate::db;
use crate::entities::{ChampionKind, Reward, CREATION_REWARD};
use crate::error::{Result, UnlockError};
use crate::rules::RuleBook;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub name: String,
    pub required_count: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reward: Option<Reward>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectibleEntry {
    pub name: String,
    /// Home zone name
    pub zone: String,
    #[serde(default)]
    pub species: Option<String>,
    /// Other zones the collectible can be met in
    #[serde(default)]
    pub also_found_in: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaChampionEntry {
    pub name: String,
    pub zone: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reward: Option<Reward>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeEntry {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Human-readable rule; derived from the rule book when absent
    #[serde(default)]
    pub creation_rule: Option<String>,
    #[serde(default)]
    pub reward: Option<Reward>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,
    #[serde(default)]
    pub species: Vec<SpeciesEntry>,
    #[serde(default)]
    pub collectibles: Vec<CollectibleEntry>,
    #[serde(default)]
    pub area_champions: Vec<AreaChampionEntry>,
    #[serde(default)]
    pub prototypes: Vec<PrototypeEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    pub zones: usize,
    pub species_champions: usize,
    pub collectibles: usize,
    pub area_champions: usize,
    pub prototypes: usize,
    pub rewards: usize,
}

fn default_image(dir: &str, name: &str) -> String {
    format!("../images/{}/{}.png", dir, name)
}

fn lookup(ids: &HashMap<String, i64>, kind: &'static str, name: &str) -> Result<i64> {
    ids.get(&name.to_lowercase())
        .copied()
        .ok_or_else(|| UnlockError::not_found(kind, name))
}

fn normalized(reward: &Reward) -> Reward {
    Reward {
        item: reward.item.to_lowercase(),
        quantity: reward.quantity,
    }
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Insert every entry; all-or-nothing.
    ///
    /// Missing `creation_rule` texts are described from `rules`, the rule book
    /// the engine will evaluate with.
    pub fn install(&self, conn: &mut Connection, rules: &RuleBook) -> Result<InstallSummary> {
        let tx = conn.transaction()?;
        let mut summary = InstallSummary::default();

        let mut zone_ids = HashMap::new();
        for zone in &self.zones {
            let name = zone.name.to_lowercase();
            let image = zone.image_url.clone().unwrap_or_else(|| default_image("zones", &name));
            zone_ids.insert(name.clone(), db::insert_zone(&tx, &name, &image)?);
            summary.zones += 1;
        }

        let mut species_ids = HashMap::new();
        for species in &self.species {
            let name = species.name.to_lowercase();
            let image = species
                .image_url
                .clone()
                .unwrap_or_else(|| default_image("species_champions", &name));
            let id = db::insert_species_champion(&tx, &name, &image, species.required_count)?;
            if let Some(reward) = &species.reward {
                db::insert_reward(&tx, ChampionKind::Species, id, CREATION_REWARD, &normalized(reward))?;
                summary.rewards += 1;
            }
            species_ids.insert(name, id);
            summary.species_champions += 1;
        }

        for collectible in &self.collectibles {
            let name = collectible.name.to_lowercase();
            let image = collectible
                .image_url
                .clone()
                .unwrap_or_else(|| default_image("collectibles", &name));
            let zone_id = lookup(&zone_ids, "zone", &collectible.zone)?;
            let species_id = collectible
                .species
                .as_deref()
                .map(|species| lookup(&species_ids, "species champion", species))
                .transpose()?;

            let id = db::insert_collectible(&tx, &name, &image, zone_id, species_id)?;
            for zone in &collectible.also_found_in {
                db::insert_findable(&tx, id, lookup(&zone_ids, "zone", zone)?)?;
            }
            summary.collectibles += 1;
        }

        for champion in &self.area_champions {
            let name = champion.name.to_lowercase();
            let image = champion
                .image_url
                .clone()
                .unwrap_or_else(|| default_image("area_champions", &name));
            let zone_id = lookup(&zone_ids, "zone", &champion.zone)?;
            let id = db::insert_area_champion(&tx, &name, &image, zone_id)?;
            if let Some(reward) = &champion.reward {
                db::insert_reward(&tx, ChampionKind::Area, id, CREATION_REWARD, &normalized(reward))?;
                summary.rewards += 1;
            }
            summary.area_champions += 1;
        }

        for prototype in &self.prototypes {
            let name = prototype.name.to_lowercase();
            let image = prototype
                .image_url
                .clone()
                .unwrap_or_else(|| default_image("prototypes", &name));
            let creation_rule = match &prototype.creation_rule {
                Some(rule) => rule.clone(),
                None if rules.is_capstone(&name) => {
                    "Capture every collectible 10 times and defeat every champion and prototype"
                        .to_string()
                }
                None => rules
                    .rule_for(&name)
                    .map(|rule| rule.describe())
                    .unwrap_or_default(),
            };

            let id = db::insert_prototype(&tx, &name, &image, &creation_rule)?;
            if let Some(reward) = &prototype.reward {
                db::insert_reward(&tx, ChampionKind::Prototype, id, CREATION_REWARD, &normalized(reward))?;
                summary.rewards += 1;
            }
            summary.prototypes += 1;
        }

        tx.commit()?;
        info!(?summary, "catalog installed");

        Ok(summary)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::entities::Unlockable;

    #[test]
    fn test_install_sample_catalog() {
        let mut conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let summary = Catalog::from_json(SAMPLE_CATALOG)
            .unwrap()
            .install(&mut conn, &RuleBook::default())
            .unwrap();

        assert_eq!(summary.zones, 4);
        assert_eq!(summary.collectibles, 10);
        assert_eq!(summary.area_champions, 3);
        assert_eq!(summary.species_champions, 3);
        assert_eq!(summary.prototypes, 8);
        assert_eq!(summary.rewards, 14);
    }

    #[test]
    fn test_names_are_lowercased_and_images_defaulted() {
        let conn = sample_world();

        let shinryu: Unlockable = db::get_unlockable_by_name(&conn, ChampionKind::Prototype, "Shinryu")
            .unwrap()
            .unwrap();
        assert_eq!(shinryu.name, "shinryu");
        assert_eq!(shinryu.image_url.as_deref(), Some("../images/prototypes/shinryu.png"));

        let reward = db::get_reward(&conn, ChampionKind::Prototype, shinryu.id, CREATION_REWARD)
            .unwrap()
            .unwrap();
        assert_eq!(reward.item, "equazione cubica");
    }

    #[test]
    fn test_creation_rule_defaults_from_rule_book() {
        let conn = sample_world();

        let rule: String = conn
            .query_row(
                "SELECT creation_rule FROM prototypes WHERE name = 'mangiaterra'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rule, "Create 2 area champions");
    }

    #[test]
    fn test_creation_rule_described_from_active_rule_book() {
        let rules = RuleBook::from_json(
            r#"{"prototypes": [
                {"prototype": "Mangiaterra", "rule": {"kind": "area_champions_created", "at_least": 3}}
            ]}"#,
        )
        .unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        Catalog::from_json(SAMPLE_CATALOG)
            .unwrap()
            .install(&mut conn, &rules)
            .unwrap();

        let creation_rule = |name: &str| -> String {
            conn.query_row(
                "SELECT creation_rule FROM prototypes WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap()
        };

        assert_eq!(creation_rule("mangiaterra"), "Create 3 area champions");
        assert_eq!(creation_rule("shinryu"), "", "not bound in this rule book");
    }

    #[test]
    fn test_findable_zones_in_listing() {
        let conn = sample_world();
        let gagazet = db::get_zone_by_name(&conn, "monte gagazet").unwrap().unwrap();

        let listing = db::get_zone_listing(&conn, gagazet.id).unwrap();

        assert_eq!(listing.native.len(), 4);
        assert_eq!(listing.others.len(), 1);
        assert_eq!(listing.others[0].name, "larva");
    }

    #[test]
    fn test_unknown_zone_rolls_back_install() {
        let mut catalog = Catalog::from_json(SAMPLE_CATALOG).unwrap();
        catalog.collectibles[0].zone = "zanarkand".to_string();

        let mut conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let err = catalog.install(&mut conn, &RuleBook::default()).unwrap_err();
        assert!(err.is_not_found());

        let zones: i64 = conn
            .query_row("SELECT COUNT(*) FROM zones", [], |row| row.get(0))
            .unwrap();
        assert_eq!(zones, 0, "failed install must leave the store empty");
    }
}

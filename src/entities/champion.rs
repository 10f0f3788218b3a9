// 🏆 Derived Entities - area champions, species champions and prototypes
//
// All three kinds share the same shape (name, image, created, defeated) and
// the same creation-reward lookup, so they are loaded into one `Unlockable`
// value tagged with its `ChampionKind`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reward type read by the unlock engine
pub const CREATION_REWARD: &str = "creation";

// ============================================================================
// CHAMPION KIND
// ============================================================================

/// Static dispatch table for the three derived entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChampionKind {
    Area,
    Species,
    Prototype,
}

impl ChampionKind {
    pub const ALL: [ChampionKind; 3] = [
        ChampionKind::Area,
        ChampionKind::Species,
        ChampionKind::Prototype,
    ];

    /// Table holding rows of this kind
    pub fn table(&self) -> &'static str {
        match self {
            ChampionKind::Area => "area_champions",
            ChampionKind::Species => "species_champions",
            ChampionKind::Prototype => "prototypes",
        }
    }

    /// Tag stored in `rewards.target_kind`
    pub fn reward_target(&self) -> &'static str {
        match self {
            ChampionKind::Area => "area_champion",
            ChampionKind::Species => "species_champion",
            ChampionKind::Prototype => "prototype",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChampionKind::Area => "area champion",
            ChampionKind::Species => "species champion",
            ChampionKind::Prototype => "prototype",
        }
    }
}

impl fmt::Display for ChampionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts both the short CLI form ("area") and the table/path form ("area_champions")
impl FromStr for ChampionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "area" | "area_champion" | "area_champions" => Ok(ChampionKind::Area),
            "species" | "species_champion" | "species_champions" => Ok(ChampionKind::Species),
            "prototype" | "prototypes" => Ok(ChampionKind::Prototype),
            other => Err(format!("unknown champion kind: {}", other)),
        }
    }
}

// ============================================================================
// REWARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Item name
    pub item: String,
    pub quantity: i64,
}

// ============================================================================
// UNLOCKABLE
// ============================================================================

/// A champion or prototype row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlockable {
    pub kind: ChampionKind,
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub created: bool,
    pub defeated: bool,
}

// 🏷️ Prototype Rules - Rules as Data
// Binds each prototype (by name) to the global predicate that unlocks it

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Global predicate gating an ordinary prototype
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrototypeRule {
    /// At least `at_least` area champions created
    AreaChampionsCreated { at_least: i64 },

    /// At least `at_least` species champions created
    SpeciesChampionsCreated { at_least: i64 },

    /// No area champion left uncreated
    AllAreaChampionsCreated,

    /// Every collectible captured at least `at_least` times
    AllCollectiblesCaptured { at_least: i64 },

    /// Named collectibles of one zone captured at least `at_least` times each
    ZoneCollectiblesCaptured {
        zone: String,
        collectibles: Vec<String>,
        at_least: i64,
    },
}

impl PrototypeRule {
    /// Human-readable rule, stored alongside the prototype
    pub fn describe(&self) -> String {
        match self {
            PrototypeRule::AreaChampionsCreated { at_least } => {
                format!("Create {} area champions", at_least)
            }
            PrototypeRule::SpeciesChampionsCreated { at_least } => {
                format!("Create {} species champions", at_least)
            }
            PrototypeRule::AllAreaChampionsCreated => "Create every area champion".to_string(),
            PrototypeRule::AllCollectiblesCaptured { at_least } => {
                format!("Capture every collectible {} times", at_least)
            }
            PrototypeRule::ZoneCollectiblesCaptured {
                zone,
                collectibles,
                at_least,
            } => format!(
                "Capture {} {} times each in {}",
                collectibles.join(", "),
                at_least,
                zone
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeBinding {
    /// Prototype name (matched case-insensitively)
    pub prototype: String,

    pub rule: PrototypeRule,
}

// ============================================================================
// RULE BOOK
// ============================================================================

/// The seven ordinary prototype bindings plus the capstone's name.
///
/// The capstone predicate is fixed (everything captured to the maximum and
/// everything else defeated) and only its name is configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    pub prototypes: Vec<PrototypeBinding>,

    #[serde(default = "default_capstone")]
    pub capstone: String,
}

fn default_capstone() -> String {
    "il supremo".to_string()
}

impl RuleBook {
    /// Load a rule book from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut book: RuleBook = serde_json::from_str(content)?;
        book.normalize();
        Ok(book)
    }

    /// Lower-case every name so lookups match the installed catalog, dropping
    /// repeated collectibles
    fn normalize(&mut self) {
        self.capstone = self.capstone.to_lowercase();
        for binding in &mut self.prototypes {
            binding.prototype = binding.prototype.to_lowercase();
            if let PrototypeRule::ZoneCollectiblesCaptured {
                zone, collectibles, ..
            } = &mut binding.rule
            {
                *zone = zone.to_lowercase();
                let mut seen = HashSet::new();
                collectibles.retain_mut(|name| {
                    *name = name.to_lowercase();
                    seen.insert(name.clone())
                });
            }
        }
    }

    pub fn rule_for(&self, prototype: &str) -> Option<&PrototypeRule> {
        let prototype = prototype.to_lowercase();
        self.prototypes
            .iter()
            .find(|binding| binding.prototype == prototype)
            .map(|binding| &binding.rule)
    }

    pub fn is_capstone(&self, prototype: &str) -> bool {
        self.capstone == prototype.to_lowercase()
    }

    /// Get number of ordinary bindings
    pub fn rule_count(&self) -> usize {
        self.prototypes.len()
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        let bind = |prototype: &str, rule| PrototypeBinding {
            prototype: prototype.to_string(),
            rule,
        };

        RuleBook {
            prototypes: vec![
                bind("mangiaterra", PrototypeRule::AreaChampionsCreated { at_least: 2 }),
                bind("titanosfera", PrototypeRule::SpeciesChampionsCreated { at_least: 2 }),
                bind("catastrophe", PrototypeRule::AreaChampionsCreated { at_least: 6 }),
                bind("vlakorados", PrototypeRule::SpeciesChampionsCreated { at_least: 6 }),
                bind("gasteropodos", PrototypeRule::AllAreaChampionsCreated),
                bind("ultima x", PrototypeRule::AllCollectiblesCaptured { at_least: 5 }),
                bind(
                    "shinryu",
                    PrototypeRule::ZoneCollectiblesCaptured {
                        zone: "monte gagazet".to_string(),
                        collectibles: vec![
                            "splasher".to_string(),
                            "aquelous".to_string(),
                            "echeneis".to_string(),
                        ],
                        at_least: 2,
                    },
                ),
            ],
            capstone: default_capstone(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

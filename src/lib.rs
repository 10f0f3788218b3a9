// Zoolab - Core Library
// Unlock engine for area champions, species champions and prototypes.
// Exposes all modules for use in CLI, API server, and tests

pub mod captures;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod rules;
pub mod unlocks;

// Re-export commonly used types
pub use captures::{
    apply_captures, reset_progress, set_defeated, CaptureFeedback, CaptureOutcome,
    CaptureUpdate, DefeatOutcome,
};
pub use catalog::{Catalog, InstallSummary};
pub use db::{get_events_for_entity, insert_event, setup_database, Event};
pub use entities::{
    ChampionKind, Collectible, Reward, Unlockable, Zone, ZoneListing, ZoneProgress, ZoneStatus,
    CREATION_REWARD, MAX_CAPTURES,
};
pub use error::{Result, UnlockError};
pub use rules::{PrototypeBinding, PrototypeRule, RuleBook};
pub use unlocks::{UnlockEvaluator, UnlockEvent, UnlockReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

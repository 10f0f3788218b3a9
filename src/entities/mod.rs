// Entity Models
// Collectibles live in zones and carry a capture counter; champions and
// prototypes are derived entities unlocked from aggregate capture state.
//
// Each derived entity has:
// - Stable integer identity (row id)
// - Mutable `created` / `defeated` flags
// - An optional creation reward

pub mod champion;
pub mod collectible;

pub use champion::{ChampionKind, Reward, Unlockable, CREATION_REWARD};
pub use collectible::{Collectible, Zone, ZoneListing, ZoneProgress, ZoneStatus, MAX_CAPTURES};

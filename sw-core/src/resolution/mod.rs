//! Sensor resolution
//!
//! Turns a logical metric plus a hardware scope into a concrete sensor:
//!
//! - `profiles` - compiled-in search profiles per metric
//! - `scorer` - per-sensor match scoring
//! - `search` - subtree walk and candidate ranking

pub mod profiles;
pub mod scorer;
pub mod search;

pub use profiles::{all_profiles, metrics, profile_for, MetricProfile, GPU_SLOTS};
pub use scorer::{score, similarity, MatchCandidate};
pub use search::{find_sensor, rank_candidates};

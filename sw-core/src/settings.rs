//! Tunable engine settings
//!
//! Every field defaults to the matching value in `constants`, so an empty JSON
//! object deserializes to the stock behavior.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use sw_error::{Result, SensorwatchError};

use crate::constants::{health, scoring};

/// Scoring thresholds used by the candidate scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub exact_match_score: f32,
    pub priority_exact_score: f32,
    pub fuzzy_accept_ratio: f32,
    pub priority_fuzzy_bonus: f32,
    pub min_candidate_score: f32,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            exact_match_score: scoring::EXACT_MATCH_SCORE,
            priority_exact_score: scoring::PRIORITY_EXACT_SCORE,
            fuzzy_accept_ratio: scoring::FUZZY_ACCEPT_RATIO,
            priority_fuzzy_bonus: scoring::PRIORITY_FUZZY_BONUS,
            min_candidate_score: scoring::MIN_CANDIDATE_SCORE,
        }
    }
}

/// Circuit breaker settings used by the health tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub max_consecutive_failures: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl HealthSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: health::MAX_CONSECUTIVE_FAILURES,
            initial_backoff_secs: health::INITIAL_BACKOFF_SECS,
            max_backoff_secs: health::MAX_BACKOFF_SECS,
        }
    }
}

/// All engine tunables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub scoring: ScoringSettings,
    pub health: HealthSettings,
}

impl EngineSettings {
    /// Reject combinations the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        for (field, value) in [
            ("scoring.exact_match_score", s.exact_match_score),
            ("scoring.priority_exact_score", s.priority_exact_score),
            ("scoring.priority_fuzzy_bonus", s.priority_fuzzy_bonus),
            ("scoring.min_candidate_score", s.min_candidate_score),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SensorwatchError::invalid_config(field, "must be a non-negative number"));
            }
        }
        if !(0.0..=1.0).contains(&s.fuzzy_accept_ratio) {
            return Err(SensorwatchError::invalid_config(
                "scoring.fuzzy_accept_ratio",
                "must be within 0.0..=1.0",
            ));
        }

        let h = &self.health;
        if h.max_consecutive_failures == 0 {
            return Err(SensorwatchError::invalid_config(
                "health.max_consecutive_failures",
                "must be at least 1",
            ));
        }
        if h.initial_backoff_secs == 0 {
            return Err(SensorwatchError::invalid_config(
                "health.initial_backoff_secs",
                "must be at least 1",
            ));
        }
        if h.max_backoff_secs < h.initial_backoff_secs {
            return Err(SensorwatchError::invalid_config(
                "health.max_backoff_secs",
                "must not be smaller than initial_backoff_secs",
            ));
        }
        Ok(())
    }
}

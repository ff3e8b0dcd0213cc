//! Engine configuration, one struct per component, aggregated into
//! [`EngineConfig`]. Everything has sensible defaults; parameter combinations
//! that would break the probabilistic models are rejected at construction.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Bayesian Knowledge Tracing priors applied to every skill of a new model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BktParams {
    /// Prior probability the skill is already mastered.
    pub p_init: f64,
    /// Probability of transitioning to mastered after one observation.
    pub p_learn: f64,
    /// Probability of answering wrong despite mastery.
    pub p_slip: f64,
    /// Probability of answering right without mastery.
    pub p_guess: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            p_init: 0.3,
            p_learn: 0.1,
            p_slip: 0.1,
            p_guess: 0.2,
        }
    }
}

impl BktParams {
    /// The model is only identifiable when slip and guess stay strictly
    /// inside (0,1) and do not sum to 1 or more.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.p_init) {
            return Err(EngineError::InvalidParams(format!(
                "pInit must be in [0,1], got {}",
                self.p_init
            )));
        }
        if !(0.0..=1.0).contains(&self.p_learn) {
            return Err(EngineError::InvalidParams(format!(
                "pLearn must be in [0,1], got {}",
                self.p_learn
            )));
        }
        if self.p_slip <= 0.0 || self.p_slip >= 1.0 {
            return Err(EngineError::InvalidParams(format!(
                "pSlip must be in (0,1), got {}",
                self.p_slip
            )));
        }
        if self.p_guess <= 0.0 || self.p_guess >= 1.0 {
            return Err(EngineError::InvalidParams(format!(
                "pGuess must be in (0,1), got {}",
                self.p_guess
            )));
        }
        if self.p_slip + self.p_guess >= 1.0 {
            return Err(EngineError::InvalidParams(format!(
                "pSlip + pGuess must stay below 1, got {}",
                self.p_slip + self.p_guess
            )));
        }
        Ok(())
    }
}

/// Memory scheduler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsConfig {
    /// Initial stability (days) per rating Again/Hard/Good/Easy. A new state
    /// starts at the Good value; a failed review resets to the Again value.
    pub initial_stability: [f64; 4],
    pub default_difficulty: f64,
    /// Retention probability the schedule aims for at review time.
    pub target_retention: f64,
    pub max_interval_days: f64,
    /// Base stability growth applied on successful recall.
    pub stability_growth: f64,
    /// Step by which difficulty moves on Hard (up) and Easy (down) ratings.
    pub difficulty_step: f64,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            initial_stability: [0.6, 1.2, 2.3, 4.0],
            default_difficulty: 0.3,
            target_retention: 0.9,
            max_interval_days: 365.0,
            stability_growth: 0.9,
            difficulty_step: 0.05,
        }
    }
}

impl FsrsConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_retention <= 0.0 || self.target_retention >= 1.0 {
            return Err(EngineError::InvalidParams(format!(
                "targetRetention must be in (0,1), got {}",
                self.target_retention
            )));
        }
        if self.initial_stability.iter().any(|s| *s <= 0.0) {
            return Err(EngineError::InvalidParams(
                "initialStability values must be positive".to_string(),
            ));
        }
        if self.max_interval_days <= 0.0 {
            return Err(EngineError::InvalidParams(
                "maxIntervalDays must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Diagnostic item selection and estimate conversion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticConfig {
    pub min_items_per_skill: usize,
    pub max_items_per_skill: usize,
    /// Weight of item difficulty when adjusting raw accuracy.
    pub difficulty_weight: f64,
    /// Prior assigned to skills with no diagnostic responses.
    pub default_prior: f64,
    /// Estimates at or above this value propagate to prerequisites.
    pub mastery_threshold: f64,
    /// Fraction of a mastered estimate a prerequisite is raised to.
    pub prerequisite_boost: f64,
    /// Contribution weight of an item's secondary skills.
    pub secondary_weight: f64,
    pub estimate_floor: f64,
    pub estimate_ceiling: f64,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            min_items_per_skill: 1,
            max_items_per_skill: 3,
            difficulty_weight: 0.3,
            default_prior: 0.3,
            mastery_threshold: 0.7,
            prerequisite_boost: 0.9,
            secondary_weight: 0.5,
            estimate_floor: 0.05,
            estimate_ceiling: 0.95,
        }
    }
}

/// Which transfer-test kinds gate skill completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    pub require_near_transfer: bool,
    pub require_far_transfer: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            require_near_transfer: true,
            require_far_transfer: false,
        }
    }
}

/// Session planner weights and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub enforce_spaced_retrieval: bool,
    pub require_transfer_tests: bool,
    /// Mastery probability at which a skill counts as mastered.
    pub mastery_threshold: f64,
    /// Mastery probability at which transfer tests become due.
    pub transfer_test_threshold: f64,
    pub review_base_priority: f64,
    /// Priority gained per day a review is overdue.
    pub overdue_weight: f64,
    pub transfer_priority: f64,
    pub error_base_priority: f64,
    /// Priority gained per recorded failure on a relearning skill.
    pub error_weight: f64,
    /// Upper bound on error-focused actions within one planned session.
    pub max_error_focus_items: usize,
    pub new_skill_base_priority: f64,
    pub consolidation_priority: f64,
    /// Minimum own mastery before consolidation practice is worthwhile.
    pub consolidation_min_mastery: f64,
    pub target_items: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enforce_spaced_retrieval: true,
            require_transfer_tests: true,
            mastery_threshold: 0.7,
            transfer_test_threshold: 0.8,
            review_base_priority: 60.0,
            overdue_weight: 5.0,
            transfer_priority: 70.0,
            error_base_priority: 45.0,
            error_weight: 10.0,
            max_error_focus_items: 3,
            new_skill_base_priority: 40.0,
            consolidation_priority: 25.0,
            consolidation_min_mastery: 0.4,
            target_items: 10,
        }
    }
}

/// Aggregate configuration handed to [`crate::engine::Engine::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub bkt: BktParams,
    pub fsrs: FsrsConfig,
    pub diagnostic: DiagnosticConfig,
    pub transfer: TransferConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.bkt.validate()?;
        self.fsrs.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn degenerate_slip_guess_rejected() {
        let mut params = BktParams::default();
        params.p_slip = 0.0;
        assert!(params.validate().is_err());

        let mut params = BktParams::default();
        params.p_guess = 1.0;
        assert!(params.validate().is_err());

        let mut params = BktParams::default();
        params.p_slip = 0.5;
        params.p_guess = 0.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn fsrs_retention_bounds_enforced() {
        let mut cfg = FsrsConfig::default();
        cfg.target_retention = 1.0;
        assert!(cfg.validate().is_err());
    }
}

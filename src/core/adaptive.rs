//! Adaptive model: Bayesian-style confidence update plus multiplicative skill
//!
//! Transitions per validation outcome:
//! - confidence' = prior·L / (prior·L + (1-prior)(1-L)), L = 0.8 on success, 0.2 on failure
//! - skill' = skill · 1.05 (success) or · 0.95 (failure), clamped to [1, 10]
//! - learning_rate' = 1 + (confidence' - 0.5)
//!
//! The likelihoods do not depend on the current skill level.

use crate::{
    CONFIDENCE_MAX, CONFIDENCE_MIN, LIKELIHOOD_FAILURE, LIKELIHOOD_SUCCESS, SKILL_DECAY,
    SKILL_GROWTH, SKILL_MAX, SKILL_MIN,
};
use crate::types::AdaptiveModel;

/// Apply one validation outcome. Deterministic: no clock, no RNG.
pub fn update_adaptive(model: &AdaptiveModel, success: bool) -> AdaptiveModel {
    let prior = model.confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);
    let likelihood = if success { LIKELIHOOD_SUCCESS } else { LIKELIHOOD_FAILURE };
    let evidence = prior * likelihood + (1.0 - prior) * (1.0 - likelihood);
    let confidence = ((prior * likelihood) / evidence).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);

    let factor = if success { SKILL_GROWTH } else { SKILL_DECAY };
    let skill_level = (model.skill_level * factor).clamp(SKILL_MIN, SKILL_MAX);

    AdaptiveModel {
        skill_level,
        confidence,
        learning_rate: 1.0 + (confidence - 0.5),
    }
}

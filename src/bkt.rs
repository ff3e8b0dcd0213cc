//! Learner model engine: Bayesian Knowledge Tracing.
//!
//! Each skill carries a mastery probability updated by Bayes' rule from
//! binary correct/incorrect observations. Updates are functional: every
//! transition takes a model by reference and returns a new one, so the
//! orchestrator owns all mutable storage and replay stays reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::BktParams;
use crate::graph::SkillGraph;

/// Floor for Bayesian denominators; guards the degenerate slip/guess corners.
const EPSILON: f64 = 1e-9;

/// Per-skill mastery estimate and its local BKT parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProbability {
    pub skill_id: String,
    pub p_mastery: f64,
    pub p_slip: f64,
    pub p_guess: f64,
    pub p_learn: f64,
    pub last_updated: i64,
}

impl SkillProbability {
    pub fn from_params(skill_id: &str, params: &BktParams, now: i64) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            p_mastery: params.p_init,
            p_slip: params.p_slip,
            p_guess: params.p_guess,
            p_learn: params.p_learn,
            last_updated: now,
        }
    }
}

/// One learner's mastery state across all skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerModel {
    pub learner_id: String,
    pub skills: BTreeMap<String, SkillProbability>,
    pub total_events: u64,
    pub created_at: i64,
    pub last_updated: i64,
}

/// Initializes every skill in the graph at the configured prior.
pub fn create_model(
    learner_id: &str,
    graph: &SkillGraph,
    params: &BktParams,
    now: i64,
) -> LearnerModel {
    let skills = graph
        .skill_ids()
        .iter()
        .map(|id| (id.clone(), SkillProbability::from_params(id, params, now)))
        .collect();
    LearnerModel {
        learner_id: learner_id.to_string(),
        skills,
        total_events: 0,
        created_at: now,
        last_updated: now,
    }
}

/// Bayesian posterior after one observation, then the learning step.
pub fn posterior_mastery(p_mastery: f64, correct: bool, slip: f64, guess: f64, learn: f64) -> f64 {
    let posterior = if correct {
        let p_correct = (1.0 - slip) * p_mastery + guess * (1.0 - p_mastery);
        (1.0 - slip) * p_mastery / p_correct.max(EPSILON)
    } else {
        let p_incorrect = slip * p_mastery + (1.0 - guess) * (1.0 - p_mastery);
        slip * p_mastery / p_incorrect.max(EPSILON)
    };
    (posterior + (1.0 - posterior) * learn).clamp(0.0, 1.0)
}

/// Applies one practice observation. Skills never seen before enter at the
/// configured prior rather than failing.
pub fn update_model(
    model: &LearnerModel,
    skill_id: &str,
    correct: bool,
    timestamp: i64,
    params: &BktParams,
) -> LearnerModel {
    let mut next = model.clone();
    let entry = next
        .skills
        .entry(skill_id.to_string())
        .or_insert_with(|| SkillProbability::from_params(skill_id, params, timestamp));
    entry.p_mastery = posterior_mastery(
        entry.p_mastery,
        correct,
        entry.p_slip,
        entry.p_guess,
        entry.p_learn,
    );
    entry.last_updated = timestamp;
    next.total_events += 1;
    next.last_updated = timestamp;
    next
}

/// Overwrites mastery from diagnostic estimates, preserving the other
/// parameters of each skill.
pub fn initialize_from_diagnostic(
    model: &LearnerModel,
    estimates: &BTreeMap<String, f64>,
    params: &BktParams,
    timestamp: i64,
) -> LearnerModel {
    let mut next = model.clone();
    for (skill_id, estimate) in estimates {
        let entry = next
            .skills
            .entry(skill_id.clone())
            .or_insert_with(|| SkillProbability::from_params(skill_id, params, timestamp));
        entry.p_mastery = estimate.clamp(0.0, 1.0);
        entry.last_updated = timestamp;
    }
    next.total_events += 1;
    next.last_updated = timestamp;
    next
}

/// Mastery for a skill, falling back to the prior for untouched skills.
pub fn mastery_of(model: &LearnerModel, skill_id: &str, params: &BktParams) -> f64 {
    model
        .skills
        .get(skill_id)
        .map(|s| s.p_mastery)
        .unwrap_or(params.p_init)
}

/// Skill ids below the mastery threshold, sorted alphabetically.
pub fn unmastered_skills(model: &LearnerModel, threshold: f64) -> Vec<String> {
    model
        .skills
        .values()
        .filter(|s| s.p_mastery < threshold)
        .map(|s| s.skill_id.clone())
        .collect()
}

pub fn average_mastery(model: &LearnerModel) -> f64 {
    if model.skills.is_empty() {
        return 0.0;
    }
    let sum: f64 = model.skills.values().map(|s| s.p_mastery).sum();
    sum / model.skills.len() as f64
}

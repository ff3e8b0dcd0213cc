//! Session planner: turns learner mastery, memory schedules, and the
//! transfer gate into a strictly ordered queue of next actions.
//!
//! Five tiers are evaluated in order and the first match wins: due reviews,
//! transfer tests, error-focused practice, new-skill introduction, then
//! consolidation. The numeric priority on each action is advisory metadata
//! for callers; tier order alone decides selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bkt::{mastery_of, LearnerModel};
use crate::config::{BktParams, SessionConfig, TransferConfig};
use crate::fsrs::{self, MemoryPhase, MemoryState};
use crate::graph::SkillGraph;
use crate::transfer::{self, TransferTest, TransferTestResult};

const MAX_PRIORITY: f64 = 100.0;
const NEW_SKILL_LEVERAGE_WEIGHT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Practice,
    Review,
    Diagnostic,
    TransferTest,
    Rest,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Review => "review",
            Self::Diagnostic => "diagnostic",
            Self::TransferTest => "transfer_test",
            Self::Rest => "rest",
        }
    }
}

/// A recommended next step. Ephemeral: produced on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub reason: String,
    pub priority: f64,
}

impl SessionAction {
    fn rest() -> Self {
        Self {
            action_type: ActionType::Rest,
            skill_id: None,
            item_id: None,
            reason: "No eligible actions; rest and let memory consolidate".to_string(),
            priority: 0.0,
        }
    }
}

/// Read-only view of everything the planner consults.
pub struct PlannerInput<'a> {
    pub graph: &'a SkillGraph,
    pub model: &'a LearnerModel,
    pub memory_states: &'a [MemoryState],
    pub transfer_tests: &'a [TransferTest],
    pub transfer_results: &'a [TransferTestResult],
    pub now: i64,
}

/// Summary of a planned session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_actions: usize,
    pub counts_by_type: std::collections::BTreeMap<String, usize>,
    pub unique_skills: usize,
    pub average_priority: f64,
}

/// Which of the five tiers produced an action. Internal bookkeeping so the
/// session loop never has to parse reason strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    DueReview,
    TransferTest,
    ErrorFocus,
    NewSkill,
    Consolidation,
    Rest,
}

/// First matching action across the five tiers, `Rest` when nothing applies.
pub fn next_action(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    transfer_config: &TransferConfig,
    params: &BktParams,
) -> SessionAction {
    next_action_filtered(input, config, transfer_config, params, &BTreeSet::new(), true).0
}

fn next_action_filtered(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    transfer_config: &TransferConfig,
    params: &BktParams,
    exclude: &BTreeSet<String>,
    error_budget_left: bool,
) -> (SessionAction, Tier) {
    if let Some(action) = due_review(input, config, exclude) {
        return (action, Tier::DueReview);
    }
    if let Some(action) = transfer_test(input, config, transfer_config, params, exclude) {
        return (action, Tier::TransferTest);
    }
    if error_budget_left {
        if let Some(action) = error_focus(input, config, exclude) {
            return (action, Tier::ErrorFocus);
        }
    }
    if let Some(action) = new_skill(input, config, params, exclude) {
        return (action, Tier::NewSkill);
    }
    if let Some(action) = consolidation(input, config, params, exclude) {
        return (action, Tier::Consolidation);
    }
    (SessionAction::rest(), Tier::Rest)
}

fn due_review(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    exclude: &BTreeSet<String>,
) -> Option<SessionAction> {
    if !config.enforce_spaced_retrieval {
        return None;
    }
    let due = fsrs::due_skills(input.memory_states.iter(), input.now);
    let state = due.into_iter().find(|s| !exclude.contains(&s.skill_id))?;
    let overdue = fsrs::overdue_days(state, input.now).max(0.0);
    Some(SessionAction {
        action_type: ActionType::Review,
        skill_id: Some(state.skill_id.clone()),
        item_id: None,
        reason: format!("Due review: {overdue:.1} days overdue"),
        priority: (config.review_base_priority + overdue * config.overdue_weight)
            .min(MAX_PRIORITY),
    })
}

fn transfer_test(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    transfer_config: &TransferConfig,
    params: &BktParams,
    exclude: &BTreeSet<String>,
) -> Option<SessionAction> {
    if !config.require_transfer_tests {
        return None;
    }
    let mut skill_ids: Vec<&String> = input.graph.skill_ids().iter().collect();
    skill_ids.sort();
    for skill_id in skill_ids {
        if exclude.contains(skill_id) {
            continue;
        }
        if mastery_of(input.model, skill_id, params) < config.transfer_test_threshold {
            continue;
        }
        if let Some(test) = transfer::next_test(
            skill_id,
            input.transfer_tests,
            input.transfer_results,
            transfer_config,
        ) {
            return Some(SessionAction {
                action_type: ActionType::TransferTest,
                skill_id: Some(skill_id.clone()),
                item_id: Some(test.id.clone()),
                reason: format!(
                    "Transfer test ({}) pending for mastered skill",
                    test.transfer_type.as_str()
                ),
                priority: config.transfer_priority.min(MAX_PRIORITY),
            });
        }
    }
    None
}

fn error_focus(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    exclude: &BTreeSet<String>,
) -> Option<SessionAction> {
    let mut relearning: Vec<&MemoryState> = input
        .memory_states
        .iter()
        .filter(|s| s.phase == MemoryPhase::Relearning && !exclude.contains(&s.skill_id))
        .collect();
    relearning.sort_by(|a, b| {
        b.failure_count
            .cmp(&a.failure_count)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    let state = relearning.first()?;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(state.skill_id.clone()),
        item_id: None,
        reason: format!(
            "Error-focused practice: {} recorded failures",
            state.failure_count
        ),
        priority: (config.error_base_priority
            + state.failure_count as f64 * config.error_weight)
            .min(MAX_PRIORITY),
    })
}

fn new_skill(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    params: &BktParams,
    exclude: &BTreeSet<String>,
) -> Option<SessionAction> {
    let mut candidates: Vec<(usize, &str)> = Vec::new();
    for skill in input.graph.skills() {
        if exclude.contains(&skill.id) {
            continue;
        }
        if mastery_of(input.model, &skill.id, params) >= config.mastery_threshold {
            continue;
        }
        let gated = skill
            .prerequisites
            .iter()
            .any(|p| mastery_of(input.model, p, params) < config.mastery_threshold);
        if gated {
            continue;
        }
        candidates.push((input.graph.direct_dependent_count(&skill.id), &skill.id));
    }
    // Highest leverage wins, alphabetical tie-break.
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    let (leverage, skill_id) = candidates.first()?;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(skill_id.to_string()),
        item_id: None,
        reason: format!(
            "New skill introduction: prerequisites mastered, {leverage} direct dependents"
        ),
        priority: (config.new_skill_base_priority
            + *leverage as f64 * NEW_SKILL_LEVERAGE_WEIGHT)
            .min(MAX_PRIORITY),
    })
}

fn consolidation(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    params: &BktParams,
    exclude: &BTreeSet<String>,
) -> Option<SessionAction> {
    let mut candidates: Vec<&str> = Vec::new();
    for skill in input.graph.skills() {
        if exclude.contains(&skill.id) {
            continue;
        }
        let mastery = mastery_of(input.model, &skill.id, params);
        if mastery >= config.mastery_threshold || mastery < config.consolidation_min_mastery {
            continue;
        }
        let has_gap = skill
            .prerequisites
            .iter()
            .any(|p| mastery_of(input.model, p, params) < config.mastery_threshold);
        if has_gap {
            candidates.push(&skill.id);
        }
    }
    candidates.sort();
    let skill_id = candidates.first()?;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(skill_id.to_string()),
        item_id: None,
        reason: "Consolidation practice while prerequisites catch up".to_string(),
        priority: config.consolidation_priority.min(MAX_PRIORITY),
    })
}

/// Plans a full session by repeatedly taking the next action, excluding
/// skills already chosen, until `target_items` is reached or nothing
/// remains. An empty plan falls back to a single rest action.
pub fn plan_session(
    input: &PlannerInput<'_>,
    config: &SessionConfig,
    transfer_config: &TransferConfig,
    params: &BktParams,
) -> Vec<SessionAction> {
    let mut actions = Vec::new();
    let mut exclude = BTreeSet::new();
    let mut error_focus_used = 0usize;

    while actions.len() < config.target_items {
        let (action, tier) = next_action_filtered(
            input,
            config,
            transfer_config,
            params,
            &exclude,
            error_focus_used < config.max_error_focus_items,
        );
        if tier == Tier::Rest {
            break;
        }
        if tier == Tier::ErrorFocus {
            error_focus_used += 1;
        }
        match &action.skill_id {
            Some(skill_id) => {
                exclude.insert(skill_id.clone());
            }
            None => break,
        }
        actions.push(action);
    }

    if actions.is_empty() {
        actions.push(SessionAction::rest());
    }
    actions
}

/// Aggregates a planned session for caller dashboards.
pub fn session_stats(actions: &[SessionAction]) -> SessionStats {
    let mut counts_by_type = std::collections::BTreeMap::new();
    let mut skills = BTreeSet::new();
    let mut priority_sum = 0.0;
    for action in actions {
        *counts_by_type
            .entry(action.action_type.as_str().to_string())
            .or_insert(0) += 1;
        if let Some(skill) = &action.skill_id {
            skills.insert(skill.clone());
        }
        priority_sum += action.priority;
    }
    SessionStats {
        total_actions: actions.len(),
        counts_by_type,
        unique_skills: skills.len(),
        average_priority: if actions.is_empty() {
            0.0
        } else {
            priority_sum / actions.len() as f64
        },
    }
}

//! Transfer gate: pure lookup/decision logic over required vs. passed
//! transfer tests per skill. A skill with no required tests is unlocked.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::TransferConfig;

/// Near transfer probes the same context; far transfer a substantially
/// different one. Near is always prioritized first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Near,
    Far,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Near => "near",
            Self::Far => "far",
        }
    }
}

/// A registered assessment gating one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTest {
    pub id: String,
    pub skill_id: String,
    pub transfer_type: TransferType,
    pub passing_score: f64,
}

/// Outcome of one attempted transfer test, appended per learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTestResult {
    pub test_id: String,
    pub passed: bool,
    pub score: f64,
    pub timestamp: i64,
}

/// Tests the gate requires for a skill: per enabled transfer type, exactly
/// the lexicographically-first matching test (deterministic among
/// duplicates).
pub fn required_tests<'a>(
    skill_id: &str,
    tests: &'a [TransferTest],
    config: &TransferConfig,
) -> Vec<&'a TransferTest> {
    let mut required = Vec::new();
    for (enabled, kind) in [
        (config.require_near_transfer, TransferType::Near),
        (config.require_far_transfer, TransferType::Far),
    ] {
        if !enabled {
            continue;
        }
        if let Some(test) = tests
            .iter()
            .filter(|t| t.skill_id == skill_id && t.transfer_type == kind)
            .min_by(|a, b| a.id.cmp(&b.id))
        {
            required.push(test);
        }
    }
    required
}

fn passed_ids(results: &[TransferTestResult]) -> BTreeSet<&str> {
    results
        .iter()
        .filter(|r| r.passed)
        .map(|r| r.test_id.as_str())
        .collect()
}

/// True iff every required test id appears among the passed results.
pub fn is_skill_unlocked(
    skill_id: &str,
    tests: &[TransferTest],
    results: &[TransferTestResult],
    config: &TransferConfig,
) -> bool {
    let passed = passed_ids(results);
    required_tests(skill_id, tests, config)
        .iter()
        .all(|t| passed.contains(t.id.as_str()))
}

/// Required tests not yet passed, near before far.
pub fn pending_tests<'a>(
    skill_id: &str,
    tests: &'a [TransferTest],
    results: &[TransferTestResult],
    config: &TransferConfig,
) -> Vec<&'a TransferTest> {
    let passed = passed_ids(results);
    let mut pending: Vec<&TransferTest> = required_tests(skill_id, tests, config)
        .into_iter()
        .filter(|t| !passed.contains(t.id.as_str()))
        .collect();
    pending.sort_by(|a, b| a.transfer_type.cmp(&b.transfer_type).then(a.id.cmp(&b.id)));
    pending
}

/// Next test to take for a skill, if any remain.
pub fn next_test<'a>(
    skill_id: &str,
    tests: &'a [TransferTest],
    results: &[TransferTestResult],
    config: &TransferConfig,
) -> Option<&'a TransferTest> {
    pending_tests(skill_id, tests, results, config)
        .into_iter()
        .next()
}

//! Diagnostic engine: cold-starts a learner by selecting a bounded item set
//! in prerequisite order and converting the responses into initial mastery
//! estimates with transitive prerequisite propagation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DiagnosticConfig;
use crate::graph::SkillGraph;

/// Catalog entry tying a practice item to its skills. Supplied externally,
/// read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSkillMapping {
    pub item_id: String,
    pub primary_skill_id: String,
    #[serde(default)]
    pub secondary_skill_ids: Vec<String>,
    /// Item difficulty in [0,1].
    pub difficulty: f64,
}

/// One entry of a generated diagnostic plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticItem {
    pub item_id: String,
    pub skill_id: String,
    pub difficulty: f64,
}

/// A learner's answer to one diagnostic item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResponse {
    pub item_id: String,
    pub correct: bool,
}

/// Selects up to `max_items` items, walking skills in topological order so
/// early skills are tested before their dependents. Per skill, items cover a
/// spread of difficulties. Truncation keeps topological precedence because
/// items are appended in walk order.
pub fn generate_diagnostic(
    graph: &SkillGraph,
    mappings: &[ItemSkillMapping],
    max_items: usize,
    config: &DiagnosticConfig,
) -> Vec<DiagnosticItem> {
    let mut by_skill: BTreeMap<&str, Vec<&ItemSkillMapping>> = BTreeMap::new();
    for mapping in mappings {
        by_skill
            .entry(mapping.primary_skill_id.as_str())
            .or_default()
            .push(mapping);
    }

    let mut plan = Vec::new();
    for skill_id in graph.topological_order() {
        let Some(items) = by_skill.get_mut(skill_id.as_str()) else {
            continue;
        };
        items.sort_by(|a, b| {
            a.difficulty
                .partial_cmp(&b.difficulty)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });

        for mapping in spread(items, config.min_items_per_skill, config.max_items_per_skill) {
            plan.push(DiagnosticItem {
                item_id: mapping.item_id.clone(),
                skill_id: skill_id.clone(),
                difficulty: mapping.difficulty,
            });
        }
    }

    plan.truncate(max_items);
    plan
}

/// Picks up to `max` items spanning the difficulty range: easiest, hardest,
/// and evenly spaced middles of the sorted slice.
fn spread<'a>(
    sorted: &[&'a ItemSkillMapping],
    min: usize,
    max: usize,
) -> Vec<&'a ItemSkillMapping> {
    let take = sorted.len().clamp(min.min(sorted.len()), max.max(1));
    if take >= sorted.len() {
        return sorted.to_vec();
    }
    if take == 1 {
        return vec![sorted[sorted.len() / 2]];
    }
    let mut picked = Vec::with_capacity(take);
    for i in 0..take {
        let idx = i * (sorted.len() - 1) / (take - 1);
        picked.push(sorted[idx]);
    }
    picked.dedup_by_key(|m| m.item_id.clone());
    picked
}

#[derive(Default)]
struct SkillAccumulator {
    weighted_correct: f64,
    weighted_attempts: f64,
    weighted_difficulty: f64,
}

/// Converts diagnostic responses into per-skill mastery estimates.
///
/// Raw accuracy is adjusted by average item difficulty, secondary skills
/// contribute at half weight, and every estimate is clamped into the
/// configured floor/ceiling. Skills with no responses get the default prior.
/// Finally, estimates at or above the mastery threshold raise each direct
/// prerequisite to at least `estimate * prerequisite_boost`; processing
/// dependents before their prerequisites makes the boost transitive.
pub fn analyze_results(
    graph: &SkillGraph,
    mappings: &[ItemSkillMapping],
    responses: &[DiagnosticResponse],
    config: &DiagnosticConfig,
) -> BTreeMap<String, f64> {
    let by_item: BTreeMap<&str, &ItemSkillMapping> = mappings
        .iter()
        .map(|m| (m.item_id.as_str(), m))
        .collect();

    let mut accumulators: BTreeMap<String, SkillAccumulator> = BTreeMap::new();
    for response in responses {
        let Some(mapping) = by_item.get(response.item_id.as_str()) else {
            tracing::warn!(item_id = %response.item_id, "diagnostic response for unknown item");
            continue;
        };
        let correct = if response.correct { 1.0 } else { 0.0 };
        let mut tally = |skill_id: &str, weight: f64| {
            let acc = accumulators.entry(skill_id.to_string()).or_default();
            acc.weighted_correct += weight * correct;
            acc.weighted_attempts += weight;
            acc.weighted_difficulty += weight * mapping.difficulty;
        };
        tally(&mapping.primary_skill_id, 1.0);
        for secondary in &mapping.secondary_skill_ids {
            tally(secondary, config.secondary_weight);
        }
    }

    let mut estimates: BTreeMap<String, f64> = BTreeMap::new();
    for skill_id in graph.skill_ids() {
        let estimate = match accumulators.get(skill_id) {
            Some(acc) if acc.weighted_attempts > 0.0 => {
                let accuracy = acc.weighted_correct / acc.weighted_attempts;
                let avg_difficulty = acc.weighted_difficulty / acc.weighted_attempts;
                let adjusted = accuracy + (avg_difficulty - 0.5) * config.difficulty_weight;
                adjusted.clamp(config.estimate_floor, config.estimate_ceiling)
            }
            _ => config.default_prior,
        };
        estimates.insert(skill_id.clone(), estimate);
    }

    // Dependents first, so a boost that lifts a prerequisite over the
    // threshold propagates onward to its own prerequisites.
    let mut order = graph.topological_order();
    order.reverse();
    for skill_id in order {
        let estimate = estimates[&skill_id];
        if estimate < config.mastery_threshold {
            continue;
        }
        let floor = estimate * config.prerequisite_boost;
        if let Some(skill) = graph.get(&skill_id) {
            for prereq in &skill.prerequisites {
                if let Some(current) = estimates.get_mut(prereq) {
                    if *current < floor {
                        *current = floor.clamp(config.estimate_floor, config.estimate_ceiling);
                    }
                }
            }
        }
    }

    estimates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Skill;

    fn graph() -> SkillGraph {
        SkillGraph::build(vec![
            Skill::new("base", "Base", &[]),
            Skill::new("mid", "Mid", &["base"]),
            Skill::new("top", "Top", &["mid"]),
        ])
        .unwrap()
    }

    fn mapping(item: &str, skill: &str, difficulty: f64) -> ItemSkillMapping {
        ItemSkillMapping {
            item_id: item.to_string(),
            primary_skill_id: skill.to_string(),
            secondary_skill_ids: vec![],
            difficulty,
        }
    }

    fn answer(item: &str, correct: bool) -> DiagnosticResponse {
        DiagnosticResponse {
            item_id: item.to_string(),
            correct,
        }
    }

    #[test]
    fn plan_follows_topological_order_and_truncates() {
        let graph = graph();
        let mappings = vec![
            mapping("t1", "top", 0.5),
            mapping("b1", "base", 0.2),
            mapping("b2", "base", 0.8),
            mapping("m1", "mid", 0.5),
        ];
        let config = DiagnosticConfig::default();

        let plan = generate_diagnostic(&graph, &mappings, 10, &config);
        let skills: Vec<&str> = plan.iter().map(|i| i.skill_id.as_str()).collect();
        assert_eq!(skills, vec!["base", "base", "mid", "top"]);

        let truncated = generate_diagnostic(&graph, &mappings, 2, &config);
        assert_eq!(truncated.len(), 2);
        assert!(truncated.iter().all(|i| i.skill_id == "base"));
    }

    #[test]
    fn per_skill_spread_covers_difficulty_range() {
        let graph = SkillGraph::build(vec![Skill::new("s", "S", &[])]).unwrap();
        let mappings = vec![
            mapping("i1", "s", 0.1),
            mapping("i2", "s", 0.3),
            mapping("i3", "s", 0.5),
            mapping("i4", "s", 0.7),
            mapping("i5", "s", 0.9),
        ];
        let config = DiagnosticConfig::default();
        let plan = generate_diagnostic(&graph, &mappings, 10, &config);
        assert_eq!(plan.len(), config.max_items_per_skill);
        assert!((plan.first().unwrap().difficulty - 0.1).abs() < 1e-9);
        assert!((plan.last().unwrap().difficulty - 0.9).abs() < 1e-9);
    }

    #[test]
    fn estimates_are_clamped() {
        let graph = SkillGraph::build(vec![Skill::new("s", "S", &[])]).unwrap();
        let config = DiagnosticConfig::default();

        let easy = vec![mapping("i1", "s", 0.9)];
        let est = analyze_results(&graph, &easy, &[answer("i1", true)], &config);
        assert!(est["s"] <= config.estimate_ceiling);

        let hard = vec![mapping("i1", "s", 0.1)];
        let est = analyze_results(&graph, &hard, &[answer("i1", false)], &config);
        assert!((est["s"] - config.estimate_floor).abs() < 1e-9);
    }

    #[test]
    fn unanswered_skills_get_default_prior() {
        let graph = graph();
        let config = DiagnosticConfig::default();
        let est = analyze_results(&graph, &[], &[], &config);
        for skill in ["base", "mid", "top"] {
            assert!((est[skill] - config.default_prior).abs() < 1e-9);
        }
    }

    #[test]
    fn difficulty_adjusts_accuracy() {
        let graph = SkillGraph::build(vec![Skill::new("s", "S", &[])]).unwrap();
        let config = DiagnosticConfig::default();
        // All correct on hard items scores higher than on easy items.
        let hard = analyze_results(
            &graph,
            &[mapping("i1", "s", 0.8)],
            &[answer("i1", true)],
            &config,
        );
        let easy = analyze_results(
            &graph,
            &[mapping("i1", "s", 0.2)],
            &[answer("i1", true)],
            &config,
        );
        assert!(hard["s"] > easy["s"]);
    }

    #[test]
    fn secondary_skills_count_at_half_weight() {
        let graph = SkillGraph::build(vec![
            Skill::new("p", "P", &[]),
            Skill::new("q", "Q", &[]),
        ])
        .unwrap();
        let config = DiagnosticConfig::default();
        let mut item = mapping("i1", "p", 0.5);
        item.secondary_skill_ids = vec!["q".to_string()];
        let est = analyze_results(&graph, &[item], &[answer("i1", true)], &config);
        // Same accuracy either way, so the estimates match; the weight shows
        // up when mixed with other evidence.
        assert!((est["p"] - est["q"]).abs() < 1e-9);

        let mut item1 = mapping("i1", "p", 0.5);
        item1.secondary_skill_ids = vec!["q".to_string()];
        let item2 = mapping("i2", "q", 0.5);
        let est = analyze_results(
            &graph,
            &[item1, item2],
            &[answer("i1", true), answer("i2", false)],
            &config,
        );
        // q: 0.5 weight correct + 1.0 weight incorrect => accuracy 1/3.
        assert!((est["q"] - (0.5 / 1.5)).abs() < 1e-9);
    }

    #[test]
    fn mastery_boosts_prerequisites_transitively() {
        let graph = graph();
        let config = DiagnosticConfig::default();
        // Only the top skill is assessed, and aced on mid-difficulty items.
        let mappings = vec![mapping("t1", "top", 0.6), mapping("t2", "top", 0.6)];
        let est = analyze_results(
            &graph,
            &mappings,
            &[answer("t1", true), answer("t2", true)],
            &config,
        );
        let top = est["top"];
        assert!(top >= config.mastery_threshold);
        assert!((est["mid"] - top * config.prerequisite_boost).abs() < 1e-9);
        // mid's boosted estimate is itself above the threshold, so base rises too.
        assert!(est["base"] > config.default_prior);
    }

    #[test]
    fn prerequisites_of_unmastered_skills_untouched() {
        let graph = graph();
        let config = DiagnosticConfig::default();
        let mappings = vec![mapping("t1", "top", 0.5)];
        let est = analyze_results(&graph, &mappings, &[answer("t1", false)], &config);
        assert!((est["mid"] - config.default_prior).abs() < 1e-9);
        assert!((est["base"] - config.default_prior).abs() < 1e-9);
    }
}

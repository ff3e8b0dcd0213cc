//! Property tests for the order, clamp, and decay invariants.

use mastery_engine::{
    bkt, diagnostic, fsrs, BktParams, DiagnosticConfig, DiagnosticResponse, ItemSkillMapping,
    Skill, SkillGraph,
};
use proptest::prelude::*;

/// Random DAG: each skill may only depend on earlier skills, so the input is
/// always acyclic by construction.
fn arb_dag() -> impl Strategy<Value = Vec<Skill>> {
    (2usize..12)
        .prop_flat_map(|n| {
            let edges = proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n);
            (Just(n), edges)
        })
        .prop_map(|(n, edges)| {
            (0..n)
                .map(|i| {
                    let prereqs: Vec<String> = (0..i)
                        .filter(|j| edges[i][*j])
                        .map(|j| format!("skill-{j:02}"))
                        .collect();
                    Skill {
                        id: format!("skill-{i:02}"),
                        name: format!("Skill {i}"),
                        prerequisites: prereqs,
                        description: None,
                        category: None,
                        difficulty: None,
                    }
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn topological_order_always_places_prerequisites_first(skills in arb_dag()) {
        let graph = SkillGraph::build(skills).unwrap();
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), graph.len());
        for id in graph.skill_ids() {
            let skill = graph.get(id).unwrap();
            let own_pos = order.iter().position(|s| s == id).unwrap();
            for prereq in &skill.prerequisites {
                let prereq_pos = order.iter().position(|s| s == prereq).unwrap();
                prop_assert!(prereq_pos < own_pos);
            }
        }
    }

    #[test]
    fn retention_stays_in_unit_interval_and_decays(
        stability in 0.1f64..1000.0,
        t1 in 0.0f64..5000.0,
        dt in 0.1f64..5000.0,
    ) {
        let r1 = fsrs::retention(stability, t1);
        let r2 = fsrs::retention(stability, t1 + dt);
        prop_assert!((0.0..=1.0).contains(&r1));
        prop_assert!((0.0..=1.0).contains(&r2));
        prop_assert!(r2 <= r1);
    }

    #[test]
    fn bkt_posterior_is_always_a_probability(
        p in 0.0f64..=1.0,
        slip in 0.01f64..0.49,
        guess in 0.01f64..0.49,
        learn in 0.0f64..=1.0,
        correct in any::<bool>(),
    ) {
        let post = bkt::posterior_mastery(p, correct, slip, guess, learn);
        prop_assert!((0.0..=1.0).contains(&post));
    }

    #[test]
    fn diagnostic_estimates_always_clamped(
        answers in proptest::collection::vec(any::<bool>(), 1..20),
        difficulties in proptest::collection::vec(0.0f64..=1.0, 20),
    ) {
        let graph = SkillGraph::build(vec![
            Skill::new("root", "Root", &[]),
            Skill::new("leaf", "Leaf", &["root"]),
        ])
        .unwrap();
        let config = DiagnosticConfig::default();

        let mappings: Vec<ItemSkillMapping> = difficulties
            .iter()
            .enumerate()
            .map(|(i, d)| ItemSkillMapping {
                item_id: format!("item-{i:02}"),
                primary_skill_id: if i % 2 == 0 { "root" } else { "leaf" }.to_string(),
                secondary_skill_ids: vec![],
                difficulty: *d,
            })
            .collect();
        let responses: Vec<DiagnosticResponse> = answers
            .iter()
            .enumerate()
            .map(|(i, correct)| DiagnosticResponse {
                item_id: format!("item-{i:02}"),
                correct: *correct,
            })
            .collect();

        let estimates = diagnostic::analyze_results(&graph, &mappings, &responses, &config);
        for (_, estimate) in estimates {
            prop_assert!(estimate >= config.estimate_floor - 1e-12);
            prop_assert!(estimate <= config.estimate_ceiling + 1e-12);
        }
    }

    #[test]
    fn unmastered_skills_are_sorted(threshold in 0.0f64..=1.0) {
        let graph = SkillGraph::build(vec![
            Skill::new("zeta", "Z", &[]),
            Skill::new("alpha", "A", &[]),
            Skill::new("mid", "M", &[]),
        ])
        .unwrap();
        let model = bkt::create_model("u1", &graph, &BktParams::default(), 0);
        let unmastered = bkt::unmastered_skills(&model, threshold);
        let mut sorted = unmastered.clone();
        sorted.sort();
        prop_assert_eq!(unmastered, sorted);
    }
}

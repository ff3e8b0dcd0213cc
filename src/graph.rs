//! Skill graph: a validated DAG of skills with prerequisite edges.
//!
//! The graph is built once per learning domain and is read-only afterwards.
//! Validation rejects duplicate skills, dangling prerequisite ids, and cycles
//! before any engine is constructed. Traversal queries (topological order,
//! transitive closures, dependents) are recomputed on demand; graphs are small
//! enough that caching is not worth the invalidation surface.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, GraphIssue, GraphIssueKind};

/// A single skill node. Immutable once the graph has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
}

impl Skill {
    pub fn new(id: &str, name: &str, prerequisites: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            description: None,
            category: None,
            difficulty: None,
        }
    }
}

/// Validated, acyclic skill graph.
#[derive(Debug, Clone)]
pub struct SkillGraph {
    skills: BTreeMap<String, Skill>,
    // Input order, kept so topological sort is stable across runs.
    insertion_order: Vec<String>,
}

impl SkillGraph {
    /// Builds and validates a graph. All defects are collected before
    /// returning so the caller sees every problem at once.
    pub fn build(skills: Vec<Skill>) -> Result<Self, EngineError> {
        let mut issues = Vec::new();
        let mut map: BTreeMap<String, Skill> = BTreeMap::new();
        let mut insertion_order = Vec::new();
        let mut duplicates = Vec::new();

        for skill in skills {
            if map.contains_key(&skill.id) {
                duplicates.push(skill.id.clone());
                continue;
            }
            insertion_order.push(skill.id.clone());
            map.insert(skill.id.clone(), skill);
        }

        if !duplicates.is_empty() {
            duplicates.sort();
            duplicates.dedup();
            issues.push(GraphIssue {
                kind: GraphIssueKind::DuplicateSkill,
                skill_ids: duplicates,
            });
        }

        let mut missing = Vec::new();
        for id in &insertion_order {
            for prereq in &map[id].prerequisites {
                if !map.contains_key(prereq) {
                    missing.push(prereq.clone());
                }
            }
        }
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            issues.push(GraphIssue {
                kind: GraphIssueKind::MissingPrerequisite,
                skill_ids: missing,
            });
        }

        // Cycle detection only over edges whose endpoints exist.
        let mut in_progress = HashSet::new();
        let mut done = HashSet::new();
        let mut cyclic = Vec::new();
        for id in &insertion_order {
            Self::find_cycles(id, &map, &mut in_progress, &mut done, &mut cyclic);
        }
        if !cyclic.is_empty() {
            cyclic.sort();
            cyclic.dedup();
            issues.push(GraphIssue {
                kind: GraphIssueKind::CycleDetected,
                skill_ids: cyclic,
            });
        }

        if !issues.is_empty() {
            return Err(EngineError::InvalidGraph(issues));
        }

        Ok(Self {
            skills: map,
            insertion_order,
        })
    }

    fn find_cycles(
        id: &str,
        map: &BTreeMap<String, Skill>,
        in_progress: &mut HashSet<String>,
        done: &mut HashSet<String>,
        cyclic: &mut Vec<String>,
    ) {
        if done.contains(id) {
            return;
        }
        if in_progress.contains(id) {
            cyclic.push(id.to_string());
            return;
        }
        in_progress.insert(id.to_string());
        if let Some(skill) = map.get(id) {
            for prereq in &skill.prerequisites {
                if map.contains_key(prereq) {
                    Self::find_cycles(prereq, map, in_progress, done, cyclic);
                }
            }
        }
        in_progress.remove(id);
        done.insert(id.to_string());
    }

    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skill ids in input order.
    pub fn skill_ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.insertion_order.iter().map(|id| &self.skills[id])
    }

    /// DFS-postorder topological sort: every prerequisite appears before its
    /// dependents. Stable because nodes and edges are visited in input order.
    pub fn topological_order(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.skills.len());
        for id in &self.insertion_order {
            self.topo_visit(id, &mut visited, &mut order);
        }
        order
    }

    fn topo_visit(&self, id: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if visited.contains(id) {
            return;
        }
        visited.insert(id.to_string());
        for prereq in &self.skills[id].prerequisites {
            self.topo_visit(prereq, visited, order);
        }
        order.push(id.to_string());
    }

    /// Transitive closure of prerequisites, sorted alphabetically.
    pub fn all_prerequisites(&self, id: &str) -> Vec<String> {
        let mut closure = BTreeSet::new();
        self.collect_prerequisites(id, &mut closure);
        closure.into_iter().collect()
    }

    fn collect_prerequisites(&self, id: &str, closure: &mut BTreeSet<String>) {
        let Some(skill) = self.skills.get(id) else {
            return;
        };
        for prereq in &skill.prerequisites {
            if closure.insert(prereq.clone()) {
                self.collect_prerequisites(prereq, closure);
            }
        }
    }

    /// All skills that (transitively) depend on `id`, sorted alphabetically.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        let mut result = BTreeSet::new();
        for other in self.skills.keys() {
            if other != id && self.all_prerequisites(other).iter().any(|p| p == id) {
                result.insert(other.clone());
            }
        }
        result.into_iter().collect()
    }

    /// Number of skills listing `id` as a direct prerequisite ("leverage").
    pub fn direct_dependent_count(&self, id: &str) -> usize {
        self.skills
            .values()
            .filter(|s| s.prerequisites.iter().any(|p| p == id))
            .count()
    }

    pub fn is_prerequisite_of(&self, prereq: &str, dependent: &str) -> bool {
        self.all_prerequisites(dependent).iter().any(|p| p == prereq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_graph() -> SkillGraph {
        SkillGraph::build(vec![
            Skill::new("c", "C", &["b"]),
            Skill::new("a", "A", &[]),
            Skill::new("b", "B", &["a"]),
        ])
        .unwrap()
    }

    #[test]
    fn topological_order_respects_prerequisites() {
        let graph = linear_graph();
        let order = graph.topological_order();
        let pos = |id: &str| order.iter().position(|s| s == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn topological_order_is_stable() {
        let graph = linear_graph();
        assert_eq!(graph.topological_order(), graph.topological_order());
    }

    #[test]
    fn rejects_cycles() {
        let err = SkillGraph::build(vec![
            Skill::new("a", "A", &["b"]),
            Skill::new("b", "B", &["a"]),
        ])
        .unwrap_err();
        match err {
            EngineError::InvalidGraph(issues) => {
                assert!(issues
                    .iter()
                    .any(|i| i.kind == GraphIssueKind::CycleDetected));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_missing_prerequisite() {
        let err = SkillGraph::build(vec![Skill::new("a", "A", &["ghost"])]).unwrap_err();
        match err {
            EngineError::InvalidGraph(issues) => {
                assert_eq!(issues[0].kind, GraphIssueKind::MissingPrerequisite);
                assert_eq!(issues[0].skill_ids, vec!["ghost".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_duplicate_skill() {
        let err = SkillGraph::build(vec![
            Skill::new("a", "A", &[]),
            Skill::new("a", "A again", &[]),
        ])
        .unwrap_err();
        match err {
            EngineError::InvalidGraph(issues) => {
                assert_eq!(issues[0].kind, GraphIssueKind::DuplicateSkill);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn closures_and_dependents() {
        let graph = linear_graph();
        assert_eq!(graph.all_prerequisites("c"), vec!["a", "b"]);
        assert_eq!(graph.dependents("a"), vec!["b", "c"]);
        assert_eq!(graph.direct_dependent_count("a"), 1);
        assert!(graph.is_prerequisite_of("a", "c"));
        assert!(!graph.is_prerequisite_of("c", "a"));
    }
}

//! Core engine: owns per-learner state maps and the append-only event log,
//! routes events to the learner model and memory scheduler, and answers
//! planning queries.
//!
//! Determinism contract: all state mutation is driven by event timestamps,
//! never wall clock, and every map is ordered, so replaying the same event
//! log from empty state reconstructs byte-identical exported state on any
//! host. The injected clock is consulted only for query-time "now" and the
//! export timestamp.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bkt::{self, LearnerModel};
use crate::config::{EngineConfig, SessionConfig};
use crate::diagnostic::{
    self, DiagnosticItem, DiagnosticResponse, ItemSkillMapping,
};
use crate::error::EngineError;
use crate::event::{Clock, Event, EventPayload, SystemClock};
use crate::fsrs::{self, MemoryPhase, MemoryState, Rating};
use crate::graph::SkillGraph;
use crate::planner::{self, PlannerInput, SessionAction, SessionStats};
use crate::transfer::{self, TransferTest, TransferTestResult};

/// Version stamped into exported state; imports of any other version fail.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Aggregate progress figures for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProgress {
    pub learner_id: String,
    pub total_skills: usize,
    pub mastered: usize,
    pub learning: usize,
    pub not_started: usize,
    pub average_mastery: f64,
    pub total_events: u64,
    /// Memory states per scheduling phase (new/learning/review/relearning).
    pub memory_phases: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedState {
    version: u32,
    exported_at: i64,
    learners: Vec<(String, LearnerModel)>,
    memory_states: Vec<(String, Vec<MemoryState>)>,
    transfer_results: Vec<(String, Vec<TransferTestResult>)>,
    events: Vec<Event>,
}

/// The event-sourced decision engine. One instance per tenant/domain; each
/// learner's state is an independent, single-threaded computation.
pub struct Engine {
    graph: SkillGraph,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    models: BTreeMap<String, LearnerModel>,
    memory: BTreeMap<String, BTreeMap<String, MemoryState>>,
    transfer_results: BTreeMap<String, Vec<TransferTestResult>>,
    transfer_tests: Vec<TransferTest>,
    item_mappings: Vec<ItemSkillMapping>,
    event_log: Vec<Event>,
}

impl Engine {
    /// Builds an engine over a validated graph. Configuration problems are
    /// rejected here, before any event is accepted.
    pub fn new(graph: SkillGraph, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_clock(graph, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        graph: SkillGraph,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            clock,
            models: BTreeMap::new(),
            memory: BTreeMap::new(),
            transfer_results: BTreeMap::new(),
            transfer_tests: Vec::new(),
            item_mappings: Vec::new(),
            event_log: Vec::new(),
        })
    }

    pub fn graph(&self) -> &SkillGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_log(&self) -> &[Event] {
        &self.event_log
    }

    /// Replaces the registered transfer-test catalog.
    pub fn register_transfer_tests(&mut self, tests: Vec<TransferTest>) {
        self.transfer_tests = tests;
    }

    /// Replaces the registered item-to-skill catalog.
    pub fn register_item_mappings(&mut self, mappings: Vec<ItemSkillMapping>) {
        self.item_mappings = mappings;
    }

    /// Appends the event to the log and dispatches it to the component
    /// state machines. Unknown learners and skills are created lazily.
    pub fn process_event(&mut self, event: Event) -> Result<(), EngineError> {
        self.event_log.push(event.clone());
        self.apply(&event);
        Ok(())
    }

    fn apply(&mut self, event: &Event) {
        tracing::debug!(
            event_id = %event.id,
            learner_id = %event.learner_id,
            event_type = event.payload.type_name(),
            "processing event"
        );
        match &event.payload {
            EventPayload::Practice {
                skill_id,
                correct,
                response_time_ms,
                ..
            } => {
                if !self.graph.contains(skill_id) {
                    tracing::warn!(skill_id = %skill_id, "practice event for skill outside the graph");
                }
                let model = self
                    .models
                    .remove(&event.learner_id)
                    .unwrap_or_else(|| self.fresh_model(&event.learner_id, event.timestamp));
                let updated = bkt::update_model(
                    &model,
                    skill_id,
                    *correct,
                    event.timestamp,
                    &self.config.bkt,
                );
                self.models.insert(event.learner_id.clone(), updated);

                let states = self.memory.entry(event.learner_id.clone()).or_default();
                let state = states
                    .entry(skill_id.clone())
                    .or_insert_with(|| {
                        fsrs::create_state(skill_id, event.timestamp, &self.config.fsrs)
                    })
                    .clone();
                let rating = Rating::from_correct(*correct, *response_time_ms);
                let next = fsrs::schedule_review(
                    &state,
                    *correct,
                    rating,
                    event.timestamp,
                    &self.config.fsrs,
                );
                states.insert(skill_id.clone(), next);
            }
            EventPayload::Diagnostic { results, .. } => {
                let estimates: BTreeMap<String, f64> = results
                    .iter()
                    .map(|r| (r.skill_id.clone(), r.score))
                    .collect();
                let model = self
                    .models
                    .remove(&event.learner_id)
                    .unwrap_or_else(|| self.fresh_model(&event.learner_id, event.timestamp));
                let updated = bkt::initialize_from_diagnostic(
                    &model,
                    &estimates,
                    &self.config.bkt,
                    event.timestamp,
                );
                self.models.insert(event.learner_id.clone(), updated);
            }
            EventPayload::TransferTest {
                test_id,
                score,
                passed,
                ..
            } => {
                self.transfer_results
                    .entry(event.learner_id.clone())
                    .or_default()
                    .push(TransferTestResult {
                        test_id: test_id.clone(),
                        passed: *passed,
                        score: *score,
                        timestamp: event.timestamp,
                    });
            }
            EventPayload::SessionStart | EventPayload::SessionEnd => {
                // Log-only; session boundaries carry no model updates.
            }
        }
    }

    fn fresh_model(&self, learner_id: &str, timestamp: i64) -> LearnerModel {
        tracing::info!(learner_id = %learner_id, "creating learner model");
        bkt::create_model(learner_id, &self.graph, &self.config.bkt, timestamp)
    }

    pub fn get_learner_model(&self, learner_id: &str) -> Option<&LearnerModel> {
        self.models.get(learner_id)
    }

    /// Memory states for a learner, sorted by skill id.
    pub fn get_memory_states(&self, learner_id: &str) -> Vec<MemoryState> {
        self.memory
            .get(learner_id)
            .map(|states| states.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_transfer_results(&self, learner_id: &str) -> &[TransferTestResult] {
        self.transfer_results
            .get(learner_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// True iff every transfer test required for the skill has been passed.
    pub fn is_skill_unlocked(&self, learner_id: &str, skill_id: &str) -> bool {
        transfer::is_skill_unlocked(
            skill_id,
            &self.transfer_tests,
            self.get_transfer_results(learner_id),
            &self.config.transfer,
        )
    }

    /// Next best action for a learner; `session` overrides the engine's
    /// session configuration when given.
    pub fn get_next_action(
        &self,
        learner_id: &str,
        session: Option<&SessionConfig>,
    ) -> SessionAction {
        let session = session.unwrap_or(&self.config.session);
        let fallback = self.empty_model(learner_id);
        let model = self.models.get(learner_id).unwrap_or(&fallback);
        let memory = self.get_memory_states(learner_id);
        planner::next_action(
            &PlannerInput {
                graph: &self.graph,
                model,
                memory_states: &memory,
                transfer_tests: &self.transfer_tests,
                transfer_results: self.get_transfer_results(learner_id),
                now: self.clock.now_ms(),
            },
            session,
            &self.config.transfer,
            &self.config.bkt,
        )
    }

    /// Priority-ordered queue of actions for one session.
    pub fn plan_session(
        &self,
        learner_id: &str,
        session: Option<&SessionConfig>,
    ) -> Vec<SessionAction> {
        let session = session.unwrap_or(&self.config.session);
        let fallback = self.empty_model(learner_id);
        let model = self.models.get(learner_id).unwrap_or(&fallback);
        let memory = self.get_memory_states(learner_id);
        planner::plan_session(
            &PlannerInput {
                graph: &self.graph,
                model,
                memory_states: &memory,
                transfer_tests: &self.transfer_tests,
                transfer_results: self.get_transfer_results(learner_id),
                now: self.clock.now_ms(),
            },
            session,
            &self.config.transfer,
            &self.config.bkt,
        )
    }

    pub fn get_session_stats(&self, actions: &[SessionAction]) -> SessionStats {
        planner::session_stats(actions)
    }

    fn empty_model(&self, learner_id: &str) -> LearnerModel {
        LearnerModel {
            learner_id: learner_id.to_string(),
            skills: BTreeMap::new(),
            total_events: 0,
            created_at: 0,
            last_updated: 0,
        }
    }

    pub fn get_learner_progress(&self, learner_id: &str) -> LearnerProgress {
        let threshold = self.config.session.mastery_threshold;
        let p_init = self.config.bkt.p_init;
        let model = self.models.get(learner_id);
        let memory = self.memory.get(learner_id);

        let mut mastered = 0;
        let mut learning = 0;
        let mut not_started = 0;
        for skill_id in self.graph.skill_ids() {
            let p = model
                .and_then(|m| m.skills.get(skill_id))
                .map(|s| s.p_mastery)
                .unwrap_or(p_init);
            let touched = memory.map(|m| m.contains_key(skill_id)).unwrap_or(false);
            if p >= threshold {
                mastered += 1;
            } else if touched || p > p_init {
                learning += 1;
            } else {
                not_started += 1;
            }
        }

        let mut memory_phases: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(states) = memory {
            for state in states.values() {
                let key = match state.phase {
                    MemoryPhase::New => "new",
                    MemoryPhase::Learning => "learning",
                    MemoryPhase::Review => "review",
                    MemoryPhase::Relearning => "relearning",
                };
                *memory_phases.entry(key.to_string()).or_insert(0) += 1;
            }
        }

        LearnerProgress {
            learner_id: learner_id.to_string(),
            total_skills: self.graph.len(),
            mastered,
            learning,
            not_started,
            average_mastery: model.map(bkt::average_mastery).unwrap_or(p_init),
            total_events: model.map(|m| m.total_events).unwrap_or(0),
            memory_phases,
        }
    }

    /// Diagnostic plan over the registered item catalog.
    pub fn generate_diagnostic(&self, max_items: usize) -> Vec<DiagnosticItem> {
        diagnostic::generate_diagnostic(
            &self.graph,
            &self.item_mappings,
            max_items,
            &self.config.diagnostic,
        )
    }

    /// Per-skill estimates from diagnostic responses, ready to be carried in
    /// a diagnostic event.
    pub fn analyze_diagnostic(&self, responses: &[DiagnosticResponse]) -> BTreeMap<String, f64> {
        diagnostic::analyze_results(
            &self.graph,
            &self.item_mappings,
            responses,
            &self.config.diagnostic,
        )
    }

    /// Serializes all learner state plus the event log into one versioned
    /// JSON document. Ordered maps make the output reproducible.
    pub fn export_state(&self) -> Result<String, EngineError> {
        let state = ExportedState {
            version: STATE_SCHEMA_VERSION,
            exported_at: self.clock.now_ms(),
            learners: self
                .models
                .iter()
                .map(|(id, model)| (id.clone(), model.clone()))
                .collect(),
            memory_states: self
                .memory
                .iter()
                .map(|(id, states)| (id.clone(), states.values().cloned().collect()))
                .collect(),
            transfer_results: self
                .transfer_results
                .iter()
                .map(|(id, results)| (id.clone(), results.clone()))
                .collect(),
            events: self.event_log.clone(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    /// Restores state from an exported document. Unknown schema versions and
    /// corrupt payloads fail loudly; callers should treat failure as "no
    /// prior state".
    pub fn import_state(&mut self, data: &str) -> Result<(), EngineError> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        let found = value
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        if found != STATE_SCHEMA_VERSION {
            return Err(EngineError::SchemaVersion {
                found,
                expected: STATE_SCHEMA_VERSION,
            });
        }
        let state: ExportedState = serde_json::from_value(value)?;

        self.models = state.learners.into_iter().collect();
        self.memory = state
            .memory_states
            .into_iter()
            .map(|(id, states)| {
                let map = states
                    .into_iter()
                    .map(|s| (s.skill_id.clone(), s))
                    .collect();
                (id, map)
            })
            .collect();
        self.transfer_results = state.transfer_results.into_iter().collect();
        self.event_log = state.events;
        tracing::info!(
            learners = self.models.len(),
            events = self.event_log.len(),
            "state imported"
        );
        Ok(())
    }

    /// Clears all learner state and re-applies the given events in order.
    /// Registered catalogs (tests, item mappings) are not event-derived and
    /// survive the reset.
    pub fn replay_events(&mut self, events: Vec<Event>) -> Result<(), EngineError> {
        self.models.clear();
        self.memory.clear();
        self.transfer_results.clear();
        self.event_log.clear();
        let count = events.len();
        for event in events {
            self.process_event(event)?;
        }
        tracing::info!(events = count, "replay complete");
        Ok(())
    }
}

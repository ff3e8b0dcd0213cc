//! # mastery-engine - adaptive learning decision engine
//!
//! An event-sourced engine that maintains per-skill mastery and memory
//! retention estimates for each learner and deterministically recommends the
//! next best learning action. Host applications feed it events and persist
//! its exported state; it knows nothing about HTTP, databases, or UI.
//!
//! Components:
//!
//! - [`graph`] - validated DAG of skills with prerequisite edges
//! - [`bkt`] - Bayesian Knowledge Tracing learner model
//! - [`fsrs`] - FSRS-style memory scheduler (stability, difficulty, due dates)
//! - [`diagnostic`] - cold-start item selection and estimate conversion
//! - [`transfer`] - transfer-test gating per skill
//! - [`planner`] - priority-ordered session planning
//! - [`engine`] - orchestrator: event dispatch, export/import, replay
//! - [`event`] - event union and factory with injected clock and id source
//! - [`store`] - pluggable persistence boundary
//!
//! ## Determinism
//!
//! All state mutation is driven by event timestamps; maps are ordered and
//! ties are broken explicitly, so replaying an event log from empty state
//! reconstructs byte-identical exported state on any host.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mastery_engine::{
//!     Engine, EngineConfig, EventFactory, FixedClock, SeededIdGen, Skill, SkillGraph,
//! };
//!
//! let graph = SkillGraph::build(vec![
//!     Skill::new("counting", "Counting", &[]),
//!     Skill::new("addition", "Addition", &["counting"]),
//! ])
//! .unwrap();
//!
//! let clock = Arc::new(FixedClock::new(0));
//! let mut engine = Engine::with_clock(graph, EngineConfig::default(), clock.clone()).unwrap();
//! let factory = EventFactory::new(clock, Arc::new(SeededIdGen::from_seed(7)));
//!
//! let event = factory.practice("learner-1", "s1", "counting", "item-1", true, 1800, 0);
//! engine.process_event(event).unwrap();
//!
//! let action = engine.get_next_action("learner-1", None);
//! println!("next: {} ({})", action.action_type.as_str(), action.reason);
//! ```

pub mod bkt;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod event;
pub mod fsrs;
pub mod graph;
pub mod planner;
pub mod store;
pub mod transfer;

pub use bkt::{LearnerModel, SkillProbability};
pub use config::{
    BktParams, DiagnosticConfig, EngineConfig, FsrsConfig, SessionConfig, TransferConfig,
};
pub use diagnostic::{DiagnosticItem, DiagnosticResponse, ItemSkillMapping};
pub use engine::{Engine, LearnerProgress, STATE_SCHEMA_VERSION};
pub use error::{EngineError, GraphIssue, GraphIssueKind};
pub use event::{
    Clock, DiagnosticSkillScore, Event, EventFactory, EventPayload, FixedClock, IdGen,
    SeededIdGen, SystemClock,
};
pub use fsrs::{MemoryPhase, MemoryState, Rating};
pub use graph::{Skill, SkillGraph};
pub use planner::{ActionType, SessionAction, SessionStats};
pub use store::{MemoryStore, StateStore, StoreError};
pub use transfer::{TransferTest, TransferTestResult, TransferType};

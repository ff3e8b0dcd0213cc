//! Memory scheduler in the FSRS family.
//!
//! Tracks per-skill retention state (stability, difficulty, review phase) and
//! produces due dates from a power-law forgetting curve:
//! `R(t) = (1 + t / (9 * stability))^-1`, with stability expressed as days to
//! 90% retention. Transitions are pure; the orchestrator owns the state maps.

use serde::{Deserialize, Serialize};

use crate::config::FsrsConfig;

pub const DAY_MS: f64 = 86_400_000.0;
const MIN_STABILITY_DAYS: f64 = 0.1;
const MAX_STABILITY_DAYS: f64 = 36_500.0;
const MIN_DIFFICULTY: f64 = 0.1;
const MAX_DIFFICULTY: f64 = 0.9;

/// Review grade 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Grades a binary outcome by answer speed: fast correct answers rate
    /// Easy, slow ones Hard, failures Again.
    pub fn from_correct(is_correct: bool, response_time_ms: i64) -> Self {
        if !is_correct {
            return Self::Again;
        }
        if response_time_ms < 2000 {
            Self::Easy
        } else if response_time_ms < 5000 {
            Self::Good
        } else {
            Self::Hard
        }
    }

    fn index(self) -> usize {
        self as usize - 1
    }

    /// Growth multiplier on successful recall.
    fn growth_factor(self) -> f64 {
        match self {
            Self::Again => 0.0,
            Self::Hard => 0.5,
            Self::Good => 1.0,
            Self::Easy => 1.5,
        }
    }
}

/// Lifecycle phase of one skill's memory trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum MemoryPhase {
    #[default]
    New,
    Learning,
    Review,
    Relearning,
}

/// Per-(learner, skill) scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    pub skill_id: String,
    /// Days until retention decays to 90%.
    pub stability: f64,
    pub difficulty: f64,
    pub last_review: i64,
    pub next_review: i64,
    pub success_count: u32,
    pub failure_count: u32,
    #[serde(rename = "state")]
    pub phase: MemoryPhase,
}

/// Fresh state: stability of a Good first rating, due immediately.
pub fn create_state(skill_id: &str, now: i64, config: &FsrsConfig) -> MemoryState {
    MemoryState {
        skill_id: skill_id.to_string(),
        stability: config.initial_stability[Rating::Good.index()],
        difficulty: config.default_difficulty,
        last_review: now,
        next_review: now,
        success_count: 0,
        failure_count: 0,
        phase: MemoryPhase::New,
    }
}

/// Retention probability after `elapsed_days` without review.
pub fn retention(stability: f64, elapsed_days: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 1.0;
    }
    if stability <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + elapsed_days / (9.0 * stability))
}

/// Days the schedule waits before retention is expected to hit the target.
pub fn interval_days(stability: f64, config: &FsrsConfig) -> f64 {
    let target = config.target_retention.clamp(0.0001, 0.9999);
    let interval = stability * 9.0 * (1.0 / target - 1.0);
    interval.clamp(0.0, config.max_interval_days)
}

/// Applies one review outcome and reschedules.
pub fn schedule_review(
    state: &MemoryState,
    recalled: bool,
    rating: Rating,
    now: i64,
    config: &FsrsConfig,
) -> MemoryState {
    let mut next = state.clone();

    if recalled && rating != Rating::Again {
        let growth =
            config.stability_growth * rating.growth_factor() * (1.1 - state.difficulty);
        next.stability =
            (state.stability * (1.0 + growth)).clamp(MIN_STABILITY_DAYS, MAX_STABILITY_DAYS);
        next.success_count += 1;
        next.phase = MemoryPhase::Review;
    } else {
        // Forgotten: stability falls back to the weakest initial value.
        next.stability = config.initial_stability[Rating::Again.index()];
        next.failure_count += 1;
        next.phase = match state.phase {
            MemoryPhase::New | MemoryPhase::Learning => MemoryPhase::Learning,
            MemoryPhase::Review | MemoryPhase::Relearning => MemoryPhase::Relearning,
        };
    }

    next.difficulty = match rating {
        Rating::Hard => state.difficulty + config.difficulty_step,
        Rating::Easy => state.difficulty - config.difficulty_step,
        _ => state.difficulty,
    }
    .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

    next.last_review = now;
    next.next_review = now + (interval_days(next.stability, config) * DAY_MS) as i64;
    next
}

/// Days a state has been overdue at `now`; negative when not yet due.
pub fn overdue_days(state: &MemoryState, now: i64) -> f64 {
    (now - state.next_review) as f64 / DAY_MS
}

/// States due at `now`, most overdue first, ties alphabetical by skill id.
pub fn due_skills<'a, I>(states: I, now: i64) -> Vec<&'a MemoryState>
where
    I: IntoIterator<Item = &'a MemoryState>,
{
    let mut due: Vec<&MemoryState> = states
        .into_iter()
        .filter(|s| s.next_review <= now)
        .collect();
    due.sort_by(|a, b| {
        a.next_review
            .cmp(&b.next_review)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    due
}

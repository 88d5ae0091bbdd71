//! Research session bookkeeping and progress observability.
//!
//! A session is the in-memory record of one engine invocation: its root
//! query, budget, current phase, and task counters. Sessions are not
//! persisted across process restarts.

use crate::types::ResearchBudget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current phase of a research session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    /// Asking the planner for clarifying questions.
    Planning,
    /// Driving the research tree.
    Researching,
    /// Writing the final report.
    Synthesizing,
    /// Finished successfully.
    Complete,
    /// Synthesis failed; the session has no usable output.
    Failed,
}

/// Callback for observing research progress.
///
/// Implementations must be cheap and non-blocking; they are invoked from
/// inside the scheduler's hot path.
pub trait ResearchCallback: Send + Sync {
    /// The session moved to a new phase.
    fn on_phase_change(&self, phase: ResearchPhase) {
        let _ = phase;
    }

    /// One search task resolved (successfully or not).
    fn on_task_completed(&self, query: &str, findings: usize, failed: bool) {
        let _ = (query, findings, failed);
    }
}

/// A callback that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCallback;

impl ResearchCallback for NoOpCallback {}

/// The in-memory record of one research invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    /// Unique session ID.
    pub id: Uuid,
    /// The composed root query driving the tree.
    pub query: String,
    /// Root budget.
    pub budget: ResearchBudget,
    /// Current phase.
    pub phase: ResearchPhase,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    pub updated_at: DateTime<Utc>,
    /// Search tasks dispatched so far.
    pub tasks_dispatched: usize,
    /// Search tasks that failed locally.
    pub tasks_failed: usize,
}

impl ResearchSession {
    /// Create a new session in the planning phase.
    pub fn new(query: impl Into<String>, budget: ResearchBudget) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            budget,
            phase: ResearchPhase::Planning,
            created_at: now,
            updated_at: now,
            tasks_dispatched: 0,
            tasks_failed: 0,
        }
    }

    /// Transition to a new phase.
    pub fn transition(&mut self, new_phase: ResearchPhase) {
        self.phase = new_phase;
        self.updated_at = Utc::now();
    }

    /// Record task counters reported by the scheduler.
    pub fn record_tasks(&mut self, dispatched: usize, failed: usize) {
        self.tasks_dispatched = dispatched;
        self.tasks_failed = failed;
        self.updated_at = Utc::now();
    }

    /// Whether the session is still in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, ResearchPhase::Complete | ResearchPhase::Failed)
    }
}

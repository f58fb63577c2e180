//! Types for the research orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::ScrapingResult;
use crate::refiner::RefinementError;
use crate::target::SearchTarget;

/// Errors surfaced to the caller of `run()`.
///
/// Per-URL and per-target failures never appear here; they are logged and
/// dropped inside the round.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// No usable search target was given.
    #[error("no search targets given")]
    NoTargets,

    /// A session is already running on this orchestrator.
    #[error("a research session is already running")]
    AlreadyRunning,

    /// The refinement collaborator failed; earlier results remain available.
    #[error("refinement failed in round {iteration}: {source}")]
    Refinement {
        iteration: u32,
        #[source]
        source: RefinementError,
    },

    /// The whole-session deadline expired.
    #[error("research session timed out after {0:?}")]
    SessionTimeout(Duration),
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Resolving,
    Fetching,
    Reviewing,
    /// The refiner proposed no further targets.
    Done,
    /// The iteration or result cap was reached.
    Exhausted,
    Canceled,
    /// The refiner failed.
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Done
                | SessionState::Exhausted
                | SessionState::Canceled
                | SessionState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Fetching => "fetching",
            SessionState::Reviewing => "reviewing",
            SessionState::Done => "done",
            SessionState::Exhausted => "exhausted",
            SessionState::Canceled => "canceled",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for one research session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchParams {
    /// First round's targets.
    pub search_targets: Vec<String>,
    /// Goals handed to the refiner each round.
    #[serde(default)]
    pub research_goals: Vec<String>,
    /// Overrides the configured date window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_window: Option<String>,
    /// Overrides the configured research context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One completed (or interrupted) round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchIteration {
    /// One-based round number.
    pub iteration: u32,
    pub targets: Vec<SearchTarget>,
    /// Results fetched in this round only.
    pub results: Vec<ScrapingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_focus: Option<String>,
    /// `None` when the round ended before refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_targets: Option<Vec<String>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Compact view of a round for snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub targets: Vec<String>,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_targets: Option<Vec<String>>,
}

impl From<&ResearchIteration> for IterationSummary {
    fn from(iteration: &ResearchIteration) -> Self {
        Self {
            iteration: iteration.iteration,
            targets: iteration.targets.iter().map(|t| t.text.clone()).collect(),
            result_count: iteration.results.len(),
            analysis: iteration.analysis.clone(),
            improved_targets: iteration.improved_targets.clone(),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    /// Current (or last) round number; 0 before the first round.
    pub iteration: u32,
    pub max_iterations: u32,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub iterations: Vec<IterationSummary>,
}

/// What a finished `run()` hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub session_id: String,
    /// Terminal state: `Done`, `Exhausted` or `Canceled`.
    pub state: SessionState,
    pub iterations: u32,
    pub results: Vec<ScrapingResult>,
    pub history: Vec<ResearchIteration>,
    /// Analysis from the last completed refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<String>,
}

impl ResearchOutcome {
    /// Results whose URL was resolved from `source_target`.
    pub fn results_for<'a>(
        &'a self,
        source_target: &'a str,
    ) -> impl Iterator<Item = &'a ScrapingResult> + 'a {
        self.results
            .iter()
            .filter(move |r| r.source_target == source_target)
    }
}

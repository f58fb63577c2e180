//! Progress events emitted by a research session.

use serde::{Deserialize, Serialize};

use crate::target::TargetKind;

use super::types::SessionState;

/// A step of a research session, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    SessionStarted {
        session_id: String,
        targets: Vec<String>,
    },
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    RoundStarted {
        iteration: u32,
        targets: Vec<String>,
    },
    TargetResolved {
        iteration: u32,
        target: String,
        kind: TargetKind,
        urls: usize,
    },
    /// Resolution failed for a target; the round goes on without it.
    TargetSkipped {
        iteration: u32,
        target: String,
        reason: String,
    },
    BatchCompleted {
        iteration: u32,
        index: usize,
        total_batches: usize,
        succeeded: usize,
        failed: usize,
    },
    RoundFinished {
        iteration: u32,
        results: usize,
        total_results: usize,
        improved_targets: Vec<String>,
    },
    SessionFinished {
        session_id: String,
        state: SessionState,
        iterations: u32,
        total_results: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ResearchEvent {
    /// Short name of the event type, as serialized in `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchEvent::SessionStarted { .. } => "session_started",
            ResearchEvent::StateChanged { .. } => "state_changed",
            ResearchEvent::RoundStarted { .. } => "round_started",
            ResearchEvent::TargetResolved { .. } => "target_resolved",
            ResearchEvent::TargetSkipped { .. } => "target_skipped",
            ResearchEvent::BatchCompleted { .. } => "batch_completed",
            ResearchEvent::RoundFinished { .. } => "round_finished",
            ResearchEvent::SessionFinished { .. } => "session_finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let event = ResearchEvent::TargetResolved {
            iteration: 1,
            target: "example.com".into(),
            kind: TargetKind::Domain,
            urls: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "target_resolved");
        assert_eq!(json["kind"], "domain");
        assert_eq!(event.kind(), "target_resolved");

        let parsed: ResearchEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_finished_event_omits_missing_error() {
        let event = ResearchEvent::SessionFinished {
            session_id: "s".into(),
            state: SessionState::Done,
            iterations: 2,
            total_results: 4,
            error: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state\":\"done\""));
        assert!(!json.contains("error"));
    }
}

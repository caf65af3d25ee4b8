use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interview::evaluator::SCORE_RANGE;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn interviewer(content: impl Into<String>) -> Self {
        Self {
            role: Role::Interviewer,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn candidate(content: impl Into<String>) -> Self {
        Self {
            role: Role::Candidate,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Scoring,
    Complete,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }

    /// `start` is accepted from these states only.
    pub fn can_start(self) -> bool {
        self == SessionStatus::Idle || self.is_terminal()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Scoring => "scoring",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pass,
    Fail,
}

/// Final verdict for a session. Created once, never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub score: u32,
    pub recommendation: String,
}

impl EvaluationResult {
    /// Result stored when evaluation could not be completed. The score is the
    /// floor of the scoring range and carries no assessment.
    pub fn aborted(reason: &str) -> Self {
        Self {
            decision: Decision::Fail,
            score: *SCORE_RANGE.start(),
            recommendation: format!("Interview could not be evaluated: {reason}"),
        }
    }
}

/// Read-only view of a session handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub generation: u64,
    pub status: SessionStatus,
    pub current_turn_index: usize,
    pub question_count: usize,
    pub transcript: Vec<Turn>,
    pub result: Option<EvaluationResult>,
}

/// Notifications fired on every transcript append and state transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterviewEvent {
    TurnAppended {
        generation: u64,
        index: usize,
        turn: Turn,
    },
    StatusChanged {
        generation: u64,
        status: SessionStatus,
        current_turn_index: usize,
    },
    Completed {
        generation: u64,
        status: SessionStatus,
        result: EvaluationResult,
    },
    Reset {
        generation: u64,
    },
    /// Sent in place of events a slow subscriber missed. Events already
    /// reflected in `snapshot` may still follow; `TurnAppended.index` lets
    /// the subscriber skip them.
    Resync {
        generation: u64,
        missed: u64,
        snapshot: SessionSnapshot,
    },
}

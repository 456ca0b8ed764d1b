//! Shared domain types for the Eureka routing core.
//!
//! The session context is the only state that outlives a request. Task state
//! is a tagged variant so that incident-scoped fields cannot exist while no
//! task is active.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Unix timestamp in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// True when more than `ttl` has elapsed between `self` and `now`.
    pub fn is_older_than(&self, ttl: Duration, now: Timestamp) -> bool {
        now.0 - self.0 > ttl.num_seconds()
    }
}

/// Opaque identifier correlating requests from one user over time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// The multi-turn task a session is currently inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveTask {
    None,
    IncidentAnalysis,
}

impl fmt::Display for ActiveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::IncidentAnalysis => write!(f, "incident_analysis"),
        }
    }
}

/// Closed set of task handlers a turn can be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Generic,
    IncidentAnalysis,
}

impl TaskKind {
    /// Task used whenever classification is impossible or fails.
    pub const FALLBACK: TaskKind = TaskKind::Generic;
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::IncidentAnalysis => write!(f, "incident_analysis"),
        }
    }
}

/// Lifecycle phase of an incident-analysis conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPhase {
    /// No enrichment has run yet.
    Starting,
    /// Enrichment ran on the previous turn.
    Enriching,
    /// Follow-up questions answered from the cached instruction.
    Conversing,
    /// Exit phrase seen. Never persisted.
    Terminated,
}

impl fmt::Display for IncidentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Enriching => write!(f, "enriching"),
            Self::Conversing => write!(f, "conversing"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Who said a history line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

// =============================================================================
// Session state
// =============================================================================

/// One line of conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// State of an incident-analysis conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentConversation {
    pub phase: IncidentPhase,
    /// Bound once per conversation, never overwritten.
    pub incident_id: Option<String>,
    /// Produced by the enrichment pipeline, reused on later turns.
    pub composed_instruction: Option<String>,
    /// Turns handled since the task became active.
    pub turn_count: u32,
}

impl IncidentConversation {
    fn starting(incident_id: Option<String>) -> Self {
        Self {
            phase: IncidentPhase::Starting,
            incident_id,
            composed_instruction: None,
            turn_count: 0,
        }
    }
}

/// Task state of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Idle,
    IncidentAnalysis(IncidentConversation),
}

/// Per-session conversational state, owned by the session store between
/// requests and by the orchestrator during one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub token: SessionToken,
    pub created_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub task: TaskState,
    pub history: Vec<HistoryEntry>,
}

impl SessionContext {
    /// A zero-valued context for `token`.
    pub fn new(token: SessionToken, now: Timestamp) -> Self {
        Self {
            token,
            created_at: now,
            last_activity_at: now,
            task: TaskState::Idle,
            history: Vec::new(),
        }
    }

    pub fn active_task(&self) -> ActiveTask {
        match self.task {
            TaskState::Idle => ActiveTask::None,
            TaskState::IncidentAnalysis(_) => ActiveTask::IncidentAnalysis,
        }
    }

    pub fn incident(&self) -> Option<&IncidentConversation> {
        match &self.task {
            TaskState::IncidentAnalysis(conv) => Some(conv),
            TaskState::Idle => None,
        }
    }

    pub fn incident_mut(&mut self) -> Option<&mut IncidentConversation> {
        match &mut self.task {
            TaskState::IncidentAnalysis(conv) => Some(conv),
            TaskState::Idle => None,
        }
    }

    pub fn incident_id(&self) -> Option<&str> {
        self.incident().and_then(|c| c.incident_id.as_deref())
    }

    pub fn composed_instruction(&self) -> Option<&str> {
        self.incident()
            .and_then(|c| c.composed_instruction.as_deref())
    }

    /// Turns since the active task started; 0 while idle.
    pub fn turn_count(&self) -> u32 {
        self.incident().map(|c| c.turn_count).unwrap_or(0)
    }

    /// Enter the incident-analysis task in the `Starting` phase.
    ///
    /// Does nothing when an incident conversation is already active, so a
    /// bound identifier is never replaced.
    pub fn begin_incident(&mut self, staged_id: Option<String>) {
        if let TaskState::Idle = self.task {
            self.task = TaskState::IncidentAnalysis(IncidentConversation::starting(staged_id));
        }
    }

    /// Bind an incident identifier unless one is already bound.
    ///
    /// Returns `true` if the identifier was bound by this call.
    pub fn bind_incident_id(&mut self, id: &str) -> bool {
        match self.incident_mut() {
            Some(conv) if conv.incident_id.is_none() => {
                conv.incident_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Drop back to idle, discarding every incident-scoped field.
    pub fn reset_task(&mut self) {
        self.task = TaskState::Idle;
    }

    /// Append a history entry, trimming the oldest entries beyond `limit`.
    pub fn push_history(&mut self, entry: HistoryEntry, limit: usize) {
        self.history.push(entry);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_activity_at = now;
    }
}

/// Metadata returned alongside every reply for UI badge rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub active_task: ActiveTask,
    pub incident_id: Option<String>,
    pub turn_count: u32,
    /// Handler that produced the reply.
    pub handled_by: TaskKind,
}

impl TurnMetadata {
    pub fn from_context(context: &SessionContext, handled_by: TaskKind) -> Self {
        Self {
            active_task: context.active_task(),
            incident_id: context.incident_id().map(str::to_string),
            turn_count: context.turn_count(),
            handled_by,
        }
    }
}

/// Result of one orchestration cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Token the turn was recorded under.
    pub session_token: SessionToken,
    pub text: String,
    pub metadata: TurnMetadata,
}

// =============================================================================
// Tests
// =============================================================================

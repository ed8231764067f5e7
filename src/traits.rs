use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task lifecycle states. Any state is reachable from any other; only
/// `Open` and `InProgress` are scheduled, but `Blocked` still counts as
/// actionable for listing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Blocked,
    Complete,
    Deferred,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Complete,
        TaskStatus::Deferred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Complete => "complete",
            TaskStatus::Deferred => "deferred",
        }
    }

    /// Whether this task should appear in "active" listings.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Open | TaskStatus::InProgress | TaskStatus::Blocked
        )
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "complete" => Ok(TaskStatus::Complete),
            "deferred" => Ok(TaskStatus::Deferred),
            _ => Err(()),
        }
    }
}

/// Where a task's explicit numeric priority came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySource {
    Inferred,
    UserSet,
}

impl PrioritySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrioritySource::Inferred => "inferred",
            PrioritySource::UserSet => "user_set",
        }
    }
}

impl FromStr for PrioritySource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inferred" => Ok(PrioritySource::Inferred),
            "user_set" => Ok(PrioritySource::UserSet),
            _ => Err(()),
        }
    }
}

/// A unit of work tracked by the assistant.
///
/// `urgent` / `important` are deliberately tri-state: `None` means the task
/// has not been triaged yet, which must never collapse into `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub status: TaskStatus,
    /// Explicit numeric priority; lower sorts first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_source: Option<PrioritySource>,
    pub urgent: Option<bool>,
    pub important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a task. Everything else gets a store-side
/// default (status=open, timestamps=now).
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub body: Option<String>,
    pub priority: Option<i64>,
    pub urgent: Option<bool>,
    pub important: Option<bool>,
    pub source: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

/// Filter for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    /// Actionable tasks (open, in_progress, blocked).
    Open,
    /// Everything.
    All,
    /// Completed tasks only.
    Complete,
}

/// How a memory entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// User asserted it ("remember that ...").
    Explicit,
    /// Extracted by the post-turn pipeline.
    Inferred,
    /// Session summary.
    Episodic,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Explicit => "explicit",
            MemoryKind::Inferred => "inferred",
            MemoryKind::Episodic => "episodic",
        }
    }
}

impl FromStr for MemoryKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(MemoryKind::Explicit),
            "inferred" => Ok(MemoryKind::Inferred),
            "episodic" => Ok(MemoryKind::Episodic),
            _ => Err(()),
        }
    }
}

/// A remembered fact about the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub kind: MemoryKind,
    pub content: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A queued notification produced by a proactive run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// What a proactive workflow hands back before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub kind: String,
    pub content: String,
}

/// One persisted conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub role: String, // "user" | "assistant"
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A single tool call as returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String, // JSON string
}

/// The LLM's response: content text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Side-effect flags populated by tools during one exchange.
///
/// One instance per exchange, shared via `Arc` into the tools; the transport
/// layer reads the flags after the agent loop returns. Never process-global.
#[derive(Debug, Default)]
pub struct AgentContext {
    task_created: AtomicBool,
    task_updated: AtomicBool,
    memory_created: AtomicBool,
}

impl AgentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_task_created(&self) {
        self.task_created.store(true, Ordering::Relaxed);
    }

    pub fn mark_task_updated(&self) {
        self.task_updated.store(true, Ordering::Relaxed);
    }

    pub fn mark_memory_created(&self) {
        self.memory_created.store(true, Ordering::Relaxed);
    }

    pub fn task_created(&self) -> bool {
        self.task_created.load(Ordering::Relaxed)
    }

    pub fn task_updated(&self) -> bool {
        self.task_updated.load(Ordering::Relaxed)
    }

    pub fn memory_created(&self) -> bool {
        self.memory_created.load(Ordering::Relaxed)
    }
}

/// Tool trait — named, schema-described actions bound to the record store
/// and the run context.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Returns the OpenAI-format function schema as a JSON Value.
    fn schema(&self) -> Value;
    /// Execute the tool with the given JSON arguments string; returns the
    /// observation text fed back to the model.
    async fn call(&self, arguments: &str) -> anyhow::Result<String>;
}

/// Model provider — sends messages + tool defs to an LLM, gets back response.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse>;
}

/// Durable record store for tasks, memories, notifications, and turns.
///
/// Single-record atomicity is assumed. Multi-record operations (bulk status
/// updates) are sequences of single-record calls; callers tolerate partial
/// completion.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- tasks ---
    async fn create_task(&self, new: NewTask) -> anyhow::Result<Task>;
    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>>;
    async fn list_tasks(&self, filter: TaskFilter) -> anyhow::Result<Vec<Task>>;
    /// Case-insensitive substring match against titles.
    async fn find_tasks_by_title(&self, query: &str) -> anyhow::Result<Vec<Task>>;
    async fn set_task_status(&self, id: i64, status: TaskStatus) -> anyhow::Result<Option<Task>>;
    async fn set_task_urgency(
        &self,
        id: i64,
        urgent: Option<bool>,
        important: Option<bool>,
    ) -> anyhow::Result<Option<Task>>;
    /// Quadrant-ordered top tasks (open/in_progress only).
    async fn get_prioritized(&self, limit: usize) -> anyhow::Result<Vec<Task>>;
    /// Legacy ordering: explicit priority, due date, recency. No quadrants.
    async fn get_prioritized_plain(&self, limit: usize) -> anyhow::Result<Vec<Task>>;
    /// Open/in_progress tasks untouched for at least `days` days.
    async fn get_stale_tasks(&self, days: i64) -> anyhow::Result<Vec<Task>>;

    // --- memories ---
    async fn create_memory(
        &self,
        kind: MemoryKind,
        content: &str,
        confidence: f64,
        source: &str,
    ) -> anyhow::Result<Memory>;
    async fn list_memories(&self, kind: MemoryKind) -> anyhow::Result<Vec<Memory>>;
    /// Case-insensitive substring search over memory content.
    async fn search_memories(&self, query: &str) -> anyhow::Result<Vec<Memory>>;

    // --- notifications ---
    async fn create_notification(&self, kind: &str, content: &str) -> anyhow::Result<Notification>;
    async fn list_notifications(&self, limit: i64) -> anyhow::Result<Vec<Notification>>;

    // --- conversation turns ---
    async fn append_turn(&self, role: &str, content: &str) -> anyhow::Result<()>;
    /// Most recent `limit` turns, oldest first.
    async fn load_history(&self, limit: i64) -> anyhow::Result<Vec<ConversationTurn>>;
}

/// Classified failure from a read-only external source. The tool layer maps
/// each kind to distinct remediation text, so the kinds must stay
/// distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("credentials not found: {0}")]
    MissingCredentials(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// A summarized inbox message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
    pub date: Option<DateTime<Utc>>,
}

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

/// Read-only mailbox access.
#[async_trait]
pub trait MailboxReader: Send + Sync {
    async fn list_unread(&self, max_results: usize) -> Result<Vec<EmailSummary>, SourceError>;
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, SourceError>;
}

/// Read-only calendar access.
#[async_trait]
pub trait CalendarReader: Send + Sync {
    async fn list_upcoming(
        &self,
        days: i64,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError>;
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("banana".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn actionable_excludes_terminal_statuses() {
        assert!(TaskStatus::Open.is_actionable());
        assert!(TaskStatus::InProgress.is_actionable());
        assert!(TaskStatus::Blocked.is_actionable());
        assert!(!TaskStatus::Complete.is_actionable());
        assert!(!TaskStatus::Deferred.is_actionable());
    }

    #[test]
    fn context_flags_start_false_and_stick() {
        let ctx = AgentContext::new();
        assert!(!ctx.task_created());
        assert!(!ctx.task_updated());
        assert!(!ctx.memory_created());
        ctx.mark_task_created();
        ctx.mark_task_created();
        assert!(ctx.task_created());
        assert!(!ctx.task_updated());
    }
}

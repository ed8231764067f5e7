use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::autoclassify::classify_titles;
use crate::priority::{quadrant_label, quadrant_rank};
use crate::traits::{
    AgentContext, ModelProvider, NewTask, RecordStore, Task, TaskFilter, TaskStatus, Tool,
};

/// Map common user phrasings onto valid status values before validation.
pub fn normalize_status(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    let mapped = match key.as_str() {
        "done" | "finished" | "finish" | "completed" | "close" | "closed" => "complete",
        "started" | "start" | "begin" | "working on" | "in progress" => "in_progress",
        "stuck" | "waiting" | "on hold" => "blocked",
        "postpone" | "defer" | "snooze" | "later" | "skip" => "deferred",
        other => other,
    };
    mapped.to_string()
}

const VALID_STATUSES: &str = "open, in_progress, blocked, complete, deferred";

/// Resolve a free-text query to tasks: exact id match first, then
/// case-insensitive substring match against titles (bulk).
async fn resolve_tasks(store: &dyn RecordStore, query: &str) -> anyhow::Result<Vec<Task>> {
    if let Ok(id) = query.trim().parse::<i64>() {
        if let Some(task) = store.get_task(id).await? {
            return Ok(vec![task]);
        }
    }
    store.find_tasks_by_title(query).await
}

// --- list_todos ---

pub struct ListTodosTool {
    store: Arc<dyn RecordStore>,
}

impl ListTodosTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    filter: Option<String>,
}

#[async_trait]
impl Tool for ListTodosTool {
    fn name(&self) -> &str {
        "list_todos"
    }

    fn description(&self) -> &str {
        "List the user's TODOs by filter: open (default), all, or complete"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "list_todos",
            "description": "List the user's TODOs. Use filter='open' for active tasks (default), 'all' for everything including completed, 'complete' for done items.",
            "parameters": {
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "string",
                        "enum": ["open", "all", "complete"],
                        "description": "Which TODOs to return."
                    }
                },
                "required": []
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: ListArgs = serde_json::from_str(arguments).unwrap_or(ListArgs { filter: None });
        let filter = match args.filter.as_deref() {
            Some("all") => TaskFilter::All,
            Some("complete") => TaskFilter::Complete,
            _ => TaskFilter::Open,
        };
        let tasks = self.store.list_tasks(filter).await?;
        if tasks.is_empty() {
            return Ok("No TODOs found.".to_string());
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let status_tag = if t.status != TaskStatus::Open {
                    format!(" [{}]", t.status.as_str())
                } else {
                    String::new()
                };
                format!("- (id={}) {}{}", t.id, t.title, status_tag)
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

// --- create_todos ---

pub struct CreateTodosTool {
    store: Arc<dyn RecordStore>,
    ctx: Arc<AgentContext>,
    provider: Arc<dyn ModelProvider>,
    classify_model: String,
}

impl CreateTodosTool {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ctx: Arc<AgentContext>,
        provider: Arc<dyn ModelProvider>,
        classify_model: String,
    ) -> Self {
        Self {
            store,
            ctx,
            provider,
            classify_model,
        }
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    titles: Vec<String>,
}

#[async_trait]
impl Tool for CreateTodosTool {
    fn name(&self) -> &str {
        "create_todos"
    }

    fn description(&self) -> &str {
        "Create one or more TODO items from a list of titles"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "create_todos",
            "description": "Create one or more TODO items. Pass a list of task titles, wrapped in a list even for a single task. Use concise action phrases starting with a verb (e.g. 'Buy groceries', 'Call dentist').",
            "parameters": {
                "type": "object",
                "properties": {
                    "titles": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of TODO titles to create."
                    }
                },
                "required": ["titles"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: CreateArgs = serde_json::from_str(arguments)?;
        let titles: Vec<String> = args
            .titles
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if titles.is_empty() {
            return Ok("No task titles were provided.".to_string());
        }

        let mut created = Vec::with_capacity(titles.len());
        for title in &titles {
            let mut new = NewTask::titled(title);
            new.source = Some("chat".to_string());
            created.push(self.store.create_task(new).await?);
        }
        self.ctx.mark_task_created();

        let mut ack = if created.len() == 1 {
            format!("Added TODO: \"{}\"", created[0].title)
        } else {
            let quoted: Vec<String> = created.iter().map(|t| format!("\"{}\"", t.title)).collect();
            format!("Added {} TODOs: {}", created.len(), quoted.join(", "))
        };

        // Post-creation triage. Degrades silently; creation already happened.
        let verdicts = classify_titles(self.provider.as_ref(), &self.classify_model, &titles).await;
        let mut uncertain = Vec::new();
        for (verdict, task) in verdicts.iter().zip(created.iter()) {
            if verdict.uncertain {
                uncertain.push(format!("\"{}\"", task.title));
            }
            if verdict.urgent.is_some() || verdict.important.is_some() {
                self.store
                    .set_task_urgency(task.id, verdict.urgent, verdict.important)
                    .await?;
            }
        }
        if !uncertain.is_empty() {
            ack.push_str(&format!(
                "\n\nI wasn't sure how to prioritize {} — urgent, important, both, or neither?",
                uncertain.join(", ")
            ));
        }
        Ok(ack)
    }
}

// --- update_todo_status ---

pub struct UpdateTodoStatusTool {
    store: Arc<dyn RecordStore>,
    ctx: Arc<AgentContext>,
}

impl UpdateTodoStatusTool {
    pub fn new(store: Arc<dyn RecordStore>, ctx: Arc<AgentContext>) -> Self {
        Self { store, ctx }
    }
}

#[derive(Deserialize)]
struct UpdateStatusArgs {
    query: String,
    status: String,
}

#[async_trait]
impl Tool for UpdateTodoStatusTool {
    fn name(&self) -> &str {
        "update_todo_status"
    }

    fn description(&self) -> &str {
        "Update the status of one or more TODOs by id or title keywords"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "update_todo_status",
            "description": "Update the status of one or more TODOs. 'query' should be task title keywords or a numeric id. If multiple TODOs match the keywords, all are updated. Valid statuses: open, in_progress, blocked, complete, deferred.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Task title keywords or numeric id."},
                    "status": {"type": "string", "description": "New status for the TODO."}
                },
                "required": ["query", "status"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: UpdateStatusArgs = serde_json::from_str(arguments)?;
        let normalized = normalize_status(&args.status);
        let Ok(new_status) = normalized.parse::<TaskStatus>() else {
            return Ok(format!(
                "\"{}\" is not a valid status. Valid values: {VALID_STATUSES}.",
                args.status
            ));
        };

        let matches = resolve_tasks(self.store.as_ref(), &args.query).await?;
        if matches.is_empty() {
            return Ok(format!("No TODOs found matching \"{}\".", args.query));
        }

        for task in &matches {
            self.store.set_task_status(task.id, new_status).await?;
        }
        self.ctx.mark_task_updated();

        if matches.len() == 1 {
            Ok(format!(
                "Updated \"{}\" to {}.",
                matches[0].title,
                new_status.as_str()
            ))
        } else {
            let quoted: Vec<String> = matches.iter().map(|t| format!("\"{}\"", t.title)).collect();
            Ok(format!(
                "Updated {} TODOs to {}: {}",
                matches.len(),
                new_status.as_str(),
                quoted.join(", ")
            ))
        }
    }
}

// --- update_todo_priority ---

pub struct UpdateTodoPriorityTool {
    store: Arc<dyn RecordStore>,
    ctx: Arc<AgentContext>,
}

impl UpdateTodoPriorityTool {
    pub fn new(store: Arc<dyn RecordStore>, ctx: Arc<AgentContext>) -> Self {
        Self { store, ctx }
    }
}

#[derive(Deserialize)]
struct UpdatePriorityArgs {
    query: String,
    urgent: Option<bool>,
    important: Option<bool>,
}

#[async_trait]
impl Tool for UpdateTodoPriorityTool {
    fn name(&self) -> &str {
        "update_todo_priority"
    }

    fn description(&self) -> &str {
        "Set urgency and importance on one or more TODOs"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "update_todo_priority",
            "description": "Set whether a TODO is urgent and/or important (Eisenhower triage). 'query' is task title keywords or a numeric id; multiple keyword matches are all updated. Omit a field to leave it unknown.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Task title keywords or numeric id."},
                    "urgent": {"type": "boolean", "description": "Whether the task is time-pressing."},
                    "important": {"type": "boolean", "description": "Whether the task matters to the user's goals."}
                },
                "required": ["query"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: UpdatePriorityArgs = serde_json::from_str(arguments)?;
        let matches = resolve_tasks(self.store.as_ref(), &args.query).await?;
        if matches.is_empty() {
            return Ok(format!("No TODOs found matching \"{}\".", args.query));
        }

        for task in &matches {
            self.store
                .set_task_urgency(task.id, args.urgent, args.important)
                .await?;
        }
        self.ctx.mark_task_updated();

        let label = quadrant_label(quadrant_rank(args.urgent, args.important));
        if matches.len() == 1 {
            Ok(format!("Marked \"{}\" as {label}.", matches[0].title))
        } else {
            let quoted: Vec<String> = matches.iter().map(|t| format!("\"{}\"", t.title)).collect();
            Ok(format!(
                "Marked {} TODOs as {label}: {}",
                matches.len(),
                quoted.join(", ")
            ))
        }
    }
}

// --- get_priorities ---

pub struct GetPrioritiesTool {
    store: Arc<dyn RecordStore>,
}

impl GetPrioritiesTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetPrioritiesTool {
    fn name(&self) -> &str {
        "get_priorities"
    }

    fn description(&self) -> &str {
        "Return the top 3 highest-priority active TODOs"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "get_priorities",
            "description": "Return the top 3 highest-priority active TODOs, ordered by Eisenhower quadrant.",
            "parameters": {"type": "object", "properties": {}, "required": []}
        })
    }

    async fn call(&self, _arguments: &str) -> anyhow::Result<String> {
        let tasks = self.store.get_prioritized(3).await?;
        if tasks.is_empty() {
            return Ok("No active TODOs right now.".to_string());
        }
        let mut lines = vec!["Here's what I'd focus on:".to_string()];
        for (i, t) in tasks.iter().enumerate() {
            let mut line = format!("{}. {}", i + 1, t.title);
            // Untriaged tasks get no quadrant tag; "(Unclassified)" reads
            // like a judgment when nobody has triaged the task yet.
            if t.urgent.is_some() || t.important.is_some() {
                let label = quadrant_label(quadrant_rank(t.urgent, t.important));
                line.push_str(&format!(" ({label})"));
            }
            if let Some(p) = t.priority {
                line.push_str(&format!(" (priority {p})"));
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}

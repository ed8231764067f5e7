//! Tool registry: named, schema-described actions the model may invoke.
//!
//! Registry construction is stateless; every tool is bound to the record
//! store and the per-exchange run context at build time. Nothing in here
//! performs a destructive or external-write action.

mod calendar;
mod files;
mod mailbox;
mod memory;
mod todo;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::traits::{AgentContext, CalendarReader, MailboxReader, ModelProvider, RecordStore, Tool};

pub use todo::normalize_status;

/// Build the full tool set for one exchange.
///
/// `provider`/`classify_model` feed the post-creation triage pass. The
/// mailbox and calendar tools register even when their tokens are not
/// configured; credential errors surface as connect instructions at call
/// time.
#[allow(clippy::too_many_arguments)]
pub fn build_registry(
    store: Arc<dyn RecordStore>,
    ctx: Arc<AgentContext>,
    provider: Arc<dyn ModelProvider>,
    classify_model: String,
    mailbox: Arc<dyn MailboxReader>,
    calendar: Arc<dyn CalendarReader>,
    sources: &SourcesConfig,
) -> Vec<Arc<dyn Tool>> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(todo::ListTodosTool::new(store.clone())),
        Arc::new(todo::CreateTodosTool::new(
            store.clone(),
            ctx.clone(),
            provider,
            classify_model,
        )),
        Arc::new(todo::UpdateTodoStatusTool::new(store.clone(), ctx.clone())),
        Arc::new(todo::UpdateTodoPriorityTool::new(store.clone(), ctx.clone())),
        Arc::new(todo::GetPrioritiesTool::new(store.clone())),
        Arc::new(memory::RememberTool::new(store.clone(), ctx)),
        Arc::new(memory::SearchMemoryTool::new(store)),
        Arc::new(mailbox::CheckEmailTool::new(mailbox)),
        Arc::new(calendar::CheckCalendarTool::new(calendar)),
        Arc::new(files::ReadFileTool::new(sources)),
        Arc::new(files::SearchFilesTool::new(sources)),
    ];

    // Duplicate names are a configuration error, not a runtime condition.
    debug_assert!(
        tools.iter().map(|t| t.name()).collect::<HashSet<_>>().len() == tools.len(),
        "duplicate tool name in registry"
    );
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_calendar, mock_mailbox, MockProvider};

    #[tokio::test]
    async fn registry_names_are_unique_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            crate::state::SqliteRecordStore::new(dir.path().join("t.db").to_str().unwrap())
                .await
                .unwrap(),
        );
        let tools = build_registry(
            store,
            Arc::new(AgentContext::new()),
            Arc::new(MockProvider::new(vec![])),
            "m".into(),
            mock_mailbox(vec![]),
            mock_calendar(vec![]),
            &SourcesConfig::default(),
        );

        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        for expected in [
            "list_todos",
            "create_todos",
            "update_todo_status",
            "update_todo_priority",
            "get_priorities",
            "remember",
            "search_memory",
            "check_email",
            "check_calendar",
            "read_file",
            "search_files",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
    }
}

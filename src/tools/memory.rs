use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::traits::{AgentContext, MemoryKind, RecordStore, Tool};

pub struct RememberTool {
    store: Arc<dyn RecordStore>,
    ctx: Arc<AgentContext>,
}

impl RememberTool {
    pub fn new(store: Arc<dyn RecordStore>, ctx: Arc<AgentContext>) -> Self {
        Self { store, ctx }
    }
}

#[derive(Deserialize)]
struct RememberArgs {
    fact: String,
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a fact or preference the user wants remembered"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "remember",
            "description": "Store a fact or preference the user wants remembered. Use when the user says 'remember that', 'note that', or shares personal context they want saved.",
            "parameters": {
                "type": "object",
                "properties": {
                    "fact": {"type": "string", "description": "The fact or preference to remember."}
                },
                "required": ["fact"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: RememberArgs = serde_json::from_str(arguments)?;
        // User-asserted facts get full confidence.
        self.store
            .create_memory(MemoryKind::Explicit, &args.fact, 1.0, "chat")
            .await?;
        self.ctx.mark_memory_created();
        Ok(format!("Remembered: \"{}\"", args.fact))
    }
}

pub struct SearchMemoryTool {
    store: Arc<dyn RecordStore>,
}

impl SearchMemoryTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search the user's stored memories by keyword"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "search_memory",
            "description": "Search the user's stored memories by keyword.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Keywords to search for in memories."}
                },
                "required": ["query"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: SearchArgs = serde_json::from_str(arguments)?;
        let memories = self.store.search_memories(&args.query).await?;
        if memories.is_empty() {
            return Ok(format!("No memories found matching \"{}\".", args.query));
        }
        let lines: Vec<String> = memories.iter().map(|m| format!("- {}", m.content)).collect();
        Ok(format!("Found memories:\n{}", lines.join("\n")))
    }
}

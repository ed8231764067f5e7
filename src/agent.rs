//! The decide/act/observe loop driving one user exchange.
//!
//! One model call per turn; tool calls execute sequentially in the order the
//! model requested them. A dead provider ends the exchange immediately; a
//! dead tool is just an observation the model can route around.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::classifier;
use crate::config::AgentConfig;
use crate::priority::{quadrant_label, quadrant_rank};
use crate::router::ModelRouter;
use crate::traits::{MemoryKind, ModelProvider, RecordStore, Tool};

/// Hard cap on model calls per exchange.
pub const MAX_TURNS: usize = 8;

/// Terminal reply when the provider itself fails. No retry within the
/// exchange; a broken model connection cannot produce a next action.
pub const MODEL_UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting to my language model right now. Please try again in a moment.";

/// Reply when the turn budget runs out before the model settles.
pub const TURN_BUDGET_REPLY: &str = "I'm sorry, I couldn't finish that request within my \
     action budget. Could you rephrase it or break it into smaller steps?";

const FALLBACK_PERSONA: &str = "You are Steward, a personal assistant. You manage the user's \
     TODOs and memories, check their email and calendar, and answer questions. Be concise and \
     concrete. Use your tools rather than guessing about the user's data.";

const CHAT_TASK_LABEL: &str = "chat";

pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    router: ModelRouter,
    store: Arc<dyn RecordStore>,
    persona_path: String,
    history_limit: i64,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        router: ModelRouter,
        store: Arc<dyn RecordStore>,
        cfg: &AgentConfig,
    ) -> Self {
        Self {
            provider,
            router,
            store,
            persona_path: cfg.persona_path.clone(),
            history_limit: cfg.history_limit,
        }
    }

    /// Persona text, then what we know about the user, then the current
    /// top priorities. Sections are omitted when empty.
    pub async fn build_system_prompt(&self) -> anyhow::Result<String> {
        let mut prompt = match tokio::fs::read_to_string(&self.persona_path).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => FALLBACK_PERSONA.to_string(),
        };

        let memories = self.store.list_memories(MemoryKind::Explicit).await?;
        if !memories.is_empty() {
            prompt.push_str("\n\nWhat you know about this user:");
            for m in &memories {
                prompt.push_str(&format!("\n- {}", m.content));
            }
        }

        let top = self.store.get_prioritized(3).await?;
        if !top.is_empty() {
            prompt.push_str("\n\nThe user's current top priorities:");
            for (i, t) in top.iter().enumerate() {
                let label = quadrant_label(quadrant_rank(t.urgent, t.important));
                prompt.push_str(&format!("\n{}. {} ({label})", i + 1, t.title));
            }
        }

        Ok(prompt)
    }

    /// Drive one user message to a terminal reply.
    ///
    /// Side-effect flags live on the run context the tools were bound to;
    /// this loop neither owns nor resets them.
    pub async fn run_exchange(
        &self,
        user_message: &str,
        tools: &[Arc<dyn Tool>],
    ) -> anyhow::Result<String> {
        let verdict = classifier::classify(user_message);
        let tier = self.router.select(CHAT_TASK_LABEL, verdict.is_sensitive);
        let model = self.router.model_for(tier).to_string();
        info!(
            sensitive = verdict.is_sensitive,
            flags = ?verdict.flags,
            rules = ?verdict.matched_rules,
            confidence = verdict.confidence,
            model = %model,
            "starting exchange"
        );

        let mut messages: Vec<Value> = vec![json!({
            "role": "system",
            "content": self.build_system_prompt().await?,
        })];
        for turn in self.store.load_history(self.history_limit).await? {
            messages.push(json!({"role": turn.role, "content": turn.content}));
        }
        messages.push(json!({"role": "user", "content": user_message}));

        let schemas: Vec<Value> = tools
            .iter()
            .map(|t| json!({"type": "function", "function": t.schema()}))
            .collect();

        let reply = self.run_loop(&model, &mut messages, tools, &schemas).await;

        self.store.append_turn("user", user_message).await?;
        self.store.append_turn("assistant", &reply).await?;
        Ok(reply)
    }

    async fn run_loop(
        &self,
        model: &str,
        messages: &mut Vec<Value>,
        tools: &[Arc<dyn Tool>],
        schemas: &[Value],
    ) -> String {
        for turn in 0..MAX_TURNS {
            let response = match self.provider.chat(model, messages, schemas).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(turn, "provider call failed, ending exchange: {e}");
                    return MODEL_UNAVAILABLE_REPLY.to_string();
                }
            };

            if response.tool_calls.is_empty() {
                return response.content.unwrap_or_default();
            }

            messages.push(json!({
                "role": "assistant",
                "content": response.content,
                "tool_calls": response.tool_calls.iter().map(|tc| json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {"name": tc.name, "arguments": tc.arguments},
                })).collect::<Vec<_>>(),
            }));

            for call in &response.tool_calls {
                let observation = match tools.iter().find(|t| t.name() == call.name) {
                    None => {
                        warn!(tool = %call.name, "model requested unknown tool");
                        format!("Unknown tool '{}'.", call.name)
                    }
                    Some(tool) => match tool.call(&call.arguments).await {
                        Ok(obs) => obs,
                        Err(e) => {
                            warn!(tool = %call.name, "tool failed: {e}");
                            format!("Tool '{}' failed: {e}", call.name)
                        }
                    },
                };
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": observation,
                }));
            }
        }

        warn!("turn budget exhausted");
        TURN_BUDGET_REPLY.to_string()
    }
}

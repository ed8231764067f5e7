//! Post-turn memory extraction.
//!
//! Runs after a completed exchange, off the reply path. Nothing here may
//! surface to the user; every failure logs and returns.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::traits::{MemoryKind, ModelProvider, RecordStore};

const EXTRACT_PROMPT: &str = "Given a single conversation exchange, identify facts about the \
user worth remembering long-term.\n\n\
WORTH remembering:\n\
- Personal details (name, role, location, family)\n\
- Ongoing projects or goals they mentioned\n\
- Preferences or dislikes they expressed\n\
- Recurring commitments or habits\n\n\
NOT worth remembering:\n\
- One-off task requests ('add a todo', 'mark as done')\n\
- Questions about today's schedule or transient information\n\n\
Output a JSON array of concise fact strings. Empty array [] if nothing is memorable.\n\
No preamble, no explanation, only the JSON array.";

const EXTRACTED_CONFIDENCE: f64 = 0.6;

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn parse_facts(raw: &str) -> Option<Vec<String>> {
    let mut trimmed = raw.trim();
    if let Some(stripped) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        trimmed = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// Extract memorable facts from one exchange and persist the novel ones as
/// inferred memories with source "auto".
pub async fn extract_and_store(
    provider: Arc<dyn ModelProvider>,
    model: &str,
    store: Arc<dyn RecordStore>,
    user_message: &str,
    assistant_reply: &str,
) {
    let content = format!(
        "{EXTRACT_PROMPT}\n\nUser: {}\nAssistant: {}",
        truncate_chars(user_message, 500),
        truncate_chars(assistant_reply, 500)
    );
    let messages = vec![json!({"role": "user", "content": content})];

    let raw = match provider.chat(model, &messages, &[]).await {
        Ok(r) => r.content.unwrap_or_else(|| "[]".to_string()),
        Err(e) => {
            warn!("memory extraction call failed: {e}");
            return;
        }
    };

    let Some(facts) = parse_facts(&raw) else {
        warn!("memory extraction output was not a JSON array");
        return;
    };
    if facts.is_empty() {
        return;
    }

    // Dedup case-insensitively against everything already remembered.
    let mut existing: Vec<String> = Vec::new();
    for kind in [MemoryKind::Explicit, MemoryKind::Inferred] {
        match store.list_memories(kind).await {
            Ok(memories) => existing.extend(memories.into_iter().map(|m| m.content.to_lowercase())),
            Err(e) => {
                warn!("memory extraction could not list existing memories: {e}");
                return;
            }
        }
    }

    let mut stored = 0usize;
    for fact in facts {
        if existing.contains(&fact.to_lowercase()) {
            continue;
        }
        match store
            .create_memory(MemoryKind::Inferred, &fact, EXTRACTED_CONFIDENCE, "auto")
            .await
        {
            Ok(_) => {
                existing.push(fact.to_lowercase());
                stored += 1;
            }
            Err(e) => {
                warn!("memory extraction store failed: {e}");
                return;
            }
        }
    }
    if stored > 0 {
        info!(stored, "memory extraction stored new facts");
    }
}

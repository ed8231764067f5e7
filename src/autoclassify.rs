//! LLM-assisted urgency/importance triage for freshly created tasks.
//!
//! One batched completion call per creation; every failure path degrades to
//! "no classification" so task creation is never blocked on the model.

use serde_json::{json, Value};
use tracing::warn;

use crate::traits::ModelProvider;

/// Verdict for one title, positionally matched to the input list.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleClassification {
    pub title: String,
    pub urgent: Option<bool>,
    pub important: Option<bool>,
    /// Model could not confidently place the task; the caller should ask.
    pub uncertain: bool,
}

const CLASSIFY_PROMPT: &str = "You triage TODO items using the Eisenhower framework.\n\
For each task title, decide:\n\
- urgent: needs attention in the next day or two (true/false/null if unknowable)\n\
- important: meaningfully advances the user's goals (true/false/null if unknowable)\n\
- uncertain: true when the title is too vague to place at all\n\n\
Respond with ONLY a JSON array, one object per title, in the same order:\n\
[{\"urgent\": true, \"important\": false, \"uncertain\": false}, ...]\n\
No prose, no markdown fences.";

/// Classify a batch of titles. Returns an empty vec on any failure; the
/// result may be shorter than the input when the model under-delivers, and
/// trailing titles simply stay unclassified.
pub async fn classify_titles(
    provider: &dyn ModelProvider,
    model: &str,
    titles: &[String],
) -> Vec<TitleClassification> {
    if titles.is_empty() {
        return Vec::new();
    }

    let numbered: Vec<String> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {t}", i + 1))
        .collect();
    let messages = vec![
        json!({"role": "system", "content": CLASSIFY_PROMPT}),
        json!({"role": "user", "content": numbered.join("\n")}),
    ];

    let response = match provider.chat(model, &messages, &[]).await {
        Ok(r) => r,
        Err(e) => {
            warn!("auto-classification call failed, skipping: {e}");
            return Vec::new();
        }
    };

    let Some(content) = response.content else {
        warn!("auto-classification returned no content, skipping");
        return Vec::new();
    };

    let Some(entries) = parse_array(&content) else {
        warn!("auto-classification output was not a JSON array, skipping");
        return Vec::new();
    };

    // Positional correspondence; extra entries beyond the input are dropped.
    entries
        .iter()
        .zip(titles.iter())
        .map(|(entry, title)| TitleClassification {
            title: title.clone(),
            urgent: entry.get("urgent").and_then(Value::as_bool),
            important: entry.get("important").and_then(Value::as_bool),
            uncertain: entry
                .get("uncertain")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
        .collect()
}

/// Parse a JSON array out of model output, tolerating markdown fences.
fn parse_array(content: &str) -> Option<Vec<Value>> {
    let trimmed = strip_fences(content);
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

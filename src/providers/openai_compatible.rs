use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::providers::ProviderError;
use crate::traits::{ModelProvider, ProviderResponse, ToolCall};

/// Provider speaking the OpenAI chat-completions wire format. Works against
/// OpenAI itself and local servers (Ollama, llama.cpp, vLLM) alike.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse> {
        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let url = format!("{}/chat/completions", self.base_url);
        info!(model, url = %url, tools = tools.len(), "calling LLM API");

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                error!("HTTP request failed: {e}");
                return Err(ProviderError::network(&e).into());
            }
        };

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            error!(status = %status, "provider API error: {text}");
            return Err(ProviderError::from_status(status.as_u16(), &text).into());
        }
        debug!(bytes = text.len(), "provider response received");

        let data: Value = serde_json::from_str(&text)?;
        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| anyhow::anyhow!("no choices in response"))?;
        let message = &choice["message"];

        let content = message["content"].as_str().map(|s| s.to_string());

        let mut tool_calls = Vec::new();
        if let Some(tcs) = message["tool_calls"].as_array() {
            for tc in tcs {
                tool_calls.push(ToolCall {
                    id: tc["id"].as_str().unwrap_or("").to_string(),
                    name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                    arguments: tc["function"]["arguments"]
                        .as_str()
                        .unwrap_or("{}")
                        .to_string(),
                });
            }
        }

        Ok(ProviderResponse {
            content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_trimmed() {
        let provider =
            OpenAiCompatibleProvider::new("http://localhost:11434/v1/", None, 30).unwrap();
        assert!(!provider.base_url.ends_with('/'));
    }
}

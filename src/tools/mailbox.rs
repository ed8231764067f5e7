use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::traits::{MailboxReader, SourceError, Tool};

const MAX_RESULTS: usize = 10;

/// Read-only Gmail lookup. Credential and permission problems come back as
/// guidance strings, never as errors the loop would treat as tool failure.
pub struct CheckEmailTool {
    mailbox: Arc<dyn MailboxReader>,
}

impl CheckEmailTool {
    pub fn new(mailbox: Arc<dyn MailboxReader>) -> Self {
        Self { mailbox }
    }
}

#[derive(Deserialize)]
struct CheckEmailArgs {
    #[serde(default)]
    query: Option<String>,
}

pub(crate) fn source_error_text(err: &SourceError, what: &str) -> String {
    match err {
        SourceError::MissingCredentials(_) => format!(
            "{what} isn't connected yet. Save an OAuth token file and point config.toml at it."
        ),
        SourceError::PermissionDenied(_) => format!(
            "{what} refused the saved credentials. Re-run the token setup to refresh access."
        ),
        SourceError::Unavailable(_) => {
            format!("Couldn't reach {what}. Try again in a moment.")
        }
    }
}

#[async_trait]
impl Tool for CheckEmailTool {
    fn name(&self) -> &str {
        "check_email"
    }

    fn description(&self) -> &str {
        "Check the user's Gmail for unread or matching emails"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "check_email",
            "description": "Check the user's Gmail. With no query, returns unread emails. With a query, searches all mail for matching emails.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Optional search query. Leave empty for unread emails."}
                },
                "required": []
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: CheckEmailArgs =
            serde_json::from_str(arguments).unwrap_or(CheckEmailArgs { query: None });
        let query = args.query.unwrap_or_default();

        let result = if query.is_empty() {
            self.mailbox.list_unread(MAX_RESULTS).await
        } else {
            self.mailbox.search(&query, MAX_RESULTS).await
        };

        let emails = match result {
            Ok(emails) => emails,
            Err(e) => {
                warn!("mailbox lookup failed: {e}");
                return Ok(source_error_text(&e, "Gmail"));
            }
        };

        if emails.is_empty() {
            return Ok(if query.is_empty() {
                "No unread emails found.".to_string()
            } else {
                format!("No emails matching \"{query}\".")
            });
        }

        let lines: Vec<String> = emails
            .iter()
            .map(|e| format!("- {} (from {}): {}", e.subject, e.sender, e.snippet))
            .collect();
        Ok(format!("Found {} email(s):\n{}", emails.len(), lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_mailbox, mock_mailbox, sample_email};

    #[tokio::test]
    async fn lists_unread_when_no_query() {
        let tool = CheckEmailTool::new(mock_mailbox(vec![sample_email("Standup moved", "boss")]));
        let reply = tool.call("{}").await.unwrap();
        assert!(reply.starts_with("Found 1 email(s):"));
        assert!(reply.contains("Standup moved"));
    }

    #[tokio::test]
    async fn empty_inbox_gets_sentinel() {
        let tool = CheckEmailTool::new(mock_mailbox(vec![]));
        assert_eq!(tool.call("{}").await.unwrap(), "No unread emails found.");
        let miss = tool
            .call(r#"{"query": "invoices"}"#)
            .await
            .unwrap();
        assert_eq!(miss, "No emails matching \"invoices\".");
    }

    #[tokio::test]
    async fn missing_credentials_become_guidance_not_error() {
        let tool = CheckEmailTool::new(failing_mailbox(SourceError::MissingCredentials(
            "no token".into(),
        )));
        let reply = tool.call("{}").await.unwrap();
        assert!(reply.contains("isn't connected yet"));
    }

    #[tokio::test]
    async fn permission_denied_suggests_reauth() {
        let tool = CheckEmailTool::new(failing_mailbox(SourceError::PermissionDenied(
            "401".into(),
        )));
        let reply = tool.call("{}").await.unwrap();
        assert!(reply.contains("refused the saved credentials"));
    }
}

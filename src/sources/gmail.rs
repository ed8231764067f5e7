use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::sources::{load_bearer_token, status_to_error, urlencode};
use crate::traits::{EmailSummary, MailboxReader, SourceError};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Read-only Gmail client over the REST API.
pub struct GmailReader {
    client: Client,
    token_path: String,
    base_url: String,
}

impl GmailReader {
    pub fn new(token_path: &str) -> Self {
        Self {
            client: Client::new(),
            token_path: token_path.to_string(),
            base_url: GMAIL_BASE.to_string(),
        }
    }

    async fn get_json(&self, url: &str, token: &str) -> Result<Value, SourceError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("gmail request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_to_error(status.as_u16(), "gmail"));
        }
        resp.json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("gmail response was not JSON: {e}")))
    }

    async fn list_messages(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, SourceError> {
        let token = load_bearer_token(&self.token_path)?;
        let list_url = format!(
            "{}/messages?q={}&maxResults={max_results}",
            self.base_url,
            urlencode(query)
        );
        let listing = self.get_json(&list_url, &token).await?;

        let refs = listing["messages"].as_array().cloned().unwrap_or_default();
        debug!(count = refs.len(), query, "gmail listing fetched");

        let mut summaries = Vec::with_capacity(refs.len());
        for msg_ref in refs {
            let Some(id) = msg_ref["id"].as_str() else {
                continue;
            };
            let msg_url = format!(
                "{}/messages/{id}?format=metadata&metadataHeaders=Subject&metadataHeaders=From",
                self.base_url
            );
            let msg = self.get_json(&msg_url, &token).await?;
            summaries.push(parse_summary(&msg));
        }
        Ok(summaries)
    }
}

fn header<'a>(msg: &'a Value, name: &str) -> Option<&'a str> {
    msg["payload"]["headers"]
        .as_array()?
        .iter()
        .find(|h| h["name"].as_str() == Some(name))
        .and_then(|h| h["value"].as_str())
}

fn parse_summary(msg: &Value) -> EmailSummary {
    // internalDate is epoch millis as a string.
    let date: Option<DateTime<Utc>> = msg["internalDate"]
        .as_str()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    EmailSummary {
        id: msg["id"].as_str().unwrap_or_default().to_string(),
        thread_id: msg["threadId"].as_str().unwrap_or_default().to_string(),
        subject: header(msg, "Subject").unwrap_or("(no subject)").to_string(),
        sender: header(msg, "From").unwrap_or_default().to_string(),
        snippet: msg["snippet"].as_str().unwrap_or_default().to_string(),
        date,
    }
}

#[async_trait]
impl MailboxReader for GmailReader {
    async fn list_unread(&self, max_results: usize) -> Result<Vec<EmailSummary>, SourceError> {
        self.list_messages("is:unread", max_results).await
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, SourceError> {
        self.list_messages(query, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_parses_headers_and_internal_date() {
        let msg = json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "Hello there",
            "internalDate": "1739145600000",
            "payload": {"headers": [
                {"name": "Subject", "value": "Test"},
                {"name": "From", "value": "a@b.com"}
            ]}
        });
        let summary = parse_summary(&msg);
        assert_eq!(summary.id, "m1");
        assert_eq!(summary.subject, "Test");
        assert_eq!(summary.sender, "a@b.com");
        assert!(summary.date.is_some());
    }

    #[test]
    fn missing_subject_gets_placeholder() {
        let msg = json!({"id": "m2", "threadId": "t2", "payload": {"headers": []}});
        assert_eq!(parse_summary(&msg).subject, "(no subject)");
    }

    #[test]
    fn query_is_urlencoded() {
        assert_eq!(urlencode("is:unread from:a b"), "is%3Aunread%20from%3Aa%20b");
    }

    #[tokio::test]
    async fn missing_token_surfaces_missing_credentials() {
        let reader = GmailReader::new("/nope/token.json");
        let err = reader.list_unread(5).await.unwrap_err();
        assert!(matches!(err, SourceError::MissingCredentials(_)));
    }
}

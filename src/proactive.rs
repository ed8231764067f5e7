//! Proactive workflow graphs.
//!
//! Each workflow is a small fixed pipeline: scan the mailbox, check task
//! staleness, summarize, package. The branching is a match over the workflow
//! kind rather than a generic graph runtime. Every node degrades on its own:
//! a dead mailbox yields an empty scan, a dead summarizer yields the raw
//! findings. A run never aborts half-way.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::traits::{MailboxReader, ModelProvider, NotificationPayload, RecordStore};

const DIGEST_INSTRUCTION: &str = "You are writing a short proactive digest for your user. \
     Group items by urgency. Use at most 5 bullet points. Note which emails need a reply, \
     and suggest a concrete next action for each stale TODO. If there is nothing worth \
     reporting, respond with exactly: No new emails or stale TODOs to report.";

/// Placeholder summary meaning "nothing notable". Packaging drops it.
const EMPTY_SENTINEL: &str = "No new emails or stale TODOs to report.";

const SCAN_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Mailbox scan only.
    GmailDigest,
    /// Mailbox scan plus staleness check.
    MorningDigest,
    /// Staleness check only.
    StalenessOnly,
}

impl WorkflowKind {
    pub fn notification_kind(&self) -> &'static str {
        match self {
            WorkflowKind::GmailDigest => "gmail_digest",
            WorkflowKind::MorningDigest => "morning_digest",
            WorkflowKind::StalenessOnly => "todo_staleness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    ScanMailbox,
    CheckStaleness,
    Summarize,
}

pub struct WorkflowRunner {
    provider: Arc<dyn ModelProvider>,
    model: String,
    store: Arc<dyn RecordStore>,
    mailbox: Arc<dyn MailboxReader>,
    stale_days: i64,
}

impl WorkflowRunner {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: &str,
        store: Arc<dyn RecordStore>,
        mailbox: Arc<dyn MailboxReader>,
        stale_days: i64,
    ) -> Self {
        Self {
            provider,
            model: model.to_string(),
            store,
            mailbox,
            stale_days,
        }
    }

    /// Run one workflow to completion. Returns zero or one notification
    /// payloads; persistence is the caller's job.
    pub async fn run(&self, kind: WorkflowKind) -> Vec<NotificationPayload> {
        let mut findings: Vec<String> = Vec::new();
        let mut node = match kind {
            WorkflowKind::StalenessOnly => Node::CheckStaleness,
            _ => Node::ScanMailbox,
        };

        loop {
            node = match node {
                Node::ScanMailbox => {
                    self.scan_mailbox(&mut findings).await;
                    match kind {
                        WorkflowKind::MorningDigest => Node::CheckStaleness,
                        _ => Node::Summarize,
                    }
                }
                Node::CheckStaleness => {
                    self.check_staleness(&mut findings).await;
                    Node::Summarize
                }
                Node::Summarize => {
                    let payloads = self.summarize_and_package(kind, &findings).await;
                    info!(
                        kind = kind.notification_kind(),
                        findings = findings.len(),
                        notifications = payloads.len(),
                        "proactive run finished"
                    );
                    return payloads;
                }
            };
        }
    }

    async fn scan_mailbox(&self, findings: &mut Vec<String>) {
        let emails = match self.mailbox.list_unread(SCAN_LIMIT).await {
            Ok(emails) => emails,
            Err(e) => {
                warn!("mailbox scan failed, continuing with empty set: {e}");
                return;
            }
        };
        for email in emails {
            findings.push(format!(
                "Unread email: {} (from {}): {}",
                email.subject, email.sender, email.snippet
            ));
        }
    }

    async fn check_staleness(&self, findings: &mut Vec<String>) {
        let stale = match self.store.get_stale_tasks(self.stale_days).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!("staleness check failed, continuing with empty set: {e}");
                return;
            }
        };
        for task in stale {
            findings.push(format!(
                "Stale TODO: \"{}\" ({}, untouched since {})",
                task.title,
                task.status.as_str(),
                task.updated_at.format("%Y-%m-%d")
            ));
        }
    }

    async fn summarize_and_package(
        &self,
        kind: WorkflowKind,
        findings: &[String],
    ) -> Vec<NotificationPayload> {
        if findings.is_empty() {
            return Vec::new();
        }
        let raw = findings.join("\n");
        let messages = vec![
            json!({"role": "system", "content": DIGEST_INSTRUCTION}),
            json!({"role": "user", "content": raw}),
        ];
        let summary = match self.provider.chat(&self.model, &messages, &[]).await {
            Ok(response) => match response.content {
                Some(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => raw,
            },
            Err(e) => {
                warn!("digest summarization failed, using raw findings: {e}");
                raw
            }
        };
        if summary == EMPTY_SENTINEL {
            return Vec::new();
        }
        vec![NotificationPayload {
            kind: kind.notification_kind().to_string(),
            content: summary,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_mailbox, mock_mailbox, sample_email, temp_record_store, MockProvider};
    use crate::traits::{NewTask, ProviderResponse, SourceError};

    fn summarizer(text: &str) -> Arc<MockProvider> {
        Arc::new(MockProvider::new(vec![Ok(ProviderResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
        })]))
    }

    #[tokio::test]
    async fn gmail_digest_produces_one_typed_notification() {
        let (_dir, store) = temp_record_store().await;
        let provider = summarizer("- Reply to the boss about the standup.");
        let runner = WorkflowRunner::new(
            provider.clone(),
            "m",
            store,
            mock_mailbox(vec![sample_email("Standup moved", "boss")]),
            3,
        );
        let payloads = runner.run(WorkflowKind::GmailDigest).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind, "gmail_digest");
        assert!(payloads[0].content.contains("Reply to the boss"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn empty_findings_skip_the_summarizer_entirely() {
        let (_dir, store) = temp_record_store().await;
        let provider = Arc::new(MockProvider::new(vec![]));
        let runner = WorkflowRunner::new(provider.clone(), "m", store, mock_mailbox(vec![]), 3);
        assert!(runner.run(WorkflowKind::GmailDigest).await.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn staleness_only_skips_the_mailbox() {
        let (_dir, store) = temp_record_store().await;
        store.create_task(NewTask::titled("ship the report")).await.unwrap();
        let provider = summarizer("- ship the report has been idle; pick it back up.");
        // A broken mailbox must not matter: this graph never visits it.
        let runner = WorkflowRunner::new(
            provider,
            "m",
            store,
            failing_mailbox(SourceError::Unavailable("down".into())),
            0,
        );
        let payloads = runner.run(WorkflowKind::StalenessOnly).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind, "todo_staleness");
    }

    #[tokio::test]
    async fn morning_digest_combines_mailbox_and_staleness() {
        let (_dir, store) = temp_record_store().await;
        store.create_task(NewTask::titled("renew passport")).await.unwrap();
        let provider = Arc::new(MockProvider::new(vec![Err(anyhow::anyhow!("llm down"))]));
        let runner = WorkflowRunner::new(
            provider,
            "m",
            store,
            mock_mailbox(vec![sample_email("Invoice due", "billing")]),
            0,
        );
        // Summarizer failure falls back to the raw findings, so both sources
        // show up verbatim.
        let payloads = runner.run(WorkflowKind::MorningDigest).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind, "morning_digest");
        assert!(payloads[0].content.contains("Unread email: Invoice due"));
        assert!(payloads[0].content.contains("Stale TODO: \"renew passport\""));
    }

    #[tokio::test]
    async fn mailbox_failure_degrades_to_empty_scan() {
        let (_dir, store) = temp_record_store().await;
        let provider = Arc::new(MockProvider::new(vec![]));
        let runner = WorkflowRunner::new(
            provider.clone(),
            "m",
            store,
            failing_mailbox(SourceError::PermissionDenied("401".into())),
            3,
        );
        assert!(runner.run(WorkflowKind::GmailDigest).await.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn sentinel_summary_yields_zero_notifications() {
        let (_dir, store) = temp_record_store().await;
        let provider = summarizer(EMPTY_SENTINEL);
        let runner = WorkflowRunner::new(
            provider,
            "m",
            store,
            mock_mailbox(vec![sample_email("FYI", "noreply")]),
            3,
        );
        assert!(runner.run(WorkflowKind::GmailDigest).await.is_empty());
    }
}

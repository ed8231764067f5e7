//! Test infrastructure: scripted provider, temp store, canned sources.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::state::SqliteRecordStore;
use crate::traits::{
    CalendarEvent, CalendarReader, EmailSummary, MailboxReader, ModelProvider, ProviderResponse,
    RecordStore, SourceError, ToolCall,
};

/// A recorded call to `MockProvider::chat()`.
#[derive(Debug, Clone)]
pub struct MockChatCall {
    pub model: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
}

/// Mock LLM provider with a FIFO queue of scripted results. An exhausted
/// queue is an error; scripts must cover every call the test provokes.
pub struct MockProvider {
    responses: Mutex<Vec<anyhow::Result<ProviderResponse>>>,
    call_log: Mutex<Vec<MockChatCall>>,
}

impl MockProvider {
    pub fn new(responses: Vec<anyhow::Result<ProviderResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_log: Mutex::new(Vec::new()),
        }
    }

    pub fn text_response(text: &str) -> anyhow::Result<ProviderResponse> {
        Ok(ProviderResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
        })
    }

    pub fn tool_call_response(tool_name: &str, args: &str) -> anyhow::Result<ProviderResponse> {
        Ok(ProviderResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: tool_name.to_string(),
                arguments: args.to_string(),
            }],
        })
    }

    /// How many times `chat()` was called.
    pub fn calls(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    pub fn call_log(&self) -> Vec<MockChatCall> {
        self.call_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse> {
        self.call_log.lock().unwrap().push(MockChatCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            anyhow::bail!("MockProvider script exhausted");
        }
        queue.remove(0)
    }
}

/// Fresh SQLite store in a temp directory. Keep the TempDir alive for the
/// duration of the test.
pub async fn temp_record_store() -> (tempfile::TempDir, Arc<dyn RecordStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteRecordStore::new(dir.path().join("test.db").to_str().unwrap())
        .await
        .unwrap();
    (dir, Arc::new(store))
}

pub fn sample_email(subject: &str, sender: &str) -> EmailSummary {
    EmailSummary {
        id: "msg-1".to_string(),
        thread_id: "thread-1".to_string(),
        subject: subject.to_string(),
        sender: sender.to_string(),
        snippet: format!("{subject} snippet"),
        date: None,
    }
}

pub fn sample_event(summary: &str) -> CalendarEvent {
    CalendarEvent {
        id: "evt-1".to_string(),
        summary: summary.to_string(),
        start: None,
        location: None,
    }
}

fn clone_source_error(err: &SourceError) -> SourceError {
    match err {
        SourceError::MissingCredentials(s) => SourceError::MissingCredentials(s.clone()),
        SourceError::PermissionDenied(s) => SourceError::PermissionDenied(s.clone()),
        SourceError::Unavailable(s) => SourceError::Unavailable(s.clone()),
    }
}

struct CannedMailbox {
    emails: Vec<EmailSummary>,
    error: Option<SourceError>,
}

#[async_trait]
impl MailboxReader for CannedMailbox {
    async fn list_unread(&self, max_results: usize) -> Result<Vec<EmailSummary>, SourceError> {
        match &self.error {
            Some(e) => Err(clone_source_error(e)),
            None => Ok(self.emails.iter().take(max_results).cloned().collect()),
        }
    }

    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, SourceError> {
        self.list_unread(max_results).await
    }
}

pub fn mock_mailbox(emails: Vec<EmailSummary>) -> Arc<dyn MailboxReader> {
    Arc::new(CannedMailbox {
        emails,
        error: None,
    })
}

pub fn failing_mailbox(error: SourceError) -> Arc<dyn MailboxReader> {
    Arc::new(CannedMailbox {
        emails: vec![],
        error: Some(error),
    })
}

struct CannedCalendar {
    events: Vec<CalendarEvent>,
    error: Option<SourceError>,
}

#[async_trait]
impl CalendarReader for CannedCalendar {
    async fn list_upcoming(
        &self,
        _days: i64,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        match &self.error {
            Some(e) => Err(clone_source_error(e)),
            None => Ok(self.events.iter().take(max_results).cloned().collect()),
        }
    }

    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        self.list_upcoming(0, max_results).await
    }
}

pub fn mock_calendar(events: Vec<CalendarEvent>) -> Arc<dyn CalendarReader> {
    Arc::new(CannedCalendar {
        events,
        error: None,
    })
}

pub fn failing_calendar(error: SourceError) -> Arc<dyn CalendarReader> {
    Arc::new(CannedCalendar {
        events: vec![],
        error: Some(error),
    })
}

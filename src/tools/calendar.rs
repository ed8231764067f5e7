use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::tools::mailbox::source_error_text;
use crate::traits::{CalendarReader, Tool};

const MAX_RESULTS: usize = 10;
const DEFAULT_DAYS: i64 = 7;

pub struct CheckCalendarTool {
    calendar: Arc<dyn CalendarReader>,
}

impl CheckCalendarTool {
    pub fn new(calendar: Arc<dyn CalendarReader>) -> Self {
        Self { calendar }
    }
}

#[derive(Deserialize, Default)]
struct CheckCalendarArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    days: Option<i64>,
}

#[async_trait]
impl Tool for CheckCalendarTool {
    fn name(&self) -> &str {
        "check_calendar"
    }

    fn description(&self) -> &str {
        "Check the user's calendar for upcoming or matching events"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "check_calendar",
            "description": "Check the user's Google Calendar. With no query, returns upcoming events for the next `days` days. With a query, searches for matching events.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Optional search query (e.g. 'standup', 'dentist')."},
                    "days": {"type": "integer", "description": "How many days ahead to look (default 7)."}
                },
                "required": []
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: CheckCalendarArgs = serde_json::from_str(arguments).unwrap_or_default();
        let query = args.query.unwrap_or_default();
        let days = args.days.unwrap_or(DEFAULT_DAYS).max(1);

        let result = if query.is_empty() {
            self.calendar.list_upcoming(days, MAX_RESULTS).await
        } else {
            self.calendar.search(&query, MAX_RESULTS).await
        };

        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!("calendar lookup failed: {e}");
                return Ok(source_error_text(&e, "Google Calendar"));
            }
        };

        if events.is_empty() {
            return Ok(if query.is_empty() {
                format!("No upcoming events in the next {days} days.")
            } else {
                format!("No calendar events matching \"{query}\".")
            });
        }

        let lines: Vec<String> = events
            .iter()
            .map(|e| {
                let start = e
                    .start
                    .map(|s| s.to_rfc3339())
                    .unwrap_or_else(|| "?".to_string());
                let loc = e
                    .location
                    .as_ref()
                    .map(|l| format!(" @ {l}"))
                    .unwrap_or_default();
                format!("- {} ({start}{loc})", e.summary)
            })
            .collect();
        Ok(format!("Found {} event(s):\n{}", events.len(), lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_calendar, mock_calendar, sample_event};
    use crate::traits::SourceError;

    #[tokio::test]
    async fn lists_upcoming_events() {
        let tool = CheckCalendarTool::new(mock_calendar(vec![sample_event("Dentist")]));
        let reply = tool.call("{}").await.unwrap();
        assert!(reply.starts_with("Found 1 event(s):"));
        assert!(reply.contains("Dentist"));
    }

    #[tokio::test]
    async fn empty_calendar_names_the_window() {
        let tool = CheckCalendarTool::new(mock_calendar(vec![]));
        assert_eq!(
            tool.call(r#"{"days": 3}"#).await.unwrap(),
            "No upcoming events in the next 3 days."
        );
    }

    #[tokio::test]
    async fn source_errors_become_guidance() {
        let tool = CheckCalendarTool::new(failing_calendar(SourceError::Unavailable(
            "timeout".into(),
        )));
        let reply = tool.call("{}").await.unwrap();
        assert!(reply.contains("Couldn't reach Google Calendar"));
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::sources::{load_bearer_token, status_to_error, urlencode};
use crate::traits::{CalendarEvent, CalendarReader, SourceError};

const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars/primary";

/// Read-only Google Calendar client over the REST API (primary calendar).
pub struct GoogleCalendarReader {
    client: Client,
    token_path: String,
    base_url: String,
}

impl GoogleCalendarReader {
    pub fn new(token_path: &str) -> Self {
        Self {
            client: Client::new(),
            token_path: token_path.to_string(),
            base_url: CALENDAR_BASE.to_string(),
        }
    }

    async fn fetch_events(&self, params: &str) -> Result<Vec<CalendarEvent>, SourceError> {
        let token = load_bearer_token(&self.token_path)?;
        let url = format!(
            "{}/events?singleEvents=true&orderBy=startTime&{params}",
            self.base_url
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("calendar request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_to_error(status.as_u16(), "calendar"));
        }
        let data: Value = resp
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("calendar response not JSON: {e}")))?;

        Ok(data["items"]
            .as_array()
            .map(|items| items.iter().map(parse_event).collect())
            .unwrap_or_default())
    }
}

fn parse_event(item: &Value) -> CalendarEvent {
    // Timed events carry start.dateTime; all-day events only start.date.
    let start = item["start"]["dateTime"]
        .as_str()
        .or_else(|| item["start"]["date"].as_str())
        .and_then(parse_start);
    CalendarEvent {
        id: item["id"].as_str().unwrap_or_default().to_string(),
        summary: item["summary"].as_str().unwrap_or("(untitled)").to_string(),
        start,
        location: item["location"].as_str().map(|s| s.to_string()),
    }
}

fn parse_start(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

#[async_trait]
impl CalendarReader for GoogleCalendarReader {
    async fn list_upcoming(
        &self,
        days: i64,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        let now = Utc::now();
        let time_max = now + Duration::days(days);
        // RFC 3339 offsets contain '+', which must not read as a space.
        self.fetch_events(&format!(
            "timeMin={}&timeMax={}&maxResults={max_results}",
            urlencode(&now.to_rfc3339()),
            urlencode(&time_max.to_rfc3339())
        ))
        .await
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        self.fetch_events(&format!("q={}&maxResults={max_results}", urlencode(query)))
            .await
    }
}

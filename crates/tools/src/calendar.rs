//! Calendar fetch tool — today's learning events from Google Calendar.
//!
//! Thin adapter over the Calendar v3 events list endpoint. Events come back
//! ordered by start time (`singleEvents=true&orderBy=startTime`); all-day
//! entries carry a date instead of a dateTime and map to the day's bounds.
//! Entries that violate the `start < end` invariant are dropped here with a
//! warning — they never enter a run.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use studyclaw_core::error::ToolError;
use studyclaw_core::plan::LearningEvent;
use studyclaw_core::tool::{Tool, ToolResult};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar adapter configuration.
#[derive(Clone)]
pub struct CalendarToolConfig {
    /// Which calendar to read.
    pub calendar_id: String,
    /// OAuth bearer token (obtained externally).
    pub access_token: String,
    /// API base URL override (testing/proxies).
    pub api_url: Option<String>,
}

impl std::fmt::Debug for CalendarToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarToolConfig")
            .field("calendar_id", &self.calendar_id)
            .field("access_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl From<&studyclaw_config::CalendarConfig> for CalendarToolConfig {
    fn from(cfg: &studyclaw_config::CalendarConfig) -> Self {
        Self {
            calendar_id: cfg.calendar_id.clone().unwrap_or_default(),
            access_token: cfg.access_token.clone().unwrap_or_default(),
            api_url: cfg.api_url.clone(),
        }
    }
}

/// The `fetch_calendar` tool.
pub struct CalendarTool {
    config: CalendarToolConfig,
    client: reqwest::Client,
}

impl CalendarTool {
    pub fn new(config: CalendarToolConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Fetch all learning events scheduled on `date` (UTC day bounds).
    pub async fn fetch_events(&self, date: NaiveDate) -> Result<Vec<LearningEvent>, ToolError> {
        let day_start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        let day_end = Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).unwrap());

        let url = format!(
            "{}/calendars/{}/events",
            self.base_url(),
            self.config.calendar_id
        );

        debug!(calendar_id = %self.config.calendar_id, %date, "Fetching calendar events");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("timeMin", day_start.to_rfc3339()),
                ("timeMax", day_end.to_rfc3339()),
                ("singleEvents", "true".into()),
                ("orderBy", "startTime".into()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("fetch_calendar", e))?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            401 | 403 => {
                return Err(ToolError::AuthFailed {
                    tool_name: "fetch_calendar".into(),
                    reason: format!("calendar API returned {status}"),
                });
            }
            404 => {
                return Err(ToolError::Upstream {
                    tool_name: "fetch_calendar".into(),
                    status_code: 404,
                    message: format!("calendar '{}' not found", self.config.calendar_id),
                });
            }
            429 => {
                return Err(ToolError::RateLimited {
                    tool_name: "fetch_calendar".into(),
                    retry_after_secs: 30,
                });
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(ToolError::Upstream {
                    tool_name: "fetch_calendar".into(),
                    status_code: status,
                    message: body,
                });
            }
        }

        let listing: EventListing = response.json().await.map_err(|e| ToolError::Upstream {
            tool_name: "fetch_calendar".into(),
            status_code: 200,
            message: format!("failed to parse calendar response: {e}"),
        })?;

        let mut events = Vec::new();
        for item in listing.items {
            let Some(event) = item.into_learning_event(date) else {
                continue;
            };
            if !event.is_well_formed() {
                warn!(event_id = %event.id, "Dropping calendar event with start >= end");
                continue;
            }
            events.push(event);
        }
        Ok(events)
    }
}

#[async_trait]
impl Tool for CalendarTool {
    fn name(&self) -> &str {
        "fetch_calendar"
    }

    fn description(&self) -> &str {
        "Retrieve the learning events scheduled on the user's calendar for one day. \
         Returns each event's title, notes, and start/end times."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "The day to fetch, as YYYY-MM-DD. Defaults to today (UTC)."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let date = match arguments.get("date").and_then(|d| d.as_str()) {
            Some(raw) => raw.parse::<NaiveDate>().map_err(|_| {
                ToolError::InvalidArguments(format!("'date' must be YYYY-MM-DD, got '{raw}'"))
            })?,
            None => Utc::now().date_naive(),
        };

        let events = self.fetch_events(date).await?;
        let data = serde_json::to_value(&events).unwrap_or_default();
        let output = serde_json::to_string_pretty(&events).unwrap_or_default();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(data),
        })
    }
}

fn transport_error(tool_name: &str, e: reqwest::Error) -> ToolError {
    if e.is_timeout() {
        ToolError::Timeout {
            tool_name: tool_name.into(),
            timeout_secs: 30,
        }
    } else {
        ToolError::Network {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        }
    }
}

// --- Wire format structs ---

#[derive(Debug, Deserialize)]
struct EventListing {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    #[serde(default)]
    id: String,
    summary: Option<String>,
    description: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    start: Option<EventBoundary>,
    end: Option<EventBoundary>,
}

#[derive(Debug, Deserialize)]
struct EventBoundary {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl EventItem {
    fn into_learning_event(self, day: NaiveDate) -> Option<LearningEvent> {
        let start = self.start.as_ref()?.resolve(day, 0)?;
        let end = self.end.as_ref()?.resolve(day, 1)?;
        Some(LearningEvent {
            id: self.id,
            title: self.summary.unwrap_or_else(|| "(untitled)".into()),
            notes: self.description,
            link: self.html_link,
            start,
            end,
        })
    }
}

impl EventBoundary {
    /// A timed boundary parses its RFC 3339 dateTime; an all-day boundary
    /// maps to midnight of its date. The all-day end date is exclusive on
    /// this API, so a one-day event naturally spans a full day.
    fn resolve(&self, fallback_day: NaiveDate, fallback_offset_days: i64) -> Option<DateTime<Utc>> {
        if let Some(raw) = &self.date_time {
            return DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        let date = match &self.date {
            Some(raw) => raw.parse::<NaiveDate>().ok()?,
            None => fallback_day + chrono::Duration::days(fallback_offset_days),
        };
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> CalendarToolConfig {
        CalendarToolConfig {
            calendar_id: "learning".into(),
            access_token: "ya29.token".into(),
            api_url: Some(server.uri()),
        }
    }

    fn listing_body() -> serde_json::Value {
        serde_json::json!({
            "items": [
                {
                    "id": "evt1",
                    "summary": "Advanced Python with Asyncio",
                    "description": "Chapter 4",
                    "htmlLink": "https://calendar.google.com/event?eid=evt1",
                    "start": { "dateTime": "2025-06-02T09:00:00Z" },
                    "end": { "dateTime": "2025-06-02T10:30:00Z" }
                },
                {
                    "id": "evt2",
                    "summary": "Kubernetes study block",
                    "start": { "date": "2025-06-02" },
                    "end": { "date": "2025-06-03" }
                },
                {
                    "id": "evt3",
                    "summary": "Broken entry",
                    "start": { "dateTime": "2025-06-02T15:00:00Z" },
                    "end": { "dateTime": "2025-06-02T14:00:00Z" }
                }
            ]
        })
    }

    #[tokio::test]
    async fn fetches_and_maps_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/learning/events"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_body()))
            .expect(1)
            .mount(&server)
            .await;

        let tool = CalendarTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "date": "2025-06-02" }))
            .await
            .unwrap();

        assert!(result.success);
        let events: Vec<LearningEvent> =
            serde_json::from_value(result.data.unwrap()).unwrap();
        // evt3 has start >= end and is dropped at the boundary
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "evt1");
        assert_eq!(events[0].title, "Advanced Python with Asyncio");
        assert_eq!(events[0].notes.as_deref(), Some("Chapter 4"));
        // all-day event spans the whole day
        assert_eq!(events[1].id, "evt2");
        assert!(events[1].is_well_formed());
        assert_eq!((events[1].end - events[1].start).num_hours(), 24);
    }

    #[tokio::test]
    async fn empty_calendar_is_a_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })),
            )
            .mount(&server)
            .await;

        let tool = CalendarTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "date": "2025-06-02" }))
            .await
            .unwrap();
        assert!(result.success);
        let events: Vec<LearningEvent> =
            serde_json::from_value(result.data.unwrap()).unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn invalid_date_argument_rejected() {
        let server = MockServer::start().await;
        let tool = CalendarTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "date": "June 2nd" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn auth_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let tool = CalendarTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "date": "2025-06-02" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::AuthFailed { .. }));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn unknown_calendar_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tool = CalendarTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "date": "2025-06-02" }))
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let tool = CalendarTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "date": "2025-06-02" }))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = CalendarToolConfig {
            calendar_id: "learning".into(),
            access_token: "ya29.secret".into(),
            api_url: None,
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("ya29.secret"));
    }
}

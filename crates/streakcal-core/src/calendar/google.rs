//! Google Calendar v3 adapter.
//!
//! Requests run on a private current-thread tokio runtime so the rest of the
//! crate stays synchronous. The access token comes from
//! [`crate::integrations::google::GoogleAuth`]; the base URL is overridable
//! so tests can point the adapter at a mock server.

use std::future::Future;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{find_calendar, Calendar, CalendarEvent, CalendarInfo};
use crate::dates::DayBounds;
use crate::error::CalendarError;
use crate::integrations::google::GoogleAuth;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

struct GoogleClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl GoogleClient {
    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Send a request and decode the JSON body. `None` for empty bodies.
    fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, CalendarError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        self.block_on(async move {
            let resp = req.send().await?;
            let status = resp.status();
            let text = resp.text().await?;
            debug!(%method, path, %status, "google calendar request");

            match status {
                s if s.is_success() => {
                    if text.trim().is_empty() {
                        Ok(None)
                    } else {
                        serde_json::from_str(&text)
                            .map(Some)
                            .map_err(|e| CalendarError::Api(format!("invalid JSON: {e}")))
                    }
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(CalendarError::Auth(format!("{status}: {text}")))
                }
                StatusCode::NOT_FOUND | StatusCode::GONE => {
                    Err(CalendarError::EventNotFound(path.to_string()))
                }
                _ => Err(CalendarError::Api(format!("{status}: {text}"))),
            }
        })
    }
}

/// Calendars of the authenticated Google account.
pub struct GoogleCalendars {
    client: GoogleClient,
}

impl GoogleCalendars {
    /// Connect with the stored OAuth credentials.
    pub fn connect() -> Result<Self, CalendarError> {
        let token = GoogleAuth::new().access_token()?;
        Self::with_base_url(GOOGLE_CALENDAR_API, token)
    }

    /// Connect to `base_url` with a bearer token.
    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, CalendarError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CalendarError::Api(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            client: GoogleClient {
                base_url: base_url.trim_end_matches('/').to_string(),
                token: token.into(),
                http: reqwest::Client::new(),
                runtime,
            },
        })
    }

    pub fn list(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = Vec::new();
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let resp = self
                .client
                .call(Method::GET, "/users/me/calendarList", &query, None)?
                .unwrap_or(Value::Null);
            if let Some(items) = resp["items"].as_array() {
                calendars.extend(items.iter().filter_map(|cal| {
                    Some(CalendarInfo {
                        id: cal["id"].as_str()?.to_string(),
                        name: cal["summary"].as_str()?.to_string(),
                    })
                }));
            }
            match resp["nextPageToken"].as_str() {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(calendars)
    }

    /// Borrow the calendar whose summary is `name`.
    pub fn calendar(&self, name: &str) -> Result<GoogleCalendar<'_>, CalendarError> {
        let available = self.list()?;
        let info = find_calendar(&available, name)?.clone();
        Ok(GoogleCalendar {
            client: &self.client,
            info,
        })
    }
}

/// One Google calendar.
pub struct GoogleCalendar<'a> {
    client: &'a GoogleClient,
    info: CalendarInfo,
}

impl GoogleCalendar<'_> {
    fn events_path(&self) -> String {
        format!("/calendars/{}/events", urlencoding::encode(&self.info.id))
    }

    fn event_path(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_path(), urlencoding::encode(event_id))
    }

    fn map_missing(&self, err: CalendarError, event_id: &str) -> CalendarError {
        match err {
            CalendarError::EventNotFound(_) => CalendarError::EventNotFound(event_id.to_string()),
            other => other,
        }
    }
}

impl Calendar for GoogleCalendar<'_> {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn query_events(
        &self,
        range: &DayBounds,
        search: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let path = self.events_path();
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("timeMin", range.start.to_rfc3339()),
                ("timeMax", range.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", "2500".to_string()),
            ];
            if let Some(q) = search {
                query.push(("q", q.to_string()));
            }
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let resp = self
                .client
                .call(Method::GET, &path, &query, None)?
                .unwrap_or(Value::Null);
            if let Some(items) = resp["items"].as_array() {
                for item in items {
                    if item["status"].as_str() == Some("cancelled") {
                        continue;
                    }
                    events.push(parse_event(item)?);
                }
            }
            match resp["nextPageToken"].as_str() {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(events)
    }

    fn create_all_day_event(
        &mut self,
        title: &str,
        range: &DayBounds,
        description: &str,
    ) -> Result<CalendarEvent, CalendarError> {
        let body = json!({
            "summary": title,
            "description": description,
            "start": { "date": range.first_day.format("%Y-%m-%d").to_string() },
            "end": { "date": range.end_day.format("%Y-%m-%d").to_string() },
        });
        let resp = self
            .client
            .call(Method::POST, &self.events_path(), &[], Some(&body))?
            .ok_or_else(|| CalendarError::Api("empty response creating event".into()))?;
        parse_event(&resp)
    }

    fn delete_event(&mut self, event_id: &str) -> Result<(), CalendarError> {
        self.client
            .call(Method::DELETE, &self.event_path(event_id), &[], None)
            .map_err(|e| self.map_missing(e, event_id))?;
        Ok(())
    }

    fn set_description(&mut self, event_id: &str, description: &str) -> Result<(), CalendarError> {
        let body = json!({ "description": description });
        self.client
            .call(Method::PATCH, &self.event_path(event_id), &[], Some(&body))
            .map_err(|e| self.map_missing(e, event_id))?;
        Ok(())
    }
}

/// Parse a Google Calendar event resource.
pub fn parse_event(item: &Value) -> Result<CalendarEvent, CalendarError> {
    let id = item["id"]
        .as_str()
        .ok_or_else(|| CalendarError::Api("event without id".into()))?;
    let title = item["summary"].as_str().unwrap_or_default();
    let description = item["description"].as_str().unwrap_or_default();

    let (all_day, day, start, end) = if let Some(start_date) = item["start"]["date"].as_str() {
        let first = parse_day(start_date)?;
        let last = match item["end"]["date"].as_str() {
            Some(end_date) => parse_day(end_date)?,
            None => first.succ_opt().unwrap_or(first),
        };
        (true, first, utc_midnight(first), utc_midnight(last))
    } else {
        let start = parse_instant(&item["start"]["dateTime"])?;
        let end = parse_instant(&item["end"]["dateTime"])?;
        (false, start.with_timezone(&Local).date_naive(), start, end)
    };

    Ok(CalendarEvent {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        all_day,
        day,
        start,
        end,
    })
}

fn parse_day(s: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| CalendarError::Api(format!("invalid event date '{s}': {e}")))
}

fn parse_instant(v: &Value) -> Result<DateTime<Utc>, CalendarError> {
    let s = v
        .as_str()
        .ok_or_else(|| CalendarError::Api("event without start/end".into()))?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CalendarError::Api(format!("invalid event time '{s}': {e}")))
}

fn utc_midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

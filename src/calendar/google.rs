//! [`SchedulingCapability`] backed by the Google Calendar API (v3),
//! always against the user's primary calendar.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::*;
use crate::auth::OAuthSession;
use crate::google::{path_segment, GoogleApi};

pub const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

const EVENTS_PATH: &str = "/calendars/primary/events";
const DEFAULT_LIST_RESULTS: u32 = 10;
const TODAY_MAX_RESULTS: u32 = 50;
const WEEK_MAX_RESULTS: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventList {
    items: Vec<Event>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FreeBusyResponse {
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FreeBusyCalendar {
    busy: Vec<BusyInterval>,
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn attendee_list(emails: &[String]) -> Value {
    Value::Array(emails.iter().map(|e| json!({ "email": e })).collect())
}

/// Google Calendar adapter.  New events default to `time_zone`.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    api: GoogleApi,
    time_zone: Tz,
}

impl GoogleCalendarClient {
    pub fn new(session: Arc<OAuthSession>, time_zone: Tz) -> Self {
        Self::with_base_url(session, time_zone, CALENDAR_API)
    }

    pub fn with_base_url(
        session: Arc<OAuthSession>,
        time_zone: Tz,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api: GoogleApi::new(session, base_url),
            time_zone,
        }
    }

    fn zone_or_default<'a>(&self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(self.time_zone.name())
    }

    async fn events_between(
        &self,
        days: u64,
        max_results: u32,
    ) -> anyhow::Result<Vec<Event>> {
        let (start, end) = day_window(Utc::now(), self.time_zone, days);
        self.list_events(ListEventsInput {
            max_results: Some(max_results),
            time_min: Some(rfc3339(start)),
            time_max: Some(rfc3339(end)),
            q: None,
        })
        .await
    }
}

#[async_trait]
impl SchedulingCapability for GoogleCalendarClient {
    async fn list_events(&self, input: ListEventsInput) -> anyhow::Result<Vec<Event>> {
        let mut query: Vec<(&str, String)> = vec![
            (
                "timeMin",
                input.time_min.unwrap_or_else(|| rfc3339(Utc::now())),
            ),
            (
                "maxResults",
                input.max_results.unwrap_or(DEFAULT_LIST_RESULTS).to_string(),
            ),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(max) = input.time_max {
            query.push(("timeMax", max));
        }
        if let Some(q) = input.q {
            query.push(("q", q));
        }

        let list: EventList = self.api.get_json(EVENTS_PATH, &query).await?;
        debug!(count = list.items.len(), "calendar events listed");
        Ok(list.items)
    }

    async fn get_event(&self, event_id: &str) -> anyhow::Result<Event> {
        self.api
            .get_json(&format!("{EVENTS_PATH}/{}", path_segment(event_id)?), &[])
            .await
    }

    async fn create_event(&self, input: CreateEventInput) -> anyhow::Result<Event> {
        let zone = self.zone_or_default(input.time_zone.as_deref());
        let mut event = json!({
            "summary": input.summary,
            "start": { "dateTime": input.start, "timeZone": zone },
            "end": { "dateTime": input.end, "timeZone": zone },
        });
        if let Some(description) = input.description {
            event["description"] = json!(description);
        }
        if let Some(location) = input.location {
            event["location"] = json!(location);
        }
        if !input.attendees.is_empty() {
            event["attendees"] = attendee_list(&input.attendees);
        }

        let created: Event = self
            .api
            .send_json(
                Method::POST,
                EVENTS_PATH,
                &[("sendUpdates", "all".to_string())],
                &event,
            )
            .await?;
        debug!(id = ?created.get("id"), "calendar event created");
        Ok(created)
    }

    async fn update_event(&self, input: UpdateEventInput) -> anyhow::Result<Event> {
        let mut event = self.get_event(&input.event_id).await?;
        let zone = self.zone_or_default(input.time_zone.as_deref());

        // Empty strings leave the existing value in place.
        let provided = |v: Option<String>| v.filter(|s| !s.is_empty());
        if let Some(summary) = provided(input.summary) {
            event["summary"] = json!(summary);
        }
        if let Some(description) = provided(input.description) {
            event["description"] = json!(description);
        }
        if let Some(location) = provided(input.location) {
            event["location"] = json!(location);
        }
        if let Some(start) = provided(input.start) {
            event["start"] = json!({ "dateTime": start, "timeZone": zone });
        }
        if let Some(end) = provided(input.end) {
            event["end"] = json!({ "dateTime": end, "timeZone": zone });
        }
        if let Some(attendees) = input.attendees {
            event["attendees"] = attendee_list(&attendees);
        }

        self.api
            .send_json(
                Method::PUT,
                &format!("{EVENTS_PATH}/{}", path_segment(&input.event_id)?),
                &[("sendUpdates", "all".to_string())],
                &event,
            )
            .await
    }

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()> {
        self.api
            .send_empty(
                Method::DELETE,
                &format!("{EVENTS_PATH}/{}", path_segment(event_id)?),
                &[("sendUpdates", "all".to_string())],
            )
            .await
    }

    async fn find_free_slots(&self, query: FreeSlotQuery) -> anyhow::Result<Vec<FreeSlot>> {
        let body = json!({
            "timeMin": rfc3339(query.range_start),
            "timeMax": rfc3339(query.range_end),
            "items": [{ "id": "primary" }],
        });
        let resp: FreeBusyResponse = self
            .api
            .send_json(Method::POST, "/freeBusy", &[], &body)
            .await?;
        let busy = resp
            .calendars
            .get("primary")
            .map(|c| c.busy.as_slice())
            .unwrap_or(&[]);
        debug!(busy = busy.len(), "free/busy fetched");
        Ok(compute_free_slots(busy, &query))
    }

    async fn today_events(&self) -> anyhow::Result<Vec<Event>> {
        self.events_between(1, TODAY_MAX_RESULTS).await
    }

    async fn week_events(&self) -> anyhow::Result<Vec<Event>> {
        self.events_between(7, WEEK_MAX_RESULTS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::testing::session;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::with_base_url(session(), chrono_tz::Asia::Jerusalem, server.uri())
    }

    #[tokio::test]
    async fn list_defaults_to_upcoming_ten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("maxResults", "10"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "e1", "summary": "Standup"}]
            })))
            .mount(&server)
            .await;

        let events = client(&server)
            .list_events(ListEventsInput::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["summary"], "Standup");

        let requests = server.received_requests().await.unwrap();
        let url = &requests[0].url;
        assert!(url.query_pairs().any(|(k, _)| k == "timeMin"));
        assert!(!url.query_pairs().any(|(k, _)| k == "timeMax"));
    }

    #[tokio::test]
    async fn create_uses_default_zone_and_attendees() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .and(query_param("sendUpdates", "all"))
            .and(body_partial_json(json!({
                "summary": "Coffee",
                "start": {"dateTime": "2024-05-01T10:00:00", "timeZone": "Asia/Jerusalem"},
                "attendees": [{"email": "lora@x.com"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let input: CreateEventInput = serde_json::from_value(json!({
            "summary": "Coffee",
            "start": "2024-05-01T10:00:00",
            "end": "2024-05-01T10:30:00",
            "attendees": ["lora@x.com"]
        }))
        .unwrap();
        let created = client(&server).create_event(input).await.unwrap();
        assert_eq!(created["id"], "new-1");
    }

    #[tokio::test]
    async fn update_overlays_only_given_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{EVENTS_PATH}/e1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "e1",
                "summary": "Old",
                "location": "Room 1",
                "start": {"dateTime": "2024-05-01T10:00:00+03:00"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{EVENTS_PATH}/e1")))
            .and(body_partial_json(json!({
                "summary": "New",
                "location": "Room 1",
                "start": {"dateTime": "2024-05-01T10:00:00+03:00"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "e1", "summary": "New"})))
            .expect(1)
            .mount(&server)
            .await;

        let input: UpdateEventInput =
            serde_json::from_value(json!({"eventId": "e1", "summary": "New"})).unwrap();
        let updated = client(&server).update_event(input).await.unwrap();
        assert_eq!(updated["summary"], "New");
    }

    #[tokio::test]
    async fn delete_notifies_attendees() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{EVENTS_PATH}/e1")))
            .and(query_param("sendUpdates", "all"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_event("e1").await.unwrap();
    }

    #[tokio::test]
    async fn event_ids_are_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{EVENTS_PATH}/..%2F..%2FcalendarList%3FshowHidden")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        c.delete_event("../../calendarList?showHidden").await.unwrap();
        assert!(c.get_event(".").await.is_err());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn free_slots_use_primary_busy_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(body_partial_json(json!({
                "timeMin": "2024-05-01T09:00:00Z",
                "items": [{"id": "primary"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "calendars": {"primary": {"busy": [
                    {"start": "2024-05-01T10:00:00Z", "end": "2024-05-01T10:30:00Z"}
                ]}}
            })))
            .mount(&server)
            .await;

        let query = FindFreeSlotsInput {
            time_min: "2024-05-01T09:00:00Z".into(),
            time_max: "2024-05-01T11:30:00Z".into(),
            duration: None,
            step: None,
        }
        .into_query()
        .unwrap();
        let slots = client(&server).find_free_slots(query).await.unwrap();
        let starts: Vec<String> = slots.iter().map(|s| rfc3339(s.start)).collect();
        assert_eq!(starts, vec!["2024-05-01T09:00:00Z", "2024-05-01T10:30:00Z"]);
    }

    #[tokio::test]
    async fn week_events_ask_for_one_hundred() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("maxResults", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).week_events().await.unwrap().is_empty());
    }
}

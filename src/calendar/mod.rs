//! Scheduling capability: calendar events and free-slot search.

pub mod free_busy;
pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

pub use free_busy::{compute_free_slots, BusyInterval, FreeSlot, FreeSlotQuery, Interval};
pub use google::GoogleCalendarClient;

/// Calendar events are passed through in the provider's own JSON shape.
pub type Event = serde_json::Value;

pub const DEFAULT_SLOT_MINUTES: u32 = 60;
pub const MIN_SLOT_MINUTES: u32 = 15;
pub const DEFAULT_STEP_MINUTES: u32 = 30;

/// Narrow façade over a calendar provider.
#[async_trait]
pub trait SchedulingCapability: Send + Sync {
    async fn list_events(&self, input: ListEventsInput) -> anyhow::Result<Vec<Event>>;
    async fn get_event(&self, event_id: &str) -> anyhow::Result<Event>;
    async fn create_event(&self, input: CreateEventInput) -> anyhow::Result<Event>;
    async fn update_event(&self, input: UpdateEventInput) -> anyhow::Result<Event>;
    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()>;
    async fn find_free_slots(&self, query: FreeSlotQuery) -> anyhow::Result<Vec<FreeSlot>>;
    /// Events from local midnight today until local midnight tomorrow.
    async fn today_events(&self) -> anyhow::Result<Vec<Event>>;
    /// Events from local midnight today over the next seven days.
    async fn week_events(&self) -> anyhow::Result<Vec<Event>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsInput {
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub time_min: Option<String>,
    #[serde(default)]
    pub time_max: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdInput {
    pub event_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    pub event_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindFreeSlotsInput {
    pub time_min: String,
    pub time_max: String,
    /// Slot length in minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Cursor advance in minutes.
    #[serde(default)]
    pub step: Option<u32>,
}

impl FindFreeSlotsInput {
    pub fn into_query(self) -> anyhow::Result<FreeSlotQuery> {
        let duration = self.duration.unwrap_or(DEFAULT_SLOT_MINUTES);
        anyhow::ensure!(
            duration >= MIN_SLOT_MINUTES,
            "duration must be at least {MIN_SLOT_MINUTES} minutes"
        );
        let step = self.step.unwrap_or(DEFAULT_STEP_MINUTES);
        anyhow::ensure!(step >= 1, "step must be at least 1 minute");

        FreeSlotQuery::new(
            parse_instant("timeMin", &self.time_min)?,
            parse_instant("timeMax", &self.time_max)?,
            chrono::Duration::minutes(i64::from(duration)),
            chrono::Duration::minutes(i64::from(step)),
        )
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_instant(field: &str, raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("{field} is not an ISO 8601 timestamp ({raw:?}): {e}"))
}

/// First instant of `date` in `tz`.  Zones whose clocks skip midnight
/// start the day at the first hour that exists.
fn local_day_start(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    (0..24)
        .filter_map(|h| date.and_hms_opt(h, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// `[local midnight of now's date, local midnight `days` later)` in `tz`.
pub fn day_window(now: DateTime<Utc>, tz: Tz, days: u64) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&tz).date_naive();
    let end_date = today.checked_add_days(Days::new(days)).unwrap_or(today);
    (local_day_start(tz, today), local_day_start(tz, end_date))
}

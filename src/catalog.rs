//! Catalog browsing: categories, schedules and channels.
//!
//! The site's JSON is loosely shaped, so records are decoded tolerantly:
//! several field spellings are accepted, missing fields default, and list
//! endpoints may answer with a bare array or an object wrapping one.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::body::ResponseBody;
use crate::config::Endpoints;
use crate::error::{Error, Result};
use crate::session::{Request, Session};

/// Date format used by the schedule feed. Times are UTC.
pub const SCHEDULE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000";

/// Numeric start times at or above this are epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Page size requested from the schedule endpoint.
const SCHEDULE_PAGE_SIZE: &str = "300";

/// A browsable service (sport/league).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
}

/// A linear channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
}

/// Broadcast status of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventStatus {
    InPlay,
    Upcoming,
    Archive,
    /// Anything else, kept verbatim. Belongs to no bucket.
    Other(String),
    #[default]
    Unknown,
}

impl From<String> for EventStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "inplay" => Self::InPlay,
            "upcoming" => Self::Upcoming,
            "archive" => Self::Archive,
            "" => Self::Unknown,
            _ => Self::Other(raw),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InPlay => f.write_str("inplay"),
            Self::Upcoming => f.write_str("upcoming"),
            Self::Archive => f.write_str("archive"),
            Self::Other(raw) => f.write_str(raw),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for EventStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Self::from(raw),
            _ => Self::Unknown,
        })
    }
}

/// Client-side grouping of events by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBucket {
    Live,
    Upcoming,
    Archive,
}

impl EventBucket {
    pub fn contains(self, status: &EventStatus) -> bool {
        matches!(
            (self, status),
            (Self::Live, EventStatus::InPlay)
                | (Self::Upcoming, EventStatus::Upcoming)
                | (Self::Archive, EventStatus::Archive)
        )
    }
}

impl std::str::FromStr for EventBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "live" | "inplay" => Ok(Self::Live),
            "upcoming" => Ok(Self::Upcoming),
            "archive" => Ok(Self::Archive),
            other => Err(Error::Config(format!(
                "unknown bucket '{other}' (expected live, upcoming or archive)"
            ))),
        }
    }
}

/// A scheduled game or show.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, alias = "game_status", alias = "gameStatus")]
    pub status: EventStatus,
    #[serde(
        default,
        alias = "startTime",
        alias = "gameDate",
        deserialize_with = "de_start_time"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "imageUrl",
        alias = "image",
        deserialize_with = "non_empty_string"
    )]
    pub image_url: Option<String>,
    #[serde(
        default,
        alias = "airingId",
        alias = "airringId",
        deserialize_with = "string_or_number"
    )]
    pub airing_id: String,
}

/// Keep the events that fall in `bucket`, in their original order.
pub fn filter_events(events: &[Event], bucket: EventBucket) -> Vec<Event> {
    events
        .iter()
        .filter(|e| bucket.contains(&e.status))
        .cloned()
        .collect()
}

/// Parse a schedule timestamp as UTC. Accepts the feed's own format and
/// RFC 3339.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, SCHEDULE_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Epoch seconds or milliseconds, told apart by magnitude.
fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn de_start_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    let parsed = match &raw {
        Value::String(s) => parse_datetime(s).or_else(|| s.trim().parse().ok().and_then(from_epoch)),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::Null => return Ok(None),
        _ => None,
    };
    if parsed.is_none() {
        debug!("Unparseable start time: {raw}");
    }
    Ok(parsed)
}

fn non_empty_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Pull the record list out of a list endpoint's body.
fn extract_list<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            for key in keys {
                match map.get(*key) {
                    Some(Value::Array(items)) => return Some(items),
                    Some(nested @ Value::Object(_)) => {
                        if let Some(items) = extract_list(nested, keys) {
                            return Some(items);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

fn decode_list<T: for<'de> Deserialize<'de>>(
    endpoint: &'static str,
    body: &ResponseBody,
    keys: &[&str],
) -> Result<Vec<T>> {
    let value = body
        .structured()
        .ok_or_else(|| Error::unexpected(endpoint, "response is not structured"))?;
    let items = extract_list(value, keys)
        .ok_or_else(|| Error::unexpected(endpoint, format!("no list under {keys:?}")))?;

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match T::deserialize(item) {
            Ok(record) => records.push(record),
            Err(e) => debug!(endpoint, "Skipping malformed record: {e}"),
        }
    }
    Ok(records)
}

/// Read-only client for the catalog endpoints.
pub struct CatalogClient {
    session: Arc<Session>,
    endpoints: Endpoints,
}

impl CatalogClient {
    pub fn new(session: Arc<Session>, endpoints: Endpoints) -> Self {
        Self { session, endpoints }
    }

    /// Top-level categories (the `subCategories` of the player category).
    #[instrument(skip(self))]
    pub fn get_categories(&self) -> Result<Vec<Category>> {
        let response = self
            .session
            .request(Request::get(self.endpoints.categories()).param("format", "json"))?;
        let value = response
            .body
            .structured()
            .ok_or_else(|| Error::unexpected("categories", "response is not structured"))?;
        let items = value
            .get("subCategories")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::unexpected("categories", "no subCategories"))?;

        let categories: Vec<Category> = items
            .iter()
            .filter_map(|item| Category::deserialize(item).ok())
            .collect();
        debug!(count = categories.len(), "Categories fetched");
        Ok(categories)
    }

    /// Every event of `service_id`, all statuses.
    #[instrument(skip(self))]
    pub fn get_schedule(&self, service_id: &str) -> Result<Vec<Event>> {
        let request = Request::get(self.endpoints.schedule())
            .param("lid", service_id)
            .param("ps", SCHEDULE_PAGE_SIZE)
            .param("format", "json");
        let response = self.session.request(request)?;
        let events: Vec<Event> =
            decode_list("schedule", &response.body, &["games", "events", "schedule", "items"])?;
        debug!(count = events.len(), "Schedule fetched");
        Ok(events)
    }

    #[instrument(skip(self))]
    pub fn get_channels(&self) -> Result<Vec<Channel>> {
        let response = self
            .session
            .request(Request::get(self.endpoints.channels()).param("format", "json"))?;
        let channels: Vec<Channel> =
            decode_list("channels", &response.body, &["channels", "channel", "items"])?;
        debug!(count = channels.len(), "Channels fetched");
        Ok(channels)
    }
}

//! Event parsing and position lookup.
//!
//! Registry events (deployments, recoveries, position fixes) arrive as
//! wrapper records whose `event` object carries the payload; the event type
//! is a dual-shape vocabulary reference shared across the list.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::item_tree::RawVocableTerm;
use crate::reference::Ref;
use crate::uuid_index::UuidIndex;

/// A timestamped occurrence associated with an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub start_date: Option<DateTime<Utc>>,
    /// `None` for ongoing events.
    pub end_date: Option<DateTime<Utc>>,
    pub label: String,
    /// `None` when the registry holds no valid coordinate. A stored (0, 0)
    /// position stays `Some(0.0)`; absence is never encoded as zero.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    /// Resolved event-type display term; empty when unresolved.
    pub vocable: String,
    /// Id of the controlling vocabulary; empty when absent.
    pub vocabulary: String,
}

/// Coordinates of an item's most recent qualifying event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Geolocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    elevation: Option<f64>,
    #[serde(default, rename = "type")]
    event_type: Option<Ref<RawVocableTerm>>,
}

/// Parses raw event wrapper records into [`Event`]s, in input order.
///
/// Event-type references are optional: an unresolvable type leaves
/// `vocable` and `vocabulary` empty instead of failing.
pub fn parse_events(records: &[Value]) -> Result<Vec<Event>> {
    let mut index = UuidIndex::default();
    for record in records {
        index.extend(record);
    }

    let mut events = Vec::with_capacity(records.len());
    for record in records {
        let inner = unwrap_event(record);
        let raw: RawEvent = serde_json::from_value(inner.clone()).map_err(|source| Error::Json {
            context: "event record".to_string(),
            source,
        })?;
        events.push(build_event(raw, &index));
    }
    Ok(events)
}

/// Orders events newest first. Ongoing events (no `end_date`) are still
/// valid and sort before every dated event. The sort is stable, so events
/// with equal end dates keep their input order.
pub fn sort_most_recent_first(events: &mut [Event]) {
    events.sort_by(|a, b| match (a.end_date, b.end_date) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    });
}

/// Picks the coordinates of the most recent event whose vocable is in
/// `allowed_vocables` (or of the most recent event altogether when no
/// filter is given). Returns an all-`None` [`Geolocation`] when nothing
/// qualifies; this never fails.
pub fn most_recent_position(events: &[Event], allowed_vocables: Option<&[&str]>) -> Geolocation {
    let mut qualifying: Vec<Event> = events
        .iter()
        .filter(|event| {
            allowed_vocables.is_none_or(|allowed| allowed.contains(&event.vocable.as_str()))
        })
        .cloned()
        .collect();
    sort_most_recent_first(&mut qualifying);

    match qualifying.first() {
        Some(event) => Geolocation {
            latitude: event.latitude,
            longitude: event.longitude,
            elevation: event.elevation,
        },
        None => Geolocation::default(),
    }
}

// Some API revisions serve events bare instead of wrapped.
fn unwrap_event(record: &Value) -> &Value {
    match record.get("event") {
        Some(inner @ Value::Object(_)) => inner,
        _ => record,
    }
}

fn build_event(raw: RawEvent, index: &UuidIndex<'_>) -> Event {
    let (vocable, vocabulary) = match raw.event_type.and_then(|r| r.resolve(index)) {
        Some(term) => (
            term.display_name().unwrap_or_default().to_string(),
            term.vocabulary_id(),
        ),
        None => (String::new(), String::new()),
    };

    Event {
        id: raw.id.unwrap_or_default(),
        start_date: parse_timestamp(raw.start_date.as_deref()),
        end_date: parse_timestamp(raw.end_date.as_deref()),
        label: raw.label.unwrap_or_default(),
        latitude: checked_coordinate(raw.latitude, -90.0, 90.0),
        longitude: checked_coordinate(raw.longitude, -180.0, 180.0),
        elevation: raw.elevation,
        vocable,
        vocabulary,
    }
}

/// Accepts RFC 3339, bare `YYYY-MM-DDTHH:MM:SS`, and bare dates; everything
/// without an offset is taken as UTC.
pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.with_timezone(&Utc));
    }
    if let Ok(naive) = value.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    value
        .parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn checked_coordinate(value: Option<f64>, min: f64, max: f64) -> Option<f64> {
    value.filter(|v| (min..=max).contains(v))
}

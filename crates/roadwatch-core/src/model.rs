//! Feed items, persisted closure records, and lifecycle notifications.
//!
//! Serialized field names follow the upstream feed (`ID`, `IsFullClosure`,
//! `LastUpdated`, ...) so stored JSON and emitted notifications line up with
//! what operators see in the raw feed.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Feed items
// ---------------------------------------------------------------------------

/// One upstream event as returned by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedEvent {
    /// Upstream identifier. The feed sends it as either a string or a number.
    #[serde(rename = "ID", deserialize_with = "event_id_from_any")]
    pub id: String,
    pub is_full_closure: bool,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roadway_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub direction_of_travel: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: i64,
    #[serde(default)]
    pub planned_end_date: Option<i64>,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEventId {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn event_id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawEventId::deserialize(deserializer)? {
        RawEventId::Text(id) => id,
        RawEventId::Integer(id) => id.to_string(),
        RawEventId::Float(id) => id.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// Persisted state for one upstream closure, keyed by `event_id`.
///
/// After creation only `is_active`, the content fields, and `last_touched`
/// change. `detected_polygon` is assigned once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventRecord {
    #[serde(rename = "EventID")]
    pub event_id: String,
    pub is_full_closure: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub roadway_name: String,
    pub direction_of_travel: String,
    pub description: String,
    pub event_type: String,
    pub comment: Option<String>,
    pub start_date: i64,
    pub planned_end_date: Option<i64>,
    pub last_updated: Option<i64>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "lastTouched")]
    pub last_touched: Option<i64>,
    pub detected_polygon: Option<String>,
}

impl EventRecord {
    /// Build a fresh active record from a feed item.
    #[must_use]
    pub fn opened(event: &FeedEvent, now: i64, region: String) -> Self {
        Self {
            event_id: event.id.clone(),
            is_full_closure: event.is_full_closure,
            latitude: event.latitude,
            longitude: event.longitude,
            roadway_name: event.roadway_name.clone(),
            direction_of_travel: event.direction_of_travel.clone(),
            description: event.description.clone(),
            event_type: event.event_type.clone(),
            comment: event.comment.clone(),
            start_date: event.start_date,
            planned_end_date: event.planned_end_date,
            last_updated: event.last_updated,
            is_active: true,
            last_touched: Some(now),
            detected_polygon: Some(region),
        }
    }

    /// Produce the replacement record for a content update.
    ///
    /// Content fields come from the feed; identity, coordinates, start date
    /// and the detected region are carried over from `self`.
    #[must_use]
    pub fn updated_from(&self, event: &FeedEvent, now: i64) -> Self {
        Self {
            event_id: self.event_id.clone(),
            is_full_closure: event.is_full_closure,
            latitude: self.latitude,
            longitude: self.longitude,
            roadway_name: event.roadway_name.clone(),
            direction_of_travel: event.direction_of_travel.clone(),
            description: event.description.clone(),
            event_type: event.event_type.clone(),
            comment: event.comment.clone(),
            start_date: self.start_date,
            planned_end_date: event.planned_end_date,
            last_updated: event.last_updated,
            is_active: true,
            last_touched: Some(now),
            detected_polygon: self.detected_polygon.clone(),
        }
    }

    /// True when we hold a version marker and the feed's differs from it,
    /// including a feed item that has dropped its marker. Records stored
    /// without a marker are never treated as changed.
    #[must_use]
    pub fn content_changed(&self, event: &FeedEvent) -> bool {
        self.last_updated.is_some() && self.last_updated != event.last_updated
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Lifecycle transition announced to the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Opened,
    Updated,
    Completed,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => f.write_str("opened"),
            Self::Updated => f.write_str("updated"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// A typed lifecycle notification, tagged with the record's region if known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub region: Option<String>,
    pub event: EventRecord,
}

impl Notification {
    #[must_use]
    pub const fn new(kind: NotificationKind, event: EventRecord, region: Option<String>) -> Self {
        Self {
            kind,
            region,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_json(id: &str) -> String {
        format!(
            r#"{{
                "ID": {id},
                "IsFullClosure": true,
                "Latitude": 53.5461,
                "Longitude": -113.4938,
                "RoadwayName": "Hwy 16",
                "DirectionOfTravel": "Both Directions",
                "Description": "Closed for paving",
                "EventType": "closures",
                "StartDate": 1700000000,
                "PlannedEndDate": null,
                "LastUpdated": 1700000100,
                "Comment": null
            }}"#
        )
    }

    #[test]
    fn feed_event_accepts_string_and_numeric_ids() {
        let text: FeedEvent = serde_json::from_str(&feed_json("\"AB-42\"")).expect("string id");
        assert_eq!(text.id, "AB-42");

        let numeric: FeedEvent = serde_json::from_str(&feed_json("4242")).expect("numeric id");
        assert_eq!(numeric.id, "4242");
    }

    #[test]
    fn feed_event_treats_null_text_as_empty() {
        let json = r#"{
            "ID": "1",
            "IsFullClosure": false,
            "Latitude": 51.0,
            "Longitude": -114.0,
            "RoadwayName": null,
            "StartDate": null
        }"#;
        let event: FeedEvent = serde_json::from_str(json).expect("decode");
        assert_eq!(event.roadway_name, "");
        assert_eq!(event.description, "");
        assert_eq!(event.start_date, 0);
        assert_eq!(event.last_updated, None);
    }

    #[test]
    fn opened_record_is_active_and_tagged() {
        let event: FeedEvent = serde_json::from_str(&feed_json("7")).expect("decode");
        let record = EventRecord::opened(&event, 1_700_000_500, "Edmonton".into());

        assert!(record.is_active);
        assert_eq!(record.event_id, "7");
        assert_eq!(record.last_touched, Some(1_700_000_500));
        assert_eq!(record.detected_polygon.as_deref(), Some("Edmonton"));
        assert_eq!(record.last_updated, Some(1_700_000_100));
    }

    #[test]
    fn update_keeps_region_coordinates_and_start_date() {
        let event: FeedEvent = serde_json::from_str(&feed_json("7")).expect("decode");
        let record = EventRecord::opened(&event, 1_700_000_500, "Edmonton".into());

        let mut changed = event.clone();
        changed.latitude = 0.0;
        changed.start_date = 1;
        changed.description = "Reopened one lane".into();
        changed.last_updated = Some(1_700_000_900);

        let updated = record.updated_from(&changed, 1_700_001_000);
        assert_eq!(updated.detected_polygon.as_deref(), Some("Edmonton"));
        assert!((updated.latitude - 53.5461).abs() < f64::EPSILON);
        assert_eq!(updated.start_date, 1_700_000_000);
        assert_eq!(updated.description, "Reopened one lane");
        assert_eq!(updated.last_touched, Some(1_700_001_000));
    }

    #[test]
    fn content_change_requires_a_stored_marker() {
        let event: FeedEvent = serde_json::from_str(&feed_json("7")).expect("decode");
        let record = EventRecord::opened(&event, 0, "Other".into());
        assert!(!record.content_changed(&event));

        let mut newer = event.clone();
        newer.last_updated = Some(1_700_000_200);
        assert!(record.content_changed(&newer));

        let mut unversioned = event.clone();
        unversioned.last_updated = None;
        assert!(record.content_changed(&unversioned), "dropped feed marker is a change");

        let mut legacy = record;
        legacy.last_updated = None;
        assert!(!legacy.content_changed(&event), "unversioned record never updates");
        assert!(!legacy.content_changed(&unversioned));
    }

    #[test]
    fn record_serializes_with_feed_style_names() {
        let event: FeedEvent = serde_json::from_str(&feed_json("7")).expect("decode");
        let record = EventRecord::opened(&event, 5, "Calgary".into());
        let value = serde_json::to_value(&record).expect("serialize");

        assert_eq!(value["EventID"], "7");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["lastTouched"], 5);
        assert_eq!(value["DetectedPolygon"], "Calgary");
    }
}

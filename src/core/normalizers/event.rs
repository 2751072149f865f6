use super::fields::{address_from_value, at, bool_at, first_str, str_at};
use super::types::{Domain, EventAttendee, NormalizeContext, NormalizedRecord, UnifiedEvent};
use super::RecordNormalizer;
use serde_json::Value;

/// Google Calendar, Outlook and generic calendar entries.
pub struct EventNormalizer;

impl RecordNormalizer for EventNormalizer {
    fn domain(&self) -> Domain {
        Domain::Event
    }

    fn normalize(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord {
        let event = if is_google(raw) {
            from_google(raw, context)
        } else if is_outlook(raw) {
            from_outlook(raw, context)
        } else {
            from_generic(raw, context)
        };
        NormalizedRecord::Event(event)
    }
}

// Google events also carry `start.timeZone`, so only Graph-specific keys count.
fn is_outlook(raw: &Value) -> bool {
    ["subject", "webLink", "isAllDay", "bodyPreview"]
        .iter()
        .any(|key| raw.get(key).is_some())
        || at(raw, &["organizer", "emailAddress"]).is_some()
}

fn is_google(raw: &Value) -> bool {
    raw.get("htmlLink").is_some()
        || (raw.get("summary").is_some() && raw.get("start").is_some_and(Value::is_object))
}

/// Start or end of a Google-style `{dateTime}` / `{date}` object. The flag
/// is true for date-only values.
fn google_time(raw: &Value, key: &str) -> (Option<String>, bool) {
    match str_at(raw, &[key, "dateTime"]) {
        Some(stamp) => (Some(stamp), false),
        None => match str_at(raw, &[key, "date"]) {
            Some(day) => (Some(day), true),
            None => (None, false),
        },
    }
}

fn attendees(raw: &Value, status: &[&str]) -> Vec<EventAttendee> {
    let Some(items) = raw.get("attendees").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let address = address_from_value(item)?;
            Some(EventAttendee {
                email: address.email,
                name: address.name,
                response_status: str_at(item, status),
            })
        })
        .collect()
}

fn from_google(raw: &Value, context: &NormalizeContext) -> UnifiedEvent {
    let (start, all_day) = google_time(raw, "start");
    let (end, _) = google_time(raw, "end");
    let id = first_str(raw, &["id", "iCalUID"]);
    UnifiedEvent {
        title: first_str(raw, &["summary"]).unwrap_or_default(),
        description: first_str(raw, &["description"]),
        start,
        end,
        timezone: str_at(raw, &["start", "timeZone"]),
        all_day,
        location: first_str(raw, &["location"]),
        attendees: attendees(raw, &["responseStatus"]),
        organizer: str_at(raw, &["organizer", "email"]),
        link: first_str(raw, &["htmlLink", "hangoutLink"]),
        source: context.source(id.clone()),
        id,
    }
}

fn from_outlook(raw: &Value, context: &NormalizeContext) -> UnifiedEvent {
    let id = first_str(raw, &["id", "iCalUId"]);
    UnifiedEvent {
        title: first_str(raw, &["subject"]).unwrap_or_default(),
        description: first_str(raw, &["bodyPreview"]),
        start: str_at(raw, &["start", "dateTime"]),
        end: str_at(raw, &["end", "dateTime"]),
        timezone: str_at(raw, &["start", "timeZone"]),
        all_day: bool_at(raw, &["isAllDay"]).unwrap_or(false),
        location: str_at(raw, &["location", "displayName"]),
        attendees: attendees(raw, &["status", "response"]),
        organizer: str_at(raw, &["organizer", "emailAddress", "address"]),
        link: first_str(raw, &["webLink", "onlineMeetingUrl"]),
        source: context.source(id.clone()),
        id,
    }
}

fn from_generic(raw: &Value, context: &NormalizeContext) -> UnifiedEvent {
    let (start, date_only) = match first_str(raw, &["start", "start_time", "startTime"]) {
        Some(stamp) => (Some(stamp), false),
        None => google_time(raw, "start"),
    };
    let end = first_str(raw, &["end", "end_time", "endTime"]).or_else(|| google_time(raw, "end").0);
    let all_day = bool_at(raw, &["all_day"])
        .or_else(|| bool_at(raw, &["allDay"]))
        .unwrap_or(date_only);
    let id = first_str(raw, &["id", "event_id", "eventId", "uid"]);
    UnifiedEvent {
        title: first_str(raw, &["title", "summary", "subject", "name"]).unwrap_or_default(),
        description: first_str(raw, &["description", "notes", "details"]),
        start,
        end,
        timezone: first_str(raw, &["timezone", "timeZone", "tz"]),
        all_day,
        location: first_str(raw, &["location", "venue"]),
        attendees: attendees(raw, &["status"]),
        organizer: first_str(raw, &["organizer"]).or_else(|| str_at(raw, &["organizer", "email"])),
        link: first_str(raw, &["link", "url", "meeting_url"]),
        source: context.source(id.clone()),
        id,
    }
}

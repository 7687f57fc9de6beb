//! iCalendar (RFC 5545) export, so a saved selection can be subscribed to from any calendar app.
use crate::datastore::structs::Event;
use crate::labels::location_text;
use chrono::{offset::Utc, DateTime, Duration};
use icalendar::{Calendar, Component, EventLike, Property};

const TIMEZONE: &str = "Europe/Moscow";
const CALENDAR_DESCRIPTION: &str = "Календарь Спорта РФ";
const UID_DOMAIN: &str = "fsp-link-portal.ru";

/// Render `events` as a calendar named `name`. `now` is stamped on every event.
pub fn render(name: &str, events: &[Event], now: DateTime<Utc>) -> String {
    let mut calendar = Calendar::new();
    calendar
        .name(name)
        .description(CALENDAR_DESCRIPTION)
        .timezone(TIMEZONE)
        .append_property(Property::new("METHOD", "PUBLISH"));
    for event in events {
        calendar.push(calendar_event(event, now));
    }
    calendar.done().to_string()
}

fn calendar_event(event: &Event, now: DateTime<Utc>) -> icalendar::Event {
    let mut out = icalendar::Event::new();
    out.uid(&format!("{}@{}", event.id, UID_DOMAIN))
        .timestamp(now)
        .summary(&format!("{}: {}", event.sport, event.title))
        .starts(event.start_date.date())
        // All-day DTEND is exclusive.
        .ends(event.end_date.date() + Duration::days(1));
    if let Some(description) = &event.description {
        out.description(description);
    }
    if !event.location.0.is_empty() {
        let locations: Vec<String> = event.location.0.iter().map(location_text).collect();
        out.location(&locations.join("\n"));
    }
    out.done()
}

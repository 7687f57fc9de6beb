//! Human-readable labels shown next to events: how long until (or since) an event, and where it
//! takes place.
use crate::datastore::structs::Location;
use chrono::{offset::Utc, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Past,
    Present,
    Future,
}

/// Where a date range sits relative to today.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DateRangeInfo {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_till_start: i64,
    pub days_till_end: i64,
    pub time: TimeFrame,
    pub label: String,
}

/// Moscow has been UTC+3 all year round since 2014.
const MOSCOW_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Wall-clock time in Moscow. Event dates are stored as Moscow dates, so "now" and "today" for
/// labels, grouping and calendar windows come from here.
pub fn moscow_now() -> NaiveDateTime {
    Utc::now()
        .with_timezone(&FixedOffset::east(MOSCOW_UTC_OFFSET_SECS))
        .naive_local()
}

pub fn moscow_today() -> NaiveDate {
    moscow_now().date()
}

/// Pick the Russian plural form for `n`: one (1, 21, 101), few (2-4, 22-24) or many (everything
/// else, including 11-14).
pub fn pluralize<T>(n: i64, one: T, few: T, many: T) -> T {
    let n = n.abs();
    if n % 10 == 1 && n % 100 != 11 {
        return one;
    }
    if (2..=4).contains(&(n % 10)) && !(10..20).contains(&(n % 100)) {
        return few;
    }
    many
}

fn days(n: i64) -> String {
    format!("{} {}", n, pluralize(n, "день", "дня", "дней"))
}

pub fn info_for_date_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> DateRangeInfo {
    let days_till_start = (start - today).num_days();
    let days_till_end = (end - today).num_days();
    let (time, label) = if days_till_end < 0 {
        (TimeFrame::Past, format!("{} назад", days(-days_till_end)))
    } else if days_till_start > 0 {
        (TimeFrame::Future, format!("до начала {}", days(days_till_start)))
    } else {
        (TimeFrame::Present, format!("ещё {}", days(days_till_end)))
    };
    DateRangeInfo {
        start,
        end,
        days_till_start,
        days_till_end,
        time,
        label,
    }
}

/// Russian locations are well-known enough to skip the country.
pub fn location_text(location: &Location) -> String {
    let region = location.region.as_deref();
    let city = location.city.as_deref();
    let parts = if location.country == "Россия" && (city.is_some() || region.is_some()) {
        vec![region, city]
    } else {
        vec![Some(location.country.as_str()), region, city]
    };
    parts
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd(y, m, day)
    }

    #[test]
    fn test_pluralize() {
        let form = |n| pluralize(n, "one", "few", "many");
        assert_eq!(form(1), "one");
        assert_eq!(form(21), "one");
        assert_eq!(form(101), "one");
        assert_eq!(form(11), "many");
        assert_eq!(form(2), "few");
        assert_eq!(form(24), "few");
        assert_eq!(form(12), "many");
        assert_eq!(form(14), "many");
        assert_eq!(form(0), "many");
        assert_eq!(form(5), "many");
        assert_eq!(form(111), "many");
    }

    #[test]
    fn test_future_range() {
        let info = info_for_date_range(d(2024, 3, 10), d(2024, 3, 12), d(2024, 3, 7));
        assert_eq!(info.time, TimeFrame::Future);
        assert_eq!(info.days_till_start, 3);
        assert_eq!(info.label, "до начала 3 дня");
    }

    #[test]
    fn test_present_range() {
        let info = info_for_date_range(d(2024, 3, 1), d(2024, 3, 22), d(2024, 3, 1));
        assert_eq!(info.time, TimeFrame::Present);
        assert_eq!(info.label, "ещё 21 день");

        let last_day = info_for_date_range(d(2024, 3, 1), d(2024, 3, 5), d(2024, 3, 5));
        assert_eq!(last_day.label, "ещё 0 дней");
    }

    #[test]
    fn test_past_range() {
        let info = info_for_date_range(d(2024, 2, 1), d(2024, 2, 3), d(2024, 2, 14));
        assert_eq!(info.time, TimeFrame::Past);
        assert_eq!(info.days_till_end, -11);
        assert_eq!(info.label, "11 дней назад");
    }

    #[test]
    fn test_moscow_clock_runs_three_hours_ahead() {
        let ahead = moscow_now() - Utc::now().naive_utc();
        assert!((ahead.num_minutes() - 180).abs() <= 1, "{:?}", ahead);
    }

    #[test]
    fn test_location_text() {
        let loc = |country: &str, region: Option<&str>, city: Option<&str>| Location {
            country: country.to_owned(),
            region: region.map(str::to_owned),
            city: city.map(str::to_owned),
        };
        assert_eq!(
            location_text(&loc("Россия", Some("Москва"), Some("Москва"))),
            "Москва, Москва"
        );
        assert_eq!(location_text(&loc("Россия", None, None)), "Россия");
        assert_eq!(
            location_text(&loc("Беларусь", None, Some("Минск"))),
            "Беларусь, Минск"
        );
    }
}

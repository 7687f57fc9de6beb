//! Filters users send when searching for events. Every field is optional and an absent field is
//! never applied. Sub-filters are combined with AND; list sub-filters (`discipline`, `location`)
//! match if any of their entries match.
use crate::datastore::eventfilters::{AgeRange, EventFilters};
use crate::datastore::structs::Gender;
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Largest page a single search may return.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Age bounds assumed when a filter leaves one side open.
const DEFAULT_AGE_MIN: i32 = 0;
const DEFAULT_AGE_MAX: i32 = 100;

#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Filters {
    /// Free text, matched against any textual field of an event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<Vec<DisciplineFilter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec<LocationFilter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<MinMaxFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<MinMaxFilter>,
    /// If non-empty, this is the only filter applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_ids: Option<Vec<Uuid>>,
    /// Fields the server doesn't interpret. They're kept so a saved selection
    /// round-trips exactly what the portal sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
    /// Not earlier than. ISO-8601 date-time, a trailing `Z` is tolerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Not later than.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Default, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DisciplineFilter {
    pub sport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocationFilter {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// An empty sort means default order: events happening now, then upcoming, then past ones.
#[derive(Default, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<Order>,
}

impl Sort {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.age.is_none() && self.participant_count.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u32,
    /// 1-based.
    pub page_no: u32,
}

impl Pagination {
    pub fn new(page_size: u32, page_no: u32) -> Fallible<Self> {
        if page_no == 0 {
            return Err(anyhow::anyhow!("page_no was 0")).describe_err(ExternalError {
                cause: Cause::UserInvalidField,
                text: "page_no starts from 1",
            });
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(anyhow::anyhow!("page_size was {}", page_size)).describe_err(
                ExternalError {
                    cause: Cause::UserInvalidField,
                    text: "page_size must be between 1 and 1000",
                },
            );
        }
        Ok(Self { page_size, page_no })
    }

    /// How many matching events come before this page.
    pub fn offset(&self) -> usize {
        self.page_size as usize * (self.page_no as usize).saturating_sub(1)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_no: 1,
        }
    }
}

const BAD_DATE: ExternalError = ExternalError {
    cause: Cause::UserInvalidField,
    text: "date filter must be an ISO-8601 date-time",
};

/// Parse a date-time from a filter. Accepts RFC 3339 (with `Z` or an offset, whose wall-clock
/// time is kept), a naive date-time, or a bare date meaning its midnight.
pub fn parse_filter_datetime(s: &str) -> Fallible<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = s.parse::<NaiveDateTime>() {
        return Ok(dt);
    }
    let date = s.parse::<NaiveDate>().describe_err(BAD_DATE)?;
    Ok(date.and_hms(0, 0, 0))
}

impl Filters {
    /// Resolve the wire filters into the form the datastore executes. Fails if a date can't be
    /// parsed.
    pub fn into_event_filters(self) -> Fallible<EventFilters> {
        let date = self.date.unwrap_or_default();
        let starts_after = match date.start_date.as_deref() {
            Some(s) if !s.is_empty() => Some(parse_filter_datetime(s)?),
            _ => None,
        };
        let ends_before = match date.end_date.as_deref() {
            Some(s) if !s.is_empty() => Some(parse_filter_datetime(s)?),
            _ => None,
        };
        let age = self.age.map(|age| AgeRange {
            min: age.min.unwrap_or(DEFAULT_AGE_MIN),
            max: age.max.unwrap_or(DEFAULT_AGE_MAX),
        });
        let participant_count = self.participant_count.unwrap_or_default();
        Ok(EventFilters {
            by_ids: self.by_ids.filter(|ids| !ids.is_empty()),
            query: self
                .query
                .map(|q| q.trim().to_lowercase())
                .filter(|q| !q.is_empty()),
            starts_after,
            ends_before,
            disciplines: self.discipline.filter(|d| !d.is_empty()),
            locations: self.location.filter(|l| !l.is_empty()),
            gender: self.gender,
            age,
            participant_count_min: participant_count.min,
            participant_count_max: participant_count.max,
        })
    }
}

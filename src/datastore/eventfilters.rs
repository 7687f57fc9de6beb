//! Ways to filter events based on their fields. Filter semantics work just like SQL:
//! If a field is unset, its filter won't be applied.
//! If set, filter out events that don't match the filter.
use crate::datastore::structs::{Event, Gender};
use crate::selection::filters::{DisciplineFilter, LocationFilter, Order, Pagination, Sort};
use crate::labels::moscow_today;
use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use uuid::Uuid;

/// Filters that can be applied to queries on the datastore. Built from user-facing filters by
/// `selection::Filters::into_event_filters`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct EventFilters {
    pub by_ids: Option<Vec<Uuid>>,
    /// Lowercased.
    pub query: Option<String>,
    pub starts_after: Option<NaiveDateTime>,
    pub ends_before: Option<NaiveDateTime>,
    pub disciplines: Option<Vec<DisciplineFilter>>,
    pub locations: Option<Vec<LocationFilter>>,
    pub gender: Option<Gender>,
    pub age: Option<AgeRange>,
    pub participant_count_min: Option<i32>,
    pub participant_count_max: Option<i32>,
}

/// Inclusive age bounds. Matches events whose own age range overlaps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

/// Order events by the requested keys, in priority date, participant count, age. Events equal on
/// every requested key keep their relative order. Missing values sort first when ascending.
///
/// With no keys requested, events happening on `today` come first, then upcoming ones, then past
/// ones, each group in its original order.
pub fn sort_events(events: &mut [Event], sort: Sort, today: NaiveDate) {
    if sort.is_empty() {
        events.sort_by_key(|e| happening_rank(e, today));
        return;
    }
    events.sort_by(|a, b| {
        by_key(sort.date, &a.start_date, &b.start_date)
            .then_with(|| by_key(sort.participant_count, &a.participant_count, &b.participant_count))
            .then_with(|| by_key(sort.age, &a.age_min, &b.age_min))
    });
}

fn happening_rank(event: &Event, today: NaiveDate) -> u8 {
    if event.end_date.date() < today {
        2
    } else if event.start_date.date() > today {
        1
    } else {
        0
    }
}

fn by_key<T: Ord>(order: Option<Order>, a: &T, b: &T) -> Ordering {
    match order {
        None => Ordering::Equal,
        Some(Order::Asc) => a.cmp(b),
        Some(Order::Desc) => b.cmp(a),
    }
}

/// Filter, sort and cut one page out of the candidate events.
pub fn search(
    candidates: impl IntoIterator<Item = Event>,
    filters: &EventFilters,
    sort: Sort,
    pagination: Pagination,
) -> Vec<Event> {
    let mut found: Vec<Event> = candidates
        .into_iter()
        .filter(|event| event.matches(filters))
        .collect();
    sort_events(&mut found, sort, moscow_today());
    found
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.page_size as usize)
        .collect()
}

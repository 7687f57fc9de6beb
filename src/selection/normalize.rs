use crate::selection::filters::{DateFilter, Filters, MinMaxFilter};

/// Canonicalize sparse filters so that two semantically-equal filter sets serialize identically:
/// range and date sub-filters with nothing set are dropped entirely, and empty date strings are
/// dropped from the date sub-filter. Every other field passes through unchanged.
pub fn normalize_filters(filters: &Filters) -> Filters {
    Filters {
        date: filters.date.as_ref().and_then(normalize_date),
        age: filters.age.and_then(normalize_min_max),
        participant_count: filters.participant_count.and_then(normalize_min_max),
        gender: filters.gender,
        ..filters.clone()
    }
}

fn normalize_min_max(range: MinMaxFilter) -> Option<MinMaxFilter> {
    if range.min.is_none() && range.max.is_none() {
        return None;
    }
    Some(range)
}

fn normalize_date(date: &DateFilter) -> Option<DateFilter> {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());
    let normalized = DateFilter {
        start_date: non_empty(&date.start_date),
        end_date: non_empty(&date.end_date),
    };
    if normalized.start_date.is_none() && normalized.end_date.is_none() {
        return None;
    }
    Some(normalized)
}

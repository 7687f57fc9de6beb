//! Event search and selection sharing, as used by the portal. For every business-logic struct in
//! `datastore`, this module has a matching struct shaped for the portal.
use crate::api::{observe, CoerceColl, SelectionPath, State};
use crate::calendar;
use crate::datastore::facets::{self, CountryChoices, SportChoices};
use crate::datastore::structs::{Event, Gender, Locations, NewSelection, Selection};
use crate::datastore::Client;
use crate::labels::{
    info_for_date_range, location_text, moscow_now, moscow_today, DateRangeInfo,
};
use crate::selection::filters::{DateFilter, MAX_PAGE_SIZE};
use crate::selection::{normalize_filters, Filters, Pagination, Sort};
use crate::twoface::{ExternalError, Fallible, OrNotFound};
use actix_web::{http::header, web, HttpResponse};
use chrono::{offset::Utc, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{self, Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SELECTION_NOT_FOUND: ExternalError = ExternalError::not_found("Selection not found");
const EVENT_NOT_FOUND: ExternalError = ExternalError::not_found("Event not found");

/// The calendar export of a selection covers this window around today.
const CALENDAR_DAYS_BEFORE: i64 = 7;
const CALENDAR_DAYS_AFTER: i64 = 30;
const CALENDAR_NAME: &str = "Подборка Спортивных Событий";

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/events")
            .route("/search", web::post().to(search_events::<DS>))
            .route("/search/count", web::post().to(count_events::<DS>))
            .route(
                "/search/count-by-month",
                web::post().to(count_events_by_month::<DS>),
            )
            .route(
                "/search/filters/locations",
                web::get().to(location_choices::<DS>),
            )
            .route(
                "/search/filters/disciplines",
                web::get().to(discipline_choices::<DS>),
            )
            .route("/search/share", web::post().to(share_selection::<DS>))
            .route("/search/share/{selection_id}", web::get().to(get_selection::<DS>))
            .route(
                "/search/share/{selection_id}/.ics",
                web::get().to(get_selection_ics::<DS>),
            )
            .route("/{event_id}", web::get().to(get_event::<DS>)),
    );
}

/// An event as the portal shows it, with its date and location labels precomputed.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UserFacingEvent {
    pub id: Uuid,
    pub ekp_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub gender: Option<Gender>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub sport: String,
    pub discipline: Vec<String>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub location: Locations,
    pub location_text: Vec<String>,
    pub participant_count: Option<i32>,
    /// Relative to the day the response was made.
    pub timing: DateRangeInfo,
}

impl UserFacingEvent {
    pub fn new(e: Event, today: NaiveDate) -> Self {
        let timing = info_for_date_range(e.start_date.date(), e.end_date.date(), today);
        let location_text = e.location.0.iter().map(location_text).collect();
        Self {
            id: e.id,
            ekp_id: e.ekp_id,
            title: e.title,
            description: e.description,
            gender: e.gender,
            age_min: e.age_min,
            age_max: e.age_max,
            sport: e.sport,
            discipline: e.discipline,
            start_date: e.start_date,
            end_date: e.end_date,
            location: e.location,
            location_text,
            participant_count: e.participant_count,
            timing,
        }
    }
}

impl From<Event> for UserFacingEvent {
    // Labels are relative to today in Moscow.
    fn from(e: Event) -> Self {
        Self::new(e, moscow_today())
    }
}

#[derive(Deserialize, Default)]
pub struct SearchBody {
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sort: Sort,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// One page of search results, along with the request that produced it.
#[derive(Serialize, Deserialize, Debug)]
pub struct SearchEventsResponse {
    pub filters: Filters,
    pub sort: Sort,
    pub pagination: Pagination,
    pub page: u32,
    /// Never less than 1, even when nothing matched.
    pub pages_total: u32,
    pub events: Vec<UserFacingEvent>,
}

#[derive(Deserialize, Default)]
pub struct CountBody {
    #[serde(default)]
    pub filters: Filters,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CountResponse {
    pub count: usize,
}

/// A filter+sort pair, as sent when sharing or saving a selection.
#[derive(Serialize, Deserialize, Default, Clone)]
pub struct SelectionBody {
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub sort: Option<Sort>,
}

impl SelectionBody {
    /// Normalize the pair into the form selections are stored and compared in. Missing filters or
    /// sort mean "none".
    pub fn into_new_selection(self) -> Fallible<NewSelection> {
        let filters = normalize_filters(&self.filters.unwrap_or_default());
        Ok(NewSelection {
            filters: serde_json::to_value(filters)?,
            sort: serde_json::to_value(self.sort.unwrap_or_default())?,
        })
    }
}

async fn search_events<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<SearchBody>,
) -> Fallible<web::Json<SearchEventsResponse>> {
    observe("search_events", move || async move {
        let SearchBody {
            filters,
            sort,
            pagination,
        } = body.into_inner();
        let pagination = match pagination {
            Some(p) => Pagination::new(p.page_size, p.page_no)?,
            None => Pagination::default(),
        };
        let event_filters = filters.clone().into_event_filters()?;
        let matching = state.ds.count_events(event_filters.clone()).await?;
        let events = state.ds.search_events(event_filters, sort, pagination).await?;
        Ok(web::Json(SearchEventsResponse {
            filters,
            sort,
            pagination,
            page: pagination.page_no,
            pages_total: pages_total(matching, pagination.page_size),
            events: events.coerce_into(),
        }))
    })
    .await
}

fn pages_total(matching: usize, page_size: u32) -> u32 {
    let page_size = page_size.max(1) as usize;
    let pages = (matching + page_size - 1) / page_size;
    pages.max(1) as u32
}

async fn count_events<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<CountBody>,
) -> Fallible<web::Json<CountResponse>> {
    observe("count_events", move || async move {
        let filters = body.into_inner().filters.into_event_filters()?;
        let count = state.ds.count_events(filters).await?;
        Ok(web::Json(CountResponse { count }))
    })
    .await
}

/// How many events match in each month of the current year, keyed `"YYYY-MM"`. Any date filter
/// in the body is replaced by the month.
async fn count_events_by_month<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<CountBody>,
) -> Fallible<web::Json<BTreeMap<String, usize>>> {
    observe("count_events_by_month", move || async move {
        let mut filters = body.into_inner().filters;
        let mut counts = BTreeMap::new();
        for (month, start, end) in facets::months(moscow_today().year()) {
            filters.date = Some(DateFilter {
                start_date: Some(filter_bound(start.and_hms(0, 0, 0))),
                end_date: Some(filter_bound(end.and_hms(0, 0, 0))),
            });
            let count = state
                .ds
                .count_events(filters.clone().into_event_filters()?)
                .await?;
            counts.insert(month, count);
        }
        Ok(web::Json(counts))
    })
    .await
}

async fn location_choices<DS: Client>(
    state: web::Data<State<DS>>,
) -> Fallible<web::Json<Vec<CountryChoices>>> {
    observe("location_choices", move || async move {
        let locations = state.ds.event_locations().await?;
        Ok(web::Json(facets::location_choices(locations)))
    })
    .await
}

async fn discipline_choices<DS: Client>(
    state: web::Data<State<DS>>,
) -> Fallible<web::Json<Vec<SportChoices>>> {
    observe("discipline_choices", move || async move {
        let rows = state.ds.event_disciplines().await?;
        Ok(web::Json(facets::discipline_choices(rows)))
    })
    .await
}

async fn get_event<DS: Client>(
    state: web::Data<State<DS>>,
    event_id: web::Path<Uuid>,
) -> Fallible<web::Json<UserFacingEvent>> {
    observe("get_event", move || async move {
        let event = state
            .ds
            .find_event(*event_id)
            .await?
            .or_not_found(EVENT_NOT_FOUND)?;
        Ok(web::Json(event.into()))
    })
    .await
}

// Share a selection. The portal also uses this to build calendar links.
async fn share_selection<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<SelectionBody>,
) -> Fallible<web::Json<Selection>> {
    observe("share_selection", move || async move {
        let new_selection = body.into_inner().into_new_selection()?;
        let selection = state.ds.new_selection(new_selection).await?;
        Ok(web::Json(selection))
    })
    .await
}

async fn get_selection<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<SelectionPath>,
) -> Fallible<web::Json<Selection>> {
    observe("get_selection", move || async move {
        let selection = state
            .ds
            .find_selection(path.selection_id)
            .await?
            .or_not_found(SELECTION_NOT_FOUND)?;
        Ok(web::Json(selection))
    })
    .await
}

async fn get_selection_ics<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<SelectionPath>,
) -> Fallible<HttpResponse> {
    observe("get_selection_ics", move || async move {
        let selection = state
            .ds
            .find_selection(path.selection_id)
            .await?
            .or_not_found(SELECTION_NOT_FOUND)?;
        let mut filters: Filters = serde_json::from_value(selection.filters)?;
        let sort: Sort = serde_json::from_value(selection.sort)?;

        // Calendars get a rolling window around today instead of the saved dates.
        let now = moscow_now();
        filters.date = Some(DateFilter {
            start_date: Some(filter_bound(now - Duration::days(CALENDAR_DAYS_BEFORE))),
            end_date: Some(filter_bound(now + Duration::days(CALENDAR_DAYS_AFTER))),
        });
        let pagination = Pagination::new(MAX_PAGE_SIZE, 1)?;
        let events = state
            .ds
            .search_events(filters.into_event_filters()?, sort, pagination)
            .await?;

        let body = calendar::render(CALENDAR_NAME, &events, Utc::now());
        Ok(HttpResponse::Ok()
            .content_type("text/calendar; charset=utf-8")
            .header(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"schedule.ics\"",
            )
            .body(body))
    })
    .await
}

fn filter_bound(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::mock;
    use crate::datastore::structs::{fixtures::*, NewEvent};
    use crate::labels::TimeFrame;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn app_state(events: Vec<Event>) -> State<mock::Client> {
        let mut ds = mock::Client::default();
        ds.set_events(events);
        State { ds: Arc::new(ds) }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .data($state)
                    .configure(configure::<mock::Client>),
            )
            .await
        };
    }

    #[test]
    fn test_user_facing_event_labels() {
        let e = event(NewEvent {
            start_date: date(2024, 3, 10),
            end_date: date(2024, 3, 12),
            ..new_event("Кубок", "Самбо")
        });
        let shown = UserFacingEvent::new(e, NaiveDate::from_ymd(2024, 3, 9));
        assert_eq!(shown.timing.time, TimeFrame::Future);
        assert_eq!(shown.timing.label, "до начала 1 день");
        assert_eq!(shown.location_text, vec!["Республика Татарстан, Казань"]);
    }

    #[actix_rt::test]
    async fn test_search_filters_sorts_and_pages() {
        let events = vec![
            event(NewEvent {
                start_date: date(2024, 5, 1),
                end_date: date(2024, 5, 2),
                ..new_event("Майский турнир", "Самбо")
            }),
            event(NewEvent {
                start_date: date(2024, 4, 1),
                end_date: date(2024, 4, 2),
                ..new_event("Апрельский турнир", "Самбо")
            }),
            event(new_event("Кубок", "Дзюдо")),
        ];
        let mut app = app!(app_state(events));

        let req = test::TestRequest::post()
            .uri("/events/search")
            .set_json(&json!({
                "filters": {"discipline": [{"sport": "Самбо"}]},
                "sort": {"date": "asc"},
                "pagination": {"page_size": 10, "page_no": 1},
            }))
            .to_request();
        let found: SearchEventsResponse = test::read_response_json(&mut app, req).await;
        let titles: Vec<&str> = found.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Апрельский турнир", "Майский турнир"]);
        assert_eq!(found.page, 1);
        assert_eq!(found.pages_total, 1);
        assert_eq!(found.sort.date, Some(crate::selection::filters::Order::Asc));
        assert_eq!(found.pagination, Pagination::new(10, 1).unwrap());

        let req = test::TestRequest::post()
            .uri("/events/search/count")
            .set_json(&json!({"filters": {"discipline": [{"sport": "Самбо"}]}}))
            .to_request();
        let count: CountResponse = test::read_response_json(&mut app, req).await;
        assert_eq!(count, CountResponse { count: 2 });
    }

    #[test]
    fn test_pages_total() {
        assert_eq!(pages_total(0, 10), 1);
        assert_eq!(pages_total(10, 10), 1);
        assert_eq!(pages_total(11, 10), 2);
        assert_eq!(pages_total(3, 1), 3);
    }

    #[actix_rt::test]
    async fn test_search_response_echoes_request() {
        let events = (1..=5)
            .map(|day| {
                event(NewEvent {
                    start_date: date(2024, 3, day),
                    end_date: date(2024, 3, day),
                    ..new_event(&format!("Этап {}", day), "Самбо")
                })
            })
            .collect();
        let mut app = app!(app_state(events));

        let req = test::TestRequest::post()
            .uri("/events/search")
            .set_json(&json!({
                "filters": {"query": "этап"},
                "sort": {"date": "desc"},
                "pagination": {"page_size": 2, "page_no": 3},
            }))
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body["filters"], json!({"query": "этап"}));
        assert_eq!(body["sort"], json!({"date": "desc"}));
        assert_eq!(body["pagination"], json!({"page_size": 2, "page_no": 3}));
        assert_eq!(body["page"], json!(3));
        assert_eq!(body["pages_total"], json!(3));
        assert_eq!(body["events"].as_array().unwrap().len(), 1);
        assert_eq!(body["events"][0]["title"], json!("Этап 1"));

        // Without pagination the whole result fits on the default page.
        let req = test::TestRequest::post()
            .uri("/events/search")
            .set_json(&json!({"filters": {"query": "нет такого"}}))
            .to_request();
        let empty: SearchEventsResponse = test::read_response_json(&mut app, req).await;
        assert!(empty.events.is_empty());
        assert_eq!(empty.pages_total, 1);
        assert_eq!(empty.pagination, Pagination::default());
    }

    #[actix_rt::test]
    async fn test_count_by_month_covers_current_year() {
        let year = moscow_today().year();
        let events = vec![
            event(NewEvent {
                start_date: date(year, 3, 1),
                end_date: date(year, 3, 3),
                ..new_event("Мартовский", "Самбо")
            }),
            event(NewEvent {
                start_date: date(year, 3, 20),
                end_date: date(year, 3, 21),
                ..new_event("Ещё мартовский", "Самбо")
            }),
            // Spans two months, so it fits neither.
            event(NewEvent {
                start_date: date(year, 5, 30),
                end_date: date(year, 6, 2),
                ..new_event("Переходящий", "Самбо")
            }),
            event(NewEvent {
                start_date: date(year, 7, 1),
                end_date: date(year, 7, 1),
                ..new_event("Летний", "Дзюдо")
            }),
            event(NewEvent {
                start_date: date(year + 1, 3, 1),
                end_date: date(year + 1, 3, 1),
                ..new_event("В следующем году", "Самбо")
            }),
        ];
        let mut app = app!(app_state(events));

        let req = test::TestRequest::post()
            .uri("/events/search/count-by-month")
            .set_json(&json!({"filters": {
                "discipline": [{"sport": "Самбо"}],
                "date": {"start_date": "2000-01-01T00:00:00"},
            }}))
            .to_request();
        let counts: BTreeMap<String, usize> = test::read_response_json(&mut app, req).await;
        assert_eq!(counts.len(), 12);
        assert_eq!(counts[&format!("{}-03", year)], 2);
        assert_eq!(counts[&format!("{}-05", year)], 0);
        assert_eq!(counts[&format!("{}-07", year)], 0);
        assert_eq!(counts.values().sum::<usize>(), 2);
    }

    #[actix_rt::test]
    async fn test_filter_choices() {
        let events = vec![
            event(NewEvent {
                discipline: vec!["боевое самбо".to_owned()],
                ..new_event("Кубок", "Самбо")
            }),
            event(NewEvent {
                discipline: vec!["ката".to_owned()],
                location: Locations(vec![crate::datastore::structs::Location {
                    country: "Россия".to_owned(),
                    region: Some("Республика Татарстан".to_owned()),
                    city: Some("Альметьевск".to_owned()),
                }]),
                ..new_event("Первенство", "Дзюдо")
            }),
        ];
        let mut app = app!(app_state(events));

        let req = test::TestRequest::get()
            .uri("/events/search/filters/locations")
            .to_request();
        let locations: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(
            locations,
            json!([{
                "country": "Россия",
                "regions": [{
                    "region": "Республика Татарстан",
                    "cities": ["Альметьевск", "Казань"],
                }],
            }])
        );

        let req = test::TestRequest::get()
            .uri("/events/search/filters/disciplines")
            .to_request();
        let sports: Vec<SportChoices> = test::read_response_json(&mut app, req).await;
        let names: Vec<&str> = sports.iter().map(|s| s.sport.as_str()).collect();
        assert_eq!(names, vec!["Дзюдо", "Самбо"]);
        assert_eq!(sports[1].disciplines, vec!["боевое самбо"]);
    }

    #[actix_rt::test]
    async fn test_search_rejects_bad_input() {
        let mut app = app!(app_state(Vec::new()));

        let req = test::TestRequest::post()
            .uri("/events/search")
            .set_json(&json!({"pagination": {"page_size": 10, "page_no": 0}}))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/events/search")
            .set_json(&json!({"filters": {"date": {"start_date": "завтра"}}}))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_share_and_get_selection() {
        let mut app = app!(app_state(Vec::new()));

        let req = test::TestRequest::post()
            .uri("/events/search/share")
            .set_json(&json!({
                "filters": {"age": {"min": null, "max": null}, "gender": "male"},
                "sort": {"date": "desc"},
            }))
            .to_request();
        let shared: Selection = test::read_response_json(&mut app, req).await;
        assert_eq!(shared.filters, json!({"gender": "male"}));
        assert_eq!(shared.sort, json!({"date": "desc"}));

        let req = test::TestRequest::get()
            .uri(&format!("/events/search/share/{}", shared.id))
            .to_request();
        let fetched: Selection = test::read_response_json(&mut app, req).await;
        assert_eq!(fetched, shared);

        let req = test::TestRequest::get()
            .uri(&format!("/events/search/share/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "NotFound: Selection not found"}));
    }

    #[actix_rt::test]
    async fn test_selection_calendar_uses_rolling_window() {
        let today = moscow_today();
        let soon = today.and_hms(0, 0, 0) + Duration::days(3);
        let long_ago = today.and_hms(0, 0, 0) - Duration::days(60);
        let events = vec![
            event(NewEvent {
                start_date: soon,
                end_date: soon,
                ..new_event("Скоро", "Самбо")
            }),
            event(NewEvent {
                start_date: long_ago,
                end_date: long_ago,
                ..new_event("Давно", "Самбо")
            }),
        ];
        let mut app = app!(app_state(events));

        // The saved dates are ignored in favour of the window.
        let req = test::TestRequest::post()
            .uri("/events/search/share")
            .set_json(&json!({"filters": {"date": {"start_date": "2000-01-01T00:00:00"}}}))
            .to_request();
        let shared: Selection = test::read_response_json(&mut app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!("/events/search/share/{}/.ics", shared.id))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"schedule.ics\""
        );
        let body = test::read_body(resp).await;
        let ics = String::from_utf8(body.to_vec()).unwrap();
        assert!(ics.contains("SUMMARY:Самбо: Скоро"));
        assert!(!ics.contains("Давно"));
    }

    #[actix_rt::test]
    async fn test_get_event() {
        let e = event(new_event("Кубок", "Самбо"));
        let id = e.id;
        let mut app = app!(app_state(vec![e]));

        let req = test::TestRequest::get()
            .uri(&format!("/events/{}", id))
            .to_request();
        let shown: UserFacingEvent = test::read_response_json(&mut app, req).await;
        assert_eq!(shown.id, id);

        let req = test::TestRequest::get()
            .uri(&format!("/events/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

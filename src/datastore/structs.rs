use crate::datastore::eventfilters::EventFilters;
use crate::datastore::tables::{events, selections, users};
use crate::selection::filters::LocationFilter;
use chrono::{offset::Utc, DateTime, NaiveDateTime};
use diesel::{
    deserialize::{self, FromSql},
    pg::Pg,
    serialize::{self, Output, ToSql},
    sql_types::Jsonb,
};
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use uuid::Uuid;

/// A user of the portal.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub login: String,
    /// Ids of saved selections, see `selection::Favorites`.
    pub favorites: Vec<Uuid>,
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Deserialize)]
#[table_name = "users"]
pub struct NewUser {
    pub login: String,
}

/// A shared filter+sort snapshot. Never mutated once created.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Selection {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub filters: Value,
    pub sort: Value,
}

#[derive(Insertable)]
#[table_name = "selections"]
pub struct NewSelection {
    pub filters: Value,
    pub sort: Value,
}

#[derive(DbEnum, Debug, PartialEq, Serialize, Deserialize, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Where an event takes place.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Location {
    pub fn matches(&self, filter: &LocationFilter) -> bool {
        if self.country != filter.country {
            return false;
        }
        if filter.city.is_some() {
            // A city pins the region too, even when the filter leaves it out.
            return self.region == filter.region && self.city == filter.city;
        }
        filter.region.is_none() || self.region == filter.region
    }
}

/// Event locations, stored as a JSONB array.
#[derive(AsExpression, FromSqlRow, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[sql_type = "Jsonb"]
#[serde(transparent)]
pub struct Locations(pub Vec<Location>);

impl FromSql<Jsonb, Pg> for Locations {
    fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
        let value = <Value as FromSql<Jsonb, Pg>>::from_sql(bytes)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl ToSql<Jsonb, Pg> for Locations {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        let value = serde_json::to_value(self)?;
        <Value as ToSql<Jsonb, Pg>>::to_sql(&value, out)
    }
}

/// A sports event from the unified calendar.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Number of the event in the unified calendar plan (ЕКП).
    pub ekp_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// None means any gender.
    pub gender: Option<Gender>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub sport: String,
    pub discipline: Vec<String>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub location: Locations,
    pub participant_count: Option<i32>,
}

/// Parameters for the database statement which inserts new events.
#[derive(Insertable, Deserialize, Clone, Debug)]
#[table_name = "events"]
pub struct NewEvent {
    pub ekp_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age_min: Option<i32>,
    #[serde(default)]
    pub age_max: Option<i32>,
    pub sport: String,
    #[serde(default)]
    pub discipline: Vec<String>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    #[serde(default)]
    pub location: Locations,
    #[serde(default)]
    pub participant_count: Option<i32>,
}

impl Event {
    /// Does this event match all specified filters?
    pub fn matches(&self, filters: &EventFilters) -> bool {
        // An explicit id list overrides every other filter.
        if let Some(ids) = &filters.by_ids {
            return ids.contains(&self.id);
        }
        if let Some(age) = filters.age {
            let youngest = self.age_min.unwrap_or(i32::MIN);
            let oldest = self.age_max.unwrap_or(i32::MAX);
            if youngest > age.max || oldest < age.min {
                return false;
            }
        }
        if let Some(min) = filters.participant_count_min {
            if !matches!(self.participant_count, Some(count) if count >= min) {
                return false;
            }
        }
        if let Some(max) = filters.participant_count_max {
            if !matches!(self.participant_count, Some(count) if count <= max) {
                return false;
            }
        }
        if let (Some(wanted), Some(gender)) = (filters.gender, self.gender) {
            if wanted != gender {
                return false;
            }
        }
        if let Some(starts_after) = filters.starts_after {
            if self.start_date < starts_after {
                return false;
            }
        }
        if let Some(ends_before) = filters.ends_before {
            if self.end_date > ends_before {
                return false;
            }
        }
        if let Some(disciplines) = &filters.disciplines {
            if !disciplines.iter().any(|d| d.sport == self.sport) {
                return false;
            }
            // Disciplines only narrow the search if every entry names one.
            if disciplines.iter().all(|d| d.discipline.is_some()) {
                let mut listed = disciplines.iter().filter_map(|d| d.discipline.as_ref());
                if !listed.any(|name| self.discipline.contains(name)) {
                    return false;
                }
            }
        }
        if let Some(locations) = &filters.locations {
            let any_match = locations
                .iter()
                .any(|filter| self.location.0.iter().any(|loc| loc.matches(filter)));
            if !any_match {
                return false;
            }
        }
        if let Some(query) = &filters.query {
            if !self.searchable_text().contains(query.as_str()) {
                return false;
            }
        }
        true
    }

    /// Lowercased text that free-text queries search through.
    fn searchable_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.sport.as_str()];
        if let Some(description) = &self.description {
            parts.push(description);
        }
        for location in &self.location.0 {
            parts.push(&location.country);
            parts.extend(location.region.as_deref());
            parts.extend(location.city.as_deref());
        }
        parts.join("\n").to_lowercase()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(y, m, d).and_hms(0, 0, 0)
    }

    pub fn new_event(title: &str, sport: &str) -> NewEvent {
        NewEvent {
            ekp_id: 1,
            title: title.to_owned(),
            description: None,
            gender: None,
            age_min: None,
            age_max: None,
            sport: sport.to_owned(),
            discipline: Vec::new(),
            start_date: date(2024, 3, 1),
            end_date: date(2024, 3, 3),
            location: Locations(vec![Location {
                country: "Россия".to_owned(),
                region: Some("Республика Татарстан".to_owned()),
                city: Some("Казань".to_owned()),
            }]),
            participant_count: None,
        }
    }

    pub fn event(new: NewEvent) -> Event {
        Event {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            ekp_id: new.ekp_id,
            title: new.title,
            description: new.description,
            gender: new.gender,
            age_min: new.age_min,
            age_max: new.age_max,
            sport: new.sport,
            discipline: new.discipline,
            start_date: new.start_date,
            end_date: new.end_date,
            location: new.location,
            participant_count: new.participant_count,
        }
    }
}

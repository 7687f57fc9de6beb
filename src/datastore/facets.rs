//! The choices the portal's filter panel offers, gathered from the events themselves.
use crate::datastore::structs::Locations;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Settlement kinds that the calendar sometimes leaves in the city slot when it couldn't place a
/// town in a region. They aren't real cities.
const NOT_A_CITY: [&str; 6] = [
    "городской округ",
    "деревня",
    "железнодорожной станции",
    "поселок",
    "поселок городского типа",
    "село",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegionChoices {
    pub region: Option<String>,
    pub cities: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CountryChoices {
    pub country: String,
    pub regions: Vec<RegionChoices>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SportChoices {
    pub sport: String,
    pub disciplines: Vec<String>,
}

/// Every distinct country, region and city, nested and sorted. Missing regions sort first.
pub fn location_choices(all: impl IntoIterator<Item = Locations>) -> Vec<CountryChoices> {
    let unique: BTreeSet<_> = all
        .into_iter()
        .flat_map(|locations| locations.0)
        .map(|l| (l.country, l.region, l.city))
        .collect();

    let mut countries: BTreeMap<String, BTreeMap<Option<String>, Vec<String>>> = BTreeMap::new();
    for (country, region, city) in unique {
        if region.is_none() && matches!(&city, Some(c) if NOT_A_CITY.contains(&c.as_str())) {
            continue;
        }
        let cities = countries
            .entry(country)
            .or_default()
            .entry(region)
            .or_default();
        cities.extend(city);
    }
    countries
        .into_iter()
        .map(|(country, regions)| CountryChoices {
            country,
            regions: regions
                .into_iter()
                .map(|(region, cities)| RegionChoices { region, cities })
                .collect(),
        })
        .collect()
}

/// Every sport with the distinct disciplines held under it, both sorted.
pub fn discipline_choices(all: impl IntoIterator<Item = (String, Vec<String>)>) -> Vec<SportChoices> {
    let mut sports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (sport, disciplines) in all {
        sports.entry(sport).or_default().extend(disciplines);
    }
    sports
        .into_iter()
        .map(|(sport, disciplines)| SportChoices {
            sport,
            disciplines: disciplines.into_iter().collect(),
        })
        .collect()
}

/// The twelve months of `year` as (`"YYYY-MM"`, first day, first day of the next month).
pub fn months(year: i32) -> Vec<(String, NaiveDate, NaiveDate)> {
    (1..=12)
        .map(|month| {
            let start = NaiveDate::from_ymd(year, month, 1);
            let end = if month == 12 {
                NaiveDate::from_ymd(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd(year, month + 1, 1)
            };
            (format!("{}-{:02}", year, month), start, end)
        })
        .collect()
}

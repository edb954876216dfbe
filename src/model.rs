//! Core domain types: cities, observations and per-city series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The six cities covered by the 2024 PM2.5 dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "Los Angeles")]
    LosAngeles,
    Fresno,
    Phoenix,
    Denver,
    #[serde(rename = "Salt Lake City")]
    SaltLakeCity,
    Pittsburgh,
}

impl City {
    pub const ALL: [City; 6] = [
        City::LosAngeles,
        City::Fresno,
        City::Phoenix,
        City::Denver,
        City::SaltLakeCity,
        City::Pittsburgh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            City::LosAngeles => "Los Angeles",
            City::Fresno => "Fresno",
            City::Phoenix => "Phoenix",
            City::Denver => "Denver",
            City::SaltLakeCity => "Salt Lake City",
            City::Pittsburgh => "Pittsburgh",
        }
    }

    /// Two-digit state FIPS code used by EPA AQS.
    pub fn state_code(self) -> &'static str {
        match self {
            City::LosAngeles | City::Fresno => "06",
            City::Phoenix => "04",
            City::Denver => "08",
            City::SaltLakeCity => "49",
            City::Pittsburgh => "42",
        }
    }

    /// Three-digit county FIPS codes whose monitors are averaged for the city.
    pub fn county_codes(self) -> &'static [&'static str] {
        match self {
            City::LosAngeles => &["037"],
            City::Fresno => &["019"],
            City::Phoenix => &["013"],
            City::Denver => &["031"],
            City::SaltLakeCity => &["035"],
            City::Pittsburgh => &["003"],
        }
    }

    /// Chart colour, from a palette that stays distinct under reduced colour vision.
    pub fn color(self) -> &'static str {
        match self {
            City::LosAngeles => "#1f77b4",
            City::Fresno => "#ff7f0e",
            City::Phoenix => "#2ca02c",
            City::Denver => "#d62728",
            City::SaltLakeCity => "#9467bd",
            City::Pittsburgh => "#8c564b",
        }
    }

    /// File-system friendly identifier, e.g. `salt_lake_city`.
    pub fn slug(self) -> String {
        self.name().to_lowercase().replace(' ', "_")
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for City {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        City::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted) || c.slug() == wanted)
            .ok_or_else(|| Error::UnknownCity(wanted.to_string()))
    }
}

/// One daily PM2.5 reading, in μg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub city: City,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, city: City, value: f64) -> Self {
        Self { date, city, value }
    }
}

/// Observations for a single city, ordered by date with no repeated days.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    city: City,
    observations: Vec<Observation>,
}

impl Series {
    /// Builds a series, sorting by date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDate`] if two observations share a day.
    pub fn new(city: City, mut observations: Vec<Observation>) -> Result<Self> {
        observations.sort_by_key(|o| o.date);

        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(Error::DuplicateDate {
                city: city.name().to_string(),
                date: pair[0].date,
            });
        }

        Ok(Self { city, observations })
    }

    /// Convenience constructor for consecutive daily values starting at `start`.
    pub fn daily(city: City, start: NaiveDate, values: &[f64]) -> Self {
        let observations = start
            .iter_days()
            .zip(values)
            .map(|(date, &value)| Observation::new(date, city, value))
            .collect();
        Self { city, observations }
    }

    pub fn city(&self) -> City {
        self.city
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Keeps only the observations matching `keep`. Order is preserved.
    pub fn retain(&self, keep: impl Fn(&Observation) -> bool) -> Self {
        Self {
            city: self.city,
            observations: self.observations.iter().copied().filter(keep).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_city_parse_accepts_names_and_slugs() {
        assert_eq!("Salt Lake City".parse::<City>().unwrap(), City::SaltLakeCity);
        assert_eq!("salt_lake_city".parse::<City>().unwrap(), City::SaltLakeCity);
        assert_eq!(" fresno ".parse::<City>().unwrap(), City::Fresno);
    }

    #[test]
    fn test_city_parse_unknown() {
        assert!(matches!("Boston".parse::<City>(), Err(Error::UnknownCity(c)) if c == "Boston"));
    }

    #[test]
    fn test_series_sorts_by_date() {
        let series = Series::new(
            City::Denver,
            vec![
                Observation::new(day(3), City::Denver, 3.0),
                Observation::new(day(1), City::Denver, 1.0),
                Observation::new(day(2), City::Denver, 2.0),
            ],
        )
        .unwrap();

        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.first_date(), Some(day(1)));
        assert_eq!(series.last_date(), Some(day(3)));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = Series::new(
            City::Denver,
            vec![
                Observation::new(day(1), City::Denver, 1.0),
                Observation::new(day(1), City::Denver, 2.0),
            ],
        );

        assert!(matches!(result, Err(Error::DuplicateDate { date, .. }) if date == day(1)));
    }

    #[test]
    fn test_daily_assigns_consecutive_dates() {
        let series = Series::daily(City::Phoenix, day(30), &[1.0, 2.0, 3.0]);
        let dates = series.dates();

        assert_eq!(dates[0], day(30));
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}

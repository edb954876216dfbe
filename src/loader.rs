//! Loading and filtering of the tidy PM2.5 CSV.
//!
//! Expected columns: `date,city,pollutant,value`, dates as `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{City, Observation, Series};

const REQUIRED_COLUMNS: [&str; 4] = ["date", "city", "pollutant", "value"];

#[derive(Debug, Deserialize)]
struct Row {
    date: String,
    city: String,
    #[allow(dead_code)]
    pollutant: String,
    value: Option<f64>,
}

/// Reads PM2.5 observations from the CSV file at `path`.
///
/// # Errors
///
/// Fails on I/O or CSV errors, on missing columns, on unknown cities,
/// unparsable dates and negative concentrations. Rows with an empty value
/// are skipped.
#[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_pm25_data(path: impl AsRef<Path>) -> Result<Vec<Observation>> {
    let file = std::fs::File::open(path.as_ref())?;
    read_pm25_data(file)
}

/// Same as [`load_pm25_data`] for any reader.
pub fn read_pm25_data<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing.join(", ")));
    }

    let mut observations = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize() {
        let row: Row = result?;

        let Some(value) = row.value.filter(|v| !v.is_nan()) else {
            skipped += 1;
            continue;
        };
        if value < 0.0 {
            return Err(Error::OutOfRange(value));
        }

        let date = parse_date(&row.date)?;
        let city: City = row.city.parse()?;
        observations.push(Observation::new(date, city, value));
    }

    if skipped > 0 {
        warn!(skipped, "Rows without a value were skipped");
    }
    debug!(rows = observations.len(), "PM2.5 data loaded");

    Ok(observations)
}

/// Parses `YYYY-MM-DD`, tolerating a trailing time component
/// (`2024-01-01 00:00:00`) as written by some exporters.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| Error::InvalidDate(raw.to_string()))
}

/// Cities present, sorted alphabetically by name.
pub fn cities(observations: &[Observation]) -> Vec<City> {
    let mut found: Vec<City> = observations.iter().map(|o| o.city).collect();
    found.sort_by_key(|c| c.name());
    found.dedup();
    found
}

/// The series for `city`.
///
/// # Errors
///
/// [`Error::CityNotFound`] when no observation belongs to `city`.
pub fn filter_by_city(observations: &[Observation], city: City) -> Result<Series> {
    let rows: Vec<Observation> = observations
        .iter()
        .filter(|o| o.city == city)
        .copied()
        .collect();

    if rows.is_empty() {
        let available: Vec<&str> = cities(observations).into_iter().map(City::name).collect();
        return Err(Error::CityNotFound {
            city: city.name().to_string(),
            available: available.join(", "),
        });
    }

    Series::new(city, rows)
}

/// Observations with `start <= date <= end`; a missing bound is open.
pub fn filter_by_date_range(
    series: &Series,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Series {
    series.retain(|o| start.is_none_or(|s| o.date >= s) && end.is_none_or(|e| o.date <= e))
}

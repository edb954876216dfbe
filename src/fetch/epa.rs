//! Reduction of EPA AQS daily summary files to per-city daily means.
//!
//! The bulk files (`daily_88101_<year>.csv`) carry one row per monitor per
//! day. Rows are matched to cities by state and county FIPS code and all
//! monitors of a city are averaged into one value per day.

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::loader::parse_date;
use crate::model::{City, Observation};

/// EPA parameter code for PM2.5 FRM/FEM mass.
pub const PM25_PARAMETER_CODE: &str = "88101";

const BASE_URL: &str = "https://aqs.epa.gov/aqsweb/airdata";

const STATE_CODE: &str = "State Code";
const COUNTY_CODE: &str = "County Code";
const DATE_LOCAL: &str = "Date Local";
const ARITHMETIC_MEAN: &str = "Arithmetic Mean";

/// URL of the zipped bulk file for `year`.
pub fn airdata_url(year: i32, parameter_code: &str) -> String {
    format!("{BASE_URL}/daily_{parameter_code}_{year}.zip")
}

/// One row of the tidy CSV consumed by [`crate::loader`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow {
    pub date: NaiveDate,
    pub city: &'static str,
    pub pollutant: &'static str,
    pub value: f64,
}

impl From<&Observation> for TidyRow {
    fn from(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            city: obs.city.name(),
            pollutant: "PM2.5",
            value: obs.value,
        }
    }
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    match bytes {
        [0x1f, 0x8b, ..] => {
            let mut out = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut out)?;
            debug!(compressed = bytes.len(), raw = out.len(), "Gzip input inflated");
            Ok(out)
        }
        [b'P', b'K', 0x03, 0x04, ..] => unzip_csv(bytes),
        _ => Ok(bytes.to_vec()),
    }
}

/// Extracts the first `.csv` entry of a zip archive, as shipped in the
/// EPA bulk downloads.
fn unzip_csv(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let Some(name) = archive
        .file_names()
        .find(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .map(str::to_string)
    else {
        return Err(Error::UnsupportedArchive(
            "zip archive does not contain a CSV file".to_string(),
        ));
    };

    let mut out = Vec::new();
    archive.by_name(&name)?.read_to_end(&mut out)?;
    debug!(entry = %name, compressed = bytes.len(), raw = out.len(), "Zip entry extracted");
    Ok(out)
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn pad(code: &str, width: usize) -> String {
    format!("{:0>width$}", code.trim())
}

fn city_for(state: &str, county: &str, cities: &[City]) -> Option<City> {
    cities
        .iter()
        .copied()
        .find(|c| c.state_code() == state && c.county_codes().contains(&county))
}

/// Averages every monitor of each requested city per local date.
///
/// Accepts plain CSV, gzip, or the zip archive served by
/// [`airdata_url`]. Output is ordered by city, then date.
///
/// # Errors
///
/// [`Error::UnsupportedArchive`] for a zip without a CSV entry,
/// [`Error::MissingColumns`]
/// when the file lacks one of the AQS columns, plus CSV and date errors.
#[tracing::instrument(skip(bytes, cities), fields(bytes = bytes.len(), cities = cities.len()))]
pub fn reduce_daily_file(bytes: &[u8], cities: &[City]) -> Result<Vec<Observation>> {
    let raw = decompress(bytes)?;
    let mut rdr = csv::Reader::from_reader(raw.as_slice());
    let headers = rdr.headers()?.clone();

    let indices: Vec<Option<usize>> = [STATE_CODE, COUNTY_CODE, DATE_LOCAL, ARITHMETIC_MEAN]
        .iter()
        .map(|name| column(&headers, name))
        .collect();
    let [Some(state_ix), Some(county_ix), Some(date_ix), Some(value_ix)] = indices[..] else {
        let missing: Vec<&str> = [STATE_CODE, COUNTY_CODE, DATE_LOCAL, ARITHMETIC_MEAN]
            .into_iter()
            .zip(&indices)
            .filter(|(_, ix)| ix.is_none())
            .map(|(name, _)| name)
            .collect();
        return Err(Error::MissingColumns(missing.join(", ")));
    };

    let mut sums: BTreeMap<(City, NaiveDate), (f64, usize)> = BTreeMap::new();
    let mut total = 0usize;
    let mut unparsable = 0usize;

    for record in rdr.records() {
        let record = record?;
        total += 1;

        let state = pad(record.get(state_ix).unwrap_or_default(), 2);
        let county = pad(record.get(county_ix).unwrap_or_default(), 3);
        let Some(city) = city_for(&state, &county, cities) else {
            continue;
        };

        let Ok(value) = record.get(value_ix).unwrap_or_default().trim().parse::<f64>() else {
            unparsable += 1;
            continue;
        };
        let date = parse_date(record.get(date_ix).unwrap_or_default())?;

        let entry = sums.entry((city, date)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    if unparsable > 0 {
        warn!(unparsable, "Monitor rows with a non-numeric mean were skipped");
    }

    let observations: Vec<Observation> = sums
        .into_iter()
        .map(|((city, date), (sum, n))| Observation::new(date, city, sum / n as f64))
        .collect();

    for city in cities {
        let days = observations.iter().filter(|o| o.city == *city).count();
        if days == 0 {
            warn!(city = %city, "No monitor data found for city");
        } else {
            info!(city = %city, days, "City reduced to daily means");
        }
    }
    debug!(monitor_rows = total, observations = observations.len(), "EPA file reduced");

    Ok(observations)
}

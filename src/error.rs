//! Error type shared by the loader and the analytical core.

use chrono::NaiveDate;
use thiserror::Error;

/// Everything that can go wrong while loading or analysing PM2.5 data.
///
/// The statistics, extremes and trends functions only ever return the
/// validation variants; the I/O variants come from the loader and the
/// EPA file reduction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot compute over an empty series")]
    EmptyInput,

    #[error("window size {window} is invalid for a series of length {len}")]
    InvalidWindow { window: usize, len: usize },

    #[error("PM2.5 value {0} is out of range; it must be a non-negative number")]
    OutOfRange(f64),

    #[error("percentile {0} must be greater than 0 and at most 100")]
    InvalidPercentile(f64),

    #[error("at least {required} data points are required, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("threshold {0} must be a non-negative number")]
    InvalidThreshold(f64),

    #[error("minimum run length must be at least 1")]
    InvalidRunLength,

    #[error("x and y must have the same length: {x} != {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("invalid season map: {0}")]
    InvalidSeasonMap(String),

    #[error("unknown city '{0}'")]
    UnknownCity(String),

    #[error("city '{city}' not found; available cities: {available}")]
    CityNotFound { city: String, available: String },

    #[error("duplicate observation for {city} on {date}")]
    DuplicateDate { city: String, date: NaiveDate },

    #[error("missing required columns: {0}")]
    MissingColumns(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("{0}")]
    UnsupportedArchive(String),

    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Distribution(#[from] statrs::StatsError),
}

pub type Result<T> = std::result::Result<T, Error>;

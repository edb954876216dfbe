//! Descriptive statistics over daily PM2.5 values.
//!
//! Every function takes a plain slice. `NaN` marks a missing reading and is
//! skipped wherever a function reduces over values.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::Series;

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn sorted_present(values: &[f64]) -> Vec<f64> {
    let mut clean: Vec<f64> = present(values).collect();
    clean.sort_by(f64::total_cmp);
    clean
}

/// Arithmetic mean of the non-missing values.
///
/// # Errors
///
/// [`Error::EmptyInput`] when there is nothing to average.
pub fn mean(values: &[f64]) -> Result<f64> {
    let (sum, count) = present(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return Err(Error::EmptyInput);
    }
    Ok(sum / count as f64)
}

/// Trailing moving average.
///
/// Positions without a full window of history are omitted: the result has
/// `values.len() - window + 1` elements and element `k` averages
/// `values[k..k + window]`. A window that contains a missing value yields
/// `NaN`.
pub fn rolling_average(values: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 || window > values.len() {
        return Err(Error::InvalidWindow {
            window,
            len: values.len(),
        });
    }

    Ok(values
        .windows(window)
        .map(|w| {
            if w.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                w.iter().sum::<f64>() / window as f64
            }
        })
        .collect())
}

/// Rolling average paired with the date that closes each window.
pub fn rolling_series(series: &Series, window: usize) -> Result<Vec<(NaiveDate, f64)>> {
    let averages = rolling_average(&series.values(), window)?;
    Ok(series
        .dates()
        .into_iter()
        .skip(window - 1)
        .zip(averages)
        .collect())
}

/// Number of values strictly greater than `threshold`.
pub fn exceedance_count(values: &[f64], threshold: f64) -> usize {
    present(values).filter(|&v| v > threshold).count()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `p` is expressed on a 0-100 scale.
pub fn percentile(values: &[f64], p: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&p) {
        return Err(Error::InvalidPercentile(p));
    }
    let sorted = sorted_present(values);
    if sorted.is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(percentile_of_sorted(&sorted, p))
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> Result<f64> {
    percentile(values, 50.0)
}

/// Population standard deviation of the non-missing values.
pub fn std_dev(values: &[f64]) -> Result<f64> {
    let avg = mean(values)?;
    let (sum_sq, count) = present(values).fold((0.0, 0usize), |(s, n), v| {
        (s + (v - avg).powi(2), n + 1)
    });
    Ok((sum_sq / count as f64).sqrt())
}

/// Five-number style summary used by reports and the summary chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub q25: f64,
    pub q75: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

pub fn summarize(values: &[f64]) -> Result<Summary> {
    let sorted = sorted_present(values);
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Err(Error::EmptyInput);
    };

    Ok(Summary {
        count: sorted.len(),
        mean: mean(&sorted)?,
        median: percentile_of_sorted(&sorted, 50.0),
        q25: percentile_of_sorted(&sorted, 25.0),
        q75: percentile_of_sorted(&sorted, 75.0),
        min,
        max,
        std_dev: std_dev(&sorted)?,
    })
}

// ---------------------------------------------------------------------------
// AQI
// ---------------------------------------------------------------------------

/// EPA AQI category for PM2.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn name(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            AqiCategory::Good => "#00E400",
            AqiCategory::Moderate => "#FFFF00",
            AqiCategory::UnhealthyForSensitiveGroups => "#FF7E00",
            AqiCategory::Unhealthy => "#FF0000",
            AqiCategory::VeryUnhealthy => "#8F3F97",
            AqiCategory::Hazardous => "#7E0023",
        }
    }

    pub fn health_message(self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory.",
            AqiCategory::Moderate => "Acceptable for most, but sensitive groups may be affected.",
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Sensitive groups may experience health effects."
            }
            AqiCategory::Unhealthy => "Everyone may begin to experience health effects.",
            AqiCategory::VeryUnhealthy => {
                "Health alert: everyone may experience serious effects."
            }
            AqiCategory::Hazardous => "Health warnings of emergency conditions.",
        }
    }
}

/// An AQI reading computed from a PM2.5 concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Aqi {
    pub index: u32,
    pub category: AqiCategory,
}

/// EPA PM2.5 breakpoints.
///
/// | Concentration (μg/m³) | AQI     | Category                       |
/// |-----------------------|---------|--------------------------------|
/// | 0.0 – 12.0            | 0–50    | Good                           |
/// | 12.1 – 35.4           | 51–100  | Moderate                       |
/// | 35.5 – 55.4           | 101–150 | Unhealthy for Sensitive Groups |
/// | 55.5 – 150.4          | 151–200 | Unhealthy                      |
/// | 150.5 – 250.4         | 201–300 | Very Unhealthy                 |
/// | 250.5 – 500.4         | 301–500 | Hazardous                      |
static BREAKPOINTS: &[(f64, f64, f64, f64, AqiCategory)] = &[
    (0.0, 12.0, 0.0, 50.0, AqiCategory::Good),
    (12.1, 35.4, 51.0, 100.0, AqiCategory::Moderate),
    (35.5, 55.4, 101.0, 150.0, AqiCategory::UnhealthyForSensitiveGroups),
    (55.5, 150.4, 151.0, 200.0, AqiCategory::Unhealthy),
    (150.5, 250.4, 201.0, 300.0, AqiCategory::VeryUnhealthy),
    (250.5, 500.4, 301.0, 500.0, AqiCategory::Hazardous),
];

/// Converts a 24-hour PM2.5 concentration into an AQI value.
///
/// The concentration is truncated to one decimal place before the
/// breakpoint lookup, so values between two bands (e.g. 12.05) land in the
/// lower one. Concentrations beyond the table cap at 500.
///
/// # Errors
///
/// [`Error::OutOfRange`] for negative or `NaN` input.
pub fn aqi_from_pm25(value: f64) -> Result<Aqi> {
    if value.is_nan() || value < 0.0 {
        return Err(Error::OutOfRange(value));
    }

    // Scaling by 10 before flooring avoids 35.4 turning into 35.3999.
    let truncated = (value * 10.0 + 1e-9).floor() / 10.0;

    for &(c_low, c_high, i_low, i_high, category) in BREAKPOINTS {
        if (c_low..=c_high).contains(&truncated) {
            let index = (i_high - i_low) / (c_high - c_low) * (truncated - c_low) + i_low;
            return Ok(Aqi {
                index: index.round() as u32,
                category,
            });
        }
    }

    Ok(Aqi {
        index: 500,
        category: AqiCategory::Hazardous,
    })
}

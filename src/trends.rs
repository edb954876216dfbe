//! Temporal trend analysis: least-squares trend lines and calendar
//! aggregation (by month and by season).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{City, Series};
use crate::statistics::summarize;

/// Result of an ordinary least-squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub slope_std_err: f64,
    /// Two-sided p-value of the slope against a flat line.
    pub p_value: f64,
    pub n: usize,
}

/// Linear trend of a city's series. `x` is days since `start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendFit {
    pub city: City,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub slope_per_day: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub slope_std_err: f64,
    pub p_value: f64,
    pub n: usize,
}

impl TrendFit {
    /// Fitted value on `date`.
    pub fn value_on(&self, date: NaiveDate) -> f64 {
        let x = (date - self.start).num_days() as f64;
        self.slope_per_day * x + self.intercept
    }

    /// Significance label for charts: `p<0.001`, `p<0.01`, `p<0.05` or `n.s.`.
    pub fn significance(&self) -> &'static str {
        match self.p_value {
            p if p < 0.001 => "p<0.001",
            p if p < 0.01 => "p<0.01",
            p if p < 0.05 => "p<0.05",
            _ => "n.s.",
        }
    }
}

/// Student's t test of `slope` against zero with `n - 2` degrees of freedom.
fn slope_p_value(slope: f64, slope_std_err: f64, n: usize) -> Result<f64> {
    if slope_std_err == 0.0 {
        // Exact fit, nothing left to test against.
        return Ok(if slope == 0.0 { 1.0 } else { 0.0 });
    }
    let t = slope / slope_std_err;
    let dist = StudentsT::new(0.0, 1.0, (n - 2) as f64)?;
    Ok((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

/// Ordinary least-squares regression of `ys` on `xs`.
///
/// Pairs where either coordinate is `NaN` are dropped. A perfectly flat
/// series is a perfect fit and reports an R² of 1. The p-value is 0 for an
/// exact sloped fit and 1 for an exact flat one.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when the inputs differ in length,
/// [`Error::InsufficientData`] with fewer than two usable points or when
/// every `x` is identical.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    if xs.len() != ys.len() {
        return Err(Error::LengthMismatch {
            x: xs.len(),
            y: ys.len(),
        });
    }

    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            found: n,
        });
    }

    let nf = n as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in &points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(Error::InsufficientData {
            required: 2,
            found: 1,
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_res: f64 = points
        .iter()
        .map(|&(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if syy == 0.0 { 1.0 } else { 1.0 - ss_res / syy };

    let slope_std_err = if n > 2 {
        (ss_res / (nf - 2.0) / sxx).sqrt()
    } else {
        0.0
    };

    let p_value = slope_p_value(slope, slope_std_err, n)?;

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        slope_std_err,
        p_value,
        n,
    })
}

/// Least-squares trend of value against days elapsed since the first
/// observation.
pub fn linear_trend(series: &Series) -> Result<TrendFit> {
    let (Some(start), Some(end)) = (series.first_date(), series.last_date()) else {
        return Err(Error::InsufficientData {
            required: 2,
            found: 0,
        });
    };

    let xs: Vec<f64> = series
        .dates()
        .iter()
        .map(|d| (*d - start).num_days() as f64)
        .collect();
    let fit = linear_fit(&xs, &series.values())?;

    Ok(TrendFit {
        city: series.city(),
        start,
        end,
        slope_per_day: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        slope_std_err: fit.slope_std_err,
        p_value: fit.p_value,
        n: fit.n,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    pub month: u32,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Per calendar month statistics, months ascending. Months without data are
/// left out.
pub fn monthly_stats(series: &Series) -> Vec<MonthlyStats> {
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for obs in series.observations() {
        by_month.entry(obs.date.month()).or_default().push(obs.value);
    }

    by_month
        .into_iter()
        .filter_map(|(month, values)| {
            let s = summarize(&values).ok()?;
            Some(MonthlyStats {
                month,
                mean: s.mean,
                median: s.median,
                min: s.min,
                max: s.max,
                count: s.count,
            })
        })
        .collect()
}

/// A named group of calendar months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub name: String,
    pub months: Vec<u32>,
}

/// A partition of the twelve months into seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Season>", into = "Vec<Season>")]
pub struct SeasonMap {
    seasons: Vec<Season>,
}

impl SeasonMap {
    /// # Errors
    ///
    /// [`Error::InvalidSeasonMap`] unless every month 1-12 belongs to
    /// exactly one season.
    pub fn new(seasons: Vec<Season>) -> Result<Self> {
        let mut owner: [Option<&str>; 12] = [None; 12];

        for season in &seasons {
            for &month in &season.months {
                if !(1..=12).contains(&month) {
                    return Err(Error::InvalidSeasonMap(format!(
                        "season '{}' lists month {month}",
                        season.name
                    )));
                }
                let slot = &mut owner[month as usize - 1];
                if let Some(other) = slot {
                    return Err(Error::InvalidSeasonMap(format!(
                        "month {month} is in both '{other}' and '{}'",
                        season.name
                    )));
                }
                *slot = Some(&season.name);
            }
        }

        if let Some(missing) = owner.iter().position(Option::is_none) {
            return Err(Error::InvalidSeasonMap(format!(
                "month {} is not assigned to any season",
                missing + 1
            )));
        }

        Ok(Self { seasons })
    }

    /// Winter (Dec-Feb), Spring (Mar-May), Summer (Jun-Aug), Fall (Sep-Nov).
    pub fn meteorological() -> Self {
        let season = |name: &str, months: [u32; 3]| Season {
            name: name.to_string(),
            months: months.to_vec(),
        };
        Self {
            seasons: vec![
                season("Winter", [12, 1, 2]),
                season("Spring", [3, 4, 5]),
                season("Summer", [6, 7, 8]),
                season("Fall", [9, 10, 11]),
            ],
        }
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn season_of(&self, month: u32) -> Option<&str> {
        self.seasons
            .iter()
            .find(|s| s.months.contains(&month))
            .map(|s| s.name.as_str())
    }
}

impl Default for SeasonMap {
    fn default() -> Self {
        Self::meteorological()
    }
}

impl TryFrom<Vec<Season>> for SeasonMap {
    type Error = Error;

    fn try_from(seasons: Vec<Season>) -> Result<Self> {
        Self::new(seasons)
    }
}

impl From<SeasonMap> for Vec<Season> {
    fn from(map: SeasonMap) -> Self {
        map.seasons
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalMean {
    pub season: String,
    pub mean: f64,
    pub count: usize,
}

/// Mean value per season, in the order the map lists its seasons. Seasons
/// without any observation are left out.
pub fn seasonal_average(series: &Series, season_map: &SeasonMap) -> Vec<SeasonalMean> {
    season_map
        .seasons()
        .iter()
        .filter_map(|season| {
            let values: Vec<f64> = series
                .observations()
                .iter()
                .filter(|o| season.months.contains(&o.date.month()) && !o.value.is_nan())
                .map(|o| o.value)
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(SeasonalMean {
                season: season.name.clone(),
                mean: values.iter().sum::<f64>() / values.len() as f64,
                count: values.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_linear_trend_perfect_line() {
        let series = Series::daily(City::Denver, ymd(1, 1), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let fit = linear_trend(&series).unwrap();

        assert!((fit.slope_per_day - 1.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!(fit.slope_std_err.abs() < 1e-12);
        assert_eq!(fit.n, 5);
        assert_eq!(fit.end, ymd(1, 5));
        assert!((fit.value_on(ymd(1, 10)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_trend_needs_two_points() {
        let one = Series::daily(City::Denver, ymd(1, 1), &[7.0]);
        assert!(matches!(
            linear_trend(&one),
            Err(Error::InsufficientData { required: 2, found: 1 })
        ));
        let none = Series::daily(City::Denver, ymd(1, 1), &[]);
        assert!(matches!(
            linear_trend(&none),
            Err(Error::InsufficientData { found: 0, .. })
        ));
    }

    #[test]
    fn test_linear_fit_flat_series() {
        let fit = linear_fit(&[0.0, 1.0, 2.0], &[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 4.0);
        assert_eq!(fit.r_squared, 1.0);
    }

    #[test]
    fn test_linear_fit_noisy_r_squared_below_one() {
        let fit = linear_fit(&[0.0, 1.0, 2.0, 3.0, 4.0], &[10.0, 12.0, 11.0, 13.0, 15.0]).unwrap();
        assert!((fit.slope - 1.1).abs() < 1e-9);
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
        assert!(fit.slope_std_err > 0.0);
    }

    #[test]
    fn test_linear_fit_p_value() {
        let fit = linear_fit(&[0.0, 1.0, 2.0, 3.0, 4.0], &[10.0, 12.0, 11.0, 13.0, 15.0]).unwrap();
        // t = 1.1 / 0.3 with 3 degrees of freedom.
        assert!((fit.slope_std_err - 0.3).abs() < 1e-9);
        assert!((fit.p_value - 0.035081).abs() < 1e-4);

        let flat = linear_fit(&[0.0, 1.0, 2.0], &[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(flat.p_value, 1.0);
    }

    #[test]
    fn test_linear_trend_strong_trend_is_significant() {
        let values: Vec<f64> = (0..60)
            .map(|i| 5.0 + 0.5 * i as f64 + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect();
        let fit = linear_trend(&Series::daily(City::Phoenix, ymd(1, 1), &values)).unwrap();

        assert!((0.0..=1.0).contains(&fit.p_value));
        assert!(fit.p_value < 1e-6);
        assert_eq!(fit.significance(), "p<0.001");
    }

    #[test]
    fn test_linear_trend_noise_is_not_significant() {
        let values = [12.0, 8.0, 11.0, 9.0, 10.0, 12.0, 8.0, 10.0];
        let fit = linear_trend(&Series::daily(City::Denver, ymd(1, 1), &values)).unwrap();

        assert!((0.0..=1.0).contains(&fit.p_value));
        assert!(fit.p_value > 0.05);
        assert_eq!(fit.significance(), "n.s.");
    }

    #[test]
    fn test_linear_fit_length_mismatch_and_vertical() {
        assert!(matches!(
            linear_fit(&[1.0, 2.0], &[1.0]),
            Err(Error::LengthMismatch { x: 2, y: 1 })
        ));
        assert!(matches!(
            linear_fit(&[3.0, 3.0], &[1.0, 2.0]),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_linear_trend_uses_calendar_offsets() {
        let obs = vec![
            crate::model::Observation::new(ymd(1, 1), City::Fresno, 0.0),
            crate::model::Observation::new(ymd(1, 11), City::Fresno, 10.0),
        ];
        let series = Series::new(City::Fresno, obs).unwrap();
        let fit = linear_trend(&series).unwrap();
        assert!((fit.slope_per_day - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_stats_groups_by_month() {
        let mut obs = Vec::new();
        for (d, v) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
            obs.push(crate::model::Observation::new(ymd(1, d), City::Denver, v));
        }
        obs.push(crate::model::Observation::new(ymd(3, 15), City::Denver, 5.0));
        let series = Series::new(City::Denver, obs).unwrap();

        let stats = monthly_stats(&series);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].month, 1);
        assert_eq!(stats[0].mean, 20.0);
        assert_eq!(stats[0].median, 20.0);
        assert_eq!(stats[0].min, 10.0);
        assert_eq!(stats[0].max, 30.0);
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[1].month, 3);
        assert_eq!(stats[1].count, 1);
    }

    #[test]
    fn test_seasonal_average_meteorological() {
        let obs = vec![
            crate::model::Observation::new(ymd(1, 10), City::Pittsburgh, 10.0),
            crate::model::Observation::new(ymd(12, 10), City::Pittsburgh, 20.0),
            crate::model::Observation::new(ymd(7, 4), City::Pittsburgh, 30.0),
        ];
        let series = Series::new(City::Pittsburgh, obs).unwrap();
        let seasons = seasonal_average(&series, &SeasonMap::meteorological());

        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons[0].season, "Winter");
        assert_eq!(seasons[0].mean, 15.0);
        assert_eq!(seasons[0].count, 2);
        assert_eq!(seasons[1].season, "Summer");
        assert_eq!(seasons[1].mean, 30.0);
    }

    #[test]
    fn test_season_map_custom_partition() {
        let map = SeasonMap::new(vec![
            Season {
                name: "Wildfire".into(),
                months: vec![7, 8, 9, 10],
            },
            Season {
                name: "Other".into(),
                months: vec![1, 2, 3, 4, 5, 6, 11, 12],
            },
        ])
        .unwrap();

        assert_eq!(map.season_of(8), Some("Wildfire"));
        assert_eq!(map.season_of(12), Some("Other"));
    }

    #[test]
    fn test_season_map_rejects_bad_partitions() {
        let overlap = SeasonMap::new(vec![
            Season { name: "A".into(), months: (1..=12).collect() },
            Season { name: "B".into(), months: vec![6] },
        ]);
        assert!(matches!(overlap, Err(Error::InvalidSeasonMap(_))));

        let gap = SeasonMap::new(vec![Season { name: "A".into(), months: (1..=11).collect() }]);
        assert!(matches!(gap, Err(Error::InvalidSeasonMap(m)) if m.contains("12")));

        let out_of_range = SeasonMap::new(vec![Season { name: "A".into(), months: vec![13] }]);
        assert!(matches!(out_of_range, Err(Error::InvalidSeasonMap(_))));
    }

    #[test]
    fn test_season_map_deserializes_with_validation() {
        let json = r#"[{"name": "All", "months": [1,2,3,4,5,6,7,8,9,10,11,12]}]"#;
        let map: SeasonMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.seasons().len(), 1);

        let bad = r#"[{"name": "Half", "months": [1,2,3,4,5,6]}]"#;
        assert!(serde_json::from_str::<SeasonMap>(bad).is_err());
    }
}

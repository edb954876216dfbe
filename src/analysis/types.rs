//! Data types produced by the analysis pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::extremes::{ExtremeEvent, PercentileExtremes};
use crate::model::{City, Observation};
use crate::statistics::{Aqi, Summary};
use crate::trends::{MonthlyStats, SeasonalMean, TrendFit};

/// Days above a fixed threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exceedance {
    pub threshold: f64,
    pub days: usize,
}

/// Complete analysis of one city, written as `reports/<city>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct CityReport {
    pub schema_version: u8,
    pub city: City,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: Summary,
    pub aqi_of_mean: Aqi,
    pub aqi_of_max: Aqi,
    /// Number of days per AQI category name.
    pub aqi_days: BTreeMap<&'static str, usize>,
    pub epa_exceedance: Exceedance,
    pub who_exceedance: Exceedance,
    pub unhealthy_days: Vec<Observation>,
    pub percentile_extremes: PercentileExtremes,
    pub sustained_episodes: Vec<ExtremeEvent>,
    pub trend: Option<TrendFit>,
    pub monthly: Vec<MonthlyStats>,
    pub seasonal: Vec<SeasonalMean>,
}

impl CityReport {
    /// Longest sustained episode, ties broken by the higher peak.
    pub fn longest_episode(&self) -> Option<&ExtremeEvent> {
        self.sustained_episodes.first()
    }
}

/// One row of `summary.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub city: &'static str,
    pub days: usize,
    pub mean: f64,
    pub max: f64,
    pub aqi_category_of_mean: &'static str,
    pub epa_exceedances: usize,
    pub who_exceedances: usize,
    pub percentile_cutoff: f64,
    pub percentile_days: usize,
    pub sustained_episodes: usize,
    pub longest_episode_days: usize,
    pub trend_slope_per_day: Option<f64>,
    pub trend_r_squared: Option<f64>,
    pub trend_p_value: Option<f64>,
}

impl From<&CityReport> for SummaryRow {
    fn from(report: &CityReport) -> Self {
        Self {
            city: report.city.name(),
            days: report.summary.count,
            mean: report.summary.mean,
            max: report.summary.max,
            aqi_category_of_mean: report.aqi_of_mean.category.name(),
            epa_exceedances: report.epa_exceedance.days,
            who_exceedances: report.who_exceedance.days,
            percentile_cutoff: report.percentile_extremes.cutoff,
            percentile_days: report.percentile_extremes.observations.len(),
            sustained_episodes: report.sustained_episodes.len(),
            longest_episode_days: report.longest_episode().map_or(0, |e| e.duration_days),
            trend_slope_per_day: report.trend.as_ref().map(|t| t.slope_per_day),
            trend_r_squared: report.trend.as_ref().map(|t| t.r_squared),
            trend_p_value: report.trend.as_ref().map(|t| t.p_value),
        }
    }
}

//! Chart-ready tables.
//!
//! Each figure gets one CSV table under `<output>/charts/`; an external
//! plotting tool reads these and draws the images. Nothing here renders.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::types::CityReport;
use crate::config::AnalysisConfig;
use crate::model::Series;
use crate::output::write_csv;
use crate::statistics::{aqi_from_pm25, exceedance_count, mean, percentile, rolling_series};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesRow {
    pub city: &'static str,
    pub date: NaiveDate,
    pub value: f64,
    pub rolling_avg: Option<f64>,
    pub aqi_category: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub city: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryChartRow {
    pub city: &'static str,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub q25: f64,
    pub q75: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremesChartRow {
    pub city: &'static str,
    pub epa_threshold: f64,
    pub epa_exceedances: usize,
    pub percentile_threshold: f64,
    pub percentile_exceedances: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub city: &'static str,
    pub threshold: f64,
    pub exceedances: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendChartRow {
    pub city: &'static str,
    pub month: u32,
    pub monthly_mean: f64,
    pub trend_value: Option<f64>,
    pub trend_p_value: Option<f64>,
    pub significance: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteRow {
    pub city: &'static str,
    pub color: &'static str,
}

/// Daily values with the trailing rolling average and AQI band.
/// The first `window - 1` days have no rolling value, and a window longer
/// than the series leaves them all empty.
pub fn timeseries_rows(series: &Series, window: usize) -> Vec<TimeseriesRow> {
    let rolled = rolling_series(series, window).unwrap_or_default();
    let offset = series.len() - rolled.len();

    series
        .observations()
        .iter()
        .enumerate()
        .map(|(i, obs)| TimeseriesRow {
            city: obs.city.name(),
            date: obs.date,
            value: obs.value,
            rolling_avg: i
                .checked_sub(offset)
                .map(|k| rolled[k].1)
                .filter(|v| !v.is_nan()),
            aqi_category: aqi_from_pm25(obs.value)
                .map(|a| a.category.name())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn distribution_rows(all: &[Series]) -> Vec<DistributionRow> {
    all.iter()
        .flat_map(|s| s.observations())
        .map(|o| DistributionRow {
            city: o.city.name(),
            value: o.value,
        })
        .collect()
}

/// Reference lines for the pooled distribution: mean, configured
/// percentile, EPA standard and the unhealthy boundary.
pub fn distribution_markers(all: &[Series], config: &AnalysisConfig) -> Vec<Marker> {
    let pooled: Vec<f64> = all.iter().flat_map(|s| s.values()).collect();
    let mut markers = Vec::new();

    if let Ok(m) = mean(&pooled) {
        markers.push(Marker {
            label: "mean".to_string(),
            value: m,
        });
    }
    if let Ok(p) = percentile(&pooled, config.percentile) {
        markers.push(Marker {
            label: format!("p{}", config.percentile),
            value: p,
        });
    }
    markers.push(Marker {
        label: "epa_standard".to_string(),
        value: config.epa_standard,
    });
    markers.push(Marker {
        label: "unhealthy".to_string(),
        value: config.unhealthy_threshold,
    });
    markers
}

pub fn summary_rows(reports: &[CityReport]) -> Vec<SummaryChartRow> {
    reports
        .iter()
        .map(|r| SummaryChartRow {
            city: r.city.name(),
            count: r.summary.count,
            mean: r.summary.mean,
            median: r.summary.median,
            q25: r.summary.q25,
            q75: r.summary.q75,
            min: r.summary.min,
            max: r.summary.max,
            std_dev: r.summary.std_dev,
        })
        .collect()
}

/// Exceedances of the EPA standard against exceedances of the percentile
/// computed over all cities pooled together.
pub fn extremes_rows(all: &[Series], config: &AnalysisConfig) -> Vec<ExtremesChartRow> {
    let pooled: Vec<f64> = all.iter().flat_map(|s| s.values()).collect();
    let Ok(pooled_cutoff) = percentile(&pooled, config.percentile) else {
        return Vec::new();
    };

    all.iter()
        .map(|s| {
            let values = s.values();
            ExtremesChartRow {
                city: s.city().name(),
                epa_threshold: config.epa_standard,
                epa_exceedances: exceedance_count(&values, config.epa_standard),
                percentile_threshold: pooled_cutoff,
                percentile_exceedances: exceedance_count(&values, pooled_cutoff),
            }
        })
        .collect()
}

pub fn sensitivity_rows(all: &[Series], config: &AnalysisConfig) -> Vec<SensitivityRow> {
    let thresholds = config.sensitivity.thresholds();
    all.iter()
        .flat_map(|s| {
            let values = s.values();
            thresholds
                .iter()
                .map(|&threshold| SensitivityRow {
                    city: s.city().name(),
                    threshold,
                    exceedances: exceedance_count(&values, threshold),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Monthly means with the fitted trend evaluated on the 15th of each month,
/// plus the trend's p-value and significance label.
pub fn trend_rows(reports: &[CityReport]) -> Vec<TrendChartRow> {
    reports
        .iter()
        .flat_map(|r| {
            let year = r.start.year();
            r.monthly.iter().map(move |m| TrendChartRow {
                city: r.city.name(),
                month: m.month,
                monthly_mean: m.mean,
                trend_value: r.trend.as_ref().and_then(|t| {
                    NaiveDate::from_ymd_opt(year, m.month, 15).map(|mid| t.value_on(mid))
                }),
                trend_p_value: r.trend.as_ref().map(|t| t.p_value),
                significance: r.trend.as_ref().map(|t| t.significance()),
            })
        })
        .collect()
}

pub fn palette_rows(all: &[Series]) -> Vec<PaletteRow> {
    all.iter()
        .map(|s| PaletteRow {
            city: s.city().name(),
            color: s.city().color(),
        })
        .collect()
}

fn emit<T: Serialize>(dir: &Path, name: &str, rows: &[T], written: &mut Vec<PathBuf>) -> Result<()> {
    let path = dir.join(name);
    write_csv(&path, rows)?;
    written.push(path);
    Ok(())
}

/// Writes every chart table into `dir`, returning the files written.
#[tracing::instrument(skip_all, fields(dir = %dir.display(), cities = all.len()))]
pub fn write_all(
    dir: &Path,
    all: &[Series],
    reports: &[CityReport],
    config: &AnalysisConfig,
) -> Result<Vec<PathBuf>> {
    let timeseries: Vec<TimeseriesRow> = all
        .iter()
        .flat_map(|s| timeseries_rows(s, config.rolling_window))
        .collect();

    let mut written = Vec::new();
    emit(dir, "timeseries.csv", &timeseries, &mut written)?;
    emit(dir, "distribution.csv", &distribution_rows(all), &mut written)?;
    emit(dir, "distribution_markers.csv", &distribution_markers(all, config), &mut written)?;
    emit(dir, "statistical_summary.csv", &summary_rows(reports), &mut written)?;
    emit(dir, "extreme_events.csv", &extremes_rows(all, config), &mut written)?;
    emit(dir, "sensitivity.csv", &sensitivity_rows(all, config), &mut written)?;
    emit(dir, "trends.csv", &trend_rows(reports), &mut written)?;
    emit(dir, "palette.csv", &palette_rows(all), &mut written)?;

    info!(files = written.len(), "Chart tables written");
    Ok(written)
}

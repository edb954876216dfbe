use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::analysis::types::{CityReport, Exceedance};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::extremes::{consecutive_exceedances, percentile_extremes, threshold_extremes};
use crate::model::Series;
use crate::statistics::{aqi_from_pm25, exceedance_count, summarize};
use crate::trends::{linear_trend, monthly_stats, seasonal_average};

pub const SCHEMA_VERSION: u8 = 1;

/// Runs every statistic, extreme and trend analysis over one city's series.
///
/// A series too short for a trend line still produces a report, with
/// `trend` left empty.
#[tracing::instrument(skip_all, fields(city = %series.city(), days = series.len()))]
pub fn build_city_report(series: &Series, config: &AnalysisConfig) -> Result<CityReport> {
    let (Some(start), Some(end)) = (series.first_date(), series.last_date()) else {
        return Err(Error::EmptyInput);
    };
    let values = series.values();

    let summary = summarize(&values)?;
    let aqi_of_mean = aqi_from_pm25(summary.mean)?;
    let aqi_of_max = aqi_from_pm25(summary.max)?;

    let mut aqi_days = BTreeMap::new();
    for &v in &values {
        *aqi_days.entry(aqi_from_pm25(v)?.category.name()).or_insert(0) += 1;
    }

    let trend = match linear_trend(series) {
        Ok(fit) => Some(fit),
        Err(Error::InsufficientData { found, .. }) => {
            warn!(found, "Not enough points for a trend line");
            None
        }
        Err(e) => return Err(e),
    };

    let report = CityReport {
        schema_version: SCHEMA_VERSION,
        city: series.city(),
        start,
        end,
        aqi_of_mean,
        aqi_of_max,
        aqi_days,
        epa_exceedance: Exceedance {
            threshold: config.epa_standard,
            days: exceedance_count(&values, config.epa_standard),
        },
        who_exceedance: Exceedance {
            threshold: config.who_guideline,
            days: exceedance_count(&values, config.who_guideline),
        },
        unhealthy_days: threshold_extremes(series, config.unhealthy_threshold)?,
        percentile_extremes: percentile_extremes(series, config.percentile)?,
        sustained_episodes: consecutive_exceedances(
            series,
            config.epa_standard,
            config.min_run_length,
        )?,
        trend,
        monthly: monthly_stats(series),
        seasonal: seasonal_average(series, &config.seasons),
        summary,
    };

    debug!(
        mean = report.summary.mean,
        epa_days = report.epa_exceedance.days,
        episodes = report.sustained_episodes.len(),
        "City report built"
    );

    Ok(report)
}

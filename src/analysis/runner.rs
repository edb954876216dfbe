use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::analysis::report::build_city_report;
use crate::analysis::types::{CityReport, SummaryRow};
use crate::charts;
use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::loader::{filter_by_city, load_pm25_data};
use crate::model::Series;
use crate::output::{write_csv, write_json};

/// Loads the tidy CSV, analyses every configured city, then writes the
/// per-city JSON reports, `summary.csv` and the chart tables.
///
/// Cities absent from the data are skipped with a warning. Returns every
/// file written. An invalid `config` is rejected before anything is read.
#[tracing::instrument(skip_all, fields(input = %input.display(), output_dir = %output_dir.display()))]
pub fn run(input: &Path, output_dir: &Path, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    config.validate()?;

    let observations = load_pm25_data(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    info!(rows = observations.len(), "PM2.5 data loaded");

    let mut all_series: Vec<Series> = Vec::new();
    for &city in &config.cities {
        match filter_by_city(&observations, city) {
            Ok(series) => all_series.push(series),
            Err(Error::CityNotFound { city, available }) => {
                warn!(%city, %available, "City missing from data, skipping");
            }
            Err(e) => return Err(e).with_context(|| format!("invalid series for {city}")),
        }
    }

    let reports: Vec<CityReport> = all_series
        .iter()
        .map(|series| {
            build_city_report(series, config)
                .with_context(|| format!("failed to analyse {}", series.city()))
        })
        .collect::<Result<_>>()?;

    let mut written = Vec::new();

    for report in &reports {
        let path = output_dir
            .join("reports")
            .join(format!("{}.json", report.city.slug()));
        write_json(&path, report)?;
        written.push(path);
    }

    let summary: Vec<SummaryRow> = reports.iter().map(SummaryRow::from).collect();
    let summary_path = output_dir.join("summary.csv");
    write_csv(&summary_path, &summary)?;
    written.push(summary_path);

    written.extend(charts::write_all(
        &output_dir.join("charts"),
        &all_series,
        &reports,
        config,
    )?);

    info!(
        cities = reports.len(),
        files = written.len(),
        "Analysis complete"
    );
    Ok(written)
}

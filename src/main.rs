//! CLI entry point for the PM2.5 analyzer.
//!
//! Provides subcommands for reducing raw EPA files to a tidy dataset,
//! running the full per-city analysis, converting concentrations to AQI and
//! listing extreme days for one city.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pm25_analyzer::analysis::runner;
use pm25_analyzer::config::{AnalysisConfig, EPA_STANDARD};
use pm25_analyzer::extremes::{consecutive_exceedances, percentile_extremes, threshold_extremes};
use pm25_analyzer::fetch::epa::{PM25_PARAMETER_CODE, TidyRow, airdata_url, reduce_daily_file};
use pm25_analyzer::fetch::{BasicClient, load_source};
use pm25_analyzer::loader::{filter_by_city, filter_by_date_range, load_pm25_data, parse_date};
use pm25_analyzer::output::{print_json, write_csv};
use pm25_analyzer::statistics::aqi_from_pm25;
use pm25_analyzer::{City, Series};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "pm25_analyzer")]
#[command(about = "Statistics and extreme events for daily PM2.5 data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce an EPA AQS daily PM2.5 file to per-city daily means
    Fetch {
        /// Path or URL of the daily file (CSV, gzip or zip); defaults to
        /// the EPA bulk download for `--year`
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Year of the EPA bulk file to download
        #[arg(short, long, default_value_t = 2024)]
        year: i32,

        /// Tidy CSV to write
        #[arg(short, long, default_value = "data/all_cities_pm25.csv")]
        output: PathBuf,
    },
    /// Analyze every city and write reports and chart tables
    Analyze {
        /// Tidy CSV with columns date, city, pollutant, value
        #[arg(short, long, default_value = "data/all_cities_pm25.csv")]
        input: PathBuf,

        /// Directory for reports, summary and charts
        #[arg(short = 'd', long, default_value = "results")]
        output_dir: PathBuf,

        /// Optional JSON analysis config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Convert a PM2.5 concentration (μg/m³) to its AQI
    Aqi {
        #[arg(value_name = "PM25")]
        value: f64,
    },
    /// List extreme days and sustained episodes for one city
    Extremes {
        /// City name, e.g. "Salt Lake City"
        #[arg(short, long)]
        city: String,

        #[arg(short, long, default_value = "data/all_cities_pm25.csv")]
        input: PathBuf,

        /// Concentration threshold in μg/m³
        #[arg(short, long, default_value_t = EPA_STANDARD)]
        threshold: f64,

        /// Also report days at or above this percentile of the city's values
        #[arg(short, long)]
        percentile: Option<f64>,

        /// Minimum length of a sustained episode, in days
        #[arg(short, long, default_value_t = 3)]
        min_run: usize,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
}

/// Colored stderr plus a JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/pm25_analyzer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("pm25_analyzer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            source,
            year,
            output,
        } => {
            let source = source.unwrap_or_else(|| airdata_url(year, PM25_PARAMETER_CODE));
            fetch(&source, &output).await?;
        }
        Commands::Analyze {
            input,
            output_dir,
            config,
        } => {
            let config = AnalysisConfig::load_or_default(config.as_deref())
                .context("failed to load analysis config")?;
            let written = runner::run(&input, &output_dir, &config)?;
            info!(files = written.len(), output_dir = %output_dir.display(), "Results written");
        }
        Commands::Aqi { value } => {
            let aqi = aqi_from_pm25(value)?;
            info!(
                pm25 = value,
                aqi = aqi.index,
                category = aqi.category.name(),
                color = aqi.category.color(),
                "{}",
                aqi.category.health_message()
            );
        }
        Commands::Extremes {
            city,
            input,
            threshold,
            percentile,
            min_run,
            start,
            end,
        } => {
            let city: City = city.parse()?;
            let observations = load_pm25_data(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;
            let series = filter_by_city(&observations, city)?;
            let series = filter_by_date_range(
                &series,
                start.as_deref().map(parse_date).transpose()?,
                end.as_deref().map(parse_date).transpose()?,
            );
            report_extremes(&series, threshold, percentile, min_run)?;
        }
    }

    Ok(())
}

#[tracing::instrument]
async fn fetch(source: &str, output: &Path) -> Result<()> {
    let client = BasicClient::new()?;
    let bytes = load_source(&client, source).await?;

    let observations = reduce_daily_file(&bytes, &City::ALL)?;
    if observations.is_empty() {
        warn!("No observations matched any city; check the input file");
    }

    let rows: Vec<TidyRow> = observations.iter().map(TidyRow::from).collect();
    write_csv(output, &rows)?;

    info!(records = rows.len(), output = %output.display(), "Saved PM2.5 data");
    Ok(())
}

fn report_extremes(
    series: &Series,
    threshold: f64,
    percentile: Option<f64>,
    min_run: usize,
) -> Result<()> {
    let city = series.city();
    let days = threshold_extremes(series, threshold)?;
    info!(%city, threshold, days = days.len(), "Days above threshold");
    print_json(&days)?;

    if let Some(p) = percentile {
        let extremes = percentile_extremes(series, p)?;
        info!(
            %city,
            percentile = p,
            cutoff = extremes.cutoff,
            days = extremes.observations.len(),
            "Days at or above percentile"
        );
        print_json(&extremes)?;
    }

    let episodes = consecutive_exceedances(series, threshold, min_run)?;
    info!(%city, threshold, min_run, episodes = episodes.len(), "Sustained episodes");
    print_json(&episodes)?;

    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        let span = (last - first).num_days() + 1;
        info!(%city, first = %first, last = %last, span_days = span, "Period analysed");
    } else {
        warn!(%city, "No observations in the selected period");
    }

    Ok(())
}

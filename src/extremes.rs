//! Extreme-event detection for PM2.5 series.
//!
//! Three definitions are supported: a fixed concentration threshold, a
//! percentile of the series itself, and sustained episodes where the
//! threshold is exceeded on several consecutive days.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Observation, Series};
use crate::statistics::percentile;

/// A run of consecutive days above `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeEvent {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration_days: usize,
    pub peak: f64,
    pub mean: f64,
    pub threshold: f64,
}

impl ExtremeEvent {
    fn from_run(run: &[Observation], threshold: f64) -> Self {
        let peak = run.iter().map(|o| o.value).fold(f64::MIN, f64::max);
        let mean = run.iter().map(|o| o.value).sum::<f64>() / run.len() as f64;
        Self {
            start: run[0].date,
            end: run[run.len() - 1].date,
            duration_days: run.len(),
            peak,
            mean,
            threshold,
        }
    }
}

/// Observations selected by a percentile rule, with the computed cutoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileExtremes {
    pub percentile: f64,
    pub cutoff: f64,
    pub observations: Vec<Observation>,
}

fn check_threshold(threshold: f64) -> Result<()> {
    if threshold.is_nan() || threshold < 0.0 {
        return Err(Error::InvalidThreshold(threshold));
    }
    Ok(())
}

fn sort_descending(observations: &mut [Observation]) {
    observations.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.date.cmp(&b.date)));
}

/// All observations strictly above `threshold`, highest first.
///
/// # Errors
///
/// [`Error::InvalidThreshold`] for a negative or `NaN` threshold.
pub fn threshold_extremes(series: &Series, threshold: f64) -> Result<Vec<Observation>> {
    check_threshold(threshold)?;

    let mut hits: Vec<Observation> = series
        .observations()
        .iter()
        .filter(|o| o.value > threshold)
        .copied()
        .collect();
    sort_descending(&mut hits);
    Ok(hits)
}

/// Observations at or above the series' own `percentile`, highest first.
///
/// A percentile of 100 selects exactly the maximum value(s).
///
/// # Errors
///
/// [`Error::InvalidPercentile`] unless `0 < percentile <= 100`,
/// [`Error::EmptyInput`] for an empty series.
pub fn percentile_extremes(series: &Series, pct: f64) -> Result<PercentileExtremes> {
    if !(pct > 0.0 && pct <= 100.0) {
        return Err(Error::InvalidPercentile(pct));
    }
    let cutoff = percentile(&series.values(), pct)?;

    let mut observations: Vec<Observation> = series
        .observations()
        .iter()
        .filter(|o| o.value >= cutoff)
        .copied()
        .collect();
    sort_descending(&mut observations);

    Ok(PercentileExtremes {
        percentile: pct,
        cutoff,
        observations,
    })
}

/// Maximal runs of consecutive days above `threshold` lasting at least
/// `min_run_length` days, longest first. Runs of equal length are ordered
/// by peak, highest first, then by start date.
///
/// A gap in the calendar ends the current run even if both neighbours
/// exceed the threshold.
pub fn consecutive_exceedances(
    series: &Series,
    threshold: f64,
    min_run_length: usize,
) -> Result<Vec<ExtremeEvent>> {
    check_threshold(threshold)?;
    if min_run_length == 0 {
        return Err(Error::InvalidRunLength);
    }

    let observations = series.observations();
    let mut events = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, obs) in observations.iter().enumerate() {
        let continues = i > 0 && observations[i - 1].date.succ_opt() == Some(obs.date);

        if let Some(start) = run_start {
            if !(continues && obs.value > threshold) {
                if i - start >= min_run_length {
                    events.push(ExtremeEvent::from_run(&observations[start..i], threshold));
                }
                run_start = None;
            }
        }

        if run_start.is_none() && obs.value > threshold {
            run_start = Some(i);
        }
    }

    if let Some(start) = run_start {
        if observations.len() - start >= min_run_length {
            events.push(ExtremeEvent::from_run(&observations[start..], threshold));
        }
    }

    events.sort_by(|a, b| {
        b.duration_days
            .cmp(&a.duration_days)
            .then(b.peak.total_cmp(&a.peak))
            .then(a.start.cmp(&b.start))
    });
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::City;

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn tens() -> Series {
        Series::daily(
            City::Fresno,
            jan(1),
            &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0],
        )
    }

    #[test]
    fn test_threshold_counts() {
        for (threshold, expected) in [(50.0, 5), (40.0, 6), (150.0, 0), (0.0, 10)] {
            let hits = threshold_extremes(&tens(), threshold).unwrap();
            assert_eq!(hits.len(), expected, "threshold {threshold}");
            assert!(hits.iter().all(|o| o.value > threshold));
        }
    }

    #[test]
    fn test_threshold_sorted_descending_and_exclusive() {
        let hits = threshold_extremes(&tens(), 50.0).unwrap();
        let values: Vec<f64> = hits.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![100.0, 90.0, 80.0, 70.0, 60.0]);
    }

    #[test]
    fn test_threshold_rejects_negative() {
        assert!(matches!(
            threshold_extremes(&tens(), -1.0),
            Err(Error::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_percentile_hundred_returns_only_maximum() {
        let series = Series::daily(City::Denver, jan(1), &[5.0, 42.0, 17.0, 42.0, 3.0]);
        let result = percentile_extremes(&series, 100.0).unwrap();

        assert_eq!(result.cutoff, 42.0);
        assert_eq!(result.observations.len(), 2);
        assert!(result.observations.iter().all(|o| o.value == 42.0));
        assert_eq!(result.observations[0].date, jan(2));
    }

    #[test]
    fn test_percentile_ninety() {
        let result = percentile_extremes(&tens(), 90.0).unwrap();
        assert!((result.cutoff - 91.0).abs() < 1e-9);
        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.observations[0].value, 100.0);
    }

    #[test]
    fn test_percentile_bounds() {
        for bad in [0.0, -5.0, 100.5, f64::NAN] {
            assert!(matches!(
                percentile_extremes(&tens(), bad),
                Err(Error::InvalidPercentile(_))
            ));
        }
        let empty = Series::daily(City::Denver, jan(1), &[]);
        assert!(matches!(percentile_extremes(&empty, 95.0), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_consecutive_example_runs() {
        let series = Series::daily(
            City::Phoenix,
            jan(1),
            &[40.0, 41.0, 42.0, 10.0, 45.0, 46.0, 47.0],
        );
        let events = consecutive_exceedances(&series, 35.0, 3).unwrap();

        // Both runs are three days long; the higher peak comes first.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, jan(5));
        assert_eq!(events[1].start, jan(1));

        let events = consecutive_exceedances(&series, 40.5, 3).unwrap();
        assert_eq!(events.len(), 1);
        let tail = &events[0];
        assert_eq!(tail.duration_days, 3);
        assert_eq!(tail.start, jan(5));
        assert_eq!(tail.end, jan(7));
        assert_eq!(tail.peak, 47.0);
        assert_eq!(tail.mean, 46.0);
    }

    #[test]
    fn test_consecutive_respects_min_run_length() {
        let series = Series::daily(City::Phoenix, jan(1), &[10.0, 40.0, 45.0, 50.0, 15.0, 60.0, 65.0]);
        let events = consecutive_exceedances(&series, 35.0, 1).unwrap();
        let durations: Vec<usize> = events.iter().map(|e| e.duration_days).collect();
        assert_eq!(durations, vec![3, 2]);

        let events = consecutive_exceedances(&series, 35.0, 3).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, jan(2));
    }

    #[test]
    fn test_consecutive_sorted_by_duration() {
        let series = Series::daily(City::Fresno, jan(1), &[50.0, 10.0, 40.0, 41.0, 42.0, 43.0, 10.0]);
        let events = consecutive_exceedances(&series, 35.0, 1).unwrap();

        let durations: Vec<usize> = events.iter().map(|e| e.duration_days).collect();
        assert_eq!(durations, vec![4, 1]);
        assert_eq!(events[0].start, jan(3));
        assert_eq!(events[1].peak, 50.0);
    }

    #[test]
    fn test_consecutive_equal_length_ordered_by_peak() {
        let series = Series::daily(City::Fresno, jan(1), &[36.0, 37.0, 10.0, 80.0, 40.0, 10.0, 50.0, 51.0]);
        let events = consecutive_exceedances(&series, 35.0, 2).unwrap();

        let peaks: Vec<f64> = events.iter().map(|e| e.peak).collect();
        assert_eq!(peaks, vec![80.0, 51.0, 37.0]);
    }

    #[test]
    fn test_consecutive_calendar_gap_breaks_run() {
        let obs = [1, 2, 4, 5]
            .into_iter()
            .map(|d| Observation::new(jan(d), City::Denver, 50.0))
            .collect();
        let series = Series::new(City::Denver, obs).unwrap();
        let events = consecutive_exceedances(&series, 35.0, 2).unwrap();

        // Equal length and peak, so the earlier run comes first.
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start, events[0].end), (jan(1), jan(2)));
        assert_eq!((events[1].start, events[1].end), (jan(4), jan(5)));
    }

    #[test]
    fn test_consecutive_invalid_arguments() {
        assert!(matches!(
            consecutive_exceedances(&tens(), 35.0, 0),
            Err(Error::InvalidRunLength)
        ));
        assert!(matches!(
            consecutive_exceedances(&tens(), -3.0, 2),
            Err(Error::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_consecutive_none_above() {
        let events = consecutive_exceedances(&tens(), 500.0, 1).unwrap();
        assert!(events.is_empty());
    }
}

//! Analysis settings.
//!
//! Stored as a JSON object on disk; every field is optional and falls back
//! to the defaults below:
//! ```json
//! {
//!   "epa_standard": 35.0,
//!   "who_guideline": 15.0,
//!   "percentile": 95.0,
//!   "rolling_window": 7,
//!   "min_run_length": 3,
//!   "sensitivity": { "start": 15.0, "end": 40.0, "step": 1.0 },
//!   "cities": ["Denver", "Fresno"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::City;
use crate::trends::SeasonMap;

/// EPA 24-hour PM2.5 standard, μg/m³.
pub const EPA_STANDARD: f64 = 35.0;
/// WHO 24-hour guideline, μg/m³.
pub const WHO_GUIDELINE: f64 = 15.0;
/// Upper bound of "Unhealthy for Sensitive Groups", μg/m³.
pub const UNHEALTHY_THRESHOLD: f64 = 55.4;
/// Most thresholds a sensitivity sweep may produce.
pub const MAX_SWEEP_STEPS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub epa_standard: f64,
    pub who_guideline: f64,
    pub unhealthy_threshold: f64,
    pub percentile: f64,
    pub rolling_window: usize,
    pub min_run_length: usize,
    pub sensitivity: ThresholdSweep,
    pub seasons: SeasonMap,
    pub cities: Vec<City>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epa_standard: EPA_STANDARD,
            who_guideline: WHO_GUIDELINE,
            unhealthy_threshold: UNHEALTHY_THRESHOLD,
            percentile: 95.0,
            rolling_window: 7,
            min_run_length: 3,
            sensitivity: ThresholdSweep::default(),
            seasons: SeasonMap::meteorological(),
            cities: City::ALL.to_vec(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors, plus [`Error::InvalidConfig`] when a value fails
    /// [`AnalysisConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise fail deep inside the analysis.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("epa_standard", self.epa_standard),
            ("who_guideline", self.who_guideline),
            ("unhealthy_threshold", self.unhealthy_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(Error::InvalidConfig(format!(
                "percentile must be in (0, 100], got {}",
                self.percentile
            )));
        }
        if self.rolling_window == 0 {
            return Err(Error::InvalidConfig("rolling_window must be at least 1".to_string()));
        }
        if self.min_run_length == 0 {
            return Err(Error::InvalidConfig("min_run_length must be at least 1".to_string()));
        }
        self.sensitivity.validate()
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// Inclusive range of thresholds used by the sensitivity chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSweep {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for ThresholdSweep {
    fn default() -> Self {
        Self {
            start: WHO_GUIDELINE,
            end: 40.0,
            step: 1.0,
        }
    }
}

impl ThresholdSweep {
    fn steps(&self) -> f64 {
        ((self.end - self.start) / self.step + 1e-9).floor()
    }

    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for non-finite bounds, a non-positive step,
    /// `end < start`, or more than [`MAX_SWEEP_STEPS`] thresholds.
    pub fn validate(&self) -> Result<()> {
        if ![self.start, self.end, self.step].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidConfig(
                "sensitivity start, end and step must be finite".to_string(),
            ));
        }
        if self.step <= 0.0 || self.end < self.start {
            return Err(Error::InvalidConfig(format!(
                "sensitivity sweep {}..={} step {} is empty",
                self.start, self.end, self.step
            )));
        }
        if self.steps() >= MAX_SWEEP_STEPS as f64 {
            return Err(Error::InvalidConfig(format!(
                "sensitivity sweep would produce more than {MAX_SWEEP_STEPS} thresholds"
            )));
        }
        Ok(())
    }

    /// Thresholds from `start` to `end` inclusive. A sweep that fails
    /// [`ThresholdSweep::validate`] yields only `start`.
    pub fn thresholds(&self) -> Vec<f64> {
        if self.validate().is_err() {
            return vec![self.start];
        }
        let steps = self.steps() as usize;
        (0..=steps).map(|i| self.start + i as f64 * self.step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_sweep_covers_who_to_forty() {
        let thresholds = ThresholdSweep::default().thresholds();
        assert_eq!(thresholds.len(), 26);
        assert_eq!(thresholds[0], 15.0);
        assert_eq!(thresholds[25], 40.0);
    }

    #[test]
    fn test_degenerate_sweep() {
        let sweep = ThresholdSweep {
            start: 20.0,
            end: 10.0,
            step: 1.0,
        };
        assert_eq!(sweep.thresholds(), vec![20.0]);
    }

    #[test]
    fn test_sweep_rejects_unbounded_ranges() {
        for sweep in [
            ThresholdSweep { start: 15.0, end: f64::INFINITY, step: 1.0 },
            ThresholdSweep { start: 15.0, end: 40.0, step: 1e-12 },
            ThresholdSweep { start: f64::NAN, end: 40.0, step: 1.0 },
            ThresholdSweep { start: 15.0, end: 40.0, step: 0.0 },
        ] {
            assert!(matches!(sweep.validate(), Err(Error::InvalidConfig(_))), "{sweep:?}");
            assert_eq!(sweep.thresholds().len(), 1);
        }
    }

    #[test]
    fn test_load_rejects_huge_sweep() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sensitivity": {{"start": 0.0, "end": 1e300, "step": 1.0}}}}"#).unwrap();

        assert!(matches!(
            AnalysisConfig::load(file.path()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_rejects_zero_rolling_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rolling_window": 0}}"#).unwrap();

        let err = AnalysisConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("rolling_window"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            AnalysisConfig { percentile: 0.0, ..AnalysisConfig::default() },
            AnalysisConfig { min_run_length: 0, ..AnalysisConfig::default() },
            AnalysisConfig { epa_standard: -1.0, ..AnalysisConfig::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"rolling_window": 14, "cities": ["Fresno", "Salt Lake City"]}"#)
                .unwrap();

        assert_eq!(config.rolling_window, 14);
        assert_eq!(config.cities, vec![City::Fresno, City::SaltLakeCity]);
        assert_eq!(config.epa_standard, EPA_STANDARD);
        assert_eq!(config.seasons, SeasonMap::meteorological());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"percentile": 99.0}}"#).unwrap();

        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.percentile, 99.0);
        assert_eq!(config.min_run_length, 3);
    }

    #[test]
    fn test_load_or_default_without_path() {
        assert_eq!(AnalysisConfig::load_or_default(None).unwrap(), AnalysisConfig::default());
    }
}

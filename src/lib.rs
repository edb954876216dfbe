//! Descriptive and extreme-value statistics for daily PM2.5 measurements.

pub mod analysis;
pub mod charts;
pub mod config;
pub mod error;
pub mod extremes;
pub mod fetch;
pub mod loader;
pub mod model;
pub mod output;
pub mod statistics;
pub mod trends;

pub use error::{Error, Result};
pub use model::{City, Observation, Series};

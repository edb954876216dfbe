//! Per-city report assembly and the batch pipeline.
//!
//! This module runs the statistics, extremes and trends functions over
//! every configured city, writes one JSON report per city plus a summary
//! table, and hands the series to [`crate::charts`] for figure tables.

pub mod report;
pub mod runner;
pub mod types;

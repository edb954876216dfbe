//! Output formatting and persistence for analysis results.
//!
//! Supports logging values as JSON and writing JSON files or CSV tables.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty JSON, replacing any existing file.
pub fn write_json(path: impl AsRef<Path>, value: &impl Serialize) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes `rows` as a CSV table with a single header line, replacing any
/// existing file. An empty slice produces an empty file.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct Row {
        city: &'static str,
        value: f64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { city: "Denver", value: 1.5 },
            Row { city: "Fresno", value: 2.0 },
        ]
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&serde_json::json!({"city": "Denver"})).unwrap();
    }

    #[test]
    fn test_write_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/charts/table.csv");

        write_csv(&path, &rows()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "city,value\nDenver,1.5\nFresno,2.0\n");
    }

    #[test]
    fn test_write_csv_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_csv(&path, &rows()).unwrap();
        write_csv(&path, &rows()[..1]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("city")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_write_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json(&path, &serde_json::json!({"mean": 12.5})).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["mean"], 12.5);
    }
}

use anyhow::{bail, Context};
use csv::WriterBuilder;
use nalgebra::Point3;
use serde_json::{json, Map, Value};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a fitted model table `x,y,z,Frame`, one row per control point.
pub fn write_fitted_model<P: AsRef<Path>>(
    path: P,
    points: &[Point3<f64>],
    frame: u32,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "x,y,z,Frame")?;
    for p in points {
        writeln!(writer, "{:.16},{:.16},{:.16},{}", p.x, p.y, p.z, frame)?;
    }
    writer.flush()?;
    Ok(())
}

fn check_lengths(series: &BTreeMap<String, Vec<f64>>, n_frames: usize) -> anyhow::Result<()> {
    for (name, values) in series {
        if values.len() != n_frames {
            bail!(
                "series {} has {} values for {} frames",
                name,
                values.len(),
                n_frames
            );
        }
    }
    Ok(())
}

/// Writes per-frame time series as CSV: a `Frame` column followed by one
/// column per series in key order. Missing values are written as `NaN`.
pub fn write_volumes_csv<P: AsRef<Path>>(
    path: P,
    frames: &[u32],
    series: &BTreeMap<String, Vec<f64>>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    check_lengths(series, frames.len())?;

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut header = vec!["Frame".to_string()];
    header.extend(series.keys().cloned());
    wtr.write_record(&header)?;

    for (row, frame) in frames.iter().enumerate() {
        let mut record = vec![frame.to_string()];
        record.extend(series.values().map(|values| values[row].to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes per-frame time series as a JSON object `{ "Frame": [...], "<name>": [...] }`.
/// JSON has no NaN, so missing values become `null`.
pub fn write_volumes_json<P: AsRef<Path>>(
    path: P,
    frames: &[u32],
    series: &BTreeMap<String, Vec<f64>>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    check_lengths(series, frames.len())?;

    let mut object = Map::new();
    object.insert("Frame".to_string(), json!(frames));
    for (name, values) in series {
        let column: Vec<Value> = values
            .iter()
            .map(|v| if v.is_finite() { json!(v) } else { Value::Null })
            .collect();
        object.insert(name.clone(), Value::Array(column));
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &Value::Object(object))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod output_tests {
    use super::*;
    use crate::io::input::read_fitted_model;
    use std::fs;
    use tempfile::tempdir;

    fn series() -> BTreeMap<String, Vec<f64>> {
        let mut series = BTreeMap::new();
        series.insert("LV_ENDO".to_string(), vec![120.5, f64::NAN]);
        series.insert("LVM".to_string(), vec![98.0, 97.5]);
        series
    }

    #[test]
    fn test_fitted_model_keeps_full_precision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        let points = vec![
            Point3::new(0.1 + 0.2, -1.0 / 3.0, 1e-9),
            Point3::new(12345.678, 0.0, -7.25),
        ];
        write_fitted_model(&path, &points, 4).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x,y,z,Frame\n"));
        assert!(text.lines().skip(1).all(|l| l.ends_with(",4")));

        let loaded = read_fitted_model(&path).unwrap();
        for (a, b) in loaded.iter().zip(&points) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_volumes_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volumes.csv");
        write_volumes_csv(&path, &[3, 5], &series()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Frame,LVM,LV_ENDO", "3,98,120.5", "5,97.5,NaN"]);
    }

    #[test]
    fn test_volumes_json_uses_null_for_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volumes.json");
        write_volumes_json(&path, &[3, 5], &series()).unwrap();

        let value: Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["Frame"], json!([3, 5]));
        assert_eq!(value["LV_ENDO"], json!([120.5, null]));
        assert_eq!(value["LVM"][1], json!(97.5));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volumes.csv");
        assert!(write_volumes_csv(&path, &[1, 2, 3], &series()).is_err());
    }
}

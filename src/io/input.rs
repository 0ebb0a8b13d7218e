use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim};
use nalgebra::Point3;
use regex::Regex;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default rule for extracting the frame number from a fitted-model file name:
/// the digits following `_model_frame_` right before the `.txt` extension.
pub const DEFAULT_FRAME_REGEX: &str = r"(?i)_model_frame_(\d+)\.txt$";

/// Utility: detect whether the file uses comma or tab as delimiter.
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let file = File::open(&path).with_context(|| {
        format!(
            "failed to open file for delimiter sniffing: {:?}",
            path.as_ref()
        )
    })?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| "failed to read first line for delimiter detection")?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();

    if tabs > commas {
        Ok(b'\t')
    } else {
        Ok(b',')
    }
}

/// Reads the control points of a fitted model.
///
/// The file is a table with a header row and the columns `x, y, z, Frame`;
/// only the first three columns are used. A file with only a header yields
/// an empty point set. The point count is validated by the mesh, not here.
pub fn read_fitted_model<P: AsRef<Path>>(path: P) -> Result<Vec<Point3<f64>>> {
    let path = path.as_ref();
    let delim = detect_delimiter(path)?;
    let file =
        File::open(path).with_context(|| format!("failed to open fitted model {:?}", path))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delim)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut points = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading row {} of {:?}", row + 1, path))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let coord = |i: usize| -> Result<f64> {
            let field = record
                .get(i)
                .ok_or_else(|| anyhow!("row {} of {:?} has fewer than 3 columns", row + 1, path))?;
            field
                .parse::<f64>()
                .with_context(|| format!("row {} of {:?}: invalid coordinate '{}'", row + 1, path, field))
        };
        points.push(Point3::new(coord(0)?, coord(1)?, coord(2)?));
    }

    Ok(points)
}

/// Extracts the frame number from a file name using the first capture group of `pattern`.
pub fn parse_frame_number(file_name: &str, pattern: &Regex) -> Option<u32> {
    pattern
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

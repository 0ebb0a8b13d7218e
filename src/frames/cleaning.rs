//! Outlier and spike removal on a frame sequence, with imputation of the
//! removed and missing frames from the periodic fit of the remaining ones.

use super::parametric::BivParametric;
use super::BivFrames;
use crate::config::CleaningOptions;
use crate::error::BivError;

/// Result of [`clean_frames`]. Indices are frame positions in the input.
#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub frames: BivFrames,
    pub empty: Vec<usize>,
    pub outliers: Vec<usize>,
    pub spikes: Vec<usize>,
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Relative MADness of each sample over a cyclic window of `w` samples.
///
/// `|y[i] - m| - median(|y[j] - m|)` with `m` the window median and `j` over
/// the window centred on `i`. Values above about 2 mark spikes. A window
/// holding a NaN gives NaN.
pub fn relative_madness(y: &[f64], w: usize) -> Vec<f64> {
    let n = y.len() as isize;
    let half = (w.max(1) as isize - 1) / 2;
    (0..n)
        .map(|i| {
            let window: Vec<f64> = (-half..=half)
                .map(|k| y[(i + k).rem_euclid(n) as usize])
                .collect();
            let m = median(&mut window.clone());
            let mut deviations: Vec<f64> = window.iter().map(|v| (v - m).abs()).collect();
            (y[i as usize] - m).abs() - median(&mut deviations)
        })
        .collect()
}

/// Relative MADness of each sample's deviation from the line through its two
/// cyclic neighbours. Less sensitive to steep but smooth slopes than
/// [`relative_madness`] on the raw signal.
pub fn mad_lm(y: &[f64], w: usize) -> Vec<f64> {
    let n = y.len();
    let deviations: Vec<f64> = (0..n)
        .map(|i| {
            let prev = y[(i + n - 1) % n];
            let next = y[(i + 1) % n];
            (y[i] - (prev + 0.5 * (next - prev))).abs()
        })
        .collect();
    relative_madness(&deviations, w)
}

/// Linear-interpolation quantile of the non-NaN values.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (finite.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(finite.len() - 1);
    finite[lo] + (finite[hi] - finite[lo]) * (pos - lo as f64)
}

/// Positions of values outside `[Q1 - factor * IQR, Q3 + factor * IQR]`. NaN is never an outlier.
pub fn iqr_outliers(values: &[f64], factor: f64) -> Vec<usize> {
    let q1 = quantile(values, 0.25);
    let q3 = quantile(values, 0.75);
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - factor * iqr, q3 + factor * iqr);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lo || **v > hi)
        .map(|(i, _)| i)
        .collect()
}

/// Fills every empty frame with the periodic fit through the others.
///
/// Non-empty frames are kept as they are.
pub fn impute_frames(frames: &BivFrames) -> Result<BivFrames, BivError> {
    let empty = frames.empty_frames();
    if empty.is_empty() {
        return Ok(frames.clone());
    }

    let parametric = BivParametric::new(frames)?;
    let mut out = frames.clone();
    let n = frames.len() as f64;
    for &i in &empty {
        let mut mesh = parametric.at(i as f64 / n)?;
        mesh.set_label(frames[i].label());
        out.replace(i, mesh)?;
    }

    log::info!("Imputed {} frames", empty.len());
    Ok(out)
}

/// Removes LV volume outliers and spikes and imputes them together with the
/// frames that were empty to begin with.
///
/// Outliers are found on the raw LV endocardial volumes, spikes on the volumes
/// after a first imputation. The final imputation only uses frames that were
/// never flagged.
pub fn clean_frames(
    frames: &BivFrames,
    options: &CleaningOptions,
) -> Result<CleaningReport, BivError> {
    let empty = frames.empty_frames();
    if !empty.is_empty() {
        log::info!("Found {} empty frames at {:?}", empty.len(), empty);
    }

    let outliers = iqr_outliers(&frames.lv_endo_volumes(), options.outlier_iqr_factor);
    let mut out = frames.clone();
    out.make_frames_empty(&outliers)?;
    if !outliers.is_empty() {
        log::info!("Found {} outliers at {:?}", outliers.len(), outliers);
    }
    let mut out = impute_frames(&out)?;

    let spikes: Vec<usize> = mad_lm(&out.lv_endo_volumes(), 3)
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > options.spike_threshold)
        .map(|(i, _)| i)
        .collect();
    if !spikes.is_empty() {
        log::info!("Found {} spikes at {:?}", spikes.len(), spikes);
    }

    // refill everything removed so far from the frames that survived both passes
    let mut removed: Vec<usize> = empty
        .iter()
        .chain(&outliers)
        .chain(&spikes)
        .copied()
        .collect();
    removed.sort_unstable();
    removed.dedup();
    out.make_frames_empty(&removed)?;
    let out = impute_frames(&out)?;

    Ok(CleaningReport {
        frames: out,
        empty,
        outliers,
        spikes,
    })
}

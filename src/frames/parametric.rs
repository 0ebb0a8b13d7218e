use super::spline::{wrap_time, PeriodicSpline};
use super::BivFrames;
use crate::error::BivError;
use crate::mesh::BivMesh;

use nalgebra::Point3;
use rayon::prelude::*;

use std::sync::Arc;

/// A frame sequence seen as a continuous function of the cycle time `t`.
///
/// Every control point coordinate follows its own periodic cubic spline
/// through the non-empty frames, sampled at `index / len`. `t = 0` and `t = 1`
/// both give the first frame; any other finite `t` is wrapped onto `[0, 1)`.
#[derive(Debug, Clone)]
pub struct BivParametric<'a> {
    frames: &'a BivFrames,
    spline: Arc<PeriodicSpline>,
}

impl<'a> BivParametric<'a> {
    /// Fits the curves once. Needs at least two non-empty frames.
    pub fn new(frames: &'a BivFrames) -> Result<Self, BivError> {
        let times = sample_times(frames.len());
        let samples: Vec<Option<Vec<f64>>> = frames
            .iter()
            .map(|mesh| {
                if mesh.is_empty() {
                    None
                } else {
                    Some(
                        mesh.control_points()
                            .iter()
                            .flat_map(|p| [p.x, p.y, p.z])
                            .collect(),
                    )
                }
            })
            .collect();

        let spline = PeriodicSpline::fit(&times, &samples)?;
        let skipped = samples.iter().filter(|s| s.is_none()).count();
        if skipped > 0 {
            log::debug!("{} empty frames left out of the periodic fit", skipped);
        }

        Ok(BivParametric {
            frames,
            spline: Arc::new(spline),
        })
    }

    /// Reuses curves fitted earlier on the same sequence.
    pub fn from_spline(frames: &'a BivFrames, spline: Arc<PeriodicSpline>) -> Self {
        BivParametric { frames, spline }
    }

    pub fn frames(&self) -> &'a BivFrames {
        self.frames
    }

    pub fn spline(&self) -> &Arc<PeriodicSpline> {
        &self.spline
    }

    /// Control points at time `t`.
    pub fn control_points_at(&self, t: f64) -> Result<Vec<Point3<f64>>, BivError> {
        let values = self.spline.evaluate(t)?;
        Ok(values
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Mesh at time `t`.
    pub fn at(&self, t: f64) -> Result<BivMesh, BivError> {
        let wrapped = wrap_time(t)?;
        let points = self.control_points_at(wrapped)?;
        BivMesh::from_control_points(
            points,
            format!("t={:.2}", wrapped),
            self.frames.basis().clone(),
        )
    }

    /// One mesh per time, in input order. Times are evaluated in parallel.
    pub fn sample(&self, times: &[f64]) -> Result<Vec<BivMesh>, BivError> {
        times.par_iter().map(|&t| self.at(t)).collect()
    }

    /// `n` evenly spaced frames over `[0, 1)` as a new sequence numbered from 0.
    pub fn resample(&self, n: usize) -> Result<BivFrames, BivError> {
        let meshes = self.sample(&sample_times(n))?;
        let entries = meshes
            .into_iter()
            .enumerate()
            .map(|(i, mut mesh)| {
                mesh.set_label(format!("frame_{}", i));
                (i as u32, mesh)
            })
            .collect();
        BivFrames::new(entries, self.frames.basis().clone())
    }
}

/// Cycle positions `i / n` of `n` evenly spaced frames.
pub fn sample_times(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 / n as f64).collect()
}

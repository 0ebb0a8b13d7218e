pub mod cleaning;
pub mod parametric;
pub mod spline;

pub use cleaning::{clean_frames, impute_frames, CleaningReport};
pub use parametric::BivParametric;
pub use spline::PeriodicSpline;

use crate::config::FrameScanOptions;
use crate::error::BivError;
use crate::io::input::parse_frame_number;
use crate::io::output::{write_volumes_csv, write_volumes_json};
use crate::mesh::{BivMesh, ChamberVolumes};
use crate::model::SubdivisionBasis;

use anyhow::{bail, Context};
use nalgebra::Point3;
use rayon::prelude::*;

use std::collections::BTreeMap;
use std::fs;
use std::ops::{Index, Range};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longitudinal strain paths as (surface, view).
const GLS_PATHS: [(&str, &str); 4] = [("LV", "2CH"), ("LV", "4CH"), ("RVS", "4CH"), ("RVFW", "4CH")];

/// Circumferential strain paths as (surface, slice).
const GCS_PATHS: [(&str, &str); 9] = [
    ("LV", "APEX"),
    ("LV", "MID"),
    ("LV", "BASE"),
    ("RVFW", "APEX"),
    ("RVFW", "MID"),
    ("RVFW", "BASE"),
    ("RVS", "APEX"),
    ("RVS", "MID"),
    ("RVS", "BASE"),
];

/// Ordered sequence of biventricular meshes over one cardiac cycle.
///
/// Meshes are kept in ascending frame number order and all share one basis.
/// Frames may be empty; per-frame measurements of empty frames are `NaN`.
#[derive(Debug, Clone)]
pub struct BivFrames {
    meshes: Vec<BivMesh>,
    frames: Vec<u32>,
    basis: Arc<SubdivisionBasis>,
}

impl BivFrames {
    /// Builds a sequence from `(frame number, mesh)` pairs in any order.
    pub fn new(
        mut entries: Vec<(u32, BivMesh)>,
        basis: Arc<SubdivisionBasis>,
    ) -> Result<Self, BivError> {
        if entries
            .iter()
            .any(|(_, mesh)| !Arc::ptr_eq(mesh.basis(), &basis))
        {
            return Err(BivError::BasisMismatch);
        }

        entries.sort_by_key(|(frame, _)| *frame);
        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(BivError::DuplicateFrameNumber { frame: pair[0].0 });
        }

        let (frames, meshes) = entries.into_iter().unzip();
        Ok(BivFrames {
            meshes,
            frames,
            basis,
        })
    }

    /// One frame per control point set, numbered from 0. Empty sets give empty frames.
    pub fn from_control_points(
        sets: Vec<Vec<Point3<f64>>>,
        basis: Arc<SubdivisionBasis>,
    ) -> Result<Self, BivError> {
        let entries = sets
            .into_iter()
            .enumerate()
            .map(|(i, points)| {
                let mesh =
                    BivMesh::from_control_points(points, format!("frame_{}", i), basis.clone())?;
                Ok((i as u32, mesh))
            })
            .collect::<Result<Vec<_>, BivError>>()?;
        BivFrames::new(entries, basis)
    }

    /// Loads every fitted-model file of `folder` whose name matches the scan pattern.
    ///
    /// Frames are ordered by the number parsed from the file name, not by
    /// directory order. With `max_frames` set, empty frames numbered after the
    /// last file pad the sequence up to that length.
    pub fn from_folder<P: AsRef<Path>>(
        folder: P,
        options: &FrameScanOptions,
        basis: Arc<SubdivisionBasis>,
    ) -> anyhow::Result<Self> {
        let folder = folder.as_ref();
        let pattern = options.regex()?;

        let mut files: Vec<(u32, PathBuf)> = Vec::new();
        let entries =
            fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(frame) = parse_frame_number(name, &pattern) {
                files.push((frame, path));
            }
        }

        if files.is_empty() {
            return Err(BivError::NoFramesFound {
                folder: folder.to_path_buf(),
            }
            .into());
        }

        files.sort_by_key(|(frame, _)| *frame);
        if let Some(pair) = files.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(BivError::DuplicateFrameNumber { frame: pair[0].0 }.into());
        }

        log::info!("Loading {} frames from {}", files.len(), folder.display());

        let mut entries = files
            .par_iter()
            .enumerate()
            .map(|(i, (frame, path))| {
                let mesh = BivMesh::from_fitted_model(path, format!("frame_{}", i), basis.clone())?;
                Ok((*frame, mesh))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if let Some(max_frames) = options.max_frames {
            let n = entries.len();
            let last = entries.last().map_or(0, |(frame, _)| *frame);
            for k in n..max_frames {
                let frame = last + (k - n) as u32 + 1;
                entries.push((frame, BivMesh::empty(format!("frame_{}", k), basis.clone())));
            }
            if max_frames > n {
                log::info!("Padded sequence with {} empty frames", max_frames - n);
            }
        }

        Ok(BivFrames::new(entries, basis)?)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BivMesh> {
        self.meshes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BivMesh> {
        self.meshes.iter()
    }

    pub fn meshes(&self) -> &[BivMesh] {
        &self.meshes
    }

    pub fn frame_numbers(&self) -> &[u32] {
        &self.frames
    }

    pub fn basis(&self) -> &Arc<SubdivisionBasis> {
        &self.basis
    }

    /// Positions of the empty frames.
    pub fn empty_frames(&self) -> Vec<usize> {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, mesh)| mesh.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Sub-sequence of the frames at positions `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<BivFrames, BivError> {
        if range.start > range.end || range.end > self.len() {
            return Err(BivError::FrameIndexOutOfRange {
                index: range.end,
                len: self.len(),
            });
        }
        Ok(BivFrames {
            meshes: self.meshes[range.clone()].to_vec(),
            frames: self.frames[range].to_vec(),
            basis: self.basis.clone(),
        })
    }

    pub fn drop_empty_frames(&self) -> BivFrames {
        let mut out = self.clone();
        out.drop_empty_frames_in_place();
        out
    }

    pub fn drop_empty_frames_in_place(&mut self) {
        let frames = std::mem::take(&mut self.frames);
        let meshes = std::mem::take(&mut self.meshes);
        (self.frames, self.meshes) = frames
            .into_iter()
            .zip(meshes)
            .filter(|(_, mesh)| !mesh.is_empty())
            .unzip();
    }

    /// Replaces the frames at `indices` with empty meshes, keeping their labels.
    pub fn make_frames_empty(&mut self, indices: &[usize]) -> Result<(), BivError> {
        let len = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(BivError::FrameIndexOutOfRange { index, len });
        }
        for &i in indices {
            let label = self.meshes[i].label().to_string();
            self.meshes[i] = BivMesh::empty(label, self.basis.clone());
        }
        Ok(())
    }

    /// Replaces the mesh at `index`; the replacement must use this sequence's basis.
    pub fn replace(&mut self, index: usize, mesh: BivMesh) -> Result<(), BivError> {
        if index >= self.len() {
            return Err(BivError::FrameIndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        if !Arc::ptr_eq(mesh.basis(), &self.basis) {
            return Err(BivError::BasisMismatch);
        }
        self.meshes[index] = mesh;
        Ok(())
    }

    pub fn lv_endo_volumes(&self) -> Vec<f64> {
        self.meshes.par_iter().map(|m| m.lv_endo_volume()).collect()
    }

    pub fn chamber_volumes(&self) -> Vec<ChamberVolumes> {
        self.meshes.par_iter().map(|m| m.chamber_volumes()).collect()
    }

    /// Per-frame volumes and masses keyed `LV_ENDO`, `LV_EPI`, `RV_ENDO`,
    /// `RV_EPI`, `LVM` and `RVM`, in frame order.
    pub fn volumes(&self, density: f64) -> BTreeMap<String, Vec<f64>> {
        let chambers = self.chamber_volumes();
        let column = |f: &dyn Fn(&ChamberVolumes) -> f64| chambers.iter().map(f).collect::<Vec<_>>();

        let mut out = BTreeMap::new();
        out.insert("LV_ENDO".to_string(), column(&|v| v.lv_endo));
        out.insert("LV_EPI".to_string(), column(&|v| v.lv_epi));
        out.insert("RV_ENDO".to_string(), column(&|v| v.rv_endo));
        out.insert("RV_EPI".to_string(), column(&|v| v.rv_epi));
        out.insert("LVM".to_string(), column(&|v| v.lv_mass(density)));
        out.insert("RVM".to_string(), column(&|v| v.rv_mass(density)));
        out
    }

    /// Global longitudinal strain `(L - L_ed) / L_ed` per frame, keyed `<surface>_GLS_<view>`.
    pub fn gls(&self, ed_frame: usize) -> Result<BTreeMap<String, Vec<f64>>, BivError> {
        self.strain(ed_frame, &GLS_PATHS, "GLS", |mesh, surface, view| {
            mesh.long_arc_length(view, surface)
        })
    }

    /// Global circumferential strain per frame, keyed `<surface>_GCS_<slice>`.
    pub fn gcs(&self, ed_frame: usize) -> Result<BTreeMap<String, Vec<f64>>, BivError> {
        self.strain(ed_frame, &GCS_PATHS, "GCS", |mesh, surface, slice| {
            mesh.circ_arc_length(slice, surface)
        })
    }

    fn strain<F>(
        &self,
        ed_frame: usize,
        paths: &[(&str, &str)],
        kind: &str,
        arc_length: F,
    ) -> Result<BTreeMap<String, Vec<f64>>, BivError>
    where
        F: Fn(&BivMesh, &str, &str) -> Result<f64, BivError>,
    {
        if ed_frame >= self.len() {
            return Err(BivError::FrameIndexOutOfRange {
                index: ed_frame,
                len: self.len(),
            });
        }

        let mut out = BTreeMap::new();
        for &(surface, view) in paths {
            let arcs = self
                .meshes
                .iter()
                .map(|mesh| arc_length(mesh, surface, view))
                .collect::<Result<Vec<f64>, BivError>>()?;
            let reference = arcs[ed_frame];
            let strain = arcs.iter().map(|l| (l - reference) / reference).collect();
            out.insert(format!("{}_{}_{}", surface, kind, view), strain);
        }
        Ok(out)
    }

    /// Writes one fitted-model file per frame as `<model_name>_model_frame_<NNN>.txt`.
    ///
    /// Fails if `folder` exists, unless `overwrite` is set, in which case the
    /// folder is removed first.
    pub fn save_as<P: AsRef<Path>>(
        &self,
        model_name: &str,
        folder: P,
        overwrite: bool,
    ) -> anyhow::Result<()> {
        let folder = folder.as_ref();
        if folder.exists() {
            if !overwrite {
                bail!("output folder {} already exists", folder.display());
            }
            fs::remove_dir_all(folder)
                .with_context(|| format!("failed to remove {}", folder.display()))?;
        }
        fs::create_dir_all(folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        for (mesh, frame) in self.meshes.iter().zip(&self.frames) {
            let path = folder.join(format!("{}_model_frame_{:03}.txt", model_name, frame));
            mesh.to_fitted_model(&path, *frame)?;
        }
        log::info!("Saved {} frames to {}", self.len(), folder.display());
        Ok(())
    }

    pub fn write_volumes_csv<P: AsRef<Path>>(&self, path: P, density: f64) -> anyhow::Result<()> {
        write_volumes_csv(path, &self.frames, &self.volumes(density))
    }

    pub fn write_volumes_json<P: AsRef<Path>>(&self, path: P, density: f64) -> anyhow::Result<()> {
        write_volumes_json(path, &self.frames, &self.volumes(density))
    }
}

impl Index<usize> for BivFrames {
    type Output = BivMesh;

    fn index(&self, index: usize) -> &BivMesh {
        &self.meshes[index]
    }
}

impl<'a> IntoIterator for &'a BivFrames {
    type Item = &'a BivMesh;
    type IntoIter = std::slice::Iter<'a, BivMesh>;

    fn into_iter(self) -> Self::IntoIter {
        self.meshes.iter()
    }
}

impl IntoIterator for BivFrames {
    type Item = BivMesh;
    type IntoIter = std::vec::IntoIter<BivMesh>;

    fn into_iter(self) -> Self::IntoIter {
        self.meshes.into_iter()
    }
}

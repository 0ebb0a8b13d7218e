use pyo3::exceptions::{PyIndexError, PyRuntimeError};
use pyo3::prelude::*;

use crate::config::{CleaningOptions, FrameScanOptions};
use crate::frames::{clean_frames, impute_frames, BivFrames, BivParametric, PeriodicSpline};
use crate::mesh::{BivMesh, Mesh, MYOCARDIAL_DENSITY};
use crate::model::SubdivisionBasis;

use nalgebra::Point3;
use std::collections::BTreeMap;
use std::sync::Arc;

fn runtime_err<E: std::fmt::Display>(e: E) -> PyErr {
    PyRuntimeError::new_err(e.to_string())
}

fn to_arrays(points: &[Point3<f64>]) -> Vec<[f64; 3]> {
    points.iter().map(|p| [p.x, p.y, p.z]).collect()
}

fn to_points(arrays: Vec<[f64; 3]>) -> Vec<Point3<f64>> {
    arrays.into_iter().map(Point3::from).collect()
}

type PyMeshParts = (Vec<[f64; 3]>, Vec<[usize; 3]>);

fn mesh_parts(mesh: Mesh) -> PyMeshParts {
    (to_arrays(&mesh.nodes), mesh.faces)
}

#[pyclass(name = "BivMesh")]
#[derive(Debug, Clone)]
pub struct PyBivMesh {
    inner: BivMesh,
}

#[pymethods]
impl PyBivMesh {
    /// Mesh from 388 control points, or an empty mesh from none.
    #[new]
    #[pyo3(signature = (control_points, label = "biv_mesh".to_string()))]
    fn new(control_points: Vec<[f64; 3]>, label: String) -> PyResult<Self> {
        let basis = SubdivisionBasis::shared().map_err(runtime_err)?;
        let inner = BivMesh::from_control_points(to_points(control_points), label, basis)
            .map_err(runtime_err)?;
        Ok(Self { inner })
    }

    #[staticmethod]
    #[pyo3(signature = (path, label = "biv_mesh".to_string()))]
    fn from_fitted_model(path: &str, label: String) -> PyResult<Self> {
        let basis = SubdivisionBasis::shared().map_err(runtime_err)?;
        let inner = BivMesh::from_fitted_model(path, label, basis).map_err(runtime_err)?;
        Ok(Self { inner })
    }

    fn to_fitted_model(&self, path: &str, frame: u32) -> PyResult<()> {
        self.inner.to_fitted_model(path, frame).map_err(runtime_err)
    }

    #[getter]
    fn label(&self) -> String {
        self.inner.label().to_string()
    }

    #[getter]
    fn metadata(&self) -> BTreeMap<String, String> {
        self.inner
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn set_metadata(&mut self, key: String, value: String) {
        self.inner.metadata_mut().insert(key, value);
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[getter]
    fn control_points(&self) -> Vec<[f64; 3]> {
        to_arrays(self.inner.control_points())
    }

    #[getter]
    fn nodes(&self) -> Vec<[f64; 3]> {
        to_arrays(self.inner.nodes())
    }

    #[getter]
    fn faces(&self) -> Vec<[usize; 3]> {
        self.inner.faces().to_vec()
    }

    #[getter]
    fn components(&self) -> Vec<String> {
        self.inner
            .components()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect()
    }

    #[pyo3(signature = (open_valve = true))]
    fn lv_endo(&self, open_valve: bool) -> PyMeshParts {
        mesh_parts(self.inner.lv_endo(open_valve))
    }

    #[pyo3(signature = (open_valve = true))]
    fn rv_endo(&self, open_valve: bool) -> PyMeshParts {
        mesh_parts(self.inner.rv_endo(open_valve))
    }

    #[pyo3(signature = (open_valve = true))]
    fn lv_epi(&self, open_valve: bool) -> PyMeshParts {
        mesh_parts(self.inner.lv_epi(open_valve))
    }

    #[pyo3(signature = (open_valve = true))]
    fn rv_epi(&self, open_valve: bool) -> PyMeshParts {
        mesh_parts(self.inner.rv_epi(open_valve))
    }

    #[pyo3(signature = (open_valve = true))]
    fn rvlv_epi(&self, open_valve: bool) -> PyMeshParts {
        mesh_parts(self.inner.rvlv_epi(open_valve))
    }

    fn lv_endo_volume(&self) -> f64 {
        self.inner.lv_endo_volume()
    }

    fn lv_epi_volume(&self) -> f64 {
        self.inner.lv_epi_volume()
    }

    fn rv_endo_volume(&self) -> f64 {
        self.inner.rv_endo_volume()
    }

    fn rv_epi_volume(&self) -> f64 {
        self.inner.rv_epi_volume()
    }

    #[pyo3(signature = (density = MYOCARDIAL_DENSITY))]
    fn lv_mass(&self, density: f64) -> f64 {
        self.inner.lv_mass(density)
    }

    #[pyo3(signature = (density = MYOCARDIAL_DENSITY))]
    fn rv_mass(&self, density: f64) -> f64 {
        self.inner.rv_mass(density)
    }

    fn long_arc_length(&self, view: &str, surface: &str) -> PyResult<f64> {
        self.inner
            .long_arc_length(view, surface)
            .map_err(runtime_err)
    }

    fn circ_arc_length(&self, slice: &str, surface: &str) -> PyResult<f64> {
        self.inner
            .circ_arc_length(slice, surface)
            .map_err(runtime_err)
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

#[pyclass(name = "BivFrames")]
#[derive(Debug, Clone)]
pub struct PyBivFrames {
    inner: BivFrames,
}

#[pymethods]
impl PyBivFrames {
    #[staticmethod]
    #[pyo3(signature = (folder, file_regex = None, max_frames = None))]
    fn from_folder(
        folder: &str,
        file_regex: Option<String>,
        max_frames: Option<usize>,
    ) -> PyResult<Self> {
        let mut options = FrameScanOptions {
            max_frames,
            ..FrameScanOptions::default()
        };
        if let Some(regex) = file_regex {
            options.file_regex = regex;
        }
        let basis = SubdivisionBasis::shared().map_err(runtime_err)?;
        let inner = BivFrames::from_folder(folder, &options, basis).map_err(runtime_err)?;
        Ok(Self { inner })
    }

    #[staticmethod]
    fn from_control_points(sets: Vec<Vec<[f64; 3]>>) -> PyResult<Self> {
        let basis = SubdivisionBasis::shared().map_err(runtime_err)?;
        let sets = sets.into_iter().map(to_points).collect();
        let inner = BivFrames::from_control_points(sets, basis).map_err(runtime_err)?;
        Ok(Self { inner })
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__(&self, index: isize) -> PyResult<PyBivMesh> {
        let len = self.inner.len() as isize;
        let i = if index < 0 { index + len } else { index };
        if i < 0 || i >= len {
            return Err(PyIndexError::new_err(format!(
                "frame index {} out of range for {} frames",
                index, len
            )));
        }
        Ok(PyBivMesh {
            inner: self.inner[i as usize].clone(),
        })
    }

    #[getter]
    fn frames(&self) -> Vec<u32> {
        self.inner.frame_numbers().to_vec()
    }

    fn lv_endo_volumes(&self) -> Vec<f64> {
        self.inner.lv_endo_volumes()
    }

    #[pyo3(signature = (density = MYOCARDIAL_DENSITY))]
    fn volumes(&self, density: f64) -> BTreeMap<String, Vec<f64>> {
        self.inner.volumes(density)
    }

    fn gls(&self, ed_frame: usize) -> PyResult<BTreeMap<String, Vec<f64>>> {
        self.inner.gls(ed_frame).map_err(runtime_err)
    }

    fn gcs(&self, ed_frame: usize) -> PyResult<BTreeMap<String, Vec<f64>>> {
        self.inner.gcs(ed_frame).map_err(runtime_err)
    }

    fn drop_empty_frames(&self) -> Self {
        Self {
            inner: self.inner.drop_empty_frames(),
        }
    }

    fn make_frames_empty(&mut self, indices: Vec<usize>) -> PyResult<()> {
        self.inner.make_frames_empty(&indices).map_err(runtime_err)
    }

    #[pyo3(signature = (model_name, folder, overwrite = false))]
    fn save_as(&self, model_name: &str, folder: &str, overwrite: bool) -> PyResult<()> {
        self.inner
            .save_as(model_name, folder, overwrite)
            .map_err(runtime_err)
    }

    #[pyo3(signature = (path, density = MYOCARDIAL_DENSITY))]
    fn write_volumes_csv(&self, path: &str, density: f64) -> PyResult<()> {
        self.inner
            .write_volumes_csv(path, density)
            .map_err(runtime_err)
    }

    #[pyo3(signature = (path, density = MYOCARDIAL_DENSITY))]
    fn write_volumes_json(&self, path: &str, density: f64) -> PyResult<()> {
        self.inner
            .write_volumes_json(path, density)
            .map_err(runtime_err)
    }

    fn impute(&self) -> PyResult<Self> {
        let inner = impute_frames(&self.inner).map_err(runtime_err)?;
        Ok(Self { inner })
    }

    /// Returns `(cleaned, empty, outliers, spikes)`.
    #[pyo3(signature = (outlier_iqr_factor = 1.5, spike_threshold = 2.0))]
    fn clean(
        &self,
        outlier_iqr_factor: f64,
        spike_threshold: f64,
    ) -> PyResult<(Self, Vec<usize>, Vec<usize>, Vec<usize>)> {
        let options = CleaningOptions {
            outlier_iqr_factor,
            spike_threshold,
        };
        let report = clean_frames(&self.inner, &options).map_err(runtime_err)?;
        Ok((
            Self {
                inner: report.frames,
            },
            report.empty,
            report.outliers,
            report.spikes,
        ))
    }

    fn __repr__(&self) -> String {
        format!(
            "BivFrames(frames={}, empty={})",
            self.inner.len(),
            self.inner.empty_frames().len()
        )
    }
}

#[pyclass(name = "BivParametric")]
#[derive(Debug, Clone)]
pub struct PyBivParametric {
    frames: BivFrames,
    spline: Arc<PeriodicSpline>,
}

impl PyBivParametric {
    fn parametric(&self) -> BivParametric<'_> {
        BivParametric::from_spline(&self.frames, self.spline.clone())
    }
}

#[pymethods]
impl PyBivParametric {
    #[new]
    fn new(frames: PyRef<'_, PyBivFrames>) -> PyResult<Self> {
        let frames = frames.inner.clone();
        let spline = BivParametric::new(&frames)
            .map_err(runtime_err)?
            .spline()
            .clone();
        Ok(Self { frames, spline })
    }

    fn __call__(&self, t: f64) -> PyResult<PyBivMesh> {
        let inner = self.parametric().at(t).map_err(runtime_err)?;
        Ok(PyBivMesh { inner })
    }

    fn sample(&self, times: Vec<f64>) -> PyResult<Vec<PyBivMesh>> {
        let meshes = self.parametric().sample(&times).map_err(runtime_err)?;
        Ok(meshes.into_iter().map(|inner| PyBivMesh { inner }).collect())
    }

    fn resample(&self, n: usize) -> PyResult<PyBivFrames> {
        let inner = self.parametric().resample(n).map_err(runtime_err)?;
        Ok(PyBivFrames { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "BivParametric(frames={}, knots={})",
            self.frames.len(),
            self.spline.knots().len()
        )
    }
}

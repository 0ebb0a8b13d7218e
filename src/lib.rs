//! Biventricular heart surface model: subdivision of fitted control points into
//! a dense labelled mesh, chamber volumes and myocardial mass, and periodic
//! interpolation of frame sequences over the cardiac cycle.

pub mod config;
pub mod error;
pub mod frames;
pub mod io;
pub mod mesh;
pub mod model;
mod utils;

#[cfg(feature = "python")]
mod python_bind;

pub use config::{BivConfig, CleaningOptions, FrameScanOptions};
pub use error::BivError;
pub use frames::{BivFrames, BivParametric, PeriodicSpline};
pub use mesh::{BivMesh, ChamberVolumes, Mesh, MYOCARDIAL_DENSITY};
pub use model::{Component, SubdivisionBasis, CONTROL_POINT_COUNT};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn bivlite(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("CONTROL_POINT_COUNT", CONTROL_POINT_COUNT)?;
    m.add("MYOCARDIAL_DENSITY", MYOCARDIAL_DENSITY)?;

    m.add_class::<python_bind::PyBivMesh>()?;
    m.add_class::<python_bind::PyBivFrames>()?;
    m.add_class::<python_bind::PyBivParametric>()?;
    Ok(())
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by mesh construction, sequence construction and curve fitting.
///
/// Missing data inside a valid sequence (an empty frame) is not an error:
/// measurements on empty meshes return `f64::NAN` instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BivError {
    #[error("invalid number of control points: expected {expected} or 0, found {found}")]
    InvalidControlPointCount { expected: usize, found: usize },

    #[error("biventricular model asset not found: {path:?}")]
    BasisAssetMissing { path: PathBuf },

    #[error("unknown anatomical component label '{label}'")]
    UnknownComponent { label: String },

    #[error("invalid biventricular model asset: {reason}")]
    InvalidBasisAsset { reason: String },

    #[error("no fitted model frames found in {folder:?}")]
    NoFramesFound { folder: PathBuf },

    #[error("frame number {frame} appears more than once")]
    DuplicateFrameNumber { frame: u32 },

    #[error("not enough non-empty frames to fit a periodic curve: {available} available, {required} required")]
    InsufficientFrameData { available: usize, required: usize },

    #[error("time value {t} cannot be mapped onto the cardiac cycle")]
    TimeOutOfRange { t: f64 },

    #[error("meshes in one sequence must share the same subdivision basis")]
    BasisMismatch,

    #[error("frame index {index} out of range for sequence of length {len}")]
    FrameIndexOutOfRange { index: usize, len: usize },

    #[error("model asset has no strain landmark tables")]
    StrainPointsMissing,

    #[error("periodic spline system is singular")]
    SingularSystem,
}

pub type Result<T> = std::result::Result<T, BivError>;

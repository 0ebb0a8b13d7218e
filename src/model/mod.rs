pub mod basis;
pub mod components;

pub use basis::{StrainPoint, SubdivisionBasis, CONTROL_POINT_COUNT, MODEL_DIR_ENV};
pub use components::Component;

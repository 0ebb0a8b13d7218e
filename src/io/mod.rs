pub mod input;
pub mod output;

pub use input::{parse_frame_number, read_fitted_model, DEFAULT_FRAME_REGEX};
pub use output::{write_fitted_model, write_volumes_csv, write_volumes_json};

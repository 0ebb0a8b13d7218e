use crate::io::input::DEFAULT_FRAME_REGEX;
use crate::mesh::MYOCARDIAL_DENSITY;
use crate::model::SubdivisionBasis;

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings of a processing run, read from TOML. Every key is optional.
///
/// ```toml
/// model_folder = "/opt/biv/model"
/// mass_density = 1.05
///
/// [frames]
/// file_regex = '(?i)_model_frame_(\d+)\.txt$'
/// max_frames = 30
///
/// [cleaning]
/// outlier_iqr_factor = 1.5
/// spike_threshold = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BivConfig {
    pub model_folder: Option<PathBuf>,
    pub mass_density: f64,
    pub frames: FrameScanOptions,
    pub cleaning: CleaningOptions,
}

/// How fitted-model files are discovered in a folder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameScanOptions {
    /// Files whose name matches are loaded; capture group 1 is the frame number.
    pub file_regex: String,
    /// Pads the sequence with empty frames up to this length.
    pub max_frames: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningOptions {
    /// LV endocardial volumes beyond `factor * IQR` from the quartiles are outliers.
    pub outlier_iqr_factor: f64,
    /// Frames whose MAD spike score exceeds this value are spikes.
    pub spike_threshold: f64,
}

impl Default for BivConfig {
    fn default() -> Self {
        BivConfig {
            model_folder: None,
            mass_density: MYOCARDIAL_DENSITY,
            frames: FrameScanOptions::default(),
            cleaning: CleaningOptions::default(),
        }
    }
}

impl Default for FrameScanOptions {
    fn default() -> Self {
        FrameScanOptions {
            file_regex: DEFAULT_FRAME_REGEX.to_string(),
            max_frames: None,
        }
    }
}

impl Default for CleaningOptions {
    fn default() -> Self {
        CleaningOptions {
            outlier_iqr_factor: 1.5,
            spike_threshold: 2.0,
        }
    }
}

impl FrameScanOptions {
    pub fn regex(&self) -> anyhow::Result<Regex> {
        Regex::new(&self.file_regex)
            .with_context(|| format!("invalid frame file pattern '{}'", self.file_regex))
    }
}

impl BivConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: BivConfig = toml::from_str(text).context("failed to parse configuration")?;
        if !(config.mass_density.is_finite() && config.mass_density > 0.0) {
            anyhow::bail!("mass_density must be positive, got {}", config.mass_density);
        }
        config.frames.regex()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Model folder from the configuration, falling back to the environment
    /// override and then to the packaged location.
    pub fn resolved_model_folder(&self) -> PathBuf {
        self.model_folder
            .clone()
            .unwrap_or_else(SubdivisionBasis::default_folder)
    }

    /// Loads the basis named by the configuration, or the process-wide shared
    /// basis when no folder is configured.
    pub fn load_basis(&self) -> anyhow::Result<Arc<SubdivisionBasis>> {
        match &self.model_folder {
            Some(folder) => Ok(Arc::new(SubdivisionBasis::from_folder(folder)?)),
            None => SubdivisionBasis::shared(),
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::error::BivError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BivConfig::from_toml_str("").unwrap();
        assert_eq!(config, BivConfig::default());
        assert_eq!(config.mass_density, 1.05);
        assert_eq!(config.frames.file_regex, DEFAULT_FRAME_REGEX);
        assert_eq!(config.cleaning.spike_threshold, 2.0);
    }

    #[test]
    fn test_partial_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mass_density = 1.1\nmodel_folder = \"/data/model\"\n\n[frames]\nmax_frames = 30\n"
        )
        .unwrap();

        let config = BivConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.mass_density, 1.1);
        assert_eq!(config.frames.max_frames, Some(30));
        assert_eq!(config.frames.file_regex, DEFAULT_FRAME_REGEX);
        assert_eq!(config.cleaning.outlier_iqr_factor, 1.5);
        assert_eq!(config.resolved_model_folder(), PathBuf::from("/data/model"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(BivConfig::from_toml_str("mass_density = -1.0").is_err());
        assert!(BivConfig::from_toml_str("[frames]\nfile_regex = '(unclosed'").is_err());
        assert!(BivConfig::from_toml_str("unknown_key = 3").is_err());
    }

    #[test]
    fn test_missing_model_folder_is_reported() {
        let config = BivConfig::from_toml_str("model_folder = '/definitely/not/here'").unwrap();
        let err = config.load_basis().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BivError>(),
            Some(BivError::BasisAssetMissing { .. })
        ));
    }
}

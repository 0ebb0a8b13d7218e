use super::components::Component;
use crate::error::BivError;

use anyhow::{bail, Context};
use csv::ReaderBuilder;
use nalgebra::{DMatrix, Point3};
use serde::Deserialize;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Number of control points of the biventricular template.
pub const CONTROL_POINT_COUNT: usize = 388;

/// Environment variable overriding the default model folder.
pub const MODEL_DIR_ENV: &str = "BIVLITE_MODEL_DIR";

const SUBDIVISION_MATRIX_FILE: &str = "subdivision_matrix.txt";
const ELEMENTS_FILE: &str = "ETIndicesSorted.txt";
const MATERIALS_FILE: &str = "ETIndicesMaterials.txt";
const THRU_WALL_FILE: &str = "thru_wall_et_indices.txt";
const LS_POINTS_FILE: &str = "ls_points.txt";
const CS_POINTS_FILE: &str = "cs_points.txt";

static SHARED_BASIS: OnceLock<Arc<SubdivisionBasis>> = OnceLock::new();

/// One dense vertex on a strain measurement path.
///
/// `view` holds the long-axis view (`2CH`, `4CH`) for longitudinal paths and
/// the slice level (`APEX`, `MID`, `BASE`) for circumferential ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrainPoint {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "View")]
    pub view: String,
    #[serde(rename = "Surface")]
    pub surface: String,
}

/// Fixed sparse-to-dense transform of the biventricular template.
///
/// Holds the dense basis matrix (`n_nodes x n_control_points`), the triangle
/// list over the dense nodes and one anatomical component per triangle. Loaded
/// once and shared read-only between all meshes through an `Arc`.
#[derive(Debug, Clone)]
pub struct SubdivisionBasis {
    matrix: DMatrix<f64>,
    faces: Vec<[usize; 3]>,
    components: Vec<Component>,
    surface_face_count: usize,
    ls_points: Option<Vec<StrainPoint>>,
    cs_points: Option<Vec<StrainPoint>>,
}

impl SubdivisionBasis {
    /// Builds a basis from its parts, checking face indices and labels.
    pub fn new(
        matrix: DMatrix<f64>,
        faces: Vec<[usize; 3]>,
        components: Vec<Component>,
    ) -> Result<Self, BivError> {
        if faces.len() != components.len() {
            return Err(BivError::InvalidBasisAsset {
                reason: format!(
                    "{} faces but {} component labels",
                    faces.len(),
                    components.len()
                ),
            });
        }

        let n_nodes = matrix.nrows();
        if let Some(face) = faces.iter().find(|f| f.iter().any(|&i| i >= n_nodes)) {
            return Err(BivError::InvalidBasisAsset {
                reason: format!("face {:?} references a node beyond {}", face, n_nodes),
            });
        }

        let surface_face_count = components
            .iter()
            .filter(|c| **c != Component::ThruWall)
            .count();

        Ok(SubdivisionBasis {
            matrix,
            faces,
            components,
            surface_face_count,
            ls_points: None,
            cs_points: None,
        })
    }

    /// Attaches longitudinal and circumferential strain landmark tables.
    pub fn with_strain_points(
        mut self,
        ls_points: Vec<StrainPoint>,
        cs_points: Vec<StrainPoint>,
    ) -> Result<Self, BivError> {
        let n_nodes = self.n_nodes();
        if let Some(p) = ls_points
            .iter()
            .chain(cs_points.iter())
            .find(|p| p.index >= n_nodes)
        {
            return Err(BivError::InvalidBasisAsset {
                reason: format!("strain landmark index {} beyond {} nodes", p.index, n_nodes),
            });
        }
        self.ls_points = Some(ls_points);
        self.cs_points = Some(cs_points);
        Ok(self)
    }

    /// Folder used when no model folder is given explicitly.
    pub fn default_folder() -> PathBuf {
        match std::env::var_os(MODEL_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => Path::new(env!("CARGO_MANIFEST_DIR")).join("model"),
        }
    }

    /// Process-wide basis loaded from [`SubdivisionBasis::default_folder`] on first use.
    pub fn shared() -> anyhow::Result<Arc<SubdivisionBasis>> {
        if let Some(basis) = SHARED_BASIS.get() {
            return Ok(Arc::clone(basis));
        }
        let basis = Arc::new(Self::from_folder(Self::default_folder())?);
        Ok(Arc::clone(SHARED_BASIS.get_or_init(|| basis)))
    }

    /// Loads the template model files from `folder`.
    pub fn from_folder<P: AsRef<Path>>(folder: P) -> anyhow::Result<Self> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(BivError::BasisAssetMissing {
                path: folder.to_path_buf(),
            }
            .into());
        }

        let matrix_path = required_file(folder, SUBDIVISION_MATRIX_FILE)?;
        let elements_path = required_file(folder, ELEMENTS_FILE)?;
        let materials_path = required_file(folder, MATERIALS_FILE)?;
        let thru_wall_path = required_file(folder, THRU_WALL_FILE)?;

        let matrix = read_dense_matrix(&matrix_path)
            .with_context(|| format!("reading {}", matrix_path.display()))?;
        if matrix.ncols() != CONTROL_POINT_COUNT {
            return Err(BivError::InvalidBasisAsset {
                reason: format!(
                    "subdivision matrix has {} columns, expected {}",
                    matrix.ncols(),
                    CONTROL_POINT_COUNT
                ),
            }
            .into());
        }

        let mut faces = read_triangles(&elements_path)
            .with_context(|| format!("reading {}", elements_path.display()))?;
        let mut components = read_materials(&materials_path)
            .with_context(|| format!("reading {}", materials_path.display()))?;
        if components.len() != faces.len() {
            return Err(BivError::InvalidBasisAsset {
                reason: format!(
                    "{} surface faces but {} material rows",
                    faces.len(),
                    components.len()
                ),
            }
            .into());
        }

        // closes the gap between the septum and the epicardium
        let thru_wall = read_triangles(&thru_wall_path)
            .with_context(|| format!("reading {}", thru_wall_path.display()))?;
        components.extend(std::iter::repeat(Component::ThruWall).take(thru_wall.len()));
        faces.extend(thru_wall);

        let mut basis = SubdivisionBasis::new(matrix, faces, components)?;

        let ls_path = folder.join(LS_POINTS_FILE);
        let cs_path = folder.join(CS_POINTS_FILE);
        if ls_path.is_file() && cs_path.is_file() {
            let ls = read_strain_points(&ls_path)
                .with_context(|| format!("reading {}", ls_path.display()))?;
            let cs = read_strain_points(&cs_path)
                .with_context(|| format!("reading {}", cs_path.display()))?;
            basis = basis.with_strain_points(ls, cs)?;
        } else {
            log::debug!("no strain landmark tables in {:?}", folder);
        }

        log::info!(
            "Loaded biventricular model from {:?}: {} nodes, {} faces ({} surface)",
            folder,
            basis.n_nodes(),
            basis.n_faces(),
            basis.surface_face_count()
        );

        Ok(basis)
    }

    /// Dense node positions `matrix * control_points`.
    ///
    /// The caller is responsible for passing exactly `n_control_points()` points.
    pub fn apply(&self, control_points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        let cp = DMatrix::from_fn(control_points.len(), 3, |r, c| control_points[r][c]);
        let nodes = &self.matrix * cp;
        (0..nodes.nrows())
            .map(|r| Point3::new(nodes[(r, 0)], nodes[(r, 1)], nodes[(r, 2)]))
            .collect()
    }

    pub fn n_control_points(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn n_nodes(&self) -> usize {
        self.matrix.nrows()
    }

    /// All faces, surface elements and THRU_WALL closure faces.
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Primary surface elements, i.e. faces excluding THRU_WALL.
    pub fn surface_face_count(&self) -> usize {
        self.surface_face_count
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Components labelling at least one face, in discriminant order.
    pub fn present_components(&self) -> Vec<Component> {
        self.components
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn ls_points(&self) -> Option<&[StrainPoint]> {
        self.ls_points.as_deref()
    }

    pub fn cs_points(&self) -> Option<&[StrainPoint]> {
        self.cs_points.as_deref()
    }
}

fn required_file(folder: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let path = folder.join(name);
    if !path.is_file() {
        return Err(BivError::BasisAssetMissing { path }.into());
    }
    Ok(path)
}

fn read_dense_matrix(path: &Path) -> anyhow::Result<DMatrix<f64>> {
    let text = fs::read_to_string(path)?;
    let mut data = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid number on line {}", line_no + 1))?;

        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                bail!(
                    "line {} has {} columns, expected {}",
                    line_no + 1,
                    row.len(),
                    n
                )
            }
            _ => {}
        }
        data.extend(row);
        nrows += 1;
    }

    let ncols = ncols.unwrap_or(0);
    Ok(DMatrix::from_row_slice(nrows, ncols, &data))
}

/// Parses a 1-based index written either as an integer or as a float.
fn parse_one_based(token: &str) -> anyhow::Result<usize> {
    let value: f64 = token
        .parse()
        .with_context(|| format!("invalid index '{}'", token))?;
    if value < 1.0 || value.fract() != 0.0 {
        bail!("index '{}' is not a positive integer", token);
    }
    Ok(value as usize - 1)
}

fn read_triangles(path: &Path) -> anyhow::Result<Vec<[usize; 3]>> {
    let text = fs::read_to_string(path)?;
    let mut faces = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != 3 {
            bail!(
                "line {} has {} indices, expected 3",
                line_no + 1,
                tokens.len()
            );
        }
        faces.push([
            parse_one_based(tokens[0])?,
            parse_one_based(tokens[1])?,
            parse_one_based(tokens[2])?,
        ]);
    }
    Ok(faces)
}

fn read_materials(path: &Path) -> anyhow::Result<Vec<Component>> {
    let text = fs::read_to_string(path)?;
    let mut components = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => continue,
            [_index, label] => {
                let component: Component = label.parse()?;
                components.push(component);
            }
            _ => bail!("line {}: expected '<index> <label>'", line_no + 1),
        }
    }
    Ok(components)
}

fn read_strain_points(path: &Path) -> anyhow::Result<Vec<StrainPoint>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let mut points = Vec::new();
    for result in rdr.deserialize() {
        let point: StrainPoint = result?;
        points.push(point);
    }
    Ok(points)
}

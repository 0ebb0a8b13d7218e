use super::volume::{myocardial_mass, ChamberVolumes};
use super::Mesh;
use crate::error::BivError;
use crate::io::input::read_fitted_model;
use crate::io::output::write_fitted_model;
use crate::model::{Component, StrainPoint, SubdivisionBasis};

use anyhow::Context;
use nalgebra::Point3;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const LV_VALVES: [Component; 2] = [Component::AortaValve, Component::MitralValve];
const RV_VALVES: [Component; 2] = [Component::PulmonaryValve, Component::TricuspidValve];
const LV_CUTS: [Component; 4] = [
    Component::AortaValve,
    Component::AortaValveCut,
    Component::MitralValve,
    Component::MitralValveCut,
];
const RV_CUTS: [Component; 4] = [
    Component::PulmonaryValve,
    Component::PulmonaryValveCut,
    Component::TricuspidValve,
    Component::TricuspidValveCut,
];

/// Biventricular surface mesh of one fitted frame.
///
/// Dense nodes are `basis * control_points`; the face list and the component
/// labels are those of the shared basis. A mesh built from zero control points
/// is empty: it has no nodes, no faces and every measurement returns `f64::NAN`.
#[derive(Debug, Clone)]
pub struct BivMesh {
    label: String,
    metadata: HashMap<String, String>,
    control_points: Vec<Point3<f64>>,
    nodes: Vec<Point3<f64>>,
    basis: Arc<SubdivisionBasis>,
}

impl BivMesh {
    /// Builds the dense mesh from a control point set of the basis' size, or an
    /// empty mesh from zero points.
    pub fn from_control_points(
        control_points: Vec<Point3<f64>>,
        label: impl Into<String>,
        basis: Arc<SubdivisionBasis>,
    ) -> Result<Self, BivError> {
        let expected = basis.n_control_points();
        if !control_points.is_empty() && control_points.len() != expected {
            return Err(BivError::InvalidControlPointCount {
                expected,
                found: control_points.len(),
            });
        }

        let nodes = if control_points.is_empty() {
            Vec::new()
        } else {
            basis.apply(&control_points)
        };

        Ok(BivMesh {
            label: label.into(),
            metadata: HashMap::new(),
            control_points,
            nodes,
            basis,
        })
    }

    pub fn empty(label: impl Into<String>, basis: Arc<SubdivisionBasis>) -> Self {
        BivMesh {
            label: label.into(),
            metadata: HashMap::new(),
            control_points: Vec::new(),
            nodes: Vec::new(),
            basis,
        }
    }

    /// Reads a fitted model file and builds its mesh.
    pub fn from_fitted_model<P: AsRef<Path>>(
        path: P,
        label: impl Into<String>,
        basis: Arc<SubdivisionBasis>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let points = read_fitted_model(path)?;
        let mesh = BivMesh::from_control_points(points, label, basis)
            .with_context(|| format!("building mesh from {:?}", path))?;
        Ok(mesh)
    }

    /// Writes the control points as a fitted model file tagged with `frame`.
    pub fn to_fitted_model<P: AsRef<Path>>(&self, path: P, frame: u32) -> anyhow::Result<()> {
        write_fitted_model(path, &self.control_points, frame)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.metadata
    }

    pub fn control_points(&self) -> &[Point3<f64>] {
        &self.control_points
    }

    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    /// Face list of the basis, or nothing for an empty mesh.
    pub fn faces(&self) -> &[[usize; 3]] {
        if self.is_empty() {
            &[]
        } else {
            self.basis.faces()
        }
    }

    pub fn components(&self) -> &[Component] {
        if self.is_empty() {
            &[]
        } else {
            self.basis.components()
        }
    }

    pub fn basis(&self) -> &Arc<SubdivisionBasis> {
        &self.basis
    }

    pub fn is_empty(&self) -> bool {
        self.control_points.is_empty()
    }

    /// Sub-mesh made of the faces labelled with any of `components`.
    ///
    /// With `reindex` the unused nodes are dropped and the faces renumbered;
    /// without it the sub-mesh keeps every node, which is all the volume
    /// integral needs.
    pub fn get_mesh_component(
        &self,
        components: &[Component],
        label: impl Into<String>,
        reindex: bool,
    ) -> Mesh {
        if self.is_empty() {
            return Mesh::empty(label);
        }

        let (faces, labels): (Vec<[usize; 3]>, Vec<Component>) = self
            .basis
            .faces()
            .iter()
            .zip(self.basis.components())
            .filter(|(_, c)| components.contains(*c))
            .map(|(f, c)| (*f, *c))
            .unzip();

        let mesh = Mesh::new(label, self.nodes.clone(), faces, labels);
        if reindex {
            mesh.reindexed()
        } else {
            mesh
        }
    }

    fn lv_endo_parts(open_valve: bool) -> Vec<Component> {
        let mut parts = vec![Component::LvEndocardial];
        if !open_valve {
            parts.extend(LV_VALVES);
        }
        parts
    }

    fn rv_endo_parts(open_valve: bool) -> Vec<Component> {
        let mut parts = vec![Component::RvFreewall, Component::RvSeptum];
        if !open_valve {
            parts.extend(RV_VALVES);
        }
        parts
    }

    fn lv_epi_parts(open_valve: bool) -> Vec<Component> {
        let mut parts = vec![
            Component::LvEpicardial,
            Component::RvSeptum,
            Component::ThruWall,
        ];
        if !open_valve {
            parts.extend(LV_CUTS);
        }
        parts
    }

    fn rv_epi_parts(open_valve: bool) -> Vec<Component> {
        let mut parts = vec![
            Component::RvEpicardial,
            Component::RvSeptum,
            Component::ThruWall,
        ];
        if !open_valve {
            parts.extend(RV_CUTS);
        }
        parts
    }

    fn rvlv_epi_parts(open_valve: bool) -> Vec<Component> {
        let mut parts = vec![Component::LvEpicardial, Component::RvEpicardial];
        if !open_valve {
            parts.extend(LV_CUTS);
            parts.extend(RV_CUTS);
        }
        parts
    }

    /// LV endocardium; `open_valve = false` closes it with the aortic and mitral valves.
    pub fn lv_endo(&self, open_valve: bool) -> Mesh {
        self.get_mesh_component(&Self::lv_endo_parts(open_valve), "LV_ENDO", true)
    }

    /// RV endocardium (free wall and septum), closed by the pulmonary and tricuspid valves.
    pub fn rv_endo(&self, open_valve: bool) -> Mesh {
        self.get_mesh_component(&Self::rv_endo_parts(open_valve), "RV_ENDO", true)
    }

    pub fn lv_epi(&self, open_valve: bool) -> Mesh {
        self.get_mesh_component(&Self::lv_epi_parts(open_valve), "LV_EPI", true)
    }

    pub fn rv_epi(&self, open_valve: bool) -> Mesh {
        self.get_mesh_component(&Self::rv_epi_parts(open_valve), "RV_EPI", true)
    }

    /// Combined epicardium of both ventricles.
    pub fn rvlv_epi(&self, open_valve: bool) -> Mesh {
        self.get_mesh_component(&Self::rvlv_epi_parts(open_valve), "RVLV_EPI", true)
    }

    fn closed_volume(&self, parts: &[Component], flip: Option<Component>) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        let mesh = self.get_mesh_component(parts, "", false);
        match flip {
            Some(component) => mesh.flip_component(component).volume(),
            None => mesh.volume(),
        }
    }

    pub fn lv_endo_volume(&self) -> f64 {
        self.closed_volume(&Self::lv_endo_parts(false), None)
    }

    // the septum is wound towards the RV cavity
    pub fn rv_endo_volume(&self) -> f64 {
        self.closed_volume(&Self::rv_endo_parts(false), Some(Component::RvSeptum))
    }

    pub fn lv_epi_volume(&self) -> f64 {
        self.closed_volume(&Self::lv_epi_parts(false), Some(Component::ThruWall))
    }

    pub fn rv_epi_volume(&self) -> f64 {
        self.closed_volume(&Self::rv_epi_parts(false), Some(Component::RvSeptum))
    }

    /// All four chamber volumes at once.
    pub fn chamber_volumes(&self) -> ChamberVolumes {
        if self.is_empty() {
            return ChamberVolumes::nan();
        }
        ChamberVolumes {
            lv_endo: self.lv_endo_volume(),
            lv_epi: self.lv_epi_volume(),
            rv_endo: self.rv_endo_volume(),
            rv_epi: self.rv_epi_volume(),
        }
    }

    /// LV myocardial mass in grams for volumes in ml and `density` in g/ml.
    pub fn lv_mass(&self, density: f64) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        myocardial_mass(self.lv_epi_volume(), self.lv_endo_volume(), density)
    }

    pub fn rv_mass(&self, density: f64) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        myocardial_mass(self.rv_epi_volume(), self.rv_endo_volume(), density)
    }

    /// Length of the longitudinal landmark path of `view` (`2CH`, `4CH`) on
    /// `surface` (`LV`, `RVS`, `RVFW`).
    pub fn long_arc_length(&self, view: &str, surface: &str) -> Result<f64, BivError> {
        let points = self.basis.ls_points().ok_or(BivError::StrainPointsMissing)?;
        Ok(self.arc_length(points, view, surface))
    }

    /// Length of the circumferential landmark path of `slice` (`APEX`, `MID`,
    /// `BASE`) on `surface`.
    pub fn circ_arc_length(&self, slice: &str, surface: &str) -> Result<f64, BivError> {
        let points = self.basis.cs_points().ok_or(BivError::StrainPointsMissing)?;
        Ok(self.arc_length(points, slice, surface))
    }

    fn arc_length(&self, points: &[StrainPoint], view: &str, surface: &str) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        let path: Vec<Point3<f64>> = points
            .iter()
            .filter(|p| p.view == view && p.surface == surface)
            .map(|p| self.nodes[p.index])
            .collect();
        path.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }
}

impl fmt::Display for BivMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<BivMesh> object")?;
        writeln!(f, "Label: {}", self.label)?;
        writeln!(f, "Control points: ({}, 3)", self.control_points.len())?;
        writeln!(f, "Vertices: ({}, 3)", self.nodes.len())?;
        writeln!(f, "Faces: ({}, 3)", self.faces().len())?;
        let components: Vec<&str> = self
            .basis
            .present_components()
            .iter()
            .map(|c| c.as_str())
            .collect();
        write!(f, "Components: {}", components.join(", "))
    }
}

#[cfg(test)]
mod biv_mesh_tests {
    use super::*;
    use crate::mesh::MYOCARDIAL_DENSITY;
    use crate::utils::test_utils::{
        box_heart_basis, box_heart_control_points, BOX_LV_ENDO, BOX_LV_EPI, BOX_POINT_COUNT,
        BOX_RV_ENDO, BOX_RV_EPI,
    };
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::tempdir;

    fn box_heart(scale: f64) -> BivMesh {
        BivMesh::from_control_points(box_heart_control_points(scale), "box", box_heart_basis())
            .unwrap()
    }

    #[test]
    fn test_box_heart_volumes() {
        let mesh = box_heart(1.0);
        assert_relative_eq!(mesh.lv_endo_volume(), BOX_LV_ENDO, epsilon = 1e-12);
        assert_relative_eq!(mesh.lv_epi_volume(), BOX_LV_EPI, epsilon = 1e-12);
        assert_relative_eq!(mesh.rv_endo_volume(), BOX_RV_ENDO, epsilon = 1e-12);
        assert_relative_eq!(mesh.rv_epi_volume(), BOX_RV_EPI, epsilon = 1e-12);

        let scaled = box_heart(2.0);
        assert_relative_eq!(scaled.lv_epi_volume(), 8.0 * BOX_LV_EPI, epsilon = 1e-9);
    }

    #[test]
    fn test_mass_is_density_times_wall_volume() {
        let mesh = box_heart(1.3);
        let v = mesh.chamber_volumes();
        assert_relative_eq!(
            mesh.lv_mass(MYOCARDIAL_DENSITY),
            (v.lv_epi - v.lv_endo) * MYOCARDIAL_DENSITY,
            epsilon = 1e-12
        );
        assert_relative_eq!(mesh.rv_mass(1.0), v.rv_epi - v.rv_endo, epsilon = 1e-12);
        assert_relative_eq!(
            box_heart(1.0).lv_mass(MYOCARDIAL_DENSITY),
            (BOX_LV_EPI - BOX_LV_ENDO) * MYOCARDIAL_DENSITY,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_empty_mesh_returns_nan() {
        let mesh = BivMesh::from_control_points(Vec::new(), "empty", box_heart_basis()).unwrap();
        assert!(mesh.is_empty());
        assert!(mesh.nodes().is_empty());
        assert!(mesh.faces().is_empty());
        assert!(mesh.lv_endo_volume().is_nan());
        assert!(mesh.rv_epi_volume().is_nan());
        assert!(mesh.lv_mass(MYOCARDIAL_DENSITY).is_nan());
        assert!(mesh.rv_mass(MYOCARDIAL_DENSITY).is_nan());
        assert!(mesh.chamber_volumes().is_nan());
        assert!(mesh.lv_endo(true).is_empty());
        assert!(mesh.rvlv_epi(false).is_empty());
    }

    #[test]
    fn test_invalid_control_point_count() {
        let points = vec![Point3::origin(); BOX_POINT_COUNT - 1];
        let err = BivMesh::from_control_points(points, "bad", box_heart_basis()).unwrap_err();
        assert_eq!(
            err,
            BivError::InvalidControlPointCount {
                expected: BOX_POINT_COUNT,
                found: BOX_POINT_COUNT - 1
            }
        );
    }

    #[test]
    fn test_nodes_are_basis_times_control_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let matrix = DMatrix::from_fn(9, 5, |_, _| rng.random_range(-1.0..1.0));
        let basis = Arc::new(
            SubdivisionBasis::new(
                matrix.clone(),
                vec![[0, 1, 2], [3, 4, 8]],
                vec![Component::LvEndocardial, Component::RvSeptum],
            )
            .unwrap(),
        );
        let points: Vec<Point3<f64>> = (0..5)
            .map(|_| {
                Point3::new(
                    rng.random_range(-50.0..50.0),
                    rng.random_range(-50.0..50.0),
                    rng.random_range(-50.0..50.0),
                )
            })
            .collect();

        let mesh = BivMesh::from_control_points(points.clone(), "rand", basis).unwrap();
        assert_eq!(mesh.nodes().len(), 9);
        for (r, node) in mesh.nodes().iter().enumerate() {
            for axis in 0..3 {
                let expected: f64 = (0..5).map(|c| matrix[(r, c)] * points[c][axis]).sum();
                assert_relative_eq!(node[axis], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_topology_is_identical_across_meshes() {
        let a = box_heart(1.0);
        let b = box_heart(0.7);
        assert_eq!(a.faces(), b.faces());
        assert_eq!(a.components(), b.components());
        assert_eq!(a.lv_endo(false).faces, b.lv_endo(false).faces);
    }

    #[test]
    fn test_component_accessors() {
        let mesh = box_heart(1.0);
        // 5 sides plus the valve lid, 2 triangles each
        let closed = mesh.lv_endo(false);
        assert_eq!(closed.n_faces(), 12);
        assert_eq!(closed.n_nodes(), 24);
        assert_relative_eq!(closed.volume(), BOX_LV_ENDO, epsilon = 1e-12);

        let open = mesh.lv_endo(true);
        assert_eq!(open.n_faces(), 10);
        assert!(open.components.iter().all(|c| *c == Component::LvEndocardial));

        let septum = mesh.get_mesh_component(&[Component::RvSeptum], "septum", true);
        assert_eq!(septum.label, "septum");
        assert_eq!(septum.n_faces(), 2);
        assert_eq!(septum.n_nodes(), 4);
        assert!(septum.nodes.iter().all(|p| (p.x - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_fitted_model_round_trip_and_display() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case_model_frame_3.txt");
        let mesh = box_heart(1.1);
        mesh.to_fitted_model(&path, 3).unwrap();

        let loaded = BivMesh::from_fitted_model(&path, "loaded", box_heart_basis()).unwrap();
        assert_eq!(loaded.control_points().len(), BOX_POINT_COUNT);
        assert_relative_eq!(loaded.lv_epi_volume(), mesh.lv_epi_volume(), epsilon = 1e-9);

        let text = loaded.to_string();
        assert!(text.starts_with("<BivMesh> object"));
        assert!(text.contains("Label: loaded"));
        assert!(text.contains(&format!("Control points: ({}, 3)", BOX_POINT_COUNT)));
        assert!(text.contains("THRU_WALL"));
    }

    #[test]
    fn test_arc_length_needs_landmarks() {
        let mesh = box_heart(1.0);
        assert_eq!(
            mesh.long_arc_length("2CH", "LV"),
            Err(BivError::StrainPointsMissing)
        );

        // first LV endo side: (1,0,0) (1,0,2) (1,1,2) (1,1,0)
        let ls = vec![
            StrainPoint { index: 0, view: "2CH".into(), surface: "LV".into() },
            StrainPoint { index: 1, view: "2CH".into(), surface: "LV".into() },
            StrainPoint { index: 2, view: "2CH".into(), surface: "LV".into() },
            StrainPoint { index: 3, view: "4CH".into(), surface: "LV".into() },
        ];
        let cs = vec![
            StrainPoint { index: 1, view: "MID".into(), surface: "LV".into() },
            StrainPoint { index: 3, view: "MID".into(), surface: "LV".into() },
        ];
        let basis = Arc::new(
            (*box_heart_basis()).clone().with_strain_points(ls, cs).unwrap(),
        );
        let mesh = BivMesh::from_control_points(box_heart_control_points(2.0), "strain", basis.clone())
            .unwrap();
        assert_relative_eq!(mesh.long_arc_length("2CH", "LV").unwrap(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.long_arc_length("4CH", "LV").unwrap(), 0.0);
        assert_relative_eq!(
            mesh.circ_arc_length("MID", "LV").unwrap(),
            2.0 * 5.0_f64.sqrt(),
            epsilon = 1e-12
        );

        let empty = BivMesh::empty("none", basis);
        assert!(empty.long_arc_length("2CH", "LV").unwrap().is_nan());
    }

    #[test]
    #[ignore = "requires the packaged biventricular model asset"]
    fn test_packaged_model_topology() {
        let basis = SubdivisionBasis::shared().unwrap();
        assert_eq!(basis.n_nodes(), 5810);
        assert_eq!(basis.n_faces(), 11920);
        assert_eq!(basis.surface_face_count(), 11760);
        assert_eq!(basis.present_components().len(), 14);

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fitted_model.txt");
        let mesh = BivMesh::from_fitted_model(path, "fitted", basis).unwrap();
        assert_eq!(mesh.nodes().len(), 5810);
        assert!(mesh.lv_endo_volume() > 0.0);
        assert!(mesh.lv_mass(MYOCARDIAL_DENSITY) > 0.0);
    }
}

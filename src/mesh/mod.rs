pub mod biv_mesh;
pub mod volume;

pub use biv_mesh::BivMesh;
pub use volume::{ChamberVolumes, MYOCARDIAL_DENSITY};

use crate::model::Component;
use nalgebra::Point3;

/// Triangulated surface restricted to a set of anatomical components.
///
/// Produced by the component accessors of [`BivMesh`]; owns its data.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub label: String,
    pub nodes: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
    pub components: Vec<Component>,
}

impl Mesh {
    pub fn new(
        label: impl Into<String>,
        nodes: Vec<Point3<f64>>,
        faces: Vec<[usize; 3]>,
        components: Vec<Component>,
    ) -> Self {
        Mesh {
            label: label.into(),
            nodes,
            faces,
            components,
        }
    }

    pub fn empty(label: impl Into<String>) -> Self {
        Mesh::new(label, Vec::new(), Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Reverses the winding of every face labelled `component`.
    pub fn flip_component(mut self, component: Component) -> Self {
        for (face, c) in self.faces.iter_mut().zip(&self.components) {
            if *c == component {
                face.swap(1, 2);
            }
        }
        self
    }

    /// Drops nodes not referenced by any face and renumbers the faces.
    pub fn reindexed(self) -> Self {
        let mut mapping: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut nodes = Vec::new();
        let faces = self
            .faces
            .iter()
            .map(|&face| {
                face.map(|i| {
                    *mapping[i].get_or_insert_with(|| {
                        nodes.push(self.nodes[i]);
                        nodes.len() - 1
                    })
                })
            })
            .collect();

        Mesh {
            label: self.label,
            nodes,
            faces,
            components: self.components,
        }
    }

    /// Signed enclosed volume; positive for a closed, outward-wound surface.
    pub fn volume(&self) -> f64 {
        volume::signed_volume(&self.nodes, &self.faces)
    }

    pub fn area(&self) -> f64 {
        volume::surface_area(&self.nodes, &self.faces)
    }
}

#[cfg(test)]
mod mesh_tests {
    use super::*;

    fn two_triangles() -> Mesh {
        Mesh::new(
            "test",
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(9.0, 9.0, 9.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 3], [1, 4, 3]],
            vec![Component::RvSeptum, Component::ThruWall],
        )
    }

    #[test]
    fn test_flip_component_only_touches_labelled_faces() {
        let mesh = two_triangles().flip_component(Component::ThruWall);
        assert_eq!(mesh.faces, vec![[0, 1, 3], [1, 3, 4]]);
    }

    #[test]
    fn test_reindexed_drops_unused_nodes() {
        let mesh = two_triangles().reindexed();
        assert_eq!(mesh.n_nodes(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 3, 2]]);
        assert_eq!(mesh.nodes[2], Point3::new(0.0, 1.0, 0.0));
        assert!((mesh.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mesh_has_zero_volume() {
        let mesh = Mesh::empty("nothing");
        assert!(mesh.is_empty());
        assert_eq!(mesh.volume(), 0.0);
    }
}

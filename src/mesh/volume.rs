use nalgebra::Point3;

/// Assumed myocardial tissue density in g/ml.
pub const MYOCARDIAL_DENSITY: f64 = 1.05;

/// Signed volume enclosed by a closed triangulated surface.
///
/// Sums the signed volumes of the tetrahedra spanned by the origin and each
/// face, `v0 . (v1 x v2) / 6`. Faces wound counter-clockwise when seen from
/// outside give a positive result. Open surfaces give a value that depends on
/// the position of the origin and is not a volume.
pub fn signed_volume(nodes: &[Point3<f64>], faces: &[[usize; 3]]) -> f64 {
    let mut volume = 0.0;
    for &[i0, i1, i2] in faces {
        let v0 = nodes[i0].coords;
        let v1 = nodes[i1].coords;
        let v2 = nodes[i2].coords;
        volume += v0.dot(&v1.cross(&v2));
    }
    volume / 6.0
}

/// Total area of a triangulated surface.
pub fn surface_area(nodes: &[Point3<f64>], faces: &[[usize; 3]]) -> f64 {
    faces
        .iter()
        .map(|&[i0, i1, i2]| {
            let e1 = nodes[i1] - nodes[i0];
            let e2 = nodes[i2] - nodes[i0];
            0.5 * e1.cross(&e2).norm()
        })
        .sum()
}

/// Tissue mass between an epicardial and an endocardial surface.
pub fn myocardial_mass(epi_volume: f64, endo_volume: f64, density: f64) -> f64 {
    density * (epi_volume - endo_volume)
}

/// Enclosed volumes of the four closed chamber surfaces of one mesh.
///
/// All fields are `f64::NAN` for an empty mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChamberVolumes {
    pub lv_endo: f64,
    pub lv_epi: f64,
    pub rv_endo: f64,
    pub rv_epi: f64,
}

impl ChamberVolumes {
    pub fn nan() -> Self {
        ChamberVolumes {
            lv_endo: f64::NAN,
            lv_epi: f64::NAN,
            rv_endo: f64::NAN,
            rv_epi: f64::NAN,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.lv_endo.is_nan()
    }

    pub fn lv_mass(&self, density: f64) -> f64 {
        myocardial_mass(self.lv_epi, self.lv_endo, density)
    }

    pub fn rv_mass(&self, density: f64) -> f64 {
        myocardial_mass(self.rv_epi, self.rv_endo, density)
    }
}

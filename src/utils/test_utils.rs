use crate::io::output::write_fitted_model;
use crate::model::{Component, SubdivisionBasis};

use nalgebra::{DMatrix, Point3};
use std::path::Path;
use std::sync::Arc;

/// Analytic volumes of the box heart.
pub const BOX_LV_ENDO: f64 = 4.0;
pub const BOX_LV_EPI: f64 = 16.0;
pub const BOX_RV_ENDO: f64 = 4.0;
pub const BOX_RV_EPI: f64 = 12.0;

/// Number of control points (and dense nodes) of the box heart.
pub const BOX_POINT_COUNT: usize = 104;

#[derive(Clone, Copy)]
enum Side {
    MinX,
    MaxX,
    MinY,
    MaxY,
    MinZ,
    MaxZ,
}

/// Corners of one side of the box `min..max`, counter-clockwise seen from outside.
fn rect(min: [f64; 3], max: [f64; 3], side: Side) -> [Point3<f64>; 4] {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    let p = Point3::new;
    match side {
        Side::MinX => [p(x0, y0, z0), p(x0, y0, z1), p(x0, y1, z1), p(x0, y1, z0)],
        Side::MaxX => [p(x1, y0, z0), p(x1, y1, z0), p(x1, y1, z1), p(x1, y0, z1)],
        Side::MinY => [p(x0, y0, z0), p(x1, y0, z0), p(x1, y0, z1), p(x0, y0, z1)],
        Side::MaxY => [p(x0, y1, z0), p(x0, y1, z1), p(x1, y1, z1), p(x1, y1, z0)],
        Side::MinZ => [p(x0, y0, z0), p(x0, y1, z0), p(x1, y1, z0), p(x1, y0, z0)],
        Side::MaxZ => [p(x0, y0, z1), p(x1, y0, z1), p(x1, y1, z1), p(x0, y1, z1)],
    }
}

#[derive(Default)]
struct BoxHeart {
    points: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
    components: Vec<Component>,
}

impl BoxHeart {
    fn quad(&mut self, corners: [Point3<f64>; 4], first: Component, second: Component) {
        let n = self.points.len();
        self.points.extend(corners);
        self.faces.push([n, n + 1, n + 2]);
        self.components.push(first);
        self.faces.push([n, n + 2, n + 3]);
        self.components.push(second);
    }

    fn sides(&mut self, min: [f64; 3], max: [f64; 3], sides: &[Side], component: Component) {
        for &side in sides {
            self.quad(rect(min, max, side), component, component);
        }
    }

    /// LV cavity x 1..3, RV cavity x 4..6, LV wall region x 0..4, RV wall
    /// region x 4..7. The septum (x = 4, y 0..1) and the thru-wall strip
    /// (x = 4, y 1..2) separate the two wall regions; valves and cuts close
    /// the top at z = 2.
    fn build() -> Self {
        use Component::*;
        use Side::*;
        let mut heart = BoxHeart::default();

        let (lv_min, lv_max) = ([1.0, 0.0, 0.0], [3.0, 1.0, 2.0]);
        heart.sides(lv_min, lv_max, &[MinX, MaxX, MinY, MaxY, MinZ], LvEndocardial);
        heart.quad(rect(lv_min, lv_max, MaxZ), AortaValve, MitralValve);

        heart.sides([0.0, 0.0, 0.0], [4.0, 2.0, 2.0], &[MinX, MinY, MaxY, MinZ], LvEpicardial);
        heart.quad(rect([0.0, 0.0, 2.0], [1.0, 2.0, 2.0], MaxZ), AortaValveCut, AortaValveCut);
        heart.quad(rect([1.0, 1.0, 2.0], [3.0, 2.0, 2.0], MaxZ), AortaValveCut, AortaValveCut);
        heart.quad(rect([3.0, 0.0, 2.0], [4.0, 2.0, 2.0], MaxZ), MitralValveCut, MitralValveCut);

        // septum faces the RV, thru-wall faces the LV
        heart.quad(rect([4.0, 0.0, 0.0], [4.0, 1.0, 2.0], MaxX), RvSeptum, RvSeptum);
        heart.quad(rect([4.0, 1.0, 0.0], [4.0, 2.0, 2.0], MinX), ThruWall, ThruWall);

        let (rv_min, rv_max) = ([4.0, 0.0, 0.0], [6.0, 1.0, 2.0]);
        heart.sides(rv_min, rv_max, &[MaxX, MinY, MaxY, MinZ], RvFreewall);
        heart.quad(rect(rv_min, rv_max, MaxZ), PulmonaryValve, TricuspidValve);

        heart.sides([4.0, 0.0, 0.0], [7.0, 2.0, 2.0], &[MaxX, MinY, MaxY, MinZ], RvEpicardial);
        heart.quad(rect([6.0, 0.0, 2.0], [7.0, 1.0, 2.0], MaxZ), PulmonaryValveCut, PulmonaryValveCut);
        heart.quad(rect([4.0, 1.0, 2.0], [7.0, 2.0, 2.0], MaxZ), TricuspidValveCut, TricuspidValveCut);

        heart
    }
}

/// Identity basis over the box heart: dense nodes equal the control points.
pub fn box_heart_basis() -> Arc<SubdivisionBasis> {
    let heart = BoxHeart::build();
    let n = heart.points.len();
    Arc::new(
        SubdivisionBasis::new(DMatrix::identity(n, n), heart.faces, heart.components)
            .expect("box heart basis is valid"),
    )
}

/// Control points of the box heart, scaled about the origin.
pub fn box_heart_control_points(scale: f64) -> Vec<Point3<f64>> {
    BoxHeart::build()
        .points
        .into_iter()
        .map(|p| Point3::from(p.coords * scale))
        .collect()
}

/// Volume scale of frame `i` out of `n` for a smooth periodic cycle.
pub fn cycle_scale(i: usize, n: usize) -> f64 {
    let t = i as f64 / n as f64;
    1.0 + 0.15 * (2.0 * std::f64::consts::PI * t).cos()
}

/// Writes `n` fitted-model files named `case_model_frame_<i>.txt` into `dir`,
/// in reverse order so directory order differs from frame order.
pub fn write_box_heart_frames(dir: &Path, n: usize) {
    for i in (0..n).rev() {
        let path = dir.join(format!("case_model_frame_{}.txt", i));
        write_fitted_model(&path, &box_heart_control_points(cycle_scale(i, n)), i as u32)
            .expect("writing test frame");
    }
}

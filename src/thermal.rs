//! Thermal pixel -> CRS affine transform (spec §1, §4.10 expanded).
//!
//! The only sliver of the thermal pipeline in scope per §1: "Georeferencing
//! of thermal pixel detections into a projected CRS is performed by a
//! trivial affine transform and is specified only at the contract level."
//! Grounded on `original_source/pipelines/thermal_crs.py::apply_geotransform`.

use serde::{Deserialize, Serialize};

/// A GDAL-style 6-parameter affine geotransform: `(x0, a, b, y0, d, e)`.
/// `x = x0 + a*col + b*row`, `y = y0 + d*col + e*row`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geotransform {
    pub x0: f64,
    pub a: f64,
    pub b: f64,
    pub y0: f64,
    pub d: f64,
    pub e: f64,
}

/// Apply `gt` to a pixel coordinate, producing `(x, y)` in the target CRS.
pub fn apply_geotransform(gt: Geotransform, col: f64, row: f64) -> (f64, f64) {
    let x = gt.x0 + gt.a * col + gt.b * row;
    let y = gt.y0 + gt.d * col + gt.e * row;
    (x, y)
}

/// One thermal detection still in pixel space.
#[derive(Debug, Clone)]
pub struct PixelDetection {
    pub id: String,
    pub col: f64,
    pub row: f64,
}

/// A thermal detection after georeferencing, ready for the fusion joiner.
#[derive(Debug, Clone)]
pub struct CrsDetection {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Map a batch of pixel-space detections into `(x, y)` in `gt`'s target CRS,
/// mirroring `thermal_crs.py::detections_px_to_crs`.
pub fn detections_px_to_crs(detections: &[PixelDetection], gt: Geotransform) -> Vec<CrsDetection> {
    detections
        .iter()
        .map(|d| {
            let (x, y) = apply_geotransform(gt, d.col, d.row);
            CrsDetection { id: d.id.clone(), x, y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_like_transform_offsets_by_origin() {
        let gt = Geotransform { x0: 100.0, a: 0.5, b: 0.0, y0: 200.0, d: 0.0, e: -0.5 };
        let (x, y) = apply_geotransform(gt, 2.0, 4.0);
        assert_eq!(x, 101.0);
        assert_eq!(y, 198.0);
    }

    #[test]
    fn batch_conversion_preserves_ids() {
        let gt = Geotransform { x0: 0.0, a: 1.0, b: 0.0, y0: 0.0, d: 0.0, e: 1.0 };
        let pixels = vec![
            PixelDetection { id: "t1".into(), col: 1.0, row: 2.0 },
            PixelDetection { id: "t2".into(), col: 3.0, row: 4.0 },
        ];
        let out = detections_px_to_crs(&pixels, gt);
        assert_eq!(out[0].id, "t1");
        assert_eq!((out[0].x, out[0].y), (1.0, 2.0));
        assert_eq!((out[1].x, out[1].y), (3.0, 4.0));
    }
}

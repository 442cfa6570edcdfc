//! AOI (area-of-interest) evaluation (spec §4.7).
//!
//! Ring containment and polygon area are implemented directly rather than
//! via a geometry crate (spec §9) — this mirrors
//! `original_source/pipelines/aoi_eval.py`'s own "no shapely/geopandas"
//! design goal, just swapping `matplotlib.path` for a hand-rolled
//! even-odd ray cast.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crs;
use crate::error::{CoreError, Result};

pub type Ring = Vec<(f64, f64)>;

/// `[outer, hole1, hole2, ...]`, GeoJSON Polygon coordinate ordering.
pub type PolygonRings = Vec<Ring>;

#[derive(Debug, Clone)]
pub enum Geometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

#[derive(Debug, Clone)]
pub struct Aoi {
    pub aoi_id: String,
    pub properties: BTreeMap<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AoiResult {
    pub aoi_id: String,
    pub properties: BTreeMap<String, Value>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_per_ha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_ids: Option<Vec<String>>,
}

/// Even-odd ray cast, matching `matplotlib.path.Path.contains_points`'s
/// boundary convention closely enough for QA/QC counting purposes.
fn ring_contains(ring: &Ring, x: f64, y: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) {
            let x_intersect = xi + (y - yi) * (xj - xi) / (yj - yi);
            if x < x_intersect {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn point_in_polygon(rings: &PolygonRings, x: f64, y: f64) -> Result<bool> {
    let Some(outer) = rings.first() else {
        return Ok(false);
    };
    if outer.len() < 3 {
        return Err(CoreError::validation("InvalidGeometry: ring has fewer than 3 points"));
    }
    if !ring_contains(outer, x, y) {
        return Ok(false);
    }
    for hole in &rings[1..] {
        if hole.len() >= 3 && ring_contains(hole, x, y) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn point_in_geometry(geom: &Geometry, x: f64, y: f64) -> Result<bool> {
    match geom {
        Geometry::Polygon(rings) => point_in_polygon(rings, x, y),
        Geometry::MultiPolygon(polys) => {
            for rings in polys {
                if point_in_polygon(rings, x, y)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Shoelace area of a single ring (unsigned).
fn ring_area(ring: &Ring) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = ring[i];
        let (x2, y2) = ring[(i + 1) % n];
        sum += x1 * y2 - x2 * y1;
    }
    (sum / 2.0).abs()
}

fn polygon_area(rings: &PolygonRings) -> f64 {
    let Some(outer) = rings.first() else {
        return 0.0;
    };
    let mut area = ring_area(outer);
    for hole in &rings[1..] {
        area -= ring_area(hole);
    }
    area.max(0.0)
}

fn geometry_area(geom: &Geometry) -> f64 {
    match geom {
        Geometry::Polygon(rings) => polygon_area(rings),
        Geometry::MultiPolygon(polys) => polys.iter().map(polygon_area).sum(),
    }
}

/// One pooled detection as seen by the AOI evaluator: just an id and an
/// (x, y) in the shared CRS.
pub struct EvalPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Evaluate every AOI against `points`. `lidar_crs`/`aoi_crs` are raw
/// (pre-canonicalization) CRS tags; pass `None` when a source carries none.
/// `emit_detection_ids` mirrors the original's opt-in sorted id list.
pub fn evaluate(
    points: &[EvalPoint],
    aois: &[Aoi],
    lidar_crs: Option<&str>,
    aoi_crs: Option<&str>,
    allow_geographic_crs: bool,
    emit_detection_ids: bool,
) -> Result<Vec<AoiResult>> {
    if aois.is_empty() {
        return Err(CoreError::validation("NoAOIs: AOI feature collection has no polygons"));
    }

    let effective = crs::require_same(lidar_crs, aoi_crs)?;
    let geographic = effective.as_deref().map(crs::is_geographic).unwrap_or(false);
    if geographic && !allow_geographic_crs {
        return Err(CoreError::crs(
            "GeographicCrsNotAllowed: AOI CRS appears geographic (degrees); provide a projected CRS \
or opt in explicitly (area/density will be omitted)",
        ));
    }

    let mut results = Vec::with_capacity(aois.len());
    for aoi in aois {
        let mut matched_ids = Vec::new();
        let mut count = 0usize;
        for p in points {
            if point_in_geometry(&aoi.geometry, p.x, p.y)? {
                count += 1;
                matched_ids.push(p.id.clone());
            }
        }

        let (area_m2, density_per_ha) = if geographic {
            (None, None)
        } else {
            let area = geometry_area(&aoi.geometry);
            let density = if area > 0.0 { Some(count as f64 / (area / 10_000.0)) } else { None };
            (Some(area), density)
        };

        matched_ids.sort();
        results.push(AoiResult {
            aoi_id: aoi.aoi_id.clone(),
            properties: aoi.properties.clone(),
            count,
            area_m2,
            density_per_ha,
            detection_ids: if emit_detection_ids { Some(matched_ids) } else { None },
        });
    }

    results.sort_by(|a, b| a.aoi_id.cmp(&b.aoi_id));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: (f64, f64), max: (f64, f64)) -> Ring {
        vec![(min.0, min.1), (max.0, min.1), (max.0, max.1), (min.0, max.1), (min.0, min.1)]
    }

    fn aoi(id: &str, geom: Geometry) -> Aoi {
        Aoi { aoi_id: id.to_string(), properties: BTreeMap::new(), geometry: geom }
    }

    #[test]
    fn box_aoi_counts_interior_points_scenario_4() {
        let outer = square((0.0, 0.0), (2.0, 2.0));
        let a = aoi("box", Geometry::Polygon(vec![outer]));
        let points = vec![
            EvalPoint { id: "1".into(), x: 0.5, y: 0.5 },
            EvalPoint { id: "2".into(), x: 1.5, y: 1.5 },
            EvalPoint { id: "3".into(), x: 5.0, y: 5.0 },
        ];
        let results = evaluate(&points, &[a], Some("EPSG:32720"), Some("EPSG:32720"), false, false).unwrap();
        assert_eq!(results[0].count, 2);
        assert_eq!(results[0].area_m2, Some(4.0));
        assert_eq!(results[0].density_per_ha, Some(5000.0));
    }

    #[test]
    fn donut_aoi_excludes_hole_scenario_5() {
        let outer = square((0.0, 0.0), (2.0, 2.0));
        let hole = square((0.5, 0.5), (1.5, 1.5));
        let a = aoi("donut", Geometry::Polygon(vec![outer, hole]));
        let points = vec![
            EvalPoint { id: "1".into(), x: 1.0, y: 1.0 },
            EvalPoint { id: "2".into(), x: 0.25, y: 0.25 },
        ];
        let results = evaluate(&points, &[a], None, None, false, false).unwrap();
        assert_eq!(results[0].count, 1);
    }

    #[test]
    fn crs_mismatch_is_rejected_scenario_7() {
        let a = aoi("x", Geometry::Polygon(vec![square((0.0, 0.0), (1.0, 1.0))]));
        let result = evaluate(&[], &[a], Some("EPSG:32720"), Some("EPSG:4326"), true, false);
        assert!(result.is_err());
    }

    #[test]
    fn geographic_crs_without_opt_in_is_rejected() {
        let a = aoi("x", Geometry::Polygon(vec![square((0.0, 0.0), (1.0, 1.0))]));
        let result = evaluate(&[], &[a], Some("EPSG:4326"), Some("EPSG:4326"), false, false);
        assert!(result.is_err());
    }
}

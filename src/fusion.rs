//! Spatial fusion join between LiDAR and thermal detections (spec §4.8).
//!
//! Ground-truthed against `original_source/pipelines/fusion.py::_join_detections`:
//! a single nearest-neighbor query per LiDAR point against a thermal `RTree`,
//! rather than the original's `scipy.spatial.cKDTree`, with the same
//! single-nearest-thermal-wins semantics.

use std::collections::BTreeMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crs;
use crate::error::{CoreError, Result};

/// One pooled detection as seen by the fusion joiner: an id, `(x, y)` in the
/// shared CRS, and whatever extra fields the caller wants echoed back
/// verbatim in the output (mirrors the original's `{**det, ...}` spread).
#[derive(Debug, Clone)]
pub struct FusionPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JoinedLidar {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_thermal_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_dist_m: Option<f64>,
    pub label: &'static str,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JoinedThermal {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub matched_by_lidar: bool,
    pub label: &'static str,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FusionResult {
    pub match_radius_m: f64,
    pub lidar_count: usize,
    pub thermal_count: usize,
    pub lidar_matched_count: usize,
    pub thermal_matched_count: usize,
    pub lidar_only_count: usize,
    pub thermal_only_count: usize,
    pub lidar: Vec<JoinedLidar>,
    pub thermal: Vec<JoinedThermal>,
}

#[derive(Clone, Copy)]
struct IndexedPoint {
    index: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        (self.x - point[0]).powi(2) + (self.y - point[1]).powi(2)
    }
}

/// Join `lidar` against `thermal` within `radius_m`. CRS tags are checked
/// with [`crs::require_same`] before the join runs (§4.8 failure: `CrsMismatch`).
pub fn join(
    lidar: &[FusionPoint],
    thermal: &[FusionPoint],
    lidar_crs: Option<&str>,
    thermal_crs: Option<&str>,
    radius_m: f64,
) -> Result<FusionResult> {
    crs::require_same(lidar_crs, thermal_crs)?;
    if !(radius_m.is_finite() && radius_m > 0.0) {
        return Err(CoreError::validation(format!(
            "match_radius_m must be finite and positive, got {radius_m}"
        )));
    }

    let mut lidar_match: Vec<Option<usize>> = vec![None; lidar.len()];
    let mut lidar_dist: Vec<Option<f64>> = vec![None; lidar.len()];
    let mut thermal_matched = vec![false; thermal.len()];

    if !lidar.is_empty() && !thermal.is_empty() {
        let points: Vec<IndexedPoint> = thermal
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint { index: i, x: p.x, y: p.y })
            .collect();
        let tree = RTree::bulk_load(points);
        let r2 = radius_m * radius_m;

        for (i, p) in lidar.iter().enumerate() {
            if let Some(nearest) = tree.nearest_neighbor(&[p.x, p.y]) {
                let d2 = nearest.distance_2(&[p.x, p.y]);
                if d2 <= r2 {
                    lidar_match[i] = Some(nearest.index);
                    lidar_dist[i] = Some(d2.sqrt());
                    thermal_matched[nearest.index] = true;
                }
            }
        }
    }

    let lidar_matched_count = lidar_match.iter().filter(|m| m.is_some()).count();
    let thermal_matched_count = thermal_matched.iter().filter(|&m| m).count();

    let lidar_out: Vec<JoinedLidar> = lidar
        .iter()
        .enumerate()
        .map(|(i, p)| JoinedLidar {
            id: p.id.clone(),
            x: p.x,
            y: p.y,
            match_thermal_index: lidar_match[i],
            match_dist_m: lidar_dist[i],
            label: if lidar_match[i].is_some() { "both" } else { "lidar_only" },
            extra: p.extra.clone(),
        })
        .collect();

    let thermal_out: Vec<JoinedThermal> = thermal
        .iter()
        .enumerate()
        .map(|(i, p)| JoinedThermal {
            id: p.id.clone(),
            x: p.x,
            y: p.y,
            matched_by_lidar: thermal_matched[i],
            label: if thermal_matched[i] { "both" } else { "thermal_only" },
            extra: p.extra.clone(),
        })
        .collect();

    Ok(FusionResult {
        match_radius_m: radius_m,
        lidar_count: lidar.len(),
        thermal_count: thermal.len(),
        lidar_matched_count,
        thermal_matched_count,
        lidar_only_count: lidar.len() - lidar_matched_count,
        thermal_only_count: thermal.len() - thermal_matched_count,
        lidar: lidar_out,
        thermal: thermal_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(id: &str, x: f64, y: f64) -> FusionPoint {
        FusionPoint { id: id.to_string(), x, y, extra: BTreeMap::new() }
    }

    #[test]
    fn scenario_6_join_counts() {
        let lidar = vec![pt("l1", 0.0, 0.0), pt("l2", 10.0, 0.0), pt("l3", 20.0, 0.0)];
        let thermal = vec![pt("t1", 0.1, 0.0), pt("t2", 10.2, 0.0)];
        let result = join(&lidar, &thermal, None, None, 0.5).unwrap();
        assert_eq!(result.lidar_matched_count, 2);
        assert_eq!(result.thermal_matched_count, 2);
        assert_eq!(result.lidar_only_count, 1);
        assert_eq!(result.thermal_only_count, 0);
        assert!(result.thermal_matched_count + result.thermal_only_count == result.thermal_count);
        assert!(result.lidar_matched_count + result.lidar_only_count == result.lidar_count);
    }

    #[test]
    fn thermal_matched_is_counted_once_even_if_two_lidar_hit_it() {
        let lidar = vec![pt("l1", 0.0, 0.0), pt("l2", 0.05, 0.0)];
        let thermal = vec![pt("t1", 0.0, 0.0)];
        let result = join(&lidar, &thermal, None, None, 0.5).unwrap();
        assert_eq!(result.lidar_matched_count, 2);
        assert_eq!(result.thermal_matched_count, 1);
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let lidar = vec![pt("l1", 0.0, 0.0)];
        let thermal = vec![pt("t1", 0.0, 0.0)];
        let result = join(&lidar, &thermal, Some("EPSG:32720"), Some("EPSG:4326"), 0.5);
        assert!(result.is_err());
    }
}

//! Data model shared across the detector, dedupe, AOI, and fusion stages
//! (spec §3, §6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Ground-surface estimator (§4.3). `Min` is the order-invariant default;
/// `Quantile` tracks an online p05 estimate with `Min` as its fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundMethod {
    Min,
    #[serde(rename = "p05")]
    Quantile,
}

/// Top-surface estimator (§4.4). `Max` is the order-invariant default;
/// `Quantile` tracks an online p95 estimate with `Max` as its fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopMethod {
    Max,
    #[serde(rename = "p95")]
    Quantile,
}

/// Recognized options (§6), serialized verbatim into `summary.params` so the
/// emitted summary always reflects exactly what ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Params {
    pub cell_res: f64,
    pub hag_min: f64,
    pub hag_max: f64,
    pub ground_method: GroundMethod,
    pub top_method: TopMethod,
    pub top_zscore_cap: f64,
    pub quantile_lr: f64,
    pub connectivity: u8,
    pub min_area_cells: u32,
    pub max_area_cells: u32,
    pub se_radius_m: f64,
    pub circularity_min: f64,
    pub solidity_min: f64,
    pub watershed: bool,
    pub h_maxima: f64,
    pub min_split_area_cells: u32,
    pub border_trim_px: u32,
    #[serde(default)]
    pub slope_max_deg: Option<f64>,
    #[serde(default)]
    pub refine_grid_pct: Option<f64>,
    pub refine_size: usize,
    #[serde(default)]
    pub dedupe_radius_m: Option<f64>,
    pub chunk_size: usize,
    pub max_grid_mb: f64,
    /// When the grid-budget check (§5) trips, skip the offending tile
    /// (`skipped: true` in its summary entry, §7 policy) instead of
    /// aborting the whole batch.
    #[serde(default = "default_skip_oversized_tiles")]
    pub skip_oversized_tiles: bool,
}

fn default_skip_oversized_tiles() -> bool {
    true
}

impl Default for Params {
    /// Matches `original_source/pipelines/lidar.py::LidarParams` defaults,
    /// except `ground_method`/`top_method`: see DESIGN.md Open Question
    /// resolution 1 for why this crate defaults to the order-invariant pair.
    fn default() -> Self {
        Params {
            cell_res: 0.25,
            hag_min: 0.2,
            hag_max: 0.6,
            ground_method: GroundMethod::Min,
            top_method: TopMethod::Max,
            top_zscore_cap: 3.0,
            quantile_lr: 0.05,
            connectivity: 2,
            min_area_cells: 2,
            max_area_cells: 80,
            se_radius_m: 0.15,
            circularity_min: 0.2,
            solidity_min: 0.7,
            watershed: false,
            h_maxima: 0.05,
            min_split_area_cells: 12,
            border_trim_px: 0,
            slope_max_deg: None,
            refine_grid_pct: None,
            refine_size: 3,
            dedupe_radius_m: None,
            chunk_size: 1_000_000,
            max_grid_mb: 512.0,
            skip_oversized_tiles: true,
        }
    }
}

impl Params {
    /// `InvalidThresholds` (§4.5): `hag_min >= hag_max` or
    /// `min_area_cells >= max_area_cells`.
    pub fn validate(&self) -> Result<()> {
        if !(self.hag_min < self.hag_max) {
            return Err(CoreError::validation(format!(
                "InvalidThresholds: hag_min ({}) must be < hag_max ({})",
                self.hag_min, self.hag_max
            )));
        }
        if !(self.min_area_cells < self.max_area_cells) {
            return Err(CoreError::validation(format!(
                "InvalidThresholds: min_area_cells ({}) must be < max_area_cells ({})",
                self.min_area_cells, self.max_area_cells
            )));
        }
        if !(self.cell_res.is_finite() && self.cell_res > 0.0) {
            return Err(CoreError::validation("cell_res must be finite and positive"));
        }
        Ok(())
    }

    /// True when the ground surface uses the online-quantile estimator
    /// (costs an extra per-cell surface for the grid-budget check, §5).
    pub fn ground_method_is_quantile(&self) -> bool {
        matches!(self.ground_method, GroundMethod::Quantile)
    }

    /// True when the top surface uses the online-quantile estimator.
    pub fn top_method_is_quantile(&self) -> bool {
        matches!(self.top_method, TopMethod::Quantile)
    }
}

/// One accepted blob (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Detection {
    pub tile: String,
    pub id: String,
    pub file: String,
    pub x: f64,
    pub y: f64,
    pub area_cells: u32,
    pub area_m2: f64,
    pub hag_mean: f64,
    pub hag_max: f64,
    pub circularity: f64,
    pub solidity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_cluster_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_cluster_size: Option<usize>,
}

/// Assign stable `tile:NNNNN` IDs (1-based) after sorting by
/// `(x, y, area_cells)` (invariant I1) — independent of label-scan order.
pub fn assign_stable_ids(tile: &str, mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap()
            .then(a.y.partial_cmp(&b.y).unwrap())
            .then(a.area_cells.cmp(&b.area_cells))
    });
    for (i, det) in detections.iter_mut().enumerate() {
        det.id = format!("{tile}:{:05}", i + 1);
    }
    detections
}

/// Per-tile outcome, carrying the §7 per-tile catch policy (`skipped`,
/// `error`) alongside whatever detections were produced before any failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TileSummary {
    pub file: String,
    pub tile: String,
    pub count: usize,
    pub time_s: f64,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub detections: Vec<Detection>,
}

/// Batch-level LiDAR summary (spec §6 JSON shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Summary {
    pub files: Vec<TileSummary>,
    pub total_count: usize,
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_radius_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count_deduped: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64, area: u32) -> Detection {
        Detection {
            tile: "t".into(),
            id: String::new(),
            file: "t.las".into(),
            x,
            y,
            area_cells: area,
            area_m2: area as f64 * 0.0625,
            hag_mean: 0.3,
            hag_max: 0.4,
            circularity: 0.8,
            solidity: 0.9,
            dedupe_cluster_id: None,
            dedupe_cluster_size: None,
        }
    }

    #[test]
    fn stable_ids_are_order_independent() {
        let a = assign_stable_ids("t", vec![det(2.0, 1.0, 3), det(1.0, 1.0, 5)]);
        let b = assign_stable_ids("t", vec![det(1.0, 1.0, 5), det(2.0, 1.0, 3)]);
        assert_eq!(a[0].x, b[0].x);
        assert_eq!(a[0].id, "t:00001");
        assert_eq!(a[1].id, "t:00002");
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut p = Params::default();
        p.hag_min = p.hag_max;
        assert!(p.validate().is_err());
    }
}

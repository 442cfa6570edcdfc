//! Summary/output JSON read and write (spec §6).
//!
//! The core's stage functions (`tile::process_tiles`, `dedupe::dedupe`,
//! `aoi::evaluate`, `fusion::join`) return plain structs; this module wraps
//! them into the exact JSON document shapes §6 specifies (schema version,
//! embedded contract block, CRS/coord-units, etc.) and writes them
//! atomically via [`super::write_atomic`].

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::aoi::AoiResult;
use crate::contracts::{lidar_candidates_contract, LidarCandidatesContract};
use crate::crs;
use crate::dedupe::DedupeMapEntry;
use crate::detection::{Detection, Summary};
use crate::error::{CoreError, Result};

fn coord_units_for(canonical_crs: Option<&str>) -> &'static str {
    match canonical_crs {
        Some(c) if crs::is_geographic(c) => "degrees",
        _ => "meters",
    }
}

/// Full `lidar_candidates` summary document (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LidarSummaryDocument {
    pub schema_version: &'static str,
    pub purpose: &'static str,
    pub contract: LidarCandidatesContract,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    pub coord_units: &'static str,
    #[serde(flatten)]
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_outputs: Option<Vec<Detection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_index: Option<Vec<DedupeMapEntry>>,
}

/// Build a [`LidarSummaryDocument`] around an already-computed [`Summary`].
/// `raw_crs` is the tile's raw (pre-canonicalization) CRS tag, if known.
pub fn build_lidar_summary(raw_crs: Option<&str>, summary: Summary) -> LidarSummaryDocument {
    let canonical = raw_crs.and_then(crs::canonicalize);
    LidarSummaryDocument {
        schema_version: "1",
        purpose: "lidar_candidates",
        contract: lidar_candidates_contract(),
        coord_units: coord_units_for(canonical.as_deref()),
        crs: canonical,
        summary,
        dedupe_outputs: None,
        dedupe_index: None,
    }
}

/// The `lidar_candidates_deduped` document (§6): representatives only, plus
/// the original-id -> keep-id mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DedupedSummaryDocument {
    pub schema_version: &'static str,
    pub purpose: &'static str,
    pub contract: LidarCandidatesContract,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    pub coord_units: &'static str,
    pub dedupe_radius_m: f64,
    pub total_count_deduped: usize,
    pub detections: Vec<Detection>,
    pub dedupe_index: Vec<DedupeMapEntry>,
}

pub fn build_deduped_summary(
    raw_crs: Option<&str>,
    dedupe_radius_m: f64,
    representatives: Vec<Detection>,
    index: Vec<DedupeMapEntry>,
) -> DedupedSummaryDocument {
    let canonical = raw_crs.and_then(crs::canonicalize);
    DedupedSummaryDocument {
        schema_version: "1",
        purpose: "lidar_candidates_deduped",
        contract: lidar_candidates_contract(),
        coord_units: coord_units_for(canonical.as_deref()),
        crs: canonical,
        dedupe_radius_m,
        total_count_deduped: representatives.len(),
        detections: representatives,
        dedupe_index: index,
    }
}

/// The `lidar_aoi_eval` output document (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AoiOutputDocument {
    pub schema_version: &'static str,
    pub purpose: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lidar_crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aoi_crs: Option<String>,
    pub total_detections: usize,
    pub aoi_count: usize,
    pub results: Vec<AoiResult>,
}

pub fn build_aoi_output(
    lidar_crs: Option<&str>,
    aoi_crs: Option<&str>,
    total_detections: usize,
    results: Vec<AoiResult>,
) -> AoiOutputDocument {
    let canonical_lidar = lidar_crs.and_then(crs::canonicalize);
    let canonical_aoi = aoi_crs.and_then(crs::canonicalize);
    let effective = canonical_lidar.clone().or_else(|| canonical_aoi.clone());
    AoiOutputDocument {
        schema_version: "1",
        purpose: "lidar_aoi_eval",
        crs: effective,
        lidar_crs: canonical_lidar,
        aoi_crs: canonical_aoi,
        total_detections,
        aoi_count: results.len(),
        results,
    }
}

/// Serialize `value` as pretty-printed JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::downstream(format!("serialize JSON: {e}")))?;
    super::write_atomic(path, &contents)
}

/// Read and deserialize a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CoreError::input_at(path, format!("read JSON: {e}")))?;
    serde_json::from_str(&raw).map_err(|e| CoreError::input_at(path, format!("malformed JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::TileSummary;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn summary_document_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        let summary = Summary {
            files: vec![TileSummary {
                file: "a.las".into(),
                tile: "a".into(),
                count: 0,
                time_s: 0.1,
                skipped: false,
                error: None,
                detections: vec![],
            }],
            total_count: 0,
            params: BTreeMap::new(),
            dedupe_radius_m: None,
            total_count_deduped: None,
        };
        let doc = build_lidar_summary(Some("EPSG:32720"), summary);
        write_json(&path, &doc).unwrap();

        let back: LidarSummaryDocument = read_json(&path).unwrap();
        assert_eq!(back.purpose, "lidar_candidates");
        assert_eq!(back.crs.as_deref(), Some("EPSG:32720"));
        assert_eq!(back.coord_units, "meters");
        assert_eq!(back.summary.files.len(), 1);
    }

    #[test]
    fn coord_units_reflect_geographic_crs() {
        let summary = Summary {
            files: vec![],
            total_count: 0,
            params: BTreeMap::new(),
            dedupe_radius_m: None,
            total_count_deduped: None,
        };
        let doc = build_lidar_summary(Some("EPSG:4326"), summary);
        assert_eq!(doc.coord_units, "degrees");
    }
}

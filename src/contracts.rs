//! Fixed semantic-unit contract embedded in every LiDAR summary.
//!
//! Documentation-as-code, not behavior: callers downstream of a summary JSON
//! file can read this block to know exactly what a "detection" does and
//! does not claim to represent, without re-deriving it from the pipeline.

use serde::Serialize;

pub const LIDAR_CANDIDATES_PURPOSE: &str = "lidar_candidates";

pub const LIDAR_CANDIDATES_SEMANTICS: &str = "Each detection is a centroid of a connected-component \
blob in a HAG threshold mask. It is a candidate for review/fusion and is NOT guaranteed to represent \
a single penguin.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LidarCandidatesContract {
    pub schema_version: &'static str,
    pub purpose: &'static str,
    pub semantic_unit: &'static str,
    pub represents: &'static str,
    pub not_guaranteed_to_represent: &'static str,
    pub notes: &'static str,
}

pub fn lidar_candidates_contract() -> LidarCandidatesContract {
    LidarCandidatesContract {
        schema_version: "1",
        purpose: LIDAR_CANDIDATES_PURPOSE,
        semantic_unit: "candidate",
        represents: "blob_centroid",
        not_guaranteed_to_represent: "individual_penguin",
        notes: LIDAR_CANDIDATES_SEMANTICS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_fields_are_stable() {
        let c = lidar_candidates_contract();
        assert_eq!(c.schema_version, "1");
        assert_eq!(c.represents, "blob_centroid");
    }
}

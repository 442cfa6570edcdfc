//! Named parameter profiles (recommendations, not automatic overrides).
//!
//! Preserves `original_source/pipelines/lidar_profiles.py`'s
//! `official_deterministic` profile verbatim, including its historical
//! `ground_method="p05"` choice — which this crate's own `Params::default`
//! deliberately does NOT follow, since `p05` is order-dependent across
//! chunk boundaries (see DESIGN.md Open Question resolution 1). Embedding
//! the original profile here keeps that divergence documented and
//! machine-readable rather than silently dropped.

use serde::Serialize;

use crate::detection::{GroundMethod, TopMethod};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LidarProfile {
    pub name: &'static str,
    pub ground_method: GroundMethod,
    pub top_method: TopMethod,
    pub notes: &'static str,
}

pub const OFFICIAL_DETERMINISTIC: LidarProfile = LidarProfile {
    name: "official_deterministic",
    ground_method: GroundMethod::Quantile,
    top_method: TopMethod::Max,
    notes: "Official/defensible runs prefer deterministic estimators. Use max for top surface \
(deterministic). Treat p95 as experimental until stability across chunking/order is proven.",
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LidarPolicy {
    pub official_profile: &'static str,
    pub official_ground_method: GroundMethod,
    pub official_top_method: TopMethod,
    pub p95_is_experimental: bool,
}

/// Small policy block embeddable in summary outputs, mirroring
/// `lidar_profiles.py::as_policy_dict`.
pub fn policy() -> LidarPolicy {
    LidarPolicy {
        official_profile: OFFICIAL_DETERMINISTIC.name,
        official_ground_method: OFFICIAL_DETERMINISTIC.ground_method,
        official_top_method: OFFICIAL_DETERMINISTIC.top_method,
        p95_is_experimental: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_profile_name_is_preserved() {
        assert_eq!(policy().official_profile, "official_deterministic");
    }
}

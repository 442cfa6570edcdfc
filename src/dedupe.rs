//! Cross-tile de-duplication (spec §4.6).
//!
//! Spatial join is via `rstar::RTree` rather than the original's
//! `scipy.spatial.cKDTree`; the union-find and representative-selection
//! policy follow spec §9 exactly: representatives are chosen by
//! lexicographic minimum of `(file, id, x, y)`, never by the union-find
//! root, so batch ordering never affects identity.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::detection::Detection;

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

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }
    fn find(&mut self, a: usize) -> usize {
        if self.parent[a] != a {
            self.parent[a] = self.find(self.parent[a]);
        }
        self.parent[a]
    }
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// One original-detection-id -> chosen-keep-id mapping entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DedupeMapEntry {
    pub tile: String,
    pub id: String,
    pub keep_id: String,
    pub cluster_id: u64,
    pub dropped: bool,
}

pub struct DedupeResult {
    pub representatives: Vec<Detection>,
    pub index: Vec<DedupeMapEntry>,
}

/// De-duplicate `detections` (pooled across every tile in the batch) within
/// `radius_m`, tagging representatives with `dedupe_cluster_id`/
/// `dedupe_cluster_size` and returning the original-id -> keep-id map.
pub fn dedupe(detections: &[Detection], radius_m: f64) -> DedupeResult {
    if detections.is_empty() {
        return DedupeResult { representatives: Vec::new(), index: Vec::new() };
    }

    let points: Vec<IndexedPoint> = detections
        .iter()
        .enumerate()
        .map(|(i, d)| IndexedPoint { index: i, x: d.x, y: d.y })
        .collect();
    let tree = RTree::bulk_load(points.clone());

    let mut uf = UnionFind::new(detections.len());
    let r2 = radius_m * radius_m;
    for p in &points {
        for other in tree.locate_within_distance([p.x, p.y], r2) {
            if other.index > p.index {
                uf.union(p.index, other.index);
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..detections.len() {
        let root = uf.find(i);
        clusters.entry(root).or_default().push(i);
    }

    let mut representatives = Vec::with_capacity(clusters.len());
    let mut index = Vec::with_capacity(detections.len());

    for (&root, members) in clusters.iter() {
        let rep_idx = *members
            .iter()
            .min_by(|&&a, &&b| {
                let (da, db) = (&detections[a], &detections[b]);
                (&da.file, &da.id, da.x, da.y)
                    .partial_cmp(&(&db.file, &db.id, db.x, db.y))
                    .unwrap()
            })
            .unwrap();

        let mut rep = detections[rep_idx].clone();
        rep.dedupe_cluster_id = Some(root as u64);
        rep.dedupe_cluster_size = Some(members.len());
        let keep_id = rep.id.clone();
        representatives.push(rep);

        for &m in members {
            index.push(DedupeMapEntry {
                tile: detections[m].tile.clone(),
                id: detections[m].id.clone(),
                keep_id: keep_id.clone(),
                cluster_id: root as u64,
                dropped: m != rep_idx,
            });
        }
    }

    representatives.sort_by(|a, b| (&a.file, &a.id).cmp(&(&b.file, &b.id)));
    index.sort_by(|a, b| (&a.tile, &a.id).cmp(&(&b.tile, &b.id)));

    DedupeResult { representatives, index }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(file: &str, id: &str, x: f64, y: f64) -> Detection {
        Detection {
            tile: file.trim_end_matches(".las").to_string(),
            id: id.to_string(),
            file: file.to_string(),
            x,
            y,
            area_cells: 5,
            area_m2: 0.3,
            hag_mean: 0.3,
            hag_max: 0.4,
            circularity: 0.8,
            solidity: 0.9,
            dedupe_cluster_id: None,
            dedupe_cluster_size: None,
        }
    }

    #[test]
    fn close_detections_merge_into_one_cluster() {
        let dets = vec![det("a.las", "a:00001", 0.0, 0.0), det("b.las", "b:00001", 0.05, 0.0)];
        let result = dedupe(&dets, 0.1);
        assert_eq!(result.representatives.len(), 1);
        assert_eq!(result.representatives[0].dedupe_cluster_size, Some(2));
        assert_eq!(result.representatives[0].file, "a.las");
    }

    #[test]
    fn far_detections_stay_separate() {
        let dets = vec![det("a.las", "a:00001", 0.0, 0.0), det("b.las", "b:00001", 50.0, 50.0)];
        let result = dedupe(&dets, 0.1);
        assert_eq!(result.representatives.len(), 2);
    }

    #[test]
    fn representative_choice_is_order_independent() {
        let dets_a = vec![det("b.las", "b:00001", 0.0, 0.0), det("a.las", "a:00001", 0.01, 0.0)];
        let dets_b = vec![det("a.las", "a:00001", 0.01, 0.0), det("b.las", "b:00001", 0.0, 0.0)];
        let ra = dedupe(&dets_a, 0.1);
        let rb = dedupe(&dets_b, 0.1);
        assert_eq!(ra.representatives[0].file, "a.las");
        assert_eq!(rb.representatives[0].file, "a.las");
    }
}

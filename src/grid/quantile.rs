//! Per-cell online quantile tracking (spec §4.2, §9).
//!
//! Samples are grouped by destination cell within a chunk (stable order of
//! first appearance), missing estimates are bootstrapped from the chunk's
//! own min/max for that cell, and the update uses the `frac_below` rule —
//! never a global sort, so this stays linear in the chunk size.

use ahash::AHashMap;
use smallvec::SmallVec;

/// Per-cell running quantile estimate, keyed by flat cell index.
///
/// `NaN` at a given flat index means "no sample has touched this cell yet",
/// matching the original's use of `NaN`-filled arrays as a sentinel.
pub struct CellQuantile {
    pub p: f64,
    pub lr: f64,
    estimates: Vec<f64>,
}

impl CellQuantile {
    pub fn new(num_cells: usize, p: f64, lr: f64) -> Self {
        Self { p, lr, estimates: vec![f64::NAN; num_cells] }
    }

    pub fn estimate(&self, flat_index: usize) -> Option<f64> {
        let v = self.estimates[flat_index];
        if v.is_nan() { None } else { Some(v) }
    }

    pub fn into_values(self) -> Vec<f64> {
        self.estimates
    }

    pub fn values(&self) -> &[f64] {
        &self.estimates
    }

    /// Apply one chunk of `(flat_index, value)` pairs, grouping by cell so
    /// that intra-chunk order never affects the result (spec §4.2).
    pub fn update_chunk(&mut self, flat_indices: &[usize], values: &[f64]) {
        debug_assert_eq!(flat_indices.len(), values.len());

        // Stable grouping: first time a cell is seen in this chunk fixes
        // its bucket's position; order inside the bucket doesn't matter
        // because we only ever compute order-independent aggregates of it.
        let mut order: Vec<usize> = Vec::new();
        let mut buckets: AHashMap<usize, SmallVec<[f64; 8]>> = AHashMap::default();
        for (&idx, &val) in flat_indices.iter().zip(values.iter()) {
            let bucket = buckets.entry(idx).or_insert_with(|| {
                order.push(idx);
                SmallVec::new()
            });
            bucket.push(val);
        }

        for idx in order {
            let bucket = &buckets[&idx];
            if bucket.is_empty() {
                continue;
            }
            let current = self.estimates[idx];
            let init = if current.is_nan() {
                if self.p <= 0.5 {
                    bucket.iter().copied().fold(f64::INFINITY, f64::min)
                } else {
                    bucket.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                }
            } else {
                current
            };

            let below = bucket.iter().filter(|&&v| v <= init).count() as f64;
            let frac_below = below / bucket.len() as f64;
            let updated = init + self.lr * (self.p - frac_below);
            self.estimates[idx] = updated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstraps_from_chunk_extremum() {
        let mut q = CellQuantile::new(1, 0.05, 0.1);
        q.update_chunk(&[0, 0, 0], &[5.0, 1.0, 3.0]);
        // p <= 0.5 bootstraps from the chunk min (1.0), then nudges toward p.
        let v = q.estimate(0).unwrap();
        assert!(v <= 1.0 + 1e-9, "expected estimate near/below chunk min, got {v}");
    }

    #[test]
    fn order_invariant_within_a_chunk() {
        let mut a = CellQuantile::new(1, 0.95, 0.2);
        let mut b = CellQuantile::new(1, 0.95, 0.2);
        a.update_chunk(&[0, 0, 0, 0], &[1.0, 2.0, 9.0, 4.0]);
        b.update_chunk(&[0, 0, 0, 0], &[9.0, 4.0, 1.0, 2.0]);
        assert_eq!(a.values()[0].to_bits(), b.values()[0].to_bits());
    }

    #[test]
    fn out_of_range_index_panics_in_debug() {
        let mut q = CellQuantile::new(1, 0.5, 0.1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            q.update_chunk(&[5], &[1.0]);
        }));
        assert!(result.is_err());
    }
}

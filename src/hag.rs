//! HAG (height-above-ground) pass (spec §4.4).
//!
//! Streams the tile a second time, subtracting the ground DEM from each
//! point's z value and reducing per cell to max (default) or an online p95
//! estimate, then optionally z-score-caps the max surface before clamping
//! to non-negative.

use ndarray::Array2;

use crate::detection::TopMethod;
use crate::error::Result;
use crate::grid::quantile::CellQuantile;
use crate::grid::Grid;
use crate::point_source::PointSource;

/// Build the HAG surface for `grid`, given its already-built ground DEM.
pub fn build_hag_grid(
    source: &dyn PointSource,
    grid: &Grid,
    dem: &Array2<f64>,
    chunk_size: usize,
    method: TopMethod,
    zscore_cap: Option<f64>,
) -> Result<Array2<f64>> {
    let mut hag = Array2::from_elem((grid.ny, grid.nx), 0.0f64);
    let mut quantile = match method {
        TopMethod::Max => None,
        TopMethod::Quantile => Some(CellQuantile::new(grid.len(), 0.95, 0.05)),
    };

    for chunk in source.stream(chunk_size) {
        let (rows, cols, kept) = grid.bin_chunk(&chunk.x, &chunk.y);
        if kept.is_empty() {
            continue;
        }
        let mut flat_indices = Vec::with_capacity(kept.len());
        let mut hag_chunk = Vec::with_capacity(kept.len());
        for (k, (&r, &c)) in rows.iter().zip(cols.iter()).enumerate() {
            let flat = grid.flat_index(r, c)?;
            flat_indices.push(flat);
            hag_chunk.push(chunk.z[kept[k]] - dem[(r, c)]);
        }

        if let Some(q) = quantile.as_mut() {
            q.update_chunk(&flat_indices, &hag_chunk);
        } else {
            for (&flat, &v) in flat_indices.iter().zip(hag_chunk.iter()) {
                let (r, c) = (flat / grid.nx, flat % grid.nx);
                if v > hag[(r, c)] {
                    hag[(r, c)] = v;
                }
            }
        }
    }

    if let Some(q) = quantile {
        let estimates = q.into_values();
        for r in 0..grid.ny {
            for c in 0..grid.nx {
                let flat = r * grid.nx + c;
                let est = estimates[flat];
                if est.is_finite() {
                    hag[(r, c)] = est;
                }
            }
        }
    } else if let Some(cap) = zscore_cap {
        let finite: Vec<f64> = hag.iter().copied().filter(|v| v.is_finite()).collect();
        if !finite.is_empty() {
            let mean = finite.iter().sum::<f64>() / finite.len() as f64;
            let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
            let std = variance.sqrt();
            if std > 0.0 {
                let ceiling = mean + cap * std;
                hag.mapv_inplace(|v| v.clamp(0.0, ceiling));
            }
        }
    }

    hag.mapv_inplace(|v| v.max(0.0));
    Ok(hag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_source::{resolve_bounds, VecPointSource};

    #[test]
    fn hag_is_nonnegative_and_uses_max_by_default() {
        let source = VecPointSource::new(vec![0.1, 0.1], vec![0.1, 0.1], vec![1.0, 4.0]);
        let (bounds, _) = resolve_bounds(&source, 1000);
        let grid = Grid::from_bounds(bounds, 1.0).unwrap();
        let dem = Array2::from_elem((grid.ny, grid.nx), 1.0);
        let hag = build_hag_grid(&source, &grid, &dem, 1000, TopMethod::Max, None).unwrap();
        let (row, col) = grid.bin(0.1, 0.1).unwrap();
        assert_eq!(hag[(row, col)], 3.0);
        assert!(hag.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn zscore_cap_clips_outliers() {
        let source = VecPointSource::new(
            vec![0.1, 1.1, 2.1, 3.1, 4.1],
            vec![0.1, 0.1, 0.1, 0.1, 0.1],
            vec![1.0, 1.0, 1.0, 1.0, 100.0],
        );
        let (bounds, _) = resolve_bounds(&source, 1000);
        let grid = Grid::from_bounds(bounds, 1.0).unwrap();
        let dem = Array2::from_elem((grid.ny, grid.nx), 0.0);
        let hag = build_hag_grid(&source, &grid, &dem, 1000, TopMethod::Max, Some(1.0)).unwrap();
        assert!(hag.iter().cloned().fold(0.0, f64::max) < 100.0);
    }
}

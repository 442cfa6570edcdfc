//! Ground DEM pass (spec §4.3).
//!
//! Streams a tile's points once, reducing each grid cell to its minimum z
//! (the order-invariant default) or, if requested, an online p05 estimate
//! with the min surface kept alongside as its NaN fallback — exactly the
//! original's `build_ground_dem` two-surface layout.

use ndarray::Array2;

use crate::detection::GroundMethod;
use crate::error::Result;
use crate::grid::quantile::CellQuantile;
use crate::grid::Grid;
use crate::morphology::nearest_fill;
use crate::point_source::PointSource;

pub struct GroundDem {
    pub values: Array2<f64>,
    pub global_min_z: Option<f64>,
}

/// Build the ground DEM surface for `grid` from `source`, streaming in
/// chunks of `chunk_size` points.
pub fn build_ground_dem(
    source: &dyn PointSource,
    grid: &Grid,
    chunk_size: usize,
    method: GroundMethod,
    quantile_lr: f64,
) -> Result<GroundDem> {
    let mut dem = Array2::from_elem((grid.ny, grid.nx), f64::INFINITY);
    let mut quantile = match method {
        GroundMethod::Min => None,
        GroundMethod::Quantile => Some(CellQuantile::new(grid.len(), 0.05, quantile_lr)),
    };
    let mut global_min_z: Option<f64> = None;

    for chunk in source.stream(chunk_size) {
        let (rows, cols, kept) = grid.bin_chunk(&chunk.x, &chunk.y);
        if kept.is_empty() {
            continue;
        }
        let z_valid: Vec<f64> = kept.iter().map(|&i| chunk.z[i]).collect();
        let chunk_min = z_valid.iter().copied().fold(f64::INFINITY, f64::min);
        global_min_z = Some(match global_min_z {
            Some(g) => g.min(chunk_min),
            None => chunk_min,
        });

        let mut flat_indices = Vec::with_capacity(kept.len());
        for (&r, &c) in rows.iter().zip(cols.iter()) {
            flat_indices.push(grid.flat_index(r, c)?);
        }

        for (&flat, &z) in flat_indices.iter().zip(z_valid.iter()) {
            let (r, c) = (flat / grid.nx, flat % grid.nx);
            if z < dem[(r, c)] {
                dem[(r, c)] = z;
            }
        }

        if let Some(q) = quantile.as_mut() {
            q.update_chunk(&flat_indices, &z_valid);
        }
    }

    let all_inf = dem.iter().all(|v| !v.is_finite());
    let filled = if all_inf {
        let fallback = global_min_z.unwrap_or(0.0);
        Array2::from_elem((grid.ny, grid.nx), fallback)
    } else {
        let mask = dem.mapv(|v| v.is_finite());
        if mask.iter().all(|&b| b) {
            dem.clone()
        } else {
            nearest_fill(&dem, &mask)
        }
    };

    let ground = match quantile {
        None => filled,
        Some(q) => {
            let estimates = q.into_values();
            let mut out = filled.clone();
            for r in 0..grid.ny {
                for c in 0..grid.nx {
                    let flat = r * grid.nx + c;
                    let est = estimates[flat];
                    if est.is_finite() {
                        out[(r, c)] = est;
                    }
                }
            }
            out
        }
    };

    Ok(GroundDem { values: ground, global_min_z })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_source::{resolve_bounds, VecPointSource};

    #[test]
    fn min_method_reduces_to_lowest_z_per_cell() {
        let source = VecPointSource::new(
            vec![0.1, 0.1, 1.1],
            vec![0.1, 0.1, 1.1],
            vec![5.0, 3.0, 9.0],
        );
        let (bounds, _) = resolve_bounds(&source, 1000);
        let grid = Grid::from_bounds(bounds, 1.0).unwrap();
        let dem = build_ground_dem(&source, &grid, 1000, GroundMethod::Min, 0.1).unwrap();
        let (row, col) = grid.bin(0.1, 0.1).unwrap();
        assert_eq!(dem.values[(row, col)], 3.0);
    }

    #[test]
    fn empty_cells_are_nearest_filled() {
        let source = VecPointSource::new(vec![0.1, 2.9], vec![0.1, 2.9], vec![10.0, 20.0]);
        let (bounds, _) = resolve_bounds(&source, 1000);
        let grid = Grid::from_bounds(bounds, 1.0).unwrap();
        let dem = build_ground_dem(&source, &grid, 1000, GroundMethod::Min, 0.1).unwrap();
        assert!(dem.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn all_empty_falls_back_to_zero() {
        let source = VecPointSource::new(vec![], vec![], vec![]);
        let grid = Grid::from_bounds(None, 1.0).unwrap();
        let dem = build_ground_dem(&source, &grid, 1000, GroundMethod::Min, 0.1).unwrap();
        assert_eq!(dem.values[(0, 0)], 0.0);
        assert_eq!(dem.global_min_z, None);
    }
}

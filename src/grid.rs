//! Regular XY grid shared by the DEM and HAG passes (spec §2 item 2, §3).

pub mod quantile;

use crate::error::{CoreError, Result};
use crate::point_source::Bounds;

/// A tile's regular grid: origin, resolution, and row/column shape.
///
/// Invariant (spec §3): `ny = ceil((max_y - min_y) / R) + 1`, likewise for
/// `nx`; cell `(i, j)` covers `[min_x + j*R, min_x + (j+1)*R) x
/// [min_y + i*R, min_y + (i+1)*R)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub min_x: f64,
    pub min_y: f64,
    pub cell_res: f64,
    pub ny: usize,
    pub nx: usize,
}

impl Grid {
    /// Build a grid from bounds and a cell resolution. Falls back to a 1x1
    /// grid anchored at the origin when `bounds` is `None` (spec §4.1
    /// failure mode: a source with no points).
    pub fn from_bounds(bounds: Option<Bounds>, cell_res: f64) -> Result<Self> {
        if !(cell_res.is_finite() && cell_res > 0.0) {
            return Err(CoreError::validation(format!(
                "cell_res must be finite and positive, got {cell_res}"
            )));
        }
        let Some(b) = bounds else {
            return Ok(Grid { min_x: 0.0, min_y: 0.0, cell_res, ny: 1, nx: 1 });
        };
        if !(b.max_x >= b.min_x && b.max_y >= b.min_y) {
            return Err(CoreError::validation(format!(
                "invalid bounds: min=({}, {}) max=({}, {})",
                b.min_x, b.min_y, b.max_x, b.max_y
            )));
        }
        let nx = ((b.max_x - b.min_x) / cell_res).ceil() as usize + 1;
        let ny = ((b.max_y - b.min_y) / cell_res).ceil() as usize + 1;
        Ok(Grid { min_x: b.min_x, min_y: b.min_y, cell_res, ny: ny.max(1), nx: nx.max(1) })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ny * self.nx
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bin a single point into `(row, col)`, or `None` if it falls outside
    /// the grid (which should not happen for points drawn from the same
    /// bounds the grid was built from, modulo floating-point edge cases at
    /// the extreme max corner).
    #[inline]
    pub fn bin(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.min_x) / self.cell_res).floor();
        let row = ((y - self.min_y) / self.cell_res).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.nx || row >= self.ny {
            return None;
        }
        Some((row, col))
    }

    /// Bin a chunk of points, returning parallel `(row, col)` arrays for the
    /// in-bounds points and, separately, the flat cell index `row*nx+col`
    /// used by the indexed-reduction passes (§4.3/§4.4).
    pub fn bin_chunk(&self, x: &[f64], y: &[f64]) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
        let mut rows = Vec::with_capacity(x.len());
        let mut cols = Vec::with_capacity(x.len());
        let mut kept = Vec::with_capacity(x.len());
        for (i, (&xi, &yi)) in x.iter().zip(y.iter()).enumerate() {
            if let Some((row, col)) = self.bin(xi, yi) {
                rows.push(row);
                cols.push(col);
                kept.push(i);
            }
        }
        (rows, cols, kept)
    }

    /// Flat index for `(row, col)`, validated against grid extent.
    /// Fails with `CellIndexOutOfRange` (spec §4.2) if out of range.
    pub fn flat_index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.ny || col >= self.nx {
            return Err(CoreError::validation(format!(
                "CellIndexOutOfRange: ({row}, {col}) outside {}x{} grid",
                self.ny, self.nx
            )));
        }
        Ok(row * self.nx + col)
    }

    /// Cell-center coordinates for `(row, col)`.
    pub fn cell_center(&self, row: f64, col: f64) -> (f64, f64) {
        (
            self.min_x + (col + 0.5) * self.cell_res,
            self.min_y + (row + 0.5) * self.cell_res,
        )
    }
}

/// Conservative per-cell byte overhead used by the grid-budget check
/// (spec §5, §9 open question: exact constants are a documented heuristic).
///
/// `active_quantile_surfaces` counts how many of {ground, top} are using the
/// online-quantile estimator (each costs one `f32` surface) rather than the
/// order-invariant reduction (`min`/`max`), which reuses the DEM/HAG buffer
/// itself and costs nothing extra.
pub fn estimate_budget_bytes(grid: &Grid, active_quantile_surfaces: usize) -> u64 {
    const DEM_BYTES: u64 = 4;
    const HAG_BYTES: u64 = 4;
    const QUANTILE_BYTES: u64 = 4;
    const MASK_BYTES: u64 = 1;
    const LABEL_BYTES: u64 = 4;
    const SCRATCH_BYTES: u64 = 4;

    let per_cell = DEM_BYTES
        + HAG_BYTES
        + QUANTILE_BYTES * active_quantile_surfaces as u64
        + MASK_BYTES
        + LABEL_BYTES
        + SCRATCH_BYTES;

    per_cell * grid.len() as u64
}

/// Check the estimated grid footprint against a caller-supplied budget in
/// megabytes. Fails with `GridTooLarge` (spec §4.5) when it's exceeded.
pub fn check_budget(grid: &Grid, active_quantile_surfaces: usize, max_mb: f64) -> Result<()> {
    let estimated = estimate_budget_bytes(grid, active_quantile_surfaces);
    let budget = (max_mb.max(0.0) * 1024.0 * 1024.0) as u64;
    if estimated > budget {
        return Err(CoreError::resource(format!(
            "GridTooLarge: estimated {estimated} bytes for a {}x{} grid exceeds budget of {budget} bytes ({max_mb} MB)",
            grid.ny, grid.nx
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_matches_invariant() {
        let bounds = Bounds { min_x: 0.0, min_y: 0.0, min_z: 0.0, max_x: 1.0, max_y: 2.2, max_z: 1.0 };
        let grid = Grid::from_bounds(Some(bounds), 0.5).unwrap();
        assert_eq!(grid.nx, 3); // ceil(1.0/0.5) + 1 = 3
        assert_eq!(grid.ny, 5); // ceil(2.2/0.5) + 1 = 5
    }

    #[test]
    fn empty_source_yields_1x1_grid() {
        let grid = Grid::from_bounds(None, 0.25).unwrap();
        assert_eq!((grid.ny, grid.nx), (1, 1));
    }

    #[test]
    fn degenerate_single_point_bounds_yield_1x1_grid() {
        // A single point's own extent is a zero-width box; the shape
        // invariant then collapses to one cell regardless of resolution
        // (spec §8 scenario 2 — see tests/scenarios.rs for the full
        // streamed-bounds version of this case).
        let bounds = Bounds { min_x: 0.1, min_y: 0.1, min_z: 5.0, max_x: 0.1, max_y: 0.1, max_z: 5.0 };
        let grid = Grid::from_bounds(Some(bounds), 0.25).unwrap();
        assert_eq!((grid.ny, grid.nx), (1, 1));
        assert_eq!(grid.bin(0.1, 0.1), Some((0, 0)));
    }

    #[test]
    fn out_of_range_flat_index_errors() {
        let grid = Grid::from_bounds(None, 1.0).unwrap();
        assert!(grid.flat_index(5, 5).is_err());
    }
}

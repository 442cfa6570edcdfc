//! Per-tile pipeline driver: bounds resolution -> grid -> DEM -> HAG ->
//! extraction -> summary (spec §2, §5, §7), plus tile discovery/de-dup and
//! an optional rayon-parallel multi-tile driver (SPEC_FULL §5 expansion).
//!
//! Grounded on `original_source/scripts/run_lidar_hag.py::process_file` for
//! the per-tile sequence and `::find_lidar_files` for discovery/de-dup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::dem::build_ground_dem;
use crate::detection::{Detection, Params, TileSummary};
use crate::error::{CoreError, Result};
use crate::extractor::extract;
use crate::grid::{check_budget, Grid};
use crate::hag::build_hag_grid;
use crate::point_source::{resolve_bounds, PointSource};

/// One tile's input: a stable stem identifier, the path it came from (for
/// summary/error reporting), and its point source.
pub struct TileInput<'a> {
    pub stem: String,
    pub path: String,
    pub source: &'a dyn PointSource,
}

/// Run the full per-tile pipeline (§2 items 2-6). Returns the tile's
/// summary entry; grid/DEM/HAG are released once this function returns
/// (§5 lifecycle: "live for one tile's processing").
pub fn process_tile(tile: &TileInput, params: &Params, start: std::time::Instant) -> Result<TileSummary> {
    params.validate()?;

    let (bounds, _count) = resolve_bounds(tile.source, params.chunk_size);
    let grid = Grid::from_bounds(bounds, params.cell_res)?;

    let active_quantile_surfaces = [params.ground_method_is_quantile(), params.top_method_is_quantile()]
        .iter()
        .filter(|&&b| b)
        .count();
    check_budget(&grid, active_quantile_surfaces, params.max_grid_mb)?;

    debug!("tile {}: grid {}x{} ({} cells)", tile.stem, grid.ny, grid.nx, grid.len());

    let ground = build_ground_dem(
        tile.source,
        &grid,
        params.chunk_size,
        params.ground_method,
        params.quantile_lr,
    )?;

    let mut hag = build_hag_grid(
        tile.source,
        &grid,
        &ground.values,
        params.chunk_size,
        params.top_method,
        Some(params.top_zscore_cap),
    )?;

    if let Some(pct) = params.refine_grid_pct {
        hag = crate::morphology::percentile_filter(&hag, params.refine_size, pct);
    }

    let (detections, labeled) = extract(&tile.stem, &tile.path, &grid, &hag, &ground.values, params)?;
    debug_assert_eq!(
        labeled.iter().filter(|&&v| v != 0).count(),
        detections.iter().map(|d| d.area_cells as usize).sum::<usize>(),
        "accepted label pixel count must equal the sum of accepted areas (invariant I6/§8)"
    );

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "tile {}: {} detections in {:.2}s (grid {}x{})",
        tile.stem,
        detections.len(),
        elapsed,
        grid.ny,
        grid.nx
    );

    Ok(TileSummary {
        file: tile.path.clone(),
        tile: tile.stem.clone(),
        count: detections.len(),
        time_s: elapsed,
        skipped: false,
        error: None,
        detections,
    })
}

/// Drive every tile in `tiles`, sequentially, catching the per-tile
/// catchable error kinds (§7 propagation policy) and recording them against
/// that tile's summary entry instead of aborting the batch. Any other error
/// kind propagates and aborts.
pub fn process_tiles(tiles: &[TileInput], params: &Params) -> Result<Vec<TileSummary>> {
    let mut summaries = Vec::with_capacity(tiles.len());
    for tile in tiles {
        let start = std::time::Instant::now();
        match process_tile(tile, params, start) {
            Ok(summary) => summaries.push(summary),
            Err(e) if e.is_per_tile_catchable(params.skip_oversized_tiles) => {
                warn!("tile {} skipped: {e}", tile.stem);
                summaries.push(TileSummary {
                    file: tile.path.clone(),
                    tile: tile.stem.clone(),
                    count: 0,
                    time_s: start.elapsed().as_secs_f64(),
                    skipped: true,
                    error: Some(e.to_string()),
                    detections: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summaries)
}

/// Rayon-parallel counterpart to [`process_tiles`] (SPEC_FULL §5). Tiles are
/// still single-threaded *within* themselves (§5); only the across-tile loop
/// is parallelized. Input order is preserved in the output, matching the
/// sequential driver's ordering guarantee (§5: "the summary preserves the
/// tile input order as presented by the caller").
#[cfg(feature = "parallel")]
pub fn process_tiles_parallel(tiles: &[TileInput], params: &Params) -> Result<Vec<TileSummary>> {
    use rayon::prelude::*;

    let results: Vec<Result<TileSummary>> = tiles
        .par_iter()
        .map(|tile| {
            let start = std::time::Instant::now();
            match process_tile(tile, params, start) {
                Ok(summary) => Ok(summary),
                Err(e) if e.is_per_tile_catchable(params.skip_oversized_tiles) => Ok(TileSummary {
                    file: tile.path.clone(),
                    tile: tile.stem.clone(),
                    count: 0,
                    time_s: start.elapsed().as_secs_f64(),
                    skipped: true,
                    error: Some(e.to_string()),
                    detections: Vec::new(),
                }),
                Err(e) => Err(e),
            }
        })
        .collect();

    let mut summaries = Vec::with_capacity(results.len());
    for r in results {
        summaries.push(r?);
    }
    Ok(summaries)
}

/// Pool every accepted detection out of a batch's tile summaries, in tile
/// input order then detection order within each tile.
pub fn pooled_detections(summaries: &[TileSummary]) -> Vec<Detection> {
    summaries.iter().flat_map(|s| s.detections.clone()).collect()
}

fn is_sample_path(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case("sample"))
}

/// Discover `.las`/`.laz` files under `root`, de-duplicating same-named
/// files found in both a `sample/` subdirectory and elsewhere by preferring
/// the non-sample copy (spec SPEC_FULL §4 expansion, grounded on
/// `run_lidar_hag.py::find_lidar_files`). Point-file decoding itself stays
/// out of scope (§1); this only decides *which paths* get handed to a
/// caller's own decoder.
pub fn dedupe_tile_paths(mut files: Vec<PathBuf>) -> Vec<PathBuf> {
    files.sort_by(|a, b| (is_sample_path(a), a).cmp(&(is_sample_path(b), b)));

    let mut filtered: Vec<PathBuf> = Vec::new();
    let mut seen_by_name: HashMap<String, usize> = HashMap::new();

    for path in files {
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match seen_by_name.get(&key) {
            None => {
                seen_by_name.insert(key, filtered.len());
                filtered.push(path);
            }
            Some(&idx) => {
                if is_sample_path(&filtered[idx]) && !is_sample_path(&path) {
                    filtered[idx] = path;
                }
            }
        }
    }
    filtered
}

/// Derive a stable tile stem from a point-file path: the filename without
/// its extension (spec §3: "stable string derived from filename").
pub fn stem_of(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| CoreError::input_at(path, "path has no file stem"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_duplicate_is_replaced_by_non_sample_copy() {
        let files = vec![
            PathBuf::from("data/sample/site_a.las"),
            PathBuf::from("data/full/site_a.las"),
            PathBuf::from("data/full/site_b.las"),
        ];
        let kept = dedupe_tile_paths(files);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|p| p == Path::new("data/full/site_a.las")));
        assert!(!kept.iter().any(|p| p.to_string_lossy().contains("sample")));
    }

    #[test]
    fn sample_only_file_is_kept_when_no_alternative_exists() {
        let files = vec![PathBuf::from("data/sample/only.las")];
        let kept = dedupe_tile_paths(files);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn stem_is_filename_without_extension() {
        let stem = stem_of(Path::new("/a/b/site_001.laz")).unwrap();
        assert_eq!(stem, "site_001");
    }

    #[test]
    fn oversized_tile_is_skipped_or_fatal_per_policy() {
        use crate::point_source::VecPointSource;

        let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let y = x.clone();
        let z = vec![0.0; 100];
        let source = VecPointSource::new(x, y, z);
        let tile = TileInput { stem: "huge".into(), path: "huge.las".into(), source: &source };

        let mut params = Params { cell_res: 0.01, max_grid_mb: 0.0001, ..Params::default() };
        params.skip_oversized_tiles = true;
        let skip_summaries = process_tiles(std::slice::from_ref(&tile), &params).unwrap();
        assert!(skip_summaries[0].skipped);

        params.skip_oversized_tiles = false;
        assert!(process_tiles(std::slice::from_ref(&tile), &params).is_err());
    }
}

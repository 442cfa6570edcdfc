//! Candidate extractor: threshold -> morphology -> labeling -> optional
//! watershed split -> shape filter -> border trim -> stable IDs
//! (spec §4.5, invariants I1-I6).

use ndarray::Array2;

use crate::detection::{assign_stable_ids, Detection, Params};
use crate::error::Result;
use crate::grid::Grid;
use crate::labeling::label;
use crate::morphology::{close, disk, open};
use crate::shape::{measure_region, Bbox};
use crate::watershed::{flood, h_maxima, GlobalLabelCounter};

/// Central-difference slope (degrees) of `dem`, matching
/// `np.gradient(dem, cell_res, cell_res)` followed by
/// `degrees(atan(hypot(gx, gy)))`.
pub fn slope_degrees(dem: &Array2<f64>, cell_res: f64) -> Array2<f64> {
    let (ny, nx) = dem.dim();
    let mut gy = Array2::from_elem((ny, nx), 0.0);
    let mut gx = Array2::from_elem((ny, nx), 0.0);

    for r in 0..ny {
        for c in 0..nx {
            let (r_lo, r_hi) = (r.saturating_sub(1), (r + 1).min(ny - 1));
            let denom_r = (r_hi - r_lo).max(1) as f64 * cell_res;
            gy[(r, c)] = (dem[(r_hi, c)] - dem[(r_lo, c)]) / denom_r;

            let (c_lo, c_hi) = (c.saturating_sub(1), (c + 1).min(nx - 1));
            let denom_c = (c_hi - c_lo).max(1) as f64 * cell_res;
            gx[(r, c)] = (dem[(r, c_hi)] - dem[(r, c_lo)]) / denom_c;
        }
    }

    Array2::from_shape_fn((ny, nx), |(r, c)| {
        gx[(r, c)].hypot(gy[(r, c)]).atan().to_degrees()
    })
}

fn region_pixels(labeled: &Array2<i32>, lbl: i32) -> Vec<(usize, usize)> {
    let mut pixels = Vec::new();
    for ((r, c), &v) in labeled.indexed_iter() {
        if v == lbl {
            pixels.push((r, c));
        }
    }
    pixels
}

/// Run the full extraction pipeline for one tile, returning accepted,
/// stably-IDed detections plus the labeled grid trimmed to only the
/// accepted regions (invariant I6).
pub fn extract(
    tile: &str,
    file: &str,
    grid: &Grid,
    hag: &Array2<f64>,
    dem: &Array2<f64>,
    params: &Params,
) -> Result<(Vec<Detection>, Array2<i32>)> {
    params.validate()?;

    let mask = hag.mapv(|v| v >= params.hag_min && v <= params.hag_max);
    let se_px = ((params.se_radius_m / params.cell_res.max(1e-6)).round() as usize).max(1);
    let se = disk(se_px);
    let mask = open(&mask, &se);
    let mut mask = close(&mask, &se);
    for ((r, c), v) in mask.indexed_iter_mut() {
        *v = *v && hag[(r, c)] >= params.hag_min && hag[(r, c)] <= params.hag_max;
    }

    let (mut labeled, component_count) = label(&mask, params.connectivity);

    if params.watershed && params.min_split_area_cells > 0 && params.h_maxima > 0.0 && component_count > 0 {
        labeled = split_oversized_regions(&labeled, hag, params)?;
    }

    let slope = params.slope_max_deg.map(|_| slope_degrees(dem, params.cell_res));

    let mut accepted = Vec::new();
    let mut keep_labels = std::collections::HashSet::new();
    let max_label = labeled.iter().copied().max().unwrap_or(0);

    for lbl in 1..=max_label {
        let pixels = region_pixels(&labeled, lbl);
        if pixels.is_empty() {
            continue;
        }
        let area = pixels.len() as u32;
        if area < params.min_area_cells || area > params.max_area_cells {
            continue;
        }

        let props = measure_region(&pixels, |r, c| labeled.get((r, c)).copied() == Some(lbl));
        if props.bbox.touches_border((grid.ny, grid.nx), params.border_trim_px as usize) {
            continue;
        }
        if props.bbox.area() == 0 || (props.area as f64 / props.bbox.area() as f64) < 0.10 {
            continue;
        }
        let circularity = props.circularity();
        if circularity < params.circularity_min || props.solidity < params.solidity_min {
            continue;
        }
        if let (Some(slope_max), Some(slope_arr)) = (params.slope_max_deg, slope.as_ref()) {
            let sr = (props.centroid_row.round() as isize).clamp(0, grid.ny as isize - 1) as usize;
            let sc = (props.centroid_col.round() as isize).clamp(0, grid.nx as isize - 1) as usize;
            if slope_arr[(sr, sc)] > slope_max {
                continue;
            }
        }

        let hag_values: Vec<f64> = pixels.iter().map(|&(r, c)| hag[(r, c)]).collect();
        let hag_mean = hag_values.iter().sum::<f64>() / hag_values.len() as f64;
        let hag_max = hag_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let (x, y) = grid.cell_center(props.centroid_row, props.centroid_col);

        keep_labels.insert(lbl);
        accepted.push(Detection {
            tile: tile.to_string(),
            id: String::new(),
            file: file.to_string(),
            x,
            y,
            area_cells: area,
            area_m2: area as f64 * params.cell_res * params.cell_res,
            hag_mean,
            hag_max,
            circularity,
            solidity: props.solidity,
            dedupe_cluster_id: None,
            dedupe_cluster_size: None,
        });
    }

    // Invariant I6: zero any label not in the accepted set.
    labeled.mapv_inplace(|v| if v != 0 && keep_labels.contains(&v) { v } else { 0 });

    Ok((assign_stable_ids(tile, accepted), labeled))
}

fn split_oversized_regions(labeled: &Array2<i32>, hag: &Array2<f64>, params: &Params) -> Result<Array2<i32>> {
    let mut out = labeled.clone();
    let max_label = labeled.iter().copied().max().unwrap_or(0);
    let mut counter = GlobalLabelCounter::starting_at(max_label);

    for lbl in 1..=max_label {
        let pixels = region_pixels(labeled, lbl);
        if pixels.len() < params.min_split_area_cells as usize {
            continue;
        }
        let bbox = Bbox {
            min_row: pixels.iter().map(|p| p.0).min().unwrap(),
            min_col: pixels.iter().map(|p| p.1).min().unwrap(),
            max_row: pixels.iter().map(|p| p.0).max().unwrap() + 1,
            max_col: pixels.iter().map(|p| p.1).max().unwrap() + 1,
        };
        let (sh, sw) = (bbox.max_row - bbox.min_row, bbox.max_col - bbox.min_col);

        let mut sub_hag = Array2::from_elem((sh, sw), 0.0);
        let mut submask = Array2::from_elem((sh, sw), false);
        for &(r, c) in &pixels {
            sub_hag[(r - bbox.min_row, c - bbox.min_col)] = hag[(r, c)];
            submask[(r - bbox.min_row, c - bbox.min_col)] = true;
        }

        let mut maxima = h_maxima(&sub_hag, params.h_maxima);
        for ((r, c), v) in maxima.indexed_iter_mut() {
            *v = *v && submask[(r, c)];
        }
        let (markers, marker_count) = label(&maxima, 2);
        if marker_count < 2 {
            continue;
        }

        let neg_hag = sub_hag.mapv(|v| -v);
        let ws = flood(&neg_hag, &markers, &submask);

        let mut local_to_global: std::collections::HashMap<i32, i32> = std::collections::HashMap::new();
        for &(r, c) in &pixels {
            let local = ws[(r - bbox.min_row, c - bbox.min_col)];
            if local == 0 {
                out[(r, c)] = 0;
                continue;
            }
            let global = *local_to_global.entry(local).or_insert_with(|| counter.next_label());
            out[(r, c)] = global;
        }
    }

    Ok(out)
}

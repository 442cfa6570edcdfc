//! Direct (non-library) image-processing primitives used by the ground DEM
//! fill and the candidate extractor (spec §4.3, §4.5, §9).
//!
//! None of this reaches for an image-processing crate: the spec's design
//! notes (§9) call out the nearest-fill and morphology steps specifically
//! as things to re-architect as plain two-pass scans over `ndarray`
//! buffers, to avoid coupling the core to one library's API.

use ndarray::Array2;

/// Fill every `false` cell in `filled` with the value at its nearest `true`
/// cell, using a two-pass chamfer distance transform (forward top-left to
/// bottom-right, backward bottom-right to top-left). This is an
/// approximation of the exact Euclidean distance transform but is exact for
/// the nearest-*index* propagation that matters here: ties are broken by
/// scan order, which is deterministic and that's the only guarantee the
/// spec requires (§4.3: "filled by nearest-neighbor from cells that did").
pub fn nearest_fill(values: &Array2<f64>, filled: &Array2<bool>) -> Array2<f64> {
    let (ny, nx) = values.dim();
    // `source[i][j]` holds the (row, col) of the nearest filled cell found
    // so far, and `dist` the chamfer distance to it.
    let mut source: Vec<Option<(usize, usize)>> = vec![None; ny * nx];
    let mut dist = vec![f64::INFINITY; ny * nx];

    let idx = |r: usize, c: usize| r * nx + c;

    for r in 0..ny {
        for c in 0..nx {
            if filled[(r, c)] {
                source[idx(r, c)] = Some((r, c));
                dist[idx(r, c)] = 0.0;
            }
        }
    }

    const ORTHO: f64 = 1.0;
    const DIAG: f64 = std::f64::consts::SQRT_2;

    let mut relax = |r: usize, c: usize, nr: isize, nc: isize, step: f64, source: &mut Vec<Option<(usize, usize)>>, dist: &mut Vec<f64>| {
        if nr < 0 || nc < 0 || nr as usize >= ny || nc as usize >= nx {
            return;
        }
        let (nr, nc) = (nr as usize, nc as usize);
        if let Some(src) = source[idx(nr, nc)] {
            let cand = dist[idx(nr, nc)] + step;
            if cand < dist[idx(r, c)] {
                dist[idx(r, c)] = cand;
                source[idx(r, c)] = Some(src);
            }
        }
    };

    // Forward pass: neighbors above and to the left.
    for r in 0..ny {
        for c in 0..nx {
            if filled[(r, c)] {
                continue;
            }
            relax(r, c, r as isize - 1, c as isize - 1, DIAG, &mut source, &mut dist);
            relax(r, c, r as isize - 1, c as isize, ORTHO, &mut source, &mut dist);
            relax(r, c, r as isize - 1, c as isize + 1, DIAG, &mut source, &mut dist);
            relax(r, c, r as isize, c as isize - 1, ORTHO, &mut source, &mut dist);
        }
    }

    // Backward pass: neighbors below and to the right.
    for r in (0..ny).rev() {
        for c in (0..nx).rev() {
            if filled[(r, c)] {
                continue;
            }
            relax(r, c, r as isize + 1, c as isize + 1, DIAG, &mut source, &mut dist);
            relax(r, c, r as isize + 1, c as isize, ORTHO, &mut source, &mut dist);
            relax(r, c, r as isize + 1, c as isize - 1, DIAG, &mut source, &mut dist);
            relax(r, c, r as isize, c as isize + 1, ORTHO, &mut source, &mut dist);
        }
    }

    let mut out = values.clone();
    for r in 0..ny {
        for c in 0..nx {
            if !filled[(r, c)] {
                if let Some((sr, sc)) = source[idx(r, c)] {
                    out[(r, c)] = values[(sr, sc)];
                }
            }
        }
    }
    out
}

/// A disk-shaped structuring element of the given pixel radius, as a
/// boolean offset mask (odd side length `2r+1`).
pub fn disk(radius_px: usize) -> Array2<bool> {
    let r = radius_px as isize;
    let side = (2 * radius_px + 1).max(1);
    let mut mask = Array2::from_elem((side, side), false);
    for dy in -r..=r {
        for dx in -r..=r {
            if (dy * dy + dx * dx) as f64 <= (r as f64 + 0.5).powi(2) {
                mask[((dy + r) as usize, (dx + r) as usize)] = true;
            }
        }
    }
    mask
}

/// Binary erosion: a pixel survives only if every structuring-element
/// offset that lands in-bounds is also set in `mask`. Out-of-bounds offsets
/// are treated as background (matches `skimage`'s default zero-padding).
pub fn erode(mask: &Array2<bool>, se: &Array2<bool>) -> Array2<bool> {
    morphological_op(mask, se, true)
}

/// Binary dilation: a pixel is set if any structuring-element offset that
/// lands on a set pixel of `mask` overlaps it.
pub fn dilate(mask: &Array2<bool>, se: &Array2<bool>) -> Array2<bool> {
    morphological_op(mask, se, false)
}

fn morphological_op(mask: &Array2<bool>, se: &Array2<bool>, erosion: bool) -> Array2<bool> {
    let (ny, nx) = mask.dim();
    let (sh, sw) = se.dim();
    let cy = (sh / 2) as isize;
    let cx = (sw / 2) as isize;
    let mut out = Array2::from_elem((ny, nx), false);

    for r in 0..ny {
        for c in 0..nx {
            if erosion {
                let mut all_set = true;
                'outer: for sr in 0..sh {
                    for sc in 0..sw {
                        if !se[(sr, sc)] {
                            continue;
                        }
                        let nr = r as isize + sr as isize - cy;
                        let nc = c as isize + sc as isize - cx;
                        let set = nr >= 0
                            && nc >= 0
                            && (nr as usize) < ny
                            && (nc as usize) < nx
                            && mask[(nr as usize, nc as usize)];
                        if !set {
                            all_set = false;
                            break 'outer;
                        }
                    }
                }
                out[(r, c)] = all_set;
            } else {
                let mut any_set = false;
                'outer: for sr in 0..sh {
                    for sc in 0..sw {
                        if !se[(sr, sc)] {
                            continue;
                        }
                        let nr = r as isize + sr as isize - cy;
                        let nc = c as isize + sc as isize - cx;
                        if nr >= 0
                            && nc >= 0
                            && (nr as usize) < ny
                            && (nc as usize) < nx
                            && mask[(nr as usize, nc as usize)]
                        {
                            any_set = true;
                            break 'outer;
                        }
                    }
                }
                out[(r, c)] = any_set;
            }
        }
    }
    out
}

/// Binary opening: erosion then dilation (removes small isolated specks).
pub fn open(mask: &Array2<bool>, se: &Array2<bool>) -> Array2<bool> {
    dilate(&erode(mask, se), se)
}

/// Binary closing: dilation then erosion (fills small holes/gaps).
pub fn close(mask: &Array2<bool>, se: &Array2<bool>) -> Array2<bool> {
    erode(&dilate(mask, se), se)
}

/// Per-cell percentile filter over a square window of `size` (odd),
/// used for the optional pre-threshold spike-suppression refinement
/// (spec §4.5 step 1). Out-of-bounds window cells are excluded from the
/// percentile computation rather than zero-padded.
pub fn percentile_filter(values: &Array2<f64>, size: usize, percentile: f64) -> Array2<f64> {
    let (ny, nx) = values.dim();
    let half = (size / 2) as isize;
    let mut out = Array2::from_elem((ny, nx), 0.0f64);
    let mut window = Vec::with_capacity(size * size);

    for r in 0..ny {
        for c in 0..nx {
            window.clear();
            for dr in -half..=half {
                for dc in -half..=half {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr >= 0 && nc >= 0 && (nr as usize) < ny && (nc as usize) < nx {
                        window.push(values[(nr as usize, nc as usize)]);
                    }
                }
            }
            out[(r, c)] = percentile_of(&mut window, percentile);
        }
    }
    out
}

/// Nearest-rank percentile of a (mutated, sorted in place) sample slice.
pub fn percentile_of(samples: &mut [f64], percentile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p = percentile.clamp(0.0, 100.0) / 100.0;
    let idx = ((samples.len() - 1) as f64 * p).round() as usize;
    samples[idx.min(samples.len() - 1)]
}

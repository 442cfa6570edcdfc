//! h-maxima seeded watershed splitting for oversized blobs (spec §4.5 step 5,
//! §9).
//!
//! `original_source/scripts/run_lidar_hag.py` relabels each split region by
//! reading `labeled.max()` again after every prior split, so two regions
//! processed in the same pass can be handed overlapping global ids once
//! enough splits have accumulated. [`GlobalLabelCounter`] is the fix: one
//! counter, threaded by `&mut` through every region considered in a tile's
//! extraction pass, never re-derived from the labeled array.

use std::collections::BinaryHeap;

use ndarray::Array2;

/// Monotonically increasing label source shared across every region split
/// in one tile's extraction pass.
pub struct GlobalLabelCounter {
    next: i32,
}

impl GlobalLabelCounter {
    /// `current_max` is the highest label already present in the tile's
    /// labeled array before any splitting begins.
    pub fn starting_at(current_max: i32) -> Self {
        Self { next: current_max + 1 }
    }

    pub fn next_label(&mut self) -> i32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Morphological reconstruction by dilation of `marker` under `mask`
/// (`marker <= mask` pointwise), via fixed-point 8-neighbor propagation.
fn reconstruct_by_dilation(marker: &Array2<f64>, mask: &Array2<f64>) -> Array2<f64> {
    let (ny, nx) = marker.dim();
    let mut img = marker.clone();
    loop {
        let mut changed = false;
        for r in 0..ny {
            for c in 0..nx {
                let mut best = img[(r, c)];
                for dr in -1isize..=1 {
                    for dc in -1isize..=1 {
                        let nr = r as isize + dr;
                        let nc = c as isize + dc;
                        if nr < 0 || nc < 0 || nr as usize >= ny || nc as usize >= nx {
                            continue;
                        }
                        best = best.max(img[(nr as usize, nc as usize)]);
                    }
                }
                best = best.min(mask[(r, c)]);
                if best > img[(r, c)] {
                    img[(r, c)] = best;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    img
}

/// h-maxima transform: marks pixels belonging to regional maxima of
/// `image` with height `>= h`, following skimage's `h - resolution`
/// correction to avoid marking every plateau when `h` is tiny.
pub fn h_maxima(image: &Array2<f64>, h: f64) -> Array2<bool> {
    let h_corrected = if h > 1e-9 { h - 1e-9 } else { h / 2.0 };
    let shifted = image.mapv(|v| v - h_corrected);
    let reconstructed = reconstruct_by_dilation(&shifted, image);
    let residue = image - &reconstructed;
    residue.mapv(|v| v >= h_corrected)
}

/// Priority-flood (Meyer-style) watershed of `-elevation` seeded from
/// `markers` (nonzero = marker label), restricted to `region_mask`.
/// Returns a same-shape label array (`0` outside the flooded region).
pub fn flood(elevation: &Array2<f64>, markers: &Array2<i32>, region_mask: &Array2<bool>) -> Array2<i32> {
    let (ny, nx) = elevation.dim();
    let mut labels = markers.clone();

    #[derive(PartialEq)]
    struct Entry {
        cost: f64,
        seq: u64,
        r: usize,
        c: usize,
        label: i32,
    }
    impl Eq for Entry {}
    impl Ord for Entry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            // BinaryHeap is a max-heap; invert cost to pop the lowest
            // elevation first, breaking ties by insertion order.
            other
                .cost
                .partial_cmp(&self.cost)
                .unwrap()
                .then(other.seq.cmp(&self.seq))
        }
    }
    impl PartialOrd for Entry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    let push_neighbors = |r: usize, c: usize, label: i32, heap: &mut BinaryHeap<Entry>, seq: &mut u64| {
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = r as isize + dr;
                let nc = c as isize + dc;
                if nr < 0 || nc < 0 || nr as usize >= ny || nc as usize >= nx {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if !region_mask[(nr, nc)] || labels[(nr, nc)] != 0 {
                    continue;
                }
                *seq += 1;
                heap.push(Entry { cost: -elevation[(nr, nc)], seq: *seq, r: nr, c: nc, label });
            }
        }
    };

    for r in 0..ny {
        for c in 0..nx {
            if labels[(r, c)] != 0 {
                push_neighbors(r, c, labels[(r, c)], &mut heap, &mut seq);
            }
        }
    }

    while let Some(entry) = heap.pop() {
        if labels[(entry.r, entry.c)] != 0 {
            continue;
        }
        labels[(entry.r, entry.c)] = entry.label;
        push_neighbors(entry.r, entry.c, entry.label, &mut heap, &mut seq);
    }

    for r in 0..ny {
        for c in 0..nx {
            if !region_mask[(r, c)] {
                labels[(r, c)] = 0;
            }
        }
    }
    labels
}

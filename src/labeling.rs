//! Connected-component labeling over a binary mask (spec §4.5 step 4).
//!
//! Two-pass union-find labeling. `connectivity` of 1 is 4-connected
//! (orthogonal neighbors only), anything else is 8-connected — matching
//! `scipy.ndimage.label`'s `structure` argument semantics, where the
//! original's `connectivity` CLI flag is passed straight through.

use ndarray::Array2;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Label connected `true` regions of `mask`, returning a same-shape array of
/// `i32` labels (`0` = background, `1..=n` = component id) and the number of
/// components found. Labels are assigned in raster scan order of each
/// region's first-seen pixel, giving a deterministic (if arbitrary) id
/// independent of any later processing.
pub fn label(mask: &Array2<bool>, connectivity: u8) -> (Array2<i32>, usize) {
    let (ny, nx) = mask.dim();
    let mut provisional = Array2::from_elem((ny, nx), 0usize);
    let mut uf = UnionFind::new(ny * nx + 1);
    let mut next_id = 1usize;

    let neighbors: &[(isize, isize)] = if connectivity <= 1 {
        &[(-1, 0), (0, -1)]
    } else {
        &[(-1, -1), (-1, 0), (-1, 1), (0, -1)]
    };

    for r in 0..ny {
        for c in 0..nx {
            if !mask[(r, c)] {
                continue;
            }
            let mut labels_here = Vec::new();
            for &(dr, dc) in neighbors {
                let nr = r as isize + dr;
                let nc = c as isize + dc;
                if nr < 0 || nc < 0 || nr as usize >= ny || nc as usize >= nx {
                    continue;
                }
                let lbl = provisional[(nr as usize, nc as usize)];
                if lbl != 0 {
                    labels_here.push(lbl);
                }
            }
            if labels_here.is_empty() {
                provisional[(r, c)] = next_id;
                next_id += 1;
            } else {
                let first = labels_here[0];
                provisional[(r, c)] = first;
                for &other in &labels_here[1..] {
                    uf.union(first, other);
                }
            }
        }
    }

    let mut root_to_final: std::collections::HashMap<usize, i32> = std::collections::HashMap::new();
    let mut out = Array2::from_elem((ny, nx), 0i32);
    let mut count = 0i32;
    for r in 0..ny {
        for c in 0..nx {
            let prov = provisional[(r, c)];
            if prov == 0 {
                continue;
            }
            let root = uf.find(prov);
            let final_label = *root_to_final.entry(root).or_insert_with(|| {
                count += 1;
                count
            });
            out[(r, c)] = final_label;
        }
    }

    (out, count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_diagonal_pixels_merge_under_8_connectivity_only() {
        let mut mask = Array2::from_elem((2, 2), false);
        mask[(0, 0)] = true;
        mask[(1, 1)] = true;

        let (_, n4) = label(&mask, 1);
        assert_eq!(n4, 2);

        let (_, n8) = label(&mask, 2);
        assert_eq!(n8, 1);
    }

    #[test]
    fn label_count_matches_area_sum() {
        let mut mask = Array2::from_elem((4, 4), false);
        for &(r, c) in &[(0, 0), (0, 1), (2, 2), (3, 3)] {
            mask[(r, c)] = true;
        }
        let (labeled, n) = label(&mask, 2);
        assert_eq!(n, 3);
        let nonzero = labeled.iter().filter(|&&v| v != 0).count();
        let true_count = mask.iter().filter(|&&v| v).count();
        assert_eq!(nonzero, true_count);
    }
}

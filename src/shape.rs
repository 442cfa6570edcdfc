//! Region property measurements used by the shape filter (spec §4.5 step 6).
//!
//! Pixel coordinates throughout are `(row, col)` as `f64` so centroid and
//! hull computations stay in the same units as the grid.

/// Axis-aligned pixel bounding box, half-open on the high end
/// (`[min_row, max_row) x [min_col, max_col)`), matching
/// `skimage.measure.regionprops`'s `bbox` convention.
#[derive(Debug, Clone, Copy)]
pub struct Bbox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl Bbox {
    pub fn area(&self) -> usize {
        (self.max_row - self.min_row) * (self.max_col - self.min_col)
    }

    pub fn touches_border(&self, shape: (usize, usize), trim_px: usize) -> bool {
        if trim_px == 0 {
            return false;
        }
        self.min_row <= trim_px
            || self.min_col <= trim_px
            || (shape.0 - self.max_row) <= trim_px
            || (shape.1 - self.max_col) <= trim_px
    }
}

/// Measurements for one connected region, computed directly from its member
/// pixel coordinates rather than a general image-processing crate (spec §9).
pub struct RegionProps {
    pub area: usize,
    pub bbox: Bbox,
    pub centroid_row: f64,
    pub centroid_col: f64,
    pub perimeter: f64,
    pub solidity: f64,
}

impl RegionProps {
    pub fn circularity(&self) -> f64 {
        let perim = self.perimeter.max(1e-6);
        4.0 * std::f64::consts::PI * self.area as f64 / (perim * perim)
    }
}

/// Compute region properties for the pixels in `pixels` (row, col pairs),
/// given the full mask `present(row, col)` used to count boundary edges.
pub fn measure_region(pixels: &[(usize, usize)], present: impl Fn(usize, usize) -> bool) -> RegionProps {
    let area = pixels.len();
    let (mut min_row, mut min_col) = (usize::MAX, usize::MAX);
    let (mut max_row, mut max_col) = (0usize, 0usize);
    let mut sum_row = 0.0;
    let mut sum_col = 0.0;
    let mut perimeter = 0.0;

    for &(r, c) in pixels {
        min_row = min_row.min(r);
        min_col = min_col.min(c);
        max_row = max_row.max(r + 1);
        max_col = max_col.max(c + 1);
        sum_row += r as f64;
        sum_col += c as f64;

        for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let nr = r as isize + dr;
            let nc = c as isize + dc;
            let neighbor_in_region = nr >= 0 && nc >= 0 && present(nr as usize, nc as usize);
            if !neighbor_in_region {
                perimeter += 1.0;
            }
        }
    }

    let bbox = Bbox { min_row, min_col, max_row, max_col };
    let hull_area = convex_hull_area(pixels);
    let solidity = if hull_area > 0.0 { area as f64 / hull_area } else { 1.0 };

    RegionProps {
        area,
        bbox,
        centroid_row: sum_row / area as f64,
        centroid_col: sum_col / area as f64,
        perimeter,
        solidity: solidity.min(1.0),
    }
}

/// Area of the convex hull of a region, in the same units as a pixel
/// count (i.e. one full pixel = area 1), via Andrew's monotone chain hull
/// construction and the Shoelace formula.
///
/// Each pixel is treated as a unit square (its four corners), not as a
/// point at its center — hulling over centers alone systematically
/// undercounts area relative to `area_cells` (a single pixel's point-hull
/// has zero area), which previously made `solidity = area / hull_area`
/// come out ≥ 1 for essentially every compact blob. This mirrors
/// `skimage.measure.regionprops`'s `convex_area`, which rasterizes the
/// hull back onto the pixel grid rather than measuring a point-set hull.
pub fn convex_hull_area(pixels: &[(usize, usize)]) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    let mut pts: Vec<(f64, f64)> = Vec::with_capacity(pixels.len() * 4);
    for &(r, c) in pixels {
        let (r, c) = (r as f64, c as f64);
        pts.push((c, r));
        pts.push((c + 1.0, r));
        pts.push((c, r + 1.0));
        pts.push((c + 1.0, r + 1.0));
    }
    pts.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.partial_cmp(&b.1).unwrap()));
    pts.dedup();
    if pts.len() < 3 {
        return 0.0;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    let hull = [lower, upper].concat();
    if hull.len() < 3 {
        return 0.0;
    }

    let mut area2 = 0.0;
    for i in 0..hull.len() {
        let (x1, y1) = hull[i];
        let (x2, y2) = hull[(i + 1) % hull.len()];
        area2 += x1 * y2 - x2 * y1;
    }
    (area2 / 2.0).abs()
}

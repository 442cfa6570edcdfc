//! The streaming point source contract (spec §4.1, §6).
//!
//! Point-file decoding itself is out of scope (§1): this trait is the seam
//! a caller's LAS/LAZ/COPC reader (or any other decoder) plugs into. A
//! `PointSource` need only produce chunks of aligned `(x, y, z)` and, if it
//! can, cheap header bounds — everything downstream tolerates a missing or
//! degenerate header by falling back to a single streaming prepass.

/// One streamed chunk of points, as parallel coordinate arrays.
#[derive(Debug, Clone, Default)]
pub struct PointChunk {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl PointChunk {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Axis-aligned XY(Z) bounds, as reported by a point file's header or
/// recomputed by a streaming prepass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Bounds {
    /// A header is degenerate when any axis has `max <= min`, or when any
    /// value is non-finite — both trigger the streaming prepass (§4.1).
    pub fn is_degenerate(&self) -> bool {
        !(self.max_x > self.min_x && self.max_y > self.min_y)
            || ![self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z]
                .iter()
                .all(|v| v.is_finite())
    }
}

/// A lazy, chunked source of `(x, y, z)` points in a known projected CRS.
pub trait PointSource {
    /// Header-reported bounds and point count, if the header carries them.
    /// `None`/degenerate bounds or a zero count trigger the §4.1 prepass.
    fn header_bounds(&self) -> Option<Bounds>;
    fn header_count(&self) -> Option<usize>;

    /// Stream the points in chunks of at most `chunk_size` points each.
    fn stream(&self, chunk_size: usize) -> Box<dyn Iterator<Item = PointChunk> + '_>;
}

/// An in-memory point source, primarily for tests and small tiles.
pub struct VecPointSource {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub declared_bounds: Option<Bounds>,
}

impl VecPointSource {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len());
        assert_eq!(x.len(), z.len());
        Self { x, y, z, declared_bounds: None }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.declared_bounds = Some(bounds);
        self
    }
}

impl PointSource for VecPointSource {
    fn header_bounds(&self) -> Option<Bounds> {
        self.declared_bounds
    }

    fn header_count(&self) -> Option<usize> {
        Some(self.x.len())
    }

    fn stream(&self, chunk_size: usize) -> Box<dyn Iterator<Item = PointChunk> + '_> {
        let chunk_size = chunk_size.max(1);
        let total = self.x.len();
        Box::new((0..total).step_by(chunk_size).map(move |start| {
            let end = (start + chunk_size).min(total);
            PointChunk {
                x: self.x[start..end].to_vec(),
                y: self.y[start..end].to_vec(),
                z: self.z[start..end].to_vec(),
            }
        }))
    }
}

/// Compute bounds and point count by exhausting a full streaming pass.
/// Used when a source's header is missing, degenerate, or reports zero
/// points (§4.1); the result is cached by the caller so this never runs
/// twice for the same tile.
pub fn stream_bounds(source: &dyn PointSource, chunk_size: usize) -> (Option<Bounds>, usize) {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    let mut count = 0usize;

    for chunk in source.stream(chunk_size) {
        count += chunk.len();
        for i in 0..chunk.len() {
            let (x, y, z) = (chunk.x[i], chunk.y[i], chunk.z[i]);
            min[0] = min[0].min(x);
            min[1] = min[1].min(y);
            min[2] = min[2].min(z);
            max[0] = max[0].max(x);
            max[1] = max[1].max(y);
            max[2] = max[2].max(z);
        }
    }

    if count == 0 || !min.iter().all(|v| v.is_finite()) {
        return (None, count);
    }

    (
        Some(Bounds {
            min_x: min[0],
            min_y: min[1],
            min_z: min[2],
            max_x: max[0],
            max_y: max[1],
            max_z: max[2],
        }),
        count,
    )
}

/// Resolve the authoritative bounds and point count for a source,
/// triggering the streaming prepass at most once per tile (§4.1).
pub fn resolve_bounds(source: &dyn PointSource, chunk_size: usize) -> (Option<Bounds>, usize) {
    match (source.header_bounds(), source.header_count()) {
        (Some(b), Some(n)) if !b.is_degenerate() && n > 0 => (Some(b), n),
        _ => stream_bounds(source, chunk_size),
    }
}

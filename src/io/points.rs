//! A minimal text point-file reader used by the CLI binary.
//!
//! Point-file decoding is explicitly out of scope for the core (spec §1):
//! the core only depends on the [`crate::point_source::PointSource`] trait.
//! This is NOT a LAS/LAZ/COPC reader — it is the simplest concrete decoder
//! that lets the `lidar` CLI subcommand run end to end against a plain text
//! file of whitespace- or comma-separated `x y z` rows, one point per line.
//! A real deployment plugs in its own decoder against the same trait.
//!
//! An optional leading `# bounds: min_x min_y min_z max_x max_y max_z count`
//! comment line supplies header bounds; without it every tile falls through
//! to the §4.1 streaming prepass, which is exactly the degenerate-header
//! path the core is required to handle.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::point_source::{Bounds, PointChunk, PointSource};

pub struct TextPointSource {
    path: PathBuf,
    header_bounds: Option<Bounds>,
    header_count: Option<usize>,
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()).collect()
}

fn parse_header(line: &str) -> Option<(Bounds, usize)> {
    let rest = line.trim().strip_prefix('#')?.trim().strip_prefix("bounds:")?;
    let fields = split_fields(rest);
    if fields.len() != 7 {
        return None;
    }
    let nums: Vec<f64> = fields.iter().filter_map(|f| f.parse::<f64>().ok()).collect();
    if nums.len() != 7 {
        return None;
    }
    let bounds = Bounds {
        min_x: nums[0],
        min_y: nums[1],
        min_z: nums[2],
        max_x: nums[3],
        max_y: nums[4],
        max_z: nums[5],
    };
    Some((bounds, nums[6] as usize))
}

impl TextPointSource {
    /// Open `path`, sniffing an optional `# bounds: ...` header line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)
            .map_err(|e| CoreError::input_at(&path, format!("open point file: {e}")))?;
        let mut reader = BufReader::new(file);
        let mut first_line = String::new();
        let mut header = None;
        if reader.read_line(&mut first_line).unwrap_or(0) > 0 {
            header = parse_header(&first_line);
        }
        let (header_bounds, header_count) = match header {
            Some((b, n)) => (Some(b), Some(n)),
            None => (None, None),
        };
        Ok(Self { path, header_bounds, header_count })
    }
}

impl PointSource for TextPointSource {
    fn header_bounds(&self) -> Option<Bounds> {
        self.header_bounds
    }

    fn header_count(&self) -> Option<usize> {
        self.header_count
    }

    fn stream(&self, chunk_size: usize) -> Box<dyn Iterator<Item = PointChunk> + '_> {
        Box::new(TextChunks::new(&self.path, chunk_size.max(1)))
    }
}

struct TextChunks {
    lines: std::io::Lines<BufReader<File>>,
    chunk_size: usize,
}

impl TextChunks {
    fn new(path: &Path, chunk_size: usize) -> Self {
        let file = File::open(path).expect("point file existed at TextPointSource::open time");
        let lines = BufReader::new(file).lines();
        // No need to special-case the optional `# bounds:` line here:
        // `next()` already skips any line starting with `#`, header or not.
        Self { lines, chunk_size }
    }
}

impl Iterator for TextChunks {
    type Item = PointChunk;

    fn next(&mut self) -> Option<PointChunk> {
        let mut chunk = PointChunk::default();
        for line in self.lines.by_ref() {
            let Ok(line) = line else { continue };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields = split_fields(trimmed);
            if fields.len() < 3 {
                continue;
            }
            let (Ok(x), Ok(y), Ok(z)) = (fields[0].parse::<f64>(), fields[1].parse::<f64>(), fields[2].parse::<f64>())
            else {
                continue;
            };
            chunk.x.push(x);
            chunk.y.push(y);
            chunk.z.push(z);
            if chunk.len() >= self.chunk_size {
                return Some(chunk);
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

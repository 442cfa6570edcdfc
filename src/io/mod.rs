//! Output/input adapters around the detection core (SPEC_FULL §6 ambient
//! stack): summary JSON, AOI GeoJSON, detections CSV, and JSON/TOML
//! parameter files. None of this is part of the specified core algorithms;
//! it is the thin I/O surface the CLI binary (and any other caller) uses to
//! turn the core's typed results into files on disk.

pub mod config;
pub mod csv;
pub mod geojson;
pub mod json;
pub mod points;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Write `contents` to `path` via a temp-file-then-rename, the same
/// atomic-write shape as the teacher's `src/io.rs::open_for_big_write` /
/// `finalize_big_write`, scaled down for the small JSON/CSV/GeoJSON files
/// this crate emits (no need for the teacher's chunked `Seek` wrapper).
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| CoreError::downstream(format!("create dir {}: {e}", dir.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| CoreError::downstream(format!("create temp file in {}: {e}", dir.display())))?;
    tmp.write_all(contents)
        .map_err(|e| CoreError::downstream(format!("write {}: {e}", path.display())))?;
    tmp.as_file().sync_all().ok();
    tmp.persist(path)
        .map_err(|e| CoreError::downstream(format!("rename to {}: {e}", path.display())))?;
    Ok(())
}

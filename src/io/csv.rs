//! Aggregated detections CSV export (SPEC_FULL §4 expansion, grounded on
//! `original_source/scripts/run_lidar_hag.py`'s `--emit-csv` flat row shape).
//!
//! Hand-rolled rather than via a CSV crate: the row shape is fixed and small
//! (eleven columns, no nested/variable-width data), the same "direct
//! implementation over a dependency" call the AOI/geometry modules make
//! per spec §9.

use std::path::Path;

use crate::detection::Detection;
use crate::error::Result;

const HEADER: &str = "tile,id,file,x,y,area_cells,area_m2,hag_mean,hag_max,circularity,solidity";

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn row_for(d: &Detection) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        csv_field(&d.tile),
        csv_field(&d.id),
        csv_field(&d.file),
        d.x,
        d.y,
        d.area_cells,
        d.area_m2,
        d.hag_mean,
        d.hag_max,
        d.circularity,
        d.solidity,
    )
}

/// Write `detections` as a flat CSV file with a header row, one row per
/// detection, sorted the way they were passed in (callers that want a
/// particular order — e.g. stable-id order — should sort before calling).
pub fn write_detections(path: &Path, detections: &[Detection]) -> Result<()> {
    let mut out = String::with_capacity(HEADER.len() + detections.len() * 64);
    out.push_str(HEADER);
    out.push('\n');
    for d in detections {
        out.push_str(&row_for(d));
        out.push('\n');
    }
    super::write_atomic(path, out.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn det() -> Detection {
        Detection {
            tile: "site_a".into(),
            id: "site_a:00001".into(),
            file: "site_a.las".into(),
            x: 1.0,
            y: 2.0,
            area_cells: 4,
            area_m2: 0.25,
            hag_mean: 0.3,
            hag_max: 0.4,
            circularity: 0.8,
            solidity: 0.9,
            dedupe_cluster_id: None,
            dedupe_cluster_size: None,
        }
    }

    #[test]
    fn writes_header_and_one_row_per_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_detections(&path, &[det(), det()]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("site_a,site_a:00001,site_a.las,1,2,4,0.25"));
    }

    #[test]
    fn quotes_fields_with_commas() {
        let mut d = det();
        d.file = "path/with,comma.las".into();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_detections(&path, &[d]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"path/with,comma.las\""));
    }
}

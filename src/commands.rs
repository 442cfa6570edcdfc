//! CLI subcommand implementations (SPEC_FULL §1 ambient stack).
//!
//! Converts `CoreError` to `anyhow::Error` at this boundary, matching the
//! teacher's `src/commands.rs`/`src/pack.rs` convention of keeping typed
//! errors internal to the library and using `anyhow` only once control
//! reaches the binary.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aoi::EvalPoint;
use crate::cli::{AoiArgs, DedupeArgs, FuseArgs, LidarArgs};
use crate::detection::{Detection, Params, Summary};
use crate::fusion::FusionPoint;
use crate::io;
use crate::io::points::TextPointSource;
use crate::tile::{self, TileInput};

fn params_as_map(params: &Params) -> Result<BTreeMap<String, Value>> {
    let value = serde_json::to_value(params).context("serialize params")?;
    let Value::Object(map) = value else {
        anyhow::bail!("Params did not serialize to a JSON object");
    };
    Ok(map.into_iter().collect())
}

/// Expand directory arguments into their contained files (recursively) and
/// pass every file argument straight through, then apply the same
/// sample/non-sample de-duplication a batch run over a directory tree needs
/// (`tile::dedupe_tile_paths`, grounded on `run_lidar_hag.py::find_lidar_files`).
fn discover_point_files(inputs: &[std::path::PathBuf]) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    for path in inputs {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    tile::dedupe_tile_paths(files)
}

pub fn lidar(args: &LidarArgs) -> Result<()> {
    let mut params = match &args.params {
        Some(path) => io::config::load_params(path).context("load params file")?,
        None => Params::default(),
    };
    params.validate().context("validate params")?;
    if let Some(dedupe_radius_m) = args.dedupe_radius_m {
        params.dedupe_radius_m = Some(dedupe_radius_m);
    }

    let files = discover_point_files(&args.files);
    let mut sources = Vec::with_capacity(files.len());
    for path in &files {
        let stem = tile::stem_of(path)?;
        let source = TextPointSource::open(path)
            .with_context(|| format!("open point file {}", path.display()))?;
        sources.push((stem, path.to_string_lossy().into_owned(), source));
    }

    let inputs: Vec<TileInput> = sources
        .iter()
        .map(|(stem, path, source)| TileInput { stem: stem.clone(), path: path.clone(), source })
        .collect();

    info!("processing {} tile(s)", inputs.len());
    #[cfg(feature = "parallel")]
    let summaries = if args.parallel {
        tile::process_tiles_parallel(&inputs, &params)?
    } else {
        tile::process_tiles(&inputs, &params)?
    };
    #[cfg(not(feature = "parallel"))]
    let summaries = tile::process_tiles(&inputs, &params)?;

    if let Some(dir) = &args.emit_geojson_dir {
        for s in &summaries {
            let path = dir.join(format!("{}.geojson", s.tile));
            io::geojson::write_detections(&path, &s.detections)
                .with_context(|| format!("write geojson for tile {}", s.tile))?;
        }
    }

    let pooled = tile::pooled_detections(&summaries);
    if let Some(csv_path) = &args.emit_csv {
        io::csv::write_detections(csv_path, &pooled).context("write detections csv")?;
    }

    let total_count: usize = summaries.iter().map(|s| s.count).sum();
    let mut summary = Summary {
        files: summaries,
        total_count,
        params: params_as_map(&params)?,
        dedupe_radius_m: None,
        total_count_deduped: None,
    };

    let mut doc = io::json::build_lidar_summary(args.crs.as_deref(), summary.clone());
    if let Some(radius) = params.dedupe_radius_m {
        let result = crate::dedupe::dedupe(&pooled, radius);
        summary.dedupe_radius_m = Some(radius);
        summary.total_count_deduped = Some(result.representatives.len());
        doc.summary = summary;
        doc.dedupe_outputs = Some(result.representatives);
        doc.dedupe_index = Some(result.index);
    }

    io::json::write_json(&args.output, &doc).context("write lidar summary")?;
    info!("wrote {} total detection(s) to {}", total_count, args.output.display());
    Ok(())
}

/// A summary document read back generically: either the full per-tile shape
/// (`files[].detections`) or the deduped shape (`detections`), distinguished
/// by which key is present. Both always carry `crs`.
fn load_pooled_detections(path: &Path) -> Result<(Vec<Detection>, Option<String>)> {
    let doc: Value = io::json::read_json(path)?;
    let crs = doc.get("crs").and_then(Value::as_str).map(str::to_string);

    if let Some(files) = doc.get("files").and_then(Value::as_array) {
        let mut pooled = Vec::new();
        for file in files {
            if let Some(detections) = file.get("detections").and_then(Value::as_array) {
                for d in detections {
                    pooled.push(serde_json::from_value(d.clone()).context("parse detection")?);
                }
            }
        }
        return Ok((pooled, crs));
    }

    if let Some(detections) = doc.get("detections").and_then(Value::as_array) {
        let pooled = detections
            .iter()
            .map(|d| serde_json::from_value(d.clone()).context("parse detection"))
            .collect::<Result<Vec<Detection>>>()?;
        return Ok((pooled, crs));
    }

    anyhow::bail!("{}: summary JSON has neither 'files' nor 'detections'", path.display())
}

pub fn dedupe(args: &DedupeArgs) -> Result<()> {
    let (pooled, crs) = load_pooled_detections(&args.summary)?;
    info!("de-duplicating {} pooled detection(s) within {}m", pooled.len(), args.radius_m);
    let result = crate::dedupe::dedupe(&pooled, args.radius_m);
    let doc = io::json::build_deduped_summary(
        crs.as_deref(),
        args.radius_m,
        result.representatives,
        result.index,
    );
    io::json::write_json(&args.output, &doc).context("write deduped summary")?;
    info!("kept {} representative(s)", doc.total_count_deduped);
    Ok(())
}

pub fn aoi(args: &AoiArgs) -> Result<()> {
    let (pooled, lidar_crs) = load_pooled_detections(&args.summary)?;
    let aois = io::geojson::read_aois(&args.aois)?;
    let aoi_crs = args.aoi_crs.clone().or_else(|| lidar_crs.clone());

    let points: Vec<EvalPoint> =
        pooled.iter().map(|d| EvalPoint { id: d.id.clone(), x: d.x, y: d.y }).collect();

    let results = crate::aoi::evaluate(
        &points,
        &aois,
        lidar_crs.as_deref(),
        aoi_crs.as_deref(),
        args.allow_geographic_crs,
        args.emit_detection_ids,
    )?;

    let doc = io::json::build_aoi_output(lidar_crs.as_deref(), aoi_crs.as_deref(), pooled.len(), results);
    io::json::write_json(&args.output, &doc).context("write aoi output")?;
    info!("evaluated {} aoi(s) against {} detection(s)", doc.aoi_count, doc.total_detections);
    Ok(())
}

/// Thermal detections input document: a flat, already-georeferenced list.
/// Pixel-space detections should be converted with
/// [`crate::thermal::detections_px_to_crs`] by the caller before writing
/// this file (georeferencing is a one-line affine, not a CLI concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalInputDoc {
    pub crs: Option<String>,
    pub detections: Vec<ThermalInputPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalInputPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

pub fn fuse(args: &FuseArgs) -> Result<()> {
    let (pooled, lidar_crs) = load_pooled_detections(&args.lidar)?;
    let thermal_doc: ThermalInputDoc = io::json::read_json(&args.thermal)?;

    let lidar_points: Vec<FusionPoint> = pooled
        .iter()
        .map(|d| FusionPoint { id: d.id.clone(), x: d.x, y: d.y, extra: BTreeMap::new() })
        .collect();
    let thermal_points: Vec<FusionPoint> = thermal_doc
        .detections
        .iter()
        .map(|d| FusionPoint { id: d.id.clone(), x: d.x, y: d.y, extra: BTreeMap::new() })
        .collect();

    let result = crate::fusion::join(
        &lidar_points,
        &thermal_points,
        lidar_crs.as_deref(),
        thermal_doc.crs.as_deref(),
        args.radius_m,
    )?;

    io::json::write_json(&args.output, &result).context("write fusion output")?;
    info!(
        "fused {} lidar / {} thermal: {} matched pairs",
        result.lidar_count, result.thermal_count, result.lidar_matched_count
    );
    Ok(())
}

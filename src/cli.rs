//! Argument schema for the `rookery` binary (SPEC_FULL §1 ambient CLI).
//!
//! Argument parsing itself stays outside the specified core (§1 lists it as
//! an external collaborator); this is the thin surface every
//! teacher-adjacent binary in this pack carries, matching `src/cli.rs`'s
//! `#[derive(Parser)]` style. Four subcommands exercise the library's four
//! stages end to end: `lidar` (per-tile detection), `dedupe` (cross-tile
//! union), `aoi` (AOI evaluation), `fuse` (thermal fusion join).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

#[derive(Parser, Debug)]
#[command(name = "rookery", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv); also controls `log` level.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the per-tile LiDAR candidate detector (grid -> DEM -> HAG -> extractor).
    Lidar(LidarArgs),
    /// Cross-tile centroid de-duplication over a previously written summary.
    Dedupe(DedupeArgs),
    /// Evaluate detections against AOI polygons.
    Aoi(AoiArgs),
    /// Nearest-neighbor fusion join between LiDAR and thermal detections.
    Fuse(FuseArgs),
}

#[derive(Args, Debug)]
pub struct LidarArgs {
    /// One or more point files or directories (searched recursively) in
    /// this build's minimal text point format; see
    /// `io::points::TextPointSource` — not a LAS/LAZ decoder. Same-named
    /// files found under both a `sample/` subdirectory and elsewhere are
    /// de-duplicated in favor of the non-sample copy.
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    pub files: Vec<PathBuf>,

    /// Raw CRS tag shared by every input tile (e.g. `EPSG:32720`).
    #[arg(long)]
    pub crs: Option<String>,

    /// JSON or TOML file overriding `Params::default()`.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub params: Option<PathBuf>,

    /// Where to write the `lidar_candidates` summary JSON.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Optional directory to also emit one detections GeoJSON file per tile.
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub emit_geojson_dir: Option<PathBuf>,

    /// Optional path to also emit every tile's pooled detections as one CSV.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub emit_csv: Option<PathBuf>,

    /// Run the batch de-duplicator immediately after the per-tile pass and
    /// fold its output into the same summary document (§6's optional
    /// `dedupe_radius_m`/`total_count_deduped`/`dedupe_outputs`/`dedupe_index`).
    #[arg(long)]
    pub dedupe_radius_m: Option<f64>,

    /// Process tiles with the rayon-parallel driver instead of sequentially.
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args, Debug)]
pub struct DedupeArgs {
    /// A `lidar_candidates` summary JSON previously written by `lidar`.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub summary: PathBuf,

    /// De-duplication radius in meters.
    #[arg(long)]
    pub radius_m: f64,

    /// Where to write the `lidar_candidates_deduped` document.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct AoiArgs {
    /// A `lidar_candidates` or `lidar_candidates_deduped` summary JSON.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub summary: PathBuf,

    /// A GeoJSON `FeatureCollection` of Polygon/MultiPolygon AOIs.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub aois: PathBuf,

    /// Override the AOI CRS tag (otherwise read from the summary's `crs`).
    #[arg(long)]
    pub aoi_crs: Option<String>,

    /// Permit a geographic CRS (area_m2/density_per_ha are then omitted).
    #[arg(long)]
    pub allow_geographic_crs: bool,

    /// Include the sorted list of matched detection ids in each AOI result.
    #[arg(long)]
    pub emit_detection_ids: bool,

    /// Where to write the `lidar_aoi_eval` document.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct FuseArgs {
    /// A `lidar_candidates` or `lidar_candidates_deduped` summary JSON.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub lidar: PathBuf,

    /// A thermal detections JSON document (`{"crs": ..., "detections": [{"id","x","y"}]}`).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub thermal: PathBuf,

    /// Match radius in meters.
    #[arg(long)]
    pub radius_m: f64,

    /// Where to write the fusion output document.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

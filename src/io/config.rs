//! JSON/TOML parameter-file loading (SPEC_FULL §1/§6 ambient config surface).
//!
//! `Params` already derives `serde::{Serialize, Deserialize}` (it's also
//! the struct serialized verbatim into `summary.params`); this module is
//! just the file-format dispatch a caller uses to load one from disk
//! without hand-building it, in either JSON or TOML.

use std::fs;
use std::path::Path;

use crate::detection::Params;
use crate::error::{CoreError, Result};

/// Load [`Params`] from a `.json` or `.toml` file, dispatching on the file
/// extension (case-insensitive). Any other/missing extension is an
/// `InputError`.
pub fn load_params(path: &Path) -> Result<Params> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CoreError::input_at(path, format!("read params file: {e}")))?;

    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("json") => serde_json::from_str(&raw)
            .map_err(|e| CoreError::input_at(path, format!("malformed JSON params: {e}"))),
        Some("toml") => toml::from_str(&raw)
            .map_err(|e| CoreError::input_at(path, format!("malformed TOML params: {e}"))),
        _ => Err(CoreError::input_at(
            path,
            "unrecognized params file extension (expected .json or .toml)",
        )),
    }
}

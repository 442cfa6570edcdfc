//! CRS tag canonicalization and classification (spec §3, §4.7).
//!
//! This module never reprojects points — it only compares and classifies
//! CRS *tags*. The only place we reach into `proj4rs` is to sanity-check
//! that an `EPSG:<code>` tag resolves to a real PROJ definition; a failure
//! there is logged, not fatal, since a caller may legitimately be using a
//! CRS this build of PROJ doesn't recognize but that is still internally
//! consistent for distance/area math in meters.

use once_cell_lite::OnceRegex;

/// A canonicalized CRS tag: either `EPSG:<code>` or an opaque WKT string
/// passed through unchanged because it can't be reduced further.
pub type CanonicalCrs = String;

static URN_EPSG: OnceRegex = OnceRegex::new(r"(?i)^urn:ogc:def:crs:epsg::?(\d+)$");

/// Normalize a raw CRS tag into canonical form.
///
/// Recognizes `CRS84`, `OGC:CRS84`, `WGS84`, `urn:ogc:def:crs:EPSG::<code>`,
/// bare numeric strings, and `EPSG:<code>` (case-insensitive). Anything else
/// — including a raw WKT string — is returned trimmed but otherwise as-is.
pub fn canonicalize(raw: &str) -> Option<CanonicalCrs> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    let upper = cleaned.to_ascii_uppercase();
    if upper == "CRS84" || upper == "OGC:CRS84" || upper == "WGS84" {
        return Some("EPSG:4326".to_string());
    }

    if let Some(caps) = URN_EPSG.get().captures(cleaned) {
        let code = &caps[1];
        return Some(format!("EPSG:{code}"));
    }

    if let Some(rest) = cleaned
        .strip_prefix("EPSG:")
        .or_else(|| cleaned.strip_prefix("epsg:"))
        .or_else(|| cleaned.strip_prefix("Epsg:"))
    {
        let rest = rest.trim();
        if rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty() {
            return Some(format!("EPSG:{rest}"));
        }
        return Some(cleaned.to_string());
    }

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("EPSG:{cleaned}"));
    }

    Some(cleaned.to_string())
}

/// True when the canonical CRS tag is geographic (degree units) rather than
/// projected (meter units): `EPSG:4326` or anything mentioning `CRS84`.
pub fn is_geographic(canonical: &str) -> bool {
    let upper = canonical.to_ascii_uppercase();
    upper == "EPSG:4326" || upper.contains("CRS84")
}

/// Best-effort sanity check that an `EPSG:<code>` tag resolves to a known
/// PROJ definition. Returns `Ok(())` for anything that isn't a bare
/// `EPSG:<code>` form (WKT strings aren't validated here) and for codes
/// PROJ successfully parses; returns the PROJ error message otherwise.
pub fn validate_epsg(canonical: &str) -> Result<(), String> {
    let Some(code) = canonical.strip_prefix("EPSG:") else {
        return Ok(());
    };
    let Ok(code) = code.parse::<u16>() else {
        return Ok(());
    };
    let proj_string = format!("+init=epsg:{code}");
    proj4rs::proj::Proj::from_proj_string(&proj_string)
        .map(|_| ())
        .map_err(|e| format!("EPSG:{code} did not parse as a PROJ definition: {e}"))
}

/// Returns `Ok(canonical)` iff `a` and `b` canonicalize to the same tag, and
/// neither is `None` while the other is `Some`. Two `None`s are treated as
/// "unknown CRS, caller must opt in elsewhere" and are not compared here.
pub fn require_same(
    a: Option<&str>,
    b: Option<&str>,
) -> Result<Option<CanonicalCrs>, crate::error::CoreError> {
    let ca = a.and_then(canonicalize);
    let cb = b.and_then(canonicalize);
    match (ca, cb) {
        (Some(x), Some(y)) if x == y => Ok(Some(x)),
        (Some(x), Some(y)) => Err(crate::error::CoreError::crs(format!(
            "CRS mismatch: {x} vs {y}"
        ))),
        (Some(x), None) => Ok(Some(x)),
        (None, Some(y)) => Ok(Some(y)),
        (None, None) => Ok(None),
    }
}

/// Tiny lazily-initialized regex holder so we don't pull in `once_cell` /
/// `lazy_static` for a single pattern; mirrors the minimal-dependency spirit
/// of the spec's geometry notes (§9) applied to this one regex.
mod once_cell_lite {
    use std::sync::OnceLock;

    pub struct OnceRegex {
        pattern: &'static str,
        cell: OnceLock<regex::Regex>,
    }

    impl OnceRegex {
        pub const fn new(pattern: &'static str) -> Self {
            Self { pattern, cell: OnceLock::new() }
        }

        pub fn get(&self) -> &regex::Regex {
            self.cell.get_or_init(|| regex::Regex::new(self.pattern).expect("valid regex"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(canonicalize("CRS84").as_deref(), Some("EPSG:4326"));
        assert_eq!(canonicalize("OGC:CRS84").as_deref(), Some("EPSG:4326"));
        assert_eq!(canonicalize("WGS84").as_deref(), Some("EPSG:4326"));
        assert_eq!(
            canonicalize("urn:ogc:def:crs:EPSG::32720").as_deref(),
            Some("EPSG:32720")
        );
        assert_eq!(canonicalize("32720").as_deref(), Some("EPSG:32720"));
        assert_eq!(canonicalize("epsg:32720").as_deref(), Some("EPSG:32720"));
    }

    #[test]
    fn classifies_geographic() {
        assert!(is_geographic("EPSG:4326"));
        assert!(is_geographic("OGC:CRS84"));
        assert!(!is_geographic("EPSG:32720"));
    }

    #[test]
    fn mismatch_is_an_error() {
        assert!(require_same(Some("EPSG:32720"), Some("EPSG:4326")).is_err());
        assert!(require_same(Some("EPSG:32720"), Some("EPSG:32720")).is_ok());
        assert!(require_same(Some("EPSG:32720"), None).is_ok());
    }
}

//! AOI GeoJSON input and detections GeoJSON output (SPEC_FULL §4 expansion).
//!
//! No GeoJSON crate is pulled in: parsing reads straight off `serde_json::Value`
//! the way `aoi.rs` itself avoids a geometry crate (spec §9) — a
//! `FeatureCollection` here is just a fixed, small, known shape.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::aoi::{Aoi, Geometry, PolygonRings, Ring};
use crate::detection::Detection;
use crate::error::{CoreError, Result};

fn ring_from_coords(coords: &Value) -> Result<Ring> {
    let arr = coords
        .as_array()
        .ok_or_else(|| CoreError::validation("InvalidGeometry: ring is not an array"))?;
    let mut ring = Vec::with_capacity(arr.len());
    for pt in arr {
        let pair = pt
            .as_array()
            .ok_or_else(|| CoreError::validation("InvalidGeometry: coordinate pair is not an array"))?;
        let x = pair
            .first()
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::validation("InvalidGeometry: missing x coordinate"))?;
        let y = pair
            .get(1)
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::validation("InvalidGeometry: missing y coordinate"))?;
        ring.push((x, y));
    }
    if ring.len() < 3 {
        return Err(CoreError::validation("InvalidGeometry: ring has fewer than 3 points"));
    }
    Ok(ring)
}

fn polygon_rings_from_coords(coords: &Value) -> Result<PolygonRings> {
    let arr = coords
        .as_array()
        .ok_or_else(|| CoreError::validation("InvalidGeometry: polygon coordinates is not an array"))?;
    arr.iter().map(ring_from_coords).collect()
}

fn geometry_from_value(geom: &Value) -> Result<Geometry> {
    let kind = geom
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation("InvalidGeometry: geometry missing 'type'"))?;
    let coords = geom
        .get("coordinates")
        .ok_or_else(|| CoreError::validation("InvalidGeometry: geometry missing 'coordinates'"))?;
    match kind {
        "Polygon" => Ok(Geometry::Polygon(polygon_rings_from_coords(coords)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or_else(|| CoreError::validation("InvalidGeometry: multipolygon coordinates is not an array"))?
                .iter()
                .map(polygon_rings_from_coords)
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(polys))
        }
        other => Err(CoreError::validation(format!(
            "InvalidGeometry: unsupported geometry type '{other}' (only Polygon/MultiPolygon are supported)"
        ))),
    }
}

fn properties_from_value(feature: &Value) -> BTreeMap<String, Value> {
    feature
        .get("properties")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn aoi_id_for(feature: &Value, properties: &BTreeMap<String, Value>, index: usize) -> String {
    if let Some(id) = feature.get("id") {
        if let Some(s) = id.as_str() {
            return s.to_string();
        }
        if let Some(n) = id.as_i64() {
            return n.to_string();
        }
    }
    if let Some(Value::String(s)) = properties.get("id") {
        return s.clone();
    }
    if let Some(Value::String(s)) = properties.get("aoi_id") {
        return s.clone();
    }
    format!("aoi_{index}")
}

/// Read a GeoJSON `FeatureCollection` of Polygon/MultiPolygon features into
/// [`Aoi`] records (spec §4.7). Fails with `NoAOIs` if the collection is
/// empty, `InvalidGeometry` on anything malformed.
pub fn read_aois(path: &Path) -> Result<Vec<Aoi>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CoreError::input_at(path, format!("read AOI file: {e}")))?;
    let doc: Value = serde_json::from_str(&raw)
        .map_err(|e| CoreError::input_at(path, format!("malformed AOI JSON: {e}")))?;

    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::input_at(path, "AOI JSON is not a FeatureCollection"))?;

    if features.is_empty() {
        return Err(CoreError::validation("NoAOIs: AOI feature collection has no polygons"));
    }

    let mut aois = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let properties = properties_from_value(feature);
        let aoi_id = aoi_id_for(feature, &properties, i);
        let geometry = feature
            .get("geometry")
            .ok_or_else(|| CoreError::validation(format!("InvalidGeometry: feature {i} missing geometry")))
            .and_then(geometry_from_value)?;
        aois.push(Aoi { aoi_id, properties, geometry });
    }
    Ok(aois)
}

/// Emit accepted detections as a GeoJSON `FeatureCollection` of `Point`
/// features, one per detection, with every [`Detection`] field carried as a
/// GeoJSON property (mirrors the original's per-tile geojson emission).
pub fn write_detections(path: &Path, detections: &[Detection]) -> Result<()> {
    let features: Vec<Value> = detections
        .iter()
        .map(|d| {
            let properties =
                serde_json::to_value(d).unwrap_or_else(|_| json!({}));
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [d.x, d.y] },
                "properties": properties,
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    super::json::write_json(path, &collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_box_polygon_with_hole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aois.geojson");
        fs::write(
            &path,
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "id": "donut",
                    "properties": {"label": "colony"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [
                            [[0,0],[2,0],[2,2],[0,2],[0,0]],
                            [[0.5,0.5],[1.5,0.5],[1.5,1.5],[0.5,1.5],[0.5,0.5]]
                        ]
                    }
                }]
            }"#,
        )
        .unwrap();

        let aois = read_aois(&path).unwrap();
        assert_eq!(aois.len(), 1);
        assert_eq!(aois[0].aoi_id, "donut");
        match &aois[0].geometry {
            Geometry::Polygon(rings) => assert_eq!(rings.len(), 2),
            _ => panic!("expected polygon"),
        }
    }

    #[test]
    fn empty_collection_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.geojson");
        fs::write(&path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(read_aois(&path).is_err());
    }

    #[test]
    fn short_ring_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
                "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,1]]]}}]}"#,
        )
        .unwrap();
        assert!(read_aois(&path).is_err());
    }

    #[test]
    fn write_detections_round_trips_as_point_features() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dets.geojson");
        let det = Detection {
            tile: "t".into(),
            id: "t:00001".into(),
            file: "t.las".into(),
            x: 1.5,
            y: 2.5,
            area_cells: 4,
            area_m2: 0.25,
            hag_mean: 0.3,
            hag_max: 0.4,
            circularity: 0.8,
            solidity: 0.9,
            dedupe_cluster_id: None,
            dedupe_cluster_size: None,
        };
        write_detections(&path, &[det]).unwrap();
        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let coords = &doc["features"][0]["geometry"]["coordinates"];
        assert_eq!(coords[0].as_f64(), Some(1.5));
        assert_eq!(coords[1].as_f64(), Some(2.5));
        assert_eq!(doc["features"][0]["properties"]["id"], "t:00001");
    }
}

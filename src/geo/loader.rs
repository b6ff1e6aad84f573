// src/geo/loader.rs
//! GeoJSON feature-collection decoding into named country polygons.

use serde::Deserialize;
use serde_json::Value;

use super::ring::{Point, Polygon};
use super::CountryPolygon;
use crate::error::GeoError;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Decode a feature collection, keeping document order.
///
/// The document itself must be well-formed. Individual features that do not
/// decode, have no usable name, carry an unknown geometry type or a malformed
/// coordinate payload are skipped.
pub(crate) fn parse_feature_collection(doc: &str) -> Result<Vec<CountryPolygon>, GeoError> {
    let fc: FeatureCollection = serde_json::from_str(doc)?;

    let mut out = Vec::with_capacity(fc.features.len());
    for (idx, raw) in fc.features.into_iter().enumerate() {
        let feature: Feature = match serde_json::from_value(raw) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(target: "geo", index = idx, error = %e, "skipping undecodable feature");
                continue;
            }
        };
        let Some(name) = feature_name(&feature) else {
            tracing::warn!(target: "geo", index = idx, "skipping feature without name or id");
            continue;
        };
        let Some(geometry) = feature.geometry else {
            continue;
        };

        let polygons = match geometry.kind.as_str() {
            "Polygon" => decode_polygon(geometry.coordinates).map(|p| vec![p]),
            "MultiPolygon" => decode_multi_polygon(geometry.coordinates),
            other => {
                tracing::debug!(target: "geo", %name, kind = other, "ignoring geometry type");
                continue;
            }
        };

        match polygons {
            Some(polygons) => out.push(CountryPolygon { name, polygons }),
            None => {
                tracing::warn!(target: "geo", %name, "skipping feature with malformed coordinates");
            }
        }
    }
    Ok(out)
}

/// `properties.name` if it is a non-empty string, else a non-empty feature id.
fn feature_name(feature: &Feature) -> Option<String> {
    let from_props = feature
        .properties
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    if let Some(name) = from_props {
        return Some(name.to_string());
    }
    match &feature.id {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_polygon(coords: Value) -> Option<Polygon> {
    let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(coords).ok()?;
    convert_rings(rings)
}

fn decode_multi_polygon(coords: Value) -> Option<Vec<Polygon>> {
    let polys: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(coords).ok()?;
    polys.into_iter().map(convert_rings).collect()
}

/// Keep x/y of each position; extra ordinates (altitude) are dropped.
fn convert_rings(rings: Vec<Vec<Vec<f64>>>) -> Option<Polygon> {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|pos| match pos.as_slice() {
                    [x, y, ..] => Some([*x, *y]),
                    _ => None,
                })
                .collect::<Option<Vec<Point>>>()
        })
        .collect()
}

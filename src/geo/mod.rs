// src/geo/mod.rs
//! Country polygon store and point classification.
//!
//! Built once at startup from a GeoJSON feature collection and read-only
//! afterwards; share it behind an `Arc`.

mod loader;
pub mod ring;

use std::path::Path;

use crate::error::GeoError;
use crate::models::OTHER_COUNTRY;
use ring::{point_in_polygon, Polygon};

/// One country's boundary: polygons of rings of `[lng, lat]` points.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryPolygon {
    pub name: String,
    pub polygons: Vec<Polygon>,
}

/// Immutable, load-ordered set of country boundaries.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    countries: Vec<CountryPolygon>,
}

impl CountryIndex {
    pub fn new(countries: Vec<CountryPolygon>) -> Self {
        Self { countries }
    }

    /// Read and decode a GeoJSON document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path).map_err(|source| GeoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_geojson_str(&doc)?;
        tracing::info!(
            target: "geo",
            path = %path.display(),
            countries = index.len(),
            "country polygons loaded"
        );
        Ok(index)
    }

    pub fn from_geojson_str(doc: &str) -> Result<Self, GeoError> {
        loader::parse_feature_collection(doc).map(Self::new)
    }

    /// Name of the first country (in load order) with a ring containing the
    /// point, or `"Other"`.
    pub fn classify(&self, lat: f64, lng: f64) -> &str {
        self.countries
            .iter()
            .find(|c| c.polygons.iter().any(|p| point_in_polygon(lng, lat, p)))
            .map(|c| c.name.as_str())
            .unwrap_or(OTHER_COUNTRY)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

//! Data models for the catalog API and the map layer.
//!
//! `Catalog` and `Earthquake` mirror the rows served by `/api/catalogs` and
//! `/api/earthquakes`. `FeatureCollection` is the GeoJSON shape the dashboard
//! hands to the map source, the analytics views and the exporters.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Region label used when an event carries none.
pub const UNKNOWN_REGION: &str = "N/A";

/// A named collection of seismic events sharing processing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub catalog_id: i32,
    pub catalog_name: String,
    pub doi: Option<String>,
    /// Detection / location technique summary
    pub technique: Option<String>,
    /// Comma-separated seismic network codes
    pub network_codes: Option<String>,
    pub region: Option<String>,
    pub num_events: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub submitted_by: Option<String>,
    pub submission_date: Option<DateTime<Utc>>,
    /// Always "active" for listed catalogs
    pub status: String,
    /// Free-form processing metadata (velocity model, methods, notes)
    pub metadata: Option<serde_json::Value>,
}

impl Catalog {
    /// Short display label: the part of the name before an em dash.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.catalog_name
            .split('—')
            .next()
            .unwrap_or(&self.catalog_name)
            .trim()
    }

    /// Publication year parsed from a trailing "(YYYY)" in the name.
    #[must_use]
    pub fn publication_year(&self) -> Option<i32> {
        self.catalog_name.match_indices('(').find_map(|(open, _)| {
            let rest = &self.catalog_name[open + 1..];
            let digits = rest.get(..4)?;
            let closed = rest[4..].starts_with(')');
            if closed && digits.bytes().all(|b| b.is_ascii_digit()) {
                digits.parse().ok()
            } else {
                None
            }
        })
    }
}

/// Response body of `GET /api/catalogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogsResponse {
    pub catalogs: Vec<Catalog>,
}

/// A single seismic detection as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub evid: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Depth in kilometers (positive down)
    pub depth: f64,
    pub origin_time: DateTime<Utc>,
    /// Absent for detections without a magnitude (e.g. low-frequency events)
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
    /// Number of stations used
    pub nsta: Option<i32>,
    /// Azimuthal gap (degrees)
    pub gap: Option<f64>,
    pub horizontal_error_km: Option<f64>,
    pub vertical_error_km: Option<f64>,
    /// RMS travel time residual
    pub rms: Option<f64>,
    pub region: Option<String>,
}

/// Response body of `GET /api/earthquakes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthquakesResponse {
    pub count: usize,
    pub earthquakes: Vec<Earthquake>,
}

impl From<Vec<Earthquake>> for EarthquakesResponse {
    fn from(earthquakes: Vec<Earthquake>) -> Self {
        Self {
            count: earthquakes.len(),
            earthquakes,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// GeoJSON feature collection feeding the map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Wrap features in a collection.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: "FeatureCollection".into(),
            features,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl From<&EarthquakesResponse> for FeatureCollection {
    fn from(response: &EarthquakesResponse) -> Self {
        Self::new(response.earthquakes.iter().map(Feature::from).collect())
    }
}

/// A single earthquake on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always "Feature"
    #[serde(rename = "type")]
    pub type_: String,

    pub geometry: Geometry,

    pub properties: Properties,
}

impl Feature {
    /// Get longitude (degrees).
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates.first().copied().unwrap_or(0.0)
    }

    /// Get latitude (degrees).
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates.get(1).copied().unwrap_or(0.0)
    }

    /// Origin year (UTC).
    #[must_use]
    pub fn year(&self) -> i32 {
        self.properties.origin_time.year()
    }
}

/// Point geometry for a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Always "Point"
    #[serde(rename = "type")]
    pub type_: String,

    /// Coordinates: [longitude, latitude]
    pub coordinates: Vec<f64>,
}

/// Feature properties read by popups, charts and exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Event identifier (evid)
    pub id: String,
    pub depth: f64,
    pub mag: Option<f64>,
    pub mag_type: Option<String>,
    pub nsta: Option<i32>,
    pub gap: Option<f64>,
    pub horizontal_error: Option<f64>,
    pub vertical_error: Option<f64>,
    pub rms: Option<f64>,
    pub origin_time: DateTime<Utc>,
    pub region: String,
}

impl Properties {
    /// Larger of the two location uncertainties, if either was recorded.
    #[must_use]
    pub fn max_error(&self) -> Option<f64> {
        match (self.horizontal_error, self.vertical_error) {
            (Some(h), Some(v)) => Some(h.max(v)),
            (h, v) => h.or(v),
        }
    }
}

impl From<&Earthquake> for Feature {
    fn from(eq: &Earthquake) -> Self {
        let region = eq
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(UNKNOWN_REGION)
            .to_string();

        Self {
            type_: "Feature".into(),
            geometry: Geometry {
                type_: "Point".into(),
                coordinates: vec![eq.longitude, eq.latitude],
            },
            properties: Properties {
                id: eq.evid.clone(),
                depth: eq.depth,
                mag: eq.magnitude,
                mag_type: eq.magnitude_type.clone(),
                nsta: eq.nsta,
                gap: eq.gap,
                horizontal_error: eq.horizontal_error_km,
                vertical_error: eq.vertical_error_km,
                rms: eq.rms,
                origin_time: eq.origin_time,
                region,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "count": 2,
        "earthquakes": [
            {
                "evid": "uw61535372",
                "longitude": -122.31,
                "latitude": 47.62,
                "depth": 24.5,
                "origin_time": "2019-07-12T09:51:38Z",
                "magnitude": 4.6,
                "magnitude_type": "ml",
                "nsta": 112,
                "gap": 31.0,
                "horizontal_error_km": 0.3,
                "vertical_error_km": 0.9,
                "rms": 0.12,
                "region": "W2"
            },
            {
                "evid": "lfe-000417",
                "longitude": -123.9,
                "latitude": 48.1,
                "depth": 38.0,
                "origin_time": "2016-02-03T11:00:00Z",
                "magnitude": null,
                "magnitude_type": null,
                "nsta": null,
                "gap": null,
                "horizontal_error_km": null,
                "vertical_error_km": null,
                "rms": null,
                "region": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_response() {
        let response: EarthquakesResponse =
            serde_json::from_str(SAMPLE_RESPONSE).expect("failed to parse sample response");
        assert_eq!(response.count, 2);
        assert_eq!(response.earthquakes[1].magnitude, None);
    }

    #[test]
    fn test_feature_from_earthquake() {
        let response: EarthquakesResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let collection = FeatureCollection::from(&response);

        assert_eq!(collection.type_, "FeatureCollection");
        assert_eq!(collection.len(), 2);

        let first = &collection.features[0];
        assert_eq!(first.properties.id, "uw61535372");
        assert!((first.longitude() - (-122.31)).abs() < 1e-9);
        assert!((first.latitude() - 47.62).abs() < 1e-9);
        assert_eq!(first.year(), 2019);
        assert_eq!(first.properties.max_error(), Some(0.9));

        // Missing region falls back to a placeholder
        assert_eq!(collection.features[1].properties.region, UNKNOWN_REGION);
        assert_eq!(collection.features[1].properties.max_error(), None);
    }

    #[test]
    fn test_catalog_labels() {
        let catalog = Catalog {
            catalog_id: 2,
            catalog_name: "Merrill et al. (2022) — Cascadia tremor-zone LFEs".into(),
            doi: None,
            technique: None,
            network_codes: None,
            region: None,
            num_events: None,
            start_date: None,
            end_date: None,
            submitted_by: None,
            submission_date: None,
            status: "active".into(),
            metadata: None,
        };
        assert_eq!(catalog.short_name(), "Merrill et al. (2022)");
        assert_eq!(catalog.publication_year(), Some(2022));
    }
}

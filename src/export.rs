//! GeoJSON and CSV export of the loaded events.
//!
//! The CSV header is consumed by downstream tooling and must stay
//! byte-for-byte stable.

use std::io::{self, Write};

use chrono::{NaiveDate, SecondsFormat};

use crate::errors::QuakeError;
use crate::models::{Feature, FeatureCollection};

/// Fixed CSV header row.
pub const CSV_HEADER: &str =
    "evid,latitude,longitude,depth_km,magnitude,origin_time,region,nsta,gap,max_err";

/// Prefix of suggested download names.
const FILE_PREFIX: &str = "cascadia-earthquakes";

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    GeoJson,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "geojson" => Ok(Self::GeoJson),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("unknown export format: {s} (expected: geojson, csv)")),
        }
    }
}

/// Suggested file name, e.g. `cascadia-earthquakes-2024-05-01.csv`.
#[must_use]
pub fn file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "{FILE_PREFIX}-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Export the loaded feature set.
///
/// Returns the number of events written.
///
/// # Errors
///
/// Returns [`QuakeError::NothingToExport`] when nothing is loaded, or an
/// error if serialization or writing fails.
pub fn export<W: Write>(
    writer: &mut W,
    loaded: Option<&FeatureCollection>,
    format: ExportFormat,
) -> Result<usize, QuakeError> {
    let collection = loaded
        .filter(|c| !c.is_empty())
        .ok_or(QuakeError::NothingToExport)?;

    match format {
        ExportFormat::GeoJson => write_geojson(writer, collection)?,
        ExportFormat::Csv => write_csv(writer, &collection.features)?,
    }

    tracing::info!(
        "exported {} earthquakes as {}",
        collection.len(),
        format.extension()
    );
    Ok(collection.len())
}

/// Write a pretty-printed GeoJSON feature collection.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_geojson<W: Write>(
    writer: &mut W,
    collection: &FeatureCollection,
) -> Result<(), QuakeError> {
    serde_json::to_writer_pretty(&mut *writer, collection)?;
    writeln!(writer)?;
    Ok(())
}

/// Write events as CSV under [`CSV_HEADER`].
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv<W: Write>(writer: &mut W, features: &[Feature]) -> io::Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for feature in features {
        writeln!(writer, "{}", csv_row(feature))?;
    }
    Ok(())
}

fn csv_row(feature: &Feature) -> String {
    let p = &feature.properties;
    let fixed = |v: Option<f64>, places: usize| {
        v.map(|v| format!("{v:.places$}")).unwrap_or_default()
    };

    [
        csv_field(&p.id),
        format!("{:.4}", feature.latitude()),
        format!("{:.4}", feature.longitude()),
        format!("{:.2}", p.depth),
        fixed(p.mag, 1),
        p.origin_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        quoted(&p.region),
        p.nsta.map(|n| n.to_string()).unwrap_or_default(),
        fixed(p.gap, 1),
        fixed(p.max_error(), 2),
    ]
    .join(",")
}

/// Quote a field only when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::Earthquake;

    fn loaded() -> FeatureCollection {
        let quakes = [
            ("uw1", -122.123_456, 47.654_321, 24.5, Some(3.26), Some("W2")),
            ("uw2", -123.5, 44.0, 0.0, None, None),
            ("cn,3", -128.0, 50.25, 12.125, Some(1.0), Some("E1")),
        ];
        let features = quakes
            .iter()
            .map(|(evid, lon, lat, depth, mag, region)| {
                Feature::from(&Earthquake {
                    evid: (*evid).into(),
                    longitude: *lon,
                    latitude: *lat,
                    depth: *depth,
                    origin_time: Utc.with_ymd_and_hms(2022, 8, 9, 10, 11, 12).unwrap(),
                    magnitude: *mag,
                    magnitude_type: None,
                    nsta: Some(9),
                    gap: Some(123.46),
                    horizontal_error_km: Some(0.5),
                    vertical_error_km: Some(1.234),
                    rms: None,
                    region: region.map(str::to_string),
                })
            })
            .collect();
        FeatureCollection::new(features)
    }

    /// Split a CSV line, honouring double-quoted fields.
    fn split_csv(line: &str) -> Vec<String> {
        let mut fields = vec![String::new()];
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    chars.next();
                    fields.last_mut().unwrap().push('"');
                }
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => fields.push(String::new()),
                _ => fields.last_mut().unwrap().push(c),
            }
        }
        fields
    }

    #[test]
    fn test_csv_header_is_stable() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "evid,latitude,longitude,depth_km,magnitude,origin_time,region,nsta,gap,max_err\n"
        );
    }

    #[test]
    fn test_csv_row_format() {
        let mut out = Vec::new();
        write_csv(&mut out, &loaded().features).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[1],
            "uw1,47.6543,-122.1235,24.50,3.3,2022-08-09T10:11:12Z,\"W2\",9,123.5,1.23"
        );
        // Missing magnitude stays empty; missing region falls back to N/A
        assert_eq!(
            lines[2],
            "uw2,44.0000,-123.5000,0.00,,2022-08-09T10:11:12Z,\"N/A\",9,123.5,1.23"
        );
        assert!(lines[3].starts_with("\"cn,3\","));
    }

    #[test]
    fn test_geojson_and_csv_agree() {
        let collection = loaded();

        let mut geojson = Vec::new();
        export(&mut geojson, Some(&collection), ExportFormat::GeoJson).unwrap();
        let mut csv = Vec::new();
        export(&mut csv, Some(&collection), ExportFormat::Csv).unwrap();

        let parsed: FeatureCollection = serde_json::from_slice(&geojson).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let rows: Vec<Vec<String>> = csv.lines().skip(1).map(split_csv).collect();

        assert_eq!(parsed.len(), rows.len());
        for (feature, row) in parsed.features.iter().zip(&rows) {
            assert_eq!(row.len(), 10);
            assert_eq!(row[0], feature.properties.id);
            assert_eq!(row[1], format!("{:.4}", feature.latitude()));
            assert_eq!(row[2], format!("{:.4}", feature.longitude()));
            assert_eq!(row[3], format!("{:.2}", feature.properties.depth));
        }
    }

    #[test]
    fn test_rounding_ties_stay_within_column_precision() {
        // 12.125 is an exact binary tie at two decimals
        let collection = loaded();
        let mut csv = Vec::new();
        write_csv(&mut csv, &collection.features).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let row = split_csv(csv.lines().nth(3).unwrap());

        assert_eq!(row[0], "cn,3");
        let depth: f64 = row[3].parse().unwrap();
        assert!((depth - 12.125).abs() <= 0.005 + f64::EPSILON);
        let lat: f64 = row[1].parse().unwrap();
        assert!((lat - 50.25).abs() <= 0.000_05 + f64::EPSILON);
    }

    #[test]
    fn test_nothing_to_export() {
        let mut out = Vec::new();
        assert!(matches!(
            export(&mut out, None, ExportFormat::Csv),
            Err(QuakeError::NothingToExport)
        ));
        let empty = FeatureCollection::new(Vec::new());
        assert!(matches!(
            export(&mut out, Some(&empty), ExportFormat::GeoJson),
            Err(QuakeError::NothingToExport)
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            file_name(ExportFormat::Csv, date),
            "cascadia-earthquakes-2024-05-01.csv"
        );
        assert_eq!("GeoJSON".parse::<ExportFormat>(), Ok(ExportFormat::GeoJson));
    }
}

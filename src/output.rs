//! Output formatters for earthquake events and catalogs.
//!
//! Supports human-readable (with colors), JSON, NDJSON, GeoJSON and CSV.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::AnalyticsSummary;
use crate::errors::QuakeError;
use crate::export::{self, ExportFormat};
use crate::models::{Catalog, Feature, FeatureCollection};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Magnitude-based colors
const RED: &str = "\x1b[91m"; // mag >= 5.0
const YELLOW: &str = "\x1b[93m"; // mag >= 4.0
const CYAN: &str = "\x1b[96m"; // mag >= 3.0
const GREEN: &str = "\x1b[92m"; // mag >= 2.0
const WHITE: &str = "\x1b[97m";

const ICON_QUAKE: &str = "🌍";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
    /// GeoJSON feature collection, as exported by the dashboard
    GeoJson,
    /// CSV, as exported by the dashboard
    Csv,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            "geojson" => Ok(Self::GeoJson),
            "csv" => Ok(Self::Csv),
            _ => Err(format!(
                "unknown format: {s} (expected: human, json, ndjson, geojson, csv)"
            )),
        }
    }
}

impl Format {
    /// Matching export format, for the two file formats.
    #[must_use]
    pub const fn export_format(self) -> Option<ExportFormat> {
        match self {
            Self::GeoJson => Some(ExportFormat::GeoJson),
            Self::Csv => Some(ExportFormat::Csv),
            Self::Human | Self::Json | Self::Ndjson => None,
        }
    }
}

/// Flat event record for JSON and NDJSON output.
#[derive(Debug, Clone, Serialize)]
pub struct OutputEvent<'a> {
    pub evid: &'a str,
    pub origin_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<&'a str>,
    pub region: &'a str,
    pub nsta: Option<i32>,
    pub gap: Option<f64>,
    pub max_err: Option<f64>,
}

impl<'a> From<&'a Feature> for OutputEvent<'a> {
    fn from(f: &'a Feature) -> Self {
        let p = &f.properties;
        Self {
            evid: &p.id,
            origin_time: p.origin_time,
            latitude: f.latitude(),
            longitude: f.longitude(),
            depth_km: p.depth,
            magnitude: p.mag,
            magnitude_type: p.mag_type.as_deref(),
            region: &p.region,
            nsta: p.nsta,
            gap: p.gap,
            max_err: p.max_error(),
        }
    }
}

/// Get the color code for a magnitude value.
fn magnitude_color(mag: Option<f64>) -> &'static str {
    match mag {
        Some(m) if m >= 5.0 => RED,
        Some(m) if m >= 4.0 => YELLOW,
        Some(m) if m >= 3.0 => CYAN,
        Some(m) if m >= 2.0 => GREEN,
        _ => WHITE,
    }
}

/// Get severity label for magnitude.
fn magnitude_label(mag: Option<f64>) -> &'static str {
    match mag {
        Some(m) if m >= 7.0 => "MAJOR",
        Some(m) if m >= 6.0 => "STRONG",
        Some(m) if m >= 4.5 => "MODERATE",
        Some(m) if m >= 3.0 => "LIGHT",
        Some(m) if m >= 2.0 => "MINOR",
        Some(_) => "MICRO",
        None => "UNKNOWN",
    }
}

/// Write events in human-readable format, color-coded by magnitude.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, events: &[Feature]) -> io::Result<()> {
    for event in events {
        let p = &event.properties;
        let time = p.origin_time.format("%Y-%m-%d %H:%M:%S");
        let mag_str = p.mag.map_or_else(|| "?".into(), |m| format!("{m:.1}"));
        let mag_type = p.mag_type.as_deref().unwrap_or("?");

        let color = magnitude_color(p.mag);
        let label = magnitude_label(p.mag);
        let err = p
            .max_error()
            .map(|e| format!(" ±{e:.1}km"))
            .unwrap_or_default();

        writeln!(
            writer,
            "{ICON_QUAKE} {color}{BOLD}M{mag_str}{RESET} {DIM}{mag_type}{RESET} │ \
             {color}{label:8}{RESET} │ \
             {DIM}{depth:>5.1}km{RESET} │ \
             {time} UTC │ \
             {lat:.4}, {lon:.4}{DIM}{err}{RESET} │ \
             {region} {DIM}{id}{RESET}",
            depth = p.depth,
            lat = event.latitude(),
            lon = event.longitude(),
            region = p.region,
            id = p.id,
        )?;
    }
    Ok(())
}

/// Write events as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, events: &[Feature]) -> io::Result<()> {
    let output: Vec<OutputEvent<'_>> = events.iter().map(OutputEvent::from).collect();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, events: &[Feature]) -> io::Result<()> {
    for event in events {
        let json = serde_json::to_string(&OutputEvent::from(event))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// GeoJSON and CSV go through the exporter and therefore fail on an empty
/// set.
///
/// # Errors
///
/// Returns an error if writing fails or there is nothing to export.
pub fn write_events<W: Write>(
    writer: &mut W,
    events: &FeatureCollection,
    format: Format,
) -> Result<(), QuakeError> {
    if let Some(export_format) = format.export_format() {
        export::export(writer, Some(events), export_format)?;
        return Ok(());
    }

    match format {
        Format::Json => write_json(writer, &events.features)?,
        Format::Ndjson => write_ndjson(writer, &events.features)?,
        _ => write_human(writer, &events.features)?,
    }
    Ok(())
}

/// Write the catalog list.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_catalogs<W: Write>(
    writer: &mut W,
    catalogs: &[Catalog],
    format: Format,
) -> Result<(), QuakeError> {
    match format {
        Format::Human => {
            for c in catalogs {
                let events = c
                    .num_events
                    .map_or_else(|| "?".into(), |n| n.to_string());
                let technique = c.technique.as_deref().unwrap_or("-");
                writeln!(
                    writer,
                    "{BOLD}{:>4}{RESET} │ {:<40} │ {:>8} events │ {DIM}{technique}{RESET}",
                    c.catalog_id,
                    c.short_name(),
                    events
                )?;
            }
        }
        Format::Ndjson => {
            for c in catalogs {
                writeln!(writer, "{}", serde_json::to_string(c)?)?;
            }
        }
        _ => {
            serde_json::to_writer_pretty(&mut *writer, catalogs)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Write the analytics summary as a short text report.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary<W: Write>(writer: &mut W, summary: &AnalyticsSummary) -> io::Result<()> {
    writeln!(writer, "{BOLD}{} events{RESET}", summary.total)?;

    writeln!(writer, "{DIM}per year{RESET}")?;
    for (year, count) in &summary.events_per_year {
        writeln!(writer, "  {year}  {count}")?;
    }

    let total = summary.total;
    for (title, histogram) in [("magnitude", &summary.magnitude), ("depth km", &summary.depth)] {
        writeln!(writer, "{DIM}{title}{RESET}")?;
        let shares = histogram.percentages(total);
        for ((label, count), share) in histogram
            .labels()
            .iter()
            .zip(&histogram.counts)
            .zip(shares)
        {
            if *count > 0 {
                writeln!(writer, "  {label:>7}  {count:>6}  {share:5.1}%")?;
            }
        }
    }

    let [a, b, c, d] = summary.depth_scale.legend_labels();
    writeln!(writer, "{DIM}depth scale{RESET}  {a} │ {b} │ {c} │ {d}")?;
    Ok(())
}

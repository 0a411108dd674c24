//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::DEFAULT_API_URL;
use crate::export::ExportFormat;
use crate::output::Format;
use crate::query::{DEFAULT_CATALOG_ID, DEFAULT_MAX_LIMIT, SortOrder};

/// Earthquake catalog API and dashboard client.
#[derive(Parser, Debug)]
#[command(name = "quakescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the catalog API over PostGIS
    Serve(ServeArgs),

    /// List the active catalogs
    Catalogs(CatalogsArgs),

    /// Load filtered earthquakes through the API
    Query(QueryArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "3002")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, default_value = "10")]
    pub max_connections: u32,

    /// Upper bound on the `limit` parameter
    #[arg(long, default_value_t = DEFAULT_MAX_LIMIT)]
    pub max_limit: i64,

    /// Row order: recent (newest first) or random (sample)
    #[arg(long, default_value = "recent", value_parser = parse_order)]
    pub order: SortOrder,

    /// Treat magnitude 0 and 10 as real bounds instead of "unset"
    #[arg(long)]
    pub explicit_magnitude_bounds: bool,
}

/// Arguments for the `catalogs` command.
#[derive(Parser, Debug)]
pub struct CatalogsArgs {
    /// Base URL of the catalog API
    #[arg(long, env = "QUAKESCOPE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Only list catalogs that can be overlaid on this primary catalog,
    /// oldest publication first
    #[arg(long, value_name = "CATALOG")]
    pub overlays_for: Option<i32>,

    /// Output format (human, json, ndjson)
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `query` command.
///
/// Coordinate, date and uncertainty values are taken as typed; anything
/// that does not parse is ignored, as in the dashboard's filter panel.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Base URL of the catalog API
    #[arg(long, env = "QUAKESCOPE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Primary catalog id
    #[arg(long, default_value_t = DEFAULT_CATALOG_ID)]
    pub catalog: i32,

    /// Maximum events to request
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,

    /// Minimum depth in km
    #[arg(long, allow_negative_numbers = true, default_value = "0")]
    pub min_depth: f64,

    /// Maximum depth in km
    #[arg(long, allow_negative_numbers = true, default_value = "100")]
    pub max_depth: f64,

    /// Minimum magnitude (0 applies no bound)
    #[arg(long, allow_negative_numbers = true, default_value = "0")]
    pub min_magnitude: f64,

    /// Maximum magnitude (10 applies no bound)
    #[arg(long, allow_negative_numbers = true, default_value = "10")]
    pub max_magnitude: f64,

    /// Start date (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long)]
    pub start: Option<String>,

    /// End date, inclusive (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long)]
    pub end: Option<String>,

    /// Southern edge of the bounding box
    #[arg(long, allow_hyphen_values = true)]
    pub min_lat: Option<String>,

    /// Northern edge of the bounding box
    #[arg(long, allow_hyphen_values = true)]
    pub max_lat: Option<String>,

    /// Western edge of the bounding box
    #[arg(long, allow_hyphen_values = true)]
    pub min_lon: Option<String>,

    /// Eastern edge of the bounding box
    #[arg(long, allow_hyphen_values = true)]
    pub max_lon: Option<String>,

    /// Maximum horizontal location error in km (100 applies no bound)
    #[arg(long)]
    pub max_horizontal_error: Option<String>,

    /// Maximum vertical location error in km (100 applies no bound)
    #[arg(long)]
    pub max_vertical_error: Option<String>,

    /// Always send both magnitude bounds, for a server started with
    /// `--explicit-magnitude-bounds`
    #[arg(long)]
    pub explicit_magnitude_bounds: bool,

    /// Drop events with no recorded uncertainty
    #[arg(long)]
    pub exclude_missing_uncertainty: bool,

    /// Overlay catalog to load alongside the primary one (repeatable, max 3)
    #[arg(long = "overlay")]
    pub overlays: Vec<i32>,

    /// Print an analytics summary after the events
    #[arg(long)]
    pub summary: bool,

    /// Also save the loaded events (geojson, csv) under the suggested name
    #[arg(long, value_parser = parse_export_format)]
    pub export: Option<ExportFormat>,

    /// Directory for `--export`
    #[arg(long, default_value = ".")]
    pub export_dir: PathBuf,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a row order from string.
fn parse_order(s: &str) -> Result<SortOrder, String> {
    s.parse()
}

/// Parse an export format from string.
fn parse_export_format(s: &str) -> Result<ExportFormat, String> {
    s.parse()
}

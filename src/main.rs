//! quakescope command-line entry point.
//!
//! `serve` exposes the catalogs and events stored in PostGIS over HTTP;
//! `catalogs` and `query` drive that API from the terminal the same way the
//! dashboard's filter panel does.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{debug, error, info, warn};

use quakescope::analytics::AnalyticsPanel;
use quakescope::cli::{self, Cli, Command};
use quakescope::client::ApiClient;
use quakescope::filters::{
    BoundingBox, DashboardView, Edge, FilterController, FilterEdit, FilterSet, LoadOutcome,
};
use quakescope::models::FeatureCollection;
use quakescope::query::{MagnitudeBounds, QueryOptions};
use quakescope::{compare, export, output, server};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Catalogs(args) => cmd_catalogs(&args),
        Command::Query(args) => cmd_query(args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `serve` command - run the catalog API.
fn cmd_serve(args: cli::ServeArgs) -> Result<()> {
    let magnitude_bounds = if args.explicit_magnitude_bounds {
        MagnitudeBounds::Explicit
    } else {
        MagnitudeBounds::Sentinel
    };

    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        database_url: args.database_url,
        max_connections: args.max_connections,
        query: QueryOptions {
            order: args.order,
            magnitude_bounds,
            max_limit: args.max_limit,
        },
    };

    // Print startup message
    println!("\x1b[1m🌍 quakescope API\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96mhttp://{}:{}\x1b[0m", args.host, args.port);
    println!("  Order:   {}", config.query.order.as_sql());
    println!("  Limit:   {} max", config.query.max_limit);
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config))
}

/// Execute the `catalogs` command - list active catalogs.
fn cmd_catalogs(args: &cli::CatalogsArgs) -> Result<()> {
    let client = ApiClient::new(&args.api_url).context("failed to create API client")?;

    let catalogs = client
        .fetch_catalogs()
        .context("failed to fetch catalogs")?;

    let listed = match args.overlays_for {
        Some(primary) => compare::overlay_candidates(&catalogs, primary)
            .into_iter()
            .cloned()
            .collect(),
        None => catalogs,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_catalogs(&mut handle, &listed, args.format)?;
    Ok(())
}

/// Execute the `query` command - one filter session against the API.
fn cmd_query(args: cli::QueryArgs) -> Result<()> {
    let client = ApiClient::new(&args.api_url).context("failed to create API client")?;

    let magnitude_bounds = if args.explicit_magnitude_bounds {
        MagnitudeBounds::Explicit
    } else {
        MagnitudeBounds::Sentinel
    };
    let mut controller =
        FilterController::new(&client, args.catalog).with_magnitude_bounds(magnitude_bounds);
    if let Some(limit) = args.limit {
        controller = controller.with_limit(limit);
    }

    let panel = Rc::new(RefCell::new(AnalyticsPanel::default()));
    controller.subscribe(Box::new(Rc::clone(&panel)));

    for edit in filter_edits(&args) {
        controller.edit(edit);
    }
    for &overlay in &args.overlays {
        if !controller.overlays_mut().add(overlay, args.catalog)? {
            warn!("ignoring overlay catalog {}", overlay);
        }
    }

    let mut view = TerminalView::default();
    match controller.apply(&mut view) {
        LoadOutcome::Loaded { count } => debug!("apply finished with {} events", count),
        LoadOutcome::Stale => anyhow::bail!("earthquake request was superseded"),
        LoadOutcome::Failed(e) => {
            return Err(e).context("failed to load earthquakes");
        }
    }

    let empty = FeatureCollection::new(Vec::new());
    let loaded = controller.loaded().unwrap_or(&empty);

    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        output::write_events(&mut handle, loaded, args.format)?;

        if args.summary {
            if let Some(summary) = panel.borrow().summary() {
                output::write_summary(&mut handle, summary)?;
            }
        }
        handle.flush()?;
    }

    for (overlay, result) in controller.load_overlays() {
        if let Ok(events) = result {
            info!(
                catalog = overlay.catalog_id,
                color = overlay.color.stroke,
                "overlay loaded {} events",
                events.len()
            );
        }
    }

    if let Some(format) = args.export {
        let path = args
            .export_dir
            .join(export::file_name(format, Utc::now().date_naive()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        export::export(&mut writer, controller.loaded(), format)?;
        writer.flush()?;
        info!("saved {}", path.display());
    }

    Ok(())
}

/// Translate query flags into control edits, in panel order.
fn filter_edits(args: &cli::QueryArgs) -> Vec<FilterEdit> {
    let mut edits = vec![
        FilterEdit::Depth(args.min_depth, args.max_depth),
        FilterEdit::Magnitude(args.min_magnitude, args.max_magnitude),
    ];

    let text = |value: Option<&String>| value.cloned().unwrap_or_default();

    edits.push(FilterEdit::StartDate(text(args.start.as_ref())));
    edits.push(FilterEdit::EndDate(text(args.end.as_ref())));
    for (edge, value) in [
        (Edge::MinLat, args.min_lat.as_ref()),
        (Edge::MaxLat, args.max_lat.as_ref()),
        (Edge::MinLon, args.min_lon.as_ref()),
        (Edge::MaxLon, args.max_lon.as_ref()),
    ] {
        edits.push(FilterEdit::Coordinate(edge, text(value)));
    }
    edits.push(FilterEdit::MaxHorizontalError(text(args.max_horizontal_error.as_ref())));
    edits.push(FilterEdit::MaxVerticalError(text(args.max_vertical_error.as_ref())));
    edits.push(FilterEdit::IncludeMissingUncertainty(
        !args.exclude_missing_uncertainty,
    ));
    edits
}

/// Dashboard surface for the terminal: reports what the map would show.
#[derive(Default)]
struct TerminalView {
    loading_since: Option<Instant>,
}

impl DashboardView for TerminalView {
    fn show_loading(&mut self) {
        self.loading_since = Some(Instant::now());
        debug!("loading earthquakes");
    }

    fn hide_loading(&mut self) {
        if let Some(started) = self.loading_since.take() {
            debug!("load finished in {:?}", started.elapsed());
        }
    }

    fn sync_controls(&mut self, filters: &FilterSet) {
        info!(
            min_lat = ?filters.min_lat,
            max_lat = ?filters.max_lat,
            min_lon = ?filters.min_lon,
            max_lon = ?filters.max_lon,
            "using corrected bounds"
        );
    }

    fn draw_bounds(&mut self, bounds: Option<&BoundingBox>) {
        if let Some(b) = bounds {
            debug!(ring = ?b.ring(), "bounding box");
        }
    }

    fn set_events(&mut self, events: &FeatureCollection) {
        info!("loaded {} earthquakes", events.len());
    }
}

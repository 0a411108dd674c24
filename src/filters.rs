//! Dashboard filter state.
//!
//! A [`FilterController`] owns the active [`FilterSet`] for one dashboard
//! session, mirrors it into API request parameters and fans each loaded
//! result out to the map view and the analytics views. All mutation goes
//! through [`FilterController::edit`] and the load entry points, so there is
//! exactly one writer.
//!
//! Loads are sequenced: each request gets a number and only the response to
//! the most recently issued request is applied. Responses to older requests
//! are dropped as stale.

use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::analytics::AnalyticsView;
use crate::compare::{Overlay, OverlaySelection, overlay_params};
use crate::errors::QuakeError;
use crate::models::{EarthquakesResponse, FeatureCollection};
use crate::query::{
    DEFAULT_MAX_DEPTH, DEFAULT_MIN_DEPTH, MAGNITUDE_CEILING, MAGNITUDE_FLOOR, MagnitudeBounds,
    UNCERTAINTY_CEILING, parse_date, parse_number,
};

/// Row limit the dashboard requests for the primary catalog.
pub const DEFAULT_REQUEST_LIMIT: u32 = 50_000;

/// Closed numeric range driven by a two-handle slider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// The user's current filter selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSet {
    pub depth: Range,
    /// Full slider range (0–10) means "do not filter"
    pub magnitude: Range,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
    pub max_horizontal_error: Option<f64>,
    pub max_vertical_error: Option<f64>,
    pub include_missing_uncertainty: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            depth: Range::new(DEFAULT_MIN_DEPTH, DEFAULT_MAX_DEPTH),
            magnitude: Range::new(MAGNITUDE_FLOOR, MAGNITUDE_CEILING),
            start_date: None,
            end_date: None,
            min_lat: None,
            max_lat: None,
            min_lon: None,
            max_lon: None,
            max_horizontal_error: None,
            max_vertical_error: None,
            include_missing_uncertainty: true,
        }
    }
}

/// Which reversed coordinate pairs were swapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundsSwap {
    pub lat: bool,
    pub lon: bool,
}

impl BoundsSwap {
    #[must_use]
    pub const fn any(self) -> bool {
        self.lat || self.lon
    }
}

impl FilterSet {
    /// Swap any min/max coordinate pair entered in reverse.
    pub fn normalize_bounds(&mut self) -> BoundsSwap {
        let lat = swap_if_reversed(&mut self.min_lat, &mut self.max_lat);
        let lon = swap_if_reversed(&mut self.min_lon, &mut self.max_lon);
        BoundsSwap { lat, lon }
    }

    /// The rectangle to outline on the map, when all four edges are set.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        Some(BoundingBox {
            min_lat: self.min_lat?,
            max_lat: self.max_lat?,
            min_lon: self.min_lon?,
            max_lon: self.max_lon?,
        })
    }

    /// Serialize to `/api/earthquakes` parameters.
    ///
    /// Depth is always sent. Magnitude bounds are only sent when they
    /// narrow the full slider range, and uncertainty thresholds only below
    /// the ceiling.
    #[must_use]
    pub fn to_params(&self, catalog_id: i32, limit: u32) -> RequestParams {
        self.to_params_with(catalog_id, limit, MagnitudeBounds::Sentinel)
    }

    /// Serialize under the given magnitude policy. With
    /// [`MagnitudeBounds::Explicit`] both magnitude bounds are always sent,
    /// for a server running the same policy.
    #[must_use]
    pub fn to_params_with(
        &self,
        catalog_id: i32,
        limit: u32,
        magnitude_bounds: MagnitudeBounds,
    ) -> RequestParams {
        let mut params = RequestParams::default();
        params.push("catalog", catalog_id);
        params.push("limit", limit);
        params.push("minDepth", self.depth.min);
        params.push("maxDepth", self.depth.max);

        let explicit = magnitude_bounds == MagnitudeBounds::Explicit;
        if explicit || self.magnitude.min > MAGNITUDE_FLOOR {
            params.push("minMagnitude", self.magnitude.min);
        }
        if explicit || self.magnitude.max < MAGNITUDE_CEILING {
            params.push("maxMagnitude", self.magnitude.max);
        }

        params.push_opt("startDate", self.start_date.map(|d| d.format("%Y-%m-%d")));
        params.push_opt("endDate", self.end_date.map(|d| d.format("%Y-%m-%d")));
        params.push_opt("minLat", self.min_lat);
        params.push_opt("maxLat", self.max_lat);
        params.push_opt("minLon", self.min_lon);
        params.push_opt("maxLon", self.max_lon);

        let horizontal = self
            .max_horizontal_error
            .filter(|t| *t < UNCERTAINTY_CEILING);
        let vertical = self.max_vertical_error.filter(|t| *t < UNCERTAINTY_CEILING);
        params.push_opt("maxHorizontalError", horizontal);
        params.push_opt("maxVerticalError", vertical);
        if horizontal.is_some() || vertical.is_some() {
            params.push("includeMissingUncertainty", self.include_missing_uncertainty);
        }

        params
    }
}

fn swap_if_reversed(min: &mut Option<f64>, max: &mut Option<f64>) -> bool {
    match (*min, *max) {
        (Some(lo), Some(hi)) if lo > hi => {
            *min = Some(hi);
            *max = Some(lo);
            true
        }
        _ => false,
    }
}

/// Geographic rectangle drawn as the spatial-filter overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Check if a point is within the bounding box.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Closed polygon ring, `[lon, lat]` pairs, counter-clockwise from the
    /// south-west corner.
    #[must_use]
    pub fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ]
    }
}

/// Ordered query-string pairs for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams(Vec<(&'static str, String)>);

impl RequestParams {
    pub fn push(&mut self, key: &'static str, value: impl fmt::Display) {
        self.0.push((key, value.to_string()));
    }

    pub fn push_opt<T: fmt::Display>(&mut self, key: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

impl fmt::Display for RequestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// One edge of the spatial filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    MinLat,
    MaxLat,
    MinLon,
    MaxLon,
}

/// A single control change.
///
/// Text-entry controls carry the raw text; anything that does not parse
/// clears the constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEdit {
    Depth(f64, f64),
    Magnitude(f64, f64),
    StartDate(String),
    EndDate(String),
    Coordinate(Edge, String),
    MaxHorizontalError(String),
    MaxVerticalError(String),
    IncludeMissingUncertainty(bool),
}

/// Where a filter session is in its edit / load cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Editing,
    /// A load is in flight
    Applying,
}

/// Fetches events for a set of request parameters.
pub trait EarthquakeSource {
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn fetch(&self, params: &RequestParams) -> Result<EarthquakesResponse, QuakeError>;
}

impl<T: EarthquakeSource + ?Sized> EarthquakeSource for &T {
    fn fetch(&self, params: &RequestParams) -> Result<EarthquakesResponse, QuakeError> {
        (**self).fetch(params)
    }
}

/// Map surface and filter controls the controller drives.
pub trait DashboardView {
    fn show_loading(&mut self);
    fn hide_loading(&mut self);
    /// Push filter values back into the visible controls.
    fn sync_controls(&mut self, filters: &FilterSet);
    /// Replace the bounding-box overlay, or remove it with `None`.
    fn draw_bounds(&mut self, bounds: Option<&BoundingBox>);
    /// Replace the event layer's data.
    fn set_events(&mut self, events: &FeatureCollection);
}

/// Hides the loading indicator when dropped.
struct LoadingGuard<'a> {
    view: &'a mut dyn DashboardView,
}

impl<'a> LoadingGuard<'a> {
    fn new(view: &'a mut dyn DashboardView) -> Self {
        Self { view }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.view.hide_loading();
    }
}

/// A request that has been issued but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    seq: u64,
    params: RequestParams,
}

impl PendingLoad {
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn params(&self) -> &RequestParams {
        &self.params
    }
}

/// Result of finishing a load.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The event layer now shows `count` events
    Loaded { count: usize },
    /// A newer request was issued; this response was discarded
    Stale,
    /// The fetch failed; the previous data is still shown
    Failed(QuakeError),
}

impl LoadOutcome {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Owns the filter session for one dashboard.
pub struct FilterController<S> {
    source: S,
    filters: FilterSet,
    catalog_id: i32,
    limit: u32,
    magnitude_bounds: MagnitudeBounds,
    state: SessionState,
    latest_request: u64,
    loaded: Option<FeatureCollection>,
    overlays: OverlaySelection,
    analytics: Vec<Box<dyn AnalyticsView>>,
}

impl<S: EarthquakeSource> FilterController<S> {
    pub fn new(source: S, catalog_id: i32) -> Self {
        Self {
            source,
            filters: FilterSet::default(),
            catalog_id,
            limit: DEFAULT_REQUEST_LIMIT,
            magnitude_bounds: MagnitudeBounds::Sentinel,
            state: SessionState::Idle,
            latest_request: 0,
            loaded: None,
            overlays: OverlaySelection::default(),
            analytics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Send magnitude bounds under the server's policy.
    #[must_use]
    pub fn with_magnitude_bounds(mut self, magnitude_bounds: MagnitudeBounds) -> Self {
        self.magnitude_bounds = magnitude_bounds;
        self
    }

    /// Register a view that is refreshed with every loaded feature set.
    pub fn subscribe(&mut self, view: Box<dyn AnalyticsView>) {
        self.analytics.push(view);
    }

    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn catalog_id(&self) -> i32 {
        self.catalog_id
    }

    /// The currently displayed events, kept for export.
    #[must_use]
    pub fn loaded(&self) -> Option<&FeatureCollection> {
        self.loaded.as_ref()
    }

    #[must_use]
    pub fn overlays(&self) -> &OverlaySelection {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlaySelection {
        &mut self.overlays
    }

    /// Apply one control change to the filter set.
    pub fn edit(&mut self, edit: FilterEdit) {
        let filters = &mut self.filters;
        match edit {
            FilterEdit::Depth(min, max) => filters.depth = Range::new(min, max),
            FilterEdit::Magnitude(min, max) => filters.magnitude = Range::new(min, max),
            FilterEdit::StartDate(raw) => filters.start_date = parse_date(&raw),
            FilterEdit::EndDate(raw) => filters.end_date = parse_date(&raw),
            FilterEdit::Coordinate(edge, raw) => {
                let value = parse_number(Some(raw.as_str()));
                match edge {
                    Edge::MinLat => filters.min_lat = value,
                    Edge::MaxLat => filters.max_lat = value,
                    Edge::MinLon => filters.min_lon = value,
                    Edge::MaxLon => filters.max_lon = value,
                }
            }
            FilterEdit::MaxHorizontalError(raw) => {
                filters.max_horizontal_error = parse_number(Some(raw.as_str()));
            }
            FilterEdit::MaxVerticalError(raw) => {
                filters.max_vertical_error = parse_number(Some(raw.as_str()));
            }
            FilterEdit::IncludeMissingUncertainty(include) => {
                filters.include_missing_uncertainty = include;
            }
        }

        if self.state == SessionState::Idle {
            self.state = SessionState::Editing;
        }
    }

    /// Start an Apply: correct reversed bounds, redraw the overlay and issue
    /// a request for the current filters.
    pub fn begin_apply(&mut self, view: &mut dyn DashboardView) -> PendingLoad {
        view.show_loading();

        let swap = self.filters.normalize_bounds();
        if swap.lat {
            warn!("auto-swapping: min lat > max lat");
        }
        if swap.lon {
            warn!("auto-swapping: min lon > max lon");
        }
        if swap.any() {
            view.sync_controls(&self.filters);
        }

        view.draw_bounds(self.filters.bounding_box().as_ref());

        let params =
            self.filters
                .to_params_with(self.catalog_id, self.limit, self.magnitude_bounds);
        self.issue(params)
    }

    /// Start a Reset: restore every control to its default and issue an
    /// unfiltered request for the current catalog.
    pub fn begin_reset(&mut self, view: &mut dyn DashboardView) -> PendingLoad {
        view.show_loading();

        self.filters = FilterSet::default();
        view.sync_controls(&self.filters);
        view.draw_bounds(None);

        let params =
            self.filters
                .to_params_with(self.catalog_id, self.limit, self.magnitude_bounds);
        self.issue(params)
    }

    /// Start a catalog switch and reload with the current filters.
    pub fn begin_catalog_switch(
        &mut self,
        catalog_id: i32,
        view: &mut dyn DashboardView,
    ) -> PendingLoad {
        if catalog_id != self.catalog_id {
            info!(from = self.catalog_id, to = catalog_id, "switching catalog");
            if self.overlays.is_enabled() {
                self.overlays.clear();
            }
            self.catalog_id = catalog_id;
        }
        self.begin_apply(view)
    }

    fn issue(&mut self, params: RequestParams) -> PendingLoad {
        self.latest_request += 1;
        self.state = SessionState::Applying;
        debug!(seq = self.latest_request, %params, "issuing earthquake request");
        PendingLoad {
            seq: self.latest_request,
            params,
        }
    }

    /// Finish a load with its response.
    ///
    /// Only the most recently issued request may change what is shown; a
    /// failure keeps the previous data.
    pub fn finish(
        &mut self,
        pending: PendingLoad,
        result: Result<EarthquakesResponse, QuakeError>,
        view: &mut dyn DashboardView,
    ) -> LoadOutcome {
        if pending.seq != self.latest_request {
            debug!(
                seq = pending.seq,
                latest = self.latest_request,
                "discarding stale response"
            );
            return LoadOutcome::Stale;
        }

        let guard = LoadingGuard::new(view);
        self.state = SessionState::Idle;

        match result {
            Ok(response) => {
                let collection = FeatureCollection::from(&response);
                guard.view.set_events(&collection);
                for analytics in &mut self.analytics {
                    analytics.update(&collection.features);
                }

                let count = collection.len();
                info!("loaded {} filtered earthquakes", count);
                self.loaded = Some(collection);
                LoadOutcome::Loaded { count }
            }
            Err(e) => {
                warn!("error fetching filtered data: {}", e);
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Apply the current filters and wait for the result.
    pub fn apply(&mut self, view: &mut dyn DashboardView) -> LoadOutcome {
        let pending = self.begin_apply(view);
        self.complete(pending, view)
    }

    /// Reset to defaults and reload the whole catalog.
    pub fn reset(&mut self, view: &mut dyn DashboardView) -> LoadOutcome {
        let pending = self.begin_reset(view);
        self.complete(pending, view)
    }

    /// Same transition as [`Self::reset`]; kept as its own entry point for
    /// the "Show All" control.
    pub fn show_all(&mut self, view: &mut dyn DashboardView) -> LoadOutcome {
        self.reset(view)
    }

    /// Switch the primary catalog and reload.
    pub fn switch_catalog(&mut self, catalog_id: i32, view: &mut dyn DashboardView) -> LoadOutcome {
        let pending = self.begin_catalog_switch(catalog_id, view);
        self.complete(pending, view)
    }

    /// Fetch every active overlay catalog. A failed overlay does not affect
    /// the others or the primary layer.
    pub fn load_overlays(&self) -> Vec<(Overlay, Result<FeatureCollection, QuakeError>)> {
        self.overlays
            .active()
            .iter()
            .map(|overlay| {
                let result = self
                    .source
                    .fetch(&overlay_params(overlay.catalog_id))
                    .map(|response| FeatureCollection::from(&response));
                if let Err(e) = &result {
                    warn!(catalog = overlay.catalog_id, "failed to load overlay: {}", e);
                }
                (*overlay, result)
            })
            .collect()
    }

    fn complete(&mut self, pending: PendingLoad, view: &mut dyn DashboardView) -> LoadOutcome {
        let result = self.source.fetch(pending.params());
        self.finish(pending, result, view)
    }
}

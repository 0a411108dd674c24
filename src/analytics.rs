//! Summary statistics behind the analytics panel.
//!
//! Chart drawing stays in the front end; this module computes the series it
//! plots: events per year, magnitude and depth histograms, and the depth
//! colour scale used by the map layer.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::models::Feature;

/// Magnitude bin edges; bins are half-open `[lo, hi)`.
pub const MAGNITUDE_BIN_EDGES: [f64; 13] = [
    -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
];

/// Depth bin edges in km; bins are half-open `[lo, hi)`.
pub const DEPTH_BIN_EDGES: [f64; 11] = [
    0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0,
];

/// Depth range used when no depths are available.
const FALLBACK_DEPTH_RANGE: (f64, f64) = (0.0, 60.0);

// Depth colours, shallow to deep
const SHALLOW: &str = "#fbbf24";
const MIDDLE: &str = "#f97316";
const DEEP: &str = "#dc2626";

/// A view that re-renders from each newly loaded feature set.
pub trait AnalyticsView {
    fn update(&mut self, features: &[Feature]);
}

impl<T: AnalyticsView + ?Sized> AnalyticsView for Rc<RefCell<T>> {
    fn update(&mut self, features: &[Feature]) {
        self.borrow_mut().update(features);
    }
}

/// Counts per half-open bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin values; values outside every bin are not counted.
    #[must_use]
    pub fn from_values(edges: &[f64], values: impl IntoIterator<Item = f64>) -> Self {
        let mut counts = vec![0; edges.len().saturating_sub(1)];
        for value in values {
            if let Some(i) = edges
                .windows(2)
                .position(|w| value >= w[0] && value < w[1])
            {
                counts[i] += 1;
            }
        }
        Self {
            edges: edges.to_vec(),
            counts,
        }
    }

    /// Labels such as `"2-3"`.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.edges
            .windows(2)
            .map(|w| format!("{}-{}", w[0], w[1]))
            .collect()
    }

    /// Share of `total` in each bin, in percent. Used when comparing
    /// catalogs of different sizes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentages(&self, total: usize) -> Vec<f64> {
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|c| *c as f64 / total as f64 * 100.0)
            .collect()
    }
}

/// Display range for depth colouring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthScale {
    pub min: f64,
    pub max: f64,
    /// Observed extremes before padding
    pub actual: Option<(f64, f64)>,
}

impl DepthScale {
    /// Pad the observed range by 10% and round outward to multiples of 5.
    #[must_use]
    pub fn from_depths(depths: impl IntoIterator<Item = f64>) -> Self {
        let (lo, hi) = depths
            .into_iter()
            .filter(|d| d.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            });

        if lo > hi {
            return Self {
                min: FALLBACK_DEPTH_RANGE.0,
                max: FALLBACK_DEPTH_RANGE.1,
                actual: None,
            };
        }

        let padding = (hi - lo) * 0.1;
        let padded_min = (lo - padding).floor().max(0.0);
        let padded_max = (hi + padding).ceil();

        Self {
            min: (padded_min / 5.0).floor() * 5.0,
            max: (padded_max / 5.0).ceil() * 5.0,
            actual: Some((lo, hi)),
        }
    }

    /// Boundaries between the shallow, middle and deep thirds.
    #[must_use]
    pub fn thresholds(&self) -> (f64, f64) {
        let third = (self.max - self.min) / 3.0;
        (self.min + third, self.min + 2.0 * third)
    }

    #[must_use]
    pub fn color_for(&self, depth: f64) -> &'static str {
        let (shallow, middle) = self.thresholds();
        if depth < shallow {
            SHALLOW
        } else if depth < middle {
            MIDDLE
        } else {
            DEEP
        }
    }

    /// Four legend ticks, the last open-ended ("60+").
    #[must_use]
    pub fn legend_labels(&self) -> [String; 4] {
        let (shallow, middle) = self.thresholds();
        [
            format!("{}", self.min.round()),
            format!("{}", shallow.round()),
            format!("{}", middle.round()),
            format!("{}+", self.max.round()),
        ]
    }
}

/// Everything the analytics panel plots for one feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub events_per_year: BTreeMap<i32, usize>,
    /// Events without a magnitude are left out
    pub magnitude: Histogram,
    pub depth: Histogram,
    pub depth_scale: DepthScale,
}

impl AnalyticsSummary {
    #[must_use]
    pub fn from_features(features: &[Feature]) -> Self {
        let mut events_per_year = BTreeMap::new();
        for feature in features {
            *events_per_year.entry(feature.year()).or_insert(0) += 1;
        }

        let depths = || features.iter().map(|f| f.properties.depth);

        Self {
            total: features.len(),
            events_per_year,
            magnitude: Histogram::from_values(
                &MAGNITUDE_BIN_EDGES,
                features.iter().filter_map(|f| f.properties.mag),
            ),
            depth: Histogram::from_values(&DEPTH_BIN_EDGES, depths()),
            depth_scale: DepthScale::from_depths(depths()),
        }
    }
}

/// Analytics panel state: the summary of the last non-empty load.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsPanel {
    summary: Option<AnalyticsSummary>,
}

impl AnalyticsPanel {
    #[must_use]
    pub fn summary(&self) -> Option<&AnalyticsSummary> {
        self.summary.as_ref()
    }
}

impl AnalyticsView for AnalyticsPanel {
    fn update(&mut self, features: &[Feature]) {
        // An empty load keeps the previous charts.
        if features.is_empty() {
            return;
        }
        self.summary = Some(AnalyticsSummary::from_features(features));
    }
}

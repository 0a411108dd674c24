//! Compare mode: secondary catalogs drawn over the primary one.

use crate::errors::QuakeError;
use crate::filters::RequestParams;
use crate::models::Catalog;

/// At most this many overlay catalogs are shown at once.
pub const MAX_OVERLAYS: usize = 3;

/// Overlays are drawn from an unfiltered sample of this size.
pub const OVERLAY_REQUEST_LIMIT: u32 = 10_000;

/// Stroke and fill for one overlay catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayColor {
    pub stroke: &'static str,
    pub fill: &'static str,
}

/// Overlay palette: blue, green, orange.
pub const OVERLAY_COLORS: [OverlayColor; 3] = [
    OverlayColor {
        stroke: "#3b82f6",
        fill: "rgba(59, 130, 246, 0.3)",
    },
    OverlayColor {
        stroke: "#10b981",
        fill: "rgba(16, 185, 129, 0.3)",
    },
    OverlayColor {
        stroke: "#f97316",
        fill: "rgba(249, 115, 22, 0.3)",
    },
];

/// Name sort key for catalogs with no year in their name.
const UNDATED_YEAR: i32 = 9999;

/// An overlay catalog and its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub catalog_id: i32,
    pub color: OverlayColor,
}

/// Active overlay catalogs.
#[derive(Debug, Clone, Default)]
pub struct OverlaySelection {
    enabled: bool,
    active: Vec<Overlay>,
}

impl OverlaySelection {
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Leave compare mode, dropping every overlay.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.clear();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn active(&self) -> &[Overlay] {
        &self.active
    }

    #[must_use]
    pub fn contains(&self, catalog_id: i32) -> bool {
        self.active.iter().any(|o| o.catalog_id == catalog_id)
    }

    /// Add an overlay, enabling compare mode if needed.
    ///
    /// Returns `Ok(false)` for the primary catalog or one already shown.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::OverlayLimit`] when [`MAX_OVERLAYS`] are active.
    pub fn add(&mut self, catalog_id: i32, primary_id: i32) -> Result<bool, QuakeError> {
        if catalog_id == primary_id || self.contains(catalog_id) {
            return Ok(false);
        }
        if self.active.len() >= MAX_OVERLAYS {
            return Err(QuakeError::OverlayLimit { max: MAX_OVERLAYS });
        }

        self.enabled = true;
        let color = self.next_color();
        self.active.push(Overlay { catalog_id, color });
        Ok(true)
    }

    pub fn remove(&mut self, catalog_id: i32) -> bool {
        let before = self.active.len();
        self.active.retain(|o| o.catalog_id != catalog_id);
        self.active.len() != before
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// First palette entry not already in use.
    fn next_color(&self) -> OverlayColor {
        OVERLAY_COLORS
            .iter()
            .copied()
            .find(|c| self.active.iter().all(|o| o.color != *c))
            .unwrap_or(OVERLAY_COLORS[self.active.len() % OVERLAY_COLORS.len()])
    }
}

/// Request parameters for an overlay catalog. Overlays ignore the filter
/// panel.
#[must_use]
pub fn overlay_params(catalog_id: i32) -> RequestParams {
    let mut params = RequestParams::default();
    params.push("catalog", catalog_id);
    params.push("limit", OVERLAY_REQUEST_LIMIT);
    params
}

/// Catalogs that may be overlaid on `primary_id`, oldest publication first.
#[must_use]
pub fn overlay_candidates(catalogs: &[Catalog], primary_id: i32) -> Vec<&Catalog> {
    let mut candidates: Vec<&Catalog> = catalogs
        .iter()
        .filter(|c| c.catalog_id != primary_id)
        .collect();
    candidates.sort_by_key(|c| c.publication_year().unwrap_or(UNDATED_YEAR));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(id: i32, name: &str) -> Catalog {
        Catalog {
            catalog_id: id,
            catalog_name: name.into(),
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
        }
    }

    #[test]
    fn test_overlay_limit() {
        let mut overlays = OverlaySelection::default();
        assert!(overlays.add(2, 1).unwrap());
        assert!(overlays.add(3, 1).unwrap());
        assert!(overlays.add(4, 1).unwrap());
        assert!(overlays.is_enabled());
        assert!(matches!(
            overlays.add(5, 1),
            Err(QuakeError::OverlayLimit { max: 3 })
        ));

        let colors: Vec<_> = overlays.active().iter().map(|o| o.color.stroke).collect();
        assert_eq!(colors, ["#3b82f6", "#10b981", "#f97316"]);
    }

    #[test]
    fn test_primary_and_duplicates_are_ignored() {
        let mut overlays = OverlaySelection::default();
        assert!(!overlays.add(1, 1).unwrap());
        assert!(overlays.add(2, 1).unwrap());
        assert!(!overlays.add(2, 1).unwrap());
        assert_eq!(overlays.active().len(), 1);
    }

    #[test]
    fn test_freed_color_is_reused() {
        let mut overlays = OverlaySelection::default();
        overlays.add(2, 1).unwrap();
        overlays.add(3, 1).unwrap();
        assert!(overlays.remove(2));
        overlays.add(4, 1).unwrap();
        assert_eq!(overlays.active()[1].color, OVERLAY_COLORS[0]);
    }

    #[test]
    fn test_disable_clears() {
        let mut overlays = OverlaySelection::default();
        overlays.add(2, 1).unwrap();
        overlays.disable();
        assert!(!overlays.is_enabled());
        assert!(overlays.active().is_empty());
    }

    #[test]
    fn test_overlay_params_are_unfiltered() {
        assert_eq!(overlay_params(7).to_string(), "catalog=7&limit=10000");
    }

    #[test]
    fn test_candidates_sorted_by_year() {
        let catalogs = vec![
            catalog(1, "Primary (2020)"),
            catalog(2, "Later et al. (2023)"),
            catalog(3, "Undated catalog"),
            catalog(4, "Earlier et al. (2011)"),
        ];
        let ids: Vec<i32> = overlay_candidates(&catalogs, 1)
            .iter()
            .map(|c| c.catalog_id)
            .collect();
        assert_eq!(ids, vec![4, 2, 3]);
    }
}

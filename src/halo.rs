//! # Derived halo geometry
//!
//! Some processes require a protective layer around every place where a
//! contact lands on gate poly. The pass intersects the two source layers,
//! pads each overlap, and bridges pads whose centers are close together.
//! It reads the cell's full hierarchy but only ever draws into the cell itself.

use arcstr::ArcStr;
use itertools::Itertools;
use serde::Serialize;

use crate::error::Result;
use crate::geometry::{Int, Rect, RectExt};
use crate::layout::boolean::Region;
use crate::layout::flat::{flatten, FlatCell};
use crate::layout::{CellId, GdsLayer, Library};
use crate::tech::TechMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaloRule {
    /// Abstract name of the contact layer.
    pub contact: ArcStr,
    /// Abstract name of the gate poly layer.
    pub poly: ArcStr,
    /// Abstract name of the layer the halo is drawn on.
    pub layer: ArcStr,
    /// Margin added around each contact/poly overlap.
    pub pad: Int,
    /// Padded overlaps whose centers are closer than this in both axes are bridged.
    pub threshold: Int,
}

impl HaloRule {
    /// Adds halo rectangles to `cell` and returns how many were drawn.
    pub fn apply(&self, lib: &mut Library, cell: CellId, tech: &TechMap) -> Result<usize> {
        let contact_layer = tech.layer_of(&self.contact)?;
        let poly_layer = tech.layer_of(&self.poly)?;
        let halo_layer = tech.layer_of(&self.layer)?;

        let flat = flatten(lib, cell)?;
        let contacts = region(&flat, contact_layer);
        let poly = region(&flat, poly_layer);
        let existing = region(&flat, halo_layer);

        // Cells with fewer than two contacts or two poly shapes are skipped
        // entirely, even if they hold one contact-over-poly overlap.
        let (n_contacts, n_poly) = (contacts.polygons().len(), poly.polygons().len());
        if n_contacts < 2 || n_poly < 2 {
            log::debug!(
                "{}: skipping halo pass ({n_contacts} contact and {n_poly} poly polygons)",
                flat.name
            );
            return Ok(0);
        }

        let overlaps = contacts.intersect(&poly).subtract(&existing);
        let candidates: Vec<Rect> = overlaps
            .polygons()
            .iter()
            .filter_map(|p| p.bbox())
            .map(|r| r.expand(self.pad))
            .collect();
        let merged = merge_candidates(&candidates, self.threshold);

        let count = candidates.len() + merged.len();
        for rect in candidates.into_iter().chain(merged) {
            lib.draw_rect(cell, halo_layer, rect)?;
        }
        log::debug!("{}: drew {count} `{}` rectangles", flat.name, self.layer);
        Ok(count)
    }
}

fn region(flat: &FlatCell, layer: GdsLayer) -> Region {
    flat.on_layer(layer).cloned().collect()
}

/// For every unordered pair of candidates whose centers are closer than
/// `threshold` along both axes, the bounding box of the pair.
///
/// Candidates are never removed and overlapping merges are not deduplicated.
pub fn merge_candidates(candidates: &[Rect], threshold: Int) -> Vec<Rect> {
    candidates
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| {
            // Doubled centers keep odd-sized rectangles exact.
            let (ca, cb) = (a.center2(), b.center2());
            (ca.x - cb.x).abs() < 2 * threshold && (ca.y - cb.y).abs() < 2 * threshold
        })
        .map(|(a, b)| a.hull(b))
        .collect()
}

/// Runs the halo pass declared by `tech`, if any, on `cell`.
///
/// Returns the number of rectangles drawn; zero when the process has no
/// halo rule.
pub fn run_derived_geometry_pass(lib: &mut Library, cell: CellId, tech: &TechMap) -> Result<usize> {
    match tech.halo_rule() {
        Some(rule) => rule.apply(lib, cell, tech),
        None => Ok(0),
    }
}

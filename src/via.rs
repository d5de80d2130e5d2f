//! # Via synthesis
//!
//! Joins two routing layers with either a minimal tower (one cut per level,
//! each enclosed by a minimum-size pad) or a tiled array of cuts filling a
//! target footprint. The array is chosen whenever the tower would not fit.
//!
//! Via geometry is always centered on the origin; callers instance the cell
//! at the point where the via should sit.

use arcstr::ArcStr;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Dims, Int, Point, Rect, RectExt};
use crate::layout::{Cell, CellId, Library, Port};
use crate::tech::{CutRule, TechMap};

pub const BOTTOM_PORT_PREFIX: &str = "bottom_met";
pub const TOP_PORT_PREFIX: &str = "top_met";

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Builder)]
pub struct ViaParams {
    /// One of the layers to join. Order does not matter; the lower layer in
    /// the stack becomes the bottom of the via.
    #[builder(setter(into))]
    pub bottom: ArcStr,
    #[builder(setter(into))]
    pub top: ArcStr,
    /// The largest area the via may occupy.
    #[builder(default, setter(strip_option))]
    pub footprint: Option<Dims>,
    /// Extend the bottom pad to exactly the footprint.
    #[builder(default)]
    pub full_bottom: bool,
    /// Extend the top pad to exactly the footprint.
    #[builder(default)]
    pub full_top: bool,
}

impl ViaParams {
    #[inline]
    pub fn builder() -> ViaParamsBuilder {
        ViaParamsBuilder::default()
    }

    pub fn new(a: impl Into<ArcStr>, b: impl Into<ArcStr>) -> Self {
        Self {
            bottom: a.into(),
            top: b.into(),
            footprint: None,
            full_bottom: false,
            full_top: false,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ViaKind {
    /// A single cut per level.
    Tower,
    /// Rows and columns of the lowest cut level.
    Array { rows: usize, cols: usize },
    /// Both sides are the same layer; a plain pad, no cut.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub cell: CellId,
    pub kind: ViaKind,
    /// Extent of the via's bounding box.
    pub size: Dims,
    pub bottom: ArcStr,
    pub top: ArcStr,
}

/// One level of the stack being joined: its layer name and the pad drawn on it.
struct Level {
    name: ArcStr,
    pad: Rect,
}

pub fn synthesize_via(lib: &mut Library, tech: &TechMap, params: &ViaParams) -> Result<Via> {
    let (a, b) = (params.bottom.as_str(), params.top.as_str());
    tech.layer_of(a)?;
    tech.layer_of(b)?;
    let (la, lb) = (tech.level_of(a)?, tech.level_of(b)?);

    if a == b {
        return draw_direct(lib, tech, params);
    }
    if la == lb {
        return Err(Error::precondition(format!(
            "cannot join `{a}` and `{b}`: both are on routing level {la}"
        )));
    }

    let (bottom, top, lo, hi) = if la < lb {
        (params.bottom.clone(), params.top.clone(), la, lb)
    } else {
        (params.top.clone(), params.bottom.clone(), lb, la)
    };
    let cuts = (lo..hi)
        .map(|level| tech.cut_between(level))
        .collect::<Result<Vec<_>>>()?;

    let natural = Dims::square(
        (0..=cuts.len())
            .map(|i| tower_pad(&cuts, i))
            .max()
            .unwrap_or_default(),
    );

    let name = lib.fresh_name(&format!("via_{bottom}_{top}"));
    let mut cell = lib.new_cell(name.as_str());
    let names = level_names(tech, &bottom, &top, lo, hi)?;

    let (kind, levels) = match params.footprint {
        Some(fp) if natural.exceeds(fp) => {
            let (rows, cols, levels) = draw_array(&mut cell, tech, &cuts, names, fp, params)?;
            log::debug!(
                "via {bottom} -> {top}: tower {}x{} exceeds footprint {}x{}, using {rows}x{cols} array",
                natural.w,
                natural.h,
                fp.w,
                fp.h
            );
            (ViaKind::Array { rows, cols }, levels)
        }
        _ => {
            log::debug!("via {bottom} -> {top}: tower {}x{}", natural.w, natural.h);
            let levels = draw_tower(&mut cell, tech, &cuts, names, params)?;
            (ViaKind::Tower, levels)
        }
    };

    for level in levels.iter() {
        cell.draw_rect(tech.layer_of(&level.name)?, level.pad.clone())?;
    }
    if let (Some(first), Some(last)) = (levels.first(), levels.last()) {
        cell.add_ports(Port::edges_of(BOTTOM_PORT_PREFIX, &first.pad, &first.name));
        cell.add_ports(Port::edges_of(TOP_PORT_PREFIX, &last.pad, &last.name));
    }

    finish(lib, cell, kind, bottom, top)
}

fn finish(lib: &mut Library, cell: Cell, kind: ViaKind, bottom: ArcStr, top: ArcStr) -> Result<Via> {
    let size = cell.elems_bbox().map(|r| r.dims()).unwrap_or_default();
    let cell = lib.add_cell(cell);
    Ok(Via {
        cell,
        kind,
        size,
        bottom,
        top,
    })
}

/// Side of the smallest square pad on stack position `i` that encloses the
/// cuts directly below and above it.
fn tower_pad(cuts: &[&CutRule], i: usize) -> Int {
    let below = if i > 0 { cuts[i - 1].pad_above() } else { 0 };
    let above = cuts.get(i).map(|c| c.pad_below()).unwrap_or_default();
    below.max(above)
}

fn level_names(
    tech: &TechMap,
    bottom: &ArcStr,
    top: &ArcStr,
    lo: usize,
    hi: usize,
) -> Result<Vec<ArcStr>> {
    let mut names = vec![bottom.clone()];
    for level in lo + 1..hi {
        names.push(tech.routing_layer(level)?.into());
    }
    names.push(top.clone());
    Ok(names)
}

fn draw_tower(
    cell: &mut Cell,
    tech: &TechMap,
    cuts: &[&CutRule],
    names: Vec<ArcStr>,
    params: &ViaParams,
) -> Result<Vec<Level>> {
    for cut in cuts.iter() {
        cell.draw_rect(
            tech.layer_of(&cut.layer)?,
            Rect::from_center(Point::new(0, 0), Dims::square(cut.size)),
        )?;
    }

    let n = names.len();
    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let full = (i == 0 && params.full_bottom) || (i == n - 1 && params.full_top);
            let dims = match params.footprint {
                Some(fp) if full => fp,
                _ => Dims::square(tower_pad(cuts, i)),
            };
            Level {
                name,
                pad: Rect::from_center(Point::new(0, 0), dims),
            }
        })
        .collect())
}

/// How many cuts of `cut` fit along `len`.
fn fit(len: Int, cut: &CutRule) -> usize {
    ((len + cut.spacing) / cut.pitch()).max(0) as usize
}

fn draw_array(
    cell: &mut Cell,
    tech: &TechMap,
    cuts: &[&CutRule],
    names: Vec<ArcStr>,
    fp: Dims,
    params: &ViaParams,
) -> Result<(usize, usize, Vec<Level>)> {
    let region = Rect::from_center(Point::new(0, 0), fp);
    let mut blocks = Vec::with_capacity(cuts.len());
    let mut counts = Vec::with_capacity(cuts.len());

    for cut in cuts.iter() {
        let (mut rows, mut cols) = (fit(fp.h, cut), fit(fp.w, cut));
        if rows == 0 || cols == 0 {
            log::warn!(
                "footprint {}x{} is too small for a {}x{} `{}` cut; placing a single cut",
                fp.w,
                fp.h,
                cut.size,
                cut.size,
                cut.layer
            );
            rows = rows.max(1);
            cols = cols.max(1);
        }
        let block = Rect::from_center(
            Point::new(0, 0),
            Dims::new(
                cols as Int * cut.pitch() - cut.spacing,
                rows as Int * cut.pitch() - cut.spacing,
            ),
        );
        let layer = tech.layer_of(&cut.layer)?;
        for r in 0..rows as Int {
            for c in 0..cols as Int {
                let left = block.left() + c * cut.pitch();
                let bottom = block.bottom() + r * cut.pitch();
                cell.draw_rect(
                    layer,
                    Rect::from_sides(left, bottom, left + cut.size, bottom + cut.size),
                )?;
            }
        }
        blocks.push(block);
        counts.push((rows, cols));
    }

    let n = names.len();
    let levels = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let below = if i > 0 { blocks.get(i - 1) } else { None };
            let above = blocks.get(i);
            let full = (i == 0 && params.full_bottom) || (i == n - 1 && params.full_top);
            let pad = match (below, above) {
                (Some(b), Some(a)) => b.hull(a).hull(&region),
                _ if full => region.clone(),
                // Outer pads that do not fill the footprint still enclose their cuts.
                (None, Some(a)) => a.expand(cuts[0].enclosure_below),
                (Some(b), None) => b.expand(cuts[cuts.len() - 1].enclosure_above),
                (None, None) => region.clone(),
            };
            Level { name, pad }
        })
        .collect();

    let (rows, cols) = counts.first().copied().unwrap_or((1, 1));
    Ok((rows, cols, levels))
}

fn draw_direct(lib: &mut Library, tech: &TechMap, params: &ViaParams) -> Result<Via> {
    let name = params.bottom.clone();
    let dims = match params.footprint {
        Some(fp) => fp,
        None => Dims::square(tech.rule(&name)?.min_width),
    };
    let pad = Rect::from_center(Point::new(0, 0), dims);
    let cell_name = lib.fresh_name(&format!("via_{name}"));
    let mut cell = lib.new_cell(cell_name.as_str());
    cell.draw_rect(tech.layer_of(&name)?, pad.clone())?;
    cell.add_ports(Port::edges_of(BOTTOM_PORT_PREFIX, &pad, &name));
    cell.add_ports(Port::edges_of(TOP_PORT_PREFIX, &pad, &name));
    log::debug!("via {name} -> {name}: direct pad {}x{}", dims.w, dims.h);
    finish(lib, cell, ViaKind::Direct, name.clone(), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_tech;

    fn via(lib: &mut Library, tech: &TechMap, fp: Option<Dims>) -> Result<Via> {
        let mut params = ViaParams::builder();
        params.bottom("poly").top("met1").full_bottom(true).full_top(true);
        if let Some(fp) = fp {
            params.footprint(fp);
        }
        synthesize_via(lib, tech, &params.build().unwrap())
    }

    #[test]
    fn test_oversized_tower_becomes_array() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_oversized_tower_becomes_array");
        // The minimal tower is 600x600; the target is only 500x500.
        let v = via(&mut lib, &tech, Some(Dims::square(500)))?;
        assert_eq!(v.kind, ViaKind::Array { rows: 2, cols: 2 });
        assert_eq!(v.size, Dims::square(500));

        let cell = lib.cell(v.cell)?;
        let cuts = cell.elems_on(tech.layer_of("cont")?)?;
        assert_eq!(cuts.len(), 4);
        let region = Rect::from_center(Point::new(0, 0), Dims::square(500));
        assert!(cuts.iter().all(|c| region.encloses(c)));
        Ok(())
    }

    #[test]
    fn test_partial_array_pads_enclose_cuts() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_partial_array_pads_enclose_cuts");
        let params = ViaParams::builder()
            .bottom("poly")
            .top("met1")
            .footprint(Dims::square(500))
            .full_top(true)
            .build()
            .unwrap();
        let v = synthesize_via(&mut lib, &tech, &params)?;
        assert_eq!(v.kind, ViaKind::Array { rows: 2, cols: 2 });

        let cell = lib.cell(v.cell)?;
        let cont = tech.cut_between(0)?;
        let poly = cell.elems_on(tech.layer_of("poly")?)?;
        assert_eq!(poly, vec![Rect::from_sides(-450, -450, 450, 450)]);
        for cut in cell.elems_on(tech.layer_of("cont")?)? {
            assert!(poly[0].encloses(&cut.expand(cont.enclosure_below)));
        }
        let met1 = cell.elems_on(tech.layer_of("met1")?)?;
        assert_eq!(met1, vec![Rect::from_sides(-250, -250, 250, 250)]);
        assert_eq!(v.size, Dims::square(900));

        let params = ViaParams::builder()
            .bottom("poly")
            .top("met1")
            .footprint(Dims::square(500))
            .full_bottom(true)
            .build()
            .unwrap();
        let v = synthesize_via(&mut lib, &tech, &params)?;
        let met1 = lib.cell(v.cell)?.elems_on(tech.layer_of("met1")?)?;
        assert_eq!(met1, vec![Rect::from_sides(-450, -450, 450, 450)]);
        Ok(())
    }

    #[test]
    fn test_tower_when_it_fits() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_tower_when_it_fits");
        let v = via(&mut lib, &tech, Some(Dims::square(1000)))?;
        assert_eq!(v.kind, ViaKind::Tower);
        assert_eq!(v.size, Dims::square(1000));

        let v = synthesize_via(&mut lib, &tech, &ViaParams::new("met1", "poly"))?;
        assert_eq!(v.kind, ViaKind::Tower);
        assert_eq!(v.size, Dims::square(600));
        assert_eq!(v.bottom, "poly");
        assert_eq!(v.top, "met1");
        Ok(())
    }

    #[test]
    fn test_infeasible_footprint_places_one_cut() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_infeasible_footprint_places_one_cut");
        let v = via(&mut lib, &tech, Some(Dims::square(100)))?;
        assert_eq!(v.kind, ViaKind::Array { rows: 1, cols: 1 });
        let cell = lib.cell(v.cell)?;
        assert_eq!(cell.elems_on(tech.layer_of("cont")?)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_via_selection_is_deterministic() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_via_selection_is_deterministic");
        let fp = Some(Dims::new(500, 900));
        let v1 = via(&mut lib, &tech, fp)?;
        let v2 = via(&mut lib, &tech, fp)?;
        assert_eq!(v1.kind, v2.kind);
        assert_eq!(v1.size, v2.size);
        assert_ne!(lib.cell(v1.cell)?.name(), lib.cell(v2.cell)?.name());
        assert_eq!(lib.cell(v1.cell)?.shapes()?, lib.cell(v2.cell)?.shapes()?);
        assert_eq!(lib.cell(v1.cell)?.ports, lib.cell(v2.cell)?.ports);
        Ok(())
    }

    #[test]
    fn test_via_ports() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_via_ports");
        let v = synthesize_via(&mut lib, &tech, &ViaParams::new("poly", "met1"))?;
        let cell = lib.cell(v.cell)?;
        assert_eq!(cell.ports.len(), 8);
        let top = cell.port("top_met_E")?;
        assert_eq!(top.layer, "met1");
        assert_eq!(top.center, Point::new(300, 0));
        assert_eq!(cell.port("bottom_met_S")?.layer, "poly");
        Ok(())
    }

    #[test]
    fn test_stacked_via() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_stacked_via");
        let v = synthesize_via(&mut lib, &tech, &ViaParams::new("met2", "poly"))?;
        assert_eq!(v.kind, ViaKind::Tower);
        let cell = lib.cell(v.cell)?;
        assert_eq!(cell.elems_on(tech.layer_of("cont")?)?.len(), 1);
        assert_eq!(cell.elems_on(tech.layer_of("via1")?)?.len(), 1);
        assert_eq!(cell.elems_on(tech.layer_of("met1")?)?.len(), 1);
        assert_eq!(cell.port("top_met_N")?.layer, "met2");
        Ok(())
    }

    #[test]
    fn test_same_layer_is_direct() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_same_layer_is_direct");
        let v = synthesize_via(&mut lib, &tech, &ViaParams::new("met1", "met1"))?;
        assert_eq!(v.kind, ViaKind::Direct);
        assert_eq!(v.size, Dims::square(tech.rule("met1")?.min_width));
        Ok(())
    }

    #[test]
    fn test_via_errors() {
        let tech = test_tech();
        let mut lib = Library::new("test_via_errors");
        assert!(matches!(
            synthesize_via(&mut lib, &tech, &ViaParams::new("poly", "diff")),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            synthesize_via(&mut lib, &tech, &ViaParams::new("poly", "met7")),
            Err(Error::UnknownLayer { .. })
        ));
        assert!(lib.is_empty());
    }
}

use arcstr::ArcStr;
use derive_builder::Builder;
use rust_decimal_macros::dec;

use super::{layer_or, place_via, point_on, sign, span_rect, ViaOffset};
use crate::error::{Error, Result};
use crate::geometry::{Dims, Dir, Int, Rect, RectExt};
use crate::layout::{rename_ports_by_orientation, CellId, Library, Port};
use crate::tech::TechMap;
use crate::via::{synthesize_via, ViaParams};

#[derive(Debug, Clone, Eq, PartialEq, Builder)]
#[builder(default)]
pub struct CRouteOpts {
    /// How far the cross leg sits beyond the outermost port. Defaults to 0.5um.
    #[builder(setter(strip_option))]
    pub extension: Option<Int>,
    #[builder(setter(strip_option))]
    pub width1: Option<Int>,
    #[builder(setter(strip_option))]
    pub width2: Option<Int>,
    /// Width of the cross leg; defaults to the wider of the two legs.
    #[builder(setter(strip_option))]
    pub cwidth: Option<Int>,
    #[builder(setter(into, strip_option))]
    pub layer1: Option<ArcStr>,
    #[builder(setter(into, strip_option))]
    pub layer2: Option<ArcStr>,
    /// Layer of the cross leg; defaults to the first port's layer.
    #[builder(setter(into, strip_option))]
    pub clayer: Option<ArcStr>,
    pub via_offset: ViaOffset,
    pub full_bottom: bool,
}

impl Default for CRouteOpts {
    fn default() -> Self {
        Self {
            extension: None,
            width1: None,
            width2: None,
            cwidth: None,
            layer1: None,
            layer2: None,
            clayer: None,
            via_offset: ViaOffset::both(),
            full_bottom: true,
        }
    }
}

impl CRouteOpts {
    #[inline]
    pub fn builder() -> CRouteOptsBuilder {
        CRouteOptsBuilder::default()
    }
}

/// Joins two ports on a common axis with a three-segment "C".
///
/// A leg leaves each port in the direction `edge1` faces, runs to
/// `extension` past the outermost of the two ports, and the legs are joined
/// there by a cross leg. The result exposes the cross leg's edges as
/// `con_N`, `con_E`, `con_S` and `con_W`.
pub fn c_route(
    lib: &mut Library,
    tech: &TechMap,
    edge1: &Port,
    edge2: &Port,
    opts: &CRouteOpts,
) -> Result<CellId> {
    let axis = edge1.orientation.axis();
    if edge2.orientation.axis() != axis {
        return Err(Error::precondition(format!(
            "C-route ports `{}` ({}) and `{}` ({}) are not parallel",
            edge1.name, edge1.orientation, edge2.name, edge2.orientation
        )));
    }
    let (c1, c2) = (edge1.center.coord(!axis), edge2.center.coord(!axis));
    if c1 == c2 {
        return Err(Error::precondition(format!(
            "C-route ports `{}` and `{}` are not offset from each other",
            edge1.name, edge2.name
        )));
    }

    let extension = match opts.extension {
        Some(ext) => ext,
        None => tech.to_dbu(dec!(0.5))?,
    };
    let w1 = opts.width1.unwrap_or(edge1.width);
    let w2 = opts.width2.unwrap_or(edge2.width);
    let cwidth = opts.cwidth.unwrap_or_else(|| w1.max(w2));
    let layer1 = layer_or(&opts.layer1, edge1);
    let layer2 = layer_or(&opts.layer2, edge2);
    let clayer = layer_or(&opts.clayer, edge1);

    let dir = edge1.orientation.sign();
    let (a1, a2) = (edge1.center.coord(axis), edge2.center.coord(axis));
    let extreme = if dir > 0 { a1.max(a2) } else { a1.min(a2) };
    let far = extreme + dir * extension;
    let near = far - dir * cwidth;

    let leg1 = span_rect(axis, a1, far, c1, w1);
    let leg2 = span_rect(axis, a2, far, c2, w2);
    let (lo1, lo2) = (c1 - w1 / 2, c2 - w2 / 2);
    let (span_lo, span_hi) = (lo1.min(lo2), (lo1 + w1).max(lo2 + w2));
    let cross = match axis {
        Dir::Horiz => Rect::from_sides(near, span_lo, far, span_hi),
        Dir::Vert => Rect::from_sides(span_lo, near, span_hi, far),
    };

    let name = lib.fresh_name("c_route");
    let mut cell = lib.new_cell(name.as_str());
    cell.draw_rect(tech.layer_of(&layer1)?, leg1)?;
    cell.draw_rect(tech.layer_of(&layer2)?, leg2)?;
    cell.draw_rect(tech.layer_of(&clayer)?, cross.clone())?;

    let corners = [(&layer1, c1, w1, c2), (&layer2, c2, w2, c1)];
    for (i, (layer, c, w, other)) in corners.into_iter().enumerate() {
        if *layer == clayer {
            continue;
        }
        let footprint = match axis {
            Dir::Horiz => Dims::new(cwidth, w),
            Dir::Vert => Dims::new(w, cwidth),
        };
        let via = synthesize_via(
            lib,
            tech,
            &ViaParams {
                bottom: layer.clone(),
                top: clayer.clone(),
                footprint: Some(footprint),
                full_bottom: opts.full_bottom,
                full_top: true,
            },
        )?;
        let (via_along, via_across) = match axis {
            Dir::Horiz => (via.size.w, via.size.h),
            Dir::Vert => (via.size.h, via.size.w),
        };
        // Pull the via back toward the ports and in toward the other leg.
        let along = far - dir * (cwidth / 2)
            + opts.via_offset.shift(axis, cwidth, via_along, -dir);
        let across = c + opts.via_offset.shift(!axis, w, via_across, sign(other - c));
        // Only the cross leg's edges are exposed, so the via's ports are dropped.
        place_via(
            lib,
            &mut cell,
            &via,
            &format!("corner{}", i + 1),
            point_on(axis, along, across),
        )?;
    }

    cell.add_ports(Port::edges_of("con", &cross, &clayer));
    log::debug!(
        "c-route {} -> {}: legs to {far} on {layer1}/{layer2}, cross leg {cross:?} on {clayer}",
        edge1.name,
        edge2.name
    );
    rename_ports_by_orientation(&mut cell);
    Ok(lib.add_cell(cell))
}

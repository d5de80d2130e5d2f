use arcstr::ArcStr;
use derive_builder::Builder;

use super::{place_via, ViaOffset};
use crate::error::{Error, Result};
use crate::geometry::{Dims, Dir, Int, Point, Rect, RectExt};
use crate::layout::{rename_ports_by_orientation, CellId, Library, Port};
use crate::tech::TechMap;
use crate::via::{synthesize_via, ViaParams};

/// Options for [`l_route`].
///
/// Widths are named after the port whose edge they continue: `hwidth` is the
/// width of the vertical leg, which continues the edge of the north/south
/// facing port, and `vwidth` is the width of the horizontal leg.
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
#[builder(default)]
pub struct LRouteOpts {
    #[builder(setter(strip_option))]
    pub hwidth: Option<Int>,
    #[builder(setter(strip_option))]
    pub vwidth: Option<Int>,
    /// Layer of the horizontal leg; defaults to the east/west facing port's layer.
    #[builder(setter(into, strip_option))]
    pub hlayer: Option<ArcStr>,
    /// Layer of the vertical leg; defaults to the north/south facing port's layer.
    #[builder(setter(into, strip_option))]
    pub vlayer: Option<ArcStr>,
    pub via_offset: ViaOffset,
    pub full_bottom: bool,
}

impl Default for LRouteOpts {
    fn default() -> Self {
        Self {
            hwidth: None,
            vwidth: None,
            hlayer: None,
            vlayer: None,
            via_offset: ViaOffset::both(),
            full_bottom: true,
        }
    }
}

impl LRouteOpts {
    #[inline]
    pub fn builder() -> LRouteOptsBuilder {
        LRouteOptsBuilder::default()
    }
}

/// Joins two perpendicular ports with one horizontal and one vertical leg.
///
/// Only the axis of each port matters, not the direction it faces. The
/// result exposes the corner via's ports.
pub fn l_route(
    lib: &mut Library,
    tech: &TechMap,
    edge1: &Port,
    edge2: &Port,
    opts: &LRouteOpts,
) -> Result<CellId> {
    let (vport, hport) = match (edge1.is_horizontal_facing(), edge2.is_horizontal_facing()) {
        (true, false) => (edge1, edge2),
        (false, true) => (edge2, edge1),
        _ => {
            return Err(Error::precondition(format!(
                "L-route ports `{}` ({}) and `{}` ({}) are not perpendicular",
                edge1.name, edge1.orientation, edge2.name, edge2.orientation
            )))
        }
    };

    let hwidth = opts.hwidth.unwrap_or(hport.width);
    let vwidth = opts.vwidth.unwrap_or(vport.width);
    let hlayer = opts.hlayer.clone().unwrap_or_else(|| vport.layer.clone());
    let vlayer = opts.vlayer.clone().unwrap_or_else(|| hport.layer.clone());

    let dx = vport.center.x - hport.center.x;
    let dy = hport.center.y - vport.center.y;

    // Each leg runs to the far edge of the other, so the legs share the
    // outer corner whatever the parity of the widths.
    let left = hport.center.x - hwidth / 2;
    let (right, bottom) = (left + hwidth, vport.center.y - vwidth / 2);
    let top = bottom + vwidth;
    let hleg = if dx > 0 {
        Rect::from_sides(left, bottom, vport.center.x, top)
    } else {
        Rect::from_sides(vport.center.x, bottom, right, top)
    };
    let vleg = if dy > 0 {
        Rect::from_sides(left, bottom, right, hport.center.y)
    } else {
        Rect::from_sides(left, hport.center.y, right, top)
    };
    let (hdim, vdim) = (hleg.width(), vleg.height());

    let name = lib.fresh_name("l_route");
    let mut cell = lib.new_cell(name.as_str());
    cell.draw_rect(tech.layer_of(&hlayer)?, hleg)?;
    cell.draw_rect(tech.layer_of(&vlayer)?, vleg)?;

    let via = synthesize_via(
        lib,
        tech,
        &ViaParams {
            bottom: hlayer.clone(),
            top: vlayer.clone(),
            footprint: Some(Dims::new(hwidth, vwidth)),
            full_bottom: opts.full_bottom,
            full_top: true,
        },
    )?;
    let shift_x = opts
        .via_offset
        .shift(Dir::Horiz, hwidth, via.size.w, if dx > 0 { 1 } else { -1 });
    let shift_y = opts
        .via_offset
        .shift(Dir::Vert, vwidth, via.size.h, if dy > 0 { 1 } else { -1 });
    let center = Point::new(hport.center.x + shift_x, vport.center.y + shift_y);
    let ports = place_via(lib, &mut cell, &via, "corner", center)?;
    cell.add_ports(ports);

    log::debug!(
        "l-route {} -> {}: horizontal leg {hdim} on {hlayer}, vertical leg {vdim} on {vlayer}, via {:?} at {center}",
        vport.name,
        hport.name,
        via.kind
    );
    rename_ports_by_orientation(&mut cell);
    Ok(lib.add_cell(cell))
}

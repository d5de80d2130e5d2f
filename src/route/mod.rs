//! # Route generators
//!
//! Each generator takes a [`TechMap`](crate::tech::TechMap) and two ports and
//! returns a fresh cell holding Manhattan wires plus whatever vias are needed
//! where the wire changes layer. Routes do no checking against surrounding
//! geometry. Ports of the result are named by their final orientation so
//! routes can be chained without knowing how they were built.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Dir, Int, Point, Rect, RectExt};
use crate::layout::{Cell, Library, Port};
use crate::via::Via;

pub mod c_route;
pub mod l_route;
pub mod straight;

pub use c_route::{c_route, CRouteOpts, CRouteOptsBuilder};
pub use l_route::{l_route, LRouteOpts, LRouteOptsBuilder};
pub use straight::{straight_route, StraightRouteOpts, StraightRouteOptsBuilder};

/// Whether a corner via is pulled off-center so that its inner corner meets
/// the inner corner of the route.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ViaOffset {
    pub offset_x: bool,
    pub offset_y: bool,
}

impl Default for ViaOffset {
    fn default() -> Self {
        Self::both()
    }
}

impl ViaOffset {
    pub const fn both() -> Self {
        Self {
            offset_x: true,
            offset_y: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            offset_x: false,
            offset_y: false,
        }
    }

    pub(crate) fn enabled(&self, dir: Dir) -> bool {
        match dir {
            Dir::Horiz => self.offset_x,
            Dir::Vert => self.offset_y,
        }
    }

    /// Shift of a via of extent `via_len` centered in a leg of width
    /// `leg_width`, toward `sign` along `dir`.
    ///
    /// Rounds toward zero, so a via narrower than its leg stays inside it
    /// when either extent is odd.
    pub(crate) fn shift(&self, dir: Dir, leg_width: Int, via_len: Int, sign: Int) -> Int {
        if self.enabled(dir) {
            sign * ((leg_width - via_len).abs() / 2)
        } else {
            0
        }
    }
}

/// A rectangle covering `a0..a1` along `axis` and `width` across it,
/// centered on `across`.
pub(crate) fn span_rect(axis: Dir, a0: Int, a1: Int, across: Int, width: Int) -> Rect {
    let lo = across - width / 2;
    match axis {
        Dir::Horiz => Rect::from_sides(a0, lo, a1, lo + width),
        Dir::Vert => Rect::from_sides(lo, a0, lo + width, a1),
    }
}

pub(crate) fn point_on(axis: Dir, along: Int, across: Int) -> Point {
    match axis {
        Dir::Horiz => Point::new(along, across),
        Dir::Vert => Point::new(across, along),
    }
}

#[inline]
pub(crate) fn sign(x: Int) -> Int {
    if x < 0 {
        -1
    } else {
        1
    }
}

pub(crate) fn layer_or(layer: &Option<ArcStr>, port: &Port) -> ArcStr {
    layer.clone().unwrap_or_else(|| port.layer.clone())
}

/// Instances `via` into `cell` centered on `center` and returns the via's
/// ports in `cell`'s frame.
pub(crate) fn place_via(
    lib: &Library,
    cell: &mut Cell,
    via: &Via,
    name: &str,
    center: Point,
) -> Result<Vec<Port>> {
    let mut inst = lib.instance(name, via.cell)?;
    inst.loc = center;
    let ports = lib.instance_ports(&inst)?;
    cell.add_instance(inst);
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Dims;

    #[test]
    fn test_span_rect() {
        assert_eq!(
            span_rect(Dir::Horiz, 10, -5, 0, 4),
            Rect::from_sides(-5, -2, 10, 2)
        );
        assert_eq!(
            span_rect(Dir::Vert, 0, 30, 100, 5),
            Rect::from_sides(98, 0, 103, 30)
        );
    }

    #[test]
    fn test_via_shift() {
        let off = ViaOffset {
            offset_x: true,
            offset_y: false,
        };
        assert_eq!(off.shift(Dir::Horiz, 500, 300, -1), -100);
        assert_eq!(off.shift(Dir::Horiz, 300, 500, 1), 100);
        assert_eq!(off.shift(Dir::Vert, 500, 300, 1), 0);
    }

    #[test]
    fn test_via_shift_keeps_odd_vias_inside() {
        let off = ViaOffset::both();
        assert_eq!(off.shift(Dir::Horiz, 184, 171, 1), 6);
        assert_eq!(off.shift(Dir::Vert, 185, 170, -1), -7);

        // A 171-wide via in a 184-wide leg centered on 0 spans -92..92.
        let leg = span_rect(Dir::Vert, 0, 10, 0, 184);
        for sign in [1, -1] {
            let shift = off.shift(Dir::Horiz, 184, 171, sign);
            let via = Rect::from_center(Point::new(shift, 5), Dims::new(171, 1));
            assert!(leg.encloses(&via), "{via:?} leaves {leg:?}");
        }
    }
}

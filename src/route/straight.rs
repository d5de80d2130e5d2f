use arcstr::ArcStr;
use derive_builder::Builder;

use super::{layer_or, place_via, point_on, sign, span_rect};
use crate::error::{Error, Result};
use crate::geometry::{Dims, Int};
use crate::layout::{rename_ports_by_orientation, CellId, Library, Port};
use crate::tech::TechMap;
use crate::via::{synthesize_via, ViaParams};

#[derive(Debug, Clone, Eq, PartialEq, Builder)]
#[builder(default)]
pub struct StraightRouteOpts {
    /// Wire width; defaults to the common width of both ports.
    #[builder(setter(strip_option))]
    pub width: Option<Int>,
    /// Wire layer; defaults to the first port's layer.
    #[builder(setter(into, strip_option))]
    pub layer1: Option<ArcStr>,
    /// Layer to land on at the second port. A via is added when it differs
    /// from the wire layer.
    #[builder(setter(into, strip_option))]
    pub layer2: Option<ArcStr>,
    pub full_bottom: bool,
}

impl Default for StraightRouteOpts {
    fn default() -> Self {
        Self {
            width: None,
            layer1: None,
            layer2: None,
            full_bottom: true,
        }
    }
}

impl StraightRouteOpts {
    #[inline]
    pub fn builder() -> StraightRouteOptsBuilder {
        StraightRouteOptsBuilder::default()
    }
}

/// Draws a single wire from `edge1` along its facing axis to `edge2`.
///
/// When `edge2` is parallel to `edge1`, the wire must land on `edge2`'s
/// segment; when it is perpendicular, the wire runs on past `edge2`'s center
/// by half of `edge2`'s width so that it covers `edge2` completely.
pub fn straight_route(
    lib: &mut Library,
    tech: &TechMap,
    edge1: &Port,
    edge2: &Port,
    opts: &StraightRouteOpts,
) -> Result<CellId> {
    let axis = edge1.orientation.axis();
    let width = match opts.width {
        Some(w) => w,
        None if edge1.width == edge2.width => edge1.width,
        None => {
            return Err(Error::precondition(format!(
                "ports `{}` and `{}` have different widths ({} and {}) and no route width was given",
                edge1.name, edge2.name, edge1.width, edge2.width
            )))
        }
    };
    if width <= 0 {
        return Err(Error::precondition(format!(
            "route width must be positive, got {width}"
        )));
    }

    let across = edge1.center.coord(!axis);
    let start = edge1.center.coord(axis);
    let parallel = edge2.orientation.axis() == axis;
    if parallel {
        let (lo, hi) = edge2.span();
        if across < lo || across > hi {
            return Err(Error::precondition(format!(
                "port `{}` at {} does not line up with port `{}` spanning {lo}..{hi}",
                edge1.name, edge1.center, edge2.name
            )));
        }
    } else if (across - edge2.center.coord(!axis)).abs() > width / 2 {
        return Err(Error::precondition(format!(
            "port `{}` at {} is more than half a wire width away from port `{}` at {}",
            edge1.name, edge1.center, edge2.name, edge2.center
        )));
    }

    let mut end = edge2.center.coord(axis);
    if end == start {
        return Err(Error::precondition(format!(
            "ports `{}` and `{}` are at the same position along the route",
            edge1.name, edge2.name
        )));
    }
    let dir = sign(end - start);
    if !parallel {
        end += dir * (edge2.width / 2);
    }

    let layer = layer_or(&opts.layer1, edge1);
    let landing = layer_or(&opts.layer2, edge2);
    let wire = span_rect(axis, start, end, across, width);

    let name = lib.fresh_name("straight_route");
    let mut cell = lib.new_cell(name.as_str());
    cell.draw_rect(tech.layer_of(&layer)?, wire.clone())?;
    cell.add_ports(Port::edges_of("route", &wire, &layer));

    if landing != layer {
        let via = synthesize_via(
            lib,
            tech,
            &ViaParams {
                bottom: layer.clone(),
                top: landing.clone(),
                footprint: Some(Dims::square(width)),
                full_bottom: opts.full_bottom,
                full_top: true,
            },
        )?;
        let center = point_on(axis, end - dir * (width / 2), across);
        let ports = place_via(lib, &mut cell, &via, "via", center)?;
        cell.add_ports(ports);
    }

    log::debug!(
        "straight route {} -> {}: {} wire {wire:?}",
        edge1.name,
        edge2.name,
        layer
    );
    rename_ports_by_orientation(&mut cell);
    Ok(lib.add_cell(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect, RectExt};
    use crate::layout::Orientation;
    use crate::tests::test_tech;
    use crate::via::BOTTOM_PORT_PREFIX;

    fn port(x: Int, y: Int, o: Orientation, width: Int, layer: &str) -> Port {
        Port::new("p", Point::new(x, y), width, o, layer)
    }

    #[test]
    fn test_straight_route_between_facing_ports() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_straight_route_between_facing_ports");
        let a = port(0, 0, Orientation::East, 200, "met1");
        let b = port(1000, 40, Orientation::West, 300, "met1");
        let id = straight_route(&mut lib, &tech, &a, &b, &StraightRouteOpts::default());
        assert!(matches!(id, Err(Error::Precondition(_))));

        let opts = StraightRouteOpts::builder().width(200).build().unwrap();
        let id = straight_route(&mut lib, &tech, &a, &b, &opts)?;
        let cell = lib.cell(id)?;
        let wires = cell.elems_on(tech.layer_of("met1")?)?;
        assert_eq!(wires, vec![Rect::from_sides(0, -100, 1000, 100)]);
        assert_eq!(cell.port("route_E")?.center, Point::new(1000, 0));
        assert_eq!(cell.port("route_W")?.center, Point::new(0, 0));
        assert!(cell.insts().is_empty());
        Ok(())
    }

    #[test]
    fn test_straight_route_onto_perpendicular_port() -> Result<()> {
        let tech = test_tech();
        let mut lib = Library::new("test_straight_route_onto_perpendicular_port");
        let a = port(0, 0, Orientation::North, 400, "met1");
        let b = port(100, 2000, Orientation::West, 400, "met2");
        let id = straight_route(&mut lib, &tech, &a, &b, &StraightRouteOpts::default())?;
        let cell = lib.cell(id)?;
        let wire = cell.elems_on(tech.layer_of("met1")?)?.remove(0);
        assert_eq!(wire, Rect::from_sides(-200, 0, 200, 2200));
        assert_eq!(wire.width(), 400);

        assert_eq!(cell.insts().len(), 1);
        assert_eq!(cell.insts()[0].loc, Point::new(0, 2000));
        let landing = cell.port("top_met_N")?;
        assert_eq!(landing.layer, "met2");
        assert!(cell.ports.keys().any(|k| k.starts_with(BOTTOM_PORT_PREFIX)));
        Ok(())
    }

    #[test]
    fn test_straight_route_rejects_misaligned_ports() {
        let tech = test_tech();
        let mut lib = Library::new("test_straight_route_rejects_misaligned_ports");
        let a = port(0, 0, Orientation::East, 200, "met1");
        let far = port(1000, 500, Orientation::West, 200, "met1");
        let same = port(0, 0, Orientation::West, 200, "met1");
        let opts = StraightRouteOpts::default();
        assert!(matches!(
            straight_route(&mut lib, &tech, &a, &far, &opts),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            straight_route(&mut lib, &tech, &a, &same, &opts),
            Err(Error::Precondition(_))
        ));
        let bad_layer = StraightRouteOpts::builder().layer1("met9").build().unwrap();
        let b = port(1000, 0, Orientation::West, 200, "met1");
        assert!(matches!(
            straight_route(&mut lib, &tech, &a, &b, &bad_layer),
            Err(Error::UnknownLayer { .. })
        ));
    }
}

use paste::paste;

use crate::error::Result;
use crate::geometry::{Point, Rect, RectExt};
use crate::halo::run_derived_geometry_pass;
use crate::layout::flat::{flatten, quantize};
use crate::layout::{CellId, Library, Orientation, Port};
use crate::route::{l_route, straight_route, LRouteOpts, StraightRouteOpts};
use crate::tech::{builtin, TechMap};

fn sorted(mut rects: Vec<Rect>) -> Vec<Rect> {
    rects.sort_by_key(|r| (r.left(), r.bottom(), r.right(), r.top()));
    rects
}

/// A 1um poly to met2 L-route: the via must sit entirely inside the corner
/// shared by the two legs.
fn l_route_corner_holds_via(tech: &TechMap) -> Result<()> {
    let mut lib = Library::new(format!("l_route_corner_{}", tech.name()));
    let a = Port::new("a", Point::new(0, 0), 1000, Orientation::East, "poly");
    let b = Port::new("b", Point::new(5000, 4000), 1000, Orientation::North, "met2");
    let id = l_route(&mut lib, tech, &a, &b, &LRouteOpts::default())?;
    let cell = lib.cell(id)?;

    let hleg = cell.elems_on(tech.layer_of("poly")?)?.remove(0);
    let vleg = cell.elems_on(tech.layer_of("met2")?)?.remove(0);
    assert_eq!(hleg, Rect::from_sides(0, -500, 5500, 500));
    assert_eq!(vleg, Rect::from_sides(4500, -500, 5500, 4000));

    let corner = hleg.overlap(&vleg).unwrap();
    let via = lib.instance_bbox(&cell.insts()[0])?.unwrap();
    assert!(corner.encloses(&via));
    assert_eq!(via.center(), Point::new(5000, 0));

    // Both cuts of the stack are present.
    let flat = flatten(&lib, id)?;
    for level in 0..2 {
        let cut = tech.layer_of(&tech.cut_between(level)?.layer)?;
        assert_eq!(flat.on_layer(cut).count(), 1);
    }
    assert_eq!(cell.port("top_met_N")?.layer, "met2");
    Ok(())
}

macro_rules! builtin_route_tests {
    ($($pdk:ident),*) => {
        $(
            paste! {
                #[test]
                fn [<test_ $pdk _l_route_corner_holds_via>]() -> Result<()> {
                    l_route_corner_holds_via(builtin(stringify!($pdk))?)
                }
            }
        )*
    };
}

builtin_route_tests!(sky130, gf180, ihp130);

/// An L-route from a gate at the origin up to met1 at (2, 3)um.
fn gate_l_route(lib: &mut Library, tech: &TechMap) -> Result<CellId> {
    let g = Port::new("g", Point::new(0, 0), 180, Orientation::East, "poly");
    let d = Port::new("d", Point::new(2000, 3000), 180, Orientation::North, "met1");
    l_route(lib, tech, &g, &d, &LRouteOpts::default())
}

#[test]
fn test_chained_routes_flatten() -> Result<()> {
    let tech = builtin("sky130")?;
    let mut lib = Library::new("test_chained_routes_flatten");
    let l = gate_l_route(&mut lib, tech)?;

    let l_inst = lib.instance("l0", l)?;
    let start = lib
        .instance_ports(&l_inst)?
        .into_iter()
        .find(|p| p.name == "top_met_N")
        .unwrap();
    assert_eq!(start.center, Point::new(2000, 90));
    assert_eq!(start.orientation, Orientation::North);

    let target = Port::new("out", Point::new(2000, 5000), 180, Orientation::South, "met1");
    let wire = straight_route(&mut lib, tech, &start, &target, &StraightRouteOpts::default())?;

    let mut top = lib.new_cell("top");
    top.add_instance(l_inst);
    top.add_instance(lib.instance("wire0", wire)?);
    let top = lib.add_cell(top);

    let flat = quantize(flatten(&lib, top)?, tech.grid_dbu());
    let met1: Vec<_> = flat.on_layer(tech.layer_of("met1")?).cloned().collect();
    assert!(met1.contains(&Rect::from_sides(1910, 90, 2090, 5000)));
    assert!(met1.contains(&Rect::from_sides(1910, -90, 2090, 3000)));
    assert_eq!(flat.bbox(), Some(Rect::from_sides(0, -90, 2090, 5000)));
    assert!(flat.ports.is_empty());
    Ok(())
}

#[test]
fn test_sky130_halo_around_gate_contacts() -> Result<()> {
    let tech = builtin("sky130")?;
    let mut lib = Library::new("test_sky130_halo_around_gate_contacts");
    let l = gate_l_route(&mut lib, tech)?;

    // A lone gate contact is left alone.
    assert_eq!(run_derived_geometry_pass(&mut lib, l, tech)?, 0);

    let mut pair = lib.new_cell("pair");
    pair.add_instance(lib.instance("l0", l)?);
    let mut upper = lib.instance("l1", l)?;
    upper.loc = Point::new(0, 500);
    pair.add_instance(upper);
    let pair = lib.add_cell(pair);

    assert_eq!(run_derived_geometry_pass(&mut lib, pair, tech)?, 3);
    let npc = lib.cell(pair)?.elems_on(tech.layer_of("npc")?)?;
    assert_eq!(
        sorted(npc),
        vec![
            Rect::from_sides(1815, -185, 2185, 185),
            Rect::from_sides(1815, -185, 2185, 685),
            Rect::from_sides(1815, 315, 2185, 685),
        ]
    );
    Ok(())
}

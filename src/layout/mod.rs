//! # Layout canvas
//!
//! Geometry lives in a `layout21::raw` library. A [`Library`] wraps one,
//! hands out [`CellId`] handles in creation order, and keeps the routing
//! [`Port`]s of every cell next to it. A [`Cell`] is built off to the side
//! and moved into the library once it is finished, so a cell can only
//! instance cells that already exist.

use std::collections::BTreeMap;
use std::fmt::Display;

use arcstr::ArcStr;
use layout21raw::{self as raw, Layers, Shape, Units};
use layout21utils::Ptr;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{bbox_of, Point, Rect, RectExt, Transform};

pub mod boolean;
pub mod flat;
pub mod port;

pub use port::{rename_ports_by_orientation, Orientation, Port};

/// A physical (GDS) layer: layer number and datatype.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GdsLayer {
    pub number: i16,
    pub datatype: i16,
}

impl GdsLayer {
    #[inline]
    pub const fn new(number: i16, datatype: i16) -> Self {
        Self { number, datatype }
    }

    /// The layer an element was drawn on, if it is known to `layers`.
    pub(crate) fn of(layers: &Layers, elem: &raw::Element) -> Option<Self> {
        let layer = layers.get(elem.layer)?;
        Some(Self::new(layer.layernum, layer.num(&elem.purpose)?))
    }

    pub(crate) fn element(self, layers: &mut Layers, rect: Rect) -> Result<raw::Element> {
        let (layer, purpose) = layers.get_or_insert(self.number, self.datatype)?;
        Ok(raw::Element {
            net: None,
            layer,
            purpose,
            inner: Shape::Rect(rect),
        })
    }
}

impl Display for GdsLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.number, self.datatype)
    }
}

pub(crate) fn rect_of(elem: &raw::Element) -> Option<Rect> {
    match &elem.inner {
        Shape::Rect(r) => Some(r.normalized()),
        _ => None,
    }
}

/// Handle to a cell stored in a [`Library`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(usize);

impl CellId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A cell under construction, or a copy of a stored one.
#[derive(Debug, Clone)]
pub struct Cell {
    pub layout: raw::Layout,
    pub ports: BTreeMap<ArcStr, Port>,
    layers: Ptr<Layers>,
}

impl Cell {
    #[inline]
    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn draw_rect(&mut self, layer: GdsLayer, rect: Rect) -> Result<()> {
        let elem = layer.element(&mut *self.layers.write()?, rect)?;
        self.layout.elems.push(elem);
        Ok(())
    }

    pub fn add_instance(&mut self, inst: raw::Instance) {
        self.layout.insts.push(inst);
    }

    #[inline]
    pub fn insts(&self) -> &[raw::Instance] {
        &self.layout.insts
    }

    /// Adds `port`, replacing any existing port of the same name.
    pub fn add_port(&mut self, port: Port) {
        self.ports.insert(port.name.clone(), port);
    }

    pub fn add_ports(&mut self, ports: impl IntoIterator<Item = Port>) {
        for port in ports {
            self.add_port(port);
        }
    }

    pub fn port(&self, name: &str) -> Result<&Port> {
        self.ports.get(name).ok_or_else(|| Error::UnknownPort {
            cell: self.name().into(),
            port: name.to_string(),
        })
    }

    /// This cell's own rectangles with their layers, in drawing order.
    pub fn shapes(&self) -> Result<Vec<(GdsLayer, Rect)>> {
        let layers = self.layers.read()?;
        Ok(self
            .layout
            .elems
            .iter()
            .filter_map(|e| Some((GdsLayer::of(&layers, e)?, rect_of(e)?)))
            .collect())
    }

    pub fn elems_on(&self, layer: GdsLayer) -> Result<Vec<Rect>> {
        Ok(self
            .shapes()?
            .into_iter()
            .filter(|(l, _)| *l == layer)
            .map(|(_, r)| r)
            .collect())
    }

    /// The bounding box of this cell's own elements, ignoring instances.
    pub fn elems_bbox(&self) -> Option<Rect> {
        let rects: Vec<_> = self.layout.elems.iter().filter_map(rect_of).collect();
        bbox_of(&rects)
    }
}

/// A `layout21` library plus the ports of each of its cells.
#[derive(Debug, Clone)]
pub struct Library {
    raw: raw::Library,
    ports: Vec<BTreeMap<ArcStr, Port>>,
    names: usize,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            raw: raw::Library::new(name, Units::Nano),
            ports: Vec::new(),
            names: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// The layer table shared by every cell of this library.
    pub fn layers(&self) -> Ptr<Layers> {
        self.raw.layers.clone()
    }

    /// Generates a cell name that has not been handed out by this library before.
    pub fn fresh_name(&mut self, base: &str) -> ArcStr {
        self.names += 1;
        arcstr::format!("{}_{}", base, self.names)
    }

    /// An empty cell drawing on this library's layers.
    pub fn new_cell(&self, name: impl Into<String>) -> Cell {
        Cell {
            layout: raw::Layout {
                name: name.into(),
                insts: vec![],
                annotations: vec![],
                elems: vec![],
            },
            ports: BTreeMap::new(),
            layers: self.layers(),
        }
    }

    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        let id = CellId(self.raw.cells.len());
        self.raw.cells.push(Ptr::new(raw::Cell {
            name: cell.layout.name.clone(),
            abs: None,
            layout: Some(cell.layout),
        }));
        self.ports.push(cell.ports);
        id
    }

    pub(crate) fn raw_cell(&self, id: CellId) -> Result<&Ptr<raw::Cell>> {
        self.raw.cells.get(id.0).ok_or(Error::UnknownCell(id))
    }

    /// A copy of the stored cell.
    pub fn cell(&self, id: CellId) -> Result<Cell> {
        let cell = self.raw_cell(id)?.read()?;
        Ok(Cell {
            layout: cell.layout.clone().unwrap_or_default(),
            ports: self.ports(id)?.clone(),
            layers: self.layers(),
        })
    }

    pub fn ports(&self, id: CellId) -> Result<&BTreeMap<ArcStr, Port>> {
        self.ports.get(id.0).ok_or(Error::UnknownCell(id))
    }

    /// Draws into a cell that is already stored.
    pub fn draw_rect(&mut self, id: CellId, layer: GdsLayer, rect: Rect) -> Result<()> {
        let elem = layer.element(&mut *self.raw.layers.write()?, rect)?;
        let mut cell = self.raw_cell(id)?.write()?;
        match cell.layout.as_mut() {
            Some(layout) => layout.elems.push(elem),
            None => {
                return Err(Error::precondition(format!(
                    "cell `{}` has no layout to draw into",
                    cell.name
                )))
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.raw.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.cells.is_empty()
    }

    fn id_of(&self, cell: &Ptr<raw::Cell>) -> Result<CellId> {
        self.raw
            .cells
            .iter()
            .position(|c| c == cell)
            .map(CellId)
            .ok_or_else(|| Error::precondition("instance refers to a cell from another library"))
    }

    /// An unrotated instance of `id` with its origin at the parent's origin.
    pub fn instance(&self, name: impl Into<String>, id: CellId) -> Result<raw::Instance> {
        Ok(raw::Instance {
            inst_name: name.into(),
            cell: self.raw_cell(id)?.clone(),
            loc: Point::new(0, 0),
            reflect_vert: false,
            angle: None,
        })
    }

    /// Places `id` so that the center of its bounding box lands on `center`.
    pub fn instance_at(
        &self,
        name: impl Into<String>,
        id: CellId,
        center: Point,
    ) -> Result<raw::Instance> {
        let mut inst = self.instance(name, id)?;
        inst.loc = match self.bbox(id)? {
            Some(bbox) => {
                let c = bbox.center();
                Point::new(center.x - c.x, center.y - c.y)
            }
            None => center,
        };
        Ok(inst)
    }

    /// The bounding box of a cell, including everything it instances.
    pub fn bbox(&self, id: CellId) -> Result<Option<Rect>> {
        let cell = self.raw_cell(id)?.read()?;
        let elems = match cell.layout.as_ref() {
            Some(layout) => layout.flatten()?,
            None => Vec::new(),
        };
        let rects: Vec<_> = elems.iter().filter_map(rect_of).collect();
        Ok(bbox_of(&rects))
    }

    pub fn instance_bbox(&self, inst: &raw::Instance) -> Result<Option<Rect>> {
        let tf = instance_transform(inst);
        let id = self.id_of(&inst.cell)?;
        Ok(self.bbox(id)?.map(|r| r.transformed(&tf)))
    }

    /// The ports of `inst`'s cell, moved into the instantiating cell's frame.
    pub fn instance_ports(&self, inst: &raw::Instance) -> Result<Vec<Port>> {
        let tf = instance_transform(inst);
        let id = self.id_of(&inst.cell)?;
        Ok(self.ports(id)?.values().map(|p| p.transform(&tf)).collect())
    }
}

#[inline]
pub(crate) fn instance_transform(inst: &raw::Instance) -> Transform {
    Transform::from_instance(&inst.loc, inst.reflect_vert, inst.angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Dims;

    const M1: GdsLayer = GdsLayer::new(68, 20);
    const M2: GdsLayer = GdsLayer::new(69, 20);

    #[test]
    fn test_fresh_names_are_unique() {
        let mut lib = Library::new("test_fresh_names_are_unique");
        let a = lib.fresh_name("via");
        let b = lib.fresh_name("via");
        let c = lib.fresh_name("l_route");
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_hierarchical_bbox() -> Result<()> {
        let mut lib = Library::new("test_hierarchical_bbox");
        let mut leaf = lib.new_cell("leaf");
        leaf.draw_rect(M1, Rect::from_sides(0, 0, 100, 50))?;
        let leaf = lib.add_cell(leaf);

        let mut top = lib.new_cell("top");
        top.draw_rect(M1, Rect::from_sides(-10, -10, 0, 0))?;
        let mut inst = lib.instance("leaf0", leaf)?;
        inst.angle = Some(90.);
        top.add_instance(inst);
        let top = lib.add_cell(top);

        assert_eq!(lib.bbox(top)?, Some(Rect::from_sides(-50, -10, 0, 100)));
        Ok(())
    }

    #[test]
    fn test_centered_instance() -> Result<()> {
        let mut lib = Library::new("test_centered_instance");
        let mut leaf = lib.new_cell("leaf");
        leaf.draw_rect(M1, Rect::from_sides(0, 0, 40, 20))?;
        let leaf = lib.add_cell(leaf);

        let inst = lib.instance_at("leaf0", leaf, Point::new(100, 100))?;
        let bbox = lib.instance_bbox(&inst)?.unwrap();
        assert_eq!(bbox.center(), Point::new(100, 100));
        assert_eq!(bbox.dims(), Dims::new(40, 20));
        Ok(())
    }

    #[test]
    fn test_layers_round_trip() -> Result<()> {
        let mut lib = Library::new("test_layers_round_trip");
        let mut cell = lib.new_cell("pads");
        cell.draw_rect(M1, Rect::from_sides(0, 0, 10, 10))?;
        cell.draw_rect(M2, Rect::from_sides(0, 0, 20, 20))?;
        cell.draw_rect(GdsLayer::new(68, 16), Rect::from_sides(1, 1, 2, 2))?;
        let id = lib.add_cell(cell);

        lib.draw_rect(id, M2, Rect::from_sides(5, 5, 6, 6))?;
        let cell = lib.cell(id)?;
        assert_eq!(cell.elems_on(M1)?, vec![Rect::from_sides(0, 0, 10, 10)]);
        assert_eq!(cell.elems_on(M2)?.len(), 2);
        assert_eq!(cell.elems_on(GdsLayer::new(68, 16))?.len(), 1);
        assert_eq!(cell.shapes()?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_unknown_cells_rejected() -> Result<()> {
        let mut lib = Library::new("test_unknown_cells_rejected");
        assert!(matches!(
            lib.instance("nothing", CellId(0)),
            Err(Error::UnknownCell(_))
        ));

        let mut other = Library::new("other");
        let foreign = other.add_cell(other.new_cell("foreign"));
        let inst = other.instance("foreign0", foreign)?;
        lib.add_cell(lib.new_cell("local"));
        assert!(matches!(lib.instance_ports(&inst), Err(Error::Precondition(_))));
        Ok(())
    }
}

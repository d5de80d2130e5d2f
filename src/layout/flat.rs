//! Hierarchy flattening, grid quantization and GDS export.
//!
//! Both transforms are explicit, non-mutating phases: `flatten` resolves
//! every instance into absolute-coordinate rectangles, and `quantize` snaps
//! the result onto a manufacturing grid. Callers compose them before export.

use std::collections::BTreeMap;
use std::path::Path;

use arcstr::ArcStr;
use gds21::GdsLibrary;
use layout21raw::{self as raw, Units};
use layout21utils::Ptr;
use serde::{Deserialize, Serialize};

use super::{rect_of, CellId, GdsLayer, Library, Port};
use crate::error::{Error, Result};
use crate::geometry::{bbox_of, snap, Int, Point, Rect, RectExt};

/// One rectangle on one physical layer, in absolute coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRect {
    pub layer: GdsLayer,
    pub rect: Rect,
}

/// A cell with all hierarchy resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatCell {
    pub name: ArcStr,
    pub elems: Vec<LayerRect>,
    pub ports: BTreeMap<ArcStr, Port>,
}

impl FlatCell {
    pub fn on_layer(&self, layer: GdsLayer) -> impl Iterator<Item = &Rect> {
        self.elems
            .iter()
            .filter(move |e| e.layer == layer)
            .map(|e| &e.rect)
    }

    pub fn bbox(&self) -> Option<Rect> {
        bbox_of(self.elems.iter().map(|e| &e.rect))
    }

    /// A single-cell GDS library holding this cell's rectangles.
    pub fn to_gds(&self, dbu_per_um: Int) -> Result<GdsLibrary> {
        let mut lib = raw::Library::new(self.name.as_str(), units_for(dbu_per_um)?);
        let elems = {
            let mut layers = lib.layers.write()?;
            self.elems
                .iter()
                .map(|e| e.layer.element(&mut layers, e.rect.clone()))
                .collect::<Result<Vec<_>>>()?
        };
        let layout = raw::Layout {
            name: self.name.to_string(),
            insts: vec![],
            annotations: vec![],
            elems,
        };
        lib.cells.push(Ptr::new(raw::Cell {
            name: self.name.to_string(),
            abs: None,
            layout: Some(layout),
        }));
        Ok(lib.to_gds()?)
    }

    pub fn save_gds(&self, dbu_per_um: Int, path: impl AsRef<Path>) -> Result<()> {
        let gds = self.to_gds(dbu_per_um)?;
        gds.save(path.as_ref())?;
        Ok(())
    }
}

/// The GDS database unit for a process with `dbu_per_um` units per micron.
fn units_for(dbu_per_um: Int) -> Result<Units> {
    match dbu_per_um {
        1 => Ok(Units::Micro),
        1000 => Ok(Units::Nano),
        10_000 => Ok(Units::Angstrom),
        1_000_000 => Ok(Units::Pico),
        _ => Err(Error::Tech(format!(
            "{dbu_per_um} database units per micron has no GDS unit"
        ))),
    }
}

/// Resolves `id` and everything it instances into absolute coordinates.
///
/// Only the top cell's own ports are kept; ports of instanced cells must be
/// promoted explicitly by the cell that wants to expose them.
pub fn flatten(lib: &Library, id: CellId) -> Result<FlatCell> {
    let cell = lib.raw_cell(id)?.read()?;
    let elems = match cell.layout.as_ref() {
        Some(layout) => layout.flatten()?,
        None => Vec::new(),
    };
    let layers = lib.layers();
    let layers = layers.read()?;
    let elems = elems
        .iter()
        .filter_map(|e| {
            Some(LayerRect {
                layer: GdsLayer::of(&layers, e)?,
                rect: rect_of(e)?,
            })
        })
        .collect();
    Ok(FlatCell {
        name: cell.name.as_str().into(),
        elems,
        ports: lib.ports(id)?.clone(),
    })
}

/// Snaps every coordinate of `cell` to the nearest multiple of `grid`.
pub fn quantize(cell: FlatCell, grid: Int) -> FlatCell {
    if grid <= 1 {
        return cell;
    }
    let snap_pt = |p: Point| Point::new(snap(p.x, grid), snap(p.y, grid));
    let elems = cell
        .elems
        .into_iter()
        .map(|e| {
            let (p0, p1) = (snap_pt(e.rect.p0), snap_pt(e.rect.p1));
            LayerRect {
                layer: e.layer,
                rect: Rect::from_sides(p0.x, p0.y, p1.x, p1.y),
            }
        })
        .collect();
    let ports = cell
        .ports
        .into_iter()
        .map(|(name, mut port)| {
            port.center = snap_pt(port.center);
            port.width = snap(port.width, grid);
            (name, port)
        })
        .collect();
    FlatCell {
        name: cell.name,
        elems,
        ports,
    }
}

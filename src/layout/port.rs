//! Connection terminals.

use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::Cell;
use crate::error::{Error, Result};
use crate::geometry::{Dir, Int, Point, Rect, RectExt, Transform};

/// The direction a port faces, serialized as degrees counterclockwise from east.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr,
)]
#[repr(u16)]
pub enum Orientation {
    East = 0,
    North = 90,
    West = 180,
    South = 270,
}

impl Orientation {
    /// Normalizes an angle in degrees.
    ///
    /// Any multiple of 90, including negative angles and angles beyond a full
    /// turn, is accepted. Anything else is not Manhattan.
    pub fn from_degrees(deg: i64) -> Result<Self> {
        if deg % 90 != 0 {
            return Err(Error::precondition(format!(
                "port orientation {deg} is not a multiple of 90 degrees"
            )));
        }
        Ok(match deg.rem_euclid(360) {
            0 => Self::East,
            90 => Self::North,
            180 => Self::West,
            _ => Self::South,
        })
    }

    pub fn degrees(self) -> u16 {
        self as u16
    }

    /// The axis along which a route leaves a port with this orientation.
    pub fn axis(self) -> Dir {
        match self {
            Self::East | Self::West => Dir::Horiz,
            Self::North | Self::South => Dir::Vert,
        }
    }

    /// `1` for east/north, `-1` for west/south.
    pub fn sign(self) -> Int {
        match self {
            Self::East | Self::North => 1,
            Self::West | Self::South => -1,
        }
    }

    /// The outward unit vector.
    pub fn unit(self) -> (Int, Int) {
        match self {
            Self::East => (1, 0),
            Self::North => (0, 1),
            Self::West => (-1, 0),
            Self::South => (0, -1),
        }
    }

    /// The facing direction after the linear part of `tf`.
    ///
    /// Transforms are Manhattan, so the rotated unit vector lands on an axis.
    pub fn transform(self, tf: &Transform) -> Self {
        let (x, y) = self.unit();
        let (x, y) = (x as f64, y as f64);
        let tx = (tf.a[0][0] * x + tf.a[0][1] * y).round() as Int;
        let ty = (tf.a[1][0] * x + tf.a[1][1] * y).round() as Int;
        match (tx.signum(), ty.signum()) {
            (1, _) => Self::East,
            (-1, _) => Self::West,
            (_, 1) => Self::North,
            _ => Self::South,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::East => "E",
            Self::North => "N",
            Self::West => "W",
            Self::South => "S",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "E" => Some(Self::East),
            "N" => Some(Self::North),
            "W" => Some(Self::West),
            "S" => Some(Self::South),
            _ => None,
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A named, oriented attachment point.
///
/// `width` is the extent of the port perpendicular to its facing direction.
/// `layer` is an abstract layer name, resolved through a
/// [`TechMap`](crate::tech::TechMap) when geometry is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub name: ArcStr,
    pub center: Point,
    pub width: Int,
    pub orientation: Orientation,
    pub layer: ArcStr,
}

impl Port {
    pub fn new(
        name: impl Into<ArcStr>,
        center: Point,
        width: Int,
        orientation: Orientation,
        layer: impl Into<ArcStr>,
    ) -> Self {
        Self {
            name: name.into(),
            center,
            width,
            orientation,
            layer: layer.into(),
        }
    }

    /// East- or west-facing.
    #[inline]
    pub fn is_horizontal_facing(&self) -> bool {
        self.orientation.axis() == Dir::Horiz
    }

    /// The span the port covers perpendicular to its facing direction.
    pub fn span(&self) -> (Int, Int) {
        let c = self.center.coord(!self.orientation.axis());
        let lo = c - self.width / 2;
        (lo, lo + self.width)
    }

    pub fn transform(&self, tf: &Transform) -> Self {
        Self {
            name: self.name.clone(),
            center: self.center.transform(tf),
            width: self.width,
            orientation: self.orientation.transform(tf),
            layer: self.layer.clone(),
        }
    }

    pub fn named(mut self, name: impl Into<ArcStr>) -> Self {
        self.name = name.into();
        self
    }

    /// Four outward-facing ports, `<prefix>_N`, `_E`, `_S` and `_W`, one on each edge of `rect`.
    pub fn edges_of(prefix: &str, rect: &Rect, layer: &ArcStr) -> [Port; 4] {
        let c = rect.center();
        let edge = |o: Orientation, center: Point, width: Int| {
            Port::new(
                arcstr::format!("{}_{}", prefix, o.suffix()),
                center,
                width,
                o,
                layer.clone(),
            )
        };
        [
            edge(Orientation::North, Point::new(c.x, rect.top()), rect.width()),
            edge(Orientation::East, Point::new(rect.right(), c.y), rect.height()),
            edge(Orientation::South, Point::new(c.x, rect.bottom()), rect.width()),
            edge(Orientation::West, Point::new(rect.left(), c.y), rect.height()),
        ]
    }
}

/// Renames every port of `cell` so that its suffix matches its orientation.
///
/// Names ending in `_N`, `_E`, `_S` or `_W` have that suffix replaced; any
/// other name gets the suffix appended.
pub fn rename_ports_by_orientation(cell: &mut Cell) {
    let ports = std::mem::take(&mut cell.ports);
    for (name, port) in ports {
        let stem = match name.rsplit_once('_') {
            Some((stem, last)) if Orientation::from_suffix(last).is_some() => stem,
            _ => name.as_str(),
        };
        let renamed = arcstr::format!("{}_{}", stem, port.orientation.suffix());
        cell.add_port(port.named(renamed));
    }
}

//! Integer geometry in database units.
//!
//! Points, rectangles, bounding boxes and transforms come from
//! `layout21::raw`. [`RectExt`] adds the Manhattan helpers the router leans
//! on: side accessors, centered construction and rectangle booleans.
//! Conversion to and from microns lives on [`TechMap`](crate::tech::TechMap).

use serde::{Deserialize, Serialize};

pub use layout21raw::geom::{Transform, TransformTrait};
pub use layout21raw::{BoundBox, BoundBoxTrait, Dir, Int, Point, Rect};

/// A width and a height.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    pub w: Int,
    pub h: Int,
}

impl Dims {
    #[inline]
    pub const fn new(w: Int, h: Int) -> Self {
        Self { w, h }
    }

    #[inline]
    pub const fn square(a: Int) -> Self {
        Self { w: a, h: a }
    }

    /// Returns `true` if either dimension of `self` exceeds the matching dimension of `other`.
    #[inline]
    pub fn exceeds(&self, other: Dims) -> bool {
        self.w > other.w || self.h > other.h
    }
}

/// Manhattan helpers for [`Rect`].
///
/// Every constructor here returns a rectangle with `p0` at the lower-left
/// corner and `p1` at the upper-right corner. The accessors assume that
/// ordering; call [`RectExt::normalized`] on rectangles from elsewhere.
pub trait RectExt: Sized {
    fn from_sides(left: Int, bottom: Int, right: Int, top: Int) -> Self;

    /// A `dims`-sized rectangle centered on `center`.
    ///
    /// Odd extents put the extra database unit on the upper/right side.
    fn from_center(center: Point, dims: Dims) -> Self;

    fn normalized(&self) -> Self;
    fn left(&self) -> Int;
    fn bottom(&self) -> Int;
    fn right(&self) -> Int;
    fn top(&self) -> Int;

    #[inline]
    fn width(&self) -> Int {
        self.right() - self.left()
    }

    #[inline]
    fn height(&self) -> Int {
        self.top() - self.bottom()
    }

    #[inline]
    fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    /// Twice the center point; exact even when a side has odd length.
    fn center2(&self) -> Point {
        Point::new(self.left() + self.right(), self.bottom() + self.top())
    }

    /// A rectangle with zero width or height covers no area.
    #[inline]
    fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grows the rectangle by `dist` on every side.
    fn expand(&self, dist: Int) -> Self {
        Self::from_sides(
            self.left() - dist,
            self.bottom() - dist,
            self.right() + dist,
            self.top() + dist,
        )
    }

    /// Applies `tf` and restores the corner ordering.
    fn transformed(&self, tf: &Transform) -> Self;

    /// The overlapping area of two rectangles, if they share any area.
    fn overlap(&self, other: &Self) -> Option<Self> {
        let left = self.left().max(other.left());
        let bottom = self.bottom().max(other.bottom());
        let right = self.right().min(other.right());
        let top = self.top().min(other.top());
        (left < right && bottom < top).then(|| Self::from_sides(left, bottom, right, top))
    }

    /// Returns `true` if the rectangles overlap or share an edge segment.
    fn touches(&self, other: &Self) -> bool {
        let h = self.left() <= other.right() && other.left() <= self.right();
        let v = self.bottom() <= other.top() && other.bottom() <= self.top();
        let hs = self.left() < other.right() && other.left() < self.right();
        let vs = self.bottom() < other.top() && other.bottom() < self.top();
        // Corner-only contact does not connect two polygons.
        (h && vs) || (v && hs)
    }

    fn encloses(&self, other: &Self) -> bool {
        self.left() <= other.left()
            && self.bottom() <= other.bottom()
            && self.right() >= other.right()
            && self.top() >= other.top()
    }

    /// The smallest rectangle covering both.
    fn hull(&self, other: &Self) -> Self {
        Self::from_sides(
            self.left().min(other.left()),
            self.bottom().min(other.bottom()),
            self.right().max(other.right()),
            self.top().max(other.top()),
        )
    }

    /// Splits `self - other` into at most four disjoint rectangles.
    fn subtract(&self, other: &Self) -> Vec<Self>;
}

impl RectExt for Rect {
    #[inline]
    fn from_sides(left: Int, bottom: Int, right: Int, top: Int) -> Self {
        Rect {
            p0: Point::new(left.min(right), bottom.min(top)),
            p1: Point::new(left.max(right), bottom.max(top)),
        }
    }

    fn from_center(center: Point, dims: Dims) -> Self {
        let left = center.x - dims.w / 2;
        let bottom = center.y - dims.h / 2;
        Self::from_sides(left, bottom, left + dims.w, bottom + dims.h)
    }

    fn normalized(&self) -> Self {
        Self::from_sides(self.p0.x, self.p0.y, self.p1.x, self.p1.y)
    }

    #[inline]
    fn left(&self) -> Int {
        self.p0.x
    }
    #[inline]
    fn bottom(&self) -> Int {
        self.p0.y
    }
    #[inline]
    fn right(&self) -> Int {
        self.p1.x
    }
    #[inline]
    fn top(&self) -> Int {
        self.p1.y
    }

    fn transformed(&self, tf: &Transform) -> Self {
        TransformTrait::transform(self, tf).normalized()
    }

    fn subtract(&self, other: &Self) -> Vec<Self> {
        let Some(cut) = self.overlap(other) else {
            return vec![self.clone()];
        };
        let mut out = Vec::with_capacity(4);
        if cut.bottom() > self.bottom() {
            out.push(Rect::from_sides(self.left(), self.bottom(), self.right(), cut.bottom()));
        }
        if cut.top() < self.top() {
            out.push(Rect::from_sides(self.left(), cut.top(), self.right(), self.top()));
        }
        if cut.left() > self.left() {
            out.push(Rect::from_sides(self.left(), cut.bottom(), cut.left(), cut.top()));
        }
        if cut.right() < self.right() {
            out.push(Rect::from_sides(cut.right(), cut.bottom(), self.right(), cut.top()));
        }
        out
    }
}

/// Bounding rectangle of a set of rectangles, or `None` when the set is empty.
pub fn bbox_of<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    let bbox = rects.into_iter().fold(BoundBox::empty(), |acc, r| {
        acc.union(&BoundBox::from_points(r.p0, r.p1))
    });
    (!bbox.is_empty()).then(|| Rect::from_sides(bbox.p0.x, bbox.p0.y, bbox.p1.x, bbox.p1.y))
}

/// Rounds `a` to the nearest multiple of `grid`; ties round up.
pub fn snap(a: Int, grid: Int) -> Int {
    debug_assert!(grid > 0);
    let r = a.rem_euclid(grid);
    let down = a - r;
    if 2 * r >= grid {
        down + grid
    } else {
        down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_subtract() {
        let a = Rect::from_sides(0, 0, 100, 100);
        let b = Rect::from_sides(25, 25, 75, 75);
        let parts = a.subtract(&b);
        assert_eq!(parts.len(), 4);
        let area: Int = parts.iter().map(|p| p.width() * p.height()).sum();
        assert_eq!(area, 100 * 100 - 50 * 50);
        assert!(parts.iter().all(|p| p.overlap(&b).is_none()));

        let far = Rect::from_sides(200, 200, 300, 300);
        assert_eq!(a.subtract(&far), vec![a.clone()]);
        assert!(a.subtract(&a.expand(10)).is_empty());
    }

    #[test]
    fn test_rect_touches() {
        let a = Rect::from_sides(0, 0, 10, 10);
        assert!(a.touches(&Rect::from_sides(10, 0, 20, 10)));
        assert!(a.touches(&Rect::from_sides(5, 5, 15, 15)));
        assert!(!a.touches(&Rect::from_sides(10, 10, 20, 20)));
        assert!(!a.touches(&Rect::from_sides(11, 0, 20, 10)));
    }

    #[test]
    fn test_rotated_rect_is_normalized() {
        let tf = Transform::from_instance(&Point::new(10, 0), false, Some(90.));
        let r = Rect::from_sides(0, 0, 4, 2).transformed(&tf);
        assert_eq!(r, Rect::from_sides(8, 0, 10, 4));
        assert_eq!(r.dims(), Dims::new(2, 4));
    }

    #[test]
    fn test_from_center_odd() {
        let r = Rect::from_center(Point::new(0, 0), Dims::new(185, 4));
        assert_eq!(r, Rect::from_sides(-92, -2, 93, 2));
        assert_eq!(r.center2(), Point::new(1, 0));
    }

    #[test]
    fn test_bbox_of() {
        let rects = [Rect::from_sides(0, 0, 10, 10), Rect::from_sides(-5, 20, 3, 30)];
        assert_eq!(bbox_of(&rects), Some(Rect::from_sides(-5, 0, 10, 30)));
        assert_eq!(bbox_of(&[]), None);
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(12, 5), 10);
        assert_eq!(snap(13, 5), 15);
        assert_eq!(snap(-12, 5), -10);
        assert_eq!(snap(-13, 5), -15);
        assert_eq!(snap(15, 5), 15);
    }
}

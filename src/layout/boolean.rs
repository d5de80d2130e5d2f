//! Boolean operations on sets of rectangles.
//!
//! A [`Region`] is a bag of rectangles on one layer. Intersections and
//! differences are computed rectangle by rectangle, so fragments of one
//! logical polygon may come back as several rectangles; [`Region::polygons`]
//! groups touching fragments back together.

use itertools::Itertools;

use crate::geometry::{bbox_of, Rect, RectExt};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

/// A connected group of rectangles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub rects: Vec<Rect>,
}

impl Polygon {
    pub fn bbox(&self) -> Option<Rect> {
        bbox_of(&self.rects)
    }
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn push(&mut self, rect: Rect) {
        if !rect.is_degenerate() {
            self.rects.push(rect);
        }
    }

    /// The area covered by both regions.
    pub fn intersect(&self, other: &Region) -> Region {
        self.rects
            .iter()
            .cartesian_product(other.rects.iter())
            .filter_map(|(a, b)| a.overlap(b))
            .collect()
    }

    /// The area covered by `self` but not by `other`.
    pub fn subtract(&self, other: &Region) -> Region {
        let mut out = Region::new();
        for rect in self.rects.iter() {
            let mut frags = vec![rect.clone()];
            for cut in other.rects.iter() {
                frags = frags.iter().flat_map(|f| f.subtract(cut)).collect();
                if frags.is_empty() {
                    break;
                }
            }
            out.rects.extend(frags);
        }
        out
    }

    /// Groups rectangles that overlap or share an edge into polygons.
    ///
    /// Polygons are returned in order of their first rectangle.
    pub fn polygons(&self) -> Vec<Polygon> {
        let n = self.rects.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (i, j) in (0..n).tuple_combinations() {
            if self.rects[i].touches(&self.rects[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }

        let mut groups: Vec<(usize, Polygon)> = Vec::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, poly)) => poly.rects.push(self.rects[i].clone()),
                None => groups.push((
                    root,
                    Polygon {
                        rects: vec![self.rects[i].clone()],
                    },
                )),
            }
        }
        groups.into_iter().map(|(_, poly)| poly).collect()
    }
}

impl FromIterator<Rect> for Region {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        let mut region = Region::new();
        for rect in iter {
            region.push(rect);
        }
        region
    }
}

impl Region {
    pub fn bbox(&self) -> Option<Rect> {
        bbox_of(&self.rects)
    }
}

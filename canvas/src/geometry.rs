//! Geometry resolver: points, rectangles, and conversion between absolute
//! screen coordinates and parent-relative element coordinates.
//!
//! An element with a `parent_id` stores its position relative to its parent,
//! so its absolute location is the sum of positions along the ancestor chain.
//! Every function here is a pure read of the store and costs O(depth).

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::consts::MAX_ANCESTOR_DEPTH;
use crate::doc::{DocStore, ElementId};
use crate::error::DocError;

/// A point in either absolute or parent-relative space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

/// Axis-aligned rectangle in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

/// Absolute position of an element: its own position plus every ancestor's.
///
/// # Errors
///
/// `NotFound` if `id` is missing, `DanglingParent` if the chain names a
/// missing element, and `DepthExceeded` if the chain is longer than
/// [`MAX_ANCESTOR_DEPTH`] (which only happens when the tree is corrupted).
pub fn absolute_position(doc: &DocStore, id: ElementId) -> Result<Point, DocError> {
    let element = doc.get(&id).ok_or(DocError::NotFound(id))?;
    let mut abs = element.position;
    let mut child = id;
    let mut cursor = element.parent_id;
    let mut depth = 0;

    while let Some(parent_id) = cursor {
        depth += 1;
        if depth > MAX_ANCESTOR_DEPTH {
            return Err(DocError::DepthExceeded(id));
        }
        let parent = doc
            .get(&parent_id)
            .ok_or(DocError::DanglingParent { child, parent: parent_id })?;
        abs = abs + parent.position;
        child = parent_id;
        cursor = parent.parent_id;
    }

    Ok(abs)
}

/// Convert an absolute point into coordinates relative to `parent`.
/// With no parent the point is returned unchanged.
///
/// # Errors
///
/// Propagates [`absolute_position`] failures for the parent.
pub fn relative_position(doc: &DocStore, abs: Point, parent: Option<ElementId>) -> Result<Point, DocError> {
    match parent {
        None => Ok(abs),
        Some(parent_id) => Ok(abs - absolute_position(doc, parent_id)?),
    }
}

/// Absolute bounding box. Missing sizes (text, connection) count as zero.
///
/// # Errors
///
/// Propagates [`absolute_position`] failures.
pub fn bounds(doc: &DocStore, id: ElementId) -> Result<Rect, DocError> {
    let origin = absolute_position(doc, id)?;
    let element = doc.get(&id).ok_or(DocError::NotFound(id))?;
    Ok(Rect::new(
        origin.x,
        origin.y,
        element.width.unwrap_or(0.0),
        element.height.unwrap_or(0.0),
    ))
}

/// Absolute center of an element; connections attach here.
///
/// # Errors
///
/// Propagates [`absolute_position`] failures.
pub fn center(doc: &DocStore, id: ElementId) -> Result<Point, DocError> {
    Ok(bounds(doc, id)?.center())
}

/// Shortest distance from `pt` to the segment `a`–`b`.
#[must_use]
pub fn distance_to_segment(pt: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return (pt.x - a.x).hypot(pt.y - a.y);
    }
    let t = (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * dx, a.y + t * dy);
    (pt.x - proj.x).hypot(pt.y - proj.y)
}

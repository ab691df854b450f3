#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::consts::{HANDLE_RADIUS_PX, HIT_SLOP_PX, TEXT_MIN_HEIGHT, TEXT_MIN_WIDTH};
use crate::doc::{DocStore, Element, ElementId, ElementKind};
use crate::geometry::{self, Point, Rect};
use crate::input::Corner;

/// Which part of an element was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(Corner),
    ConnectionLine,
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub element_id: ElementId,
    pub part: HitPart,
}

/// Test which element (if any) is under `pt`, in absolute coordinates.
///
/// Priority: resize handles of `selected`, then shapes and text top-down,
/// then connection lines, then group frames. Hidden elements are never hit.
#[must_use]
pub fn hit_test(pt: Point, doc: &DocStore, selected: Option<ElementId>) -> Option<Hit> {
    if let Some(hit) = selected.and_then(|id| hit_handle(pt, doc, id)) {
        return Some(hit);
    }

    let top_down: Vec<&Element> = doc.sorted_elements().into_iter().rev().filter(|el| !el.is_hidden).collect();

    let body = |el: &&Element| match el.kind {
        ElementKind::Rectangle | ElementKind::Text => hit_box(doc, el).is_some_and(|r| r.contains(pt)),
        ElementKind::Circle => hit_box(doc, el).is_some_and(|r| ellipse_contains(&r, pt)),
        ElementKind::Connection | ElementKind::Group => false,
    };
    if let Some(el) = top_down.iter().copied().find(body) {
        return Some(Hit { element_id: el.id, part: HitPart::Body });
    }

    let line = top_down
        .iter()
        .copied()
        .filter(|el| el.kind == ElementKind::Connection)
        .find(|el| connection_distance(doc, el, pt).is_some_and(|d| d <= HIT_SLOP_PX));
    if let Some(el) = line {
        return Some(Hit { element_id: el.id, part: HitPart::ConnectionLine });
    }

    top_down
        .into_iter()
        .filter(|el| el.kind == ElementKind::Group)
        .find(|el| hit_box(doc, el).is_some_and(|r| r.contains(pt)))
        .map(|el| Hit { element_id: el.id, part: HitPart::Body })
}

fn hit_handle(pt: Point, doc: &DocStore, id: ElementId) -> Option<Hit> {
    let el = doc.get(&id)?;
    if el.is_hidden || !el.kind.is_sized() {
        return None;
    }
    let Ok(r) = geometry::bounds(doc, id) else {
        return None;
    };
    Corner::ALL
        .into_iter()
        .find(|corner| {
            let anchor = corner.anchor(Point::new(r.x, r.y), r.width, r.height);
            (pt.x - anchor.x).abs() <= HANDLE_RADIUS_PX && (pt.y - anchor.y).abs() <= HANDLE_RADIUS_PX
        })
        .map(|corner| Hit { element_id: id, part: HitPart::ResizeHandle(corner) })
}

/// Absolute box used for hit-testing; auto-sized text gets a nominal box.
fn hit_box(doc: &DocStore, el: &Element) -> Option<Rect> {
    let Ok(mut r) = geometry::bounds(doc, el.id) else {
        return None;
    };
    if el.kind == ElementKind::Text {
        r.width = r.width.max(TEXT_MIN_WIDTH);
        r.height = r.height.max(TEXT_MIN_HEIGHT);
    }
    Some(r)
}

fn ellipse_contains(r: &Rect, pt: Point) -> bool {
    let rx = r.width / 2.0;
    let ry = r.height / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let c = r.center();
    let nx = (pt.x - c.x) / rx;
    let ny = (pt.y - c.y) / ry;
    nx * nx + ny * ny <= 1.0
}

fn connection_distance(doc: &DocStore, el: &Element, pt: Point) -> Option<f64> {
    let (Ok(from), Ok(to)) = (geometry::center(doc, el.from?), geometry::center(doc, el.to?)) else {
        return None;
    };
    Some(geometry::distance_to_segment(pt, from, to))
}

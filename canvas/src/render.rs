//! Read-only views derived from a store snapshot.
//!
//! [`scene`] is the render list the host draws: absolute geometry for every
//! visible element plus its selection state. [`layers`] is the tree shown in
//! the layers panel. Neither mutates application state.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use serde::Serialize;
use tracing::debug;

use crate::doc::{DocStore, Element, ElementId, ElementKind, ElementStyle};
use crate::geometry::{self, Point};

/// One drawable entry in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderItem {
    /// Rectangle, circle, text or group frame at absolute coordinates.
    Shape {
        id: ElementId,
        kind: ElementKind,
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<ElementStyle>,
        selected: bool,
        /// Pending source of a connection gesture.
        connecting: bool,
        z_index: usize,
    },
    /// Straight line between the absolute centers of two elements.
    Connection { id: ElementId, from: Point, to: Point, selected: bool },
}

impl RenderItem {
    #[must_use]
    pub fn id(&self) -> ElementId {
        match self {
            Self::Shape { id, .. } | Self::Connection { id, .. } => *id,
        }
    }
}

/// Build the render list: connections first (beneath shapes), then every
/// other visible element by ascending z.
#[must_use]
pub fn scene(doc: &DocStore) -> Vec<RenderItem> {
    let sorted = doc.sorted_elements();
    let visible = sorted.iter().copied().filter(|el| !el.is_hidden);

    let mut items: Vec<RenderItem> = visible
        .clone()
        .filter(|el| el.kind == ElementKind::Connection)
        .filter_map(|el| connection_item(doc, el))
        .collect();

    for el in visible.filter(|el| el.kind != ElementKind::Connection) {
        match geometry::absolute_position(doc, el.id) {
            Ok(abs) => items.push(RenderItem::Shape {
                id: el.id,
                kind: el.kind,
                x: abs.x,
                y: abs.y,
                width: el.width,
                height: el.height,
                text: el.text.clone(),
                style: el.style.clone(),
                selected: doc.is_selected(&el.id),
                connecting: doc.connecting_from() == Some(el.id),
                z_index: el.z_index,
            }),
            Err(e) => debug!(id = %el.id, error = %e, "skipping unresolvable element"),
        }
    }
    items
}

fn connection_item(doc: &DocStore, el: &Element) -> Option<RenderItem> {
    let (from, to) = (el.from?, el.to?);
    for end in [from, to] {
        if doc.get(&end).is_none_or(|e| e.is_hidden) {
            return None;
        }
    }
    let (Ok(a), Ok(b)) = (geometry::center(doc, from), geometry::center(doc, to)) else {
        return None;
    };
    Some(RenderItem::Connection { id: el.id, from: a, to: b, selected: doc.is_selected(&el.id) })
}

/// Visibility summary of a layers-panel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerVisibility {
    Visible,
    Hidden,
    /// A group whose members disagree with it or with each other.
    Mixed,
}

/// One row of the layers panel. Group rows nest their members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRow {
    pub id: ElementId,
    pub kind: ElementKind,
    pub label: String,
    pub z_index: usize,
    pub visibility: LayerVisibility,
    pub selected: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayerRow>,
}

/// Ungrouped elements, topmost first, with group members nested below
/// their group (also topmost first).
#[must_use]
pub fn layers(doc: &DocStore) -> Vec<LayerRow> {
    doc.sorted_elements()
        .into_iter()
        .rev()
        .filter(|el| el.group_id.is_none())
        .map(|el| layer_row(doc, el, 0))
        .collect()
}

fn layer_row(doc: &DocStore, el: &Element, depth: usize) -> LayerRow {
    let children: Vec<LayerRow> = if el.kind == ElementKind::Group && depth < crate::consts::MAX_ANCESTOR_DEPTH {
        doc.members(&el.id)
            .into_iter()
            .rev()
            .filter_map(|id| doc.get(&id))
            .map(|member| layer_row(doc, member, depth + 1))
            .collect()
    } else {
        Vec::new()
    };

    let own = if el.is_hidden { LayerVisibility::Hidden } else { LayerVisibility::Visible };
    let visibility = if children.iter().all(|c| c.visibility == own) { own } else { LayerVisibility::Mixed };

    LayerRow {
        id: el.id,
        kind: el.kind,
        label: label(el),
        z_index: el.z_index,
        visibility,
        selected: doc.is_selected(&el.id),
        children,
    }
}

fn label(el: &Element) -> String {
    match el.text.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_owned(),
        _ => el.kind.as_str().to_owned(),
    }
}

//! Document model: diagram elements, their sparse updates, and the store.
//!
//! This module defines the data types that describe what is on the canvas
//! (`Element`, `ElementKind`, `ElementStyle`), a sparse-update type for
//! incremental edits (`PartialElement`), and the runtime store that owns all
//! live elements plus the selection and pending-connection state (`DocStore`).
//!
//! The store is the single mutation entry point. Structural operations that
//! touch more than one element (grouping, parenting, visibility cascades)
//! live in [`crate::hierarchy`]; this module covers insertion, patching,
//! removal, selection and z-order.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::consts::MAX_ANCESTOR_DEPTH;
use crate::error::DocError;
use crate::geometry::Point;

/// Unique identifier for a diagram element.
pub type ElementId = Uuid;

/// The kind of a diagram element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Axis-aligned rectangle.
    Rectangle,
    /// Ellipse inscribed within the bounding box.
    Circle,
    /// Auto-sized text label.
    Text,
    /// Line between the centers of two other elements.
    Connection,
    /// Container whose members reference it through `group_id`.
    Group,
}

impl ElementKind {
    /// Parse the lowercase kind name used by drag sources and presets.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rectangle" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "text" => Some(Self::Text),
            "connection" => Some(Self::Connection),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Text => "text",
            Self::Connection => "connection",
            Self::Group => "group",
        }
    }

    /// Whether elements of this kind carry an explicit width and height.
    #[must_use]
    pub fn is_sized(self) -> bool {
        matches!(self, Self::Rectangle | Self::Circle | Self::Group)
    }
}

/// Cosmetic overrides. Never inspected by structural logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,
    /// CSS-style radius such as `"8px"` or `"50%"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<String>,
}

/// A diagram element as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique identifier, fixed at creation.
    pub id: ElementId,
    /// Shape, text, connection or group.
    pub kind: ElementKind,
    /// Top-left corner; relative to the parent when `parent_id` is set.
    pub position: Point,
    /// Width for sized kinds; `None` for text and connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height for sized kinds; `None` for text and connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Label or text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Paint and interaction order. Dense across the store.
    #[serde(default)]
    pub z_index: usize,
    #[serde(default)]
    pub is_hidden: bool,
    /// Set when the element was hidden because a container was hidden,
    /// as opposed to its own visibility toggle.
    #[serde(default)]
    pub hidden_by_cascade: bool,
    /// Positional parent; `position` is relative to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ElementId>,
    /// Group membership; must name a group-kind element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<ElementId>,
    /// Connection source endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ElementId>,
    /// Connection target endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ElementStyle>,
}

impl Element {
    /// A bare element of `kind` at `position` with a fresh id.
    #[must_use]
    pub fn new(kind: ElementKind, position: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            position,
            width: None,
            height: None,
            text: None,
            z_index: 0,
            is_hidden: false,
            hidden_by_cascade: false,
            parent_id: None,
            group_id: None,
            from: None,
            to: None,
            style: None,
        }
    }

    /// A sized element (rectangle, circle or group).
    #[must_use]
    pub fn sized(kind: ElementKind, position: Point, width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::new(kind, position) }
    }

    /// An auto-sized text element.
    #[must_use]
    pub fn text(position: Point, text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::new(ElementKind::Text, position) }
    }

    /// A connection between two existing elements.
    #[must_use]
    pub fn connection(from: ElementId, to: ElementId) -> Self {
        Self { from: Some(from), to: Some(to), ..Self::new(ElementKind::Connection, Point::default()) }
    }
}

/// Sparse update for an element. Only present fields are applied.
///
/// Hierarchy fields (`parent_id`, `group_id`) and `z_index` are not
/// patchable; they change only through `set_parent`, `group`/`ungroup`
/// and `move_layer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ElementStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ElementId>,
    /// Routed through `set_visibility`, which cascades to descendants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
}

impl PartialElement {
    /// A patch that only moves the element.
    #[must_use]
    pub fn position(position: Point) -> Self {
        Self { position: Some(position), ..Default::default() }
    }
}

/// A structural invariant found broken by [`DocStore::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `z_index` values are not exactly `0..len`.
    ZIndexNotDense,
    /// The ancestor chain is cyclic, runaway, or names a missing parent.
    BrokenParentChain(ElementId),
    /// A reference field names a missing or wrong-kind element.
    BadReference { id: ElementId, field: &'static str },
}

/// In-memory store of diagram elements plus selection state.
#[derive(Debug, Default)]
pub struct DocStore {
    pub(crate) elements: HashMap<ElementId, Element>,
    pub(crate) selection: HashSet<ElementId>,
    pub(crate) connecting_from: Option<ElementId>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    /// Return a reference to an element by id.
    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    /// Number of elements currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the store contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Return all elements sorted by `(z_index, id)`, bottom first.
    #[must_use]
    pub fn sorted_elements(&self) -> Vec<&Element> {
        let mut els: Vec<&Element> = self.elements.values().collect();
        els.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        els
    }

    pub(crate) fn sorted_ids(&self) -> Vec<ElementId> {
        self.sorted_elements().into_iter().map(|el| el.id).collect()
    }

    /// Currently selected ids. No ordering guarantee.
    #[must_use]
    pub fn selection(&self) -> &HashSet<ElementId> {
        &self.selection
    }

    #[must_use]
    pub fn is_selected(&self, id: &ElementId) -> bool {
        self.selection.contains(id)
    }

    /// Pending source endpoint of an in-progress connection gesture.
    #[must_use]
    pub fn connecting_from(&self) -> Option<ElementId> {
        self.connecting_from
    }

    // --- Insertion ---

    /// Insert a new element on top of the stack (`z_index = len`).
    ///
    /// # Errors
    ///
    /// `DuplicateId` if the id is taken; `InvalidField`, `InvalidParent`,
    /// `InvalidGroup` or `InvalidEndpoint` if the element's fields or
    /// references are not legal for its kind; `DepthExceeded` if the parent
    /// already sits at the depth cap. An element added under a hidden parent
    /// or group starts cascade-hidden.
    pub fn add(&mut self, mut element: Element) -> Result<(), DocError> {
        if self.elements.contains_key(&element.id) {
            return Err(DocError::DuplicateId(element.id));
        }
        validate_fields(element.kind, element.width, element.height, element.from, element.to)?;
        if element.kind.is_sized() && (element.width.is_none() || element.height.is_none()) {
            let field = if element.width.is_none() { "width" } else { "height" };
            return Err(DocError::InvalidField { kind: element.kind, field });
        }
        if !element.position.is_finite() {
            return Err(DocError::InvalidField { kind: element.kind, field: "position" });
        }
        if let Some(parent_id) = element.parent_id {
            if element.kind == ElementKind::Connection {
                return Err(DocError::InvalidParent(element.id));
            }
            match self.elements.get(&parent_id) {
                Some(parent) if parent.kind != ElementKind::Connection => {}
                _ => return Err(DocError::InvalidParent(parent_id)),
            }
            if self.ancestors(&parent_id)?.len() + 1 > MAX_ANCESTOR_DEPTH {
                return Err(DocError::DepthExceeded(element.id));
            }
        }
        if let Some(group_id) = element.group_id {
            match self.elements.get(&group_id) {
                Some(group) if group.kind == ElementKind::Group => {}
                _ => return Err(DocError::InvalidGroup(group_id)),
            }
        }
        if element.kind == ElementKind::Connection {
            self.validate_endpoints(element.kind, element.from, element.to)?;
        }

        element.z_index = self.elements.len();
        let id = element.id;
        debug!(%id, kind = element.kind.as_str(), z = element.z_index, "element added");
        self.elements.insert(id, element);
        self.settle_visibility(&id);
        Ok(())
    }

    /// Create a connection between two existing, distinct, non-connection
    /// elements and return its id.
    ///
    /// # Errors
    ///
    /// `InvalidEndpoint` if either end is missing, is a connection, or both
    /// ends are the same element.
    pub fn connect(&mut self, from: ElementId, to: ElementId) -> Result<ElementId, DocError> {
        let connection = Element::connection(from, to);
        let id = connection.id;
        self.add(connection)?;
        info!(%id, %from, %to, "connection created");
        Ok(id)
    }

    // --- Update ---

    /// Merge `patch` into the element with `id`.
    ///
    /// The whole patch is validated against the element's kind before any
    /// field is written. An `is_hidden` change goes through
    /// [`DocStore::set_visibility`] and cascades to descendants.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `InvalidField` or `InvalidEndpoint` for
    /// fields that are illegal for the kind.
    pub fn update(&mut self, id: &ElementId, patch: &PartialElement) -> Result<(), DocError> {
        let element = self.elements.get(id).ok_or(DocError::NotFound(*id))?;
        let kind = element.kind;

        validate_fields(kind, patch.width, patch.height, patch.from, patch.to)?;
        if patch.position.is_some_and(|p| !p.is_finite()) {
            return Err(DocError::InvalidField { kind, field: "position" });
        }
        if kind == ElementKind::Connection && (patch.from.is_some() || patch.to.is_some()) {
            let from = patch.from.or(element.from);
            let to = patch.to.or(element.to);
            self.validate_endpoints(kind, from, to)?;
        }

        let Some(element) = self.elements.get_mut(id) else {
            return Err(DocError::NotFound(*id));
        };
        if let Some(position) = patch.position {
            element.position = position;
        }
        if let Some(w) = patch.width {
            element.width = Some(w);
        }
        if let Some(h) = patch.height {
            element.height = Some(h);
        }
        if let Some(ref text) = patch.text {
            element.text = Some(text.clone());
        }
        if let Some(ref style) = patch.style {
            element.style = Some(style.clone());
        }
        if let Some(from) = patch.from {
            element.from = Some(from);
        }
        if let Some(to) = patch.to {
            element.to = Some(to);
        }
        if let Some(hidden) = patch.is_hidden {
            self.set_visibility(id, hidden)?;
        }
        Ok(())
    }

    // --- Removal ---

    /// Remove an element together with its positional descendants and any
    /// connection attached to a removed element. Group members of a removed
    /// group are detached, not deleted. Z-indices are compacted afterwards.
    ///
    /// Returns every removed id, bottom-most first.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not in the store.
    pub fn remove(&mut self, id: &ElementId) -> Result<Vec<ElementId>, DocError> {
        if !self.elements.contains_key(id) {
            return Err(DocError::NotFound(*id));
        }

        let mut doomed: HashSet<ElementId> = self.parent_descendants(id).into_iter().collect();
        doomed.insert(*id);
        let dangling: Vec<ElementId> = self
            .elements
            .values()
            .filter(|el| el.kind == ElementKind::Connection)
            .filter(|el| el.from.is_some_and(|f| doomed.contains(&f)) || el.to.is_some_and(|t| doomed.contains(&t)))
            .map(|el| el.id)
            .collect();
        doomed.extend(dangling);

        let removed: Vec<ElementId> = self
            .sorted_ids()
            .into_iter()
            .filter(|el_id| doomed.contains(el_id))
            .collect();

        let mut detached = Vec::new();
        for el in self.elements.values_mut() {
            if doomed.contains(&el.id) {
                continue;
            }
            if el.group_id.is_some_and(|g| doomed.contains(&g)) {
                el.group_id = None;
                detached.push(el.id);
            }
        }

        self.elements.retain(|el_id, _| !doomed.contains(el_id));
        self.selection.retain(|el_id| !doomed.contains(el_id));
        if self.connecting_from.is_some_and(|f| doomed.contains(&f)) {
            self.connecting_from = None;
        }
        self.restore_cascade_hidden(&detached);
        self.compact_z();

        info!(%id, removed = removed.len(), detached = detached.len(), "element removed");
        Ok(removed)
    }

    /// Remove every id that still resolves, skipping the rest. Ids already
    /// swept away by an earlier removal in the batch are skipped silently.
    pub fn remove_many(&mut self, ids: &[ElementId]) -> Vec<ElementId> {
        let mut removed = Vec::new();
        for id in ids {
            match self.remove(id) {
                Ok(ids) => removed.extend(ids),
                Err(e) => debug!(%id, error = %e, "skipping removal"),
            }
        }
        removed
    }

    // --- Selection ---

    /// Replace the selection. Unknown ids are skipped.
    pub fn set_selection(&mut self, ids: &[ElementId]) {
        self.selection = ids.iter().copied().filter(|id| self.elements.contains_key(id)).collect();
    }

    /// Add `id` to the selection, or remove it if already selected.
    pub fn toggle_selection(&mut self, id: &ElementId) {
        if !self.elements.contains_key(id) {
            debug!(%id, "toggle_selection on unknown element");
            return;
        }
        if !self.selection.remove(id) {
            self.selection.insert(*id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Track (or clear) the pending source of a connection gesture.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is given but unknown.
    pub fn set_connecting_from(&mut self, id: Option<ElementId>) -> Result<(), DocError> {
        if let Some(id) = id {
            if !self.elements.contains_key(&id) {
                return Err(DocError::NotFound(id));
            }
        }
        self.connecting_from = id;
        Ok(())
    }

    // --- Z-order ---

    /// Move an element to `target_z` (clamped to the top), shifting the
    /// elements in between by one.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is unknown.
    pub fn move_layer(&mut self, id: &ElementId, target_z: usize) -> Result<(), DocError> {
        if !self.elements.contains_key(id) {
            return Err(DocError::NotFound(*id));
        }
        let mut order = self.sorted_ids();
        order.retain(|el_id| el_id != id);
        let target = target_z.min(order.len());
        order.insert(target, *id);
        self.renumber(&order);
        Ok(())
    }

    /// Assign `z_index = position in order`. Elements missing from `order`
    /// are appended in their current relative order.
    pub(crate) fn renumber(&mut self, order: &[ElementId]) {
        let listed: HashSet<ElementId> = order.iter().copied().collect();
        let rest: Vec<ElementId> = self.sorted_ids().into_iter().filter(|id| !listed.contains(id)).collect();
        for (z, id) in order.iter().chain(rest.iter()).enumerate() {
            if let Some(el) = self.elements.get_mut(id) {
                el.z_index = z;
            }
        }
    }

    /// Reassign `0..len` preserving the current order.
    pub(crate) fn compact_z(&mut self) {
        let order = self.sorted_ids();
        self.renumber(&order);
    }

    // --- Validation ---

    fn validate_endpoints(&self, kind: ElementKind, from: Option<ElementId>, to: Option<ElementId>) -> Result<(), DocError> {
        let from = from.ok_or(DocError::InvalidField { kind, field: "from" })?;
        let to = to.ok_or(DocError::InvalidField { kind, field: "to" })?;
        for end in [from, to] {
            match self.elements.get(&end) {
                Some(el) if el.kind != ElementKind::Connection => {}
                _ => return Err(DocError::InvalidEndpoint(end)),
            }
        }
        if from == to {
            return Err(DocError::InvalidEndpoint(to));
        }
        Ok(())
    }

    /// Verify every structural invariant, returning whatever is broken.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let mut zs: Vec<usize> = self.elements.values().map(|el| el.z_index).collect();
        zs.sort_unstable();
        if zs.iter().enumerate().any(|(i, z)| i != *z) {
            violations.push(Violation::ZIndexNotDense);
        }

        for el in self.elements.values() {
            if crate::geometry::absolute_position(self, el.id).is_err() {
                violations.push(Violation::BrokenParentChain(el.id));
            }
            if let Some(group_id) = el.group_id {
                if self.elements.get(&group_id).is_none_or(|g| g.kind != ElementKind::Group) {
                    violations.push(Violation::BadReference { id: el.id, field: "group_id" });
                }
            }
            if el.kind == ElementKind::Connection && self.validate_endpoints(el.kind, el.from, el.to).is_err() {
                violations.push(Violation::BadReference { id: el.id, field: "from/to" });
            }
        }

        violations
    }
}

/// Per-kind field legality shared by `add` and `update`.
fn validate_fields(
    kind: ElementKind,
    width: Option<f64>,
    height: Option<f64>,
    from: Option<ElementId>,
    to: Option<ElementId>,
) -> Result<(), DocError> {
    for (field, value) in [("width", width), ("height", height)] {
        let Some(value) = value else {
            continue;
        };
        if !kind.is_sized() || !value.is_finite() || value <= 0.0 {
            return Err(DocError::InvalidField { kind, field });
        }
    }
    if kind != ElementKind::Connection {
        if from.is_some() {
            return Err(DocError::InvalidField { kind, field: "from" });
        }
        if to.is_some() {
            return Err(DocError::InvalidField { kind, field: "to" });
        }
    }
    Ok(())
}

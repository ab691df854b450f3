use tracing::{debug, warn};

use crate::consts::{DEFAULT_CONNECT_KEY, DEFAULT_SHAPE_SIZE, DEFAULT_TEXT, PRESET_DROP_X, PRESET_DROP_Y};
use crate::doc::{DocStore, Element, ElementId, ElementKind, ElementStyle, PartialElement};
use crate::geometry::Point;
use crate::hit::{self, HitPart};
use crate::input::{Button, ConnectMode, InputState, Key, Modifiers};
use crate::render::{self, LayerRow, RenderItem};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ElementCreated(Element),
    ElementUpdated { id: ElementId, fields: PartialElement },
    ElementsDeleted(Vec<ElementId>),
    SelectionChanged,
    ConnectModeChanged(ConnectMode),
    EditTextRequested { id: ElementId, text: String },
    RenderNeeded,
}

/// Tunables for placement and the keyboard surface.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Key that arms connect mode while held (case-insensitive).
    pub connect_key: String,
    /// Width and height of rectangles and circles dropped from the toolbar.
    pub default_shape_size: f64,
    /// Initial label for dropped text elements.
    pub default_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_key: DEFAULT_CONNECT_KEY.to_owned(),
            default_shape_size: DEFAULT_SHAPE_SIZE,
            default_text: DEFAULT_TEXT.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `DIAGRAM_CONNECT_KEY` and `DIAGRAM_SHAPE_SIZE`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connect_key: std::env::var("DIAGRAM_CONNECT_KEY")
                .map_or(defaults.connect_key, |k| k.trim().to_owned()),
            default_shape_size: env_parse("DIAGRAM_SHAPE_SIZE", defaults.default_shape_size),
            default_text: defaults.default_text,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key).map(|v| v.parse::<T>()) {
        Ok(Ok(value)) => value,
        _ => default,
    }
}

/// A styled shape to place directly, e.g. from a saved preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSpec {
    pub kind: ElementKind,
    pub width: f64,
    pub height: f64,
    pub text: Option<String>,
    pub style: Option<ElementStyle>,
    /// Top-left corner; defaults to the preset drop point.
    pub position: Option<Point>,
}

/// Core engine state: the document plus connect mode and the active gesture.
///
/// The host owns exactly one `EngineCore` and routes every mutation through
/// it; render snapshots are read-only views.
#[derive(Debug, Default)]
pub struct EngineCore {
    pub doc: DocStore,
    pub mode: ConnectMode,
    pub input: InputState,
    pub config: EngineConfig,
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config, ..Self::default() }
    }

    // --- Data inputs ---

    /// Insert a fully-formed element.
    pub fn add_element(&mut self, element: Element) -> Vec<Action> {
        let snapshot = element.clone();
        match self.doc.add(element) {
            Ok(()) => {
                let created = self.doc.get(&snapshot.id).cloned().unwrap_or(snapshot);
                vec![Action::ElementCreated(created), Action::RenderNeeded]
            }
            Err(e) => {
                warn!(id = %snapshot.id, error = %e, "add rejected");
                Vec::new()
            }
        }
    }

    /// Handle a toolbar drop of `kind` at `point`. Sized kinds are centered
    /// on the drop point; text is anchored at it.
    pub fn on_drop(&mut self, kind: &str, point: Point) -> Vec<Action> {
        let element = match ElementKind::parse(kind) {
            Some(kind @ (ElementKind::Rectangle | ElementKind::Circle)) => {
                let size = self.config.default_shape_size;
                let origin = Point::new(point.x - size / 2.0, point.y - size / 2.0);
                Element::sized(kind, origin, size, size)
            }
            Some(ElementKind::Text) => Element::text(point, self.config.default_text.clone()),
            _ => {
                debug!(kind, "ignoring drop of unsupported kind");
                return Vec::new();
            }
        };
        self.add_element(element)
    }

    /// Place a styled shape, e.g. from a saved preset.
    pub fn place_shape(&mut self, spec: ShapeSpec) -> Vec<Action> {
        let position = spec.position.unwrap_or(Point::new(PRESET_DROP_X, PRESET_DROP_Y));
        let mut element = Element::sized(spec.kind, position, spec.width, spec.height);
        element.text = spec.text;
        element.style = spec.style;
        self.add_element(element)
    }

    /// Commit text from the host editor back into the element.
    pub fn set_text(&mut self, id: &ElementId, text: String) -> Vec<Action> {
        let fields = PartialElement { text: Some(text), ..Default::default() };
        self.apply(id, fields)
    }

    /// Show or hide an element, cascading to its descendants.
    pub fn set_hidden(&mut self, id: &ElementId, hidden: bool) -> Vec<Action> {
        let fields = PartialElement { is_hidden: Some(hidden), ..Default::default() };
        self.apply(id, fields)
    }

    /// Apply a validated partial update.
    pub fn apply(&mut self, id: &ElementId, fields: PartialElement) -> Vec<Action> {
        match self.doc.update(id, &fields) {
            Ok(()) => vec![Action::ElementUpdated { id: *id, fields }, Action::RenderNeeded],
            Err(e) => {
                debug!(%id, error = %e, "update rejected");
                Vec::new()
            }
        }
    }

    /// Reparent `child` under `parent`, keeping its absolute position.
    pub fn set_parent(&mut self, child: &ElementId, parent: Option<ElementId>) -> Vec<Action> {
        match self.doc.set_parent(child, parent) {
            Ok(()) => {
                let position = self.doc.get(child).map(|el| el.position);
                let fields = PartialElement { position, ..Default::default() };
                vec![Action::ElementUpdated { id: *child, fields }, Action::RenderNeeded]
            }
            Err(_) => Vec::new(),
        }
    }

    /// Group the current selection.
    pub fn group_selection(&mut self) -> Vec<Action> {
        let ids = self.selected_ids();
        match self.doc.group(&ids) {
            Some(group_id) => {
                let mut actions: Vec<Action> = self
                    .doc
                    .get(&group_id)
                    .cloned()
                    .map(Action::ElementCreated)
                    .into_iter()
                    .collect();
                actions.extend([Action::SelectionChanged, Action::RenderNeeded]);
                actions
            }
            None => Vec::new(),
        }
    }

    /// Dissolve every group in the current selection.
    pub fn ungroup_selection(&mut self) -> Vec<Action> {
        let groups: Vec<ElementId> = self
            .selected_ids()
            .into_iter()
            .filter(|id| self.doc.get(id).is_some_and(|el| el.kind == ElementKind::Group))
            .collect();
        let mut freed = Vec::new();
        let mut deleted = Vec::new();
        for group_id in groups {
            match self.doc.ungroup(&group_id) {
                Ok(members) => {
                    freed.extend(members);
                    deleted.push(group_id);
                }
                Err(e) => warn!(%group_id, error = %e, "ungroup rejected"),
            }
        }
        if deleted.is_empty() {
            return Vec::new();
        }
        self.doc.set_selection(&freed);
        vec![Action::ElementsDeleted(deleted), Action::SelectionChanged, Action::RenderNeeded]
    }

    /// Reorder an element in the layer stack.
    pub fn move_layer(&mut self, id: &ElementId, target_z: usize) -> Vec<Action> {
        match self.doc.move_layer(id, target_z) {
            Ok(()) => vec![Action::RenderNeeded],
            Err(e) => {
                debug!(%id, error = %e, "move_layer rejected");
                Vec::new()
            }
        }
    }

    /// Remove every selected element (and whatever cascades with it).
    pub fn delete_selection(&mut self) -> Vec<Action> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Vec::new();
        }
        let removed = self.doc.remove_many(&ids);
        self.doc.clear_selection();
        if self.mode.pending_from().is_some_and(|from| removed.contains(&from)) {
            self.mode = ConnectMode::Armed;
        }
        let gesture_target = match &self.input {
            InputState::DraggingElement { id, .. } | InputState::ResizingElement { id, .. } => Some(*id),
            InputState::Idle => None,
        };
        if gesture_target.is_some_and(|id| removed.contains(&id)) {
            self.input = InputState::Idle;
        }
        vec![Action::ElementsDeleted(removed), Action::SelectionChanged, Action::RenderNeeded]
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, point: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        if self.mode.is_active() {
            return self.connect_press(point);
        }

        let selected = self.single_selection();
        match hit::hit_test(point, &self.doc, selected) {
            Some(hit) => match hit.part {
                HitPart::ResizeHandle(corner) => {
                    let Some(el) = self.doc.get(&hit.element_id) else {
                        return Vec::new();
                    };
                    self.input = InputState::ResizingElement {
                        id: el.id,
                        corner,
                        start_pointer: point,
                        orig_position: el.position,
                        orig_width: el.width.unwrap_or(0.0),
                        orig_height: el.height.unwrap_or(0.0),
                    };
                    Vec::new()
                }
                HitPart::Body => {
                    let id = hit.element_id;
                    if modifiers.shift {
                        self.doc.toggle_selection(&id);
                    } else {
                        self.doc.set_selection(&[id]);
                    }
                    if self.doc.is_selected(&id) {
                        self.input = InputState::DraggingElement {
                            id,
                            start_pointer: point,
                            carried: self.drag_set(&id),
                        };
                    }
                    vec![Action::SelectionChanged, Action::RenderNeeded]
                }
                HitPart::ConnectionLine => {
                    self.doc.set_selection(&[hit.element_id]);
                    vec![Action::SelectionChanged, Action::RenderNeeded]
                }
            },
            None => {
                let had_state = !self.doc.selection().is_empty() || self.doc.connecting_from().is_some();
                self.doc.clear_selection();
                self.clear_connecting_from();
                if had_state {
                    vec![Action::SelectionChanged, Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn on_pointer_move(&mut self, point: Point, _modifiers: Modifiers) -> Vec<Action> {
        match self.input.clone() {
            InputState::Idle => Vec::new(),
            InputState::DraggingElement { start_pointer, carried, .. } => {
                let delta = point - start_pointer;
                let moves: Vec<(ElementId, Point)> = carried.iter().map(|(id, orig)| (*id, *orig + delta)).collect();
                // A frame moves every carried element or none of them.
                if let Some((id, _)) = moves.iter().find(|(id, to)| self.doc.get(id).is_none() || !to.is_finite()) {
                    debug!(%id, "drag frame rejected");
                    self.input = InputState::Idle;
                    return Vec::new();
                }
                let mut actions = Vec::new();
                for (id, to) in moves {
                    let applied = self.apply(&id, PartialElement::position(to));
                    actions.extend(applied.into_iter().filter(|a| !matches!(a, Action::RenderNeeded)));
                }
                actions.push(Action::RenderNeeded);
                actions
            }
            InputState::ResizingElement { id, corner, start_pointer, orig_position, orig_width, orig_height } => {
                let delta = point - start_pointer;
                let (position, width, height) = corner.resize(orig_position, orig_width, orig_height, delta.x, delta.y);
                let fields = PartialElement {
                    position: Some(position),
                    width: Some(width),
                    height: Some(height),
                    ..Default::default()
                };
                let actions = self.apply(&id, fields);
                if actions.is_empty() {
                    self.input = InputState::Idle;
                }
                actions
            }
        }
    }

    pub fn on_pointer_up(&mut self, _point: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        self.input = InputState::Idle;
        Vec::new()
    }

    /// Double-clicking a text element outside connect mode asks the host for new text.
    pub fn on_double_click(&mut self, point: Point) -> Vec<Action> {
        if self.mode.is_active() {
            return Vec::new();
        }
        let Some(hit) = hit::hit_test(point, &self.doc, None) else {
            return Vec::new();
        };
        match self.doc.get(&hit.element_id) {
            Some(el) if el.kind == ElementKind::Text => {
                vec![Action::EditTextRequested { id: el.id, text: el.text.clone().unwrap_or_default() }]
            }
            _ => Vec::new(),
        }
    }

    // --- Keyboard input ---

    pub fn on_key_down(&mut self, key: Key, _modifiers: Modifiers) -> Vec<Action> {
        if key.is(&self.config.connect_key) {
            if self.mode.is_active() {
                return Vec::new();
            }
            self.mode = ConnectMode::Armed;
            self.input = InputState::Idle;
            self.clear_connecting_from();
            return vec![Action::ConnectModeChanged(self.mode), Action::RenderNeeded];
        }
        if key.is_delete() {
            return self.delete_selection();
        }
        if key.is("Escape") {
            let had_state = !self.doc.selection().is_empty()
                || self.mode.pending_from().is_some()
                || self.input != InputState::Idle;
            self.doc.clear_selection();
            self.clear_connecting_from();
            self.input = InputState::Idle;
            if self.mode.pending_from().is_some() {
                self.mode = ConnectMode::Armed;
            }
            if had_state {
                return vec![Action::SelectionChanged, Action::RenderNeeded];
            }
        }
        Vec::new()
    }

    pub fn on_key_up(&mut self, key: Key, _modifiers: Modifiers) -> Vec<Action> {
        if !key.is(&self.config.connect_key) {
            return Vec::new();
        }
        self.mode = ConnectMode::Idle;
        self.clear_connecting_from();
        vec![Action::ConnectModeChanged(self.mode), Action::RenderNeeded]
    }

    // --- Queries ---

    /// Selected ids in stacking order, bottom first.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.doc
            .sorted_elements()
            .into_iter()
            .filter(|el| self.doc.is_selected(&el.id))
            .map(|el| el.id)
            .collect()
    }

    /// Look up an element by ID.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.doc.get(id)
    }

    /// The current render list.
    #[must_use]
    pub fn scene(&self) -> Vec<RenderItem> {
        render::scene(&self.doc)
    }

    /// The current layers-panel tree.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerRow> {
        render::layers(&self.doc)
    }

    // --- Internals ---

    fn single_selection(&self) -> Option<ElementId> {
        let mut it = self.doc.selection().iter();
        match (it.next(), it.next()) {
            (Some(id), None) => Some(*id),
            _ => None,
        }
    }

    fn clear_connecting_from(&mut self) {
        if let Err(e) = self.doc.set_connecting_from(None) {
            debug!(error = %e, "clearing connecting_from");
        }
    }

    /// Pointer press while the connect key is held.
    fn connect_press(&mut self, point: Point) -> Vec<Action> {
        let target = hit::hit_test(point, &self.doc, None)
            .filter(|hit| hit.part != HitPart::ConnectionLine)
            .map(|hit| hit.element_id);

        match (self.mode, target) {
            (ConnectMode::Armed, Some(id)) => {
                if let Err(e) = self.doc.set_connecting_from(Some(id)) {
                    debug!(%id, error = %e, "connect source vanished");
                    return Vec::new();
                }
                self.doc.set_selection(&[id]);
                self.mode = ConnectMode::Pending { from: id };
                vec![Action::ConnectModeChanged(self.mode), Action::SelectionChanged, Action::RenderNeeded]
            }
            (ConnectMode::Pending { from }, Some(to)) if from != to => {
                let created = match self.doc.connect(from, to) {
                    Ok(id) => self.doc.get(&id).cloned(),
                    Err(e) => {
                        warn!(%from, %to, error = %e, "connection rejected");
                        None
                    }
                };
                self.mode = ConnectMode::Armed;
                self.clear_connecting_from();
                let mut actions: Vec<Action> = created.map(Action::ElementCreated).into_iter().collect();
                actions.extend([Action::ConnectModeChanged(self.mode), Action::RenderNeeded]);
                actions
            }
            (ConnectMode::Pending { .. }, None) => {
                self.mode = ConnectMode::Armed;
                self.clear_connecting_from();
                vec![Action::ConnectModeChanged(self.mode), Action::RenderNeeded]
            }
            _ => Vec::new(),
        }
    }

    /// Elements moved by dragging `id`: the element itself and, for groups,
    /// every (transitive) member. Elements whose positional ancestor is
    /// already carried are left out, since they follow their parent.
    fn drag_set(&self, id: &ElementId) -> Vec<(ElementId, Point)> {
        let mut ids = vec![*id];
        let mut cursor = 0;
        while cursor < ids.len() {
            let current = ids[cursor];
            if self.doc.get(&current).is_some_and(|el| el.kind == ElementKind::Group) {
                for member in self.doc.members(&current) {
                    if !ids.contains(&member) {
                        ids.push(member);
                    }
                }
            }
            cursor += 1;
        }

        ids.iter()
            .filter(|el_id| {
                self.doc
                    .ancestors(el_id)
                    .is_ok_and(|chain| !chain.iter().any(|a| ids.contains(a)))
            })
            .filter_map(|el_id| self.doc.get(el_id).map(|el| (el.id, el.position)))
            .collect()
    }
}


//! Input model: modifier keys, mouse buttons, connect mode, and gesture sessions.
//!
//! `ConnectMode` is the small state machine driven by the connect key:
//! holding it arms the mode, the first element pressed becomes the pending
//! endpoint, and the second creates a connection and re-arms for chaining.
//! `InputState` is the active drag or resize gesture tracked between
//! pointer-down and pointer-up. Every pointer-move applies immediately, so
//! there is no commit step and no rollback when a gesture ends.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::MIN_ELEMENT_SIZE;
use crate::doc::ElementId;
use crate::geometry::Point;

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held; toggles selection instead of replacing it.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the host (e.g. `"Delete"`, `"c"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    /// Case-insensitive comparison against a key name.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }

    /// `Delete` or `Backspace`.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.0 == "Delete" || self.0 == "Backspace"
    }
}

/// Connect-mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    /// Connect key not held; pointer presses select and drag.
    #[default]
    Idle,
    /// Connect key held, no endpoint chosen yet.
    Armed,
    /// Connect key held and the source endpoint chosen.
    Pending {
        /// Element the next connection will start from.
        from: ElementId,
    },
}

impl ConnectMode {
    /// Whether the connect key is currently held.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The pending source endpoint, if any.
    #[must_use]
    pub fn pending_from(self) -> Option<ElementId> {
        match self {
            Self::Pending { from } => Some(from),
            _ => None,
        }
    }
}

/// Resize handle position on an element's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight];

    /// Where this handle sits on a box at `origin` with the given size.
    #[must_use]
    pub fn anchor(self, origin: Point, width: f64, height: f64) -> Point {
        match self {
            Self::TopLeft => origin,
            Self::TopRight => Point::new(origin.x + width, origin.y),
            Self::BottomLeft => Point::new(origin.x, origin.y + height),
            Self::BottomRight => Point::new(origin.x + width, origin.y + height),
        }
    }

    /// Apply a pointer delta to a box by dragging this corner. The opposite
    /// corner stays fixed and neither side shrinks below [`MIN_ELEMENT_SIZE`].
    ///
    /// Returns `(position, width, height)`.
    #[must_use]
    pub fn resize(self, origin: Point, width: f64, height: f64, dx: f64, dy: f64) -> (Point, f64, f64) {
        let grows_left = matches!(self, Self::TopLeft | Self::BottomLeft);
        let grows_up = matches!(self, Self::TopLeft | Self::TopRight);

        let new_w = if grows_left { width - dx } else { width + dx }.max(MIN_ELEMENT_SIZE);
        let new_h = if grows_up { height - dy } else { height + dy }.max(MIN_ELEMENT_SIZE);
        let x = if grows_left { origin.x + (width - new_w) } else { origin.x };
        let y = if grows_up { origin.y + (height - new_h) } else { origin.y };

        (Point::new(x, y), new_w, new_h)
    }
}

/// Internal state for the gesture state machine.
///
/// Each active variant carries the context captured on pointer-down so that
/// every pointer-move can recompute geometry from the gesture start.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is moving an element (and, for a group, its members).
    DraggingElement {
        /// Element under the pointer when the drag started.
        id: ElementId,
        /// Pointer position at pointer-down.
        start_pointer: Point,
        /// Every element the drag moves, with its position at pointer-down.
        carried: Vec<(ElementId, Point)>,
    },
    /// The user is resizing an element by one of its corner handles.
    ResizingElement {
        /// Element being resized.
        id: ElementId,
        /// Which corner handle is being dragged.
        corner: Corner,
        /// Pointer position at pointer-down.
        start_pointer: Point,
        /// Element position (parent-relative) at pointer-down.
        orig_position: Point,
        /// Element width at pointer-down.
        orig_width: f64,
        /// Element height at pointer-down.
        orig_height: f64,
    },
}

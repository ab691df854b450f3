//! JSON-lines input scripts replayed against an [`EngineCore`].
//!
//! Each non-blank line is one event object tagged by `event`, e.g.
//! `{"event":"drop","kind":"rectangle","x":150,"y":150}`. Elements are
//! addressed by where they are on the canvas, never by id.

#[cfg(test)]
#[path = "script_test.rs"]
mod script_test;

use std::io::BufRead;

use canvas::engine::{Action, EngineCore};
use canvas::geometry::Point;
use canvas::input::{Button, Key, Modifiers};
use presets::PresetStore;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::CliError;

/// One scripted input event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Drop { kind: String, x: f64, y: f64 },
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        shift: bool,
    },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    /// Press and release at one point.
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        shift: bool,
    },
    KeyDown { key: String },
    KeyUp { key: String },
    /// Double-click a text element and commit `text` to it.
    EditText { x: f64, y: f64, text: String },
    Group,
    Ungroup,
    Delete,
    /// Hide or show every selected element.
    SetHidden { hidden: bool },
    /// Place the newest preset with this name.
    PlacePreset { name: String },
}

/// Counts reported after a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub skipped: usize,
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// `CliError::Script` if the line is not a valid event.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<ScriptEvent>, CliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| CliError::Script { line: line_no, source })
}

/// Replay every event from `input` in order.
///
/// # Errors
///
/// I/O failure reading the script, or a malformed line. Preset store failures
/// only skip the event that needed a preset.
pub fn replay(core: &mut EngineCore, presets: &dyn PresetStore, input: impl BufRead) -> Result<ReplaySummary, CliError> {
    let mut summary = ReplaySummary::default();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let Some(event) = parse_line(&line, idx + 1)? else {
            continue;
        };
        let actions = apply(core, presets, event);
        debug!(line = idx + 1, actions = actions.len(), "event applied");
        summary.events += 1;
        if actions.is_empty() {
            summary.skipped += 1;
        }
    }
    Ok(summary)
}

/// Apply a single event and return the engine's actions.
pub fn apply(core: &mut EngineCore, presets: &dyn PresetStore, event: ScriptEvent) -> Vec<Action> {
    let none = Modifiers::default();
    match event {
        ScriptEvent::Drop { kind, x, y } => core.on_drop(&kind, Point::new(x, y)),
        ScriptEvent::PointerDown { x, y, shift } => {
            core.on_pointer_down(Point::new(x, y), Button::Primary, Modifiers { shift, ..none })
        }
        ScriptEvent::PointerMove { x, y } => core.on_pointer_move(Point::new(x, y), none),
        ScriptEvent::PointerUp { x, y } => core.on_pointer_up(Point::new(x, y), Button::Primary, none),
        ScriptEvent::Click { x, y, shift } => {
            let at = Point::new(x, y);
            let mut actions = core.on_pointer_down(at, Button::Primary, Modifiers { shift, ..none });
            actions.extend(core.on_pointer_up(at, Button::Primary, none));
            actions
        }
        ScriptEvent::KeyDown { key } => core.on_key_down(Key(key), none),
        ScriptEvent::KeyUp { key } => core.on_key_up(Key(key), none),
        ScriptEvent::EditText { x, y, text } => {
            let requested = core.on_double_click(Point::new(x, y));
            match requested.first() {
                Some(Action::EditTextRequested { id, .. }) => {
                    let id = *id;
                    core.set_text(&id, text)
                }
                _ => Vec::new(),
            }
        }
        ScriptEvent::Group => core.group_selection(),
        ScriptEvent::Ungroup => core.ungroup_selection(),
        ScriptEvent::Delete => core.delete_selection(),
        ScriptEvent::SetHidden { hidden } => {
            let mut actions = Vec::new();
            for id in core.selected_ids() {
                actions.extend(core.set_hidden(&id, hidden));
            }
            actions
        }
        ScriptEvent::PlacePreset { name } => place_preset(core, presets, &name),
    }
}

fn place_preset(core: &mut EngineCore, presets: &dyn PresetStore, name: &str) -> Vec<Action> {
    let all = match presets.list() {
        Ok(all) => all,
        Err(e) => {
            warn!(%name, error = %e, "preset store unavailable");
            return Vec::new();
        }
    };
    match all.into_iter().find(|p| p.name == name) {
        Some(preset) => core.place_shape(preset.to_shape_spec()),
        None => {
            warn!(%name, "no preset with that name");
            Vec::new()
        }
    }
}

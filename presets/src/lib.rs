//! Saved shape presets.
//!
//! A preset is a named, styled rectangle or circle the user designed once and
//! can drop onto the canvas again. Presets live outside the diagram: failures
//! here are reported to the caller and never touch diagram state.
//!
//! Two backends implement [`PresetStore`]: [`MemoryPresetStore`] for tests and
//! embedding, and [`FilePresetStore`], which keeps every preset in a single
//! JSON array on disk.


use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use canvas::doc::{ElementKind, ElementStyle};
use canvas::engine::ShapeSpec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub type PresetId = Uuid;

/// Source of `created_at` timestamps, in Unix milliseconds.
pub type Clock = fn() -> i64;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("preset storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preset storage is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("presets must be rectangles or circles, got {}", .0.as_str())]
    InvalidKind(ElementKind),
    #[error("preset {field} must be a positive number, got {value}")]
    InvalidSize { field: &'static str, value: f64 },
}

/// A stored preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePreset {
    pub id: PresetId,
    pub name: String,
    pub kind: ElementKind,
    pub width: f64,
    pub height: f64,
    pub border_color: String,
    pub background_color: String,
    pub border_width: f64,
    pub border_style: String,
    /// Corner radius in pixels; ignored for circles.
    pub border_radius: f64,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl ShapePreset {
    /// The shape this preset places on the canvas. Circles get a `50%`
    /// radius, everything else the stored pixel radius.
    #[must_use]
    pub fn to_shape_spec(&self) -> ShapeSpec {
        let border_radius = if self.kind == ElementKind::Circle {
            "50%".to_owned()
        } else {
            format!("{}px", self.border_radius)
        };
        ShapeSpec {
            kind: self.kind,
            width: self.width,
            height: self.height,
            text: None,
            style: Some(ElementStyle {
                border_color: Some(self.border_color.clone()),
                background_color: Some(self.background_color.clone()),
                border_width: Some(self.border_width),
                border_style: Some(self.border_style.clone()),
                border_radius: Some(border_radius),
            }),
            position: None,
        }
    }
}

/// Fields for a new preset. `Default` gives the designer's starting values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPreset {
    pub name: String,
    pub kind: ElementKind,
    pub width: f64,
    pub height: f64,
    pub border_color: String,
    pub background_color: String,
    pub border_width: f64,
    pub border_style: String,
    pub border_radius: f64,
}

impl Default for NewPreset {
    fn default() -> Self {
        Self {
            name: "Untitled Shape".to_owned(),
            kind: ElementKind::Rectangle,
            width: 100.0,
            height: 100.0,
            border_color: "#000000".to_owned(),
            background_color: "#ffffff".to_owned(),
            border_width: 2.0,
            border_style: "solid".to_owned(),
            border_radius: 0.0,
        }
    }
}

impl NewPreset {
    fn into_preset(self, created_at: i64) -> Result<ShapePreset, PresetError> {
        if !matches!(self.kind, ElementKind::Rectangle | ElementKind::Circle) {
            return Err(PresetError::InvalidKind(self.kind));
        }
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PresetError::InvalidSize { field, value });
            }
        }
        Ok(ShapePreset {
            id: Uuid::new_v4(),
            name: self.name,
            kind: self.kind,
            width: self.width,
            height: self.height,
            border_color: self.border_color,
            background_color: self.background_color,
            border_width: self.border_width,
            border_style: self.border_style,
            border_radius: self.border_radius,
            created_at,
        })
    }
}

/// Storage for saved presets.
pub trait PresetStore {
    /// Save a new preset and return its id.
    ///
    /// # Errors
    ///
    /// `InvalidKind` for anything but rectangles and circles, or a backend failure.
    fn create(&mut self, preset: NewPreset) -> Result<PresetId, PresetError>;

    /// Every preset, newest first.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn list(&self) -> Result<Vec<ShapePreset>, PresetError>;

    /// Delete a preset. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn delete(&mut self, id: &PresetId) -> Result<(), PresetError>;
}

/// Current wall-clock time in Unix milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

/// Newest first; equal timestamps keep the later insertion first.
fn newest_first(mut presets: Vec<ShapePreset>) -> Vec<ShapePreset> {
    presets.reverse();
    presets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    presets
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Debug)]
pub struct MemoryPresetStore {
    presets: Vec<ShapePreset>,
    clock: Clock,
}

impl Default for MemoryPresetStore {
    fn default() -> Self {
        Self::with_clock(now_ms)
    }
}

impl MemoryPresetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self { presets: Vec::new(), clock }
    }
}

impl PresetStore for MemoryPresetStore {
    fn create(&mut self, preset: NewPreset) -> Result<PresetId, PresetError> {
        let preset = preset.into_preset((self.clock)())?;
        let id = preset.id;
        info!(%id, name = %preset.name, "preset saved");
        self.presets.push(preset);
        Ok(id)
    }

    fn list(&self) -> Result<Vec<ShapePreset>, PresetError> {
        Ok(newest_first(self.presets.clone()))
    }

    fn delete(&mut self, id: &PresetId) -> Result<(), PresetError> {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != *id);
        if self.presets.len() == before {
            debug!(%id, "delete of unknown preset");
        } else {
            info!(%id, "preset deleted");
        }
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// Presets kept as one JSON array in a file, created empty on first use.
#[derive(Debug)]
pub struct FilePresetStore {
    path: PathBuf,
    clock: Clock,
}

impl FilePresetStore {
    /// Open (or initialize) the store at `path`.
    ///
    /// # Errors
    ///
    /// I/O failure creating the parent directory or the empty array.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PresetError> {
        Self::open_with_clock(path, now_ms)
    }

    /// # Errors
    ///
    /// As for [`FilePresetStore::open`].
    pub fn open_with_clock(path: impl Into<PathBuf>, clock: Clock) -> Result<Self, PresetError> {
        let store = Self { path: path.into(), clock };
        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            store.write_all(&[])?;
            debug!(path = %store.path.display(), "initialized preset file");
        }
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<ShapePreset>, PresetError> {
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, presets: &[ShapePreset]) -> Result<(), PresetError> {
        let json = serde_json::to_string_pretty(presets)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PresetStore for FilePresetStore {
    fn create(&mut self, preset: NewPreset) -> Result<PresetId, PresetError> {
        let preset = preset.into_preset((self.clock)())?;
        let id = preset.id;
        let name = preset.name.clone();
        let mut presets = self.read_all()?;
        presets.push(preset);
        self.write_all(&presets)?;
        info!(%id, %name, path = %self.path.display(), "preset saved");
        Ok(id)
    }

    fn list(&self) -> Result<Vec<ShapePreset>, PresetError> {
        Ok(newest_first(self.read_all()?))
    }

    fn delete(&mut self, id: &PresetId) -> Result<(), PresetError> {
        let mut presets = self.read_all()?;
        let before = presets.len();
        presets.retain(|p| p.id != *id);
        if presets.len() == before {
            debug!(%id, "delete of unknown preset");
            return Ok(());
        }
        self.write_all(&presets)?;
        info!(%id, "preset deleted");
        Ok(())
    }
}

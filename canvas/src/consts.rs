//! Shared numeric constants for the canvas crate.

// ── Structure ───────────────────────────────────────────────────

/// Maximum number of `parent_id` hops followed before an ancestor walk is
/// treated as a corrupted (cyclic or runaway) chain.
pub const MAX_ANCESTOR_DEPTH: usize = 256;

// ── Placement ───────────────────────────────────────────────────

/// Width and height of a rectangle or circle dropped from the toolbar.
pub const DEFAULT_SHAPE_SIZE: f64 = 100.0;

/// Initial label of a text element dropped from the toolbar.
pub const DEFAULT_TEXT: &str = "Double click to edit";

/// Default key that arms connect mode while held.
pub const DEFAULT_CONNECT_KEY: &str = "c";

/// Where preset shapes land when no explicit position is given.
pub const PRESET_DROP_X: f64 = 100.0;
pub const PRESET_DROP_Y: f64 = 100.0;

/// Smallest width or height a resize gesture may produce.
pub const MIN_ELEMENT_SIZE: f64 = 10.0;

// ── Text ────────────────────────────────────────────────────────

/// Nominal box used to hit-test auto-sized text elements.
pub const TEXT_MIN_WIDTH: f64 = 100.0;
pub const TEXT_MIN_HEIGHT: f64 = 24.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Half the side of a square resize handle, in pixels.
pub const HANDLE_RADIUS_PX: f64 = 6.0;

/// Distance from a connection line that still counts as a hit, in pixels.
pub const HIT_SLOP_PX: f64 = 4.0;

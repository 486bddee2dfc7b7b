//! Shared constants for the stage crate.

// ── Reserved id prefixes ────────────────────────────────────────

/// Id prefix for the transient proxy element that shadows the selected target.
pub const DRAG_ID_PREFIX: &str = "stage-drag-";

/// Id prefix for flow-mode ghost clones. Hit-testing skips ids with this prefix.
pub const GHOST_ID_PREFIX: &str = "stage-ghost-";

// ── Marker classes ──────────────────────────────────────────────

/// Class applied to the currently selected element.
pub const SELECTED_CLASS: &str = "stage-selected";

/// Class applied to every ancestor of the selected element.
pub const SELECTED_PARENT_CLASS: &str = "stage-selected-parent";

/// Class applied to the currently highlighted (hovered) element.
pub const HIGHLIGHT_CLASS: &str = "stage-highlight";

/// Class applied to the innermost container under the pointer during a
/// reparent-capable drag.
pub const CONTAINER_HIGHLIGHT_CLASS: &str = "stage-container-highlight";

// ── Gesture tuning ──────────────────────────────────────────────

/// Default snap distance in document pixels.
pub const SNAP_THRESHOLD_PX: f64 = 8.0;

/// Negative allowance on the container's left/top bound so a snapped drag can
/// land exactly at offset zero.
pub const BOUNDS_EDGE_ALLOWANCE_PX: f64 = 1.0;

/// Default debounce for the container-highlight probe, in host drag ticks.
pub const CONTAINER_HIGHLIGHT_DELAY_TICKS: u32 = 2;

/// Smallest width/height a resize gesture may produce, in document pixels.
pub const MIN_RESIZE_PX: f64 = 1.0;

// ── Document defaults ───────────────────────────────────────────

/// Root font size assumed until the runtime reports one, in pixels.
pub const DEFAULT_ROOT_FONT_SIZE: f64 = 16.0;

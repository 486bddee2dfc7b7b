//! Typed outbound events and the committed-patch wire shapes.
//!
//! Engine operations return `Vec<StageEvent>` instead of firing string-keyed
//! emitter events; the host pattern-matches and forwards. The patch types
//! here are the only artifacts the stage emits toward the authoritative
//! document model, and they serialize sparsely: absent fields stay off the
//! wire.

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;

use serde::{Deserialize, Serialize};

/// Sparse inline-style delta. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDelta {
    /// New CSS position keyword, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// New left offset (e.g. `"100px"` or `"2rem"`), if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    /// New top offset, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    /// New width, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    /// New height, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    /// New transform string, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl StyleDelta {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.left.is_none()
            && self.top.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.transform.is_none()
    }
}

/// One entry of a committed geometry patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// Target element id.
    pub id: String,
    /// Style fields to apply.
    pub style: StyleDelta,
}

/// The committed geometry patch emitted when a gesture ends, consumed by the
/// external document model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePatch {
    /// Per-element style deltas.
    pub data: Vec<UpdateEntry>,
    /// New parent element when the gesture reparented the target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl UpdatePatch {
    /// A patch carrying a single entry and no reparent.
    #[must_use]
    pub fn single(id: impl Into<String>, style: StyleDelta) -> Self {
        Self { data: vec![UpdateEntry { id: id.into(), style }], parent_id: None }
    }
}

/// Axis of a guide line. A horizontal guide is a horizontal line placed at a
/// vertical (y) offset; a vertical guide is a vertical line at an x offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideAxis {
    Horizontal,
    Vertical,
}

/// Result of a flow-reorder gesture: move `source` to `destination`'s slot.
/// `source == destination` reports a no-op drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub source: String,
    pub destination: String,
}

/// Events returned to the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// The subsystem finished mounting into its container.
    Mounted,
    /// The hosted runtime completed its readiness handshake.
    RuntimeReady,
    /// An element became the selected target.
    Select { id: String },
    /// The highlighted target changed; `None` clears the highlight.
    Highlight { id: Option<String> },
    /// Guide lines on one axis changed; offsets are echoed for persistence.
    ChangeGuides { axis: GuideAxis, offsets: Vec<f64> },
    /// A gesture committed a geometry patch.
    Update(UpdatePatch),
    /// A flow-mode drag committed a reorder.
    Sort(SortOrder),
    /// The selected element sits outside the visible box and should be
    /// scrolled into view by the host.
    ScrollIntoView { id: String },
    /// Cursor affordance for the current gesture phase.
    SetCursor(String),
}

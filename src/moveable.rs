//! Drag/resize/rotate/scale gesture engine.
//!
//! SYSTEM CONTEXT
//! ==============
//! All gesture math runs against a calibrated proxy box, never the live
//! element, so visual feedback stays decoupled from committing a change.
//! Points arriving here are already in document coordinates (the
//! orchestrator divides out zoom and the sub-frame offset), which is what
//! makes committed deltas zoom-independent. The live element only ever
//! receives transient inline-style previews; the single authoritative
//! mutation path is the [`UpdatePatch`] emitted at gesture end.
//!
//! Each active gesture variant carries the context captured at gesture
//! start — original boxes in both document space and offset-parent space —
//! so incremental deltas and the final commit are computed from immutable
//! snapshots rather than accumulated float drift.

#[cfg(test)]
#[path = "moveable_test.rs"]
mod moveable_test;

use tracing::debug;

use crate::calibrate;
use crate::consts::{
    BOUNDS_EDGE_ALLOWANCE_PX, CONTAINER_HIGHLIGHT_CLASS, DRAG_ID_PREFIX, GHOST_ID_PREFIX,
    MIN_RESIZE_PX, SNAP_THRESHOLD_PX,
};
use crate::dom::{ContentDoc, Element, Position, TargetMode};
use crate::error::StageError;
use crate::event::{GuideAxis, SortOrder, StageEvent, StyleDelta, UpdatePatch};
use crate::geom::{Point, Rect, px, px_to_rem, round3};
use crate::keyboard::ModifierWatcher;
use crate::mask::MaskLayer;
use crate::snap::{SnapOptions, clamp_rect, snap_rect};

/// When the container-highlight probe runs during a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerHighlightMode {
    /// Probe on every drag tick.
    Always,
    /// Probe only while the alt key is held.
    #[default]
    AltKey,
}

/// Host-supplied gesture options, merged over computed defaults. Explicit
/// fields win.
#[derive(Debug, Clone, Default)]
pub struct MoveableOptions {
    /// Enable snapping at all.
    pub snappable: Option<bool>,
    /// Snap distance in document pixels.
    pub snap_threshold: Option<f64>,
    /// Horizontal guide lines (y offsets).
    pub horizontal_guides: Option<Vec<f64>>,
    /// Vertical guide lines (x offsets).
    pub vertical_guides: Option<Vec<f64>>,
    /// Extra snap-candidate boxes besides sibling rects.
    pub element_guides: Option<Vec<Rect>>,
    /// Clamp bounds override (defaults to the container's content box).
    pub bounds: Option<Rect>,
}

impl MoveableOptions {
    /// Merge, field by field, with `defaults` filling the gaps.
    #[must_use]
    pub fn merged_over(self, defaults: Self) -> Self {
        Self {
            snappable: self.snappable.or(defaults.snappable),
            snap_threshold: self.snap_threshold.or(defaults.snap_threshold),
            horizontal_guides: self.horizontal_guides.or(defaults.horizontal_guides),
            vertical_guides: self.vertical_guides.or(defaults.vertical_guides),
            element_guides: self.element_guides.or(defaults.element_guides),
            bounds: self.bounds.or(defaults.bounds),
        }
    }
}

/// Which resize handle is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    /// Dragging this handle moves the left edge.
    #[must_use]
    pub fn moves_left(self) -> bool {
        matches!(self, Self::Nw | Self::W | Self::Sw)
    }

    /// Dragging this handle moves the top edge.
    #[must_use]
    pub fn moves_top(self) -> bool {
        matches!(self, Self::Nw | Self::N | Self::Ne)
    }

    /// Dragging this handle moves the right edge.
    #[must_use]
    pub fn moves_right(self) -> bool {
        matches!(self, Self::Ne | Self::E | Self::Se)
    }

    /// Dragging this handle moves the bottom edge.
    #[must_use]
    pub fn moves_bottom(self) -> bool {
        matches!(self, Self::Se | Self::S | Self::Sw)
    }

    /// Cursor affordance for this handle.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
            Self::Ne | Self::Sw => "nesw-resize",
            Self::Nw | Self::Se => "nwse-resize",
        }
    }
}

/// Accumulates rotate/scale into a CSS transform string per gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformAccum {
    pub rotate_deg: f64,
    pub scale: f64,
}

impl Default for TransformAccum {
    fn default() -> Self {
        Self { rotate_deg: 0.0, scale: 1.0 }
    }
}

impl TransformAccum {
    /// Render as a CSS transform value; identity renders as `"none"`.
    #[must_use]
    pub fn to_style(&self) -> String {
        let mut parts = Vec::new();
        if self.rotate_deg != 0.0 {
            parts.push(format!("rotate({}deg)", round3(self.rotate_deg)));
        }
        if self.scale != 1.0 {
            parts.push(format!("scale({})", round3(self.scale)));
        }
        if parts.is_empty() {
            "none".to_owned()
        } else {
            parts.join(" ")
        }
    }
}

/// The transient proxy element overlaying the live target.
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    pub id: String,
    pub rect: Rect,
    /// Free-form decoration applied by the host's `update_drag_el` hook.
    pub classes: Vec<String>,
}

/// Flow-mode drag clone; only its vertical offset moves during a drag.
#[derive(Debug, Clone, PartialEq)]
pub struct Ghost {
    pub id: String,
    pub rect: Rect,
    pub orig: Rect,
}

/// The active gesture, with all context captured at gesture start.
#[derive(Debug, Clone, Copy, Default)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Moving the target (or its ghost, in flow mode).
    Dragging {
        /// Document-space box at drag start.
        orig_abs: Rect,
        /// Offset-parent-relative box at drag start; commits are based here.
        orig_rel: Rect,
        /// Document-space pointer position at drag start.
        start: Point,
    },
    /// Resizing from one of the eight handles.
    Resizing {
        anchor: ResizeAnchor,
        orig_abs: Rect,
        orig_rel: Rect,
        start: Point,
    },
    /// Rotating around the proxy center.
    Rotating {
        center: Point,
        start_angle_deg: f64,
        orig_rotate_deg: f64,
    },
    /// Scaling around the proxy center.
    Scaling {
        center: Point,
        start_dist: f64,
        orig_scale: f64,
    },
}

/// The gesture engine. One per stage; retargeted on every selection.
pub struct Moveable {
    base_options: MoveableOptions,
    container_mode: ContainerHighlightMode,
    probe_delay_ticks: u32,
    target: Option<String>,
    mode: Option<TargetMode>,
    proxy: Option<Proxy>,
    ghost: Option<Ghost>,
    gesture: GestureState,
    transform: TransformAccum,
    snap: SnapOptions,
    probe_ticks: u32,
    highlighted_container: Option<String>,
    initialized: bool,
}

impl Moveable {
    /// Build the engine and subscribe it to the shared modifier watcher.
    #[must_use]
    pub fn new(
        base_options: MoveableOptions,
        container_mode: ContainerHighlightMode,
        probe_delay_ticks: u32,
        watcher: &mut ModifierWatcher,
    ) -> Self {
        watcher.subscribe();
        Self {
            base_options,
            container_mode,
            probe_delay_ticks: probe_delay_ticks.max(1),
            target: None,
            mode: None,
            proxy: None,
            ghost: None,
            gesture: GestureState::default(),
            transform: TransformAccum::default(),
            snap: SnapOptions::default(),
            probe_ticks: 0,
            highlighted_container: None,
            initialized: false,
        }
    }

    /// The current gesture target id.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The positioning regime of the current target.
    #[must_use]
    pub fn mode(&self) -> Option<TargetMode> {
        self.mode
    }

    /// The calibrated proxy, once a selection exists.
    #[must_use]
    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Mutable proxy access for the host's decoration hook.
    pub fn proxy_mut(&mut self) -> Option<&mut Proxy> {
        self.proxy.as_mut()
    }

    /// The container currently highlighted as a reparent drop candidate.
    #[must_use]
    pub fn highlighted_container(&self) -> Option<&str> {
        self.highlighted_container.as_deref()
    }

    /// Initialize or re-target the engine for a newly selected element:
    /// classify its positioning mode, calibrate a fresh proxy, and rebuild
    /// the snap candidates from sibling boxes and guide lines.
    ///
    /// # Errors
    ///
    /// [`StageError::NotFound`] when the element is not in the document.
    pub fn select(
        &mut self,
        doc: &mut ContentDoc,
        mask: &MaskLayer,
        id: &str,
        extra_guide_rects: Vec<Rect>,
        overrides: MoveableOptions,
    ) -> Result<(), StageError> {
        let mode = doc
            .target_mode(id)
            .ok_or_else(|| StageError::NotFound(id.to_owned()))?;
        let cal = calibrate::update(doc, mask, id, DRAG_ID_PREFIX)?;
        self.drop_ghost(doc);
        self.target = Some(id.to_owned());
        self.mode = Some(mode);
        self.proxy = Some(Proxy { id: cal.id, rect: cal.rect, classes: Vec::new() });
        self.gesture = GestureState::Idle;
        self.transform = TransformAccum::default();
        self.rebuild_snap(doc, mask, id, mode, extra_guide_rects, overrides);
        self.initialized = true;
        debug!(%id, ?mode, "gesture engine targeted");
        Ok(())
    }

    /// Refresh the proxy and snap candidates after an external geometry
    /// change, without tearing the engine down.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] before any `select`;
    /// [`StageError::NoTarget`] when the target was cleared;
    /// [`StageError::NotFound`] when the target left the document.
    pub fn update_moveable(
        &mut self,
        doc: &mut ContentDoc,
        mask: &MaskLayer,
        extra_guide_rects: Vec<Rect>,
        overrides: MoveableOptions,
    ) -> Result<(), StageError> {
        let id = self.require_target()?.to_owned();
        let mode = doc
            .target_mode(&id)
            .ok_or_else(|| StageError::NotFound(id.clone()))?;
        let cal = calibrate::update(doc, mask, &id, DRAG_ID_PREFIX)?;
        self.mode = Some(mode);
        if let Some(proxy) = self.proxy.as_mut() {
            proxy.id = cal.id;
            proxy.rect = cal.rect;
        } else {
            self.proxy = Some(Proxy { id: cal.id, rect: cal.rect, classes: Vec::new() });
        }
        self.rebuild_snap(doc, mask, &id, mode, extra_guide_rects, overrides);
        Ok(())
    }

    /// Replace the guide lines on one axis of the snap configuration.
    pub fn set_guidelines(&mut self, horizontal: &[f64], vertical: &[f64]) {
        self.snap.horizontal_guides = horizontal.to_vec();
        self.snap.vertical_guides = vertical.to_vec();
    }

    /// Drop all guide lines from the snap configuration.
    pub fn clear_guides(&mut self) {
        self.snap.horizontal_guides.clear();
        self.snap.vertical_guides.clear();
    }

    // --- Drag ---

    /// Begin a drag at `point` (document coordinates).
    ///
    /// Flow targets spawn a ghost clone that absorbs the motion; absolute
    /// and fixed targets move the proxy directly.
    ///
    /// # Errors
    ///
    /// Programmer-misuse errors per [`Self::require_target`], and
    /// [`StageError::NotFound`] when the target vanished.
    pub fn drag_start(
        &mut self,
        doc: &mut ContentDoc,
        point: Point,
    ) -> Result<Vec<StageEvent>, StageError> {
        let id = self.require_target()?.to_owned();
        let (orig_abs, orig_rel) = self.snapshot_boxes(doc, &id)?;
        self.gesture = GestureState::Dragging { orig_abs, orig_rel, start: point };
        self.probe_ticks = 0;
        if self.mode == Some(TargetMode::Sortable) {
            self.spawn_ghost(doc, &id, orig_abs);
        }
        Ok(vec![StageEvent::SetCursor("move".to_owned())])
    }

    /// Drag tick: apply the cumulative delta for the current mode, snap and
    /// clamp, and run the container-highlight probe.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no drag is in progress.
    pub fn drag(
        &mut self,
        doc: &mut ContentDoc,
        point: Point,
        watcher: &ModifierWatcher,
    ) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Dragging { orig_abs, orig_rel, start } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        let dx = point.x - start.x;
        let dy = point.y - start.y;

        match self.mode {
            Some(TargetMode::Sortable) => {
                // Flow reordering is resolved at gesture end; only the ghost
                // moves, and only vertically.
                let ghost_rect = self.ghost.as_ref().map(|g| g.orig.translated(0.0, dy));
                if let (Some(ghost), Some(rect)) = (self.ghost.as_mut(), ghost_rect) {
                    ghost.rect = rect;
                    let ghost_id = ghost.id.clone();
                    if let Some(el) = doc.get_mut(&ghost_id) {
                        el.rect = rect;
                    }
                }
            }
            Some(TargetMode::Absolute | TargetMode::Fixed) => {
                let mut rect = orig_abs.translated(dx, dy);
                let snapped = snap_rect(rect, &self.snap);
                rect = rect.translated(snapped.dx, snapped.dy);
                rect = clamp_rect(rect, &self.snap);
                if let Some(proxy) = self.proxy.as_mut() {
                    proxy.rect = rect;
                }
                // Transient preview on the live element; the committed patch
                // at gesture end remains the authoritative mutation.
                let delta = StyleDelta {
                    left: Some(px(orig_rel.left + (rect.left - orig_abs.left))),
                    top: Some(px(orig_rel.top + (rect.top - orig_abs.top))),
                    ..Default::default()
                };
                doc.apply_style(&id, &delta);
            }
            None => return Err(StageError::NoTarget),
        }

        self.probe_container(doc, point, &id, watcher);
        Ok(Vec::new())
    }

    /// End the drag and emit the committed patch.
    ///
    /// The reparent-vs-sort decision is made here, synchronously, from the
    /// final pointer position — never from a possibly stale highlight
    /// marker.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no drag is in progress.
    pub fn drag_end(
        &mut self,
        doc: &mut ContentDoc,
        point: Point,
        watcher: &ModifierWatcher,
    ) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Dragging { orig_abs, orig_rel, start } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        let dx = point.x - start.x;
        let dy = point.y - start.y;
        let container = if self.probing_active(watcher) {
            innermost_container(doc, point, &id)
        } else {
            None
        };
        let parent = doc.get(&id).and_then(|el| el.parent.clone());
        let reparent_to = container.filter(|c| Some(c) != parent.as_ref());

        let mut events = Vec::new();
        match self.mode {
            Some(TargetMode::Sortable) => {
                let ghost_rect = self.ghost.as_ref().map_or(orig_abs, |g| g.rect);
                if let Some(container) = reparent_to {
                    events.push(StageEvent::Update(reparent_patch(doc, &id, ghost_rect, &container)));
                } else {
                    let displacement = dy;
                    events.push(StageEvent::Sort(sort_decision(doc, &id, displacement, orig_abs.height)));
                }
            }
            Some(TargetMode::Absolute | TargetMode::Fixed) => {
                let mut rect = orig_abs.translated(dx, dy);
                let snapped = snap_rect(rect, &self.snap);
                rect = rect.translated(snapped.dx, snapped.dy);
                rect = clamp_rect(rect, &self.snap);
                if let Some(container) = reparent_to {
                    events.push(StageEvent::Update(reparent_patch(doc, &id, rect, &container)));
                } else {
                    let style = StyleDelta {
                        left: Some(px(orig_rel.left + (rect.left - orig_abs.left))),
                        top: Some(px(orig_rel.top + (rect.top - orig_abs.top))),
                        ..Default::default()
                    };
                    events.push(StageEvent::Update(UpdatePatch::single(id.clone(), style)));
                }
                if let Some(proxy) = self.proxy.as_mut() {
                    proxy.rect = rect;
                }
            }
            None => return Err(StageError::NoTarget),
        }

        self.drop_ghost(doc);
        self.clear_container_highlight(doc);
        self.gesture = GestureState::Idle;
        events.push(StageEvent::SetCursor("default".to_owned()));
        Ok(events)
    }

    // --- Resize ---

    /// Begin a resize from `anchor`.
    ///
    /// # Errors
    ///
    /// Programmer-misuse errors per [`Self::require_target`], and
    /// [`StageError::NotFound`] when the target vanished.
    pub fn resize_start(
        &mut self,
        doc: &mut ContentDoc,
        anchor: ResizeAnchor,
        point: Point,
    ) -> Result<Vec<StageEvent>, StageError> {
        let id = self.require_target()?.to_owned();
        let (orig_abs, orig_rel) = self.snapshot_boxes(doc, &id)?;
        self.gesture = GestureState::Resizing { anchor, orig_abs, orig_rel, start: point };
        Ok(vec![StageEvent::SetCursor(anchor.cursor().to_owned())])
    }

    /// Resize tick: track the drag-compensated box. Flow targets only adjust
    /// width/height; absolute and fixed targets move their origin when the
    /// handle is not the bottom-right corner.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no resize is in progress.
    pub fn resize(&mut self, doc: &mut ContentDoc, point: Point) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Resizing { anchor, orig_abs, orig_rel, start } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        let rect = self.resized_rect(anchor, orig_abs, point, start);
        if let Some(proxy) = self.proxy.as_mut() {
            proxy.rect = rect;
        }
        let delta = match self.mode {
            Some(TargetMode::Sortable) => StyleDelta {
                width: Some(px(rect.width)),
                height: Some(px(rect.height)),
                ..Default::default()
            },
            _ => StyleDelta {
                left: Some(px(orig_rel.left + (rect.left - orig_abs.left))),
                top: Some(px(orig_rel.top + (rect.top - orig_abs.top))),
                width: Some(px(rect.width)),
                height: Some(px(rect.height)),
                ..Default::default()
            },
        };
        doc.apply_style(&id, &delta);
        Ok(Vec::new())
    }

    /// End the resize and commit, converting pixels into root-font-relative
    /// units against the document's current root font size.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no resize is in progress.
    pub fn resize_end(
        &mut self,
        doc: &mut ContentDoc,
        point: Point,
    ) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Resizing { anchor, orig_abs, orig_rel, start } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        let rect = self.resized_rect(anchor, orig_abs, point, start);
        let font = doc.root_font_size();
        let style = match self.mode {
            Some(TargetMode::Sortable) => StyleDelta {
                width: Some(px_to_rem(rect.width, font)),
                height: Some(px_to_rem(rect.height, font)),
                ..Default::default()
            },
            _ => StyleDelta {
                left: Some(px_to_rem(orig_rel.left + (rect.left - orig_abs.left), font)),
                top: Some(px_to_rem(orig_rel.top + (rect.top - orig_abs.top), font)),
                width: Some(px_to_rem(rect.width, font)),
                height: Some(px_to_rem(rect.height, font)),
                ..Default::default()
            },
        };
        if let Some(proxy) = self.proxy.as_mut() {
            proxy.rect = rect;
        }
        self.gesture = GestureState::Idle;
        Ok(vec![
            StageEvent::Update(UpdatePatch::single(id, style)),
            StageEvent::SetCursor("default".to_owned()),
        ])
    }

    // --- Rotate / scale ---

    /// Begin a rotation around the proxy center.
    ///
    /// # Errors
    ///
    /// Programmer-misuse errors per [`Self::require_target`].
    pub fn rotate_start(&mut self, point: Point) -> Result<Vec<StageEvent>, StageError> {
        self.require_target()?;
        let center = self.proxy.as_ref().map(|p| p.rect.center()).ok_or(StageError::NoTarget)?;
        self.gesture = GestureState::Rotating {
            center,
            start_angle_deg: angle_deg(center, point),
            orig_rotate_deg: self.transform.rotate_deg,
        };
        Ok(vec![StageEvent::SetCursor("grabbing".to_owned())])
    }

    /// Rotation tick: accumulate the angular delta; only the transform
    /// style is previewed. No snapping applies to rotation.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no rotation is in progress.
    pub fn rotate(&mut self, doc: &mut ContentDoc, point: Point) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Rotating { center, start_angle_deg, orig_rotate_deg } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        self.transform.rotate_deg = orig_rotate_deg + angle_deg(center, point) - start_angle_deg;
        self.preview_transform(doc, &id);
        Ok(Vec::new())
    }

    /// End the rotation and commit the accumulated transform.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no rotation is in progress.
    pub fn rotate_end(&mut self, doc: &mut ContentDoc, point: Point) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Rotating { center, start_angle_deg, orig_rotate_deg } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        self.transform.rotate_deg = orig_rotate_deg + angle_deg(center, point) - start_angle_deg;
        self.preview_transform(doc, &id);
        self.gesture = GestureState::Idle;
        Ok(self.commit_transform(id))
    }

    /// Begin a scale gesture around the proxy center.
    ///
    /// # Errors
    ///
    /// Programmer-misuse errors per [`Self::require_target`].
    pub fn scale_start(&mut self, point: Point) -> Result<Vec<StageEvent>, StageError> {
        self.require_target()?;
        let center = self.proxy.as_ref().map(|p| p.rect.center()).ok_or(StageError::NoTarget)?;
        self.gesture = GestureState::Scaling {
            center,
            start_dist: dist(center, point).max(1.0),
            orig_scale: self.transform.scale,
        };
        Ok(vec![StageEvent::SetCursor("grabbing".to_owned())])
    }

    /// Scale tick: the factor is the ratio of the pointer's distance from
    /// the center to its distance at gesture start. No snapping.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no scale is in progress.
    pub fn scale(&mut self, doc: &mut ContentDoc, point: Point) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Scaling { center, start_dist, orig_scale } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        self.transform.scale = (orig_scale * dist(center, point) / start_dist).max(0.01);
        self.preview_transform(doc, &id);
        Ok(Vec::new())
    }

    /// End the scale gesture and commit the accumulated transform.
    ///
    /// # Errors
    ///
    /// [`StageError::NotInitialized`] when no scale is in progress.
    pub fn scale_end(&mut self, doc: &mut ContentDoc, point: Point) -> Result<Vec<StageEvent>, StageError> {
        let GestureState::Scaling { center, start_dist, orig_scale } = self.gesture else {
            return Err(StageError::NotInitialized);
        };
        let id = self.require_target()?.to_owned();
        self.transform.scale = (orig_scale * dist(center, point) / start_dist).max(0.01);
        self.preview_transform(doc, &id);
        self.gesture = GestureState::Idle;
        Ok(self.commit_transform(id))
    }

    // --- Shared state management ---

    /// Clear any container-highlight marker, active gesture or not. Called
    /// on alt key-up so no stale marker survives.
    pub fn clear_container_highlight(&mut self, doc: &mut ContentDoc) {
        doc.remove_class_everywhere(CONTAINER_HIGHLIGHT_CLASS);
        self.highlighted_container = None;
        self.probe_ticks = 0;
    }

    /// Drop the current target, proxy and ghost without tearing the engine
    /// down. Subsequent gesture calls fail with [`StageError::NoTarget`].
    pub fn deselect(&mut self, doc: &mut ContentDoc) {
        self.drop_ghost(doc);
        self.clear_container_highlight(doc);
        self.target = None;
        self.mode = None;
        self.proxy = None;
        self.gesture = GestureState::Idle;
        self.transform = TransformAccum::default();
    }

    /// Tear down gesture bindings, the proxy, and the ghost, and release the
    /// modifier-watcher subscription.
    pub fn destroy(&mut self, doc: Option<&mut ContentDoc>, watcher: &mut ModifierWatcher) {
        if let Some(doc) = doc {
            self.drop_ghost(doc);
            doc.remove_class_everywhere(CONTAINER_HIGHLIGHT_CLASS);
        }
        self.target = None;
        self.mode = None;
        self.proxy = None;
        self.ghost = None;
        self.gesture = GestureState::Idle;
        self.transform = TransformAccum::default();
        self.snap = SnapOptions::default();
        self.highlighted_container = None;
        self.probe_ticks = 0;
        self.initialized = false;
        watcher.unsubscribe();
        debug!("gesture engine destroyed");
    }

    // --- Internals ---

    /// Fail fast on calling-order bugs: [`StageError::NotInitialized`]
    /// before the first `select`, [`StageError::NoTarget`] when the target
    /// is unset.
    fn require_target(&self) -> Result<&str, StageError> {
        if !self.initialized {
            return Err(StageError::NotInitialized);
        }
        self.target.as_deref().ok_or(StageError::NoTarget)
    }

    fn snapshot_boxes(&self, doc: &ContentDoc, id: &str) -> Result<(Rect, Rect), StageError> {
        let abs = doc
            .absolute_rect(id)
            .ok_or_else(|| StageError::NotFound(id.to_owned()))?;
        let rel = doc
            .get(id)
            .map(|el| el.rect)
            .ok_or_else(|| StageError::NotFound(id.to_owned()))?;
        Ok((abs, rel))
    }

    fn spawn_ghost(&mut self, doc: &mut ContentDoc, id: &str, orig_abs: Rect) {
        let ghost_id = format!("{GHOST_ID_PREFIX}{id}");
        let tag = doc.get(id).map_or_else(|| "div".to_owned(), |el| el.tag.clone());
        let ghost_el = Element {
            tag,
            position: Position::Absolute,
            rect: orig_abs,
            z_index: i64::MAX,
            ..Element::new(ghost_id.clone())
        };
        let root = doc.root_id().to_owned();
        doc.insert(&root, ghost_el);
        self.ghost = Some(Ghost { id: ghost_id, rect: orig_abs, orig: orig_abs });
    }

    fn drop_ghost(&mut self, doc: &mut ContentDoc) {
        if let Some(ghost) = self.ghost.take() {
            doc.remove(&ghost.id);
        }
    }

    fn probing_active(&self, watcher: &ModifierWatcher) -> bool {
        match self.container_mode {
            ContainerHighlightMode::Always => true,
            ContainerHighlightMode::AltKey => watcher.is_alt_down(),
        }
    }

    /// Debounced container probe during a drag tick. The marker class is
    /// visual affordance only; the drop decision re-runs the hit-test.
    fn probe_container(&mut self, doc: &mut ContentDoc, point: Point, id: &str, watcher: &ModifierWatcher) {
        if !self.probing_active(watcher) {
            if self.highlighted_container.is_some() {
                self.clear_container_highlight(doc);
            }
            self.probe_ticks = 0;
            return;
        }
        self.probe_ticks += 1;
        if self.probe_ticks < self.probe_delay_ticks {
            return;
        }
        let hit = innermost_container(doc, point, id);
        if hit != self.highlighted_container {
            doc.remove_class_everywhere(CONTAINER_HIGHLIGHT_CLASS);
            if let Some(container) = &hit {
                doc.add_class(container, CONTAINER_HIGHLIGHT_CLASS);
            }
            self.highlighted_container = hit;
        }
    }

    fn resized_rect(&self, anchor: ResizeAnchor, orig: Rect, point: Point, start: Point) -> Rect {
        let dx = point.x - start.x;
        let dy = point.y - start.y;
        let mut rect = orig;
        if anchor.moves_left() {
            rect.left = orig.left + dx;
            rect.width = orig.width - dx;
        } else if anchor.moves_right() {
            rect.width = orig.width + dx;
        }
        if anchor.moves_top() {
            rect.top = orig.top + dy;
            rect.height = orig.height - dy;
        } else if anchor.moves_bottom() {
            rect.height = orig.height + dy;
        }
        if rect.width < MIN_RESIZE_PX {
            if anchor.moves_left() {
                rect.left = orig.right() - MIN_RESIZE_PX;
            }
            rect.width = MIN_RESIZE_PX;
        }
        if rect.height < MIN_RESIZE_PX {
            if anchor.moves_top() {
                rect.top = orig.bottom() - MIN_RESIZE_PX;
            }
            rect.height = MIN_RESIZE_PX;
        }
        if self.mode == Some(TargetMode::Sortable) {
            // Position is not meaningful pre-commit in flow.
            rect.left = orig.left;
            rect.top = orig.top;
        } else {
            rect = self.snap_resize(rect, anchor);
        }
        rect
    }

    /// Snap only the edges the anchor moves, so the box resizes toward the
    /// candidate instead of shifting.
    fn snap_resize(&self, rect: Rect, anchor: ResizeAnchor) -> Rect {
        if self.snap.threshold <= 0.0 {
            return rect;
        }
        let probe_x = if anchor.moves_left() {
            Some(rect.left)
        } else if anchor.moves_right() {
            Some(rect.right())
        } else {
            None
        };
        let probe_y = if anchor.moves_top() {
            Some(rect.top)
        } else if anchor.moves_bottom() {
            Some(rect.bottom())
        } else {
            None
        };
        let probe = Rect::new(probe_x.unwrap_or(rect.left), probe_y.unwrap_or(rect.top), 0.0, 0.0);
        let edges_only = SnapOptions { center: false, bounds: None, ..self.snap.clone() };
        let snapped = snap_rect(probe, &edges_only);
        let mut out = rect;
        if probe_x.is_some() && snapped.snapped_x {
            if anchor.moves_left() {
                out.left += snapped.dx;
                out.width -= snapped.dx;
            } else {
                out.width += snapped.dx;
            }
        }
        if probe_y.is_some() && snapped.snapped_y {
            if anchor.moves_top() {
                out.top += snapped.dy;
                out.height -= snapped.dy;
            } else {
                out.height += snapped.dy;
            }
        }
        out
    }

    fn preview_transform(&self, doc: &mut ContentDoc, id: &str) {
        let delta = StyleDelta { transform: Some(self.transform.to_style()), ..Default::default() };
        doc.apply_style(id, &delta);
    }

    fn commit_transform(&self, id: String) -> Vec<StageEvent> {
        let style = StyleDelta { transform: Some(self.transform.to_style()), ..Default::default() };
        vec![
            StageEvent::Update(UpdatePatch::single(id, style)),
            StageEvent::SetCursor("default".to_owned()),
        ]
    }

    fn rebuild_snap(
        &mut self,
        doc: &ContentDoc,
        mask: &MaskLayer,
        id: &str,
        mode: TargetMode,
        extra_guide_rects: Vec<Rect>,
        overrides: MoveableOptions,
    ) {
        // Sibling boxes are regenerated here, at selection/update time, not
        // per gesture tick.
        let mut element_guides: Vec<Rect> = doc
            .siblings(id)
            .iter()
            .filter(|sid| !is_stage_artifact(sid))
            .filter_map(|sid| doc.absolute_rect(sid))
            .collect();
        element_guides.extend(extra_guide_rects);

        let bounds = doc
            .get(id)
            .and_then(|el| el.parent.as_deref())
            .and_then(|pid| doc.absolute_rect(pid));

        let defaults = MoveableOptions {
            snappable: Some(mode != TargetMode::Sortable),
            snap_threshold: Some(SNAP_THRESHOLD_PX),
            horizontal_guides: Some(mask.guides(GuideAxis::Horizontal).to_vec()),
            vertical_guides: Some(mask.guides(GuideAxis::Vertical).to_vec()),
            element_guides: Some(element_guides),
            bounds,
        };
        let base = self.base_options.clone();
        let merged = overrides.merged_over(base.merged_over(defaults));
        let snappable = merged.snappable.unwrap_or(false) && mode != TargetMode::Sortable;
        self.snap = SnapOptions {
            horizontal_guides: merged.horizontal_guides.unwrap_or_default(),
            vertical_guides: merged.vertical_guides.unwrap_or_default(),
            element_rects: merged.element_guides.unwrap_or_default(),
            threshold: if snappable { merged.snap_threshold.unwrap_or(SNAP_THRESHOLD_PX) } else { 0.0 },
            // Center/middle snapping is an absolute-mode affordance; fixed
            // mode snaps edges only.
            center: mode == TargetMode::Absolute,
            bounds: if mode == TargetMode::Sortable { None } else { merged.bounds },
            edge_allowance: BOUNDS_EDGE_ALLOWANCE_PX,
        };
    }
}

/// The innermost container under `point`, excluding the dragged element,
/// its descendants, and stage-internal artifacts.
#[must_use]
pub fn innermost_container(doc: &ContentDoc, point: Point, dragged_id: &str) -> Option<String> {
    doc.elements_from_point(point)
        .into_iter()
        .find(|id| {
            id != dragged_id
                && !is_stage_artifact(id)
                && !doc.is_ancestor(dragged_id, id)
                && doc.get(id).is_some_and(|el| el.container)
        })
}

/// Resolve a flow drag into a reorder: displacement below half the target's
/// height is a no-op (source == destination); at or beyond the threshold,
/// downward motion inserts after the next sibling, upward before the
/// previous one.
#[must_use]
pub fn sort_decision(doc: &ContentDoc, id: &str, displacement: f64, height: f64) -> SortOrder {
    let source = id.to_owned();
    let threshold = height * 0.5;
    if displacement.abs() < threshold {
        return SortOrder { destination: source.clone(), source };
    }
    let neighbor = if displacement > 0.0 {
        flow_sibling(doc, id, SiblingDir::Next)
    } else {
        flow_sibling(doc, id, SiblingDir::Prev)
    };
    let destination = neighbor.unwrap_or_else(|| source.clone());
    SortOrder { source, destination }
}

#[derive(Clone, Copy)]
enum SiblingDir {
    Prev,
    Next,
}

fn flow_sibling(doc: &ContentDoc, id: &str, dir: SiblingDir) -> Option<String> {
    let mut cur = id.to_owned();
    loop {
        let next = match dir {
            SiblingDir::Prev => doc.prev_sibling(&cur)?,
            SiblingDir::Next => doc.next_sibling(&cur)?,
        };
        if !is_stage_artifact(next) {
            return Some(next.to_owned());
        }
        cur = next.to_owned();
    }
}

fn reparent_patch(doc: &ContentDoc, id: &str, final_rect: Rect, container: &str) -> UpdatePatch {
    let container_abs = doc.absolute_rect(container).unwrap_or_default();
    let style = StyleDelta {
        left: Some(px(final_rect.left - container_abs.left)),
        top: Some(px(final_rect.top - container_abs.top)),
        ..Default::default()
    };
    let mut patch = UpdatePatch::single(id, style);
    patch.parent_id = Some(container.to_owned());
    patch
}

/// Whether an id names a stage-internal artifact (ghost or proxy).
#[must_use]
pub fn is_stage_artifact(id: &str) -> bool {
    id.starts_with(GHOST_ID_PREFIX) || id.starts_with(DRAG_ID_PREFIX)
}

fn angle_deg(center: Point, p: Point) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}

fn dist(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

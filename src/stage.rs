//! Selection and hit-testing orchestrator.
//!
//! SYSTEM CONTEXT
//! ==============
//! `StageCore` is the root of the subsystem: the host mounts it with a
//! configuration, forwards pointer/keyboard activity from the overlay, and
//! consumes the typed events every operation returns. It owns the zoom
//! factor, the rendering bridge, the overlay state, the gesture engine and
//! the shared modifier watcher, and it is the only writer of selection and
//! highlight state.
//!
//! Suspension points are modeled as explicit continuations: operations that
//! need the runtime before its readiness handshake are queued and drained
//! when `runtime_ready` fires, and the post-update re-anchor runs on the
//! next host `tick` so the hosted content can finish re-rendering first.
//! After `destroy`, all pending continuations resolve as no-ops.

#[cfg(test)]
#[path = "stage_test.rs"]
mod stage_test;

use tracing::{debug, warn};

use crate::bridge::{LoadMode, RenderBridge};
use crate::consts::{
    CONTAINER_HIGHLIGHT_DELAY_TICKS, HIGHLIGHT_CLASS, SELECTED_CLASS, SELECTED_PARENT_CLASS,
};
use crate::dom::{ContentDoc, Element, TargetMode};
use crate::error::StageError;
use crate::event::{GuideAxis, StageEvent, UpdatePatch};
use crate::geom::{Point, Rect, Viewport};
use crate::keyboard::{Modifiers, ModifierWatcher};
use crate::mask::MaskLayer;
use crate::moveable::{
    ContainerHighlightMode, Moveable, MoveableOptions, Proxy, ResizeAnchor, is_stage_artifact,
};
use crate::runtime::{LocalRuntime, Runtime};

/// What kind of pointer event the overlay captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Hover movement; drives highlighting.
    Move,
    /// Press; drives selection.
    Down,
    /// Release.
    Up,
}

/// A pointer event in overlay coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub point: Point,
    pub kind: PointerKind,
    pub modifiers: Modifiers,
}

impl PointerInput {
    #[must_use]
    pub fn new(point: Point, kind: PointerKind) -> Self {
        Self { point, kind, modifiers: Modifiers::default() }
    }
}

/// Strategy deciding whether a hit-list candidate is selectable. Calling the
/// third argument stops the walk after this candidate regardless of the
/// returned verdict.
pub type CanSelect = Box<dyn Fn(&Element, &PointerInput, &mut dyn FnMut()) -> bool>;

/// Host hook decorating the proxy after calibration.
pub type UpdateDragEl = Box<dyn Fn(&mut Proxy, &Element)>;

/// Render hook used when no runtime URL is configured.
pub type RenderFn = Box<dyn Fn(&mut ContentDoc)>;

/// Per-selection gesture options: a static object or a function computing
/// them from the content document and the target.
pub enum MoveableOptionsSource {
    Static(MoveableOptions),
    Computed(Box<dyn Fn(&ContentDoc, &str) -> MoveableOptions>),
}

/// Stage configuration. Everything is optional; defaults select any element
/// with a non-empty id and snap with the built-in tuning.
pub struct StageConfig {
    /// Initial zoom factor.
    pub zoom: f64,
    /// URL the rendering surface loads, when runtime-hosted.
    pub runtime_url: Option<String>,
    /// The editor's own origin, for the same/cross-origin decision.
    pub editor_origin: String,
    /// Selectability strategy; `None` accepts any non-root element with an id.
    pub can_select: Option<CanSelect>,
    /// Gesture options merged over computed defaults.
    pub moveable_options: Option<MoveableOptionsSource>,
    /// Content renderer used when `runtime_url` is absent.
    pub render: Option<RenderFn>,
    /// Emit [`StageEvent::ScrollIntoView`] when selecting off-screen targets.
    pub auto_scroll_into_view: bool,
    /// Proxy decoration hook.
    pub update_drag_el: Option<UpdateDragEl>,
    /// When the container-highlight probe runs during drags.
    pub container_highlight_mode: ContainerHighlightMode,
    /// Debounce for the container probe, in drag ticks.
    pub container_highlight_ticks: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            runtime_url: None,
            editor_origin: String::new(),
            can_select: None,
            moveable_options: None,
            render: None,
            auto_scroll_into_view: false,
            update_drag_el: None,
            container_highlight_mode: ContainerHighlightMode::default(),
            container_highlight_ticks: CONTAINER_HIGHLIGHT_DELAY_TICKS,
        }
    }
}

/// A continuation waiting on readiness or on the next host tick.
enum Deferred {
    /// A select that arrived before the runtime handshake.
    Select { id: String, input: Option<PointerInput> },
    /// Post-update re-resolution of the selected element, after the hosted
    /// content had a chance to replace the node.
    Reanchor { id: String },
}

/// The stage orchestrator.
pub struct StageCore {
    config: StageConfig,
    viewport: Viewport,
    bridge: RenderBridge,
    mask: MaskLayer,
    moveable: Moveable,
    watcher: ModifierWatcher,
    selected_id: Option<String>,
    highlighted_id: Option<String>,
    deferred: Vec<Deferred>,
    destroyed: bool,
}

impl StageCore {
    /// Build the whole subsystem from a configuration. Nothing is live until
    /// [`StageCore::mount`].
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        let bridge = RenderBridge::new(config.runtime_url.as_deref(), &config.editor_origin);
        let mut watcher = ModifierWatcher::new();
        let moveable = Moveable::new(
            MoveableOptions::default(),
            config.container_highlight_mode,
            config.container_highlight_ticks,
            &mut watcher,
        );
        let viewport = Viewport { zoom: if config.zoom > 0.0 { config.zoom } else { 1.0 }, frame_offset: Point::default() };
        Self {
            config,
            viewport,
            bridge,
            mask: MaskLayer::new(),
            moveable,
            watcher,
            selected_id: None,
            highlighted_id: None,
            deferred: Vec::new(),
            destroyed: false,
        }
    }

    // --- Accessors ---

    /// Current zoom factor.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.viewport.zoom
    }

    /// The currently selected element id, if any.
    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// The currently highlighted element id, if any.
    #[must_use]
    pub fn highlighted_id(&self) -> Option<&str> {
        self.highlighted_id.as_deref()
    }

    /// The overlay layer state.
    #[must_use]
    pub fn mask(&self) -> &MaskLayer {
        &self.mask
    }

    /// The rendering bridge.
    #[must_use]
    pub fn bridge(&self) -> &RenderBridge {
        &self.bridge
    }

    /// The gesture engine.
    #[must_use]
    pub fn moveable(&self) -> &Moveable {
        &self.moveable
    }

    /// The content document, while the surface is alive.
    #[must_use]
    pub fn doc(&self) -> Option<&ContentDoc> {
        self.bridge.doc()
    }

    // --- Lifecycle ---

    /// Mount the subsystem. In custom-render mode the render hook populates
    /// the content tree and a [`LocalRuntime`] completes the handshake
    /// immediately (unless the host already supplied a runtime).
    ///
    /// # Errors
    ///
    /// [`StageError::Mount`] when the stage was destroyed or already
    /// mounted.
    pub fn mount(&mut self) -> Result<Vec<StageEvent>, StageError> {
        if self.destroyed {
            return Err(StageError::Mount("stage was destroyed".to_owned()));
        }
        self.bridge.mount()?;
        let mut events = vec![StageEvent::Mounted];
        if *self.bridge.load_mode() == LoadMode::Custom {
            if let Some(render) = &self.config.render {
                if let Some(doc) = self.bridge.doc_mut() {
                    render(doc);
                }
            }
            if !self.bridge.is_ready() {
                events.extend(self.runtime_ready(Box::new(LocalRuntime)));
            }
        }
        debug!("stage mounted");
        Ok(events)
    }

    /// Completes the readiness handshake with the hosted runtime's handle
    /// and drains operations that were waiting for it.
    pub fn runtime_ready(&mut self, handle: Box<dyn Runtime>) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        let mut events = self.bridge.runtime_ready(handle);
        if events.is_empty() {
            return events;
        }
        let mut kept = Vec::new();
        let jobs = std::mem::take(&mut self.deferred);
        for job in jobs {
            match job {
                Deferred::Select { id, input } => match self.select(&id, input.as_ref()) {
                    Ok(selected) => events.extend(selected),
                    Err(err) => warn!(%err, "deferred select dropped"),
                },
                other @ Deferred::Reanchor { .. } => kept.push(other),
            }
        }
        self.deferred.extend(kept);
        events
    }

    /// Run continuations scheduled for "after the hosted content had a
    /// chance to re-render" — the engine's stand-in for a macrotask delay.
    pub fn tick(&mut self) -> Vec<StageEvent> {
        if self.destroyed {
            self.deferred.clear();
            return Vec::new();
        }
        let jobs = std::mem::take(&mut self.deferred);
        let mut kept = Vec::new();
        for job in jobs {
            match job {
                Deferred::Reanchor { id } => self.reanchor(&id),
                other @ Deferred::Select { .. } => kept.push(other),
            }
        }
        self.deferred.extend(kept);
        Vec::new()
    }

    /// Tear everything down. Idempotent; pending continuations become
    /// no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.moveable.destroy(self.bridge.doc_mut(), &mut self.watcher);
        self.bridge.destroy();
        self.deferred.clear();
        self.selected_id = None;
        self.highlighted_id = None;
        self.destroyed = true;
        debug!("stage destroyed");
    }

    // --- Hit-testing ---

    /// Resolve the element under a pointer event and drive highlight/select.
    ///
    /// Coordinates are corrected for zoom, the sub-frame offset, and the
    /// overlay's pan position. Stage-internal artifacts (ghost and proxy
    /// ids) are skipped; the `can_select` strategy judges each remaining
    /// candidate, topmost first, and may stop the walk. A move event
    /// highlights the first positive candidate; any other event selects it.
    ///
    /// Hit-testing through a torn-down or unmounted surface yields no
    /// events — that is silent degradation, not an error.
    pub fn set_element_from_point(&mut self, input: &PointerInput) -> Vec<StageEvent> {
        if self.destroyed || !self.bridge.is_mounted() {
            return Vec::new();
        }
        let doc_point = self.doc_point(input.point);
        let decision = {
            let Some(doc) = self.bridge.doc() else {
                return Vec::new();
            };
            let mut chosen = None;
            for id in doc.elements_from_point(doc_point) {
                if is_stage_artifact(&id) {
                    continue;
                }
                let Some(el) = doc.get(&id) else {
                    continue;
                };
                let mut stop = false;
                let selectable = match &self.config.can_select {
                    Some(predicate) => predicate(el, input, &mut || stop = true),
                    None => !el.id.is_empty() && el.id != doc.root_id(),
                };
                if selectable {
                    chosen = Some(id);
                    break;
                }
                if stop {
                    break;
                }
            }
            chosen
        };
        match (decision, input.kind) {
            (Some(id), PointerKind::Move) => self.highlight(&id),
            (Some(id), _) => match self.select(&id, Some(input)) {
                Ok(events) => events,
                Err(err) => {
                    warn!(%err, "hit-test select failed");
                    Vec::new()
                }
            },
            (None, PointerKind::Move) => self.clear_highlight(),
            (None, _) => Vec::new(),
        }
    }

    // --- Selection ---

    /// Select an element by id.
    ///
    /// No-ops when the element is already selected. Before the runtime
    /// handshake the call is queued and re-applied on readiness.
    ///
    /// # Errors
    ///
    /// [`StageError::NotFound`] when the id does not resolve — this is the
    /// authoritative path, so the failure propagates.
    pub fn select(
        &mut self,
        id: &str,
        input: Option<&PointerInput>,
    ) -> Result<Vec<StageEvent>, StageError> {
        if self.destroyed {
            return Ok(Vec::new());
        }
        if !self.bridge.is_ready() {
            self.deferred.push(Deferred::Select { id: id.to_owned(), input: input.copied() });
            return Ok(Vec::new());
        }
        if !self.bridge.doc().is_some_and(|d| d.contains(id)) {
            return Err(StageError::NotFound(id.to_owned()));
        }
        if self.selected_id.as_deref() == Some(id) {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();

        // Runtime-side selection effect and pre-select gate.
        let allowed = self
            .bridge
            .with_runtime_now(|rt, doc| {
                rt.select(doc, id);
                rt.before_select(doc, id)
            })
            .unwrap_or(true);
        if !allowed {
            debug!(id, "selection vetoed by runtime gate");
            return Ok(events);
        }

        let mode = self
            .bridge
            .doc()
            .and_then(|d| d.target_mode(id))
            .ok_or_else(|| StageError::NotFound(id.to_owned()))?;
        self.mask.set_fixed_layout(mode == TargetMode::Fixed);
        if let Some(rect) = self.bridge.root_rect() {
            self.mask.observe_page_rect(rect);
        }

        let overrides = self.resolve_moveable_options(id);
        let extra = self
            .bridge
            .with_runtime_now(|rt, doc| rt.guide_line_rects(doc))
            .unwrap_or_default();
        let visible = self.visible_doc_rect();
        let scroll_target = {
            let Some(doc) = self.bridge.doc_mut() else {
                return Ok(events);
            };
            self.moveable.select(doc, &self.mask, id, extra, overrides)?;
            if let Some(hook) = &self.config.update_drag_el {
                if let (Some(proxy), Some(el)) = (self.moveable.proxy_mut(), doc.get(id)) {
                    hook(proxy, el);
                }
            }

            // Marker classes are visual affordance only, never geometry.
            doc.remove_class_everywhere(SELECTED_CLASS);
            doc.remove_class_everywhere(SELECTED_PARENT_CLASS);
            doc.add_class(id, SELECTED_CLASS);
            for ancestor in doc.ancestors(id) {
                doc.add_class(&ancestor, SELECTED_PARENT_CLASS);
            }

            self.config.auto_scroll_into_view
                && doc.absolute_rect(id).is_some_and(|abs| {
                    abs.bottom() < visible.top
                        || abs.top > visible.bottom()
                        || abs.right() < visible.left
                        || abs.left > visible.right()
                })
        };
        if scroll_target {
            events.push(StageEvent::ScrollIntoView { id: id.to_owned() });
        }

        if self.highlighted_id.as_deref() == Some(id) {
            events.extend(self.clear_highlight());
        }
        self.selected_id = Some(id.to_owned());
        events.push(StageEvent::Select { id: id.to_owned() });
        Ok(events)
    }

    /// Highlight an element by id.
    ///
    /// Transient path: a vanished target clears the highlight instead of
    /// failing, and highlighting the selected element is suppressed into a
    /// cleared highlight.
    pub fn highlight(&mut self, id: &str) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        if self.highlighted_id.as_deref() == Some(id) {
            return Vec::new();
        }
        if self.selected_id.as_deref() == Some(id) {
            return self.clear_highlight();
        }
        let resolved = self.bridge.doc().is_some_and(|d| d.contains(id));
        if !resolved {
            warn!(id, "highlight target vanished; clearing");
            return self.clear_highlight();
        }
        if let Some(doc) = self.bridge.doc_mut() {
            doc.remove_class_everywhere(HIGHLIGHT_CLASS);
            doc.add_class(id, HIGHLIGHT_CLASS);
        }
        self.highlighted_id = Some(id.to_owned());
        vec![StageEvent::Highlight { id: Some(id.to_owned()) }]
    }

    /// Clear any highlight.
    pub fn clear_highlight(&mut self) -> Vec<StageEvent> {
        if self.highlighted_id.is_none() {
            return Vec::new();
        }
        if let Some(doc) = self.bridge.doc_mut() {
            doc.remove_class_everywhere(HIGHLIGHT_CLASS);
        }
        self.highlighted_id = None;
        vec![StageEvent::Highlight { id: None }]
    }

    // --- Patch forwarding ---

    /// Forward a committed patch to the runtime, then schedule re-anchoring
    /// of the selection for the next tick (the hosted content may replace
    /// the node while re-rendering).
    ///
    /// # Errors
    ///
    /// Reserved: authoritative-path failures propagate through this result.
    pub fn update(&mut self, patch: UpdatePatch) -> Result<Vec<StageEvent>, StageError> {
        if self.destroyed {
            return Ok(Vec::new());
        }
        let touches_selection = self
            .selected_id
            .as_ref()
            .is_some_and(|sel| patch.data.iter().any(|e| &e.id == sel));
        let forwarded = patch;
        self.bridge.with_runtime(move |rt, doc| rt.update(doc, &forwarded));
        if touches_selection {
            if let Some(sel) = &self.selected_id {
                self.deferred.push(Deferred::Reanchor { id: sel.clone() });
            }
        }
        Ok(Vec::new())
    }

    /// Forward an add patch to the runtime.
    pub fn add(&mut self, patch: UpdatePatch) {
        if self.destroyed {
            return;
        }
        self.bridge.with_runtime(move |rt, doc| rt.add(doc, &patch));
    }

    /// Forward a remove patch to the runtime; removing the selected element
    /// clears the selection.
    pub fn remove(&mut self, patch: UpdatePatch) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        let removes_selection = self
            .selected_id
            .as_ref()
            .is_some_and(|sel| patch.data.iter().any(|e| &e.id == sel));
        let removes_highlight = self
            .highlighted_id
            .as_ref()
            .is_some_and(|hl| patch.data.iter().any(|e| &e.id == hl));
        self.bridge.with_runtime(move |rt, doc| rt.remove(doc, &patch));
        let mut events = Vec::new();
        if removes_selection {
            if let Some(doc) = self.bridge.doc_mut() {
                self.moveable.deselect(doc);
            }
            self.selected_id = None;
        }
        if removes_highlight {
            events.extend(self.clear_highlight());
        }
        events
    }

    /// Update the zoom factor and push it to the runtime as root config.
    pub fn set_zoom(&mut self, zoom: f64) {
        if self.destroyed || !(zoom.is_finite() && zoom > 0.0) {
            return;
        }
        self.viewport.zoom = zoom;
        self.bridge.with_runtime(move |rt, doc| {
            rt.update_root_config(doc, &serde_json::json!({ "zoom": zoom }));
        });
    }

    /// Sub-frame offset of the rendering surface within the editor.
    pub fn set_frame_offset(&mut self, offset: Point) {
        self.viewport.frame_offset = offset;
    }

    /// Tell the runtime which page to render.
    pub fn set_page_id(&mut self, page_id: &str) {
        if self.destroyed {
            return;
        }
        let page_id = page_id.to_owned();
        self.bridge.with_runtime(move |rt, doc| rt.set_page_id(doc, &page_id));
    }

    // --- Guides ---

    /// Replace the guide set on one axis; flows into both the overlay and
    /// the gesture engine's snap candidates.
    pub fn set_guidelines(&mut self, axis: GuideAxis, offsets: Vec<f64>) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        let event = self.mask.set_guides(axis, offsets);
        self.sync_guides_to_moveable();
        vec![event]
    }

    /// Drop all guides on both axes.
    pub fn clear_guides(&mut self) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        let events = self.mask.clear_guides();
        self.moveable.clear_guides();
        events
    }

    /// Create a guide from a ruler drop at an overlay offset.
    pub fn add_guide_from_ruler(&mut self, axis: GuideAxis, mask_offset: f64) -> Vec<StageEvent> {
        if self.destroyed {
            return Vec::new();
        }
        let event = self.mask.add_guide_from_ruler(axis, mask_offset, self.viewport.zoom);
        self.sync_guides_to_moveable();
        vec![event]
    }

    // --- Overlay bookkeeping ---

    /// Host resize observation for the overlay box.
    pub fn set_mask_rect(&mut self, rect: Rect) {
        self.mask.set_layout_rect(rect);
    }

    /// Overlay pan position changed.
    pub fn scroll_to(&mut self, p: Point) {
        self.mask.scroll_to(p);
    }

    /// Root-box-changed callback from the hosted runtime.
    pub fn on_root_resize(&mut self, rect: Rect) {
        self.bridge.on_root_resize(rect);
        self.mask.observe_page_rect(rect);
    }

    // --- Keyboard ---

    /// Forward a key-down event to the shared modifier watcher.
    pub fn on_key_down(&mut self, key: &str) {
        self.watcher.on_key_down(key);
    }

    /// Forward a key-up event; releasing alt clears any stale container
    /// highlight, gesture or not.
    pub fn on_key_up(&mut self, key: &str) {
        if self.watcher.on_key_up(key) && !self.watcher.is_alt_down() {
            if let Some(doc) = self.bridge.doc_mut() {
                self.moveable.clear_container_highlight(doc);
            }
        }
    }

    // --- Gesture forwarding ---

    /// Begin a drag at the given overlay-space pointer event.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate; see [`crate::moveable`].
    pub fn drag_start(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.drag_start(doc, p)
    }

    /// Drag tick.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn drag(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.drag(doc, p, &self.watcher)
    }

    /// End a drag and surface the committed patch.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn drag_end(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.drag_end(doc, p, &self.watcher)
    }

    /// Begin a resize from `anchor`.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn resize_start(
        &mut self,
        anchor: ResizeAnchor,
        input: &PointerInput,
    ) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.resize_start(doc, anchor, p)
    }

    /// Resize tick.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn resize(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.resize(doc, p)
    }

    /// End a resize and surface the committed patch.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn resize_end(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.resize_end(doc, p)
    }

    /// Begin a rotation.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn rotate_start(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        self.moveable.rotate_start(p)
    }

    /// Rotation tick.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn rotate(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.rotate(doc, p)
    }

    /// End a rotation and surface the committed transform.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn rotate_end(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.rotate_end(doc, p)
    }

    /// Begin a scale gesture.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn scale_start(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        self.moveable.scale_start(p)
    }

    /// Scale tick.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn scale(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.scale(doc, p)
    }

    /// End a scale gesture and surface the committed transform.
    ///
    /// # Errors
    ///
    /// Gesture-engine misuse errors propagate.
    pub fn scale_end(&mut self, input: &PointerInput) -> Result<Vec<StageEvent>, StageError> {
        let p = self.doc_point(input.point);
        let Some(doc) = self.bridge.doc_mut() else {
            return Ok(Vec::new());
        };
        self.moveable.scale_end(doc, p)
    }

    // --- Internals ---

    /// Overlay point → content-document point: zoom and frame offset first,
    /// then the overlay's pan position.
    fn doc_point(&self, p: Point) -> Point {
        let d = self.viewport.screen_to_doc(p);
        let s = self.mask.scroll();
        Point::new(d.x + s.x, d.y + s.y)
    }

    /// The document-space box currently visible through the overlay.
    fn visible_doc_rect(&self) -> Rect {
        let scroll = self.mask.scroll();
        let rect = self.mask.rect();
        Rect::new(
            scroll.x,
            scroll.y,
            rect.width / self.viewport.zoom,
            rect.height / self.viewport.zoom,
        )
    }

    fn resolve_moveable_options(&self, id: &str) -> MoveableOptions {
        match &self.config.moveable_options {
            None => MoveableOptions::default(),
            Some(MoveableOptionsSource::Static(options)) => options.clone(),
            Some(MoveableOptionsSource::Computed(compute)) => self
                .bridge
                .doc()
                .map(|doc| compute(doc, id))
                .unwrap_or_default(),
        }
    }

    fn sync_guides_to_moveable(&mut self) {
        let horizontal = self.mask.guides(GuideAxis::Horizontal).to_vec();
        let vertical = self.mask.guides(GuideAxis::Vertical).to_vec();
        self.moveable.set_guidelines(&horizontal, &vertical);
    }

    /// Re-resolve the selected element after a forwarded update and refresh
    /// the proxy if the id still matches.
    fn reanchor(&mut self, id: &str) {
        if self.selected_id.as_deref() != Some(id) {
            return;
        }
        if !self.bridge.doc().is_some_and(|d| d.contains(id)) {
            warn!(id, "selected element vanished during re-render");
            return;
        }
        if let Some(rect) = self.bridge.root_rect() {
            self.mask.observe_page_rect(rect);
        }
        let overrides = self.resolve_moveable_options(id);
        let extra = self
            .bridge
            .with_runtime_now(|rt, doc| rt.guide_line_rects(doc))
            .unwrap_or_default();
        if let Some(doc) = self.bridge.doc_mut() {
            if let Err(err) = self.moveable.update_moveable(doc, &self.mask, extra, overrides) {
                warn!(%err, "re-anchor after update failed");
            }
        }
    }
}

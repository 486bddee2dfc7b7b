//! Overlay/mask surface state.
//!
//! The mask is the transparent layer sitting above the rendering surface: it
//! captures pointer input so clicking a rendered component selects it in the
//! editor rather than activating it, and it hosts the ruler and guide lines.
//! This module tracks the geometry the rest of the engine needs from that
//! layer — its box, its scroll position, whether its layout is pinned while a
//! fixed element is selected, and the guide offsets. The host owns the actual
//! layer element and keeps it congruent with the surface from these values.
//!
//! Units: the mask box is in overlay (editor) pixels; scroll position, page
//! box and guide offsets are in content-document pixels.

#[cfg(test)]
#[path = "mask_test.rs"]
mod mask_test;

use crate::event::{GuideAxis, StageEvent};
use crate::geom::{Point, Rect};

/// One ruler tick: where to draw it on the overlay and the document value it
/// labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerTick {
    /// Offset along the ruler in overlay pixels.
    pub offset: f64,
    /// Document-space value at that tick.
    pub value: f64,
}

/// Geometry and guide state of the overlay layer.
#[derive(Debug, Default)]
pub struct MaskLayer {
    rect: Rect,
    scroll: Point,
    fixed_layout: bool,
    page_rect: Rect,
    horizontal_guides: Vec<f64>,
    vertical_guides: Vec<f64>,
}

impl MaskLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay's box within the editor viewport.
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Update the overlay's box (host resize observation).
    pub fn set_layout_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// Box of the rendered root, reported through the bridge's root-box
    /// callback. Scroll is re-clamped so the pan position stays valid after
    /// the page shrinks.
    pub fn observe_page_rect(&mut self, rect: Rect) {
        self.page_rect = rect;
        self.scroll_to(self.scroll);
    }

    /// Last observed rendered-root box.
    #[must_use]
    pub fn page_rect(&self) -> Rect {
        self.page_rect
    }

    /// Current pan position over the rendered page, in document pixels.
    #[must_use]
    pub fn scroll(&self) -> Point {
        self.scroll
    }

    /// Pan to `p`, clamped into the rendered page's extent.
    pub fn scroll_to(&mut self, p: Point) {
        self.scroll = Point {
            x: p.x.clamp(0.0, self.page_rect.width.max(0.0)),
            y: p.y.clamp(0.0, self.page_rect.height.max(0.0)),
        };
    }

    /// Whether the mask's own height is pinned to the viewport because a
    /// fixed-position element is selected.
    #[must_use]
    pub fn is_fixed_layout(&self) -> bool {
        self.fixed_layout
    }

    /// Enter or leave the pinned layout mode.
    pub fn set_fixed_layout(&mut self, fixed: bool) {
        self.fixed_layout = fixed;
    }

    /// Guide offsets on one axis, ascending.
    #[must_use]
    pub fn guides(&self, axis: GuideAxis) -> &[f64] {
        match axis {
            GuideAxis::Horizontal => &self.horizontal_guides,
            GuideAxis::Vertical => &self.vertical_guides,
        }
    }

    /// Replace the guide set on one axis. Offsets are stored sorted and
    /// deduplicated, and echoed back for the host to persist.
    pub fn set_guides(&mut self, axis: GuideAxis, offsets: Vec<f64>) -> StageEvent {
        let mut offsets = offsets;
        offsets.retain(|v| v.is_finite());
        offsets.sort_by(f64::total_cmp);
        offsets.dedup();
        match axis {
            GuideAxis::Horizontal => self.horizontal_guides = offsets.clone(),
            GuideAxis::Vertical => self.vertical_guides = offsets.clone(),
        }
        StageEvent::ChangeGuides { axis, offsets }
    }

    /// Drop all guides on both axes.
    pub fn clear_guides(&mut self) -> Vec<StageEvent> {
        vec![
            self.set_guides(GuideAxis::Horizontal, Vec::new()),
            self.set_guides(GuideAxis::Vertical, Vec::new()),
        ]
    }

    /// Create a guide from a ruler drop at `mask_offset` overlay pixels,
    /// translated through the current scroll and zoom.
    pub fn add_guide_from_ruler(&mut self, axis: GuideAxis, mask_offset: f64, zoom: f64) -> StageEvent {
        let base = match axis {
            GuideAxis::Horizontal => self.scroll.y,
            GuideAxis::Vertical => self.scroll.x,
        };
        let value = base + mask_offset / zoom;
        let mut offsets = self.guides(axis).to_vec();
        offsets.push(value);
        self.set_guides(axis, offsets)
    }

    /// Tick marks for the ruler along one axis: every multiple of `step`
    /// document pixels currently visible through the overlay.
    #[must_use]
    pub fn ruler_ticks(&self, axis: GuideAxis, step: f64, zoom: f64) -> Vec<RulerTick> {
        if step <= 0.0 || zoom <= 0.0 {
            return Vec::new();
        }
        let (start, extent) = match axis {
            GuideAxis::Horizontal => (self.scroll.y, self.rect.height),
            GuideAxis::Vertical => (self.scroll.x, self.rect.width),
        };
        let end = start + extent / zoom;
        let mut ticks = Vec::new();
        let mut value = (start / step).ceil() * step;
        while value <= end {
            ticks.push(RulerTick { offset: (value - start) * zoom, value });
            value += step;
        }
        ticks
    }
}

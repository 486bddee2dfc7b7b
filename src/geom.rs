//! Geometry primitives and coordinate conversions.
//!
//! Everything here is a pure value type or a pure function: points, rects,
//! the zoom viewport that translates overlay (screen) coordinates into
//! content-document coordinates, and font-size-relative unit conversion for
//! committed style values.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// A point in either overlay (screen) or content-document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle described as a CSS offset box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Right edge (`left + width`).
    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge (`top + height`).
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width * 0.5, self.top + self.height * 0.5)
    }

    /// Whether `p` falls inside the box. Left/top edges are inclusive,
    /// right/bottom exclusive, matching document hit-testing.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// The same box shifted by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self { left: self.left + dx, top: self.top + dy, ..*self }
    }
}

/// Zoom factor and sub-frame offset of the rendering surface within the
/// editor document.
///
/// The overlay forwards pointer coordinates in its own space; the surface may
/// itself sit at `frame_offset` inside the editor and render at `zoom`, so a
/// pointer at overlay `(x, y)` lands at content-document
/// `((x - frame_offset.x) / zoom, (y - frame_offset.y) / zoom)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub frame_offset: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { zoom: 1.0, frame_offset: Point::default() }
    }
}

impl Viewport {
    /// Convert an overlay-space point to content-document coordinates.
    #[must_use]
    pub fn screen_to_doc(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.frame_offset.x) / self.zoom,
            y: (screen.y - self.frame_offset.y) / self.zoom,
        }
    }

    /// Convert a content-document point back to overlay coordinates.
    #[must_use]
    pub fn doc_to_screen(&self, doc: Point) -> Point {
        Point {
            x: doc.x * self.zoom + self.frame_offset.x,
            y: doc.y * self.zoom + self.frame_offset.y,
        }
    }

    /// Convert an overlay-space distance to a content-document distance.
    #[must_use]
    pub fn screen_dist_to_doc(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }
}

/// Format a document-pixel value as a `px` style string.
#[must_use]
pub fn px(value: f64) -> String {
    format!("{}px", round3(value))
}

/// Convert a document-pixel value into a root-font-relative `rem` string.
///
/// `root_font_size` must be the content document's *current* root font size;
/// it is recomputed per commit rather than assumed constant so the conversion
/// stays correct across responsive breakpoints. Non-positive or non-finite
/// font sizes fall back to a `px` string.
#[must_use]
pub fn px_to_rem(value: f64, root_font_size: f64) -> String {
    if root_font_size.is_finite() && root_font_size > 0.0 {
        format!("{}rem", round3(value / root_font_size))
    } else {
        px(value)
    }
}

/// Parse the numeric part of a `px` style string. Returns `None` for other
/// units or malformed values.
#[must_use]
pub fn parse_px(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed);
    match number.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

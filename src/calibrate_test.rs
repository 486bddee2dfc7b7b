#![allow(clippy::float_cmp)]

use super::*;
use crate::consts::DRAG_ID_PREFIX;
use crate::dom::{Element, Position};
use crate::geom::Point;

fn positioned(id: &str, rect: Rect, position: Position) -> Element {
    Element { rect, position, ..Element::new(id) }
}

/// root ── outer(relative, 10,20) ── inner(relative, 5,5) ── target
fn nested_doc(target_position: Position) -> ContentDoc {
    let mut doc = ContentDoc::new();
    doc.insert(ContentDoc::ROOT_ID, positioned("outer", Rect::new(10.0, 20.0, 400.0, 400.0), Position::Relative));
    doc.insert("outer", positioned("inner", Rect::new(5.0, 5.0, 300.0, 300.0), Position::Relative));
    doc.insert("inner", positioned("target", Rect::new(2.0, 3.0, 50.0, 40.0), target_position));
    doc
}

#[test]
fn proxy_id_gets_prefix() {
    let doc = nested_doc(Position::Absolute);
    let mask = MaskLayer::new();
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.id, "stage-drag-target");
}

#[test]
fn absolute_target_accumulates_offset_parents() {
    let doc = nested_doc(Position::Absolute);
    let mask = MaskLayer::new();
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.rect, Rect::new(17.0, 28.0, 50.0, 40.0));
}

#[test]
fn absolute_target_ignores_mask_scroll() {
    let doc = nested_doc(Position::Absolute);
    let mut mask = MaskLayer::new();
    mask.observe_page_rect(Rect::new(0.0, 0.0, 2000.0, 2000.0));
    mask.scroll_to(Point::new(0.0, 40.0));
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.rect.top, 28.0);
}

#[test]
fn sortable_target_uses_document_position() {
    let doc = nested_doc(Position::Static);
    let mask = MaskLayer::new();
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.rect, Rect::new(17.0, 28.0, 50.0, 40.0));
}

/// Fixed element three ancestors deep with mask scroll 40 while the mask is
/// pinned: the proxy top is the plain offset-parent sum, independent of the
/// scroll.
#[test]
fn fixed_target_with_pinned_mask_skips_scroll_correction() {
    let doc = nested_doc(Position::Fixed);
    let mut mask = MaskLayer::new();
    mask.observe_page_rect(Rect::new(0.0, 0.0, 2000.0, 2000.0));
    mask.scroll_to(Point::new(0.0, 40.0));
    mask.set_fixed_layout(true);
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.rect.top, 3.0 + 5.0 + 20.0);
    assert_eq!(cal.rect.left, 2.0 + 5.0 + 10.0);
}

#[test]
fn fixed_target_with_scrollable_mask_adds_scroll() {
    let doc = nested_doc(Position::Fixed);
    let mut mask = MaskLayer::new();
    mask.observe_page_rect(Rect::new(0.0, 0.0, 2000.0, 2000.0));
    mask.scroll_to(Point::new(0.0, 40.0));
    let cal = update(&doc, &mask, "target", DRAG_ID_PREFIX).unwrap();
    assert_eq!(cal.rect.top, 28.0 + 40.0);
}

#[test]
fn unknown_target_is_not_found() {
    let doc = nested_doc(Position::Absolute);
    let mask = MaskLayer::new();
    let result = update(&doc, &mask, "missing", DRAG_ID_PREFIX);
    assert!(matches!(result, Err(StageError::NotFound(id)) if id == "missing"));
}

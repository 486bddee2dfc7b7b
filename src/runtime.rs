//! Runtime Handle capability protocol.
//!
//! ARCHITECTURE
//! ============
//! The hosted runtime — the code that actually renders components into the
//! content document — lives on the far side of an isolation boundary. The
//! editor never reaches into it through shared globals; everything it may do
//! is enumerated here as a capability trait the runtime hands back during
//! the readiness handshake. Every capability is optional: default bodies are
//! no-ops, so a minimal runtime implements nothing.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use crate::dom::{ContentDoc, Element};
use crate::event::{SortOrder, UpdatePatch};
use crate::geom::{Rect, parse_px};

/// Capabilities a hosted runtime may expose to the editor.
///
/// The runtime owns re-rendering from the authoritative schema; the editor
/// forwards committed patches here and re-queries the document afterwards.
pub trait Runtime {
    /// Selection side-effect inside the hosted app (e.g. scroll the element
    /// into view there).
    fn select(&mut self, _doc: &mut ContentDoc, _id: &str) {}

    /// Pre-select gate. Returning false vetoes the selection.
    fn before_select(&mut self, _doc: &mut ContentDoc, _id: &str) -> bool {
        true
    }

    /// Apply an add patch to the hosted document.
    fn add(&mut self, _doc: &mut ContentDoc, _patch: &UpdatePatch) {}

    /// Apply a committed geometry patch to the hosted document.
    fn update(&mut self, _doc: &mut ContentDoc, _patch: &UpdatePatch) {}

    /// Apply a remove patch to the hosted document.
    fn remove(&mut self, _doc: &mut ContentDoc, _patch: &UpdatePatch) {}

    /// Apply a flow reorder.
    fn sort(&mut self, _doc: &mut ContentDoc, _order: &SortOrder) {}

    /// Extra snap-candidate boxes beyond sibling bounding rects.
    fn guide_line_rects(&mut self, _doc: &ContentDoc) -> Vec<Rect> {
        Vec::new()
    }

    /// Push a root-config change (zoom, breakpoint, …) into the runtime.
    fn update_root_config(&mut self, _doc: &mut ContentDoc, _config: &serde_json::Value) {}

    /// Tell the runtime which page of the document model to render.
    fn set_page_id(&mut self, _doc: &mut ContentDoc, _page_id: &str) {}
}

/// A runtime with no capabilities.
#[derive(Debug, Default)]
pub struct NoopRuntime;

impl Runtime for NoopRuntime {}

/// A runtime that applies patches directly to the in-process content tree.
///
/// Used when the host renders the tree itself through the custom render
/// hook, and by tests. Geometry fields present in a patch as `px` values are
/// mirrored into the element's layout box, standing in for the re-layout a
/// real runtime would perform.
#[derive(Debug, Default)]
pub struct LocalRuntime;

impl LocalRuntime {
    fn apply_entry_geometry(doc: &mut ContentDoc, id: &str, patch: &UpdatePatch) {
        let Some(entry) = patch.data.iter().find(|e| e.id == id) else {
            return;
        };
        let Some(el) = doc.get_mut(id) else {
            return;
        };
        if let Some(v) = entry.style.left.as_deref().and_then(parse_px) {
            el.rect.left = v;
        }
        if let Some(v) = entry.style.top.as_deref().and_then(parse_px) {
            el.rect.top = v;
        }
        if let Some(v) = entry.style.width.as_deref().and_then(parse_px) {
            el.rect.width = v;
        }
        if let Some(v) = entry.style.height.as_deref().and_then(parse_px) {
            el.rect.height = v;
        }
    }
}

impl Runtime for LocalRuntime {
    fn add(&mut self, doc: &mut ContentDoc, patch: &UpdatePatch) {
        let parent = patch.parent_id.clone().unwrap_or_else(|| doc.root_id().to_owned());
        for entry in &patch.data {
            doc.insert(&parent, Element::new(entry.id.clone()));
            doc.apply_style(&entry.id, &entry.style);
            Self::apply_entry_geometry(doc, &entry.id, patch);
        }
    }

    fn update(&mut self, doc: &mut ContentDoc, patch: &UpdatePatch) {
        for entry in &patch.data {
            doc.apply_style(&entry.id, &entry.style);
            Self::apply_entry_geometry(doc, &entry.id, patch);
            if let Some(parent) = &patch.parent_id {
                let end = doc.get(parent).map_or(0, |p| p.children.len());
                doc.move_to(&entry.id, parent, end);
            }
        }
    }

    fn remove(&mut self, doc: &mut ContentDoc, patch: &UpdatePatch) {
        for entry in &patch.data {
            doc.remove(&entry.id);
        }
    }

    fn sort(&mut self, doc: &mut ContentDoc, order: &SortOrder) {
        if order.source == order.destination {
            return;
        }
        let Some(parent) = doc.get(&order.destination).and_then(|el| el.parent.clone()) else {
            return;
        };
        let Some(index) = doc.index_in_parent(&order.destination) else {
            return;
        };
        doc.move_to(&order.source, &parent, index);
    }
}

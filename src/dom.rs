//! Content-document model: the element tree the rendering surface hosts.
//!
//! The hosted runtime renders components into this tree and mutates it
//! through the capability protocol; the stage reads it through the queries
//! here — id lookup, ordered hit lists, ancestor and offset-parent walks,
//! and positioning-mode classification. Geometry is stored the way a layout
//! engine reports it: each element carries its offset box *relative to its
//! offset parent*, and absolute positions are resolved by walking the chain.

#[cfg(test)]
#[path = "dom_test.rs"]
mod dom_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_ROOT_FONT_SIZE;
use crate::event::StyleDelta;
use crate::geom::{Point, Rect};

/// Computed CSS position of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Normal flow, not positioned.
    #[default]
    Static,
    /// Flow with offset; establishes an offset parent.
    Relative,
    /// Out of flow, positioned against the offset parent.
    Absolute,
    /// Out of flow, positioned against the viewport.
    Fixed,
}

/// Gesture/commit regime derived from an element's computed position chain.
///
/// Recomputed on every selection — the tree can change between selections,
/// so this is never cached across gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// `position: absolute` — free dragging, committed left/top.
    Absolute,
    /// A fixed element (or a descendant of one) — viewport-anchored math.
    Fixed,
    /// Static/relative flow content — reordered by sorting, never dragged
    /// to arbitrary coordinates.
    Sortable,
}

/// One element in the content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Host-assigned id; the stage's only stable handle to the element.
    pub id: String,
    /// Tag name, informational only.
    pub tag: String,
    /// CSS classes, including stage marker classes.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Computed position.
    #[serde(default)]
    pub position: Position,
    /// Offset box relative to the offset parent, in document pixels.
    #[serde(default)]
    pub rect: Rect,
    /// Stacking order; higher values hit-test above lower values.
    #[serde(default)]
    pub z_index: i64,
    /// True when the element accepts children via drag-reparent.
    #[serde(default)]
    pub container: bool,
    /// Inline style as committed by patches (open-ended bag).
    #[serde(default)]
    pub style: serde_json::Value,
    /// Parent element id; `None` only for the root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Child ids in document order.
    #[serde(default)]
    pub children: Vec<String>,
}

impl Element {
    /// A detached element with the given id, default everything else.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: "div".to_owned(),
            classes: Vec::new(),
            position: Position::Static,
            rect: Rect::default(),
            z_index: 0,
            container: false,
            style: serde_json::Value::Null,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Whether the element carries `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Typed access to the inline-style bag of an [`Element`].
pub struct Style<'a> {
    value: &'a serde_json::Value,
}

impl<'a> Style<'a> {
    /// Wrap a reference to an element's style bag.
    #[must_use]
    pub fn new(value: &'a serde_json::Value) -> Self {
        Self { value }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Inline `left`, if set.
    #[must_use]
    pub fn left(&self) -> Option<&'a str> {
        self.get("left")
    }

    /// Inline `top`, if set.
    #[must_use]
    pub fn top(&self) -> Option<&'a str> {
        self.get("top")
    }

    /// Inline `width`, if set.
    #[must_use]
    pub fn width(&self) -> Option<&'a str> {
        self.get("width")
    }

    /// Inline `height`, if set.
    #[must_use]
    pub fn height(&self) -> Option<&'a str> {
        self.get("height")
    }

    /// Inline `transform`, if set.
    #[must_use]
    pub fn transform(&self) -> Option<&'a str> {
        self.get("transform")
    }

    /// Inline `position`, if set.
    #[must_use]
    pub fn position(&self) -> Option<&'a str> {
        self.get("position")
    }
}

/// The in-memory content document.
pub struct ContentDoc {
    nodes: HashMap<String, Element>,
    root: String,
    root_font_size: f64,
    scroll: Point,
}

impl ContentDoc {
    /// Id of the document root created by [`ContentDoc::new`].
    pub const ROOT_ID: &'static str = "root";

    /// An empty document holding only the root container.
    #[must_use]
    pub fn new() -> Self {
        let mut root = Element::new(Self::ROOT_ID);
        root.tag = "body".to_owned();
        root.container = true;
        let mut nodes = HashMap::new();
        nodes.insert(root.id.clone(), root);
        Self {
            nodes,
            root: Self::ROOT_ID.to_owned(),
            root_font_size: DEFAULT_ROOT_FONT_SIZE,
            scroll: Point::default(),
        }
    }

    /// Id of the document root.
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.root
    }

    /// Look up an element by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.nodes.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.nodes.get_mut(id)
    }

    /// Whether an element with `id` is attached to the document.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of attached elements, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Attach `el` under `parent_id`, appending to its children. An element
    /// with the same id is replaced in place (subtree removed first).
    /// Returns false when the parent does not exist or the id is empty.
    pub fn insert(&mut self, parent_id: &str, el: Element) -> bool {
        if el.id.is_empty() || el.id == self.root {
            return false;
        }
        if !self.nodes.contains_key(parent_id) {
            return false;
        }
        if self.nodes.contains_key(&el.id) {
            self.remove(&el.id.clone());
        }
        let id = el.id.clone();
        let mut el = el;
        el.parent = Some(parent_id.to_owned());
        el.children.clear();
        self.nodes.insert(id.clone(), el);
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id);
        }
        true
    }

    /// Detach the element and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: &str) -> Option<Element> {
        if id == self.root {
            return None;
        }
        let el = self.nodes.get(id)?;
        let parent = el.parent.clone();
        let mut doomed = vec![id.to_owned()];
        let mut i = 0;
        while i < doomed.len() {
            if let Some(node) = self.nodes.get(&doomed[i]) {
                doomed.extend(node.children.iter().cloned());
            }
            i += 1;
        }
        let removed = self.nodes.remove(id);
        for child in doomed.iter().skip(1) {
            self.nodes.remove(child);
        }
        if let Some(parent_id) = parent {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| c != id);
            }
        }
        removed
    }

    /// Ancestor ids from the immediate parent up to the root.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self.nodes.get(id).and_then(|el| el.parent.clone());
        while let Some(pid) = cur {
            cur = self.nodes.get(&pid).and_then(|el| el.parent.clone());
            out.push(pid);
        }
        out
    }

    /// Whether `ancestor_id` appears in the parent chain of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor_id: &str, id: &str) -> bool {
        self.ancestors(id).iter().any(|a| a == ancestor_id)
    }

    /// The nearest positioned ancestor (`position != static`), falling back
    /// to the root. `None` for the root itself or an unknown id.
    #[must_use]
    pub fn offset_parent(&self, id: &str) -> Option<&str> {
        if id == self.root || !self.nodes.contains_key(id) {
            return None;
        }
        for pid in self.ancestors(id) {
            if pid == self.root {
                return Some(self.root.as_str());
            }
            if self.nodes.get(&pid).is_some_and(|el| el.position != Position::Static) {
                return self.nodes.get(&pid).map(|el| el.id.as_str());
            }
        }
        Some(self.root.as_str())
    }

    /// Resolve an element's box to document coordinates by accumulating the
    /// offset-parent chain.
    #[must_use]
    pub fn absolute_rect(&self, id: &str) -> Option<Rect> {
        let el = self.nodes.get(id)?;
        let mut rect = el.rect;
        let mut cur = self.offset_parent(id);
        while let Some(pid) = cur {
            if let Some(p) = self.nodes.get(pid) {
                rect.left += p.rect.left;
                rect.top += p.rect.top;
            }
            cur = self.offset_parent(pid);
        }
        Some(rect)
    }

    /// Ordered hit list at a document-space point, topmost element first.
    ///
    /// Order follows paint order: higher z-index above lower, later document
    /// order above earlier. The root participates like any other element and
    /// typically ends the list.
    #[must_use]
    pub fn elements_from_point(&self, p: Point) -> Vec<String> {
        let mut hits: Vec<(String, i64, usize)> = Vec::new();
        let mut order = 0_usize;
        let mut stack = vec![self.root.clone()];
        let mut ordered: Vec<(String, usize)> = Vec::new();
        while let Some(id) = stack.pop() {
            ordered.push((id.clone(), order));
            order += 1;
            if let Some(el) = self.nodes.get(&id) {
                for child in el.children.iter().rev() {
                    stack.push(child.clone());
                }
            }
        }
        for (id, dfs_order) in ordered {
            let Some(el) = self.nodes.get(&id) else {
                continue;
            };
            let Some(abs) = self.absolute_rect(&id) else {
                continue;
            };
            if abs.contains(p) {
                hits.push((id, el.z_index, dfs_order));
            }
        }
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));
        hits.into_iter().map(|(id, _, _)| id).collect()
    }

    /// Classify an element's positioning regime. Fixed wins over absolute
    /// when any element in the chain (self included) is `position: fixed`.
    #[must_use]
    pub fn target_mode(&self, id: &str) -> Option<TargetMode> {
        let el = self.nodes.get(id)?;
        if el.position == Position::Fixed {
            return Some(TargetMode::Fixed);
        }
        for pid in self.ancestors(id) {
            if self.nodes.get(&pid).is_some_and(|a| a.position == Position::Fixed) {
                return Some(TargetMode::Fixed);
            }
        }
        if el.position == Position::Absolute {
            return Some(TargetMode::Absolute);
        }
        Some(TargetMode::Sortable)
    }

    /// Index of the element among its parent's children.
    #[must_use]
    pub fn index_in_parent(&self, id: &str) -> Option<usize> {
        let parent = self.nodes.get(id)?.parent.as_ref()?;
        self.nodes.get(parent)?.children.iter().position(|c| c == id)
    }

    /// The previous sibling in document order, if any.
    #[must_use]
    pub fn prev_sibling(&self, id: &str) -> Option<&str> {
        let parent = self.nodes.get(id)?.parent.as_ref()?;
        let children = &self.nodes.get(parent)?.children;
        let idx = children.iter().position(|c| c == id)?;
        if idx == 0 {
            None
        } else {
            children.get(idx - 1).map(String::as_str)
        }
    }

    /// The next sibling in document order, if any.
    #[must_use]
    pub fn next_sibling(&self, id: &str) -> Option<&str> {
        let parent = self.nodes.get(id)?.parent.as_ref()?;
        let children = &self.nodes.get(parent)?.children;
        let idx = children.iter().position(|c| c == id)?;
        children.get(idx + 1).map(String::as_str)
    }

    /// Sibling ids sharing the element's parent, the element itself excluded.
    #[must_use]
    pub fn siblings(&self, id: &str) -> Vec<String> {
        let Some(parent) = self.nodes.get(id).and_then(|el| el.parent.as_ref()) else {
            return Vec::new();
        };
        let Some(parent) = self.nodes.get(parent) else {
            return Vec::new();
        };
        parent.children.iter().filter(|c| c.as_str() != id).cloned().collect()
    }

    /// Move an element under `new_parent_id` at `index` (clamped). Refuses
    /// the root, unknown ids, and moves into the element's own subtree.
    pub fn move_to(&mut self, id: &str, new_parent_id: &str, index: usize) -> bool {
        if id == self.root || id == new_parent_id {
            return false;
        }
        if !self.nodes.contains_key(id) || !self.nodes.contains_key(new_parent_id) {
            return false;
        }
        if self.is_ancestor(id, new_parent_id) {
            return false;
        }
        let old_parent = self.nodes.get(id).and_then(|el| el.parent.clone());
        if let Some(old) = old_parent.and_then(|pid| self.nodes.get_mut(&pid)) {
            old.children.retain(|c| c != id);
        }
        if let Some(new_parent) = self.nodes.get_mut(new_parent_id) {
            let at = index.min(new_parent.children.len());
            new_parent.children.insert(at, id.to_owned());
        }
        if let Some(el) = self.nodes.get_mut(id) {
            el.parent = Some(new_parent_id.to_owned());
        }
        true
    }

    /// Add a marker class. Idempotent.
    pub fn add_class(&mut self, id: &str, class: &str) {
        if let Some(el) = self.nodes.get_mut(id) {
            if !el.has_class(class) {
                el.classes.push(class.to_owned());
            }
        }
    }

    /// Remove a marker class from one element.
    pub fn remove_class(&mut self, id: &str, class: &str) {
        if let Some(el) = self.nodes.get_mut(id) {
            el.classes.retain(|c| c != class);
        }
    }

    /// Strip a marker class everywhere in the document.
    pub fn remove_class_everywhere(&mut self, class: &str) {
        for el in self.nodes.values_mut() {
            el.classes.retain(|c| c != class);
        }
    }

    /// Ids currently carrying `class`, in no particular order.
    #[must_use]
    pub fn ids_with_class(&self, class: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|el| el.has_class(class))
            .map(|el| el.id.clone())
            .collect()
    }

    /// Merge a sparse style delta into an element's inline-style bag.
    /// Returns false when the element does not exist.
    pub fn apply_style(&mut self, id: &str, delta: &StyleDelta) -> bool {
        let Some(el) = self.nodes.get_mut(id) else {
            return false;
        };
        if !el.style.is_object() {
            el.style = serde_json::json!({});
        }
        if let Some(bag) = el.style.as_object_mut() {
            let fields = [
                ("position", &delta.position),
                ("left", &delta.left),
                ("top", &delta.top),
                ("width", &delta.width),
                ("height", &delta.height),
                ("transform", &delta.transform),
            ];
            for (key, value) in fields {
                if let Some(v) = value {
                    bag.insert(key.to_owned(), serde_json::Value::String(v.clone()));
                }
            }
        }
        true
    }

    /// Current computed root font size in pixels.
    #[must_use]
    pub fn root_font_size(&self) -> f64 {
        self.root_font_size
    }

    /// Update the root font size; non-positive values are ignored.
    pub fn set_root_font_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.root_font_size = size;
        }
    }

    /// Scroll offset of the rendered root.
    #[must_use]
    pub fn scroll(&self) -> Point {
        self.scroll
    }

    /// Update the rendered root's scroll offset.
    pub fn set_scroll(&mut self, scroll: Point) {
        self.scroll = scroll;
    }
}

impl Default for ContentDoc {
    fn default() -> Self {
        Self::new()
    }
}

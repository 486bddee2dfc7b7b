#![allow(clippy::float_cmp)]

use super::*;
use crate::dom::Position;
use crate::event::StyleDelta;
use crate::runtime::NoopRuntime;

fn abs_el(id: &str, rect: Rect) -> Element {
    Element { rect, position: Position::Absolute, ..Element::new(id) }
}

/// A stage in custom-render mode: the render hook builds a small document
/// and the local runtime completes the handshake at mount.
fn mounted_stage() -> (StageCore, Vec<StageEvent>) {
    let config = StageConfig {
        render: Some(Box::new(|doc: &mut ContentDoc| {
            doc.get_mut(ContentDoc::ROOT_ID).unwrap().rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);
            doc.insert(ContentDoc::ROOT_ID, abs_el("panel", Rect::new(50.0, 50.0, 400.0, 300.0)));
            doc.insert(ContentDoc::ROOT_ID, abs_el("btn", Rect::new(100.0, 100.0, 80.0, 40.0)));
        })),
        ..Default::default()
    };
    let mut stage = StageCore::new(config);
    let events = stage.mount().unwrap();
    (stage, events)
}

fn move_at(x: f64, y: f64) -> PointerInput {
    PointerInput::new(Point::new(x, y), PointerKind::Move)
}

fn down_at(x: f64, y: f64) -> PointerInput {
    PointerInput::new(Point::new(x, y), PointerKind::Down)
}

// --- Mount lifecycle ---

#[test]
fn mount_emits_mounted_then_ready() {
    let (_stage, events) = mounted_stage();
    assert_eq!(events, vec![StageEvent::Mounted, StageEvent::RuntimeReady]);
}

#[test]
fn mount_twice_fails() {
    let (mut stage, _) = mounted_stage();
    assert!(matches!(stage.mount(), Err(StageError::Mount(_))));
}

#[test]
fn mount_after_destroy_fails() {
    let mut stage = StageCore::new(StageConfig::default());
    stage.destroy();
    assert!(matches!(stage.mount(), Err(StageError::Mount(_))));
}

// --- Select ---

/// Mount, wait for readiness, select "btn": a select event fires and the
/// overlay carries a proxy whose id derives from the target plus the drag
/// prefix.
#[test]
fn select_by_id_emits_event_and_proxy() {
    let (mut stage, _) = mounted_stage();
    let events = stage.select("btn", None).unwrap();
    assert!(events.contains(&StageEvent::Select { id: "btn".to_owned() }));
    assert_eq!(stage.selected_id(), Some("btn"));
    let proxy = stage.moveable().proxy().unwrap();
    assert_eq!(proxy.id, "stage-drag-btn");
    assert_eq!(proxy.rect, Rect::new(100.0, 100.0, 80.0, 40.0));
}

#[test]
fn select_unknown_id_propagates_not_found() {
    let (mut stage, _) = mounted_stage();
    assert!(matches!(stage.select("missing", None), Err(StageError::NotFound(_))));
}

#[test]
fn reselecting_same_id_is_a_noop() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    let events = stage.select("btn", None).unwrap();
    assert!(events.is_empty());
}

#[test]
fn select_applies_marker_classes_up_the_chain() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    let doc = stage.doc().unwrap();
    assert!(doc.get("btn").unwrap().has_class("stage-selected"));
    assert!(doc.get(ContentDoc::ROOT_ID).unwrap().has_class("stage-selected-parent"));
}

#[test]
fn selecting_another_element_moves_the_markers() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    stage.select("panel", None).unwrap();
    let doc = stage.doc().unwrap();
    assert!(!doc.get("btn").unwrap().has_class("stage-selected"));
    assert!(doc.get("panel").unwrap().has_class("stage-selected"));
}

#[test]
fn select_before_ready_is_deferred_until_handshake() {
    let mut stage = StageCore::new(StageConfig {
        runtime_url: Some("https://runtime.example.com/app".to_owned()),
        editor_origin: "https://editor.example.com".to_owned(),
        ..Default::default()
    });
    stage.mount().unwrap();
    // no handshake yet: the select parks
    let events = stage.select("btn", None).unwrap();
    assert!(events.is_empty());
    assert_eq!(stage.selected_id(), None);

    // hand over a runtime whose document contains btn, then drain
    struct Seeding;
    impl Runtime for Seeding {}
    // seed the content tree the way a navigated runtime would have
    if let Some(doc) = stage.bridge.doc() {
        assert!(!doc.contains("btn"));
    }
    stage
        .bridge
        .doc_mut()
        .unwrap()
        .insert(ContentDoc::ROOT_ID, abs_el("btn", Rect::new(0.0, 0.0, 10.0, 10.0)));
    let events = stage.runtime_ready(Box::new(Seeding));
    assert!(events.contains(&StageEvent::RuntimeReady));
    assert!(events.contains(&StageEvent::Select { id: "btn".to_owned() }));
    assert_eq!(stage.selected_id(), Some("btn"));
}

#[test]
fn runtime_gate_can_veto_selection() {
    struct Locked;
    impl Runtime for Locked {
        fn before_select(&mut self, _doc: &mut ContentDoc, id: &str) -> bool {
            id != "btn"
        }
    }
    let mut stage = StageCore::new(StageConfig {
        runtime_url: Some("/runtime".to_owned()),
        ..Default::default()
    });
    stage.mount().unwrap();
    stage
        .bridge
        .doc_mut()
        .unwrap()
        .insert(ContentDoc::ROOT_ID, abs_el("btn", Rect::new(0.0, 0.0, 10.0, 10.0)));
    stage.runtime_ready(Box::new(Locked));
    let events = stage.select("btn", None).unwrap();
    assert!(events.is_empty());
    assert_eq!(stage.selected_id(), None);
}

// --- Hit-testing ---

#[test]
fn pointer_down_selects_topmost_hit() {
    let (mut stage, _) = mounted_stage();
    let events = stage.set_element_from_point(&down_at(120.0, 120.0));
    assert!(events.contains(&StageEvent::Select { id: "btn".to_owned() }));
}

#[test]
fn pointer_move_highlights_instead_of_selecting() {
    let (mut stage, _) = mounted_stage();
    let events = stage.set_element_from_point(&move_at(120.0, 120.0));
    assert_eq!(events, vec![StageEvent::Highlight { id: Some("btn".to_owned()) }]);
    assert_eq!(stage.selected_id(), None);
}

/// Hit-testing at z=1 with (x, y) must resolve like z=2 with (2x, 2y).
#[test]
fn hit_testing_divides_by_zoom() {
    let (mut stage, _) = mounted_stage();
    let at_unit_zoom = stage.set_element_from_point(&down_at(120.0, 120.0));
    stage.select("panel", None).unwrap(); // move selection away
    stage.set_zoom(2.0);
    let at_double_zoom = stage.set_element_from_point(&down_at(240.0, 240.0));
    assert_eq!(at_unit_zoom.last(), at_double_zoom.last());
    assert_eq!(stage.selected_id(), Some("btn"));
}

/// canSelect returning false for the topmost hit walks on to the element
/// beneath it.
#[test]
fn can_select_walks_past_rejected_candidates() {
    let config = StageConfig {
        render: Some(Box::new(|doc: &mut ContentDoc| {
            doc.get_mut(ContentDoc::ROOT_ID).unwrap().rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);
            doc.insert(ContentDoc::ROOT_ID, abs_el("panel", Rect::new(0.0, 0.0, 400.0, 400.0)));
            doc.insert(ContentDoc::ROOT_ID, abs_el("locked", Rect::new(0.0, 0.0, 400.0, 400.0)));
        })),
        can_select: Some(Box::new(|el, _input, _stop| el.id != "locked")),
        ..Default::default()
    };
    let mut stage = StageCore::new(config);
    stage.mount().unwrap();
    let events = stage.set_element_from_point(&down_at(100.0, 100.0));
    assert!(events.contains(&StageEvent::Select { id: "panel".to_owned() }));
}

#[test]
fn can_select_stop_halts_the_walk() {
    let config = StageConfig {
        render: Some(Box::new(|doc: &mut ContentDoc| {
            doc.get_mut(ContentDoc::ROOT_ID).unwrap().rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);
            doc.insert(ContentDoc::ROOT_ID, abs_el("panel", Rect::new(0.0, 0.0, 400.0, 400.0)));
            doc.insert(ContentDoc::ROOT_ID, abs_el("locked", Rect::new(0.0, 0.0, 400.0, 400.0)));
        })),
        can_select: Some(Box::new(|el, _input, stop| {
            if el.id == "locked" {
                stop();
            }
            el.id != "locked"
        })),
        ..Default::default()
    };
    let mut stage = StageCore::new(config);
    stage.mount().unwrap();
    let events = stage.set_element_from_point(&down_at(100.0, 100.0));
    assert!(events.is_empty());
    assert_eq!(stage.selected_id(), None);
}

#[test]
fn ghost_artifacts_are_skipped_by_hit_walk() {
    let (mut stage, _) = mounted_stage();
    stage
        .bridge
        .doc_mut()
        .unwrap()
        .insert(ContentDoc::ROOT_ID, Element {
            rect: Rect::new(0.0, 0.0, 1000.0, 1000.0),
            position: Position::Absolute,
            z_index: 1000,
            ..Element::new("stage-ghost-btn")
        });
    let events = stage.set_element_from_point(&down_at(120.0, 120.0));
    assert!(events.contains(&StageEvent::Select { id: "btn".to_owned() }));
}

#[test]
fn hit_testing_unmounted_stage_degrades_silently() {
    let mut stage = StageCore::new(StageConfig::default());
    assert!(stage.set_element_from_point(&down_at(10.0, 10.0)).is_empty());
}

// --- Highlight ---

#[test]
fn highlight_clears_when_target_vanishes() {
    let (mut stage, _) = mounted_stage();
    stage.highlight("btn");
    let events = stage.highlight("gone");
    assert_eq!(events, vec![StageEvent::Highlight { id: None }]);
    assert_eq!(stage.highlighted_id(), None);
}

/// Highlighting the selected element must never produce simultaneous
/// highlight+select state.
#[test]
fn highlight_on_selected_element_is_suppressed() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    stage.highlight("panel");
    let events = stage.highlight("btn");
    assert_eq!(events, vec![StageEvent::Highlight { id: None }]);
    assert_eq!(stage.highlighted_id(), None);
}

#[test]
fn selecting_the_highlighted_element_clears_highlight() {
    let (mut stage, _) = mounted_stage();
    stage.highlight("btn");
    let events = stage.select("btn", None).unwrap();
    assert!(events.contains(&StageEvent::Highlight { id: None }));
    assert_eq!(stage.highlighted_id(), None);
}

#[test]
fn rehighlighting_same_element_is_a_noop() {
    let (mut stage, _) = mounted_stage();
    stage.highlight("btn");
    assert!(stage.highlight("btn").is_empty());
}

#[test]
fn pointer_move_over_nothing_clears_highlight() {
    let (mut stage, _) = mounted_stage();
    stage.set_element_from_point(&move_at(120.0, 120.0));
    let events = stage.set_element_from_point(&move_at(999.0, 2.0));
    assert_eq!(events, vec![StageEvent::Highlight { id: None }]);
}

// --- Update / re-anchor ---

/// A no-op update must leave the selected id unchanged.
#[test]
fn noop_update_preserves_selection() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    let patch = UpdatePatch::single("btn", StyleDelta::default());
    stage.update(patch).unwrap();
    stage.tick();
    assert_eq!(stage.selected_id(), Some("btn"));
}

#[test]
fn update_reanchors_proxy_on_next_tick() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    let patch = UpdatePatch::single("btn", StyleDelta {
        left: Some("300px".to_owned()),
        ..Default::default()
    });
    stage.update(patch).unwrap();
    // the local runtime applied the patch immediately; the proxy refreshes
    // on the deferred tick
    assert_eq!(stage.moveable().proxy().unwrap().rect.left, 100.0);
    stage.tick();
    assert_eq!(stage.moveable().proxy().unwrap().rect.left, 300.0);
}

#[test]
fn update_for_unselected_element_schedules_nothing() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    let patch = UpdatePatch::single("panel", StyleDelta {
        left: Some("10px".to_owned()),
        ..Default::default()
    });
    stage.update(patch).unwrap();
    stage.tick();
    assert_eq!(stage.moveable().proxy().unwrap().rect.left, 100.0);
}

// --- Add / remove ---

#[test]
fn add_patch_reaches_the_document() {
    let (mut stage, _) = mounted_stage();
    let patch = UpdatePatch::single("fresh", StyleDelta {
        left: Some("5px".to_owned()),
        top: Some("6px".to_owned()),
        ..Default::default()
    });
    stage.add(patch);
    assert!(stage.doc().unwrap().contains("fresh"));
}

#[test]
fn removing_selected_element_clears_selection() {
    let (mut stage, _) = mounted_stage();
    stage.select("btn", None).unwrap();
    stage.remove(UpdatePatch::single("btn", StyleDelta::default()));
    assert_eq!(stage.selected_id(), None);
    assert!(stage.moveable().proxy().is_none());
    assert!(!stage.doc().unwrap().contains("btn"));
}

// --- Guides ---

#[test]
fn guide_round_trip_through_events() {
    let (mut stage, _) = mounted_stage();
    let events = stage.set_guidelines(GuideAxis::Horizontal, vec![120.0, 40.0]);
    assert_eq!(
        events,
        vec![StageEvent::ChangeGuides { axis: GuideAxis::Horizontal, offsets: vec![40.0, 120.0] }]
    );
    assert_eq!(stage.mask().guides(GuideAxis::Horizontal), &[40.0, 120.0]);
    let events = stage.clear_guides();
    assert_eq!(events.len(), 2);
    assert!(stage.mask().guides(GuideAxis::Horizontal).is_empty());
}

// --- Zoom ---

#[test]
fn set_zoom_guards_invalid_factors() {
    let (mut stage, _) = mounted_stage();
    stage.set_zoom(0.0);
    assert_eq!(stage.zoom(), 1.0);
    stage.set_zoom(2.5);
    assert_eq!(stage.zoom(), 2.5);
}

// --- Destroy ---

#[test]
fn destroy_makes_pending_work_a_noop() {
    let mut stage = StageCore::new(StageConfig {
        runtime_url: Some("https://runtime.example.com/app".to_owned()),
        editor_origin: "https://editor.example.com".to_owned(),
        ..Default::default()
    });
    stage.mount().unwrap();
    stage.select("btn", None).unwrap(); // parks as deferred
    stage.destroy();
    assert!(stage.runtime_ready(Box::new(NoopRuntime)).is_empty());
    assert!(stage.tick().is_empty());
    assert!(stage.set_element_from_point(&down_at(1.0, 1.0)).is_empty());
    assert!(stage.select("btn", None).unwrap().is_empty());
}

#[test]
fn destroy_is_idempotent() {
    let (mut stage, _) = mounted_stage();
    stage.destroy();
    stage.destroy();
}

// --- Gesture integration through the orchestrator ---

#[test]
fn drag_through_orchestrator_is_zoom_independent() {
    let (mut stage, _) = mounted_stage();
    stage.set_zoom(2.0);
    stage.select("btn", None).unwrap();
    stage.drag_start(&down_at(240.0, 240.0)).unwrap();
    // 60 overlay pixels at zoom 2 = 30 document pixels
    let events = stage.drag_end(&down_at(300.0, 300.0)).unwrap();
    let patch = events
        .iter()
        .find_map(|e| match e {
            StageEvent::Update(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(patch.data[0].style.left.as_deref(), Some("130px"));
    assert_eq!(patch.data[0].style.top.as_deref(), Some("130px"));
}

#[test]
fn gesture_before_selection_fails_fast() {
    let (mut stage, _) = mounted_stage();
    assert!(matches!(stage.drag_start(&down_at(0.0, 0.0)), Err(StageError::NotInitialized)));
}

// --- Fixed-mode integration ---

#[test]
fn selecting_fixed_element_pins_mask_layout() {
    let config = StageConfig {
        render: Some(Box::new(|doc: &mut ContentDoc| {
            doc.get_mut(ContentDoc::ROOT_ID).unwrap().rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);
            doc.insert(ContentDoc::ROOT_ID, Element {
                rect: Rect::new(0.0, 0.0, 1000.0, 60.0),
                position: Position::Fixed,
                ..Element::new("topbar")
            });
        })),
        ..Default::default()
    };
    let mut stage = StageCore::new(config);
    stage.mount().unwrap();
    stage.select("topbar", None).unwrap();
    assert!(stage.mask().is_fixed_layout());
    stage.select("topbar", None).unwrap();
    assert_eq!(stage.moveable().mode(), Some(crate::dom::TargetMode::Fixed));
}

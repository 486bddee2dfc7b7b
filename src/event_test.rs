use super::*;

// --- StyleDelta ---

#[test]
fn style_delta_default_is_empty() {
    assert!(StyleDelta::default().is_empty());
}

#[test]
fn style_delta_with_field_is_not_empty() {
    let d = StyleDelta { left: Some("10px".to_owned()), ..Default::default() };
    assert!(!d.is_empty());
}

#[test]
fn style_delta_serializes_sparsely() {
    let d = StyleDelta { left: Some("10px".to_owned()), top: Some("20px".to_owned()), ..Default::default() };
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json, serde_json::json!({"left": "10px", "top": "20px"}));
}

#[test]
fn style_delta_round_trips() {
    let d = StyleDelta {
        position: Some("absolute".to_owned()),
        width: Some("3rem".to_owned()),
        transform: Some("rotate(45deg)".to_owned()),
        ..Default::default()
    };
    let json = serde_json::to_string(&d).unwrap();
    let back: StyleDelta = serde_json::from_str(&json).unwrap();
    assert_eq!(d, back);
}

// --- UpdatePatch ---

#[test]
fn update_patch_single_has_one_entry() {
    let p = UpdatePatch::single("btn", StyleDelta::default());
    assert_eq!(p.data.len(), 1);
    assert_eq!(p.data[0].id, "btn");
    assert!(p.parent_id.is_none());
}

#[test]
fn update_patch_omits_absent_parent() {
    let p = UpdatePatch::single("btn", StyleDelta::default());
    let json = serde_json::to_value(&p).unwrap();
    assert!(json.get("parent_id").is_none());
}

#[test]
fn update_patch_keeps_parent_when_set() {
    let mut p = UpdatePatch::single("btn", StyleDelta::default());
    p.parent_id = Some("panel".to_owned());
    let json = serde_json::to_value(&p).unwrap();
    assert_eq!(json["parent_id"], "panel");
}

// --- GuideAxis ---

#[test]
fn guide_axis_serializes_lowercase() {
    assert_eq!(serde_json::to_value(GuideAxis::Horizontal).unwrap(), "horizontal");
    assert_eq!(serde_json::to_value(GuideAxis::Vertical).unwrap(), "vertical");
}

// --- SortOrder ---

#[test]
fn sort_order_noop_uses_same_id() {
    let s = SortOrder { source: "a".to_owned(), destination: "a".to_owned() };
    assert_eq!(s.source, s.destination);
}

// --- StageEvent ---

#[test]
fn highlight_none_models_clear() {
    let e = StageEvent::Highlight { id: None };
    assert_eq!(e, StageEvent::Highlight { id: None });
    assert_ne!(e, StageEvent::Highlight { id: Some("x".to_owned()) });
}

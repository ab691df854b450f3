#![allow(clippy::float_cmp)]

use uuid::Uuid;

use super::*;
use crate::geometry;
use crate::input::Corner;

// =============================================================
// Helpers
// =============================================================

fn no_modifiers() -> Modifiers {
    Modifiers::default()
}

fn shift_modifier() -> Modifiers {
    Modifiers { shift: true, ..Modifiers::default() }
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn key(name: &str) -> Key {
    Key(name.to_owned())
}

fn add_rect(core: &mut EngineCore, x: f64, y: f64, w: f64, h: f64) -> ElementId {
    let el = Element::sized(ElementKind::Rectangle, pt(x, y), w, h);
    let id = el.id;
    assert!(!core.add_element(el).is_empty());
    id
}

fn add_circle(core: &mut EngineCore, x: f64, y: f64, size: f64) -> ElementId {
    let el = Element::sized(ElementKind::Circle, pt(x, y), size, size);
    let id = el.id;
    assert!(!core.add_element(el).is_empty());
    id
}

fn click(core: &mut EngineCore, p: Point) -> Vec<Action> {
    let actions = core.on_pointer_down(p, Button::Primary, no_modifiers());
    core.on_pointer_up(p, Button::Primary, no_modifiers());
    actions
}

fn drag(core: &mut EngineCore, from: Point, to: Point) {
    core.on_pointer_down(from, Button::Primary, no_modifiers());
    core.on_pointer_move(to, no_modifiers());
    core.on_pointer_up(to, Button::Primary, no_modifiers());
}

fn has_render_needed(actions: &[Action]) -> bool {
    actions.iter().any(|a| matches!(a, Action::RenderNeeded))
}

fn created(actions: &[Action]) -> Option<&Element> {
    actions.iter().find_map(|a| match a {
        Action::ElementCreated(el) => Some(el),
        _ => None,
    })
}

fn connections(core: &EngineCore) -> Vec<&Element> {
    core.doc
        .sorted_elements()
        .into_iter()
        .filter(|el| el.kind == ElementKind::Connection)
        .collect()
}

// =============================================================
// Construction / config
// =============================================================

#[test]
fn core_new_is_empty_and_idle() {
    let core = EngineCore::new();
    assert!(core.doc.is_empty());
    assert_eq!(core.mode, ConnectMode::Idle);
    assert_eq!(core.input, InputState::Idle);
    assert_eq!(core.config, EngineConfig::default());
}

#[test]
fn config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.connect_key, "c");
    assert_eq!(config.default_shape_size, 100.0);
    assert_eq!(config.default_text, "Double click to edit");
}

#[test]
fn env_parse_falls_back_on_missing_key() {
    assert_eq!(env_parse("DIAGRAM_TEST_UNSET_KEY_9F2C", 7.5), 7.5);
}

// =============================================================
// Drops and placement
// =============================================================

#[test]
fn drop_rectangle_centers_on_point() {
    let mut core = EngineCore::new();
    let actions = core.on_drop("rectangle", pt(150.0, 150.0));
    let el = created(&actions).unwrap();
    assert_eq!(el.kind, ElementKind::Rectangle);
    assert_eq!(el.position, pt(100.0, 100.0));
    assert_eq!((el.width, el.height), (Some(100.0), Some(100.0)));
    assert!(has_render_needed(&actions));
}

#[test]
fn drop_text_anchors_at_point() {
    let mut core = EngineCore::new();
    let actions = core.on_drop("text", pt(40.0, 60.0));
    let el = created(&actions).unwrap();
    assert_eq!(el.position, pt(40.0, 60.0));
    assert_eq!(el.width, None);
    assert_eq!(el.text.as_deref(), Some("Double click to edit"));
}

#[test]
fn drop_uses_configured_size() {
    let config = EngineConfig { default_shape_size: 40.0, ..EngineConfig::default() };
    let mut core = EngineCore::with_config(config);
    let actions = core.on_drop("circle", pt(100.0, 100.0));
    let el = created(&actions).unwrap();
    assert_eq!(el.position, pt(80.0, 80.0));
    assert_eq!(el.width, Some(40.0));
}

#[test]
fn drop_unknown_kind_is_ignored() {
    let mut core = EngineCore::new();
    assert!(core.on_drop("hexagon", pt(0.0, 0.0)).is_empty());
    assert!(core.on_drop("group", pt(0.0, 0.0)).is_empty());
    assert!(core.doc.is_empty());
}

#[test]
fn place_shape_defaults_to_drop_point() {
    let mut core = EngineCore::new();
    let style = ElementStyle { border_radius: Some("50%".into()), ..ElementStyle::default() };
    let actions = core.place_shape(ShapeSpec {
        kind: ElementKind::Circle,
        width: 80.0,
        height: 80.0,
        text: None,
        style: Some(style.clone()),
        position: None,
    });
    let el = created(&actions).unwrap();
    assert_eq!(el.position, pt(100.0, 100.0));
    assert_eq!(el.style, Some(style));
}

#[test]
fn rejected_add_produces_no_actions() {
    let mut core = EngineCore::new();
    let el = Element::new(ElementKind::Rectangle, pt(0.0, 0.0));
    assert!(core.add_element(el).is_empty());
    assert!(core.doc.is_empty());
}

// =============================================================
// Selection and drag
// =============================================================

#[test]
fn click_selects_topmost() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 100.0, 100.0);
    let top = add_rect(&mut core, 50.0, 50.0, 100.0, 100.0);
    let actions = click(&mut core, pt(75.0, 75.0));
    assert!(actions.contains(&Action::SelectionChanged));
    assert_eq!(core.selected_ids(), vec![top]);
}

#[test]
fn shift_click_toggles() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    let b = add_rect(&mut core, 100.0, 0.0, 50.0, 50.0);
    click(&mut core, pt(10.0, 10.0));
    core.on_pointer_down(pt(110.0, 10.0), Button::Primary, shift_modifier());
    core.on_pointer_up(pt(110.0, 10.0), Button::Primary, no_modifiers());
    assert_eq!(core.selected_ids(), vec![a, b]);

    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, shift_modifier());
    assert_eq!(core.selected_ids(), vec![b]);
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn click_empty_clears_selection() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    click(&mut core, pt(10.0, 10.0));
    let actions = click(&mut core, pt(500.0, 500.0));
    assert!(actions.contains(&Action::SelectionChanged));
    assert!(core.selected_ids().is_empty());
}

#[test]
fn secondary_button_is_ignored() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    assert!(core.on_pointer_down(pt(10.0, 10.0), Button::Secondary, no_modifiers()).is_empty());
    assert!(core.selected_ids().is_empty());
}

#[test]
fn drag_moves_element() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 100.0, 100.0);
    drag(&mut core, pt(50.0, 50.0), pt(80.0, 70.0));
    assert_eq!(core.element(&a).unwrap().position, pt(30.0, 20.0));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn drag_child_moves_relative_to_parent() {
    let mut core = EngineCore::new();
    let parent = add_rect(&mut core, 100.0, 100.0, 300.0, 300.0);
    let mut child = Element::sized(ElementKind::Rectangle, pt(10.0, 10.0), 20.0, 20.0);
    child.parent_id = Some(parent);
    let child_id = child.id;
    core.add_element(child);

    drag(&mut core, pt(115.0, 115.0), pt(120.0, 125.0));
    assert_eq!(core.element(&child_id).unwrap().position, pt(15.0, 20.0));
    assert_eq!(core.element(&parent).unwrap().position, pt(100.0, 100.0));
}

#[test]
fn drag_parent_carries_children_implicitly() {
    let mut core = EngineCore::new();
    let parent = add_rect(&mut core, 0.0, 0.0, 300.0, 300.0);
    let mut child = Element::sized(ElementKind::Rectangle, pt(200.0, 200.0), 20.0, 20.0);
    child.parent_id = Some(parent);
    let child_id = child.id;
    core.add_element(child);

    drag(&mut core, pt(10.0, 10.0), pt(60.0, 10.0));
    assert_eq!(core.element(&parent).unwrap().position, pt(50.0, 0.0));
    assert_eq!(core.element(&child_id).unwrap().position, pt(200.0, 200.0));
    assert_eq!(geometry::absolute_position(&core.doc, child_id).unwrap(), pt(250.0, 200.0));
}

#[test]
fn drag_group_moves_members() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 20.0, 20.0);
    let b = add_rect(&mut core, 100.0, 100.0, 20.0, 20.0);
    let g = core.doc.group(&[a, b]).unwrap();

    drag(&mut core, pt(60.0, 60.0), pt(70.0, 65.0));
    assert_eq!(core.element(&g).unwrap().position, pt(10.0, 5.0));
    assert_eq!(core.element(&a).unwrap().position, pt(10.0, 5.0));
    assert_eq!(core.element(&b).unwrap().position, pt(110.0, 105.0));
}

#[test]
fn drag_frame_is_all_or_nothing_when_member_vanishes() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 20.0, 20.0);
    let b = add_rect(&mut core, 100.0, 100.0, 20.0, 20.0);
    let g = core.doc.group(&[a, b]).unwrap();

    core.on_pointer_down(pt(60.0, 60.0), Button::Primary, no_modifiers());
    assert!(matches!(core.input, InputState::DraggingElement { .. }));
    core.doc.remove(&b).unwrap();

    assert!(core.on_pointer_move(pt(70.0, 65.0), no_modifiers()).is_empty());
    assert_eq!(core.input, InputState::Idle);
    assert_eq!(core.element(&g).unwrap().position, pt(0.0, 0.0));
    assert_eq!(core.element(&a).unwrap().position, pt(0.0, 0.0));
}

#[test]
fn move_without_gesture_is_noop() {
    let mut core = EngineCore::new();
    assert!(core.on_pointer_move(pt(10.0, 10.0), no_modifiers()).is_empty());
}

// =============================================================
// Resize
// =============================================================

#[test]
fn resize_via_handle() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 100.0, 100.0);
    click(&mut core, pt(50.0, 50.0));

    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers());
    assert!(matches!(core.input, InputState::ResizingElement { corner: Corner::BottomRight, .. }));
    core.on_pointer_move(pt(120.0, 130.0), no_modifiers());
    core.on_pointer_up(pt(120.0, 130.0), Button::Primary, no_modifiers());

    let el = core.element(&a).unwrap();
    assert_eq!((el.width, el.height), (Some(120.0), Some(130.0)));
    assert_eq!(el.position, pt(0.0, 0.0));
}

#[test]
fn resize_clamps_and_keeps_opposite_corner() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 100.0, 100.0);
    click(&mut core, pt(50.0, 50.0));

    core.on_pointer_down(pt(0.0, 0.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(300.0, 300.0), no_modifiers());

    let el = core.element(&a).unwrap();
    assert_eq!((el.width, el.height), (Some(10.0), Some(10.0)));
    assert_eq!(el.position, pt(90.0, 90.0));
}

// =============================================================
// Connect mode
// =============================================================

#[test]
fn connect_key_arms_and_release_disarms() {
    let mut core = EngineCore::new();
    let actions = core.on_key_down(key("c"), no_modifiers());
    assert!(actions.contains(&Action::ConnectModeChanged(ConnectMode::Armed)));
    assert_eq!(core.mode, ConnectMode::Armed);

    let actions = core.on_key_up(key("C"), no_modifiers());
    assert!(actions.contains(&Action::ConnectModeChanged(ConnectMode::Idle)));
    assert_eq!(core.mode, ConnectMode::Idle);
}

#[test]
fn connect_key_repeat_is_ignored() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    core.on_key_down(key("c"), no_modifiers());
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    assert!(core.on_key_down(key("c"), no_modifiers()).is_empty());
    assert_eq!(core.mode, ConnectMode::Pending { from: a });
}

#[test]
fn connect_two_elements() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    let b = add_rect(&mut core, 200.0, 0.0, 50.0, 50.0);

    core.on_key_down(key("c"), no_modifiers());
    click(&mut core, pt(10.0, 10.0));
    assert_eq!(core.mode, ConnectMode::Pending { from: a });
    assert_eq!(core.doc.connecting_from(), Some(a));

    let actions = click(&mut core, pt(210.0, 10.0));
    let conn = created(&actions).unwrap();
    assert_eq!(conn.from, Some(a));
    assert_eq!(conn.to, Some(b));
    assert_eq!(core.mode, ConnectMode::Armed);
    assert_eq!(core.doc.connecting_from(), None);
}

#[test]
fn connect_same_element_is_ignored() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    core.on_key_down(key("c"), no_modifiers());
    click(&mut core, pt(10.0, 10.0));
    assert!(click(&mut core, pt(20.0, 20.0)).is_empty());
    assert_eq!(core.mode, ConnectMode::Pending { from: a });
    assert!(connections(&core).is_empty());
}

#[test]
fn connect_chains_while_key_held() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    let b = add_rect(&mut core, 200.0, 0.0, 50.0, 50.0);
    let c = add_rect(&mut core, 400.0, 0.0, 50.0, 50.0);

    core.on_key_down(key("c"), no_modifiers());
    click(&mut core, pt(10.0, 10.0));
    click(&mut core, pt(210.0, 10.0));
    click(&mut core, pt(210.0, 10.0));
    click(&mut core, pt(410.0, 10.0));

    let links: Vec<(Option<ElementId>, Option<ElementId>)> =
        connections(&core).iter().map(|el| (el.from, el.to)).collect();
    assert_eq!(links, vec![(Some(a), Some(b)), (Some(b), Some(c))]);
    assert!(core.doc.check_invariants().is_empty());
}

#[test]
fn connect_press_on_empty_clears_pending() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    core.on_key_down(key("c"), no_modifiers());
    click(&mut core, pt(10.0, 10.0));
    click(&mut core, pt(500.0, 500.0));
    assert_eq!(core.mode, ConnectMode::Armed);
    assert_eq!(core.doc.connecting_from(), None);
}

#[test]
fn connect_mode_does_not_drag() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    core.on_key_down(key("c"), no_modifiers());
    drag(&mut core, pt(10.0, 10.0), pt(40.0, 40.0));
    assert_eq!(core.element(&a).unwrap().position, pt(0.0, 0.0));
}

#[test]
fn custom_connect_key() {
    let config = EngineConfig { connect_key: "Alt".into(), ..EngineConfig::default() };
    let mut core = EngineCore::with_config(config);
    assert!(core.on_key_down(key("c"), no_modifiers()).is_empty());
    core.on_key_down(key("alt"), no_modifiers());
    assert_eq!(core.mode, ConnectMode::Armed);
}

// =============================================================
// Keyboard
// =============================================================

#[test]
fn delete_removes_selection() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    let b = add_rect(&mut core, 200.0, 0.0, 50.0, 50.0);
    click(&mut core, pt(10.0, 10.0));

    let actions = core.on_key_down(key("Delete"), no_modifiers());
    assert!(actions.contains(&Action::ElementsDeleted(vec![a])));
    assert!(!core.doc.contains(&a));
    assert!(core.doc.contains(&b));
    assert!(core.selected_ids().is_empty());
}

#[test]
fn backspace_with_empty_selection_is_noop() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    assert!(core.on_key_down(key("Backspace"), no_modifiers()).is_empty());
    assert_eq!(core.doc.len(), 1);
}

#[test]
fn escape_clears_selection() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    click(&mut core, pt(10.0, 10.0));
    let actions = core.on_key_down(key("Escape"), no_modifiers());
    assert!(actions.contains(&Action::SelectionChanged));
    assert!(core.selected_ids().is_empty());
    assert!(core.on_key_down(key("Escape"), no_modifiers()).is_empty());
}

// =============================================================
// Text editing
// =============================================================

#[test]
fn double_click_text_requests_edit() {
    let mut core = EngineCore::new();
    let actions = core.on_drop("text", pt(10.0, 10.0));
    let id = created(&actions).unwrap().id;

    let actions = core.on_double_click(pt(20.0, 15.0));
    assert_eq!(actions, vec![Action::EditTextRequested { id, text: "Double click to edit".into() }]);

    core.set_text(&id, "Start".into());
    assert_eq!(core.element(&id).unwrap().text.as_deref(), Some("Start"));
}

#[test]
fn double_click_shape_is_noop() {
    let mut core = EngineCore::new();
    add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    assert!(core.on_double_click(pt(10.0, 10.0)).is_empty());
}

// =============================================================
// Structure commands
// =============================================================

#[test]
fn group_and_ungroup_selection() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    let b = add_rect(&mut core, 200.0, 0.0, 50.0, 50.0);
    core.doc.set_selection(&[a, b]);

    let actions = core.group_selection();
    let g = created(&actions).unwrap().id;
    assert_eq!(core.selected_ids(), vec![g]);

    let actions = core.ungroup_selection();
    assert!(actions.contains(&Action::ElementsDeleted(vec![g])));
    assert_eq!(core.selected_ids(), vec![a, b]);
}

#[test]
fn group_single_selection_is_noop() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 50.0, 50.0);
    core.doc.set_selection(&[a]);
    assert!(core.group_selection().is_empty());
    assert!(core.ungroup_selection().is_empty());
}

#[test]
fn set_parent_rejects_cycle_without_actions() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 300.0, 300.0);
    let b = add_rect(&mut core, 10.0, 10.0, 50.0, 50.0);
    assert!(!core.set_parent(&b, Some(a)).is_empty());
    assert!(core.set_parent(&a, Some(b)).is_empty());
    assert!(core.doc.check_invariants().is_empty());
}

#[test]
fn set_hidden_cascades_and_updates_scene() {
    let mut core = EngineCore::new();
    let a = add_rect(&mut core, 0.0, 0.0, 300.0, 300.0);
    let b = add_rect(&mut core, 10.0, 10.0, 50.0, 50.0);
    core.set_parent(&b, Some(a));
    core.set_hidden(&a, true);
    assert!(core.scene().is_empty());
    core.set_hidden(&a, false);
    assert_eq!(core.scene().len(), 2);
}

#[test]
fn move_layer_unknown_is_noop() {
    let mut core = EngineCore::new();
    assert!(core.move_layer(&Uuid::new_v4(), 0).is_empty());
}

// =============================================================
// End-to-end
// =============================================================

#[test]
fn connect_then_delete_source_drops_connection() {
    let mut core = EngineCore::new();
    let r1 = add_rect(&mut core, 0.0, 0.0, 100.0, 100.0);
    let r2 = add_circle(&mut core, 200.0, 0.0, 100.0);

    core.on_key_down(key("c"), no_modifiers());
    click(&mut core, pt(50.0, 50.0));
    click(&mut core, pt(250.0, 50.0));
    core.on_key_up(key("c"), no_modifiers());

    let conns = connections(&core);
    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0].from, Some(r1));
    assert_eq!(conns[0].to, Some(r2));
    let conn_id = conns[0].id;
    assert!(core.scene().iter().any(|item| item.id() == conn_id));

    click(&mut core, pt(50.0, 50.0));
    core.on_key_down(key("Delete"), no_modifiers());

    assert!(!core.doc.contains(&conn_id));
    assert!(!core.scene().iter().any(|item| matches!(item, RenderItem::Connection { .. })));
    assert_eq!(core.doc.len(), 1);
    assert!(core.doc.check_invariants().is_empty());
}

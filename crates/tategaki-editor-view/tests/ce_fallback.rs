//! Contenteditable self-verification and fallback to the overlay textarea.

use std::time::Duration;

use tategaki_editor_core::{Key, KeyCombo, Modifiers, SourceEditor};
use tategaki_editor_view::{
    BeforeInputResult, DomPosition, FallbackReason, GridLayout, HostRequest, InputSurface, Platform,
    Point, TategakiView, VerifyOutcome, ViewConfig,
};
use web_time::Instant;

fn ce_view() -> TategakiView {
    let config = ViewConfig {
        ce_ime_enabled: true,
        ..Default::default()
    };
    let mut v = TategakiView::new(config, Platform::default());
    v.open_document(None, "縦書きの本文です");
    v.flush();
    v
}

fn select_all_view(doc: &str) -> (TategakiView, GridLayout) {
    let mut v = ce_view();
    v.open_document(None, doc);
    v.flush();
    let mut layout = GridLayout::new(v.config().writing_mode, 40);
    layout.layout(v.tree());
    let ctrl_a = KeyCombo::with_modifiers(Key::character("a"), Modifiers::CTRL);
    v.on_keydown(Instant::now(), &layout, &ctrl_a).unwrap();
    assert_eq!(v.editor().selection().end(), doc.chars().count());
    (v, layout)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_matching_context_keeps_ce() {
    let mut v = ce_view();
    let t0 = Instant::now();
    assert_eq!(v.verify_ce_selection(t0, "縦書きの本文です"), VerifyOutcome::Matched);
    assert_eq!(v.input_surface(), InputSurface::ContentEditable);
}

#[test]
fn test_repeated_mismatch_falls_back() {
    let mut v = ce_view();
    let t0 = Instant::now();
    assert_eq!(
        v.verify_ce_selection(t0, "ずれ"),
        VerifyOutcome::Mismatch { failures: 1 }
    );
    assert_eq!(
        v.verify_ce_selection(t0 + ms(100), "ずれ"),
        VerifyOutcome::Mismatch { failures: 2 }
    );
    assert_eq!(
        v.verify_ce_selection(t0 + ms(200), "ずれ"),
        VerifyOutcome::Fallback(FallbackReason::VerifyMismatch { failures: 3 })
    );
    assert_eq!(v.input_surface(), InputSurface::OverlayTextarea);
    assert!(!v.state().ce.is_enabled());

    let requests = v.take_requests();
    let [HostRequest::ShowNotice(notice)] = requests.as_slice() else {
        panic!("expected one notice, got {requests:?}");
    };
    assert!(notice.log.is_some());
    assert_eq!(v.active_notices(t0 + ms(300)).len(), 1);
}

#[test]
fn test_old_failures_decay() {
    let mut v = ce_view();
    let t0 = Instant::now();
    v.verify_ce_selection(t0, "ずれ");
    v.verify_ce_selection(t0 + ms(100), "ずれ");
    assert_eq!(
        v.verify_ce_selection(t0 + ms(1500), "ずれ"),
        VerifyOutcome::Mismatch { failures: 1 }
    );
    assert_eq!(v.input_surface(), InputSurface::ContentEditable);
}

#[test]
fn test_verification_throttled() {
    let mut v = ce_view();
    let t0 = Instant::now();
    v.verify_ce_selection(t0, "ずれ");
    assert_eq!(v.verify_ce_selection(t0 + ms(10), "ずれ"), VerifyOutcome::Skipped);
}

#[test]
fn test_skipped_while_composing() {
    let mut v = ce_view();
    let t0 = Instant::now();
    v.on_composition_start();
    assert_eq!(v.verify_ce_selection(t0, "ずれ"), VerifyOutcome::Skipped);
    assert_eq!(v.on_dom_mutation(t0), None);
    assert_eq!(v.input_surface(), InputSurface::ContentEditable);
}

#[test]
fn test_external_mutation_falls_back_at_once() {
    let mut v = ce_view();
    let t0 = Instant::now();
    assert_eq!(v.on_dom_mutation(t0), Some(FallbackReason::ExternalMutation));
    assert_eq!(v.input_surface(), InputSurface::OverlayTextarea);
    assert_eq!(v.take_requests().len(), 1);
}

#[test]
fn test_touch_devices_skip_verification() {
    let config = ViewConfig {
        ce_ime_enabled: true,
        ..Default::default()
    };
    let platform = Platform {
        touch: true,
        ..Default::default()
    };
    let mut v = TategakiView::new(config, platform);
    v.open_document(None, "本文");
    assert_eq!(v.verify_ce_selection(Instant::now(), "ずれ"), VerifyOutcome::Skipped);
}

#[test]
fn test_caret_placed_after_select_all_is_respected() {
    let (mut v, _) = select_all_view("一行目\n二行目");
    let t0 = Instant::now();
    let whole = (DomPosition { line: 0, index: 0 }, DomPosition { line: 1, index: 3 });
    assert!(v.on_dom_selection_change(t0, whole.0, whole.1).is_none());

    let caret = DomPosition { line: 1, index: 1 };
    v.on_dom_selection_change(t0, caret, caret);
    assert!(!v.state().ce.is_select_all());
    let (result, _) = v.on_beforeinput(t0, "insertText", Some("X")).unwrap();
    assert_eq!(result, BeforeInputResult::Handled);
    assert_eq!(v.editor().doc(), "一行目\n二X行目");
}

#[test]
fn test_click_after_select_all_is_respected() {
    let (mut v, layout) = select_all_view("一行目\n二行目");
    let t0 = Instant::now();
    // second cell of the first column
    v.on_pointer_down(t0, &layout, Point::new(-12.0, 20.0), false);
    v.on_pointer_up(t0);
    assert!(!v.state().ce.is_select_all());
    v.on_beforeinput(t0, "insertText", Some("X")).unwrap();
    assert_eq!(v.editor().doc(), "一X行目\n二行目");
}

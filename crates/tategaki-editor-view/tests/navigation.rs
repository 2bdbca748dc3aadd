//! Visual-line navigation through the view controller.

use tategaki_editor_core::{Key, KeyCombo, Modifiers, Selection, SourceEditor, WritingMode};
use tategaki_editor_view::{GridLayout, Platform, TategakiView, ViewConfig};
use web_time::Instant;

fn wrapped_view(doc: &str, mode: WritingMode) -> (TategakiView, GridLayout) {
    let config = ViewConfig {
        writing_mode: mode,
        ..Default::default()
    };
    let mut v = TategakiView::new(config, Platform::default());
    v.open_document(None, doc);
    v.flush();
    let mut layout = GridLayout::new(mode, 4);
    layout.layout(v.tree());
    (v, layout)
}

fn press(v: &mut TategakiView, layout: &GridLayout, key: Key) -> usize {
    v.on_keydown(Instant::now(), layout, &KeyCombo::new(key)).unwrap();
    v.editor().selection().head
}

#[test]
fn test_block_axis_moves_one_visual_line() {
    let (mut v, layout) = wrapped_view("abcdefghijkl", WritingMode::VerticalRl);
    assert_eq!(press(&mut v, &layout, Key::ArrowDown), 1);
    // next column keeps the inline position
    assert_eq!(press(&mut v, &layout, Key::ArrowLeft), 5);
    assert_eq!(press(&mut v, &layout, Key::ArrowLeft), 9);
    assert_eq!(press(&mut v, &layout, Key::ArrowRight), 5);
    assert_eq!(press(&mut v, &layout, Key::ArrowRight), 1);
}

#[test]
fn test_block_axis_crosses_into_next_line() {
    let (mut v, layout) = wrapped_view("ab\ncd", WritingMode::VerticalRl);
    assert_eq!(press(&mut v, &layout, Key::ArrowDown), 1);
    // past the last column the caret enters the next line at its start
    assert_eq!(press(&mut v, &layout, Key::ArrowLeft), 3);
}

#[test]
fn test_horizontal_mode_uses_up_and_down() {
    let (mut v, layout) = wrapped_view("abcdefgh", WritingMode::HorizontalTb);
    assert_eq!(press(&mut v, &layout, Key::ArrowRight), 1);
    assert_eq!(press(&mut v, &layout, Key::ArrowDown), 5);
    assert_eq!(press(&mut v, &layout, Key::ArrowUp), 1);
}

#[test]
fn test_shift_extends_selection() {
    let (mut v, layout) = wrapped_view("abcdefgh", WritingMode::VerticalRl);
    let combo = KeyCombo::shift(Key::ArrowDown);
    v.on_keydown(Instant::now(), &layout, &combo).unwrap();
    v.on_keydown(Instant::now(), &layout, &combo).unwrap();
    assert_eq!(v.editor().selection(), Selection::new(0, 2));
}

#[test]
fn test_document_start_lands_after_heading_marker() {
    let (mut v, layout) = wrapped_view("# 見出し\n本文", WritingMode::VerticalRl);
    let end = KeyCombo::with_modifiers(Key::End, Modifiers::CTRL);
    v.on_keydown(Instant::now(), &layout, &end).unwrap();
    assert_eq!(v.editor().selection().head, 8);

    let home = KeyCombo::with_modifiers(Key::Home, Modifiers::CTRL);
    v.on_keydown(Instant::now(), &layout, &home).unwrap();
    assert_eq!(v.editor().selection(), Selection::collapsed(2));

    v.on_textarea_input(Instant::now(), "新").unwrap();
    assert_eq!(v.editor().doc(), "# 新見出し\n本文");
    assert_eq!(v.outline()[0].text, "新見出し");
}

#[test]
fn test_line_start_key_skips_blockquote_marker() {
    let (mut v, layout) = wrapped_view("> 引用文", WritingMode::VerticalRl);
    let end = KeyCombo::new(Key::End);
    v.on_keydown(Instant::now(), &layout, &end).unwrap();
    assert_eq!(press(&mut v, &layout, Key::Home), 2);
}

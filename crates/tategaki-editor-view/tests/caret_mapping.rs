//! Caret normalization over arbitrary documents.

use proptest::prelude::*;
use tategaki_editor_view::selection::{LineView, ProjectionSource, normalize_offset_to_visible};
use tategaki_editor_view::{RenderPipeline, ViewConfig};

const DOC_CHARS: &[char] = &[
    'a', '縦', ' ', '\n', '#', '*', '=', '~', '`', '$', '|', '>', '[', ']', '(', ')', '^', '!', '《', '》',
];

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(DOC_CHARS), 0..120)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Whether the caret may rest at `offset`: within a visible segment, at
/// either side of an inline widget or a block widget, or at the start of a
/// line that shows nothing at all.
fn is_caret_stop(p: &mut RenderPipeline, offset: usize) -> bool {
    let line = p.line_model().line_at_offset(offset);
    let line_from = p.line_model().range(line).map_or(0, |r| r.from);
    match p.line_view(line) {
        LineView::Content(proj) => {
            let in_segment = proj.segments.iter().any(|s| s.from <= offset && offset <= s.to);
            let at_widget = proj
                .widgets
                .iter()
                .any(|w| offset == w.range.start || offset == w.range.end);
            let blank = proj.segments.is_empty() && proj.widgets.is_empty();
            in_segment || at_widget || (blank && offset == line_from)
        }
        LineView::Widget { from, to } => offset == from || offset == to,
        LineView::Hidden => false,
    }
}

proptest! {
    #[test]
    fn prop_normalize_lands_on_caret_stop(doc in document()) {
        let mut p = RenderPipeline::new(&ViewConfig::default());
        p.render_full(&doc);
        let len = doc.chars().count();
        for offset in 0..=len {
            let stop = is_caret_stop(&mut p, offset);
            for forward in [true, false] {
                let snapped = normalize_offset_to_visible(&mut p, offset, forward);
                prop_assert!(snapped <= len);
                if stop {
                    prop_assert_eq!(snapped, offset);
                } else {
                    prop_assert!(is_caret_stop(&mut p, snapped), "{} -> {}", offset, snapped);
                }
            }
        }
    }
}

#[test]
fn test_snaps_out_of_ruby_notation() {
    let mut p = RenderPipeline::new(&ViewConfig::default());
    p.render_full("｜漢字《かんじ》です");
    // inside the reading
    assert_eq!(normalize_offset_to_visible(&mut p, 5, true), 8);
    assert_eq!(normalize_offset_to_visible(&mut p, 5, false), 3);
    assert_eq!(normalize_offset_to_visible(&mut p, 9, true), 9);
}

#[test]
fn test_snaps_past_hidden_frontmatter() {
    let mut p = RenderPipeline::new(&ViewConfig::default());
    p.render_full("---\ntitle: x\n---\n本文");
    assert_eq!(normalize_offset_to_visible(&mut p, 5, true), 17);
    assert_eq!(normalize_offset_to_visible(&mut p, 5, false), 17);
}

#[test]
fn test_line_start_skips_hidden_prefix() {
    let mut p = RenderPipeline::new(&ViewConfig::default());
    p.render_full("# 見出し\n> 引用");
    for forward in [true, false] {
        assert_eq!(normalize_offset_to_visible(&mut p, 0, forward), 2);
        assert_eq!(normalize_offset_to_visible(&mut p, 1, forward), 2);
        assert_eq!(normalize_offset_to_visible(&mut p, 6, forward), 8);
    }
}

//! Incremental patching against full rebuilds.

use proptest::prelude::*;
use tategaki_editor_core::{PlainEditor, SourceEditor};
use tategaki_editor_view::{LineElement, PatchPath, RenderPipeline, ViewConfig};

const DOC_CHARS: &[char] = &['a', '縦', ' ', '\n', '#', '*', '`', '$', '|', '>', '[', ']', '^', ':'];

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(DOC_CHARS), 1..150)
        .prop_map(|chars| chars.into_iter().collect())
}

/// (line seed, column seed, chars deleted, inserted text)
fn edits() -> impl Strategy<Value = Vec<(usize, usize, usize, String)>> {
    prop::collection::vec((any::<usize>(), any::<usize>(), 0..3usize, "[a縦*`#$|\\[\\]^ ]{0,3}"), 1..12)
}

fn snapshot(p: &RenderPipeline) -> Vec<(usize, usize, usize, &'static str, String)> {
    p.tree()
        .lines()
        .iter()
        .map(|e: &LineElement| (e.line, e.from, e.to, e.kind.as_str(), e.visible_text()))
        .collect()
}

proptest! {
    #[test]
    fn prop_single_line_edits_match_rebuild(doc in document(), edits in edits()) {
        let config = ViewConfig::default();
        let mut editor = PlainEditor::from_text(&doc);
        let mut patched = RenderPipeline::new(&config);
        patched.render_full(&doc);

        for (line_seed, col_seed, delete, insert) in edits {
            let model = patched.model();
            let line = line_seed % model.line_count();
            let range = model.range(line).unwrap();
            let from = range.from + col_seed % (range.len() + 1);
            let to = (from + delete).min(range.to);
            let update = editor.replace_range(from, to, &insert).unwrap();
            let report = patched.apply_changes(&editor, &update.changes);
            prop_assert_eq!(report.path, PatchPath::Fast);
        }
        patched.reclassify_now();

        let mut rebuilt = RenderPipeline::new(&config);
        rebuilt.render_full(&editor.doc());
        prop_assert_eq!(snapshot(&patched), snapshot(&rebuilt));
    }
}

#[test]
fn test_multi_line_paste_splices_only_affected_lines() {
    let doc = "一\n二\n三\n四";
    let mut editor = PlainEditor::from_text(doc);
    let mut p = RenderPipeline::new(&ViewConfig::default());
    p.render_full(doc);
    let before_last = p.tree().get(3).unwrap().clone();

    let update = editor.replace_range(2, 3, "2a\n2b").unwrap();
    let report = p.apply_changes(&editor, &update.changes);
    assert_eq!(report.path, PatchPath::Slow);
    let texts: Vec<String> = p.tree().lines().iter().map(LineElement::visible_text).collect();
    assert_eq!(texts, ["一", "2a", "2b", "三", "四"]);

    let last = p.tree().get(4).unwrap();
    assert_eq!(last.visible_text(), before_last.visible_text());
    assert_eq!((last.line, last.from, last.to), (4, 11, 12));
}

#[test]
fn test_opening_fence_reclassifies_following_lines() {
    let doc = "前\n本文\n後";
    let mut editor = PlainEditor::from_text(doc);
    let mut p = RenderPipeline::new(&ViewConfig::default());
    p.render_full(doc);
    let update = editor.replace_range(2, 2, "```\n").unwrap();
    p.apply_changes(&editor, &update.changes);
    let kinds: Vec<&str> = p.tree().lines().iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds[1], "code-fence");
    assert_eq!(kinds[2], "code");
    assert_eq!(kinds[3], "code");
}

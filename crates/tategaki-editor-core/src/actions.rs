//! Editor actions and input types.
//!
//! Platform-agnostic definitions for editor operations. The `EditorAction` enum
//! represents semantic editing operations, while `InputType` represents the
//! semantic intent from input events (`beforeinput`, native input methods, etc.).

use smol_str::SmolStr;

use crate::decoration::InlineStyle;
use crate::types::Selection;

/// Semantic input types from input events.
///
/// Based on the W3C Input Events specification, limited to the types the
/// contenteditable bridge translates into buffer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    // === Insertion ===
    /// Insert typed text.
    InsertText,
    /// Insert text from IME composition.
    InsertCompositionText,
    /// Insert a line break (Shift+Enter).
    InsertLineBreak,
    /// Insert a paragraph break (Enter).
    InsertParagraph,
    /// Insert from paste operation.
    InsertFromPaste,
    /// Insert from drop operation.
    InsertFromDrop,
    /// Insert replacement text (e.g., spell check correction).
    InsertReplacementText,

    // === Deletion ===
    /// Delete content backward (Backspace).
    DeleteContentBackward,
    /// Delete content forward (Delete key).
    DeleteContentForward,
    /// Delete word backward (Ctrl/Alt+Backspace).
    DeleteWordBackward,
    /// Delete word forward (Ctrl/Alt+Delete).
    DeleteWordForward,
    /// Delete to soft line boundary backward.
    DeleteSoftLineBackward,
    /// Delete to soft line boundary forward.
    DeleteSoftLineForward,
    /// Delete to hard line boundary backward (Cmd+Backspace on Mac).
    DeleteHardLineBackward,
    /// Delete to hard line boundary forward (Cmd+Delete on Mac).
    DeleteHardLineForward,
    /// Delete by cut operation.
    DeleteByCut,
    /// Delete by drag operation.
    DeleteByDrag,
    /// Generic content deletion.
    DeleteContent,

    // === History ===
    HistoryUndo,
    HistoryRedo,

    // === Formatting ===
    FormatBold,
    FormatItalic,
    FormatStrikethrough,

    /// Unrecognized input type.
    Unknown(String),
}

impl InputType {
    /// Parse a `beforeinput` `inputType` string.
    pub fn parse(s: &str) -> Self {
        match s {
            "insertText" => Self::InsertText,
            "insertCompositionText" => Self::InsertCompositionText,
            "insertLineBreak" => Self::InsertLineBreak,
            "insertParagraph" => Self::InsertParagraph,
            "insertFromPaste" => Self::InsertFromPaste,
            "insertFromDrop" => Self::InsertFromDrop,
            "insertReplacementText" => Self::InsertReplacementText,
            "deleteContentBackward" => Self::DeleteContentBackward,
            "deleteContentForward" => Self::DeleteContentForward,
            "deleteWordBackward" => Self::DeleteWordBackward,
            "deleteWordForward" => Self::DeleteWordForward,
            "deleteSoftLineBackward" => Self::DeleteSoftLineBackward,
            "deleteSoftLineForward" => Self::DeleteSoftLineForward,
            "deleteHardLineBackward" => Self::DeleteHardLineBackward,
            "deleteHardLineForward" => Self::DeleteHardLineForward,
            "deleteByCut" => Self::DeleteByCut,
            "deleteByDrag" => Self::DeleteByDrag,
            "deleteContent" => Self::DeleteContent,
            "historyUndo" => Self::HistoryUndo,
            "historyRedo" => Self::HistoryRedo,
            "formatBold" => Self::FormatBold,
            "formatItalic" => Self::FormatItalic,
            "formatStrikeThrough" => Self::FormatStrikethrough,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether this input type is a deletion operation.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            Self::DeleteContentBackward
                | Self::DeleteContentForward
                | Self::DeleteWordBackward
                | Self::DeleteWordForward
                | Self::DeleteSoftLineBackward
                | Self::DeleteSoftLineForward
                | Self::DeleteHardLineBackward
                | Self::DeleteHardLineForward
                | Self::DeleteByCut
                | Self::DeleteByDrag
                | Self::DeleteContent
        )
    }

    /// Whether this input type is an insertion operation.
    pub fn is_insertion(&self) -> bool {
        matches!(
            self,
            Self::InsertText
                | Self::InsertCompositionText
                | Self::InsertLineBreak
                | Self::InsertParagraph
                | Self::InsertFromPaste
                | Self::InsertFromDrop
                | Self::InsertReplacementText
        )
    }

    /// Translate into an action over `range`. `data` is the event payload
    /// for insertions. Returns None for types that are not buffer edits.
    pub fn to_action(&self, range: Selection, data: Option<&str>) -> Option<EditorAction> {
        let action = match self {
            Self::InsertText
            | Self::InsertCompositionText
            | Self::InsertFromPaste
            | Self::InsertFromDrop
            | Self::InsertReplacementText => EditorAction::Insert {
                text: SmolStr::new(data?),
                range,
            },
            Self::InsertLineBreak => EditorAction::InsertLineBreak { range },
            Self::InsertParagraph => EditorAction::InsertParagraph { range },
            Self::DeleteContentBackward | Self::DeleteContent => {
                EditorAction::DeleteBackward { range }
            }
            Self::DeleteContentForward => EditorAction::DeleteForward { range },
            Self::DeleteWordBackward => EditorAction::DeleteWordBackward { range },
            Self::DeleteWordForward => EditorAction::DeleteWordForward { range },
            Self::DeleteSoftLineBackward | Self::DeleteHardLineBackward => {
                EditorAction::DeleteToLineStart { range }
            }
            Self::DeleteSoftLineForward | Self::DeleteHardLineForward => {
                EditorAction::DeleteToLineEnd { range }
            }
            Self::DeleteByCut | Self::DeleteByDrag => EditorAction::DeleteBackward { range },
            Self::HistoryUndo => EditorAction::Undo,
            Self::HistoryRedo => EditorAction::Redo,
            Self::FormatBold => EditorAction::ToggleStyle(InlineStyle::Bold),
            Self::FormatItalic => EditorAction::ToggleStyle(InlineStyle::Italic),
            Self::FormatStrikethrough => EditorAction::ToggleStyle(InlineStyle::Strike),
            Self::Unknown(_) => return None,
        };
        Some(action)
    }
}

/// All possible editor actions.
///
/// These represent semantic operations on the document, decoupled from
/// how they're triggered (keyboard, pointer, IME, host command).
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    // === Text Insertion ===
    /// Insert text at the given range (replacing any selected content).
    Insert { text: SmolStr, range: Selection },

    /// Insert a bare newline.
    InsertLineBreak { range: Selection },

    /// Insert a paragraph break, continuing list markers.
    InsertParagraph { range: Selection },

    // === Deletion ===
    DeleteBackward { range: Selection },
    DeleteForward { range: Selection },
    DeleteWordBackward { range: Selection },
    DeleteWordForward { range: Selection },
    DeleteToLineStart { range: Selection },
    DeleteToLineEnd { range: Selection },

    // === History ===
    Undo,
    Redo,

    // === Formatting ===
    /// Toggle an inline style on the selection.
    ToggleStyle(InlineStyle),

    /// Remove every inline style marker inside the selection.
    ClearFormatting,

    /// Wrap the selection as ruby base with the given reading.
    InsertRuby { reading: SmolStr },

    /// Remove ruby notation touching the selection, keeping the base text.
    ClearRuby,

    // === Selection ===
    SelectAll,

    /// Move caret to position.
    MoveCursor { offset: usize },

    /// Extend selection to position.
    ExtendSelection { offset: usize },
}

impl EditorAction {
    /// Update the range in actions that use one.
    pub fn with_range(self, range: Selection) -> Self {
        match self {
            Self::Insert { text, .. } => Self::Insert { text, range },
            Self::InsertLineBreak { .. } => Self::InsertLineBreak { range },
            Self::InsertParagraph { .. } => Self::InsertParagraph { range },
            Self::DeleteBackward { .. } => Self::DeleteBackward { range },
            Self::DeleteForward { .. } => Self::DeleteForward { range },
            Self::DeleteWordBackward { .. } => Self::DeleteWordBackward { range },
            Self::DeleteWordForward { .. } => Self::DeleteWordForward { range },
            Self::DeleteToLineStart { .. } => Self::DeleteToLineStart { range },
            Self::DeleteToLineEnd { .. } => Self::DeleteToLineEnd { range },
            other => other,
        }
    }

    /// Whether the action always changes block structure and should render immediately.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::InsertLineBreak { .. } | Self::InsertParagraph { .. } => true,
            Self::Insert { text, .. } => text.contains('\n'),
            _ => false,
        }
    }
}

/// Key values for keyboard input.
///
/// Platform-agnostic key representation. Platform-specific code converts
/// from native key events to this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key.
    Character(SmolStr),
    Unidentified,

    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,

    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,

    /// IME processing key (`Process` / keyCode 229).
    Process,
}

impl Key {
    /// Create a character key.
    pub fn character(s: impl Into<SmolStr>) -> Self {
        Self::Character(s.into())
    }

    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn parse(s: &str) -> Self {
        match s {
            "Backspace" => Self::Backspace,
            "Delete" => Self::Delete,
            "Enter" => Self::Enter,
            "Tab" => Self::Tab,
            "Escape" => Self::Escape,
            "ArrowLeft" => Self::ArrowLeft,
            "ArrowRight" => Self::ArrowRight,
            "ArrowUp" => Self::ArrowUp,
            "ArrowDown" => Self::ArrowDown,
            "Home" => Self::Home,
            "End" => Self::End,
            "PageUp" => Self::PageUp,
            "PageDown" => Self::PageDown,
            "Process" => Self::Process,
            "Unidentified" | "" => Self::Unidentified,
            other => Self::Character(SmolStr::new(other)),
        }
    }

    /// Check if this is a navigation key.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::ArrowLeft
                | Self::ArrowRight
                | Self::ArrowUp
                | Self::ArrowDown
                | Self::Home
                | Self::End
                | Self::PageUp
                | Self::PageDown
        )
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        ctrl: false,
        alt: false,
        shift: true,
        meta: false,
    };

    pub const META: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: true,
    };

    /// Whether the platform primary modifier (Cmd on Mac, Ctrl elsewhere) is held.
    pub fn primary(&self, is_mac: bool) -> bool {
        if is_mac { self.meta } else { self.ctrl }
    }
}

/// A key combination for triggering an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn shift(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::SHIFT,
        }
    }

    /// Map editing shortcuts to actions. Navigation keys are not mapped here;
    /// they need visual geometry and are handled by the view.
    pub fn to_action(&self, selection: Selection, is_mac: bool) -> Option<EditorAction> {
        let primary = self.modifiers.primary(is_mac);
        let word = if is_mac { self.modifiers.alt } else { self.modifiers.ctrl };
        let action = match &self.key {
            Key::Backspace if primary && is_mac => EditorAction::DeleteToLineStart { range: selection },
            Key::Backspace if word => EditorAction::DeleteWordBackward { range: selection },
            Key::Backspace => EditorAction::DeleteBackward { range: selection },
            Key::Delete if word => EditorAction::DeleteWordForward { range: selection },
            Key::Delete => EditorAction::DeleteForward { range: selection },
            Key::Enter if self.modifiers.shift => EditorAction::InsertLineBreak { range: selection },
            Key::Enter => EditorAction::InsertParagraph { range: selection },
            Key::Character(c) if primary => match c.to_lowercase().as_str() {
                "a" => EditorAction::SelectAll,
                "z" if self.modifiers.shift => EditorAction::Redo,
                "z" => EditorAction::Undo,
                "y" => EditorAction::Redo,
                "b" => EditorAction::ToggleStyle(InlineStyle::Bold),
                "i" => EditorAction::ToggleStyle(InlineStyle::Italic),
                "e" => EditorAction::ToggleStyle(InlineStyle::Code),
                _ => return None,
            },
            _ => return None,
        };
        Some(action)
    }
}

/// Result of handling a keydown event.
#[derive(Debug, Clone, PartialEq)]
pub enum KeydownResult {
    /// Event was handled, prevent default.
    Handled,
    /// Event was not a keybinding, let platform handle it.
    NotHandled,
    /// Event should be passed through (composition keys, etc.).
    PassThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_type() {
        assert_eq!(InputType::parse("insertText"), InputType::InsertText);
        assert_eq!(
            InputType::parse("deleteContentBackward"),
            InputType::DeleteContentBackward
        );
        assert_eq!(
            InputType::parse("insertOrderedList"),
            InputType::Unknown("insertOrderedList".to_string())
        );
        assert!(InputType::DeleteByCut.is_deletion());
        assert!(InputType::InsertFromPaste.is_insertion());
    }

    #[test]
    fn test_input_type_to_action() {
        let sel = Selection::new(2, 5);
        assert_eq!(
            InputType::InsertText.to_action(sel, Some("あ")),
            Some(EditorAction::Insert {
                text: "あ".into(),
                range: sel
            })
        );
        assert_eq!(InputType::InsertText.to_action(sel, None), None);
        assert_eq!(
            InputType::HistoryUndo.to_action(sel, None),
            Some(EditorAction::Undo)
        );
        assert_eq!(InputType::Unknown("x".into()).to_action(sel, None), None);
    }

    #[test]
    fn test_key_combo_actions() {
        let sel = Selection::collapsed(3);
        let undo = KeyCombo::with_modifiers(Key::character("z"), Modifiers::CTRL);
        assert_eq!(undo.to_action(sel, false), Some(EditorAction::Undo));
        assert_eq!(undo.to_action(sel, true), None);

        let bold = KeyCombo::with_modifiers(Key::character("b"), Modifiers::META);
        assert_eq!(
            bold.to_action(sel, true),
            Some(EditorAction::ToggleStyle(InlineStyle::Bold))
        );

        let newline = KeyCombo::shift(Key::Enter);
        assert_eq!(
            newline.to_action(sel, false),
            Some(EditorAction::InsertLineBreak { range: sel })
        );
        assert_eq!(KeyCombo::new(Key::ArrowDown).to_action(sel, false), None);
    }

    #[test]
    fn test_key_parse() {
        assert_eq!(Key::parse("ArrowUp"), Key::ArrowUp);
        assert_eq!(Key::parse("x"), Key::character("x"));
        assert!(Key::parse("PageDown").is_navigation());
    }

    #[test]
    fn test_structural_actions() {
        let sel = Selection::collapsed(0);
        assert!(EditorAction::InsertParagraph { range: sel }.is_structural());
        assert!(
            EditorAction::Insert {
                text: "a\nb".into(),
                range: sel
            }
            .is_structural()
        );
        assert!(!EditorAction::DeleteBackward { range: sel }.is_structural());
    }
}

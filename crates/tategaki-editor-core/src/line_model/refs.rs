use std::collections::HashMap;

use smol_str::SmolStr;

use crate::scan::{RefResolver, normalize_label};

/// A footnote definition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteDef {
    pub line: usize,
    pub text: String,
}

/// Footnote numbering and definitions.
///
/// Numbers are assigned by first appearance of either a reference or a
/// definition, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FootnoteTable {
    order: Vec<SmolStr>,
    numbers: HashMap<SmolStr, usize>,
    defs: HashMap<SmolStr, FootnoteDef>,
}

impl FootnoteTable {
    /// Record an appearance of `id`, assigning the next number if it is new.
    pub fn note(&mut self, id: &str) -> usize {
        let key = SmolStr::new(normalize_label(id));
        if let Some(n) = self.numbers.get(&key) {
            return *n;
        }
        self.order.push(key.clone());
        let n = self.order.len();
        self.numbers.insert(key, n);
        n
    }

    pub fn define(&mut self, id: &str, line: usize, text: String) {
        self.note(id);
        self.defs
            .entry(SmolStr::new(normalize_label(id)))
            .or_insert(FootnoteDef { line, text });
    }

    pub fn number(&self, id: &str) -> Option<usize> {
        self.numbers.get(normalize_label(id).as_str()).copied()
    }

    pub fn definition(&self, id: &str) -> Option<&FootnoteDef> {
        self.defs.get(normalize_label(id).as_str())
    }

    /// Ids in numbering order.
    pub fn ids(&self) -> &[SmolStr] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Link reference definitions keyed by normalized label. First definition wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRefMap {
    map: HashMap<String, SmolStr>,
}

impl LinkRefMap {
    pub fn insert(&mut self, label: String, url: SmolStr) {
        self.map.entry(label).or_insert(url);
    }

    pub fn get(&self, label: &str) -> Option<&SmolStr> {
        self.map.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Document-wide reference tables consulted while decorating single lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTables {
    pub footnotes: FootnoteTable,
    pub links: LinkRefMap,
}

impl RefResolver for ReferenceTables {
    fn link_ref(&self, label: &str) -> Option<SmolStr> {
        self.links.get(label).cloned()
    }

    fn footnote_number(&self, id: &str) -> Option<usize> {
        self.footnotes.number(id)
    }
}

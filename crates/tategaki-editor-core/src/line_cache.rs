//! Per-line memoization of decoration and segment results.
//!
//! Entries are keyed by line index and validated by a fingerprint of
//! everything the cached value depends on, so a stale entry is detected on
//! lookup without a separate invalidation pass.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use smol_str::SmolStr;

use crate::line_model::{BlockKind, LineInfo};

/// Simple hash function for source text comparison.
pub fn hash_source(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Fingerprint of the inputs to one line's segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    pub from: usize,
    pub to: usize,
    pub text_hash: u64,
    pub kind: BlockKind,
    pub code_lang: Option<SmolStr>,
    pub source_mode: bool,
    pub ruby: bool,
    pub tcy_max: Option<usize>,
    pub block_widget: bool,
    /// Footnote numbers and link references can change without the line changing.
    pub refs_generation: u64,
}

impl SegmentKey {
    pub fn new(from: usize, to: usize, text: &str, info: &LineInfo) -> Self {
        Self {
            from,
            to,
            text_hash: hash_source(text),
            kind: info.kind,
            code_lang: info.code_lang.clone(),
            source_mode: false,
            ruby: false,
            tcy_max: None,
            block_widget: false,
            refs_generation: 0,
        }
    }
}

/// Bounded cache from line index to a fingerprinted value.
#[derive(Debug, Clone)]
pub struct LineCache<K, V> {
    entries: HashMap<usize, (K, V)>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<K: PartialEq, V> LineCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Cached value for `line` if its fingerprint still matches.
    pub fn get(&mut self, line: usize, key: &K) -> Option<&V> {
        match self.entries.get(&line) {
            Some((k, v)) if k == key => {
                self.hits += 1;
                Some(v)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a value. When full, the entry farthest from `line` is evicted.
    pub fn insert(&mut self, line: usize, key: K, value: V) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&line) {
            if let Some(&far) = self.entries.keys().max_by_key(|&&l| l.abs_diff(line)) {
                self.entries.remove(&far);
            }
        }
        self.entries.insert(line, (key, value));
    }

    pub fn get_or_insert_with(&mut self, line: usize, key: K, f: impl FnOnce() -> V) -> &V {
        let fresh = matches!(self.entries.get(&line), Some((k, _)) if *k == key);
        if fresh {
            self.hits += 1;
        } else {
            self.misses += 1;
            let value = f();
            self.insert(line, key, value);
        }
        // Present: either fresh or inserted just above.
        &self.entries[&line].1
    }

    pub fn invalidate(&mut self, line: usize) {
        self.entries.remove(&line);
    }

    /// Drop entries for lines outside `window`.
    pub fn prune_outside(&mut self, window: Range<usize>) {
        let before = self.entries.len();
        self.entries.retain(|line, _| window.contains(line));
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::trace!(
                target: "tategaki::pipeline",
                pruned,
                window_start = window.start,
                window_end = window.end,
                "pruned line cache"
            );
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_source() {
        assert_eq!(hash_source("縦書き"), hash_source("縦書き"));
        assert_ne!(hash_source("縦書き"), hash_source("横書き"));
    }

    #[test]
    fn test_fingerprint_mismatch_is_a_miss() {
        let mut cache: LineCache<u64, &str> = LineCache::new(4);
        cache.insert(3, 1, "a");
        assert_eq!(cache.get(3, &1), Some(&"a"));
        assert_eq!(cache.get(3, &2), None);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_evicts_farthest() {
        let mut cache: LineCache<u8, u8> = LineCache::new(2);
        cache.insert(0, 0, 0);
        cache.insert(100, 0, 1);
        cache.insert(2, 0, 2);
        assert!(cache.get(100, &0).is_none());
        assert!(cache.get(0, &0).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let mut cache: LineCache<u8, String> = LineCache::new(8);
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(1, 7, || {
                calls += 1;
                "v".to_string()
            });
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_prune_outside() {
        let mut cache: LineCache<u8, u8> = LineCache::new(16);
        for i in 0..10 {
            cache.insert(i, 0, 0);
        }
        cache.prune_outside(3..6);
        assert_eq!(cache.len(), 3);
    }
}

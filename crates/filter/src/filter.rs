//! [`Filter`]: the published rule index.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::debug;

use vigil_core::Rule;

use crate::trie::PatternTrie;

/// Owns the current rule set and answers "which rules apply to this name".
///
/// Readers load the current [`PatternTrie`] snapshot without locking.
/// Writers are serialized, build the next snapshot off to the side, and
/// publish it in one atomic store, so a lookup never sees a half-updated
/// tree.
pub struct Filter {
    index: ArcSwap<PatternTrie>,
    writer: Mutex<()>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").field("rules", &self.len()).finish()
    }
}

impl Filter {
    /// Create a filter with no rules.
    pub fn new() -> Self {
        Self {
            index: ArcSwap::from_pointee(PatternTrie::new()),
            writer: Mutex::new(()),
        }
    }

    /// Create a filter pre-populated with `rules`.
    pub fn with_rules<I>(rules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arc<Rule>>,
    {
        let trie: PatternTrie = rules.into_iter().map(Into::into).collect();
        Self {
            index: ArcSwap::from_pointee(trie),
            writer: Mutex::new(()),
        }
    }

    /// Register a rule. Rules sharing a pattern (or an id) are all kept.
    pub fn add_rule(&self, rule: impl Into<Arc<Rule>>) -> Arc<Rule> {
        let rule = rule.into();
        let added = Arc::clone(&rule);
        self.update(move |trie| trie.insert(rule));
        added
    }

    /// Remove every rule carrying `id`, returning what was removed.
    pub fn remove_rule(&self, id: &str) -> Vec<Arc<Rule>> {
        self.update(|trie| {
            let targets: Vec<Arc<Rule>> =
                trie.rules().into_iter().filter(|r| r.id == id).collect();
            targets.iter().filter_map(|r| trie.remove(r)).collect()
        })
    }

    /// Replace the whole rule set in one publication.
    pub fn rebuild<I>(&self, rules: I)
    where
        I: IntoIterator,
        I::Item: Into<Arc<Rule>>,
    {
        let trie: PatternTrie = rules.into_iter().map(Into::into).collect();
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let count = trie.len();
        self.index.store(Arc::new(trie));
        debug!(rules = count, "rebuilt rule index");
    }

    /// Every rule whose pattern matches `name`. Order is unspecified.
    pub fn matched_rules(&self, name: &str) -> Vec<Arc<Rule>> {
        self.index.load().matched(name)
    }

    /// The currently published index, for several lookups against one rule set.
    pub fn snapshot(&self) -> Arc<PatternTrie> {
        self.index.load_full()
    }

    /// All registered rules.
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.index.load().rules()
    }

    pub fn len(&self) -> usize {
        self.index.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current snapshot, mutate the copy, publish it.
    fn update<F, R>(&self, mutate: F) -> R
    where
        F: FnOnce(&mut PatternTrie) -> R,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = PatternTrie::clone(&self.index.load_full());
        let out = mutate(&mut next);
        let count = next.len();
        self.index.store(Arc::new(next));
        debug!(rules = count, "published rule index");
        out
    }
}

//! Segment-keyed pattern tree.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_core::{Rule, Segment, SEPARATOR};

#[derive(Debug, Clone, Default)]
struct Node {
    /// Children reached by an exact segment.
    literals: HashMap<String, Node>,
    /// Child reached by any single segment.
    wildcard: Option<Box<Node>>,
    /// Rules whose pattern ends at this depth.
    rules: Vec<Arc<Rule>>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.literals.is_empty() && self.wildcard.is_none()
    }

    fn collect(&self, out: &mut Vec<Arc<Rule>>) {
        out.extend(self.rules.iter().cloned());
        for child in self.literals.values() {
            child.collect(out);
        }
        if let Some(child) = &self.wildcard {
            child.collect(out);
        }
    }
}

/// Index of rules keyed by pattern segment position.
///
/// Lookup follows the literal child and the wildcard child of every live
/// branch in lockstep with the name's segments, so its cost depends on how
/// many patterns are ambiguous at a prefix, not on the total rule count.
#[derive(Debug, Clone, Default)]
pub struct PatternTrie {
    root: Node,
    len: usize,
}

impl PatternTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered rules (duplicates counted).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register a rule under its pattern. Rules sharing a pattern are all kept.
    pub fn insert(&mut self, rule: Arc<Rule>) {
        let mut node = &mut self.root;
        for segment in rule.pattern.segments() {
            node = match segment {
                Segment::Literal(lit) => node.literals.entry(lit.clone()).or_default(),
                Segment::Wildcard => node.wildcard.get_or_insert_with(Box::default).as_mut(),
            };
        }
        node.rules.push(rule);
        self.len += 1;
    }

    /// Remove the rule with `rule.id` registered under `rule.pattern`.
    ///
    /// Branches left empty are pruned.
    pub fn remove(&mut self, rule: &Rule) -> Option<Arc<Rule>> {
        let removed = remove_from(&mut self.root, rule.pattern.segments(), &rule.id);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Every rule whose pattern matches `name`, in unspecified order.
    ///
    /// Empty names and names with an empty segment match nothing.
    pub fn matched(&self, name: &str) -> Vec<Arc<Rule>> {
        let mut frontier: Vec<&Node> = vec![&self.root];
        let mut next: Vec<&Node> = Vec::new();

        for part in name.split(SEPARATOR) {
            if part.is_empty() {
                return Vec::new();
            }
            for node in frontier.drain(..) {
                if let Some(child) = node.literals.get(part) {
                    next.push(child);
                }
                if let Some(child) = node.wildcard.as_deref() {
                    next.push(child);
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            std::mem::swap(&mut frontier, &mut next);
        }

        frontier
            .iter()
            .flat_map(|node| node.rules.iter().cloned())
            .collect()
    }

    /// All registered rules, in unspecified order.
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }
}

impl FromIterator<Arc<Rule>> for PatternTrie {
    fn from_iter<I: IntoIterator<Item = Arc<Rule>>>(iter: I) -> Self {
        let mut trie = PatternTrie::new();
        for rule in iter {
            trie.insert(rule);
        }
        trie
    }
}

fn remove_from(node: &mut Node, segments: &[Segment], id: &str) -> Option<Arc<Rule>> {
    match segments.split_first() {
        None => {
            let pos = node.rules.iter().position(|r| r.id == id)?;
            Some(node.rules.remove(pos))
        }
        Some((Segment::Literal(lit), rest)) => {
            let child = node.literals.get_mut(lit.as_str())?;
            let removed = remove_from(child, rest, id);
            if removed.is_some() && child.is_empty() {
                node.literals.remove(lit.as_str());
            }
            removed
        }
        Some((Segment::Wildcard, rest)) => {
            let child = node.wildcard.as_deref_mut()?;
            let removed = remove_from(child, rest, id);
            if removed.is_some() && child.is_empty() {
                node.wildcard = None;
            }
            removed
        }
    }
}

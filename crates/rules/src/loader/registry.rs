//! In-memory rule documents and their publication to the filter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use vigil_core::Rule;
use vigil_filter::Filter;

use crate::schema::MetricRule;

struct Entry {
    /// File the document was read from (or written to).
    path: PathBuf,
    doc: MetricRule,
}

/// Documents keyed by rule id, shared between the loader and its watcher.
///
/// Every mutation republishes the filter while the write lock is held, so
/// publications happen in the same order as the mutations.
pub(super) struct Registry {
    filter: Arc<Filter>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    pub(super) fn new(filter: Arc<Filter>) -> Self {
        Self {
            filter,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(super) fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }

    /// Drop everything and take `docs` as the new rule set.
    pub(super) fn replace(&self, docs: Vec<(PathBuf, MetricRule)>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        for (path, doc) in docs {
            insert(&mut entries, path, doc);
        }
        publish(&self.filter, &entries);
    }

    /// Insert or replace the document read from `path`.
    pub(super) fn upsert(&self, path: PathBuf, doc: MetricRule) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // The file may have carried another id before this edit.
        entries.retain(|id, e| e.path != path || id == doc.id());
        insert(&mut entries, path, doc);
        publish(&self.filter, &entries);
    }

    /// Forget the document that came from `path`, if any.
    pub(super) fn remove_path(&self, path: &Path) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let id = entries
            .iter()
            .find(|(_, e)| e.path == path)
            .map(|(id, _)| id.clone())?;
        entries.remove(&id);
        publish(&self.filter, &entries);
        Some(id)
    }

    pub(super) fn remove_id(&self, id: &str) -> Option<MetricRule> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(id)?;
        publish(&self.filter, &entries);
        Some(removed.doc)
    }

    pub(super) fn path_of(&self, id: &str) -> Option<PathBuf> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).map(|e| e.path.clone())
    }

    pub(super) fn get(&self, id: &str) -> Option<MetricRule> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).map(|e| e.doc.clone())
    }

    pub(super) fn documents(&self) -> Vec<MetricRule> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut docs: Vec<MetricRule> = entries.values().map(|e| e.doc.clone()).collect();
        docs.sort_by(|a, b| a.id().cmp(b.id()));
        docs
    }
}

fn insert(entries: &mut HashMap<String, Entry>, path: PathBuf, doc: MetricRule) {
    let id = doc.id().to_string();
    if let Some(prev) = entries.get(&id) {
        if prev.path != path {
            warn!(
                rule_id = %id,
                previous = %prev.path.display(),
                path = %path.display(),
                "duplicate rule id, later file wins"
            );
        }
    }
    entries.insert(id, Entry { path, doc });
}

/// Rebuild the filter from every enabled document.
fn publish(filter: &Filter, entries: &HashMap<String, Entry>) {
    let mut rules: Vec<Rule> = Vec::with_capacity(entries.len());
    for entry in entries.values().filter(|e| e.doc.is_enabled()) {
        match entry.doc.compile() {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!(rule_id = %entry.doc.id(), error = %e, "skipping rule that does not compile"),
        }
    }
    debug!(documents = entries.len(), enabled = rules.len(), "publishing rules");
    filter.rebuild(rules);
}

//! Core [`RuleLoader`] struct: filesystem-backed rule loading with optional hot-reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use vigil_core::util::is_file_exist;
use vigil_filter::Filter;

use crate::schema::MetricRule;

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::registry::Registry;
use super::watcher::handle_fs_event;

/// Filesystem-backed rule loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, parses
/// them into [`MetricRule`] documents, and republishes the shared
/// [`Filter`] with every enabled rule whenever the set changes.
pub struct RuleLoader {
    /// Root directory containing rule YAML files.
    rules_dir: PathBuf,
    registry: Arc<Registry>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    /// Create a loader for `rules_dir` that publishes into `filter`.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf, filter: Arc<Filter>) -> Self {
        if !is_file_exist(&rules_dir) {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            registry: Arc::new(Registry::new(filter)),
            _watcher: None,
        }
    }

    /// Recursively scan the rules directory and replace the loaded rule set.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse and validation errors
    /// are reported per file and do not abort the scan. The filter is
    /// rebuilt once at the end.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let mut docs = Vec::new();
        scan_dir_recursive(&self.rules_dir, &mut docs, &mut results)?;

        let loaded = docs.len();
        self.registry.replace(docs);
        info!(
            path = %self.rules_dir.display(),
            loaded,
            published = self.registry.filter().len(),
            "loaded rules"
        );
        Ok(results)
    }

    /// Parse and validate a single rule file without registering it.
    pub fn load_file(&self, path: &Path) -> Result<MetricRule> {
        read_rule(path)
    }

    /// Start a filesystem watcher.
    ///
    /// On file create/modify/rename the rule is re-parsed and upserted.
    /// On file delete the rule is removed. Parse errors are logged as
    /// warnings and the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let registry = Arc::clone(&self.registry);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &registry),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;

        let _ = watcher.configure(
            notify::Config::default().with_poll_interval(Duration::from_millis(500)),
        );

        info!(path = %self.rules_dir.display(), "watching rules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// The filter this loader publishes into.
    pub fn filter(&self) -> &Arc<Filter> {
        self.registry.filter()
    }

    /// Every loaded document, enabled or not, sorted by id.
    pub fn documents(&self) -> Vec<MetricRule> {
        self.registry.documents()
    }

    pub fn get(&self, id: &str) -> Option<MetricRule> {
        self.registry.get(id)
    }

    /// Atomically write a rule document to `<rules_dir>/<id>.yml` and publish it.
    ///
    /// The document must compile. Writes to a `.tmp` dotfile first, then
    /// renames it into place.
    pub fn write_document(&self, doc: &MetricRule) -> Result<PathBuf> {
        doc.compile()?;

        let id = doc.id();
        let final_path = self.rules_dir.join(format!("{}.yml", id));
        let tmp_path = self.rules_dir.join(format!(".{}.tmp", id));

        let yaml = doc.to_yaml()?;
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(rule_id = %id, path = %final_path.display(), "wrote rule file");

        self.registry.upsert(final_path.clone(), doc.clone());
        Ok(final_path)
    }

    /// Delete a rule's file and unpublish it.
    ///
    /// Uses the file the rule was loaded from, falling back to
    /// `<id>.yml` / `<id>.yaml` in the rules directory.
    pub fn delete_rule(&self, id: &str) -> Result<()> {
        let candidates = [
            self.registry.path_of(id),
            Some(self.rules_dir.join(format!("{}.yml", id))),
            Some(self.rules_dir.join(format!("{}.yaml", id))),
        ];
        let Some(path) = candidates.into_iter().flatten().find(|p| p.is_file()) else {
            return Err(RuleError::Validation(format!(
                "no rule file found for id '{}'",
                id
            )));
        };

        fs::remove_file(&path)?;
        self.registry.remove_id(id);

        info!(rule_id = %id, path = %path.display(), "deleted rule");
        Ok(())
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Read, parse, validate, and compile-check one rule file.
pub(super) fn read_rule(path: &Path) -> Result<MetricRule> {
    let contents = fs::read_to_string(path)?;
    let doc = MetricRule::from_yaml(&contents)?;
    doc.compile()?;
    Ok(doc)
}

fn scan_dir_recursive(
    dir: &Path,
    docs: &mut Vec<(PathBuf, MetricRule)>,
    results: &mut Vec<LoadResult>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory");
            return Ok(());
        }
    };

    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    // Stable order so "later file wins" means something.
    paths.sort();

    for path in paths {
        if is_dotfile(&path) {
            if path.is_file() {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "dotfile".to_string(),
                    },
                });
            }
            continue;
        }

        if path.is_dir() {
            scan_dir_recursive(&path, docs, results)?;
            continue;
        }

        if !is_yaml(&path) {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped {
                    reason: "not a YAML file".to_string(),
                },
            });
            continue;
        }

        match read_rule(&path) {
            Ok(doc) => {
                let rule_id = doc.id().to_string();
                info!(rule_id = %rule_id, pattern = %doc.spec.pattern, path = %path.display(), "loaded rule");
                docs.push((path.clone(), doc));
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Loaded { rule_id },
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load rule file");
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Failed {
                        error: e.to_string(),
                    },
                });
            }
        }
    }

    Ok(())
}

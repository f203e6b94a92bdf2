//! Filesystem event handler for the notify watcher (hot-reload).

use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{is_dotfile, is_yaml, read_rule};
use super::registry::Registry;

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, registry: &Registry) {
    for path in &event.paths {
        // Dotfiles include our own .tmp files.
        if !is_yaml(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            // A rename reports the old name as a modify too; it no longer exists.
            EventKind::Create(_) | EventKind::Modify(_) if path.is_file() => {
                match read_rule(path) {
                    Ok(doc) => {
                        info!(rule_id = %doc.id(), path = %path.display(), "hot-reloaded rule");
                        registry.upsert(path.clone(), doc);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to load rule during hot-reload, keeping previous version"
                        );
                    }
                }
            }
            EventKind::Modify(_) | EventKind::Remove(_) => {
                if let Some(rule_id) = registry.remove_path(path) {
                    info!(rule_id = %rule_id, path = %path.display(), "removed rule after file deletion");
                }
            }
            _ => {}
        }
    }
}

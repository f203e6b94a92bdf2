//! Persistence boundary for per-(metric, rule) statistics.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use vigil_core::State;

/// Errors surfaced by a [`StateStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("state store lock poisoned")]
    Poisoned,

    /// State could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Identity of one baseline: a metric name under one rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub metric: String,
    pub rule_id: String,
}

impl StateKey {
    pub fn new(metric: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            rule_id: rule_id.into(),
        }
    }

    /// Flat string form, `<rule_id>:<metric>`, for key-value backends.
    ///
    /// Unambiguous as long as the rule id holds no `:`; rule files reject
    /// such ids. Metric names may contain `:`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.rule_id, self.metric)
    }

    /// Inverse of [`encode`](StateKey::encode): splits at the first `:`.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (rule_id, metric) = encoded.split_once(':')?;
        Some(Self::new(metric, rule_id))
    }
}

/// Where states live between samples.
///
/// `load` returning `None` means "never seen"; the cursor then bootstraps a
/// fresh baseline.
pub trait StateStore: Send + Sync {
    fn load(&self, key: &StateKey) -> Result<Option<State>, StoreError>;

    fn save(&self, key: &StateKey, state: State) -> Result<(), StoreError>;

    /// Drop every state whose rule id fails `keep`. Returns how many went.
    fn retain_rules(&self, keep: &dyn Fn(&str) -> bool) -> Result<usize, StoreError>;
}

/// In-process store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<StateKey, State>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every state kept for `rule_id`.
    pub fn remove_rule(&self, rule_id: &str) -> Result<usize, StoreError> {
        self.retain_rules(&|id: &str| id != rule_id)
    }

    /// Dump all states as JSON, keyed by [`StateKey::encode`].
    pub fn to_json(&self) -> Result<String, StoreError> {
        let guard = self.states.read().map_err(|_| StoreError::Poisoned)?;
        let flat: HashMap<String, &State> = guard.iter().map(|(k, v)| (k.encode(), v)).collect();
        Ok(serde_json::to_string(&flat)?)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &StateKey) -> Result<Option<State>, StoreError> {
        let guard = self.states.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(key).copied())
    }

    fn save(&self, key: &StateKey, state: State) -> Result<(), StoreError> {
        let mut guard = self.states.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert(key.clone(), state);
        Ok(())
    }

    fn retain_rules(&self, keep: &dyn Fn(&str) -> bool) -> Result<usize, StoreError> {
        let mut guard = self.states.write().map_err(|_| StoreError::Poisoned)?;
        let before = guard.len();
        guard.retain(|key, _| keep(&key.rule_id));
        Ok(before - guard.len())
    }
}

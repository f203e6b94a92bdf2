//! [`Pipeline`]: rule selection, state round-trip, and scoring per sample.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use vigil_core::util::to_fixed;
use vigil_core::Metric;
use vigil_filter::{Filter, PatternTrie};

use crate::cursor::Cursor;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::store::{StateKey, StateStore, StoreError};

/// One sample scored under one rule.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub rule_id: String,
    pub pattern: String,
    /// A private copy of the incoming sample, annotated by the cursor.
    pub metric: Metric,
}

/// Glues a [`Filter`], a [`Cursor`], and a [`StateStore`] together.
///
/// The filter is shared so a rule loader can republish it while the
/// pipeline runs.
pub struct Pipeline<S> {
    filter: Arc<Filter>,
    cursor: Cursor,
    store: S,
    stats: PipelineStats,
    /// Rule set the store was last pruned against.
    pruned_for: Mutex<Option<Arc<PatternTrie>>>,
}

impl<S: StateStore> Pipeline<S> {
    pub fn new(filter: Arc<Filter>, cursor: Cursor, store: S) -> Self {
        Self {
            filter,
            cursor,
            store,
            stats: PipelineStats::default(),
            pruned_for: Mutex::new(None),
        }
    }

    pub fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Score `metric` under every matching rule.
    ///
    /// Each rule gets its own copy of the sample; for each one the stored
    /// state is loaded, advanced by the cursor, and saved back. Samples with
    /// a non-finite value are dropped.
    ///
    /// Concurrent calls for the same metric name race on the same states;
    /// use [`process_batch`](Pipeline::process_batch) or shard by name.
    pub fn process(&self, metric: &Metric) -> Result<Vec<Detection>, StoreError> {
        self.stats.record_received();

        if !metric.value.is_finite() {
            self.stats.record_rejected();
            warn!(metric = %metric.name, value = metric.value, "dropping non-finite sample");
            return Ok(Vec::new());
        }

        let rules = self.filter.matched_rules(&metric.name);
        if rules.is_empty() {
            self.stats.record_unmatched();
            trace!(metric = %metric.name, "no rule matched");
            return Ok(Vec::new());
        }

        let mut detections = Vec::with_capacity(rules.len());
        for rule in rules {
            let key = StateKey::new(metric.name.as_str(), rule.id.as_str());
            let prev = self.store.load(&key)?;

            let mut sample = metric.clone();
            let next = self.cursor.next(prev.as_ref(), &mut sample);
            self.store.save(&key, next)?;

            let anomalous = sample.is_anomalous();
            self.stats.record_detection(anomalous);
            if anomalous {
                debug!(
                    metric = %sample.name,
                    rule_id = %rule.id,
                    score = %to_fixed(sample.score, 3),
                    trend = %sample.trend,
                    "anomaly detected"
                );
            }

            detections.push(Detection {
                rule_id: rule.id.clone(),
                pattern: rule.pattern.to_string(),
                metric: sample,
            });
        }

        Ok(detections)
    }

    /// Score a batch in parallel.
    ///
    /// Samples are grouped by metric name; groups run on the rayon pool,
    /// and each group is processed in arrival order by a single task, so
    /// every (metric, rule) state has one writer.
    pub fn process_batch(&self, metrics: Vec<Metric>) -> Result<Vec<Detection>, StoreError> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<Metric>> = Vec::new();
        for metric in metrics {
            let slot = *slots.entry(metric.name.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(metric);
        }

        let per_group = groups
            .into_par_iter()
            .map(|group| -> Result<Vec<Detection>, StoreError> {
                let mut out = Vec::new();
                for metric in &group {
                    out.extend(self.process(metric)?);
                }
                Ok(out)
            })
            .collect::<Result<Vec<Vec<Detection>>, StoreError>>()?;

        Ok(per_group.into_iter().flatten().collect())
    }

    /// Drop stored states of rules that are no longer published.
    ///
    /// Cheap when the filter has not been republished since the last call.
    /// Returns how many states were dropped.
    pub fn prune_states(&self) -> Result<usize, StoreError> {
        let snapshot = self.filter.snapshot();
        let mut pruned_for = self.pruned_for.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = pruned_for.as_ref() {
            if Arc::ptr_eq(last, &snapshot) {
                return Ok(0);
            }
        }

        let live: HashSet<String> = snapshot.rules().iter().map(|r| r.id.clone()).collect();
        let dropped = self.store.retain_rules(&|id: &str| live.contains(id))?;
        *pruned_for = Some(snapshot);

        if dropped > 0 {
            debug!(dropped, rules = live.len(), "pruned states of unpublished rules");
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use vigil_core::Rule;

    fn pipeline(patterns: &[&str]) -> Pipeline<MemoryStateStore> {
        let filter = Filter::with_rules(patterns.iter().map(|p| Rule::new(p).unwrap()));
        Pipeline::new(
            Arc::new(filter),
            Cursor::new(0.05, 18).unwrap(),
            MemoryStateStore::new(),
        )
    }

    #[test]
    fn unmatched_sample_touches_nothing() {
        let p = pipeline(&["a.*"]);
        let out = p.process(&Metric::new("b.c", 1.0)).unwrap();
        assert!(out.is_empty());
        assert!(p.store().is_empty());
        assert_eq!(p.stats().unmatched, 1);
    }

    #[test]
    fn each_rule_gets_its_own_state_and_copy() {
        let p = pipeline(&["a.*", "*.b"]);
        let out = p.process(&Metric::new("a.b", 4.0)).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(p.store().len(), 2);
        assert_ne!(out[0].rule_id, out[1].rule_id);
        for d in &out {
            assert_eq!(d.metric.average, 4.0);
            assert_eq!(d.metric.score, 0.0);
        }
    }

    #[test]
    fn state_advances_between_calls() {
        let p = pipeline(&["x"]);
        let rule_id = p.filter().rules()[0].id.clone();
        let key = StateKey::new("x", rule_id);

        p.process(&Metric::new("x", 10.0)).unwrap();
        p.process(&Metric::new("x", 20.0)).unwrap();

        let state = p.store().load(&key).unwrap().unwrap();
        assert_eq!(state.count, 2);
        assert!((state.average - 10.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let p = pipeline(&["x"]);
        assert!(p.process(&Metric::new("x", f64::NAN)).unwrap().is_empty());
        assert!(p.process(&Metric::new("x", f64::INFINITY)).unwrap().is_empty());
        assert!(p.store().is_empty());

        let stats = p.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn prune_drops_states_of_removed_rules() {
        let filter = Arc::new(Filter::with_rules([
            Rule::with_id("keep", "a.*").unwrap(),
            Rule::with_id("gone", "*.b").unwrap(),
        ]));
        let p = Pipeline::new(
            Arc::clone(&filter),
            Cursor::new(0.05, 18).unwrap(),
            MemoryStateStore::new(),
        );
        p.process(&Metric::new("a.b", 1.0)).unwrap();
        assert_eq!(p.store().len(), 2);
        assert_eq!(p.prune_states().unwrap(), 0);

        filter.remove_rule("gone");
        assert_eq!(p.prune_states().unwrap(), 1);
        assert!(p.store().load(&StateKey::new("a.b", "gone")).unwrap().is_none());
        assert!(p.store().load(&StateKey::new("a.b", "keep")).unwrap().is_some());

        // A rule re-created under the same id starts over.
        filter.add_rule(Rule::with_id("gone", "*.b").unwrap());
        let out = p.process(&Metric::new("a.b", 9.0)).unwrap();
        let fresh = out.iter().find(|d| d.rule_id == "gone").unwrap();
        assert_eq!(fresh.metric.average, 9.0);
    }

    #[test]
    fn batch_preserves_order_within_a_name() {
        let p = pipeline(&["m.*"]);
        let batch = vec![
            Metric::new("m.a", 1.0),
            Metric::new("m.b", 100.0),
            Metric::new("m.a", 3.0),
            Metric::new("m.b", 300.0),
        ];

        let out = p.process_batch(batch).unwrap();
        assert_eq!(out.len(), 4);

        let a: Vec<f64> = out
            .iter()
            .filter(|d| d.metric.name == "m.a")
            .map(|d| d.metric.value)
            .collect();
        assert_eq!(a, vec![1.0, 3.0]);

        let rule_id = p.filter().rules()[0].id.clone();
        let state = p.store().load(&StateKey::new("m.a", rule_id)).unwrap().unwrap();
        assert_eq!(state.count, 2);
        assert!((state.average - 1.1).abs() < 1e-12);
    }
}

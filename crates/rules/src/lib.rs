//! YAML metric rules and the filesystem loader that feeds the [`Filter`].
//!
//! This crate provides:
//! - `MetricRule` documents (`apiVersion` / `kind` / `metadata` / `spec`)
//! - A recursive directory loader with hot-reload via a `notify` watcher
//! - Atomic rule file writes and deletes
//!
//! Every accepted change republishes the shared filter with the enabled rules.
//!
//! [`Filter`]: vigil_filter::Filter

pub mod loader;
pub mod schema;

pub use loader::{LoadResult, LoadStatus, RuleError, RuleLoader};
pub use schema::{MetricRule, MetricRuleSpec, RuleMetadata};

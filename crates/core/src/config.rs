use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub detector: DetectorConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VIGIL_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VIGIL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            detector: DetectorConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  detector:  weight_factor={}, least_count={}, sigma={}",
            self.detector.weight_factor,
            self.detector.least_count,
            self.detector.sigma
        );
        tracing::info!(
            "  worker:    rules_dir={}, batch_size={}, watch_rules={}, flush_interval_ms={}",
            self.worker.rules_dir.display(),
            self.worker.batch_size,
            self.worker.watch_rules,
            self.worker.flush_interval_ms
        );
    }

    /// JSON view of the active configuration.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "detector": {
                "weight_factor": self.detector.weight_factor,
                "least_count": self.detector.least_count,
                "sigma": self.detector.sigma,
            },
            "worker": {
                "rules_dir": self.worker.rules_dir,
                "batch_size": self.worker.batch_size,
                "watch_rules": self.worker.watch_rules,
                "flush_interval_ms": self.worker.flush_interval_ms,
            },
        })
    }
}

// ── Detector ──────────────────────────────────────────────────

/// Cursor parameters. Range checks happen when the cursor is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Weight of each new sample in the moving mean/variance, in (0, 1].
    pub weight_factor: f64,
    /// Samples required before scoring starts.
    pub least_count: u32,
    /// Anomaly threshold and clipping bound, in standard deviations.
    pub sigma: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            weight_factor: 0.05,
            least_count: 18,
            sigma: 3.0,
        }
    }
}

impl DetectorConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            weight_factor: profiled_env_parse(p, "DETECTOR_WEIGHT_FACTOR", d.weight_factor),
            least_count: profiled_env_parse(p, "DETECTOR_LEAST_COUNT", d.least_count),
            sigma: profiled_env_parse(p, "DETECTOR_SIGMA", d.sigma),
        }
    }
}

// ── Worker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory holding `MetricRule` YAML files.
    pub rules_dir: PathBuf,
    /// Samples handed to the pipeline per batch.
    pub batch_size: usize,
    /// Hot-reload rules when files change.
    pub watch_rules: bool,
    /// A partial batch is flushed after this long without filling up.
    pub flush_interval_ms: u64,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            batch_size: profiled_env_parse(p, "WORKER_BATCH_SIZE", 256usize).max(1),
            watch_rules: profiled_env_bool(p, "RULES_WATCH", true),
            flush_interval_ms: profiled_env_parse(p, "WORKER_FLUSH_INTERVAL_MS", 1000u64).max(1),
        }
    }
}

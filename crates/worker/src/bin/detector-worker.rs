//! detector-worker: streaming anomaly detection over stdin.
//!
//! Reads `<name> <stamp> <value>` lines from stdin, scores every sample
//! against the rules in the rules directory, and writes each anomalous
//! detection to stdout as one JSON line. Logs go to stderr.
//!
//! Rule files are hot-reloaded unless `--no-watch` is given.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{debug, info, warn};

use vigil_core::config::{self, Config};
use vigil_core::Metric;
use vigil_detector::{Cursor, MemoryStateStore, Pipeline};
use vigil_filter::Filter;
use vigil_rules::{LoadStatus, RuleLoader};
use vigil_worker::{parse_line, render_anomalies};

// ── CLI ─────────────────────────────────────────────────────────────

/// Streaming metric anomaly detector.
#[derive(Parser, Debug)]
#[command(name = "detector-worker", version, about)]
struct Cli {
    /// Directory of MetricRule YAML files (defaults to the configured RULES_DIR).
    #[arg(long, env = "RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// Samples per batch (defaults to the configured WORKER_BATCH_SIZE).
    #[arg(long, env = "WORKER_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Do not watch the rules directory for changes.
    #[arg(long)]
    no_watch: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

type DetectorPipeline = Pipeline<MemoryStateStore>;

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.rules_dir {
        config.worker.rules_dir = dir;
    }
    if let Some(size) = cli.batch_size {
        config.worker.batch_size = size.max(1);
    }
    if cli.no_watch {
        config.worker.watch_rules = false;
    }

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config.summary())?);
        return Ok(());
    }
    config.log_summary();

    let cursor = Cursor::from_config(&config.detector)?;
    let filter = Arc::new(Filter::new());

    let mut loader = RuleLoader::new(config.worker.rules_dir.clone(), Arc::clone(&filter));
    let results = loader.load_all()?;
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();
    if failed > 0 {
        warn!(failed, "some rule files could not be loaded");
    }
    if filter.is_empty() {
        warn!(path = %loader.rules_dir().display(), "no enabled rules, every sample will be unmatched");
    }
    if config.worker.watch_rules {
        loader.watch()?;
    }

    let pipeline = Arc::new(Pipeline::new(filter, cursor, MemoryStateStore::new()));
    let malformed = run(&pipeline, &config).await?;

    let stats = pipeline.stats();
    info!(
        received = stats.received,
        rejected = stats.rejected,
        malformed,
        unmatched = stats.unmatched,
        detections = stats.detections,
        anomalies = stats.anomalies,
        states = pipeline.store().len(),
        "detector-worker exited cleanly"
    );
    Ok(())
}

/// Read stdin until EOF or Ctrl-C. Returns the number of unparsable lines.
async fn run(pipeline: &Arc<DetectorPipeline>, config: &Config) -> anyhow::Result<u64> {
    let batch_size = config.worker.batch_size;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut batch: Vec<Metric> = Vec::with_capacity(batch_size);
    let mut malformed = 0u64;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.worker.flush_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(batch_size, "reading samples from stdin");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(metric) => batch.push(metric),
                    Err(e) => {
                        malformed += 1;
                        warn!(error = %e, "skipping line");
                    }
                }
                if batch.len() >= batch_size {
                    flush(pipeline, &mut batch, &mut stdout).await?;
                }
            }
            _ = ticker.tick() => {
                flush(pipeline, &mut batch, &mut stdout).await?;
                let dropped = pipeline.prune_states()?;
                if dropped > 0 {
                    debug!(dropped, states = pipeline.store().len(), "states pruned");
                }
            }
            _ = &mut shutdown => {
                info!("interrupted, flushing pending samples");
                break;
            }
        }
    }

    flush(pipeline, &mut batch, &mut stdout).await?;
    Ok(malformed)
}

/// Score the pending batch on the blocking pool and emit its anomalies.
async fn flush(
    pipeline: &Arc<DetectorPipeline>,
    batch: &mut Vec<Metric>,
    stdout: &mut Stdout,
) -> anyhow::Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let metrics = std::mem::take(batch);
    let pipeline = Arc::clone(pipeline);
    let detections = tokio::task::spawn_blocking(move || pipeline.process_batch(metrics)).await??;

    let rendered = render_anomalies(&detections)?;
    if !rendered.is_empty() {
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

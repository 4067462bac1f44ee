//! ObjectIO Write-Back Cache Bench
//!
//! Drives a `WriteBackCache` from several worker threads against a simulated
//! backing store with configurable write latency and failure rate, the way a
//! file gateway would: stat-style lookups with negative caching, writes that
//! dirty entries, and prefix listings over the ordered view.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use objectio_wbcache::{CacheConfig, CacheEntry, CacheError, Evictor, PersistError, WriteBackCache};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "objectio-wbcache-bench",
    about = "Soak test for the ObjectIO write-back cache"
)]
struct Args {
    /// Worker threads
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Operations per worker
    #[arg(long, default_value_t = 100_000)]
    ops: u64,

    /// Distinct directories in the key space
    #[arg(long, default_value_t = 64)]
    dirs: u32,

    /// Files per directory
    #[arg(long, default_value_t = 256)]
    files: u32,

    /// Maximum cached entries
    #[arg(long, default_value_t = 4096)]
    max_size: usize,

    /// Expire entries not accessed for this many milliseconds
    #[arg(long, default_value_t = 2000)]
    eviction_interval_ms: u64,

    /// Stripe lock count
    #[arg(long, default_value_t = objectio_wbcache::DEFAULT_STRIPES)]
    stripes: usize,

    /// Scavenger cadence in milliseconds
    #[arg(long, default_value_t = 1000)]
    scavenge_interval_ms: u64,

    /// Simulated backend write latency in microseconds
    #[arg(long, default_value_t = 200)]
    write_latency_us: u64,

    /// Probability that a backend write fails (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Fraction of operations that are reads (0.0 - 1.0)
    #[arg(long, default_value_t = 0.7)]
    read_ratio: f64,

    /// One in this many operations is a directory listing
    #[arg(long, default_value_t = 100)]
    list_every: u64,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace / debug / info / warn / error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ── Simulated backend ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BackendCounters {
    writes: AtomicU64,
    failures: AtomicU64,
}

/// Stand-in for the object store client behind a file gateway
struct SlowBackend {
    latency: Duration,
    failure_rate: f64,
    counters: Arc<BackendCounters>,
}

impl Evictor<String, Vec<u8>> for SlowBackend {
    fn flush(&self, key: &String, entry: &CacheEntry<Vec<u8>>) -> Result<(), PersistError> {
        thread::sleep(self.latency);
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            return Err(PersistError::unavailable(format!(
                "simulated OSD timeout writing {key} ({} bytes)",
                entry.value.len()
            )));
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── Workers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WorkerReport {
    reads: u64,
    writes: u64,
    listings: u64,
    listed_entries: u64,
    async_errors: u64,
}

fn run_worker(cache: &WriteBackCache<String, Vec<u8>>, args: &Args) -> WorkerReport {
    let mut rng = rand::thread_rng();
    let mut report = WorkerReport::default();

    for op in 0..args.ops {
        let dir = rng.gen_range(0..args.dirs);
        let file = rng.gen_range(0..args.files);
        let key = format!("vol/dir{dir:04}/file{file:05}");

        let result = if args.list_every > 0 && op % args.list_every == 0 {
            let from = format!("vol/dir{dir:04}/");
            let to = format!("vol/dir{dir:04}0");
            cache.lock(&from, |view| view.sub_map(&from, &to).len()).map(|n| {
                report.listings += 1;
                report.listed_entries += n as u64;
            })
        } else if rng.gen_bool(args.read_ratio) {
            // Odd files "exist" in the backend, even ones are cached as missing
            let exists = file % 2 == 1;
            cache
                .lock(&key, |view| {
                    if view.get(&key).is_none() {
                        if exists {
                            view.insert_clean(key.clone(), vec![0u8; 64]);
                        } else {
                            view.insert_missing(key.clone());
                        }
                    }
                })
                .map(|()| report.reads += 1)
        } else {
            let payload = vec![(op % 251) as u8; 64];
            cache
                .lock(&key, |view| {
                    view.put(key.clone(), payload);
                })
                .map(|()| report.writes += 1)
        };

        if let Err(e) = result {
            report.async_errors += 1;
            warn!("{e}");
        }
    }

    report
}

const FLUSH_ATTEMPTS: u32 = 10;

/// Flush until clean, retrying past transient backend failures
fn final_flush(cache: &WriteBackCache<String, Vec<u8>>) -> Result<usize> {
    for attempt in 1..=FLUSH_ATTEMPTS {
        match cache.flush() {
            Ok(flushed) => return Ok(flushed),
            Err(e @ (CacheError::Flush { .. } | CacheError::AsyncFlush { .. })) => {
                warn!(attempt, "Final flush interrupted: {e}");
            }
            Err(e) => return Err(e).context("final flush"),
        }
    }
    bail!("cache still dirty after {FLUSH_ATTEMPTS} flush attempts")
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if !(0.0..=1.0).contains(&args.failure_rate) || !(0.0..=1.0).contains(&args.read_ratio) {
        bail!("--failure-rate and --read-ratio must be within 0.0..=1.0");
    }

    info!("Starting ObjectIO write-back cache bench");

    let counters = Arc::new(BackendCounters::default());
    let backend = SlowBackend {
        latency: Duration::from_micros(args.write_latency_us),
        failure_rate: args.failure_rate,
        counters: Arc::clone(&counters),
    };

    let config = CacheConfig::new(
        "bench",
        args.max_size,
        Duration::from_millis(args.eviction_interval_ms),
    )
    .with_stripes(args.stripes)
    .with_scavenge_interval(Duration::from_millis(args.scavenge_interval_ms));

    let cache = Arc::new(
        WriteBackCache::with_config(backend, config).context("build cache")?,
    );
    cache.start().context("start scavenger")?;

    let args = Arc::new(args);
    let started = Instant::now();

    let workers: Vec<_> = (0..args.threads)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let args = Arc::clone(&args);
            thread::Builder::new()
                .name(format!("bench-worker-{i}"))
                .spawn(move || run_worker(&cache, &args))
                .context("spawn worker")
        })
        .collect::<Result<_>>()?;

    let mut totals = WorkerReport::default();
    for worker in workers {
        let report = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))?;
        totals.reads += report.reads;
        totals.writes += report.writes;
        totals.listings += report.listings;
        totals.listed_entries += report.listed_entries;
        totals.async_errors += report.async_errors;
    }
    let elapsed = started.elapsed();

    cache.stop();
    let final_flushed = final_flush(&cache)?;

    let total_ops = totals.reads + totals.writes + totals.listings;
    let stats = cache.stats().snapshot();

    if args.json {
        let report = serde_json::json!({
            "elapsed_ms": elapsed.as_millis() as u64,
            "ops": total_ops,
            "ops_per_sec": total_ops as f64 / elapsed.as_secs_f64(),
            "reads": totals.reads,
            "writes": totals.writes,
            "listings": totals.listings,
            "listed_entries": totals.listed_entries,
            "async_errors": totals.async_errors,
            "final_flushed": final_flushed,
            "backend_writes": counters.writes.load(Ordering::Relaxed),
            "backend_failures": counters.failures.load(Ordering::Relaxed),
            "cache": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            ops = total_ops,
            elapsed = ?elapsed,
            ops_per_sec = format!("{:.0}", total_ops as f64 / elapsed.as_secs_f64()),
            "Bench finished"
        );
        info!(
            reads = totals.reads,
            writes = totals.writes,
            listings = totals.listings,
            async_errors = totals.async_errors,
            "Workload"
        );
        info!(
            hit_ratio = format!("{:.3}", stats.hit_ratio),
            evictions = stats.evictions,
            writebacks = stats.writebacks,
            flush_failures = stats.flush_failures,
            dropped_errors = stats.dropped_errors,
            final_flushed,
            "Cache"
        );
    }

    Ok(())
}

//! blocksim - disk-access layer simulator
//!
//! Runs synthetic file workloads through the request queue, disk scheduler,
//! buffer cache and block store, and reports seek and cache statistics.

mod workload;

use anyhow::{Context, Result};
use blocksim_common::{CachePolicy, SchedulingPolicy, SimConfig};
use blocksim_engine::Dispatcher;
use blocksim_storage::DiskSnapshot;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workload::{Report, Workload};

#[derive(Parser, Debug)]
#[command(name = "blocksim")]
#[command(about = "Disk scheduling and buffer cache simulator")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "blocksim.toml")]
    config: String,

    /// Log level, overrides the config file when given
    #[arg(long)]
    log_level: Option<String>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one workload under one scheduling policy
    Simulate {
        #[command(flatten)]
        opts: SimOpts,

        /// Scheduling policy (fifo, sstf, scan, cscan)
        #[arg(long)]
        policy: Option<SchedulingPolicy>,
    },
    /// Run the same workload under every scheduling policy
    Compare {
        #[command(flatten)]
        opts: SimOpts,
    },
    /// Snapshot operations
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },
}

#[derive(clap::Args, Debug)]
struct SimOpts {
    /// Number of files in the workload
    #[arg(long, default_value = "8")]
    files: usize,

    /// Largest file size in blocks
    #[arg(long, default_value = "6")]
    max_file_blocks: u64,

    /// Directory the workload files live in
    #[arg(long, default_value = "/")]
    dir: String,

    /// Device size in blocks
    #[arg(long)]
    blocks: Option<u64>,

    /// Buffer cache capacity in blocks
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Cache eviction policy (lru, fifo, lfu)
    #[arg(long)]
    cache_policy: Option<CachePolicy>,

    /// Simulated service latency per request
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Seed for every random source
    #[arg(long, env = "BLOCKSIM_SEED")]
    seed: Option<u64>,

    /// Save the occupancy snapshot here after each create and delete
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum SnapshotCommands {
    /// Show what a snapshot file contains
    Inspect {
        /// Snapshot file
        path: PathBuf,
    },
}

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    simulation: SimConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl SimOpts {
    /// Apply command line overrides on top of the file configuration
    fn apply(&self, mut config: SimConfig) -> SimConfig {
        if let Some(blocks) = self.blocks {
            config.total_blocks = blocks;
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache_capacity = capacity;
        }
        if let Some(policy) = self.cache_policy {
            config.cache_policy = policy;
        }
        if let Some(latency) = self.latency_ms {
            config.service_latency_ms = latency;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.snapshot.is_some() {
            config.snapshot_path.clone_from(&self.snapshot);
        }
        config
    }

    /// Final configuration and the workload to run against it
    ///
    /// The configuration is validated before anything is generated from it.
    /// With `pin_seed` an unseeded configuration gets a random seed so every
    /// run of the returned pair sees the same submission positions.
    fn plan(&self, config: SimConfig, pin_seed: bool) -> Result<(SimConfig, Workload)> {
        let mut config = self.apply(config);
        config.validate().context("invalid simulation configuration")?;
        if pin_seed && config.seed.is_none() {
            config.seed = Some(rand::random());
        }
        let workload = self.workload(&config);
        Ok((config, workload))
    }

    /// Workload for `config`, seeded from it when a seed is set
    fn workload(&self, config: &SimConfig) -> Workload {
        let mut rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Workload::generate(&mut rng, self.files, self.max_file_blocks, config.block_size)
    }
}

impl Args {
    /// Log filter to install; the command line wins over the config file
    fn log_level(&self, config: &Config) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone())
    }
}

fn load_config(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        return Ok(Config::default());
    }
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("parsing config file {path}"))
}

async fn run_workload(
    config: SimConfig,
    policy: SchedulingPolicy,
    workload: &Workload,
    dir: &str,
) -> Result<Report> {
    let config = SimConfig {
        scheduling_policy: policy,
        ..config
    };
    let dispatcher = Dispatcher::in_memory(config)?;
    if dir.trim_matches('/').is_empty() {
        return workload.run(&dispatcher, dir).await;
    }

    let mut parent = String::from("/");
    for name in dir.split('/').filter(|part| !part.is_empty()) {
        let handle = dispatcher.with_namespace_mut(|ns| ns.create_directory(&parent, name))??;
        parent = handle.path().to_string();
    }
    workload.run(&dispatcher, dir).await
}

fn print_report(report: &Report) {
    println!("policy:          {}", report.policy);
    println!("cache policy:    {}", report.cache_policy);
    println!(
        "requests:        {} submitted, {} served, {} failed",
        report.submitted, report.served, report.failed
    );
    println!("total seek:      {} blocks", report.total_seek);
    println!("final head:      {}", report.final_head);
    println!(
        "cache:           {} hits, {} misses, {} evictions ({:.1}% hit ratio)",
        report.cache_hits,
        report.cache_misses,
        report.cache_evictions,
        report.hit_ratio * 100.0
    );
    println!("free blocks:     {}", report.free_blocks);
}

fn inspect_snapshot(path: &Path, json: bool) -> Result<()> {
    let snapshot = DiskSnapshot::load(path)
        .with_context(|| format!("loading snapshot {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let map: String = snapshot
        .occupied
        .iter()
        .map(|&used| if used { '#' } else { '.' })
        .collect();
    println!("version:      {}", snapshot.version);
    println!("total blocks: {}", snapshot.total_blocks);
    println!("used blocks:  {}", snapshot.used_count());
    for (row, chunk) in map.as_bytes().chunks(64).enumerate() {
        println!("{:>6}  {}", row * 64, String::from_utf8_lossy(chunk));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let log_level = args.log_level(&config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(config = %args.config, "starting blocksim");

    match args.command {
        Commands::Simulate { opts, policy } => {
            let (sim, workload) = opts.plan(config.simulation, false)?;
            let policy = policy.unwrap_or(sim.scheduling_policy);

            let report = run_workload(sim, policy, &workload, &opts.dir).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Compare { opts } => {
            let (sim, workload) = opts.plan(config.simulation, true)?;

            let mut reports = Vec::with_capacity(SchedulingPolicy::ALL.len());
            for policy in SchedulingPolicy::ALL {
                reports.push(run_workload(sim.clone(), policy, &workload, &opts.dir).await?);
            }

            if args.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                println!("{:<8} {:>10} {:>8} {:>8}", "policy", "total seek", "served", "failed");
                for report in &reports {
                    println!(
                        "{:<8} {:>10} {:>8} {:>8}",
                        report.policy, report.total_seek, report.served, report.failed
                    );
                }
            }
        }
        Commands::Snapshot { action } => match action {
            SnapshotCommands::Inspect { path } => inspect_snapshot(&path, args.json)?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_sections() {
        let config: Config = toml::from_str(
            r#"
            [simulation]
            total_blocks = 256
            scheduling_policy = "c-scan"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation.total_blocks, 256);
        assert_eq!(config.simulation.scheduling_policy, SchedulingPolicy::CScan);
        assert_eq!(config.simulation.cache_capacity, 20);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "blocksim",
            "simulate",
            "--policy",
            "sstf",
            "--blocks",
            "64",
            "--cache-policy",
            "lfu",
            "--seed",
            "5",
        ])
        .unwrap();
        let Commands::Simulate { opts, policy } = args.command else {
            panic!("expected simulate");
        };
        assert_eq!(policy, Some(SchedulingPolicy::Sstf));

        let sim = opts.apply(SimConfig::default());
        assert_eq!(sim.total_blocks, 64);
        assert_eq!(sim.cache_policy, CachePolicy::Lfu);
        assert_eq!(sim.seed, Some(5));
        assert_eq!(sim.service_latency_ms, 100);
    }

    #[test]
    fn test_invalid_config_rejected_before_workload() {
        let args = Args::try_parse_from(["blocksim", "compare", "--files", "3"]).unwrap();
        let Commands::Compare { opts } = args.command else {
            panic!("expected compare");
        };

        let zero_block_size = SimConfig {
            block_size: 0,
            ..SimConfig::default()
        };
        let err = opts.plan(zero_block_size, true).unwrap_err();
        assert!(format!("{err:#}").contains("block_size"));

        let (sim, workload) = opts.plan(SimConfig::default(), true).unwrap();
        assert!(sim.seed.is_some());
        assert_eq!(workload.phases[0].len(), 3);
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let config: Config = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();

        let args = Args::try_parse_from(["blocksim", "--log-level", "warn", "compare"]).unwrap();
        assert_eq!(args.log_level(&config), "warn");

        let args = Args::try_parse_from(["blocksim", "compare"]).unwrap();
        assert_eq!(args.log_level(&config), "debug");
        assert_eq!(args.log_level(&Config::default()), "warn");
    }

    #[tokio::test]
    async fn test_workload_in_subdirectory() {
        let sim = SimConfig {
            service_latency_ms: 0,
            seed: Some(11),
            ..SimConfig::default()
        };
        let workload = Workload::generate(&mut StdRng::seed_from_u64(11), 4, 3, sim.block_size);
        let report = run_workload(sim, SchedulingPolicy::Scan, &workload, "/data/run1")
            .await
            .unwrap();
        assert_eq!(report.policy, "SCAN");
        assert_eq!(report.failed, 0);
    }
}

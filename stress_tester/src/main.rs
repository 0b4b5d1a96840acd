use std::sync::Arc;

use anyhow::{anyhow, bail};
use cfg::{Cfg, Command, Mode, StressCfg};
use clap::Parser;
use prioqueue::{
    PriorityQueue,
    stress::{StressTestConfig, run_stress_test},
};
use tracing_subscriber::EnvFilter;

pub mod cfg;
mod demo;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Cfg::parse();
    tracing::debug!(?cfg, "running configuration");

    let res = match cfg.command {
        Command::Demo => demo::run(),
        Command::Stress(stress) => run_stress(stress),
    };
    if let Err(e) = res {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run_stress(cfg: StressCfg) -> anyhow::Result<()> {
    if cfg.min_priority >= cfg.max_priority {
        bail!(
            "empty priority range {}..{}",
            cfg.min_priority,
            cfg.max_priority
        );
    }
    for (name, ratio) in [("update", cfg.update_ratio), ("remove", cfg.remove_ratio)] {
        if !(0.0..=1.0).contains(&ratio) {
            bail!("{name} ratio {ratio} is not a probability");
        }
    }
    let total_items = cfg
        .item_num
        .checked_mul(cfg.producer_num)
        .ok_or_else(|| anyhow!("Overflow while calculating the total item count"))?;
    println!("Running {total_items} items against a {}-queue", cfg.mode);

    let queue = Arc::new(match cfg.mode {
        Mode::Min => PriorityQueue::new(),
        Mode::Max => PriorityQueue::new_max(),
    });
    let config = StressTestConfig {
        num_producers: cfg.producer_num,
        num_items: cfg.item_num,
        num_consumers: cfg.consumer_num,
        drain_interval_ms: cfg.drain_interval_ms,
        drain_batch_size: cfg.drain_batch_size,
        priority_range: (cfg.min_priority, cfg.max_priority),
        update_ratio: cfg.update_ratio,
        remove_ratio: cfg.remove_ratio,
        run_duration_seconds: cfg.run_duration_seconds,
    };
    let results = run_stress_test(queue, config);
    results.print_summary();

    if results.unordered_batches() > 0 {
        bail!("{} drained batches were out of order", results.unordered_batches());
    }
    if !results.is_balanced() {
        bail!("submitted items do not add up to drained + removed + remaining");
    }
    Ok(())
}

#[derive(Debug, Clone, clap::Parser)]
#[command(about = "Exercises the prioqueue priority queue")]
pub struct Cfg {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Walk through illustrative uses of the queue.
    Demo,
    /// Run producers and consumers against one shared queue.
    Stress(StressCfg),
}

#[derive(Debug, Clone, clap::Args)]
pub struct StressCfg {
    /// Which end of the priority scale is served first: `min` or `max`, any case.
    #[arg(short, long, default_value = "min")]
    pub mode: Mode,
    /// Number of Producers that will enqueue items.
    #[arg(short, long)]
    pub producer_num: usize,
    /// Number of items each producer will enqueue during the test.
    #[arg(short, long)]
    pub item_num: usize,
    /// Number of Consumers that will drain items from the queue.
    #[arg(short, long, default_value_t = 1)]
    pub consumer_num: usize,
    /// Delay between the start of each drain interval.
    #[arg(long, default_value_t = 5)]
    pub drain_interval_ms: u64,
    /// Number of items that will be drained per batch.
    #[arg(short = 'b', long, default_value_t = 100)]
    pub drain_batch_size: usize,
    /// Chance per enqueue that a producer re-prioritises one of its items.
    #[arg(long, default_value_t = 0.0)]
    pub update_ratio: f64,
    /// Chance per enqueue that a producer removes one of its items by handle.
    #[arg(long, default_value_t = 0.05)]
    pub remove_ratio: f64,
    /// Lowest priority handed out (inclusive).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub min_priority: i64,
    /// Highest priority handed out (exclusive).
    #[arg(long, default_value_t = 1_000, allow_negative_numbers = true)]
    pub max_priority: i64,
    // Hard cap on the test's execution time
    #[arg(long, default_value_t = 10)]
    pub run_duration_seconds: u64,
}

#[derive(Debug, Clone, Copy, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[strum(ascii_case_insensitive)]
    Min,
    #[strum(ascii_case_insensitive)]
    Max,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use clap::Parser;

    use super::{Cfg, Command, Mode};

    #[test]
    fn parses_stress_args() {
        let cfg = Cfg::try_parse_from([
            "stress_tester", "stress", "-m", "max", "-p", "4", "-i", "1000", "-b", "50",
        ])
        .unwrap();

        let Command::Stress(stress) = cfg.command else {
            panic!("expected the stress subcommand");
        };
        assert!(matches!(stress.mode, Mode::Max));
        assert_eq!(stress.producer_num, 4);
        assert_eq!(stress.item_num, 1_000);
        assert_eq!(stress.drain_batch_size, 50);
        assert_eq!(stress.consumer_num, 1);
    }

    /// `--mode` goes through `FromStr`, so any casing is accepted.
    #[test]
    fn mode_flag_ignores_case() {
        let cfg = Cfg::try_parse_from(["stress_tester", "stress", "--mode", "MAX", "-p", "1", "-i", "1"])
            .unwrap();
        let Command::Stress(stress) = cfg.command else {
            panic!("expected the stress subcommand");
        };
        assert!(matches!(stress.mode, Mode::Max));

        let rejected =
            Cfg::try_parse_from(["stress_tester", "stress", "--mode", "median", "-p", "1", "-i", "1"]);
        assert!(rejected.is_err());
    }

    #[test]
    fn mode_defaults_to_min() {
        let cfg = Cfg::try_parse_from(["stress_tester", "stress", "-p", "1", "-i", "1"]).unwrap();
        let Command::Stress(stress) = cfg.command else {
            panic!("expected the stress subcommand");
        };
        assert!(matches!(stress.mode, Mode::Min));
        assert_eq!(stress.mode.to_string(), "min");
    }

    #[test]
    fn mode_from_str_ignores_case() {
        assert!(matches!(Mode::from_str("MIN"), Ok(Mode::Min)));
        assert!(matches!(Mode::from_str("Max"), Ok(Mode::Max)));
        assert!(Mode::from_str("median").is_err());
    }
}

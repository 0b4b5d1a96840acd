use rand::{Rng, rngs::ThreadRng};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Direction, Handle, PriorityQueue};

#[derive(Debug, Clone, Copy)]
pub struct StressTestConfig {
    pub num_producers: usize,
    pub num_items: usize,
    pub num_consumers: usize,
    pub drain_interval_ms: u64,
    pub drain_batch_size: usize,
    pub priority_range: (i64, i64),
    /// Chance, per enqueue, that the producer also re-prioritises one of its earlier handles.
    pub update_ratio: f64,
    /// Chance, per enqueue, that the producer also removes one of its earlier handles.
    pub remove_ratio: f64,
    pub run_duration_seconds: u64,
}

impl StressTestConfig {
    fn random_priority(&self, rng: &mut ThreadRng) -> i64 {
        rng.random_range(self.priority_range.0..self.priority_range.1)
    }
}

/// Hammers `queue` with producers (enqueue, update, remove) and consumers (batch drains).
///
/// Values are `"<uuid>:<priority at enqueue>"`. When no updates are configured
/// consumers check the ordering of each batch taken by [`PriorityQueue::drain`],
/// which is atomic.
pub fn run_stress_test(queue: Arc<PriorityQueue<String>>, config: StressTestConfig) -> TestResults {
    info!(
        producers = config.num_producers,
        items_per_producer = config.num_items,
        consumers = config.num_consumers,
        drain_interval_ms = config.drain_interval_ms,
        batch_size = config.drain_batch_size,
        "starting stress test"
    );
    let start_time = Instant::now();
    let test_end_time = start_time + Duration::from_secs(config.run_duration_seconds);
    let direction = queue.direction();
    let verify_order = config.update_ratio == 0.0;

    // -- Metrics
    let submitted_count = Arc::new(AtomicUsize::new(0));
    let updated_count = Arc::new(AtomicUsize::new(0));
    let removed_count = Arc::new(AtomicUsize::new(0));

    // region:    --- Producers
    let producers_stopped = Arc::new(AtomicUsize::new(0));
    let mut producer_handles = vec![];

    for producer_id in 1..=config.num_producers {
        let queue = Arc::clone(&queue);
        let submitted_count = Arc::clone(&submitted_count);
        let updated_count = Arc::clone(&updated_count);
        let removed_count = Arc::clone(&removed_count);
        let producers_stopped = Arc::clone(&producers_stopped);

        let handle = thread::spawn(move || {
            let mut rng = rand::rng();
            let mut own: Vec<Handle> = vec![];
            let mut local_submitted = 0;

            while Instant::now() < test_end_time && local_submitted < config.num_items {
                let priority = config.random_priority(&mut rng);
                own.push(queue.enqueue(format!("{}:{priority}", Uuid::new_v4()), priority));
                local_submitted += 1;
                submitted_count.fetch_add(1, Ordering::Relaxed);

                if rng.random_bool(config.update_ratio) {
                    let pick = rng.random_range(0..own.len());
                    queue.update_priority(&own[pick], config.random_priority(&mut rng));
                    updated_count.fetch_add(1, Ordering::Relaxed);
                }
                if !own.is_empty() && rng.random_bool(config.remove_ratio) {
                    let handle = own.swap_remove(rng.random_range(0..own.len()));
                    if queue.remove(&handle).is_some() {
                        removed_count.fetch_add(1, Ordering::Relaxed);
                    }
                }
                // Handles whose element a consumer already took are of no further use.
                own.retain(Handle::is_queued);

                thread::sleep(Duration::from_micros(rng.random_range(1..100)));
            }

            producers_stopped.fetch_add(1, Ordering::Release);
            info!(producer_id, submitted = local_submitted, "producer completed");
        });

        producer_handles.push(handle);
    }
    // endregion: --- Producers

    // region:    --- Consumers
    let (stats_tx, stats_rx) = crossbeam::channel::unbounded::<BatchStat>();
    let mut consumer_handles = vec![];

    for consumer_id in 1..=config.num_consumers {
        let queue = Arc::clone(&queue);
        let producers_stopped = Arc::clone(&producers_stopped);
        let stats_tx = stats_tx.clone();

        let consumer_handle = thread::spawn(move || {
            let mut total_drained = 0;

            loop {
                let producers_done =
                    producers_stopped.load(Ordering::Acquire) >= config.num_producers;
                let drain_start = Instant::now();
                let drained = queue.drain(config.drain_batch_size);
                let drain_duration = drain_start.elapsed();

                let batch_size = drained.len();
                total_drained += batch_size;
                if batch_size > 0 {
                    let ordered = !verify_order || batch_is_ordered(&drained, direction);
                    if !ordered {
                        warn!(consumer_id, batch_size, "drained batch out of order");
                    }
                    // The collector outlives every consumer.
                    let _ = stats_tx.send(BatchStat {
                        size: batch_size,
                        duration_micros: drain_duration.as_micros() as u64,
                        ordered,
                    });
                }

                if Instant::now() >= test_end_time || (producers_done && batch_size == 0) {
                    break;
                }
                thread::sleep(Duration::from_millis(config.drain_interval_ms));
            }
            info!(consumer_id, drained = total_drained, "consumer completed");
        });
        consumer_handles.push(consumer_handle);
    }
    drop(stats_tx);
    // endregion: --- Consumers

    for handle in producer_handles {
        handle.join().expect("Producer thread panicked");
    }
    info!("waiting for consumers");
    for handle in consumer_handles {
        handle.join().expect("Consumer thread panicked");
    }
    let batches = stats_rx
        .iter()
        .fold(BatchSummary::default(), BatchSummary::record);

    let test_duration = start_time.elapsed();
    let total_submitted = submitted_count.load(Ordering::Relaxed);
    let items_per_second = total_submitted as f64 / test_duration.as_secs_f64().max(1e-3);

    TestResults {
        test_duration,
        total_submitted,
        total_updated: updated_count.load(Ordering::Relaxed),
        total_removed: removed_count.load(Ordering::Relaxed),
        remaining: queue.size(),
        items_per_second,
        batches,
    }
}

/// Values carry their enqueue priority after the last `:`.
fn batch_is_ordered(batch: &[String], direction: Direction) -> bool {
    let priorities: Vec<i64> = batch
        .iter()
        .filter_map(|value| value.rsplit_once(':')?.1.parse().ok())
        .collect();
    priorities.windows(2).all(|w| match direction {
        Direction::Ascending => w[0] <= w[1],
        Direction::Descending => w[0] >= w[1],
    })
}

/// One non-empty drain, as reported by a consumer.
#[derive(Debug, Clone)]
pub struct BatchStat {
    size: usize,
    duration_micros: u64,
    ordered: bool,
}

/// Running aggregate over every [`BatchStat`].
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    count: usize,
    items: usize,
    smallest: Option<usize>,
    largest: usize,
    total_micros: u64,
    slowest_micros: u64,
    unordered: usize,
}

impl BatchSummary {
    fn record(mut self, stat: BatchStat) -> Self {
        self.count += 1;
        self.items += stat.size;
        self.smallest = Some(self.smallest.map_or(stat.size, |s| s.min(stat.size)));
        self.largest = self.largest.max(stat.size);
        self.total_micros += stat.duration_micros;
        self.slowest_micros = self.slowest_micros.max(stat.duration_micros);
        self.unordered += usize::from(!stat.ordered);
        self
    }

    fn mean_size(&self) -> f64 {
        self.items as f64 / self.count.max(1) as f64
    }

    fn mean_micros(&self) -> f64 {
        self.total_micros as f64 / self.count.max(1) as f64
    }
}

#[derive(Debug)]
pub struct TestResults {
    test_duration: Duration,
    total_submitted: usize,
    total_updated: usize,
    total_removed: usize,
    remaining: usize,
    items_per_second: f64,
    batches: BatchSummary,
}

impl TestResults {
    /// Every submitted item was either drained, removed, or is still queued.
    pub fn is_balanced(&self) -> bool {
        self.total_submitted == self.batches.items + self.total_removed + self.remaining
    }

    pub fn unordered_batches(&self) -> usize {
        self.batches.unordered
    }

    pub fn print_summary(&self) {
        let batches = &self.batches;
        println!("\n{:=^75}", " Stress Test Results ");
        println!(
            "{} items in {:?} ({:.2}/s)",
            self.total_submitted, self.test_duration, self.items_per_second
        );

        println!("\nWhere the items went:");
        println!("  - drained:           {}", batches.items);
        println!("  - removed by handle: {}", self.total_removed);
        println!("  - still queued:      {}", self.remaining);
        println!("  - balanced:          {}", self.is_balanced());
        println!("Priority updates through handles: {}", self.total_updated);

        println!("\nDrain batches ({}):", batches.count);
        if let Some(smallest) = batches.smallest {
            println!(
                "  - size {smallest}..={} (mean {:.2})",
                batches.largest,
                batches.mean_size()
            );
            println!(
                "  - duration mean {:.2} µs, worst {} µs",
                batches.mean_micros(),
                batches.slowest_micros
            );
        }
        println!("  - out of order: {}", batches.unordered);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BatchStat, BatchSummary, StressTestConfig, batch_is_ordered, run_stress_test};
    use crate::{Direction, PriorityQueue};

    fn small_config() -> StressTestConfig {
        StressTestConfig {
            num_producers: 3,
            num_items: 200,
            num_consumers: 2,
            drain_interval_ms: 1,
            drain_batch_size: 16,
            priority_range: (0, 1_000),
            update_ratio: 0.0,
            remove_ratio: 0.1,
            run_duration_seconds: 30,
        }
    }

    #[test]
    fn batch_ordering_check() {
        let batch = ["x:1".to_string(), "y:1".to_string(), "z:4".to_string()];

        assert!(batch_is_ordered(&batch, Direction::Ascending));
        assert!(!batch_is_ordered(&batch, Direction::Descending));
    }

    #[test]
    fn batch_summary_aggregates() {
        let summary = [(4, 10, true), (1, 30, false), (7, 20, true)]
            .into_iter()
            .map(|(size, duration_micros, ordered)| BatchStat {
                size,
                duration_micros,
                ordered,
            })
            .fold(BatchSummary::default(), BatchSummary::record);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.items, 12);
        assert_eq!(summary.smallest, Some(1));
        assert_eq!(summary.largest, 7);
        assert_eq!(summary.slowest_micros, 30);
        assert_eq!(summary.unordered, 1);
        assert_eq!(summary.mean_size(), 4.0);
        assert_eq!(summary.mean_micros(), 20.0);
    }

    #[test]
    fn empty_batch_summary() {
        let summary = BatchSummary::default();

        assert_eq!(summary.smallest, None);
        assert_eq!(summary.mean_size(), 0.0);
    }

    #[test]
    fn stress_run_accounts_for_every_item() {
        let queue = Arc::new(PriorityQueue::new());
        let results = run_stress_test(Arc::clone(&queue), small_config());

        assert_eq!(results.total_submitted, 600);
        assert!(results.is_balanced());
        assert_eq!(results.unordered_batches(), 0);
        assert!(queue.is_heap());
    }

    #[test]
    fn stress_run_max_queue() {
        let queue = Arc::new(PriorityQueue::new_max());
        let results = run_stress_test(queue, small_config());

        assert!(results.is_balanced());
        assert_eq!(results.unordered_batches(), 0);
    }
}

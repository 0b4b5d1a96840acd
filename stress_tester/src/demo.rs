use std::{cmp::Ordering, time::Duration};

use anyhow::Context;
use prioqueue::{Direction, PriorityQueue};

/// Runs every walkthrough in turn.
pub fn run() -> anyhow::Result<()> {
    println!("{:=^75}", " prioqueue walkthrough ");
    basic_usage();
    deadline_scheduling();
    tiered_support_desk();
    leaderboard();
    handle_operations()?;
    Ok(())
}

/// Min-queue: the lowest number is the most urgent.
fn basic_usage() -> Vec<&'static str> {
    println!("\n-- Basic usage (min-first)");
    let pq = PriorityQueue::new();
    pq.enqueue("write release notes", 3);
    pq.enqueue("page on-call", 1);
    pq.enqueue("reply to email", 5);
    pq.enqueue("review PR", 2);
    println!("Queued: {}", pq.size());

    let order: Vec<_> = std::iter::from_fn(|| pq.dequeue()).collect();
    for task in &order {
        println!("  processing: {task}");
    }
    order
}

#[derive(Debug, Clone)]
struct Job {
    name: &'static str,
    due_in: Duration,
}

/// Custom comparator over the deadline; the stored priority only records the minutes left.
fn deadline_scheduling() -> Vec<&'static str> {
    println!("\n-- Deadline scheduling");
    let jobs = [
        Job { name: "rotate certificates", due_in: Duration::from_secs(60 * 60) },
        Job { name: "quarterly report", due_in: Duration::from_secs(24 * 60 * 60) },
        Job { name: "restore backup", due_in: Duration::from_secs(30 * 60) },
        Job { name: "triage tickets", due_in: Duration::from_secs(4 * 60 * 60) },
    ];

    let pq = PriorityQueue::with_comparator(
        |a: &Job, b: &Job| a.due_in.cmp(&b.due_in),
        Direction::Ascending,
    );
    for job in jobs {
        let minutes_left = (job.due_in.as_secs() / 60) as i64;
        println!("  added: {} (due in {minutes_left} min)", job.name);
        pq.enqueue(job, minutes_left);
    }

    let mut order = vec![];
    while let Some(job) = pq.dequeue() {
        println!("  running: {} (due in {:?})", job.name, job.due_in);
        order.push(job.name);
    }
    order
}

#[derive(Debug, Clone)]
struct Customer {
    name: &'static str,
    tier: u8,
}

impl Customer {
    fn tier_label(&self) -> &'static str {
        match self.tier {
            3 => "gold",
            2 => "silver",
            _ => "standard",
        }
    }
}

/// Descending comparator: the "greater" customer has the higher tier, or the
/// earlier name within a tier.
fn tiered_support_desk() -> Vec<&'static str> {
    println!("\n-- Support desk (descending comparator)");
    let by_tier_then_name = |a: &Customer, b: &Customer| -> Ordering {
        a.tier.cmp(&b.tier).then_with(|| b.name.cmp(a.name))
    };
    let pq = PriorityQueue::with_comparator(by_tier_then_name, Direction::Descending);

    for customer in [
        Customer { name: "Mallory", tier: 1 },
        Customer { name: "Trent", tier: 3 },
        Customer { name: "Carol", tier: 2 },
        Customer { name: "Peggy", tier: 3 },
        Customer { name: "Dave", tier: 1 },
    ] {
        println!("  waiting: {} ({})", customer.name, customer.tier_label());
        // The comparator decides; the priority is informational only.
        pq.enqueue(customer, 0);
    }

    let mut order = vec![];
    while let Some(customer) = pq.dequeue() {
        println!("  serving: {} ({})", customer.name, customer.tier_label());
        order.push(customer.name);
    }
    order
}

/// Max-queue keyed by score.
fn leaderboard() -> Vec<(&'static str, i64)> {
    println!("\n-- Leaderboard (max-first)");
    let board = PriorityQueue::new_max();
    for (player, score) in [("ana", 1_500), ("bo", 2_000), ("cy", 1_800), ("di", 2_200)] {
        board.enqueue((player, score), score);
    }

    let ranking: Vec<_> = board.drain(board.size());
    for (rank, (player, score)) in ranking.iter().enumerate() {
        println!("  #{} {player} - {score} points", rank + 1);
    }
    ranking
}

/// Peek, update, remove by handle, snapshot, render and clear.
fn handle_operations() -> anyhow::Result<()> {
    println!("\n-- Handle operations");
    let pq = PriorityQueue::new();
    let alpha = pq.enqueue("alpha", 5);
    let beta = pq.enqueue("beta", 3);
    let gamma = pq.enqueue("gamma", 7);
    println!("Size: {}", pq.size());
    println!("Top: {}", pq.peek().context("queue should not be empty")?);

    println!("Raising alpha from {} to 1", alpha.priority());
    pq.update_priority(&alpha, 1);
    println!("Top: {}", pq.peek().context("queue should not be empty")?);
    println!("beta still at priority {}", beta.priority());

    let removed = pq.remove(&gamma).context("gamma should still be queued")?;
    println!("Removed {removed}, size now {}", pq.size());

    for item in pq.to_snapshot() {
        println!("  - {} (priority {})", item.value, item.priority);
    }
    println!("{pq}");

    pq.clear();
    println!("After clear: size={} empty={}", pq.size(), pq.is_empty());
    // Handles outlive their elements; using them now is harmless.
    pq.update_priority(&beta, 0);
    println!("Removing a cleared handle: {:?}", pq.remove(&beta));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_usage_order() {
        assert_eq!(
            basic_usage(),
            vec!["page on-call", "review PR", "write release notes", "reply to email"]
        );
    }

    #[test]
    fn deadline_order() {
        assert_eq!(
            deadline_scheduling(),
            vec!["restore backup", "rotate certificates", "triage tickets", "quarterly report"]
        );
    }

    #[test]
    fn support_desk_order() {
        assert_eq!(
            tiered_support_desk(),
            vec!["Peggy", "Trent", "Carol", "Dave", "Mallory"]
        );
    }

    #[test]
    fn leaderboard_order() {
        let names: Vec<_> = leaderboard().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["di", "bo", "cy", "ana"]);
    }

    #[test]
    fn full_walkthrough_succeeds() {
        run().unwrap();
    }
}

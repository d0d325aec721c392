//! Demo application: per-shard combiners joined into one consolidated view.
//!
//! Run with:
//! ```bash
//! cargo run --example shard_merge
//! ```

use std::sync::Arc;
use std::thread;

use combinatori::{merge_reports, CounterDescriptor, Report, SampleCombiner};

/// Builds the report one collector on `shard` would send for one scrape.
fn scrape(shard: usize, tick: u64) -> Report {
    let host = format!("host-{shard}");
    Report::new()
        .with_counter(
            CounterDescriptor::new("requests", tick * 1_000, tick * 1_000 + 999)
                .with_dimension("host")
                .with_dimension("method")
                .with_dimension_values("host", [host.clone()])
                .with_dimension_values("method", ["GET", "POST"]),
        )
        .with_counter(
            CounterDescriptor::new("errors", tick * 1_000, tick * 1_000 + 999)
                .with_dimension("host")
                .with_dimension_values("HOST", [host]), // sources disagree on casing
        )
}

fn main() {
    // One combiner per shard, each fed concurrently by its own collectors.
    let shards: Vec<Arc<SampleCombiner>> = (0..3)
        .map(|_| Arc::new(SampleCombiner::new(false)))
        .collect();

    let mut handles = vec![];
    for (shard, combiner) in shards.iter().enumerate() {
        let combiner = Arc::clone(combiner);
        handles.push(thread::spawn(move || {
            for tick in 0..10 {
                combiner.add_samples(scrape(shard, tick));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Join the per-shard views into one consolidated report.
    let mut total = Report::new();
    for combiner in &shards {
        let local = combiner.snapshot();
        merge_reports(&mut total, Some(&local));
    }

    println!("consolidated counters: {}", total.counters.len());
    for counter in &total.counters {
        println!(
            "  {} [{}..{}] dimensions: {:?}",
            counter.name, counter.start_time_ms, counter.end_time_ms, counter.dimensions
        );
        for (dimension, values) in &counter.dimension_values {
            println!("    {dimension}: {values:?}");
        }
    }
}

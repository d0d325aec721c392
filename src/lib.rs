//! # Combinatori - Counter Sample Report Combiner
//!
//! A Rust library for folding partial reports of named, dimensioned counters
//! (arriving from different data sources or distributed shards) into a
//! single deduplicated, merged view.
//!
//! ## The Problem
//!
//! In a distributed metric collector, every shard and every connection
//! reports the counters it knows about: a name, the dimensions the counter is
//! sliced by, the values observed along each dimension, and the time window
//! of the observation. Two shards will routinely describe *the same* counter,
//! each with a partial view: different hosts seen, different windows
//! covered. Naively concatenating those reports double-counts every counter
//! and loses the combined picture.
//!
//! To make collection consistent, someone has to define what "the same
//! counter" means, how two partial views merge, and how concurrent reporters
//! can feed one aggregate safely. That is this crate.
//!
//! ## The Solution
//!
//! - **Identity**: two samples describe the same counter iff their name and
//!   their dimension-name set are equal. Identity lives in its own
//!   value-compared key type, so the mutable payload (time range, value sets)
//!   can grow without ever invalidating a map entry.
//! - **Merge**: same-identity samples collapse into one descriptor with the
//!   union of dimension names, the union of dimension-value sets, and the
//!   widest observed time window. One shared routine implements the merge for
//!   both the incremental and the cross-report path.
//! - **Concurrency**: the [`SampleCombiner`] guards its counters table and
//!   its detail sequence with two independent, cache-line-padded locks. Each
//!   incoming report's counters land atomically as a batch, and snapshots are
//!   taken at the same granularity, so no caller ever observes a half-merged
//!   report.
//!
//! This crate aggregates counter *metadata* only: which counters exist, over
//! which dimensions, over which time range. Counter values (sums,
//! percentiles) are a different layer's concern.
//!
//! ## Quick Start
//!
//! ```rust
//! use combinatori::{CounterDescriptor, Report, SampleCombiner};
//!
//! let combiner = SampleCombiner::new(false);
//!
//! // Two shards report the same "cpu" counter with partial views.
//! combiner.add_samples(Report::new().with_counter(
//!     CounterDescriptor::new("cpu", 100, 200)
//!         .with_dimension("host")
//!         .with_dimension_values("host", ["a"]),
//! ));
//! combiner.add_samples(Report::new().with_counter(
//!     CounterDescriptor::new("cpu", 50, 150)
//!         .with_dimension("host")
//!         .with_dimension_values("HOST", ["b"]), // upstream casing quirk
//! ));
//!
//! // One counter, widest window, unioned hosts.
//! let view = combiner.snapshot();
//! let cpu = view.get("cpu").unwrap();
//! assert_eq!(view.counters.len(), 1);
//! assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (50, 200));
//! assert_eq!(cpu.dimension_values["host"].len(), 2);
//! ```
//!
//! ## Merging Without a Combiner
//!
//! Reports produced by independently-run combiners (one per shard, one per
//! process) join through the stateless [`merge_reports`] entry point, which
//! applies the identical identity and merge rules:
//!
//! ```rust
//! use combinatori::{merge_reports, CounterDescriptor, Report};
//!
//! let mut total = Report::new()
//!     .with_counter(CounterDescriptor::new("cpu", 100, 200).with_dimension("host"));
//! let from_shard = Report::new()
//!     .with_counter(CounterDescriptor::new("cpu", 50, 150).with_dimension("host"));
//!
//! merge_reports(&mut total, Some(&from_shard));
//! assert_eq!(total.counters.len(), 1);
//! assert_eq!(total.get("cpu").unwrap().start_time_ms, 50);
//! ```
//!
//! ## Thread Safety
//!
//! [`SampleCombiner`] is `Send + Sync` and is designed to be shared via
//! `Arc` across as many reporting threads as needed. Every operation is a
//! bounded, synchronous, CPU-only transformation with no I/O, no waiting, no
//! cancellation.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | `Serialize`/`Deserialize` derives on [`Report`] and friends, for external transport layers |

pub mod combiner;
pub mod merge;
pub mod report;

pub use combiner::SampleCombiner;
pub use merge::{merge_descriptors, merge_reports};
pub use report::{CounterDescriptor, CounterKey, Report, RequestDetail};

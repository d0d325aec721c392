//! Incremental, thread-safe accumulation of counter sample reports.
//!
//! [`SampleCombiner`] is the long-lived half of this crate: one instance is
//! shared (typically via `Arc`) by every caller funneling reports into a
//! common aggregate; one caller per inbound connection is the usual shape.
//! Each [`add_samples`](SampleCombiner::add_samples) call folds a whole
//! report into the accumulated state; [`snapshot`](SampleCombiner::snapshot)
//! copies the current consolidated view out at any time without disturbing
//! accumulation.
//!
//! # Locking discipline
//!
//! The two pieces of shared state are guarded independently: the known
//! counters table by one mutex, the detail sequence by another, each on its
//! own cache line so the locks do not contend through false sharing. A slow
//! detail append never blocks counter merging and vice versa. The counters
//! lock is held across an entire incoming report's counter list, so a
//! report's counters land atomically as a batch, so two concurrent callers can
//! never interleave counter-by-counter.

use std::collections::{hash_map::Entry, HashMap};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::merge::merge_descriptors;
use crate::report::{CounterDescriptor, CounterKey, Report, RequestDetail};

/// Combines counter sample reports from many sources into one deduplicated
/// view.
///
/// Samples with the same identity (name + dimension-name set) collapse into
/// a single owned descriptor whose observation window and dimension-value
/// sets grow as further samples arrive; samples with distinct identities stay
/// distinct. Accumulation is unbounded and never reset: the combiner lives
/// as long as the aggregation it serves and is simply dropped afterwards.
///
/// # Examples
///
/// ```rust
/// use combinatori::combiner::SampleCombiner;
/// use combinatori::report::{CounterDescriptor, Report};
///
/// let combiner = SampleCombiner::new(false);
///
/// combiner.add_samples(Report::new().with_counter(
///     CounterDescriptor::new("cpu", 100, 200)
///         .with_dimension("host")
///         .with_dimension_values("host", ["a"]),
/// ));
/// combiner.add_samples(Report::new().with_counter(
///     CounterDescriptor::new("cpu", 50, 150)
///         .with_dimension("host")
///         .with_dimension_values("HOST", ["b"]),
/// ));
///
/// let view = combiner.snapshot();
/// let cpu = view.get("cpu").unwrap();
/// assert_eq!(view.counters.len(), 1);
/// assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (50, 200));
/// assert_eq!(cpu.dimension_values["host"].len(), 2);
/// ```
///
/// # Thread Safety
///
/// `SampleCombiner` is `Send + Sync`; share it across threads with
/// `Arc<SampleCombiner>`. Every operation is synchronous and runs to
/// completion; there is no I/O, no waiting, and no cancellation to consider.
pub struct SampleCombiner {
    known: CachePadded<Mutex<HashMap<CounterKey, CounterDescriptor>>>,
    details: CachePadded<Mutex<Vec<RequestDetail>>>,
    aggregate_details: bool,
}

impl SampleCombiner {
    /// Creates an empty combiner.
    ///
    /// When `aggregate_details` is `true`, detail records attached to
    /// incoming reports are concatenated in arrival order and included in
    /// every [`snapshot`](Self::snapshot); when `false` (the [`Default`]),
    /// incoming details are dropped and snapshots carry none. The flag is
    /// fixed for the combiner's lifetime.
    pub fn new(aggregate_details: bool) -> Self {
        Self {
            known: CachePadded::new(Mutex::new(HashMap::new())),
            details: CachePadded::new(Mutex::new(Vec::new())),
            aggregate_details,
        }
    }

    /// Whether this combiner accumulates request detail records.
    pub fn aggregates_details(&self) -> bool {
        self.aggregate_details
    }

    /// Folds one report into the accumulated state.
    ///
    /// Each counter in the report either merges into the known descriptor
    /// with the same identity or, for an unseen identity, moves in as the new
    /// owned entry. The whole counter list is processed under one hold of the
    /// counters lock, so the batch is atomic with respect to concurrent
    /// callers. Detail records, when present and when the combiner was
    /// constructed with `aggregate_details`, are appended under the separate
    /// details lock.
    ///
    /// The report is consumed; empty reports are fine and leave the state
    /// untouched.
    pub fn add_samples(&self, report: Report) {
        let Report {
            counters,
            request_details,
        } = report;

        if !counters.is_empty() {
            let mut known = self.known.lock();
            for sample in counters {
                match known.entry(sample.key()) {
                    Entry::Occupied(mut owned) => merge_descriptors(owned.get_mut(), &sample),
                    Entry::Vacant(slot) => {
                        slot.insert(sample);
                    }
                }
            }
        }

        if self.aggregate_details {
            if let Some(mut incoming) = request_details {
                if !incoming.is_empty() {
                    self.details.lock().append(&mut incoming);
                }
            }
        }
    }

    /// Copies the current consolidated state into a fresh [`Report`].
    ///
    /// Counter order in the result is not significant. The returned report
    /// shares no storage with the combiner: later `add_samples` calls never
    /// alter a snapshot already handed out. Snapshots are non-destructive and
    /// may be taken any number of times while accumulation continues.
    ///
    /// Counters are copied under the same lock that guards mutation, so a
    /// snapshot can never observe a torn state where only part of a
    /// concurrent report's merge is visible.
    pub fn snapshot(&self) -> Report {
        let counters = self.known.lock().values().cloned().collect();
        let request_details = self
            .aggregate_details
            .then(|| self.details.lock().clone());

        Report {
            counters,
            request_details,
        }
    }
}

impl Default for SampleCombiner {
    /// Creates a combiner that does not aggregate request details.
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for SampleCombiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCombiner")
            .field("known_counters", &self.known.lock().len())
            .field("details", &self.details.lock().len())
            .field("aggregate_details", &self.aggregate_details)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_sample(start: u64, end: u64, value: &str) -> CounterDescriptor {
        CounterDescriptor::new("cpu", start, end)
            .with_dimension("host")
            .with_dimension_values("host", [value])
    }

    #[test]
    fn test_empty_combiner_snapshot() {
        let combiner = SampleCombiner::default();
        assert!(!combiner.aggregates_details());
        let view = combiner.snapshot();
        assert!(view.counters.is_empty());
        assert!(view.request_details.is_none());
    }

    #[test]
    fn test_empty_report_is_accepted() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new());
        assert!(combiner.snapshot().counters.is_empty());
    }

    #[test]
    fn test_identity_dedup() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new().with_counter(cpu_sample(100, 200, "a")));
        combiner.add_samples(Report::new().with_counter(cpu_sample(50, 150, "b")));
        assert_eq!(combiner.snapshot().counters.len(), 1);
    }

    #[test]
    fn test_identity_dedup_reversed_order() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new().with_counter(cpu_sample(50, 150, "b")));
        combiner.add_samples(Report::new().with_counter(cpu_sample(100, 200, "a")));
        let view = combiner.snapshot();
        assert_eq!(view.counters.len(), 1);
        let cpu = view.get("cpu").unwrap();
        assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (50, 200));
    }

    #[test]
    fn test_distinct_identities_stay_distinct() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(
            Report::new()
                .with_counter(CounterDescriptor::new("cpu", 0, 0).with_dimension("host"))
                .with_counter(CounterDescriptor::new("cpu", 0, 0).with_dimension("region"))
                .with_counter(CounterDescriptor::new("mem", 0, 0).with_dimension("host")),
        );
        assert_eq!(combiner.snapshot().counters.len(), 3);
    }

    #[test]
    fn test_adding_same_sample_twice_is_idempotent() {
        let combiner = SampleCombiner::default();
        let sample = cpu_sample(100, 200, "a");
        combiner.add_samples(Report::new().with_counter(sample.clone()));
        combiner.add_samples(Report::new().with_counter(sample));
        let view = combiner.snapshot();
        let cpu = view.get("cpu").unwrap();
        assert_eq!(cpu.dimensions, vec!["host"]);
        assert_eq!(cpu.dimension_values["host"].len(), 1);
    }

    #[test]
    fn test_end_to_end_consolidation() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new().with_counter(cpu_sample(100, 200, "a")));
        combiner.add_samples(Report::new().with_counter(
            CounterDescriptor::new("cpu", 50, 150)
                .with_dimension("host")
                .with_dimension_values("HOST", ["b"]),
        ));

        let view = combiner.snapshot();
        assert_eq!(view.counters.len(), 1);
        let cpu = view.get("cpu").unwrap();
        assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (50, 200));
        let hosts = &cpu.dimension_values["host"];
        assert!(hosts.contains("a") && hosts.contains("b"));
    }

    #[test]
    fn test_details_dropped_when_disabled() {
        let combiner = SampleCombiner::new(false);
        combiner.add_samples(Report::new().with_details(["ignored"]));
        assert!(combiner.snapshot().request_details.is_none());
    }

    #[test]
    fn test_details_concatenate_in_arrival_order() {
        let combiner = SampleCombiner::new(true);
        assert!(combiner.aggregates_details());
        combiner.add_samples(Report::new().with_details(["first", "second"]));
        combiner.add_samples(Report::new().with_details(["third"]));

        let details = combiner.snapshot().request_details.unwrap();
        let expected: Vec<RequestDetail> =
            ["first", "second", "third"].into_iter().map(Into::into).collect();
        assert_eq!(details, expected);
    }

    #[test]
    fn test_duplicate_details_are_kept() {
        let combiner = SampleCombiner::new(true);
        combiner.add_samples(Report::new().with_details(["same"]));
        combiner.add_samples(Report::new().with_details(["same"]));
        assert_eq!(combiner.snapshot().request_details.unwrap().len(), 2);
    }

    #[test]
    fn test_details_enabled_but_none_arrived() {
        let combiner = SampleCombiner::new(true);
        combiner.add_samples(Report::new().with_counter(cpu_sample(0, 0, "a")));
        // The field is present (the combiner aggregates) but empty.
        assert_eq!(combiner.snapshot().request_details.unwrap().len(), 0);
    }

    #[test]
    fn test_snapshot_independence() {
        let combiner = SampleCombiner::new(true);
        combiner.add_samples(
            Report::new()
                .with_counter(cpu_sample(100, 200, "a"))
                .with_details(["first"]),
        );

        let before = combiner.snapshot();
        combiner.add_samples(
            Report::new()
                .with_counter(cpu_sample(50, 250, "b"))
                .with_details(["second"]),
        );

        let cpu = before.get("cpu").unwrap();
        assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (100, 200));
        assert_eq!(cpu.dimension_values["host"].len(), 1);
        assert_eq!(before.request_details.unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new().with_counter(cpu_sample(0, 0, "a")));
        let _ = combiner.snapshot();
        assert_eq!(combiner.snapshot().counters.len(), 1);
    }

    #[test]
    fn test_concurrent_add_samples() {
        use std::sync::Arc;
        use std::thread;

        let combiner = Arc::new(SampleCombiner::default());
        let mut handles = vec![];

        for t in 0..4u64 {
            let combiner = Arc::clone(&combiner);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let value = format!("host-{t}-{i}");
                    combiner.add_samples(
                        Report::new().with_counter(cpu_sample(100 - t, 200 + t, &value)),
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let view = combiner.snapshot();
        assert_eq!(view.counters.len(), 1);
        let cpu = view.get("cpu").unwrap();
        assert_eq!((cpu.start_time_ms, cpu.end_time_ms), (97, 203));
        assert_eq!(cpu.dimension_values["host"].len(), 400);
    }

    #[test]
    fn test_concurrent_detail_aggregation() {
        use std::sync::Arc;
        use std::thread;

        let combiner = Arc::new(SampleCombiner::new(true));
        let mut handles = vec![];

        for t in 0..4 {
            let combiner = Arc::clone(&combiner);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    combiner.add_samples(Report::new().with_details([format!("{t}:{i}")]));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let details = combiner.snapshot().request_details.unwrap();
        assert_eq!(details.len(), 200);
        // Per-thread arrival order survives interleaving.
        let from_thread_0: Vec<_> = details
            .iter()
            .filter(|d| d.0.starts_with(b"0:"))
            .cloned()
            .collect();
        let expected: Vec<RequestDetail> =
            (0..50).map(|i| RequestDetail::from(format!("0:{i}"))).collect();
        assert_eq!(from_thread_0, expected);
    }

    #[test]
    fn test_debug_output() {
        let combiner = SampleCombiner::default();
        combiner.add_samples(Report::new().with_counter(cpu_sample(0, 0, "a")));
        let rendered = format!("{combiner:?}");
        assert!(rendered.contains("known_counters: 1"));
    }
}

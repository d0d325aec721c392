//! The merge algorithm shared by every aggregation path.
//!
//! Both the incremental [`SampleCombiner`](crate::combiner::SampleCombiner)
//! and the stateless [`merge_reports`] fold descriptors through the single
//! [`merge_descriptors`] routine, so the two paths cannot drift apart: a pair
//! of samples merges to the same result whether they met inside one combiner
//! or in two reports joined after the fact.
//!
//! # Casing rules
//!
//! Counter identity (name + dimension-name set) is case-sensitive, but two
//! defensive case-insensitive steps run inside the merge itself:
//!
//! - dimension-name union compares names with ASCII case folding, so a
//!   sample listing `"Host"` does not duplicate an existing `"host"` entry;
//! - dimension-*value* keys are folded to lower case before values are
//!   unioned, because the upstream normalization layer is known to emit the
//!   same logical dimension under inconsistent casing across reports.
//!
//! The asymmetry is deliberate: identity stays case-sensitive while the
//! in-merge unions are not.

use std::collections::{hash_map::Entry, BTreeMap, BTreeSet, HashMap};

use crate::report::{CounterDescriptor, Report};

/// Merges `incoming` into `target` in place. Both descriptors are expected to
/// describe the same counter (equal [`key()`](CounterDescriptor::key)),
/// though nothing here enforces it.
///
/// Three things happen, in order:
///
/// 1. every incoming dimension name not already present on the target
///    (ASCII-case-insensitive comparison) is appended, preserving incoming
///    order;
/// 2. the observation window widens to cover both samples
///    (`start = min`, `end = max`);
/// 3. if the incoming sample carries dimension-value data, the target's
///    value-map keys are first re-normalized to lower case, then the incoming
///    values are unioned in under their lower-cased keys.
///
/// `incoming` is never mutated; callers usually discard it afterwards.
///
/// # Examples
///
/// ```rust
/// use combinatori::merge::merge_descriptors;
/// use combinatori::report::CounterDescriptor;
///
/// let mut target = CounterDescriptor::new("cpu", 100, 200)
///     .with_dimension("host")
///     .with_dimension_values("host", ["a"]);
/// let incoming = CounterDescriptor::new("cpu", 50, 150)
///     .with_dimension("host")
///     .with_dimension_values("HOST", ["b"]);
///
/// merge_descriptors(&mut target, &incoming);
///
/// assert_eq!((target.start_time_ms, target.end_time_ms), (50, 200));
/// assert_eq!(target.dimension_values["host"].len(), 2);
/// ```
pub fn merge_descriptors(target: &mut CounterDescriptor, incoming: &CounterDescriptor) {
    for dimension in &incoming.dimensions {
        if !target
            .dimensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(dimension))
        {
            target.dimensions.push(dimension.clone());
        }
    }

    target.start_time_ms = target.start_time_ms.min(incoming.start_time_ms);
    target.end_time_ms = target.end_time_ms.max(incoming.end_time_ms);

    if !incoming.dimension_values.is_empty() {
        // Upstream sources disagree on value-key casing across reports, so
        // the target's keys must be folded before the union or the same
        // logical dimension would split into per-casing entries.
        fold_value_keys(&mut target.dimension_values);
        for (dimension, values) in &incoming.dimension_values {
            target
                .dimension_values
                .entry(dimension.to_ascii_lowercase())
                .or_default()
                .extend(values.iter().cloned());
        }
    }
}

/// Rewrites every key of `values` to ASCII lower case, unioning the value
/// sets of keys that collapse together.
fn fold_value_keys(values: &mut BTreeMap<String, BTreeSet<String>>) {
    if values.keys().all(|key| !key.bytes().any(|b| b.is_ascii_uppercase())) {
        return;
    }
    let mixed = std::mem::take(values);
    for (key, set) in mixed {
        values
            .entry(key.to_ascii_lowercase())
            .or_default()
            .extend(set);
    }
}

/// Folds `local`'s counters into `aggregated` in place, without a combiner
/// instance. This is the cross-report path used to join the outputs of combiners
/// that ran independently (per shard, per process).
///
/// Identity and merge rules are exactly those of the incremental path: each
/// local counter merges into the matching aggregated entry when one exists,
/// and is appended as a new entry otherwise. An absent or counter-less
/// `local` is a legitimate no-op. Detail records are never touched here;
/// only the incremental combiner concatenates details.
///
/// The caller must ensure neither report is concurrently mutated for the
/// duration of the call; unlike a combiner's internal state, these are plain
/// caller-owned values with no lock of their own.
///
/// # Examples
///
/// ```rust
/// use combinatori::merge::merge_reports;
/// use combinatori::report::{CounterDescriptor, Report};
///
/// let mut total = Report::new()
///     .with_counter(CounterDescriptor::new("cpu", 100, 200).with_dimension("host"));
/// let shard = Report::new()
///     .with_counter(CounterDescriptor::new("cpu", 50, 150).with_dimension("host"))
///     .with_counter(CounterDescriptor::new("mem", 50, 150).with_dimension("host"));
///
/// merge_reports(&mut total, Some(&shard));
///
/// assert_eq!(total.counters.len(), 2);
/// assert_eq!(total.get("cpu").unwrap().start_time_ms, 50);
/// ```
pub fn merge_reports(aggregated: &mut Report, local: Option<&Report>) {
    let Some(local) = local else { return };
    if local.counters.is_empty() {
        return;
    }

    let mut slots: HashMap<_, _> = aggregated
        .counters
        .iter()
        .enumerate()
        .map(|(index, counter)| (counter.key(), index))
        .collect();

    for incoming in &local.counters {
        match slots.entry(incoming.key()) {
            Entry::Occupied(slot) => {
                merge_descriptors(&mut aggregated.counters[*slot.get()], incoming);
            }
            Entry::Vacant(slot) => {
                slot.insert(aggregated.counters.len());
                aggregated.counters.push(incoming.clone());
            }
        }
    }
}

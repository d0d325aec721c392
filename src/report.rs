//! Report types describing which counters exist, over which dimensions.
//!
//! This module provides the data model consumed and produced by the
//! [`SampleCombiner`](crate::combiner::SampleCombiner): a [`Report`] is a
//! batch of [`CounterDescriptor`] samples produced by one data source at one
//! point in time, plus optional opaque [`RequestDetail`] records.
//!
//! A descriptor carries *metadata* about a counter: its name, the dimensions
//! it is sliced by, the observed values along each dimension, and the time
//! window over which it was observed. It never carries counter payload data
//! (sums, percentiles); aggregating those is a different layer's job.
//!
//! # Identity
//!
//! Two descriptors represent *the same counter* iff their name and their
//! dimension-name set are equal. That identity is captured by [`CounterKey`],
//! a value-compared key that is safe to use in hash maps: it contains only
//! the identity fields, never the mutable time range or value sets, so a
//! descriptor stored behind a key can be merged into freely without its key
//! ever changing underneath the map.
//!
//! # Feature Flag
//!
//! With the `serde` feature enabled, all types in this module derive
//! `Serialize`/`Deserialize` so an external transport layer can move reports
//! between processes:
//!
//! ```toml
//! [dependencies]
//! combinatori = { version = "0.2", features = ["serde"] }
//! ```

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata describing one observed counter: its name, the dimensions it is
/// sliced by, the values seen along each dimension, and the observation
/// window.
///
/// Descriptors are built with the constructor plus builder methods, then
/// shipped inside a [`Report`]:
///
/// ```rust
/// use combinatori::report::CounterDescriptor;
///
/// let sample = CounterDescriptor::new("requests", 1_000, 2_000)
///     .with_dimension("host")
///     .with_dimension("region")
///     .with_dimension_values("host", ["web-1", "web-2"]);
///
/// assert_eq!(sample.name, "requests");
/// assert_eq!(sample.dimensions, vec!["host", "region"]);
/// ```
///
/// # Identity vs. payload
///
/// `name` and the set of names in `dimensions` are the descriptor's identity
/// (see [`CounterKey`]). `start_time_ms`, `end_time_ms`, and
/// `dimension_values` are aggregation payload: once a descriptor is owned by
/// a combiner, later samples with the same identity are merged into it in
/// place, widening the window and unioning the value sets.
///
/// This type deliberately does not implement `Eq` or `Hash`; use
/// [`CounterDescriptor::key`] when a map or set key is needed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterDescriptor {
    /// The counter's name.
    pub name: String,
    /// Names of the dimensions this counter is sliced by, in arrival order.
    pub dimensions: Vec<String>,
    /// Start of the observation window, in milliseconds since the Unix epoch.
    pub start_time_ms: u64,
    /// End of the observation window, in milliseconds since the Unix epoch.
    pub end_time_ms: u64,
    /// Observed values per dimension name. An empty map means the sample
    /// carried no dimension-value data.
    pub dimension_values: BTreeMap<String, BTreeSet<String>>,
}

impl CounterDescriptor {
    /// Creates a descriptor with the given name and observation window and
    /// no dimensions.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combinatori::report::CounterDescriptor;
    ///
    /// let sample = CounterDescriptor::new("cpu", 100, 200);
    /// assert!(sample.dimensions.is_empty());
    /// assert!(sample.dimension_values.is_empty());
    /// ```
    pub fn new(name: impl Into<String>, start_time_ms: u64, end_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            dimensions: Vec::new(),
            start_time_ms,
            end_time_ms,
            dimension_values: BTreeMap::new(),
        }
    }

    /// Appends a dimension name, returning `self` for method chaining.
    ///
    /// No dedup is performed here; what arrives is what is stored. Collapsing
    /// duplicates (including case-only duplicates) happens at merge time.
    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimensions.push(dimension.into());
        self
    }

    /// Records observed values for a dimension, returning `self` for method
    /// chaining. Values accumulate into the dimension's set across calls.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combinatori::report::CounterDescriptor;
    ///
    /// let sample = CounterDescriptor::new("cpu", 100, 200)
    ///     .with_dimension("host")
    ///     .with_dimension_values("host", ["a"])
    ///     .with_dimension_values("host", ["b"]);
    ///
    /// assert_eq!(sample.dimension_values["host"].len(), 2);
    /// ```
    pub fn with_dimension_values<I>(mut self, dimension: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.dimension_values
            .entry(dimension.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns this descriptor's identity key: the name plus the
    /// dimension-name set, compared case-sensitively.
    ///
    /// The key is a snapshot: it does not track later mutation of the
    /// descriptor, which is exactly what makes it safe as a map key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combinatori::report::CounterDescriptor;
    ///
    /// let a = CounterDescriptor::new("cpu", 100, 200).with_dimension("host");
    /// let b = CounterDescriptor::new("cpu", 50, 150).with_dimension("host");
    /// let c = CounterDescriptor::new("cpu", 50, 150).with_dimension("region");
    ///
    /// // Identity ignores the observation window...
    /// assert_eq!(a.key(), b.key());
    /// // ...but not the dimension-name set.
    /// assert_ne!(a.key(), c.key());
    /// ```
    pub fn key(&self) -> CounterKey {
        CounterKey {
            name: self.name.clone(),
            dimensions: self.dimensions.iter().cloned().collect(),
        }
    }
}

/// Value-compared identity of a counter: name plus dimension-name set.
///
/// Dimension order does not matter (`["host", "region"]` and
/// `["region", "host"]` produce equal keys), but letter case does: identity
/// comparison is case-sensitive, unlike the case-insensitive union performed
/// inside the merge algorithm. Upstream sources are expected to be consistent
/// about the casing of a counter's own dimension list; the case-insensitive
/// handling exists for the dimension-*value* keys, which are known to arrive
/// inconsistently cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterKey {
    name: String,
    dimensions: BTreeSet<String>,
}

impl CounterKey {
    /// The counter name this key identifies.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dimension-name set this key identifies.
    pub fn dimensions(&self) -> &BTreeSet<String> {
        &self.dimensions
    }
}

/// An opaque detail record attached to a report by the transport layer.
///
/// The combiner forwards these verbatim and never inspects the contents:
/// details are concatenated in arrival order, never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RequestDetail(pub Vec<u8>);

impl From<Vec<u8>> for RequestDetail {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RequestDetail {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for RequestDetail {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for RequestDetail {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

/// A batch of counter descriptors plus optional detail records, produced by
/// one data source at one point in time, and also the consolidated output of
/// a [`SampleCombiner`](crate::combiner::SampleCombiner) snapshot.
///
/// # Examples
///
/// ```rust
/// use combinatori::report::{CounterDescriptor, Report};
///
/// let report = Report::new()
///     .with_counter(CounterDescriptor::new("cpu", 100, 200).with_dimension("host"))
///     .with_counter(CounterDescriptor::new("mem", 100, 200).with_dimension("host"));
///
/// assert_eq!(report.counters.len(), 2);
/// assert!(report.get("cpu").is_some());
/// assert!(report.get("disk").is_none());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Report {
    /// The counter descriptors in this batch.
    pub counters: Vec<CounterDescriptor>,
    /// Optional opaque detail records. `None` when the source attached none.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub request_details: Option<Vec<RequestDetail>>,
}

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a counter descriptor, returning `self` for method chaining.
    pub fn with_counter(mut self, counter: CounterDescriptor) -> Self {
        self.counters.push(counter);
        self
    }

    /// Attaches detail records, returning `self` for method chaining.
    pub fn with_details<I>(mut self, details: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RequestDetail>,
    {
        self.request_details
            .get_or_insert_with(Vec::new)
            .extend(details.into_iter().map(Into::into));
        self
    }

    /// Finds the first counter with the given name.
    pub fn get(&self, name: &str) -> Option<&CounterDescriptor> {
        self.counters.iter().find(|c| c.name == name)
    }
}

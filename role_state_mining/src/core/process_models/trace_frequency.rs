//! Trace and entry frequency tables
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::hash::Hash;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::core::event_data::state_snapshot_log::{RoleSet, StateSnapshotLog};

///
/// A single entry of a trace
///
/// Entries are either atomic symbols ([`String`]) or sets of concurrently active roles ([`RoleSet`]).
/// The _symbols_ of an entry make up the alphabet used by background cost models.
///
pub trait TraceEntry: Clone + Eq + Hash + Ord {
    /// Alphabet symbols carried by this entry
    fn symbols(&self) -> impl Iterator<Item = &str>;
}

impl TraceEntry for String {
    fn symbols(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.as_str())
    }
}

impl TraceEntry for RoleSet {
    fn symbols(&self) -> impl Iterator<Item = &str> {
        self.iter().map(String::as_str)
    }
}

/// Merge two frequency tables, summing counts of identical keys
pub fn bag_union<K: Hash + Eq + Clone>(a: &HashMap<K, u64>, b: &HashMap<K, u64>) -> HashMap<K, u64> {
    let mut result = a.clone();
    bag_union_into(&mut result, b.iter().map(|(k, v)| (k.clone(), *v)));
    result
}

/// In-place variant of [`bag_union`]
pub fn bag_union_into<K: Hash + Eq>(target: &mut HashMap<K, u64>, other: impl IntoIterator<Item = (K, u64)>) {
    for (k, v) in other {
        *target.entry(k).or_default() += v;
    }
}

#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "E: TraceEntry + Serialize",
    deserialize = "E: TraceEntry + Deserialize<'de>"
))]
struct TraceFrequencyData<E: TraceEntry> {
    #[serde_as(as = "Vec<(_, _)>")]
    traces: HashMap<Vec<E>, u64>,
}

///
/// Occurrence counts of whole traces
///
/// Traces with a count of zero are never stored; looking up an absent trace yields `0`.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "TraceFrequencyData<E>",
    into = "TraceFrequencyData<E>",
    bound(
        serialize = "E: TraceEntry + Serialize",
        deserialize = "E: TraceEntry + Deserialize<'de>"
    )
)]
pub struct TraceFrequency<E: TraceEntry> {
    elements: HashMap<Vec<E>, u64>,
    trace_total: u64,
    symbol_total: usize,
}

impl<E: TraceEntry> From<TraceFrequencyData<E>> for TraceFrequency<E> {
    fn from(value: TraceFrequencyData<E>) -> Self {
        Self::new(value.traces)
    }
}

impl<E: TraceEntry> From<TraceFrequency<E>> for TraceFrequencyData<E> {
    fn from(value: TraceFrequency<E>) -> Self {
        Self {
            traces: value.elements,
        }
    }
}

impl<E: TraceEntry> Default for TraceFrequency<E> {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<E: TraceEntry> TraceFrequency<E> {
    /// Create a table from `(trace, count)` pairs; counts of repeated traces are summed
    pub fn new<I: IntoIterator<Item = (Vec<E>, u64)>>(elements: I) -> Self {
        let mut merged: HashMap<Vec<E>, u64> = HashMap::new();
        bag_union_into(&mut merged, elements);
        merged.retain(|_, freq| *freq > 0);
        let trace_total = merged.values().sum();
        let symbol_total = merged
            .keys()
            .flat_map(|t| t.iter().flat_map(|e| e.symbols()))
            .collect::<BTreeSet<_>>()
            .len();
        Self {
            elements: merged,
            trace_total,
            symbol_total,
        }
    }

    /// Occurrence count of a trace (`0` if absent)
    pub fn freq(&self, trace: &[E]) -> u64 {
        self.elements.get(trace).copied().unwrap_or(0)
    }

    /// Relative frequency of a trace (`0.0` if absent or the table is empty)
    pub fn probability(&self, trace: &[E]) -> f64 {
        if self.trace_total == 0 {
            return 0.0;
        }
        self.freq(trace) as f64 / self.trace_total as f64
    }

    /// Sum of all occurrence counts
    pub fn trace_total(&self) -> u64 {
        self.trace_total
    }

    /// Number of distinct alphabet symbols (roles) over all traces
    pub fn role_total(&self) -> usize {
        self.symbol_total
    }

    /// Number of distinct traces
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// `true` if no trace occurs
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Distinct traces (arbitrary order)
    pub fn traces(&self) -> impl Iterator<Item = &Vec<E>> {
        self.elements.keys()
    }

    /// Underlying `trace → count` map
    pub fn elements(&self) -> &HashMap<Vec<E>, u64> {
        &self.elements
    }

    /// `(trace, count)` pairs ordered by trace
    pub fn sorted_elements(&self) -> Vec<(&Vec<E>, u64)> {
        self.elements
            .iter()
            .map(|(t, f)| (t, *f))
            .sorted_by(|a, b| a.0.cmp(b.0))
            .collect()
    }

    /// Bag union of two tables
    pub fn bag_union(&self, other: &Self) -> Self {
        Self::new(bag_union(&self.elements, &other.elements))
    }
}

impl TraceFrequency<RoleSet> {
    /// Count the trace variants of a [`StateSnapshotLog`]
    pub fn from_log(log: &StateSnapshotLog) -> Self {
        Self::new(log.variants())
    }
}

impl TraceFrequency<String> {
    /// Convenience constructor for traces of atomic symbols
    pub fn from_symbols<'a, I, T>(elements: I) -> Self
    where
        I: IntoIterator<Item = (T, u64)>,
        T: IntoIterator<Item = &'a str>,
    {
        Self::new(
            elements
                .into_iter()
                .map(|(t, f)| (t.into_iter().map(str::to_string).collect(), f)),
        )
    }
}

impl<E: TraceEntry + std::fmt::Debug> Display for TraceFrequency<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TraceFrequency:")?;
        writeln!(f, "    {} roles", self.symbol_total)?;
        writeln!(f, "    {} traces", self.trace_total)?;
        for (trace, freq) in self.sorted_elements() {
            writeln!(f, "    {:40}: {:8}", format!("{:?}", trace), freq)?;
        }
        Ok(())
    }
}

///
/// Occurrence counts of individual trace entries, weighted by the count of the traces they occur in
///
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFrequency<E: TraceEntry> {
    entries: HashMap<E, u64>,
    entry_total: u64,
}

impl<E: TraceEntry> EntryFrequency<E> {
    /// Count entries of all traces in `traces`
    pub fn new(traces: &TraceFrequency<E>) -> Self {
        let mut entries: HashMap<E, u64> = HashMap::new();
        for (trace, freq) in traces.elements() {
            for entry in trace {
                *entries.entry(entry.clone()).or_default() += freq;
            }
        }
        let entry_total = entries.values().sum();
        Self {
            entries,
            entry_total,
        }
    }

    /// Sum of all entry counts
    pub fn entry_total(&self) -> u64 {
        self.entry_total
    }

    /// Count of an entry (`0` if absent)
    pub fn entry_freq(&self, entry: &E) -> u64 {
        self.entries.get(entry).copied().unwrap_or(0)
    }

    /// Underlying `entry → count` map
    pub fn entries(&self) -> &HashMap<E, u64> {
        &self.entries
    }
}

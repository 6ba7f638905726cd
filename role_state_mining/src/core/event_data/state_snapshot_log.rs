//! State snapshots and the per-case logs built from them
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;

use ordered_float::OrderedFloat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier of a tracked entity (a _case_)
pub type CaseId = String;

/// Observation time of a [`StateSnapshot`]
///
/// Wrapped in [`OrderedFloat`] so that `(case, time)` pairs are totally ordered map keys.
pub type Timestamp = OrderedFloat<f64>;

/// Set of concurrently active roles (activity labels)
pub type RoleSet = BTreeSet<String>;

/// Ordered sequence of [`RoleSet`]s of one case, independent of case identity and timestamps
pub type TraceVariant = Vec<RoleSet>;

/// Default step used when expanding time range rows into point observations
pub const DEFAULT_TIME_INCREMENT: f64 = 0.25;

///
/// The set of concurrently active roles of one case at one point in time
///
/// Equality and hashing consider the full `(case_id, time, activities)` triple.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Case this snapshot belongs to
    pub case_id: CaseId,
    /// Observation time
    pub time: Timestamp,
    /// Active roles
    pub activities: RoleSet,
}

impl StateSnapshot {
    /// Create a new [`StateSnapshot`]
    pub fn new<C, I, S>(case_id: C, time: f64, activities: I) -> Self
    where
        C: Into<CaseId>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            case_id: case_id.into(),
            time: OrderedFloat(time),
            activities: activities.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for StateSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StateSnapshot: {} @ {} = {{{}}}",
            self.case_id,
            self.time,
            self.activities.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    }
}

/// A point observation: one role of a case at one time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Case identifier
    pub case_id: CaseId,
    /// Role (activity label)
    pub activity: String,
    /// Observation time
    pub time: f64,
}

impl SnapshotRow {
    /// Create a new [`SnapshotRow`]
    pub fn new(case_id: impl Into<CaseId>, activity: impl Into<String>, time: f64) -> Self {
        Self {
            case_id: case_id.into(),
            activity: activity.into(),
            time,
        }
    }
}

/// An observation of one role of a case over the inclusive time range `start..=end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRangeRow {
    /// Case identifier
    pub case_id: CaseId,
    /// Role (activity label)
    pub activity: String,
    /// First observation time
    pub start: f64,
    /// Last observation time (inclusive)
    pub end: f64,
}

impl SnapshotRangeRow {
    /// Create a new [`SnapshotRangeRow`]
    pub fn new(case_id: impl Into<CaseId>, activity: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            case_id: case_id.into(),
            activity: activity.into(),
            start,
            end,
        }
    }
}

/// Options for building a [`StateSnapshotLog`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct StateSnapshotLogOptions {
    /// Keep consecutive snapshots of a case which have identical role sets
    ///
    /// If `false`, only _immediately adjacent_ duplicates are collapsed.
    pub keep_successive_duplicates: bool,
    /// Step between expanded point observations of range rows
    pub time_increment: f64,
}

impl Default for StateSnapshotLogOptions {
    fn default() -> Self {
        Self {
            keep_successive_duplicates: true,
            time_increment: DEFAULT_TIME_INCREMENT,
        }
    }
}

/// Errors while building a [`StateSnapshotLog`]
#[derive(Debug, Clone, PartialEq)]
pub enum StateSnapshotLogError {
    /// Range expansion needs a strictly positive, finite step
    InvalidTimeIncrement(f64),
    /// A row carried a NaN or infinite time
    NonFiniteTime {
        /// Case of the offending row
        case_id: CaseId,
        /// The time value
        time: f64,
    },
}

impl Display for StateSnapshotLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateSnapshotLogError::InvalidTimeIncrement(inc) => {
                write!(f, "Invalid time increment {inc}: must be finite and > 0")
            }
            StateSnapshotLogError::NonFiniteTime { case_id, time } => {
                write!(f, "Non-finite time {time} for case {case_id}")
            }
        }
    }
}

impl std::error::Error for StateSnapshotLogError {}

/// Summary statistics of a [`StateSnapshotLog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogStats {
    /// Number of cases
    pub cases: usize,
    /// Total number of snapshots
    pub states: usize,
    /// Smallest role set size (0 for an empty log)
    pub min_roles: usize,
    /// Largest role set size
    pub max_roles: usize,
}

///
/// Per-case, time-ordered sequences of [`StateSnapshot`]s
///
/// Built once (see [`StateSnapshotLog::from_rows`]) and read-only afterwards.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshotLog {
    cases: BTreeMap<CaseId, Vec<StateSnapshot>>,
}

impl StateSnapshotLog {
    /// Build a log from point observation rows
    ///
    /// All rows sharing an exact `(case, time)` key are merged into one snapshot whose role set is
    /// the union of their activities.
    pub fn from_rows<I>(rows: I, options: &StateSnapshotLogOptions) -> Result<Self, StateSnapshotLogError>
    where
        I: IntoIterator<Item = SnapshotRow>,
    {
        let mut merged: BTreeMap<(CaseId, Timestamp), RoleSet> = BTreeMap::new();
        for row in rows {
            if !row.time.is_finite() {
                return Err(StateSnapshotLogError::NonFiniteTime {
                    case_id: row.case_id,
                    time: row.time,
                });
            }
            merged
                .entry((row.case_id, OrderedFloat(row.time)))
                .or_default()
                .insert(row.activity);
        }
        Ok(Self::from_merged(merged, options.keep_successive_duplicates))
    }

    /// Build a log from time range rows
    ///
    /// Each range row is expanded into point observations from `start` to `end` (inclusive),
    /// stepped by [`StateSnapshotLogOptions::time_increment`].
    pub fn from_range_rows<I>(
        rows: I,
        options: &StateSnapshotLogOptions,
    ) -> Result<Self, StateSnapshotLogError>
    where
        I: IntoIterator<Item = SnapshotRangeRow>,
    {
        let inc = options.time_increment;
        if !inc.is_finite() || inc <= 0.0 {
            return Err(StateSnapshotLogError::InvalidTimeIncrement(inc));
        }
        let mut points = Vec::new();
        for row in rows {
            if !row.start.is_finite() || !row.end.is_finite() {
                return Err(StateSnapshotLogError::NonFiniteTime {
                    time: if row.start.is_finite() { row.end } else { row.start },
                    case_id: row.case_id,
                });
            }
            if row.end < row.start {
                continue;
            }
            let steps = ((row.end - row.start) / inc).floor() as u64;
            for k in 0..=steps {
                let time = row.start + k as f64 * inc;
                points.push(SnapshotRow::new(row.case_id.clone(), row.activity.clone(), time));
            }
        }
        Self::from_rows(points, options)
    }

    /// Build a log directly from already ordered per-case snapshot sequences
    ///
    /// Snapshots are re-sorted by time; cases without snapshots are dropped.
    pub fn from_traces<I>(traces: I) -> Self
    where
        I: IntoIterator<Item = (CaseId, Vec<StateSnapshot>)>,
    {
        let cases = traces
            .into_iter()
            .filter(|(_, trace)| !trace.is_empty())
            .map(|(case_id, mut trace)| {
                trace.sort_by(|a, b| a.time.cmp(&b.time));
                (case_id, trace)
            })
            .collect();
        Self { cases }
    }

    fn from_merged(merged: BTreeMap<(CaseId, Timestamp), RoleSet>, keep_dupes: bool) -> Self {
        let mut cases: BTreeMap<CaseId, Vec<StateSnapshot>> = BTreeMap::new();
        for ((case_id, time), activities) in merged {
            let trace = cases.entry(case_id.clone()).or_default();
            if !keep_dupes && trace.last().is_some_and(|prev| prev.activities == activities) {
                continue;
            }
            trace.push(StateSnapshot {
                case_id,
                time,
                activities,
            });
        }
        Self { cases }
    }

    /// Snapshot sequence of a case
    pub fn trace(&self, case_id: &str) -> Option<&[StateSnapshot]> {
        self.cases.get(case_id).map(Vec::as_slice)
    }

    /// Iterate over `(case, snapshots)` in case order
    ///
    /// Case IDs are strings and compare lexicographically, so `"10"` comes before `"2"`.
    pub fn iter(&self) -> impl Iterator<Item = (&CaseId, &[StateSnapshot])> {
        self.cases.iter().map(|(c, t)| (c, t.as_slice()))
    }

    /// Case identifiers in order
    pub fn case_ids(&self) -> impl Iterator<Item = &CaseId> {
        self.cases.keys()
    }

    /// Number of cases
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// `true` if the log has no cases
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Trace variant of a case
    pub fn variant_of(&self, case_id: &str) -> Option<TraceVariant> {
        self.trace(case_id).map(trace_to_variant)
    }

    /// Occurrence count of every trace variant
    pub fn variants(&self) -> HashMap<TraceVariant, u64> {
        let mut result: HashMap<TraceVariant, u64> = HashMap::new();
        for trace in self.cases.values() {
            *result.entry(trace_to_variant(trace)).or_default() += 1;
        }
        result
    }

    /// Keep only the cases for which `keep` returns `true`
    pub fn retain_cases<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&CaseId, &[StateSnapshot]) -> bool,
    {
        Self {
            cases: self
                .cases
                .iter()
                .filter(|&(c, t)| keep(c, t))
                .map(|(c, t)| (c.clone(), t.clone()))
                .collect(),
        }
    }

    /// Count cases, snapshots and role set sizes
    pub fn stats(&self) -> LogStats {
        let sizes = self
            .cases
            .values()
            .flat_map(|t| t.iter().map(|ss| ss.activities.len()));
        let (states, min_roles, max_roles) = sizes.fold(
            (0, usize::MAX, 0),
            |(n, lo, hi), s| (n + 1, lo.min(s), hi.max(s)),
        );
        LogStats {
            cases: self.cases.len(),
            states,
            min_roles: if states == 0 { 0 } else { min_roles },
            max_roles,
        }
    }
}

/// Strip case identity and timestamps from a snapshot sequence
pub fn trace_to_variant(trace: &[StateSnapshot]) -> TraceVariant {
    trace.iter().map(|ss| ss.activities.clone()).collect()
}

/// Build a [`RoleSet`] from string-like items
pub fn role_set<I, S>(roles: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    roles.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_rows() -> Vec<SnapshotRow> {
        let mut rows: Vec<SnapshotRow> = (1801..=1804)
            .map(|y| SnapshotRow::new("1", "Student", y as f64))
            .collect();
        rows.push(SnapshotRow::new("1", "Drone", 1805.0));
        rows.push(SnapshotRow::new("2", "Tutor", 1801.0));
        rows.push(SnapshotRow::new("2", "Student", 1801.0));
        rows.push(SnapshotRow::new("2", "Bludger", 1805.0));
        rows
    }

    #[test]
    fn merges_rows_with_same_case_and_time() {
        let log = StateSnapshotLog::from_rows(point_rows(), &StateSnapshotLogOptions::default())
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.trace("1").unwrap().len(), 5);
        assert_eq!(
            log.trace("2").unwrap(),
            &[
                StateSnapshot::new("2", 1801.0, ["Student", "Tutor"]),
                StateSnapshot::new("2", 1805.0, ["Bludger"]),
            ]
        );
    }

    #[test]
    fn collapses_only_successive_duplicates() {
        let options = StateSnapshotLogOptions {
            keep_successive_duplicates: false,
            ..Default::default()
        };
        let mut rows = point_rows();
        rows.push(SnapshotRow::new("1", "Student", 1806.0));
        let log = StateSnapshotLog::from_rows(rows, &options).unwrap();
        assert_eq!(
            log.trace("1").unwrap(),
            &[
                StateSnapshot::new("1", 1801.0, ["Student"]),
                StateSnapshot::new("1", 1805.0, ["Drone"]),
                StateSnapshot::new("1", 1806.0, ["Student"]),
            ]
        );
    }

    #[test]
    fn expands_time_ranges() {
        let rows = vec![
            SnapshotRangeRow::new("1", "Student", 1801.0, 1804.0),
            SnapshotRangeRow::new("1", "Drone", 1805.0, 1805.0),
            SnapshotRangeRow::new("2", "Student", 1801.0, 1804.0),
            SnapshotRangeRow::new("2", "Tutor", 1802.0, 1804.0),
            SnapshotRangeRow::new("2", "Bludger", 1805.0, 1807.0),
        ];
        let options = StateSnapshotLogOptions {
            time_increment: 1.0,
            ..Default::default()
        };
        let log = StateSnapshotLog::from_range_rows(rows, &options).unwrap();
        let case2 = log.variant_of("2").unwrap();
        assert_eq!(case2.len(), 7);
        assert_eq!(case2[0], role_set(["Student"]));
        assert_eq!(case2[1], role_set(["Student", "Tutor"]));
        assert_eq!(case2[6], role_set(["Bludger"]));
    }

    #[test]
    fn default_increment_steps_quarters() {
        let rows = vec![SnapshotRangeRow::new("a", "Sweep", 0.0, 1.0)];
        let log =
            StateSnapshotLog::from_range_rows(rows, &StateSnapshotLogOptions::default()).unwrap();
        let times: Vec<f64> = log.trace("a").unwrap().iter().map(|s| s.time.0).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn range_points_do_not_accumulate_rounding() {
        let options = StateSnapshotLogOptions {
            time_increment: 0.1,
            ..Default::default()
        };
        let rows = vec![SnapshotRangeRow::new("a", "Sweep", 0.0, 1.0)];
        let log = StateSnapshotLog::from_range_rows(rows, &options).unwrap();
        let trace = log.trace("a").unwrap();
        assert_eq!(trace.len(), 11);
        assert_eq!(trace[10].time.0, 1.0);
    }

    #[test]
    fn huge_times_still_terminate() {
        // at 1e17 neighbouring floats are 16 apart, so adding 0.25 is a no-op
        let start = 1e17;
        let rows = vec![
            SnapshotRangeRow::new("a", "Sweep", start, start + 64.0),
            SnapshotRangeRow::new("b", "Sweep", 2.0, 1.0),
        ];
        let log =
            StateSnapshotLog::from_range_rows(rows, &StateSnapshotLogOptions::default()).unwrap();
        assert_eq!(log.trace("a").unwrap().len(), 5);
        assert!(log.trace("b").is_none());
    }

    #[test]
    fn cases_are_ordered_as_strings() {
        let rows = vec![
            SnapshotRow::new("2", "Student", 1.0),
            SnapshotRow::new("10", "Student", 1.0),
        ];
        let log = StateSnapshotLog::from_rows(rows, &StateSnapshotLogOptions::default()).unwrap();
        let ids: Vec<&str> = log.case_ids().map(String::as_str).collect();
        assert_eq!(ids, vec!["10", "2"]);
    }

    #[test]
    fn stats_serialize_to_json() {
        let log = StateSnapshotLog::from_rows(point_rows(), &StateSnapshotLogOptions::default())
            .unwrap();
        let json = serde_json::to_value(log.stats()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cases": 2, "states": 7, "min_roles": 1, "max_roles": 2})
        );
    }

    #[test]
    fn rejects_non_positive_increment() {
        let options = StateSnapshotLogOptions {
            time_increment: 0.0,
            ..Default::default()
        };
        let rows = vec![SnapshotRangeRow::new("a", "Sweep", 0.0, 1.0)];
        assert_eq!(
            StateSnapshotLog::from_range_rows(rows, &options),
            Err(StateSnapshotLogError::InvalidTimeIncrement(0.0))
        );
    }

    #[test]
    fn variants_and_stats() {
        let log = StateSnapshotLog::from_traces([
            ("1".to_string(), vec![StateSnapshot::new("1", 1.0, ["Sweep"])]),
            ("2".to_string(), vec![StateSnapshot::new("2", 1.0, ["Sweep"])]),
            (
                "3".to_string(),
                vec![
                    StateSnapshot::new("3", 2.0, ["Student", "Tutor"]),
                    StateSnapshot::new("3", 1.0, ["Student"]),
                ],
            ),
        ]);
        let variants = log.variants();
        assert_eq!(variants.get(&vec![role_set(["Sweep"])]), Some(&2));
        assert_eq!(
            log.variant_of("3").unwrap(),
            vec![role_set(["Student"]), role_set(["Student", "Tutor"])]
        );
        assert_eq!(
            log.stats(),
            LogStats {
                cases: 3,
                states: 4,
                min_roles: 1,
                max_roles: 2
            }
        );
        assert_eq!(StateSnapshotLog::default().stats(), LogStats::default());
    }
}

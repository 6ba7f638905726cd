//! Discover [`RoleStateNet`]s from [`StateSnapshotLog`]s
//!
//! Both variants walk every case from the synthetic initial state `{I}` and add one transition per
//! distinct pair of consecutive role sets, weighted by how often the pair occurs.
//!
//! - [`discover_closed_net`] closes every case with an ordinary transition into the final place `F`.
//! - [`discover_role_state_net`] instead adds one _picky_ closing transition for every state the
//!   net can reach under [`FiringRule::Active`].
pub mod noise;

use std::collections::HashMap;
use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::event_data::state_snapshot_log::{role_set, RoleSet, StateSnapshotLog};
use crate::core::process_models::role_state_net::{
    reachable_markings, FiringError, FiringRule, NetError, RoleStateNet, RoleStateNetBuilder,
    FINAL_PLACE, INITIAL_PLACE,
};

/// Weight of closing transitions for reachable states no case ended in
pub const DEFAULT_UNOBSERVED_FINAL_WEIGHT: f64 = 0.8;

/// Options for mining role-state nets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MinerOptions {
    /// Add closing transitions into the final place `F`
    pub close_traces: bool,
    /// Weight of picky closing transitions from reachable states without observed case ends
    ///
    /// Only needs to be small and non-zero, so that generation never dead-ends with zero probability.
    pub unobserved_final_weight: f64,
    /// Noise threshold (relative, `0.0` disables noise reduction)
    ///
    /// The closed variant prunes light transitions after mining
    /// (see [`noise::prune_by_transition_weight`]), the role-state variant drops rare trace
    /// variants before mining (see [`noise::filter_variants_by_frequency`]).
    pub noise_threshold: f64,
    /// Name of the mined net
    pub label: Option<String>,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            close_traces: true,
            unobserved_final_weight: DEFAULT_UNOBSERVED_FINAL_WEIGHT,
            noise_threshold: 0.0,
            label: None,
        }
    }
}

/// Errors during mining
///
/// Both variants only connect nodes they created themselves, so these indicate a defect.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleStateMiningError {
    /// Net assembly failed
    Net(NetError),
    /// Reachability search failed
    Firing(FiringError),
}

impl Display for RoleStateMiningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleStateMiningError::Net(e) => write!(f, "Failed to assemble net: {e}"),
            RoleStateMiningError::Firing(e) => write!(f, "Reachability search failed: {e}"),
        }
    }
}

impl std::error::Error for RoleStateMiningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoleStateMiningError::Net(e) => Some(e),
            RoleStateMiningError::Firing(e) => Some(e),
        }
    }
}

impl From<NetError> for RoleStateMiningError {
    fn from(value: NetError) -> Self {
        Self::Net(value)
    }
}

impl From<FiringError> for RoleStateMiningError {
    fn from(value: FiringError) -> Self {
        Self::Firing(value)
    }
}

#[derive(Debug, Clone)]
struct ArenaTransition {
    inputs: RoleSet,
    outputs: RoleSet,
    weight: f64,
    picky: bool,
    observed: bool,
}

///
/// Transitions are identified by their `(input names, output names)` pair while mining.
///
/// Weights are accumulated here and only written into [`Transition`](crate::core::process_models::role_state_net::Transition)s
/// when the net is frozen.
///
#[derive(Debug, Clone)]
struct NetArena {
    places: RoleStateNetBuilder,
    transitions: Vec<ArenaTransition>,
    index: HashMap<(RoleSet, RoleSet), usize>,
}

impl NetArena {
    fn new(with_final_place: bool) -> Self {
        let mut places = RoleStateNetBuilder::new();
        places.add_place(INITIAL_PLACE);
        if with_final_place {
            places.add_place(FINAL_PLACE);
        }
        Self {
            places,
            transitions: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Count one occurrence of the step `from → to`
    fn observe(&mut self, from: &RoleSet, to: &RoleSet) {
        for name in to {
            self.places.ensure_place(name);
        }
        let key = (from.clone(), to.clone());
        match self.index.get(&key) {
            Some(i) => self.transitions[*i].weight += 1.0,
            None => {
                self.index.insert(key, self.transitions.len());
                self.transitions.push(ArenaTransition {
                    inputs: from.clone(),
                    outputs: to.clone(),
                    weight: 1.0,
                    picky: false,
                    observed: true,
                });
            }
        }
    }

    fn add_closing(&mut self, from: RoleSet, weight: f64, observed: bool) {
        self.places.ensure_place(FINAL_PLACE);
        self.transitions.push(ArenaTransition {
            inputs: from,
            outputs: role_set([FINAL_PLACE]),
            weight,
            picky: true,
            observed,
        });
    }

    fn freeze(&self, name: Option<String>) -> Result<RoleStateNet, NetError> {
        let mut builder = self.places.clone().with_name(name);
        for t in &self.transitions {
            let id = if t.picky {
                builder.add_picky_transition(None, t.weight, t.observed)
            } else {
                builder.add_transition(None, t.weight)
            };
            builder.connect(
                t.inputs.iter().map(String::as_str),
                id,
                t.outputs.iter().map(String::as_str),
            )?;
        }
        Ok(builder.build())
    }
}

/// Walk all cases, returning how many cases ended in each role set
fn walk_cases(log: &StateSnapshotLog, arena: &mut NetArena, close_to_final: bool) -> HashMap<RoleSet, u64> {
    let initial = role_set([INITIAL_PLACE]);
    let final_set = role_set([FINAL_PLACE]);
    let mut finals: HashMap<RoleSet, u64> = HashMap::new();
    for (_, trace) in log.iter() {
        let Some(last) = trace.last() else {
            continue;
        };
        let mut prev = &initial;
        for snapshot in trace {
            arena.observe(prev, &snapshot.activities);
            prev = &snapshot.activities;
        }
        if close_to_final {
            arena.observe(&last.activities, &final_set);
        }
        *finals.entry(last.activities.clone()).or_default() += 1;
    }
    finals
}

///
/// Mine a net whose cases are closed by ordinary transitions into `F`
///
/// If [`MinerOptions::close_traces`] is `false`, cases are left open and no `F` place is added.
/// A positive [`MinerOptions::noise_threshold`] prunes light transitions afterwards.
///
pub fn discover_closed_net(
    log: &StateSnapshotLog,
    options: &MinerOptions,
) -> Result<RoleStateNet, RoleStateMiningError> {
    let mut arena = NetArena::new(options.close_traces);
    walk_cases(log, &mut arena, options.close_traces);
    let net = arena.freeze(options.label.clone())?;
    debug!(
        cases = log.len(),
        places = net.place_count(),
        transitions = net.transition_count(),
        "mined closed net"
    );
    if options.noise_threshold > 0.0 {
        return Ok(noise::prune_by_transition_weight(&net, options.noise_threshold));
    }
    Ok(net)
}

///
/// Mine a role-state net
///
/// After the walk, every non-empty marking reachable from `{I}` under [`FiringRule::Active`] (other
/// than `{I}` itself) gets a picky transition into `F`. Its weight is the number of cases that ended
/// in exactly that role set, or [`MinerOptions::unobserved_final_weight`] (with `observed = false`)
/// if there are none.
///
/// Reachability search terminates because markings of mined nets never exceed one token per place
/// under the active rule.
///
pub fn discover_role_state_net(
    log: &StateSnapshotLog,
    options: &MinerOptions,
) -> Result<RoleStateNet, RoleStateMiningError> {
    let filtered;
    let log = if options.noise_threshold > 0.0 {
        filtered = noise::filter_variants_by_frequency(log, options.noise_threshold);
        &filtered
    } else {
        log
    };

    let mut arena = NetArena::new(options.close_traces);
    let finals = walk_cases(log, &mut arena, false);

    if options.close_traces {
        let partial = arena.freeze(options.label.clone())?;
        let initial = role_set([INITIAL_PLACE]);
        let mut states: Vec<RoleSet> = match partial.initial_marking() {
            Some(start) => reachable_markings(&start, FiringRule::Active)?
                .iter()
                .filter(|m| !m.is_empty())
                .map(|m| m.place_names())
                .filter(|names| names != &initial)
                .collect(),
            None => Vec::new(),
        };
        states.sort();
        states.dedup();
        debug!(states = states.len(), "closing reachable states");
        for state in states {
            match finals.get(&state) {
                Some(count) => arena.add_closing(state, *count as f64, true),
                None => arena.add_closing(state, options.unobserved_final_weight, false),
            }
        }
    }

    let net = arena.freeze(options.label.clone())?;
    debug!(
        cases = log.len(),
        places = net.place_count(),
        transitions = net.transition_count(),
        "mined role-state net"
    );
    Ok(net)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::event_data::state_snapshot_log::StateSnapshot;
    use crate::core::process_models::role_state_net::{NetSignature, Transition};

    fn log_of(cases: Vec<(&str, Vec<Vec<&str>>)>) -> StateSnapshotLog {
        StateSnapshotLog::from_traces(cases.iter().map(|(case, sets)| {
            (
                case.to_string(),
                sets.iter()
                    .enumerate()
                    .map(|(i, roles)| StateSnapshot::new(*case, i as f64, roles.iter().copied()))
                    .collect(),
            )
        }))
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// `(inputs, outputs, weight, picky)` of all transitions, sorted
    fn shape(net: &RoleStateNet) -> Vec<(BTreeSet<String>, BTreeSet<String>, f64, bool)> {
        net.structural_signature()
            .transitions
            .into_iter()
            .map(|t| (t.inputs, t.outputs, t.weight.0, t.picky))
            .collect()
    }

    #[test]
    fn closed_single_state() {
        let log = log_of(vec![("case1", vec![vec!["Student"]])]);
        let net = discover_closed_net(&log, &MinerOptions::default()).unwrap();
        assert_eq!(net.place_count(), 3);
        assert_eq!(
            shape(&net),
            vec![
                (names(&["I"]), names(&["Student"]), 1.0, false),
                (names(&["Student"]), names(&["F"]), 1.0, false),
            ]
        );
    }

    #[test]
    fn concurrent_roles_share_places() {
        let log = log_of(vec![("case1", vec![vec!["Student"], vec!["Student", "Sweep"], vec!["Student"]])]);
        let options = MinerOptions {
            close_traces: false,
            ..Default::default()
        };
        let net = discover_closed_net(&log, &options).unwrap();
        assert_eq!(net.place_count(), 3);
        assert_eq!(net.transition_count(), 3);
        let transitions = shape(&net);
        assert!(transitions.contains(&(names(&["Student"]), names(&["Student", "Sweep"]), 1.0, false)));
        assert!(transitions.contains(&(names(&["Student", "Sweep"]), names(&["Student"]), 1.0, false)));
    }

    #[test]
    fn closed_weights_accumulate() {
        let log = log_of(vec![
            ("1", vec![vec!["A"], vec!["B"]]),
            ("2", vec![vec!["A"], vec!["B"]]),
            ("3", vec![vec!["A"]]),
        ]);
        let net = discover_closed_net(&log, &MinerOptions::default()).unwrap();
        assert_eq!(
            shape(&net),
            vec![
                (names(&["A"]), names(&["B"]), 2.0, false),
                (names(&["A"]), names(&["F"]), 1.0, false),
                (names(&["B"]), names(&["F"]), 2.0, false),
                (names(&["I"]), names(&["A"]), 3.0, false),
            ]
        );
        // I and F come first
        assert_eq!(net.place_by_name("I").unwrap().id.0, 1);
        assert_eq!(net.place_by_name("F").unwrap().id.0, 2);
    }

    #[test]
    fn role_state_single_case() {
        let log = log_of(vec![("case1", vec![vec!["Student"]])]);
        let net = discover_role_state_net(&log, &MinerOptions::default()).unwrap();
        assert_eq!(
            shape(&net),
            vec![
                (names(&["I"]), names(&["Student"]), 1.0, false),
                (names(&["Student"]), names(&["F"]), 1.0, true),
            ]
        );
    }

    #[test]
    fn role_state_final_weights_count_cases() {
        let log = log_of(vec![
            ("1", vec![vec!["Student"]]),
            ("2", vec![vec!["Sweep"]]),
            ("3", vec![vec!["Sweep"]]),
            ("4", vec![vec!["Sweep"]]),
        ]);
        let net = discover_role_state_net(&log, &MinerOptions::default()).unwrap();
        assert_eq!(
            shape(&net),
            vec![
                (names(&["I"]), names(&["Student"]), 1.0, false),
                (names(&["I"]), names(&["Sweep"]), 3.0, false),
                (names(&["Student"]), names(&["F"]), 1.0, true),
                (names(&["Sweep"]), names(&["F"]), 3.0, true),
            ]
        );
    }

    #[test]
    fn unobserved_reachable_states_get_default_weight() {
        // {Student, Sweep} is reachable but no case ends there
        let log = log_of(vec![("1", vec![vec!["Student"], vec!["Student", "Sweep"], vec!["Student"]])]);
        let options = MinerOptions {
            unobserved_final_weight: 0.5,
            ..Default::default()
        };
        let net = discover_role_state_net(&log, &options).unwrap();
        let closing: Vec<&Transition> = net.transitions().filter(|t| t.picky).collect();
        assert_eq!(closing.len(), 2);
        let unobserved: Vec<&Transition> = closing.iter().copied().filter(|t| !t.observed).collect();
        assert_eq!(unobserved.len(), 1);
        assert_eq!(unobserved[0].weight, 0.5);
        assert_eq!(
            net.place_names(net.preset_of_transition(unobserved[0].id).unwrap()),
            names(&["Student", "Sweep"])
        );
    }

    #[test]
    fn role_state_without_closing() {
        let log = log_of(vec![("1", vec![vec!["Student"], vec!["Sweep"]])]);
        let options = MinerOptions {
            close_traces: false,
            ..Default::default()
        };
        let net = discover_role_state_net(&log, &options).unwrap();
        assert!(net.place_by_name(FINAL_PLACE).is_none());
        assert!(net.transitions().all(|t| !t.picky));
        assert_eq!(net.transition_count(), 2);
    }

    #[test]
    fn mining_is_deterministic() {
        let log = log_of(vec![
            ("b", vec![vec!["Tutor"], vec!["Tutor", "Student"], vec!["Student"]]),
            ("a", vec![vec!["Student"], vec!["Student", "Sweep"]]),
            ("c", vec![vec!["Student"]]),
            ("d", vec![]),
        ]);
        let options = MinerOptions::default();
        let first: NetSignature = discover_role_state_net(&log, &options)
            .unwrap()
            .structural_signature();
        let second = discover_role_state_net(&log.clone(), &options)
            .unwrap()
            .structural_signature();
        assert_eq!(first, second);
        assert_eq!(
            discover_closed_net(&log, &options).unwrap(),
            discover_closed_net(&log, &options).unwrap()
        );
    }

    #[test]
    fn empty_log_yields_bare_net() {
        let net = discover_role_state_net(&StateSnapshotLog::default(), &MinerOptions::default())
            .unwrap();
        assert_eq!(net.transition_count(), 0);
        assert_eq!(net.place_count(), 2);
    }
}

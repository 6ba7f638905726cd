use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::marking::Marking;

/// Name of the initial place every mined net starts from
pub const INITIAL_PLACE: &str = "I";
/// Name of the final place closing transitions lead to
pub const FINAL_PLACE: &str = "F";

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialOrd, Ord)]
/// Place ID
pub struct PlaceID(pub u32);

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialOrd, Ord)]
/// Transition ID
pub struct TransitionID(pub u32);

impl Display for PlaceID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl Display for TransitionID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Place in a role-state net, named after the role it represents
pub struct Place {
    /// Place ID
    pub id: PlaceID,
    /// Role name (or [`INITIAL_PLACE`]/[`FINAL_PLACE`])
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Weighted transition in a role-state net
pub struct Transition {
    /// Transition ID
    pub id: TransitionID,
    /// Transition label (None if this transition is _silent_)
    pub label: Option<String>,
    /// Relative firing weight
    pub weight: f64,
    /// Only enabled when the marked places are exactly its input places (see [`FiringRule`](super::FiringRule))
    pub picky: bool,
    /// `false` for closing transitions added without evidence in the log
    pub observed: bool,
}

impl Transition {
    /// Label used for ordering (`""` for silent transitions)
    pub fn sort_label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "type", content = "nodes")]
/// Arc in a role-state net
///
/// Every arc moves exactly one token.
pub enum Arc {
    /// From Place to Transition
    PlaceTransition(PlaceID, TransitionID),
    /// From Transition to Place
    TransitionPlace(TransitionID, PlaceID),
}

impl Arc {
    /// Create new from place to transition
    pub fn place_to_transition(from: PlaceID, to: TransitionID) -> Arc {
        Arc::PlaceTransition(from, to)
    }
    /// Create new from transition to place
    pub fn transition_to_place(from: TransitionID, to: PlaceID) -> Arc {
        Arc::TransitionPlace(from, to)
    }
    /// Transition this arc is attached to
    pub fn transition(&self) -> TransitionID {
        match self {
            Arc::PlaceTransition(_, t) | Arc::TransitionPlace(t, _) => *t,
        }
    }
    /// Place this arc is attached to
    pub fn place(&self) -> PlaceID {
        match self {
            Arc::PlaceTransition(p, _) | Arc::TransitionPlace(_, p) => *p,
        }
    }
}

/// Errors raised when assembling a [`RoleStateNet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// An arc refers to a place which is not part of the net
    UnknownPlace(PlaceID),
    /// An arc refers to a transition which is not part of the net
    UnknownTransition(TransitionID),
    /// Two nodes of the same kind share an ID
    DuplicateId(String),
}

impl Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetError::UnknownPlace(p) => write!(f, "Unknown place {p}"),
            NetError::UnknownTransition(t) => write!(f, "Unknown transition {t}"),
            NetError::DuplicateId(id) => write!(f, "Duplicate node ID {id}"),
        }
    }
}

impl std::error::Error for NetError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
/// Structural description of one transition, independent of IDs
pub struct TransitionSignature {
    /// Input place names
    pub inputs: BTreeSet<String>,
    /// Output place names
    pub outputs: BTreeSet<String>,
    /// Transition label
    pub label: Option<String>,
    /// Firing weight
    pub weight: OrderedFloat<f64>,
    /// Picky flag
    pub picky: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// Structural description of a whole net, independent of IDs
///
/// Two nets with equal signatures describe the same behavior.
pub struct NetSignature {
    /// Place names
    pub places: BTreeSet<String>,
    /// Transitions, sorted
    pub transitions: Vec<TransitionSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleStateNetData {
    name: Option<String>,
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoleStateNetData", into = "RoleStateNetData")]
///
/// A role-state net: a weighted Petri net whose places are roles
///
/// Places carry role names, transitions carry firing weights and optionally the _picky_ flag.
/// Nets are immutable once built; use [`RoleStateNetBuilder`] to construct them.
pub struct RoleStateNet {
    name: Option<String>,
    places: BTreeMap<PlaceID, Place>,
    transitions: BTreeMap<TransitionID, Transition>,
    arcs: BTreeSet<Arc>,
    presets: BTreeMap<TransitionID, BTreeSet<PlaceID>>,
    postsets: BTreeMap<TransitionID, BTreeSet<PlaceID>>,
}

impl TryFrom<RoleStateNetData> for RoleStateNet {
    type Error = NetError;

    fn try_from(value: RoleStateNetData) -> Result<Self, Self::Error> {
        let mut places = BTreeMap::new();
        for p in value.places {
            if places.insert(p.id, p.clone()).is_some() {
                return Err(NetError::DuplicateId(p.id.to_string()));
            }
        }
        let mut transitions = BTreeMap::new();
        for t in value.transitions {
            let id = t.id;
            if transitions.insert(id, t).is_some() {
                return Err(NetError::DuplicateId(id.to_string()));
            }
        }
        Self::from_parts(value.name, places, transitions, value.arcs)
    }
}

impl From<RoleStateNet> for RoleStateNetData {
    fn from(value: RoleStateNet) -> Self {
        Self {
            name: value.name,
            places: value.places.into_values().collect(),
            transitions: value.transitions.into_values().collect(),
            arcs: value.arcs.into_iter().collect(),
        }
    }
}

impl RoleStateNet {
    /// Assemble a net from its parts, checking that every arc connects existing nodes
    pub(crate) fn from_parts(
        name: Option<String>,
        places: BTreeMap<PlaceID, Place>,
        transitions: BTreeMap<TransitionID, Transition>,
        arcs: impl IntoIterator<Item = Arc>,
    ) -> Result<Self, NetError> {
        let arcs: BTreeSet<Arc> = arcs.into_iter().collect();
        let mut presets: BTreeMap<TransitionID, BTreeSet<PlaceID>> =
            transitions.keys().map(|t| (*t, BTreeSet::new())).collect();
        let mut postsets = presets.clone();
        for arc in &arcs {
            if !places.contains_key(&arc.place()) {
                return Err(NetError::UnknownPlace(arc.place()));
            }
            let (sets, t) = match arc {
                Arc::PlaceTransition(_, t) => (&mut presets, t),
                Arc::TransitionPlace(t, _) => (&mut postsets, t),
            };
            sets.get_mut(t)
                .ok_or(NetError::UnknownTransition(*t))?
                .insert(arc.place());
        }
        Ok(Self {
            name,
            places,
            transitions,
            arcs,
            presets,
            postsets,
        })
    }

    /// Optional net name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Places in ID order
    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    /// Transitions in ID order
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// All arcs
    pub fn arcs(&self) -> &BTreeSet<Arc> {
        &self.arcs
    }

    /// Look up a place
    pub fn place(&self, id: PlaceID) -> Option<&Place> {
        self.places.get(&id)
    }

    /// Look up a transition
    pub fn transition(&self, id: TransitionID) -> Option<&Transition> {
        self.transitions.get(&id)
    }

    /// First place (in ID order) with the given name
    pub fn place_by_name(&self, name: &str) -> Option<&Place> {
        self.places.values().find(|p| p.name == name)
    }

    /// Get the preset (input places) of a transition
    pub fn preset_of_transition(&self, t: TransitionID) -> Option<&BTreeSet<PlaceID>> {
        self.presets.get(&t)
    }

    /// Get the postset (output places) of a transition
    pub fn postset_of_transition(&self, t: TransitionID) -> Option<&BTreeSet<PlaceID>> {
        self.postsets.get(&t)
    }

    /// Names of a set of places
    pub fn place_names<'a>(&self, ids: impl IntoIterator<Item = &'a PlaceID>) -> BTreeSet<String> {
        ids.into_iter()
            .filter_map(|id| self.places.get(id))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Number of places
    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    /// Number of transitions
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Sum of all transition weights
    pub fn total_weight(&self) -> f64 {
        self.transitions.values().map(|t| t.weight).sum()
    }

    /// Marking with a single token on the [`INITIAL_PLACE`], if the net has one
    pub fn initial_marking(&self) -> Option<Marking<'_>> {
        self.place_by_name(INITIAL_PLACE)
            .map(|p| Marking::from_tokens_unchecked(self, [(p.id, 1)]))
    }

    /// ID-independent description of the net, suitable for comparing two nets
    pub fn structural_signature(&self) -> NetSignature {
        let mut transitions: Vec<TransitionSignature> = self
            .transitions
            .values()
            .map(|t| TransitionSignature {
                inputs: self.place_names(self.presets.get(&t.id).into_iter().flatten()),
                outputs: self.place_names(self.postsets.get(&t.id).into_iter().flatten()),
                label: t.label.clone(),
                weight: OrderedFloat(t.weight),
                picky: t.picky,
            })
            .collect();
        transitions.sort();
        NetSignature {
            places: self.places.values().map(|p| p.name.clone()).collect(),
            transitions,
        }
    }

    /// Keep only the transitions selected by `keep`, together with their arcs and the places these touch
    pub fn restrict_transitions<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Transition) -> bool,
    {
        let transitions: BTreeMap<TransitionID, Transition> = self
            .transitions
            .iter()
            .filter(|&(_, t)| keep(t))
            .map(|(id, t)| (*id, t.clone()))
            .collect();
        let arcs: BTreeSet<Arc> = self
            .arcs
            .iter()
            .filter(|a| transitions.contains_key(&a.transition()))
            .copied()
            .collect();
        let touched: BTreeSet<PlaceID> = arcs.iter().map(Arc::place).collect();
        let places = self
            .places
            .iter()
            .filter(|&(id, _)| touched.contains(id))
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        let presets = self
            .presets
            .iter()
            .filter(|&(t, _)| transitions.contains_key(t))
            .map(|(t, s)| (*t, s.clone()))
            .collect();
        let postsets = self
            .postsets
            .iter()
            .filter(|&(t, _)| transitions.contains_key(t))
            .map(|(t, s)| (*t, s.clone()))
            .collect();
        Self {
            name: self.name.clone(),
            places,
            transitions,
            arcs,
            presets,
            postsets,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string (arcs are validated)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Display for RoleStateNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "RoleStateNet {}: {} places, {} transitions",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.places.len(),
            self.transitions.len()
        )?;
        for t in self.transitions.values() {
            let inputs = self.place_names(self.presets.get(&t.id).into_iter().flatten());
            let outputs = self.place_names(self.postsets.get(&t.id).into_iter().flatten());
            writeln!(
                f,
                "    {} {:?} -> {}{} ({}) -> {:?}",
                t.id,
                inputs,
                t.sort_label(),
                if t.picky { " [picky]" } else { "" },
                t.weight,
                outputs
            )?;
        }
        Ok(())
    }
}

///
/// Incremental construction of a [`RoleStateNet`]
///
/// Place and transition IDs are handed out sequentially starting at `1`.
/// Arcs can only connect nodes that were added before, so [`RoleStateNetBuilder::build`] cannot fail.
///
#[derive(Debug, Clone, Default)]
pub struct RoleStateNetBuilder {
    name: Option<String>,
    places: BTreeMap<PlaceID, Place>,
    place_ids: HashMap<String, PlaceID>,
    transitions: BTreeMap<TransitionID, Transition>,
    arcs: BTreeSet<Arc>,
    next_place: u32,
    next_transition: u32,
}

impl RoleStateNetBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the net name
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Add a new place, even if a place with the same name exists
    pub fn add_place(&mut self, name: impl Into<String>) -> PlaceID {
        self.next_place += 1;
        let id = PlaceID(self.next_place);
        let name = name.into();
        self.place_ids.entry(name.clone()).or_insert(id);
        self.places.insert(id, Place { id, name });
        id
    }

    /// Get the place with the given name, adding it first if needed
    pub fn ensure_place(&mut self, name: &str) -> PlaceID {
        match self.place_ids.get(name) {
            Some(id) => *id,
            None => self.add_place(name),
        }
    }

    /// First place added with the given name
    pub fn place_by_name(&self, name: &str) -> Option<PlaceID> {
        self.place_ids.get(name).copied()
    }

    /// Add an observed, non-picky transition
    pub fn add_transition(&mut self, label: Option<String>, weight: f64) -> TransitionID {
        self.push_transition(label, weight, false, true)
    }

    /// Add a picky transition
    pub fn add_picky_transition(
        &mut self,
        label: Option<String>,
        weight: f64,
        observed: bool,
    ) -> TransitionID {
        self.push_transition(label, weight, true, observed)
    }

    fn push_transition(
        &mut self,
        label: Option<String>,
        weight: f64,
        picky: bool,
        observed: bool,
    ) -> TransitionID {
        self.next_transition += 1;
        let id = TransitionID(self.next_transition);
        self.transitions.insert(
            id,
            Transition {
                id,
                label,
                weight,
                picky,
                observed,
            },
        );
        id
    }

    /// Add an arc; adding the same arc twice has no effect
    pub fn add_arc(&mut self, arc: Arc) -> Result<(), NetError> {
        if !self.places.contains_key(&arc.place()) {
            return Err(NetError::UnknownPlace(arc.place()));
        }
        if !self.transitions.contains_key(&arc.transition()) {
            return Err(NetError::UnknownTransition(arc.transition()));
        }
        self.arcs.insert(arc);
        Ok(())
    }

    /// Connect the named input places to `transition` and `transition` to the named output places
    ///
    /// Missing places are added.
    pub fn connect<'a>(
        &mut self,
        inputs: impl IntoIterator<Item = &'a str>,
        transition: TransitionID,
        outputs: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), NetError> {
        for name in inputs {
            let p = self.ensure_place(name);
            self.add_arc(Arc::place_to_transition(p, transition))?;
        }
        for name in outputs {
            let p = self.ensure_place(name);
            self.add_arc(Arc::transition_to_place(transition, p))?;
        }
        Ok(())
    }

    /// Finish construction
    pub fn build(self) -> RoleStateNet {
        let mut presets: BTreeMap<TransitionID, BTreeSet<PlaceID>> =
            self.transitions.keys().map(|t| (*t, BTreeSet::new())).collect();
        let mut postsets = presets.clone();
        for arc in &self.arcs {
            match arc {
                Arc::PlaceTransition(p, t) => presets.entry(*t).or_default().insert(*p),
                Arc::TransitionPlace(t, p) => postsets.entry(*t).or_default().insert(*p),
            };
        }
        RoleStateNet {
            name: self.name,
            places: self.places,
            transitions: self.transitions,
            arcs: self.arcs,
            presets,
            postsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role_state_net;

    fn two_choice_net() -> RoleStateNet {
        role_state_net!(
            ("I" ; "a", 3 ; "A"),
            ("A" ; "b", 1 ; "F"),
            ("I" ; "c", 7 ; "F"),
        )
    }

    #[test]
    fn builder_assigns_sequential_ids() {
        let mut builder = RoleStateNetBuilder::new();
        let i = builder.add_place(INITIAL_PLACE);
        let f = builder.add_place(FINAL_PLACE);
        let t = builder.add_transition(None, 1.0);
        assert_eq!((i, f, t), (PlaceID(1), PlaceID(2), TransitionID(1)));
        assert_eq!(builder.ensure_place("I"), i);
        builder.add_arc(Arc::place_to_transition(i, t)).unwrap();
        builder.add_arc(Arc::place_to_transition(i, t)).unwrap();
        let net = builder.build();
        assert_eq!(net.arcs().len(), 1);
        assert_eq!(net.preset_of_transition(t), Some(&BTreeSet::from([i])));
        assert_eq!(net.postset_of_transition(t), Some(&BTreeSet::new()));
    }

    #[test]
    fn builder_rejects_dangling_arcs() {
        let mut builder = RoleStateNetBuilder::new();
        let p = builder.add_place("A");
        assert_eq!(
            builder.add_arc(Arc::place_to_transition(p, TransitionID(9))),
            Err(NetError::UnknownTransition(TransitionID(9)))
        );
        let t = builder.add_transition(None, 1.0);
        assert_eq!(
            builder.add_arc(Arc::transition_to_place(t, PlaceID(4))),
            Err(NetError::UnknownPlace(PlaceID(4)))
        );
    }

    #[test]
    fn macro_builds_expected_structure() {
        let net = two_choice_net();
        assert_eq!(net.place_count(), 3);
        assert_eq!(net.transition_count(), 3);
        assert_eq!(net.total_weight(), 11.0);
        let sig = net.structural_signature();
        assert_eq!(
            sig.places,
            BTreeSet::from(["A".to_string(), "F".to_string(), "I".to_string()])
        );
        assert!(sig.transitions.iter().any(|t| t.label.as_deref() == Some("c")
            && t.inputs == BTreeSet::from(["I".to_string()])
            && t.outputs == BTreeSet::from(["F".to_string()])
            && t.weight == OrderedFloat(7.0)));
        assert!(net.initial_marking().is_some());
    }

    #[test]
    fn signatures_ignore_ids() {
        let mut builder = RoleStateNetBuilder::new();
        // Same net, places and transitions added in a different order
        let t_c = builder.add_transition(Some("c".into()), 7.0);
        let t_b = builder.add_transition(Some("b".into()), 1.0);
        let t_a = builder.add_transition(Some("a".into()), 3.0);
        builder.connect(["I"], t_c, ["F"]).unwrap();
        builder.connect(["A"], t_b, ["F"]).unwrap();
        builder.connect(["I"], t_a, ["A"]).unwrap();
        let net = builder.build();
        assert_eq!(net.structural_signature(), two_choice_net().structural_signature());
    }

    #[test]
    fn restricting_drops_untouched_places() {
        let net = two_choice_net();
        let restricted = net.restrict_transitions(|t| t.weight > 5.0);
        assert_eq!(restricted.transition_count(), 1);
        assert_eq!(restricted.place_count(), 2);
        assert!(restricted.place_by_name("A").is_none());
    }

    #[test]
    fn json_round_trip_and_validation() {
        let net = two_choice_net();
        let json = net.to_json().unwrap();
        let back = RoleStateNet::from_json(&json).unwrap();
        assert_eq!(net, back);

        let dangling = r#"{"name":null,"places":[],"transitions":[],"arcs":[{"type":"PlaceTransition","nodes":[1,1]}]}"#;
        assert!(RoleStateNet::from_json(dangling).is_err());
    }
}

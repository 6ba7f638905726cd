//! Firing rules of role-state nets
//!
//! A transition may fire if the current [`Marking`] satisfies the enabling condition of the
//! chosen [`FiringRule`]. Firing consumes one token from each input place and produces one token
//! on each output place.
use std::collections::BTreeSet;
use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::marking::Marking;
use super::net_struct::{PlaceID, Transition, TransitionID};

/// Errors raised when evaluating or firing transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiringError {
    /// The transition is not enabled in the given marking
    NotEnabled(TransitionID),
    /// The transition is not part of the marking's net
    UnknownTransition(TransitionID),
    /// The place is not part of the marking's net
    UnknownPlace(PlaceID),
    /// No place with this name exists in the net
    UnknownPlaceName(String),
}

impl Display for FiringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FiringError::NotEnabled(t) => write!(f, "Transition {t} is not enabled"),
            FiringError::UnknownTransition(t) => write!(f, "Unknown transition {t}"),
            FiringError::UnknownPlace(p) => write!(f, "Unknown place {p}"),
            FiringError::UnknownPlaceName(n) => write!(f, "No place named {n:?}"),
        }
    }
}

impl std::error::Error for FiringError {}

///
/// Enabling semantics used for replay, reachability and log generation
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum FiringRule {
    /// Every input place holds at least one token; `picky` flags are ignored
    Plain,
    /// Plain enabling, plus no output place that is not also an input place may already hold a token
    ///
    /// Transitions flagged `picky` additionally require the set of marked places to equal their input set.
    #[default]
    Active,
}

/// Plain enabling: every input place holds at least one token
pub fn plain_enabled(marking: &Marking<'_>, inputs: &BTreeSet<PlaceID>) -> bool {
    inputs.iter().all(|p| marking.tokens(*p) >= 1)
}

/// Active enabling: plain enabling, and no "new" output place is already marked
pub fn active_enabled(
    marking: &Marking<'_>,
    inputs: &BTreeSet<PlaceID>,
    outputs: &BTreeSet<PlaceID>,
) -> bool {
    plain_enabled(marking, inputs)
        && outputs
            .difference(inputs)
            .all(|p| marking.tokens(*p) == 0)
}

/// Picky enabling: the marked places are exactly the input places, and active enabling holds
pub fn picky_enabled(
    marking: &Marking<'_>,
    inputs: &BTreeSet<PlaceID>,
    outputs: &BTreeSet<PlaceID>,
) -> bool {
    marking.marked_places().eq(inputs.iter().copied()) && active_enabled(marking, inputs, outputs)
}

impl FiringRule {
    /// Check whether `transition` is enabled in `marking`
    pub fn is_enabled(
        &self,
        marking: &Marking<'_>,
        transition: TransitionID,
    ) -> Result<bool, FiringError> {
        let net = marking.net();
        let t = net
            .transition(transition)
            .ok_or(FiringError::UnknownTransition(transition))?;
        let inputs = net
            .preset_of_transition(transition)
            .ok_or(FiringError::UnknownTransition(transition))?;
        let outputs = net
            .postset_of_transition(transition)
            .ok_or(FiringError::UnknownTransition(transition))?;
        Ok(match self {
            FiringRule::Plain => plain_enabled(marking, inputs),
            FiringRule::Active if t.picky => picky_enabled(marking, inputs, outputs),
            FiringRule::Active => active_enabled(marking, inputs, outputs),
        })
    }

    /// All transitions enabled in `marking`, in ID order
    pub fn enabled<'n>(&self, marking: &Marking<'n>) -> Vec<&'n Transition> {
        let net = marking.net();
        net.transitions()
            .filter(|t| self.is_enabled(marking, t.id).unwrap_or(false))
            .collect()
    }

    /// Fire `transition`, returning the successor marking
    ///
    /// The given marking is left untouched.
    pub fn remark<'n>(
        &self,
        marking: &Marking<'n>,
        transition: TransitionID,
    ) -> Result<Marking<'n>, FiringError> {
        if !self.is_enabled(marking, transition)? {
            return Err(FiringError::NotEnabled(transition));
        }
        let net = marking.net();
        let mut next = marking.clone();
        let tokens = next.tokens_mut();
        for p in net.preset_of_transition(transition).into_iter().flatten() {
            if let Some(count) = tokens.get_mut(p) {
                *count -= 1;
                if *count == 0 {
                    tokens.remove(p);
                }
            }
        }
        for p in net.postset_of_transition(transition).into_iter().flatten() {
            *tokens.entry(*p).or_insert(0) += 1;
        }
        Ok(next)
    }
}

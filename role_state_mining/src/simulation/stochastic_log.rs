//! Weighted token game: turn a net into a synthetic trace frequency table
//!
//! Starting from an initial marking, a fixed budget of traces is split recursively over the enabled
//! transitions, proportionally to their weights.
use std::collections::HashMap;
use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::event_data::state_snapshot_log::RoleSet;
use crate::core::process_models::role_state_net::{FiringError, FiringRule, Marking, Transition};
use crate::core::process_models::trace_frequency::{bag_union_into, TraceFrequency};

/// Number of synthetic traces generated per model by default
pub const DEFAULT_LOG_SIZE: u64 = 1000;
/// Generated traces are cut off at this many entries by default
pub const DEFAULT_MAX_TRACE_LENGTH: usize = 100;

/// Options for [`StochasticLogGenerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratorOptions {
    /// Total number of traces to generate
    pub log_size: u64,
    /// Stop extending a trace once it has this many entries
    pub max_trace_length: usize,
    /// Emit a warning (once per run) when a trace is truncated
    pub warnings: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            log_size: DEFAULT_LOG_SIZE,
            max_trace_length: DEFAULT_MAX_TRACE_LENGTH,
            warnings: true,
        }
    }
}

/// Errors during log generation
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// Firing an enabled transition failed
    Firing(FiringError),
    /// Distributing the remainder of a budget left units unassigned
    ///
    /// Indicates a defect in the allocation, not a problem of the input.
    UnderAllocated {
        /// Budget to distribute
        budget: u64,
        /// Units left over
        leftover: u64,
    },
}

impl Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Firing(e) => write!(f, "Firing failed during generation: {e}"),
            GeneratorError::UnderAllocated { budget, leftover } => write!(
                f,
                "Allocated budget {budget} with {leftover} units left over"
            ),
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeneratorError::Firing(e) => Some(e),
            GeneratorError::UnderAllocated { .. } => None,
        }
    }
}

impl From<FiringError> for GeneratorError {
    fn from(value: FiringError) -> Self {
        Self::Firing(value)
    }
}

///
/// Split `budget` over `transitions` proportionally to their weights
///
/// Every transition first gets `floor(budget × weight / total)`. The remaining units are handed out
/// one at a time in ascending order of `(label, share, id)`.
/// If all weights are zero, every transition counts as weight `1`.
///
/// Returned shares are in the order of `transitions` and sum to `budget`.
///
pub fn allocate_budget(budget: u64, transitions: &[&Transition]) -> Result<Vec<u64>, GeneratorError> {
    if transitions.is_empty() {
        return Ok(Vec::new());
    }
    let total: f64 = transitions.iter().map(|t| t.weight).sum();
    let weight_of = |t: &Transition| if total > 0.0 { t.weight } else { 1.0 };
    let total = if total > 0.0 { total } else { transitions.len() as f64 };

    let mut shares: Vec<u64> = transitions
        .iter()
        .map(|t| (budget as f64 * weight_of(*t) / total).floor() as u64)
        .collect();
    let mut leftover = budget.saturating_sub(shares.iter().sum());

    let mut order: Vec<usize> = (0..transitions.len()).collect();
    order.sort_by(|a, b| {
        (transitions[*a].sort_label(), shares[*a], transitions[*a].id).cmp(&(
            transitions[*b].sort_label(),
            shares[*b],
            transitions[*b].id,
        ))
    });
    for i in order {
        if leftover == 0 {
            break;
        }
        shares[i] += 1;
        leftover -= 1;
    }

    if leftover > 0 {
        error!(budget, leftover, "budget allocation left units unassigned");
        return Err(GeneratorError::UnderAllocated { budget, leftover });
    }
    Ok(shares)
}

#[derive(Debug, Default)]
struct GenerationRun {
    warned: bool,
}

///
/// Generates a synthetic trace frequency table by replaying a net
///
#[derive(Debug, Clone, Copy, Default)]
pub struct StochasticLogGenerator {
    rule: FiringRule,
    options: GeneratorOptions,
}

impl StochasticLogGenerator {
    /// Create a generator
    pub fn new(rule: FiringRule, options: GeneratorOptions) -> Self {
        Self { rule, options }
    }

    /// Firing rule used
    pub fn rule(&self) -> FiringRule {
        self.rule
    }

    /// Options used
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    ///
    /// Generate traces from `initial`
    ///
    /// Each trace is the sequence of role sets (marked place names) visited. The counts of the result
    /// sum to [`GeneratorOptions::log_size`].
    ///
    /// Traces reaching [`GeneratorOptions::max_trace_length`] are cut off and keep their remaining budget.
    ///
    pub fn generate(&self, initial: &Marking<'_>) -> Result<TraceFrequency<RoleSet>, GeneratorError> {
        let mut run = GenerationRun::default();
        let traces = self.generate_from(&mut run, initial, self.options.log_size, &[])?;
        debug!(
            traces = traces.len(),
            budget = self.options.log_size,
            truncated = run.warned,
            "generated stochastic log"
        );
        Ok(TraceFrequency::new(traces))
    }

    fn generate_from(
        &self,
        run: &mut GenerationRun,
        marking: &Marking<'_>,
        budget: u64,
        prefix: &[RoleSet],
    ) -> Result<HashMap<Vec<RoleSet>, u64>, GeneratorError> {
        let mut trace = prefix.to_vec();
        trace.push(marking.place_names());

        let enabled = self.rule.enabled(marking);
        if enabled.is_empty() {
            return Ok(HashMap::from([(trace, budget)]));
        }
        if trace.len() >= self.options.max_trace_length {
            if self.options.warnings && !run.warned {
                warn!(
                    max_trace_length = self.options.max_trace_length,
                    "truncating generated trace at maximum length"
                );
            }
            run.warned = true;
            return Ok(HashMap::from([(trace, budget)]));
        }

        let shares = allocate_budget(budget, &enabled)?;
        let mut result: HashMap<Vec<RoleSet>, u64> = HashMap::new();
        for (transition, share) in enabled.iter().zip(shares) {
            if share == 0 {
                continue;
            }
            let next = self.rule.remark(marking, transition.id)?;
            let sub = self.generate_from(run, &next, share, &trace)?;
            bag_union_into(&mut result, sub);
        }
        Ok(result)
    }
}

//! Entropic relevance of a model trace distribution with respect to a log
//!
//! Relevance is the average number of bits needed to transmit a trace of the log using the model:
//! a _selector_ (does the model know the trace?), the _trace compression_ (the actual code
//! length, using the model or a background coder for unknown traces) and, for the zero-order
//! background coder, a _prelude_ transmitting its entry frequencies.
//!
//! Lower values are better.
use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::process_models::trace_frequency::{EntryFrequency, TraceEntry, TraceFrequency};
use crate::simulation::stochastic_log::GeneratorError;

/// Coder used for log traces the model does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BackgroundModel {
    /// Every entry is one of `alphabet + 1` equally likely symbols (the extra one ends the trace)
    Uniform,
    /// Like [`BackgroundModel::Uniform`], with every _subset_ of the alphabet as a symbol
    UniformRoleSet,
    /// Entries are coded by their frequency in the log, which is sent up front
    ZeroOrder,
}

/// Components of entropic relevance
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelevanceCost {
    /// Binary entropy of the fraction of log traces the model covers
    pub selector: f64,
    /// Average code length of a log trace
    pub trace_compression: f64,
    /// Cost of the background coder's parameters
    pub prelude: f64,
}

impl RelevanceCost {
    /// Entropic relevance
    pub fn total(&self) -> f64 {
        self.selector + self.trace_compression + self.prelude
    }
}

/// Errors while computing relevance
#[derive(Debug, Clone, PartialEq)]
pub enum RelevanceError {
    /// The log contains no traces
    EmptyLog,
    /// A model code length was requested for a trace the model never produces
    TraceNotInModel,
    /// Generating the model's traces failed
    Generation(GeneratorError),
}

impl Display for RelevanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelevanceError::EmptyLog => write!(f, "Log contains no traces"),
            RelevanceError::TraceNotInModel => write!(f, "Trace has probability zero in the model"),
            RelevanceError::Generation(e) => write!(f, "Failed to generate model traces: {e}"),
        }
    }
}

impl std::error::Error for RelevanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelevanceError::Generation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeneratorError> for RelevanceError {
    fn from(value: GeneratorError) -> Self {
        Self::Generation(value)
    }
}

/// `H(p)` in bits; `0` outside of `(0, 1)`
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
}

/// Bits of the Elias gamma code of `n` (`n >= 1`)
pub fn elias_gamma(n: u64) -> u64 {
    2 * u64::from(n.max(1).ilog2()) + 1
}

/// Fraction of log trace occurrences which the model produces with non-zero probability
pub fn covered_fraction<E: TraceEntry>(log: &TraceFrequency<E>, model: &TraceFrequency<E>) -> f64 {
    if log.trace_total() == 0 {
        return 0.0;
    }
    let covered: u64 = log
        .elements()
        .iter()
        .filter(|(trace, _)| model.freq(trace) > 0)
        .map(|(_, freq)| freq)
        .sum();
    covered as f64 / log.trace_total() as f64
}

/// Selector cost: `H(ρ)` with `ρ` the [`covered_fraction`]
pub fn selector_cost<E: TraceEntry>(log: &TraceFrequency<E>, model: &TraceFrequency<E>) -> f64 {
    binary_entropy(covered_fraction(log, model))
}

/// Code length of `trace` under the model: `-log2(P_model(trace))`
pub fn model_cost<E: TraceEntry>(model: &TraceFrequency<E>, trace: &[E]) -> Result<f64, RelevanceError> {
    match model.freq(trace) {
        0 => Err(RelevanceError::TraceNotInModel),
        freq => Ok(-(freq as f64 / model.trace_total() as f64).log2()),
    }
}

/// `(|trace| + 1) · log2(|alphabet| + 1)`
pub fn uniform_background_cost<E: TraceEntry>(log: &TraceFrequency<E>, trace: &[E]) -> f64 {
    let alphabet = log.role_total() as f64;
    (trace.len() as f64 + 1.0) * (alphabet + 1.0).log2()
}

/// `(|trace| + 1) · log2(2^|alphabet| + 1)`
pub fn uniform_role_set_background_cost<E: TraceEntry>(log: &TraceFrequency<E>, trace: &[E]) -> f64 {
    let alphabet = log.role_total() as f64;
    // log2(2^a + 1) without overflowing for large alphabets
    let per_entry = alphabet + (-alphabet).exp2().ln_1p() / std::f64::consts::LN_2;
    (trace.len() as f64 + 1.0) * per_entry
}

///
/// Zero-order background coder
///
/// Each entry `e` costs `-log2(f(e) / (E + N))` and the end of a trace costs `-log2(N / (E + N))`,
/// where `f` counts entry occurrences in the log, `E` is the sum of `f` and `N` the number of log traces.
///
#[derive(Debug, Clone)]
pub struct ZeroOrderBackground<E: TraceEntry> {
    entries: EntryFrequency<E>,
    trace_total: u64,
}

impl<E: TraceEntry> ZeroOrderBackground<E> {
    /// Fit the coder to a log
    pub fn new(log: &TraceFrequency<E>) -> Self {
        Self {
            entries: EntryFrequency::new(log),
            trace_total: log.trace_total(),
        }
    }

    /// Code length of a trace
    pub fn cost(&self, trace: &[E]) -> f64 {
        let denominator = (self.entries.entry_total() + self.trace_total) as f64;
        let entries: f64 = trace
            .iter()
            .map(|e| -(self.entries.entry_freq(e) as f64 / denominator).log2())
            .sum();
        entries - (self.trace_total as f64 / denominator).log2()
    }

    /// Per-trace cost of sending the entry counts and the trace count (Elias gamma coded)
    pub fn prelude_cost(&self) -> f64 {
        if self.trace_total == 0 {
            return 0.0;
        }
        let bits: u64 = self
            .entries
            .entries()
            .values()
            .map(|f| elias_gamma(f + 1))
            .sum::<u64>()
            + elias_gamma(self.trace_total + 1);
        bits as f64 / self.trace_total as f64
    }
}

/// Code length of a trace the model does not know
fn background_coder<'a, E: TraceEntry + 'a>(
    background: BackgroundModel,
    log: &'a TraceFrequency<E>,
) -> Box<dyn Fn(&[E]) -> f64 + 'a> {
    match background {
        BackgroundModel::Uniform => Box::new(move |t: &[E]| uniform_background_cost(log, t)),
        BackgroundModel::UniformRoleSet => {
            Box::new(move |t: &[E]| uniform_role_set_background_cost(log, t))
        }
        BackgroundModel::ZeroOrder => {
            let coder = ZeroOrderBackground::new(log);
            Box::new(move |t: &[E]| coder.cost(t))
        }
    }
}

/// Average code length of log traces: model cost if covered, background cost otherwise
pub fn trace_compression_cost<E: TraceEntry>(
    log: &TraceFrequency<E>,
    model: &TraceFrequency<E>,
    background: BackgroundModel,
) -> f64 {
    if log.trace_total() == 0 {
        return 0.0;
    }
    let coder = background_coder(background, log);
    let bits: f64 = log
        .elements()
        .iter()
        .map(|(trace, freq)| {
            let cost = model_cost(model, trace).unwrap_or_else(|_| coder(trace.as_slice()));
            *freq as f64 * cost
        })
        .sum();
    bits / log.trace_total() as f64
}

/// Prelude cost of the background coder (`0` for the uniform coders)
pub fn prelude_cost<E: TraceEntry>(log: &TraceFrequency<E>, background: BackgroundModel) -> f64 {
    match background {
        BackgroundModel::Uniform | BackgroundModel::UniformRoleSet => 0.0,
        BackgroundModel::ZeroOrder => ZeroOrderBackground::new(log).prelude_cost(),
    }
}

/// All components of entropic relevance
pub fn relevance_cost<E: TraceEntry>(
    log: &TraceFrequency<E>,
    model: &TraceFrequency<E>,
    background: BackgroundModel,
) -> Result<RelevanceCost, RelevanceError> {
    if log.trace_total() == 0 {
        return Err(RelevanceError::EmptyLog);
    }
    Ok(RelevanceCost {
        selector: selector_cost(log, model),
        trace_compression: trace_compression_cost(log, model, background),
        prelude: prelude_cost(log, background),
    })
}

///
/// Entropic relevance of `model` with respect to `log`
///
/// # Examples
///
/// ```rust
/// use role_state_mining::conformance::entropic_relevance::{entropic_relevance, BackgroundModel};
/// use role_state_mining::TraceFrequency;
/// let log = TraceFrequency::from_symbols([(vec!["a"], 1), (vec!["a", "b"], 1)]);
/// let relevance = entropic_relevance(&log, &log, BackgroundModel::Uniform).unwrap();
/// assert!((relevance - 1.0).abs() < 1e-12);
/// ```
pub fn entropic_relevance<E: TraceEntry>(
    log: &TraceFrequency<E>,
    model: &TraceFrequency<E>,
    background: BackgroundModel,
) -> Result<f64, RelevanceError> {
    Ok(relevance_cost(log, model, background)?.total())
}

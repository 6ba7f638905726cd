//! Unit earth mover's distance between two trace distributions
use crate::core::process_models::trace_frequency::{TraceEntry, TraceFrequency};

///
/// Earth mover's distance with unit ground distance between distinct traces
///
/// `1 - Σ max(0, P_log(t) - P_model(t))` over all traces `t` of the log. The result lies in `[0, 1]`
/// and is `1` for identical distributions.
///
pub fn earth_movers<E: TraceEntry>(log: &TraceFrequency<E>, model: &TraceFrequency<E>) -> f64 {
    let missing: f64 = log
        .traces()
        .map(|trace| (log.probability(trace) - model.probability(trace)).max(0.0))
        .sum();
    (1.0 - missing).clamp(0.0, 1.0)
}
